//! Compact node-id allocation.
//!
//! Every upstream of a chain gets a one-byte node id that is embedded in routing metadata, so
//! ids must be unique per chain and stable across restarts for an unchanged configuration. The
//! allocator tries a handful of values derived from a per-upstream seed before falling back to a
//! linear scan:
//!
//! ```text
//! seed ──► s = seed % 255 (0 → 1)
//!          candidates: s, -s, 127 - |s|, |s| - 128   (each truncated to a byte)
//!          first unused non-zero candidate wins
//!          otherwise: first unused id scanning signed bytes -128..=127,
//!          i.e. 128..=255 then 1..=127
//! ```

use super::errors::UpstreamError;
use ahash::AHashSet;
use tracing::debug;

/// Number of assignable node ids. Zero is reserved.
pub const NODE_ID_SPACE: usize = 255;

/// Allocates node ids for the upstreams of one chain.
#[derive(Debug, Default)]
pub struct NodeIdAllocator {
    in_use: AHashSet<u8>,
}

impl NodeIdAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns a node id.
    ///
    /// An explicit id is returned unchanged and recorded as used; uniqueness of explicit ids is
    /// checked by configuration validation, not here.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::NodeIdSpaceExhausted`] when every id in `1..=255` is taken.
    pub fn allocate(&mut self, explicit: Option<u8>, seed: i64) -> Result<u8, UpstreamError> {
        if let Some(id) = explicit {
            self.in_use.insert(id);
            return Ok(id);
        }

        let mut base = seed % 255;
        if base == 0 {
            base = 1;
        }
        let candidates = [base, -base, 127 - base.abs(), base.abs() - 128];

        let picked = candidates
            .into_iter()
            .map(truncate_to_byte)
            .find(|id| *id != 0 && !self.in_use.contains(id))
            .or_else(|| (128..=u8::MAX).chain(1..128).find(|id| !self.in_use.contains(id)));

        match picked {
            Some(id) => {
                debug!(seed, node_id = id, "allocated node id");
                self.in_use.insert(id);
                Ok(id)
            }
            None => Err(UpstreamError::NodeIdSpaceExhausted(NODE_ID_SPACE)),
        }
    }

    /// Frees an id so a later upstream can reuse it.
    pub fn release(&mut self, id: u8) -> bool {
        self.in_use.remove(&id)
    }

    #[must_use]
    pub fn is_used(&self, id: u8) -> bool {
        self.in_use.contains(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.in_use.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.in_use.is_empty()
    }
}

/// Two's complement truncation to the low byte.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn truncate_to_byte(value: i64) -> u8 {
    value as u8
}

/// Derives a stable allocation seed from an upstream id.
///
/// 32-bit FNV-1a over the UTF-8 bytes, sign-extended so the candidate arithmetic sees both
/// positive and negative seeds.
#[must_use]
pub fn seed_for(id: &str) -> i64 {
    const FNV_OFFSET: u32 = 0x811c_9dc5;
    const FNV_PRIME: u32 = 0x0100_0193;

    let hash = id.bytes().fold(FNV_OFFSET, |acc, b| (acc ^ u32::from(b)).wrapping_mul(FNV_PRIME));
    #[allow(clippy::cast_possible_wrap)]
    let signed = hash as i32;
    i64::from(signed)
}
