use super::errors::UpstreamError;
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};

/// Minimum length of an upstream id: a leading letter, at least one body character and a
/// trailing alphanumeric.
pub const MIN_ID_LENGTH: usize = 3;

/// Operator-assigned upstream identifier.
///
/// Must match `[a-zA-Z][a-zA-Z0-9_-]+[a-zA-Z0-9]` in full. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UpstreamId(Arc<str>);

impl UpstreamId {
    /// Validates and wraps an id.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::InvalidUpstreamId`] when `id` does not match the pattern.
    pub fn new(id: impl AsRef<str>) -> Result<Self, UpstreamError> {
        let id = id.as_ref();
        if is_valid_id(id) {
            Ok(Self(Arc::from(id)))
        } else {
            Err(UpstreamError::InvalidUpstreamId(id.to_string()))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Returns `true` if `id` is a valid upstream id.
#[must_use]
pub fn is_valid_id(id: &str) -> bool {
    let bytes = id.as_bytes();
    if bytes.len() < MIN_ID_LENGTH {
        return false;
    }
    let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
    let body = &bytes[1..bytes.len() - 1];

    first.is_ascii_alphabetic() &&
        last.is_ascii_alphanumeric() &&
        body.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'_' || *b == b'-')
}

impl TryFrom<String> for UpstreamId {
    type Error = UpstreamError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UpstreamId> for String {
    fn from(id: UpstreamId) -> Self {
        id.0.to_string()
    }
}

impl AsRef<str> for UpstreamId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UpstreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a configured upstream: its id plus the node id allocated on its chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UpstreamIdentity {
    pub id: UpstreamId,
    pub node_id: u8,
}
