//! Lower-bound detection: the oldest height for which an upstream still serves a kind of data.
//!
//! Archive nodes answer for every height, pruned nodes only for recent ones. Each
//! [`LowerBoundProbe`] asks the node about one height and interprets the answer as available,
//! not available (pruned) or inconclusive (an error). The [`LowerBoundDetector`] drives a
//! [`LowerBoundSearch`] per kind on a fixed period and publishes results in [`LowerBounds`].

mod detector;
mod search;

pub use detector::LowerBoundDetector;
pub use search::LowerBoundSearch;

use super::errors::UpstreamError;
use crate::types::{parse_hex_quantity, to_hex_quantity, JsonRpcRequest, JsonRpcResponse};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::{json, Value};
use std::fmt;
use tokio::sync::broadcast;
use tracing::debug;

const BOUNDS_CHANNEL_CAPACITY: usize = 16;

/// Kind of data a lower bound applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LowerBoundKind {
    /// Transactions of a block.
    Tx,
    /// Account state at a block.
    State,
}

impl fmt::Display for LowerBoundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tx => write!(f, "tx"),
            Self::State => write!(f, "state"),
        }
    }
}

/// One detected bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LowerBoundData {
    pub bound: u64,
    pub kind: LowerBoundKind,
    pub detected_at: DateTime<Utc>,
}

/// Latest bound per kind of one upstream, with change notifications.
#[derive(Debug)]
pub struct LowerBounds {
    bounds: DashMap<LowerBoundKind, LowerBoundData>,
    updates_tx: broadcast::Sender<LowerBoundData>,
}

impl Default for LowerBounds {
    fn default() -> Self {
        let (updates_tx, _) = broadcast::channel(BOUNDS_CHANNEL_CAPACITY);
        Self { bounds: DashMap::new(), updates_tx }
    }
}

impl LowerBounds {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a bound and notifies subscribers.
    pub fn update(&self, bound: u64, kind: LowerBoundKind) -> LowerBoundData {
        let data = LowerBoundData { bound, kind, detected_at: Utc::now() };
        if let Some(previous) = self.bounds.insert(kind, data.clone()) {
            if previous.bound != bound {
                debug!(kind = %kind, from = previous.bound, to = bound, "lower bound moved");
            }
        }
        let _ = self.updates_tx.send(data.clone());
        data
    }

    #[must_use]
    pub fn get(&self, kind: LowerBoundKind) -> Option<LowerBoundData> {
        self.bounds.get(&kind).map(|entry| entry.value().clone())
    }

    /// All known bounds, ordered by kind.
    #[must_use]
    pub fn all(&self) -> Vec<LowerBoundData> {
        let mut all: Vec<_> = self.bounds.iter().map(|entry| entry.value().clone()).collect();
        all.sort_by_key(|data| data.kind);
        all
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LowerBoundData> {
        self.updates_tx.subscribe()
    }
}

/// Issues a JSON-RPC call against one upstream.
#[async_trait]
pub trait JsonRpcReader: Send + Sync {
    async fn read(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse, UpstreamError>;
}

/// Checks whether one kind of data exists at a given height.
#[async_trait]
pub trait LowerBoundProbe: Send + Sync + fmt::Debug {
    fn kind(&self) -> LowerBoundKind;

    /// `Ok(true)` if the data is there, `Ok(false)` if the node reports it as pruned.
    ///
    /// # Errors
    ///
    /// Any other failure; the detector treats it as inconclusive.
    async fn probe(&self, reader: &dyn JsonRpcReader, height: u64) -> Result<bool, UpstreamError>;
}

/// Runs `request` and returns its result, or `None` if the node reported the data as missing:
/// either as [`UpstreamError::NotAvailable`] or through an error mentioning `not_available`.
async fn read_result(
    reader: &dyn JsonRpcReader,
    request: JsonRpcRequest,
    not_available: &[&str],
) -> Result<Option<Value>, UpstreamError> {
    let outcome = match reader.read(request).await {
        Ok(JsonRpcResponse { error: Some(error), .. }) => {
            Err(UpstreamError::Rpc { code: error.code, message: error.message })
        }
        Ok(JsonRpcResponse { result, .. }) => Ok(result.unwrap_or(Value::Null)),
        Err(e) => Err(e),
    };

    match outcome {
        Ok(value) => Ok(Some(value)),
        Err(UpstreamError::NotAvailable(_)) => Ok(None),
        Err(e) if e.message_contains_any(not_available) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Transaction data, probed with `eth_getBlockTransactionCountByNumber`.
///
/// A `null` or zero count is read as missing data. Empty blocks therefore look pruned, which
/// the detector compensates for by checking the following heights.
#[derive(Debug, Clone, Copy, Default)]
pub struct TxLowerBoundProbe;

impl TxLowerBoundProbe {
    pub const NO_TX_DATA: &'static str = "No tx data";
}

#[async_trait]
impl LowerBoundProbe for TxLowerBoundProbe {
    fn kind(&self) -> LowerBoundKind {
        LowerBoundKind::Tx
    }

    async fn probe(&self, reader: &dyn JsonRpcReader, height: u64) -> Result<bool, UpstreamError> {
        let request = JsonRpcRequest::new(
            "eth_getBlockTransactionCountByNumber",
            Some(json!([to_hex_quantity(height)])),
            json!(1),
        );

        match read_result(reader, request, &[Self::NO_TX_DATA]).await? {
            None | Some(Value::Null) => Ok(false),
            Some(Value::String(count)) => match parse_hex_quantity(&count) {
                Some(count) => Ok(count > 0),
                None => Err(UpstreamError::InvalidResponse(format!(
                    "transaction count is not a hex quantity: {count}"
                ))),
            },
            Some(other) => Err(UpstreamError::InvalidResponse(format!(
                "unexpected transaction count: {other}"
            ))),
        }
    }
}

/// Account state, probed with `eth_getBalance` of the zero address.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateLowerBoundProbe;

impl StateLowerBoundProbe {
    pub const ZERO_ADDRESS: &'static str = "0x0000000000000000000000000000000000000000";

    /// Error fragments used by common clients for pruned state.
    pub const NOT_AVAILABLE: [&'static str; 4] =
        ["missing trie node", "header not found", "state is not available", "pruned"];
}

#[async_trait]
impl LowerBoundProbe for StateLowerBoundProbe {
    fn kind(&self) -> LowerBoundKind {
        LowerBoundKind::State
    }

    async fn probe(&self, reader: &dyn JsonRpcReader, height: u64) -> Result<bool, UpstreamError> {
        let request = JsonRpcRequest::new(
            "eth_getBalance",
            Some(json!([Self::ZERO_ADDRESS, to_hex_quantity(height)])),
            json!(1),
        );

        let value = read_result(reader, request, &Self::NOT_AVAILABLE).await?;
        Ok(!matches!(value, None | Some(Value::Null)))
    }
}
