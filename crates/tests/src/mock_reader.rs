//! Simulated archive or pruned node answering lower-bound probes.

use async_trait::async_trait;
use parking_lot::Mutex;
use relay_core::{
    types::{parse_hex_quantity, JsonRpcError, JsonRpcRequest, JsonRpcResponse},
    upstream::{JsonRpcReader, UpstreamError},
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Node keeping transactions from `first_tx_block` and state from `first_state_block`.
///
/// The pruning point can be moved while a detector is running to simulate a node that keeps
/// pruning old data.
pub struct MockNode {
    first_tx_block: Mutex<u64>,
    first_state_block: Mutex<u64>,
    calls: AtomicUsize,
}

impl MockNode {
    pub fn new(first_tx_block: u64, first_state_block: u64) -> Self {
        Self {
            first_tx_block: Mutex::new(first_tx_block),
            first_state_block: Mutex::new(first_state_block),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn prune_to(&self, first_block: u64) {
        *self.first_tx_block.lock() = first_block;
        *self.first_state_block.lock() = first_block;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JsonRpcReader for MockNode {
    async fn read(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let height = request
            .params
            .as_ref()
            .and_then(|p| p.as_array())
            .and_then(|p| p.last())
            .and_then(|h| h.as_str())
            .and_then(parse_hex_quantity)
            .ok_or(UpstreamError::InvalidResponse("missing height".to_string()))?;

        let id = request.id;
        let response = match request.method.as_str() {
            "eth_getBlockTransactionCountByNumber" if height < *self.first_tx_block.lock() => {
                JsonRpcResponse::error(JsonRpcError::new(-32000, "No tx data"), id)
            }
            "eth_getBlockTransactionCountByNumber" => JsonRpcResponse::success(json!("0x3"), id),
            "eth_getBalance" if height < *self.first_state_block.lock() => JsonRpcResponse::error(
                JsonRpcError::new(-32000, "header not found"),
                id,
            ),
            "eth_getBalance" => JsonRpcResponse::success(json!("0x0"), id),
            other => return Err(UpstreamError::NotAvailable(other.to_string())),
        };
        Ok(response)
    }
}
