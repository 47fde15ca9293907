use thiserror::Error;

/// Errors raised while configuring an upstream or talking to it.
///
/// Configuration errors (`InvalidUpstreamId`, `NodeIdSpaceExhausted`) are fatal for the upstream
/// being built. The remaining variants describe a single failed call and are handled by whoever
/// issued it; the lower-bound detector, for example, inspects the message to tell
/// "data is pruned" apart from a transport hiccup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UpstreamError {
    #[error("Invalid upstream id: {0:?}")]
    InvalidUpstreamId(String),

    #[error("Node id space exhausted: all {0} ids are already assigned")]
    NodeIdSpaceExhausted(usize),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i32, message: String },

    #[error("Request timeout")]
    Timeout,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Data not available: {0}")]
    NotAvailable(String),
}

impl UpstreamError {
    /// Returns `true` for errors that should abort building the upstream.
    #[must_use]
    pub fn is_configuration_fatal(&self) -> bool {
        matches!(self, Self::InvalidUpstreamId(_) | Self::NodeIdSpaceExhausted(_))
    }

    /// Returns `true` for errors that are likely to disappear on retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::ConnectionFailed(_))
    }

    /// Case-insensitive search for any of `needles` in the error text.
    ///
    /// Nodes report pruned history through free-form messages, so callers match on fragments
    /// such as `"missing trie node"` rather than on codes.
    #[must_use]
    pub fn message_contains_any(&self, needles: &[&str]) -> bool {
        let text = match self {
            Self::Rpc { message, .. } |
            Self::InvalidResponse(message) |
            Self::NotAvailable(message) => message.to_lowercase(),
            other => other.to_string().to_lowercase(),
        };
        needles.iter().any(|needle| text.contains(&needle.to_lowercase()))
    }
}
