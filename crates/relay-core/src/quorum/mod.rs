//! Quorum strategies.
//!
//! A quorum strategy tells the fan-out layer when it has heard enough upstreams to answer a call.
//! Strategies are attached to methods by the call-policy tables in [`crate::methods`]; the
//! per-call bookkeeping lives in [`CallQuorum`].
//!
//! | Strategy        | Resolves on                                   | Keeps sending |
//! |-----------------|-----------------------------------------------|---------------|
//! | `Always`        | first successful response                     | no            |
//! | `Broadcast`     | first successful response                     | yes           |
//! | `NotLagging(n)` | first success from an upstream with lag <= n  | no            |
//! | `NotNull`       | first non-null success                        | no            |

pub mod call;

pub use call::{CallQuorum, QuorumError};

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Policy for accepting responses to a single call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum QuorumStrategy {
    #[default]
    Always,
    Broadcast,
    NotLagging(u64),
    NotNull,
}

impl QuorumStrategy {
    /// Whether a response from an upstream with the given lag may be used.
    #[must_use]
    pub fn accepts_lag(self, lag: u64) -> bool {
        match self {
            Self::NotLagging(max_lag) => lag <= max_lag,
            _ => true,
        }
    }
}

/// Error for unparseable strategy names.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown quorum strategy: {0}")]
pub struct UnknownQuorum(pub String);

impl FromStr for QuorumStrategy {
    type Err = UnknownQuorum;

    /// Accepts `always`, `broadcast`, `not_lagging`, `not_lagging:<n>`, `not_null` and the
    /// `not_empty` alias. Dashes and underscores are interchangeable.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        let (name, arg) = match normalized.split_once(':') {
            Some((name, arg)) => (name.trim().to_string(), Some(arg.trim().to_string())),
            None => (normalized, None),
        };

        match (name.as_str(), arg) {
            ("always", None) => Ok(Self::Always),
            ("broadcast", None) => Ok(Self::Broadcast),
            ("not_null" | "not_empty", None) => Ok(Self::NotNull),
            ("not_lagging", None) => Ok(Self::NotLagging(0)),
            ("not_lagging", Some(lag)) => {
                lag.parse().map(Self::NotLagging).map_err(|_| UnknownQuorum(s.to_string()))
            }
            _ => Err(UnknownQuorum(s.to_string())),
        }
    }
}

impl TryFrom<String> for QuorumStrategy {
    type Error = UnknownQuorum;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<QuorumStrategy> for String {
    fn from(strategy: QuorumStrategy) -> Self {
        strategy.to_string()
    }
}

impl fmt::Display for QuorumStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => f.write_str("always"),
            Self::Broadcast => f.write_str("broadcast"),
            Self::NotLagging(lag) => write!(f, "not_lagging:{lag}"),
            Self::NotNull => f.write_str("not_null"),
        }
    }
}
