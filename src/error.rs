use serde::{Deserialize, Serialize};
use std::fmt;

/// Classified failure of a single gateway call
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GatewayError {
    /// Retryable: rate limiting, timeouts, server-side hiccups
    #[error("transient gateway error: {0}")]
    Transient(String),

    /// Not retryable: bad credentials, unknown model, malformed request
    #[error("fatal gateway error: {0}")]
    Fatal(String),
}

impl GatewayError {
    pub fn kind(&self) -> FailureKind {
        match self {
            GatewayError::Transient(_) => FailureKind::Transient,
            GatewayError::Fatal(_) => FailureKind::Fatal,
        }
    }
}

/// Kind of the last error seen by the retrier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Transient,
    Fatal,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Transient => write!(f, "transient"),
            FailureKind::Fatal => write!(f, "fatal"),
        }
    }
}

/// Why an item did not contribute to a task result
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SkipReason {
    #[error("item {item_id} is missing required field `{field}`")]
    MalformedItem { item_id: String, field: &'static str },

    #[error("{kind} gateway failure after {attempts} attempt(s)")]
    Gateway { kind: FailureKind, attempts: u32 },

    #[error("gateway returned an empty response")]
    EmptyResponse,
}

/// Error raised when a result matrix is asked to overwrite a triple
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordError {
    #[error("result for ({model}, {task}, {technique}) was already recorded")]
    Duplicate {
        model: String,
        task: String,
        technique: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_error_kind() {
        assert_eq!(
            GatewayError::Transient("429".to_string()).kind(),
            FailureKind::Transient
        );
        assert_eq!(
            GatewayError::Fatal("bad key".to_string()).kind(),
            FailureKind::Fatal
        );
    }

    #[test]
    fn test_skip_reason_messages() {
        let reason = SkipReason::MalformedItem {
            item_id: "qa-3".to_string(),
            field: "question",
        };
        assert_eq!(
            reason.to_string(),
            "item qa-3 is missing required field `question`"
        );

        let reason = SkipReason::Gateway {
            kind: FailureKind::Transient,
            attempts: 3,
        };
        assert_eq!(reason.to_string(), "transient gateway failure after 3 attempt(s)");
    }
}
