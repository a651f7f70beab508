// SPDX-License-Identifier: BUSL-1.1
//! Client error types for the workflow API.

use uuid::Uuid;

/// Errors from workflow API calls.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The client could not be constructed from its configuration.
    #[error("client configuration error: {0}")]
    Config(String),

    /// HTTP transport error.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },

    /// The API returned a structured error response.
    #[error("workflow API {endpoint} returned {status} {code}: {message}")]
    Api {
        endpoint: String,
        status: u16,
        /// Machine-readable code from the error body (e.g. "AMOUNT_MISMATCH").
        code: String,
        message: String,
        /// Whether the server marked the failure retryable.
        retryable: bool,
    },

    /// The policy gate blocked the action. Terminal for this `action_id`.
    #[error("action blocked by policy rule {rule:?} (trace {trace_id})")]
    Blocked {
        rule: Option<String>,
        trace_id: Uuid,
    },

    /// Response deserialization failed.
    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialization {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    /// The payment signer could not produce an instrument.
    #[error("payment signer failed: {0}")]
    Signer(String),

    /// All retry attempts were exhausted.
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

impl ClientError {
    /// Whether retrying the same request (same `action_id`) can succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { .. } => true,
            Self::Api { retryable, status, .. } => *retryable || *status >= 500,
            Self::Config(_)
            | Self::Blocked { .. }
            | Self::Deserialization { .. }
            | Self::Signer(_)
            | Self::RetriesExhausted { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_retryability_follows_server_flag() {
        let retryable = ClientError::Api {
            endpoint: "/v1/actions/a-1/pay".into(),
            status: 502,
            code: "PAYMENT_RAIL_ERROR".into(),
            message: "rail outage".into(),
            retryable: true,
        };
        assert!(retryable.is_retryable());

        let rejected = ClientError::Api {
            endpoint: "/v1/actions/a-1/pay".into(),
            status: 422,
            code: "AMOUNT_MISMATCH".into(),
            message: "expected 50.00 USD".into(),
            retryable: false,
        };
        assert!(!rejected.is_retryable());
    }

    #[test]
    fn blocked_is_never_retryable() {
        let err = ClientError::Blocked {
            rule: Some("amount-cap".into()),
            trace_id: Uuid::new_v4(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn five_hundreds_are_retryable_even_unflagged() {
        let err = ClientError::Api {
            endpoint: "/v1/actions/a-1/execute".into(),
            status: 503,
            code: "POLICY_GATE_UNAVAILABLE".into(),
            message: "gate down".into(),
            retryable: false,
        };
        assert!(err.is_retryable());
    }
}
