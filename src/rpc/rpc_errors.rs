use thiserror::Error;

use crate::errors::SubmissionRejection;

/// Chain RPC error types
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RpcError {
    /// No connection could be made; the request never left this process
    #[error("Connect error: {message} (endpoint: {endpoint})")]
    Connect { endpoint: String, message: String },

    /// Transport failure after the request may have been written
    #[error("Transport error: {message} (endpoint: {endpoint})")]
    Transport { endpoint: String, message: String },

    /// Non-success HTTP status from the node or a gateway in front of it
    #[error("HTTP {status} from {endpoint}")]
    HttpStatus { endpoint: String, status: u16 },

    /// Timeout errors
    #[error("Timeout after {timeout_ms}ms (endpoint: {endpoint}, method: {method})")]
    Timeout {
        endpoint: String,
        method: String,
        timeout_ms: u64,
    },

    /// Error object returned by the node
    #[error("RPC response error: {message} (endpoint: {endpoint}, code: {code:?})")]
    RpcResponse {
        endpoint: String,
        message: String,
        code: Option<i64>,
    },

    /// The node answered but the payload could not be parsed
    #[error("Invalid response from {endpoint}: {message}")]
    InvalidResponse { endpoint: String, message: String },
}

impl RpcError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            RpcError::Connect { .. } => true,
            RpcError::Transport { .. } => true,
            RpcError::Timeout { .. } => true,
            RpcError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            // -32603 is the JSON-RPC internal error
            RpcError::RpcResponse { code, .. } => *code == Some(-32603),
            RpcError::InvalidResponse { .. } => false,
        }
    }

    /// Whether the request might have reached the node before failing
    ///
    /// Only a JSON-RPC error object, a connect failure or a 4xx status is an
    /// explicit answer that nothing was accepted.
    pub fn is_ambiguous(&self) -> bool {
        match self {
            RpcError::Connect { .. } | RpcError::RpcResponse { .. } => false,
            RpcError::HttpStatus { status, .. } => *status >= 500,
            RpcError::Transport { .. } | RpcError::Timeout { .. } | RpcError::InvalidResponse { .. } => true,
        }
    }

    /// Classify a broadcast failure
    pub fn rejection_kind(&self) -> SubmissionRejection {
        match self {
            RpcError::RpcResponse { message, .. } => SubmissionRejection::classify(message),
            RpcError::Connect { .. }
            | RpcError::Transport { .. }
            | RpcError::Timeout { .. }
            | RpcError::HttpStatus { .. } => SubmissionRejection::Network,
            RpcError::InvalidResponse { .. } => SubmissionRejection::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        let refused = RpcError::Connect {
            endpoint: "http://node".to_string(),
            message: "connection refused".to_string(),
        };
        assert!(refused.is_retryable());
        assert!(!refused.is_ambiguous());

        let timeout = RpcError::Timeout {
            endpoint: "http://node".to_string(),
            method: "eth_sendRawTransaction".to_string(),
            timeout_ms: 5000,
        };
        assert!(timeout.is_retryable());
        assert!(timeout.is_ambiguous());

        let rejected = RpcError::RpcResponse {
            endpoint: "http://node".to_string(),
            message: "nonce too low".to_string(),
            code: Some(-32000),
        };
        assert!(!rejected.is_retryable());
        assert_eq!(rejected.rejection_kind(), SubmissionRejection::NonceTooLow);
    }

    #[test]
    fn test_failures_after_send_are_ambiguous() {
        let endpoint = "http://node".to_string();
        let bad_gateway = RpcError::HttpStatus {
            endpoint: endpoint.clone(),
            status: 502,
        };
        assert!(bad_gateway.is_ambiguous());
        assert!(bad_gateway.is_retryable());

        let reset = RpcError::Transport {
            endpoint: endpoint.clone(),
            message: "connection reset by peer".to_string(),
        };
        assert!(reset.is_ambiguous());

        let garbled = RpcError::InvalidResponse {
            endpoint: endpoint.clone(),
            message: "eth_sendRawTransaction returned unparseable body".to_string(),
        };
        assert!(garbled.is_ambiguous());

        let forbidden = RpcError::HttpStatus {
            endpoint: endpoint.clone(),
            status: 403,
        };
        assert!(!forbidden.is_ambiguous());
        assert!(!forbidden.is_retryable());

        let node_error = RpcError::RpcResponse {
            endpoint,
            message: "insufficient funds".to_string(),
            code: Some(-32000),
        };
        assert!(!node_error.is_ambiguous());
    }
}
