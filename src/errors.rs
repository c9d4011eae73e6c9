//! Error types for the swap execution pipeline
//!
//! Every variant carries enough context (compared values, transaction id) to
//! diagnose a failure without blindly retrying it. Guard rejections are final;
//! only network failures that happen before signing are retryable.

use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

use crate::engine::SwapState;
use crate::types::TransactionId;

/// Why the risk guard refused a swap
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RiskRejection {
    #[error("zero expected output (amount_in={amount_in}, rate={rate})")]
    ZeroExpectedOutput { amount_in: u64, rate: f64 },

    #[error("price impact {price_impact:.6} exceeds limit {max_price_impact:.6} (expected_out={expected_out}, min_amount_out={min_amount_out})")]
    PriceImpactExceeded {
        price_impact: f64,
        max_price_impact: f64,
        expected_out: f64,
        min_amount_out: u64,
    },

    #[error("quote pair {quote_in} -> {quote_out} does not match request pair {request_in} -> {request_out}")]
    QuoteMismatch {
        request_in: Pubkey,
        request_out: Pubkey,
        quote_in: Pubkey,
        quote_out: Pubkey,
    },
}

/// Classified reason a node refused a broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionRejection {
    Malformed,
    InsufficientFunds,
    AlreadyKnown,
    NonceTooLow,
    Network,
    Other,
}

impl SubmissionRejection {
    /// Classify a node error message
    pub fn classify(message: &str) -> Self {
        let msg = message.to_ascii_lowercase();
        if msg.contains("already known") || msg.contains("already imported") || msg.contains("duplicate") {
            Self::AlreadyKnown
        } else if msg.contains("insufficient funds") || msg.contains("insufficient balance") {
            Self::InsufficientFunds
        } else if msg.contains("nonce too low") || msg.contains("replacement transaction underpriced") {
            Self::NonceTooLow
        } else if msg.contains("malformed")
            || msg.contains("invalid")
            || msg.contains("decode")
            || msg.contains("rlp")
        {
            Self::Malformed
        } else {
            Self::Other
        }
    }

    /// Whether the node may already hold a transaction using this nonce
    pub fn may_hold_nonce(&self) -> bool {
        matches!(self, Self::AlreadyKnown)
    }
}

impl std::fmt::Display for SubmissionRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Malformed => "malformed",
            Self::InsufficientFunds => "insufficient_funds",
            Self::AlreadyKnown => "already_known",
            Self::NonceTooLow => "nonce_too_low",
            Self::Network => "network",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

/// Error taxonomy for all swap operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SwapError {
    /// The request itself is invalid; raised before any network call
    #[error("Invalid swap request: {0}")]
    InvalidRequest(String),

    #[error("Quote unavailable for {token_in} -> {token_out}: {reason}")]
    QuoteUnavailable {
        token_in: Pubkey,
        token_out: Pubkey,
        reason: String,
    },

    #[error("Risk rejected: {0}")]
    RiskRejected(RiskRejection),

    /// Nonce or fee parameters could not be fetched, or the payload could not be encoded
    #[error("Build error: {0}")]
    BuildError(String),

    #[error("Signing error: {0}")]
    SigningError(String),

    #[error("Submission rejected ({kind}) for tx {tx_id}: {reason}")]
    SubmissionError {
        tx_id: TransactionId,
        kind: SubmissionRejection,
        reason: String,
    },

    /// The transaction may still land; callers must re-query before deciding
    #[error("No terminal status for tx {tx_id} after {waited_ms}ms")]
    ConfirmationTimeout { tx_id: TransactionId, waited_ms: u64 },

    #[error("Transaction {tx_id} failed on-chain in block {block}")]
    TransactionFailed { tx_id: TransactionId, block: u64 },

    #[error("Swap cancelled before signing")]
    Cancelled,

    /// A signed transaction was (possibly) broadcast but its fate is not known
    #[error("Outcome unknown for tx {tx_id}: {reason}")]
    UnknownOutcome { tx_id: TransactionId, reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SwapError {
    /// Whether a caller may retry with a fresh quote
    ///
    /// Only failures that happen before anything is signed qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::QuoteUnavailable { .. } | Self::BuildError(_))
    }

    /// Transaction id attached to this error, if one exists
    pub fn transaction_id(&self) -> Option<TransactionId> {
        match self {
            Self::SubmissionError { tx_id, .. }
            | Self::ConfirmationTimeout { tx_id, .. }
            | Self::TransactionFailed { tx_id, .. }
            | Self::UnknownOutcome { tx_id, .. } => Some(*tx_id),
            _ => None,
        }
    }

    /// Error category for metrics labels
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::QuoteUnavailable { .. } => "quote",
            Self::RiskRejected(_) => "risk",
            Self::BuildError(_) => "build",
            Self::SigningError(_) => "signing",
            Self::SubmissionError { .. } => "submission",
            Self::ConfirmationTimeout { .. } => "confirmation_timeout",
            Self::TransactionFailed { .. } => "transaction_failed",
            Self::Cancelled => "cancelled",
            Self::UnknownOutcome { .. } => "unknown_outcome",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<RiskRejection> for SwapError {
    fn from(rejection: RiskRejection) -> Self {
        Self::RiskRejected(rejection)
    }
}

/// Terminal failure of a swap execution
///
/// `stage` is the last non-terminal state the engine reached; `terminal` is
/// either [`SwapState::Rejected`] or [`SwapState::Failed`]. When a transaction
/// was signed, its id is always present so the caller can reconcile chain state.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapFailure {
    pub terminal: SwapState,
    pub stage: SwapState,
    pub error: SwapError,
    pub transaction_id: Option<TransactionId>,
}

impl SwapFailure {
    pub fn is_rejected(&self) -> bool {
        self.terminal == SwapState::Rejected
    }

    pub fn is_retryable(&self) -> bool {
        self.error.is_retryable()
    }
}

impl std::fmt::Display for SwapFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "swap {:?} during {:?}: {}", self.terminal, self.stage, self.error)?;
        if let Some(id) = &self.transaction_id {
            write!(f, " (tx {})", id)?;
        }
        Ok(())
    }
}

impl std::error::Error for SwapFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
