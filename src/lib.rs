//! Swap Execution Engine Library
//!
//! Executes token swaps against an on-chain swap contract behind a risk
//! guard. A request is quoted, checked for price impact, built with a fresh
//! nonce, signed by an external signer, broadcast, and tracked to a terminal
//! state.

pub mod advisory;
pub mod config;
pub mod endpoints;
pub mod engine;
pub mod errors;
pub mod metrics;
pub mod observability;
pub mod oracle;
pub mod retry;
pub mod risk;
pub mod rpc;
pub mod signer;
pub mod structured_logging;
pub mod submitter;
pub mod test_utils;
pub mod tx_builder;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use engine::{CancelToken, EngineSettings, SwapExecutionEngine, SwapState};
pub use errors::{RiskRejection, SubmissionRejection, SwapError, SwapFailure};
pub use retry::RetryPolicy;
pub use solana_sdk::{pubkey::Pubkey, signature::Signature};
pub use types::{
    PriceQuote, RiskDecision, SwapReceipt, SwapRequest, SwapRequestBuilder, TransactionId,
};

#[cfg(test)]
mod tests {
    mod engine_tests;
    mod nonce_concurrency_tests;
}
