//! Transaction builder for swap calls
//!
//! - **call**: encoding of the contract's `swap` operation
//! - **builder**: assembles the unsigned transaction with fresh nonce and fees
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use std::time::Duration;
//! # use swap_engine::tx_builder::{BuilderSettings, TransactionBuilder, DEFAULT_GAS_LIMIT};
//! # async fn example(
//! #     chain: Arc<dyn swap_engine::rpc::ChainClient>,
//! #     request: swap_engine::types::SwapRequest,
//! #     decision: swap_engine::types::RiskDecision,
//! #     sender: solana_sdk::pubkey::Pubkey,
//! # ) -> Result<(), swap_engine::SwapError> {
//! let builder = TransactionBuilder::new(chain, BuilderSettings {
//!     contract: solana_sdk::pubkey::Pubkey::new_unique(),
//!     gas_limit: DEFAULT_GAS_LIMIT,
//!     max_gas_price: None,
//!     rpc_timeout: Duration::from_secs(10),
//! });
//! let unsigned = builder.build(&request, &decision, sender).await?;
//! # Ok(())
//! # }
//! ```

mod builder;
mod call;

pub use builder::{BuilderSettings, TransactionBuilder, DEFAULT_GAS_LIMIT};
pub use call::{swap_discriminator, SwapCall, SWAP_METHOD};
