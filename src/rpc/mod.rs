//! Chain RPC boundary
//!
//! The engine talks to the chain only through [`ChainClient`]. Responses are
//! treated as opaque until parsed into nonce, fee, or status values.

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;

use crate::types::TransactionId;

pub mod json_rpc;
pub mod rpc_errors;

pub use json_rpc::JsonRpcChainClient;
pub use rpc_errors::RpcError;

/// Terminal status reported by the chain for a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainStatus {
    pub success: bool,
    pub block: u64,
}

/// Request/response access to the chain
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Next unused nonce for `account`, counting pending transactions
    async fn next_nonce(&self, account: &Pubkey) -> Result<u64, RpcError>;

    /// Current network gas price
    async fn gas_price(&self) -> Result<u64, RpcError>;

    /// Broadcast a signed transaction; returns the id reported by the node
    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<String, RpcError>;

    /// Terminal status of a transaction, `None` while still pending
    async fn transaction_status(&self, id: &TransactionId) -> Result<Option<ChainStatus>, RpcError>;
}
