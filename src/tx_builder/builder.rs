//! Core TransactionBuilder implementation
//!
//! Turns a validated request and its risk decision into an unsigned `swap`
//! call. The nonce and gas price are fetched at build time, each under its
//! own timeout. Callers must hold the sender's critical section (see
//! `engine::sender_lock`) from this call until the transaction is submitted.

use std::sync::Arc;
use std::time::Duration;

use solana_sdk::pubkey::Pubkey;
use tracing::{debug, instrument};

use super::call::SwapCall;
use crate::errors::SwapError;
use crate::metrics::{metrics, Timer};
use crate::rpc::ChainClient;
use crate::types::{FeeParams, RiskDecision, SwapRequest, UnsignedTransaction};

/// Default gas limit for a swap call
pub const DEFAULT_GAS_LIMIT: u64 = 2_000_000;

/// Static builder settings, fixed for the engine's lifetime
#[derive(Debug, Clone)]
pub struct BuilderSettings {
    pub contract: Pubkey,
    pub gas_limit: u64,
    /// Refuse to build when the network gas price exceeds this
    pub max_gas_price: Option<u64>,
    /// Timeout applied independently to the nonce and gas price fetches
    pub rpc_timeout: Duration,
}

/// Builder for unsigned swap transactions
#[derive(Clone)]
pub struct TransactionBuilder {
    chain: Arc<dyn ChainClient>,
    settings: BuilderSettings,
}

impl TransactionBuilder {
    pub fn new(chain: Arc<dyn ChainClient>, settings: BuilderSettings) -> Self {
        Self { chain, settings }
    }

    pub fn settings(&self) -> &BuilderSettings {
        &self.settings
    }

    /// Build with the sender's next nonce as reported by the chain
    pub async fn build(
        &self,
        request: &SwapRequest,
        decision: &RiskDecision,
        sender: Pubkey,
    ) -> Result<UnsignedTransaction, SwapError> {
        self.build_with_nonce_floor(request, decision, sender, None).await
    }

    /// Build with `max(chain_nonce, floor)` as the nonce
    ///
    /// The floor covers nodes whose pending count lags behind a transaction
    /// this process has just submitted.
    #[instrument(skip(self, request, decision), fields(sender = %sender))]
    pub async fn build_with_nonce_floor(
        &self,
        request: &SwapRequest,
        decision: &RiskDecision,
        sender: Pubkey,
        nonce_floor: Option<u64>,
    ) -> Result<UnsignedTransaction, SwapError> {
        let timer = Timer::new();

        let chain_nonce = self.fetch_nonce(&sender).await?;
        let nonce = match nonce_floor {
            Some(floor) if floor > chain_nonce => {
                debug!(chain_nonce, floor, "Chain nonce behind local floor, using floor");
                floor
            }
            _ => chain_nonce,
        };

        let gas_price = self.fetch_gas_price().await?;
        if let Some(cap) = self.settings.max_gas_price {
            if gas_price > cap {
                return Err(SwapError::BuildError(format!(
                    "gas price {} exceeds configured ceiling {}",
                    gas_price, cap
                )));
            }
        }

        let call = SwapCall {
            token_in: *request.token_in(),
            token_out: *request.token_out(),
            amount_in: request.amount_in(),
            min_amount_out: decision.min_out_amount(),
        };

        let tx = UnsignedTransaction {
            contract: self.settings.contract,
            call,
            fees: FeeParams {
                gas_limit: self.settings.gas_limit,
                gas_price,
            },
            sender,
            nonce,
        };

        timer.observe_duration(&metrics().build_latency);
        debug!(nonce, gas_price, min_amount_out = call.min_amount_out, "Built swap transaction");
        Ok(tx)
    }

    async fn fetch_nonce(&self, sender: &Pubkey) -> Result<u64, SwapError> {
        match tokio::time::timeout(self.settings.rpc_timeout, self.chain.next_nonce(sender)).await {
            Ok(Ok(nonce)) => Ok(nonce),
            Ok(Err(e)) => Err(SwapError::BuildError(format!("nonce fetch failed: {}", e))),
            Err(_) => Err(SwapError::BuildError(format!(
                "nonce fetch timed out after {}ms",
                self.settings.rpc_timeout.as_millis()
            ))),
        }
    }

    async fn fetch_gas_price(&self) -> Result<u64, SwapError> {
        match tokio::time::timeout(self.settings.rpc_timeout, self.chain.gas_price()).await {
            Ok(Ok(price)) => Ok(price),
            Ok(Err(e)) => Err(SwapError::BuildError(format!("gas price fetch failed: {}", e))),
            Err(_) => Err(SwapError::BuildError(format!(
                "gas price fetch timed out after {}ms",
                self.settings.rpc_timeout.as_millis()
            ))),
        }
    }
}
