//! Structured logging for swap lifecycle events
//!
//! All events carry the swap's correlation id. Signed bytes and key material
//! never reach these functions.

use crate::engine::SwapState;
use crate::errors::SwapError;
use crate::observability::CorrelationId;
use crate::types::{Address, PriceQuote, RiskDecision, SwapReceipt, SwapRequest, TransactionId};

/// Structured logger for one swap execution
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    context_id: CorrelationId,
}

impl StructuredLogger {
    pub fn new(context_id: CorrelationId) -> Self {
        Self { context_id }
    }

    pub fn context_id(&self) -> &CorrelationId {
        &self.context_id
    }

    pub fn log_request(&self, request: &SwapRequest, sender: &Address) {
        tracing::info!(
            context_id = %self.context_id,
            sender = %sender,
            token_in = %request.token_in(),
            token_out = %request.token_out(),
            amount_in = request.amount_in(),
            min_amount_out = request.min_amount_out(),
            "Swap requested"
        );
    }

    pub fn log_transition(&self, from: SwapState, to: SwapState) {
        tracing::debug!(
            context_id = %self.context_id,
            from = ?from,
            to = ?to,
            "Swap state transition"
        );
    }

    pub fn log_quote(&self, quote: &PriceQuote) {
        tracing::debug!(
            context_id = %self.context_id,
            rate = quote.rate,
            source = %quote.source,
            "Quote received"
        );
    }

    pub fn log_risk_passed(&self, decision: &RiskDecision) {
        tracing::debug!(
            context_id = %self.context_id,
            expected_out = decision.expected_out,
            adjusted_min_out = decision.adjusted_min_out,
            price_impact = decision.price_impact,
            "Risk check passed"
        );
    }

    pub fn log_rejection(&self, error: &SwapError) {
        tracing::warn!(
            context_id = %self.context_id,
            error = %error,
            "Swap rejected by risk guard"
        );
    }

    pub fn log_submitted(&self, tx_id: &TransactionId, nonce: u64) {
        tracing::info!(
            context_id = %self.context_id,
            tx_id = %tx_id,
            nonce,
            "Swap transaction submitted"
        );
    }

    pub fn log_confirmed(&self, receipt: &SwapReceipt, latency_ms: u64) {
        tracing::info!(
            context_id = %self.context_id,
            tx_id = %receipt.transaction_id,
            block = receipt.block,
            latency_ms,
            "Swap confirmed"
        );
    }

    pub fn log_failure(&self, stage: SwapState, error: &SwapError, latency_ms: u64) {
        tracing::warn!(
            context_id = %self.context_id,
            stage = ?stage,
            category = error.category(),
            tx_id = ?error.transaction_id(),
            error = %error,
            latency_ms,
            "Swap failed"
        );
    }
}
