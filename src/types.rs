//! Common types used throughout the swap pipeline
//!
//! Each stage consumes the previous one and produces the next:
//! `SwapRequest -> (PriceQuote, RiskDecision) -> UnsignedTransaction ->
//! SignedTransaction -> SwapReceipt`. No stage keeps a reference to an
//! earlier one; the few values needed downstream (rate, nonce) are copied.

use chrono::{DateTime, Utc};
use serde::Serialize;
use solana_sdk::{pubkey::Pubkey, signature::Signature};

use crate::errors::SwapError;
use crate::tx_builder::SwapCall;

/// Token and contract address type
pub type Address = Pubkey;

/// Transaction identifier: the signature over the transaction message
pub type TransactionId = Signature;

/// Default slippage tolerance (1%)
pub const DEFAULT_SLIPPAGE: f64 = 0.01;

/// Default price impact ceiling (5%)
pub const DEFAULT_MAX_PRICE_IMPACT: f64 = 0.05;

/// Immutable swap request
///
/// Only constructible through [`SwapRequest::new`] or [`SwapRequestBuilder`],
/// both of which validate every field. An invalid request can therefore never
/// reach the price oracle.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapRequest {
    token_in: Address,
    token_out: Address,
    amount_in: u64,
    min_amount_out: u64,
    slippage_tolerance: f64,
    max_price_impact: f64,
}

impl SwapRequest {
    /// Create a validated swap request
    pub fn new(
        token_in: Address,
        token_out: Address,
        amount_in: u64,
        min_amount_out: u64,
        slippage_tolerance: f64,
        max_price_impact: f64,
    ) -> Result<Self, SwapError> {
        if amount_in == 0 {
            return Err(SwapError::InvalidRequest(
                "amount_in must be greater than zero".to_string(),
            ));
        }
        if token_in == token_out {
            return Err(SwapError::InvalidRequest(format!(
                "token_in and token_out are the same token ({})",
                token_in
            )));
        }
        validate_fraction("slippage_tolerance", slippage_tolerance)?;
        validate_fraction("max_price_impact", max_price_impact)?;

        Ok(Self {
            token_in,
            token_out,
            amount_in,
            min_amount_out,
            slippage_tolerance,
            max_price_impact,
        })
    }

    /// Start a builder seeded with the default slippage and price impact limits
    pub fn builder(token_in: Address, token_out: Address, amount_in: u64) -> SwapRequestBuilder {
        SwapRequestBuilder::new(token_in, token_out, amount_in)
    }

    pub fn token_in(&self) -> &Address {
        &self.token_in
    }

    pub fn token_out(&self) -> &Address {
        &self.token_out
    }

    pub fn amount_in(&self) -> u64 {
        self.amount_in
    }

    pub fn min_amount_out(&self) -> u64 {
        self.min_amount_out
    }

    pub fn slippage_tolerance(&self) -> f64 {
        self.slippage_tolerance
    }

    pub fn max_price_impact(&self) -> f64 {
        self.max_price_impact
    }
}

/// Fractions must be finite and lie in [0, 1)
fn validate_fraction(name: &str, value: f64) -> Result<(), SwapError> {
    if !value.is_finite() || !(0.0..1.0).contains(&value) {
        return Err(SwapError::InvalidRequest(format!(
            "{} must be a fraction in [0, 1), got {}",
            name, value
        )));
    }
    Ok(())
}

/// Builder for [`SwapRequest`]
///
/// Slippage and price impact default to [`DEFAULT_SLIPPAGE`] and
/// [`DEFAULT_MAX_PRICE_IMPACT`] unless overridden, either directly or from the
/// trading section of the configuration.
#[derive(Debug, Clone)]
pub struct SwapRequestBuilder {
    token_in: Address,
    token_out: Address,
    amount_in: u64,
    min_amount_out: u64,
    slippage_tolerance: f64,
    max_price_impact: f64,
}

impl SwapRequestBuilder {
    pub fn new(token_in: Address, token_out: Address, amount_in: u64) -> Self {
        Self {
            token_in,
            token_out,
            amount_in,
            min_amount_out: 0,
            slippage_tolerance: DEFAULT_SLIPPAGE,
            max_price_impact: DEFAULT_MAX_PRICE_IMPACT,
        }
    }

    /// Apply the configured defaults for slippage and price impact
    pub fn with_trading_defaults(mut self, trading: &crate::config::TradingConfig) -> Self {
        self.slippage_tolerance = trading.default_slippage;
        self.max_price_impact = trading.max_price_impact;
        self
    }

    pub fn min_amount_out(mut self, min_amount_out: u64) -> Self {
        self.min_amount_out = min_amount_out;
        self
    }

    pub fn slippage_tolerance(mut self, slippage_tolerance: f64) -> Self {
        self.slippage_tolerance = slippage_tolerance;
        self
    }

    pub fn max_price_impact(mut self, max_price_impact: f64) -> Self {
        self.max_price_impact = max_price_impact;
        self
    }

    pub fn build(self) -> Result<SwapRequest, SwapError> {
        SwapRequest::new(
            self.token_in,
            self.token_out,
            self.amount_in,
            self.min_amount_out,
            self.slippage_tolerance,
            self.max_price_impact,
        )
    }
}

/// Exchange rate for a token pair, fetched fresh for every request
#[derive(Debug, Clone, PartialEq)]
pub struct PriceQuote {
    pub token_in: Address,
    pub token_out: Address,
    /// Units of `token_out` received per unit of `token_in`
    pub rate: f64,
    pub timestamp: DateTime<Utc>,
    /// Where the rate came from (e.g. "jupiter", "static")
    pub source: String,
}

impl PriceQuote {
    /// Create a quote, rejecting zero, negative and non-finite rates
    pub fn new(
        token_in: Address,
        token_out: Address,
        rate: f64,
        source: impl Into<String>,
    ) -> Result<Self, SwapError> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(SwapError::QuoteUnavailable {
                token_in,
                token_out,
                reason: format!("unusable rate {}", rate),
            });
        }
        Ok(Self {
            token_in,
            token_out,
            rate,
            timestamp: Utc::now(),
            source: source.into(),
        })
    }
}

/// Result of a passing risk check. Derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskDecision {
    pub expected_out: f64,
    pub adjusted_min_out: f64,
    pub price_impact: f64,
    /// Rate of the quote the decision was made on
    pub rate: f64,
}

impl RiskDecision {
    /// Minimum output as an on-chain integer amount.
    ///
    /// Rounded down; the fractional part is already inside the slippage
    /// allowance the caller agreed to.
    pub fn min_out_amount(&self) -> u64 {
        self.adjusted_min_out.floor() as u64
    }
}

/// Network fee parameters attached to a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeeParams {
    pub gas_limit: u64,
    pub gas_price: u64,
}

/// Unsigned call to the swap contract's `swap` operation
#[derive(Debug, Clone, PartialEq)]
pub struct UnsignedTransaction {
    pub contract: Address,
    pub call: SwapCall,
    pub fees: FeeParams,
    pub sender: Address,
    pub nonce: u64,
}

/// Wire layout of the message that gets signed
#[derive(Serialize)]
struct TransactionMessage<'a> {
    sender: &'a Address,
    nonce: u64,
    contract: &'a Address,
    gas_limit: u64,
    gas_price: u64,
    data: Vec<u8>,
}

impl UnsignedTransaction {
    /// Serialize the message bytes covered by the signature
    pub fn message_bytes(&self) -> Result<Vec<u8>, SwapError> {
        let message = TransactionMessage {
            sender: &self.sender,
            nonce: self.nonce,
            contract: &self.contract,
            gas_limit: self.fees.gas_limit,
            gas_price: self.fees.gas_price,
            data: self.call.encode()?,
        };
        bincode::serialize(&message)
            .map_err(|e| SwapError::BuildError(format!("failed to encode message: {}", e)))
    }
}

/// Signed transaction ready for broadcast
///
/// Owned by the submitter until broadcast. The raw bytes are never printed.
#[derive(Clone, PartialEq)]
pub struct SignedTransaction {
    id: TransactionId,
    raw: Vec<u8>,
    sender: Address,
    nonce: u64,
}

impl SignedTransaction {
    pub fn new(id: TransactionId, raw: Vec<u8>, sender: Address, nonce: u64) -> Self {
        Self {
            id,
            raw,
            sender,
            nonce,
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn sender(&self) -> &Address {
        &self.sender
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }
}

impl std::fmt::Debug for SignedTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedTransaction")
            .field("id", &self.id)
            .field("sender", &self.sender)
            .field("nonce", &self.nonce)
            .field("raw_len", &self.raw.len())
            .finish()
    }
}

/// Terminal on-chain status of a submitted transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReceiptStatus {
    Confirmed,
    Failed,
}

/// Terminal record of a swap, immutable once produced
#[derive(Debug, Clone, PartialEq)]
pub struct SwapReceipt {
    pub transaction_id: TransactionId,
    pub status: ReceiptStatus,
    /// Block (or slot) the transaction landed in
    pub block: u64,
}

impl SwapReceipt {
    pub fn is_confirmed(&self) -> bool {
        self.status == ReceiptStatus::Confirmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> (Address, Address) {
        (Pubkey::new_unique(), Pubkey::new_unique())
    }

    #[test]
    fn test_zero_amount_rejected() {
        let (a, b) = pair();
        let err = SwapRequest::new(a, b, 0, 95, 0.01, 0.05).unwrap_err();
        assert!(matches!(err, SwapError::InvalidRequest(_)));
    }

    #[test]
    fn test_fraction_bounds() {
        let (a, b) = pair();
        assert!(SwapRequest::new(a, b, 100, 95, 0.0, 0.0).is_ok());
        assert!(SwapRequest::new(a, b, 100, 95, 1.0, 0.05).is_err());
        assert!(SwapRequest::new(a, b, 100, 95, 0.01, -0.1).is_err());
        assert!(SwapRequest::new(a, b, 100, 95, f64::NAN, 0.05).is_err());
    }

    #[test]
    fn test_same_token_rejected() {
        let a = Pubkey::new_unique();
        assert!(SwapRequest::new(a, a, 100, 95, 0.01, 0.05).is_err());
    }

    #[test]
    fn test_builder_defaults() {
        let (a, b) = pair();
        let request = SwapRequest::builder(a, b, 100).min_amount_out(95).build().unwrap();
        assert_eq!(request.slippage_tolerance(), DEFAULT_SLIPPAGE);
        assert_eq!(request.max_price_impact(), DEFAULT_MAX_PRICE_IMPACT);
        assert_eq!(request.min_amount_out(), 95);
    }

    #[test]
    fn test_quote_rejects_bad_rates() {
        let (a, b) = pair();
        assert!(PriceQuote::new(a, b, 0.0, "test").is_err());
        assert!(PriceQuote::new(a, b, -1.5, "test").is_err());
        assert!(PriceQuote::new(a, b, f64::INFINITY, "test").is_err());
        assert!(PriceQuote::new(a, b, 1.25, "test").is_ok());
    }

    #[test]
    fn test_min_out_amount_rounds_down() {
        let decision = RiskDecision {
            expected_out: 100.0,
            adjusted_min_out: 94.05,
            price_impact: 0.05,
            rate: 1.0,
        };
        assert_eq!(decision.min_out_amount(), 94);
    }

    #[test]
    fn test_signed_transaction_debug_hides_bytes() {
        let tx = SignedTransaction::new(
            Signature::from([7u8; 64]),
            vec![0xAB; 128],
            Pubkey::new_unique(),
            3,
        );
        let rendered = format!("{:?}", tx);
        assert!(rendered.contains("raw_len: 128"));
        assert!(!rendered.contains("raw:"));
    }
}
