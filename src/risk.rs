//! Pre-signing risk guard
//!
//! Pure function of the request and the quote: no I/O, no hidden state. The
//! engine always runs it before a transaction is built, so a rejection has no
//! side effects.
//!
//! Price impact is computed against the caller's `min_amount_out`, not against
//! an independently estimated post-fee output. This keeps the literal formula
//! the bot has always used.

use crate::errors::RiskRejection;
use crate::types::{PriceQuote, RiskDecision, SwapRequest};

/// Tolerance for float representation error at the impact boundary
const IMPACT_EPSILON: f64 = 1e-12;

/// `(expected_out - min_amount_out) / expected_out`
///
/// Negative when the guaranteed minimum is above the expected output.
pub fn price_impact(expected_out: f64, min_amount_out: f64) -> f64 {
    (expected_out - min_amount_out) / expected_out
}

/// Slippage and price impact validator
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskGuard;

impl RiskGuard {
    pub fn new() -> Self {
        Self
    }

    /// Validate a proposed swap against its quote
    ///
    /// Accepts iff `price_impact <= max_price_impact`; the boundary itself is
    /// accepted.
    pub fn validate(
        &self,
        request: &SwapRequest,
        quote: &PriceQuote,
    ) -> Result<RiskDecision, RiskRejection> {
        if quote.token_in != *request.token_in() || quote.token_out != *request.token_out() {
            return Err(RiskRejection::QuoteMismatch {
                request_in: *request.token_in(),
                request_out: *request.token_out(),
                quote_in: quote.token_in,
                quote_out: quote.token_out,
            });
        }

        let expected_out = request.amount_in() as f64 * quote.rate;
        if !expected_out.is_finite() || expected_out <= 0.0 {
            return Err(RiskRejection::ZeroExpectedOutput {
                amount_in: request.amount_in(),
                rate: quote.rate,
            });
        }

        let min_out = request.min_amount_out() as f64;
        let adjusted_min_out = min_out * (1.0 - request.slippage_tolerance());
        let impact = price_impact(expected_out, min_out);

        if impact > request.max_price_impact() + IMPACT_EPSILON {
            return Err(RiskRejection::PriceImpactExceeded {
                price_impact: impact,
                max_price_impact: request.max_price_impact(),
                expected_out,
                min_amount_out: request.min_amount_out(),
            });
        }

        Ok(RiskDecision {
            expected_out,
            adjusted_min_out,
            price_impact: impact,
            rate: quote.rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use solana_sdk::pubkey::Pubkey;

    fn request(amount_in: u64, min_out: u64, slippage: f64, max_impact: f64) -> (SwapRequest, Pubkey, Pubkey) {
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();
        (
            SwapRequest::new(a, b, amount_in, min_out, slippage, max_impact).unwrap(),
            a,
            b,
        )
    }

    #[test]
    fn test_boundary_impact_accepted() {
        let (req, a, b) = request(100, 95, 0.01, 0.05);
        let quote = PriceQuote::new(a, b, 1.0, "test").unwrap();

        let decision = RiskGuard::new().validate(&req, &quote).unwrap();
        assert_eq!(decision.expected_out, 100.0);
        assert!((decision.price_impact - 0.05).abs() < 1e-12);
        assert!((decision.adjusted_min_out - 94.05).abs() < 1e-9);
        assert_eq!(decision.rate, 1.0);
    }

    #[test]
    fn test_excess_impact_rejected() {
        let (req, a, b) = request(100, 80, 0.01, 0.05);
        let quote = PriceQuote::new(a, b, 1.0, "test").unwrap();

        match RiskGuard::new().validate(&req, &quote) {
            Err(RiskRejection::PriceImpactExceeded {
                price_impact,
                max_price_impact,
                ..
            }) => {
                assert!((price_impact - 0.20).abs() < 1e-12);
                assert_eq!(max_price_impact, 0.05);
            }
            other => panic!("expected price impact rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_negative_impact_accepted() {
        // Minimum above expected output: better than expected, not guarded
        let (req, a, b) = request(100, 120, 0.0, 0.0);
        let quote = PriceQuote::new(a, b, 1.0, "test").unwrap();

        let decision = RiskGuard::new().validate(&req, &quote).unwrap();
        assert!(decision.price_impact < 0.0);
    }

    #[test]
    fn test_zero_expected_output_rejected() {
        let (req, a, b) = request(100, 0, 0.0, 0.5);
        // Bypasses PriceQuote::new, which would refuse the rate outright
        let quote = PriceQuote {
            token_in: a,
            token_out: b,
            rate: 0.0,
            timestamp: chrono::Utc::now(),
            source: "test".to_string(),
        };
        assert!(matches!(
            RiskGuard::new().validate(&req, &quote),
            Err(RiskRejection::ZeroExpectedOutput { amount_in: 100, .. })
        ));
    }

    #[test]
    fn test_quote_pair_mismatch_rejected() {
        let (req, a, _) = request(100, 95, 0.01, 0.05);
        let quote = PriceQuote::new(a, Pubkey::new_unique(), 1.0, "test").unwrap();
        assert!(matches!(
            RiskGuard::new().validate(&req, &quote),
            Err(RiskRejection::QuoteMismatch { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_impact_matches_formula(
            amount_in in 1u64..10_000_000,
            min_out in 0u64..10_000_000,
            rate in 0.0001f64..1000.0,
        ) {
            let (req, a, b) = request(amount_in, min_out, 0.01, 0.99);
            let quote = PriceQuote::new(a, b, rate, "prop").unwrap();
            let expected = amount_in as f64 * rate;
            let impact = (expected - min_out as f64) / expected;

            match RiskGuard::new().validate(&req, &quote) {
                Ok(decision) => {
                    prop_assert_eq!(decision.price_impact, impact);
                    prop_assert_eq!(decision.expected_out, expected);
                }
                Err(RiskRejection::PriceImpactExceeded { price_impact, .. }) => {
                    prop_assert_eq!(price_impact, impact);
                }
                Err(other) => prop_assert!(false, "unexpected rejection {:?}", other),
            }
        }

        #[test]
        fn prop_rejects_iff_impact_exceeds_limit(
            amount_in in 1u64..1_000_000,
            min_out in 0u64..1_000_000,
            rate in 0.01f64..100.0,
            max_impact in 0.0f64..0.99,
        ) {
            let (req, a, b) = request(amount_in, min_out, 0.0, max_impact);
            let quote = PriceQuote::new(a, b, rate, "prop").unwrap();
            let expected = amount_in as f64 * rate;
            let impact = price_impact(expected, min_out as f64);

            let result = RiskGuard::new().validate(&req, &quote);
            prop_assert_eq!(result.is_err(), impact > max_impact + IMPACT_EPSILON);
        }
    }
}
