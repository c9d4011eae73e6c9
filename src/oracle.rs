//! Price oracle
//!
//! Answers "how many `token_out` per `token_in` right now". Quotes are never
//! cached across requests: the price can move between quote and execution, and
//! the risk guard is only meaningful on a fresh rate.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::errors::SwapError;
use crate::types::PriceQuote;

/// Source of exchange rates
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// Fetch a fresh quote; fails with `QuoteUnavailable`
    async fn quote(&self, token_in: &Pubkey, token_out: &Pubkey) -> Result<PriceQuote, SwapError>;
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    data: HashMap<String, Option<PriceEntry>>,
}

#[derive(Debug, Deserialize)]
struct PriceEntry {
    price: PriceValue,
}

/// Price APIs disagree on whether prices are strings or numbers
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PriceValue {
    Text(String),
    Number(f64),
}

impl PriceValue {
    fn as_f64(&self) -> Option<f64> {
        match self {
            PriceValue::Text(s) => s.trim().parse().ok(),
            PriceValue::Number(n) => Some(*n),
        }
    }
}

/// Oracle backed by a Jupiter-style HTTP price API
///
/// `GET {base_url}?ids=<token_out>&vsToken=<token_in>` answering
/// `{"data": {"<token_out>": {"price": "<rate>"}}}`.
#[derive(Debug)]
pub struct HttpPriceOracle {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpPriceOracle {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            timeout,
        })
    }

    async fn fetch_rate(&self, token_in: &Pubkey, token_out: &Pubkey) -> Result<f64, String> {
        let request = self
            .http
            .get(&self.base_url)
            .query(&[
                ("ids", token_out.to_string()),
                ("vsToken", token_in.to_string()),
            ])
            .send();

        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| format!("price request timed out after {}ms", self.timeout.as_millis()))?
            .map_err(|e| format!("price request failed: {}", e))?
            .error_for_status()
            .map_err(|e| format!("price API error: {}", e))?;

        let body: PriceResponse = response
            .json()
            .await
            .map_err(|e| format!("malformed price response: {}", e))?;

        body.data
            .get(&token_out.to_string())
            .and_then(|entry| entry.as_ref())
            .and_then(|entry| entry.price.as_f64())
            .ok_or_else(|| "no price for pair in response".to_string())
    }
}

#[async_trait]
impl PriceOracle for HttpPriceOracle {
    async fn quote(&self, token_in: &Pubkey, token_out: &Pubkey) -> Result<PriceQuote, SwapError> {
        let rate = self
            .fetch_rate(token_in, token_out)
            .await
            .map_err(|reason| SwapError::QuoteUnavailable {
                token_in: *token_in,
                token_out: *token_out,
                reason,
            })?;
        debug!(%token_in, %token_out, rate, "Fetched price quote");
        PriceQuote::new(*token_in, *token_out, rate, "http")
    }
}

/// Fixed-rate oracle for dry runs
#[derive(Debug, Default)]
pub struct StaticPriceOracle {
    rates: DashMap<(Pubkey, Pubkey), f64>,
}

impl StaticPriceOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate(self, token_in: Pubkey, token_out: Pubkey, rate: f64) -> Self {
        self.set_rate(token_in, token_out, rate);
        self
    }

    pub fn set_rate(&self, token_in: Pubkey, token_out: Pubkey, rate: f64) {
        self.rates.insert((token_in, token_out), rate);
    }
}

#[async_trait]
impl PriceOracle for StaticPriceOracle {
    async fn quote(&self, token_in: &Pubkey, token_out: &Pubkey) -> Result<PriceQuote, SwapError> {
        let rate = self
            .rates
            .get(&(*token_in, *token_out))
            .map(|r| *r)
            .ok_or_else(|| SwapError::QuoteUnavailable {
                token_in: *token_in,
                token_out: *token_out,
                reason: "no static rate configured".to_string(),
            })?;
        PriceQuote::new(*token_in, *token_out, rate, "static")
    }
}
