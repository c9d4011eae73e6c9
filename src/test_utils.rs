//! Test Utilities Module
//!
//! Deterministic in-memory collaborators for the swap pipeline: a price
//! oracle, a chain client, and a counting signer. No network access.
//!
//! These utilities are only compiled when running tests or when the
//! `test_utils` feature is enabled.

#![cfg(any(test, feature = "test_utils"))]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use solana_sdk::{pubkey::Pubkey, signature::Keypair};

use crate::engine::{EngineSettings, SwapExecutionEngine};
use crate::errors::SwapError;
use crate::oracle::PriceOracle;
use crate::retry::RetryPolicy;
use crate::rpc::{ChainClient, ChainStatus, RpcError};
use crate::signer::{LocalKeypairSigner, SwapSigner};
use crate::tx_builder::{BuilderSettings, DEFAULT_GAS_LIMIT};
use crate::types::{
    PriceQuote, SignedTransaction, SwapRequest, TransactionId, UnsignedTransaction,
};

const MOCK_ENDPOINT: &str = "mock://chain";

/// Read `(sender, nonce)` back out of a signed transaction's raw bytes
///
/// Layout: 64-byte signature, then the bincode message starting with the
/// 32-byte sender and the little-endian u64 nonce.
pub fn decode_sender_nonce(raw: &[u8]) -> Option<(Pubkey, u64)> {
    if raw.len() < 64 + 32 + 8 {
        return None;
    }
    let sender = Pubkey::try_from(&raw[64..96]).ok()?;
    let mut nonce = [0u8; 8];
    nonce.copy_from_slice(&raw[96..104]);
    Some((sender, u64::from_le_bytes(nonce)))
}

/// Mock price oracle with a settable rate and failure injection
pub struct MockPriceOracle {
    rate: Mutex<f64>,
    calls: AtomicUsize,
    failures_remaining: AtomicUsize,
    delay_ms: AtomicU64,
}

impl MockPriceOracle {
    pub fn new(rate: f64) -> Self {
        Self {
            rate: Mutex::new(rate),
            calls: AtomicUsize::new(0),
            failures_remaining: AtomicUsize::new(0),
            delay_ms: AtomicU64::new(0),
        }
    }

    pub fn set_rate(&self, rate: f64) {
        *self.rate.lock().unwrap() = rate;
    }

    /// Fail the next `n` quote calls with `QuoteUnavailable`
    pub fn fail_next(&self, n: usize) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceOracle for MockPriceOracle {
    async fn quote(&self, token_in: &Pubkey, token_out: &Pubkey) -> Result<PriceQuote, SwapError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let failing = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(SwapError::QuoteUnavailable {
                token_in: *token_in,
                token_out: *token_out,
                reason: "mock upstream unavailable".to_string(),
            });
        }

        let rate = *self.rate.lock().unwrap();
        PriceQuote::new(*token_in, *token_out, rate, "mock")
    }
}

/// In-memory chain
///
/// Tracks a pending nonce per account, accepts broadcasts, and reports a
/// terminal status after a configurable number of polls.
pub struct MockChainClient {
    pending_nonces: DashMap<Pubkey, u64>,
    gas_price: AtomicU64,
    rpc_delay_ms: AtomicU64,
    fail_nonce: AtomicBool,
    /// Report stale nonces (ignore pending transactions)
    lagging: AtomicBool,
    reject_message: Mutex<Option<String>>,
    /// Error returned after a broadcast was accepted
    after_accept: Mutex<Option<RpcError>>,
    polls_until_terminal: AtomicU32,
    fail_on_chain: AtomicBool,
    polls: DashMap<TransactionId, u32>,
    submitted: Mutex<Vec<(Pubkey, u64, TransactionId)>>,
}

impl Default for MockChainClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChainClient {
    pub fn new() -> Self {
        Self {
            pending_nonces: DashMap::new(),
            gas_price: AtomicU64::new(1_000),
            rpc_delay_ms: AtomicU64::new(0),
            fail_nonce: AtomicBool::new(false),
            lagging: AtomicBool::new(false),
            reject_message: Mutex::new(None),
            after_accept: Mutex::new(None),
            polls_until_terminal: AtomicU32::new(0),
            fail_on_chain: AtomicBool::new(false),
            polls: DashMap::new(),
            submitted: Mutex::new(Vec::new()),
        }
    }

    pub fn set_gas_price(&self, price: u64) {
        self.gas_price.store(price, Ordering::SeqCst);
    }

    /// Delay applied to nonce and gas price fetches
    pub fn set_rpc_delay(&self, delay: Duration) {
        self.rpc_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn fail_nonce_fetch(&self, fail: bool) {
        self.fail_nonce.store(fail, Ordering::SeqCst);
    }

    pub fn set_lagging(&self, lagging: bool) {
        self.lagging.store(lagging, Ordering::SeqCst);
    }

    /// Reject every broadcast with this node message
    pub fn reject_submissions(&self, message: Option<&str>) {
        *self.reject_message.lock().unwrap() = message.map(str::to_string);
    }

    /// Make broadcasts look like they timed out after reaching the node
    pub fn time_out_submissions(&self, timeout: bool) {
        self.fail_after_accept(timeout.then(|| RpcError::Timeout {
            endpoint: MOCK_ENDPOINT.to_string(),
            method: "eth_sendRawTransaction".to_string(),
            timeout_ms: 0,
        }));
    }

    /// Accept broadcasts but answer with `error`, as a gateway failing after
    /// forwarding would
    pub fn fail_after_accept(&self, error: Option<RpcError>) {
        *self.after_accept.lock().unwrap() = error;
    }

    /// Number of `transaction_status` polls answered with "pending" before a
    /// terminal status. `u32::MAX` never confirms.
    pub fn set_polls_until_terminal(&self, polls: u32) {
        self.polls_until_terminal.store(polls, Ordering::SeqCst);
    }

    pub fn fail_on_chain(&self, fail: bool) {
        self.fail_on_chain.store(fail, Ordering::SeqCst);
    }

    /// `(sender, nonce, id)` of every accepted broadcast, in order
    pub fn submitted(&self) -> Vec<(Pubkey, u64, TransactionId)> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn submission_count(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }

    async fn rpc_delay(&self) {
        let delay = self.rpc_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn next_nonce(&self, account: &Pubkey) -> Result<u64, RpcError> {
        self.rpc_delay().await;
        if self.fail_nonce.load(Ordering::SeqCst) {
            return Err(RpcError::Connect {
                endpoint: MOCK_ENDPOINT.to_string(),
                message: "connection refused".to_string(),
            });
        }
        if self.lagging.load(Ordering::SeqCst) {
            return Ok(0);
        }
        Ok(self.pending_nonces.get(account).map(|n| *n).unwrap_or(0))
    }

    async fn gas_price(&self) -> Result<u64, RpcError> {
        self.rpc_delay().await;
        Ok(self.gas_price.load(Ordering::SeqCst))
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<String, RpcError> {
        if let Some(message) = self.reject_message.lock().unwrap().clone() {
            return Err(RpcError::RpcResponse {
                endpoint: MOCK_ENDPOINT.to_string(),
                message,
                code: Some(-32000),
            });
        }

        let (sender, nonce) = decode_sender_nonce(raw).ok_or_else(|| RpcError::RpcResponse {
            endpoint: MOCK_ENDPOINT.to_string(),
            message: "malformed transaction".to_string(),
            code: Some(-32602),
        })?;
        let mut id_bytes = [0u8; 64];
        id_bytes.copy_from_slice(&raw[..64]);
        let id = TransactionId::from(id_bytes);

        {
            let mut submitted = self.submitted.lock().unwrap();
            if submitted.iter().any(|(s, n, _)| *s == sender && *n == nonce) {
                return Err(RpcError::RpcResponse {
                    endpoint: MOCK_ENDPOINT.to_string(),
                    message: "nonce too low".to_string(),
                    code: Some(-32000),
                });
            }
            submitted.push((sender, nonce, id));
        }
        let mut pending = self.pending_nonces.entry(sender).or_insert(0);
        *pending = (*pending).max(nonce + 1);
        drop(pending);

        if let Some(error) = self.after_accept.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(id.to_string())
    }

    async fn transaction_status(&self, id: &TransactionId) -> Result<Option<ChainStatus>, RpcError> {
        let threshold = self.polls_until_terminal.load(Ordering::SeqCst);
        let mut polls = self.polls.entry(*id).or_insert(0);
        if *polls < threshold {
            *polls += 1;
            return Ok(None);
        }
        Ok(Some(ChainStatus {
            success: !self.fail_on_chain.load(Ordering::SeqCst),
            block: 100 + *polls as u64,
        }))
    }
}

/// Local keypair signer that counts calls and records signed nonces
pub struct MockSigner {
    inner: LocalKeypairSigner,
    calls: AtomicUsize,
    should_fail: AtomicBool,
    delay_ms: AtomicU64,
    signed_nonces: Mutex<HashMap<u64, usize>>,
}

impl Default for MockSigner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSigner {
    pub fn new() -> Self {
        Self {
            inner: LocalKeypairSigner::new(Keypair::new()),
            calls: AtomicUsize::new(0),
            should_fail: AtomicBool::new(false),
            delay_ms: AtomicU64::new(0),
            signed_nonces: Mutex::new(HashMap::new()),
        }
    }

    pub fn new_failing() -> Self {
        let signer = Self::new();
        signer.should_fail.store(true, Ordering::SeqCst);
        signer
    }

    /// Delay applied inside `sign`, after the call is counted
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// How many times each nonce was presented for signing
    pub fn signed_nonces(&self) -> HashMap<u64, usize> {
        self.signed_nonces.lock().unwrap().clone()
    }
}

#[async_trait]
impl SwapSigner for MockSigner {
    fn account(&self) -> Pubkey {
        self.inner.account()
    }

    async fn sign(&self, transaction: UnsignedTransaction) -> Result<SignedTransaction, SwapError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .signed_nonces
            .lock()
            .unwrap()
            .entry(transaction.nonce)
            .or_insert(0) += 1;

        if self.should_fail.load(Ordering::SeqCst) {
            return Err(SwapError::SigningError(
                "Mock signer configured to fail".to_string(),
            ));
        }
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        // Yield so concurrent swaps interleave around the signing step
        tokio::task::yield_now().await;
        self.inner.sign(transaction).await
    }
}

/// Engine wired to in-memory collaborators
pub struct EngineHarness {
    pub engine: Arc<SwapExecutionEngine>,
    pub oracle: Arc<MockPriceOracle>,
    pub chain: Arc<MockChainClient>,
    pub signer: Arc<MockSigner>,
    pub token_in: Pubkey,
    pub token_out: Pubkey,
}

/// Short timeouts suited to tests
pub fn test_settings() -> EngineSettings {
    EngineSettings {
        builder: BuilderSettings {
            contract: Pubkey::new_unique(),
            gas_limit: DEFAULT_GAS_LIMIT,
            max_gas_price: None,
            rpc_timeout: Duration::from_millis(500),
        },
        quote_timeout: Duration::from_millis(500),
        quote_retry: RetryPolicy::no_retry(),
        confirmation_timeout: Duration::from_secs(2),
        poll_interval: Duration::from_millis(50),
    }
}

impl EngineHarness {
    pub fn new(rate: f64) -> Self {
        Self::with_settings(rate, test_settings())
    }

    pub fn with_settings(rate: f64, settings: EngineSettings) -> Self {
        Self::with_signer(rate, settings, MockSigner::new())
    }

    pub fn with_signer(rate: f64, settings: EngineSettings, signer: MockSigner) -> Self {
        let oracle = Arc::new(MockPriceOracle::new(rate));
        let chain = Arc::new(MockChainClient::new());
        let signer = Arc::new(signer);
        let engine = Arc::new(SwapExecutionEngine::new(
            oracle.clone(),
            chain.clone(),
            signer.clone(),
            settings,
        ));
        Self {
            engine,
            oracle,
            chain,
            signer,
            token_in: Pubkey::new_unique(),
            token_out: Pubkey::new_unique(),
        }
    }

    /// Request for the harness pair with default slippage and impact limits
    pub fn request(&self, amount_in: u64, min_amount_out: u64) -> SwapRequest {
        SwapRequest::builder(self.token_in, self.token_out, amount_in)
            .min_amount_out(min_amount_out)
            .build()
            .expect("valid test request")
    }
}
