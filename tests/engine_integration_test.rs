//! End-to-end engine tests through the public API
//!
//! Wires the engine to the in-memory chain and oracle from `test_utils` and
//! a real local keypair signer, then checks the externally observable
//! guarantees: side-effect-free rejection, unique nonces under concurrency,
//! timeout versus on-chain failure, and request validation.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use solana_sdk::signature::{Keypair, Signer};
use swap_engine::config::TradingConfig;
use swap_engine::oracle::StaticPriceOracle;
use swap_engine::signer::LocalKeypairSigner;
use swap_engine::submitter::Submitter;
use swap_engine::test_utils::{test_settings, EngineHarness, MockChainClient};
use swap_engine::{Pubkey, SwapError, SwapExecutionEngine, SwapRequest, SwapState};

#[tokio::test]
async fn test_boundary_swap_signed_by_local_keypair() {
    let token_in = Pubkey::new_unique();
    let token_out = Pubkey::new_unique();
    let keypair = Keypair::new();
    let sender = keypair.pubkey();

    let chain = Arc::new(MockChainClient::new());
    let oracle = Arc::new(StaticPriceOracle::new().with_rate(token_in, token_out, 1.0));
    let engine = SwapExecutionEngine::new(
        oracle,
        chain.clone(),
        Arc::new(LocalKeypairSigner::new(keypair)),
        test_settings(),
    );
    assert_eq!(engine.sender(), sender);

    let request = SwapRequest::new(token_in, token_out, 100, 95, 0.01, 0.05).unwrap();
    let receipt = engine.execute(request).await.unwrap();

    assert!(receipt.is_confirmed());
    let submitted = chain.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].0, sender);
    assert_eq!(submitted[0].2, receipt.transaction_id);
}

#[tokio::test]
async fn test_rejection_is_side_effect_free() {
    let h = EngineHarness::new(1.0);

    let failure = h.engine.execute(h.request(100, 80)).await.unwrap_err();

    assert!(failure.is_rejected());
    assert!(!failure.is_retryable());
    assert!(failure.error.to_string().contains("price impact 0.200000 exceeds limit 0.050000"));
    assert_eq!(h.signer.call_count(), 0);
    assert_eq!(h.chain.submission_count(), 0);
}

#[tokio::test]
async fn test_zero_amount_never_reaches_oracle() {
    let h = EngineHarness::new(1.0);

    let err = SwapRequest::builder(h.token_in, h.token_out, 0)
        .min_amount_out(95)
        .build()
        .unwrap_err();

    assert!(matches!(err, SwapError::InvalidRequest(_)));
    assert_eq!(h.oracle.call_count(), 0);
}

#[tokio::test]
async fn test_request_uses_configured_trading_defaults() {
    let h = EngineHarness::new(1.0);
    let trading = TradingConfig {
        default_slippage: 0.02,
        max_price_impact: 0.25,
    };

    // 0.20 impact passes once the configured ceiling is 0.25
    let request = SwapRequest::builder(h.token_in, h.token_out, 100)
        .with_trading_defaults(&trading)
        .min_amount_out(80)
        .build()
        .unwrap();
    assert_eq!(request.slippage_tolerance(), 0.02);

    let (_, decision) = h.engine.preview(&request).await.unwrap();
    assert_eq!(decision.min_out_amount(), 78);
    assert!(h.engine.execute(request).await.is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_swaps_same_sender_unique_nonces() {
    let h = EngineHarness::new(1.0);
    h.chain.set_rpc_delay(Duration::from_millis(1));

    let swaps = (0..16).map(|_| {
        let engine = h.engine.clone();
        let request = h.request(100, 95);
        async move { engine.execute(request).await }
    });
    let results = join_all(swaps).await;
    assert!(results.iter().all(|r| r.is_ok()));

    let mut nonces: Vec<u64> = h.chain.submitted().iter().map(|(_, n, _)| *n).collect();
    nonces.sort_unstable();
    nonces.dedup();
    assert_eq!(nonces.len(), 16);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_distinct_senders_progress_independently() {
    let chain = Arc::new(MockChainClient::new());
    let token_in = Pubkey::new_unique();
    let token_out = Pubkey::new_unique();
    let oracle = Arc::new(StaticPriceOracle::new().with_rate(token_in, token_out, 1.0));

    let engines: Vec<_> = (0..3)
        .map(|_| {
            Arc::new(SwapExecutionEngine::new(
                oracle.clone(),
                chain.clone(),
                Arc::new(LocalKeypairSigner::new(Keypair::new())),
                test_settings(),
            ))
        })
        .collect();

    let swaps = engines.iter().map(|engine| {
        let engine = engine.clone();
        let request = SwapRequest::new(token_in, token_out, 100, 95, 0.01, 0.05).unwrap();
        async move { engine.execute(request).await }
    });
    assert!(join_all(swaps).await.iter().all(|r| r.is_ok()));

    // each sender starts its own sequence at zero
    let submitted = chain.submitted();
    assert_eq!(submitted.len(), 3);
    assert!(submitted.iter().all(|(_, nonce, _)| *nonce == 0));
}

#[tokio::test(start_paused = true)]
async fn test_short_confirmation_timeout_is_not_failure() {
    let h = EngineHarness::new(1.0);
    h.chain.set_polls_until_terminal(100);
    let submitter = Submitter::new(h.chain.clone(), Duration::from_millis(100), Duration::from_secs(1));

    let failure = h.engine.execute(h.request(100, 95)).await.unwrap_err();
    let tx_id = failure.transaction_id.expect("tx id surfaced");
    assert_eq!(failure.stage, SwapState::Confirming);
    assert!(matches!(failure.error, SwapError::ConfirmationTimeout { .. }));

    // re-querying later with a longer budget finds the transaction landed
    let receipt = submitter
        .await_confirmation(tx_id, Duration::from_secs(30))
        .await
        .unwrap();
    assert!(receipt.is_confirmed());
}
