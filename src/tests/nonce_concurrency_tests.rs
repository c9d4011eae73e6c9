//! Concurrency tests for per-sender nonce assignment
//!
//! - Parallel swaps from one account get distinct, gap-free nonces
//! - A node whose pending count lags cannot cause a nonce collision
//! - Explicit rejections release the nonce, ambiguous ones do not

use std::collections::HashSet;
use std::time::Duration;

use tokio::time::timeout;

use crate::errors::SwapError;
use crate::rpc::RpcError;
use crate::test_utils::EngineHarness;

async fn run_parallel(h: &EngineHarness, count: usize) -> usize {
    let mut handles = Vec::with_capacity(count);
    for _ in 0..count {
        let engine = h.engine.clone();
        let request = h.request(100, 95);
        handles.push(tokio::spawn(async move { engine.execute(request).await }));
    }

    let mut confirmed = 0;
    for handle in handles {
        let result = timeout(Duration::from_secs(10), handle)
            .await
            .expect("swap hung - potential deadlock")
            .expect("swap task panicked");
        if result.is_ok() {
            confirmed += 1;
        }
    }
    confirmed
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_swaps_unique_nonces() {
    const NUM_SWAPS: usize = 20;
    let h = EngineHarness::new(1.0);
    h.chain.set_rpc_delay(Duration::from_millis(2));

    let confirmed = run_parallel(&h, NUM_SWAPS).await;
    assert_eq!(confirmed, NUM_SWAPS);

    let nonces: HashSet<u64> = h.chain.submitted().iter().map(|(_, n, _)| *n).collect();
    assert_eq!(nonces, (0..NUM_SWAPS as u64).collect());
    assert!(h.signer.signed_nonces().values().all(|&count| count == 1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_lagging_node_does_not_collide() {
    const NUM_SWAPS: usize = 10;
    let h = EngineHarness::new(1.0);
    h.chain.set_lagging(true);

    let confirmed = run_parallel(&h, NUM_SWAPS).await;
    assert_eq!(confirmed, NUM_SWAPS);

    let mut nonces: Vec<u64> = h.chain.submitted().iter().map(|(_, n, _)| *n).collect();
    nonces.sort_unstable();
    assert_eq!(nonces, (0..NUM_SWAPS as u64).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_explicit_rejection_releases_nonce() {
    let h = EngineHarness::new(1.0);
    h.chain.reject_submissions(Some("insufficient funds"));
    let failure = h.engine.execute(h.request(100, 95)).await.unwrap_err();
    assert!(matches!(failure.error, SwapError::SubmissionError { .. }));

    h.chain.reject_submissions(None);
    h.engine.execute(h.request(100, 95)).await.unwrap();
    assert_eq!(h.chain.submitted()[0].1, 0);
}

#[tokio::test]
async fn test_already_known_keeps_nonce_reserved() {
    let h = EngineHarness::new(1.0);
    h.chain.reject_submissions(Some("already known"));
    h.engine.execute(h.request(100, 95)).await.unwrap_err();

    h.chain.reject_submissions(None);
    h.engine.execute(h.request(100, 95)).await.unwrap();
    assert_eq!(h.chain.submitted()[0].1, 1);
}

#[tokio::test]
async fn test_gateway_error_after_accept_keeps_nonce_on_lagging_node() {
    let h = EngineHarness::new(1.0);
    h.chain.set_lagging(true);
    h.chain.fail_after_accept(Some(RpcError::HttpStatus {
        endpoint: "http://gateway".to_string(),
        status: 502,
    }));

    let failure = h.engine.execute(h.request(100, 95)).await.unwrap_err();
    assert!(matches!(failure.error, SwapError::UnknownOutcome { .. }));
    assert!(failure.transaction_id.is_some());

    // the node still reports nonce 0, but it was already taken
    h.chain.fail_after_accept(None);
    h.engine.execute(h.request(100, 95)).await.unwrap();

    let nonces: Vec<u64> = h.chain.submitted().iter().map(|(_, n, _)| *n).collect();
    assert_eq!(nonces, vec![0, 1]);
    assert!(h.signer.signed_nonces().values().all(|&count| count == 1));
}

#[tokio::test]
async fn test_signing_happens_once_per_nonce_after_rejections() {
    let h = EngineHarness::new(1.0);

    // rejected swaps never reach the signer and never consume a nonce
    for _ in 0..3 {
        h.engine.execute(h.request(100, 50)).await.unwrap_err();
    }
    h.engine.execute(h.request(100, 95)).await.unwrap();

    assert_eq!(h.signer.call_count(), 1);
    assert_eq!(h.chain.submitted()[0].1, 0);
}
