//! Engine lifecycle tests
//!
//! Each test drives one swap through the engine with in-memory collaborators
//! and checks the terminal state, the stage reached, and which side effects
//! (signing, broadcast) happened.

use std::time::Duration;

use crate::engine::{CancelToken, SwapState};
use crate::errors::{RiskRejection, SubmissionRejection, SwapError};
use crate::retry::RetryPolicy;
use crate::test_utils::{test_settings, EngineHarness, MockSigner};
use crate::types::ReceiptStatus;

#[tokio::test(start_paused = true)]
async fn test_swap_confirms() {
    let h = EngineHarness::new(1.0);
    h.chain.set_polls_until_terminal(2);

    let receipt = h.engine.execute(h.request(100, 95)).await.unwrap();

    assert_eq!(receipt.status, ReceiptStatus::Confirmed);
    assert_eq!(h.signer.call_count(), 1);
    let submitted = h.chain.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].2, receipt.transaction_id);
}

#[tokio::test]
async fn test_risk_rejection_never_signs() {
    let h = EngineHarness::new(1.0);

    // expected 100, min 80: impact 0.20 against a 0.05 ceiling
    let failure = h.engine.execute(h.request(100, 80)).await.unwrap_err();

    assert_eq!(failure.terminal, SwapState::Rejected);
    assert_eq!(failure.stage, SwapState::RiskChecking);
    assert!(matches!(
        failure.error,
        SwapError::RiskRejected(RiskRejection::PriceImpactExceeded { .. })
    ));
    assert!(failure.transaction_id.is_none());
    assert_eq!(h.signer.call_count(), 0);
    assert_eq!(h.chain.submission_count(), 0);
}

#[tokio::test]
async fn test_boundary_impact_accepted() {
    let h = EngineHarness::new(1.0);
    let receipt = h.engine.execute(h.request(100, 95)).await.unwrap();
    assert!(receipt.is_confirmed());
}

#[tokio::test]
async fn test_quote_failure_fails_at_quoting() {
    let h = EngineHarness::new(1.0);
    h.oracle.fail_next(1);

    let failure = h.engine.execute(h.request(100, 95)).await.unwrap_err();

    assert_eq!(failure.terminal, SwapState::Failed);
    assert_eq!(failure.stage, SwapState::Quoting);
    assert!(matches!(failure.error, SwapError::QuoteUnavailable { .. }));
    assert!(failure.is_retryable());
    assert_eq!(h.signer.call_count(), 0);
}

#[tokio::test]
async fn test_quote_retried_per_policy() {
    let mut settings = test_settings();
    settings.quote_retry = RetryPolicy::new(3, 1, 5);
    let h = EngineHarness::with_settings(1.0, settings);
    h.oracle.fail_next(2);

    let receipt = h.engine.execute(h.request(100, 95)).await.unwrap();

    assert!(receipt.is_confirmed());
    assert_eq!(h.oracle.call_count(), 3);
    assert_eq!(h.signer.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_oracle_times_out() {
    let h = EngineHarness::new(1.0);
    h.oracle.set_delay(Duration::from_secs(10));

    let failure = h.engine.execute(h.request(100, 95)).await.unwrap_err();
    assert!(matches!(failure.error, SwapError::QuoteUnavailable { ref reason, .. } if reason.contains("timed out")));
}

#[tokio::test]
async fn test_build_failure_before_signing() {
    let h = EngineHarness::new(1.0);
    h.chain.fail_nonce_fetch(true);

    let failure = h.engine.execute(h.request(100, 95)).await.unwrap_err();

    assert_eq!(failure.stage, SwapState::Building);
    assert!(matches!(failure.error, SwapError::BuildError(_)));
    assert_eq!(h.signer.call_count(), 0);
}

#[tokio::test]
async fn test_signing_failure() {
    let h = EngineHarness::with_signer(1.0, test_settings(), MockSigner::new_failing());

    let failure = h.engine.execute(h.request(100, 95)).await.unwrap_err();

    assert_eq!(failure.stage, SwapState::Signing);
    assert!(matches!(failure.error, SwapError::SigningError(_)));
    assert!(failure.transaction_id.is_none());
    assert_eq!(h.chain.submission_count(), 0);
}

#[tokio::test]
async fn test_submission_rejection_surfaces_tx_id() {
    let h = EngineHarness::new(1.0);
    h.chain.reject_submissions(Some("insufficient funds for gas * price + value"));

    let failure = h.engine.execute(h.request(100, 95)).await.unwrap_err();

    assert_eq!(failure.terminal, SwapState::Failed);
    assert_eq!(failure.stage, SwapState::Submitting);
    match failure.error {
        SwapError::SubmissionError { tx_id, kind, .. } => {
            assert_eq!(kind, SubmissionRejection::InsufficientFunds);
            assert_eq!(failure.transaction_id, Some(tx_id));
        }
        other => panic!("expected SubmissionError, got {:?}", other),
    }
}

#[tokio::test]
async fn test_broadcast_timeout_is_unknown_outcome() {
    let h = EngineHarness::new(1.0);
    h.chain.time_out_submissions(true);

    let failure = h.engine.execute(h.request(100, 95)).await.unwrap_err();

    assert!(matches!(failure.error, SwapError::UnknownOutcome { .. }));
    assert!(failure.transaction_id.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_confirmation_timeout_distinct_from_failure() {
    let h = EngineHarness::new(1.0);
    h.chain.set_polls_until_terminal(u32::MAX);

    let failure = h.engine.execute(h.request(100, 95)).await.unwrap_err();
    assert_eq!(failure.stage, SwapState::Confirming);
    assert!(matches!(failure.error, SwapError::ConfirmationTimeout { .. }));
    assert!(failure.transaction_id.is_some());

    let h = EngineHarness::new(1.0);
    h.chain.fail_on_chain(true);

    let failure = h.engine.execute(h.request(100, 95)).await.unwrap_err();
    assert_eq!(failure.stage, SwapState::Confirming);
    assert!(matches!(failure.error, SwapError::TransactionFailed { .. }));
    assert!(failure.transaction_id.is_some());
}

#[tokio::test]
async fn test_cancel_before_start_has_no_side_effects() {
    let h = EngineHarness::new(1.0);
    let token = CancelToken::new();
    token.cancel();

    let failure = h
        .engine
        .execute_with_cancel(h.request(100, 95), token)
        .await
        .unwrap_err();

    assert_eq!(failure.terminal, SwapState::Failed);
    assert_eq!(failure.error, SwapError::Cancelled);
    assert_eq!(h.oracle.call_count(), 0);
    assert_eq!(h.signer.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_slow_quote() {
    let h = EngineHarness::new(1.0);
    h.oracle.set_delay(Duration::from_millis(300));
    let token = CancelToken::new();

    let engine = h.engine.clone();
    let request = h.request(100, 95);
    let task = {
        let token = token.clone();
        tokio::spawn(async move { engine.execute_with_cancel(request, token).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    token.cancel();

    let failure = task.await.unwrap().unwrap_err();
    assert_eq!(failure.stage, SwapState::Quoting);
    assert_eq!(failure.error, SwapError::Cancelled);
    assert_eq!(h.signer.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_build_releases_sender() {
    let h = EngineHarness::new(1.0);
    h.chain.set_rpc_delay(Duration::from_millis(300));
    let token = CancelToken::new();

    let engine = h.engine.clone();
    let request = h.request(100, 95);
    let task = {
        let token = token.clone();
        tokio::spawn(async move { engine.execute_with_cancel(request, token).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    token.cancel();

    let failure = task.await.unwrap().unwrap_err();
    assert_eq!(failure.stage, SwapState::Building);
    assert_eq!(failure.error, SwapError::Cancelled);
    assert_eq!(h.signer.call_count(), 0);
    assert_eq!(h.chain.submission_count(), 0);

    // the sender lock was dropped and nonce 0 is still free
    h.chain.set_rpc_delay(Duration::ZERO);
    h.engine.execute(h.request(100, 95)).await.unwrap();
    assert_eq!(h.chain.submitted()[0].1, 0);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_caller_still_submits_once_signing_started() {
    let signer = MockSigner::new();
    signer.set_delay(Duration::from_millis(100));
    let h = EngineHarness::with_signer(1.0, test_settings(), signer);

    let engine = h.engine.clone();
    let request = h.request(100, 95);
    let task = tokio::spawn(async move { engine.execute(request).await });
    while h.signer.call_count() == 0 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(h.chain.submission_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_while_confirming_is_unknown_outcome() {
    let h = EngineHarness::new(1.0);
    h.chain.set_polls_until_terminal(u32::MAX);
    let token = CancelToken::new();

    let engine = h.engine.clone();
    let request = h.request(100, 95);
    let task = {
        let token = token.clone();
        tokio::spawn(async move { engine.execute_with_cancel(request, token).await })
    };
    while h.chain.submission_count() == 0 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    token.cancel();

    let failure = task.await.unwrap().unwrap_err();
    assert_eq!(failure.stage, SwapState::Confirming);
    match failure.error {
        SwapError::UnknownOutcome { tx_id, .. } => {
            assert_eq!(tx_id, h.chain.submitted()[0].2);
        }
        other => panic!("expected UnknownOutcome, got {:?}", other),
    }
}

#[tokio::test]
async fn test_preview_does_not_sign() {
    let h = EngineHarness::new(2.0);
    let (quote, decision) = h.engine.preview(&h.request(100, 190)).await.unwrap();

    assert_eq!(quote.rate, 2.0);
    assert_eq!(decision.expected_out, 200.0);
    assert_eq!(h.signer.call_count(), 0);
    assert_eq!(h.chain.submission_count(), 0);
}
