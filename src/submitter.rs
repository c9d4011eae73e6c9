//! Broadcast and confirmation tracking
//!
//! Owns a signed transaction from broadcast until a terminal status or
//! timeout. Broadcast failures are classified: an error object from the node
//! is a `SubmissionError`. A failure after the request may have left this
//! process (timeout, dropped connection, 5xx, garbled body) is an
//! `UnknownOutcome` because the node may have accepted it.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::errors::SwapError;
use crate::metrics::{metrics, Timer};
use crate::rpc::{ChainClient, RpcError};
use crate::types::{ReceiptStatus, SignedTransaction, SwapReceipt, TransactionId};

/// Lower bound for the confirmation poll interval
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Upper bound for the confirmation poll interval
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Default confirmation poll interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Clamp a poll interval into `[MIN_POLL_INTERVAL, MAX_POLL_INTERVAL]`
pub fn clamp_poll_interval(interval: Duration) -> Duration {
    interval.clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL)
}

#[derive(Clone)]
pub struct Submitter {
    chain: Arc<dyn ChainClient>,
    poll_interval: Duration,
    rpc_timeout: Duration,
}

impl Submitter {
    pub fn new(chain: Arc<dyn ChainClient>, poll_interval: Duration, rpc_timeout: Duration) -> Self {
        Self {
            chain,
            poll_interval: clamp_poll_interval(poll_interval),
            rpc_timeout,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Broadcast a signed transaction
    ///
    /// Consumes the transaction; the returned id is the signature computed
    /// locally, which every later error also carries.
    pub async fn submit(&self, transaction: SignedTransaction) -> Result<TransactionId, SwapError> {
        let tx_id = transaction.id();
        metrics().submissions.inc();

        let sent = tokio::time::timeout(
            self.rpc_timeout,
            self.chain.send_raw_transaction(transaction.raw()),
        )
        .await
        .unwrap_or_else(|_| {
            Err(RpcError::Timeout {
                endpoint: "broadcast".to_string(),
                method: "send_raw_transaction".to_string(),
                timeout_ms: self.rpc_timeout.as_millis() as u64,
            })
        });

        match sent {
            Ok(reported) => {
                if reported != tx_id.to_string() {
                    debug!(
                        tx_id = %tx_id,
                        reported = %reported,
                        "Node reported a different transaction id, tracking local id"
                    );
                }
                info!(tx_id = %tx_id, nonce = transaction.nonce(), "Transaction broadcast");
                Ok(tx_id)
            }
            Err(e) if e.is_ambiguous() => {
                warn!(tx_id = %tx_id, error = %e, "Broadcast outcome unknown");
                Err(SwapError::UnknownOutcome {
                    tx_id,
                    reason: e.to_string(),
                })
            }
            Err(e) => {
                let kind = e.rejection_kind();
                warn!(tx_id = %tx_id, kind = %kind, error = %e, "Broadcast rejected");
                Err(SwapError::SubmissionError {
                    tx_id,
                    kind,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Poll until the transaction reaches a terminal status or `timeout` elapses
    ///
    /// A transaction that lands but fails on-chain returns a receipt with
    /// [`ReceiptStatus::Failed`]; running out of time is `ConfirmationTimeout`.
    pub async fn await_confirmation(
        &self,
        tx_id: TransactionId,
        timeout: Duration,
    ) -> Result<SwapReceipt, SwapError> {
        let timer = Timer::new();
        let started = Instant::now();
        let deadline = started + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let per_call = remaining.min(self.rpc_timeout);

            match tokio::time::timeout(per_call, self.chain.transaction_status(&tx_id)).await {
                Ok(Ok(Some(status))) => {
                    timer.observe_duration(&metrics().confirmation_latency);
                    let status_kind = if status.success {
                        ReceiptStatus::Confirmed
                    } else {
                        ReceiptStatus::Failed
                    };
                    debug!(tx_id = %tx_id, block = status.block, status = ?status_kind, "Terminal status");
                    return Ok(SwapReceipt {
                        transaction_id: tx_id,
                        status: status_kind,
                        block: status.block,
                    });
                }
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    debug!(tx_id = %tx_id, error = %e, "Status poll failed, continuing");
                }
                Err(_) => {
                    debug!(tx_id = %tx_id, "Status poll timed out, continuing");
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(SwapError::ConfirmationTimeout {
                    tx_id,
                    waited_ms: now.duration_since(started).as_millis() as u64,
                });
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}
