//! Swap execution engine
//!
//! Drives one request through
//! `Quoting -> RiskChecking -> Building -> Signing -> Submitting -> Confirming`
//! and ends in exactly one of `Confirmed`, `Rejected` or `Failed`.
//!
//! ## Guarantees
//!
//! - A risk rejection happens before the signer is ever called.
//! - Build, sign and submit for one sending account run inside that account's
//!   critical section ([`sender_lock`]), so concurrent swaps never share a nonce.
//! - Once signing starts, the sign and submit segment runs on its own task and
//!   completes even if the caller's future is dropped.
//! - Only the quote step is retried, and only per the configured [`RetryPolicy`].
//! - Every failure at or after submission carries the transaction id.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OwnedMutexGuard;
use tracing::{info_span, Instrument};

use crate::config::Config;
use crate::errors::{SwapError, SwapFailure};
use crate::metrics::{metrics, InFlightGuard, Timer};
use crate::observability::SwapTrace;
use crate::oracle::PriceOracle;
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::risk::RiskGuard;
use crate::rpc::ChainClient;
use crate::signer::SwapSigner;
use crate::structured_logging::StructuredLogger;
use crate::submitter::Submitter;
use crate::tx_builder::{BuilderSettings, TransactionBuilder};
use crate::types::{
    PriceQuote, ReceiptStatus, RiskDecision, SwapReceipt, SwapRequest, TransactionId,
    UnsignedTransaction,
};

mod cancel;
pub mod sender_lock;
mod state;

pub use cancel::CancelToken;
pub use sender_lock::{SenderLocks, SenderSlot};
pub use state::{StateMachine, SwapState};

/// Runtime settings for the engine
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub builder: BuilderSettings,
    /// Budget for one oracle call
    pub quote_timeout: Duration,
    pub quote_retry: RetryPolicy,
    pub confirmation_timeout: Duration,
    pub poll_interval: Duration,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            builder: BuilderSettings {
                contract: config.contract_address()?,
                gas_limit: config.contract.gas_limit,
                max_gas_price: config.contract.max_gas_price,
                rpc_timeout: config.rpc_timeout(),
            },
            quote_timeout: config.oracle_timeout(),
            quote_retry: config.engine.quote_retry.clone(),
            confirmation_timeout: config.confirmation_timeout(),
            poll_interval: config.poll_interval(),
        })
    }
}

/// Result of the sign and submit segment
enum Broadcast {
    SignFailed(SwapError),
    Submitted(Result<TransactionId, SwapError>),
}

/// Orchestrates quote, risk check, build, sign, submit and confirmation
pub struct SwapExecutionEngine {
    oracle: Arc<dyn PriceOracle>,
    risk: RiskGuard,
    builder: TransactionBuilder,
    signer: Arc<dyn SwapSigner>,
    submitter: Submitter,
    locks: Arc<SenderLocks>,
    settings: EngineSettings,
}

impl SwapExecutionEngine {
    pub fn new(
        oracle: Arc<dyn PriceOracle>,
        chain: Arc<dyn ChainClient>,
        signer: Arc<dyn SwapSigner>,
        settings: EngineSettings,
    ) -> Self {
        let builder = TransactionBuilder::new(chain.clone(), settings.builder.clone());
        let submitter = Submitter::new(chain, settings.poll_interval, settings.builder.rpc_timeout);
        Self {
            oracle,
            risk: RiskGuard::new(),
            builder,
            signer,
            submitter,
            locks: Arc::new(SenderLocks::new()),
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Sending account used for every swap
    pub fn sender(&self) -> solana_sdk::pubkey::Pubkey {
        self.signer.account()
    }

    /// Execute a swap to a terminal state
    pub async fn execute(&self, request: SwapRequest) -> Result<SwapReceipt, SwapFailure> {
        self.execute_with_cancel(request, CancelToken::new()).await
    }

    /// Execute a swap that the caller may cancel
    ///
    /// Cancelling before signing fails with `Cancelled` and nothing is sent.
    /// Cancelling while awaiting confirmation fails with `UnknownOutcome`
    /// carrying the transaction id; the transaction itself is not recalled.
    pub async fn execute_with_cancel(
        &self,
        request: SwapRequest,
        cancel: CancelToken,
    ) -> Result<SwapReceipt, SwapFailure> {
        let trace = SwapTrace::new("execute");
        let logger = StructuredLogger::new(trace.correlation_id.clone());
        let span = info_span!("swap", correlation_id = %trace.correlation_id);
        let _in_flight = InFlightGuard::new();
        metrics().swaps_attempted.inc();

        let mut machine = StateMachine::new(logger.clone());
        let outcome = self
            .run(&request, &cancel, &mut machine, &logger)
            .instrument(span)
            .await;

        match outcome {
            Ok(receipt) => {
                metrics().swaps_confirmed.inc();
                logger.log_confirmed(&receipt, trace.elapsed_ms());
                Ok(receipt)
            }
            Err(error) => Err(self.fail(&mut machine, &logger, &trace, error)),
        }
    }

    /// Quote and risk-check a request without building or signing anything
    pub async fn preview(&self, request: &SwapRequest) -> Result<(PriceQuote, RiskDecision), SwapError> {
        let quote = self.fetch_quote(request).await?;
        let decision = self.risk.validate(request, &quote)?;
        Ok((quote, decision))
    }

    async fn run(
        &self,
        request: &SwapRequest,
        cancel: &CancelToken,
        machine: &mut StateMachine,
        logger: &StructuredLogger,
    ) -> Result<SwapReceipt, SwapError> {
        let sender = self.signer.account();
        logger.log_request(request, &sender);

        // Quoting
        let quote = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SwapError::Cancelled),
            quote = self.fetch_quote(request) => quote?,
        };
        logger.log_quote(&quote);

        // RiskChecking
        machine.advance(SwapState::RiskChecking)?;
        let decision = self.risk.validate(request, &quote)?;
        logger.log_risk_passed(&decision);

        // Building, inside the sender's critical section
        machine.advance(SwapState::Building)?;
        let (unsigned, slot) = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SwapError::Cancelled),
            built = self.build_locked(request, &decision, sender) => built?,
        };
        if cancel.is_cancelled() {
            return Err(SwapError::Cancelled);
        }

        // Signing and Submitting
        machine.advance(SwapState::Signing)?;
        let nonce = unsigned.nonce;
        let segment = tokio::spawn(sign_and_submit(
            self.signer.clone(),
            self.submitter.clone(),
            unsigned,
            slot,
        ));
        let tx_id = match segment.await {
            Ok(Broadcast::SignFailed(e)) => return Err(e),
            Ok(Broadcast::Submitted(result)) => {
                machine.advance(SwapState::Submitting)?;
                result?
            }
            Err(join_error) => {
                return Err(SwapError::Internal(format!(
                    "sign/submit task failed: {}",
                    join_error
                )))
            }
        };
        logger.log_submitted(&tx_id, nonce);

        // Confirming
        machine.advance(SwapState::Confirming)?;
        let receipt = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(SwapError::UnknownOutcome {
                    tx_id,
                    reason: "cancelled while awaiting confirmation".to_string(),
                })
            }
            receipt = self
                .submitter
                .await_confirmation(tx_id, self.settings.confirmation_timeout) => receipt?,
        };

        if receipt.status == ReceiptStatus::Failed {
            return Err(SwapError::TransactionFailed {
                tx_id,
                block: receipt.block,
            });
        }
        machine.advance(SwapState::Confirmed)?;
        Ok(receipt)
    }

    async fn fetch_quote(&self, request: &SwapRequest) -> Result<PriceQuote, SwapError> {
        let token_in = *request.token_in();
        let token_out = *request.token_out();

        retry_with_backoff("quote", &self.settings.quote_retry, || async move {
            let timer = Timer::new();
            let result = match tokio::time::timeout(
                self.settings.quote_timeout,
                self.oracle.quote(&token_in, &token_out),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(SwapError::QuoteUnavailable {
                    token_in,
                    token_out,
                    reason: format!(
                        "oracle timed out after {}ms",
                        self.settings.quote_timeout.as_millis()
                    ),
                }),
            };
            timer.observe_duration(&metrics().quote_latency);
            if result.is_err() {
                metrics().quote_failures.inc();
            }
            result
        })
        .await
    }

    /// Take the sender's lock and build with its nonce floor
    ///
    /// The guard is returned so it can travel with the transaction into the
    /// sign and submit task.
    async fn build_locked(
        &self,
        request: &SwapRequest,
        decision: &RiskDecision,
        sender: solana_sdk::pubkey::Pubkey,
    ) -> Result<(UnsignedTransaction, OwnedMutexGuard<SenderSlot>), SwapError> {
        let slot = self.locks.acquire(&sender).await;
        let unsigned = self
            .builder
            .build_with_nonce_floor(request, decision, sender, slot.nonce_floor())
            .await?;
        Ok((unsigned, slot))
    }

    fn fail(
        &self,
        machine: &mut StateMachine,
        logger: &StructuredLogger,
        trace: &SwapTrace,
        error: SwapError,
    ) -> SwapFailure {
        let stage = machine.state();
        let wanted = match error {
            SwapError::RiskRejected(_) => SwapState::Rejected,
            _ => SwapState::Failed,
        };
        let terminal = match machine.advance(wanted) {
            Ok(()) => wanted,
            Err(e) => {
                tracing::error!(error = %e, "Forcing swap to Failed");
                SwapState::Failed
            }
        };

        let m = metrics();
        m.record_error(error.category());
        if terminal == SwapState::Rejected {
            m.swaps_rejected.inc();
            logger.log_rejection(&error);
        } else {
            m.swaps_failed.inc();
            logger.log_failure(stage, &error, trace.elapsed_ms());
        }

        SwapFailure {
            terminal,
            stage,
            transaction_id: error.transaction_id(),
            error,
        }
    }
}

/// Sign then broadcast while holding the sender's slot
///
/// Runs detached from the caller. The nonce is recorded whenever a node may
/// hold the transaction, including an ambiguous broadcast.
async fn sign_and_submit(
    signer: Arc<dyn SwapSigner>,
    submitter: Submitter,
    unsigned: UnsignedTransaction,
    mut slot: OwnedMutexGuard<SenderSlot>,
) -> Broadcast {
    let nonce = unsigned.nonce;
    let signed = match signer.sign(unsigned).await {
        Ok(signed) => signed,
        Err(e) => return Broadcast::SignFailed(e),
    };

    let result = submitter.submit(signed).await;
    let holds_nonce = match &result {
        Ok(_) => true,
        Err(SwapError::UnknownOutcome { .. }) => true,
        Err(SwapError::SubmissionError { kind, .. }) => kind.may_hold_nonce(),
        Err(_) => false,
    };
    if holds_nonce {
        slot.record_submitted(nonce);
    }
    Broadcast::Submitted(result)
}
