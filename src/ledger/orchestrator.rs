// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chumchon

//! Transaction building, submission, and confirmation.
//!
//! One [`TransactionOrchestrator::submit`] call owns one
//! [`PendingTransaction`] from build to terminal status:
//!
//! 1. **Build**: assemble instructions (caller closure) and fetch a recent
//!    blockhash. Blockhash fetches are retried with bounded backoff; closure
//!    failures are fatal to this submission only.
//! 2. **Sign**: hand the message to the signer capability. A user rejection is
//!    terminal and never retried.
//! 3. **Confirm**: poll the signature status at a fixed interval under a
//!    bounded timeout.
//!
//! A signed transaction is never resent: the first copy may still land, so a
//! resend could double-apply the effect. When confirmation cannot be observed
//! the submission ends `Unknown`, distinct from `Failed`, because the caller
//! must not assume the effect did not happen.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::rpc::{LedgerRpc, RpcError};
use super::types::{Commitment, Instruction, TransactionMessage, TxStatus};
use crate::models::Pubkey;
use crate::pda::SeedError;

/// Failure assembling a transaction's instructions. Fatal to the submission;
/// nothing has been signed or sent.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct BuildError(pub String);

impl From<SeedError> for BuildError {
    fn from(e: SeedError) -> Self {
        BuildError(e.to_string())
    }
}

/// Failure from the signer capability.
#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    /// The user declined to sign. Nothing was sent.
    #[error("Signing rejected by user")]
    Rejected,

    /// No signer is available (session disconnected, provider failure).
    /// Nothing was sent.
    #[error("Signer unavailable: {0}")]
    Unavailable(String),

    /// The transaction was signed and submission was attempted, but the send
    /// failed. The outcome is unknown.
    #[error("Send failed after signing: {0}")]
    Rpc(RpcError),
}

/// Signer capability: signs a message with the session's wallet and submits
/// it, returning the transaction signature. Implemented by the wallet session;
/// the private key never crosses this boundary.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// Sign `message` and submit it to the ledger.
    async fn sign_and_send(&self, message: &TransactionMessage) -> Result<String, SignerError>;

    /// Token cancelled when this signer's session is torn down, invalidating
    /// confirmation waits that depend on it.
    fn invalidation_token(&self) -> CancellationToken {
        CancellationToken::new()
    }
}

/// Errors from one submission.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// Instruction assembly failed; nothing was signed or sent.
    #[error("Build failed: {0}")]
    Build(String),

    /// The user declined to sign; nothing was sent, nothing is retried.
    #[error("Transaction signing rejected by user")]
    SignerRejected,

    /// The signer was unavailable before anything was sent.
    #[error("Signer unavailable: {0}")]
    Signer(String),

    /// The ledger executed and rejected the transaction, or the node refused
    /// it outright. The underlying reason is opaque at this layer.
    #[error("Transaction rejected by the ledger: {0}")]
    Rejected(String),

    /// Confirmation was not observed inside the bounded wait. The transaction
    /// was sent; its effect may still land.
    #[error("Confirmation timed out; transaction outcome unknown")]
    ConfirmationTimeout,

    /// The signing session was torn down while awaiting confirmation. The
    /// transaction was sent; its effect may still land.
    #[error("Session ended while awaiting confirmation; outcome unknown")]
    Cancelled,

    /// RPC failure. Before signing this is retried and then fatal; after
    /// signing it leaves the outcome unknown.
    #[error("RPC failure: {0}")]
    Rpc(RpcError),
}

/// Tuning knobs for one orchestrator.
#[derive(Debug, Clone)]
pub struct SubmitConfig {
    /// Attempts at fetching a blockhash during the build phase.
    pub max_blockhash_attempts: u32,
    /// Initial backoff between build-phase retries; doubles per attempt.
    pub build_retry_base: Duration,
    /// Interval between confirmation polls.
    pub confirm_interval: Duration,
    /// Total confirmation wait before the outcome is declared unknown.
    pub confirm_timeout: Duration,
    /// Commitment a signature must reach to count as confirmed.
    pub confirm_commitment: Commitment,
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Self {
            max_blockhash_attempts: 3,
            build_retry_base: Duration::from_millis(200),
            confirm_interval: Duration::from_millis(400),
            confirm_timeout: Duration::from_secs(30),
            confirm_commitment: Commitment::Confirmed,
        }
    }
}

/// One in-flight submission. Owned by the orchestrator for the duration of a
/// single `submit` call and dropped at terminal status.
#[derive(Debug)]
struct PendingTransaction {
    id: Uuid,
    status: TxStatus,
}

impl PendingTransaction {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            status: TxStatus::Building,
        }
    }

    fn advance(&mut self, status: TxStatus) {
        debug!(tx = %self.id, from = ?self.status, to = ?status, "transaction status");
        self.status = status;
    }
}

/// Builds, signs (via an injected signer), submits, and confirms ledger
/// transactions.
pub struct TransactionOrchestrator {
    rpc: Arc<dyn LedgerRpc>,
    config: SubmitConfig,
}

impl TransactionOrchestrator {
    /// Create an orchestrator with default tuning.
    pub fn new(rpc: Arc<dyn LedgerRpc>) -> Self {
        Self::with_config(rpc, SubmitConfig::default())
    }

    /// Create an orchestrator with explicit tuning.
    pub fn with_config(rpc: Arc<dyn LedgerRpc>, config: SubmitConfig) -> Self {
        Self { rpc, config }
    }

    /// Run one submission to a terminal status.
    ///
    /// `build` assembles the instruction list; `fee_payer` becomes the
    /// message's fee payer and must be a key the signer controls. Returns the
    /// confirmed transaction signature.
    pub async fn submit<F>(
        &self,
        fee_payer: Pubkey,
        build: F,
        signer: &dyn TransactionSigner,
    ) -> Result<String, SubmitError>
    where
        F: FnOnce() -> Result<Vec<Instruction>, BuildError>,
    {
        let mut pending = PendingTransaction::new();

        // Build phase. Closure failures are fatal; blockhash fetches retry.
        let instructions = match build() {
            Ok(instructions) if !instructions.is_empty() => instructions,
            Ok(_) => {
                pending.advance(TxStatus::Failed);
                return Err(SubmitError::Build("no instructions".to_string()));
            }
            Err(e) => {
                pending.advance(TxStatus::Failed);
                return Err(SubmitError::Build(e.to_string()));
            }
        };
        let recent_blockhash = match self.fetch_blockhash(&pending).await {
            Ok(hash) => hash,
            Err(e) => {
                pending.advance(TxStatus::Failed);
                return Err(SubmitError::Rpc(e));
            }
        };
        let message = TransactionMessage {
            fee_payer,
            recent_blockhash,
            instructions,
        };

        // Sign phase. The user or provider may refuse; neither is retried.
        pending.advance(TxStatus::Signing);
        let token = signer.invalidation_token();
        let signature = match signer.sign_and_send(&message).await {
            Ok(signature) => signature,
            Err(SignerError::Rejected) => {
                pending.advance(TxStatus::Failed);
                return Err(SubmitError::SignerRejected);
            }
            Err(SignerError::Unavailable(reason)) => {
                pending.advance(TxStatus::Failed);
                return Err(SubmitError::Signer(reason));
            }
            Err(SignerError::Rpc(e)) => {
                // Signed and possibly delivered; never resend.
                pending.advance(TxStatus::Unknown);
                return Err(SubmitError::Rpc(e));
            }
        };

        pending.advance(TxStatus::Submitted);
        self.await_confirmation(&mut pending, &signature, &token)
            .await
    }

    async fn fetch_blockhash(&self, pending: &PendingTransaction) -> Result<String, RpcError> {
        let mut backoff = self.config.build_retry_base;
        let mut last_err = RpcError::Transport("no attempts".to_string());

        for attempt in 1..=self.config.max_blockhash_attempts {
            match self.rpc.get_latest_blockhash().await {
                Ok(hash) => return Ok(hash),
                Err(e) => {
                    warn!(
                        tx = %pending.id,
                        attempt,
                        error = %e,
                        "blockhash fetch failed"
                    );
                    last_err = e;
                }
            }
            if attempt < self.config.max_blockhash_attempts {
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
        }
        Err(last_err)
    }

    async fn await_confirmation(
        &self,
        pending: &mut PendingTransaction,
        signature: &str,
        token: &CancellationToken,
    ) -> Result<String, SubmitError> {
        let deadline = tokio::time::Instant::now() + self.config.confirm_timeout;

        loop {
            if tokio::time::Instant::now() >= deadline {
                pending.advance(TxStatus::Unknown);
                warn!(tx = %pending.id, signature, "confirmation timed out");
                return Err(SubmitError::ConfirmationTimeout);
            }

            tokio::select! {
                _ = token.cancelled() => {
                    pending.advance(TxStatus::Unknown);
                    warn!(tx = %pending.id, signature, "session ended during confirmation");
                    return Err(SubmitError::Cancelled);
                }
                _ = tokio::time::sleep(self.config.confirm_interval) => {}
            }

            match self.rpc.get_signature_status(signature).await {
                Ok(Some(status)) => {
                    if let Some(err) = status.err {
                        pending.advance(TxStatus::Failed);
                        return Err(SubmitError::Rejected(err));
                    }
                    if status.commitment >= self.config.confirm_commitment {
                        pending.advance(TxStatus::Confirmed);
                        info!(tx = %pending.id, signature, "transaction confirmed");
                        return Ok(signature.to_string());
                    }
                }
                Ok(None) => {}
                // Transient poll failures are tolerated until the deadline.
                Err(e) => {
                    warn!(tx = %pending.id, error = %e, "confirmation poll failed");
                }
            }
        }
    }
}
