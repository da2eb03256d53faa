// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chumchon

//! Invite lifecycle: create, redeem, query.
//!
//! Invites are program accounts keyed by the derived address of
//! `["invite", group, code]`, so any two clients agree on where an invite
//! lives without coordination. This service never mutates `uses` locally:
//! the count is always read back from the ledger, and the program remains the
//! authority that rejects an over-redeemed or expired invite. The local
//! checks here only fast-fail before spending a signature round trip.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::ledger::{
    AccountLookup, LedgerRpc, RpcError, SubmitError, TransactionOrchestrator, TransactionSigner,
};
use crate::models::{Invite, Pubkey};
use crate::pda::SeedError;
use crate::program;

/// Program-enforced maximum invite code length, in bytes.
pub const MAX_CODE_LEN: usize = 32;

/// Errors from invite operations.
#[derive(Debug, thiserror::Error)]
pub enum InviteError {
    /// Code is empty or longer than the program allows.
    #[error("Invite code must be 1-{MAX_CODE_LEN} bytes")]
    InvalidCode,

    /// `max_uses` must admit at least one redemption.
    #[error("Invite must allow at least one use")]
    InvalidMaxUses,

    /// Expiry is not in the future.
    #[error("Invite expiry must be in the future")]
    InvalidExpiry,

    /// The invite exists but is past its expiry.
    #[error("Invite has expired")]
    Expired,

    /// The invite exists but every use is consumed.
    #[error("Invite has no remaining uses")]
    Exhausted,

    /// No invite account at the derived address.
    #[error("Invite not found")]
    NotFound,

    /// The account exists but does not decode as an invite.
    #[error("Invite account is malformed: {0}")]
    MalformedAccount(String),

    /// The ledger rejected the redemption; the reason is opaque here.
    #[error("Redemption rejected by the ledger: {0}")]
    RedemptionRejected(String),

    /// Submission failure outside redemption rejection.
    #[error(transparent)]
    Submit(SubmitError),

    /// Read-path RPC failure.
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// Seed derivation failure.
    #[error(transparent)]
    Seed(#[from] SeedError),
}

/// Invite domain service over the ledger RPC and the orchestrator.
pub struct InviteService {
    rpc: Arc<dyn LedgerRpc>,
    orchestrator: Arc<TransactionOrchestrator>,
    program_id: Pubkey,
}

impl InviteService {
    /// Create a service for `program_id`.
    pub fn new(
        rpc: Arc<dyn LedgerRpc>,
        orchestrator: Arc<TransactionOrchestrator>,
        program_id: Pubkey,
    ) -> Self {
        Self {
            rpc,
            orchestrator,
            program_id,
        }
    }

    /// Create an invite for `group`.
    ///
    /// Validates locally before touching the network, then submits a
    /// `create_invite` transaction signed by the group creator. Returns the
    /// invite with `uses = 0`.
    pub async fn create_invite(
        &self,
        signer: &dyn TransactionSigner,
        group: Pubkey,
        creator: Pubkey,
        code: &str,
        max_uses: u32,
        expires_at: DateTime<Utc>,
    ) -> Result<Invite, InviteError> {
        if code.is_empty() || code.len() > MAX_CODE_LEN {
            return Err(InviteError::InvalidCode);
        }
        if max_uses == 0 {
            return Err(InviteError::InvalidMaxUses);
        }
        if expires_at <= Utc::now() {
            return Err(InviteError::InvalidExpiry);
        }

        let derived = crate::pda::invite_address(&group, code, &self.program_id)?;
        debug!(group = %group, code, address = %derived.address, "creating invite");

        let program_id = self.program_id;
        let signature = self
            .orchestrator
            .submit(
                creator,
                || {
                    Ok(vec![program::create_invite(
                        &program_id,
                        &creator,
                        &creator,
                        &group,
                        code,
                        max_uses,
                        expires_at,
                    )?])
                },
                signer,
            )
            .await
            .map_err(InviteError::Submit)?;

        info!(code, signature, "invite created");
        Ok(Invite {
            address: derived.address,
            group,
            creator,
            code: code.to_string(),
            max_uses,
            uses: 0,
            expires_at,
        })
    }

    /// Redeem an invite for `member`, joining them to the group.
    ///
    /// Re-fetches the invite and fast-fails on expiry or exhaustion before
    /// asking for a signature. The checks are an optimization only: a racing
    /// redeemer can still win, in which case the program rejects the
    /// transaction and the failure surfaces as [`InviteError::RedemptionRejected`].
    pub async fn redeem_invite(
        &self,
        signer: &dyn TransactionSigner,
        group: Pubkey,
        code: &str,
        member: Pubkey,
    ) -> Result<(), InviteError> {
        let invite = self
            .get_invite_by_code(&group, code)
            .await?
            .ok_or(InviteError::NotFound)?;

        let now = Utc::now();
        if invite.is_expired(now) {
            return Err(InviteError::Expired);
        }
        if invite.is_exhausted() {
            return Err(InviteError::Exhausted);
        }

        let program_id = self.program_id;
        let result = self
            .orchestrator
            .submit(
                member,
                || {
                    Ok(vec![program::use_invite(
                        &program_id,
                        &member,
                        &member,
                        &group,
                        code,
                    )?])
                },
                signer,
            )
            .await;

        match result {
            Ok(signature) => {
                info!(code, member = %member, signature, "invite redeemed");
                Ok(())
            }
            Err(SubmitError::Rejected(reason)) => {
                warn!(code, reason, "redemption rejected by program");
                Err(InviteError::RedemptionRejected(reason))
            }
            Err(e) => Err(InviteError::Submit(e)),
        }
    }

    /// Look up an invite by its group and code.
    ///
    /// Absence is `Ok(None)`; an account that exists but does not decode is a
    /// [`InviteError::MalformedAccount`], never silently absent.
    pub async fn get_invite_by_code(
        &self,
        group: &Pubkey,
        code: &str,
    ) -> Result<Option<Invite>, InviteError> {
        let derived = crate::pda::invite_address(group, code, &self.program_id)?;
        match self.rpc.get_account(&derived.address).await? {
            AccountLookup::NotFound => Ok(None),
            AccountLookup::Found(account) => program::decode_invite(derived.address, &account.data)
                .map(Some)
                .map_err(|e| InviteError::MalformedAccount(e.to_string())),
        }
    }

    /// List a group's invites via a filtered program-accounts scan.
    ///
    /// Undecodable entries are logged and skipped; one corrupt account must
    /// not hide the rest.
    pub async fn get_group_invites(&self, group: &Pubkey) -> Result<Vec<Invite>, InviteError> {
        let accounts = self
            .rpc
            .get_program_accounts(&self.program_id, &program::group_invite_filters(group))
            .await?;

        let mut invites = Vec::with_capacity(accounts.len());
        for account in accounts {
            match program::decode_invite(account.pubkey, &account.data) {
                Ok(invite) => invites.push(invite),
                Err(e) => {
                    warn!(address = %account.pubkey, error = %e, "skipping undecodable invite");
                }
            }
        }
        Ok(invites)
    }
}
