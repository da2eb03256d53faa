// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chumchon

//! User profile lifecycle.
//!
//! A wallet's profile lives at the derived address of `["user", owner]`.
//! Presence of the account is what marks a wallet as onboarded; reads always
//! come from the ledger.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::ledger::{
    AccountLookup, LedgerRpc, RpcError, SubmitError, TransactionOrchestrator, TransactionSigner,
};
use crate::models::{Pubkey, UserProfile};
use crate::pda::SeedError;
use crate::program;

/// Program-enforced maximum username length, in bytes.
pub const MAX_USERNAME_LEN: usize = 50;

/// Program-enforced maximum bio length, in bytes.
pub const MAX_BIO_LEN: usize = 200;

/// Errors from profile operations.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    /// Username is empty or longer than the program allows.
    #[error("Username must be 1-{MAX_USERNAME_LEN} bytes")]
    InvalidUsername,

    /// Bio is longer than the program allows.
    #[error("Bio must be at most {MAX_BIO_LEN} bytes")]
    InvalidBio,

    /// No profile account for this wallet.
    #[error("Profile not found")]
    NotFound,

    /// The account exists but does not decode as a profile.
    #[error("Profile account is malformed: {0}")]
    MalformedAccount(String),

    /// Submission failure.
    #[error(transparent)]
    Submit(#[from] SubmitError),

    /// Read-path RPC failure.
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// Seed derivation failure.
    #[error(transparent)]
    Seed(#[from] SeedError),
}

/// Profile domain service over the ledger RPC and the orchestrator.
pub struct ProfileService {
    rpc: Arc<dyn LedgerRpc>,
    orchestrator: Arc<TransactionOrchestrator>,
    program_id: Pubkey,
}

impl ProfileService {
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

    /// Create the profile for `owner`.
    ///
    /// Validates locally, submits `create_user_profile`, and returns the new
    /// profile as submitted.
    pub async fn create_user_profile(
        &self,
        signer: &dyn TransactionSigner,
        owner: Pubkey,
        username: &str,
        bio: &str,
        show_balance: bool,
    ) -> Result<UserProfile, ProfileError> {
        validate(username, bio)?;

        debug!(owner = %owner, username, "creating profile");
        let program_id = self.program_id;
        let signature = self
            .orchestrator
            .submit(
                owner,
                || {
                    Ok(vec![program::create_user_profile(
                        &program_id,
                        &owner,
                        &owner,
                        username,
                        bio,
                        show_balance,
                    )?])
                },
                signer,
            )
            .await?;
        info!(owner = %owner, signature, "profile created");

        let now = Utc::now();
        Ok(UserProfile {
            owner,
            username: username.to_string(),
            bio: bio.to_string(),
            profile_picture_url: None,
            nft_profile_picture: None,
            show_balance,
            created_at: now,
            last_active: now,
            tutorial_rewards: 0,
        })
    }

    /// Fetch the profile for `owner`, or `None` when the wallet has none.
    pub async fn get_user_profile(
        &self,
        owner: &Pubkey,
    ) -> Result<Option<UserProfile>, ProfileError> {
        let derived = crate::pda::profile_address(owner, &self.program_id)?;
        match self.rpc.get_account(&derived.address).await? {
            AccountLookup::NotFound => Ok(None),
            AccountLookup::Found(account) => program::decode_user_profile(&account.data)
                .map(Some)
                .map_err(|e| ProfileError::MalformedAccount(e.to_string())),
        }
    }

    /// Update the profile for `owner`. Requires an existing profile; the
    /// check runs before any signature round trip.
    pub async fn update_user_profile(
        &self,
        signer: &dyn TransactionSigner,
        owner: Pubkey,
        username: &str,
        bio: &str,
        show_balance: bool,
    ) -> Result<UserProfile, ProfileError> {
        validate(username, bio)?;

        let mut profile = self
            .get_user_profile(&owner)
            .await?
            .ok_or(ProfileError::NotFound)?;

        let program_id = self.program_id;
        let signature = self
            .orchestrator
            .submit(
                owner,
                || {
                    Ok(vec![program::update_user_profile(
                        &program_id,
                        &owner,
                        &owner,
                        username,
                        bio,
                        show_balance,
                    )?])
                },
                signer,
            )
            .await?;
        info!(owner = %owner, signature, "profile updated");

        profile.username = username.to_string();
        profile.bio = bio.to_string();
        profile.show_balance = show_balance;
        profile.last_active = Utc::now();
        Ok(profile)
    }
}

fn validate(username: &str, bio: &str) -> Result<(), ProfileError> {
    if username.is_empty() || username.len() > MAX_USERNAME_LEN {
        return Err(ProfileError::InvalidUsername);
    }
    if bio.len() > MAX_BIO_LEN {
        return Err(ProfileError::InvalidBio);
    }
    Ok(())
}
