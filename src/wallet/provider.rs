// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chumchon

//! Wallet provider boundary.
//!
//! The external mobile wallet holds the user's keys; this crate never sees
//! private key material. Everything the provider returns is untrusted input:
//! addresses are decoded and validated here, and sign-in proofs are
//! re-verified by the session before any state transition.
//!
//! Addresses cross this boundary base64-encoded, the mobile wallet adapter
//! convention.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::config::AppIdentity;
use crate::ledger::TransactionMessage;
use crate::models::{Account, Pubkey};
use crate::siws::SignInChallenge;

/// Errors surfaced by a wallet provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The user declined the request in the wallet UI.
    #[error("Declined by user")]
    Declined,

    /// Any other provider-side failure.
    #[error("Provider failure: {0}")]
    Other(String),
}

/// One account granted by the wallet during authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedAccount {
    /// base64-encoded 32-byte address.
    pub address: String,
    /// Wallet-side display label, if any.
    pub label: Option<String>,
}

impl AuthorizedAccount {
    /// Decode the wallet-supplied address into a validated [`Account`].
    pub fn to_account(&self) -> Result<Account, ProviderError> {
        let bytes = BASE64
            .decode(&self.address)
            .map_err(|e| ProviderError::Other(format!("bad base64 address: {e}")))?;
        let key: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| ProviderError::Other(format!("address is {} bytes", bytes.len())))?;
        Ok(Account {
            public_key: Pubkey::new(key),
            label: self.label.clone(),
        })
    }
}

/// Result of a successful authorization.
#[derive(Debug, Clone)]
pub struct AuthResult {
    /// Opaque token for reauthorization and deauthorization.
    pub auth_token: String,
    /// Granted accounts; the first is the active one.
    pub accounts: Vec<AuthorizedAccount>,
}

/// Result of a wallet sign-in: the proof material to verify.
#[derive(Debug, Clone)]
pub struct SignInResult {
    /// The account the wallet claims signed.
    pub account: AuthorizedAccount,
    /// ed25519 signature bytes.
    pub signature: Vec<u8>,
    /// The exact message the wallet reports having signed.
    pub signed_message: Vec<u8>,
}

/// The external wallet capability.
///
/// Injected into the session rather than accessed through globals so tests can
/// substitute fakes.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Open a wallet association. The user may cancel.
    async fn connect(&self) -> Result<(), ProviderError>;

    /// Request authorization for `identity` on `chain`.
    async fn authorize(
        &self,
        identity: &AppIdentity,
        chain: &str,
    ) -> Result<AuthResult, ProviderError>;

    /// Ask the wallet to sign the challenge's sign-in message.
    async fn sign_in(
        &self,
        identity: &AppIdentity,
        challenge: &SignInChallenge,
    ) -> Result<SignInResult, ProviderError>;

    /// Sign an unsigned transaction message; returns the signed wire bytes.
    async fn sign_transaction(
        &self,
        message: &TransactionMessage,
    ) -> Result<Vec<u8>, ProviderError>;

    /// Revoke a previously granted authorization.
    async fn deauthorize(&self, auth_token: &str) -> Result<(), ProviderError>;
}
