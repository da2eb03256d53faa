// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chumchon

//! Sign-in challenge issuance and proof verification.
//!
//! A challenge is a domain-bound message the wallet signs to prove key
//! possession ("Sign in with Solana"). The message encoding is fixed and
//! versioned: issuance and verification share one renderer, so a proof minted
//! for one deployment cannot be replayed against another. The domain and URI
//! are part of the signed bytes.
//!
//! The wallet is untrusted input. Verification reconstructs the expected
//! message from the challenge plus the claimed account and accepts nothing the
//! wallet returns at face value. Failure to verify is an expected outcome and
//! is reported as `false`, never as an error.

use chrono::{DateTime, SecondsFormat, Utc};
use ed25519_dalek::{Signature, VerifyingKey};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::models::{Account, Pubkey};

/// Version tag rendered into every message. Bump only with a coordinated
/// wallet-side rollout.
pub const MESSAGE_VERSION: &str = "1";

/// Length of generated challenge nonces.
const NONCE_LEN: usize = 16;

/// Errors from challenge construction. Verification itself never errors.
#[derive(Debug, thiserror::Error)]
pub enum ChallengeError {
    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    #[error("Domain `{domain}` does not match URI host `{host}`")]
    DomainMismatch { domain: String, host: String },
}

/// A sign-in challenge. Immutable once issued; one challenge is active per
/// sign-in attempt and it is discarded after verification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignInChallenge {
    /// Requesting domain (must be the host of `uri`).
    pub domain: String,
    /// Human-readable statement shown by the wallet.
    pub statement: String,
    /// Canonical app URI.
    pub uri: String,
    /// Issuance timestamp.
    pub issued_at: DateTime<Utc>,
    /// Random nonce; absent only for challenges reconstructed from wallets
    /// that strip unsupported fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

impl SignInChallenge {
    /// Issue a fresh challenge for `domain`/`uri` with a random nonce.
    pub fn new(domain: &str, statement: &str, uri: &str) -> Result<Self, ChallengeError> {
        let parsed: url::Url = uri
            .parse()
            .map_err(|e: url::ParseError| ChallengeError::InvalidUri(e.to_string()))?;
        let host = parsed.host_str().unwrap_or_default().to_string();
        if host != domain {
            return Err(ChallengeError::DomainMismatch {
                domain: domain.to_string(),
                host,
            });
        }

        let nonce: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(NONCE_LEN)
            .map(char::from)
            .collect();

        Ok(Self {
            domain: domain.to_string(),
            statement: statement.to_string(),
            uri: uri.to_string(),
            issued_at: Utc::now(),
            nonce: Some(nonce),
        })
    }

    /// Render the exact bytes the wallet must sign for `address`.
    ///
    /// Template v1; shared by issuance and verification.
    pub fn message_for(&self, address: &Pubkey) -> Vec<u8> {
        let mut message = format!(
            "{domain} wants you to sign in with your Solana account:\n\
             {address}\n\
             \n\
             {statement}\n\
             \n\
             URI: {uri}\n\
             Version: {version}\n\
             Issued At: {issued_at}",
            domain = self.domain,
            address = address,
            statement = self.statement,
            uri = self.uri,
            version = MESSAGE_VERSION,
            issued_at = self.issued_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        );
        if let Some(nonce) = &self.nonce {
            message.push_str("\nNonce: ");
            message.push_str(nonce);
        }
        message.into_bytes()
    }
}

/// A wallet's response to a challenge. Transient: consumed synchronously by
/// [`verify`] and never persisted.
#[derive(Debug, Clone)]
pub struct SignInProof {
    /// The account that claims to have signed.
    pub account: Account,
    /// ed25519 signature over `signed_message`.
    pub signature: [u8; 64],
    /// The exact bytes the wallet reports having signed.
    pub signed_message: Vec<u8>,
}

/// Verify `proof` against `challenge`.
///
/// True only when the wallet signed exactly the message this challenge renders
/// for the claimed account, under that account's key. Stateless; safe to call
/// concurrently.
pub fn verify(challenge: &SignInChallenge, proof: &SignInProof) -> bool {
    let expected = challenge.message_for(&proof.account.public_key);
    if expected != proof.signed_message {
        return false;
    }

    let Ok(key) = VerifyingKey::from_bytes(&proof.account.public_key.to_bytes()) else {
        return false;
    };
    let signature = Signature::from_bytes(&proof.signature);
    key.verify_strict(&proof.signed_message, &signature).is_ok()
}
