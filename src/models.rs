// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chumchon

//! # Domain Data Models
//!
//! This module defines the core data types shared across the wallet session,
//! invite, and profile layers. All types derive or implement `Serialize` and
//! `Deserialize` for JSON handling at the app boundary.
//!
//! ## Pubkey Type
//!
//! The [`Pubkey`] newtype wraps the 32-byte ed25519 identifiers used for
//! wallet accounts, program ids, and derived addresses. It renders as base58
//! text, the ledger's canonical display encoding.
//!
//! ## Model Categories
//!
//! - **Account**: the wallet account owned by the active session
//! - **Invite**: a shareable group invite backed by a program account
//! - **UserProfile**: the on-chain user profile backing authentication

use borsh::{BorshDeserialize, BorshSerialize};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// =============================================================================
// Pubkey Type
// =============================================================================

/// 32-byte ledger identifier (account address, program id, derived address).
///
/// Format: base58 text, 32 bytes decoded.
///
/// # Example
///
/// ```rust,ignore
/// let program: Pubkey = "CVjwSHMQ9YTenzKwQczwXWzJFk5kwaUhKDtxDKVazJXj".parse()?;
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, BorshSerialize, BorshDeserialize,
)]
pub struct Pubkey(pub [u8; 32]);

impl Pubkey {
    /// Build a pubkey from raw bytes.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Pubkey(bytes)
    }

    /// The raw 32 bytes.
    pub const fn to_bytes(self) -> [u8; 32] {
        self.0
    }
}

impl AsRef<[u8]> for Pubkey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Display for Pubkey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", bs58::encode(&self.0).into_string())
    }
}

/// Error parsing a base58 pubkey string.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParsePubkeyError {
    #[error("Invalid base58: {0}")]
    InvalidBase58(String),

    #[error("Invalid length: expected 32 bytes, got {0}")]
    InvalidLength(usize),
}

impl std::str::FromStr for Pubkey {
    type Err = ParsePubkeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decoded = bs58::decode(s)
            .into_vec()
            .map_err(|e| ParsePubkeyError::InvalidBase58(e.to_string()))?;
        let bytes: [u8; 32] = decoded
            .as_slice()
            .try_into()
            .map_err(|_| ParsePubkeyError::InvalidLength(decoded.len()))?;
        Ok(Pubkey(bytes))
    }
}

impl Serialize for Pubkey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Pubkey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <String as Deserialize>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Shorten a base58 address for display (`Ab3d...9xYz`).
pub fn shorten_address(address: &str, chars: usize) -> String {
    if address.len() <= chars * 2 {
        return address.to_string();
    }
    format!(
        "{}...{}",
        &address[..chars],
        &address[address.len() - chars..]
    )
}

// =============================================================================
// Account Models
// =============================================================================

/// The wallet account of the active session.
///
/// Owned exclusively by the wallet session: replaced (never mutated) on
/// reconnect, absent while disconnected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    /// The account's public key.
    pub public_key: Pubkey,
    /// Wallet-supplied display label, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

// =============================================================================
// Invite Models
// =============================================================================

/// A shareable group invite, backed by a program account at a derived address.
///
/// `uses` is only ever mutated by the ledger program; this client re-fetches
/// instead of counting locally. An invite is spent once `uses == max_uses` or
/// past `expires_at`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Invite {
    /// Derived address of the invite account.
    pub address: Pubkey,
    /// The group this invite admits members to.
    pub group: Pubkey,
    /// The group creator who issued the invite.
    pub creator: Pubkey,
    /// The invite code (shared with invitees).
    pub code: String,
    /// Maximum number of redemptions.
    pub max_uses: u32,
    /// Redemptions so far.
    pub uses: u32,
    /// Expiry timestamp.
    pub expires_at: DateTime<Utc>,
}

impl Invite {
    /// Whether every use has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.uses >= self.max_uses
    }

    /// Whether the invite has expired as of `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

// =============================================================================
// Profile Models
// =============================================================================

/// The on-chain user profile for a wallet.
///
/// Mirrors the ledger program's profile account; the app treats its presence
/// as "this wallet has completed onboarding".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    /// Wallet that owns the profile.
    pub owner: Pubkey,
    /// Display name (program limit: 50 bytes).
    pub username: String,
    /// Free-form bio (program limit: 200 bytes).
    pub bio: String,
    /// Optional hosted profile picture.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_picture_url: Option<String>,
    /// Optional NFT used as the profile picture.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nft_profile_picture: Option<Pubkey>,
    /// Whether the profile exposes wallet balances to other users.
    pub show_balance: bool,
    /// Profile creation time.
    pub created_at: DateTime<Utc>,
    /// Last on-chain activity time.
    pub last_active: DateTime<Utc>,
    /// Accumulated tutorial rewards.
    pub tutorial_rewards: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pubkey_base58_round_trip() {
        let key = Pubkey::new([7u8; 32]);
        let text = key.to_string();
        let parsed: Pubkey = text.parse().unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn pubkey_rejects_bad_input() {
        let err = "not-base58-!!".parse::<Pubkey>().unwrap_err();
        assert!(matches!(err, ParsePubkeyError::InvalidBase58(_)));

        // Valid base58 but too short
        let short = bs58::encode(&[1u8; 8]).into_string();
        let err = short.parse::<Pubkey>().unwrap_err();
        assert_eq!(err, ParsePubkeyError::InvalidLength(8));
    }

    #[test]
    fn pubkey_serde_as_string() {
        let key = Pubkey::new([3u8; 32]);
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, format!("\"{key}\""));

        let back: Pubkey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn shorten_address_formats() {
        let addr = "CVjwSHMQ9YTenzKwQczwXWzJFk5kwaUhKDtxDKVazJXj";
        assert_eq!(shorten_address(addr, 4), "CVjw...zJXj");
        assert_eq!(shorten_address("short", 4), "short");
    }

    #[test]
    fn invite_guards() {
        let now = Utc::now();
        let invite = Invite {
            address: Pubkey::new([1; 32]),
            group: Pubkey::new([2; 32]),
            creator: Pubkey::new([3; 32]),
            code: "ABC123".to_string(),
            max_uses: 2,
            uses: 1,
            expires_at: now + chrono::Duration::hours(1),
        };
        assert!(!invite.is_exhausted());
        assert!(!invite.is_expired(now));

        let spent = Invite {
            uses: 2,
            ..invite.clone()
        };
        assert!(spent.is_exhausted());

        let stale = Invite {
            expires_at: now - chrono::Duration::seconds(1),
            ..invite
        };
        assert!(stale.is_expired(now));
    }
}
