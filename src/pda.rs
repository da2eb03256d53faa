// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chumchon

//! Program-derived address computation.
//!
//! Derived addresses are the primary keys for the program's accounts: two
//! clients that agree on the seed values and the program id must agree on the
//! address, byte for byte, without any stored mapping. Derivation is pure and
//! does no I/O.
//!
//! Seed order is part of the compatibility contract. The helpers at the bottom
//! of this module freeze the seed layout per resource kind; callers must not
//! assemble resource seeds by hand.

use curve25519_dalek::edwards::CompressedEdwardsY;
use sha2::{Digest, Sha256};

use crate::models::Pubkey;

/// Maximum number of seeds in one derivation.
pub const MAX_SEEDS: usize = 16;

/// Maximum length of a single seed, in bytes.
pub const MAX_SEED_LEN: usize = 32;

/// Domain separator fixed by the ledger's derivation scheme.
const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

/// Seed tag for invite accounts.
pub const INVITE_SEED: &[u8] = b"invite";
/// Seed tag for user profile accounts.
pub const PROFILE_SEED: &[u8] = b"user";
/// Seed tag for group accounts.
pub const GROUP_SEED: &[u8] = b"group";
/// Seed tag for group membership records.
pub const MEMBER_SEED: &[u8] = b"member";

/// A derived program address and the bump seed that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedAddress {
    /// The derived address.
    pub address: Pubkey,
    /// Bump seed, appended to the caller's seeds during derivation.
    pub bump: u8,
}

/// Errors from address derivation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SeedError {
    #[error("Too many seeds: {0} (max {MAX_SEEDS})")]
    TooManySeeds(usize),

    #[error("Seed too long: {0} bytes (max {MAX_SEED_LEN})")]
    SeedTooLong(usize),

    #[error("No viable bump seed for this input")]
    NoViableBump,
}

/// Derive the program address for `seeds` under `program_id`.
///
/// Walks bump seeds downward from 255 and returns the first candidate that is
/// not a valid curve point, matching the ledger's `find_program_address`
/// contract exactly. Deterministic: identical input always yields the
/// identical address.
pub fn derive_address(seeds: &[&[u8]], program_id: &Pubkey) -> Result<DerivedAddress, SeedError> {
    if seeds.len() > MAX_SEEDS {
        return Err(SeedError::TooManySeeds(seeds.len()));
    }
    if let Some(seed) = seeds.iter().find(|s| s.len() > MAX_SEED_LEN) {
        return Err(SeedError::SeedTooLong(seed.len()));
    }

    for bump in (0..=255u8).rev() {
        if let Some(address) = candidate_address(seeds, bump, program_id) {
            return Ok(DerivedAddress { address, bump });
        }
    }

    // Cryptographically unreachable (each bump misses with probability ~0.5).
    Err(SeedError::NoViableBump)
}

/// Hash one bump candidate; `None` when the digest lands on the curve and is
/// therefore a possible signing key rather than a program address.
fn candidate_address(seeds: &[&[u8]], bump: u8, program_id: &Pubkey) -> Option<Pubkey> {
    let mut hasher = Sha256::new();
    for seed in seeds {
        hasher.update(seed);
    }
    hasher.update([bump]);
    hasher.update(program_id.as_ref());
    hasher.update(PDA_MARKER);
    let digest: [u8; 32] = hasher.finalize().into();

    if is_on_curve(&digest) {
        None
    } else {
        Some(Pubkey::new(digest))
    }
}

/// Whether `bytes` decompresses to an ed25519 curve point.
fn is_on_curve(bytes: &[u8; 32]) -> bool {
    CompressedEdwardsY(*bytes).decompress().is_some()
}

// =============================================================================
// Frozen per-resource seed layouts
// =============================================================================

/// Invite account address: `["invite", group, code]`.
pub fn invite_address(
    group: &Pubkey,
    code: &str,
    program_id: &Pubkey,
) -> Result<DerivedAddress, SeedError> {
    derive_address(&[INVITE_SEED, group.as_ref(), code.as_bytes()], program_id)
}

/// User profile account address: `["user", owner]`.
pub fn profile_address(owner: &Pubkey, program_id: &Pubkey) -> Result<DerivedAddress, SeedError> {
    derive_address(&[PROFILE_SEED, owner.as_ref()], program_id)
}

/// Group account address: `["group", name, creator]`.
pub fn group_address(
    name: &str,
    creator: &Pubkey,
    program_id: &Pubkey,
) -> Result<DerivedAddress, SeedError> {
    derive_address(
        &[GROUP_SEED, name.as_bytes(), creator.as_ref()],
        program_id,
    )
}

/// Group membership record address: `["member", group, member]`.
pub fn member_address(
    group: &Pubkey,
    member: &Pubkey,
    program_id: &Pubkey,
) -> Result<DerivedAddress, SeedError> {
    derive_address(&[MEMBER_SEED, group.as_ref(), member.as_ref()], program_id)
}
