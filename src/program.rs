// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chumchon

//! Chumchon program client: instruction builders and account codecs.
//!
//! The ledger program's wire conventions are Anchor's: every instruction's
//! data starts with the 8-byte SHA-256 tag of `global:<instruction name>` and
//! every account's data with the tag of `account:<AccountName>`, followed by
//! Borsh-encoded fields. Account lists mirror the program's declared order
//! exactly; a reordering is rejected on-chain.
//!
//! Program accounts are allocated at a fixed size, so decoded payloads carry
//! zero padding after the Borsh fields; the decoders here tolerate it.

use borsh::{BorshDeserialize, BorshSerialize};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::ledger::{AccountFilter, AccountMeta, Instruction};
use crate::models::{Invite, Pubkey, UserProfile};
use crate::pda::{self, SeedError};

/// The system program, required by account-creating instructions.
pub const SYSTEM_PROGRAM_ID: Pubkey = Pubkey::new([0u8; 32]);

/// 8-byte instruction tag: `sha256("global:<name>")[..8]`.
fn instruction_discriminator(name: &str) -> [u8; 8] {
    let digest = Sha256::digest(format!("global:{name}"));
    digest[..8].try_into().unwrap_or_default()
}

/// 8-byte account tag: `sha256("account:<Name>")[..8]`.
fn account_discriminator(name: &str) -> [u8; 8] {
    let digest = Sha256::digest(format!("account:{name}"));
    digest[..8].try_into().unwrap_or_default()
}

fn instruction_data<T: BorshSerialize>(name: &str, args: &T) -> Vec<u8> {
    let mut data = instruction_discriminator(name).to_vec();
    if let Ok(encoded) = borsh::to_vec(args) {
        data.extend_from_slice(&encoded);
    }
    data
}

/// Errors decoding a program account.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("Account data too short")]
    TooShort,

    #[error("Account discriminator mismatch")]
    WrongDiscriminator,

    #[error("Account decode failed: {0}")]
    Decode(String),
}

// =============================================================================
// Instruction builders
// =============================================================================

#[derive(BorshSerialize)]
struct CreateInviteArgs {
    code: String,
    max_uses: u32,
    expires_at: i64,
}

/// `create_invite(code, max_uses, expires_at)`.
///
/// Accounts: fee payer, invite PDA, group, creator, system program.
pub fn create_invite(
    program_id: &Pubkey,
    fee_payer: &Pubkey,
    creator: &Pubkey,
    group: &Pubkey,
    code: &str,
    max_uses: u32,
    expires_at: DateTime<Utc>,
) -> Result<Instruction, SeedError> {
    let invite = pda::invite_address(group, code, program_id)?;
    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::signer(*fee_payer),
            AccountMeta::writable(invite.address),
            AccountMeta::readonly(*group),
            AccountMeta::signer(*creator),
            AccountMeta::readonly(SYSTEM_PROGRAM_ID),
        ],
        data: instruction_data(
            "create_invite",
            &CreateInviteArgs {
                code: code.to_string(),
                max_uses,
                expires_at: expires_at.timestamp(),
            },
        ),
    })
}

#[derive(BorshSerialize)]
struct UseInviteArgs {
    invite_code: String,
}

/// `use_invite(invite_code)`: redeems one use and records membership.
///
/// Accounts: fee payer, member, invite PDA, group, member-record PDA, system
/// program.
pub fn use_invite(
    program_id: &Pubkey,
    fee_payer: &Pubkey,
    member: &Pubkey,
    group: &Pubkey,
    code: &str,
) -> Result<Instruction, SeedError> {
    let invite = pda::invite_address(group, code, program_id)?;
    let member_record = pda::member_address(group, member, program_id)?;
    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::signer(*fee_payer),
            AccountMeta::signer(*member),
            AccountMeta::writable(invite.address),
            AccountMeta::writable(*group),
            AccountMeta::writable(member_record.address),
            AccountMeta::readonly(SYSTEM_PROGRAM_ID),
        ],
        data: instruction_data(
            "use_invite",
            &UseInviteArgs {
                invite_code: code.to_string(),
            },
        ),
    })
}

#[derive(BorshSerialize)]
struct ProfileArgs {
    username: String,
    bio: String,
    show_balance: bool,
}

/// `create_user_profile(username, bio, show_balance)`.
///
/// Accounts: fee payer, profile PDA, owner, system program.
pub fn create_user_profile(
    program_id: &Pubkey,
    fee_payer: &Pubkey,
    owner: &Pubkey,
    username: &str,
    bio: &str,
    show_balance: bool,
) -> Result<Instruction, SeedError> {
    let profile = pda::profile_address(owner, program_id)?;
    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::signer(*fee_payer),
            AccountMeta::writable(profile.address),
            AccountMeta::signer(*owner),
            AccountMeta::readonly(SYSTEM_PROGRAM_ID),
        ],
        data: instruction_data(
            "create_user_profile",
            &ProfileArgs {
                username: username.to_string(),
                bio: bio.to_string(),
                show_balance,
            },
        ),
    })
}

/// `update_user_profile(username, bio, show_balance)`.
pub fn update_user_profile(
    program_id: &Pubkey,
    fee_payer: &Pubkey,
    owner: &Pubkey,
    username: &str,
    bio: &str,
    show_balance: bool,
) -> Result<Instruction, SeedError> {
    let profile = pda::profile_address(owner, program_id)?;
    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::signer(*fee_payer),
            AccountMeta::writable(profile.address),
            AccountMeta::signer(*owner),
            AccountMeta::readonly(SYSTEM_PROGRAM_ID),
        ],
        data: instruction_data(
            "update_user_profile",
            &ProfileArgs {
                username: username.to_string(),
                bio: bio.to_string(),
                show_balance,
            },
        ),
    })
}

// =============================================================================
// Account codecs
// =============================================================================

/// On-chain invite account layout.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
struct InviteAccount {
    group: Pubkey,
    creator: Pubkey,
    code: String,
    max_uses: u32,
    uses: u32,
    expires_at: i64,
    bump: u8,
}

/// On-chain user profile account layout.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
struct UserProfileAccount {
    owner: Pubkey,
    username: String,
    bio: String,
    profile_picture_url: Option<String>,
    nft_profile_picture: Option<Pubkey>,
    show_balance: bool,
    created_at: i64,
    last_active: i64,
    completed_tutorials: Vec<u8>,
    tutorial_rewards: u64,
    bump: u8,
}

fn strip_discriminator<'a>(name: &str, data: &'a [u8]) -> Result<&'a [u8], CodecError> {
    if data.len() < 8 {
        return Err(CodecError::TooShort);
    }
    if data[..8] != account_discriminator(name) {
        return Err(CodecError::WrongDiscriminator);
    }
    Ok(&data[8..])
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

/// Decode an invite account fetched from `address`.
pub fn decode_invite(address: Pubkey, data: &[u8]) -> Result<Invite, CodecError> {
    let mut payload = strip_discriminator("Invite", data)?;
    let account =
        InviteAccount::deserialize(&mut payload).map_err(|e| CodecError::Decode(e.to_string()))?;
    Ok(Invite {
        address,
        group: account.group,
        creator: account.creator,
        code: account.code,
        max_uses: account.max_uses,
        uses: account.uses,
        expires_at: timestamp(account.expires_at),
    })
}

/// Decode a user profile account.
pub fn decode_user_profile(data: &[u8]) -> Result<UserProfile, CodecError> {
    let mut payload = strip_discriminator("UserProfile", data)?;
    let account = UserProfileAccount::deserialize(&mut payload)
        .map_err(|e| CodecError::Decode(e.to_string()))?;
    Ok(UserProfile {
        owner: account.owner,
        username: account.username,
        bio: account.bio,
        profile_picture_url: account.profile_picture_url,
        nft_profile_picture: account.nft_profile_picture,
        show_balance: account.show_balance,
        created_at: timestamp(account.created_at),
        last_active: timestamp(account.last_active),
        tutorial_rewards: account.tutorial_rewards,
    })
}

/// Server-side filters selecting a group's invite accounts.
pub fn group_invite_filters(group: &Pubkey) -> Vec<AccountFilter> {
    vec![
        AccountFilter::Memcmp {
            offset: 0,
            bytes: account_discriminator("Invite").to_vec(),
        },
        // `group` is the first field after the discriminator.
        AccountFilter::Memcmp {
            offset: 8,
            bytes: group.as_ref().to_vec(),
        },
    ]
}
