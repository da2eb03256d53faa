// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chumchon

//! Ledger types and constants.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::models::Pubkey;

/// Commitment level requested from the ledger.
///
/// Ordered by finality: `Processed < Confirmed < Finalized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    /// Observed by the node, may still be rolled back.
    Processed,
    /// Voted on by a supermajority.
    #[default]
    Confirmed,
    /// Rooted; cannot be rolled back.
    Finalized,
}

impl Commitment {
    /// Wire name used in RPC parameters.
    pub fn as_str(self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

/// Result of an account read.
///
/// Absence is an expected state, not an error; decode failures are surfaced by
/// the reading service, not by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountLookup {
    /// The account exists; raw program-owned data.
    Found(AccountData),
    /// No account at this address.
    NotFound,
}

/// Raw account contents as returned by the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountData {
    /// Program that owns the account.
    pub owner: Pubkey,
    /// Account data bytes.
    pub data: Vec<u8>,
    /// Balance in the ledger's native unit.
    pub lamports: u64,
}

/// One account + data pair from a program-accounts scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramAccount {
    /// The account's address.
    pub pubkey: Pubkey,
    /// Account data bytes.
    pub data: Vec<u8>,
}

/// Server-side filter for a program-accounts scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountFilter {
    /// Match accounts whose data equals `bytes` at `offset`.
    Memcmp { offset: usize, bytes: Vec<u8> },
    /// Match accounts of exactly this data length.
    DataSize(u64),
}

/// Confirmation state reported for a submitted signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureStatus {
    /// Highest commitment reached so far.
    pub commitment: Commitment,
    /// Program error string when the transaction executed and failed.
    pub err: Option<String>,
}

/// Account metadata for one instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct AccountMeta {
    /// The account address.
    pub pubkey: Pubkey,
    /// Whether the account must sign the transaction.
    pub is_signer: bool,
    /// Whether the instruction may mutate the account.
    pub is_writable: bool,
}

impl AccountMeta {
    /// Writable signer.
    pub fn signer(pubkey: Pubkey) -> Self {
        Self {
            pubkey,
            is_signer: true,
            is_writable: true,
        }
    }

    /// Writable non-signer.
    pub fn writable(pubkey: Pubkey) -> Self {
        Self {
            pubkey,
            is_signer: false,
            is_writable: true,
        }
    }

    /// Read-only non-signer.
    pub fn readonly(pubkey: Pubkey) -> Self {
        Self {
            pubkey,
            is_signer: false,
            is_writable: false,
        }
    }
}

/// One program invocation: target program, account list, opaque data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Instruction {
    /// Program to invoke.
    pub program_id: Pubkey,
    /// Accounts the instruction touches, in the program's declared order.
    pub accounts: Vec<AccountMeta>,
    /// Instruction data (discriminator + arguments).
    pub data: Vec<u8>,
}

/// The unsigned transaction handed to the wallet for signing.
///
/// Opaque to everything above the wallet/ledger boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct TransactionMessage {
    /// Account paying the transaction fee; always the first signer.
    pub fee_payer: Pubkey,
    /// Recent blockhash anchoring the transaction's validity window.
    pub recent_blockhash: String,
    /// Instructions, executed in order.
    pub instructions: Vec<Instruction>,
}

impl TransactionMessage {
    /// Serialized wire form.
    pub fn to_bytes(&self) -> Vec<u8> {
        borsh::to_vec(self).unwrap_or_default()
    }
}

/// Lifecycle of one submission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    /// Assembling instructions and blockhash.
    Building,
    /// Waiting on the wallet signature.
    Signing,
    /// Sent; awaiting confirmation.
    Submitted,
    /// Confirmed at the requested commitment.
    Confirmed,
    /// Executed and rejected by the program, or refused by the node.
    Failed,
    /// Sent, but confirmation was never observed. The effect may still land.
    Unknown,
}

impl TxStatus {
    /// Terminal states end a pending transaction's lifetime.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TxStatus::Confirmed | TxStatus::Failed | TxStatus::Unknown
        )
    }
}
