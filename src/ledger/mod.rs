// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chumchon

//! Ledger integration module.
//!
//! This module provides functionality for:
//! - Reading program accounts over JSON-RPC
//! - Building and submitting transactions through an injected signer
//! - Confirmation polling with bounded timeouts

pub mod orchestrator;
pub mod rpc;
pub mod types;

pub use orchestrator::{
    BuildError, SignerError, SubmitConfig, SubmitError, TransactionOrchestrator, TransactionSigner,
};
pub use rpc::{HttpRpc, LedgerRpc, RpcError};
pub use types::*;
