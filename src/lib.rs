// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chumchon

//! Chumchon Core - Wallet Session & Transaction Orchestration
//!
//! This crate is the authentication and on-chain transaction core of the
//! Chumchon mobile social app. Keys stay inside an external mobile wallet;
//! this crate proves key possession via domain-bound sign-in, maintains the
//! wallet session state machine, and orchestrates signed transactions against
//! the chumchon ledger program.
//!
//! ## Modules
//!
//! - `auth` - Process-wide authentication facade
//! - `wallet` - Wallet provider boundary and session state machine
//! - `siws` - Sign-in challenge issuance and proof verification
//! - `ledger` - JSON-RPC transport and transaction orchestration
//! - `pda` - Program-derived address computation
//! - `program` - Chumchon program instruction builders and account codecs
//! - `services` - Invite and profile domain services

pub mod auth;
pub mod config;
pub mod ledger;
pub mod models;
pub mod pda;
pub mod program;
pub mod services;
pub mod siws;
pub mod wallet;
