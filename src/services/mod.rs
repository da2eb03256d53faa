// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chumchon

//! Domain services over the ledger: invites and profiles.

pub mod invites;
pub mod profiles;

pub use invites::{InviteError, InviteService};
pub use profiles::{ProfileError, ProfileService};
