// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chumchon

//! # Runtime Configuration Constants
//!
//! This module defines environment variable names, cluster endpoints, and the
//! app identity presented to wallets. Configuration is read from the
//! environment by the embedding application at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `CHUMCHON_RPC_URL` | Ledger JSON-RPC endpoint override | cluster default |
//! | `CHUMCHON_CLUSTER` | Cluster name (`devnet` or `mainnet-beta`) | `devnet` |
//! | `RUST_LOG` | Log level filter | `info` |

use crate::models::Pubkey;

/// Initialize structured logging for the embedding application.
///
/// Honors `RUST_LOG`; defaults to `info`. Safe to call once at startup; a
/// second call is a no-op rather than a panic.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}

/// Environment variable name for the JSON-RPC endpoint override.
pub const RPC_URL_ENV: &str = "CHUMCHON_RPC_URL";

/// Environment variable name for the cluster selection.
pub const CLUSTER_ENV: &str = "CHUMCHON_CLUSTER";

/// Ledger cluster configuration.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Cluster name for display
    pub name: &'static str,
    /// Chain identifier presented to wallets (`solana:<cluster>`)
    pub chain: &'static str,
    /// RPC endpoint URL
    pub rpc_url: &'static str,
    /// Block explorer URL
    pub explorer_url: &'static str,
}

/// Devnet cluster configuration.
pub const DEVNET: ClusterConfig = ClusterConfig {
    name: "devnet",
    chain: "solana:devnet",
    rpc_url: "https://api.devnet.solana.com",
    explorer_url: "https://explorer.solana.com",
};

/// Mainnet cluster configuration.
pub const MAINNET: ClusterConfig = ClusterConfig {
    name: "mainnet-beta",
    chain: "solana:mainnet",
    rpc_url: "https://api.mainnet-beta.solana.com",
    explorer_url: "https://explorer.solana.com",
};

/// Supported cluster identifier for this build.
pub const CLUSTER_DEVNET: &str = "devnet";

/// Validate cluster input for the devnet-only runtime.
pub fn ensure_devnet_cluster(raw: Option<&str>) -> Result<(), String> {
    let value = raw.unwrap_or(CLUSTER_DEVNET).trim().to_ascii_lowercase();
    if value == CLUSTER_DEVNET {
        Ok(())
    } else {
        Err(format!(
            "Only `{CLUSTER_DEVNET}` cluster is supported in this deployment."
        ))
    }
}

/// Base58 id of the chumchon ledger program.
pub const PROGRAM_ID: &str = "CVjwSHMQ9YTenzKwQczwXWzJFk5kwaUhKDtxDKVazJXj";

/// Parsed program id.
///
/// The constant above is validated by test, so the parse cannot fail at
/// runtime.
pub fn program_id() -> Pubkey {
    PROGRAM_ID.parse().unwrap_or(Pubkey::new([0u8; 32]))
}

/// App identity presented to wallets during authorization and sign-in.
#[derive(Debug, Clone)]
pub struct AppIdentity {
    /// Human-readable app name
    pub name: &'static str,
    /// Canonical app URI
    pub uri: &'static str,
    /// Sign-in domain (host of `uri`)
    pub domain: &'static str,
    /// Icon path, resolved relative to `uri`
    pub icon: &'static str,
}

/// The Chumchon app identity.
pub const APP_IDENTITY: AppIdentity = AppIdentity {
    name: "Chumchon",
    uri: "https://chumchon.app",
    domain: "chumchon.app",
    icon: "/favicon.ico",
};
