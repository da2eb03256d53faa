// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chumchon

//! JSON-RPC client for the ledger.
//!
//! The ledger is reached exclusively through this boundary: account reads,
//! transaction submission, and confirmation queries. Delivery is
//! at-least-once and results are eventually observable; callers own retry
//! policy (see the orchestrator).
//!
//! [`LedgerRpc`] is the injected capability; [`HttpRpc`] is the production
//! transport. Tests substitute fakes.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value};

use super::types::{
    AccountData, AccountFilter, AccountLookup, Commitment, ProgramAccount, SignatureStatus,
};
use crate::config::ClusterConfig;
use crate::models::Pubkey;

/// Errors that can occur at the RPC boundary.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Node error {code}: {message}")]
    Node { code: i64, message: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// The ledger RPC capability.
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Read one account. Absence is `AccountLookup::NotFound`, not an error.
    async fn get_account(&self, address: &Pubkey) -> Result<AccountLookup, RpcError>;

    /// Scan accounts owned by `program_id`, server-filtered.
    async fn get_program_accounts(
        &self,
        program_id: &Pubkey,
        filters: &[AccountFilter],
    ) -> Result<Vec<ProgramAccount>, RpcError>;

    /// Fetch a recent blockhash for transaction assembly.
    async fn get_latest_blockhash(&self) -> Result<String, RpcError>;

    /// Submit a signed transaction; returns its signature.
    async fn send_transaction(&self, tx_bytes: &[u8]) -> Result<String, RpcError>;

    /// Current confirmation status of a signature, if the node has seen it.
    async fn get_signature_status(
        &self,
        signature: &str,
    ) -> Result<Option<SignatureStatus>, RpcError>;
}

/// HTTP JSON-RPC transport.
pub struct HttpRpc {
    client: reqwest::Client,
    url: String,
    commitment: Commitment,
    next_id: AtomicU64,
}

impl HttpRpc {
    /// Create a client for the given endpoint at default commitment.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            commitment: Commitment::default(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a client for a known cluster.
    pub fn for_cluster(cluster: &ClusterConfig) -> Self {
        Self::new(cluster.rpc_url)
    }

    /// Override the commitment level.
    pub fn with_commitment(mut self, commitment: Commitment) -> Self {
        self.commitment = commitment;
        self
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        let envelope: Value = response
            .json()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        if let Some(err) = envelope.get("error") {
            return Err(RpcError::Node {
                code: err.get("code").and_then(Value::as_i64).unwrap_or_default(),
                message: err
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string(),
            });
        }

        envelope
            .get("result")
            .cloned()
            .ok_or_else(|| RpcError::MalformedResponse("missing result".to_string()))
    }
}

#[async_trait]
impl LedgerRpc for HttpRpc {
    async fn get_account(&self, address: &Pubkey) -> Result<AccountLookup, RpcError> {
        let result = self
            .call(
                "getAccountInfo",
                json!([
                    address.to_string(),
                    { "encoding": "base64", "commitment": self.commitment.as_str() },
                ]),
            )
            .await?;
        decode_account_lookup(&result)
    }

    async fn get_program_accounts(
        &self,
        program_id: &Pubkey,
        filters: &[AccountFilter],
    ) -> Result<Vec<ProgramAccount>, RpcError> {
        let filters: Vec<Value> = filters.iter().map(filter_to_json).collect();
        let result = self
            .call(
                "getProgramAccounts",
                json!([
                    program_id.to_string(),
                    {
                        "encoding": "base64",
                        "commitment": self.commitment.as_str(),
                        "filters": filters,
                    },
                ]),
            )
            .await?;
        decode_program_accounts(&result)
    }

    async fn get_latest_blockhash(&self) -> Result<String, RpcError> {
        let result = self
            .call(
                "getLatestBlockhash",
                json!([{ "commitment": self.commitment.as_str() }]),
            )
            .await?;
        result
            .pointer("/value/blockhash")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| RpcError::MalformedResponse("missing blockhash".to_string()))
    }

    async fn send_transaction(&self, tx_bytes: &[u8]) -> Result<String, RpcError> {
        let result = self
            .call(
                "sendTransaction",
                json!([
                    BASE64.encode(tx_bytes),
                    {
                        "encoding": "base64",
                        "preflightCommitment": self.commitment.as_str(),
                    },
                ]),
            )
            .await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| RpcError::MalformedResponse("signature is not a string".to_string()))
    }

    async fn get_signature_status(
        &self,
        signature: &str,
    ) -> Result<Option<SignatureStatus>, RpcError> {
        let result = self
            .call("getSignatureStatuses", json!([[signature]]))
            .await?;
        decode_signature_status(&result)
    }
}

fn filter_to_json(filter: &AccountFilter) -> Value {
    match filter {
        AccountFilter::Memcmp { offset, bytes } => json!({
            "memcmp": {
                "offset": offset,
                "bytes": bs58::encode(bytes).into_string(),
            }
        }),
        AccountFilter::DataSize(size) => json!({ "dataSize": size }),
    }
}

fn decode_account_lookup(result: &Value) -> Result<AccountLookup, RpcError> {
    let value = result
        .get("value")
        .ok_or_else(|| RpcError::MalformedResponse("missing value".to_string()))?;
    if value.is_null() {
        return Ok(AccountLookup::NotFound);
    }
    Ok(AccountLookup::Found(decode_account_data(value)?))
}

fn decode_account_data(value: &Value) -> Result<AccountData, RpcError> {
    let owner = value
        .get("owner")
        .and_then(Value::as_str)
        .ok_or_else(|| RpcError::MalformedResponse("missing owner".to_string()))?
        .parse::<Pubkey>()
        .map_err(|e| RpcError::MalformedResponse(e.to_string()))?;

    let encoded = value
        .pointer("/data/0")
        .and_then(Value::as_str)
        .ok_or_else(|| RpcError::MalformedResponse("missing account data".to_string()))?;
    let data = BASE64
        .decode(encoded)
        .map_err(|e| RpcError::MalformedResponse(format!("bad base64 data: {e}")))?;

    let lamports = value
        .get("lamports")
        .and_then(Value::as_u64)
        .unwrap_or_default();

    Ok(AccountData {
        owner,
        data,
        lamports,
    })
}

fn decode_program_accounts(result: &Value) -> Result<Vec<ProgramAccount>, RpcError> {
    let entries = result
        .as_array()
        .ok_or_else(|| RpcError::MalformedResponse("expected account list".to_string()))?;

    let mut accounts = Vec::with_capacity(entries.len());
    for entry in entries {
        let pubkey = entry
            .get("pubkey")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::MalformedResponse("missing pubkey".to_string()))?
            .parse::<Pubkey>()
            .map_err(|e| RpcError::MalformedResponse(e.to_string()))?;
        let account = entry
            .get("account")
            .ok_or_else(|| RpcError::MalformedResponse("missing account".to_string()))?;
        let data = decode_account_data(account)?.data;
        accounts.push(ProgramAccount { pubkey, data });
    }
    Ok(accounts)
}

fn decode_signature_status(result: &Value) -> Result<Option<SignatureStatus>, RpcError> {
    let entry = result
        .pointer("/value/0")
        .ok_or_else(|| RpcError::MalformedResponse("missing status entry".to_string()))?;
    if entry.is_null() {
        return Ok(None);
    }

    let commitment = match entry.get("confirmationStatus").and_then(Value::as_str) {
        Some("processed") => Commitment::Processed,
        Some("confirmed") => Commitment::Confirmed,
        Some("finalized") => Commitment::Finalized,
        _ => Commitment::Processed,
    };
    let err = match entry.get("err") {
        None | Some(Value::Null) => None,
        Some(other) => Some(other.to_string()),
    };

    Ok(Some(SignatureStatus { commitment, err }))
}
