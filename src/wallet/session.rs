// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chumchon

//! Wallet session state machine.
//!
//! The session wraps the external wallet provider behind an explicit state
//! enum so illegal combinations (signed-in while disconnected) are
//! unrepresentable:
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Authorized -> SignedIn
//!       ^                                                      |
//!       +----------------------- disconnect -------------------+
//! ```
//!
//! Sign-in attempts are serialized: a second concurrent caller waits on the
//! first attempt instead of issuing a second challenge, then observes the
//! already signed-in account. The wallet is untrusted; every sign-in proof is
//! re-verified against the issued challenge before the session advances.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::provider::{ProviderError, WalletProvider};
use crate::config::{AppIdentity, ClusterConfig};
use crate::ledger::{LedgerRpc, RpcError, SignerError, TransactionMessage, TransactionSigner};
use crate::models::Account;
use crate::siws::{self, ChallengeError, SignInChallenge, SignInProof};

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No wallet association.
    Disconnected,
    /// Association in progress.
    Connecting,
    /// Associated, not yet authorized.
    Connected,
    /// Authorized; an account is present.
    Authorized,
    /// Authorized and proven via sign-in.
    SignedIn,
}

/// Errors from session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Connect or authorize was refused by the user or failed provider-side.
    #[error("Wallet connection rejected: {0}")]
    ConnectionRejected(String),

    /// The operation needs an authorized session and none exists.
    #[error("No authorized wallet session")]
    NotConnected,

    /// The user declined the sign-in request; the session stays authorized.
    #[error("Sign-in declined by user")]
    Declined,

    /// The wallet's proof did not verify; the session stays authorized.
    #[error("Sign-in proof failed verification")]
    SignInVerificationFailed,

    /// The user declined to sign a transaction.
    #[error("Transaction signing rejected by user")]
    SignerRejected,

    /// The wallet returned an account this client cannot decode.
    #[error("Wallet returned an invalid account: {0}")]
    InvalidAccount(String),

    /// Challenge construction failed (bad domain/URI configuration).
    #[error(transparent)]
    Challenge(#[from] ChallengeError),

    /// Provider-side failure outside the cases above.
    #[error("Provider failure: {0}")]
    Provider(String),

    /// Ledger RPC failure while submitting a signed transaction.
    #[error(transparent)]
    Rpc(#[from] RpcError),
}

/// Mutable session state, guarded by a short-lived lock.
struct SessionInner {
    state: SessionState,
    account: Option<Account>,
    auth_token: Option<String>,
    /// Cancelled on disconnect to invalidate waits tied to this session.
    cancel: CancellationToken,
}

/// State machine wrapping connect/authorize/sign-in/disconnect against the
/// external wallet, plus the sign-and-send capability used by the
/// orchestrator.
pub struct WalletSession {
    provider: Arc<dyn WalletProvider>,
    rpc: Arc<dyn LedgerRpc>,
    identity: AppIdentity,
    chain: &'static str,
    inner: RwLock<SessionInner>,
    /// Serializes connect/authorize/sign-in flows (one wallet round trip at a
    /// time; concurrent sign-ins share one challenge).
    flow: Mutex<()>,
}

impl WalletSession {
    /// Create a disconnected session against `provider` and `rpc`.
    pub fn new(
        provider: Arc<dyn WalletProvider>,
        rpc: Arc<dyn LedgerRpc>,
        identity: AppIdentity,
        cluster: &ClusterConfig,
    ) -> Self {
        Self {
            provider,
            rpc,
            identity,
            chain: cluster.chain,
            inner: RwLock::new(SessionInner {
                state: SessionState::Disconnected,
                account: None,
                auth_token: None,
                cancel: CancellationToken::new(),
            }),
            flow: Mutex::new(()),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.read(|inner| inner.state)
    }

    /// The session's account, when authorized or signed in.
    pub fn account(&self) -> Option<Account> {
        self.read(|inner| inner.account.clone())
    }

    /// Whether an account is available for signing.
    pub fn is_authorized(&self) -> bool {
        matches!(
            self.state(),
            SessionState::Authorized | SessionState::SignedIn
        )
    }

    /// Open the wallet association. No-op when already connected.
    pub async fn connect(&self) -> Result<(), SessionError> {
        let _flow = self.flow.lock().await;

        if self.state() != SessionState::Disconnected {
            return Ok(());
        }

        self.write(|inner| inner.state = SessionState::Connecting);
        match self.provider.connect().await {
            Ok(()) => {
                self.write(|inner| inner.state = SessionState::Connected);
                debug!("wallet association established");
                Ok(())
            }
            Err(e) => {
                self.write(|inner| inner.state = SessionState::Disconnected);
                Err(SessionError::ConnectionRejected(e.to_string()))
            }
        }
    }

    /// Request authorization. Idempotent: an authorized session returns its
    /// cached account without a wallet round trip.
    pub async fn authorize(&self) -> Result<Account, SessionError> {
        let _flow = self.flow.lock().await;
        self.authorize_locked().await
    }

    async fn authorize_locked(&self) -> Result<Account, SessionError> {
        match self.state() {
            SessionState::Authorized | SessionState::SignedIn => {
                return self.account().ok_or(SessionError::NotConnected);
            }
            SessionState::Connected => {}
            SessionState::Disconnected | SessionState::Connecting => {
                return Err(SessionError::NotConnected);
            }
        }

        let auth = match self.provider.authorize(&self.identity, self.chain).await {
            Ok(auth) => auth,
            Err(ProviderError::Declined) => {
                return Err(SessionError::ConnectionRejected(
                    "authorization declined".to_string(),
                ));
            }
            Err(e) => return Err(SessionError::Provider(e.to_string())),
        };

        let granted = auth
            .accounts
            .first()
            .ok_or_else(|| SessionError::InvalidAccount("no accounts granted".to_string()))?;
        let account = granted
            .to_account()
            .map_err(|e| SessionError::InvalidAccount(e.to_string()))?;

        self.write(|inner| {
            inner.state = SessionState::Authorized;
            inner.account = Some(account.clone());
            inner.auth_token = Some(auth.auth_token.clone());
        });
        info!(account = %account.public_key, "wallet authorized");
        Ok(account)
    }

    /// Run the sign-in flow: issue one challenge, have the wallet sign it,
    /// verify the proof, and advance to `SignedIn`.
    ///
    /// Requires an authorized session. Concurrent callers are serialized; a
    /// caller that arrives while another attempt is in flight waits for it and
    /// receives the already signed-in account instead of issuing a second
    /// challenge. On verification failure the session stays `Authorized`.
    pub async fn sign_in(
        &self,
        domain: &str,
        statement: &str,
        uri: &str,
    ) -> Result<Account, SessionError> {
        let _flow = self.flow.lock().await;

        match self.state() {
            // A previous serialized attempt already signed in.
            SessionState::SignedIn => {
                return self.account().ok_or(SessionError::NotConnected);
            }
            SessionState::Authorized => {}
            _ => return Err(SessionError::NotConnected),
        }

        let challenge = SignInChallenge::new(domain, statement, uri)?;
        let result = match self.provider.sign_in(&self.identity, &challenge).await {
            Ok(result) => result,
            Err(ProviderError::Declined) => return Err(SessionError::Declined),
            Err(e) => return Err(SessionError::Provider(e.to_string())),
        };

        let account = result
            .account
            .to_account()
            .map_err(|e| SessionError::InvalidAccount(e.to_string()))?;
        let signature: [u8; 64] = result
            .signature
            .as_slice()
            .try_into()
            .map_err(|_| SessionError::SignInVerificationFailed)?;
        let proof = SignInProof {
            account: account.clone(),
            signature,
            signed_message: result.signed_message,
        };

        if !siws::verify(&challenge, &proof) {
            warn!(account = %account.public_key, "sign-in proof rejected");
            return Err(SessionError::SignInVerificationFailed);
        }

        self.write(|inner| {
            inner.state = SessionState::SignedIn;
            inner.account = Some(account.clone());
        });
        info!(account = %account.public_key, "signed in");
        Ok(account)
    }

    /// Tear the session down from any state.
    ///
    /// Cancels waits tied to this session, revokes the wallet authorization
    /// (failures logged, never masking teardown), and clears the account.
    pub async fn disconnect(&self) {
        // Invalidate dependent waits before anything else.
        let token = self.read(|inner| inner.cancel.clone());
        token.cancel();

        let _flow = self.flow.lock().await;

        let auth_token = self.read(|inner| inner.auth_token.clone());
        if let Some(auth_token) = auth_token {
            if let Err(e) = self.provider.deauthorize(&auth_token).await {
                warn!(error = %e, "deauthorize failed; clearing session anyway");
            }
        }

        self.write(|inner| {
            inner.state = SessionState::Disconnected;
            inner.account = None;
            inner.auth_token = None;
            inner.cancel = CancellationToken::new();
        });
        info!("wallet disconnected");
    }

    /// Sign `message` with the wallet and submit it to the ledger.
    ///
    /// The private key never leaves the wallet; this client only relays the
    /// signed bytes.
    pub async fn sign_and_send(&self, message: &TransactionMessage) -> Result<String, SessionError> {
        if !self.is_authorized() {
            return Err(SessionError::NotConnected);
        }

        let signed = match self.provider.sign_transaction(message).await {
            Ok(signed) => signed,
            Err(ProviderError::Declined) => return Err(SessionError::SignerRejected),
            Err(e) => return Err(SessionError::Provider(e.to_string())),
        };

        let signature = self.rpc.send_transaction(&signed).await?;
        debug!(signature, "transaction submitted");
        Ok(signature)
    }

    fn read<T>(&self, f: impl FnOnce(&SessionInner) -> T) -> T {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        f(&inner)
    }

    fn write(&self, f: impl FnOnce(&mut SessionInner)) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        f(&mut inner);
    }
}

#[async_trait]
impl TransactionSigner for WalletSession {
    async fn sign_and_send(&self, message: &TransactionMessage) -> Result<String, SignerError> {
        match WalletSession::sign_and_send(self, message).await {
            Ok(signature) => Ok(signature),
            Err(SessionError::SignerRejected) => Err(SignerError::Rejected),
            Err(SessionError::Rpc(e)) => Err(SignerError::Rpc(e)),
            Err(e) => Err(SignerError::Unavailable(e.to_string())),
        }
    }

    fn invalidation_token(&self) -> CancellationToken {
        self.read(|inner| inner.cancel.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{APP_IDENTITY, DEVNET};
    use crate::ledger::{
        AccountFilter, AccountLookup, ProgramAccount, SignatureStatus,
    };
    use crate::models::Pubkey;
    use crate::wallet::provider::{AuthResult, AuthorizedAccount, SignInResult};
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use ed25519_dalek::{Signer, SigningKey};
    use rand::rngs::OsRng;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullRpc;

    #[async_trait]
    impl LedgerRpc for NullRpc {
        async fn get_account(&self, _address: &Pubkey) -> Result<AccountLookup, RpcError> {
            Ok(AccountLookup::NotFound)
        }
        async fn get_program_accounts(
            &self,
            _program_id: &Pubkey,
            _filters: &[AccountFilter],
        ) -> Result<Vec<ProgramAccount>, RpcError> {
            Ok(Vec::new())
        }
        async fn get_latest_blockhash(&self) -> Result<String, RpcError> {
            Ok("BLOCKHASH".to_string())
        }
        async fn send_transaction(&self, _tx_bytes: &[u8]) -> Result<String, RpcError> {
            Ok("SIG".to_string())
        }
        async fn get_signature_status(
            &self,
            _signature: &str,
        ) -> Result<Option<SignatureStatus>, RpcError> {
            Ok(None)
        }
    }

    /// Fake wallet holding a real keypair so sign-in proofs verify.
    struct FakeWallet {
        signing: SigningKey,
        reject_connect: bool,
        decline_sign_in: bool,
        corrupt_signature: bool,
        connect_calls: AtomicUsize,
        authorize_calls: AtomicUsize,
        sign_in_calls: AtomicUsize,
        deauthorize_calls: AtomicUsize,
    }

    impl FakeWallet {
        fn new() -> Self {
            Self {
                signing: SigningKey::generate(&mut OsRng),
                reject_connect: false,
                decline_sign_in: false,
                corrupt_signature: false,
                connect_calls: AtomicUsize::new(0),
                authorize_calls: AtomicUsize::new(0),
                sign_in_calls: AtomicUsize::new(0),
                deauthorize_calls: AtomicUsize::new(0),
            }
        }

        fn pubkey(&self) -> Pubkey {
            Pubkey::new(self.signing.verifying_key().to_bytes())
        }

        fn granted(&self) -> AuthorizedAccount {
            AuthorizedAccount {
                address: BASE64.encode(self.pubkey().to_bytes()),
                label: Some("Main".to_string()),
            }
        }
    }

    #[async_trait]
    impl WalletProvider for FakeWallet {
        async fn connect(&self) -> Result<(), ProviderError> {
            self.connect_calls.fetch_add(1, Ordering::SeqCst);
            if self.reject_connect {
                Err(ProviderError::Declined)
            } else {
                Ok(())
            }
        }

        async fn authorize(
            &self,
            _identity: &AppIdentity,
            _chain: &str,
        ) -> Result<AuthResult, ProviderError> {
            self.authorize_calls.fetch_add(1, Ordering::SeqCst);
            Ok(AuthResult {
                auth_token: "token".to_string(),
                accounts: vec![self.granted()],
            })
        }

        async fn sign_in(
            &self,
            _identity: &AppIdentity,
            challenge: &SignInChallenge,
        ) -> Result<SignInResult, ProviderError> {
            self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
            if self.decline_sign_in {
                return Err(ProviderError::Declined);
            }
            let message = challenge.message_for(&self.pubkey());
            let mut signature = self.signing.sign(&message).to_bytes().to_vec();
            if self.corrupt_signature {
                signature[0] ^= 0x01;
            }
            Ok(SignInResult {
                account: self.granted(),
                signature,
                signed_message: message,
            })
        }

        async fn sign_transaction(
            &self,
            message: &TransactionMessage,
        ) -> Result<Vec<u8>, ProviderError> {
            Ok(message.to_bytes())
        }

        async fn deauthorize(&self, _auth_token: &str) -> Result<(), ProviderError> {
            self.deauthorize_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn session_with(wallet: Arc<FakeWallet>) -> WalletSession {
        WalletSession::new(wallet, Arc::new(NullRpc), APP_IDENTITY, &DEVNET)
    }

    async fn signed_in_session(wallet: Arc<FakeWallet>) -> WalletSession {
        let session = session_with(wallet);
        session.connect().await.unwrap();
        session.authorize().await.unwrap();
        session
            .sign_in(APP_IDENTITY.domain, "sign in", APP_IDENTITY.uri)
            .await
            .unwrap();
        session
    }

    #[tokio::test]
    async fn connect_authorize_sign_in_walks_the_states() {
        let wallet = Arc::new(FakeWallet::new());
        let session = session_with(wallet.clone());
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(session.account().is_none());

        session.connect().await.unwrap();
        assert_eq!(session.state(), SessionState::Connected);

        let account = session.authorize().await.unwrap();
        assert_eq!(session.state(), SessionState::Authorized);
        assert_eq!(account.public_key, wallet.pubkey());

        let signed_in = session
            .sign_in(APP_IDENTITY.domain, "sign in", APP_IDENTITY.uri)
            .await
            .unwrap();
        assert_eq!(session.state(), SessionState::SignedIn);
        assert_eq!(signed_in.public_key, wallet.pubkey());
    }

    #[tokio::test]
    async fn rejected_connect_returns_to_disconnected() {
        let mut wallet = FakeWallet::new();
        wallet.reject_connect = true;
        let session = session_with(Arc::new(wallet));

        let err = session.connect().await.unwrap_err();
        assert!(matches!(err, SessionError::ConnectionRejected(_)));
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn authorize_is_idempotent() {
        let wallet = Arc::new(FakeWallet::new());
        let session = session_with(wallet.clone());
        session.connect().await.unwrap();

        let first = session.authorize().await.unwrap();
        let second = session.authorize().await.unwrap();
        assert_eq!(first, second);
        // The second call served the cached account.
        assert_eq!(wallet.authorize_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn sign_in_requires_authorization() {
        let wallet = Arc::new(FakeWallet::new());
        let session = session_with(wallet);
        let err = session
            .sign_in(APP_IDENTITY.domain, "sign in", APP_IDENTITY.uri)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NotConnected));
    }

    #[tokio::test]
    async fn concurrent_sign_ins_issue_one_challenge() {
        let wallet = Arc::new(FakeWallet::new());
        let session = Arc::new(session_with(wallet.clone()));
        session.connect().await.unwrap();
        session.authorize().await.unwrap();

        let a = {
            let session = session.clone();
            tokio::spawn(async move {
                session
                    .sign_in(APP_IDENTITY.domain, "sign in", APP_IDENTITY.uri)
                    .await
            })
        };
        let b = {
            let session = session.clone();
            tokio::spawn(async move {
                session
                    .sign_in(APP_IDENTITY.domain, "sign in", APP_IDENTITY.uri)
                    .await
            })
        };

        let first = a.await.unwrap().unwrap();
        let second = b.await.unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(wallet.sign_in_calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.state(), SessionState::SignedIn);
    }

    #[tokio::test]
    async fn failed_verification_keeps_session_authorized() {
        let mut wallet = FakeWallet::new();
        wallet.corrupt_signature = true;
        let session = session_with(Arc::new(wallet));
        session.connect().await.unwrap();
        session.authorize().await.unwrap();

        let err = session
            .sign_in(APP_IDENTITY.domain, "sign in", APP_IDENTITY.uri)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::SignInVerificationFailed));
        assert_eq!(session.state(), SessionState::Authorized);
    }

    #[tokio::test]
    async fn declined_sign_in_keeps_session_authorized() {
        let mut wallet = FakeWallet::new();
        wallet.decline_sign_in = true;
        let session = session_with(Arc::new(wallet));
        session.connect().await.unwrap();
        session.authorize().await.unwrap();

        let err = session
            .sign_in(APP_IDENTITY.domain, "sign in", APP_IDENTITY.uri)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Declined));
        assert_eq!(session.state(), SessionState::Authorized);
    }

    #[tokio::test]
    async fn disconnect_clears_account_and_cancels_waits() {
        let wallet = Arc::new(FakeWallet::new());
        let session = signed_in_session(wallet.clone()).await;
        let token = TransactionSigner::invalidation_token(&session);
        assert!(!token.is_cancelled());

        session.disconnect().await;
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(session.account().is_none());
        assert!(token.is_cancelled());
        assert_eq!(wallet.deauthorize_calls.load(Ordering::SeqCst), 1);

        // A fresh connect gets a fresh, uncancelled token.
        session.connect().await.unwrap();
        let fresh = TransactionSigner::invalidation_token(&session);
        assert!(!fresh.is_cancelled());
    }

    #[tokio::test]
    async fn sign_and_send_requires_authorization() {
        let wallet = Arc::new(FakeWallet::new());
        let session = session_with(wallet);
        let message = TransactionMessage {
            fee_payer: Pubkey::new([1; 32]),
            recent_blockhash: "hash".to_string(),
            instructions: Vec::new(),
        };
        let err = WalletSession::sign_and_send(&session, &message)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NotConnected));
    }

    #[tokio::test]
    async fn sign_and_send_submits_signed_bytes() {
        let wallet = Arc::new(FakeWallet::new());
        let session = signed_in_session(wallet).await;
        let message = TransactionMessage {
            fee_payer: Pubkey::new([1; 32]),
            recent_blockhash: "hash".to_string(),
            instructions: Vec::new(),
        };
        let signature = WalletSession::sign_and_send(&session, &message)
            .await
            .unwrap();
        assert_eq!(signature, "SIG");
    }
}
