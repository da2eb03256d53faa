// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chumchon

//! Process-wide authentication facade.
//!
//! [`AuthContext`] composes the wallet session, sign-in verification, and the
//! profile flow into the single source of authentication truth the rest of
//! the app consumes. Consumers watch one [`Session`] snapshot: `is_loading`
//! folds the three in-flight flags (sign-in, authorization, profile
//! submission) into one boolean, and the snapshot is reconstructed from the
//! wallet session on every state change rather than persisted anywhere; the
//! wallet provider's own authorization store is the source of truth.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::AppIdentity;
use crate::models::{Account, UserProfile};
use crate::services::{ProfileError, ProfileService};
use crate::wallet::{SessionError, SessionState, WalletSession};

/// Statement rendered into the sign-in message.
pub const SIGN_IN_STATEMENT: &str = "Sign into Chumchon - Decentralized Social App";

/// Point-in-time authentication snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Whether a wallet has proven key possession via sign-in.
    pub is_authenticated: bool,
    /// Whether any auth-related operation is in flight.
    pub is_loading: bool,
    /// The signed-in account, if any.
    pub account: Option<Account>,
    /// The account's on-chain profile, when one exists.
    pub profile: Option<UserProfile>,
}

/// Errors from the facade.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The operation needs an authorized session and none exists. Checked
    /// before building any transaction.
    #[error("No authorized wallet session")]
    NotConnected,

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Profile(#[from] ProfileError),
}

#[derive(Default)]
struct LoadingFlags {
    sign_in: AtomicBool,
    authorize: AtomicBool,
    profile: AtomicBool,
}

impl LoadingFlags {
    fn any(&self) -> bool {
        self.sign_in.load(Ordering::SeqCst)
            || self.authorize.load(Ordering::SeqCst)
            || self.profile.load(Ordering::SeqCst)
    }
}

/// The app-wide authentication context.
pub struct AuthContext {
    wallet: Arc<WalletSession>,
    profiles: Arc<ProfileService>,
    identity: AppIdentity,
    profile: RwLock<Option<UserProfile>>,
    loading: LoadingFlags,
    snapshot: watch::Sender<Session>,
}

/// Marks one loading flag for the duration of a flow and republishes the
/// snapshot on entry and exit, so consumers always observe the folded
/// `is_loading` transition.
struct LoadingGuard<'a> {
    ctx: &'a AuthContext,
    flag: &'a AtomicBool,
}

impl<'a> LoadingGuard<'a> {
    fn new(ctx: &'a AuthContext, flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        ctx.publish();
        Self { ctx, flag }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
        self.ctx.publish();
    }
}

impl AuthContext {
    /// Create the facade over an existing wallet session and profile service.
    pub fn new(
        wallet: Arc<WalletSession>,
        profiles: Arc<ProfileService>,
        identity: AppIdentity,
    ) -> Self {
        let (snapshot, _) = watch::channel(Session::default());
        Self {
            wallet,
            profiles,
            identity,
            profile: RwLock::new(None),
            loading: LoadingFlags::default(),
            snapshot,
        }
    }

    /// Current snapshot.
    pub fn session(&self) -> Session {
        self.snapshot.borrow().clone()
    }

    /// Watch snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.snapshot.subscribe()
    }

    /// Run the full sign-in flow: connect, authorize, prove key possession,
    /// and load the account's profile.
    ///
    /// A missing profile does not fail sign-in: the session is authenticated
    /// with `profile: None` and the app routes to onboarding.
    pub async fn sign_in(&self) -> Result<Account, AuthError> {
        let _guard = LoadingGuard::new(self, &self.loading.sign_in);

        self.wallet.connect().await?;
        {
            let _authorizing = LoadingGuard::new(self, &self.loading.authorize);
            self.wallet.authorize().await?;
        }
        let account = self
            .wallet
            .sign_in(self.identity.domain, SIGN_IN_STATEMENT, self.identity.uri)
            .await?;

        match self.profiles.get_user_profile(&account.public_key).await {
            Ok(profile) => self.set_profile(profile),
            Err(e) => {
                // Sign-in stands on its own; the profile can be refreshed.
                warn!(error = %e, "profile load failed after sign-in");
                self.set_profile(None);
            }
        }

        info!(account = %account.public_key, "signed in");
        Ok(account)
    }

    /// Tear down the session and clear the snapshot.
    pub async fn sign_out(&self) {
        self.wallet.disconnect().await;
        self.set_profile(None);
        info!("signed out");
    }

    /// Create the on-chain profile for the signed-in account.
    ///
    /// Fails with [`AuthError::NotConnected`] before building any transaction
    /// when no authorized session exists.
    pub async fn create_profile(
        &self,
        username: &str,
        bio: &str,
    ) -> Result<UserProfile, AuthError> {
        let account = self.authorized_account()?;
        let _guard = LoadingGuard::new(self, &self.loading.profile);

        let profile = self
            .profiles
            .create_user_profile(
                self.wallet.as_ref(),
                account.public_key,
                username,
                bio,
                false,
            )
            .await?;
        self.set_profile(Some(profile.clone()));
        Ok(profile)
    }

    /// Re-fetch the signed-in account's profile from the ledger.
    pub async fn refresh_profile(&self) -> Result<Option<UserProfile>, AuthError> {
        let account = self.authorized_account()?;
        let _guard = LoadingGuard::new(self, &self.loading.profile);

        let profile = self.profiles.get_user_profile(&account.public_key).await?;
        self.set_profile(profile.clone());
        Ok(profile)
    }

    fn authorized_account(&self) -> Result<Account, AuthError> {
        if !self.wallet.is_authorized() {
            return Err(AuthError::NotConnected);
        }
        self.wallet.account().ok_or(AuthError::NotConnected)
    }

    fn set_profile(&self, profile: Option<UserProfile>) {
        *self.profile.write().unwrap_or_else(|e| e.into_inner()) = profile;
        self.publish();
    }

    /// Rebuild the snapshot from the wallet session and in-flight flags.
    fn publish(&self) {
        let profile = self
            .profile
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let session = Session {
            is_authenticated: self.wallet.state() == SessionState::SignedIn,
            is_loading: self.loading.any(),
            account: self.wallet.account(),
            profile,
        };
        self.snapshot.send_replace(session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{APP_IDENTITY, DEVNET};
    use crate::ledger::{
        AccountData, AccountFilter, AccountLookup, Commitment, LedgerRpc, ProgramAccount,
        RpcError, SignatureStatus, SubmitConfig, TransactionMessage, TransactionOrchestrator,
    };
    use crate::models::Pubkey;
    use crate::siws::SignInChallenge;
    use crate::wallet::provider::{
        AuthResult, AuthorizedAccount, ProviderError, SignInResult, WalletProvider,
    };
    use async_trait::async_trait;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use borsh::BorshSerialize;
    use ed25519_dalek::{Signer, SigningKey};
    use rand::rngs::OsRng;
    use sha2::{Digest, Sha256};
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;

    struct FakeWallet {
        signing: SigningKey,
        sign_in_gate: Option<Arc<Notify>>,
        sign_calls: AtomicUsize,
    }

    impl FakeWallet {
        fn new() -> Self {
            Self {
                signing: SigningKey::generate(&mut OsRng),
                sign_in_gate: None,
                sign_calls: AtomicUsize::new(0),
            }
        }

        fn pubkey(&self) -> Pubkey {
            Pubkey::new(self.signing.verifying_key().to_bytes())
        }

        fn granted(&self) -> AuthorizedAccount {
            AuthorizedAccount {
                address: BASE64.encode(self.pubkey().to_bytes()),
                label: None,
            }
        }
    }

    #[async_trait]
    impl WalletProvider for FakeWallet {
        async fn connect(&self) -> Result<(), ProviderError> {
            Ok(())
        }

        async fn authorize(
            &self,
            _identity: &AppIdentity,
            _chain: &str,
        ) -> Result<AuthResult, ProviderError> {
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
            if let Some(gate) = &self.sign_in_gate {
                gate.notified().await;
            }
            let message = challenge.message_for(&self.pubkey());
            Ok(SignInResult {
                account: self.granted(),
                signature: self.signing.sign(&message).to_bytes().to_vec(),
                signed_message: message,
            })
        }

        async fn sign_transaction(
            &self,
            message: &TransactionMessage,
        ) -> Result<Vec<u8>, ProviderError> {
            self.sign_calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(message.to_bytes())
        }

        async fn deauthorize(&self, _auth_token: &str) -> Result<(), ProviderError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockRpc {
        accounts: Mutex<HashMap<Pubkey, Vec<u8>>>,
    }

    #[async_trait]
    impl LedgerRpc for MockRpc {
        async fn get_account(&self, address: &Pubkey) -> Result<AccountLookup, RpcError> {
            Ok(match self.accounts.lock().unwrap().get(address) {
                Some(data) => AccountLookup::Found(AccountData {
                    owner: crate::config::program_id(),
                    data: data.clone(),
                    lamports: 1,
                }),
                None => AccountLookup::NotFound,
            })
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
            Ok(Some(SignatureStatus {
                commitment: Commitment::Confirmed,
                err: None,
            }))
        }
    }

    #[derive(BorshSerialize)]
    struct RawProfile {
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

    fn profile_bytes(owner: Pubkey) -> Vec<u8> {
        let digest = Sha256::digest("account:UserProfile");
        let mut data = digest[..8].to_vec();
        let raw = RawProfile {
            owner,
            username: "ann".to_string(),
            bio: "hi".to_string(),
            profile_picture_url: None,
            nft_profile_picture: None,
            show_balance: false,
            created_at: 1_600_000_000,
            last_active: 1_600_000_000,
            completed_tutorials: Vec::new(),
            tutorial_rewards: 0,
            bump: 255,
        };
        data.extend_from_slice(&borsh::to_vec(&raw).unwrap());
        data
    }

    fn context(wallet: Arc<FakeWallet>, rpc: Arc<MockRpc>) -> AuthContext {
        let session = Arc::new(WalletSession::new(
            wallet,
            rpc.clone(),
            APP_IDENTITY,
            &DEVNET,
        ));
        let config = SubmitConfig {
            build_retry_base: Duration::from_millis(1),
            confirm_interval: Duration::from_millis(1),
            confirm_timeout: Duration::from_millis(100),
            ..SubmitConfig::default()
        };
        let orchestrator = Arc::new(TransactionOrchestrator::with_config(rpc.clone(), config));
        let profiles = Arc::new(ProfileService::new(
            rpc,
            orchestrator,
            crate::config::program_id(),
        ));
        AuthContext::new(session, profiles, APP_IDENTITY)
    }

    fn seed_profile(rpc: &MockRpc, owner: Pubkey) {
        let address = crate::pda::profile_address(&owner, &crate::config::program_id())
            .unwrap()
            .address;
        rpc.accounts
            .lock()
            .unwrap()
            .insert(address, profile_bytes(owner));
    }

    #[tokio::test]
    async fn sign_in_authenticates_and_loads_profile() {
        let wallet = Arc::new(FakeWallet::new());
        let rpc = Arc::new(MockRpc::default());
        seed_profile(&rpc, wallet.pubkey());
        let ctx = context(wallet.clone(), rpc);

        let account = ctx.sign_in().await.expect("signed in");
        assert_eq!(account.public_key, wallet.pubkey());

        let session = ctx.session();
        assert!(session.is_authenticated);
        assert!(!session.is_loading);
        assert_eq!(session.account, Some(account));
        assert_eq!(session.profile.as_ref().map(|p| p.username.as_str()), Some("ann"));
    }

    #[tokio::test]
    async fn sign_in_without_profile_routes_to_onboarding() {
        let wallet = Arc::new(FakeWallet::new());
        let ctx = context(wallet, Arc::new(MockRpc::default()));

        ctx.sign_in().await.expect("signed in");
        let session = ctx.session();
        assert!(session.is_authenticated);
        assert!(session.profile.is_none());
    }

    #[tokio::test]
    async fn loading_flag_folds_in_flight_work() {
        let mut wallet = FakeWallet::new();
        let gate = Arc::new(Notify::new());
        wallet.sign_in_gate = Some(gate.clone());
        let ctx = Arc::new(context(Arc::new(wallet), Arc::new(MockRpc::default())));

        let mut rx = ctx.subscribe();
        let task = {
            let ctx = ctx.clone();
            tokio::spawn(async move { ctx.sign_in().await })
        };

        // Observe the folded loading flag while the wallet holds the flow.
        loop {
            rx.changed().await.unwrap();
            let snapshot = rx.borrow().clone();
            if snapshot.is_loading {
                assert!(!snapshot.is_authenticated);
                break;
            }
        }

        gate.notify_one();
        task.await.unwrap().expect("signed in");
        assert!(!ctx.session().is_loading);
        assert!(ctx.session().is_authenticated);
    }

    #[tokio::test]
    async fn create_profile_requires_session_before_building() {
        let wallet = Arc::new(FakeWallet::new());
        let ctx = context(wallet.clone(), Arc::new(MockRpc::default()));

        let err = ctx.create_profile("ann", "hi").await.unwrap_err();
        assert!(matches!(err, AuthError::NotConnected));
        // Nothing reached the wallet.
        assert_eq!(wallet.sign_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn create_profile_updates_snapshot() {
        let wallet = Arc::new(FakeWallet::new());
        let ctx = context(wallet.clone(), Arc::new(MockRpc::default()));
        ctx.sign_in().await.expect("signed in");

        let profile = ctx.create_profile("ann", "hi").await.expect("created");
        assert_eq!(profile.owner, wallet.pubkey());
        assert_eq!(
            ctx.session().profile.map(|p| p.username),
            Some("ann".to_string())
        );
        assert_eq!(wallet.sign_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn sign_out_resets_snapshot() {
        let wallet = Arc::new(FakeWallet::new());
        let rpc = Arc::new(MockRpc::default());
        seed_profile(&rpc, wallet.pubkey());
        let ctx = context(wallet, rpc);

        ctx.sign_in().await.expect("signed in");
        ctx.sign_out().await;

        let session = ctx.session();
        assert_eq!(session, Session::default());
    }

    #[tokio::test]
    async fn refresh_profile_pulls_latest_state() {
        let wallet = Arc::new(FakeWallet::new());
        let rpc = Arc::new(MockRpc::default());
        let ctx = context(wallet.clone(), rpc.clone());
        ctx.sign_in().await.expect("signed in");
        assert!(ctx.session().profile.is_none());

        // Profile appears on chain after sign-in (e.g. created on another device).
        seed_profile(&rpc, wallet.pubkey());
        let refreshed = ctx.refresh_profile().await.expect("refreshed");
        assert!(refreshed.is_some());
        assert!(ctx.session().profile.is_some());
    }
}
