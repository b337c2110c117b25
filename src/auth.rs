// SPDX-License-Identifier: GPL-3.0-only

//! Identity provider
//!
//! The app only needs a user id and an email. [`AuthProvider`] is the seam
//! for a hosted identity service; [`LocalAuthProvider`] keeps accounts in a
//! JSON file next to the document store so the CLI works offline.

use crate::constants::auth::{
    MIN_PASSWORD_LENGTH, PASSWORD_KEY_LENGTH, PBKDF2_ITERATIONS, RESET_TOKEN_LENGTH,
};
use crate::errors::{AppError, AuthError};
use chrono::{DateTime, Utc};
use pbkdf2::pbkdf2_hmac;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// A signed-in identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub uid: String,
    pub email: String,
}

/// Observable authentication state
///
/// `loading` is true until the provider has restored any saved session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    pub user: Option<User>,
    pub loading: bool,
}

impl AuthState {
    pub fn loading() -> Self {
        Self {
            user: None,
            loading: true,
        }
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Identity provider operations
pub trait AuthProvider: Send + Sync {
    fn sign_up(&self, email: &str, password: &str) -> AuthResult<User>;

    fn sign_in(&self, email: &str, password: &str) -> AuthResult<User>;

    fn sign_out(&self) -> AuthResult<()>;

    /// Start a password reset for `email`
    fn send_password_reset_email(&self, email: &str) -> AuthResult<()>;

    /// Watch authentication state changes
    fn subscribe(&self) -> watch::Receiver<AuthState>;

    fn current_user(&self) -> Option<User> {
        self.subscribe().borrow().user.clone()
    }
}

/// Guard for operations that need a signed-in user
///
/// Also refuses while the provider is still restoring its session, so no
/// operation ever runs on behalf of an identity that might not exist.
pub fn require_user(provider: &dyn AuthProvider) -> Result<User, AppError> {
    let state = provider.subscribe().borrow().clone();
    match state {
        AuthState {
            user: Some(user),
            loading: false,
        } => Ok(user),
        _ => Err(AppError::NotAuthenticated),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Account {
    uid: String,
    email: String,
    salt: String,
    /// Hex PBKDF2-HMAC-SHA256 key
    password_hash: String,
    /// Rounds used for `password_hash`
    iterations: u32,
    created_at: DateTime<Utc>,
}

impl Account {
    fn set_password(&mut self, password: &str, iterations: u32) {
        self.salt = new_salt();
        self.iterations = iterations;
        self.password_hash = hash_password(&self.salt, password, iterations);
    }

    fn verify_password(&self, password: &str) -> bool {
        let candidate = hash_password(&self.salt, password, self.iterations);
        candidate
            .as_bytes()
            .ct_eq(self.password_hash.as_bytes())
            .unwrap_u8()
            == 1
    }

    fn user(&self) -> User {
        User {
            uid: self.uid.clone(),
            email: self.email.clone(),
        }
    }
}

/// A pending password reset
///
/// There is no mail transport; the request lands in an outbox that the CLI
/// prints and the tests read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetRequest {
    pub email: String,
    pub token: String,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct AuthFile {
    accounts: BTreeMap<String, Account>,
    session: Option<String>,
    reset_outbox: Vec<ResetRequest>,
}

/// Local identity provider persisted to a JSON file
pub struct LocalAuthProvider {
    path: Option<PathBuf>,
    data: Mutex<AuthFile>,
    state: watch::Sender<AuthState>,
    hash_iterations: u32,
}

impl LocalAuthProvider {
    /// Provider with no persistence
    pub fn in_memory() -> Self {
        Self::with_data(None, AuthFile::default())
    }

    /// Open the provider backed by `path`, restoring a saved session
    pub fn open(path: impl Into<PathBuf>) -> AuthResult<Self> {
        let path = path.into();
        let data = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| AuthError::Provider(format!("{}: {}", path.display(), e)))?;
            serde_json::from_str(&text)
                .map_err(|e| AuthError::Provider(format!("{}: {}", path.display(), e)))?
        } else {
            AuthFile::default()
        };
        Ok(Self::with_data(Some(path), data))
    }

    fn with_data(path: Option<PathBuf>, data: AuthFile) -> Self {
        let (state, _) = watch::channel(AuthState::loading());
        let provider = Self {
            path,
            data: Mutex::new(data),
            state,
            hash_iterations: PBKDF2_ITERATIONS,
        };
        provider.restore_session();
        provider
    }

    fn restore_session(&self) {
        let user = self.lock().ok().and_then(|data| {
            let uid = data.session.as_ref()?;
            data.accounts
                .values()
                .find(|account| &account.uid == uid)
                .map(Account::user)
        });
        if let Some(user) = &user {
            debug!(email = %user.email, "Restored session");
        }
        self.state.send_replace(AuthState {
            user,
            loading: false,
        });
    }

    /// Hash passwords set from now on with `iterations` PBKDF2 rounds
    ///
    /// Existing accounts keep verifying with the rounds they were hashed with.
    pub fn with_hash_iterations(mut self, iterations: u32) -> Self {
        self.hash_iterations = iterations.max(1);
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Password reset requests issued so far, oldest first
    pub fn reset_outbox(&self) -> Vec<ResetRequest> {
        self.lock()
            .map(|data| data.reset_outbox.clone())
            .unwrap_or_default()
    }

    /// Finish a password reset with the token from the outbox
    pub fn confirm_password_reset(&self, token: &str, new_password: &str) -> AuthResult<()> {
        validate_password(new_password)?;
        let email = self.commit(|data| {
            let email = data
                .reset_outbox
                .iter()
                .find(|request| request.token == token)
                .map(|request| request.email.clone())
                .ok_or(AuthError::InvalidResetToken)?;
            let account = data
                .accounts
                .get_mut(&email)
                .ok_or(AuthError::UserNotFound)?;
            account.set_password(new_password, self.hash_iterations);
            // A reset invalidates every outstanding code for this address
            data.reset_outbox.retain(|r| r.email != email);
            Ok(email)
        })?;

        info!(email = %email, "Password reset completed");
        Ok(())
    }

    /// Apply `change` to a copy of the state and keep it only once saved
    fn commit<T>(&self, change: impl FnOnce(&mut AuthFile) -> AuthResult<T>) -> AuthResult<T> {
        let mut data = self.lock()?;
        let mut next = data.clone();
        let out = change(&mut next)?;
        self.persist(&next)?;
        *data = next;
        Ok(out)
    }

    fn lock(&self) -> AuthResult<MutexGuard<'_, AuthFile>> {
        self.data
            .lock()
            .map_err(|_| AuthError::Provider("auth state lock poisoned".into()))
    }

    fn persist(&self, data: &AuthFile) -> AuthResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let write = || -> std::io::Result<()> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let text = serde_json::to_string_pretty(data)?;
            std::fs::write(path, text)
        };
        write().map_err(|e| AuthError::Provider(format!("Could not save account data: {}", e)))
    }

    fn set_user(&self, user: Option<User>) {
        self.state.send_replace(AuthState {
            user,
            loading: false,
        });
    }
}

impl AuthProvider for LocalAuthProvider {
    fn sign_up(&self, email: &str, password: &str) -> AuthResult<User> {
        let email = normalize_email(email)?;
        validate_password(password)?;

        let user = self.commit(|data| {
            if data.accounts.contains_key(&email) {
                return Err(AuthError::EmailAlreadyInUse);
            }

            let mut account = Account {
                uid: uuid::Uuid::new_v4().simple().to_string(),
                email: email.clone(),
                salt: String::new(),
                password_hash: String::new(),
                iterations: 0,
                created_at: Utc::now(),
            };
            account.set_password(password, self.hash_iterations);
            let user = account.user();
            data.accounts.insert(email.clone(), account);
            data.session = Some(user.uid.clone());
            Ok(user)
        })?;

        info!(email = %user.email, "Account created");
        self.set_user(Some(user.clone()));
        Ok(user)
    }

    fn sign_in(&self, email: &str, password: &str) -> AuthResult<User> {
        let email = normalize_email(email)?;
        let user = self.commit(|data| {
            let account = data
                .accounts
                .get(&email)
                .ok_or(AuthError::InvalidCredential)?;
            if !account.verify_password(password) {
                warn!(email = %email, "Rejected sign-in");
                return Err(AuthError::InvalidCredential);
            }

            let user = account.user();
            data.session = Some(user.uid.clone());
            Ok(user)
        })?;

        info!(email = %user.email, "Signed in");
        self.set_user(Some(user.clone()));
        Ok(user)
    }

    fn sign_out(&self) -> AuthResult<()> {
        self.commit(|data| {
            data.session = None;
            Ok(())
        })?;

        info!("Signed out");
        self.set_user(None);
        Ok(())
    }

    fn send_password_reset_email(&self, email: &str) -> AuthResult<()> {
        let email = normalize_email(email)?;
        let token = self.commit(|data| {
            if !data.accounts.contains_key(&email) {
                return Err(AuthError::UserNotFound);
            }

            let request = ResetRequest {
                email: email.clone(),
                token: new_reset_token(),
                requested_at: Utc::now(),
            };
            let token = request.token.clone();
            data.reset_outbox.push(request);
            Ok(token)
        })?;

        info!(email = %email, token = %token, "Password reset requested");
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }
}

/// Trim, lowercase and minimally check an email address
fn normalize_email(email: &str) -> AuthResult<String> {
    let email = email.trim().to_lowercase();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        })
        && !email.contains(char::is_whitespace);

    if valid {
        Ok(email)
    } else {
        Err(AuthError::InvalidEmail)
    }
}

fn validate_password(password: &str) -> AuthResult<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword {
            min_length: MIN_PASSWORD_LENGTH,
        });
    }
    Ok(())
}

fn new_salt() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn new_reset_token() -> String {
    let mut token = uuid::Uuid::new_v4().simple().to_string();
    token.truncate(RESET_TOKEN_LENGTH);
    token
}

fn hash_password(salt: &str, password: &str, iterations: u32) -> String {
    let mut key = [0u8; PASSWORD_KEY_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), iterations, &mut key);
    key.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::Digest;

    // Few rounds keep the unit tests quick; verification uses the stored count
    const TEST_ROUNDS: u32 = 1_000;

    fn provider() -> LocalAuthProvider {
        LocalAuthProvider::in_memory().with_hash_iterations(TEST_ROUNDS)
    }

    #[test]
    fn test_sign_up_signs_in_and_notifies() {
        let provider = provider();
        let mut rx = provider.subscribe();
        assert!(!rx.borrow_and_update().loading);

        let user = provider.sign_up(" Ana@Example.com ", "secret1").unwrap();
        assert_eq!(user.email, "ana@example.com");
        assert!(rx.has_changed().unwrap());
        assert_eq!(provider.current_user(), Some(user.clone()));
        assert_eq!(require_user(&provider).unwrap(), user);
    }

    #[test]
    fn test_rejects_bad_input() {
        let provider = provider();
        assert_eq!(
            provider.sign_up("not-an-email", "secret1"),
            Err(AuthError::InvalidEmail)
        );
        assert_eq!(
            provider.sign_up("a@b.co", "12345"),
            Err(AuthError::WeakPassword { min_length: 6 })
        );

        provider.sign_up("a@b.co", "123456").unwrap();
        assert_eq!(
            provider.sign_up("a@b.co", "123456"),
            Err(AuthError::EmailAlreadyInUse)
        );
        assert_eq!(
            provider.sign_in("a@b.co", "wrong-pass"),
            Err(AuthError::InvalidCredential)
        );
    }

    #[test]
    fn test_sign_out_clears_user() {
        let provider = provider();
        provider.sign_up("a@b.co", "123456").unwrap();
        provider.sign_out().unwrap();

        assert_eq!(provider.current_user(), None);
        assert_eq!(require_user(&provider), Err(AppError::NotAuthenticated));
    }

    #[test]
    fn test_password_reset_flow() {
        let provider = provider();
        provider.sign_up("a@b.co", "first-pass").unwrap();
        provider.sign_out().unwrap();

        assert_eq!(
            provider.send_password_reset_email("nobody@b.co"),
            Err(AuthError::UserNotFound)
        );
        provider.send_password_reset_email("a@b.co").unwrap();
        let token = provider.reset_outbox()[0].token.clone();
        assert_eq!(token.len(), RESET_TOKEN_LENGTH);

        provider.confirm_password_reset(&token, "second-pass").unwrap();
        assert!(provider.reset_outbox().is_empty());
        assert_eq!(
            provider.confirm_password_reset(&token, "third-pass"),
            Err(AuthError::InvalidResetToken)
        );
        assert_eq!(
            provider.sign_in("a@b.co", "first-pass"),
            Err(AuthError::InvalidCredential)
        );
        provider.sign_in("a@b.co", "second-pass").unwrap();
    }

    #[test]
    fn test_session_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.json");

        let uid = {
            let provider = LocalAuthProvider::open(&path)
                .unwrap()
                .with_hash_iterations(TEST_ROUNDS);
            provider.sign_up("a@b.co", "123456").unwrap().uid
        };

        let provider = LocalAuthProvider::open(&path).unwrap();
        assert_eq!(provider.current_user().map(|u| u.uid), Some(uid));
    }

    #[test]
    fn test_hash_depends_on_salt_and_rounds() {
        assert_ne!(hash_password("a", "pw", 10), hash_password("b", "pw", 10));
        assert_ne!(hash_password("a", "pw", 10), hash_password("a", "pw", 11));
        assert_eq!(hash_password("a", "pw", 10).len(), PASSWORD_KEY_LENGTH * 2);
    }

    #[test]
    fn test_stored_hash_is_a_derived_key() {
        let provider = provider();
        provider.sign_up("a@b.co", "123456").unwrap();

        let account = provider.lock().unwrap().accounts["a@b.co"].clone();
        assert_eq!(account.iterations, TEST_ROUNDS);

        let single_round = sha2::Sha256::new()
            .chain_update(account.salt.as_bytes())
            .chain_update(b":")
            .chain_update(b"123456")
            .finalize();
        let single_round: String = single_round.iter().map(|b| format!("{:02x}", b)).collect();
        assert_ne!(account.password_hash, single_round);
        assert!(account.verify_password("123456"));
        assert!(!account.verify_password("123457"));
    }

    #[test]
    fn test_new_providers_use_full_rounds() {
        assert_eq!(LocalAuthProvider::in_memory().hash_iterations, PBKDF2_ITERATIONS);
    }

    #[test]
    fn test_account_keeps_its_own_rounds() {
        let provider = provider();
        provider.sign_up("a@b.co", "123456").unwrap();
        provider.sign_out().unwrap();

        // Raising the rounds later must not lock out existing accounts
        let data = provider.lock().unwrap().clone();
        let provider = LocalAuthProvider::with_data(None, data).with_hash_iterations(TEST_ROUNDS * 2);
        provider.sign_in("a@b.co", "123456").unwrap();
    }

    /// Path whose parent directory cannot be created, so every save fails
    fn unwritable_path(dir: &tempfile::TempDir) -> PathBuf {
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();
        blocker.join("auth.json")
    }

    #[test]
    fn test_failed_save_leaves_no_account() {
        let dir = tempfile::tempdir().unwrap();
        let provider = LocalAuthProvider::open(unwritable_path(&dir))
            .unwrap()
            .with_hash_iterations(TEST_ROUNDS);

        assert!(matches!(
            provider.sign_up("a@b.co", "123456"),
            Err(AuthError::Provider(_))
        ));
        assert_eq!(provider.current_user(), None);
        assert_eq!(
            provider.sign_in("a@b.co", "123456"),
            Err(AuthError::InvalidCredential)
        );
    }

    #[test]
    fn test_failed_save_keeps_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let store_dir = dir.path().join("auth");
        let provider = LocalAuthProvider::open(store_dir.join("auth.json"))
            .unwrap()
            .with_hash_iterations(TEST_ROUNDS);
        let user = provider.sign_up("a@b.co", "first-pass").unwrap();
        provider.send_password_reset_email("a@b.co").unwrap();
        let token = provider.reset_outbox()[0].token.clone();

        // Replace the directory with a plain file so saves start failing
        std::fs::remove_dir_all(&store_dir).unwrap();
        std::fs::write(&store_dir, b"").unwrap();

        assert!(matches!(provider.sign_out(), Err(AuthError::Provider(_))));
        assert_eq!(provider.current_user(), Some(user));
        assert!(provider.send_password_reset_email("a@b.co").is_err());
        assert_eq!(provider.reset_outbox().len(), 1);
        assert!(provider.confirm_password_reset(&token, "second-pass").is_err());
        assert_eq!(provider.reset_outbox()[0].token, token);
        assert_eq!(
            provider.sign_in("a@b.co", "second-pass"),
            Err(AuthError::InvalidCredential)
        );
    }

    #[test]
    fn test_reset_for_missing_account_keeps_token() {
        let provider = provider();
        provider.sign_up("a@b.co", "first-pass").unwrap();
        provider.send_password_reset_email("a@b.co").unwrap();
        let token = provider.reset_outbox()[0].token.clone();
        provider.lock().unwrap().accounts.clear();

        assert_eq!(
            provider.confirm_password_reset(&token, "second-pass"),
            Err(AuthError::UserNotFound)
        );
        assert_eq!(provider.reset_outbox().len(), 1);
    }
}
