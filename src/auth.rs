use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError, RwLock},
};

use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    binding::validators::{is_valid_email, is_valid_password},
    notifier::{Notifier, ObserverHandle},
};

pub const PASSWORD_PROVIDER: &str = "password";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub provider: String,
}

pub type AuthStateCallback = Box<dyn FnMut(Option<User>) + Send>;

/// Sign-in capabilities the dashboard needs from an identity service.
pub trait IdentityProvider: Send + Sync {
    fn current_user(&self) -> Option<User>;

    /// `callback` receives the current user first, then every change, until
    /// the handle is dropped.
    fn on_auth_state_changed(&self, callback: AuthStateCallback) -> ObserverHandle;

    fn sign_in_with_popup(&self, provider: &str) -> Result<User>;

    fn sign_in_with_password(&self, email: &str, password: &str) -> Result<User>;

    /// Creates the account and signs it in.
    fn create_account(&self, email: &str, password: &str) -> Result<User>;

    fn send_password_reset(&self, email: &str) -> Result<()>;

    fn sign_out(&self) -> Result<()>;
}

struct Account {
    user: User,
    password: Option<String>,
}

/// In-process identity provider. Password accounts are created through
/// `create_account`; federated accounts must be registered up front and are
/// what a popup sign-in for their provider returns. Reset emails are
/// recorded rather than sent.
#[derive(Clone, Default)]
pub struct LocalIdentity {
    accounts: Arc<RwLock<HashMap<String, Account>>>,
    popup_accounts: Arc<RwLock<HashMap<String, String>>>,
    current: Arc<RwLock<Option<User>>>,
    reset_outbox: Arc<Mutex<Vec<String>>>,
    auth_state: Notifier<Option<User>>,
}

impl LocalIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_federated(&self, provider: &str, email: &str, display_name: Option<&str>) -> Result<User> {
        let key = email.to_lowercase();
        let user = User {
            uid: Uuid::now_v7().to_string(),
            email: key.clone(),
            display_name: display_name.map(str::to_string),
            provider: provider.to_string(),
        };
        self.accounts
            .write()
            .map_err(|_| anyhow!("Failed to acquire write lock"))?
            .insert(
                key.clone(),
                Account {
                    user: user.clone(),
                    password: None,
                },
            );
        self.popup_accounts
            .write()
            .map_err(|_| anyhow!("Failed to acquire write lock"))?
            .insert(provider.to_string(), key);
        Ok(user)
    }

    /// Addresses that were sent a password reset link, oldest first.
    pub fn sent_password_resets(&self) -> Vec<String> {
        self.reset_outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_current(&self, user: Option<User>) -> Result<()> {
        *self
            .current
            .write()
            .map_err(|_| anyhow!("Failed to acquire write lock"))? = user.clone();
        log::info!("AUTH STATE: {}", user.as_ref().map_or("signed out", |u| u.email.as_str()));
        self.auth_state.notify(user);
        Ok(())
    }
}

impl IdentityProvider for LocalIdentity {
    fn current_user(&self) -> Option<User> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn on_auth_state_changed(&self, callback: AuthStateCallback) -> ObserverHandle {
        let current = self.current.clone();
        self.auth_state.observe_with_initial(
            move || current.read().unwrap_or_else(PoisonError::into_inner).clone(),
            callback,
        )
    }

    fn sign_in_with_popup(&self, provider: &str) -> Result<User> {
        let email = self
            .popup_accounts
            .read()
            .map_err(|_| anyhow!("Failed to acquire read lock"))?
            .get(provider)
            .cloned()
            .ok_or_else(|| anyhow!("Sign-in popup closed by user ({})", provider))?;
        let user = self
            .accounts
            .read()
            .map_err(|_| anyhow!("Failed to acquire read lock"))?
            .get(&email)
            .map(|account| account.user.clone())
            .ok_or_else(|| anyhow!("No account for {}", email))?;
        self.set_current(Some(user.clone()))?;
        Ok(user)
    }

    fn sign_in_with_password(&self, email: &str, password: &str) -> Result<User> {
        let user = {
            let accounts = self
                .accounts
                .read()
                .map_err(|_| anyhow!("Failed to acquire read lock"))?;
            match accounts.get(&email.to_lowercase()) {
                Some(account) if account.password.as_deref() == Some(password) => account.user.clone(),
                _ => bail!("Invalid email or password"),
            }
        };
        self.set_current(Some(user.clone()))?;
        Ok(user)
    }

    fn create_account(&self, email: &str, password: &str) -> Result<User> {
        if !is_valid_email(email) {
            bail!("Invalid email address: {}", email);
        }
        let key = email.to_lowercase();
        let user = {
            let mut accounts = self
                .accounts
                .write()
                .map_err(|_| anyhow!("Failed to acquire write lock"))?;
            if accounts.contains_key(&key) {
                bail!("Email already in use: {}", key);
            }
            let user = User {
                uid: Uuid::now_v7().to_string(),
                email: key.clone(),
                display_name: None,
                provider: PASSWORD_PROVIDER.to_string(),
            };
            accounts.insert(
                key,
                Account {
                    user: user.clone(),
                    password: Some(password.to_string()),
                },
            );
            user
        };
        log::info!("AUTH: created account {}", user.email);
        self.set_current(Some(user.clone()))?;
        Ok(user)
    }

    fn send_password_reset(&self, email: &str) -> Result<()> {
        let key = email.to_lowercase();
        let known = self
            .accounts
            .read()
            .map_err(|_| anyhow!("Failed to acquire read lock"))?
            .get(&key)
            .is_some_and(|account| account.password.is_some());
        if !known {
            bail!("No password account for {}", email);
        }
        self.reset_outbox
            .lock()
            .map_err(|_| anyhow!("Failed to acquire outbox lock"))?
            .push(key);
        Ok(())
    }

    fn sign_out(&self) -> Result<()> {
        self.set_current(None)
    }
}

pub const PASSWORD_RESET_SENT: &str = "Password reset link sent!";

/// Front door for the login forms. Every failure becomes one alert that
/// stays up, and blocks further attempts, until dismissed.
pub struct Session {
    provider: Arc<dyn IdentityProvider>,
    alert: Mutex<Option<String>>,
}

impl Session {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            provider,
            alert: Mutex::new(None),
        }
    }

    pub fn current_user(&self) -> Option<User> {
        self.provider.current_user()
    }

    pub fn alert(&self) -> Option<String> {
        self.alert.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn dismiss_alert(&self) {
        *self.alert.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn show_alert(&self, message: String) {
        *self.alert.lock().unwrap_or_else(PoisonError::into_inner) = Some(message);
    }

    fn attempt<T>(&self, what: &str, operation: impl FnOnce(&dyn IdentityProvider) -> Result<T>) -> Option<T> {
        if self.alert().is_some() {
            log::debug!("AUTH: {} blocked by unacknowledged alert", what);
            return None;
        }
        match operation(self.provider.as_ref()) {
            Ok(value) => Some(value),
            Err(e) => {
                log::error!("AUTH ERROR: {}: {:#}", what, e);
                self.show_alert(format!("{:#}", e));
                None
            }
        }
    }

    pub fn sign_in_with_password(&self, email: &str, password: &str) -> Option<User> {
        self.attempt("sign in", |provider| provider.sign_in_with_password(email, password))
    }

    pub fn sign_in_with_popup(&self, provider_id: &str) -> Option<User> {
        self.attempt("popup sign in", |provider| provider.sign_in_with_popup(provider_id))
    }

    pub fn register(&self, email: &str, password: &str) -> Option<User> {
        self.attempt("register", |provider| {
            if !is_valid_password(password) {
                bail!(
                    "Password must be at least 8 characters with an uppercase letter, a lowercase letter, a number and one of @$!%*?&"
                );
            }
            provider.create_account(email, password)
        })
    }

    /// Confirms a sent link with an alert as well.
    pub fn send_password_reset(&self, email: &str) -> bool {
        let sent = self
            .attempt("password reset", |provider| provider.send_password_reset(email))
            .is_some();
        if sent {
            self.show_alert(PASSWORD_RESET_SENT.to_string());
        }
        sent
    }

    pub fn sign_out(&self) {
        if let Err(e) = self.provider.sign_out() {
            log::error!("AUTH ERROR: sign out: {:#}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Barrier, mpsc},
        time::Duration,
    };

    use super::*;

    fn session() -> (LocalIdentity, Session) {
        let identity = LocalIdentity::new();
        let session = Session::new(Arc::new(identity.clone()));
        (identity, session)
    }

    #[test]
    fn register_then_sign_in() {
        let (identity, session) = session();
        let user = session.register("Alice@Example.com", "Passw0rd!").unwrap();
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(identity.current_user(), Some(user.clone()));

        session.sign_out();
        assert_eq!(identity.current_user(), None);
        assert_eq!(session.sign_in_with_password("alice@example.com", "Passw0rd!"), Some(user));
    }

    #[test]
    fn failure_raises_blocking_alert() {
        let (_identity, session) = session();
        session.register("alice@example.com", "Passw0rd!");
        session.sign_out();

        assert_eq!(session.sign_in_with_password("alice@example.com", "wrong"), None);
        assert_eq!(session.alert().as_deref(), Some("Invalid email or password"));

        assert_eq!(session.sign_in_with_password("alice@example.com", "Passw0rd!"), None);
        session.dismiss_alert();
        assert!(session.sign_in_with_password("alice@example.com", "Passw0rd!").is_some());
    }

    #[test]
    fn weak_password_never_reaches_provider() {
        let (identity, session) = session();
        assert!(session.register("bob@example.com", "password").is_none());
        assert!(session.alert().unwrap().starts_with("Password must be"));
        assert!(identity.sign_in_with_password("bob@example.com", "password").is_err());
    }

    #[test]
    fn popup_returns_registered_account() -> Result<()> {
        let (identity, session) = session();
        assert!(session.sign_in_with_popup("google.com").is_none());
        session.dismiss_alert();

        identity.register_federated("google.com", "carol@example.com", Some("Carol Smith"))?;
        let user = session.sign_in_with_popup("google.com").unwrap();
        assert_eq!(user.display_name.as_deref(), Some("Carol Smith"));
        Ok(())
    }

    #[test]
    fn password_reset_is_recorded_and_confirmed() {
        let (identity, session) = session();
        session.register("dave@example.com", "Passw0rd!");
        assert!(session.send_password_reset("dave@example.com"));
        assert_eq!(session.alert().as_deref(), Some(PASSWORD_RESET_SENT));
        assert_eq!(identity.sent_password_resets(), vec!["dave@example.com"]);

        session.dismiss_alert();
        assert!(!session.send_password_reset("nobody@example.com"));
        assert!(session.alert().unwrap().contains("nobody@example.com"));
    }

    #[test]
    fn auth_state_observer_sees_current_then_changes() {
        let identity = LocalIdentity::new();
        let (tx, rx) = mpsc::channel();
        let _handle = identity.on_auth_state_changed(Box::new(move |user: Option<User>| {
            let _ = tx.send(user.map(|u| u.email));
        }));

        identity.create_account("erin@example.com", "Passw0rd!").unwrap();
        identity.sign_out().unwrap();

        let timeout = Duration::from_secs(1);
        assert_eq!(rx.recv_timeout(timeout).unwrap(), None);
        assert_eq!(rx.recv_timeout(timeout).unwrap(), Some("erin@example.com".to_string()));
        assert_eq!(rx.recv_timeout(timeout).unwrap(), None);
    }

    #[test]
    fn observer_registered_during_sign_in_ends_on_signed_in_user() -> Result<()> {
        for _ in 0..50 {
            let identity = LocalIdentity::new();
            let signer = identity.clone();
            let barrier = Arc::new(Barrier::new(2));
            let start = barrier.clone();
            let worker = std::thread::spawn(move || {
                start.wait();
                signer.create_account("erin@example.com", "Passw0rd!")
            });

            barrier.wait();
            let (tx, rx) = mpsc::channel();
            let _handle = identity.on_auth_state_changed(Box::new(move |user: Option<User>| {
                let _ = tx.send(user.map(|u| u.email));
            }));
            worker.join().unwrap()?;

            let last = std::iter::from_fn(|| rx.recv_timeout(Duration::from_millis(50)).ok()).last();
            assert_eq!(last, Some(Some("erin@example.com".to_string())));
        }
        Ok(())
    }
}
