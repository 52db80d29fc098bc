use crate::error::{ImportError, Result};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::info;
use uuid::Uuid;

/// The authenticated caller as seen by handlers.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub email: String,
    pub is_admin: bool,
}

struct Account {
    email: String,
    password_digest: String,
    is_admin: bool,
}

struct SessionEntry {
    email: String,
    is_admin: bool,
    issued_at: Instant,
}

/// Minimal account and bearer-token session layer. One administrator is
/// seeded at startup; restaurant owners are registered by the admin so
/// owner-email approval can be exercised. This intentionally stops far short
/// of a full identity subsystem.
pub struct AuthService {
    accounts: Mutex<HashMap<String, Account>>,
    sessions: Mutex<HashMap<String, SessionEntry>>,
    session_ttl: Duration,
}

impl AuthService {
    pub fn new(session_ttl: Duration) -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
            session_ttl,
        }
    }

    /// Seeds the fixed bootstrap administrator. Idempotent across restarts.
    pub fn seed_admin(&self, email: &str, password: &str) {
        let mut accounts = self.accounts.lock().unwrap();
        accounts.insert(
            email.to_lowercase(),
            Account {
                email: email.to_string(),
                password_digest: digest(password),
                is_admin: true,
            },
        );
        info!(email = %email, "Seeded administrator account");
    }

    pub fn register(&self, email: &str, password: &str) -> Result<()> {
        let key = email.to_lowercase();
        if key.is_empty() || password.is_empty() {
            return Err(ImportError::InvalidInput(
                "email and password are required".to_string(),
            ));
        }

        let mut accounts = self.accounts.lock().unwrap();
        if accounts.contains_key(&key) {
            return Err(ImportError::InvalidInput(format!(
                "account already exists: {email}"
            )));
        }
        accounts.insert(
            key,
            Account {
                email: email.to_string(),
                password_digest: digest(password),
                is_admin: false,
            },
        );
        Ok(())
    }

    /// Verifies credentials and issues a bearer token.
    pub fn login(&self, email: &str, password: &str) -> Option<String> {
        let accounts = self.accounts.lock().unwrap();
        let account = accounts.get(&email.to_lowercase())?;
        if account.password_digest != digest(password) {
            return None;
        }

        let token = Uuid::new_v4().simple().to_string();
        let mut sessions = self.sessions.lock().unwrap();
        let ttl = self.session_ttl;
        sessions.retain(|_, s| s.issued_at.elapsed() < ttl);
        sessions.insert(
            token.clone(),
            SessionEntry {
                email: account.email.clone(),
                is_admin: account.is_admin,
                issued_at: Instant::now(),
            },
        );
        Some(token)
    }

    /// Resolves a bearer token into the calling user, dropping it when the
    /// session TTL has lapsed.
    pub fn authenticate(&self, token: &str) -> Option<AuthUser> {
        let mut sessions = self.sessions.lock().unwrap();
        match sessions.get(token) {
            Some(entry) if entry.issued_at.elapsed() < self.session_ttl => Some(AuthUser {
                email: entry.email.clone(),
                is_admin: entry.is_admin,
            }),
            Some(_) => {
                sessions.remove(token);
                None
            }
            None => None,
        }
    }
}

fn digest(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}
