use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

/// Server-side holding area for parsed-but-not-yet-committed import JSON,
/// keyed by a session token handed back to the client at preview time.
///
/// Entries expire after the configured TTL; expired entries are dropped
/// lazily on access and swept on insert. Each session sees only its own
/// staged payload.
pub struct StagingStore {
    entries: Mutex<HashMap<String, StagedEntry>>,
    ttl: Duration,
}

struct StagedEntry {
    json: String,
    staged_at: Instant,
}

impl StagingStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Stages a payload under a fresh session token and returns the token.
    pub fn put(&self, json: String) -> String {
        let token = Uuid::new_v4().simple().to_string();
        let mut entries = self.entries.lock().unwrap();
        let ttl = self.ttl;
        entries.retain(|_, e| e.staged_at.elapsed() < ttl);
        entries.insert(
            token.clone(),
            StagedEntry {
                json,
                staged_at: Instant::now(),
            },
        );
        debug!(session = %token, "Staged import payload");
        token
    }

    /// Replaces the payload staged under an existing session, keeping the
    /// token stable across repeated previews.
    pub fn replace(&self, token: &str, json: String) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            token.to_string(),
            StagedEntry {
                json,
                staged_at: Instant::now(),
            },
        );
    }

    pub fn get(&self, token: &str) -> Option<String> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(token) {
            Some(entry) if entry.staged_at.elapsed() < self.ttl => Some(entry.json.clone()),
            Some(_) => {
                entries.remove(token);
                debug!(session = %token, "Dropped expired staged payload");
                None
            }
            None => None,
        }
    }

    pub fn remove(&self, token: &str) {
        let mut entries = self.entries.lock().unwrap();
        entries.remove(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let store = StagingStore::new(Duration::from_secs(60));
        let token = store.put("[]".to_string());
        assert_eq!(store.get(&token).as_deref(), Some("[]"));
    }

    #[test]
    fn entries_expire_after_ttl() {
        let store = StagingStore::new(Duration::from_millis(0));
        let token = store.put("[]".to_string());
        assert!(store.get(&token).is_none());
        // Second lookup also misses after the lazy drop
        assert!(store.get(&token).is_none());
    }

    #[test]
    fn remove_clears_the_session() {
        let store = StagingStore::new(Duration::from_secs(60));
        let token = store.put("[]".to_string());
        store.remove(&token);
        assert!(store.get(&token).is_none());
    }

    #[test]
    fn replace_keeps_the_token_stable() {
        let store = StagingStore::new(Duration::from_secs(60));
        let token = store.put("[1]".to_string());
        store.replace(&token, "[2]".to_string());
        assert_eq!(store.get(&token).as_deref(), Some("[2]"));
    }

    #[test]
    fn sessions_are_isolated() {
        let store = StagingStore::new(Duration::from_secs(60));
        let a = store.put("[\"a\"]".to_string());
        let b = store.put("[\"b\"]".to_string());
        assert_ne!(a, b);
        assert_eq!(store.get(&a).as_deref(), Some("[\"a\"]"));
        assert_eq!(store.get(&b).as_deref(), Some("[\"b\"]"));
    }
}
