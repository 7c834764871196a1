//! TTL key-value session storage.
//!
//! [`KeyValueStore`] is the collaborator seam: any store with per-key expiry
//! fits. [`MemoryStore`] is the in-process implementation. [`SessionStore`]
//! adds typed access keyed by `(purpose, user)` on top of either.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};
use weft_core::UserId;

use crate::error::EngineError;
use crate::session::SessionState;

/// Default lifetime of pattern state.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(3 * 60 * 60);

/// Key-value store with per-key expiry. Expired keys read as absent.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), EngineError>;
    fn del(&self, key: &str) -> Result<(), EngineError>;
}

// =============================================================================
// MemoryStore
// =============================================================================

struct Entry {
    value: Value,
    expires_at: Instant,
}

/// In-memory store. Expiry is checked lazily on read and by [`purge_expired`].
///
/// [`purge_expired`]: MemoryStore::purge_expired
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let Ok(mut entries) = self.entries.lock() else {
            return 0;
        };
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, "Purged expired session entries");
        }
        removed
    }

    /// Live and expired entries not yet purged.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock().ok()?;
        let expired = entries.get(key)?.expires_at <= Instant::now();
        if expired {
            entries.remove(key);
            return None;
        }
        entries.get(key).map(|e| e.value.clone())
    }

    fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), EngineError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| EngineError::Store(format!("store mutex poisoned: {}", e)))?;
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    fn del(&self, key: &str) -> Result<(), EngineError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| EngineError::Store(format!("store mutex poisoned: {}", e)))?;
        entries.remove(key);
        Ok(())
    }
}

// =============================================================================
// SessionStore
// =============================================================================

/// What a stored value is for.
pub const PATTERN_STATE: &str = "pattern_state";

/// `(purpose, user)` store key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub purpose: &'static str,
    pub user: UserId,
}

impl SessionKey {
    pub fn new(purpose: &'static str, user: &UserId) -> Self {
        Self {
            purpose,
            user: user.clone(),
        }
    }

    pub fn pattern_state(user: &UserId) -> Self {
        Self::new(PATTERN_STATE, user)
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "weft:{}:{}", self.purpose, self.user)
    }
}

/// Typed session access over a [`KeyValueStore`].
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(inner: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self { inner, ttl }
    }

    /// In-memory store with the default TTL.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), DEFAULT_SESSION_TTL)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Read a value. Absent, expired and undecodable values all read as `None`.
    pub fn get<T: DeserializeOwned>(&self, key: &SessionKey) -> Option<T> {
        let value = self.inner.get(&key.to_string())?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding undecodable session value");
                None
            }
        }
    }

    /// Write a value, refreshing its TTL.
    pub fn set<T: Serialize>(&self, key: &SessionKey, value: &T) -> Result<(), EngineError> {
        self.set_with_ttl(key, value, self.ttl)
    }

    pub fn set_with_ttl<T: Serialize>(
        &self,
        key: &SessionKey,
        value: &T,
        ttl: Duration,
    ) -> Result<(), EngineError> {
        let value = serde_json::to_value(value)?;
        self.inner.set(&key.to_string(), value, ttl)
    }

    pub fn del(&self, key: &SessionKey) -> Result<(), EngineError> {
        self.inner.del(&key.to_string())
    }

    pub fn load_state(&self, user: &UserId) -> Option<SessionState> {
        self.get(&SessionKey::pattern_state(user))
    }

    pub fn save_state(&self, user: &UserId, state: &SessionState) -> Result<(), EngineError> {
        self.set(&SessionKey::pattern_state(user), state)
    }

    /// Forget a user's pattern state.
    pub fn clear(&self, user: &UserId) -> Result<(), EngineError> {
        self.del(&SessionKey::pattern_state(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user() -> UserId {
        UserId::new("42")
    }

    // ---- MemoryStore ----

    #[tokio::test(start_paused = true)]
    async fn test_memory_store_expires_lazily() {
        let store = MemoryStore::new();
        store.set("k", json!(1), Duration::from_secs(10)).unwrap();
        assert_eq!(store.get("k"), Some(json!(1)));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(store.get("k"), None);
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_refreshes_ttl() {
        let store = MemoryStore::new();
        store.set("k", json!("a"), Duration::from_secs(10)).unwrap();
        tokio::time::advance(Duration::from_secs(8)).await;
        store.set("k", json!("b"), Duration::from_secs(10)).unwrap();
        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(store.get("k"), Some(json!("b")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let store = MemoryStore::new();
        store.set("short", json!(1), Duration::from_secs(1)).unwrap();
        store.set("long", json!(2), Duration::from_secs(100)).unwrap();
        tokio::time::advance(Duration::from_secs(5)).await;

        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("long"), Some(json!(2)));
    }

    #[test]
    fn test_del() {
        let store = MemoryStore::new();
        store.set("k", json!(true), Duration::from_secs(60)).unwrap();
        store.del("k").unwrap();
        assert_eq!(store.get("k"), None);
        store.del("missing").unwrap();
    }

    // ---- SessionStore ----

    #[test]
    fn test_session_key_format() {
        assert_eq!(SessionKey::pattern_state(&user()).to_string(), "weft:pattern_state:42");
    }

    #[test]
    fn test_typed_round_trip() {
        let store = SessionStore::in_memory();
        let key = SessionKey::new("counter", &user());
        store.set(&key, &vec![1u32, 2, 3]).unwrap();
        assert_eq!(store.get::<Vec<u32>>(&key), Some(vec![1, 2, 3]));
        assert_eq!(store.ttl(), DEFAULT_SESSION_TTL);
    }

    #[test]
    fn test_undecodable_value_reads_as_absent() {
        let store = SessionStore::in_memory();
        let key = SessionKey::pattern_state(&user());
        store.set(&key, &json!({"unexpected": true})).unwrap();
        assert!(store.load_state(&user()).is_none());
    }

    #[test]
    fn test_state_save_load_clear() {
        let store = SessionStore::in_memory();
        let state = SessionState::new("hello");
        store.save_state(&user(), &state).unwrap();
        assert_eq!(store.load_state(&user()), Some(state));

        store.clear(&user()).unwrap();
        assert!(store.load_state(&user()).is_none());
    }

    #[test]
    fn test_users_are_isolated() {
        let store = SessionStore::in_memory();
        store.save_state(&UserId::new("a"), &SessionState::new("a")).unwrap();
        assert!(store.load_state(&UserId::new("b")).is_none());
    }
}
