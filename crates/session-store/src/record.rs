use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::time::Instant;

use domainhost_core_types::{Identity, Principal, SessionKey};

/// Payload types a session can carry.
pub trait SessionValue: Clone + fmt::Debug + Send + Sync + 'static {
    /// Rejects payloads that must never be stored.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

impl SessionValue for Identity {
    fn validate(&self) -> Result<(), String> {
        let unnamed = self.name().map_or(true, |name| name.trim().is_empty());
        if self.is_authenticated() && unnamed {
            return Err("authenticated identity has no name".into());
        }
        Ok(())
    }
}

impl SessionValue for serde_json::Value {
    fn validate(&self) -> Result<(), String> {
        if self.is_null() {
            return Err("session value is null".into());
        }
        Ok(())
    }
}

#[derive(Debug)]
struct RecordState<V> {
    value: V,
    last_activated: Instant,
    last_activated_at: DateTime<Utc>,
}

/// One logical session. The key and creation time never change; the payload
/// and activation time are updated in place so every handle observes them.
#[derive(Debug)]
pub struct SessionRecord<V = Identity> {
    key: SessionKey,
    created_at: DateTime<Utc>,
    state: RwLock<RecordState<V>>,
}

impl<V: SessionValue> SessionRecord<V> {
    pub(crate) fn new(key: SessionKey, value: V) -> Self {
        let now = Utc::now();
        Self {
            key,
            created_at: now,
            state: RwLock::new(RecordState {
                value,
                last_activated: Instant::now(),
                last_activated_at: now,
            }),
        }
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn value(&self) -> V {
        self.state.read().value.clone()
    }

    pub fn with_value<R>(&self, f: impl FnOnce(&V) -> R) -> R {
        f(&self.state.read().value)
    }

    pub fn time_created(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn time_last_activated(&self) -> DateTime<Utc> {
        self.state.read().last_activated_at
    }

    pub(crate) fn last_activated(&self) -> Instant {
        self.state.read().last_activated
    }

    pub fn idle(&self) -> Duration {
        Instant::now().saturating_duration_since(self.last_activated())
    }

    /// Expired once idle time strictly exceeds the TTL.
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.idle() > ttl
    }

    pub(crate) fn activate(&self) {
        let mut state = self.state.write();
        state.last_activated = Instant::now();
        state.last_activated_at = Utc::now();
    }

    pub(crate) fn replace_value(&self, value: V) {
        self.state.write().value = value;
    }
}

/// Shortens a key for logs and error messages.
pub(crate) fn redact(key: &SessionKey) -> String {
    let raw = key.as_str();
    match raw.char_indices().nth(6) {
        Some((idx, _)) => format!("{}…", &raw[..idx]),
        None => raw.to_string(),
    }
}
