use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use domainhost_core_types::SessionKey;

use crate::errors::SessionError;
use crate::events::SessionEvent;
use crate::record::{SessionRecord, SessionValue};

pub type SessionResult<V> = Result<Arc<SessionRecord<V>>, SessionError>;

#[async_trait]
pub trait SessionStore<V: SessionValue>: Send + Sync {
    /// Inserts a new session. A missing key is generated; an existing key is a conflict.
    async fn create_session(&self, value: V, key: Option<SessionKey>) -> SessionResult<V>;

    /// Pure lookup; never touches the activation time.
    async fn get_session(&self, key: &SessionKey) -> SessionResult<V>;

    /// Returns the live session under `key`, or creates it with `value`.
    async fn get_or_create_session(&self, key: &SessionKey, value: V) -> SessionResult<V>;

    /// Lookup plus a refresh of the sliding window.
    async fn active_session(&self, key: &SessionKey) -> SessionResult<V>;

    async fn get_and_active_session(&self, key: &SessionKey) -> SessionResult<V> {
        self.active_session(key).await
    }

    /// Replaces the payload in place and activates the session.
    async fn update_session_value(&self, key: &SessionKey, value: V) -> SessionResult<V>;

    async fn abandon_session(&self, key: &SessionKey) -> SessionResult<V>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent<V>>;
}
