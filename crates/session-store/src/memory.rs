use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use domainhost_core_types::{Identity, SessionKey};
use domainhost_event_bus::{EventBus, InMemoryBus};

use crate::api::{SessionResult, SessionStore};
use crate::config::SessionConfig;
use crate::errors::SessionError;
use crate::events::{RemovalReason, SessionEvent};
use crate::keys::{HashedKeys, KeyObfuscator};
use crate::metrics;
use crate::record::{redact, SessionRecord, SessionValue};

/// DashMap-backed store. Wrap it in an `Arc` to run the background sweeper.
pub struct MemorySessionStore<V: SessionValue = Identity> {
    sessions: DashMap<SessionKey, Arc<SessionRecord<V>>>,
    config: SessionConfig,
    keys: Arc<dyn KeyObfuscator>,
    bus: Arc<InMemoryBus<SessionEvent<V>>>,
    capacity_guard: Mutex<()>,
    shutdown: CancellationToken,
    sweeper: Mutex<Option<JoinHandle<()>>>,
    /// This store's share of the process-wide active gauge.
    reported_active: AtomicI64,
}

impl<V: SessionValue> MemorySessionStore<V> {
    pub fn new(config: SessionConfig) -> Result<Self, SessionError> {
        let keys = Arc::new(HashedKeys::new(config.key_salt.clone()));
        Self::with_obfuscator(config, keys)
    }

    pub fn with_obfuscator(
        config: SessionConfig,
        keys: Arc<dyn KeyObfuscator>,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let bus = InMemoryBus::new(config.event_capacity);
        Ok(Self {
            sessions: DashMap::new(),
            config,
            keys,
            bus,
            capacity_guard: Mutex::new(()),
            shutdown: CancellationToken::new(),
            sweeper: Mutex::new(None),
            reported_active: AtomicI64::new(0),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn keys(&self) -> Vec<SessionKey> {
        self.sessions.iter().map(|entry| entry.key().clone()).collect()
    }

    /// One eviction pass. Returns how many sessions were removed.
    pub async fn sweep_expired(&self) -> usize {
        let ttl = self.config.ttl;
        let candidates: Vec<SessionKey> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().is_expired(ttl))
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for (idx, batch) in candidates.chunks(self.config.sweep_batch_size).enumerate() {
            if idx > 0 {
                tokio::task::yield_now().await;
            }
            for key in batch {
                // The predicate re-checks under the shard lock: an activation
                // that landed after collection keeps the session alive.
                if let Some((_, record)) = self
                    .sessions
                    .remove_if(key, |_, record| record.is_expired(ttl))
                {
                    self.emit_evicted(record, RemovalReason::Expired);
                    removed += 1;
                }
            }
        }
        if removed > 0 {
            self.sync_active();
        }
        removed
    }

    /// Spawns the periodic sweeper. Calling it twice keeps the first task.
    pub fn start_sweeper(self: &Arc<Self>) {
        let mut slot = self.sweeper.lock();
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        let store: Weak<Self> = Arc::downgrade(self);
        let token = self.shutdown.clone();
        let period = self.config.scan_interval;
        *slot = Some(tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(store) = store.upgrade() else { break };
                        let removed = store.sweep_expired().await;
                        if removed > 0 {
                            debug!(removed, remaining = store.sessions.len(), "expired sessions swept");
                        }
                    }
                }
            }
            debug!("session sweeper stopped");
        }));
        info!(interval = ?period, ttl = ?self.config.ttl, "session sweeper started");
    }

    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handle = self.sweeper.lock().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!(?err, "session sweeper ended abnormally");
            }
        }
    }

    /// Moves the shared gauge by the change in this store's size.
    fn sync_active(&self) {
        let len = self.sessions.len() as i64;
        let previous = self.reported_active.swap(len, Ordering::AcqRel);
        metrics::adjust_active(len - previous);
    }

    fn validate_key(key: &SessionKey) -> Result<(), SessionError> {
        if key.is_blank() {
            return Err(SessionError::InvalidKey);
        }
        Ok(())
    }

    fn validate_value(value: &V) -> Result<(), SessionError> {
        value.validate().map_err(SessionError::InvalidValue)
    }

    /// Looks a session up, evicting it on the spot if it outlived the TTL
    /// before the sweeper got to it.
    fn live(&self, key: &SessionKey, activate: bool) -> SessionResult<V> {
        Self::validate_key(key)?;
        let ttl = self.config.ttl;
        {
            let entry = self
                .sessions
                .get(key)
                .ok_or_else(|| SessionError::NotFound(redact(key)))?;
            let record = entry.value();
            if !record.is_expired(ttl) {
                if activate {
                    record.activate();
                }
                return Ok(Arc::clone(record));
            }
        }
        self.evict_if_expired(key);
        Err(SessionError::NotFound(redact(key)))
    }

    fn evict_if_expired(&self, key: &SessionKey) {
        let ttl = self.config.ttl;
        if let Some((_, record)) = self.sessions.remove_if(key, |_, r| r.is_expired(ttl)) {
            self.emit_evicted(record, RemovalReason::Expired);
            self.sync_active();
        }
    }

    /// Frees one slot by dropping the least recently activated session.
    fn make_room(&self) {
        let Some(max) = self.config.max_sessions else {
            return;
        };
        while self.sessions.len() >= max {
            let oldest = self
                .sessions
                .iter()
                .min_by_key(|entry| entry.value().last_activated())
                .map(|entry| (entry.key().clone(), Arc::clone(entry.value())));
            let Some((key, candidate)) = oldest else {
                return;
            };
            if let Some((_, record)) = self
                .sessions
                .remove_if(&key, |_, current| Arc::ptr_eq(current, &candidate))
            {
                self.emit_evicted(record, RemovalReason::Capacity);
            }
        }
    }

    fn insert_new(&self, key: SessionKey, value: V) -> SessionResult<V> {
        let _capacity = self.config.max_sessions.map(|_| self.capacity_guard.lock());
        if self.sessions.contains_key(&key) {
            return Err(SessionError::DuplicatedKey(redact(&key)));
        }
        self.make_room();

        let record = match self.sessions.entry(key) {
            Entry::Occupied(entry) => return Err(SessionError::DuplicatedKey(redact(entry.key()))),
            Entry::Vacant(entry) => {
                let record = Arc::new(SessionRecord::new(entry.key().clone(), value));
                entry.insert(Arc::clone(&record));
                record
            }
        };
        self.emit_created(&record);
        Ok(record)
    }

    fn emit_created(&self, record: &Arc<SessionRecord<V>>) {
        metrics::record_created();
        self.sync_active();
        debug!(session = %redact(record.key()), "session created");
        self.bus.emit(SessionEvent::Created(Arc::clone(record)));
    }

    fn emit_evicted(&self, record: Arc<SessionRecord<V>>, reason: RemovalReason) {
        metrics::record_removed(reason.as_str());
        debug!(
            session = %redact(record.key()),
            reason = reason.as_str(),
            idle = ?record.idle(),
            "session evicted"
        );
        self.bus.emit(SessionEvent::Evicted { record, reason });
    }
}

#[async_trait]
impl<V: SessionValue> SessionStore<V> for MemorySessionStore<V> {
    async fn create_session(&self, value: V, key: Option<SessionKey>) -> SessionResult<V> {
        Self::validate_value(&value)?;
        let key = match key {
            Some(key) => {
                Self::validate_key(&key)?;
                key
            }
            None => self.keys.generate(),
        };
        self.insert_new(key, value)
    }

    async fn get_session(&self, key: &SessionKey) -> SessionResult<V> {
        self.live(key, false)
    }

    async fn get_or_create_session(&self, key: &SessionKey, value: V) -> SessionResult<V> {
        Self::validate_key(key)?;
        Self::validate_value(&value)?;
        let _capacity = self.config.max_sessions.map(|_| self.capacity_guard.lock());
        if !self.sessions.contains_key(key) {
            self.make_room();
        }

        let ttl = self.config.ttl;
        let (record, replaced) = match self.sessions.entry(key.clone()) {
            Entry::Occupied(mut entry) if entry.get().is_expired(ttl) => {
                let record = Arc::new(SessionRecord::new(key.clone(), value));
                let stale = entry.insert(Arc::clone(&record));
                (record, Some(stale))
            }
            Entry::Occupied(entry) => return Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let record = Arc::new(SessionRecord::new(key.clone(), value));
                entry.insert(Arc::clone(&record));
                (record, None)
            }
        };
        if let Some(stale) = replaced {
            self.emit_evicted(stale, RemovalReason::Expired);
        }
        self.emit_created(&record);
        Ok(record)
    }

    async fn active_session(&self, key: &SessionKey) -> SessionResult<V> {
        self.live(key, true)
    }

    async fn update_session_value(&self, key: &SessionKey, value: V) -> SessionResult<V> {
        Self::validate_value(&value)?;
        let record = self.live(key, false)?;

        let current = self
            .sessions
            .get(key)
            .filter(|entry| Arc::ptr_eq(entry.value(), &record))
            .ok_or_else(|| SessionError::UpdateFailed(redact(key)))?;
        record.replace_value(value);
        record.activate();
        drop(current);
        Ok(record)
    }

    async fn abandon_session(&self, key: &SessionKey) -> SessionResult<V> {
        Self::validate_key(key)?;
        let ttl = self.config.ttl;
        // A session past its TTL timed out; abandoning it is too late.
        let Some((_, record)) = self.sessions.remove_if(key, |_, r| !r.is_expired(ttl)) else {
            self.evict_if_expired(key);
            return Err(SessionError::NotFound(redact(key)));
        };
        metrics::record_removed("abandoned");
        self.sync_active();
        debug!(session = %redact(key), "session abandoned");
        self.bus.emit(SessionEvent::Abandoned(Arc::clone(&record)));
        Ok(record)
    }

    fn len(&self) -> usize {
        self.sessions.len()
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent<V>> {
        self.bus.subscribe()
    }
}

impl<V: SessionValue> Drop for MemorySessionStore<V> {
    fn drop(&mut self) {
        self.shutdown.cancel();
        metrics::adjust_active(-*self.reported_active.get_mut());
    }
}
