use std::sync::Arc;

use domainhost_core_types::SessionKey;

use crate::record::{SessionRecord, SessionValue};

/// Why the store dropped a session on its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RemovalReason {
    /// Idle time exceeded the sliding TTL.
    Expired,
    /// The store was full and this was the least recently activated session.
    Capacity,
}

impl RemovalReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            RemovalReason::Expired => "expired",
            RemovalReason::Capacity => "capacity",
        }
    }
}

/// Lifecycle notifications. `Abandoned` is only ever an explicit removal;
/// `Evicted` is only ever the store's own decision.
#[derive(Clone, Debug)]
pub enum SessionEvent<V: SessionValue> {
    Created(Arc<SessionRecord<V>>),
    Abandoned(Arc<SessionRecord<V>>),
    Evicted {
        record: Arc<SessionRecord<V>>,
        reason: RemovalReason,
    },
}

impl<V: SessionValue> SessionEvent<V> {
    pub fn record(&self) -> &Arc<SessionRecord<V>> {
        match self {
            SessionEvent::Created(record)
            | SessionEvent::Abandoned(record)
            | SessionEvent::Evicted { record, .. } => record,
        }
    }

    pub fn key(&self) -> &SessionKey {
        self.record().key()
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            SessionEvent::Evicted {
                reason: RemovalReason::Expired,
                ..
            }
        )
    }
}
