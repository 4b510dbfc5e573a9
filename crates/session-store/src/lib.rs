//! In-process session store with sliding expiration.
//!
//! Sessions live in a [`MemorySessionStore`], keyed by an opaque [`SessionKey`].
//! Every activation pushes the expiry window forward; a background sweeper
//! evicts idle sessions and reports why each one left through
//! [`SessionEvent`].

pub mod api;
pub mod config;
pub mod errors;
pub mod events;
pub mod keys;
pub mod memory;
pub mod metrics;
pub mod record;

pub use api::SessionStore;
pub use config::SessionConfig;
pub use errors::SessionError;
pub use events::{RemovalReason, SessionEvent};
pub use keys::{HashedKeys, KeyObfuscator};
pub use memory::MemorySessionStore;
pub use record::{SessionRecord, SessionValue};

pub use domainhost_core_types::{Identity, SessionKey};
