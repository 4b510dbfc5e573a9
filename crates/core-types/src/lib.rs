use std::collections::BTreeSet;
use std::fmt;

use uuid::Uuid;

/// Opaque session key as seen by the host layer.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct SessionKey(pub String);

impl SessionKey {
    /// Raw random material; stores obfuscate it before exposing it.
    pub fn raw_random() -> String {
        Uuid::new_v4().to_string()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Empty and whitespace-only keys are never valid.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SessionKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Caller capabilities the interception pipeline relies on.
pub trait Principal: Send + Sync + fmt::Debug {
    fn name(&self) -> Option<&str>;
    fn is_authenticated(&self) -> bool;
    fn is_in_role(&self, role: &str) -> bool;
}

/// Default principal carried by sessions.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Identity {
    name: Option<String>,
    authenticated: bool,
    roles: BTreeSet<String>,
    #[cfg_attr(feature = "serde-full", serde(default))]
    tenant: Option<String>,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Guest sessions have a display name but are not authenticated.
    pub fn guest(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn user<I, S>(name: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: Some(name.into()),
            authenticated: true,
            roles: roles.into_iter().map(Into::into).collect(),
            tenant: None,
        }
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    pub fn tenant(&self) -> Option<&str> {
        self.tenant.as_deref()
    }
}

impl Principal for Identity {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    fn is_in_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.name, self.authenticated) {
            (Some(name), true) => f.write_str(name),
            (Some(name), false) => write!(f, "{name} (guest)"),
            (None, _) => f.write_str("anonymous"),
        }
    }
}
