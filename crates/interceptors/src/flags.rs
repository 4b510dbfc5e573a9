//! Declarative markers attached to services and methods.
//!
//! Flags carry no behaviour. Filters read them from the invocation context to
//! decide whether and how to run.

use std::collections::BTreeSet;
use std::time::Duration;

use domainhost_core_types::Principal;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RoleLogic {
    Any,
    All,
}

impl RoleLogic {
    pub const fn as_str(self) -> &'static str {
        match self {
            RoleLogic::Any => "any",
            RoleLogic::All => "all",
        }
    }
}

/// One role group. Several groups on a method are AND-ed together.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoleRequirement {
    roles: BTreeSet<String>,
    logic: RoleLogic,
}

impl RoleRequirement {
    pub fn new<I, S>(logic: RoleLogic, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
            logic,
        }
    }

    pub fn any<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(RoleLogic::Any, roles)
    }

    pub fn all<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(RoleLogic::All, roles)
    }

    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    pub fn logic(&self) -> RoleLogic {
        self.logic
    }

    /// An empty group never denies.
    pub fn is_satisfied_by(&self, principal: &dyn Principal) -> bool {
        if self.roles.is_empty() {
            return true;
        }
        match self.logic {
            RoleLogic::Any => self.roles.iter().any(|role| principal.is_in_role(role)),
            RoleLogic::All => self.roles.iter().all(|role| principal.is_in_role(role)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Flag {
    AllowAnonymous,
    DisableGlobalAuthorization,
    Authorize,
    RequireRoles(RoleRequirement),
    CacheHint { ttl: Duration, per_caller: bool },
    SkipLogging,
    Custom(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlagSet(Vec<Flag>);

impl FlagSet {
    pub fn new(flags: Vec<Flag>) -> Self {
        Self(flags)
    }

    pub fn push(&mut self, flag: Flag) {
        self.0.push(flag);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Flag> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn allows_anonymous(&self) -> bool {
        self.0.contains(&Flag::AllowAnonymous)
    }

    pub fn disables_global_authorization(&self) -> bool {
        self.0.contains(&Flag::DisableGlobalAuthorization)
    }

    /// `Authorize` or any role group.
    pub fn requires_authorization(&self) -> bool {
        self.0
            .iter()
            .any(|flag| matches!(flag, Flag::Authorize | Flag::RequireRoles(_)))
    }

    pub fn role_requirements(&self) -> impl Iterator<Item = &RoleRequirement> {
        self.0.iter().filter_map(|flag| match flag {
            Flag::RequireRoles(requirement) => Some(requirement),
            _ => None,
        })
    }

    pub fn cache_hint(&self) -> Option<(Duration, bool)> {
        self.0.iter().find_map(|flag| match flag {
            Flag::CacheHint { ttl, per_caller } => Some((*ttl, *per_caller)),
            _ => None,
        })
    }

    pub fn skips_logging(&self) -> bool {
        self.0.contains(&Flag::SkipLogging)
    }

    pub fn has_custom(&self, name: &str) -> bool {
        self.0
            .iter()
            .any(|flag| matches!(flag, Flag::Custom(custom) if custom == name))
    }
}

impl FromIterator<Flag> for FlagSet {
    fn from_iter<T: IntoIterator<Item = Flag>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domainhost_core_types::Identity;

    #[test]
    fn any_and_all_groups() {
        let ops = Identity::user("olga", ["ops"]);
        let both = Identity::user("ada", ["ops", "admin"]);

        let any = RoleRequirement::any(["admin", "ops"]);
        let all = RoleRequirement::all(["admin", "ops"]);

        assert!(any.is_satisfied_by(&ops));
        assert!(!all.is_satisfied_by(&ops));
        assert!(all.is_satisfied_by(&both));
        assert!(RoleRequirement::all(Vec::<String>::new()).is_satisfied_by(&ops));
    }

    #[test]
    fn flag_queries() {
        let flags: FlagSet = [
            Flag::RequireRoles(RoleRequirement::any(["a"])),
            Flag::CacheHint {
                ttl: Duration::from_secs(30),
                per_caller: true,
            },
            Flag::Custom("audit".into()),
        ]
        .into_iter()
        .collect();

        assert!(flags.requires_authorization());
        assert!(!flags.allows_anonymous());
        assert_eq!(flags.role_requirements().count(), 1);
        assert_eq!(flags.cache_hint(), Some((Duration::from_secs(30), true)));
        assert!(flags.has_custom("audit"));
        assert!(!flags.has_custom("other"));
    }
}
