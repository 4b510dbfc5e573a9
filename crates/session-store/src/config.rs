use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::SessionError;

/// Store tuning. Durations are humantime strings in files ("20m", "30s").
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    #[serde(with = "duration_str")]
    pub ttl: Duration,
    #[serde(with = "duration_str")]
    pub scan_interval: Duration,
    pub key_salt: Option<String>,
    pub max_sessions: Option<usize>,
    pub sweep_batch_size: usize,
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(20 * 60),
            scan_interval: Duration::from_secs(60),
            key_salt: None,
            max_sessions: None,
            sweep_batch_size: 256,
            event_capacity: 256,
        }
    }
}

impl SessionConfig {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval = interval;
        self
    }

    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.key_salt = Some(salt.into());
        self
    }

    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = Some(max);
        self
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        if self.ttl.is_zero() {
            return Err(SessionError::InvalidConfig("ttl must be positive".into()));
        }
        if self.scan_interval.is_zero() {
            return Err(SessionError::InvalidConfig(
                "scan_interval must be positive".into(),
            ));
        }
        if self.sweep_batch_size == 0 {
            return Err(SessionError::InvalidConfig(
                "sweep_batch_size must be positive".into(),
            ));
        }
        if self.max_sessions == Some(0) {
            return Err(SessionError::InvalidConfig(
                "max_sessions must be positive when set".into(),
            ));
        }
        Ok(())
    }
}

/// Serde adapter for humantime durations.
pub mod duration_str {
    use std::time::Duration;

    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(raw.trim())
            .map_err(|err| D::Error::custom(format!("invalid duration '{raw}': {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_humantime_fields_and_defaults_the_rest() {
        let cfg: SessionConfig = serde_yaml::from_str("ttl: 30m\nkey_salt: pepper\n").unwrap();
        assert_eq!(cfg.ttl, Duration::from_secs(1800));
        assert_eq!(cfg.scan_interval, Duration::from_secs(60));
        assert_eq!(cfg.key_salt.as_deref(), Some("pepper"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_zero_durations() {
        let cfg = SessionConfig::default().with_ttl(Duration::ZERO);
        assert!(matches!(cfg.validate(), Err(SessionError::InvalidConfig(_))));
        let cfg = SessionConfig::default().with_max_sessions(0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn bad_duration_is_a_parse_error() {
        let res: Result<SessionConfig, _> = serde_yaml::from_str("ttl: soon\n");
        assert!(res.is_err());
    }
}
