//! Host configuration.
//!
//! Values are layered: built-in defaults, then an optional YAML or JSON file,
//! then `DOMAINHOST__`-prefixed environment variables whose `__`-separated
//! segments name the field (`DOMAINHOST__SESSION__TTL=30m`).

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use domainhost_session::{SessionConfig, SessionError};

const ENV_PREFIX: &str = "DOMAINHOST__";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {message}")]
    Io { path: PathBuf, message: String },
    #[error("cannot parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<SessionError> for ConfigError {
    fn from(value: SessionError) -> Self {
        match value {
            SessionError::InvalidConfig(message) => ConfigError::Invalid(message),
            other => ConfigError::Invalid(other.to_string()),
        }
    }
}

/// Which built-in pipeline pieces the host installs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterceptionConfig {
    pub global_authorization: bool,
    pub logging_filter: bool,
    pub caching_hints: bool,
    pub log_exceptions: bool,
}

impl Default for InterceptionConfig {
    fn default() -> Self {
        Self {
            global_authorization: true,
            logging_filter: true,
            caching_hints: true,
            log_exceptions: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub session: SessionConfig,
    pub interception: InterceptionConfig,
    pub logging: LoggingConfig,
}

impl HostConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.session.validate()?;
        if self.logging.level.trim().parse::<tracing::Level>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "unknown log level '{}'",
                self.logging.level
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Builtin,
    File,
    Env,
}

#[derive(Debug, Default)]
pub struct LoadOptions {
    pub path: Option<PathBuf>,
    pub include_env: bool,
}

impl LoadOptions {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            include_env: true,
        }
    }
}

#[derive(Debug)]
pub struct LoadedConfig {
    pub config: HostConfig,
    pub path: Option<PathBuf>,
    /// Where each leaf value finally came from, keyed by dotted path.
    pub provenance: BTreeMap<String, ConfigSource>,
}

pub fn load_config(path: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    load_config_with_options(&LoadOptions {
        path: path.map(Path::to_path_buf),
        include_env: true,
    })
}

pub fn load_config_with_options(options: &LoadOptions) -> Result<LoadedConfig, ConfigError> {
    let mut tree = serde_json::to_value(HostConfig::default())
        .map_err(|err| ConfigError::Invalid(err.to_string()))?;
    let mut provenance = BTreeMap::new();
    for overlay in flatten_value(tree.clone(), None) {
        provenance.insert(overlay.0, ConfigSource::Builtin);
    }

    let mut used_path = None;
    if let Some(path) = &options.path {
        for (key, value) in flatten_value(read_file(path)?, None) {
            set_path(&mut tree, &key, value);
            provenance.insert(key, ConfigSource::File);
        }
        used_path = Some(path.clone());
    }

    if options.include_env {
        for (key, value) in overlays_from_vars(env::vars()) {
            set_path(&mut tree, &key, value);
            provenance.insert(key, ConfigSource::Env);
        }
    }

    let config: HostConfig =
        serde_json::from_value(tree).map_err(|err| ConfigError::Invalid(err.to_string()))?;
    config.validate()?;
    Ok(LoadedConfig {
        config,
        path: used_path,
        provenance,
    })
}

fn read_file(path: &Path) -> Result<Value, ConfigError> {
    let content = fs::read_to_string(path).map_err(|err| ConfigError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    let parse_error = |message: String| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    };
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        return serde_json::from_str(&content).map_err(|err| parse_error(err.to_string()));
    }
    let yaml: serde_yaml::Value =
        serde_yaml::from_str(&content).map_err(|err| parse_error(err.to_string()))?;
    serde_json::to_value(yaml).map_err(|err| parse_error(err.to_string()))
}

/// Environment pairs with the prefix, turned into `(dotted.path, value)`.
pub fn overlays_from_vars<I>(vars: I) -> Vec<(String, Value)>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut overlays = Vec::new();
    for (key, raw) in vars {
        let Some(stripped) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let path = stripped
            .split("__")
            .filter(|segment| !segment.is_empty())
            .map(|segment| segment.to_ascii_lowercase())
            .collect::<Vec<_>>()
            .join(".");
        if path.is_empty() {
            continue;
        }
        overlays.push((path, parse_env_value(&raw)));
    }
    overlays.sort_by(|a, b| a.0.cmp(&b.0));
    overlays
}

fn parse_env_value(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    if let Ok(parsed) = serde_json::from_str::<Value>(raw) {
        return parsed;
    }
    Value::String(raw.to_string())
}

fn flatten_value(value: Value, prefix: Option<String>) -> Vec<(String, Value)> {
    match value {
        Value::Object(map) => {
            let mut result = Vec::new();
            for (key, value) in map {
                let segment = key.trim().to_ascii_lowercase();
                let next = match &prefix {
                    Some(prefix) if !prefix.is_empty() => format!("{prefix}.{segment}"),
                    _ => segment,
                };
                result.extend(flatten_value(value, Some(next)));
            }
            result
        }
        other => match prefix {
            Some(prefix) => vec![(prefix, other)],
            None => Vec::new(),
        },
    }
}

fn set_path(tree: &mut Value, path: &str, value: Value) {
    let mut node = tree;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let Value::Object(map) = node else {
            return;
        };
        if segments.peek().is_none() {
            map.insert(segment.to_string(), value);
            return;
        }
        node = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn env_names_become_dotted_paths() {
        let overlays = overlays_from_vars(vec![
            ("DOMAINHOST__SESSION__TTL".to_string(), "45m".to_string()),
            ("DOMAINHOST__LOGGING__JSON".to_string(), "true".to_string()),
            ("OTHER__SESSION__TTL".to_string(), "1s".to_string()),
        ]);
        assert_eq!(
            overlays,
            vec![
                ("logging.json".to_string(), Value::Bool(true)),
                ("session.ttl".to_string(), Value::String("45m".into())),
            ]
        );
    }

    #[test]
    fn set_path_creates_intermediate_objects() {
        let mut tree = serde_json::json!({"session": {"ttl": "20m"}});
        set_path(&mut tree, "session.max_sessions", serde_json::json!(10));
        set_path(&mut tree, "extra.nested.flag", Value::Bool(true));
        assert_eq!(tree["session"]["ttl"], "20m");
        assert_eq!(tree["session"]["max_sessions"], 10);
        assert_eq!(tree["extra"]["nested"]["flag"], true);
    }

    #[test]
    fn defaults_round_trip_through_the_loader() {
        let loaded = load_config_with_options(&LoadOptions::default()).unwrap();
        assert_eq!(loaded.config, HostConfig::default());
        assert_eq!(loaded.config.session.ttl, Duration::from_secs(1200));
        assert_eq!(
            loaded.provenance.get("session.ttl"),
            Some(&ConfigSource::Builtin)
        );
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        let mut config = HostConfig::default();
        config.logging.level = "chatty".into();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
