//! Application configuration
//!
//! Read once from environment variables at startup and passed to the
//! constructors that need it.
//!
//! | Variable                | Default                   |
//! |-------------------------|---------------------------|
//! | `BIND_ADDR`             | `127.0.0.1:8080`          |
//! | `DATA_DIR`              | `./data`                  |
//! | `STORAGE`               | `file` (`file`, `memory`) |
//! | `ASK_TIMEOUT_MS`        | `5000`                    |
//! | `SHARD_COUNT`           | `100`                     |
//! | `CLUSTER_NODES`         | `node-1:sharded+endpoint` |
//! | `PASSIVATION_IDLE_SECS` | `120` (`0` disables)      |
//! | `MAILBOX_CAPACITY`      | `64`                      |
//! | `LOG_FORMAT`            | `text` (`text`, `json`)   |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::cluster::Roles;
use crate::sharding::NodeId;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name}: invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("CLUSTER_NODES needs at least one {0} node")]
    MissingRole(&'static str),

    #[error("CLUSTER_NODES lists {0} more than once")]
    DuplicateNode(NodeId),
}

/// Where entity logs are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// One JSONL file per entity under the data directory
    File,
    /// Process memory; lost on restart
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// One node of the cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSpec {
    pub id: NodeId,
    pub roles: Roles,
}

impl FromStr for NodeSpec {
    type Err = String;

    /// `node-a:sharded+endpoint`; a bare name gets both roles
    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let (id, roles) = match spec.split_once(':') {
            Some((id, roles)) => {
                let roles =
                    Roles::parse(roles).ok_or_else(|| format!("unknown roles {roles:?}"))?;
                (id.trim(), roles)
            }
            None => (spec.trim(), Roles::ALL),
        };
        if id.is_empty() {
            return Err("empty node name".to_string());
        }
        Ok(NodeSpec {
            id: NodeId::new(id),
            roles,
        })
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub storage: StorageBackend,
    /// Bound on every external request, delivery included
    pub ask_timeout: Duration,
    /// Fixed for the lifetime of the data
    pub shard_count: u32,
    pub nodes: Vec<NodeSpec>,
    pub idle_timeout: Option<Duration>,
    pub mailbox_capacity: usize,
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            data_dir: PathBuf::from("./data"),
            storage: StorageBackend::File,
            ask_timeout: Duration::from_secs(5),
            shard_count: 100,
            nodes: vec![NodeSpec {
                id: NodeId::new("node-1"),
                roles: Roles::ALL,
            }],
            idle_timeout: Some(Duration::from_secs(120)),
            mailbox_capacity: 64,
            log_format: LogFormat::Text,
        }
    }
}

impl AppConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from any variable source; unset variables keep their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup("BIND_ADDR") {
            config.bind_addr = parse("BIND_ADDR", &value)?;
        }
        if let Some(value) = lookup("DATA_DIR") {
            config.data_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup("STORAGE") {
            config.storage = match value.to_ascii_lowercase().as_str() {
                "file" => StorageBackend::File,
                "memory" => StorageBackend::Memory,
                _ => return Err(invalid("STORAGE", &value, "expected file or memory")),
            };
        }
        if let Some(value) = lookup("ASK_TIMEOUT_MS") {
            let millis: u64 = parse("ASK_TIMEOUT_MS", &value)?;
            if millis == 0 {
                return Err(ConfigError::Zero("ASK_TIMEOUT_MS"));
            }
            config.ask_timeout = Duration::from_millis(millis);
        }
        if let Some(value) = lookup("SHARD_COUNT") {
            config.shard_count = parse("SHARD_COUNT", &value)?;
            if config.shard_count == 0 {
                return Err(ConfigError::Zero("SHARD_COUNT"));
            }
        }
        if let Some(value) = lookup("CLUSTER_NODES") {
            config.nodes = value
                .split(',')
                .filter(|spec| !spec.trim().is_empty())
                .map(|spec| {
                    spec.parse::<NodeSpec>()
                        .map_err(|reason| invalid("CLUSTER_NODES", spec, &reason))
                })
                .collect::<Result<_, _>>()?;
        }
        if let Some(value) = lookup("PASSIVATION_IDLE_SECS") {
            let secs: u64 = parse("PASSIVATION_IDLE_SECS", &value)?;
            config.idle_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(value) = lookup("MAILBOX_CAPACITY") {
            config.mailbox_capacity = parse("MAILBOX_CAPACITY", &value)?;
            if config.mailbox_capacity == 0 {
                return Err(ConfigError::Zero("MAILBOX_CAPACITY"));
            }
        }
        if let Some(value) = lookup("LOG_FORMAT") {
            config.log_format = match value.to_ascii_lowercase().as_str() {
                "text" => LogFormat::Text,
                "json" => LogFormat::Json,
                _ => return Err(invalid("LOG_FORMAT", &value, "expected text or json")),
            };
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.nodes.iter().any(|n| n.roles.sharded) {
            return Err(ConfigError::MissingRole("sharded"));
        }
        if !self.nodes.iter().any(|n| n.roles.endpoint) {
            return Err(ConfigError::MissingRole("endpoint"));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if self.nodes[..i].iter().any(|other| other.id == node.id) {
                return Err(ConfigError::DuplicateNode(node.id.clone()));
            }
        }
        Ok(())
    }
}

fn parse<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|err: T::Err| invalid(name, value, &err.to_string()))
}

fn invalid(name: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();

        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.storage, StorageBackend::File);
        assert_eq!(config.ask_timeout, Duration::from_secs(5));
        assert_eq!(config.shard_count, 100);
        assert_eq!(config.nodes.len(), 1);
        assert_eq!(config.nodes[0].roles, Roles::ALL);
        assert_eq!(config.idle_timeout, Some(Duration::from_secs(120)));
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("BIND_ADDR", "0.0.0.0:9000"),
            ("STORAGE", "memory"),
            ("ASK_TIMEOUT_MS", "250"),
            ("SHARD_COUNT", "16"),
            ("CLUSTER_NODES", "a:sharded, b:sharded ,gw:endpoint"),
            ("PASSIVATION_IDLE_SECS", "0"),
            ("LOG_FORMAT", "JSON"),
        ])
        .unwrap();

        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(config.ask_timeout, Duration::from_millis(250));
        assert_eq!(config.shard_count, 16);
        assert_eq!(
            config.nodes.iter().map(|n| n.id.as_str()).collect::<Vec<_>>(),
            vec!["a", "b", "gw"]
        );
        assert!(!config.nodes[2].roles.sharded);
        assert_eq!(config.idle_timeout, None);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_zero_shard_count_is_rejected() {
        assert!(matches!(
            load(&[("SHARD_COUNT", "0")]),
            Err(ConfigError::Zero("SHARD_COUNT"))
        ));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            load(&[("ASK_TIMEOUT_MS", "soon")]),
            Err(ConfigError::Invalid { name: "ASK_TIMEOUT_MS", .. })
        ));
        assert!(matches!(
            load(&[("CLUSTER_NODES", "a:seed")]),
            Err(ConfigError::Invalid { name: "CLUSTER_NODES", .. })
        ));
    }

    #[test]
    fn test_cluster_needs_both_roles() {
        assert!(matches!(
            load(&[("CLUSTER_NODES", "a:sharded")]),
            Err(ConfigError::MissingRole("endpoint"))
        ));
        assert!(matches!(
            load(&[("CLUSTER_NODES", "gw:endpoint")]),
            Err(ConfigError::MissingRole("sharded"))
        ));
        assert!(matches!(
            load(&[("CLUSTER_NODES", "a,a")]),
            Err(ConfigError::DuplicateNode(_))
        ));
    }
}
