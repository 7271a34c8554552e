use config::{Config, ConfigError, File, FileFormat};
use serde::Deserialize;
use std::time::Duration;

/// Tuning for a `NameserverAddressStore`.  Every field has a default,
/// so an empty file is a valid configuration.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize)]
pub struct Settings {
    /// Buckets in the zone hash table.
    #[serde(default = "default_zone_hash_size")]
    pub zone_hash_size: usize,

    /// Buckets in the nameserver hash table.
    #[serde(default = "default_nameserver_hash_size")]
    pub nameserver_hash_size: usize,

    /// Maximum number of zone entries.
    #[serde(default = "default_zone_capacity")]
    pub zone_capacity: usize,

    /// Maximum number of nameserver entries.
    #[serde(default = "default_nameserver_capacity")]
    pub nameserver_capacity: usize,

    /// Upper bound, in seconds, on how long any record TTL keeps an
    /// entry alive.
    #[serde(default = "default_max_ttl")]
    pub max_ttl: u32,

    /// How long, in seconds, an unreachable nameserver or address is
    /// remembered as such.
    #[serde(default = "default_unreachable_ttl")]
    pub unreachable_ttl: u32,

    /// How long, in seconds, a resolver request may take.
    #[serde(default = "default_resolve_timeout")]
    pub resolve_timeout: u64,
}

fn default_zone_hash_size() -> usize {
    1009
}

fn default_nameserver_hash_size() -> usize {
    3001
}

fn default_zone_capacity() -> usize {
    1009
}

fn default_nameserver_capacity() -> usize {
    3001
}

fn default_max_ttl() -> u32 {
    86400
}

fn default_unreachable_ttl() -> u32 {
    30
}

fn default_resolve_timeout() -> u64 {
    5
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            zone_hash_size: default_zone_hash_size(),
            nameserver_hash_size: default_nameserver_hash_size(),
            zone_capacity: default_zone_capacity(),
            nameserver_capacity: default_nameserver_capacity(),
            max_ttl: default_max_ttl(),
            unreachable_ttl: default_unreachable_ttl(),
            resolve_timeout: default_resolve_timeout(),
        }
    }
}

impl Settings {
    /// Read settings from a file.  The format is picked by the
    /// extension, or found by trying each one if there is none.
    pub fn new(filename: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(filename))
            .build()?
            .try_deserialize::<Self>()?
            .validated()
    }

    /// Read settings from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize::<Self>()?
            .validated()
    }

    pub fn max_ttl(&self) -> Duration {
        Duration::from_secs(self.max_ttl.into())
    }

    pub fn unreachable_ttl(&self) -> Duration {
        Duration::from_secs(self.unreachable_ttl.into())
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout)
    }

    /// Reject sizes the tables cannot be built with.
    pub fn validated(self) -> Result<Self, ConfigError> {
        for (name, value) in [
            ("zone_hash_size", self.zone_hash_size),
            ("nameserver_hash_size", self.nameserver_hash_size),
            ("zone_capacity", self.zone_capacity),
            ("nameserver_capacity", self.nameserver_capacity),
        ] {
            if value == 0 {
                return Err(ConfigError::Message(format!("{name} must be nonzero")));
            }
        }
        if self.resolve_timeout == 0 {
            return Err(ConfigError::Message(
                "resolve_timeout must be nonzero".to_string(),
            ));
        }

        Ok(self)
    }
}
