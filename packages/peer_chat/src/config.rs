use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use peer_session::{DEFAULT_PORT, SessionConfig};

// Two equivalent ways to configure:
//
//   config file:   name = "alice"
//                  port = 9990
//
//   env var:       PEERCHAT_NAME=alice
//
// CLI flags override both.

/// Tunables read from defaults, then the config file, then `PEERCHAT_*`
/// environment variables.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileConfig {
    /// Display name attached to your messages.
    #[serde(default = "default_name")]
    pub name: String,
    /// Port to dial and listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Dial attempts before giving up.
    #[serde(default = "default_max_tries")]
    pub max_tries: u32,
    /// Pause between failed dial attempts, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_name() -> String {
    "you".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_max_tries() -> u32 {
    10
}

fn default_retry_delay_ms() -> u64 {
    1000
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            port: default_port(),
            max_tries: default_max_tries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl FileConfig {
    /// Merge defaults < TOML file < environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(FileConfig::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment
            .merge(Env::prefixed("PEERCHAT_").split("__"))
            .extract()
            .context("failed to load configuration")
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            local_name: self.name.clone(),
            port: self.port,
            max_tries: self.max_tries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}
