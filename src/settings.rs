use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

const ENV_PREFIX: &str = "NODE_EDITOR_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSettings {
    pub server_url: String,
    pub request_timeout_ms: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:5000".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

impl ClientSettings {
    /// Build settings from loose string pairs; unknown or unparsable keys fall back.
    pub fn from_map(map: &HashMap<String, String>) -> Self {
        let defaults = Self::default();

        Self {
            server_url: map
                .get("server_url")
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.server_url),
            request_timeout_ms: map
                .get("request_timeout_ms")
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(defaults.request_timeout_ms),
        }
    }

    /// `NODE_EDITOR_SERVER_URL`, `NODE_EDITOR_REQUEST_TIMEOUT_MS`
    pub fn from_env() -> Self {
        Self::from_map(&env_pairs(std::env::vars()))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn env_pairs(vars: impl Iterator<Item = (String, String)>) -> HashMap<String, String> {
    vars.filter_map(|(key, value)| {
        key.strip_prefix(ENV_PREFIX)
            .map(|rest| (rest.to_ascii_lowercase(), value))
    })
    .collect()
}
