use std::env;
use std::time::Duration;

/// Config holds all application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: String,
    /// JSON file of extra switch models layered over the built-in catalog
    pub catalog_path: Option<String>,
    pub generation_timeout_secs: u64,
    pub max_plan_bytes: usize,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn load() -> Self {
        Self {
            listen_addr: get_env("LISTEN_ADDR", "0.0.0.0:8080"),
            catalog_path: env::var("SWITCH_MODEL_CATALOG").ok().filter(|p| !p.trim().is_empty()),
            generation_timeout_secs: get_env("GENERATION_TIMEOUT_SECS", "30")
                .parse()
                .unwrap_or(30),
            max_plan_bytes: get_env("MAX_PLAN_BYTES", "2097152")
                .parse()
                .unwrap_or(2 * 1024 * 1024),
        }
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs.max(1))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            catalog_path: None,
            generation_timeout_secs: 30,
            max_plan_bytes: 2 * 1024 * 1024,
        }
    }
}

fn get_env(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
