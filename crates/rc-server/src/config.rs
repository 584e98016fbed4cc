//! Configuration: a TOML file overlaid with the fixed set of environment
//! knobs spec.md §6 names, following a file -> env var -> default
//! precedence for every section.

use std::path::PathBuf;

use rc_types::model::ConversationStrategy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeMode {
    Stub,
    Http,
}

impl Default for RuntimeMode {
    fn default() -> Self {
        RuntimeMode::Stub
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    #[serde(default = "d_archive_dir")]
    pub dir: PathBuf,
    #[serde(default)]
    pub cold_storage_dir: Option<PathBuf>,
    #[serde(default = "d_export_dir")]
    pub export_dir: PathBuf,
    #[serde(default = "d_ttl_days")]
    pub ttl_days: i64,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            dir: d_archive_dir(),
            cold_storage_dir: None,
            export_dir: d_export_dir(),
            ttl_days: d_ttl_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default = "d_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: d_host(),
            port: d_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub mode: RuntimeMode,
    #[serde(default = "d_default_policy")]
    pub default_policy: ConversationStrategy,
    #[serde(default = "d_context_window_tokens")]
    pub context_window_tokens: u64,
    #[serde(default = "d_cost_per_1k_tokens")]
    pub cost_per_1k_tokens: f64,
    #[serde(default)]
    pub provider_base_url: Option<String>,
    #[serde(default = "d_provider_api_key_env")]
    pub provider_api_key_env: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            mode: RuntimeMode::default(),
            default_policy: d_default_policy(),
            context_window_tokens: d_context_window_tokens(),
            cost_per_1k_tokens: d_cost_per_1k_tokens(),
            provider_base_url: None,
            provider_api_key_env: d_provider_api_key_env(),
        }
    }
}

fn d_archive_dir() -> PathBuf {
    PathBuf::from("./data/runs")
}
fn d_export_dir() -> PathBuf {
    PathBuf::from("./data/exports")
}
fn d_ttl_days() -> i64 {
    30
}
fn d_host() -> String {
    "127.0.0.1".to_string()
}
fn d_port() -> u16 {
    8080
}
fn d_default_policy() -> ConversationStrategy {
    ConversationStrategy::Stateless
}
fn d_context_window_tokens() -> u64 {
    128_000
}
fn d_cost_per_1k_tokens() -> f64 {
    0.002
}
fn d_provider_api_key_env() -> String {
    "RESPONSES_PROVIDER_API_KEY".to_string()
}

impl Config {
    /// Loads `config_path` if it exists (else starts from defaults), then
    /// overlays the fixed set of `RESPONSES_*` environment knobs spec.md §6
    /// names. Env vars always win over the file.
    pub fn load(config_path: &str) -> anyhow::Result<Self> {
        let mut config = if std::path::Path::new(config_path).exists() {
            let raw = std::fs::read_to_string(config_path)
                .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
            toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
        } else {
            Config::default()
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        if let Ok(v) = std::env::var("RESPONSES_ARCHIVE_DIR") {
            self.archive.dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("RESPONSES_ARCHIVE_COLD_STORAGE_DIR") {
            self.archive.cold_storage_dir = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("RESPONSES_ARCHIVE_EXPORT_DIR") {
            self.archive.export_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("RESPONSES_ARCHIVE_TTL_DAYS") {
            self.archive.ttl_days = v
                .parse()
                .map_err(|_| anyhow::anyhow!("RESPONSES_ARCHIVE_TTL_DAYS must be an integer"))?;
        }
        if let Ok(v) = std::env::var("RESPONSES_DEFAULT_POLICY") {
            self.runtime.default_policy = match v.as_str() {
                "vendor" => ConversationStrategy::Vendor,
                "stateless" => ConversationStrategy::Stateless,
                other => anyhow::bail!("RESPONSES_DEFAULT_POLICY must be vendor|stateless, got {other}"),
            };
        }
        if let Ok(v) = std::env::var("RESPONSES_CONTEXT_WINDOW_TOKENS") {
            self.runtime.context_window_tokens = v
                .parse()
                .map_err(|_| anyhow::anyhow!("RESPONSES_CONTEXT_WINDOW_TOKENS must be an integer"))?;
        }
        if let Ok(v) = std::env::var("RESPONSES_COST_PER_1K_TOKENS") {
            self.runtime.cost_per_1k_tokens = v
                .parse()
                .map_err(|_| anyhow::anyhow!("RESPONSES_COST_PER_1K_TOKENS must be a number"))?;
        }
        if let Ok(v) = std::env::var("RESPONSES_RUNTIME_MODE") {
            self.runtime.mode = match v.as_str() {
                "stub" => RuntimeMode::Stub,
                "http" => RuntimeMode::Http,
                other => anyhow::bail!("RESPONSES_RUNTIME_MODE must be stub|http, got {other}"),
            };
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENV_VARS: &[&str] = &[
        "RESPONSES_ARCHIVE_DIR",
        "RESPONSES_ARCHIVE_TTL_DAYS",
        "RESPONSES_DEFAULT_POLICY",
        "RESPONSES_CONTEXT_WINDOW_TOKENS",
        "RESPONSES_RUNTIME_MODE",
    ];

    fn clear_env() {
        for var in ENV_VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        clear_env();
        let config = Config::default();
        assert_eq!(config.archive.dir, PathBuf::from("./data/runs"));
        assert_eq!(config.archive.ttl_days, 30);
        assert_eq!(config.runtime.default_policy, ConversationStrategy::Stateless);
        assert_eq!(config.runtime.mode, RuntimeMode::Stub);
    }

    #[test]
    fn env_vars_override_file_and_default_values() {
        clear_env();
        std::env::set_var("RESPONSES_ARCHIVE_DIR", "/tmp/custom-runs");
        std::env::set_var("RESPONSES_ARCHIVE_TTL_DAYS", "7");
        std::env::set_var("RESPONSES_DEFAULT_POLICY", "vendor");
        std::env::set_var("RESPONSES_CONTEXT_WINDOW_TOKENS", "64000");
        std::env::set_var("RESPONSES_RUNTIME_MODE", "http");

        let mut config = Config::default();
        config.apply_env_overrides().unwrap();

        assert_eq!(config.archive.dir, PathBuf::from("/tmp/custom-runs"));
        assert_eq!(config.archive.ttl_days, 7);
        assert_eq!(config.runtime.default_policy, ConversationStrategy::Vendor);
        assert_eq!(config.runtime.context_window_tokens, 64_000);
        assert_eq!(config.runtime.mode, RuntimeMode::Http);

        clear_env();
    }

    #[test]
    fn an_invalid_enum_env_var_is_rejected() {
        clear_env();
        std::env::set_var("RESPONSES_DEFAULT_POLICY", "nonsense");
        let mut config = Config::default();
        assert!(config.apply_env_overrides().is_err());
        clear_env();
    }
}
