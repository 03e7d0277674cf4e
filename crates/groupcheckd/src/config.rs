use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Site-local policy file, consulted first.
pub const DYNAMIC_POLICY_PATH: &str = "/etc/groupcheck.policy";
/// Distribution default policy file, the fallback.
pub const DEFAULT_POLICY_PATH: &str = "/usr/share/defaults/etc/groupcheck.policy";

#[derive(Debug, Deserialize)]
pub struct Config {
    /// Policy file or directory. When unset the well-known path pair is
    /// probed instead.
    #[serde(default)]
    pub policy_path: Option<PathBuf>,
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            policy_path: None,
            socket_path: default_socket_path(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_decision_log_path")]
    pub decision_log_path: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            decision_log_path: default_decision_log_path(),
        }
    }
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("/run/groupcheck/authority.sock")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_decision_log_path() -> PathBuf {
    PathBuf::from("/var/log/groupcheck/decisions.jsonl")
}

/// Load configuration from a YAML file.
///
/// If the file does not exist a default configuration is returned and a
/// warning is emitted; the daemon can run entirely from the well-known
/// policy paths.
pub fn load(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() {
        warn!(
            path = %path.display(),
            "configuration file not found; using defaults"
        );
        return Ok(Config::default());
    }

    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

    let config: Config = serde_yml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("failed to parse config file {}: {e}", path.display()))?;

    Ok(config)
}

/// Probe the well-known policy path pair: the site-local file first, then
/// the distribution default.
pub fn find_policy_source() -> Option<PathBuf> {
    for candidate in [DYNAMIC_POLICY_PATH, DEFAULT_POLICY_PATH] {
        let path = Path::new(candidate);
        if path.exists() {
            return Some(path.to_path_buf());
        }
    }
    None
}
