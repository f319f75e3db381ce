//! Operator configuration – reads/writes `~/.physician/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use zeroize::Zeroize;

/// Which reasoning backend the session consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// HTTP bridge accepting multipart uploads.
    #[default]
    Bridge,
    /// OpenAI-compatible vision chat endpoint.
    Llm,
}

impl Backend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bridge" => Some(Backend::Bridge),
            "llm" => Some(Backend::Llm),
            _ => None,
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Bridge => write!(f, "bridge"),
            Backend::Llm => write!(f, "llm"),
        }
    }
}

/// Persisted configuration stored in `~/.physician/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: Backend,

    /// Base URL of the verification bridge.
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,

    /// Base URL of the chat-completions server used by the `llm` backend.
    #[serde(default = "default_llm_url")]
    pub llm_url: String,

    /// Vision model name (e.g. "llava").
    #[serde(default = "default_llm_model")]
    pub llm_model: String,

    /// Bearer token for hosted endpoints.  Cleared from memory on drop.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub llm_api_key: String,

    /// Upper bound on one oracle call, in seconds.  Zero falls back to 30.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Config {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Drop for Config {
    fn drop(&mut self) {
        self.llm_api_key.zeroize();
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("backend", &self.backend)
            .field("bridge_url", &self.bridge_url)
            .field("llm_url", &self.llm_url)
            .field("llm_model", &self.llm_model)
            .field(
                "llm_api_key",
                if self.llm_api_key.is_empty() { &"<not set>" } else { &"<redacted>" },
            )
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

fn default_bridge_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_llm_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_llm_model() -> String {
    "llava".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            bridge_url: default_bridge_url(),
            llm_url: default_llm_url(),
            llm_model: default_llm_model(),
            llm_api_key: String::new(),
            request_timeout_secs: default_timeout_secs(),
        }
    }
}

/// Return the path to `~/.physician/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".physician").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

/// Load the config at `path` and apply environment overrides.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    if cfg.request_timeout_secs == 0 {
        cfg.request_timeout_secs = default_timeout_secs();
    }
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `PHYSICIAN_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `PHYSICIAN_BACKEND` | `backend` (`bridge` or `llm`) |
/// | `PHYSICIAN_BRIDGE_URL` | `bridge_url` |
/// | `PHYSICIAN_LLM_URL` | `llm_url` |
/// | `PHYSICIAN_MODEL` | `llm_model` |
/// | `PHYSICIAN_TIMEOUT_SECS` | `request_timeout_secs` |
///
/// Unparseable values are ignored, as is a zero timeout.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("PHYSICIAN_BACKEND")
        && let Some(backend) = Backend::parse(&v)
    {
        cfg.backend = backend;
    }
    if let Ok(v) = std::env::var("PHYSICIAN_BRIDGE_URL") {
        cfg.bridge_url = v;
    }
    if let Ok(v) = std::env::var("PHYSICIAN_LLM_URL") {
        cfg.llm_url = v;
    }
    if let Ok(v) = std::env::var("PHYSICIAN_MODEL") {
        cfg.llm_model = v;
    }
    if let Ok(v) = std::env::var("PHYSICIAN_TIMEOUT_SECS")
        && let Ok(secs) = v.trim().parse::<u64>()
        && secs > 0
    {
        cfg.request_timeout_secs = secs;
    }
}

/// Save the config to disk, creating `~/.physician/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    // Owner-only (rw-------): the file may hold an API key.
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
