//! Configuration management for hexa.
//!
//! Loads configuration from ${HEXA_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::action::ReentryPolicy;
use crate::gate::LookupFailurePolicy;

/// Environment variable overriding `backend_url`.
pub const BACKEND_URL_ENV: &str = "HEXA_BACKEND_URL";
/// Environment variable overriding `anon_key`.
pub const ANON_KEY_ENV: &str = "HEXA_ANON_KEY";

/// Returns the default config template with comments.
///
/// This is embedded from default_config.toml at compile time.
/// To update, edit default_config.toml directly.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

/// Merges user config values into the default template.
///
/// New comments and sections from the template are kept while the user's
/// values win.
fn merge_with_template(user_config: &str) -> Result<String> {
    use toml_edit::DocumentMut;

    let mut doc: DocumentMut = default_config_template()
        .parse()
        .context("Failed to parse default config template")?;
    let user_doc: DocumentMut = user_config.parse().context("Failed to parse user config")?;

    merge_items(doc.as_table_mut(), user_doc.as_table());

    Ok(doc.to_string())
}

/// Recursively merges items from source table into target table.
fn merge_items(target: &mut toml_edit::Table, source: &toml_edit::Table) {
    use toml_edit::Item;

    for (key, value) in source.iter() {
        match value {
            Item::Value(v) => {
                target[key] = Item::Value(v.clone());
            }
            Item::Table(src_table) => {
                if let Some(Item::Table(target_table)) = target.get_mut(key) {
                    merge_items(target_table, src_table);
                } else {
                    target[key] = Item::Table(src_table.clone());
                }
            }
            Item::ArrayOfTables(src_arr) => {
                target[key] = Item::ArrayOfTables(src_arr.clone());
            }
            Item::None => {}
        }
    }
}

pub mod paths {
    //! Path resolution for hexa configuration and data directories.
    //!
    //! HEXA_HOME resolution order:
    //! 1. HEXA_HOME environment variable (if set)
    //! 2. ~/.config/hexa (default)
    //! 3. ./.hexa when no home directory can be determined

    use std::path::PathBuf;

    /// Returns the hexa home directory.
    pub fn hexa_home() -> PathBuf {
        if let Ok(home) = std::env::var("HEXA_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".hexa"),
            |h| h.join(".config").join("hexa"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        hexa_home().join("config.toml")
    }

    /// Returns the directory holding rolling log files.
    pub fn logs_dir() -> PathBuf {
        hexa_home().join("logs")
    }
}

/// Session handling on the client side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Refresh the access token before it expires
    pub auto_refresh: bool,
    /// Refresh window in seconds
    pub refresh_margin_secs: u64,
    /// Persist the session between runs
    pub persist_session: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            auto_refresh: true,
            refresh_margin_secs: 60,
            persist_session: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub avatar_bucket: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            avatar_bucket: "avatars".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TablesConfig {
    pub profiles: String,
    pub push_tokens: String,
}

impl Default for TablesConfig {
    fn default() -> Self {
        Self {
            profiles: "profiles".to_string(),
            push_tokens: "push_tokens".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    /// Project id handed to the push service
    pub project_id: Option<String>,
}

impl PushConfig {
    /// Returns the project id if set and non-empty.
    pub fn effective_project_id(&self) -> Option<&str> {
        self.project_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub lookup_failure: LookupFailurePolicy,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionsConfig {
    pub reentry: ReentryPolicy,
}

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the backend project
    pub backend_url: String,

    /// Public project key
    pub anon_key: String,

    /// Per-request timeout in seconds (0 disables)
    pub request_timeout_secs: u32,

    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub tables: TablesConfig,
    pub push: PushConfig,
    pub gate: GateConfig,
    pub actions: ActionsConfig,
}

impl Config {
    const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:54321";
    const DEFAULT_REQUEST_TIMEOUT_SECS: u32 = 30;

    /// Loads configuration from the default config path.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Backend URL, with `HEXA_BACKEND_URL` taking precedence.
    pub fn effective_backend_url(&self) -> String {
        resolve_override(std::env::var(BACKEND_URL_ENV).ok(), &self.backend_url)
    }

    /// Anon key, with `HEXA_ANON_KEY` taking precedence.
    pub fn effective_anon_key(&self) -> String {
        resolve_override(std::env::var(ANON_KEY_ENV).ok(), &self.anon_key)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        if self.request_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(u64::from(self.request_timeout_secs)))
        }
    }

    /// Saves the backend connection to the default config file.
    pub fn save_backend(backend_url: &str, anon_key: Option<&str>) -> Result<()> {
        Self::save_backend_to(&paths::config_path(), backend_url, anon_key)
    }

    /// Saves the backend connection fields to a specific config file path.
    ///
    /// Creates the file with default template if it doesn't exist.
    /// If file exists, merges user values into the latest template.
    pub fn save_backend_to(path: &Path, backend_url: &str, anon_key: Option<&str>) -> Result<()> {
        use toml_edit::{DocumentMut, value};

        url::Url::parse(backend_url.trim())
            .with_context(|| format!("Invalid backend URL: {backend_url}"))?;

        let contents = if path.exists() {
            let user_config = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            merge_with_template(&user_config)?
        } else {
            default_config_template().to_string()
        };

        let mut doc: DocumentMut = contents
            .parse()
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;

        doc["backend_url"] = value(backend_url.trim());
        if let Some(key) = anon_key {
            doc["anon_key"] = value(key.trim());
        }

        Self::write_config(path, &doc.to_string())
    }

    /// Creates a default config file at the given path.
    /// Returns an error if the file already exists.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, default_config_template())
    }

    /// Generates a fresh config TOML from Rust defaults.
    ///
    /// This is used by `xtask update-default-config` to keep
    /// `default_config.toml` in sync with Rust default values.
    pub fn generate() -> Result<String> {
        use toml_edit::DocumentMut;

        let generated_toml = toml::to_string(&Config::default())
            .context("Failed to serialize default config to TOML")?;

        let mut doc: DocumentMut = default_config_template()
            .parse()
            .context("Failed to parse default config template")?;
        let generated_doc: DocumentMut = generated_toml
            .parse()
            .context("Failed to parse generated config")?;

        merge_items(doc.as_table_mut(), generated_doc.as_table());

        Ok(doc.to_string())
    }

    /// Writes config content to a file, creating parent directories as needed.
    /// Uses atomic write (temp file + rename) to prevent corruption.
    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: Self::DEFAULT_BACKEND_URL.to_string(),
            anon_key: String::new(),
            request_timeout_secs: Self::DEFAULT_REQUEST_TIMEOUT_SECS,
            auth: AuthConfig::default(),
            storage: StorageConfig::default(),
            tables: TablesConfig::default(),
            push: PushConfig::default(),
            gate: GateConfig::default(),
            actions: ActionsConfig::default(),
        }
    }
}

/// An environment value wins over the configured one unless it is blank.
fn resolve_override(env_value: Option<String>, configured: &str) -> String {
    env_value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| configured.trim().to_string())
}
