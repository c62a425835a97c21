use crate::duration;
use crate::engine::EngineSettings;
use crate::error::{ActionError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// StorageConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// redb file, relative to the project root unless absolute.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(paths::DEFAULT_STORE_FILE)
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_url_prefix")]
    pub url_prefix: String,
}

fn default_port() -> u16 {
    5001
}

fn default_url_prefix() -> String {
    "/token".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            url_prefix: default_url_prefix(),
        }
    }
}

// ---------------------------------------------------------------------------
// ActionsConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionsConfig {
    /// ISO-8601 duration applied when a request does not set `release_after`.
    #[serde(default = "default_release_after")]
    pub default_release_after: String,
    /// Active records older than this are failed at startup.
    #[serde(default = "default_recovery_max_age")]
    pub recovery_max_age_secs: u64,
}

fn default_release_after() -> String {
    "P30D".to_string()
}

fn default_recovery_max_age() -> u64 {
    300
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            default_release_after: default_release_after(),
            recovery_max_age_secs: default_recovery_max_age(),
        }
    }
}

// ---------------------------------------------------------------------------
// IdentityConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Prefix for identity and group ids reported by introspection.
    #[serde(default = "default_issuer")]
    pub issuer: String,
}

fn default_issuer() -> String {
    "https://auth.globus.org".to_string()
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            issuer: default_issuer(),
        }
    }
}

// ---------------------------------------------------------------------------
// ProviderDescription
// ---------------------------------------------------------------------------

/// Self-description served at the root of the provider's URL prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderDescription {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub admin_contact: String,
    #[serde(default = "default_true")]
    pub synchronous: bool,
    #[serde(default)]
    pub globus_auth_scope: Option<String>,
    #[serde(default = "default_input_schema")]
    pub input_schema: serde_json::Value,
    #[serde(default)]
    pub log_supported: bool,
    #[serde(default = "default_visible_to")]
    pub visible_to: Vec<String>,
    #[serde(default = "default_runnable_by")]
    pub runnable_by: Vec<String>,
    #[serde(default)]
    pub administered_by: Vec<String>,
}

fn default_api_version() -> String {
    "1.0".to_string()
}

fn default_title() -> String {
    "Token Passthru Action Provider".to_string()
}

fn default_true() -> bool {
    true
}

fn default_input_schema() -> serde_json::Value {
    serde_json::json!({
        "$id": "token_passthru_input",
        "type": "object",
        "additionalProperties": true,
    })
}

fn default_visible_to() -> Vec<String> {
    vec!["public".to_string()]
}

fn default_runnable_by() -> Vec<String> {
    vec!["all_authenticated_users".to_string()]
}

impl Default for ProviderDescription {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            title: default_title(),
            subtitle: None,
            admin_contact: String::new(),
            synchronous: default_true(),
            globus_auth_scope: None,
            input_schema: default_input_schema(),
            log_supported: false,
            visible_to: default_visible_to(),
            runnable_by: default_runnable_by(),
            administered_by: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub actions: ActionsConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub provider: ProviderDescription,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            storage: StorageConfig::default(),
            server: ServerConfig::default(),
            actions: ActionsConfig::default(),
            identity: IdentityConfig::default(),
            provider: ProviderDescription::default(),
        }
    }
}

impl Config {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(ActionError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// `load`, falling back to defaults when no config file exists.
    pub fn load_or_default(root: &Path) -> Result<Self> {
        match Self::load(root) {
            Err(ActionError::NotInitialized) => Ok(Self::default()),
            other => other,
        }
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn store_path(&self, root: &Path) -> PathBuf {
        paths::resolve(root, &self.storage.path)
    }

    pub fn engine_settings(&self) -> Result<EngineSettings> {
        Ok(EngineSettings {
            default_release_after: duration::parse(&self.actions.default_release_after)?,
        })
    }

    pub fn recovery_max_age(&self) -> Duration {
        Duration::from_secs(self.actions.recovery_max_age_secs)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if let Err(e) = duration::parse(&self.actions.default_release_after) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!("actions.default_release_after: {e}"),
            });
        }

        let prefix = &self.server.url_prefix;
        if !prefix.is_empty() && (!prefix.starts_with('/') || prefix.ends_with('/')) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "server.url_prefix '{prefix}' must be empty or start with '/' and not end with '/'"
                ),
            });
        }

        if self.provider.title.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "provider.title is empty".to_string(),
            });
        }

        if self.provider.admin_contact.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "provider.admin_contact is not set".to_string(),
            });
        }

        if self.actions.recovery_max_age_secs == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "actions.recovery_max_age_secs is 0: every active action is failed at startup"
                    .to_string(),
            });
        }

        warnings
    }
}
