//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};

use ct_core::{InvalidTunable, Tunables};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,

    /// GitHub token used for all remote history calls.
    pub github_token: Option<String>,

    /// Claude API key used for classification and prediction.
    pub api_key: Option<String>,

    /// Claude model name.
    pub model: String,

    /// GitHub REST API root.
    pub github_api_url: String,

    /// Sync and attribution thresholds.
    #[serde(default)]
    pub tunables: Tunables,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("github_token", &self.github_token.as_ref().map(|_| "[REDACTED]"))
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("github_api_url", &self.github_api_url)
            .field("tunables", &self.tunables)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("ct.db"),
            github_token: None,
            api_key: None,
            model: ct_llm::DEFAULT_MODEL.to_string(),
            github_api_url: ct_github::DEFAULT_API_URL.to_string(),
            tunables: Tunables::default(),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    ///
    /// Later sources win: defaults, the user config file, `config_path`,
    /// the conventional `GITHUB_TOKEN` and `ANTHROPIC_API_KEY` variables,
    /// then `CT_*` variables (`CT_TUNABLES__PAGE_SIZE` for nested keys).
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment
            .merge(Env::raw().only(&["GITHUB_TOKEN"]))
            .merge(
                Env::raw()
                    .only(&["ANTHROPIC_API_KEY"])
                    .map(|_| "api_key".into()),
            )
            .merge(Env::prefixed("CT_").split("__"));

        figment.extract()
    }

    /// Reject values that would break sync or attribution.
    pub fn validate(&self) -> Result<(), InvalidTunable> {
        self.tunables.validate()
    }

    /// The configured GitHub token, if non-blank.
    pub fn github_token(&self) -> Option<&str> {
        non_blank(self.github_token.as_deref())
    }

    /// The configured Claude API key, if non-blank.
    pub fn api_key(&self) -> Option<&str> {
        non_blank(self.api_key.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Returns the platform-specific config directory for ct.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("ct"))
}

/// Returns the platform-specific data directory for ct.
///
/// On Linux: `~/.local/share/ct`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("ct"))
}
