use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Hosted completion endpoint used when no override is configured.
pub const DEFAULT_ENDPOINT: &str = "https://gpt-1-backend.vercel.app/query";

const CONFIG_FILE: &str = "config.toml";
const SESSION_FILE: &str = "session.json";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Completion endpoint URL
    pub endpoint: String,

    /// HTTP request timeout in seconds
    pub request_timeout_secs: u64,

    /// Context flag applied to freshly created sessions
    pub default_context_enabled: bool,

    /// Palaver home directory (resolved at load time, not user-editable)
    #[serde(skip)]
    pub home_dir: PathBuf,

    /// UI preferences
    pub ui: UiConfig,
}

/// UI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Show the suggested-prompt bar until the first submission
    pub show_suggestions: bool,
    /// Show message timestamps in the transcript
    pub show_timestamps: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            show_suggestions: true,
            show_timestamps: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"));

        Config {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout_secs: 60,
            default_context_enabled: false,
            home_dir: home.join(".palaver"),
            ui: UiConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from `~/.palaver/config.toml`, falling back to
    /// defaults when the file does not exist.
    pub fn load() -> Result<Self> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Self::load_from_dir(home.join(".palaver"))
    }

    /// Load configuration rooted at an explicit home directory.
    pub fn load_from_dir(home_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&home_dir).context("Failed to create palaver home directory")?;

        let config_path = home_dir.join(CONFIG_FILE);
        let mut config = if config_path.exists() {
            let content =
                fs::read_to_string(&config_path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")?
        } else {
            Config::default()
        };

        config.home_dir = home_dir;
        Ok(config)
    }

    /// Save configuration to `config.toml` under the home directory.
    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.home_dir).context("Failed to create palaver home directory")?;
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(self.home_dir.join(CONFIG_FILE), content)
            .context("Failed to write config file")?;
        Ok(())
    }

    /// Location of the persisted session identifier.
    pub fn session_path(&self) -> PathBuf {
        self.home_dir.join(SESSION_FILE)
    }

    #[cfg(test)]
    pub fn config_path(&self) -> PathBuf {
        self.home_dir.join(CONFIG_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_hosted_endpoint() {
        let config = Config::default();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.request_timeout_secs, 60);
        assert!(!config.default_context_enabled);
        assert!(config.ui.show_suggestions);
    }

    #[test]
    fn missing_file_loads_defaults_and_creates_home() {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().join(".palaver");

        let config = Config::load_from_dir(home.clone()).unwrap();
        assert!(home.exists());
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.home_dir, home);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::load_from_dir(dir.path().join(".palaver")).unwrap();
        config.endpoint = "http://localhost:9000/query".to_string();
        config.default_context_enabled = true;
        config.ui.show_suggestions = false;
        config.save().unwrap();
        assert!(config.config_path().exists());

        let reloaded = Config::load_from_dir(config.home_dir.clone()).unwrap();
        assert_eq!(reloaded.endpoint, "http://localhost:9000/query");
        assert!(reloaded.default_context_enabled);
        assert!(!reloaded.ui.show_suggestions);
    }

    #[test]
    fn partial_config_fills_remaining_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().join(".palaver");
        fs::create_dir_all(&home).unwrap();
        fs::write(home.join(CONFIG_FILE), "endpoint = \"http://local/query\"\n").unwrap();

        let config = Config::load_from_dir(home).unwrap();
        assert_eq!(config.endpoint, "http://local/query");
        assert_eq!(config.request_timeout_secs, 60);
        assert!(config.ui.show_timestamps);
    }
}
