//! Configuration loading

use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::draft::SuggestionSource;

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// User id for the channel manager (the chat screen picks its own role)
    pub user_id: Option<String>,
    /// How long a typing signal lasts without being refreshed
    pub typing_timeout_ms: u64,
    /// Channels requested per page when listing everything
    pub page_limit: usize,
    /// Hard bound on pages fetched by one listing
    pub max_pages: usize,
    /// Messages loaded when a conversation opens
    pub history_count: usize,
    /// Where mention suggestions come from
    pub suggestion_source: SuggestionSource,
    /// Whether the simulated interlocutor answers in the chat screen
    pub peer_replies: bool,
    /// Log lines kept for the diagnostics pane
    pub log_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_id: None,
            typing_timeout_ms: 5000,
            page_limit: 2,
            max_pages: 100,
            history_count: 10,
            suggestion_source: SuggestionSource::Channel,
            peer_replies: true,
            log_capacity: 500,
        }
    }
}

impl Config {
    /// Default config file path
    pub fn default_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "chatdeck", "chatdeck")
            .context("Could not determine config directory")?;
        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    /// The file to read: `path` when given, else the default location.
    pub fn resolve_path(path: Option<&Path>) -> Result<PathBuf> {
        match path {
            Some(p) => Ok(p.to_path_buf()),
            None => Self::default_path(),
        }
    }

    /// Load configuration from `path`. A missing file yields the defaults.
    ///
    /// Runs before logging is set up; see [`Config::log_source`].
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Report where the configuration came from.
    pub fn log_source(path: &Path) {
        if path.exists() {
            tracing::debug!("Loaded config from {}", path.display());
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
        }
    }

    /// Parse and validate TOML content.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.page_limit == 0 {
            bail!("page_limit must be at least 1");
        }
        if self.max_pages == 0 {
            bail!("max_pages must be at least 1");
        }
        if self.typing_timeout_ms == 0 {
            bail!("typing_timeout_ms must be at least 1");
        }
        Ok(())
    }

    pub fn typing_timeout(&self) -> Duration {
        Duration::from_millis(self.typing_timeout_ms)
    }

    /// Render as TOML (for `chatdeck config`).
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::parse("page_limit = 5\nsuggestion_source = \"global\"\n").unwrap();
        assert_eq!(config.page_limit, 5);
        assert_eq!(config.suggestion_source, SuggestionSource::Global);
        assert_eq!(config.history_count, 10);
        assert_eq!(config.typing_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_round_trip() {
        let config = Config {
            user_id: Some("ops".into()),
            peer_replies: false,
            ..Config::default()
        };
        let text = config.to_toml().unwrap();
        assert_eq!(Config::parse(&text).unwrap(), config);
    }

    #[test]
    fn test_rejects_zero_bounds() {
        assert!(Config::parse("page_limit = 0").is_err());
        assert!(Config::parse("max_pages = 0").is_err());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("chatdeck-test-does-not-exist.toml");
        let config = Config::load(&path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_log_source_reports_missing_file() {
        use crate::tui::LogBuffer;
        use tracing_subscriber::layer::SubscriberExt;

        let path = std::env::temp_dir().join("chatdeck-test-also-missing.toml");
        assert_eq!(Config::resolve_path(Some(&path)).unwrap(), path);

        let buf = LogBuffer::new(10);
        let subscriber = tracing_subscriber::registry().with(
            tracing_subscriber::fmt::layer()
                .with_writer(buf.clone())
                .with_ansi(false)
                .with_target(false),
        );
        tracing::subscriber::with_default(subscriber, || Config::log_source(&path));

        let lines = buf.drain();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("No config at"));
        assert!(lines[0].contains("using defaults"));
    }
}
