//! Configuration for game-of-claude.
//!
//! Resolves the API and dashboard endpoints from built-in defaults, an
//! optional `~/.claude/game-of-claude.toml`, and environment variables,
//! in that order of precedence (environment wins).

use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Default backend that receives hook events.
pub const DEFAULT_API_BASE: &str = "https://api.gameofclaude.dev";

/// Default dashboard host.
pub const DEFAULT_DASHBOARD_BASE: &str = "https://gameofclaude.dev";

/// Overrides the API base URL.
pub const API_ENV: &str = "GAME_OF_CLAUDE_API";

/// Overrides the dashboard base URL.
pub const DASHBOARD_ENV: &str = "GAME_OF_CLAUDE_DASHBOARD";

/// Overrides the Claude configuration directory (`~/.claude`).
pub const CLAUDE_DIR_ENV: &str = "GAME_OF_CLAUDE_CLAUDE_DIR";

/// Optional fields read from the TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    api_base: Option<String>,
    dashboard_base: Option<String>,
}

/// Resolved endpoints used by every command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base URL of the profile/event service
    pub api_base: String,
    /// Base URL of the web dashboard
    pub dashboard_base: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            dashboard_base: DEFAULT_DASHBOARD_BASE.to_string(),
        }
    }
}

impl Config {
    /// Load configuration for the current user.
    ///
    /// - If the TOML file doesn't exist, defaults are used.
    /// - If it is invalid or unreadable, a warning is logged and defaults are used.
    /// - `GAME_OF_CLAUDE_API` / `GAME_OF_CLAUDE_DASHBOARD` override either source.
    pub fn load() -> Config {
        let mut config = match Self::claude_dir() {
            Some(dir) => Self::load_file(&dir.join("game-of-claude.toml")),
            None => {
                tracing::warn!("could not determine home directory, using default config");
                Config::default()
            }
        };
        config.overlay(
            std::env::var(API_ENV).ok(),
            std::env::var(DASHBOARD_ENV).ok(),
        );
        config
    }

    fn load_file(path: &Path) -> Config {
        if !path.exists() {
            return Config::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => Self::from_toml(&contents).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "invalid TOML, using default config");
                Config::default()
            }),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not read config, using default config");
                Config::default()
            }
        }
    }

    /// Parse configuration from a TOML string.
    ///
    /// Missing fields keep their default values.
    pub fn from_toml(toml_str: &str) -> Result<Config> {
        let file: FileConfig = toml::from_str(toml_str)?;
        let mut config = Config::default();
        config.overlay(file.api_base, file.dashboard_base);
        Ok(config)
    }

    fn overlay(&mut self, api_base: Option<String>, dashboard_base: Option<String>) {
        if let Some(api) = api_base.filter(|s| !s.trim().is_empty()) {
            self.api_base = trim_base(&api);
        }
        if let Some(dashboard) = dashboard_base.filter(|s| !s.trim().is_empty()) {
            self.dashboard_base = trim_base(&dashboard);
        }
    }

    /// Personal dashboard link for a device.
    pub fn dashboard_url(&self, device_id: &str) -> String {
        format!("{}/dashboard?id={}", self.dashboard_base, device_id)
    }

    /// Returns the Claude configuration directory: `~/.claude/`
    ///
    /// Respects `GAME_OF_CLAUDE_CLAUDE_DIR` for test isolation.
    pub fn claude_dir() -> Option<PathBuf> {
        if let Ok(dir) = std::env::var(CLAUDE_DIR_ENV) {
            return Some(PathBuf::from(dir));
        }
        dirs::home_dir().map(|home| home.join(".claude"))
    }
}

/// Local file locations, all inside the Claude configuration directory.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Identity record (`gamify.json`)
    pub identity: PathBuf,
    /// Claude Code settings document (`settings.json`)
    pub settings: PathBuf,
}

impl Paths {
    pub fn in_dir(claude_dir: &Path) -> Self {
        Self {
            identity: claude_dir.join("gamify.json"),
            settings: claude_dir.join("settings.json"),
        }
    }

    /// Paths under [`Config::claude_dir`].
    pub fn resolve() -> Result<Self> {
        let dir = Config::claude_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
        Ok(Self::in_dir(&dir))
    }
}

fn trim_base(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.dashboard_base, DEFAULT_DASHBOARD_BASE);
    }

    #[test]
    fn test_default_api_base_carries_ownership_marker() {
        assert!(DEFAULT_API_BASE.contains(crate::hooks::OWNERSHIP_MARKER));
    }

    #[test]
    fn test_config_from_toml() {
        let toml = r#"
            api_base = "http://localhost:8000/"
            dashboard_base = "http://localhost:3000"
        "#;
        let config = Config::from_toml(toml).unwrap();
        assert_eq!(config.api_base, "http://localhost:8000");
        assert_eq!(config.dashboard_base, "http://localhost:3000");
    }

    #[test]
    fn test_config_partial_toml_uses_defaults_for_missing() {
        let config = Config::from_toml(r#"api_base = "http://localhost:8000""#).unwrap();
        assert_eq!(config.api_base, "http://localhost:8000");
        assert_eq!(config.dashboard_base, DEFAULT_DASHBOARD_BASE);
    }

    #[test]
    fn test_config_empty_toml_uses_all_defaults() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn test_config_invalid_toml_is_error() {
        let result = Config::from_toml("invalid { toml [");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_file_missing_uses_defaults() {
        let config = Config::load_file(Path::new("/this/path/does/not/exist.toml"));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_file_invalid_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game-of-claude.toml");
        fs::write(&path, "api_base = [").unwrap();
        assert_eq!(Config::load_file(&path), Config::default());
    }

    #[test]
    fn test_env_overrides_win() {
        let mut config = Config::from_toml(r#"api_base = "http://from-file""#).unwrap();
        config.overlay(Some("http://from-env/".into()), Some("  ".into()));
        assert_eq!(config.api_base, "http://from-env");
        assert_eq!(config.dashboard_base, DEFAULT_DASHBOARD_BASE);
    }

    #[test]
    fn test_dashboard_url() {
        let config = Config::default();
        assert_eq!(
            config.dashboard_url("abc"),
            "https://gameofclaude.dev/dashboard?id=abc"
        );
    }

    #[test]
    fn test_paths_in_dir() {
        let paths = Paths::in_dir(Path::new("/tmp/claude"));
        assert_eq!(paths.identity, PathBuf::from("/tmp/claude/gamify.json"));
        assert_eq!(paths.settings, PathBuf::from("/tmp/claude/settings.json"));
    }
}
