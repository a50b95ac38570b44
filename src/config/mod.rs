//! Configuration and session storage

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::auth::{Session, SessionStore};

/// Environment variable that overrides the REST base URL.
pub const API_BASE_ENV: &str = "PORTAL_API_BASE_URL";

/// Used when neither the environment nor the config file name a base URL.
pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000/api/";

/// Rows per page when the config file does not say otherwise.
pub const DEFAULT_PER_PAGE: u32 = 10;

/// Application configuration
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Config {
    /// REST base URL (the WebSocket URL is derived from it)
    pub api_base_url: Option<String>,
    /// Rows per page for entity tables
    pub per_page: Option<u32>,
    /// Logged-in session
    pub session: Option<Session>,
}

impl Config {
    /// Get config directory path
    fn config_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "portal-cli", "portal-cli")
            .context("Could not determine config directory")?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }

    /// Get config file path
    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Directory for the TUI log file.
    pub fn data_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "portal-cli", "portal-cli")
            .context("Could not determine data directory")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    /// Load configuration from disk
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        Self::parse(&content)
    }

    fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir).context("Failed to create config directory")?;

        let path = Self::config_path()?;
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&path, content).context("Failed to write config file")?;

        // Config holds the bearer token
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&path, perms).context("Failed to set config permissions")?;
        }

        Ok(())
    }

    /// REST base URL: environment, then config file, then the built-in default.
    pub fn api_base_url(&self) -> String {
        let from_env = std::env::var(API_BASE_ENV).ok();
        resolve_base_url(from_env.as_deref(), self.api_base_url.as_deref())
    }

    pub fn per_page(&self) -> u32 {
        self.per_page.filter(|&n| n > 0).unwrap_or(DEFAULT_PER_PAGE)
    }
}

/// Pick the first non-empty base URL and make sure it ends with a slash so relative
/// endpoint paths join under it.
fn resolve_base_url(from_env: Option<&str>, from_file: Option<&str>) -> String {
    let base = from_env
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or_else(|| from_file.map(str::trim).filter(|s| !s.is_empty()))
        .unwrap_or(DEFAULT_API_BASE);

    if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{}/", base)
    }
}

/// Session store persisted in the config file.
#[derive(Default)]
pub struct FileSessionStore;

impl SessionStore for FileSessionStore {
    fn load(&self) -> Option<Session> {
        match Config::load() {
            Ok(config) => config.session,
            Err(e) => {
                tracing::warn!("Could not read session from config: {:#}", e);
                None
            }
        }
    }

    fn save(&self, session: &Session) -> Result<()> {
        let mut config = Config::load()?;
        config.session = Some(session.clone());
        config.save()
    }

    fn clear(&self) -> Result<()> {
        let mut config = Config::load()?;
        config.session = None;
        config.save()
    }
}
