use anyhow::{Context, Result, anyhow, bail};
use dialoguer::{Confirm, Input};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::executor::DEFAULT_COMMAND_TIMEOUT;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(240);
const DEFAULT_HISTORY_FILE: &str = "history.log";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Basic credentials in `user:password` form
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_https: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,
}

/// Username and optional password for HTTP Basic authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
}

impl Credentials {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let (username, password) = match raw.split_once(':') {
            Some((user, pass)) => (user, Some(pass.to_string())),
            None => (raw, None),
        };
        Some(Self {
            username: username.to_string(),
            password,
        })
    }
}

/// Where AI requests go and how they authenticate.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub url: Url,
    pub credentials: Option<Credentials>,
}

impl Config {
    /// Get the path to the config file (~/.shellmate/config.toml)
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".shellmate").join("config.toml"))
    }

    /// Load config from file, or return default if file doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Applies `AI_*` style variables from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Overrides file values with whatever `lookup` yields for the known keys.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(host) = lookup("AI_HOST") {
            self.host = Some(host);
        }
        if let Some(port) = lookup("AI_PORT") {
            let port = port
                .trim()
                .parse::<u16>()
                .with_context(|| format!("AI_PORT is not a valid port: {port}"))?;
            self.port = Some(port);
        }
        if let Some(path) = lookup("AI_PATH") {
            self.path = Some(path);
        }
        if let Some(auth) = lookup("AI_AUTH") {
            self.auth = Some(auth);
        }
        if let Some(flag) = lookup("USE_HTTPS") {
            self.use_https = Some(parse_flag(&flag));
        }
        if let Some(session_id) = lookup("AI_SESSION_ID") {
            self.session_id = Some(session_id);
        }
        if let Some(flag) = lookup("DEBUG_MODE") {
            self.debug = Some(parse_flag(&flag));
        }
        if let Some(history) = lookup("SHELLMATE_HISTORY_FILE") {
            self.history_file = Some(PathBuf::from(history));
        }

        Ok(())
    }

    pub fn endpoint(&self) -> Result<Endpoint> {
        let host = self
            .host
            .as_deref()
            .map(str::trim)
            .filter(|host| !host.is_empty())
            .ok_or_else(|| anyhow!("AI host is not configured. Set AI_HOST or run 'shellmate config --init'"))?;

        let scheme = if self.use_https.unwrap_or(false) {
            "https"
        } else {
            "http"
        };

        let mut url = Url::parse(&format!("{scheme}://{host}"))
            .with_context(|| format!("Invalid AI host: {host}"))?;
        if let Some(port) = self.port {
            if url.set_port(Some(port)).is_err() {
                bail!("Cannot set a port on AI host {host}");
            }
        }

        let path = self.path.as_deref().unwrap_or("/");
        let (path, query) = match path.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (path, None),
        };
        url.set_path(path);
        url.set_query(query);

        Ok(Endpoint {
            url,
            credentials: self.auth.as_deref().and_then(Credentials::parse),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn command_timeout(&self) -> Duration {
        self.command_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_COMMAND_TIMEOUT)
    }

    pub fn history_path(&self) -> PathBuf {
        self.history_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_HISTORY_FILE))
    }

    pub fn debug_enabled(&self) -> bool {
        self.debug.unwrap_or(false)
    }

    /// Interactive setup of the endpoint settings
    pub fn interactive_setup() -> Result<Self> {
        println!("\n🔧 Let's point shellmate at your AI service.\n");

        let mut config = Self::load().unwrap_or_default();

        let host: String = Input::new()
            .with_prompt("AI host")
            .with_initial_text(config.host.clone().unwrap_or_default())
            .interact_text()?;
        config.host = Some(host.trim().to_string());

        let port: String = Input::new()
            .with_prompt("Port (leave empty for the scheme default)")
            .with_initial_text(config.initial_port())
            .allow_empty(true)
            .interact_text()?;
        config.port = if port.trim().is_empty() {
            None
        } else {
            Some(port.trim().parse().context("Port must be a number between 0 and 65535")?)
        };

        let path: String = Input::new()
            .with_prompt("Request path")
            .with_initial_text(config.initial_path())
            .interact_text()?;
        config.path = Some(path.trim().to_string());

        let auth: String = Input::new()
            .with_prompt("Basic auth as user:password (or press Enter to skip)")
            .allow_empty(true)
            .interact_text()?;
        config.auth = Some(auth.trim().to_string()).filter(|auth| !auth.is_empty());

        let use_https = Confirm::new()
            .with_prompt("Use HTTPS?")
            .default(config.use_https.unwrap_or(false))
            .interact()?;
        config.use_https = Some(use_https);

        config.endpoint()?;
        config.save()?;
        println!("\n✅ Configuration saved to {}\n", Self::config_path()?.display());

        Ok(config)
    }

    fn initial_port(&self) -> String {
        self.port.map(|port| port.to_string()).unwrap_or_default()
    }

    fn initial_path(&self) -> String {
        self.path.clone().unwrap_or_else(|| "/".to_string())
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1")
}
