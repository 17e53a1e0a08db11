// File: ./src/config.rs
// Handles configuration loading and defaults.
use crate::context::AppContext;
use anyhow::{Context, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;

/// Environment variable that overrides `api_url`.
pub const API_URL_ENV: &str = "APPSHELL_API_URL";
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}
fn default_fallback_language() -> String {
    "en".to_string()
}
fn default_credential_service() -> String {
    "appshell".to_string()
}
fn default_token_key() -> String {
    "access_token".to_string()
}
fn default_max_redirects() -> usize {
    20
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct AppConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_fallback_language")]
    pub fallback_language: String,
    /// Keyring service name the access token is stored under.
    #[serde(default = "default_credential_service")]
    pub credential_service: String,
    #[serde(default = "default_token_key")]
    pub token_key: String,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Sent on every request, after the built-in tunnel header.
    #[serde(default)]
    pub extra_headers: BTreeMap<String, String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            fallback_language: default_fallback_language(),
            credential_service: default_credential_service(),
            token_key: default_token_key(),
            max_redirects: default_max_redirects(),
            extra_headers: BTreeMap::new(),
        }
    }
}

impl AppConfig {
    /// Load the configuration file using an explicit context.
    /// Returns a contextualized error if reading or parsing fails.
    pub fn load(ctx: &dyn AppContext) -> Result<Self> {
        let path = ctx.get_config_file_path()?;

        if !path.exists() {
            return Err(anyhow::anyhow!("Config file not found"));
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;

        Self::parse(&contents).map_err(|e| {
            anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e)
        })
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Startup entry point: the config file if present (defaults otherwise),
    /// then the process environment on top. Read once; later changes to the
    /// environment are not observed.
    pub fn resolve(ctx: &dyn AppContext) -> Result<Self> {
        let config = match Self::load(ctx) {
            Ok(c) => c,
            Err(e) if Self::is_missing_config_error(&e) => {
                log::debug!("No config file, using defaults");
                Self::default()
            }
            Err(e) => return Err(e),
        };
        Ok(config.with_env_override(std::env::var(API_URL_ENV).ok()))
    }

    /// Applies the API URL taken from the environment. Blank values are ignored.
    pub fn with_env_override(mut self, api_url: Option<String>) -> Self {
        if let Some(url) = api_url.map(|u| u.trim().to_string())
            && !url.is_empty()
        {
            self.api_url = url;
        }
        self
    }

    /// Whether an error from [`AppConfig::load`] means the file does not exist.
    pub fn is_missing_config_error(err: &Error) -> bool {
        if err.to_string().contains("Config file not found") {
            return true;
        }

        // Walk the error chain for an underlying IO NotFound.
        for cause in err.chain() {
            if let Some(io_err) = cause.downcast_ref::<std::io::Error>()
                && io_err.kind() == std::io::ErrorKind::NotFound
            {
                return true;
            }
        }

        false
    }
}
