/*!
common/src/lib.rs

Shared configuration types for newsbot.

This file provides:
- Config data structures (deserialized from TOML, every field defaulted)
- An async loader for a default file merged with an optional override file
- Environment overrides for the deployment-style variables
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// Placeholder used when an API key environment variable is not set.
pub const PLACEHOLDER_API_KEY: &str = "YOUR_DEFAULT_KEY";

/// HTTP server section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address Rocket binds to
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 10000,
        }
    }
}

/// World News API section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsConfig {
    pub api_url: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    /// ISO 3166 country code used as `source-country`
    pub country: String,
    /// Number of articles requested per run
    pub count: u32,
    pub timeout_seconds: u64,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.worldnewsapi.com".to_string(),
            api_key_env: "WORLDNEWS_API_KEY".to_string(),
            country: "in".to_string(),
            count: 30,
            timeout_seconds: 30,
        }
    }
}

/// Generative model section (Gemini)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_url: String,
    pub api_key_env: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
    pub timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            model: "gemini-2.5-flash".to_string(),
            temperature: None,
            max_tokens: None,
            timeout_seconds: 120,
        }
    }
}

/// Blogger + OAuth section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BloggerConfig {
    pub api_url: String,
    /// Public URL of the destination blog
    pub blog_url: String,
    /// Google OAuth client secret JSON (as downloaded from the cloud console)
    pub client_secret_file: String,
    /// Local credential store written by `newsbot authorize`
    pub storage_file: String,
    /// Space separated OAuth scopes
    pub scopes: String,
    pub timeout_seconds: u64,
}

impl Default for BloggerConfig {
    fn default() -> Self {
        Self {
            api_url: "https://www.googleapis.com/blogger/v3".to_string(),
            blog_url: "https://chaibuzz.blogspot.com/".to_string(),
            client_secret_file: "client_secret.json".to_string(),
            storage_file: "credentials.storage".to_string(),
            scopes: "https://www.googleapis.com/auth/blogger".to_string(),
            timeout_seconds: 30,
        }
    }
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub news: NewsConfig,
    pub llm: LlmConfig,
    pub blogger: BloggerConfig,
}

impl Config {
    /// Load configuration from a TOML file asynchronously.
    ///
    /// Example:
    ///   let cfg = Config::from_file("config.toml").await?;
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = tokio::fs::read_to_string(path.as_ref())
            .await
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let cfg: Config = toml::from_str(&data).context("Failed to parse TOML configuration")?;
        Ok(cfg)
    }

    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence). Missing files
    /// are skipped, so with neither present the built-in defaults are returned.
    pub async fn load_with_defaults(default_path: Option<&Path>, override_path: Option<&Path>) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        for path in [default_path, override_path].into_iter().flatten() {
            if !path.exists() {
                continue;
            }
            let data = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let val: toml::Value = toml::from_str(&data)
                .with_context(|| format!("Failed to parse configuration: {}", path.display()))?;
            merge_toml(&mut config_value, val);
        }

        let cfg: Config = config_value.try_into().context("Failed to parse merged configuration")?;
        Ok(cfg)
    }

    /// Apply the process environment on top of the loaded file configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup (`CLIENT_SECRET_FILE`, `STORAGE_FILE`,
    /// `BLOG_URL`, `BLOGGER_SCOPES`, `PORT`).
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("CLIENT_SECRET_FILE") {
            self.blogger.client_secret_file = v;
        }
        if let Some(v) = lookup("STORAGE_FILE") {
            self.blogger.storage_file = v;
        }
        if let Some(v) = lookup("BLOG_URL") {
            self.blogger.blog_url = v;
        }
        if let Some(v) = lookup("BLOGGER_SCOPES") {
            self.blogger.scopes = v;
        }
        if let Some(v) = lookup("PORT") {
            match v.parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!(value = %v, "ignoring invalid PORT"),
            }
        }
    }
}

/// Read an API key from the named environment variable, falling back to the placeholder.
pub fn resolve_api_key(env_name: &str) -> String {
    resolve_api_key_from(env_name, |key| std::env::var(key).ok())
}

pub fn resolve_api_key_from<F>(env_name: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(env_name).filter(|v| !v.trim().is_empty()) {
        Some(key) => key,
        None => {
            warn!("API key env var '{}' not set, using placeholder", env_name);
            PLACEHOLDER_API_KEY.to_string()
        }
    }
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}
