//! Configuration Management
//!
//! This module loads the process-wide configuration once at startup.
//!
//! # Configuration Locations
//! - Explicit: `--config <path>`
//! - Global: `~/.config/querygate/config.json` (per-user)
//! - Built-in defaults when neither file exists
//!
//! # Resolution Precedence
//! 1. Environment variables (highest priority, `.env` is loaded first)
//! 2. Config file
//! 3. Built-in defaults
//!
//! # Environment Variables
//! `QUERYGATE_BIND`, `QUERYGATE_CORS_PERMISSIVE`, `DB_HOST`, `DB_PORT`, `DB_USER`,
//! `DB_PASSWORD`, `DB_POOL_SIZE`, `GEMINI_API_KEY`, `GEMINI_MODEL`, `GEMINI_ENDPOINT`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::error::{QueryGateError, Result};

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,

    /// Identity used for the eager startup pool and for blank request fields
    #[serde(default)]
    pub defaults: DefaultIdentity,

    #[serde(default)]
    pub pool: PoolSettings,

    #[serde(default)]
    pub generator: GeneratorSettings,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Address to bind to (default: 127.0.0.1:5000)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    /// Allow any origin (default: true). When false only localhost origins are allowed.
    #[serde(default = "default_true")]
    pub cors_permissive: bool,

    /// Establish the default pool before accepting requests
    #[serde(default = "default_true")]
    pub eager_connect: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            cors_permissive: true,
            eager_connect: true,
        }
    }
}

/// Fallback connection identity
///
/// Host, user and password are fixed; the database is always unset.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultIdentity {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_user")]
    pub user: String,

    /// WARNING: Sensitive data, do not log or include in error messages
    #[serde(default)]
    pub password: String,

    /// Environment variable name for password (if not storing password directly)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,
}

impl Default for DefaultIdentity {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            user: default_user(),
            password: String::new(),
            password_env: None,
        }
    }
}

impl fmt::Debug for DefaultIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultIdentity")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("password_env", &self.password_env)
            .finish()
    }
}

/// Settings applied to every pool the registry creates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSettings {
    /// Maximum concurrent connections per pool (default: 10)
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Statements run once on a freshly established pool. Failures are logged, not fatal.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bootstrap_statements: Vec<String>,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            bootstrap_statements: Vec::new(),
        }
    }
}

/// Text generation provider settings
#[derive(Clone, Serialize, Deserialize)]
pub struct GeneratorSettings {
    /// API key; usually supplied through `GEMINI_API_KEY`
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            endpoint: default_endpoint(),
        }
    }
}

impl fmt::Debug for GeneratorSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 5000))
}

const fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "localhost".to_string()
}

const fn default_port() -> u16 {
    3306
}

fn default_user() -> String {
    "root".to_string()
}

const fn default_max_connections() -> usize {
    10
}

fn default_model() -> String {
    "gemini-1.5-pro".to_string()
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

/// Get path to global config file (`~/.config/querygate/config.json`)
pub fn global_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| QueryGateError::config("Could not determine user config directory"))?;

    Ok(config_dir.join("querygate").join("config.json"))
}

/// Load configuration from a JSON file
pub fn load_file(path: &Path) -> Result<AppConfig> {
    let contents = fs::read_to_string(path).map_err(|e| {
        QueryGateError::config(format!("Could not read config file {}: {e}", path.display()))
    })?;

    serde_json::from_str(&contents)
        .map_err(|e| QueryGateError::config(format!("Invalid config file format: {e}")))
}

/// Load the full configuration with precedence and validate it
///
/// An explicit path must exist. Without one, the global file is used if present.
pub fn load(explicit: Option<&Path>) -> Result<AppConfig> {
    // A missing .env is normal
    let _ = dotenvy::dotenv();

    let mut config = match explicit {
        Some(path) => load_file(path)?,
        None => {
            let global = global_config_path()?;
            if global.exists() {
                load_file(&global)?
            } else {
                AppConfig::default()
            }
        }
    };

    config.apply_overrides(|key| std::env::var(key).ok())?;
    config.resolve_secrets(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

impl AppConfig {
    /// Apply environment-style overrides from a lookup function
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("QUERYGATE_BIND") {
            self.server.bind_addr = bind.parse().map_err(|e| {
                QueryGateError::config(format!("Invalid QUERYGATE_BIND '{bind}': {e}"))
            })?;
        }
        if let Some(flag) = lookup("QUERYGATE_CORS_PERMISSIVE") {
            self.server.cors_permissive = parse_bool("QUERYGATE_CORS_PERMISSIVE", &flag)?;
        }
        if let Some(host) = lookup("DB_HOST") {
            self.defaults.host = host;
        }
        if let Some(port) = lookup("DB_PORT") {
            self.defaults.port = port
                .parse()
                .map_err(|e| QueryGateError::config(format!("Invalid DB_PORT '{port}': {e}")))?;
        }
        if let Some(user) = lookup("DB_USER") {
            self.defaults.user = user;
        }
        if let Some(password) = lookup("DB_PASSWORD") {
            self.defaults.password = password;
        }
        if let Some(size) = lookup("DB_POOL_SIZE") {
            self.pool.max_connections = size.parse().map_err(|e| {
                QueryGateError::config(format!("Invalid DB_POOL_SIZE '{size}': {e}"))
            })?;
        }
        if let Some(key) = lookup("GEMINI_API_KEY") {
            self.generator.api_key = Some(key);
        }
        if let Some(model) = lookup("GEMINI_MODEL") {
            self.generator.model = model;
        }
        if let Some(endpoint) = lookup("GEMINI_ENDPOINT") {
            self.generator.endpoint = endpoint;
        }
        Ok(())
    }

    /// Resolve `password_env` indirection into the default password
    pub fn resolve_secrets<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(env_var) = &self.defaults.password_env {
            match lookup(env_var) {
                Some(password) => self.defaults.password = password,
                None => {
                    return Err(QueryGateError::config(format!(
                        "Environment variable {env_var} not found for password"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Reject configurations that would produce blank identities or empty pools
    pub fn validate(&self) -> Result<()> {
        if self.defaults.host.trim().is_empty() {
            return Err(QueryGateError::config("Default host must not be blank"));
        }
        if self.defaults.user.trim().is_empty() {
            return Err(QueryGateError::config("Default user must not be blank"));
        }
        if self.defaults.port == 0 {
            return Err(QueryGateError::config("Default port must not be 0"));
        }
        if self.pool.max_connections == 0 {
            return Err(QueryGateError::config("Pool size must be at least 1"));
        }
        if self.generator.model.trim().is_empty() {
            return Err(QueryGateError::config("Generator model must not be blank"));
        }
        Ok(())
    }

    /// JSON view with secrets removed, for `querygate config`
    #[must_use]
    pub fn redacted_json(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        if let Some(defaults) = value.get_mut("defaults").and_then(|d| d.as_object_mut()) {
            defaults.insert("password".to_string(), serde_json::json!("<redacted>"));
        }
        if let Some(generator) = value.get_mut("generator").and_then(|g| g.as_object_mut()) {
            generator.insert(
                "api_key_set".to_string(),
                serde_json::json!(self.generator.api_key.is_some()),
            );
        }
        value
    }
}

fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(QueryGateError::config(format!("Invalid {name} '{raw}': expected a boolean"))),
    }
}
