use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub security: SecurityConfig,

    pub mail: MailConfig,

    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// "pretty" (default) or "json"
    pub log_format: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/flasky.db".to_string(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,

    /// External address used to build links in outgoing mail.
    pub base_url: String,

    pub cors_allowed_origins: Vec<String>,

    /// Whether to set the Secure flag on session cookies.
    /// Default: true for production safety. Set to false for local development without HTTPS.
    pub secure_cookies: bool,

    /// Sessions expire after this many minutes without a request.
    pub session_inactivity_minutes: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            base_url: "http://localhost:5000".to_string(),
            cors_allowed_origins: vec![
                "http://localhost:5000".to_string(),
                "http://127.0.0.1:5000".to_string(),
            ],
            secure_cookies: true,
            session_inactivity_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// HMAC secret used to sign confirmation and API tokens.
    pub secret_key: String,

    /// Set when `secret_key` was generated at startup instead of configured.
    #[serde(skip)]
    pub secret_key_generated: bool,

    /// Argon2 memory cost in KiB (default: 8192 = 8MB)
    pub argon2_memory_cost_kib: u32,

    /// Argon2 time cost (iterations)
    pub argon2_time_cost: u32,

    /// Argon2 parallelism (default: 1)
    pub argon2_parallelism: u32,

    /// Lifetime of account confirmation tokens.
    pub confirmation_token_ttl_seconds: u64,

    /// Lifetime of API auth tokens handed out by `GET /api/v1/token`.
    pub auth_token_ttl_seconds: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            secret_key: generate_secret_key(),
            secret_key_generated: true,
            argon2_memory_cost_kib: 8192,
            argon2_time_cost: 3,
            argon2_parallelism: 1,
            confirmation_token_ttl_seconds: 24 * 60 * 60,
            auth_token_ttl_seconds: 60 * 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub subject_prefix: String,

    pub sender: String,

    /// Messages waiting for a worker beyond this are dropped.
    pub queue_capacity: usize,

    pub workers: usize,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            subject_prefix: "[Flasky] ".to_string(),
            sender: "Flasky Admin <flasky@example.com>".to_string(),
            queue_capacity: 100,
            workers: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Accounts registered with this email get the Administrator role.
    pub admin_email: Option<String>,

    pub posts_per_page: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            admin_email: None,
            posts_per_page: 10,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            security: SecurityConfig::default(),
            mail: MailConfig::default(),
            app: AppConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        let mut config = None;
        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                config = Some(Self::load_from_path(path)?);
                break;
            }
        }

        let mut config = config.unwrap_or_else(|| {
            info!("No config file found, using defaults");
            Self::default()
        });
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(content)?;
        let has_secret = table
            .get("security")
            .and_then(|security| security.get("secret_key"))
            .is_some();

        let mut config: Self = toml::Value::Table(table).try_into()?;
        config.security.secret_key_generated = !has_secret;
        Ok(config)
    }

    /// Startup warnings that can only be logged once tracing is up.
    pub fn warn_on_ephemeral_settings(&self) {
        if self.security.secret_key_generated {
            warn!(
                "security.secret_key is not configured; using a generated key, so issued tokens and confirmation links will not survive a restart"
            );
        }
    }

    /// Environment variables win over the config file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(secret) = std::env::var("FLASKY_SECRET_KEY")
            && !secret.is_empty()
        {
            self.security.secret_key = secret;
            self.security.secret_key_generated = false;
        }

        if let Ok(email) = std::env::var("FLASKY_ADMIN_EMAIL")
            && !email.is_empty()
        {
            self.app.admin_email = Some(email);
        }

        if let Ok(url) = std::env::var("FLASKY_DATABASE_URL")
            && !url.is_empty()
        {
            self.general.database_path = url;
        }
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("flasky").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".flasky").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.security.secret_key.trim().is_empty() {
            anyhow::bail!("security.secret_key cannot be empty");
        }

        if self.security.confirmation_token_ttl_seconds == 0
            || self.security.auth_token_ttl_seconds == 0
        {
            anyhow::bail!("Token lifetimes must be greater than zero");
        }

        if self.mail.workers == 0 || self.mail.queue_capacity == 0 {
            anyhow::bail!("mail.workers and mail.queue_capacity must be greater than zero");
        }

        if self.server.session_inactivity_minutes <= 0 {
            anyhow::bail!("server.session_inactivity_minutes must be greater than zero");
        }

        Ok(())
    }

    /// Case-insensitive match against the configured admin email.
    #[must_use]
    pub fn is_admin_email(&self, email: &str) -> bool {
        self.app
            .admin_email
            .as_deref()
            .is_some_and(|admin| admin.eq_ignore_ascii_case(email))
    }
}

/// Random 64 character hex string.
#[must_use]
pub fn generate_secret_key() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();

    bytes.iter().fold(String::with_capacity(64), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}
