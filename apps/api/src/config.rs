use std::env;

use shelfguard_core::{AppError, AppResult};
use tracing_subscriber::EnvFilter;

/// Email delivery backend selected by `EMAIL_PROVIDER`.
#[derive(Debug, Clone)]
pub enum EmailProviderConfig {
    /// Logs emails to tracing output instead of sending them; the default.
    Console,
    /// Sends through a real SMTP relay.
    Smtp(SmtpRuntimeConfig),
}

/// SMTP settings read from the `SMTP_*` environment variables named in the
/// account-recovery email contract.
#[derive(Debug, Clone)]
pub struct SmtpRuntimeConfig {
    /// `SMTP_HOST`.
    pub host: String,
    /// `SMTP_PORT`.
    pub port: u16,
    /// `SMTP_USER`.
    pub username: String,
    /// `SMTP_PASS`.
    pub password: String,
    /// `SMTP_FROM`.
    pub from_address: String,
}

/// Runtime configuration for the gateway process.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host:port to bind the HTTP listener to.
    pub bind_address: String,
    /// Path to the encrypted database file.
    pub db_path: String,
    /// Path to the sibling keyfile.
    pub keyfile_path: String,
    /// Base URL used to build magic-link and registration verification URLs.
    pub base_url: String,
    /// Origin allowed to make credentialed cross-origin requests.
    pub cors_origin: String,
    /// Email delivery backend.
    pub email_provider: EmailProviderConfig,
    /// Whether the session cookie carries the `Secure` attribute. Always
    /// `true` outside of `dev_mode`.
    pub cookie_secure: bool,
    /// Development mode: `/register/start` returns the verification token
    /// inline instead of requiring out-of-band delivery.
    pub dev_mode: bool,
    /// Whether the authentication guards are enforced at all. When `false`,
    /// every `*_if_enabled` guard passes unconditionally, supporting a
    /// single-user deployment where this subsystem is bypassed entirely.
    pub auth_enabled: bool,
}

impl ApiConfig {
    /// Loads configuration from the environment, applying the same
    /// variable names and defaults as the reaper binary for the store
    /// location.
    pub fn load() -> AppResult<Self> {
        let bind_address = env::var("SHELFGUARD_BIND_ADDRESS").unwrap_or_else(|_| "127.0.0.1:8080".to_owned());
        let db_path = env::var("SHELFGUARD_DB_PATH").unwrap_or_else(|_| "./data/shelfguard.db".to_owned());
        let keyfile_path =
            env::var("SHELFGUARD_KEYFILE_PATH").unwrap_or_else(|_| "./data/shelfguard.key".to_owned());
        let base_url = env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:8080".to_owned());
        let cors_origin = env::var("SHELFGUARD_CORS_ORIGIN").unwrap_or_else(|_| "http://localhost:5173".to_owned());
        let dev_mode = parse_env_bool("SHELFGUARD_DEV_MODE", false)?;
        let cookie_secure = parse_env_bool("SHELFGUARD_COOKIE_SECURE", !dev_mode)?;
        let auth_enabled = parse_env_bool("SHELFGUARD_AUTH_ENABLED", true)?;

        let email_provider = match env::var("EMAIL_PROVIDER").unwrap_or_else(|_| "console".to_owned()).as_str() {
            "console" => EmailProviderConfig::Console,
            "smtp" => {
                let port = required_env("SMTP_PORT")?
                    .parse::<u16>()
                    .map_err(|error| AppError::Input(format!("invalid SMTP_PORT: {error}")))?;
                EmailProviderConfig::Smtp(SmtpRuntimeConfig {
                    host: required_env("SMTP_HOST")?,
                    port,
                    username: required_env("SMTP_USER")?,
                    password: required_env("SMTP_PASS")?,
                    from_address: required_env("SMTP_FROM")?,
                })
            }
            other => {
                return Err(AppError::Input(format!(
                    "EMAIL_PROVIDER must be either 'console' or 'smtp', got '{other}'"
                )));
            }
        };

        Ok(Self {
            bind_address,
            db_path,
            keyfile_path,
            base_url,
            cors_origin,
            email_provider,
            cookie_secure,
            dev_mode,
            auth_enabled,
        })
    }
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Input(format!("{name} is required")))
}

fn parse_env_bool(name: &str, default: bool) -> AppResult<bool> {
    match env::var(name) {
        Ok(value) => Ok(value.eq_ignore_ascii_case("true") || value == "1"),
        Err(_) => Ok(default),
    }
}

/// Configures a compact, `EnvFilter`-driven tracing subscriber.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
