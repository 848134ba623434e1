use std::env;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,

    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,

    /// Bearer token required by the admin surface. Verified server-side
    /// with a constant-time compare; there is no user/password store.
    pub admin_token: String,

    pub resend_api_key: Option<String>,
    pub resend_from_email: String,

    pub sendgrid_api_key: Option<String>,
    pub sendgrid_from_email: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            port: parse_or("PORT", 8080)?,
            database_url: require("DATABASE_URL")?,
            stripe_secret_key: require("STRIPE_SECRET_KEY")?,
            stripe_webhook_secret: require("STRIPE_WEBHOOK_SECRET")?,
            admin_token: require("ADMIN_TOKEN")?,
            resend_api_key: optional("RESEND_API_KEY"),
            resend_from_email: optional("RESEND_FROM_EMAIL")
                .unwrap_or_else(|| "Boat Party <noreply@boatparty.example>".to_string()),
            sendgrid_api_key: optional("SENDGRID_API_KEY"),
            sendgrid_from_email: optional("SENDGRID_FROM_EMAIL"),
        })
    }
}

/// Strip surrounding quotes and whitespace. Deployment tooling sometimes
/// writes env values quoted, which would otherwise leak into API keys.
pub fn normalize_env_value(raw: String) -> String {
    let trimmed = raw.trim();

    if let Some(inner) = trimmed.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        return inner.trim().to_string();
    }
    if let Some(inner) = trimmed.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        return inner.trim().to_string();
    }

    trimmed.to_string()
}

fn optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(normalize_env_value)
        .filter(|s| !s.is_empty())
}

fn require(key: &'static str) -> Result<String, ConfigError> {
    optional(key).ok_or(ConfigError::Missing(key))
}

fn parse_or<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(key) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}
