use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use url::Url;

/// Minimum accepted length of `JWT_SECRET`, in bytes.
pub const MIN_SECRET_LEN: usize = 16;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub jwt_secret: String,
    pub frontend_url: Url,
    pub auth_rps: u32,
    pub mail_webhook_url: Option<String>,
    pub database_max_connections: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let jwt_secret = get_env("JWT_SECRET")?;
        check_secret(&jwt_secret)?;

        let frontend_raw = get_env("FRONTEND_URL")?;
        let frontend_url = Url::parse(&frontend_raw)
            .map_err(|e| Error::Config(format!("Invalid value for FRONTEND_URL: {}", e)))?;

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            jwt_secret,
            frontend_url,
            auth_rps: get_env_parse_or("AUTH_RPS", 20)?,
            mail_webhook_url: env::var("MAIL_WEBHOOK_URL").ok().filter(|v| !v.is_empty()),
            database_max_connections: get_env_parse_or("DATABASE_MAX_CONNECTIONS", 20)?,
        })
    }

    /// True when the service should run against the in-process store instead of Postgres.
    pub fn uses_memory_store(&self) -> bool {
        self.database_url.eq_ignore_ascii_case("memory")
    }
}

pub fn check_secret(secret: &str) -> Result<()> {
    if secret.trim().len() < MIN_SECRET_LEN {
        return Err(Error::Config(format!(
            "JWT_SECRET must be at least {} bytes",
            MIN_SECRET_LEN
        )));
    }
    Ok(())
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        _ => Ok(default),
    }
}
