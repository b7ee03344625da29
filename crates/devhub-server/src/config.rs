use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, bail};
use tracing::info;

/// Secrets that ship in sample `.env` files and must never reach a server.
const PLACEHOLDER_SECRETS: &[&str] = &["", "dev-secret-change-me", "changeme", "secret"];

pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    /// Empty means any origin.
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt_secret = env::var("DEVHUB_JWT_SECRET").context("DEVHUB_JWT_SECRET must be set")?;
        if PLACEHOLDER_SECRETS.contains(&jwt_secret.trim()) {
            bail!("DEVHUB_JWT_SECRET is a placeholder; set a real shared secret");
        }

        let cors_origins = env::var("DEVHUB_CORS_ORIGINS")
            .map(|raw| parse_origins(&raw))
            .unwrap_or_default();

        Ok(Self {
            host: try_load("DEVHUB_HOST", "0.0.0.0")?,
            port: try_load("DEVHUB_PORT", "3000")?,
            db_path: try_load("DEVHUB_DB_PATH", "devhub.db")?,
            jwt_secret,
            cors_origins,
        })
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.parse()
        .map_err(|e| anyhow::anyhow!("Invalid {key} value {raw:?}: {e}"))
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origins_are_trimmed_and_blank_entries_dropped() {
        assert_eq!(
            parse_origins(" https://devhub.dev , ,http://localhost:5173"),
            vec!["https://devhub.dev", "http://localhost:5173"]
        );
        assert!(parse_origins("").is_empty());
    }

    #[test]
    fn bad_port_is_an_error() {
        // Only this test touches the variable.
        unsafe { env::set_var("DEVHUB_TEST_PORT", "not-a-port") };
        assert!(try_load::<u16>("DEVHUB_TEST_PORT", "3000").is_err());
        assert_eq!(try_load::<u16>("DEVHUB_TEST_UNSET_PORT", "3000").unwrap(), 3000);
    }
}
