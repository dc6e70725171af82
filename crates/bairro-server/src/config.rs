use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::TimeDelta;

use bairro_api::Policy;

const MAX_SESSION_TTL_DAYS: i64 = 36_500;
const MAX_RATE_LIMIT_MINUTES: i64 = 525_600;

/// Server settings, read from `BAIRRO_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub body_limit_bytes: usize,
    pub policy: Policy,
    pub extra_banned_words: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let port: u16 = var("BAIRRO_PORT", "3000")
            .parse()
            .context("BAIRRO_PORT must be a port number")?;
        let ttl_days: i64 = var("BAIRRO_SESSION_TTL_DAYS", "30")
            .parse()
            .context("BAIRRO_SESSION_TTL_DAYS must be an integer")?;
        let rate_minutes: i64 = var("BAIRRO_RATE_LIMIT_MINUTES", "10")
            .parse()
            .context("BAIRRO_RATE_LIMIT_MINUTES must be an integer")?;
        let rate_max: i64 = var("BAIRRO_RATE_LIMIT_MAX", "1")
            .parse()
            .context("BAIRRO_RATE_LIMIT_MAX must be an integer")?;
        let cookie_secure = matches!(
            var("BAIRRO_COOKIE_SECURE", "false").to_ascii_lowercase().as_str(),
            "1" | "true" | "yes"
        );
        let body_limit_mb: usize = var("BAIRRO_BODY_LIMIT_MB", "16")
            .parse()
            .context("BAIRRO_BODY_LIMIT_MB must be an integer")?;

        if !(1..=MAX_SESSION_TTL_DAYS).contains(&ttl_days) {
            bail!("BAIRRO_SESSION_TTL_DAYS must be between 1 and {MAX_SESSION_TTL_DAYS}");
        }
        if !(1..=MAX_RATE_LIMIT_MINUTES).contains(&rate_minutes) {
            bail!("BAIRRO_RATE_LIMIT_MINUTES must be between 1 and {MAX_RATE_LIMIT_MINUTES}");
        }
        if rate_max < 1 {
            bail!("BAIRRO_RATE_LIMIT_MAX must be at least 1");
        }
        let body_limit_bytes = body_limit_mb
            .checked_mul(1024 * 1024)
            .filter(|b| *b > 0)
            .context("BAIRRO_BODY_LIMIT_MB is out of range")?;

        let session_ttl =
            TimeDelta::try_days(ttl_days).context("BAIRRO_SESSION_TTL_DAYS is out of range")?;
        let rate_limit_window = TimeDelta::try_minutes(rate_minutes)
            .context("BAIRRO_RATE_LIMIT_MINUTES is out of range")?;

        let extra_banned_words = var("BAIRRO_EXTRA_BANNED_WORDS", "")
            .split(',')
            .map(|w| w.trim().to_string())
            .filter(|w| !w.is_empty())
            .collect();

        Ok(Self {
            host: var("BAIRRO_HOST", "0.0.0.0"),
            port,
            db_path: PathBuf::from(var("BAIRRO_DB_PATH", "bairro.db")),
            body_limit_bytes,
            policy: Policy {
                session_ttl,
                rate_limit_window,
                rate_limit_max: rate_max,
                cookie_secure,
            },
            extra_banned_words,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}
