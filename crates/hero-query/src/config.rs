//! Connection configuration.

use crate::error::{Error, Result};

/// Primary environment variable naming the database URL.
pub const DATABASE_URL_VAR: &str = "HERO_QUERY_DATABASE_URL";

/// Fallback variable, the one sqlx tooling already uses.
pub const FALLBACK_DATABASE_URL_VAR: &str = "DATABASE_URL";

pub const DEFAULT_DATABASE_URL: &str = "sqlite::memory:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
        }
    }
}

impl DatabaseConfig {
    /// Read the URL from the environment, loading `.env` first if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve the URL through `lookup`, in priority order.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let url = lookup(DATABASE_URL_VAR)
            .or_else(|| lookup(FALLBACK_DATABASE_URL_VAR))
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let url = url.trim().to_string();
        if url.is_empty() {
            return Err(Error::Config(format!("{DATABASE_URL_VAR} is set but empty")));
        }

        Ok(Self { url })
    }

    pub fn is_sqlite(&self) -> bool {
        self.url.starts_with("sqlite:")
    }
}
