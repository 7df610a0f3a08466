use std::env;

use anyhow::{Context, Result};

/// Configuration for the `PostgreSQL` connection and write batching.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// `PostgreSQL` connection string.
    pub pg_url: String,
    /// `PostgreSQL` connection pool max connections.
    pub pg_pool_size: u32,
    /// Max change sets to buffer before flushing to `PostgreSQL`.
    pub pg_batch_size: usize,
    /// Max time (ms) before flushing buffered change sets.
    pub flush_interval_ms: u64,
}

impl StorageConfig {
    pub const DEFAULT_POOL_SIZE: u32 = 5;
    pub const DEFAULT_BATCH_SIZE: usize = 50;
    pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 100;

    /// Create a configuration with explicit values.
    pub fn new(
        pg_url: String,
        pg_pool_size: u32,
        pg_batch_size: usize,
        flush_interval_ms: u64,
    ) -> Self {
        Self {
            pg_url,
            pg_pool_size,
            pg_batch_size,
            flush_interval_ms,
        }
    }

    /// Default pool and batching settings for the given database.
    pub fn with_url(pg_url: String) -> Self {
        Self::new(
            pg_url,
            Self::DEFAULT_POOL_SIZE,
            Self::DEFAULT_BATCH_SIZE,
            Self::DEFAULT_FLUSH_INTERVAL_MS,
        )
    }

    /// Load configuration from environment variables.
    /// Falls back to defaults for optional values.
    pub fn from_env() -> Result<Self> {
        let pg_url =
            env::var("DATABASE_URL").context("DATABASE_URL environment variable is required")?;

        let pg_pool_size = parse_env_or("PG_POOL_SIZE", Self::DEFAULT_POOL_SIZE)?;
        let pg_batch_size = parse_env_or("STORAGE_BATCH_SIZE", Self::DEFAULT_BATCH_SIZE)?;
        let flush_interval_ms =
            parse_env_or("STORAGE_FLUSH_INTERVAL_MS", Self::DEFAULT_FLUSH_INTERVAL_MS)?;

        Ok(Self {
            pg_url,
            pg_pool_size,
            pg_batch_size,
            flush_interval_ms,
        })
    }
}

/// Parse an environment variable or return a default.
fn parse_env_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(val) => parse_value(name, &val),
        Err(_) => Ok(default),
    }
}

fn parse_value<T: std::str::FromStr>(name: &str, val: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    val.trim()
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("{name} is not valid: {e}"))
}
