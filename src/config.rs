use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;

/// Which key-value medium backs the user store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Memory,
    File,
    Postgres,
    /// No medium at all: reads are empty and writes are dropped.
    None,
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            "postgres" | "pg" => Ok(Self::Postgres),
            "none" | "off" => Ok(Self::None),
            other => anyhow::bail!("unknown USERS_DB_BACKEND {:?}", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: BackendKind,
    pub data_dir: PathBuf,
    pub database_url: Option<String>,
    pub serialize_writes: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub store: StoreConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup<F>(var: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = match var("USERS_DB_BACKEND") {
            Some(v) => v.parse::<BackendKind>()?,
            None => BackendKind::File,
        };
        let database_url = var("DATABASE_URL");
        if backend == BackendKind::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL is required when USERS_DB_BACKEND=postgres");
        }
        let store = StoreConfig {
            backend,
            data_dir: var("USERS_DB_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data")),
            database_url,
            serialize_writes: var("USERS_DB_SERIALIZE_WRITES")
                .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        };
        let port = match var("APP_PORT") {
            Some(p) => p.parse::<u16>().context("APP_PORT")?,
            None => 8080,
        };
        Ok(Self {
            host: var("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            store,
        })
    }
}
