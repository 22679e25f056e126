use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    /// Volatile in-process store; useful for demos and local smoke tests.
    Memory,
}

/// Server configuration loaded from environment variables.
///
/// | Env Var              | Default    |
/// |----------------------|------------|
/// | `HOST`               | `0.0.0.0`  |
/// | `PORT`               | `8081`     |
/// | `DATABASE_URL`       | required for the postgres store |
/// | `DB_MAX_CONNECTIONS` | `5`        |
/// | `MAX_BODY_BYTES`     | `1048576`  |
/// | `CORS_ORIGINS`       | any origin |
/// | `COURSEWORK_STORE`   | `postgres` |
/// | `COURSEWORK_SEED`    | unset; JSON catalog for the memory store |
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub max_body_bytes: usize,
    pub cors_origins: Vec<String>,
    pub store: StoreKind,
    pub seed_file: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let store = match env::var("COURSEWORK_STORE").as_deref() {
            Err(_) | Ok("postgres") => StoreKind::Postgres,
            Ok("memory") => StoreKind::Memory,
            Ok(other) => bail!("COURSEWORK_STORE must be 'postgres' or 'memory', got '{other}'"),
        };

        let database_url = env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());
        if store == StoreKind::Postgres && database_url.is_none() {
            bail!("DATABASE_URL not set");
        }

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: parse_var("PORT", 8081)?,
            database_url,
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", 5)?,
            max_body_bytes: parse_var("MAX_BODY_BYTES", 1024 * 1024)?,
            cors_origins,
            store,
            seed_file: env::var_os("COURSEWORK_SEED").map(PathBuf::from),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}
