use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Global Config stored in `OnceLock`
static CONFIG: OnceLock<Arc<Config>> = OnceLock::new();

/// Which submission store the server runs against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(StoreBackend::Postgres),
            "memory" | "in-memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown STORE_BACKEND '{other}' (expected postgres or memory)")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    pub store_backend: StoreBackend,
    pub host: String,
    pub port: u16,
    pub log_dir: PathBuf,
    pub storage_public_url: String,
    pub storage_bucket: String,
    pub request_timeout: Duration,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Unset falls back to `default`; set but malformed is an error.
fn parsed_or<T: FromStr>(key: &str, default: T) -> Result<T, String> {
    match env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| format!("{key} has an invalid value '{raw}'")),
    }
}

impl Config {
    /// Load environment variables and set defaults
    pub fn from_env() -> Result<Self, String> {
        dotenv().ok(); // Load .env only once

        let store_backend: StoreBackend = var_or("STORE_BACKEND", "postgres").parse()?;
        let database_url = env::var("DATABASE_URL").ok();
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err("DATABASE_URL must be set when STORE_BACKEND=postgres".into());
        }

        Ok(Self {
            database_url,
            db_max_connections: parsed_or("DB_MAX_CONNECTIONS", 10)?,
            jwt_secret: env::var("JWT_SECRET").map_err(|_| "JWT_SECRET must be set".to_string())?,
            store_backend,
            host: var_or("HOST", "127.0.0.1"),
            port: parsed_or("PORT", 3000)?,
            log_dir: PathBuf::from(var_or("LOG_DIR", "logs")),
            storage_public_url: var_or(
                "STORAGE_PUBLIC_URL",
                "http://localhost:54321/storage/v1/object/public",
            ),
            storage_bucket: var_or("STORAGE_BUCKET", "documents"),
            request_timeout: Duration::from_secs(parsed_or("REQUEST_TIMEOUT_SECS", 30)?),
        })
    }

    /// Initialize the global config
    pub fn init() -> Result<Arc<Config>, String> {
        let config = Arc::new(Self::from_env()?);
        CONFIG
            .set(config.clone())
            .map_err(|_| "Config already initialized".to_string())?;
        Ok(config)
    }

    /// Safe access to Config
    pub fn get() -> Arc<Config> {
        CONFIG.get().expect("Config not initialized").clone()
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
