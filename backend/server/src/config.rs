use std::{env, fmt::Display, fs::read_to_string, str::FromStr, time::Duration};

use tracing::{info, warn};

pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub busy_timeout: Duration,
}

impl Config {
    pub fn load() -> Self {
        Self {
            port: try_load("RUST_PORT", "1111"),
            database_path: try_load("DATABASE_PATH", "meals.db"),
            jwt_secret: read_secret("JWT_SECRET"),
            token_ttl: Duration::from_secs(try_load("TOKEN_TTL_SECS", "86400")),
            busy_timeout: Duration::from_millis(try_load("DB_BUSY_TIMEOUT_MS", "5000")),
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}

/// Docker secret first, then a plain env var of the same name for local runs.
fn read_secret(secret_name: &str) -> String {
    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            warn!("Failed to read {secret_name} from file: {e}");
        })
        .or_else(|_| var(secret_name))
        .expect("Secrets misconfigured!")
}
