use log::warn;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub max_connections: u32,
    pub leaderboard_limit: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:dance_award.db".to_string(),
            bind_addr: "127.0.0.1:3000".to_string(),
            max_connections: 5,
            leaderboard_limit: 10,
        }
    }
}

fn parsed_var<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid value for {}: {:?}", key, raw);
            default
        }),
        Err(_) => default,
    }
}

impl AppConfig {
    /// Read settings from the environment (after `.env` has been loaded),
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            bind_addr: env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            max_connections: parsed_var("DATABASE_MAX_CONNECTIONS", defaults.max_connections),
            leaderboard_limit: parsed_var("LEADERBOARD_LIMIT", defaults.leaderboard_limit),
        }
    }
}
