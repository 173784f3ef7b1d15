//! Server configuration loaded from environment variables.
//!
//! Every setting has a default so the server starts with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Socket address for the HTTP API.
    /// Env: `HTTP_ADDR`, default `127.0.0.1:3000`
    pub http_addr: SocketAddr,

    /// JSON database file.
    /// Env: `DB_PATH`, default `data/db.json`
    pub db_path: PathBuf,

    /// Directory with the browser front end, served at `/` when present.
    /// Env: `STATIC_DIR`, default `static`
    pub static_dir: PathBuf,

    /// Seed a demo user and demo tasks when the database file is missing.
    /// Development only; a warning is logged whenever it takes effect.
    /// Env: `SEED_DEMO_DATA` (true/false), default `false`
    pub seed_demo_data: bool,

    /// Lifetime of a bearer token.
    /// Env: `SESSION_TTL_HOURS`, default `168` (7 days)
    pub session_ttl_hours: i64,

    /// Allow cross-origin requests from any origin.
    /// Env: `CORS_ALLOW_ANY` (true/false), default `true`
    pub cors_allow_any: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http_addr: ([127, 0, 0, 1], 3000).into(),
            db_path: PathBuf::from("data/db.json"),
            static_dir: PathBuf::from("static"),
            seed_demo_data: false,
            session_ttl_hours: 24 * 7,
            cors_allow_any: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            match addr.parse::<SocketAddr>() {
                Ok(parsed) => config.http_addr = parsed,
                Err(_) => tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default"),
            }
        }

        if let Some(path) = lookup("DB_PATH") {
            config.db_path = PathBuf::from(path);
        }

        if let Some(dir) = lookup("STATIC_DIR") {
            config.static_dir = PathBuf::from(dir);
        }

        if let Some(val) = lookup("SEED_DEMO_DATA") {
            config.seed_demo_data = parse_flag(&val);
        }

        if let Some(val) = lookup("SESSION_TTL_HOURS") {
            match val.parse::<i64>() {
                Ok(hours) if hours > 0 => config.session_ttl_hours = hours,
                _ => tracing::warn!(value = %val, "Invalid SESSION_TTL_HOURS, using default"),
            }
        }

        if let Some(val) = lookup("CORS_ALLOW_ANY") {
            config.cors_allow_any = parse_flag(&val);
        }

        config
    }
}

fn parse_flag(val: &str) -> bool {
    val != "false" && val != "0" && !val.is_empty()
}
