use std::time::Duration;

use crate::error::{AppError, Result};

pub const BIND_ADDR: &str = "127.0.0.1:8081";

/// Server-side execution cap for trade-log queries (seconds).
pub const TRADE_QUERY_TIMEOUT_SECS: u64 = 10;

/// Server-side execution cap for item metadata lookups (seconds).
pub const ITEM_QUERY_TIMEOUT_SECS: u64 = 1;

/// Extra time granted to the client-side timeout on top of the server-side cap,
/// so MariaDB gets the chance to abort the statement first.
pub const CLIENT_TIMEOUT_SLACK_MS: u64 = 500;

pub const DB_MAX_CONNECTIONS: u32 = 10;

pub const NOT_FOUND_IMAGE_PATH: &str = "/assets/img/404_notfound.jpg";

pub const PLOTLY_JS_URL: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

/// PNG snapshot size in pixels.
pub const CHART_IMAGE_SIZE: (u32, u32) = (1280, 720);

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub log_level: String,
    pub bind_addr: String,
    pub db_max_connections: u32,
    /// MariaDB max_statement_time for trade queries (TRADE_QUERY_TIMEOUT_SECS)
    pub trade_query_timeout_secs: u64,
    /// MariaDB max_statement_time for metadata lookups (ITEM_QUERY_TIMEOUT_SECS)
    pub item_query_timeout_secs: u64,
    /// Scheme + host used for absolute URLs (PUBLIC_BASE_URL).
    /// Falls back to https://{Host header} when unset.
    pub public_base_url: Option<String>,
    pub not_found_image_path: String,
    /// Client-side chart library scripts (CHART_JS_FILES, comma-separated)
    pub chart_js_files: Vec<String>,
    /// Client-side chart library styles (CHART_CSS_FILES, comma-separated)
    pub chart_css_files: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| AppError::Config("DATABASE_URL must be set".to_string()))?,
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| BIND_ADDR.to_string()),
            db_max_connections: parse_env("DB_MAX_CONNECTIONS", DB_MAX_CONNECTIONS)?,
            trade_query_timeout_secs: parse_env(
                "TRADE_QUERY_TIMEOUT_SECS",
                TRADE_QUERY_TIMEOUT_SECS,
            )?,
            item_query_timeout_secs: parse_env("ITEM_QUERY_TIMEOUT_SECS", ITEM_QUERY_TIMEOUT_SECS)?,
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .ok()
                .map(|s| s.trim_end_matches('/').to_string())
                .filter(|s| !s.is_empty()),
            not_found_image_path: std::env::var("NOT_FOUND_IMAGE_PATH")
                .unwrap_or_else(|_| NOT_FOUND_IMAGE_PATH.to_string()),
            chart_js_files: std::env::var("CHART_JS_FILES")
                .map(|s| split_list(&s))
                .unwrap_or_else(|_| vec![PLOTLY_JS_URL.to_string()]),
            chart_css_files: std::env::var("CHART_CSS_FILES")
                .map(|s| split_list(&s))
                .unwrap_or_default(),
        })
    }

    /// Wall-clock budget for a trade query, enforced on the client side.
    pub fn trade_query_timeout(&self) -> Duration {
        Duration::from_secs(self.trade_query_timeout_secs)
            + Duration::from_millis(CLIENT_TIMEOUT_SLACK_MS)
    }

    pub fn item_query_timeout(&self) -> Duration {
        Duration::from_secs(self.item_query_timeout_secs)
            + Duration::from_millis(CLIENT_TIMEOUT_SLACK_MS)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("{key} must be a valid number"))),
        Err(_) => Ok(default),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
impl Config {
    /// Defaults without touching the process environment.
    pub fn for_tests() -> Self {
        Self {
            database_url: "mysql://localhost/test".to_string(),
            log_level: "info".to_string(),
            bind_addr: BIND_ADDR.to_string(),
            db_max_connections: DB_MAX_CONNECTIONS,
            trade_query_timeout_secs: TRADE_QUERY_TIMEOUT_SECS,
            item_query_timeout_secs: ITEM_QUERY_TIMEOUT_SECS,
            public_base_url: None,
            not_found_image_path: NOT_FOUND_IMAGE_PATH.to_string(),
            chart_js_files: vec![PLOTLY_JS_URL.to_string()],
            chart_css_files: Vec::new(),
        }
    }
}
