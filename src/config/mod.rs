//! Configuration module for the Halaqa Hub backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Key that grants the admin role when presented by a request
    pub admin_key: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit logs as JSON lines instead of the human-readable format
    pub log_json: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let admin_key = env::var("HALAQA_ADMIN_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        let db_path = env::var("HALAQA_DB_PATH")
            .unwrap_or_else(|_| "./data/halaqa.sqlite".to_string())
            .into();

        let bind_addr = env::var("HALAQA_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .expect("Invalid HALAQA_BIND_ADDR format");

        let log_level = env::var("HALAQA_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let log_json = env::var("HALAQA_LOG_FORMAT")
            .map(|format| is_json_format(&format))
            .unwrap_or(false);

        Self {
            admin_key,
            db_path,
            bind_addr,
            log_level,
            log_json,
        }
    }
}

fn is_json_format(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        // Clear any existing env vars
        env::remove_var("HALAQA_ADMIN_KEY");
        env::remove_var("HALAQA_DB_PATH");
        env::remove_var("HALAQA_BIND_ADDR");
        env::remove_var("HALAQA_LOG_LEVEL");
        env::remove_var("HALAQA_LOG_FORMAT");

        let config = Config::from_env();

        assert!(config.admin_key.is_none());
        assert_eq!(config.db_path, PathBuf::from("./data/halaqa.sqlite"));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");
        assert!(!config.log_json);
    }

    #[test]
    fn test_log_format_parsing() {
        assert!(is_json_format("json"));
        assert!(is_json_format(" JSON "));
        assert!(!is_json_format("pretty"));
        assert!(!is_json_format(""));
    }
}
