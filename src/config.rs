use std::path::PathBuf;
use std::time::Duration;

use crate::rate_limit::RateLimitConfig;

pub const DEFAULT_JSON_LIMIT: usize = 2 * 1024 * 1024;

/// Server settings read from the environment at start-up.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub production: bool,
    pub json_limit: usize,
    pub enable_hsts: bool,
    pub data_dir: Option<PathBuf>,
    pub database_url: Option<String>,
    pub public_url: String,
    pub rate_limit: RateLimitConfig,
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> Self {
        let production = std::env::var("APP_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);
        let port = env_or("PORT", 5000u16);
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port,
            production,
            json_limit: env_or("JSON_LIMIT_BYTES", DEFAULT_JSON_LIMIT),
            enable_hsts: env_flag("ENABLE_HSTS", false),
            data_dir: std::env::var("BODY_NOTE_DATA_DIR").ok().map(PathBuf::from),
            database_url: std::env::var("DATABASE_URL").ok(),
            public_url: std::env::var("PUBLIC_URL").unwrap_or_else(|_| format!("http://localhost:{port}")),
            rate_limit: RateLimitConfig {
                enabled: env_flag("RATE_LIMIT_ENABLED", true),
                max_requests: env_or("RATE_LIMIT_MAX", 1000usize),
                window: Duration::from_secs(env_or("RATE_LIMIT_WINDOW_SECS", 60u64)),
                trust_proxy: env_flag("TRUST_PROXY", false),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[serial_test::serial]
    fn defaults_when_unset() {
        for var in ["APP_ENV", "PORT", "JSON_LIMIT_BYTES", "RATE_LIMIT_MAX", "RATE_LIMIT_WINDOW_SECS", "PUBLIC_URL", "TRUST_PROXY"] {
            std::env::remove_var(var);
        }
        let cfg = AppConfig::from_env();
        assert_eq!(cfg.port, 5000);
        assert!(!cfg.production);
        assert_eq!(cfg.json_limit, DEFAULT_JSON_LIMIT);
        assert_eq!(cfg.rate_limit.max_requests, 1000);
        assert_eq!(cfg.rate_limit.window, Duration::from_secs(60));
        assert_eq!(cfg.public_url, "http://localhost:5000");
        assert!(!cfg.rate_limit.trust_proxy);
    }

    #[test]
    #[serial_test::serial]
    fn production_and_overrides() {
        std::env::set_var("APP_ENV", "Production");
        std::env::set_var("RATE_LIMIT_MAX", "5");
        std::env::set_var("PORT", "not-a-port");
        std::env::set_var("TRUST_PROXY", "true");
        let cfg = AppConfig::from_env();
        assert!(cfg.production);
        assert!(cfg.rate_limit.trust_proxy);
        assert_eq!(cfg.rate_limit.max_requests, 5);
        assert_eq!(cfg.port, 5000);
        std::env::remove_var("APP_ENV");
        std::env::remove_var("RATE_LIMIT_MAX");
        std::env::remove_var("PORT");
        std::env::remove_var("TRUST_PROXY");
    }
}
