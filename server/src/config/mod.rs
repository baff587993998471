use std::env;
use std::str::FromStr;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/ticketing";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3001;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_SESSION_TTL_HOURS: i64 = 24 * 7;
const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub database_max_connections: u32,
    /// Origin of the web client; QR verification links point here.
    pub public_base_url: String,
    pub session_ttl_hours: i64,
    pub cors_allowed_origins: Option<String>,
    pub is_production: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            host: env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string()),
            port: parse_or_default("PORT", DEFAULT_PORT),
            database_max_connections: parse_or_default(
                "DATABASE_MAX_CONNECTIONS",
                DEFAULT_MAX_CONNECTIONS,
            ),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_PUBLIC_BASE_URL.to_string()),
            session_ttl_hours: session_ttl_hours(parse_or_default(
                "SESSION_TTL_HOURS",
                DEFAULT_SESSION_TTL_HOURS,
            )),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS").ok(),
            is_production: env::var("RUST_ENV")
                .map(|v| v.to_lowercase() == "production")
                .unwrap_or(false),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            database_max_connections: DEFAULT_MAX_CONNECTIONS,
            public_base_url: DEFAULT_PUBLIC_BASE_URL.to_string(),
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            cors_allowed_origins: None,
            is_production: false,
        }
    }
}

fn parse_or_default<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Config: invalid {} '{}', using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

/// Session lifetime must be between one hour and a year.
fn session_ttl_hours(hours: i64) -> i64 {
    if (1..=MAX_SESSION_TTL_HOURS).contains(&hours) {
        hours
    } else {
        tracing::warn!(
            "Config: SESSION_TTL_HOURS {} out of range 1..={}, using default {}",
            hours,
            MAX_SESSION_TTL_HOURS,
            DEFAULT_SESSION_TTL_HOURS
        );
        DEFAULT_SESSION_TTL_HOURS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_number_falls_back_to_default() {
        std::env::set_var("TICKETING_TEST_PORT", "not-a-port");
        assert_eq!(parse_or_default("TICKETING_TEST_PORT", 8080u16), 8080);
        std::env::set_var("TICKETING_TEST_PORT", " 9090 ");
        assert_eq!(parse_or_default("TICKETING_TEST_PORT", 8080u16), 9090);
        std::env::remove_var("TICKETING_TEST_PORT");
        assert_eq!(parse_or_default("TICKETING_TEST_PORT", 8080u16), 8080);
    }

    #[test]
    fn test_session_ttl_out_of_range_uses_default() {
        assert_eq!(session_ttl_hours(12), 12);
        assert_eq!(session_ttl_hours(MAX_SESSION_TTL_HOURS), MAX_SESSION_TTL_HOURS);
        assert_eq!(session_ttl_hours(0), DEFAULT_SESSION_TTL_HOURS);
        assert_eq!(session_ttl_hours(-5), DEFAULT_SESSION_TTL_HOURS);
        assert_eq!(
            session_ttl_hours(1_000_000_000_000),
            DEFAULT_SESSION_TTL_HOURS
        );
    }

    #[test]
    fn test_bind_address() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 4000,
            ..Config::default()
        };
        assert_eq!(config.bind_address(), "127.0.0.1:4000");
    }
}
