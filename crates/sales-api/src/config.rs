//! Application configuration loaded from environment variables.

use std::time::Duration;

use breaker::BreakerConfig;
use sales::OrchestratorConfig;

/// Secret used when `JWT_SECRET_KEY` is not set. Only fit for local runs.
pub const DEFAULT_JWT_SECRET: &str = "dev-secret";

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `5001`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: PostgreSQL connection string; unset runs an in-memory ledger
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `10`)
/// - `JWT_SECRET_KEY`: HS256 secret shared with the token issuer (default: `"dev-secret"`)
/// - `CUSTOMERS_SERVICE_URL`: customers service base URL (default: `"http://localhost:8001"`)
/// - `BALANCE_TIMEOUT_MS`: timeout per customers service call (default: `5000`)
/// - `BREAKER_FAILURE_THRESHOLD`: consecutive failures that open a breaker (default: `3`)
/// - `BREAKER_RESET_TIMEOUT_SECS`: time before an open breaker admits a trial (default: `30`)
///
/// Values that fail to parse fall back to their defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub customers_service_url: String,
    pub balance_timeout: Duration,
    pub breaker_failure_threshold: u32,
    pub breaker_reset_timeout: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            database_max_connections: parsed("DATABASE_MAX_CONNECTIONS")
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(defaults.database_max_connections),
            jwt_secret: lookup("JWT_SECRET_KEY")
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.jwt_secret),
            customers_service_url: lookup("CUSTOMERS_SERVICE_URL")
                .unwrap_or(defaults.customers_service_url),
            balance_timeout: parsed("BALANCE_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.balance_timeout),
            breaker_failure_threshold: parsed("BREAKER_FAILURE_THRESHOLD")
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(defaults.breaker_failure_threshold),
            breaker_reset_timeout: parsed("BREAKER_RESET_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.breaker_reset_timeout),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns true when the JWT secret was not configured.
    pub fn uses_default_jwt_secret(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET
    }

    pub fn breaker_config(&self) -> BreakerConfig {
        BreakerConfig::new(self.breaker_failure_threshold, self.breaker_reset_timeout)
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            balance_timeout: self.balance_timeout,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5001,
            log_level: "info".to_string(),
            database_url: None,
            database_max_connections: 10,
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            customers_service_url: "http://localhost:8001".to_string(),
            balance_timeout: Duration::from_millis(5000),
            breaker_failure_threshold: 3,
            breaker_reset_timeout: Duration::from_secs(30),
        }
    }
}
