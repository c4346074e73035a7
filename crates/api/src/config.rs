use std::time::Duration;

use shelfroom_core::collaboration::{LockLease, DEFAULT_HEARTBEAT_INTERVAL_SECS};

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for background tasks, in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// PostgreSQL URL for the document store. Documents stay in memory when unset.
    pub database_url: Option<String>,
    /// WebSocket ping and lease renewal interval in seconds (default: `30`).
    pub heartbeat_interval_secs: u64,
    /// Treat lock records as abandoned when their holder stops renewing.
    pub lock_lease_enabled: bool,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                    |
    /// |--------------------------|----------------------------|
    /// | `HOST`                   | `0.0.0.0`                  |
    /// | `PORT`                   | `3000`                     |
    /// | `CORS_ORIGINS`           | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`   | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`  | `30`                       |
    /// | `DATABASE_URL`           | unset (in-memory)          |
    /// | `HEARTBEAT_INTERVAL_SECS`| `30`                       |
    /// | `LOCK_LEASE_ENABLED`     | `false`                    |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let heartbeat_interval_secs: u64 = std::env::var("HEARTBEAT_INTERVAL_SECS")
            .unwrap_or_else(|_| DEFAULT_HEARTBEAT_INTERVAL_SECS.to_string())
            .parse()
            .expect("HEARTBEAT_INTERVAL_SECS must be a valid u64");
        assert!(
            heartbeat_interval_secs > 0,
            "HEARTBEAT_INTERVAL_SECS must be greater than zero"
        );

        let lock_lease_enabled: bool = std::env::var("LOCK_LEASE_ENABLED")
            .unwrap_or_else(|_| "false".into())
            .parse()
            .expect("LOCK_LEASE_ENABLED must be true or false");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            database_url,
            heartbeat_interval_secs,
            lock_lease_enabled,
        }
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// The lease handed to the lock coordinator, if enabled.
    pub fn lock_lease(&self) -> Option<LockLease> {
        self.lock_lease_enabled
            .then(|| LockLease::new(self.heartbeat_interval()))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3000,
            cors_origins: vec!["http://localhost:5173".into()],
            request_timeout_secs: 30,
            shutdown_timeout_secs: 30,
            database_url: None,
            heartbeat_interval_secs: DEFAULT_HEARTBEAT_INTERVAL_SECS,
            lock_lease_enabled: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lease_is_off_by_default() {
        assert_eq!(ServerConfig::default().lock_lease(), None);
    }

    #[test]
    fn lease_follows_heartbeat_interval() {
        let config = ServerConfig {
            heartbeat_interval_secs: 5,
            lock_lease_enabled: true,
            ..ServerConfig::default()
        };
        let lease = config.lock_lease().unwrap();
        assert_eq!(lease.heartbeat, Duration::from_secs(5));
        assert_eq!(lease.abandon_after(), Duration::from_secs(10));
    }
}
