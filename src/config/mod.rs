// Configuration module entry point
// Loads layered configuration and holds the shared application state

mod state;
mod types;

use std::net::SocketAddr;

// Re-export public types
pub use state::AppState;
pub use types::{Config, LoggingConfig};

/// Default config file name (without extension)
pub const DEFAULT_CONFIG_PATH: &str = "config";

/// Environment variable the site has always used for the backend location
pub const UPSTREAM_URL_ENV: &str = "PUBLIC_API_URL";

impl Config {
    /// Load configuration from specified file path (without extension)
    ///
    /// Precedence: `PUBLIC_API_URL` > `GATEWAY__*` environment > file > defaults.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("GATEWAY")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 4321)?
            .set_default("server.backlog", 128)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "combined")?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("performance.shutdown_grace_secs", 5)?
            .set_default("http.server_name", "kodeksa-gateway/0.1")?
            .set_default("http.enable_cors", false)?
            .set_default("http.max_body_size", 12_582_912)? // 12MB, above the 10MB CV cap
            .set_default("upstream.base_url", "http://localhost:3000")?
            .set_default("upstream.timeout_secs", 10)?
            .set_override_option("upstream.base_url", std::env::var(UPSTREAM_URL_ENV).ok())?
            .build()?;

        settings.try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_config_file() {
        let cfg = Config::load_from("does-not-exist-gateway-config").unwrap();
        assert_eq!(cfg.server.backlog, 128);
        assert_eq!(cfg.upstream.timeout_secs, 10);
        assert_eq!(cfg.http.max_body_size, 12_582_912);
        assert!(cfg.routes.health.enabled);
        assert_eq!(cfg.routes.health.liveness_path, "/healthz");
        assert!(cfg.fallback.path.is_none());
        if std::env::var(UPSTREAM_URL_ENV).is_err() {
            assert_eq!(cfg.upstream.base_url, "http://localhost:3000");
        }
    }

    #[test]
    fn socket_addr_is_parsed() {
        let mut cfg = Config::load_from("does-not-exist-gateway-config").unwrap();
        cfg.server.host = "0.0.0.0".to_string();
        cfg.server.port = 9000;
        assert_eq!(cfg.get_socket_addr().unwrap().port(), 9000);

        cfg.server.host = "not an ip".to_string();
        assert!(cfg.get_socket_addr().is_err());
    }
}
