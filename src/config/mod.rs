// Configuration module entry point
// Loads the service configuration and exposes the shared runtime state

mod state;
mod types;

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, Environment, File};
use std::net::SocketAddr;

pub use state::AppState;
pub use types::{Config, LogLevel};

/// Config file stem looked up in the working directory (`config.toml`)
pub const DEFAULT_CONFIG_FILE: &str = "config";

impl Config {
    /// Load configuration: defaults, then `config.toml`, then `POC3_*`
    /// overrides, then `PORT`.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load configuration from the given file path (without extension)
    pub fn load_from(config_path: &str) -> Result<Self, ConfigError> {
        defaults()?
            .add_source(File::with_name(config_path).required(false))
            .add_source(
                Environment::with_prefix("POC3")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_override_option("server.port", std::env::var("PORT").ok())?
            .build()?
            .try_deserialize()
    }

    /// Built-in defaults only, ignoring files and the environment
    pub fn from_defaults() -> Result<Self, ConfigError> {
        defaults()?.build()?.try_deserialize()
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }

    pub fn log_level(&self) -> LogLevel {
        LogLevel::parse(&self.logging.level)
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    config::Config::builder()
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8000)?
        .set_default("logging.level", "info")?
        .set_default("logging.access_log", true)?
        .set_default("logging.access_log_format", "combined")?
        .set_default("performance.keep_alive_timeout", 75)?
        .set_default("performance.read_timeout", 30)?
        .set_default("performance.write_timeout", 30)?
        .set_default("http.server_name", "poc3-hello/1.0")?
        .set_default("http.enable_cors", true)?
        .set_default("http.max_body_size", 1_048_576) // 1MB
}
