use crate::error::ConfigError;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod logging;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use logging::init_tracing;
pub use settings::{Config, DatabaseSettings, LogFormat, LoggingSettings, ServerSettings};

/// Prefix for environment overrides, e.g. `RECIPE__SERVER__PORT=8080`.
const ENV_PREFIX: &str = "RECIPE";

/// Loads the application configuration from a TOML file.
///
/// Environment variables prefixed with `RECIPE__` override file values, with
/// `__` separating nested keys. The result is validated before it is returned.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::from(path))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;

    // Attempt to deserialize the entire configuration into our `Config` struct
    let config = builder.try_deserialize::<Config>()?;
    config.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("temp file");
        file.write_all(contents.as_bytes()).expect("write config");
        file
    }

    #[test]
    fn loads_file_and_applies_defaults() {
        let file = write_config(
            r#"
            service_name = "recipe-app"

            [server]
            port = 8080

            [database]
            url = "postgres://localhost/recipes"
            transaction_deadline_ms = 1500
            "#,
        );

        let config = load_config(file.path()).expect("config should load");
        assert_eq!(config.service_name, "recipe-app");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert!(!config.server.expose_error_debug);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(
            config.database.transaction_deadline(),
            Some(std::time::Duration::from_millis(1500))
        );
        assert_eq!(config.logging.filter, "info");
        assert_eq!(config.logging.format, LogFormat::Full);
    }

    #[test]
    fn rejects_zero_pool_size() {
        let file = write_config(
            r#"
            service_name = "recipe-app"

            [server]

            [database]
            max_connections = 0
            "#,
        );

        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn rejects_a_host_that_is_not_an_ip() {
        let file = write_config(
            r#"
            service_name = "recipe-app"

            [server]
            host = "localhost"

            [database]
            "#,
        );

        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::ValidationError(_))
        ));
    }
}
