//! Config loading: a TOML file with `VIDGRAB_<SECTION>_<KEY>` environment
//! overrides layered on top (e.g. `VIDGRAB_SERVICE_URL`,
//! `VIDGRAB_SERVICE_TIMEOUT_SECS`, `VIDGRAB_HISTORY_LIMIT`).

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

const ENV_PREFIX: &str = "VIDGRAB_";

/// Variables under the prefix that are not config keys.
const ENV_IGNORED: &[&str] = &["config"];

/// Only the first underscore separates section from key, so keys such as
/// `timeout_secs` keep theirs.
fn env_overrides() -> Env {
    Env::prefixed(ENV_PREFIX)
        .ignore(ENV_IGNORED)
        .map(|key| key.as_str().replacen('_', ".", 1).into())
}

/// Load configuration from `path`, then apply environment overrides.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    Figment::from(Toml::file(path))
        .merge(env_overrides())
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Parse configuration from a TOML string; the environment is not consulted.
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    const SERVICE_ONLY: &str = r#"
[service]
url = "http://jobs.local:8000"
"#;

    #[test]
    fn test_file_values_and_section_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", SERVICE_ONLY)?;

            let config = load_config(Path::new("config.toml")).map_err(|e| e.to_string())?;
            assert_eq!(config.service.url, "http://jobs.local:8000");
            assert_eq!(config.service.timeout_secs, 30);
            assert_eq!(config.history.limit, 10);
            assert_eq!(config.server.port, 8080);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", SERVICE_ONLY)?;
            jail.set_env("VIDGRAB_SERVICE_URL", "https://jobs.example:9443");
            jail.set_env("VIDGRAB_SERVICE_TIMEOUT_SECS", "5");
            jail.set_env("VIDGRAB_HISTORY_LIMIT", "3");
            jail.set_env("VIDGRAB_SERVER_PORT", "9100");

            let config = load_config(Path::new("config.toml")).map_err(|e| e.to_string())?;
            assert_eq!(config.service.url, "https://jobs.example:9443");
            assert_eq!(config.service.timeout_secs, 5);
            assert_eq!(config.history.limit, 3);
            assert_eq!(config.server.port, 9100);
            Ok(())
        });
    }

    #[test]
    fn test_env_can_supply_a_missing_service_section() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[server]\nport = 8081\n")?;
            jail.set_env("VIDGRAB_SERVICE_URL", "http://jobs.local:8000");

            let config = load_config(Path::new("config.toml")).map_err(|e| e.to_string())?;
            assert_eq!(config.service.url, "http://jobs.local:8000");
            assert_eq!(config.server.port, 8081);
            Ok(())
        });
    }

    #[test]
    fn test_config_path_variable_is_not_a_key() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", SERVICE_ONLY)?;
            jail.set_env("VIDGRAB_CONFIG", "/somewhere/else.toml");

            let config = load_config(Path::new("config.toml")).map_err(|e| e.to_string())?;
            assert_eq!(config.service.url, "http://jobs.local:8000");
            Ok(())
        });
    }

    #[test]
    fn test_missing_file_and_directory() {
        let err = tokio_test::assert_err!(load_config(Path::new("/nonexistent/config.toml")));
        assert!(matches!(err, ConfigError::FileNotFound(_)));

        let dir = tempfile::tempdir().unwrap();
        let err = tokio_test::assert_err!(load_config(dir.path()));
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_missing_service_is_a_parse_error() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[history]\nlimit = 4\n")?;

            let err = load_config(Path::new("config.toml")).unwrap_err();
            assert!(matches!(err, ConfigError::ParseError(_)));
            Ok(())
        });

        let err = tokio_test::assert_err!(load_config_from_str("[history]\nlimit = 4\n"));
        assert!(err.to_string().starts_with("Failed to parse configuration"));
    }
}
