use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::config::schema::Settings;
use crate::error::ConfigError;

pub const ENV_HOST: &str = "SCHEMADOC_HOST";
pub const ENV_PORT: &str = "SCHEMADOC_PORT";
pub const ENV_DATABASE: &str = "SCHEMADOC_DATABASE";
pub const ENV_OUTPUT_DIR: &str = "SCHEMADOC_OUTPUT_DIR";
pub const ENV_FILE_MAX_AGE_SECS: &str = "SCHEMADOC_FILE_MAX_AGE_SECS";
pub const ENV_CREDENTIAL_TTL_SECS: &str = "SCHEMADOC_CREDENTIAL_TTL_SECS";
pub const ENV_SQLITE_ROOT: &str = "SCHEMADOC_SQLITE_ROOT";

pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_settings_from_str(&content)
}

pub fn load_settings_from_str(content: &str) -> Result<Settings, ConfigError> {
    let settings: Settings = serde_json::from_str(content)?;

    validate_settings(&settings)?;

    Ok(settings)
}

pub fn validate_settings(settings: &Settings) -> Result<(), ConfigError> {
    if settings.port == 0 {
        return Err(ConfigError::Validation {
            message: "port must be between 1 and 65535".to_string(),
        });
    }
    if settings.retry.max_attempts == 0 {
        return Err(ConfigError::Validation {
            message: "retry.max_attempts must be at least 1".to_string(),
        });
    }
    if settings.credential_ttl_secs == 0 {
        return Err(ConfigError::Validation {
            message: "credential_ttl_secs must be at least 1".to_string(),
        });
    }
    if settings
        .sqlite_root
        .as_ref()
        .is_some_and(|root| root.as_os_str().is_empty())
    {
        return Err(ConfigError::Validation {
            message: "sqlite_root must not be empty when set".to_string(),
        });
    }
    if settings.output_directory.as_os_str().is_empty() {
        return Err(ConfigError::Validation {
            message: "output_directory must not be empty".to_string(),
        });
    }
    if settings.database_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation {
            message: "database_path must not be empty".to_string(),
        });
    }

    Ok(())
}

fn parse_env<T: FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { name, value })
}

impl Settings {
    /// Defaults overlaid with `SCHEMADOC_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Settings::default().with_env()
    }

    /// Overlays `SCHEMADOC_*` environment variables on these settings.
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Overlays values from `lookup`, keyed by environment variable name.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(ENV_HOST) {
            self.host = host;
        }
        if let Some(port) = lookup(ENV_PORT) {
            self.port = parse_env(ENV_PORT, port)?;
        }
        if let Some(path) = lookup(ENV_DATABASE) {
            self.database_path = PathBuf::from(path);
        }
        if let Some(dir) = lookup(ENV_OUTPUT_DIR) {
            self.output_directory = PathBuf::from(dir);
        }
        if let Some(age) = lookup(ENV_FILE_MAX_AGE_SECS) {
            self.file_max_age_secs = parse_env(ENV_FILE_MAX_AGE_SECS, age)?;
        }
        if let Some(ttl) = lookup(ENV_CREDENTIAL_TTL_SECS) {
            self.credential_ttl_secs = parse_env(ENV_CREDENTIAL_TTL_SECS, ttl)?;
        }
        if let Some(root) = lookup(ENV_SQLITE_ROOT) {
            self.sqlite_root = Some(PathBuf::from(root));
        }

        validate_settings(&self)?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_empty_object_uses_defaults() {
        let settings = load_settings_from_str("{}").unwrap();
        assert_eq!(settings.host, "0.0.0.0");
        assert_eq!(settings.port, 8080);
        assert_eq!(settings.output_directory, PathBuf::from("generated_docs"));
        assert_eq!(settings.file_max_age_secs, 600);
        assert_eq!(settings.retry.max_attempts, 3);
        assert_eq!(settings.retry.backoff_ms, 100);
        assert!(settings.cors_allow_any_origin);
        assert!(settings.database_path.ends_with("jobs.db"));
        assert_eq!(settings.credential_ttl().as_secs(), 900);
        assert_eq!(settings.sqlite_root, None);
    }

    #[test]
    fn test_load_settings_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "host": "127.0.0.1",
                "port": 9000,
                "database_path": "/var/lib/schemadoc/jobs.db",
                "output_directory": "/srv/docs",
                "retry": {{ "max_attempts": 5 }}
            }}"#
        )
        .unwrap();

        let settings = load_settings(file.path()).unwrap();
        assert_eq!(settings.bind_address(), "127.0.0.1:9000");
        assert_eq!(settings.output_directory, PathBuf::from("/srv/docs"));
        assert_eq!(settings.retry.max_attempts, 5);
        assert_eq!(settings.retry.backoff_ms, 100);
        assert_eq!(settings.retry.policy().max_attempts, 5);
    }

    #[test]
    fn test_missing_file() {
        let err = load_settings("/nonexistent/schemadoc.json").unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_invalid_json() {
        let err = load_settings_from_str("{ port: }").unwrap_err();
        assert!(matches!(err, ConfigError::ParseJson(_)));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        for json in [
            r#"{"port": 0}"#,
            r#"{"retry": {"max_attempts": 0}}"#,
            r#"{"output_directory": ""}"#,
            r#"{"credential_ttl_secs": 0}"#,
            r#"{"sqlite_root": ""}"#,
        ] {
            let err = load_settings_from_str(json).unwrap_err();
            assert!(
                matches!(err, ConfigError::Validation { .. }),
                "expected validation error for {}",
                json
            );
        }
    }

    #[test]
    fn test_overrides_layer_over_file_values() {
        let vars: HashMap<&str, &str> = [
            (ENV_PORT, "7070"),
            (ENV_OUTPUT_DIR, "/tmp/docs"),
            (ENV_FILE_MAX_AGE_SECS, "30"),
            (ENV_CREDENTIAL_TTL_SECS, "120"),
            (ENV_SQLITE_ROOT, "/srv/sources"),
        ]
        .into_iter()
        .collect();

        let settings = load_settings_from_str(r#"{"host": "localhost", "port": 9000}"#)
            .unwrap()
            .with_overrides(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(settings.host, "localhost");
        assert_eq!(settings.port, 7070);
        assert_eq!(settings.output_directory, PathBuf::from("/tmp/docs"));
        assert_eq!(settings.file_max_age().as_secs(), 30);
        assert_eq!(settings.credential_ttl_secs, 120);
        assert_eq!(settings.sqlite_root, Some(PathBuf::from("/srv/sources")));
    }

    #[test]
    fn test_override_with_bad_number() {
        let err = Settings::default()
            .with_overrides(|name| (name == ENV_PORT).then(|| "eighty".to_string()))
            .unwrap_err();
        match err {
            ConfigError::InvalidEnv { name, value } => {
                assert_eq!(name, ENV_PORT);
                assert_eq!(value, "eighty");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    #[serial]
    fn test_from_env_reads_process_environment() {
        std::env::set_var(ENV_HOST, "10.0.0.5");
        std::env::set_var(ENV_DATABASE, "/tmp/schemadoc-test/jobs.db");
        let settings = Settings::from_env();
        std::env::remove_var(ENV_HOST);
        std::env::remove_var(ENV_DATABASE);

        let settings = settings.unwrap();
        assert_eq!(settings.host, "10.0.0.5");
        assert_eq!(
            settings.database_path,
            PathBuf::from("/tmp/schemadoc-test/jobs.db")
        );
    }

    #[test]
    #[serial]
    fn test_from_env_without_variables_is_default() {
        for name in [
            ENV_HOST,
            ENV_PORT,
            ENV_DATABASE,
            ENV_OUTPUT_DIR,
            ENV_FILE_MAX_AGE_SECS,
            ENV_CREDENTIAL_TTL_SECS,
            ENV_SQLITE_ROOT,
        ] {
            std::env::remove_var(name);
        }
        assert_eq!(Settings::from_env().unwrap(), Settings::default());
    }
}
