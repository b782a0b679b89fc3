//! Configuration loading from TOML files and environment variables.
//!
//! Config is loaded in this order of precedence (highest wins):
//! 1. Environment variables (`STOREFRONT_BASE_URL`, `STOREFRONT_TIMEOUT_SECS`,
//!    `STOREFRONT_CREDENTIALS_FILE`)
//! 2. TOML file specified via --config CLI flag
//! 3. ./storefront.toml in the current directory
//! 4. $XDG_CONFIG_HOME/storefront/storefront.toml (or ~/.config/storefront/storefront.toml)
//! 5. Built-in defaults

use crate::error::ConfigError;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

mod defaults;
mod types;

use defaults::DEFAULT_CONFIG_TEMPLATE;
pub use types::{
    ApiConfig, Config, GlobalConfigInitResult, LogFormat, LoggingConfig, StorageBackend,
    StorageConfig,
};

/// Local config file name looked up in the working directory.
const LOCAL_CONFIG_FILE: &str = "storefront.toml";

/// Which file (if any) supplied the loaded config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Explicit(PathBuf),
    Local,
    Global(PathBuf),
    BuiltInDefaults,
}

/// Load configuration from disk and environment.
///
/// `path_override` is an explicit config file path (from --config flag).
pub fn load_config(path_override: Option<&str>) -> Result<Config, ConfigError> {
    Ok(load_config_with_source(path_override)?.0)
}

/// Load configuration and report where it came from.
pub fn load_config_with_source(
    path_override: Option<&str>,
) -> Result<(Config, ConfigSource), ConfigError> {
    load_config_from_sources(
        path_override,
        |path| std::fs::read_to_string(path),
        |name| std::env::var(name).ok(),
        config_root_dir,
    )
}

fn load_config_from_sources<FRead, FEnv, FRoot>(
    path_override: Option<&str>,
    read_file: FRead,
    env_lookup: FEnv,
    config_root: FRoot,
) -> Result<(Config, ConfigSource), ConfigError>
where
    FRead: Fn(&Path) -> Result<String, std::io::Error>,
    FEnv: Fn(&str) -> Option<String>,
    FRoot: Fn() -> Option<PathBuf>,
{
    let (config_text, source) =
        read_config_text_with_sources(path_override, &read_file, &config_root)?;
    let mut config: Config = toml::from_str(&config_text)?;
    apply_env_overrides(&mut config, &env_lookup)?;
    validate_config(&config)?;
    tracing::debug!(?source, base_url = %config.api.base_url, "configuration loaded");
    Ok((config, source))
}

fn read_config_text_with_sources<FRead, FRoot>(
    path_override: Option<&str>,
    read_file: &FRead,
    config_root: &FRoot,
) -> Result<(String, ConfigSource), ConfigError>
where
    FRead: Fn(&Path) -> Result<String, std::io::Error>,
    FRoot: Fn() -> Option<PathBuf>,
{
    if let Some(p) = path_override {
        let path = PathBuf::from(p);
        let text = read_file(&path)?;
        return Ok((text, ConfigSource::Explicit(path)));
    }

    if let Ok(text) = read_file(Path::new(LOCAL_CONFIG_FILE)) {
        return Ok((text, ConfigSource::Local));
    }
    if let Some(dir) = config_root() {
        let global = dir.join("storefront").join(LOCAL_CONFIG_FILE);
        if let Ok(text) = read_file(&global) {
            return Ok((text, ConfigSource::Global(global)));
        }
    }

    Ok((String::new(), ConfigSource::BuiltInDefaults))
}

fn apply_env_overrides<FEnv>(config: &mut Config, env_lookup: &FEnv) -> Result<(), ConfigError>
where
    FEnv: Fn(&str) -> Option<String>,
{
    if let Some(url) = env_value(env_lookup, "STOREFRONT_BASE_URL") {
        config.api.base_url = url;
    }
    if let Some(timeout) = env_value(env_lookup, "STOREFRONT_TIMEOUT_SECS") {
        let parsed = timeout.parse::<u64>().map_err(|_| {
            ConfigError::Invalid(format!(
                "invalid STOREFRONT_TIMEOUT_SECS value `{timeout}`: expected positive integer seconds"
            ))
        })?;
        config.api.timeout_secs = parsed.max(1);
    }
    if let Some(path) = env_value(env_lookup, "STOREFRONT_CREDENTIALS_FILE") {
        config.storage.path = Some(path);
    }
    Ok(())
}

fn env_value<FEnv>(env_lookup: &FEnv, name: &str) -> Option<String>
where
    FEnv: Fn(&str) -> Option<String>,
{
    env_lookup(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Check cross-field invariants of a resolved config.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let base_url = config.api.base_url.trim();
    if base_url.is_empty() {
        return Err(ConfigError::Invalid("api.base_url must not be empty".to_string()));
    }
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(ConfigError::Invalid(format!(
            "api.base_url `{base_url}` must start with http:// or https://"
        )));
    }
    if config.api.refresh_path.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "api.refresh_path must not be empty".to_string(),
        ));
    }
    let access = config.storage.access_key.trim();
    let refresh = config.storage.refresh_key.trim();
    if access.is_empty() || refresh.is_empty() {
        return Err(ConfigError::Invalid(
            "storage.access_key and storage.refresh_key must not be empty".to_string(),
        ));
    }
    if access == refresh {
        return Err(ConfigError::Invalid(format!(
            "storage.access_key and storage.refresh_key must differ (both `{access}`)"
        )));
    }
    Ok(())
}

/// Default global config path (`~/.config/storefront/storefront.toml`).
pub fn default_global_config_path() -> Option<PathBuf> {
    config_root_dir().map(|dir| dir.join("storefront").join(LOCAL_CONFIG_FILE))
}

/// Write the default global config file unless one already exists.
pub fn initialize_default_global_config() -> Result<GlobalConfigInitResult, ConfigError> {
    let path = default_global_config_path().ok_or_else(|| {
        ConfigError::Invalid(
            "unable to resolve default config path for ~/.config/storefront/storefront.toml"
                .to_string(),
        )
    })?;
    initialize_default_global_config_at_path(&path)
}

fn initialize_default_global_config_at_path(
    path: &Path,
) -> Result<GlobalConfigInitResult, ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // create_new avoids clobbering if another process wins a race to create.
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(mut file) => {
            file.write_all(DEFAULT_CONFIG_TEMPLATE.as_bytes())?;
            Ok(GlobalConfigInitResult::Created {
                path: path.to_path_buf(),
            })
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            Ok(GlobalConfigInitResult::AlreadyExists {
                path: path.to_path_buf(),
            })
        }
        Err(e) => Err(ConfigError::Io(e)),
    }
}

/// Root directory for per-user config (`$XDG_CONFIG_HOME` or `~/.config`).
pub fn config_root_dir() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("XDG_CONFIG_HOME") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    dirs::home_dir()
        .map(|home| home.join(".config"))
        .or_else(dirs::config_dir)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testsupport::TestTempDir;
    use std::collections::HashMap;

    fn load_with(
        path_override: Option<&str>,
        files: &[(&str, &str)],
        env: &[(&str, &str)],
    ) -> Result<(Config, ConfigSource), ConfigError> {
        let files: HashMap<PathBuf, String> = files
            .iter()
            .map(|(path, text)| (PathBuf::from(path), text.to_string()))
            .collect();
        let env: HashMap<String, String> = env
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        load_config_from_sources(
            path_override,
            |path| {
                files.get(path).cloned().ok_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::NotFound, "missing fixture")
                })
            },
            |name| env.get(name).cloned(),
            || Some(PathBuf::from("/cfg")),
        )
    }

    #[test]
    fn defaults_are_sensible() {
        let (c, source) = load_with(None, &[], &[]).unwrap();
        assert_eq!(source, ConfigSource::BuiltInDefaults);
        assert_eq!(c, Config::default());
        assert_eq!(c.api.base_url, "http://localhost:8000/api");
        assert_eq!(c.api.refresh_path, "/auth/token/refresh/");
        assert_eq!(c.api.refresh_wait_timeout_secs, 30);
        assert_eq!(c.storage.backend, StorageBackend::File);
        assert_eq!(c.storage.access_key, "access_token");
        assert_eq!(c.storage.refresh_key, "refresh_token");
        assert_eq!(c.logging.format, LogFormat::Text);
    }

    #[test]
    fn embedded_template_parses_to_defaults() {
        let parsed: Config = toml::from_str(DEFAULT_CONFIG_TEMPLATE).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn parse_partial_toml() {
        let toml = r#"
            [api]
            base_url = "https://shop.example.com/api"

            [storage]
            backend = "memory"

            [logging]
            format = "json"
        "#;
        let (c, source) = load_with(None, &[("storefront.toml", toml)], &[]).unwrap();
        assert_eq!(source, ConfigSource::Local);
        assert_eq!(c.api.base_url, "https://shop.example.com/api");
        assert_eq!(c.api.timeout_secs, 30);
        assert_eq!(c.storage.backend, StorageBackend::Memory);
        assert_eq!(c.logging.format, LogFormat::Json);
        assert_eq!(c.logging.level, "warn");
    }

    #[test]
    fn explicit_path_wins_over_local_and_global() {
        let (c, source) = load_with(
            Some("/tmp/custom.toml"),
            &[
                ("/tmp/custom.toml", "[api]\nbase_url = \"https://explicit.test\""),
                ("storefront.toml", "[api]\nbase_url = \"https://local.test\""),
            ],
            &[],
        )
        .unwrap();
        assert_eq!(source, ConfigSource::Explicit(PathBuf::from("/tmp/custom.toml")));
        assert_eq!(c.api.base_url, "https://explicit.test");
    }

    #[test]
    fn explicit_path_must_exist() {
        let err = load_with(Some("/tmp/missing.toml"), &[], &[]).expect_err("missing file");
        assert!(matches!(err, ConfigError::Io(_)), "got: {err}");
    }

    #[test]
    fn global_config_is_used_when_no_local_file() {
        let (c, source) = load_with(
            None,
            &[(
                "/cfg/storefront/storefront.toml",
                "[api]\nrefresh_path = \"/token/refresh\"",
            )],
            &[],
        )
        .unwrap();
        assert_eq!(
            source,
            ConfigSource::Global(PathBuf::from("/cfg/storefront/storefront.toml"))
        );
        assert_eq!(c.api.refresh_path, "/token/refresh");
    }

    #[test]
    fn env_overrides_file_values() {
        let (c, _) = load_with(
            None,
            &[("storefront.toml", "[api]\nbase_url = \"https://file.test\"")],
            &[
                ("STOREFRONT_BASE_URL", "https://env.test"),
                ("STOREFRONT_TIMEOUT_SECS", "0"),
                ("STOREFRONT_CREDENTIALS_FILE", "/tmp/creds.json"),
            ],
        )
        .unwrap();
        assert_eq!(c.api.base_url, "https://env.test");
        assert_eq!(c.api.timeout_secs, 1);
        assert_eq!(c.storage.path.as_deref(), Some("/tmp/creds.json"));
    }

    #[test]
    fn invalid_timeout_env_is_rejected() {
        let err = load_with(None, &[], &[("STOREFRONT_TIMEOUT_SECS", "soon")]).expect_err("bad");
        assert!(err.to_string().contains("STOREFRONT_TIMEOUT_SECS"), "got: {err}");
    }

    #[test]
    fn validation_rejects_bad_values() {
        let err = load_with(None, &[("storefront.toml", "[api]\nbase_url = \"shop.test\"")], &[])
            .expect_err("scheme");
        assert!(err.to_string().contains("http://"), "got: {err}");

        let err = load_with(
            None,
            &[(
                "storefront.toml",
                "[storage]\naccess_key = \"token\"\nrefresh_key = \"token\"",
            )],
            &[],
        )
        .expect_err("same keys");
        assert!(err.to_string().contains("must differ"), "got: {err}");
    }

    #[test]
    fn unknown_backend_is_a_toml_error() {
        let err = load_with(None, &[("storefront.toml", "[storage]\nbackend = \"cookie\"")], &[])
            .expect_err("backend");
        assert!(matches!(err, ConfigError::Toml(_)), "got: {err}");
    }

    #[test]
    fn initialize_global_config_creates_once() {
        let tmp = TestTempDir::new("config-init");
        let path = tmp.child("storefront/storefront.toml");
        let first = initialize_default_global_config_at_path(&path).unwrap();
        assert_eq!(first, GlobalConfigInitResult::Created { path: path.clone() });
        let second = initialize_default_global_config_at_path(&path).unwrap();
        assert_eq!(second, GlobalConfigInitResult::AlreadyExists { path: path.clone() });
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("[api]"));
    }
}
