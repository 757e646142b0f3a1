//! Configuration loading
//!
//! Retrieval settings can be read from YAML, TOML, JSON, INI, RON or JSON5
//! files. `${VAR}` / `$VAR` references are substituted from the environment
//! before parsing, and `SIFT_`-prefixed environment variables (with `__` as
//! the nesting separator) override file values.

use config::{Config as Cfg, Environment, File, FileFormat};
use regex::Regex;
use serde::de::DeserializeOwned;
use std::path::Path;

pub use config::FileFormat as ConfigFormat;

/// Prefix for environment overrides, e.g. `SIFT_CACHE__MAX_ENTRIES=500`.
pub const ENV_PREFIX: &str = "SIFT";

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parsing error: {0}")]
    Parse(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Detect configuration format from file extension
pub fn detect_format(path: impl AsRef<Path>) -> ConfigResult<FileFormat> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| ConfigError::UnsupportedFormat(format!("no file extension: {}", path.display())))?;

    match ext.to_lowercase().as_str() {
        "yaml" | "yml" => Ok(FileFormat::Yaml),
        "toml" => Ok(FileFormat::Toml),
        "json" => Ok(FileFormat::Json),
        "ini" => Ok(FileFormat::Ini),
        "ron" => Ok(FileFormat::Ron),
        "json5" => Ok(FileFormat::Json5),
        _ => Err(ConfigError::UnsupportedFormat(ext.to_string())),
    }
}

/// Substitute `${VAR}` and `$VAR` references with environment values.
///
/// Unknown variables are left as written.
pub fn substitute_env_vars(content: &str) -> ConfigResult<String> {
    let braced = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
        .map_err(|e| ConfigError::Parse(e.to_string()))?;
    let bare = Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)\b")
        .map_err(|e| ConfigError::Parse(e.to_string()))?;

    let lookup = |caps: &regex::Captures| std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string());

    let result = braced.replace_all(content, lookup).to_string();
    Ok(bare.replace_all(&result, lookup).to_string())
}

/// Parse configuration from a string with an explicit format.
///
/// Environment overrides are not applied.
pub fn from_str<T>(content: &str, format: FileFormat) -> ConfigResult<T>
where
    T: DeserializeOwned,
{
    let substituted = substitute_env_vars(content)?;

    Cfg::builder()
        .add_source(File::from_str(&substituted, format))
        .build()
        .map_err(|e| ConfigError::Parse(e.to_string()))?
        .try_deserialize()
        .map_err(|e| ConfigError::Serialization(e.to_string()))
}

/// Load configuration from a file, then apply `SIFT_*` environment overrides.
pub fn load_config<T>(path: impl AsRef<Path>) -> ConfigResult<T>
where
    T: DeserializeOwned,
{
    load_with_env(path, ENV_PREFIX)
}

/// Load configuration from a file with overrides from `{prefix}_*` variables.
pub fn load_with_env<T>(path: impl AsRef<Path>, env_prefix: &str) -> ConfigResult<T>
where
    T: DeserializeOwned,
{
    let path = path.as_ref();
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    let substituted = substitute_env_vars(&content)?;

    tracing::debug!(path = %path.display(), "loading retrieval config");

    Cfg::builder()
        .add_source(File::from_str(&substituted, format))
        .add_source(
            Environment::with_prefix(env_prefix)
                .prefix_separator("_")
                .separator("__"),
        )
        .build()
        .map_err(|e| ConfigError::Parse(e.to_string()))?
        .try_deserialize()
        .map_err(|e| ConfigError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[derive(serde::Deserialize, Debug, PartialEq)]
    struct CacheSection {
        max_entries: usize,
    }

    #[derive(serde::Deserialize, Debug, PartialEq)]
    struct TestConfig {
        name: String,
        cache: CacheSection,
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format("retrieval.yaml").unwrap(), FileFormat::Yaml);
        assert_eq!(detect_format("retrieval.yml").unwrap(), FileFormat::Yaml);
        assert_eq!(detect_format("retrieval.toml").unwrap(), FileFormat::Toml);
        assert_eq!(detect_format("retrieval.json").unwrap(), FileFormat::Json);
        assert_eq!(detect_format("retrieval.json5").unwrap(), FileFormat::Json5);
        assert!(detect_format("retrieval.txt").is_err());
        assert!(detect_format("retrieval").is_err());
    }

    #[test]
    fn test_substitute_env_vars() {
        // SAFETY: test-local variable name, not read concurrently elsewhere
        unsafe { std::env::set_var("SIFT_TEST_MODEL_NAME", "hyde-model") };
        let out = substitute_env_vars("model = \"${SIFT_TEST_MODEL_NAME}\" # $SIFT_TEST_MISSING_VAR").unwrap();
        assert_eq!(out, "model = \"hyde-model\" # $SIFT_TEST_MISSING_VAR");
    }

    #[test]
    fn test_from_str_toml() {
        let toml = r#"
name = "local"

[cache]
max_entries = 128
"#;
        let config: TestConfig = from_str(toml, FileFormat::Toml).unwrap();
        assert_eq!(config.name, "local");
        assert_eq!(config.cache.max_entries, 128);
    }

    #[test]
    fn test_load_config_from_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "name: from-file\ncache:\n  max_entries: 64").unwrap();

        let config: TestConfig = load_with_env(file.path(), "SIFT_TEST_UNUSED_PREFIX").unwrap();
        assert_eq!(config.name, "from-file");
        assert_eq!(config.cache.max_entries, 64);
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config::<TestConfig>("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
