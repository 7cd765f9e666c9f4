use crate::cli::{Cli, OutputFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

const ENV_PREFIX: &str = "VALIDATE_XML_BATCH_";
const APP_NAME: &str = "validate-xml-batch";
const MAX_JOBS: usize = 1000;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub validation: ValidationConfig,
    pub files: FileConfig,
    pub output: OutputConfig,
}

/// Parser and scheduling settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValidationConfig {
    /// Lift libxml2's depth and size limits
    pub allow_large_documents: bool,
    /// Accepted for compatibility; does not change XSD outcomes
    pub validate_dtd: bool,
    /// Files validated at once; 0 means one per CPU
    pub jobs: usize,
}

/// Input discovery settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FileConfig {
    /// File-name glob applied inside directories
    pub pattern: String,
    pub recursive: bool,
}

/// Summary output settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub quiet: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            allow_large_documents: false,
            validate_dtd: false,
            jobs: 1,
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            pattern: "*.xml".to_string(),
            recursive: false,
        }
    }
}

/// Configuration manager for loading and layering configurations
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration with precedence: defaults -> file -> environment -> CLI
    pub async fn load_config(cli: &Cli) -> Result<Config> {
        Self::load_config_with(cli, &SystemEnvProvider).await
    }

    /// Same as `load_config` with a custom environment provider
    pub async fn load_config_with(cli: &Cli, env: &impl EnvProvider) -> Result<Config> {
        // An explicit file must exist; discovered files are optional
        let mut config = match &cli.config {
            Some(config_path) => Self::load_from_file(config_path).await?,
            None => Self::find_config_file(&Self::search_dirs())
                .await?
                .unwrap_or_default(),
        };

        config = Self::apply_environment_overrides_with(env, config)?;
        config = Self::merge_with_cli(config, cli);

        Self::validate_config(&config)?;

        Ok(config)
    }

    /// Load configuration from a file (TOML or JSON)
    pub async fn load_from_file(path: &Path) -> Result<Config> {
        let content = tokio::fs::read_to_string(path).await?;
        debug!(path = %path.display(), "loading configuration file");

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => {
                // Try to parse as TOML first, then JSON
                if let Ok(config) = toml::from_str::<Config>(&content) {
                    Ok(config)
                } else {
                    Ok(serde_json::from_str(&content)?)
                }
            }
        }
    }

    /// Working directory first, then the per-user configuration directory
    fn search_dirs() -> Vec<PathBuf> {
        let mut dirs = vec![PathBuf::from(".")];
        if let Some(config_dir) = dirs::config_dir() {
            dirs.push(config_dir.join(APP_NAME));
        }
        dirs
    }

    /// Load the first configuration file found in `search_dirs`
    pub async fn find_config_file(search_dirs: &[PathBuf]) -> Result<Option<Config>> {
        let config_names = [format!("{APP_NAME}.toml"), format!("{APP_NAME}.json")];

        for dir in search_dirs {
            for name in &config_names {
                let path = dir.join(name);
                if path.is_file() {
                    return Ok(Some(Self::load_from_file(&path).await?));
                }
            }
        }

        Ok(None)
    }

    /// Apply environment variable overrides using the system environment
    pub fn apply_environment_overrides(config: Config) -> Result<Config> {
        Self::apply_environment_overrides_with(&SystemEnvProvider, config)
    }

    /// Apply `VALIDATE_XML_BATCH_*` overrides with a custom environment provider
    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: Config,
    ) -> Result<Config> {
        if let Some(value) = parse_env(env, "LARGE_DOCUMENTS")? {
            config.validation.allow_large_documents = value;
        }
        if let Some(value) = parse_env(env, "VALIDATE_DTD")? {
            config.validation.validate_dtd = value;
        }
        if let Some(value) = parse_env(env, "JOBS")? {
            config.validation.jobs = value;
        }

        if let Some(pattern) = env.get(&format!("{ENV_PREFIX}PATTERN")) {
            config.files.pattern = pattern;
        }
        if let Some(value) = parse_env(env, "RECURSIVE")? {
            config.files.recursive = value;
        }

        if let Some(value) = parse_env(env, "QUIET")? {
            config.output.quiet = value;
        }
        if let Some(format) = env.get(&format!("{ENV_PREFIX}FORMAT")) {
            config.output.format = match format.to_lowercase().as_str() {
                "human" => OutputFormat::Human,
                "json" => OutputFormat::Json,
                _ => {
                    return Err(ConfigError::Environment(format!(
                        "Invalid {ENV_PREFIX}FORMAT value: {}",
                        format
                    )));
                }
            };
        }

        Ok(config)
    }

    /// Merge CLI arguments with configuration (CLI takes precedence)
    ///
    /// Boolean switches can only turn a setting on; absent options leave it unchanged.
    pub fn merge_with_cli(mut config: Config, cli: &Cli) -> Config {
        if cli.large_documents {
            config.validation.allow_large_documents = true;
        }
        if cli.validate_dtd {
            config.validation.validate_dtd = true;
        }
        if let Some(jobs) = cli.jobs {
            config.validation.jobs = jobs;
        }

        if let Some(pattern) = &cli.pattern {
            config.files.pattern = pattern.clone();
        }
        if cli.recursive {
            config.files.recursive = true;
        }

        if let Some(format) = cli.format {
            config.output.format = format;
        }
        if cli.quiet {
            config.output.quiet = true;
        }

        config
    }

    /// Validate configuration values
    pub fn validate_config(config: &Config) -> Result<()> {
        if config.validation.jobs > MAX_JOBS {
            return Err(ConfigError::Validation(format!(
                "Number of jobs cannot exceed {MAX_JOBS}"
            )));
        }

        if config.files.pattern.trim().is_empty() {
            return Err(ConfigError::Validation(
                "File pattern must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Effective worker count; `jobs = 0` means one per CPU
    pub fn effective_jobs(config: &Config) -> usize {
        match config.validation.jobs {
            0 => num_cpus::get(),
            n => n,
        }
    }
}

fn parse_env<T: FromStr>(env: &impl EnvProvider, suffix: &str) -> Result<Option<T>> {
    let key = format!("{ENV_PREFIX}{suffix}");
    match env.get(&key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Environment(format!("Invalid {} value: {}", key, raw))),
        None => Ok(None),
    }
}
