//! Process configuration, collected from environment variables.

use std::env;
use std::fmt;
use std::path::PathBuf;

use pybox_storage::StorageConfig;

/// An error occurred while reading the configuration.
#[derive(Debug)]
pub struct ConfigError {
    missing_var: &'static str,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "missing required environment variable `{}`",
            self.missing_var
        )
    }
}

impl std::error::Error for ConfigError {}

/// The resolved configuration of the app.
#[derive(Clone, Debug)]
pub struct Config {
    /// API key for the OpenAI-compatible model endpoint.
    pub openai_api_key: String,
    /// Overrides the default model name.
    pub openai_model: Option<String>,
    /// Overrides the default API base URL.
    pub openai_base_url: Option<String>,
    /// Bot token for the Telegram surface, if any.
    pub telegram_bot_token: Option<String>,
    /// Blob storage settings. May be incomplete, in which case output
    /// files are kept on the local disk.
    pub storage: StorageConfig,
    /// Directory that receives files the sandbox writes.
    pub output_dir: PathBuf,
}

impl Config {
    /// Collects the configuration from the process environment.
    ///
    /// Only the model API key is required. Everything else falls back
    /// to a sensible default or disables the corresponding feature.
    pub fn from_env() -> Result<Self, ConfigError> {
        let openai_api_key = require_var("OPENAI_API_KEY")?;
        // Absent storage vars become empty strings, which disables blob
        // routing instead of failing.
        let storage = StorageConfig {
            connection_string: read_var("AZURE_STORAGE_CONNECTION_STRING")
                .unwrap_or_default(),
            container: read_var("AZURE_BLOB_CONTAINER_NAME")
                .unwrap_or_default(),
            account_name: read_var("AZURE_STORAGE_ACCOUNT_NAME")
                .unwrap_or_default(),
            account_key: read_var("AZURE_STORAGE_ACCOUNT_KEY")
                .unwrap_or_default(),
        };
        let output_dir = read_var("PYBOX_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| env::temp_dir().join("output"));
        Ok(Self {
            openai_api_key,
            openai_model: read_var("OPENAI_MODEL"),
            openai_base_url: read_var("OPENAI_BASE_URL"),
            telegram_bot_token: read_var("TELEGRAM_BOT_TOKEN"),
            storage,
            output_dir,
        })
    }
}

fn read_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

fn require_var(name: &'static str) -> Result<String, ConfigError> {
    read_var(name).ok_or(ConfigError { missing_var: name })
}
