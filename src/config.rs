use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::batch_extraction::{SchedulerConfig, SectionSelection};
use crate::pipeline::providers::{ProviderKind, ProviderSettings};
use crate::pipeline::taxonomy::{BuiltinTask, TaskDefinition, TaxonomyError};

/// Application-level constants
pub const APP_NAME: &str = "clinical-extract";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the config file picked up from the data directory when no
/// `--config` is given.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Per-user data directory, if the platform has one.
pub fn app_data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join(APP_NAME))
}

pub fn default_config_path() -> Option<PathBuf> {
    app_data_dir().map(|d| d.join(CONFIG_FILE_NAME))
}

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "warn,clinical_extract=info"
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Unknown task: {0} (expected one of preop, postop, disease-course)")]
    UnknownTask(String),

    #[error("Cannot load task file: {0}")]
    TaskFile(#[from] TaxonomyError),
}

/// Everything one extraction run needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub provider: ProviderKind,
    /// Defaults to the provider's default model.
    pub model: Option<String>,
    /// Used in output file names. Defaults to the provider name.
    pub nickname: Option<String>,
    pub base_url: Option<String>,
    /// Requests per window. `None` uses the provider's published quota, if any.
    pub quota: Option<u32>,
    pub window_secs: u64,
    pub iterations: u32,
    pub case_limit: Option<usize>,
    pub sections: SectionSelection,
    pub temperature: f32,
    /// Context window for the local backend.
    pub num_ctx: u32,
    /// Output token cap for cloud backends.
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Built-in task name; ignored when `task_file` is set.
    pub task: String,
    pub task_file: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Ollama,
            model: None,
            nickname: None,
            base_url: None,
            quota: None,
            window_secs: 60,
            iterations: 3,
            case_limit: None,
            sections: SectionSelection::All,
            temperature: 0.0,
            num_ctx: 32768,
            max_tokens: 1000,
            timeout_secs: 300,
            input_dir: PathBuf::from("cases"),
            output_dir: PathBuf::from("results"),
            task: BuiltinTask::PostOp.as_str().to_string(),
            task_file: None,
        }
    }
}

impl RunConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Config from the data directory if present, defaults otherwise.
    pub fn load_default() -> Result<Self, ConfigError> {
        match default_config_path() {
            Some(path) if path.is_file() => {
                tracing::debug!(path = %path.display(), "Using config from data directory");
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.iterations == 0 {
            return Err(invalid("iterations", "must be at least 1"));
        }
        if self.quota == Some(0) {
            return Err(invalid("quota", "must be at least 1 request per window"));
        }
        if self.window_secs == 0 {
            return Err(invalid("window_secs", "must be at least 1 second"));
        }
        if self.timeout_secs == 0 {
            return Err(invalid("timeout_secs", "must be at least 1 second"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(invalid("temperature", "must be between 0.0 and 2.0"));
        }
        if let SectionSelection::Headings(headings) = &self.sections {
            if headings.iter().all(|h| h.trim().is_empty()) {
                return Err(invalid("sections", "heading list is empty"));
            }
        }
        if self.temperature != 0.0 {
            tracing::warn!(
                temperature = self.temperature,
                "Non-zero temperature: iterations will not be comparable"
            );
        }
        Ok(())
    }

    /// Configured quota, else the provider's published one.
    pub fn effective_quota(&self) -> Option<u32> {
        self.quota.or_else(|| self.provider.default_quota())
    }

    pub fn nickname(&self) -> &str {
        self.nickname
            .as_deref()
            .unwrap_or_else(|| self.provider.as_str())
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            iterations: self.iterations,
            quota: self.effective_quota(),
            window_secs: self.window_secs,
        }
    }

    /// Provider settings with the API key taken from the environment.
    pub fn provider_settings(&self) -> ProviderSettings {
        let api_key = self
            .provider
            .api_key_var()
            .and_then(|var| std::env::var(var).ok());
        self.provider_settings_with_key(api_key)
    }

    pub fn provider_settings_with_key(&self, api_key: Option<String>) -> ProviderSettings {
        ProviderSettings {
            base_url: self
                .base_url
                .clone()
                .unwrap_or_else(|| self.provider.default_base_url().to_string()),
            model: self
                .model
                .clone()
                .unwrap_or_else(|| self.provider.default_model().to_string()),
            nickname: self.nickname().to_string(),
            temperature: self.temperature,
            num_ctx: Some(self.num_ctx),
            max_tokens: self.max_tokens,
            timeout_secs: self.timeout_secs,
            api_key,
        }
    }

    /// Resolve the task: custom file if given, else the named built-in.
    pub fn task_definition(&self) -> Result<TaskDefinition, ConfigError> {
        if let Some(path) = &self.task_file {
            return Ok(TaskDefinition::load(path)?);
        }
        let task = BuiltinTask::from_str(&self.task)
            .ok_or_else(|| ConfigError::UnknownTask(self.task.clone()))?;
        Ok(task.definition()?)
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.to_string(),
    }
}
