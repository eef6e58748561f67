use reqwest::Method;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use vigil_core::monitor::PollConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("config is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    pub resources: Vec<ResourceConfig>,
    /// Webhook URLs notified on incident open/close. Empty disables
    /// notification entirely.
    #[serde(default)]
    pub webhooks: Vec<String>,
    #[serde(default = "default_journal")]
    pub journal: PathBuf,
    #[serde(default = "default_http_addr")]
    pub http_addr: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceConfig {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default = "default_success_code")]
    pub success_code: u16,
    /// Seconds between checks in steady state.
    pub check_interval: u64,
    /// Seconds between checks while confirming a transition.
    pub retry_interval: u64,
    /// Consecutive matching checks required to confirm a transition.
    pub max_attempts: u32,
}

fn default_journal() -> PathBuf {
    PathBuf::from("logs/incidents.jsonl")
}

fn default_http_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_success_code() -> u16 {
    200
}

impl MonitorConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.resources.is_empty() {
            return Err(ConfigError::Invalid("no resources configured".to_string()));
        }

        let mut names = HashSet::new();
        for resource in &self.resources {
            if resource.name.is_empty() {
                return Err(ConfigError::Invalid("resource with empty name".to_string()));
            }
            if !names.insert(resource.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate resource name {}",
                    resource.name
                )));
            }
            if resource.check_interval == 0 || resource.retry_interval == 0 {
                return Err(ConfigError::Invalid(format!(
                    "{}: intervals must be positive",
                    resource.name
                )));
            }
            if resource.max_attempts == 0 {
                return Err(ConfigError::Invalid(format!(
                    "{}: max_attempts must be at least 1",
                    resource.name
                )));
            }
            resource.method()?;
        }
        Ok(())
    }
}

impl ResourceConfig {
    pub fn method(&self) -> Result<Method, ConfigError> {
        match self.method.to_uppercase().as_str() {
            "GET" => Ok(Method::GET),
            "HEAD" => Ok(Method::HEAD),
            "POST" => Ok(Method::POST),
            "PUT" => Ok(Method::PUT),
            "DELETE" => Ok(Method::DELETE),
            "OPTIONS" => Ok(Method::OPTIONS),
            "PATCH" => Ok(Method::PATCH),
            other => Err(ConfigError::Invalid(format!("unknown method {other}"))),
        }
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            check_interval: std::time::Duration::from_secs(self.check_interval),
            retry_interval: std::time::Duration::from_secs(self.retry_interval),
            max_attempts: self.max_attempts,
        }
    }
}
