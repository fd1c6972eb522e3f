//! Configuration structures for the scanning pipeline.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;

/// Environment variable holding the OCR service endpoint.
pub const ENDPOINT_ENV: &str = "AZURE_ENDPOINT";

/// Environment variable holding the OCR service access key.
pub const KEY_ENV: &str = "AZURE_KEY";

/// Main configuration for the quanto pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// OCR service configuration.
    pub azure: AzureConfig,

    /// Batch processing configuration.
    pub batch: BatchConfig,
}

/// Azure Document Intelligence settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AzureConfig {
    /// Resource endpoint, e.g. `https://my-resource.cognitiveservices.azure.com`.
    pub endpoint: Option<String>,

    /// Access key. Prefer the `AZURE_KEY` environment variable.
    pub key: Option<String>,

    /// Analysis model.
    pub model_id: String,

    /// Locale hint passed with every request.
    pub locale: String,

    /// REST API version.
    pub api_version: String,

    /// Delay between polls of a running analysis.
    pub poll_interval_ms: u64,

    /// Maximum number of polls before giving up on a document.
    pub max_polls: u32,

    /// Timeout for a single HTTP request.
    pub request_timeout_secs: u64,
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            key: None,
            model_id: "prebuilt-receipt".to_string(),
            locale: "en-US".to_string(),
            api_version: "2024-11-30".to_string(),
            poll_interval_ms: 1000,
            max_polls: 120,
            request_timeout_secs: 60,
        }
    }
}

impl fmt::Debug for AzureConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureConfig")
            .field("endpoint", &self.endpoint)
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .field("model_id", &self.model_id)
            .field("locale", &self.locale)
            .field("api_version", &self.api_version)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("max_polls", &self.max_polls)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Resolved service credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct AzureCredentials {
    /// Endpoint without a trailing slash.
    pub endpoint: String,
    pub key: String,
}

impl fmt::Debug for AzureCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureCredentials")
            .field("endpoint", &self.endpoint)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl AzureConfig {
    /// Resolve credentials from the process environment, falling back to
    /// values in the config file.
    ///
    /// A `.env` file in the working directory is loaded first.
    pub fn credentials(&self) -> Result<AzureCredentials, ConfigError> {
        if let Some(problem) = dotenv_problem(&dotenvy::dotenv()) {
            warn!("{}", problem);
        }
        self.credentials_with(|name| std::env::var(name).ok())
    }

    /// Resolve credentials using `lookup` in place of the process environment.
    pub fn credentials_with<F>(&self, lookup: F) -> Result<AzureCredentials, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = pick_secret(lookup(ENDPOINT_ENV), self.endpoint.as_deref()).ok_or(
            ConfigError::MissingSecret {
                name: "endpoint",
                env_var: ENDPOINT_ENV,
            },
        )?;
        let key = pick_secret(lookup(KEY_ENV), self.key.as_deref()).ok_or(
            ConfigError::MissingSecret {
                name: "key",
                env_var: KEY_ENV,
            },
        )?;

        if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
            return Err(ConfigError::InvalidEndpoint(endpoint));
        }

        Ok(AzureCredentials {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            key,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn pick_secret(env: Option<String>, file: Option<&str>) -> Option<String> {
    env.map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| file.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()))
}

/// What to do when one document of a batch fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Record the failure and continue with the next document.
    #[default]
    SkipAndReport,
    /// Stop at the first failure and discard completed results.
    Abort,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::SkipAndReport => write!(f, "skip_and_report"),
            FailurePolicy::Abort => write!(f, "abort"),
        }
    }
}

/// Batch processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum number of documents analyzed at the same time.
    pub concurrency: usize,

    /// Handling of per-document failures.
    pub failure_policy: FailurePolicy,

    /// Upper bound for one analysis attempt, upload and polling included.
    pub document_timeout_secs: u64,

    /// Retry settings for transient failures.
    pub retry: RetryConfig,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            failure_policy: FailurePolicy::SkipAndReport,
            document_timeout_secs: 180,
            retry: RetryConfig::default(),
        }
    }
}

impl BatchConfig {
    pub fn document_timeout(&self) -> Duration {
        Duration::from_secs(self.document_timeout_secs)
    }
}

/// Exponential backoff for transient OCR failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per document, the first one included.
    pub max_attempts: u32,

    /// Delay before the first retry.
    pub base_delay_ms: u64,

    /// Multiplier applied to each subsequent delay.
    pub backoff_factor: f64,

    /// Cap on any single delay.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            backoff_factor: 2.0,
            max_delay_ms: 10_000,
        }
    }
}

impl RetryConfig {
    /// No retries at all.
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let delay_ms = self.base_delay_ms as f64 * self.backoff_factor.powi((attempt - 1) as i32);
        Duration::from_millis(delay_ms.min(self.max_delay_ms as f64) as u64)
    }

    /// Whether another attempt is allowed after `attempt` attempts.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts.max(1)
    }
}

/// A `.env` file that exists but could not be loaded. A missing file is
/// not a problem.
fn dotenv_problem<T>(result: &Result<T, dotenvy::Error>) -> Option<String> {
    match result {
        Err(e) if !e.not_found() => Some(format!("Ignoring .env file: {}", e)),
        _ => None,
    }
}

impl ScannerConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::File {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| ConfigError::File {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Load from `path` if given, otherwise from `default_path` when it
    /// exists, otherwise use defaults.
    pub fn load(path: Option<&Path>, default_path: &Path) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None if default_path.exists() => Self::from_file(default_path),
            None => Ok(Self::default()),
        }
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn env<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |name| {
            pairs
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_env_overrides_file() {
        let config = AzureConfig {
            endpoint: Some("https://file.example.com".to_string()),
            key: Some("file-key".to_string()),
            ..AzureConfig::default()
        };
        let creds = config
            .credentials_with(env(&[(ENDPOINT_ENV, "https://env.example.com/"), (KEY_ENV, "env-key")]))
            .unwrap();
        assert_eq!(creds.endpoint, "https://env.example.com");
        assert_eq!(creds.key, "env-key");
    }

    #[test]
    fn test_file_used_when_env_blank() {
        let config = AzureConfig {
            endpoint: Some("https://file.example.com".to_string()),
            key: Some("file-key".to_string()),
            ..AzureConfig::default()
        };
        let creds = config.credentials_with(env(&[(KEY_ENV, "  ")])).unwrap();
        assert_eq!(creds.endpoint, "https://file.example.com");
        assert_eq!(creds.key, "file-key");
    }

    #[test]
    fn test_missing_secrets_are_fatal() {
        let config = AzureConfig::default();
        let err = config.credentials_with(env(&[(KEY_ENV, "k")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingSecret { name: "endpoint", .. }));

        let err = config
            .credentials_with(env(&[(ENDPOINT_ENV, "https://x.example.com")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingSecret { name: "key", .. }));
    }

    #[test]
    fn test_invalid_endpoint() {
        let err = AzureConfig::default()
            .credentials_with(env(&[(ENDPOINT_ENV, "x.example.com"), (KEY_ENV, "k")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEndpoint(_)));
    }

    #[test]
    fn test_debug_redacts_key() {
        let creds = AzureCredentials {
            endpoint: "https://x.example.com".to_string(),
            key: "super-secret".to_string(),
        };
        assert!(!format!("{:?}", creds).contains("super-secret"));

        let config = AzureConfig {
            key: Some("super-secret".to_string()),
            ..AzureConfig::default()
        };
        assert!(!format!("{:?}", config).contains("super-secret"));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: ScannerConfig =
            serde_json::from_str(r#"{"batch": {"failure_policy": "abort"}}"#).unwrap();
        assert_eq!(config.batch.failure_policy, FailurePolicy::Abort);
        assert_eq!(config.batch.concurrency, 1);
        assert_eq!(config.azure.model_id, "prebuilt-receipt");
        assert_eq!(config.azure.locale, "en-US");
    }

    #[test]
    fn test_retry_backoff() {
        let retry = RetryConfig::default();
        assert_eq!(retry.delay_for(1), Duration::from_millis(500));
        assert_eq!(retry.delay_for(2), Duration::from_millis(1000));
        assert_eq!(retry.delay_for(10), Duration::from_millis(10_000));
        assert!(retry.should_retry(2));
        assert!(!retry.should_retry(3));
        assert!(!RetryConfig::disabled().should_retry(1));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = ScannerConfig::default();
        config.batch.concurrency = 4;
        config.save(&path).unwrap();

        let loaded = ScannerConfig::load(None, &path).unwrap();
        assert_eq!(loaded.batch.concurrency, 4);

        let missing = dir.path().join("missing.json");
        let defaults = ScannerConfig::load(None, &missing).unwrap();
        assert_eq!(defaults.batch.concurrency, 1);
        assert!(ScannerConfig::load(Some(&missing), &path).is_err());
    }

    #[test]
    fn test_dotenv_problems() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dotenvy::from_path(dir.path().join(".env"));
        assert_eq!(dotenv_problem(&missing), None);

        let malformed = dir.path().join("malformed.env");
        std::fs::write(&malformed, "=missing key\n").unwrap();
        let problem = dotenv_problem(&dotenvy::from_path(&malformed)).unwrap();
        assert!(problem.starts_with("Ignoring .env file"));
    }
}
