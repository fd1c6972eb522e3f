//! Error types for the quanto-core library.

use thiserror::Error;

/// Main error type for the quanto library.
#[derive(Error, Debug)]
pub enum QuantoError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Document loading error.
    #[error("document error: {0}")]
    Document(#[from] DocumentError),

    /// OCR service error.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// Receipt extraction error.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl QuantoError {
    /// Whether a later attempt at the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            QuantoError::Ocr(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Errors raised while resolving configuration. These are fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required secret is not set anywhere.
    #[error("missing required secret {name} (set {env_var} or azure.{name} in the config file)")]
    MissingSecret {
        name: &'static str,
        env_var: &'static str,
    },

    /// The endpoint is not an http(s) URL.
    #[error("invalid endpoint URL: {0}")]
    InvalidEndpoint(String),

    /// The config file could not be read or parsed.
    #[error("failed to load config file {path}: {reason}")]
    File { path: String, reason: String },
}

/// Errors related to reading user-supplied documents.
#[derive(Error, Debug)]
pub enum DocumentError {
    /// The file could not be read.
    #[error("could not read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The file extension is not one of png, jpg, jpeg, pdf.
    #[error("unsupported document type: {0}")]
    Unsupported(String),

    /// The file content does not match its extension.
    #[error("{name} does not look like a {expected} file")]
    ContentMismatch { name: String, expected: String },

    /// The file is empty.
    #[error("{0} is empty")]
    Empty(String),
}

/// Errors reported by the OCR service boundary.
#[derive(Error, Debug)]
pub enum OcrError {
    /// Network failure before a response was received.
    #[error("transport error: {message}")]
    Transport { message: String, retryable: bool },

    /// The service refused the credentials.
    #[error("authentication failed ({status}): check the endpoint and key")]
    Auth { status: u16 },

    /// The service rejected the document or request.
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Request quota exceeded.
    #[error("rate limited by the OCR service")]
    Throttled { retry_after_secs: Option<u64> },

    /// The service failed internally.
    #[error("OCR service error ({status}): {message}")]
    Service { status: u16, message: String },

    /// The asynchronous analysis finished with status `failed`.
    #[error("analysis failed: {code}: {message}")]
    AnalysisFailed { code: String, message: String },

    /// The response could not be decoded.
    #[error("malformed analysis response: {0}")]
    MalformedResponse(String),

    /// The document did not finish within the allowed time.
    #[error("timed out after {0}s")]
    Timeout(u64),
}

impl OcrError {
    /// Whether the failure is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            OcrError::Transport { retryable, .. } => *retryable,
            OcrError::Throttled { .. } | OcrError::Service { .. } | OcrError::Timeout(_) => true,
            OcrError::Auth { .. }
            | OcrError::Rejected { .. }
            | OcrError::AnalysisFailed { .. }
            | OcrError::MalformedResponse(_) => false,
        }
    }
}

/// Errors related to receipt field extraction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// The analysis succeeded but recognized no receipt.
    #[error("no receipt recognized in document")]
    NoDocument,
}

/// Result type for the quanto library.
pub type Result<T> = std::result::Result<T, QuantoError>;
