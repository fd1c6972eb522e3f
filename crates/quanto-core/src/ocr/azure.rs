//! Azure AI Document Intelligence client for the receipt model.
//!
//! Analysis is asynchronous on the service side: the document is posted to
//! `documentModels/{model}:analyze`, the reply carries an
//! `Operation-Location` URL, and that URL is polled until the operation
//! succeeds or fails.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info};

use crate::analysis::AnalyzeResult;
use crate::error::OcrError;
use crate::models::config::{AzureConfig, AzureCredentials};
use crate::models::document::Document;

use super::ReceiptAnalyzer;

const KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const OPERATION_LOCATION: &str = "Operation-Location";

/// Client for `prebuilt-receipt` analysis.
pub struct AzureReceiptClient {
    http: Client,
    credentials: AzureCredentials,
    config: AzureConfig,
}

impl AzureReceiptClient {
    /// Create a client with resolved credentials.
    pub fn new(credentials: AzureCredentials, config: AzureConfig) -> Result<Self, OcrError> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| OcrError::Transport {
                message: format!("failed to build HTTP client: {}", e),
                retryable: false,
            })?;

        Ok(Self {
            http,
            credentials,
            config,
        })
    }

    /// Upload the document and return the operation URL to poll with the
    /// wait before the first poll.
    async fn submit(&self, document: &Document) -> Result<(String, Duration), OcrError> {
        let url = analyze_url(&self.credentials.endpoint, &self.config);
        debug!("Submitting {} ({} bytes) to {}", document.name, document.len(), url);

        let response = self
            .http
            .post(&url)
            .header(KEY_HEADER, &self.credentials.key)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(document.bytes.clone())
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let headers = response.headers().clone();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(status, &headers, &body));
        }

        let operation_url = headers
            .get(OPERATION_LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .ok_or_else(|| {
                OcrError::MalformedResponse(format!("no {} header in response", OPERATION_LOCATION))
            })?;
        Ok((operation_url, next_wait(&headers, self.config.poll_interval())))
    }

    /// Poll the operation until it reaches a terminal state.
    async fn poll(
        &self,
        operation_url: &str,
        first_wait: Duration,
    ) -> Result<AnalyzeResult, OcrError> {
        let mut wait = first_wait;
        let mut waited = Duration::ZERO;

        for poll in 1..=self.config.max_polls {
            tokio::time::sleep(wait).await;
            waited += wait;

            let response = self
                .http
                .get(operation_url)
                .header(KEY_HEADER, &self.credentials.key)
                .send()
                .await
                .map_err(transport_error)?;

            let status = response.status();
            let headers = response.headers().clone();
            let body = response.text().await.map_err(transport_error)?;
            if !status.is_success() {
                return Err(error_for_status(status, &headers, &body));
            }

            match parse_operation(&body)? {
                PollOutcome::Done(result) => {
                    debug!("Analysis finished after {} polls", poll);
                    return Ok(result);
                }
                PollOutcome::Pending(state) => {
                    debug!("Analysis {} (poll {}/{})", state, poll, self.config.max_polls);
                    wait = next_wait(&headers, self.config.poll_interval());
                }
            }
        }

        Err(OcrError::Timeout(waited.as_secs()))
    }
}

#[async_trait]
impl ReceiptAnalyzer for AzureReceiptClient {
    async fn analyze(&self, document: &Document) -> Result<AnalyzeResult, OcrError> {
        let (operation_url, first_wait) = self.submit(document).await?;
        let result = self.poll(&operation_url, first_wait).await?;
        info!(
            "Analyzed {}: {} document(s) recognized",
            document.name,
            result.documents().len()
        );
        Ok(result)
    }

    fn name(&self) -> &str {
        "azure-document-intelligence"
    }
}

/// URL for starting an analysis.
pub fn analyze_url(endpoint: &str, config: &AzureConfig) -> String {
    format!(
        "{}/documentintelligence/documentModels/{}:analyze?api-version={}&locale={}",
        endpoint.trim_end_matches('/'),
        config.model_id,
        config.api_version,
        config.locale
    )
}

/// Long-running operation state as returned by the poll endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeOperation {
    status: OperationStatus,
    #[serde(default)]
    analyze_result: Option<AnalyzeResult>,
    #[serde(default)]
    error: Option<ServiceError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
enum OperationStatus {
    NotStarted,
    Running,
    Succeeded,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: Option<ServiceError>,
}

#[derive(Debug, Default, Deserialize)]
struct ServiceError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug)]
enum PollOutcome {
    Done(AnalyzeResult),
    Pending(&'static str),
}

fn parse_operation(body: &str) -> Result<PollOutcome, OcrError> {
    let operation: AnalyzeOperation =
        serde_json::from_str(body).map_err(|e| OcrError::MalformedResponse(e.to_string()))?;

    match operation.status {
        OperationStatus::Succeeded => operation
            .analyze_result
            .map(PollOutcome::Done)
            .ok_or_else(|| OcrError::MalformedResponse("succeeded without analyzeResult".to_string())),
        OperationStatus::Failed | OperationStatus::Canceled => {
            let error = operation.error.unwrap_or_default();
            Err(OcrError::AnalysisFailed {
                code: error.code.unwrap_or_else(|| format!("{:?}", operation.status)),
                message: error.message.unwrap_or_else(|| "unknown error".to_string()),
            })
        }
        OperationStatus::NotStarted => Ok(PollOutcome::Pending("not started")),
        OperationStatus::Running => Ok(PollOutcome::Pending("running")),
        OperationStatus::Unknown => Ok(PollOutcome::Pending("in unknown state")),
    }
}

fn retry_after(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

/// Wait before the next poll: the server's `Retry-After` when present,
/// otherwise the configured interval.
fn next_wait(headers: &HeaderMap, interval: Duration) -> Duration {
    retry_after(headers)
        .map(Duration::from_secs)
        .unwrap_or(interval)
}

fn error_message(body: &str) -> String {
    let envelope: ErrorEnvelope = serde_json::from_str(body).unwrap_or_default();
    match envelope.error {
        Some(ServiceError { code, message }) => match (code, message) {
            (Some(code), Some(message)) => format!("{}: {}", code, message),
            (Some(text), None) | (None, Some(text)) => text,
            (None, None) => String::new(),
        },
        None => body.trim().chars().take(300).collect(),
    }
}

/// Map a non-success HTTP status to an error.
fn error_for_status(status: StatusCode, headers: &HeaderMap, body: &str) -> OcrError {
    let message = error_message(body);
    let message = if message.is_empty() {
        status.canonical_reason().unwrap_or("no details").to_string()
    } else {
        message
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => OcrError::Auth {
            status: status.as_u16(),
        },
        StatusCode::TOO_MANY_REQUESTS => OcrError::Throttled {
            retry_after_secs: retry_after(headers),
        },
        s if s.is_server_error() => OcrError::Service {
            status: s.as_u16(),
            message,
        },
        s => OcrError::Rejected {
            status: s.as_u16(),
            message,
        },
    }
}

fn transport_error(e: reqwest::Error) -> OcrError {
    if e.is_decode() {
        return OcrError::MalformedResponse(e.to_string());
    }
    OcrError::Transport {
        message: if e.is_connect() {
            "could not connect to the OCR service, check your internet connection".to_string()
        } else {
            e.to_string()
        },
        retryable: e.is_connect() || e.is_timeout(),
    }
}
