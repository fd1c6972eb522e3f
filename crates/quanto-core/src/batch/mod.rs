//! Batch orchestration: analyze a list of documents in order.

mod session;

pub use session::Session;

use std::pin::pin;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use futures_util::stream;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::{OcrError, QuantoError};
use crate::models::config::{BatchConfig, FailurePolicy};
use crate::models::document::{Document, UnreadableDocument};
use crate::models::receipt::ReceiptRecord;
use crate::ocr::ReceiptAnalyzer;
use crate::receipt::ReceiptExtractor;

/// A successfully analyzed document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyzedReceipt {
    /// 1-based position of the document in the batch.
    pub position: usize,
    pub name: String,
    pub record: ReceiptRecord,
}

/// A document that could not be analyzed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentFailure {
    /// 1-based position of the document in the batch.
    pub position: usize,
    pub name: String,
    pub error: String,
    /// Whether the last error was transient.
    pub retryable: bool,
}

/// Outcome of one batch run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    /// Policy the batch ran under.
    pub policy: FailurePolicy,

    /// Number of documents submitted.
    pub submitted: usize,

    /// Successful documents in input order.
    pub receipts: Vec<AnalyzedReceipt>,

    /// Failed documents in input order.
    pub failures: Vec<DocumentFailure>,

    /// True when the batch stopped early under [`FailurePolicy::Abort`].
    pub aborted: bool,

    /// Wall-clock duration of the run.
    pub elapsed_ms: u64,
}

impl BatchReport {
    /// An empty report for a batch with no documents.
    pub fn empty(policy: FailurePolicy) -> Self {
        Self {
            policy,
            submitted: 0,
            receipts: Vec::new(),
            failures: Vec::new(),
            aborted: false,
            elapsed_ms: 0,
        }
    }

    /// Extracted records in input order.
    pub fn records(&self) -> impl Iterator<Item = &ReceiptRecord> {
        self.receipts.iter().map(|r| &r.record)
    }

    /// Whether every submitted document produced a record.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.receipts.len() == self.submitted
    }
}

/// Progress notification for one finished document.
#[derive(Debug, Clone, Copy)]
pub struct BatchEvent<'a> {
    pub position: usize,
    pub total: usize,
    pub name: &'a str,
    pub succeeded: bool,
}

/// One submitted entry of a batch.
#[derive(Debug, Clone, Copy)]
pub enum BatchInput<'a> {
    /// A loaded document, sent to the analyzer.
    Document(&'a Document),
    /// A file that could not be loaded. It fails at its position under the
    /// batch's failure policy without reaching the analyzer.
    Unreadable(&'a UnreadableDocument),
}

impl<'a> BatchInput<'a> {
    pub fn name(&self) -> &'a str {
        match self {
            BatchInput::Document(document) => &document.name,
            BatchInput::Unreadable(unreadable) => &unreadable.name,
        }
    }
}

impl<'a> From<&'a Result<Document, UnreadableDocument>> for BatchInput<'a> {
    fn from(loaded: &'a Result<Document, UnreadableDocument>) -> Self {
        match loaded {
            Ok(document) => BatchInput::Document(document),
            Err(unreadable) => BatchInput::Unreadable(unreadable),
        }
    }
}

/// Runs the OCR analyzer and the receipt extractor over a batch.
pub struct BatchOrchestrator<A: ReceiptAnalyzer> {
    analyzer: A,
    extractor: ReceiptExtractor,
    config: BatchConfig,
}

impl<A: ReceiptAnalyzer> BatchOrchestrator<A> {
    pub fn new(analyzer: A, config: BatchConfig) -> Self {
        Self {
            analyzer,
            extractor: ReceiptExtractor::new(),
            config,
        }
    }

    /// Analyze all documents and return one outcome per document.
    pub async fn run(&self, documents: &[Document]) -> BatchReport {
        self.run_with_progress(documents, |_| {}).await
    }

    /// Like [`run`](Self::run), calling `on_event` as each document finishes.
    ///
    /// Events arrive in input order even when documents are analyzed
    /// concurrently.
    pub async fn run_with_progress<F>(&self, documents: &[Document], on_event: F) -> BatchReport
    where
        F: FnMut(BatchEvent<'_>),
    {
        let inputs: Vec<BatchInput<'_>> = documents.iter().map(BatchInput::Document).collect();
        self.run_inputs(&inputs, on_event).await
    }

    /// Run a batch in which some submitted files may have failed to load.
    ///
    /// Unreadable entries are reported at their position like any other
    /// failed document.
    pub async fn run_inputs<F>(&self, inputs: &[BatchInput<'_>], mut on_event: F) -> BatchReport
    where
        F: FnMut(BatchEvent<'_>),
    {
        let start = Instant::now();
        let total = inputs.len();
        let policy = self.config.failure_policy;
        let mut report = BatchReport::empty(policy);
        report.submitted = total;

        info!(
            "Analyzing {} documents with {} ({} at a time, policy {})",
            total,
            self.analyzer.name(),
            self.config.concurrency.max(1),
            policy
        );

        let mut outcomes = pin!(
            stream::iter(inputs.iter().enumerate())
                .map(|(index, input)| async move {
                    let result = match input {
                        BatchInput::Document(document) => self
                            .process(document)
                            .await
                            .map_err(|e| (e.to_string(), e.is_retryable())),
                        BatchInput::Unreadable(unreadable) => {
                            Err((unreadable.error.to_string(), false))
                        }
                    };
                    (index + 1, input.name(), result)
                })
                .buffered(self.config.concurrency.max(1))
        );

        while let Some((position, name, result)) = outcomes.next().await {
            on_event(BatchEvent {
                position,
                total,
                name,
                succeeded: result.is_ok(),
            });

            match result {
                Ok(record) => {
                    report.receipts.push(AnalyzedReceipt {
                        position,
                        name: name.to_string(),
                        record,
                    });
                }
                Err((error, retryable)) => {
                    let failure = DocumentFailure {
                        position,
                        name: name.to_string(),
                        error,
                        retryable,
                    };
                    match policy {
                        FailurePolicy::SkipAndReport => {
                            warn!("Skipping document {} ({}): {}", position, name, failure.error);
                            report.failures.push(failure);
                        }
                        FailurePolicy::Abort => {
                            error!("Aborting batch at document {} ({}): {}", position, name, failure.error);
                            report.receipts.clear();
                            report.failures.push(failure);
                            report.aborted = true;
                            break;
                        }
                    }
                }
            }
        }

        report.elapsed_ms = start.elapsed().as_millis() as u64;
        info!(
            "Batch finished in {}ms: {} succeeded, {} failed",
            report.elapsed_ms,
            report.receipts.len(),
            report.failures.len()
        );
        report
    }

    /// Analyze and extract one document, retrying transient OCR failures.
    async fn process(&self, document: &Document) -> Result<ReceiptRecord, QuantoError> {
        let retry = &self.config.retry;
        let timeout = self.config.document_timeout();
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!("Analyzing {} (attempt {})", document.name, attempt);

            let result = match tokio::time::timeout(timeout, self.analyzer.analyze(document)).await {
                Ok(result) => result,
                Err(_) => Err(OcrError::Timeout(timeout.as_secs())),
            };

            match result {
                Ok(analysis) => return Ok(self.extractor.extract(&analysis)?),
                Err(e) if e.is_retryable() && retry.should_retry(attempt) => {
                    let delay = retry_delay(&e, retry.delay_for(attempt));
                    warn!(
                        "Attempt {} for {} failed ({}), retrying in {:?}",
                        attempt, document.name, e, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Honor a server-provided `Retry-After` when it asks for a longer wait.
fn retry_delay(error: &OcrError, backoff: Duration) -> Duration {
    match error {
        OcrError::Throttled {
            retry_after_secs: Some(secs),
        } => backoff.max(Duration::from_secs(*secs)),
        _ => backoff,
    }
}
