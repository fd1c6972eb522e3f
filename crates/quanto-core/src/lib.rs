//! Core library for receipt scanning.
//!
//! This crate provides:
//! - Document loading with content sniffing (PNG, JPEG, PDF)
//! - An Azure Document Intelligence client for the `prebuilt-receipt` model
//! - Receipt field extraction from the service's field tree
//! - Batch orchestration with retries, timeouts, and failure policies
//! - Flattening of receipts into a row-per-line-item table

pub mod analysis;
pub mod batch;
pub mod error;
pub mod models;
pub mod ocr;
pub mod present;
pub mod receipt;

pub use analysis::{AnalyzeResult, AnalyzedDocument, DocumentField, FieldKind};
pub use batch::{AnalyzedReceipt, BatchEvent, BatchInput, BatchOrchestrator, BatchReport, DocumentFailure, Session};
pub use error::{ConfigError, DocumentError, ExtractionError, OcrError, QuantoError, Result};
pub use models::config::{AzureConfig, AzureCredentials, BatchConfig, FailurePolicy, RetryConfig, ScannerConfig};
pub use models::document::{Document, DocumentKind, UnreadableDocument};
pub use models::receipt::{LineItem, ReceiptRecord};
pub use ocr::{AzureReceiptClient, ReceiptAnalyzer};
pub use present::{LineItemRow, flatten};
pub use receipt::{ReceiptExtractor, extract_receipt};
