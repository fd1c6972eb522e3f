//! Data models: receipts, documents, and configuration.

pub mod config;
pub mod document;
pub mod receipt;

pub use config::{AzureConfig, AzureCredentials, BatchConfig, FailurePolicy, RetryConfig, ScannerConfig};
pub use document::{Document, DocumentKind, UnreadableDocument};
pub use receipt::{LineItem, ReceiptRecord};
