//! Receipt field extraction from analysis results.

mod extractor;

pub use extractor::{ReceiptExtractor, extract_receipt, fields};

use crate::error::ExtractionError;

/// Result type for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractionError>;
