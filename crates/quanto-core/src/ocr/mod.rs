//! OCR service boundary.
//!
//! Recognition happens entirely in a remote service; this module only
//! defines the seam the batch orchestrator calls through and the Azure
//! Document Intelligence client behind it.

mod azure;

pub use azure::{AzureReceiptClient, analyze_url};

use async_trait::async_trait;

use crate::analysis::AnalyzeResult;
use crate::error::OcrError;
use crate::models::document::Document;

/// Submits one document for receipt analysis and waits for the result.
#[async_trait]
pub trait ReceiptAnalyzer: Send + Sync {
    /// Analyze a document, returning the service's field tree.
    async fn analyze(&self, document: &Document) -> Result<AnalyzeResult, OcrError>;

    /// Short name used in logs.
    fn name(&self) -> &str;
}
