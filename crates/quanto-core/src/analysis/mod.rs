//! Document analysis results as returned by the OCR service.
//!
//! The service answers with a tree of named fields. Each field declares a
//! `type` and carries at most one typed `value*` member plus the raw
//! recognized `content`. Typed members are decoded leniently: a member whose
//! JSON shape does not match is dropped to `None` instead of failing the
//! whole response, so only a broken top-level envelope is an error.

mod field;

pub use field::{CurrencyValue, DocumentField, FieldKind};

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::OcrError;

/// Result of analyzing one submitted file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResult {
    /// API version that produced the result.
    #[serde(default)]
    pub api_version: Option<String>,

    /// Model used for the analysis.
    #[serde(default)]
    pub model_id: Option<String>,

    /// Full recognized text.
    #[serde(default)]
    pub content: Option<String>,

    /// Recognized documents; a single file may contain several receipts.
    #[serde(default)]
    documents: Option<Vec<AnalyzedDocument>>,
}

impl AnalyzeResult {
    /// Decode a result from its JSON form.
    pub fn from_json(json: &str) -> Result<Self, OcrError> {
        serde_json::from_str(json).map_err(|e| OcrError::MalformedResponse(e.to_string()))
    }

    /// Decode a result from an already parsed JSON value.
    pub fn from_value(value: serde_json::Value) -> Result<Self, OcrError> {
        serde_json::from_value(value).map_err(|e| OcrError::MalformedResponse(e.to_string()))
    }

    /// Build a result holding the given documents.
    pub fn with_documents(documents: Vec<AnalyzedDocument>) -> Self {
        Self {
            documents: Some(documents),
            ..Self::default()
        }
    }

    /// Recognized documents, empty when the service found none.
    pub fn documents(&self) -> &[AnalyzedDocument] {
        self.documents.as_deref().unwrap_or(&[])
    }
}

/// One recognized document with its named fields.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzedDocument {
    /// Document type, e.g. `receipt.retailMeal`.
    #[serde(default)]
    pub doc_type: Option<String>,

    /// Confidence that the document type is correct.
    #[serde(default)]
    pub confidence: Option<f32>,

    #[serde(default)]
    fields: Option<HashMap<String, DocumentField>>,
}

impl AnalyzedDocument {
    /// Build a document from named fields.
    pub fn with_fields(fields: HashMap<String, DocumentField>) -> Self {
        Self {
            fields: Some(fields),
            ..Self::default()
        }
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&DocumentField> {
        self.fields.as_ref().and_then(|fields| fields.get(name))
    }

    /// Number of fields present.
    pub fn field_count(&self) -> usize {
        self.fields.as_ref().map_or(0, HashMap::len)
    }
}
