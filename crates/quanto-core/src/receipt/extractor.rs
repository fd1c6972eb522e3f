//! Maps the `prebuilt-receipt` field tree onto [`ReceiptRecord`].

use tracing::{debug, warn};

use crate::analysis::{AnalyzeResult, AnalyzedDocument, DocumentField};
use crate::error::ExtractionError;
use crate::models::receipt::{LineItem, ReceiptRecord};

use super::Result;

/// Field names of the receipt model.
pub mod fields {
    pub const MERCHANT_NAME: &str = "MerchantName";
    pub const MERCHANT_ADDRESS: &str = "MerchantAddress";
    pub const TRANSACTION_DATE: &str = "TransactionDate";
    pub const ITEMS: &str = "Items";
    pub const ITEM_DESCRIPTION: &str = "Description";
    pub const ITEM_TOTAL_PRICE: &str = "TotalPrice";
    pub const SUBTOTAL: &str = "Subtotal";
    pub const TOTAL_TAX: &str = "TotalTax";
    pub const TOTAL: &str = "Total";
}

/// Extracts a [`ReceiptRecord`] from an analysis result.
///
/// Every field is optional: a missing or mistyped field becomes `None` and
/// never fails the extraction. The only failure is a result that contains
/// no recognized document at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReceiptExtractor;

impl ReceiptExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract the first recognized receipt.
    ///
    /// When one file holds several receipts, the first one is returned as
    /// is; later ones are logged and ignored, never merged into it or
    /// allowed to replace it.
    pub fn extract(&self, result: &AnalyzeResult) -> Result<ReceiptRecord> {
        let documents = result.documents();
        let document = documents.first().ok_or(ExtractionError::NoDocument)?;

        if documents.len() > 1 {
            warn!(
                "Analysis recognized {} receipts in one file, using the first and ignoring {}",
                documents.len(),
                documents.len() - 1
            );
        }

        let record = self.extract_document(document);
        debug!(
            "Extracted receipt: merchant={:?}, {} items, total={:?}",
            record.merchant_name,
            record.items.len(),
            record.total
        );
        Ok(record)
    }

    /// Extract the fields of a single recognized document.
    pub fn extract_document(&self, document: &AnalyzedDocument) -> ReceiptRecord {
        let field = |name: &str| document.field(name);

        ReceiptRecord {
            merchant_name: field(fields::MERCHANT_NAME)
                .and_then(DocumentField::as_string)
                .map(String::from),
            merchant_address: field(fields::MERCHANT_ADDRESS)
                .and_then(DocumentField::as_content)
                .map(String::from),
            transaction_date: field(fields::TRANSACTION_DATE).and_then(DocumentField::as_date),
            items: field(fields::ITEMS).map(extract_items).unwrap_or_default(),
            subtotal: field(fields::SUBTOTAL).and_then(DocumentField::as_currency),
            tax: field(fields::TOTAL_TAX).and_then(DocumentField::as_currency),
            total: field(fields::TOTAL).and_then(DocumentField::as_currency),
        }
    }
}

/// One line item per array element, in order. An element that is not an
/// object yields an item with both members absent.
fn extract_items(items: &DocumentField) -> Vec<LineItem> {
    let Some(elements) = items.as_array() else {
        return Vec::new();
    };

    elements
        .iter()
        .map(|element| {
            LineItem::new(
                element
                    .member(fields::ITEM_DESCRIPTION)
                    .and_then(DocumentField::as_string)
                    .map(String::from),
                element
                    .member(fields::ITEM_TOTAL_PRICE)
                    .and_then(DocumentField::as_currency),
            )
        })
        .collect()
}

/// Extract a receipt with the default extractor.
pub fn extract_receipt(result: &AnalyzeResult) -> Result<ReceiptRecord> {
    ReceiptExtractor::new().extract(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use serde_json::json;

    fn result(value: serde_json::Value) -> AnalyzeResult {
        AnalyzeResult::from_value(value).unwrap()
    }

    fn cafe_roma() -> AnalyzeResult {
        result(json!({
            "modelId": "prebuilt-receipt",
            "documents": [{
                "docType": "receipt.retailMeal",
                "fields": {
                    "MerchantName": {"type": "string", "valueString": "Cafe Roma", "content": "CAFE ROMA"},
                    "TransactionDate": {"type": "date", "valueDate": "2024-03-01", "content": "03/01/2024"},
                    "Items": {
                        "type": "array",
                        "valueArray": [{
                            "type": "object",
                            "valueObject": {
                                "Description": {"type": "string", "valueString": "Latte"},
                                "TotalPrice": {"type": "currency", "valueCurrency": {"amount": 4.50, "currencyCode": "USD"}}
                            }
                        }]
                    },
                    "Subtotal": {"type": "currency", "valueCurrency": {"amount": 4.50}},
                    "TotalTax": {"type": "currency", "valueCurrency": {"amount": 0.30}},
                    "Total": {"type": "currency", "valueCurrency": {"amount": 4.80}}
                }
            }]
        }))
    }

    #[test]
    fn test_cafe_roma_receipt() {
        let record = extract_receipt(&cafe_roma()).unwrap();
        assert_eq!(
            record,
            ReceiptRecord {
                merchant_name: Some("Cafe Roma".to_string()),
                merchant_address: None,
                transaction_date: NaiveDate::from_ymd_opt(2024, 3, 1),
                items: vec![LineItem::new(Some("Latte".to_string()), Some(Decimal::new(450, 2)))],
                subtotal: Some(Decimal::new(450, 2)),
                tax: Some(Decimal::new(30, 2)),
                total: Some(Decimal::new(480, 2)),
            }
        );
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let input = cafe_roma();
        let extractor = ReceiptExtractor::new();
        assert_eq!(extractor.extract(&input).unwrap(), extractor.extract(&input).unwrap());
    }

    #[test]
    fn test_items_absent_keeps_other_fields() {
        let record = extract_receipt(&result(json!({
            "documents": [{
                "fields": {
                    "MerchantName": {"type": "string", "valueString": "Corner Shop"},
                    "TransactionDate": {"type": "date", "valueDate": "2024-05-17"},
                    "Total": {"type": "currency", "valueCurrency": {"amount": 12.99}}
                }
            }]
        })))
        .unwrap();

        assert!(record.items.is_empty());
        assert_eq!(record.merchant_name.as_deref(), Some("Corner Shop"));
        assert_eq!(record.transaction_date, NaiveDate::from_ymd_opt(2024, 5, 17));
        assert_eq!(record.total, Some(Decimal::new(1299, 2)));
        assert_eq!(record.subtotal, None);
        assert_eq!(record.tax, None);
    }

    #[test]
    fn test_item_count_and_order_preserved() {
        let names = ["Bread", "Milk", "Eggs", "Coffee"];
        let elements: Vec<_> = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                json!({
                    "type": "object",
                    "valueObject": {
                        "Description": {"type": "string", "valueString": name},
                        "TotalPrice": {"type": "currency", "valueCurrency": {"amount": i + 1}}
                    }
                })
            })
            .collect();
        let record = extract_receipt(&result(json!({
            "documents": [{"fields": {"Items": {"type": "array", "valueArray": elements}}}]
        })))
        .unwrap();

        assert_eq!(record.items.len(), names.len());
        for (i, (item, name)) in record.items.iter().zip(names).enumerate() {
            assert_eq!(item.item_name.as_deref(), Some(name));
            assert_eq!(item.item_value, Some(Decimal::from(i + 1)));
        }
    }

    #[test]
    fn test_item_members_optional() {
        let record = extract_receipt(&result(json!({
            "documents": [{
                "fields": {
                    "Items": {
                        "type": "array",
                        "valueArray": [
                            {"type": "object", "valueObject": {"Description": {"type": "string", "valueString": "Bag"}}},
                            {"type": "object", "valueObject": {"TotalPrice": {"type": "currency", "valueCurrency": {"amount": 0.1}}}},
                            {"type": "object"}
                        ]
                    }
                }
            }]
        })))
        .unwrap();

        assert_eq!(
            record.items,
            vec![
                LineItem::new(Some("Bag".to_string()), None),
                LineItem::new(None, Some(Decimal::new(1, 1))),
                LineItem::new(None, None),
            ]
        );
    }

    #[test]
    fn test_merchant_address_uses_content() {
        let record = extract_receipt(&result(json!({
            "documents": [{
                "fields": {
                    "MerchantAddress": {
                        "type": "address",
                        "content": "123 Main St, Redmond, WA 98052",
                        "valueAddress": {"houseNumber": "123", "road": "Main St"}
                    }
                }
            }]
        })))
        .unwrap();
        assert_eq!(
            record.merchant_address.as_deref(),
            Some("123 Main St, Redmond, WA 98052")
        );
    }

    #[test]
    fn test_mistyped_fields_read_as_absent() {
        let record = extract_receipt(&result(json!({
            "documents": [{
                "fields": {
                    "MerchantName": {"type": "currency", "valueCurrency": {"amount": 1}},
                    "TransactionDate": {"type": "date", "valueDate": "not a date"},
                    "Items": {"type": "string", "valueString": "Latte"},
                    "Total": {"type": "number", "valueNumber": 4.8}
                }
            }]
        })))
        .unwrap();
        assert_eq!(record, ReceiptRecord::default());
    }

    #[test]
    fn test_document_without_fields_is_all_absent() {
        let record = extract_receipt(&result(json!({"documents": [{"docType": "receipt"}]}))).unwrap();
        assert!(record.is_empty());
    }

    #[test]
    fn test_zero_documents_is_an_error() {
        assert_eq!(
            extract_receipt(&result(json!({"documents": []}))),
            Err(ExtractionError::NoDocument)
        );
        assert_eq!(
            extract_receipt(&result(json!({"content": "blurry"}))),
            Err(ExtractionError::NoDocument)
        );
    }

    #[test]
    fn test_first_of_several_documents_is_used() {
        let record = extract_receipt(&result(json!({
            "documents": [
                {"fields": {"MerchantName": {"type": "string", "valueString": "First"}}},
                {"fields": {"MerchantName": {"type": "string", "valueString": "Second"}}}
            ]
        })))
        .unwrap();
        assert_eq!(record.merchant_name.as_deref(), Some("First"));
    }
}
