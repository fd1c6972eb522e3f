//! Receipt data models.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Fields extracted from one analyzed receipt.
///
/// Every member is optional except `items`, which is empty when the receipt
/// carries no itemized list. Absent values serialize as `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptRecord {
    /// Merchant name as printed on the receipt.
    pub merchant_name: Option<String>,

    /// Merchant address as recognized text.
    pub merchant_address: Option<String>,

    /// Date of the transaction.
    pub transaction_date: Option<NaiveDate>,

    /// Purchased items in receipt order.
    pub items: Vec<LineItem>,

    /// Amount before tax.
    pub subtotal: Option<Decimal>,

    /// Total tax amount.
    pub tax: Option<Decimal>,

    /// Amount paid.
    pub total: Option<Decimal>,
}

/// A single purchased entry on a receipt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Item description.
    pub item_name: Option<String>,

    /// Total price for the line.
    pub item_value: Option<Decimal>,
}

impl LineItem {
    pub fn new(item_name: Option<String>, item_value: Option<Decimal>) -> Self {
        Self {
            item_name,
            item_value,
        }
    }
}

/// Tolerance used when comparing printed totals with computed ones.
const TOTALS_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

impl ReceiptRecord {
    /// True when no field at all was recognized.
    pub fn is_empty(&self) -> bool {
        self.merchant_name.is_none()
            && self.merchant_address.is_none()
            && self.transaction_date.is_none()
            && self.items.is_empty()
            && self.subtotal.is_none()
            && self.tax.is_none()
            && self.total.is_none()
    }

    /// Sum of all priced line items, or `None` when no item has a price.
    pub fn items_total(&self) -> Option<Decimal> {
        self.items
            .iter()
            .filter_map(|item| item.item_value)
            .fold(None, |acc, value| Some(acc.unwrap_or(Decimal::ZERO) + value))
    }

    /// Check the extracted amounts for internal consistency.
    ///
    /// Returns human-readable issues; an empty vector means nothing looked off.
    /// Checks only run when the amounts they compare were recognized.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.merchant_name.is_none() {
            issues.push("Missing merchant name".to_string());
        }

        if self.total.is_none() {
            issues.push("Missing total".to_string());
        }

        if let (Some(items_total), Some(subtotal)) = (self.items_total(), self.subtotal) {
            if (items_total - subtotal).abs() > TOTALS_TOLERANCE {
                issues.push(format!(
                    "Line item total ({}) differs from subtotal ({})",
                    items_total, subtotal
                ));
            }
        }

        if let (Some(subtotal), Some(tax), Some(total)) = (self.subtotal, self.tax, self.total) {
            if (subtotal + tax - total).abs() > TOTALS_TOLERANCE {
                issues.push(format!(
                    "Subtotal ({}) plus tax ({}) differs from total ({})",
                    subtotal, tax, total
                ));
            }
        }

        issues
    }
}
