//! Flattening receipts into a row-per-line-item table.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::receipt::ReceiptRecord;

/// Column headers, in display order.
pub const COLUMNS: [&str; 5] = [
    "item_name",
    "item_value",
    "merchant_name",
    "merchant_address",
    "transaction_date",
];

/// One line item annotated with its receipt's merchant and date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineItemRow {
    pub item_name: Option<String>,
    pub item_value: Option<Decimal>,
    pub merchant_name: Option<String>,
    pub merchant_address: Option<String>,
    pub transaction_date: Option<NaiveDate>,
}

impl LineItemRow {
    /// Cell values in [`COLUMNS`] order; absent values are empty strings.
    pub fn cells(&self) -> [String; 5] {
        [
            self.item_name.clone().unwrap_or_default(),
            self.item_value.map(|v| v.to_string()).unwrap_or_default(),
            self.merchant_name.clone().unwrap_or_default(),
            self.merchant_address.clone().unwrap_or_default(),
            self.transaction_date.map(|d| d.to_string()).unwrap_or_default(),
        ]
    }
}

/// One row per line item, in record order then item order.
///
/// Receipts without line items contribute no rows, so their totals do not
/// appear in the table; they remain visible in the raw record dump.
pub fn flatten<'a, I>(records: I) -> Vec<LineItemRow>
where
    I: IntoIterator<Item = &'a ReceiptRecord>,
{
    records
        .into_iter()
        .flat_map(|record| {
            record.items.iter().map(move |item| LineItemRow {
                item_name: item.item_name.clone(),
                item_value: item.item_value,
                merchant_name: record.merchant_name.clone(),
                merchant_address: record.merchant_address.clone(),
                transaction_date: record.transaction_date,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::receipt::LineItem;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_receipt_without_items_adds_no_rows() {
        let grocer = ReceiptRecord {
            merchant_name: Some("Grocer".to_string()),
            merchant_address: Some("1 Market St".to_string()),
            transaction_date: NaiveDate::from_ymd_opt(2024, 2, 2),
            items: vec![
                LineItem::new(Some("Apples".to_string()), Some(Decimal::new(299, 2))),
                LineItem::new(Some("Pears".to_string()), None),
            ],
            ..ReceiptRecord::default()
        };
        let parking = ReceiptRecord {
            merchant_name: Some("Parking".to_string()),
            total: Some(Decimal::new(500, 2)),
            ..ReceiptRecord::default()
        };

        let rows = flatten([&grocer, &parking]);

        assert_eq!(rows.len(), 2);
        for row in &rows {
            assert_eq!(row.merchant_name.as_deref(), Some("Grocer"));
            assert_eq!(row.merchant_address.as_deref(), Some("1 Market St"));
            assert_eq!(row.transaction_date, NaiveDate::from_ymd_opt(2024, 2, 2));
        }
        assert_eq!(rows[0].item_name.as_deref(), Some("Apples"));
        assert_eq!(rows[1].item_name.as_deref(), Some("Pears"));
    }

    #[test]
    fn test_empty_batch_yields_empty_table() {
        assert!(flatten(&Vec::<ReceiptRecord>::new()).is_empty());
        assert!(flatten([&ReceiptRecord::default()]).is_empty());
    }

    #[test]
    fn test_cells() {
        let row = LineItemRow {
            item_name: Some("Latte".to_string()),
            item_value: Some(Decimal::new(450, 2)),
            merchant_name: Some("Cafe Roma".to_string()),
            merchant_address: None,
            transaction_date: NaiveDate::from_ymd_opt(2024, 3, 1),
        };
        assert_eq!(
            row.cells(),
            [
                "Latte".to_string(),
                "4.50".to_string(),
                "Cafe Roma".to_string(),
                String::new(),
                "2024-03-01".to_string(),
            ]
        );
    }
}
