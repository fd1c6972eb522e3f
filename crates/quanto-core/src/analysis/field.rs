//! A single node of the analysis field tree and its typed readers.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

/// Declared type of a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKind {
    String,
    Date,
    Time,
    PhoneNumber,
    Number,
    Integer,
    SelectionMark,
    CountryRegion,
    Signature,
    Currency,
    Address,
    Boolean,
    Array,
    Object,
    /// A type this client does not know.
    #[serde(other)]
    Other,
}

/// A named field in an analyzed document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentField {
    /// Declared value type, when the service sent one.
    #[serde(rename = "type", default, deserialize_with = "lenient")]
    pub kind: Option<FieldKind>,

    #[serde(default, deserialize_with = "lenient")]
    pub value_string: Option<String>,

    #[serde(default, deserialize_with = "lenient")]
    pub value_date: Option<NaiveDate>,

    #[serde(default, deserialize_with = "lenient")]
    pub value_number: Option<f64>,

    #[serde(default, deserialize_with = "lenient")]
    pub value_currency: Option<CurrencyValue>,

    #[serde(default, deserialize_with = "lenient_elements")]
    pub value_array: Option<Vec<DocumentField>>,

    #[serde(default, deserialize_with = "lenient")]
    pub value_object: Option<HashMap<String, DocumentField>>,

    /// Text the value was recognized from.
    #[serde(default, deserialize_with = "lenient")]
    pub content: Option<String>,

    #[serde(default, deserialize_with = "lenient")]
    pub confidence: Option<f32>,
}

/// Monetary amount with optional currency information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyValue {
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub amount: Option<Decimal>,

    #[serde(default, deserialize_with = "lenient")]
    pub currency_symbol: Option<String>,

    /// ISO 4217 code.
    #[serde(default, deserialize_with = "lenient")]
    pub currency_code: Option<String>,
}

impl DocumentField {
    /// Whether the field may be read as `expected`.
    ///
    /// A field with no declared type is read by shape alone.
    fn declares(&self, expected: FieldKind) -> bool {
        self.kind.is_none_or(|kind| kind == expected)
    }

    /// String value of a `string` field.
    pub fn as_string(&self) -> Option<&str> {
        if !self.declares(FieldKind::String) {
            return None;
        }
        self.value_string.as_deref()
    }

    /// Date value of a `date` field.
    pub fn as_date(&self) -> Option<NaiveDate> {
        if !self.declares(FieldKind::Date) {
            return None;
        }
        self.value_date
    }

    /// Amount of a `currency` field.
    pub fn as_currency(&self) -> Option<Decimal> {
        if !self.declares(FieldKind::Currency) {
            return None;
        }
        self.value_currency.as_ref().and_then(|c| c.amount)
    }

    /// Recognized text of any field, whatever its type.
    pub fn as_content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    /// Elements of an `array` field.
    pub fn as_array(&self) -> Option<&[DocumentField]> {
        if !self.declares(FieldKind::Array) {
            return None;
        }
        self.value_array.as_deref()
    }

    /// Named members of an `object` field.
    pub fn as_object(&self) -> Option<&HashMap<String, DocumentField>> {
        if !self.declares(FieldKind::Object) {
            return None;
        }
        self.value_object.as_ref()
    }

    /// Member `name` of an `object` field.
    pub fn member(&self, name: &str) -> Option<&DocumentField> {
        self.as_object().and_then(|members| members.get(name))
    }
}

/// Decode `T`, yielding `None` when the JSON shape does not fit.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| T::deserialize(v).ok()))
}

/// Decode an array element by element so one odd element does not drop the
/// others; an element that is not a field object becomes an empty field.
fn lenient_elements<'de, D>(deserializer: D) -> Result<Option<Vec<DocumentField>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Array(elements)) => Some(
            elements
                .into_iter()
                .map(|e| DocumentField::deserialize(e).unwrap_or_default())
                .collect(),
        ),
        _ => None,
    })
}

/// Decode an amount from a JSON number or numeric string without going
/// through binary floating point.
fn lenient_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => parse_decimal(&n.to_string()),
        Some(serde_json::Value::String(s)) => parse_decimal(s.trim()),
        _ => None,
    })
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}
