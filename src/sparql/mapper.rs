use tracing::warn;

use crate::error::{Result, ScoutError};
use crate::models::{PropertyCategory, PropertyTransaction};
use crate::sparql::client::Binding;

fn required<'a>(row: &'a Binding, var: &str) -> Result<&'a str> {
    row.get(var)
        .map(|v| v.value.as_str())
        .ok_or_else(|| ScoutError::IncompleteRecord(var.to_string()))
}

fn optional(row: &Binding, var: &str) -> String {
    row.get(var).map(|v| v.value.clone()).unwrap_or_default()
}

/// Convert one raw binding row into a transaction.
///
/// `amount`, `date` and `propertyType` are mandatory; their absence
/// aborts the whole search. Every other field defaults to an empty
/// string. An unknown property-type URI maps to `Other` with a warning
/// rather than failing.
pub fn map_row(row: &Binding) -> Result<PropertyTransaction> {
    let amount = required(row, "amount")?;
    // a negative amount is as unusable as an unparseable one
    let price: i64 = amount
        .parse()
        .ok()
        .filter(|p| *p >= 0)
        .ok_or_else(|| ScoutError::IncompleteRecord("amount".to_string()))?;
    let date = required(row, "date")?.to_string();
    let type_uri = required(row, "propertyType")?;

    let category = PropertyCategory::from_uri(type_uri).unwrap_or_else(|| {
        warn!("unknown property type '{}', mapping to 'other'", type_uri);
        PropertyCategory::Other
    });

    Ok(PropertyTransaction {
        price,
        date,
        category,
        paon: optional(row, "paon"),
        saon: optional(row, "saon"),
        street: optional(row, "street"),
        town: optional(row, "town"),
        county: optional(row, "county"),
        postcode: optional(row, "postcode"),
    })
}
