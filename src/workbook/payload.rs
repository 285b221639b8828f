//! Rent workbook payload schema
//!
//! The payload is a fixed grid: ten properties (`KN01`..`KN10`), each with
//! exactly twelve month rows. Client payloads arrive as untyped JSON, so the
//! shape is checked on the raw value first to produce precise messages, then
//! deserialized into the typed records the template filler consumes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;
use tracing::{error, info};

/// Template version tag the workbook template understands
pub const TEMPLATE_VERSION: &str = "property_rents_received_v1";

/// Property ids, one worksheet each
pub const PROPERTY_IDS: [&str; 10] = [
    "KN01", "KN02", "KN03", "KN04", "KN05", "KN06", "KN07", "KN08", "KN09", "KN10",
];

/// Marker written wherever source data is absent
pub const MISSING_DATA: &str = "Missing data";

/// Number of month rows per property
pub const MONTHS_PER_YEAR: u32 = 12;

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

const NUMERIC_FIELDS: [&str; 6] = [
    "rent_due",
    "housing_paid",
    "tenant_paid",
    "total_received",
    "month_balance_due",
    "year_balance_due",
];

/// Short English month name for a 1-based month number
pub fn month_abbr(month_number: u32) -> Option<&'static str> {
    month_number
        .checked_sub(1)
        .and_then(|index| MONTH_ABBREVIATIONS.get(index as usize))
        .copied()
}

/// Payload failed the fixed-shape checks
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A validated rent workbook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RentWorkbookPayload {
    /// Always [`TEMPLATE_VERSION`]
    pub template_version: String,
    /// Workbook year
    pub year: i32,
    /// One record per property id
    pub properties: Vec<PropertyRecord>,
}

/// Header and monthly rows for one property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRecord {
    /// One of [`PROPERTY_IDS`]
    pub property_id: String,
    /// Street address
    pub property_address: Option<String>,
    /// Tenant name
    pub tenant_name: Option<String>,
    /// Always 12
    pub period_months: u32,
    /// Month rows, months 1 through 12
    pub rows: Vec<MonthRow>,
}

/// One month of rent activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthRow {
    /// 1-based month number
    pub month_number: u32,
    /// Month label as shown in the sheet
    pub month: String,
    /// Scheduled rent
    pub rent_due: f64,
    /// Paying housing department, if any
    pub housing_dept: Option<String>,
    /// Amount paid by the housing department
    pub housing_paid: f64,
    /// Amount paid by the tenant
    pub tenant_paid: f64,
    /// Total received this month
    pub total_received: f64,
    /// Outstanding balance for the month
    pub month_balance_due: f64,
    /// Running balance for the year
    pub year_balance_due: f64,
    /// Free-form remarks
    pub remarks: String,
}

impl MonthRow {
    /// A zeroed placeholder row for a month without source data
    pub fn missing(month_number: u32) -> Self {
        Self {
            month_number,
            month: month_abbr(month_number).unwrap_or_default().to_string(),
            rent_due: 0.0,
            housing_dept: Some(MISSING_DATA.to_string()),
            housing_paid: 0.0,
            tenant_paid: 0.0,
            total_received: 0.0,
            month_balance_due: 0.0,
            year_balance_due: 0.0,
            remarks: MISSING_DATA.to_string(),
        }
    }
}

impl RentWorkbookPayload {
    /// Download file name for this workbook
    pub fn file_name(&self) -> String {
        format!("Rent_Workbook_{}.xlsx", self.year)
    }
}

/// Check an untyped payload against the schema and convert it
///
/// `context` names where the payload came from and only appears in logs.
pub fn validate(
    value: &Value,
    expected_year: i32,
    context: &str,
) -> Result<RentWorkbookPayload, ValidationError> {
    let result = check_shape(value, expected_year).and_then(|()| {
        serde_json::from_value::<RentWorkbookPayload>(with_integral_counts(value, expected_year))
            .map_err(|e| ValidationError::new(format!("malformed payload: {}", e)))
    });

    match &result {
        Ok(_) => info!(context = %context, "Payload validation succeeded"),
        Err(e) => error!(context = %context, error = %e, "Payload validation failed"),
    }
    result
}

/// Whether a client payload is too incomplete to export as-is
///
/// True when the property list is missing or short, a property has fewer
/// than twelve rows, or any row is flagged `Missing data`.
pub fn needs_local_data(value: &Value) -> bool {
    let Some(properties) = value.get("properties").and_then(Value::as_array) else {
        return true;
    };
    if properties.len() < PROPERTY_IDS.len() {
        return true;
    }

    for property in properties {
        if !property.is_object() {
            return true;
        }
        let Some(rows) = property.get("rows").and_then(Value::as_array) else {
            return true;
        };
        if rows.len() < MONTHS_PER_YEAR as usize {
            return true;
        }
        let flagged = rows.iter().any(|row| {
            row.get("remarks")
                .and_then(Value::as_str)
                .is_some_and(|r| r.trim().eq_ignore_ascii_case(MISSING_DATA))
        });
        if flagged {
            return true;
        }
    }
    false
}

fn check_shape(value: &Value, expected_year: i32) -> Result<(), ValidationError> {
    if value.get("template_version").and_then(Value::as_str) != Some(TEMPLATE_VERSION) {
        return Err(ValidationError::new(format!(
            "template_version must be {}",
            TEMPLATE_VERSION
        )));
    }
    if value.get("year").and_then(Value::as_f64) != Some(f64::from(expected_year)) {
        return Err(ValidationError::new(format!(
            "year must be {}",
            expected_year
        )));
    }

    let properties = value
        .get("properties")
        .and_then(Value::as_array)
        .ok_or_else(|| ValidationError::new("properties must be an array"))?;
    if properties.len() != PROPERTY_IDS.len() {
        return Err(ValidationError::new("properties must include KN01-KN10"));
    }

    let mut seen_ids = HashSet::new();
    for property in properties {
        if !property.is_object() {
            return Err(ValidationError::new("each property must be an object"));
        }
        let property_id = property
            .get("property_id")
            .and_then(Value::as_str)
            .filter(|id| PROPERTY_IDS.contains(id))
            .ok_or_else(|| ValidationError::new("invalid or missing property_id"))?;
        if !seen_ids.insert(property_id) {
            return Err(ValidationError::new(format!(
                "duplicate property_id found: {}",
                property_id
            )));
        }
        check_property(property_id, property)?;
    }
    Ok(())
}

fn check_property(property_id: &str, property: &Value) -> Result<(), ValidationError> {
    if property.get("period_months").and_then(Value::as_f64) != Some(f64::from(MONTHS_PER_YEAR)) {
        return Err(ValidationError::new(format!(
            "{} must have period_months 12",
            property_id
        )));
    }
    for field in ["property_address", "tenant_name"] {
        if !is_string_or_null(property.get(field)) {
            return Err(ValidationError::new(format!(
                "{} must be a string or null for {}",
                field, property_id
            )));
        }
    }

    let rows = property
        .get("rows")
        .and_then(Value::as_array)
        .ok_or_else(|| ValidationError::new(format!("{} rows must be a list", property_id)))?;
    if rows.len() != MONTHS_PER_YEAR as usize {
        return Err(ValidationError::new(format!(
            "{} must have exactly 12 rows",
            property_id
        )));
    }

    let mut seen_months = HashSet::new();
    for row in rows {
        check_row(property_id, row, &mut seen_months)?;
    }
    Ok(())
}

fn check_row(
    property_id: &str,
    row: &Value,
    seen_months: &mut HashSet<i64>,
) -> Result<(), ValidationError> {
    let fail = |message: &str| ValidationError::new(format!("{}: {}", property_id, message));

    if !row.is_object() {
        return Err(fail("each row must be an object"));
    }
    let month_number = row
        .get("month_number")
        .and_then(Value::as_i64)
        .filter(|m| (1..=i64::from(MONTHS_PER_YEAR)).contains(m))
        .ok_or_else(|| fail("month_number must be an integer between 1 and 12"))?;
    if !seen_months.insert(month_number) {
        return Err(fail("duplicate month_number detected"));
    }

    if !row.get("month").is_some_and(Value::is_string) {
        return Err(fail("month must be a string"));
    }
    if !is_string_or_null(row.get("housing_dept")) {
        return Err(fail("housing_dept must be a string or null"));
    }
    for field in NUMERIC_FIELDS {
        if !row.get(field).is_some_and(Value::is_number) {
            return Err(fail(&format!("{} must be a number", field)));
        }
    }
    if !row.get("remarks").is_some_and(Value::is_string) {
        return Err(fail("remarks must be a string"));
    }
    Ok(())
}

// `year` and `period_months` may arrive as floats (`2025.0`); once checked they
// are rewritten as integers for the typed records.
fn with_integral_counts(value: &Value, year: i32) -> Value {
    let mut value = value.clone();
    if let Some(payload) = value.as_object_mut() {
        payload.insert("year".to_string(), Value::from(year));
    }
    if let Some(properties) = value.get_mut("properties").and_then(Value::as_array_mut) {
        for property in properties.iter_mut().filter_map(Value::as_object_mut) {
            property.insert("period_months".to_string(), Value::from(MONTHS_PER_YEAR));
        }
    }
    value
}

// Absent keys count as null.
fn is_string_or_null(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null) | Some(Value::String(_)))
}
