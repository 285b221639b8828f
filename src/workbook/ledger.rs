//! Local rent ledger
//!
//! Rebuilds a full payload from `RENT_Payments_{year}.txt`, a tab-separated
//! export with one row per property and month. Gaps in the ledger become
//! zeroed rows flagged `Missing data`, so the result always has ten
//! properties with twelve rows each.

use crate::workbook::payload::{
    month_abbr, MonthRow, PropertyRecord, RentWorkbookPayload, MISSING_DATA, MONTHS_PER_YEAR,
    PROPERTY_IDS, TEMPLATE_VERSION,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors raised while rebuilding a payload from the ledger file
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Ledger file does not exist
    #[error("Missing data file: {}", .0.display())]
    Missing(PathBuf),

    /// Ledger file could not be read or decoded
    #[error("failed to read {}: {source}", path.display())]
    Csv {
        /// Ledger path
        path: PathBuf,
        /// Underlying reader error
        #[source]
        source: csv::Error,
    },

    /// A money column held something other than a number
    #[error("{context}: {field} is not a number ({value})")]
    Number {
        /// Property and month the row belongs to
        context: String,
        /// Column name
        field: &'static str,
        /// Raw cell text
        value: String,
    },
}

/// Ledger file path for a year
pub fn ledger_path(data_dir: &Path, year: i32) -> PathBuf {
    data_dir.join(format!("RENT_Payments_{}.txt", year))
}

/// One ledger line; every column is optional
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LedgerRecord {
    property_id: Option<String>,
    property_address: Option<String>,
    tenant_name: Option<String>,
    month_number: Option<String>,
    month_name: Option<String>,
    scheduled_rent_amount: Option<String>,
    housing_dept_name: Option<String>,
    housing_dept: Option<String>,
    housing_amount_paid: Option<String>,
    tenant_amount_paid: Option<String>,
    total_amount_received: Option<String>,
    month_balance_due: Option<String>,
    year_balance_due: Option<String>,
    notes: Option<String>,
}

#[derive(Default)]
struct PropertyEntry {
    address: Option<String>,
    tenant: Option<String>,
    rows: BTreeMap<u32, MonthRow>,
}

/// Rebuild the payload for `year` from the ledger in `data_dir`
pub fn load_payload(data_dir: &Path, year: i32) -> Result<RentWorkbookPayload, LedgerError> {
    let path = ledger_path(data_dir, year);
    if !path.is_file() {
        return Err(LedgerError::Missing(path));
    }
    let file = std::fs::File::open(&path).map_err(|e| LedgerError::Csv {
        path: path.clone(),
        source: csv::Error::from(e),
    })?;

    let payload = payload_from_reader(file, year).map_err(|e| match e {
        LedgerError::Csv { source, .. } => LedgerError::Csv {
            path: path.clone(),
            source,
        },
        other => other,
    })?;
    info!(path = %path.display(), "Rebuilt rent payload from local ledger");
    Ok(payload)
}

fn payload_from_reader<R: Read>(rdr: R, year: i32) -> Result<RentWorkbookPayload, LedgerError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(rdr);

    let mut entries: BTreeMap<&'static str, PropertyEntry> = PROPERTY_IDS
        .iter()
        .map(|id| (*id, PropertyEntry::default()))
        .collect();

    for result in reader.deserialize::<LedgerRecord>() {
        let record = result.map_err(|source| LedgerError::Csv {
            path: PathBuf::new(),
            source,
        })?;

        let property_id = cell(&record.property_id);
        let Some(entry) = PROPERTY_IDS
            .iter()
            .find(|id| **id == property_id)
            .and_then(|id| entries.get_mut(id))
        else {
            debug!(property_id = %property_id, "Skipping unsupported property_id");
            continue;
        };

        let raw_month = cell(&record.month_number);
        let month_number = match raw_month.parse::<u32>() {
            Ok(m) if (1..=MONTHS_PER_YEAR).contains(&m) => m,
            Ok(m) => {
                warn!(property_id = %property_id, month_number = m, "Skipping row with out-of-range month_number");
                continue;
            }
            Err(_) => {
                warn!(property_id = %property_id, month_number = %raw_month, "Skipping row with invalid month_number");
                continue;
            }
        };

        if let Some(address) = non_empty(&record.property_address) {
            entry.address = Some(address);
        }
        if let Some(tenant) = non_empty(&record.tenant_name) {
            entry.tenant = Some(tenant);
        }

        if entry.rows.contains_key(&month_number) {
            warn!(
                property_id = %property_id,
                month_number,
                "Duplicate ledger data for month; keeping first row"
            );
            continue;
        }

        let row = month_row(property_id, month_number, &record)?;
        entry.rows.insert(month_number, row);
    }

    let properties = PROPERTY_IDS
        .iter()
        .map(|id| {
            let mut entry = entries.remove(id).unwrap_or_default();
            let rows = (1..=MONTHS_PER_YEAR)
                .map(|m| entry.rows.remove(&m).unwrap_or_else(|| MonthRow::missing(m)))
                .collect();
            PropertyRecord {
                property_id: id.to_string(),
                property_address: Some(entry.address.unwrap_or_else(|| MISSING_DATA.to_string())),
                tenant_name: Some(entry.tenant.unwrap_or_else(|| MISSING_DATA.to_string())),
                period_months: MONTHS_PER_YEAR,
                rows,
            }
        })
        .collect();

    Ok(RentWorkbookPayload {
        template_version: TEMPLATE_VERSION.to_string(),
        year,
        properties,
    })
}

fn month_row(
    property_id: &str,
    month_number: u32,
    record: &LedgerRecord,
) -> Result<MonthRow, LedgerError> {
    let context = format!("{} month {}", property_id, month_number);
    let money = |value: &Option<String>, field: &'static str| parse_amount(value, field, &context);

    let month = non_empty(&record.month_name)
        .or_else(|| month_abbr(month_number).map(str::to_string))
        .unwrap_or_default();
    let housing_dept = non_empty(&record.housing_dept_name)
        .or_else(|| non_empty(&record.housing_dept))
        .unwrap_or_else(|| MISSING_DATA.to_string());

    Ok(MonthRow {
        month_number,
        month,
        rent_due: money(&record.scheduled_rent_amount, "scheduled_rent_amount")?,
        housing_dept: Some(housing_dept),
        housing_paid: money(&record.housing_amount_paid, "housing_amount_paid")?,
        tenant_paid: money(&record.tenant_amount_paid, "tenant_amount_paid")?,
        total_received: money(&record.total_amount_received, "total_amount_received")?,
        month_balance_due: money(&record.month_balance_due, "month_balance_due")?,
        year_balance_due: money(&record.year_balance_due, "year_balance_due")?,
        remarks: cell(&record.notes).to_string(),
    })
}

/// Parse a money cell such as `$1,250.00`; blank cells are zero
fn parse_amount(
    value: &Option<String>,
    field: &'static str,
    context: &str,
) -> Result<f64, LedgerError> {
    let raw = value.as_deref().unwrap_or_default();
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != '$' && *c != ',')
        .collect();
    if cleaned.is_empty() {
        return Ok(0.0);
    }
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|amount| amount.is_finite())
        .ok_or_else(|| LedgerError::Number {
            context: context.to_string(),
            field,
            value: raw.to_string(),
        })
}

fn cell(value: &Option<String>) -> &str {
    value.as_deref().map(str::trim).unwrap_or_default()
}

fn non_empty(value: &Option<String>) -> Option<String> {
    Some(cell(value)).filter(|v| !v.is_empty()).map(str::to_string)
}
