//! Spreadsheet template filler
//!
//! The template holds one worksheet per property id. Header cells and a
//! twelve-row month table are written into each sheet; everything else in
//! the template (labels, styles, formulas) is left untouched.

use crate::workbook::payload::{MonthRow, PropertyRecord, RentWorkbookPayload, MONTHS_PER_YEAR};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use umya_spreadsheet::Worksheet;

/// Year header cell
pub const HEADER_YEAR_CELL: &str = "B2";
/// Property address header cell
pub const HEADER_ADDRESS_CELL: &str = "B4";
/// Tenant name header cell
pub const HEADER_TENANT_CELL: &str = "H4";
/// Period (months) header cell
pub const HEADER_PERIOD_CELL: &str = "H5";
/// Sheet row holding January
pub const TABLE_START_ROW: u32 = 9;

// Table columns A..I
const COL_MONTH: u32 = 1;
const COL_RENT_DUE: u32 = 2;
const COL_HOUSING_DEPT: u32 = 3;
const COL_HOUSING_PAID: u32 = 4;
const COL_TENANT_PAID: u32 = 5;
const COL_TOTAL_RECEIVED: u32 = 6;
const COL_MONTH_BALANCE: u32 = 7;
const COL_YEAR_BALANCE: u32 = 8;
const COL_REMARKS: u32 = 9;

/// Errors raised while filling the template
#[derive(Error, Debug)]
pub enum TemplateError {
    /// Template file does not exist
    #[error("Template not found: {}", .0.display())]
    Missing(PathBuf),

    /// Template exists but could not be parsed
    #[error("failed to read template {}: {message}", path.display())]
    Read {
        /// Template path
        path: PathBuf,
        /// Reader message
        message: String,
    },

    /// Filled workbook could not be serialized
    #[error("failed to write workbook: {0}")]
    Write(String),
}

/// Fill the template at `template_path` and return the xlsx bytes
///
/// Properties without a matching worksheet are skipped. Blocking; call from
/// `spawn_blocking` in async code.
pub fn fill_template(
    template_path: &Path,
    payload: &RentWorkbookPayload,
) -> Result<Vec<u8>, TemplateError> {
    if !template_path.is_file() {
        return Err(TemplateError::Missing(template_path.to_path_buf()));
    }
    let mut book =
        umya_spreadsheet::reader::xlsx::read(template_path).map_err(|e| TemplateError::Read {
            path: template_path.to_path_buf(),
            message: e.to_string(),
        })?;

    for property in &payload.properties {
        let Some(sheet) = book.get_sheet_by_name_mut(&property.property_id) else {
            warn!(property_id = %property.property_id, "Template has no sheet for property; skipping");
            continue;
        };
        write_property(sheet, payload.year, property);
        debug!(property_id = %property.property_id, "Filled property sheet");
    }

    let mut buffer = Cursor::new(Vec::new());
    umya_spreadsheet::writer::xlsx::write_writer(&book, &mut buffer)
        .map_err(|e| TemplateError::Write(e.to_string()))?;
    Ok(buffer.into_inner())
}

fn write_property(sheet: &mut Worksheet, year: i32, property: &PropertyRecord) {
    sheet.get_cell_mut(HEADER_YEAR_CELL).set_value_number(year);
    sheet
        .get_cell_mut(HEADER_ADDRESS_CELL)
        .set_value_string(property.property_address.as_deref().unwrap_or_default());
    sheet
        .get_cell_mut(HEADER_TENANT_CELL)
        .set_value_string(property.tenant_name.as_deref().unwrap_or_default());
    sheet
        .get_cell_mut(HEADER_PERIOD_CELL)
        .set_value_number(property.period_months);

    for month_number in 1..=MONTHS_PER_YEAR {
        let row = TABLE_START_ROW + month_number - 1;
        match property.rows.iter().find(|r| r.month_number == month_number) {
            Some(month) => write_month(sheet, row, month),
            None => clear_month(sheet, row),
        }
    }
}

fn write_month(sheet: &mut Worksheet, row: u32, month: &MonthRow) {
    sheet
        .get_cell_mut((COL_MONTH, row))
        .set_value_string(month.month.as_str());
    sheet
        .get_cell_mut((COL_HOUSING_DEPT, row))
        .set_value_string(month.housing_dept.as_deref().unwrap_or_default());
    sheet
        .get_cell_mut((COL_REMARKS, row))
        .set_value_string(month.remarks.as_str());

    let amounts = [
        (COL_RENT_DUE, month.rent_due),
        (COL_HOUSING_PAID, month.housing_paid),
        (COL_TENANT_PAID, month.tenant_paid),
        (COL_TOTAL_RECEIVED, month.total_received),
        (COL_MONTH_BALANCE, month.month_balance_due),
        (COL_YEAR_BALANCE, month.year_balance_due),
    ];
    for (col, amount) in amounts {
        sheet.get_cell_mut((col, row)).set_value_number(amount);
    }
}

fn clear_month(sheet: &mut Worksheet, row: u32) {
    for col in [COL_MONTH, COL_HOUSING_DEPT, COL_REMARKS] {
        sheet.get_cell_mut((col, row)).set_value_string("");
    }
    for col in [
        COL_RENT_DUE,
        COL_HOUSING_PAID,
        COL_TENANT_PAID,
        COL_TOTAL_RECEIVED,
        COL_MONTH_BALANCE,
        COL_YEAR_BALANCE,
    ] {
        sheet.get_cell_mut((col, row)).set_value_number(0);
    }
}

/// Write a blank template with one labelled sheet per property id
pub fn write_blank_template(path: &Path) -> Result<(), TemplateError> {
    let mut book = umya_spreadsheet::new_file();
    for property_id in crate::workbook::payload::PROPERTY_IDS {
        let sheet = book
            .new_sheet(property_id)
            .map_err(|e| TemplateError::Write(e.to_string()))?;
        label_sheet(sheet);
    }
    book.remove_sheet_by_name("Sheet1")
        .map_err(|e| TemplateError::Write(e.to_string()))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| TemplateError::Write(e.to_string()))?;
    }
    umya_spreadsheet::writer::xlsx::write(&book, path)
        .map_err(|e| TemplateError::Write(e.to_string()))
}

fn label_sheet(sheet: &mut Worksheet) {
    sheet.get_cell_mut("A1").set_value_string("Property Rents Received");
    sheet.get_cell_mut("A2").set_value_string("Year");
    sheet.get_cell_mut("A4").set_value_string("Property Address");
    sheet.get_cell_mut("G4").set_value_string("Tenant");
    sheet.get_cell_mut("G5").set_value_string("Period (months)");

    let headings = [
        "Month",
        "Rent Due",
        "Housing Dept",
        "Housing Paid",
        "Tenant Paid",
        "Total Received",
        "Month Balance Due",
        "Year Balance Due",
        "Remarks",
    ];
    for (col, heading) in (1u32..).zip(headings) {
        sheet
            .get_cell_mut((col, TABLE_START_ROW - 1))
            .set_value_string(heading);
    }
}
