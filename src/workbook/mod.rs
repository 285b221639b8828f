// Workbook module
// Rent payload schema, local ledger, vector-store lookup and template filling

pub mod ledger;
pub mod lookup;
pub mod payload;
pub mod template;

pub use ledger::LedgerError;
pub use lookup::{LookupError, RentLookup};
pub use payload::{RentWorkbookPayload, ValidationError};
pub use template::TemplateError;
