//! Writes a blank rent workbook template
//!
//! Usage: `make_template [PATH]`. Defaults to `RENT_TEMPLATE_PATH` or the
//! configured template location.

use rent_desk_backend::config::Config;
use rent_desk_backend::workbook::template::write_blank_template;
use std::env;
use std::path::PathBuf;

fn main() -> anyhow::Result<()> {
    let path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| Config::from_env().workbook.template_path);

    if path.exists() {
        println!("Template already exists at {}; overwriting", path.display());
    }
    write_blank_template(&path)?;
    println!("✓ Wrote blank template to {}", path.display());
    Ok(())
}
