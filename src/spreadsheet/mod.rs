//! Workbook reading and writing for SpreadsheetML packages (.xlsx and its macro/template variants)

pub(crate) mod cell;
pub(crate) mod package;
pub(crate) mod reference;
pub(crate) mod sheet;
pub mod writer;
pub(crate) mod xlsx;

pub use crate::spreadsheet::sheet::Sheet;
pub use crate::spreadsheet::xlsx::XlsxWorkbook;
use thiserror::Error;

/// Errors raised while opening or reading a workbook
#[derive(Error, Debug)]
pub enum SpreadsheetError {
    /// Compound files are password protected packages or legacy binary workbooks
    #[error("Workbook '{0}' is password protected or not an Office Open XML package")]
    Encrypted(String),

    #[error("Workbook '{0}' contains no sheets")]
    EmptyWorkbook(String),

    #[error("Cannot detect file format for '{0}'")]
    UnsupportedFormat(String),

    /// A required part is missing from the package
    #[error("Missing part '{0}' in workbook")]
    FileError(String),

    #[error("Sheet '{0}' not found")]
    SheetNotFound(String),
}

/// A sheet as the header detection sees it: bounded grid of display strings.
pub trait Worksheet {
    /// Sheet name as shown on its tab
    fn name(&self) -> &str;

    /// Highest used row (1-based), 0 when the sheet has no cells
    fn highest_row(&self) -> usize;

    /// Highest used column (1-based), 0 when the sheet has no cells
    fn highest_column(&self) -> usize;

    /// Display-formatted value at the 1-based position, if a cell is stored there
    fn formatted_value(&self, row: usize, col: usize) -> Option<String>;
}

/// File extensions handled by the xlsx reader
const SUPPORTED_EXTENSIONS: [&str; 4] = ["xlsx", "xlsm", "xltx", "xltm"];

/// Checks that a file name carries one of the SpreadsheetML extensions
pub(crate) fn check_extension(file_name: &str) -> Result<(), SpreadsheetError> {
    let extension = std::path::Path::new(file_name)
        .extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| extension.to_ascii_lowercase());
    match extension {
        Some(extension) if SUPPORTED_EXTENSIONS.contains(&extension.as_str()) => Ok(()),
        _ => Err(SpreadsheetError::UnsupportedFormat(file_name.to_owned())),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_extension() {
        assert!(check_extension("template.xlsx").is_ok());
        assert!(check_extension("Template.XLSM").is_ok());
        assert!(check_extension("report.xltx").is_ok());
        assert!(matches!(check_extension("legacy.xls"), Err(SpreadsheetError::UnsupportedFormat(_))));
        assert!(matches!(check_extension("staff.csv"), Err(SpreadsheetError::UnsupportedFormat(_))));
        assert!(matches!(check_extension("no_extension"), Err(SpreadsheetError::UnsupportedFormat(_))));
    }
}
