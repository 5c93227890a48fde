use crate::error::RustyTemplateError;
use crate::spreadsheet::reference::index_to_reference;
use chrono::NaiveDate;
use chrono::TimeDelta;

/// Types of cell data in SpreadsheetML worksheets.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum CellType {
    #[default]
    Empty,
    /// Boolean values (stored as 1/0)
    Boolean,
    /// Numeric values
    Number,
    /// Date/time values stored as numbers from 1900 epoch
    NumberDateTime1900,
    /// Date values stored as numbers from 1900 epoch
    NumberDate1900,
    /// Time values stored as numbers from 1900 epoch
    NumberTime1900,
    /// Date/time values stored as numbers from 1904 epoch
    NumberDateTime1904,
    /// Date values stored as numbers from 1904 epoch
    NumberDate1904,
    /// Time values stored as numbers from 1904 epoch
    NumberTime1904,
    /// ISO 8601 date/time strings
    IsoDateTime,
    /// Inline or formula string values
    InlineString,
    /// Shared string table references, resolved once the table is loaded
    SharedString,
    /// Error values (#N/A, #REF!, ...)
    Error,
}

impl CellType {
    /// Parses built-in Excel number format IDs to determine cell type.
    pub(crate) fn parse_builtin_number_format_id(id: &str, is_1904: bool) -> Option<Self> {
        match id {
            "22" => Some(if is_1904 { Self::NumberDateTime1904 } else { Self::NumberDateTime1900 }),
            "14" | "15" | "16" | "17" => Some(if is_1904 { Self::NumberDate1904 } else { Self::NumberDate1900 }),
            "18" | "19" | "20" | "21" | "45" | "46" | "47" => Some(if is_1904 { Self::NumberTime1904 } else { Self::NumberTime1900 }),
            _ => None,
        }
    }

    /// Parses custom number format strings to determine cell type.
    /// Date and time tokens inside literals, escapes and brackets are ignored.
    pub(crate) fn parse_custom_number_format(format: &str, is_1904: bool) -> Self {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_date = false;
        let mut is_time = false;
        let mut is_bracket = false;
        for character in format.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' => is_escaped = true,

                '"' if is_literal => is_literal = false,
                '"' if !is_bracket => is_literal = true,

                ']' if is_bracket => is_bracket = false,
                '[' if !is_literal => is_bracket = true,
                _ if is_literal || is_bracket => (),

                'Y' | 'y' | 'D' | 'd' => is_date = true,
                'H' | 'h' | 'S' | 's' => is_time = true,
                _ => (),
            }
        }

        match (is_date, is_time, is_1904) {
            (true, true, false) => Self::NumberDateTime1900,
            (true, true, true) => Self::NumberDateTime1904,
            (true, false, false) => Self::NumberDate1900,
            (true, false, true) => Self::NumberDate1904,
            (false, true, false) => Self::NumberTime1900,
            (false, true, true) => Self::NumberTime1904,
            (false, false, _) => Self::Number,
        }
    }

    /// Maps the `t` attribute of a `<c>` element
    pub(crate) fn from_type_attribute(kind: Option<&str>) -> Self {
        match kind {
            Some("inlineStr") | Some("str") => Self::InlineString,
            Some("s") => Self::SharedString,
            Some("d") => Self::IsoDateTime,
            Some("b") => Self::Boolean,
            Some("e") => Self::Error,
            _ => Self::Number,
        }
    }
}

/// Represents a single stored cell with position, type, and raw value.
#[derive(Clone, Debug)]
pub(crate) struct Cell {
    /// Row index (0-based)
    pub(crate) row: usize,
    /// Column index (0-based)
    pub(crate) col: usize,
    /// Cell data type
    pub(crate) kind: CellType,
    /// Cell value as stored in the worksheet
    pub(crate) value: String,
}

impl Cell {
    /// Returns the Excel-style cell reference (e.g., "A1", "B2").
    pub(crate) fn reference(&self) -> String {
        index_to_reference(self.row, self.col)
    }

    /// Renders the value the way a spreadsheet application displays it.
    /// Numbers that a date style cannot interpret are shown verbatim.
    pub(crate) fn formatted(&self) -> String {
        let formatted = match self.kind {
            CellType::Boolean => Ok(if self.value == "1" { "TRUE" } else { "FALSE" }.to_owned()),
            CellType::NumberDateTime1900 => to_datetime_string(&self.value, false),
            CellType::NumberDateTime1904 => to_datetime_string(&self.value, true),
            CellType::NumberDate1900 => to_date_string(&self.value, false),
            CellType::NumberDate1904 => to_date_string(&self.value, true),
            CellType::NumberTime1900 | CellType::NumberTime1904 => to_time_string(&self.value),
            CellType::IsoDateTime => Ok(self.value.replace('T', " ")),
            _ => Ok(self.value.to_owned()),
        };
        formatted.unwrap_or_else(|error| {
            log::debug!("Cell {} keeps raw value '{}': {}", self.reference(), self.value, error);
            self.value.to_owned()
        })
    }
}

/// Converts Excel numeric date to ISO date string.
/// Handles Lotus 1-2-3 leap year bug for 1900 epoch.
fn to_date_string(value: &str, is_1904: bool) -> Result<String, RustyTemplateError> {
    let days = value.trim().parse::<f64>().map_err(|_| invalid_number(value))?.trunc();
    if !days.is_finite() || days.abs() > i32::MAX as f64 {
        Err(invalid_number(value))?;
    }
    let days = days as i64;
    let offset = if is_1904 {
        1462
    } else if days < 60 {
        1
    } else {
        0
    };
    let date = TimeDelta::try_days(days + offset)
        .and_then(|duration| NaiveDate::from_ymd_opt(1899, 12, 30).expect("NaiveDate Literal").checked_add_signed(duration))
        .ok_or_else(|| invalid_number(value))?;
    Ok(date.format("%Y-%m-%d").to_string())
}

/// Converts the fractional part of an Excel number to an `HH:MM:SS` string.
fn to_time_string(value: &str) -> Result<String, RustyTemplateError> {
    let factor = value.trim().parse::<f64>().map_err(|_| invalid_number(value))?.fract();
    let mut seconds = (factor * 86_400f64).round() as i64;
    let hours = seconds / 3600; seconds %= 3600;
    let minutes = seconds / 60; seconds %= 60;
    Ok(format!("{hours:02}:{minutes:02}:{seconds:02}"))
}

/// Converts Excel numeric datetime to ISO datetime string.
fn to_datetime_string(value: &str, is_1904: bool) -> Result<String, RustyTemplateError> {
    let date = to_date_string(value, is_1904)?;
    let time = to_time_string(value)?;
    Ok(format!("{date} {time}"))
}

fn invalid_number(value: &str) -> RustyTemplateError {
    RustyTemplateError::WithContextError(format!("parse '{value}' to number failed"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(kind: CellType, value: &str) -> Cell {
        Cell { row: 0, col: 0, kind, value: value.to_owned() }
    }

    #[test]
    fn test_builtin_number_format() {
        assert_eq!(CellType::parse_builtin_number_format_id("14", false), Some(CellType::NumberDate1900));
        assert_eq!(CellType::parse_builtin_number_format_id("22", true), Some(CellType::NumberDateTime1904));
        assert_eq!(CellType::parse_builtin_number_format_id("46", false), Some(CellType::NumberTime1900));
        assert_eq!(CellType::parse_builtin_number_format_id("0", false), None);
    }

    #[test]
    fn test_custom_number_format() {
        assert_eq!(CellType::parse_custom_number_format("yyyy-mm-dd", false), CellType::NumberDate1900);
        assert_eq!(CellType::parse_custom_number_format("dd/mm/yyyy hh:mm", false), CellType::NumberDateTime1900);
        assert_eq!(CellType::parse_custom_number_format("hh:mm:ss", true), CellType::NumberTime1904);
        assert_eq!(CellType::parse_custom_number_format("[Red]0.00", false), CellType::Number);
        assert_eq!(CellType::parse_custom_number_format("\"Days\" 0", false), CellType::Number);
        assert_eq!(CellType::parse_custom_number_format("#,##0_);\\(#,##0\\)", false), CellType::Number);
    }

    #[test]
    fn test_formatted_dates() {
        assert_eq!(cell(CellType::NumberDate1900, "45292").formatted(), "2024-01-01");
        assert_eq!(cell(CellType::NumberDate1900, "59").formatted(), "1900-02-28");
        assert_eq!(cell(CellType::NumberDate1900, "61").formatted(), "1900-03-01");
        assert_eq!(cell(CellType::NumberDate1904, "0").formatted(), "1904-01-01");
        assert_eq!(cell(CellType::NumberDateTime1900, "45292.5").formatted(), "2024-01-01 12:00:00");
        assert_eq!(cell(CellType::NumberTime1900, "0.75").formatted(), "18:00:00");
    }

    #[test]
    fn test_formatted_values() {
        assert_eq!(cell(CellType::Boolean, "1").formatted(), "TRUE");
        assert_eq!(cell(CellType::Boolean, "0").formatted(), "FALSE");
        assert_eq!(cell(CellType::IsoDateTime, "2024-03-05T08:30:00").formatted(), "2024-03-05 08:30:00");
        assert_eq!(cell(CellType::Number, "12.5").formatted(), "12.5");
        assert_eq!(cell(CellType::NumberDate1900, "n/a").formatted(), "n/a");
    }

    #[test]
    fn test_formatted_out_of_range_dates() {
        assert_eq!(cell(CellType::NumberDate1900, "999999999").formatted(), "999999999");
        assert_eq!(cell(CellType::NumberDateTime1904, "-999999999.5").formatted(), "-999999999.5");
        assert_eq!(cell(CellType::NumberDate1900, "1e300").formatted(), "1e300");
        assert_eq!(cell(CellType::NumberDate1900, "inf").formatted(), "inf");
    }
}
