use crate::spreadsheet::Worksheet;
use crate::template::TemplateError;
use serde::Serialize;
use std::collections::BTreeMap;

/// An occupied cell found while scanning, 1-based
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScannedCell {
    pub row: usize,
    pub col: usize,
    /// Trimmed display value
    pub value: String,
}

/// Occupied cells of one sheet and how many fall on each row and column
#[derive(Debug, Clone, PartialEq)]
pub struct SheetScan {
    pub cells: Vec<ScannedCell>,
    pub row_counts: BTreeMap<usize, usize>,
    pub col_counts: BTreeMap<usize, usize>,
}

impl SheetScan {
    /// Largest count in a table and the lowest index attaining it
    pub(crate) fn best(counts: &BTreeMap<usize, usize>) -> (usize, usize) {
        let mut best = (1, 0);
        let mut first = true;
        for (index, count) in counts {
            if first || *count > best.1 {
                best = (*index, *count);
                first = false;
            }
        }
        best
    }
}

/// Visits every position inside the sheet's used range, row by row.
///
/// A sheet without occupied cells gets `{1: 0}` for both tables.
pub fn scan_sheet<W: Worksheet + ?Sized>(sheet: &W, max_cells: Option<usize>) -> Result<SheetScan, TemplateError> {
    let highest_row = sheet.highest_row();
    let highest_col = sheet.highest_column();
    if let Some(limit) = max_cells {
        let cells = highest_row.saturating_mul(highest_col);
        if cells > limit {
            return Err(TemplateError::SheetTooLarge {
                name: sheet.name().to_owned(),
                cells,
                limit,
            });
        }
    }

    let mut cells = Vec::new();
    let mut row_counts = BTreeMap::<usize, usize>::new();
    let mut col_counts = BTreeMap::<usize, usize>::new();
    for row in 1..=highest_row {
        for col in 1..=highest_col {
            let Some(value) = sheet.formatted_value(row, col) else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            *row_counts.entry(row).or_default() += 1;
            *col_counts.entry(col).or_default() += 1;
            cells.push(ScannedCell {
                row,
                col,
                value: value.to_owned(),
            });
        }
    }

    if row_counts.is_empty() {
        row_counts.insert(1, 0);
    }
    if col_counts.is_empty() {
        col_counts.insert(1, 0);
    }
    Ok(SheetScan { cells, row_counts, col_counts })
}
