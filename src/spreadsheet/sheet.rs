use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::Worksheet;
use std::collections::HashMap;

/// Represents a loaded worksheet: its stored cells and the used range.
pub struct Sheet {
    /// Sheet name
    pub(crate) name: String,
    /// Path of the worksheet part inside the package
    pub(crate) zip_path: String,
    /// All stored cells in document order
    pub(crate) cells: Vec<Cell>,
    /// (row, col) to position in `cells`
    index: HashMap<(usize, usize), usize>,
    /// Actual data range (0-based, determined from cell data)
    pub(crate) row_upper_bound: Option<usize>,
    pub(crate) col_upper_bound: Option<usize>,
}

impl Sheet {
    /// Creates an empty sheet.
    pub(crate) fn new(name: &str, zip_path: &str) -> Self {
        Self {
            name: name.to_owned(),
            zip_path: zip_path.to_owned(),
            cells: Vec::new(),
            index: HashMap::new(),
            row_upper_bound: None,
            col_upper_bound: None,
        }
    }

    /// Returns true if the sheet contains no cells.
    pub(crate) fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Adds a cell to the sheet, updating the data range.
    /// A later cell at the same position replaces the earlier one.
    pub(crate) fn push(&mut self, cell: Cell) {
        self.update_bound(cell.row, cell.col);
        match self.index.get(&(cell.row, cell.col)) {
            Some(position) => self.cells[*position] = cell,
            None => {
                self.index.insert((cell.row, cell.col), self.cells.len());
                self.cells.push(cell);
            }
        }
    }

    /// Updates the used range boundaries based on cell positions.
    fn update_bound(&mut self, row: usize, col: usize) {
        if self.row_upper_bound.map(|row_upper_bound| row_upper_bound < row).unwrap_or(true) {
            self.row_upper_bound = Some(row);
        }
        if self.col_upper_bound.map(|col_upper_bound| col_upper_bound < col).unwrap_or(true) {
            self.col_upper_bound = Some(col);
        }
    }

    /// Gets the stored cell at 0-based indexes.
    pub(crate) fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.index.get(&(row, col)).map(|position| &self.cells[*position])
    }

    /// Builds a sheet of inline strings; empty strings leave the cell unset.
    #[cfg(test)]
    pub(crate) fn from_rows(name: &str, rows: &[&[&str]]) -> Self {
        use crate::spreadsheet::cell::CellType;

        let mut sheet = Sheet::new(name, "");
        for (row, values) in rows.iter().enumerate() {
            for (col, value) in values.iter().enumerate() {
                if !value.is_empty() {
                    sheet.push(Cell {
                        row,
                        col,
                        kind: CellType::InlineString,
                        value: (*value).to_owned(),
                    });
                }
            }
        }
        sheet
    }
}

impl Worksheet for Sheet {
    fn name(&self) -> &str {
        &self.name
    }

    fn highest_row(&self) -> usize {
        self.row_upper_bound.map(|row| row + 1).unwrap_or(0)
    }

    fn highest_column(&self) -> usize {
        self.col_upper_bound.map(|col| col + 1).unwrap_or(0)
    }

    fn formatted_value(&self, row: usize, col: usize) -> Option<String> {
        if row == 0 || col == 0 {
            return None;
        }
        self.cell(row - 1, col - 1).map(Cell::formatted)
    }
}
