//! Locates the header line of a workbook and turns its cells into labels.

use crate::config::TemplateConfig;
use crate::spreadsheet::Worksheet;
use crate::template::alias::AliasResolver;
use crate::template::alias::ResolutionSource;
use crate::template::scan::scan_sheet;
use crate::template::scan::ScannedCell;
use crate::template::scan::SheetScan;
use crate::template::Orientation;
use crate::template::TemplateError;
use serde::Deserialize;
use serde::Serialize;

/// Occupancy summary of one sheet that has labels
#[derive(Debug, Clone, PartialEq)]
pub struct AxisCandidate {
    pub sheet_index: usize,
    pub sheet_name: String,
    pub max_row_occupancy: usize,
    pub max_col_occupancy: usize,
    /// Lowest row holding `max_row_occupancy` cells
    pub best_row: usize,
    /// Lowest column holding `max_col_occupancy` cells
    pub best_col: usize,
    pub cells: Vec<ScannedCell>,
}

impl AxisCandidate {
    fn new(sheet_index: usize, sheet_name: &str, scan: SheetScan) -> AxisCandidate {
        let (best_row, max_row_occupancy) = SheetScan::best(&scan.row_counts);
        let (best_col, max_col_occupancy) = SheetScan::best(&scan.col_counts);
        AxisCandidate {
            sheet_index,
            sheet_name: sheet_name.to_owned(),
            max_row_occupancy,
            max_col_occupancy,
            best_row,
            best_col,
            cells: scan.cells,
        }
    }

    pub fn score(&self) -> usize {
        self.max_row_occupancy + self.max_col_occupancy
    }

    /// A row header wins ties
    pub fn orientation(&self) -> Orientation {
        if self.max_row_occupancy >= self.max_col_occupancy {
            Orientation::Horizontal
        } else {
            Orientation::Vertical
        }
    }

    pub fn header_index(&self) -> usize {
        match self.orientation() {
            Orientation::Horizontal => self.best_row,
            Orientation::Vertical => self.best_col,
        }
    }
}

/// A cell of the header line and the field it resolves to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    /// Position key `R{row}C{col}`, the key of saved mappings
    pub key: String,
    pub row: usize,
    pub col: usize,
    pub value: String,
    pub resolved_field: String,
    /// Whether `resolved_field` is in the vocabulary
    pub known: bool,
}

/// The selected header line of a workbook
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeaderDetection {
    pub sheet_index: usize,
    pub sheet_name: String,
    pub orientation: Orientation,
    /// Row (horizontal) or column (vertical) of the header, 1-based
    pub header_index: usize,
    pub labels: Vec<Label>,
}

pub fn label_key(row: usize, col: usize) -> String {
    format!("R{row}C{col}")
}

/// Scans every sheet and keeps the one with the highest row + column occupancy.
/// Sheets without labels are skipped; the first sheet wins ties.
pub fn select_candidate<W: Worksheet>(sheets: &[W], config: &TemplateConfig) -> Result<AxisCandidate, TemplateError> {
    let mut selected: Option<AxisCandidate> = None;
    for (sheet_index, sheet) in sheets.iter().enumerate() {
        let scan = scan_sheet(sheet, config.max_cells)?;
        if scan.cells.is_empty() {
            log::debug!("Sheet '{}' has no labels", sheet.name());
            continue;
        }
        let candidate = AxisCandidate::new(sheet_index, sheet.name(), scan);
        log::debug!(
            "Sheet '{}': {} labels, row {} holds {}, column {} holds {}",
            candidate.sheet_name,
            candidate.cells.len(),
            candidate.best_row,
            candidate.max_row_occupancy,
            candidate.best_col,
            candidate.max_col_occupancy,
        );
        if selected.as_ref().map(|best| candidate.score() > best.score()).unwrap_or(true) {
            selected = Some(candidate);
        }
    }
    selected.ok_or(TemplateError::NoHeaderFound)
}

/// Builds the ordered labels of the candidate's header line.
pub fn build_labels(candidate: &AxisCandidate, resolver: &AliasResolver) -> Vec<Label> {
    let orientation = candidate.orientation();
    let header_index = candidate.header_index();
    let mut labels: Vec<Label> = candidate.cells
        .iter()
        .filter(|cell| match orientation {
            Orientation::Horizontal => cell.row == header_index,
            Orientation::Vertical => cell.col == header_index,
        })
        .map(|cell| {
            let resolution = resolver.resolve(&cell.value);
            let known = resolution.source != ResolutionSource::Unresolved && resolver.is_known(&resolution.field);
            if !known {
                log::info!("Label '{}' at {} is not a known field (guessed '{}')", cell.value, label_key(cell.row, cell.col), resolution.field);
            }
            Label {
                key: label_key(cell.row, cell.col),
                row: cell.row,
                col: cell.col,
                value: cell.value.to_owned(),
                resolved_field: resolution.field,
                known,
            }
        })
        .collect();
    match orientation {
        Orientation::Horizontal => labels.sort_by_key(|label| label.col),
        Orientation::Vertical => labels.sort_by_key(|label| label.row),
    }
    labels
}

/// Finds the header line of a workbook and resolves its labels.
pub fn detect_header<W: Worksheet>(sheets: &[W], resolver: &AliasResolver, config: &TemplateConfig) -> Result<HeaderDetection, TemplateError> {
    let candidate = select_candidate(sheets, config)?;
    let labels = build_labels(&candidate, resolver);
    let detection = HeaderDetection {
        sheet_index: candidate.sheet_index,
        sheet_name: candidate.sheet_name.to_owned(),
        orientation: candidate.orientation(),
        header_index: candidate.header_index(),
        labels,
    };
    log::info!(
        "Header of sheet '{}' is {} {} with {} labels",
        detection.sheet_name,
        match detection.orientation {
            Orientation::Horizontal => "row",
            Orientation::Vertical => "column",
        },
        detection.header_index,
        detection.labels.len(),
    );
    Ok(detection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::Sheet;

    fn detect(sheets: &[Sheet]) -> Result<HeaderDetection, TemplateError> {
        let config = TemplateConfig::default();
        detect_header(sheets, &AliasResolver::new(&config), &config)
    }

    #[test]
    fn test_horizontal_header() {
        let sheet = Sheet::from_rows("Staff", &[&["Employee ID", "First Name", "Last Name", "Email"]]);
        let detection = detect(&[sheet]).unwrap();

        assert_eq!(detection.orientation, Orientation::Horizontal);
        assert_eq!(detection.header_index, 1);
        assert_eq!(detection.sheet_name, "Staff");
        let keys: Vec<&str> = detection.labels.iter().map(|label| label.key.as_str()).collect();
        assert_eq!(keys, vec!["R1C1", "R1C2", "R1C3", "R1C4"]);
        let fields: Vec<&str> = detection.labels.iter().map(|label| label.resolved_field.as_str()).collect();
        assert_eq!(fields, vec!["employee_id", "first_name", "last_name", "email"]);
        assert!(detection.labels.iter().all(|label| label.known));
    }

    #[test]
    fn test_empty_workbook() {
        let sheets = vec![Sheet::from_rows("One", &[]), Sheet::from_rows("Two", &[&["", " "]])];
        assert_eq!(detect(&sheets), Err(TemplateError::NoHeaderFound));
        assert_eq!(detect(&[]), Err(TemplateError::NoHeaderFound));
    }

    #[test]
    fn test_vertical_header() {
        let sheet = Sheet::from_rows("Card", &[
            &["", "Title"],
            &["Surname"],
            &["Given Name"],
            &["Phone"],
        ]);
        let detection = detect(&[sheet]).unwrap();

        assert_eq!(detection.orientation, Orientation::Vertical);
        assert_eq!(detection.header_index, 1);
        let labels: Vec<(&str, &str)> = detection.labels
            .iter()
            .map(|label| (label.key.as_str(), label.resolved_field.as_str()))
            .collect();
        assert_eq!(labels, vec![("R2C1", "last_name"), ("R3C1", "first_name"), ("R4C1", "phone")]);
    }

    #[test]
    fn test_orientation_tie_prefers_horizontal() {
        // Row 1 and column 1 both hold two cells
        let sheet = Sheet::from_rows("Tie", &[&["Email", "Phone"], &["Notes"]]);
        let detection = detect(&[sheet]).unwrap();
        assert_eq!(detection.orientation, Orientation::Horizontal);
        assert_eq!(detection.header_index, 1);
        assert_eq!(detection.labels.len(), 2);
    }

    #[test]
    fn test_first_sheet_wins_ties() {
        let first = Sheet::from_rows("First", &[&["Email", "Phone"]]);
        let second = Sheet::from_rows("Second", &[&[], &["Title", "Status"]]);
        let detection = detect(&[first, second]).unwrap();
        assert_eq!(detection.sheet_index, 0);
        assert_eq!(detection.sheet_name, "First");
    }

    #[test]
    fn test_later_sheet_wins_on_strictly_greater_score() {
        let cover = Sheet::from_rows("Cover", &[&["Staff export"]]);
        let data = Sheet::from_rows("Data", &[&[], &["", "Email", "Phone", "Title"]]);
        let detection = detect(&[cover, data]).unwrap();
        assert_eq!(detection.sheet_index, 1);
        assert_eq!(detection.header_index, 2);
        assert_eq!(detection.labels[0].key, "R2C2");
    }

    #[test]
    fn test_lowest_row_wins_equal_occupancy() {
        let sheet = Sheet::from_rows("Sheet1", &[
            &["Report"],
            &["Email", "Phone", "Title"],
            &["a", "b", "c"],
        ]);
        let detection = detect(&[sheet]).unwrap();
        assert_eq!(detection.header_index, 2);
        assert_eq!(detection.labels.iter().map(|label| label.value.as_str()).collect::<Vec<_>>(), vec!["Email", "Phone", "Title"]);
    }

    #[test]
    fn test_unresolved_labels_are_kept() {
        let sheet = Sheet::from_rows("Sheet1", &[&["Email", "Shoe Size"]]);
        let detection = detect(&[sheet]).unwrap();
        assert_eq!(detection.labels[1].resolved_field, "shoe_size");
        assert!(!detection.labels[1].known);
        assert!(detection.labels[0].known);
    }

    #[test]
    fn test_keys_are_stable_across_runs() {
        let rows: &[&[&str]] = &[&["x"], &["", "Email", "Phone"], &["", "a", "b"]];
        let first = detect(&[Sheet::from_rows("Sheet1", rows)]).unwrap();
        let second = detect(&[Sheet::from_rows("Sheet1", rows)]).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.labels[0].key, "R2C2");
    }

    #[test]
    fn test_sheet_too_large() {
        let mut config = TemplateConfig::default();
        config.max_cells = Some(2);
        let sheet = Sheet::from_rows("Wide", &[&["a", "b", "c"]]);
        let result = detect_header(&[sheet], &AliasResolver::new(&config), &config);
        assert!(matches!(result, Err(TemplateError::SheetTooLarge { cells: 3, limit: 2, .. })));
    }
}
