//! Writes values into a copy of a workbook.
//! Only the `sheetData` of the target sheet is rewritten; every other part of the
//! package (styles, other sheets, drawings) is copied unchanged.

use crate::error::ResultMessage;
use crate::error::RustyTemplateError;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlWriterHelper;
use crate::helpers::zip::ZipHelper;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::xlsx::XlsxWorkbook;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use quick_xml::name::QName;
use quick_xml::Writer;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::io::Write;

const TAG_DIMENSION: QName = QName(b"dimension");
const TAG_SHEET_DATA: QName = QName(b"sheetData");
const TAG_ROW: QName = QName(b"row");
const TAG_CELL: QName = QName(b"c");

/// A text value to place at a 1-based (row, col) position
#[derive(Clone, Debug, PartialEq)]
pub struct CellWrite {
    pub row: usize,
    pub col: usize,
    pub value: String,
}

/// Pending writes: row -> col -> value, both 1-based
type PendingCells<'a> = BTreeMap<usize, BTreeMap<usize, &'a str>>;

/// Produces the bytes of a new package where the given sheet carries the writes.
///
/// # Arguments
/// * `workbook` - Opened template workbook
/// * `sheet_index` - 0-based index of the sheet to patch
/// * `writes` - Cells to write; a write replaces any existing cell at its position
///
/// # Returns
/// The complete xlsx package
pub fn patch_workbook(workbook: &mut XlsxWorkbook, sheet_index: usize, writes: &[CellWrite]) -> Result<Vec<u8>, RustyTemplateError> {
    let zip_path = workbook.sheets
        .get(sheet_index)
        .map(|sheet| sheet.zip_path.to_owned())
        .ok_or_else(|| SpreadsheetError::SheetNotFound(format!("#{}", sheet_index + 1)))?;
    let xml = workbook.zip
        .read_bytes(&zip_path)?
        .ok_or_else(|| SpreadsheetError::FileError(zip_path.to_owned()))?;
    let patched = patch_sheet_xml(&xml, writes).with_prefix(&zip_path)?;
    log::debug!("Patched {} cells into '{}' of '{}'", writes.len(), zip_path, workbook.name);

    let mut replacements = HashMap::new();
    replacements.insert(zip_path, patched);
    workbook.zip.rebuild_with(&replacements)
}

/// Rewrites a worksheet part so that it contains the given cells.
///
/// Existing rows and cells are copied in document order. A write at an occupied
/// position replaces that cell and keeps its style; other writes are inserted in column order within
/// their row, and rows that do not exist yet are inserted in row order. Touched
/// rows lose their `spans` hint and `<dimension>` grows to cover the writes.
pub(crate) fn patch_sheet_xml(xml: &[u8], writes: &[CellWrite]) -> Result<Vec<u8>, RustyTemplateError> {
    let mut pending = PendingCells::new();
    for write in writes.iter().filter(|write| write.row > 0 && write.col > 0) {
        pending.entry(write.row).or_default().insert(write.col, write.value.as_str());
    }
    let max_row = pending.keys().next_back().copied().unwrap_or(0);
    let max_col = pending.values().filter_map(|cells| cells.keys().next_back()).copied().max().unwrap_or(0);

    let mut reader = XmlReader::new(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + writes.len() * 64));
    let mut in_sheet_data = false;
    let mut row_number = 0usize;
    let mut next_col = 1usize;
    let mut row_cells: Option<BTreeMap<usize, &str>> = None;
    let mut skip_cell = false;
    while let Some(event) = reader.next()? {
        if skip_cell {
            if let Event::End(event) = &event {
                skip_cell = event.name() != TAG_CELL;
            }
            continue;
        }
        match event {
            Event::Start(event) if event.name() == TAG_DIMENSION => {
                let reference = event.get_attribute_value("ref")?.map(|reference| reference.to_string());
                let reference = grow_dimension(reference.as_deref(), max_row, max_col);
                let element = event.without_attributes(&["ref"])?.with_attributes([("ref", reference.as_str())]);
                writer.write_event(Event::Start(element))?;
            }
            Event::Start(event) if event.name() == TAG_SHEET_DATA => {
                in_sheet_data = true;
                writer.write_event(Event::Start(event))?;
            }
            Event::End(event) if event.name() == TAG_SHEET_DATA => {
                write_rows_before(&mut writer, &mut pending, usize::MAX)?;
                in_sheet_data = false;
                writer.write_event(Event::End(event))?;
            }
            Event::Start(event) if in_sheet_data && event.name() == TAG_ROW => {
                row_number = event.get_attribute_value("r")?
                    .and_then(|number| number.parse::<usize>().ok())
                    .unwrap_or(row_number + 1);
                next_col = 1;
                write_rows_before(&mut writer, &mut pending, row_number)?;
                row_cells = pending.remove(&row_number);
                if row_cells.is_some() {
                    writer.write_event(Event::Start(event.without_attributes(&["spans"])?))?;
                } else {
                    writer.write_event(Event::Start(event.borrow()))?;
                }
            }
            Event::End(event) if in_sheet_data && event.name() == TAG_ROW => {
                if let Some(mut cells) = row_cells.take() {
                    write_cells_before(&mut writer, row_number, &mut cells, usize::MAX)?;
                }
                writer.write_event(Event::End(event))?;
            }
            Event::Start(event) if row_cells.is_some() && event.name() == TAG_CELL => {
                let col = event.get_attribute_value("r")?
                    .and_then(|reference| reference_to_index(&reference))
                    .map(|(_, col)| col + 1)
                    .unwrap_or(next_col);
                next_col = col + 1;
                if let Some(cells) = row_cells.as_mut() {
                    write_cells_before(&mut writer, row_number, cells, col)?;
                    if let Some(value) = cells.remove(&col) {
                        let style = event.get_attribute_value("s")?;
                        writer.write_inline_string_cell(&index_to_reference(row_number - 1, col - 1), style.as_deref(), value)?;
                        skip_cell = true;
                        continue;
                    }
                }
                writer.write_event(Event::Start(event.borrow()))?;
            }
            event => writer.write_event(event)?,
        }
    }
    Ok(writer.into_inner())
}

/// Writes the pending rows numbered below `row` as new rows
fn write_rows_before<W: Write>(writer: &mut Writer<W>, pending: &mut PendingCells, row: usize) -> Result<(), RustyTemplateError> {
    while let Some(entry) = pending.first_entry() {
        if *entry.key() >= row {
            break;
        }
        let (number, mut cells) = entry.remove_entry();
        writer.write_row_start(number)?;
        write_cells_before(writer, number, &mut cells, usize::MAX)?;
        writer.write_end("row")?;
    }
    Ok(())
}

/// Writes the pending cells of a row that sit left of `col`
fn write_cells_before<W: Write>(writer: &mut Writer<W>, row: usize, cells: &mut BTreeMap<usize, &str>, col: usize) -> Result<(), RustyTemplateError> {
    while let Some(entry) = cells.first_entry() {
        if *entry.key() >= col {
            break;
        }
        let (cell_col, value) = entry.remove_entry();
        writer.write_inline_string_cell(&index_to_reference(row - 1, cell_col - 1), None, value)?;
    }
    Ok(())
}

/// Extends a `<dimension ref>` so its bottom-right corner covers (max_row, max_col)
fn grow_dimension(reference: Option<&str>, max_row: usize, max_col: usize) -> String {
    let reference = reference.unwrap_or("A1");
    let (start, end) = reference.split_once(':').unwrap_or((reference, reference));
    let (end_row, end_col) = reference_to_index(end).unwrap_or((0, 0));
    let end = index_to_reference(end_row.max(max_row.saturating_sub(1)), end_col.max(max_col.saturating_sub(1)));
    if start.eq_ignore_ascii_case(&end) {
        end
    } else {
        format!("{start}:{end}")
    }
}
