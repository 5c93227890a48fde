use crate::error::ResultMessage;
use crate::error::RustyTemplateError;
use crate::helpers::reader::UnifiedReader;
use crate::helpers::xml::XmlAttributeHelper;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::check_extension;
use crate::spreadsheet::package::open_package;
use crate::spreadsheet::package::style_cell_types;
use crate::spreadsheet::package::worksheet_relationships;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::reference::row_to_index;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;
use zip::ZipArchive;

// XML tag names for parsing Excel XLSX format
const TAG_CUSTOM_FORMATS: QName = QName(b"numFmts"); // Custom number formats container
const TAG_CUSTOM_FORMAT: QName = QName(b"numFmt");   // Individual custom number format
const TAG_FORMAT_INDEXES: QName = QName(b"cellXfs");  // Cell format indexes container
const TAG_FORMAT_INDEX: QName = QName(b"xf");         // Individual cell format index
const TAG_SHARED_STRING_ITEM: QName = QName(b"si");   // Shared string table item
const TAG_PHONETIC_TEXT: QName = QName(b"rPh");       // Phonetic text for Asian languages
const TAG_TEXT: QName = QName(b"t");                  // Text content within strings
const TAG_WORKBOOK_PROPERTIES: QName = QName(b"workbookPr"); // Workbook properties
const TAG_SHEET: QName = QName(b"sheet");             // Worksheet definition
const TAG_ROW: QName = QName(b"row");                 // Row in worksheet
const TAG_CELL: QName = QName(b"c");                  // Cell in worksheet
const TAG_INLINE_STRING: QName = QName(b"is");        // Inline string value
const TAG_VALUE: QName = QName(b"v");                 // Cell value content

/// Represents an opened xlsx workbook with every sheet loaded in memory
pub struct XlsxWorkbook {
    /// File name of the workbook
    pub(crate) name: String,
    /// ZIP archive kept open for writing a patched copy
    pub(crate) zip: ZipArchive<UnifiedReader>,
    /// Sheets in workbook order
    pub(crate) sheets: Vec<Sheet>,
}

impl XlsxWorkbook {
    /// Opens an xlsx workbook from a local path
    ///
    /// # Arguments
    /// * `path` - Path to the workbook (.xlsx, .xlsm, .xltx or .xltm)
    ///
    /// # Returns
    /// Result containing the loaded workbook or an error
    pub fn open(path: &Path) -> Result<XlsxWorkbook, RustyTemplateError> {
        let file_name = path.to_string_lossy().to_string();
        check_extension(&file_name)?;
        let reader = UnifiedReader::open(path).with_prefix(&file_name)?;
        XlsxWorkbook::load(file_name, reader)
    }

    /// Loads an xlsx workbook that is already in memory (an upload)
    pub fn from_bytes(file_name: &str, bytes: Vec<u8>) -> Result<XlsxWorkbook, RustyTemplateError> {
        check_extension(file_name)?;
        XlsxWorkbook::load(file_name.to_owned(), UnifiedReader::from_bytes(bytes))
    }

    fn load(name: String, reader: UnifiedReader) -> Result<XlsxWorkbook, RustyTemplateError> {
        let mut zip = open_package(&name, reader)?;
        let (entries, is_1904) = load_workbook(&mut zip)?;
        if entries.is_empty() {
            Err(SpreadsheetError::EmptyWorkbook(name.to_owned()))?;
        }
        let number_formats = load_number_formats(&mut zip, is_1904)?;
        let shared_strings = load_shared_strings(&mut zip)?;
        let mut sheets = Vec::<Sheet>::with_capacity(entries.len());
        for (sheet_name, zip_path) in &entries {
            let sheet = read_sheet(&mut zip, sheet_name, zip_path, &number_formats, &shared_strings)
                .with_prefix(&format!("{name} [{sheet_name}]"))?;
            log::debug!(
                "Loaded sheet '{}' of '{}': {} cells, {} rows x {} columns",
                sheet.name,
                name,
                sheet.cells.len(),
                sheet.row_upper_bound.map(|row| row + 1).unwrap_or(0),
                sheet.col_upper_bound.map(|col| col + 1).unwrap_or(0),
            );
            sheets.push(sheet);
        }
        Ok(XlsxWorkbook { name, zip, sheets })
    }

    /// Returns the file name of this workbook
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the sheets in workbook order
    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }
}

/// Loads the whole shared string table; an absent part means no shared strings
fn load_shared_strings(zip: &mut ZipArchive<UnifiedReader>) -> Result<Vec<String>, RustyTemplateError> {
    let mut shared_strings = Vec::<String>::new();
    let mut reader = match zip.xml_reader("xl/sharedStrings.xml")? {
        Some(reader) => reader,
        None => return Ok(shared_strings),
    };

    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHARED_STRING_ITEM => {
            let string = read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?;
            shared_strings.push(string);
        }
    });
    Ok(shared_strings)
}

/// Reads the `sheetData` of one worksheet part
///
/// Cells without an `r` attribute take the next position of their row;
/// shared string references are resolved against the loaded table.
fn read_sheet(
    zip: &mut ZipArchive<UnifiedReader>,
    sheet_name: &str,
    zip_path: &str,
    number_formats: &[CellType],
    shared_strings: &[String],
) -> Result<Sheet, RustyTemplateError> {
    let mut sheet = Sheet::new(sheet_name, zip_path);
    let mut reader = zip.xml_reader(zip_path)?
        .ok_or_else(|| SpreadsheetError::FileError(zip_path.to_owned()))?;

    let mut row_count = 0usize;
    let mut next_col = 0usize;
    let mut row = 0usize;
    let mut col = 0usize;
    let mut kind = CellType::default();
    let mut value = String::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_ROW => {
            row = event.get_attribute_value("r")?
                .and_then(|number| row_to_index(&number))
                .unwrap_or(row_count);
            next_col = 0;
        }
        Event::End(event) if event.name() == TAG_ROW => {
            row_count = row + 1;
        }
        Event::Start(event) if event.name() == TAG_CELL => {
            (row, col) = event.get_attribute_value("r")?
                .and_then(|reference| reference_to_index(&reference))
                .unwrap_or((row, next_col));
            next_col = col + 1;
            kind = CellType::from_type_attribute(event.get_attribute_value("t")?.as_deref());
            if kind == CellType::Number {
                if let Some(format_id) = event.get_attribute_value("s")?.filter(|id| !id.is_empty()) {
                    let index = format_id.parse::<usize>()?;
                    kind = number_formats.get(index).copied().unwrap_or(CellType::Number);
                }
            }
            value.clear();
        }
        Event::Start(event) if event.name() == TAG_INLINE_STRING => {
            value = read_string_value(&mut reader, TAG_INLINE_STRING, false)?;
        }
        Event::Start(event) if event.name() == TAG_VALUE => {
            value = read_string_value(&mut reader, TAG_VALUE, true)?;
        }
        Event::End(event) if event.name() == TAG_CELL => {
            if kind == CellType::SharedString {
                let index = value.trim().parse::<usize>()?;
                value = shared_strings.get(index).cloned().unwrap_or_default();
                kind = CellType::InlineString;
            }
            if !value.is_empty() {
                sheet.push(Cell {
                    row,
                    col,
                    kind,
                    value: std::mem::take(&mut value),
                });
            }
            kind = CellType::default();
        }
    });
    Ok(sheet)
}

/// Loads workbook structure and worksheet information from XLSX file
///
/// Parses the workbook.xml file to extract worksheet names and their corresponding
/// XML file paths, and determines the date system (1900 vs 1904) used in the file.
///
/// # Arguments
/// * `zip` - ZIP archive containing the XLSX file
///
/// # Returns
/// Tuple of (worksheets, is_1904_date_system) where worksheets are (name, zip_path) pairs
fn load_workbook(zip: &mut ZipArchive<UnifiedReader>) -> Result<(Vec<(String, String)>, bool), RustyTemplateError> {
    let relationships = worksheet_relationships(zip, "xl/_rels/workbook.xml.rels")?;
    let mut reader = zip.xml_reader("xl/workbook.xml")?
        .ok_or_else(|| SpreadsheetError::FileError("xl/workbook.xml".to_string()))?;
    let mut sheets: Vec<(String, String)> = Vec::new();
    let mut is_1904 = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHEET => {
            let mut name = None::<Cow<str>>;
            let mut id = None::<Cow<str>>;
            for result in event.attributes() {
                let attribute = result?;
                let key = attribute.key.local_name();
                if key.as_ref() == b"name" {
                    name = Some(attribute.get_value()?);
                } else if key.as_ref() == b"id" {
                    id = Some(attribute.get_value()?);
                }
            }
            if let Some((name, id)) = name.zip(id) {
                if let Some(path) = relationships.get(&*id) {
                    sheets.push((name.to_string(), path.to_owned()));
                }
            }
        }
        Event::Start(event) if event.name() == TAG_WORKBOOK_PROPERTIES => {
            is_1904 = event.get_attribute_value("date1904")?
                .map(|value| value.eq("1") || value.eq("true"))
                .unwrap_or(false);
        }
    });
    Ok((sheets, is_1904))
}

/// Loads number formats and cell styles from XLSX styles.xml file
///
/// # Arguments
/// * `zip` - ZIP archive containing the XLSX file
/// * `is_1904` - Whether the file uses the 1904 date system
///
/// # Returns
/// Vector of CellType values indexed by style ID
fn load_number_formats(zip: &mut ZipArchive<UnifiedReader>, is_1904: bool) -> Result<Vec<CellType>, RustyTemplateError> {
    let mut reader = match zip.xml_reader("xl/styles.xml")? {
        Some(reader) => reader,
        None => return Ok(Vec::new()),
    };

    let mut custom_formats_context = false;
    let mut custom_formats = HashMap::<String, CellType>::new();

    let mut format_indexes_context = false;
    let mut format_indexes = Vec::<String>::new();

    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = true,
        Event::End(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = false,
        Event::Start(event) if custom_formats_context && event.name() == TAG_CUSTOM_FORMAT => {
            let id = event.get_attribute_value("numFmtId")?;
            let format = event.get_attribute_value("formatCode")?;
            if let Some((id, format)) = id.zip(format) {
                let style = CellType::parse_custom_number_format(&format, is_1904);
                custom_formats.insert(id.to_string(), style);
            }
        }

        Event::Start(event) if event.name() == TAG_FORMAT_INDEXES => format_indexes_context = true,
        Event::End(event) if event.name() == TAG_FORMAT_INDEXES => break,
        Event::Start(event) if format_indexes_context && event.name() == TAG_FORMAT_INDEX => {
            let id = event.get_attribute_value("numFmtId")?.unwrap_or(Cow::Borrowed("0"));
            format_indexes.push(id.to_string());
        }
    });

    Ok(style_cell_types(&format_indexes, &custom_formats, is_1904))
}

/// Reads string value from XML content, handling text and CDATA sections
///
/// Extracts string content from XML elements, skipping phonetic text annotations.
///
/// # Arguments
/// * `reader` - XML reader positioned at the start of the string content
/// * `end_tag` - XML tag that marks the end of the string content
/// * `is_text_content` - Whether to treat the content as text by default
///
/// # Returns
/// Extracted string value
fn read_string_value<R: BufRead>(
    reader: &mut XmlReader<R>,
    end_tag: QName,
    is_text_content: bool,
) -> Result<String, RustyTemplateError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.name() == end_tag => break,
        Event::Start(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
        Event::End(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.name() == TAG_TEXT => is_text = true,
        Event::End(event) if is_text && event.name() == TAG_TEXT => is_text = false,
        Event::Text(event) if is_text => text.push_str(&event.xml_content()?),
        Event::CData(event) if is_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => text.push_bytes_ref(&event)?,
    });
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::fixture::build_xlsx;
    use crate::spreadsheet::fixture::row;
    use crate::spreadsheet::fixture::FixtureSheet;
    use crate::spreadsheet::Worksheet;
    use crate::template::alias::AliasResolver;
    use crate::template::detect::detect_header;
    use crate::config::TemplateConfig;

    const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<numFmts count="1"><numFmt numFmtId="164" formatCode="dd/mm/yyyy hh:mm"/></numFmts>
<cellXfs count="4"><xf numFmtId="0"/><xf numFmtId="14"/><xf numFmtId="164"/><xf numFmtId="21"/></cellXfs>
</styleSheet>"#;

    #[test]
    fn test_read_shared_and_inline_strings() {
        let data = format!(
            r#"<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row>{}"#,
            row(2, &[("A2", "Smith &amp; Sons"), ("C2", "x")])
        );
        let bytes = build_xlsx(&[FixtureSheet { name: "Staff", data: &data }], &["First Name", "Email"], None, false);
        let workbook = XlsxWorkbook::from_bytes("template.xlsx", bytes).unwrap();

        assert_eq!(workbook.sheets().len(), 1);
        let sheet = &workbook.sheets()[0];
        assert_eq!(sheet.name(), "Staff");
        assert_eq!(sheet.zip_path, "xl/worksheets/sheet1.xml");
        assert_eq!(sheet.highest_row(), 2);
        assert_eq!(sheet.highest_column(), 3);
        assert_eq!(sheet.formatted_value(1, 1).as_deref(), Some("First Name"));
        assert_eq!(sheet.formatted_value(1, 2).as_deref(), Some("Email"));
        assert_eq!(sheet.formatted_value(2, 1).as_deref(), Some("Smith & Sons"));
        assert_eq!(sheet.formatted_value(2, 2), None);
    }

    #[test]
    fn test_read_styled_numbers() {
        let data = r#"<row r="1"><c r="A1" s="1"><v>45292</v></c><c r="B1" s="2"><v>45292.25</v></c><c r="C1" s="3"><v>0.5</v></c><c r="D1"><v>42</v></c><c r="E1" t="b"><v>1</v></c><c r="F1" t="e"><v>#N/A</v></c></row>"#;
        let bytes = build_xlsx(&[FixtureSheet { name: "Sheet1", data }], &[], Some(STYLES), false);
        let workbook = XlsxWorkbook::from_bytes("dates.xlsx", bytes).unwrap();
        let sheet = &workbook.sheets()[0];

        assert_eq!(sheet.formatted_value(1, 1).as_deref(), Some("2024-01-01"));
        assert_eq!(sheet.formatted_value(1, 2).as_deref(), Some("2024-01-01 06:00:00"));
        assert_eq!(sheet.formatted_value(1, 3).as_deref(), Some("12:00:00"));
        assert_eq!(sheet.formatted_value(1, 4).as_deref(), Some("42"));
        assert_eq!(sheet.formatted_value(1, 5).as_deref(), Some("TRUE"));
        assert_eq!(sheet.formatted_value(1, 6).as_deref(), Some("#N/A"));
    }

    #[test]
    fn test_date_styled_serial_out_of_range() {
        let data = format!(r#"{}<row r="2"><c r="A2" s="1"><v>999999999</v></c></row>"#, row(1, &[("A1", "Email"), ("B1", "Phone")]));
        let bytes = build_xlsx(&[FixtureSheet { name: "Staff", data: &data }], &[], Some(STYLES), false);
        let workbook = XlsxWorkbook::from_bytes("serials.xlsx", bytes).unwrap();
        assert_eq!(workbook.sheets()[0].formatted_value(2, 1).as_deref(), Some("999999999"));

        let config = TemplateConfig::default();
        let detection = detect_header(workbook.sheets(), &AliasResolver::new(&config), &config).unwrap();
        assert_eq!(detection.header_index, 1);
        assert_eq!(detection.labels.len(), 2);
    }

    #[test]
    fn test_cells_without_reference() {
        let data = r#"<row><c t="inlineStr"><is><t>a</t></is></c><c t="inlineStr"><is><t>b</t></is></c></row><row r="3"><c r="B3" t="inlineStr"><is><t>c</t></is></c><c t="inlineStr"><is><t>d</t></is></c></row>"#;
        let bytes = build_xlsx(&[FixtureSheet { name: "Sheet1", data }], &[], None, false);
        let workbook = XlsxWorkbook::from_bytes("positions.xlsx", bytes).unwrap();
        let sheet = &workbook.sheets()[0];

        assert_eq!(sheet.formatted_value(1, 1).as_deref(), Some("a"));
        assert_eq!(sheet.formatted_value(1, 2).as_deref(), Some("b"));
        assert_eq!(sheet.formatted_value(3, 2).as_deref(), Some("c"));
        assert_eq!(sheet.formatted_value(3, 3).as_deref(), Some("d"));
    }

    #[test]
    fn test_1904_date_system() {
        let data = r#"<row r="1"><c r="A1" s="1"><v>0</v></c></row>"#;
        let bytes = build_xlsx(&[FixtureSheet { name: "Sheet1", data }], &[], Some(STYLES), true);
        let workbook = XlsxWorkbook::from_bytes("mac.xlsx", bytes).unwrap();
        assert_eq!(workbook.sheets()[0].formatted_value(1, 1).as_deref(), Some("1904-01-01"));
    }

    #[test]
    fn test_sheet_order_and_empty_sheets() {
        let first = row(1, &[("A1", "x")]);
        let bytes = build_xlsx(
            &[FixtureSheet { name: "Cover", data: "" }, FixtureSheet { name: "Data", data: &first }],
            &[],
            None,
            false,
        );
        let workbook = XlsxWorkbook::from_bytes("order.xlsx", bytes).unwrap();
        let names: Vec<&str> = workbook.sheets().iter().map(|sheet| sheet.name()).collect();
        assert_eq!(names, vec!["Cover", "Data"]);
        assert_eq!(workbook.sheets()[0].highest_row(), 0);
    }

    #[test]
    fn test_rejected_workbooks() {
        let error = XlsxWorkbook::from_bytes("empty.xlsx", build_xlsx(&[], &[], None, false)).err().unwrap();
        assert!(matches!(error, RustyTemplateError::SpreadsheetError(SpreadsheetError::EmptyWorkbook(_))));

        let mut compound = vec![0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
        compound.extend_from_slice(&[0u8; 64]);
        let error = XlsxWorkbook::from_bytes("secret.xlsx", compound).err().unwrap();
        assert!(matches!(error, RustyTemplateError::SpreadsheetError(SpreadsheetError::Encrypted(_))));

        let error = XlsxWorkbook::from_bytes("legacy.xls", Vec::new()).err().unwrap();
        assert!(matches!(error, RustyTemplateError::SpreadsheetError(SpreadsheetError::UnsupportedFormat(_))));
    }
}
