//! Parts of a SpreadsheetML package shared by the reader and the writer
use crate::error::RustyTemplateError;
use crate::helpers::reader::UnifiedReader;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use std::collections::HashMap;
use zip::ZipArchive;

const TAG_RELATIONSHIP: &[u8] = b"Relationship";
const WORKSHEET_RELATIONSHIP_SUFFIX: &str = "/worksheet";

/// Opens the zip container of a workbook.
///
/// Password protected workbooks are stored as compound files instead of zip
/// archives and are rejected with [`SpreadsheetError::Encrypted`].
pub(super) fn open_package(file_name: &str, mut reader: UnifiedReader) -> Result<ZipArchive<UnifiedReader>, RustyTemplateError> {
    if reader.is_compound_file()? {
        Err(SpreadsheetError::Encrypted(file_name.to_owned()))?;
    }
    Ok(ZipArchive::new(reader)?)
}

/// Worksheet relationships of a part, keyed by relationship id
///
/// # Arguments
/// * `zip` - Package archive
/// * `path` - Relationships part, e.g. `xl/_rels/workbook.xml.rels`
///
/// # Returns
/// Relationship id to the archive path of the target worksheet
pub(super) fn worksheet_relationships(zip: &mut ZipArchive<UnifiedReader>, path: &str) -> Result<HashMap<String, String>, RustyTemplateError> {
    let mut reader = zip.xml_reader(path)?
        .ok_or_else(|| SpreadsheetError::FileError(path.to_owned()))?;
    let base = source_directory(path);
    let mut relationships = HashMap::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let is_worksheet = event.get_attribute_value("Type")?
                .map(|kind| kind.ends_with(WORKSHEET_RELATIONSHIP_SUFFIX))
                .unwrap_or(true);
            let id = event.get_attribute_value("Id")?;
            let target = event.get_attribute_value("Target")?;
            if let (true, Some(id), Some(target)) = (is_worksheet, id, target) {
                relationships.insert(id.into_owned(), resolve_target(&base, &target));
            }
        }
    });
    Ok(relationships)
}

/// Directory of the part a relationships file belongs to: `xl/_rels/workbook.xml.rels` gives `xl`
fn source_directory(rels_path: &str) -> String {
    let directory = rels_path.rsplit_once('/').map(|(directory, _)| directory).unwrap_or("");
    directory.strip_suffix("_rels").unwrap_or(directory).trim_end_matches('/').to_owned()
}

/// Resolves a relationship target against the source directory.
/// Absolute targets start at the package root; `..` climbs one level.
pub(crate) fn resolve_target(base: &str, target: &str) -> String {
    let mut segments: Vec<&str> = match target.strip_prefix('/') {
        Some(_) => Vec::new(),
        None => base.split('/').filter(|segment| !segment.is_empty()).collect(),
    };
    for segment in target.trim_start_matches('/').split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }
    segments.join("/")
}

/// Cell type of every style index (`cellXfs` order), looking up custom formats first
pub(super) fn style_cell_types(format_ids: &[String], custom_formats: &HashMap<String, CellType>, is_1904: bool) -> Vec<CellType> {
    format_ids
        .iter()
        .map(|id| {
            custom_formats
                .get(id)
                .copied()
                .or_else(|| CellType::parse_builtin_number_format_id(id, is_1904))
                .unwrap_or(CellType::Number)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_target() {
        assert_eq!(resolve_target("xl", "worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(resolve_target("xl", "/xl/worksheets/sheet2.xml"), "xl/worksheets/sheet2.xml");
        assert_eq!(resolve_target("xl", "./worksheets/../worksheets/sheet3.xml"), "xl/worksheets/sheet3.xml");
        assert_eq!(resolve_target("xl/worksheets", "../drawings/drawing1.xml"), "xl/drawings/drawing1.xml");
    }

    #[test]
    fn test_source_directory() {
        assert_eq!(source_directory("xl/_rels/workbook.xml.rels"), "xl");
        assert_eq!(source_directory("_rels/.rels"), "");
    }

    #[test]
    fn test_style_cell_types() {
        let custom = HashMap::from([("164".to_owned(), CellType::NumberDate1900)]);
        let ids = ["0", "164", "14", "49"].map(str::to_owned);
        assert_eq!(style_cell_types(&ids, &custom, false), vec![
            CellType::Number,
            CellType::NumberDate1900,
            CellType::NumberDate1900,
            CellType::Number,
        ]);
    }
}
