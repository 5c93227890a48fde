//! Merges staff records into a template using the stored mapping.

use crate::error::RustyTemplateError;
use crate::spreadsheet::writer::CellWrite;
use crate::staff::StaffField;
use crate::staff::StaffRecord;
use crate::template::alias::AliasResolver;
use crate::template::detect::HeaderDetection;
use crate::template::mapping::Mapping;
use crate::template::pdf::PdfCanvas;
use crate::template::Orientation;
use crate::template::TemplateError;
use std::collections::BTreeMap;

/// Header of the staff list appended to PDF templates without placements
pub(crate) const STAFF_TABLE_HEADER: [&str; 5] = ["Employee ID", "First", "Last", "Email", "Phone"];

/// Cells to write into the template sheet
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationPlan {
    pub sheet_index: usize,
    pub orientation: Orientation,
    /// Row or column index to field
    pub positions: BTreeMap<usize, StaffField>,
    pub writes: Vec<CellWrite>,
}

impl PopulationPlan {
    /// Number of data rows (horizontal) or columns (vertical) that received a value
    pub fn data_rows(&self) -> usize {
        let mut lines: Vec<usize> = self.writes
            .iter()
            .map(|write| match self.orientation {
                Orientation::Horizontal => write.row,
                Orientation::Vertical => write.col,
            })
            .collect();
        lines.sort_unstable();
        lines.dedup();
        lines.len()
    }
}

/// Builds the position table: labels whose effective field is in the vocabulary.
/// The saved mapping overrides the resolved field of a label.
pub fn field_positions(detection: &HeaderDetection, mapping: &Mapping, resolver: &AliasResolver) -> BTreeMap<usize, StaffField> {
    let mut positions = BTreeMap::new();
    for label in &detection.labels {
        let effective = mapping.excel.get(&label.key).unwrap_or(&label.resolved_field);
        match resolver.known_field(effective) {
            Some(field) => {
                let position = match detection.orientation {
                    Orientation::Horizontal => label.col,
                    Orientation::Vertical => label.row,
                };
                positions.insert(position, field);
            }
            None => log::debug!("Label {} maps to '{}', not a staff field; skipped", label.key, effective),
        }
    }
    positions
}

/// Plans the cells for every staff record, one line per record after the header.
pub fn plan_workbook(
    detection: &HeaderDetection,
    mapping: &Mapping,
    staff: &[StaffRecord],
    resolver: &AliasResolver,
) -> Result<PopulationPlan, TemplateError> {
    let positions = field_positions(detection, mapping, resolver);
    if positions.is_empty() {
        return Err(TemplateError::NoMappedFields);
    }
    if staff.is_empty() {
        return Err(TemplateError::NoStaffData);
    }

    let mut writes = Vec::with_capacity(staff.len() * positions.len());
    for (index, record) in staff.iter().enumerate() {
        let line = detection.header_index + 1 + index;
        for (position, field) in &positions {
            let Some(value) = record.value(*field) else {
                continue;
            };
            let (row, col) = match detection.orientation {
                Orientation::Horizontal => (line, *position),
                Orientation::Vertical => (*position, line),
            };
            writes.push(CellWrite { row, col, value: value.to_string() });
        }
    }
    log::info!("Planned {} cells for {} staff records across {} fields", writes.len(), staff.len(), positions.len());

    Ok(PopulationPlan {
        sheet_index: detection.sheet_index,
        orientation: detection.orientation,
        positions,
        writes,
    })
}

/// Fills a PDF template for every staff record.
///
/// Without placements the template pages are followed by a staff list. Otherwise every
/// record gets a copy of each template page with its placed fields drawn on it.
pub fn populate_pdf<C: PdfCanvas>(
    company_name: &str,
    mapping: &Mapping,
    staff: &[StaffRecord],
    resolver: &AliasResolver,
    canvas: &mut C,
) -> Result<(), RustyTemplateError> {
    if staff.is_empty() {
        Err(TemplateError::NoStaffData)?;
    }
    let page_count = canvas.template_page_count();

    if mapping.pdf.is_empty() {
        for page in 1..=page_count {
            canvas.append_template_page(page)?;
        }
        let rows: Vec<Vec<String>> = staff
            .iter()
            .map(|record| {
                [StaffField::EmployeeId, StaffField::FirstName, StaffField::LastName, StaffField::Email, StaffField::Phone]
                    .iter()
                    .map(|field| record.value(*field).map(|value| value.to_string()).unwrap_or_default())
                    .collect()
            })
            .collect();
        canvas.append_staff_table(&format!("Staff for {company_name}"), &STAFF_TABLE_HEADER, &rows)?;
        return Ok(());
    }

    for record in staff {
        for page in 1..=page_count {
            canvas.append_template_page(page)?;
            for placement in mapping.pdf.iter().filter(|placement| placement.page == page) {
                let Some(field) = resolver.known_field(&placement.field) else {
                    continue;
                };
                if let Some(value) = record.value(field) {
                    canvas.draw_text(page, placement.x, placement.y, placement.size, &value.to_string())?;
                }
            }
        }
    }
    Ok(())
}
