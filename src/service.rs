//! Company-level operations: inspecting a template, saving its mapping, turning PDF
//! templates into HTML templates and producing populated documents.

use crate::config::TemplateConfig;
use crate::error::ResultMessage;
use crate::error::RustyTemplateError;
use crate::spreadsheet::writer::patch_workbook;
use crate::spreadsheet::XlsxWorkbook;
use crate::staff::sort_for_population;
use crate::staff::StaffRecord;
use crate::template::alias::AliasResolver;
use crate::template::alias::ResolutionSource;
use crate::template::detect::detect_header;
use crate::template::detect::HeaderDetection;
use crate::template::detect::Label;
use crate::template::html::html_labels;
use crate::template::mapping::Mapping;
use crate::template::mapping::MappingStore;
use crate::template::mapping::SaveRequest;
use crate::template::pdf::generated_template_name;
use crate::template::pdf::header_labels;
use crate::template::pdf::render_html_template;
use crate::template::pdf::suggest_mappings;
use crate::template::pdf::PdfCanvas;
use crate::template::pdf::PdfTextSource;
use crate::template::populate::plan_workbook;
use crate::template::populate::populate_pdf;
use crate::template::Orientation;
use crate::template::TemplateError;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// What kind of document a company's template is
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TemplateKind {
    #[default]
    Excel,
    Pdf,
    Html,
}

/// The parts of a company the template engine works with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub template_path: Option<PathBuf>,
    #[serde(default)]
    pub template_kind: TemplateKind,
}

/// Everything the mapping screen shows for a template
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateMeta {
    pub layout: TemplateKind,
    /// Name of the sheet holding the header, for workbooks
    pub sheet: Option<String>,
    pub orientation: Orientation,
    /// 1-based for workbooks, 0 for HTML and PDF templates
    pub header_index: usize,
    pub labels: Vec<Label>,
    pub mapping: Mapping,
}

/// Result of turning a PDF template into an HTML template
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PdfAnalysis {
    pub template_path: PathBuf,
    pub labels: Vec<String>,
    pub suggestions: BTreeMap<String, String>,
    /// The stored mapping after merging the suggestions
    pub mapping: Mapping,
}

/// Runs template operations against one configuration and mapping store.
pub struct TemplateService<S: MappingStore> {
    config: TemplateConfig,
    resolver: AliasResolver,
    store: S,
}

impl<S: MappingStore> TemplateService<S> {
    pub fn new(config: TemplateConfig, store: S) -> TemplateService<S> {
        let resolver = AliasResolver::new(&config);
        TemplateService { config, resolver, store }
    }

    pub fn config(&self) -> &TemplateConfig {
        &self.config
    }

    pub fn resolver(&self) -> &AliasResolver {
        &self.resolver
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Path of the company's template, which must exist on disk
    fn template_path<'a>(&self, company: &'a Company) -> Result<&'a Path, TemplateError> {
        match &company.template_path {
            Some(path) if path.is_file() => Ok(path),
            Some(path) => Err(TemplateError::TemplateMissing(path.display().to_string())),
            None => Err(TemplateError::TemplateMissing(format!("no template uploaded for '{}'", company.name))),
        }
    }

    fn require_kind(company: &Company, allowed: &[TemplateKind]) -> Result<(), TemplateError> {
        if allowed.contains(&company.template_kind) {
            Ok(())
        } else {
            Err(TemplateError::UnsupportedTemplateKind(company.template_kind.to_string()))
        }
    }

    /// Detects the header of a workbook template.
    pub fn detect_workbook(&self, path: &Path) -> Result<HeaderDetection, RustyTemplateError> {
        let workbook = XlsxWorkbook::open(path).with_prefix(&path.to_string_lossy())?;
        Ok(detect_header(workbook.sheets(), &self.resolver, &self.config)?)
    }

    /// Labels, layout and stored mapping of the company's template.
    pub fn template_meta(&self, company: &Company) -> Result<TemplateMeta, RustyTemplateError> {
        let path = self.template_path(company)?;
        let mapping = self.store.load(company.id)?;
        match company.template_kind {
            TemplateKind::Excel => {
                let detection = self.detect_workbook(path)?;
                Ok(TemplateMeta {
                    layout: TemplateKind::Excel,
                    sheet: Some(detection.sheet_name),
                    orientation: detection.orientation,
                    header_index: detection.header_index,
                    labels: detection.labels,
                    mapping,
                })
            }
            TemplateKind::Html => {
                let html = std::fs::read_to_string(path)
                    .map_err(RustyTemplateError::from)
                    .with_prefix(&path.to_string_lossy())?;
                let labels = html_labels(&html)
                    .into_iter()
                    .enumerate()
                    .map(|(index, value)| self.html_label(index, value))
                    .collect();
                Ok(TemplateMeta {
                    layout: TemplateKind::Html,
                    sheet: None,
                    orientation: Orientation::Horizontal,
                    header_index: 0,
                    labels,
                    mapping,
                })
            }
            TemplateKind::Pdf => Ok(TemplateMeta {
                layout: TemplateKind::Pdf,
                sheet: None,
                orientation: Orientation::Horizontal,
                header_index: 0,
                labels: Vec::new(),
                mapping,
            }),
        }
    }

    fn html_label(&self, index: usize, value: String) -> Label {
        let resolution = self.resolver.resolve(&value);
        let known = resolution.source != ResolutionSource::Unresolved && self.resolver.is_known(&resolution.field);
        Label {
            key: format!("h{}", index + 1),
            row: 1,
            col: index + 1,
            value,
            resolved_field: resolution.field,
            known,
        }
    }

    /// Applies an operator's save and returns the stored mapping.
    pub fn save_mapping(&self, company: &Company, request: SaveRequest) -> Result<Mapping, RustyTemplateError> {
        let mut mapping = self.store.load(company.id)?;
        mapping.apply_save(request);
        self.store.store(company.id, &mapping)?;
        log::info!(
            "Saved mapping of company {}: {} labels, {} PDF placements",
            company.id,
            mapping.excel.len(),
            mapping.pdf.len()
        );
        Ok(mapping)
    }

    /// Generates an HTML template from the header line of a PDF template.
    ///
    /// Suggested fields are merged into the stored mapping and the company is switched
    /// to the generated template.
    pub fn analyze_pdf<T: PdfTextSource>(&self, company: &mut Company, source: &T) -> Result<PdfAnalysis, RustyTemplateError> {
        Self::require_kind(company, &[TemplateKind::Pdf])?;
        let path = self.template_path(company)?;
        let pages = source.page_texts(path).with_prefix(&path.to_string_lossy())?;
        let labels = header_labels(pages.first().map(String::as_str).unwrap_or_default());

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();
        std::fs::create_dir_all(&self.config.template_dir)
            .map_err(RustyTemplateError::from)
            .with_prefix(&self.config.template_dir.to_string_lossy())?;
        let template_path = self.config.template_dir.join(generated_template_name(&company.name, timestamp));
        std::fs::write(&template_path, render_html_template(&labels))
            .map_err(RustyTemplateError::from)
            .with_prefix(&template_path.to_string_lossy())?;

        let suggestions = suggest_mappings(&labels, &self.resolver);
        let mut mapping = self.store.load(company.id)?;
        mapping.apply_suggestions(suggestions.to_owned());
        self.store.store(company.id, &mapping)?;

        log::info!(
            "Generated '{}' with {} labels, {} suggested",
            template_path.display(),
            labels.len(),
            suggestions.len()
        );
        company.template_path = Some(template_path.to_owned());
        company.template_kind = TemplateKind::Html;
        Ok(PdfAnalysis {
            template_path,
            labels,
            suggestions,
            mapping,
        })
    }

    /// Populates the company's workbook template into `{export_dir}/company_{id}_staff.xlsx`.
    pub fn populate_workbook(&self, company: &Company, staff: &[StaffRecord]) -> Result<PathBuf, RustyTemplateError> {
        let output = self.config.export_dir.join(format!("company_{}_staff.xlsx", company.id));
        self.populate_workbook_to(company, staff, &output)?;
        Ok(output)
    }

    /// Populates the company's workbook template into the given file.
    pub fn populate_workbook_to(&self, company: &Company, staff: &[StaffRecord], output: &Path) -> Result<(), RustyTemplateError> {
        Self::require_kind(company, &[TemplateKind::Excel])?;
        let path = self.template_path(company)?;
        let mut workbook = XlsxWorkbook::open(path).with_prefix(&path.to_string_lossy())?;
        let detection = detect_header(workbook.sheets(), &self.resolver, &self.config)?;
        let mapping = self.store.load(company.id)?;

        let mut staff = staff.to_vec();
        sort_for_population(&mut staff);
        let plan = plan_workbook(&detection, &mapping, &staff, &self.resolver)?;
        let bytes = patch_workbook(&mut workbook, plan.sheet_index, &plan.writes)?;

        if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(RustyTemplateError::from)
                .with_prefix(&parent.to_string_lossy())?;
        }
        std::fs::write(output, bytes)
            .map_err(RustyTemplateError::from)
            .with_prefix(&output.to_string_lossy())?;
        log::info!("Wrote {} staff lines to '{}'", plan.data_rows(), output.display());
        Ok(())
    }

    /// Fills the company's PDF template on `canvas` and writes
    /// `{export_dir}/company_{id}_staff.pdf`.
    pub fn populate_pdf<C: PdfCanvas>(&self, company: &Company, staff: &[StaffRecord], canvas: &mut C) -> Result<PathBuf, RustyTemplateError> {
        Self::require_kind(company, &[TemplateKind::Pdf])?;
        self.template_path(company)?;
        let mapping = self.store.load(company.id)?;

        let mut staff = staff.to_vec();
        sort_for_population(&mut staff);
        populate_pdf(&company.name, &mapping, &staff, &self.resolver, canvas)?;

        let output = self.config.export_dir.join(format!("company_{}_staff.pdf", company.id));
        if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        canvas.finish(&output)?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::fixture::build_xlsx;
    use crate::spreadsheet::fixture::row;
    use crate::spreadsheet::fixture::FixtureSheet;
    use crate::spreadsheet::Worksheet;
    use crate::staff::tests::record;
    use crate::template::mapping::MemoryMappingStore;
    use crate::template::pdf::tests::RecordingCanvas;
    use serde_json::json;
    use tempfile::TempDir;

    struct FixedText(Vec<String>);

    impl PdfTextSource for FixedText {
        fn page_texts(&self, _path: &Path) -> Result<Vec<String>, RustyTemplateError> {
            Ok(self.0.to_owned())
        }
    }

    fn service(temp: &TempDir) -> TemplateService<MemoryMappingStore> {
        let mut config = TemplateConfig::default();
        config.template_dir = temp.path().join("templates");
        config.export_dir = temp.path().join("exports");
        TemplateService::new(config, MemoryMappingStore::new())
    }

    fn company(path: Option<PathBuf>, kind: TemplateKind) -> Company {
        Company {
            id: 7,
            name: "Acme Ltd".to_owned(),
            template_path: path,
            template_kind: kind,
        }
    }

    fn write_template(temp: &TempDir, name: &str, data: &str) -> PathBuf {
        let path = temp.path().join(name);
        std::fs::write(&path, build_xlsx(&[FixtureSheet { name: "Staff", data }], &[], None, false)).unwrap();
        path
    }

    #[test]
    fn test_missing_template() {
        let temp = tempfile::tempdir().unwrap();
        let service = service(&temp);

        let error = service.template_meta(&company(None, TemplateKind::Excel)).err().unwrap();
        assert!(matches!(error.as_template_error(), Some(TemplateError::TemplateMissing(_))));

        let gone = company(Some(temp.path().join("gone.xlsx")), TemplateKind::Excel);
        let error = service.populate_workbook(&gone, &[record(1, "Ann", "Lee")]).err().unwrap();
        assert!(matches!(error.as_template_error(), Some(TemplateError::TemplateMissing(_))));
    }

    #[test]
    fn test_workbook_meta_and_population() {
        let temp = tempfile::tempdir().unwrap();
        let service = service(&temp);
        let header = row(1, &[("A1", "Staff No"), ("B1", "Name"), ("C1", "E-mail")]);
        let company = company(Some(write_template(&temp, "template.xlsx", &header)), TemplateKind::Excel);

        let meta = service.template_meta(&company).unwrap();
        assert_eq!(meta.sheet.as_deref(), Some("Staff"));
        assert_eq!(meta.header_index, 1);
        assert_eq!(meta.labels.iter().map(|label| label.known).collect::<Vec<_>>(), vec![true, false, true]);

        let request: SaveRequest = serde_json::from_value(json!({"mapping": {"R1C2": "last_name"}})).unwrap();
        let saved = service.save_mapping(&company, request).unwrap();
        assert_eq!(service.template_meta(&company).unwrap().mapping, saved);

        // Records are written in id order
        let staff = vec![record(2, "Bo", "Ng"), record(1, "Ann", "Lee")];
        let output = service.populate_workbook(&company, &staff).unwrap();
        assert_eq!(output, temp.path().join("exports").join("company_7_staff.xlsx"));

        let populated = XlsxWorkbook::open(&output).unwrap();
        let sheet = &populated.sheets()[0];
        assert_eq!(sheet.formatted_value(1, 2).as_deref(), Some("Name"));
        assert_eq!(sheet.formatted_value(2, 1).as_deref(), Some("EMP-0001"));
        assert_eq!(sheet.formatted_value(2, 2).as_deref(), Some("Lee"));
        assert_eq!(sheet.formatted_value(2, 3).as_deref(), Some("ann@example.com"));
        assert_eq!(sheet.formatted_value(3, 2).as_deref(), Some("Ng"));
        assert_eq!(sheet.highest_row(), 3);
    }

    #[test]
    fn test_workbook_without_header() {
        let temp = tempfile::tempdir().unwrap();
        let service = service(&temp);
        let company = company(Some(write_template(&temp, "blank.xlsx", "")), TemplateKind::Excel);
        let error = service.template_meta(&company).err().unwrap();
        assert!(matches!(error.as_template_error(), Some(TemplateError::NoHeaderFound)));
    }

    #[test]
    fn test_analyze_pdf() {
        let temp = tempfile::tempdir().unwrap();
        let service = service(&temp);
        let pdf_path = temp.path().join("form.pdf");
        std::fs::write(&pdf_path, b"%PDF-1.4").unwrap();
        let mut company = company(Some(pdf_path), TemplateKind::Pdf);

        let mut existing = Mapping::default();
        existing.excel.insert("h1".to_owned(), "status".to_owned());
        existing.excel.insert("h9".to_owned(), "notes".to_owned());
        service.store().store(company.id, &existing).unwrap();

        let source = FixedText(vec!["Staff Roster\nEmployee ID    Surname    Favourite Colour\n".to_owned(), "page two".to_owned()]);
        let analysis = service.analyze_pdf(&mut company, &source).unwrap();

        assert_eq!(analysis.labels, vec!["Employee ID", "Surname", "Favourite Colour"]);
        assert_eq!(analysis.suggestions, BTreeMap::from([
            ("h1".to_owned(), "employee_id".to_owned()),
            ("h2".to_owned(), "last_name".to_owned()),
        ]));
        // Suggestions overwrite their keys, other stored keys survive
        assert_eq!(analysis.mapping.excel, BTreeMap::from([
            ("h1".to_owned(), "employee_id".to_owned()),
            ("h2".to_owned(), "last_name".to_owned()),
            ("h9".to_owned(), "notes".to_owned()),
        ]));
        assert_eq!(company.template_kind, TemplateKind::Html);
        assert_eq!(company.template_path.as_ref(), Some(&analysis.template_path));
        assert!(analysis.template_path.starts_with(temp.path().join("templates")));
        let file_name = analysis.template_path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(file_name.starts_with("acme-ltd_generated_template_"));

        let meta = service.template_meta(&company).unwrap();
        assert_eq!(meta.layout, TemplateKind::Html);
        assert_eq!(meta.header_index, 0);
        let labels: Vec<(&str, &str)> = meta.labels.iter().map(|label| (label.key.as_str(), label.value.as_str())).collect();
        assert_eq!(labels, vec![("h1", "Employee ID"), ("h2", "Surname"), ("h3", "Favourite Colour")]);

        // Already converted
        let error = service.analyze_pdf(&mut company, &source).err().unwrap();
        assert!(matches!(error.as_template_error(), Some(TemplateError::UnsupportedTemplateKind(_))));
    }

    #[test]
    fn test_populate_pdf() {
        let temp = tempfile::tempdir().unwrap();
        let service = service(&temp);
        let pdf_path = temp.path().join("form.pdf");
        std::fs::write(&pdf_path, b"%PDF-1.4").unwrap();
        let company = company(Some(pdf_path), TemplateKind::Pdf);

        let request: SaveRequest = serde_json::from_value(json!({
            "mapping": {},
            "pdf_mappings": [{"page": "1", "x": 40, "y": 50.5, "size": 11, "field": "last_name"}]
        }))
        .unwrap();
        service.save_mapping(&company, request).unwrap();

        let meta = service.template_meta(&company).unwrap();
        assert_eq!(meta.layout, TemplateKind::Pdf);
        assert!(meta.labels.is_empty());

        let mut canvas = RecordingCanvas::with_pages(1);
        let output = service.populate_pdf(&company, &[record(2, "Bo", "Ng"), record(1, "Ann", "Lee")], &mut canvas).unwrap();
        assert_eq!(canvas.operations, vec![
            "page 1".to_owned(),
            "text 1 40 50.5 11 Lee".to_owned(),
            "page 1".to_owned(),
            "text 1 40 50.5 11 Ng".to_owned(),
        ]);
        assert_eq!(canvas.finished, Some(output.to_owned()));
        assert_eq!(output, temp.path().join("exports").join("company_7_staff.pdf"));

        let error = service.populate_workbook(&company, &[record(1, "Ann", "Lee")]).err().unwrap();
        assert!(matches!(error.as_template_error(), Some(TemplateError::UnsupportedTemplateKind(_))));
    }
}
