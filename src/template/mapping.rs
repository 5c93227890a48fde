//! Per-company label to field mappings and where they are kept.

use crate::error::ResultMessage;
use crate::error::RustyTemplateError;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::RwLock;
use thiserror::Error;

const DEFAULT_PAGE: u32 = 1;
const DEFAULT_COORDINATE: f64 = 10.0;
const DEFAULT_SIZE: u32 = 10;

#[derive(Error, Debug)]
pub enum MappingError {
    #[error("Stored mapping of company {0} is not valid JSON: {1}")]
    CorruptMapping(i64, serde_json::Error),

    #[error("Mapping store lock is poisoned")]
    LockPoisoned,
}

/// Where one field is drawn on a PDF template page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfFieldMapping {
    #[serde(default)]
    pub label: Option<String>,
    pub page: u32,
    pub x: f64,
    pub y: f64,
    pub size: u32,
    pub field: String,
}

/// The mapping a company keeps for its template
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    /// Position key (`R{row}C{col}` or `h{i}`) to field name
    #[serde(default)]
    pub excel: BTreeMap<String, String>,
    #[serde(default)]
    pub pdf: Vec<PdfFieldMapping>,
}

/// A PDF placement as submitted; every part is optional and loosely typed
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PdfMappingInput {
    #[serde(default)]
    pub label: Option<Value>,
    #[serde(default)]
    pub page: Option<Value>,
    #[serde(default)]
    pub x: Option<Value>,
    #[serde(default)]
    pub y: Option<Value>,
    #[serde(default)]
    pub size: Option<Value>,
    #[serde(default)]
    pub field: Option<Value>,
}

/// An operator's submission from the mapping screen
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SaveRequest {
    /// Position key to selected field; null or "" means skip
    #[serde(default)]
    pub mapping: BTreeMap<String, Option<String>>,
    #[serde(default)]
    pub pdf_mappings: Option<Vec<PdfMappingInput>>,
}

impl Mapping {
    /// Applies an explicit save.
    ///
    /// The `excel` map is replaced by the entries that name a field. The `pdf` list is
    /// replaced only when the request carries a non-empty list.
    pub fn apply_save(&mut self, request: SaveRequest) {
        self.excel = request.mapping
            .into_iter()
            .filter_map(|(key, field)| {
                let field = field.map(|field| field.trim().to_owned()).unwrap_or_default();
                (!field.is_empty()).then_some((key, field))
            })
            .collect();

        if let Some(inputs) = request.pdf_mappings.filter(|inputs| !inputs.is_empty()) {
            self.pdf = inputs
                .into_iter()
                .filter_map(|input| {
                    let mapping = input.coerce();
                    if mapping.is_none() {
                        log::warn!("Dropped PDF placement without a field");
                    }
                    mapping
                })
                .collect();
        }
    }

    /// Merges suggested entries: suggested keys overwrite, other stored keys stay.
    pub fn apply_suggestions(&mut self, suggestions: BTreeMap<String, String>) {
        self.excel.extend(suggestions);
    }

    pub fn is_empty(&self) -> bool {
        self.excel.is_empty() && self.pdf.is_empty()
    }
}

impl PdfMappingInput {
    /// Converts to a placement, defaulting numbers that are absent or unreadable.
    /// Returns None when no field is named.
    pub fn coerce(self) -> Option<PdfFieldMapping> {
        let field = self.field.as_ref().and_then(as_text).filter(|field| !field.is_empty())?;
        Some(PdfFieldMapping {
            label: self.label.as_ref().and_then(as_text).filter(|label| !label.is_empty()),
            page: as_number(self.page.as_ref())
                .filter(|page| *page >= 1.0)
                .map(|page| page.trunc() as u32)
                .unwrap_or(DEFAULT_PAGE),
            x: as_number(self.x.as_ref()).unwrap_or(DEFAULT_COORDINATE),
            y: as_number(self.y.as_ref()).unwrap_or(DEFAULT_COORDINATE),
            size: as_number(self.size.as_ref())
                .filter(|size| *size >= 1.0)
                .map(|size| size.trunc() as u32)
                .unwrap_or(DEFAULT_SIZE),
            field,
        })
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.trim().to_owned()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn as_number(value: Option<&Value>) -> Option<f64> {
    let number = match value? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|number| number.is_finite())
}

/// Keeps one mapping per company. Saves are last-write-wins.
pub trait MappingStore {
    /// Returns the stored mapping, empty when none was saved
    fn load(&self, company_id: i64) -> Result<Mapping, RustyTemplateError>;

    fn store(&self, company_id: i64, mapping: &Mapping) -> Result<(), RustyTemplateError>;
}

/// Mappings held in memory
#[derive(Debug, Default)]
pub struct MemoryMappingStore {
    mappings: RwLock<HashMap<i64, Mapping>>,
}

impl MemoryMappingStore {
    pub fn new() -> MemoryMappingStore {
        MemoryMappingStore::default()
    }
}

impl MappingStore for MemoryMappingStore {
    fn load(&self, company_id: i64) -> Result<Mapping, RustyTemplateError> {
        let mappings = self.mappings.read().map_err(|_| MappingError::LockPoisoned)?;
        Ok(mappings.get(&company_id).cloned().unwrap_or_default())
    }

    fn store(&self, company_id: i64, mapping: &Mapping) -> Result<(), RustyTemplateError> {
        let mut mappings = self.mappings.write().map_err(|_| MappingError::LockPoisoned)?;
        mappings.insert(company_id, mapping.to_owned());
        Ok(())
    }
}

/// Mappings kept as `company_{id}.json` files in a directory
#[derive(Debug, Clone)]
pub struct JsonMappingStore {
    directory: PathBuf,
}

impl JsonMappingStore {
    pub fn new(directory: &Path) -> JsonMappingStore {
        JsonMappingStore {
            directory: directory.to_path_buf(),
        }
    }

    fn path(&self, company_id: i64) -> PathBuf {
        self.directory.join(format!("company_{company_id}.json"))
    }
}

impl MappingStore for JsonMappingStore {
    fn load(&self, company_id: i64) -> Result<Mapping, RustyTemplateError> {
        let path = self.path(company_id);
        if !path.exists() {
            return Ok(Mapping::default());
        }
        let text = std::fs::read_to_string(&path)
            .map_err(RustyTemplateError::from)
            .with_prefix(&path.to_string_lossy())?;
        let mapping = serde_json::from_str(&text).map_err(|error| MappingError::CorruptMapping(company_id, error))?;
        Ok(mapping)
    }

    fn store(&self, company_id: i64, mapping: &Mapping) -> Result<(), RustyTemplateError> {
        std::fs::create_dir_all(&self.directory)
            .map_err(RustyTemplateError::from)
            .with_prefix(&self.directory.to_string_lossy())?;
        let path = self.path(company_id);
        // Write next to the target and rename so readers never see a partial file
        let staging = path.with_extension("json.tmp");
        std::fs::write(&staging, serde_json::to_vec_pretty(mapping)?)?;
        std::fs::rename(&staging, &path)
            .map_err(RustyTemplateError::from)
            .with_prefix(&path.to_string_lossy())?;
        log::debug!("Stored mapping of company {} in '{}'", company_id, path.display());
        Ok(())
    }
}
