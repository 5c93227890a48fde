//! # Rusty Template
//!
//! Header detection, field mapping and population of staff spreadsheet templates.
//!
//! A company uploads a workbook (`.xlsx`, `.xlsm`, `.xltx`, `.xltm`) or a PDF form. The
//! engine finds the most plausible header line of the workbook, a row or a column on any
//! sheet, and resolves each label to a staff field through normalization and configured
//! aliases. Operators confirm or override the resolution, and the saved mapping later
//! drives population of the template with staff records.
//!
//! ## Features
//!
//! - **Header detection**: occupancy based, works on rows and columns of every sheet
//! - **Alias resolution**: configurable label variants per field, first match wins
//! - **Mapping store**: explicit saves replace, suggestions merge
//! - **Population**: patches the template sheet in place, everything else is preserved
//! - **PDF templates**: header guessing from extracted text and field overlays
//!
//! ## Modules
//!
//! - `spreadsheet`: reading and patching SpreadsheetML workbooks
//! - `template`: detection, resolution, mappings and population
//! - `service`: company-level operations tying the pieces together

pub mod config;
pub mod error;
pub(crate) mod helpers;
pub mod service;
pub mod spreadsheet;
pub mod staff;
pub mod template;

pub use crate::config::TemplateConfig;
pub use crate::error::RustyTemplateError;
pub use crate::service::Company;
pub use crate::service::TemplateKind;
pub use crate::service::TemplateService;
pub use crate::staff::StaffField;
pub use crate::staff::StaffRecord;
