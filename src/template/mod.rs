//! Header detection, label resolution, mapping semantics and population of templates.

pub mod alias;
pub mod detect;
pub mod html;
pub mod mapping;
pub mod normalize;
pub mod pdf;
pub mod populate;
pub mod scan;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// User-visible reasons a detection or population run stops
#[derive(Error, Debug, PartialEq)]
pub enum TemplateError {
    #[error("No headers found in template")]
    NoHeaderFound,

    #[error("Template file is missing: {0}")]
    TemplateMissing(String),

    #[error("No mapped fields found for this template")]
    NoMappedFields,

    #[error("No staff data to populate")]
    NoStaffData,

    /// Sheet bounds exceed the configured scan ceiling
    #[error("Sheet '{name}' spans {cells} cells, more than the limit of {limit}")]
    SheetTooLarge { name: String, cells: usize, limit: usize },

    #[error("Operation not supported for {0} templates")]
    UnsupportedTemplateKind(String),
}

/// Direction of the header line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Orientation {
    /// The header is a row; records run downwards
    Horizontal,
    /// The header is a column; records run rightwards
    Vertical,
}
