use thiserror::Error;

/// Main error type for the Rusty Template crate.
/// Aggregates errors from various sources including standard library, dependencies, and internal modules.
#[derive(Error, Debug)]
pub enum RustyTemplateError {
    #[error("{0}")]
    WithContextError(String),

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    #[error("{0}")]
    StringEncodingError(#[from] std::str::Utf8Error),

    // Third-party library errors
    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    #[error("{0}")]
    JsonError(#[from] serde_json::Error),

    // Helper module errors
    #[error("{0}")]
    XmlHelperError(#[from] crate::helpers::xml::XmlError),

    // Spreadsheet module errors
    #[error("{0}")]
    SpreadsheetError(#[from] crate::spreadsheet::SpreadsheetError),

    // Template module errors
    #[error("{0}")]
    TemplateError(#[from] crate::template::TemplateError),

    #[error("{0}")]
    MappingError(#[from] crate::template::mapping::MappingError),

    #[error("{0}")]
    PdfError(#[from] crate::template::pdf::PdfError),

    // Configuration errors
    #[error("{0}")]
    ConfigError(#[from] crate::config::ConfigError),
}

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, RustyTemplateError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| RustyTemplateError::WithContextError(format!("{}: {}", message, e)))
    }
}

impl RustyTemplateError {
    /// Returns the template error behind this error, if there is one.
    ///
    /// Context prefixes are flattened into strings, so only errors that were
    /// propagated without `with_prefix` can be inspected this way.
    pub fn as_template_error(&self) -> Option<&crate::template::TemplateError> {
        match self {
            RustyTemplateError::TemplateError(error) => Some(error),
            _ => None,
        }
    }
}
