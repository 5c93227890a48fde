//! Template engine configuration: the field vocabulary, label aliases and file locations.
//!
//! The defaults are embedded from `config/default.toml`; a deployment can load its
//! own file with the same layout.

use crate::error::ResultMessage;
use crate::error::RustyTemplateError;
use crate::staff::StaffField;
use serde::de::MapAccess;
use serde::de::Visitor;
use serde::Deserialize;
use serde::Deserializer;
use std::fmt;
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Unknown staff field '{0}' in field list")]
    UnknownField(String),

    #[error("Aliases declared for '{0}', which is not in the field list")]
    UnknownAliasField(String),

    #[error("Field list is empty")]
    EmptyVocabulary,
}

/// Validated configuration passed to the resolver, the detector and the service
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateConfig {
    /// Known field vocabulary, in display order
    pub fields: Vec<StaffField>,
    /// Alias variants per field, in declaration order
    pub aliases: Vec<(StaffField, Vec<String>)>,
    /// Upper bound of rows x columns scanned per sheet
    pub max_cells: Option<usize>,
    /// Where generated templates are written
    pub template_dir: PathBuf,
    /// Where populated workbooks are written
    pub export_dir: PathBuf,
}

/// Configuration file layout before validation
#[derive(Debug, Deserialize)]
struct RawConfig {
    fields: Vec<String>,
    #[serde(default)]
    aliases: OrderedAliases,
    max_cells: Option<usize>,
    #[serde(default = "default_template_dir")]
    template_dir: PathBuf,
    #[serde(default = "default_export_dir")]
    export_dir: PathBuf,
}

fn default_template_dir() -> PathBuf {
    PathBuf::from("templates")
}

fn default_export_dir() -> PathBuf {
    PathBuf::from("exports")
}

/// An alias entry: `field = "variant"` or `field = ["variant", ...]`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AliasVariants {
    One(String),
    Many(Vec<String>),
}

impl From<AliasVariants> for Vec<String> {
    fn from(variants: AliasVariants) -> Self {
        match variants {
            AliasVariants::One(variant) => vec![variant],
            AliasVariants::Many(variants) => variants,
        }
    }
}

/// The `[aliases]` table with its document order kept
#[derive(Debug, Default)]
struct OrderedAliases(Vec<(String, Vec<String>)>);

impl<'de> Deserialize<'de> for OrderedAliases {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedAliasesVisitor;

        impl<'de> Visitor<'de> for OrderedAliasesVisitor {
            type Value = OrderedAliases;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a table of field names to alias strings or lists of alias strings")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut aliases = Vec::new();
                while let Some((field, variants)) = map.next_entry::<String, AliasVariants>()? {
                    aliases.push((field, variants.into()));
                }
                Ok(OrderedAliases(aliases))
            }
        }

        deserializer.deserialize_map(OrderedAliasesVisitor)
    }
}

impl TemplateConfig {
    /// Parses and validates a TOML configuration document
    pub fn parse(text: &str) -> Result<TemplateConfig, ConfigError> {
        let raw: RawConfig = toml::from_str(text)?;
        if raw.fields.is_empty() {
            return Err(ConfigError::EmptyVocabulary);
        }

        let fields = raw.fields
            .iter()
            .map(|name| StaffField::from_str(name).map_err(|_| ConfigError::UnknownField(name.to_owned())))
            .collect::<Result<Vec<_>, _>>()?;

        let mut aliases = Vec::with_capacity(raw.aliases.0.len());
        for (name, variants) in raw.aliases.0 {
            match StaffField::from_str(&name) {
                Ok(field) if fields.contains(&field) => aliases.push((field, variants)),
                _ => return Err(ConfigError::UnknownAliasField(name)),
            }
        }

        Ok(TemplateConfig {
            fields,
            aliases,
            max_cells: raw.max_cells,
            template_dir: raw.template_dir,
            export_dir: raw.export_dir,
        })
    }

    /// Reads a configuration file
    pub fn load(path: &Path) -> Result<TemplateConfig, RustyTemplateError> {
        let text = std::fs::read_to_string(path).map_err(RustyTemplateError::from).with_prefix(&path.to_string_lossy())?;
        let config = TemplateConfig::parse(&text).map_err(RustyTemplateError::from).with_prefix(&path.to_string_lossy())?;
        log::debug!(
            "Loaded configuration '{}': {} fields, {} alias entries",
            path.display(),
            config.fields.len(),
            config.aliases.len()
        );
        Ok(config)
    }

    /// Looks up a field of the vocabulary by its snake_case name
    pub fn known_field(&self, name: &str) -> Option<StaffField> {
        StaffField::from_str(name)
            .ok()
            .filter(|field| self.fields.contains(field))
    }
}

impl Default for TemplateConfig {
    fn default() -> Self {
        TemplateConfig::parse(DEFAULT_CONFIG).expect("Embedded default configuration")
    }
}
