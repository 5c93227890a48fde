use crate::config::TemplateConfig;
use crate::staff::StaffField;
use crate::template::normalize::normalize_label;
use serde::Serialize;

/// How a resolved field was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    /// A configured alias variant matched
    Alias,
    /// The normalized label is itself a field name
    KnownField,
    /// Nothing matched; the normalized label is returned as a guess
    Unresolved,
}

/// Result of resolving one label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub field: String,
    pub source: ResolutionSource,
}

/// One alias variant, prepared for comparison
#[derive(Debug, Clone)]
struct Variant {
    lower: String,
    normalized: String,
}

/// Maps labels to fields of the configured vocabulary.
#[derive(Debug, Clone)]
pub struct AliasResolver {
    fields: Vec<StaffField>,
    aliases: Vec<(StaffField, Vec<Variant>)>,
}

impl AliasResolver {
    pub fn new(config: &TemplateConfig) -> AliasResolver {
        let aliases = config.aliases
            .iter()
            .map(|(field, variants)| {
                let variants = variants
                    .iter()
                    .map(|variant| Variant {
                        lower: variant.to_lowercase(),
                        normalized: normalize_label(variant),
                    })
                    .collect();
                (*field, variants)
            })
            .collect();
        AliasResolver {
            fields: config.fields.to_owned(),
            aliases,
        }
    }

    /// Resolves a raw label. Aliases are tried field by field in configuration order
    /// and the first matching variant wins. Never fails.
    pub fn resolve(&self, label: &str) -> Resolution {
        let token = normalize_label(label);
        let raw = label.trim().to_lowercase();
        for (field, variants) in &self.aliases {
            let matched = variants.iter().any(|variant| {
                variant.lower == raw
                    || variant.lower == token
                    || (!token.is_empty() && variant.normalized == token)
            });
            if matched {
                return Resolution {
                    field: field.to_string(),
                    source: ResolutionSource::Alias,
                };
            }
        }
        if self.known_field(&token).is_some() {
            return Resolution {
                field: token,
                source: ResolutionSource::KnownField,
            };
        }
        Resolution {
            field: token,
            source: ResolutionSource::Unresolved,
        }
    }

    /// Looks up a name in the vocabulary
    pub fn known_field(&self, name: &str) -> Option<StaffField> {
        self.fields.iter().copied().find(|field| field.as_ref() == name)
    }

    /// Whether the name is a field of the vocabulary
    pub fn is_known(&self, name: &str) -> bool {
        self.known_field(name).is_some()
    }

    /// The vocabulary in display order
    pub fn fields(&self) -> &[StaffField] {
        &self.fields
    }
}
