//! PDF templates: text extraction, header guessing and the canvas used to fill them.

use crate::error::RustyTemplateError;
use crate::template::alias::AliasResolver;
use crate::template::alias::ResolutionSource;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;

static LINE_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\r?\n").expect("Hardcode regex pattern"));
static WIDE_GAP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").expect("Hardcode regex pattern"));
static TABS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\t+").expect("Hardcode regex pattern"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("Hardcode regex pattern"));
static PLACEHOLDER_DISALLOWED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9_]").expect("Hardcode regex pattern"));
static SLUG_DISALLOWED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("Hardcode regex pattern"));

/// Labels used when the first page yields no header line
const FALLBACK_LABELS: [&str; 4] = ["employee_id", "first_name", "last_name", "email"];

/// Most columns a header line without separators is split into
const MAX_GUESSED_COLUMNS: usize = 8;

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("Cannot extract text from PDF: {0}")]
    ExtractError(String),
}

/// Supplies the text of every page of a PDF file.
pub trait PdfTextSource {
    fn page_texts(&self, path: &Path) -> Result<Vec<String>, RustyTemplateError>;
}

/// Text extraction backed by `pdf-extract`
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractSource;

impl PdfTextSource for PdfExtractSource {
    fn page_texts(&self, path: &Path) -> Result<Vec<String>, RustyTemplateError> {
        let bytes = std::fs::read(path)?;
        let pages = pdf_extract::extract_text_from_mem_by_pages(&bytes)
            .map_err(|e| PdfError::ExtractError(e.to_string()))?;
        log::debug!("Extracted {} pages from {}", pages.len(), path.display());
        Ok(pages)
    }
}

/// Output surface for filled PDF templates. Pages are 1-based.
pub trait PdfCanvas {
    /// Number of pages in the template
    fn template_page_count(&self) -> u32;

    /// Appends a copy of a template page to the output
    fn append_template_page(&mut self, page: u32) -> Result<(), RustyTemplateError>;

    /// Draws text on the most recently appended copy of `page`
    fn draw_text(&mut self, page: u32, x: f64, y: f64, size: u32, text: &str) -> Result<(), RustyTemplateError>;

    /// Appends a page holding a titled table
    fn append_staff_table(&mut self, title: &str, header: &[&str], rows: &[Vec<String>]) -> Result<(), RustyTemplateError>;

    /// Writes the output document
    fn finish(&mut self, path: &Path) -> Result<(), RustyTemplateError>;
}

/// Picks the header line of the first page and splits it into labels.
///
/// The header line is the first non-empty line holding a tab, a run of two or more
/// spaces, or at least four spaces; otherwise the first non-empty line.
pub fn header_labels(first_page_text: &str) -> Vec<String> {
    let lines: Vec<&str> = LINE_BREAK
        .split(first_page_text.trim())
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let candidate = lines
        .iter()
        .find(|line| WIDE_GAP.is_match(line) || line.contains('\t') || line.matches(' ').count() >= 4)
        .or(lines.first());

    let columns: Vec<String> = match candidate {
        Some(line) => split_header_line(line),
        None => Vec::new(),
    };
    let labels: Vec<String> = columns
        .iter()
        .map(|column| WHITESPACE.replace_all(column, " ").trim().to_owned())
        .filter(|label| !label.is_empty())
        .collect();

    if labels.is_empty() {
        log::info!("No header line found on the first page, using default labels");
        return FALLBACK_LABELS.iter().map(|label| label.to_string()).collect();
    }
    labels
}

fn split_header_line(line: &str) -> Vec<String> {
    if line.contains('\t') {
        return TABS.split(line).map(str::to_owned).collect();
    }
    let columns: Vec<String> = WIDE_GAP.split(line).map(str::to_owned).collect();
    if columns.len() > 1 {
        return columns;
    }

    // No separators: group the words into evenly sized columns
    let words: Vec<&str> = WHITESPACE.split(line).collect();
    let target = MAX_GUESSED_COLUMNS.min(words.len().div_ceil(2).max(2));
    let per_column = words.len().div_ceil(target).max(1);
    words.chunks(per_column).map(|chunk| chunk.join(" ")).collect()
}

/// Snake-cased placeholder name for a label: "First Name" becomes "first_name"
pub fn placeholder_name(label: &str) -> String {
    let lower = label.to_lowercase();
    let snake = WHITESPACE.replace_all(lower.trim(), "_");
    PLACEHOLDER_DISALLOWED.replace_all(&snake, "_").into_owned()
}

/// Escapes the five HTML special characters. Quotes become `&quot;` and `&#039;`, never `&apos;`.
fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Renders an HTML template: a table whose header row holds the labels and whose
/// single body row holds a `{{ placeholder }}` per label.
pub fn render_html_template(labels: &[String]) -> String {
    let mut html = String::from(
        r#"<!doctype html><html><head><meta charset="utf-8"><title>Generated Template</title></head><body>"#,
    );
    html.push_str(r#"<table border="1" cellpadding="6" cellspacing="0" style="border-collapse:collapse;width:100%;">"#);
    html.push_str("<thead><tr>");
    for label in labels {
        html.push_str(&format!("<th>{}</th>", escape_html(label)));
    }
    html.push_str("</tr></thead><tbody><tr>");
    for label in labels {
        html.push_str(&format!("<td>{{{{ {} }}}}</td>", placeholder_name(label)));
    }
    html.push_str("</tr></tbody></table></body></html>");
    html
}

/// Suggests a field for each label under the keys `h1..hn`.
/// Only labels matched by an alias or naming a known field are suggested.
pub fn suggest_mappings(labels: &[String], resolver: &AliasResolver) -> BTreeMap<String, String> {
    labels
        .iter()
        .enumerate()
        .filter_map(|(index, label)| {
            let resolution = resolver.resolve(label);
            match resolution.source {
                ResolutionSource::Unresolved => None,
                _ if resolver.is_known(&resolution.field) => Some((format!("h{}", index + 1), resolution.field)),
                _ => None,
            }
        })
        .collect()
}

/// File name of a generated HTML template, `{slug}_generated_template_{timestamp}.html`
pub fn generated_template_name(company_name: &str, timestamp: u64) -> String {
    let lower = company_name.to_lowercase();
    let slug = SLUG_DISALLOWED.replace_all(&lower, "-");
    let slug = slug.trim_matches('-');
    let slug = if slug.is_empty() { "company" } else { slug };
    format!("{slug}_generated_template_{timestamp}.html")
}
