//! XML utilities for SpreadsheetML parts
//! Provides an XML reader wrapper, helper traits for attribute and text processing,
//! and the few writer helpers needed to emit worksheet cells

use crate::error::RustyTemplateError;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::BytesEnd;
use quick_xml::events::BytesRef;
use quick_xml::events::BytesStart;
use quick_xml::events::BytesText;
use quick_xml::events::Event;
use quick_xml::Reader;
use quick_xml::Writer;
use std::borrow::Cow;
use std::io::BufRead;
use std::io::Write;
use thiserror::Error;

/// Errors specific to XML parsing operations
#[derive(Error, Debug)]
pub enum XmlError {
    #[error("Parse entity '{0}' failed")]
    ParseEntityError(String),
}

/// XML reader wrapper configured for spreadsheet parts
pub(crate) struct XmlReader<R: BufRead> {
    reader: Reader<R>,
    buffer: Vec<u8>,
}

impl<R: BufRead> XmlReader<R> {
    /// Creates a new XML reader.
    /// Empty elements are expanded so that every start tag has a matching end event.
    pub(crate) fn new(buf_reader: R) -> XmlReader<R> {
        let mut reader = Reader::from_reader(buf_reader);
        let config = reader.config_mut();
        config.check_comments = false;
        config.check_end_names = false;
        config.expand_empty_elements = true;
        config.trim_text(false);

        let buffer = Vec::with_capacity(1024);
        XmlReader { reader, buffer }
    }

    /// Reads the next XML event from the reader
    pub(crate) fn next(&'_ mut self) -> Result<Option<Event<'_>>, RustyTemplateError> {
        self.buffer.clear();
        match self.reader.read_event_into(&mut self.buffer) {
            Ok(Event::Eof) => Ok(None),
            Ok(event) => Ok(Some(event)),
            Err(error) => Err(RustyTemplateError::XmlError(error)),
        }
    }
}

/// Helper trait for XML attributes providing convenient value extraction and parsing
pub(crate) trait XmlAttributeHelper<'a> {
    /// Gets the unescaped attribute value as a string
    fn get_value(&self) -> Result<Cow<'a, str>, RustyTemplateError>;
}

impl<'a> XmlAttributeHelper<'a> for Attribute<'a> {
    fn get_value(&self) -> Result<Cow<'a, str>, RustyTemplateError> {
        Ok(self.unescape_value()?)
    }
}

/// Helper trait for XML nodes providing attribute access methods
pub(crate) trait XmlNodeHelper<'a> {
    /// Gets an attribute value by name
    fn get_attribute_value(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, RustyTemplateError>;

    /// Copies the element name and every attribute except the excluded ones
    fn without_attributes(&self, excluded: &[&str]) -> Result<BytesStart<'static>, RustyTemplateError>;
}

impl<'a> XmlNodeHelper<'a> for BytesStart<'a> {
    fn get_attribute_value(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, RustyTemplateError> {
        self.try_get_attribute(name)?
            .map(|attribute| attribute.get_value())
            .transpose()
    }

    fn without_attributes(&self, excluded: &[&str]) -> Result<BytesStart<'static>, RustyTemplateError> {
        let name = std::str::from_utf8(self.name().as_ref())?.to_owned();
        let mut element = BytesStart::new(name);
        for result in self.attributes() {
            let attribute = result?;
            let key = attribute.key.as_ref();
            if !excluded.iter().any(|excluded| excluded.as_bytes() == key) {
                element.push_attribute(attribute);
            }
        }
        Ok(element.into_owned())
    }
}

/// Helper trait for building text content from XML events
pub(crate) trait XmlTextContextHelper {
    /// Appends text content from BytesRef event (handles entities and character references)
    fn push_bytes_ref(&mut self, bytes: &BytesRef) -> Result<(), RustyTemplateError>;
}

impl XmlTextContextHelper for String {
    fn push_bytes_ref(&mut self, bytes: &BytesRef) -> Result<(), RustyTemplateError> {
        let raw = bytes.xml_content()?;
        if let Some(number) = raw.strip_prefix('#') {
            let code = if let Some(hex) = number.strip_prefix('x') {
                u32::from_str_radix(hex, 16)?
            } else {
                number.parse::<u32>()?
            };
            if let Some(character) = char::from_u32(code) {
                self.push(character);
            }
        } else if let Some(entity) = resolve_xml_entity(&raw) {
            self.push_str(entity);
        } else {
            Err(XmlError::ParseEntityError(raw.to_string()))?;
        }

        Ok(())
    }
}

/// Helper trait for emitting worksheet markup
pub(crate) trait XmlWriterHelper {
    /// Writes `<c r=".." s=".." t="inlineStr"><is><t>..</t></is></c>`, `s` only when a style is given
    fn write_inline_string_cell(&mut self, reference: &str, style: Option<&str>, text: &str) -> Result<(), RustyTemplateError>;

    /// Writes a `<row r="..">` start tag
    fn write_row_start(&mut self, row: usize) -> Result<(), RustyTemplateError>;

    /// Writes an end tag
    fn write_end(&mut self, name: &str) -> Result<(), RustyTemplateError>;
}

impl<W: Write> XmlWriterHelper for Writer<W> {
    fn write_inline_string_cell(&mut self, reference: &str, style: Option<&str>, text: &str) -> Result<(), RustyTemplateError> {
        let mut cell = BytesStart::new("c").with_attributes([("r", reference)]);
        if let Some(style) = style {
            cell.push_attribute(("s", style));
        }
        cell.push_attribute(("t", "inlineStr"));
        self.write_event(Event::Start(cell))?;
        self.write_event(Event::Start(BytesStart::new("is")))?;
        let run = BytesStart::new("t").with_attributes([("xml:space", "preserve")]);
        self.write_event(Event::Start(run))?;
        self.write_event(Event::Text(BytesText::new(text)))?;
        self.write_end("t")?;
        self.write_end("is")?;
        self.write_end("c")
    }

    fn write_row_start(&mut self, row: usize) -> Result<(), RustyTemplateError> {
        let row = row.to_string();
        self.write_event(Event::Start(BytesStart::new("row").with_attributes([("r", row.as_str())])))?;
        Ok(())
    }

    fn write_end(&mut self, name: &str) -> Result<(), RustyTemplateError> {
        self.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }
}

#[macro_export]
macro_rules! match_xml_events {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(result) = $reader.next()? {
            match result {
                Event::Eof => break,
                $($arms)*
                _ => (),
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_write_inline_string_cell() {
        let mut writer = Writer::new(Vec::new());
        writer.write_row_start(2).unwrap();
        writer.write_inline_string_cell("B2", None, "Smith & Sons").unwrap();
        writer.write_inline_string_cell("C2", Some("3"), "x").unwrap();
        writer.write_end("row").unwrap();
        let xml = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(
            xml,
            "<row r=\"2\"><c r=\"B2\" t=\"inlineStr\"><is><t xml:space=\"preserve\">Smith &amp; Sons</t></is></c><c r=\"C2\" s=\"3\" t=\"inlineStr\"><is><t xml:space=\"preserve\">x</t></is></c></row>"
        );
    }

    #[test]
    fn test_without_attributes() -> Result<(), RustyTemplateError> {
        let mut reader = XmlReader::new(Cursor::new(b"<row r=\"3\" spans=\"1:4\" ht=\"15\"/>".to_vec()));
        let mut copied = None;
        match_xml_events!(reader => {
            Event::Start(event) => {
                copied = Some(event.without_attributes(&["spans"]).unwrap());
            }
        });
        let copied = copied.unwrap();
        assert_eq!(copied.get_attribute_value("r").unwrap().as_deref(), Some("3"));
        assert_eq!(copied.get_attribute_value("ht").unwrap().as_deref(), Some("15"));
        assert_eq!(copied.get_attribute_value("spans").unwrap(), None);
        Ok(())
    }

    #[test]
    fn test_push_bytes_ref() -> Result<(), RustyTemplateError> {
        let mut reader = XmlReader::new(Cursor::new(b"<t>A&#66;&#x43;&amp;</t>".to_vec()));
        let mut text = String::new();
        match_xml_events!(reader => {
            Event::Text(event) => text.push_str(&event.xml_content().unwrap()),
            Event::GeneralRef(event) => text.push_bytes_ref(&event).unwrap(),
        });
        assert_eq!(text, "ABC&");
        Ok(())
    }
}
