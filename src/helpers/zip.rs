//! ZIP archive helper utilities for SpreadsheetML packages
//! Provides convenient methods for reading parts and for rebuilding a package with replaced parts

use crate::error::RustyTemplateError;
use crate::helpers::xml::XmlReader;
use std::collections::HashMap;
use std::io::BufReader;
use std::io::Cursor;
use std::io::Read;
use std::io::Seek;
use std::io::Write;
use zip::read::ZipFile;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;
use zip::ZipArchive;
use zip::ZipWriter;

/// Helper trait for ZIP archive operations with specialized reader creation
pub(crate) trait ZipHelper<RS: Read + Seek> {
    /// Gets a file from the ZIP archive by name (case-insensitive, path separator agnostic)
    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, RustyTemplateError>;

    /// Creates an XML reader for a file within the ZIP archive
    fn xml_reader(
        &'_ mut self,
        name: &str,
    ) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, RustyTemplateError>;

    /// Reads a whole file of the archive into memory
    fn read_bytes(&mut self, name: &str) -> Result<Option<Vec<u8>>, RustyTemplateError>;

    /// Writes a copy of the archive where the named parts carry new content.
    /// Untouched parts are copied without recompression.
    fn rebuild_with(&mut self, replacements: &HashMap<String, Vec<u8>>) -> Result<Vec<u8>, RustyTemplateError>;
}

impl<RS: Read + Seek> ZipHelper<RS> for ZipArchive<RS> {
    /// Gets a file from the ZIP archive by name with case-insensitive matching
    /// and path separator normalization (backslash to forward slash)
    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, RustyTemplateError> {
        let pattern = name.replace('\\', "/");
        let path = self.file_names()
            .find(|file_name| pattern.eq_ignore_ascii_case(*file_name))
            .map(|file_name| file_name.to_owned());
        match path.map(|file_name| self.by_name(&file_name)).transpose() {
            Ok(Some(file)) => Ok(Some(file)),
            Ok(None) | Err(ZipError::FileNotFound) => Ok(None),
            Err(error) => Err(error)?,
        }
    }

    fn xml_reader(
        &'_ mut self,
        name: &str,
    ) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, RustyTemplateError> {
        let reader = self
            .file(name)?
            .map(|file| XmlReader::new(BufReader::new(file)));
        Ok(reader)
    }

    fn read_bytes(&mut self, name: &str) -> Result<Option<Vec<u8>>, RustyTemplateError> {
        match self.file(name)? {
            Some(mut file) => {
                let mut bytes = Vec::with_capacity(file.size() as usize);
                file.read_to_end(&mut bytes)?;
                Ok(Some(bytes))
            }
            None => Ok(None),
        }
    }

    fn rebuild_with(&mut self, replacements: &HashMap<String, Vec<u8>>) -> Result<Vec<u8>, RustyTemplateError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for index in 0..self.len() {
            let file = self.by_index_raw(index)?;
            let name = file.name().replace('\\', "/");
            let replacement = replacements
                .iter()
                .find(|(path, _)| path.eq_ignore_ascii_case(&name))
                .map(|(_, content)| content);
            if let Some(content) = replacement {
                drop(file);
                writer.start_file(name, options)?;
                writer.write_all(content)?;
            } else {
                writer.raw_copy_file(file)?;
            }
        }
        Ok(writer.finish()?.into_inner())
    }
}
