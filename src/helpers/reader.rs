use crate::error::RustyTemplateError;
use std::fs::File;
use std::io::BufReader;
use std::io::Cursor;
use std::io::Read;
use std::io::Seek;
use std::path::Path;

/// Signature of OLE compound files: legacy `.xls` or encrypted OOXML packages
const COMPOUND_FILE_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// A unified reader over a template stored on disk or already loaded in memory
pub(crate) enum UnifiedReader {
    /// Local file reader
    Local(BufReader<File>),
    /// Uploaded bytes (in-memory buffer)
    Memory(Cursor<Vec<u8>>),
}

impl UnifiedReader {
    /// Opens a template file from a local path
    ///
    /// # Arguments
    /// * `path` - Path to the file
    ///
    /// # Returns
    /// * `Result<UnifiedReader, RustyTemplateError>` - Reader for the file content
    pub(crate) fn open(path: &Path) -> Result<UnifiedReader, RustyTemplateError> {
        let file = File::open(path)?;
        Ok(UnifiedReader::Local(BufReader::new(file)))
    }

    /// Wraps bytes that are already in memory
    pub(crate) fn from_bytes(bytes: Vec<u8>) -> UnifiedReader {
        UnifiedReader::Memory(Cursor::new(bytes))
    }

    /// Checks whether the content starts with the compound file signature.
    /// The stream is rewound afterwards.
    pub(crate) fn is_compound_file(&mut self) -> Result<bool, RustyTemplateError> {
        let mut signature = [0u8; 8];
        let mut filled = 0usize;
        while filled < signature.len() {
            let count = self.read(&mut signature[filled..])?;
            if count == 0 {
                break;
            }
            filled += count;
        }
        self.rewind()?;
        Ok(filled == signature.len() && signature == COMPOUND_FILE_SIGNATURE)
    }
}

impl Read for UnifiedReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            UnifiedReader::Local(reader) => reader.read(buf),
            UnifiedReader::Memory(reader) => reader.read(buf),
        }
    }
}

impl Seek for UnifiedReader {
    fn seek(&mut self, pos: std::io::SeekFrom) -> std::io::Result<u64> {
        match self {
            UnifiedReader::Local(reader) => reader.seek(pos),
            UnifiedReader::Memory(reader) => reader.seek(pos),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compound_file_signature() {
        let mut bytes = COMPOUND_FILE_SIGNATURE.to_vec();
        bytes.extend_from_slice(b"rest of the container");
        let mut reader = UnifiedReader::from_bytes(bytes);
        assert!(reader.is_compound_file().unwrap());

        // Stream is rewound after the check
        let mut first = [0u8; 1];
        reader.read_exact(&mut first).unwrap();
        assert_eq!(first[0], 0xD0);
    }

    #[test]
    fn test_zip_is_not_compound_file() {
        let mut reader = UnifiedReader::from_bytes(b"PK\x03\x04 zip archive".to_vec());
        assert!(!reader.is_compound_file().unwrap());

        let mut reader = UnifiedReader::from_bytes(vec![0xD0, 0xCF]);
        assert!(!reader.is_compound_file().unwrap());
    }

    #[test]
    fn test_open_local_file() {
        // Cargo.toml should exist
        let result = UnifiedReader::open(Path::new("Cargo.toml"));
        assert!(result.is_ok(), "Failed to open local file: {:?}", result.err());

        let result = UnifiedReader::open(Path::new("non_existent_file.xlsx"));
        assert!(result.is_err(), "Should fail to open non-existent file");
    }
}
