//! Plaintext blang string table

use crate::ResourceFormat;
use crate::blang::error::{BlangError, Result};
use crate::reader::ByteReader;
use resforge_crypto::string_hash;

/// Container whose string tables carry an extra 8-byte header
pub const HEADER_CONTAINER: &str = "gameresources_patch1";

/// Whether string tables inside `container_name` carry the 8-byte header
///
/// `container_name` may be a bare stem or a file name with extension.
pub fn has_unknown_header(container_name: &str) -> bool {
    let stem = container_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(container_name);
    let stem = stem.split('.').next().unwrap_or(stem);
    stem.eq_ignore_ascii_case(HEADER_CONTAINER)
}

/// One localized string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlangString {
    /// FNV-1a hash of the lowercased identifier, refreshed on build
    pub hash: u32,
    /// Lookup key, e.g. `#str_menu_title`
    pub identifier: String,
    /// Display text
    pub text: String,
    /// Opaque trailing bytes
    pub unknown: Vec<u8>,
}

impl BlangString {
    /// Create a string with a freshly computed hash and no trailing data
    pub fn new(identifier: impl Into<String>, text: impl Into<String>) -> Self {
        let identifier = identifier.into();
        Self {
            hash: string_hash(&identifier),
            identifier,
            text: text.into(),
            unknown: Vec::new(),
        }
    }

    fn is_valid(&self) -> bool {
        !self.identifier.trim().is_empty()
    }
}

/// Result of [`BlangFile::set_text`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringEdit {
    /// The identifier existed and its text was replaced
    Updated,
    /// The identifier was new and appended
    Added,
}

/// A decrypted blang string table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlangFile {
    /// Big-endian header present only in [`HEADER_CONTAINER`]
    pub unknown_data: Option<u64>,
    /// Strings in file order
    pub strings: Vec<BlangString>,
}

impl BlangFile {
    /// Parse a decrypted table, reading the extra header when
    /// `with_header` is set
    pub fn parse_with(data: &[u8], with_header: bool) -> Result<Self> {
        let mut reader = ByteReader::new(data);

        let unknown_data = if with_header {
            Some(reader.u64_be()?)
        } else {
            None
        };

        let count = reader.u32_be()? as usize;
        // Each string needs at least 16 bytes; reject absurd counts early
        let mut strings = Vec::with_capacity(count.min(reader.remaining() / 16));

        for _ in 0..count {
            let hash = reader.u32_le()?;
            let identifier = read_string(&mut reader, "identifier")?;
            let text = read_string(&mut reader, "text")?;
            let unknown_len = reader.u32_le()? as usize;
            let unknown = reader.take(unknown_len)?.to_vec();

            strings.push(BlangString {
                hash,
                identifier,
                text,
                unknown,
            });
        }

        Ok(Self {
            unknown_data,
            strings,
        })
    }

    /// Parse a table that lives in `container_name`
    pub fn parse_for(data: &[u8], container_name: &str) -> Result<Self> {
        Self::parse_with(data, has_unknown_header(container_name))
    }

    /// Serialize the table
    ///
    /// Entries with empty or whitespace-only identifiers are dropped,
    /// carriage returns are removed from text and every hash is
    /// recomputed from its identifier.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let kept: Vec<&BlangString> = self.strings.iter().filter(|s| s.is_valid()).collect();
        let count = u32::try_from(kept.len()).map_err(|_| BlangError::TooManyStrings(kept.len()))?;

        let mut out = Vec::new();
        if let Some(header) = self.unknown_data {
            out.extend_from_slice(&header.to_be_bytes());
        }
        out.extend_from_slice(&count.to_be_bytes());

        for string in kept {
            out.extend_from_slice(&string_hash(&string.identifier).to_le_bytes());
            write_field(&mut out, string.identifier.as_bytes())?;
            let text = string.text.replace('\r', "");
            write_field(&mut out, text.as_bytes())?;
            write_field(&mut out, &string.unknown)?;
        }

        Ok(out)
    }

    /// Bring the in-memory table to the form a build/parse cycle produces
    pub fn normalize(&mut self) {
        self.strings.retain(BlangString::is_valid);
        for string in &mut self.strings {
            string.hash = string_hash(&string.identifier);
            string.text.retain(|c| c != '\r');
        }
    }

    /// Find a string by identifier, ignoring ASCII case
    pub fn find(&self, identifier: &str) -> Option<&BlangString> {
        self.strings
            .iter()
            .find(|s| s.identifier.eq_ignore_ascii_case(identifier))
    }

    /// Find a string by identifier for modification
    pub fn find_mut(&mut self, identifier: &str) -> Option<&mut BlangString> {
        self.strings
            .iter_mut()
            .find(|s| s.identifier.eq_ignore_ascii_case(identifier))
    }

    /// Replace the text of an existing identifier or append a new string
    pub fn set_text(&mut self, identifier: &str, text: &str) -> StringEdit {
        if let Some(existing) = self.find_mut(identifier) {
            existing.text = text.to_string();
            StringEdit::Updated
        } else {
            self.strings.push(BlangString::new(identifier, text));
            StringEdit::Added
        }
    }

    /// Number of strings in the table
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Whether the table has no strings
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

fn read_string(reader: &mut ByteReader<'_>, field: &'static str) -> Result<String> {
    let len = reader.u32_le()? as usize;
    let offset = reader.offset();
    let bytes = reader.take(len)?;
    String::from_utf8(bytes.to_vec()).map_err(|_| BlangError::InvalidUtf8 { field, offset })
}

fn write_field(out: &mut Vec<u8>, bytes: &[u8]) -> Result<()> {
    let len = u32::try_from(bytes.len()).map_err(|_| BlangError::FieldTooLarge(bytes.len()))?;
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(bytes);
    Ok(())
}

impl ResourceFormat for BlangFile {
    fn parse(data: &[u8]) -> std::result::Result<Self, Box<dyn std::error::Error>> {
        Ok(Self::parse_with(data, false)?)
    }

    fn build(&self) -> std::result::Result<Vec<u8>, Box<dyn std::error::Error>> {
        Ok(self.to_bytes()?)
    }
}
