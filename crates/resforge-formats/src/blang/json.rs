//! Mod-side JSON describing string edits

use crate::blang::error::Result;
use serde::{Deserialize, Serialize};

/// Directory inside a container that holds string tables
pub const STRINGS_DIR: &str = "strings";

/// `{"strings": [{"name": ..., "text": ...}]}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlangJson {
    /// Edits in file order
    #[serde(default)]
    pub strings: Vec<BlangJsonString>,
}

/// One string edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlangJsonString {
    /// Identifier to insert or update
    pub name: String,
    /// New text
    #[serde(default)]
    pub text: String,
}

impl BlangJson {
    /// Decode from raw JSON bytes
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// Container path of the string table a JSON file named `file_name` edits
///
/// ```
/// use resforge_formats::blang::target_chunk_name;
///
/// assert_eq!(target_chunk_name("EN/english.json"), "strings/english.blang");
/// ```
pub fn target_chunk_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name);
    let stem = base.rsplit_once('.').map_or(base, |(stem, _)| stem);
    format!("{STRINGS_DIR}/{stem}.blang")
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json() {
        let json = br##"{"strings":[{"name":"#str_a","text":"A"},{"name":"#str_b"}]}"##;
        let parsed = BlangJson::from_slice(json).expect("parse");
        assert_eq!(parsed.strings.len(), 2);
        assert_eq!(parsed.strings[0].name, "#str_a");
        assert_eq!(parsed.strings[1].text, "");
    }

    #[test]
    fn test_missing_strings_is_empty() {
        assert!(BlangJson::from_slice(b"{}").expect("parse").strings.is_empty());
    }

    #[test]
    fn test_invalid_json_rejected() {
        assert!(BlangJson::from_slice(b"{\"strings\": [").is_err());
    }

    #[test]
    fn test_target_chunk_name() {
        assert_eq!(target_chunk_name("french.json"), "strings/french.blang");
        assert_eq!(target_chunk_name("a\\b\\german.json"), "strings/german.blang");
        assert_eq!(target_chunk_name("italian"), "strings/italian.blang");
    }
}
