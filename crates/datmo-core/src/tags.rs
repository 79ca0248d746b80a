//! String metadata attached to a frame.
//!
//! Tags persist with the frame across calls. The tone mapper reads
//! [`TAG_WHITE_Y`] to recover a stored reference white and writes
//! [`TAG_LUMINANCE`] to mark a frame as display-referred.
//!
//! # Example
//!
//! ```rust
//! use datmo_core::{Tags, TAG_LUMINANCE};
//!
//! let mut tags = Tags::new();
//! tags.set(TAG_LUMINANCE, "RELATIVE");
//! assert_eq!(tags.get(TAG_LUMINANCE), Some("RELATIVE"));
//! ```

use std::collections::BTreeMap;

/// Luminance factor of the reference white (decimal string).
pub const TAG_WHITE_Y: &str = "WHITE_Y";

/// Luminance encoding of the frame: `RELATIVE`, `ABSOLUTE` or `DISPLAY`.
pub const TAG_LUMINANCE: &str = "LUMINANCE";

/// Tag container: string key -> string value.
///
/// Keys are kept sorted so iteration order is stable, which keeps written
/// file headers reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags {
    map: BTreeMap<String, String>,
}

impl Tags {
    /// Creates an empty tag store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a tag.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.map.insert(key.into(), value.into());
    }

    /// Returns the value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    /// Removes a tag, returning its previous value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.map.remove(key)
    }

    /// Returns true if the key exists.
    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Iterates over key/value pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of tags.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns true if empty.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Tags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut tags = Tags::new();
        for (k, v) in iter {
            tags.set(k, v);
        }
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_replace() {
        let mut tags = Tags::new();
        assert!(tags.is_empty());
        tags.set(TAG_WHITE_Y, "1.0");
        tags.set(TAG_WHITE_Y, "2.5");
        assert_eq!(tags.get(TAG_WHITE_Y), Some("2.5"));
        assert_eq!(tags.len(), 1);
        assert_eq!(tags.remove(TAG_WHITE_Y).as_deref(), Some("2.5"));
        assert!(!tags.contains(TAG_WHITE_Y));
    }

    #[test]
    fn test_iter_sorted() {
        let tags: Tags = [("b", "2"), ("a", "1")].into_iter().collect();
        let keys: Vec<_> = tags.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
