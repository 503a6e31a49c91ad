//! Label classification: short codes to display terms.
//!
//! Schedule entries are labeled with short upper-case codes ("MOV",
//! "GAME"); callers rendering a schedule expand them to full display
//! terms through a [`LabelCatalog`]. The overlay engine itself never
//! looks inside a label — this type exists purely at the presentation
//! seam.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{OverlayError, Result};

/// An ordered map of upper-cased short codes to display terms.
///
/// Codes are case-insensitive: they are upper-cased on insertion and
/// lookup. Serializes as a plain JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelCatalog {
    codes: BTreeMap<String, String>,
}

impl LabelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a catalog from a JSON object of code → term.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| OverlayError::InvalidRecord(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| OverlayError::InvalidRecord(e.to_string()))
    }

    /// Register `code` as an abbreviation for `term`, replacing any
    /// previous term for that code.
    pub fn insert(&mut self, code: &str, term: impl Into<String>) -> Option<String> {
        self.codes.insert(code.to_uppercase(), term.into())
    }

    /// Drop a code, returning its term if it was present.
    pub fn remove(&mut self, code: &str) -> Option<String> {
        self.codes.remove(&code.to_uppercase())
    }

    /// The term for `code`, if registered.
    pub fn get(&self, code: &str) -> Option<&str> {
        self.codes.get(&code.to_uppercase()).map(String::as_str)
    }

    /// The term for `code`, falling back to the code itself when it is
    /// not registered — unknown labels display as-is rather than
    /// erroring mid-render.
    pub fn resolve<'a>(&'a self, code: &'a str) -> &'a str {
        self.get(code).unwrap_or(code)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Codes and terms in code order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.codes
            .iter()
            .map(|(code, term)| (code.as_str(), term.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_case_insensitive() {
        let mut catalog = LabelCatalog::new();
        catalog.insert("mov", "Movie Night");
        assert_eq!(catalog.get("MOV"), Some("Movie Night"));
        assert_eq!(catalog.get("Mov"), Some("Movie Night"));
        assert_eq!(catalog.remove("mOv"), Some("Movie Night".to_string()));
        assert!(catalog.is_empty());
    }

    #[test]
    fn resolve_falls_back_to_the_raw_code() {
        let mut catalog = LabelCatalog::new();
        catalog.insert("GAME", "Game Stream");
        assert_eq!(catalog.resolve("game"), "Game Stream");
        assert_eq!(catalog.resolve("Totally Unknown"), "Totally Unknown");
    }

    #[test]
    fn json_round_trip_preserves_entries() {
        let mut catalog = LabelCatalog::new();
        catalog.insert("MOV", "Movie Night");
        catalog.insert("GAME", "Game Stream");
        let json = catalog.to_json().unwrap();
        let back = LabelCatalog::from_json(&json).unwrap();
        assert_eq!(catalog, back);
    }

    #[test]
    fn bad_json_is_rejected() {
        assert!(LabelCatalog::from_json("[1,2,3]").is_err());
        assert!(LabelCatalog::from_json("{").is_err());
    }
}
