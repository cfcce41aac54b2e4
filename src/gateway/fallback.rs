//! Static fallback catalog and selection
//!
//! The catalog is plain data loaded once at startup, so deployments and tests
//! can swap it without touching the gateway logic.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

use crate::error::FallbackLoadError;

/// Catalog bundled with the binary, used when no file is configured
const BUNDLED_CATALOG: &str = include_str!("../../data/fallback.json");

/// Which fallback a route uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackRef {
    /// Served unconditionally on failure
    Collection(&'static str),
    /// Looked up by the request key; a miss is a 404 with `not_found` message
    Keyed {
        table: &'static str,
        not_found: NotFoundMessage,
    },
    /// Route has no fallback (write routes)
    Absent,
}

/// Message for a keyed miss; `{key}` is replaced by the requested key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotFoundMessage(pub &'static str);

impl NotFoundMessage {
    pub fn render(self, key: &str) -> String {
        self.0.replace("{key}", key)
    }
}

/// Result of consulting the catalog
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackChoice {
    Found(Value),
    NotFound(String),
    Unavailable,
}

/// Immutable fallback data, keyed by collection / table name
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FallbackCatalog {
    #[serde(default)]
    collections: HashMap<String, Value>,
    #[serde(default)]
    keyed: HashMap<String, HashMap<String, Value>>,
}

impl FallbackCatalog {
    /// The catalog shipped in `data/fallback.json`
    pub fn bundled() -> Result<Self, FallbackLoadError> {
        Self::from_json(BUNDLED_CATALOG)
    }

    pub fn from_json(text: &str) -> Result<Self, FallbackLoadError> {
        Ok(serde_json::from_str(text)?)
    }

    /// TOML is read into its own value tree, then re-expressed as JSON
    pub fn from_toml(text: &str) -> Result<Self, FallbackLoadError> {
        let value: toml::Value = toml::from_str(text)?;
        Ok(serde_json::from_value(serde_json::to_value(value)?)?)
    }

    /// Load from a file; `.toml` files are parsed as TOML, anything else as JSON
    pub fn load(path: &Path) -> Result<Self, FallbackLoadError> {
        let text = std::fs::read_to_string(path).map_err(|source| FallbackLoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml(&text),
            _ => Self::from_json(&text),
        }
    }

    /// Configured file when given, bundled catalog otherwise
    pub fn load_configured(path: Option<&str>) -> Result<Self, FallbackLoadError> {
        match path {
            Some(p) => Self::load(Path::new(p)),
            None => Self::bundled(),
        }
    }

    /// Builder used by tests and embedders
    #[must_use]
    pub fn with_collection(mut self, name: &str, value: Value) -> Self {
        self.collections.insert(name.to_string(), value);
        self
    }

    #[must_use]
    pub fn with_keyed(mut self, table: &str, key: &str, value: Value) -> Self {
        self.keyed
            .entry(table.to_string())
            .or_default()
            .insert(key.to_string(), value);
        self
    }

    pub fn has_collection(&self, name: &str) -> bool {
        self.collections.contains_key(name)
    }

    /// Pick the fallback for a failed request
    ///
    /// Keyed routes never fall back to a collection: a missing table behaves
    /// like an empty one.
    pub fn select(&self, reference: FallbackRef, key: Option<&str>) -> FallbackChoice {
        match reference {
            FallbackRef::Collection(name) => self
                .collections
                .get(name)
                .map_or(FallbackChoice::Unavailable, |v| FallbackChoice::Found(v.clone())),
            FallbackRef::Keyed { table, not_found } => {
                let key = key.unwrap_or_default();
                self.keyed
                    .get(table)
                    .and_then(|entries| entries.get(key))
                    .map_or_else(
                        || FallbackChoice::NotFound(not_found.render(key)),
                        |v| FallbackChoice::Found(v.clone()),
                    )
            }
            FallbackRef::Absent => FallbackChoice::Unavailable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const MISS: NotFoundMessage = NotFoundMessage("No hay {key}");

    #[test]
    fn bundled_catalog_parses() {
        let catalog = FallbackCatalog::bundled().unwrap();
        for name in ["blogs", "engineers", "team", "solutions", "vacancies"] {
            assert!(catalog.has_collection(name), "missing collection {name}");
        }
        assert!(matches!(
            catalog.select(
                FallbackRef::Keyed { table: "vacancy", not_found: MISS },
                Some("senior-frontend-developer")
            ),
            FallbackChoice::Found(_)
        ));
    }

    #[test]
    fn collection_is_returned_unconditionally() {
        let catalog = FallbackCatalog::default().with_collection("blogs", json!({"items": []}));
        assert_eq!(
            catalog.select(FallbackRef::Collection("blogs"), Some("ignored")),
            FallbackChoice::Found(json!({"items": []}))
        );
        assert_eq!(
            catalog.select(FallbackRef::Collection("other"), None),
            FallbackChoice::Unavailable
        );
    }

    #[test]
    fn keyed_miss_is_not_found_not_collection() {
        let catalog = FallbackCatalog::default()
            .with_collection("vacancy", json!(["should never be used"]))
            .with_keyed("vacancy", "qa", json!({"slug": "qa"}));
        let reference = FallbackRef::Keyed { table: "vacancy", not_found: MISS };

        assert_eq!(
            catalog.select(reference, Some("qa")),
            FallbackChoice::Found(json!({"slug": "qa"}))
        );
        assert_eq!(
            catalog.select(reference, Some("dev")),
            FallbackChoice::NotFound("No hay dev".to_string())
        );
    }

    #[test]
    fn toml_catalog_is_accepted() {
        let catalog = FallbackCatalog::from_toml(
            r#"
            [collections]
            solutions = []

            [keyed.user.ana]
            firstName = "Ana"
            "#,
        )
        .unwrap();
        assert!(catalog.has_collection("solutions"));
        assert_eq!(
            catalog.select(
                FallbackRef::Keyed { table: "user", not_found: MISS },
                Some("ana")
            ),
            FallbackChoice::Found(json!({"firstName": "Ana"}))
        );
    }

    #[test]
    fn unreadable_file_reports_path() {
        let err = FallbackCatalog::load(Path::new("/nonexistent/fallback.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/fallback.json"));
    }
}
