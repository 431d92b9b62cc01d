//! Schema snapshots -- typed containers of named objects with a
//! deterministic checksum.
//!
//! Objects are stored name-sorted per category, so iteration order (and
//! therefore the canonical serialization and checksum) is independent of
//! insertion order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::enums::SchemaObjectCategory;
use crate::ports::{CryptoPort, Result};

/// A named, category-typed database construct with an opaque definition.
///
/// The definition is free-form; when it carries a string `sql` field, that
/// SQL is used verbatim in generated operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaObject {
    pub name: String,
    pub definition: Value,
}

impl SchemaObject {
    pub fn new(name: impl Into<String>, definition: Value) -> Self {
        Self {
            name: name.into(),
            definition,
        }
    }

    /// Returns the `sql` field of the definition, if present.
    pub fn sql(&self) -> Option<&str> {
        self.definition.get("sql").and_then(Value::as_str)
    }

    /// Canonical JSON serialization of the definition.
    ///
    /// `serde_json` maps are sorted by key, so logically equal definitions
    /// serialize identically regardless of construction order.
    pub fn canonical_definition(&self) -> String {
        serde_json::to_string(&self.definition).expect("JSON value serializes")
    }
}

/// Snapshot of a database schema: a mapping category -> name -> object.
///
/// Built empty or from a snapshot, mutated only via [`add_object`]. Once a
/// state has been handed to the diff engine it should be treated as frozen;
/// callers that need to keep mutating should clone first.
///
/// [`add_object`]: Self::add_object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaState {
    objects: BTreeMap<SchemaObjectCategory, BTreeMap<String, SchemaObject>>,
}

impl SchemaState {
    /// Creates an empty schema state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites an object, keyed by its name within the
    /// category.
    pub fn add_object(&mut self, category: SchemaObjectCategory, object: SchemaObject) {
        self.objects
            .entry(category)
            .or_default()
            .insert(object.name.clone(), object);
    }

    /// Looks up an object by category and name.
    ///
    /// Unknown categories and names return `None`.
    pub fn object(&self, category: SchemaObjectCategory, name: &str) -> Option<&SchemaObject> {
        self.objects.get(&category)?.get(name)
    }

    /// Iterates the objects of a category in name order.
    ///
    /// An absent category reads as empty.
    pub fn objects(
        &self,
        category: SchemaObjectCategory,
    ) -> impl Iterator<Item = &SchemaObject> + '_ {
        self.objects
            .get(&category)
            .into_iter()
            .flat_map(|m| m.values())
    }

    /// Total number of objects across all categories.
    pub fn len(&self) -> usize {
        self.objects.values().map(|m| m.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Canonical JSON serialization: categories in fixed order, names
    /// sorted within each category.
    pub fn canonical_json(&self) -> String {
        // Field order of this struct fixes the category order in the output.
        #[derive(Serialize)]
        struct Canonical<'a> {
            tables: BTreeMap<&'a str, &'a Value>,
            views: BTreeMap<&'a str, &'a Value>,
            functions: BTreeMap<&'a str, &'a Value>,
            indexes: BTreeMap<&'a str, &'a Value>,
        }

        let collect = |category| {
            self.objects(category)
                .map(|o| (o.name.as_str(), &o.definition))
                .collect()
        };

        let canonical = Canonical {
            tables: collect(SchemaObjectCategory::Table),
            views: collect(SchemaObjectCategory::View),
            functions: collect(SchemaObjectCategory::Function),
            indexes: collect(SchemaObjectCategory::Index),
        };

        serde_json::to_string(&canonical).expect("canonical state serializes")
    }

    /// Hashes the canonical serialization.
    ///
    /// Derived, not authoritative: two states with equal logical content
    /// produce equal checksums regardless of insertion order.
    pub fn checksum(&self, crypto: &impl CryptoPort) -> Result<String> {
        crypto.hash_hex(self.canonical_json().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::Sha256Crypto;
    use serde_json::json;

    fn table(name: &str, sql: &str) -> SchemaObject {
        SchemaObject::new(name, json!({ "sql": sql }))
    }

    #[test]
    fn add_and_lookup() {
        let mut state = SchemaState::new();
        state.add_object(
            SchemaObjectCategory::Table,
            table("users", "CREATE TABLE users"),
        );

        let obj = state.object(SchemaObjectCategory::Table, "users").unwrap();
        assert_eq!(obj.sql(), Some("CREATE TABLE users"));
        assert!(state.object(SchemaObjectCategory::Table, "missing").is_none());
        assert!(state.object(SchemaObjectCategory::View, "users").is_none());
    }

    #[test]
    fn add_overwrites_same_name() {
        let mut state = SchemaState::new();
        state.add_object(SchemaObjectCategory::Table, table("users", "v1"));
        state.add_object(SchemaObjectCategory::Table, table("users", "v2"));

        assert_eq!(state.len(), 1);
        let obj = state.object(SchemaObjectCategory::Table, "users").unwrap();
        assert_eq!(obj.sql(), Some("v2"));
    }

    #[test]
    fn absent_category_reads_as_empty() {
        let state = SchemaState::new();
        assert_eq!(state.objects(SchemaObjectCategory::Function).count(), 0);
        assert!(state.is_empty());
    }

    #[test]
    fn checksum_invariant_under_insertion_order() {
        let mut a = SchemaState::new();
        a.add_object(SchemaObjectCategory::Table, table("aaa", "A"));
        a.add_object(SchemaObjectCategory::Table, table("bbb", "B"));
        a.add_object(SchemaObjectCategory::View, table("vvv", "V"));

        let mut b = SchemaState::new();
        b.add_object(SchemaObjectCategory::View, table("vvv", "V"));
        b.add_object(SchemaObjectCategory::Table, table("bbb", "B"));
        b.add_object(SchemaObjectCategory::Table, table("aaa", "A"));

        let crypto = Sha256Crypto;
        assert_eq!(
            a.checksum(&crypto).unwrap(),
            b.checksum(&crypto).unwrap()
        );
    }

    #[test]
    fn checksum_changes_with_content() {
        let mut a = SchemaState::new();
        a.add_object(SchemaObjectCategory::Table, table("users", "v1"));

        let mut b = SchemaState::new();
        b.add_object(SchemaObjectCategory::Table, table("users", "v2"));

        let crypto = Sha256Crypto;
        assert_ne!(
            a.checksum(&crypto).unwrap(),
            b.checksum(&crypto).unwrap()
        );
    }

    #[test]
    fn canonical_json_has_fixed_category_order() {
        let mut state = SchemaState::new();
        state.add_object(SchemaObjectCategory::Index, table("idx", "I"));
        state.add_object(SchemaObjectCategory::Table, table("t", "T"));

        let json = state.canonical_json();
        let tables_at = json.find("\"tables\"").unwrap();
        let views_at = json.find("\"views\"").unwrap();
        let functions_at = json.find("\"functions\"").unwrap();
        let indexes_at = json.find("\"indexes\"").unwrap();
        assert!(tables_at < views_at);
        assert!(views_at < functions_at);
        assert!(functions_at < indexes_at);
    }

    #[test]
    fn sql_accessor_handles_missing_field() {
        let obj = SchemaObject::new("users", json!({"version": 1}));
        assert_eq!(obj.sql(), None);
    }
}
