//! Migration operation -- one atomic planned change to the schema.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::enums::{OperationKind, SchemaObjectCategory};
use crate::ports::{CryptoPort, Result};

/// Payload attached to an operation, varying by how the change was
/// discovered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "change_type", rename_all = "snake_case")]
pub enum OperationDetail {
    /// Object exists only in the target state.
    Create { definition: Value },

    /// Object exists only in the current state.
    Drop { original_definition: Value },

    /// Object exists in both states with differing definitions.
    ///
    /// The category records what actually changed; the operation kind is
    /// `AlterTable` for every modification (the compiler expands alters
    /// downstream).
    Modify {
        category: SchemaObjectCategory,
        current_definition: Value,
        target_definition: Value,
    },

    /// Data-manipulation change; the statement itself is the payload.
    Data,
}

/// One atomic planned change to the schema.
///
/// Identity is `(kind, object_name, sql)`; the hash is derived from exactly
/// that triple, so equal triples always hash equally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationOperation {
    pub kind: OperationKind,

    pub object_name: String,

    /// SQL to execute. May be a placeholder such as `-- ALTER FUNCTION foo`.
    pub sql: String,

    pub detail: OperationDetail,

    /// Hex digest over `"{ordinal}:{object_name}:{sql}"`; filled by the diff
    /// engine before the operation set is returned.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hash: String,
}

impl MigrationOperation {
    /// Creates an operation with an empty hash.
    pub fn new(
        kind: OperationKind,
        object_name: impl Into<String>,
        sql: impl Into<String>,
        detail: OperationDetail,
    ) -> Self {
        Self {
            kind,
            object_name: object_name.into(),
            sql: sql.into(),
            detail,
            hash: String::new(),
        }
    }

    /// The string the operation hash is computed over.
    pub fn hash_input(&self) -> String {
        format!("{}:{}:{}", self.kind.ordinal(), self.object_name, self.sql)
    }

    /// Computes and stores the operation hash via the crypto port.
    pub fn compute_hash(&mut self, crypto: &impl CryptoPort) -> Result<()> {
        self.hash = crypto.hash_hex(self.hash_input().as_bytes())?;
        Ok(())
    }

    /// Returns `true` if executing this operation discards schema or data.
    pub fn is_destructive(&self) -> bool {
        self.kind.is_destructive()
    }

    /// Execution priority; lower runs first.
    pub fn priority(&self) -> i32 {
        self.kind.priority()
    }

    /// Dedup key used by the optimizer.
    pub fn dedup_key(&self) -> (u8, &str) {
        (self.kind.ordinal(), self.object_name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::Sha256Crypto;
    use serde_json::json;

    fn create_op() -> MigrationOperation {
        MigrationOperation::new(
            OperationKind::CreateTable,
            "users",
            "CREATE TABLE users (id SERIAL PRIMARY KEY)",
            OperationDetail::Create {
                definition: json!({"sql": "CREATE TABLE users (id SERIAL PRIMARY KEY)"}),
            },
        )
    }

    #[test]
    fn hash_input_uses_ordinal_name_sql() {
        let op = create_op();
        assert_eq!(
            op.hash_input(),
            "0:users:CREATE TABLE users (id SERIAL PRIMARY KEY)"
        );
    }

    #[test]
    fn equal_triples_hash_equally() {
        let mut a = create_op();
        let mut b = create_op();
        a.compute_hash(&Sha256Crypto).unwrap();
        b.compute_hash(&Sha256Crypto).unwrap();
        assert_eq!(a.hash, b.hash);
        assert!(!a.hash.is_empty());
    }

    #[test]
    fn different_sql_hashes_differently() {
        let mut a = create_op();
        let mut b = create_op();
        b.sql = "CREATE TABLE users (id BIGSERIAL PRIMARY KEY)".into();
        a.compute_hash(&Sha256Crypto).unwrap();
        b.compute_hash(&Sha256Crypto).unwrap();
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn detail_serializes_with_change_type_tag() {
        let op = MigrationOperation::new(
            OperationKind::AlterTable,
            "users",
            "ALTER TABLE users ADD COLUMN email VARCHAR(255)",
            OperationDetail::Modify {
                category: SchemaObjectCategory::Table,
                current_definition: json!({"version": 1}),
                target_definition: json!({"version": 2}),
            },
        );
        let json = serde_json::to_string(&op).unwrap();
        assert!(json.contains(r#""change_type":"modify""#));
        assert!(json.contains(r#""current_definition""#));
        assert!(json.contains(r#""target_definition""#));
    }

    #[test]
    fn operation_serde_roundtrip() {
        let mut op = create_op();
        op.compute_hash(&Sha256Crypto).unwrap();
        let json = serde_json::to_string(&op).unwrap();
        let back: MigrationOperation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, op);
    }
}
