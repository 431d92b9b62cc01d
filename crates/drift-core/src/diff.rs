//! Structural diffing between two schema snapshots.
//!
//! The diff engine emits one operation per detected change, sorts the set by
//! execution priority (stable within a bucket), and stamps every operation
//! with its content hash before returning.

use std::collections::HashSet;

use crate::enums::{OperationKind, SchemaObjectCategory};
use crate::operation::{MigrationOperation, OperationDetail};
use crate::ports::{CryptoPort, Result};
use crate::schema::{SchemaObject, SchemaState};

/// Computes ordered, hashed operation sets between two schema states.
pub struct DiffEngine<C> {
    crypto: C,
}

impl<C: CryptoPort> DiffEngine<C> {
    pub fn new(crypto: C) -> Self {
        Self { crypto }
    }

    /// Computes the operation set that transforms `current` into `target`.
    ///
    /// Never fails intrinsically; identical states yield an empty set and an
    /// absent category reads as empty. Crypto port errors propagate
    /// verbatim.
    pub fn calculate_diff(
        &self,
        current: &SchemaState,
        target: &SchemaState,
    ) -> Result<Vec<MigrationOperation>> {
        let mut ops = Vec::new();

        for category in SchemaObjectCategory::ALL {
            // Objects present only in the current state are dropped.
            for obj in current.objects(category) {
                if target.object(category, &obj.name).is_none() {
                    ops.push(MigrationOperation::new(
                        category.drop_kind(),
                        &obj.name,
                        format!("DROP {} IF EXISTS {}", category.keyword(), obj.name),
                        OperationDetail::Drop {
                            original_definition: obj.definition.clone(),
                        },
                    ));
                }
            }

            // Objects in the target state are created or, when present in
            // both states with differing definitions, modified.
            for tgt in target.objects(category) {
                match current.object(category, &tgt.name) {
                    None => ops.push(self.create_operation(category, tgt)),
                    Some(cur) => {
                        if !self.definitions_equal(cur, tgt)? {
                            ops.push(self.modify_operation(category, cur, tgt));
                        }
                    }
                }
            }
        }

        // Stable sort: discovery order is preserved within a priority bucket.
        ops.sort_by_key(|op| op.priority());

        for op in &mut ops {
            op.compute_hash(&self.crypto)?;
        }

        Ok(ops)
    }

    /// Drops duplicate operations keyed by `(kind, object_name)`, keeping
    /// the first occurrence. Idempotent.
    pub fn optimize(&self, ops: Vec<MigrationOperation>) -> Vec<MigrationOperation> {
        let mut seen: HashSet<(u8, String)> = HashSet::new();
        ops.into_iter()
            .filter(|op| seen.insert((op.kind.ordinal(), op.object_name.clone())))
            .collect()
    }

    fn create_operation(
        &self,
        category: SchemaObjectCategory,
        tgt: &SchemaObject,
    ) -> MigrationOperation {
        let sql = match tgt.sql() {
            Some(sql) => sql.to_owned(),
            None => format!("CREATE {} {}", category.keyword(), tgt.name),
        };
        MigrationOperation::new(
            category.create_kind(),
            &tgt.name,
            sql,
            OperationDetail::Create {
                definition: tgt.definition.clone(),
            },
        )
    }

    /// Every modification is planned as `AlterTable` regardless of category;
    /// the compiler expands or replaces alter steps downstream.
    fn modify_operation(
        &self,
        category: SchemaObjectCategory,
        cur: &SchemaObject,
        tgt: &SchemaObject,
    ) -> MigrationOperation {
        let sql = match tgt.sql() {
            Some(sql) => sql.to_owned(),
            None => format!("-- ALTER {} {}", category.keyword(), tgt.name),
        };
        MigrationOperation::new(
            OperationKind::AlterTable,
            &tgt.name,
            sql,
            OperationDetail::Modify {
                category,
                current_definition: cur.definition.clone(),
                target_definition: tgt.definition.clone(),
            },
        )
    }

    /// Definition equality is hash equality over the canonical
    /// serialization.
    fn definitions_equal(&self, a: &SchemaObject, b: &SchemaObject) -> Result<bool> {
        let ha = self.crypto.hash_hex(a.canonical_definition().as_bytes())?;
        let hb = self.crypto.hash_hex(b.canonical_definition().as_bytes())?;
        Ok(ha == hb)
    }
}
