//! Closed enum types for schema objects and migration operations.
//!
//! `OperationKind` ordinals are stable: they participate in the operation
//! hash contract and must never be renumbered.

use serde::{Deserialize, Serialize};
use std::fmt;

// ===========================================================================
// SchemaObjectCategory
// ===========================================================================

/// Categories of schema object that participate in diffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaObjectCategory {
    Table,
    View,
    Function,
    Index,
}

impl SchemaObjectCategory {
    /// Fixed iteration order for diffing and canonical serialization.
    pub const ALL: [Self; 4] = [Self::Table, Self::View, Self::Function, Self::Index];

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::View => "view",
            Self::Function => "function",
            Self::Index => "index",
        }
    }

    /// Plural key used in the canonical serialization of a schema state.
    pub fn plural(&self) -> &'static str {
        match self {
            Self::Table => "tables",
            Self::View => "views",
            Self::Function => "functions",
            Self::Index => "indexes",
        }
    }

    /// SQL keyword used in generated statements.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Table => "TABLE",
            Self::View => "VIEW",
            Self::Function => "FUNCTION",
            Self::Index => "INDEX",
        }
    }

    /// The operation kind that creates an object of this category.
    pub fn create_kind(&self) -> OperationKind {
        match self {
            Self::Table => OperationKind::CreateTable,
            Self::View => OperationKind::CreateView,
            Self::Function => OperationKind::CreateFunction,
            Self::Index => OperationKind::CreateIndex,
        }
    }

    /// The operation kind that drops an object of this category.
    pub fn drop_kind(&self) -> OperationKind {
        match self {
            Self::Table => OperationKind::DropTable,
            Self::View => OperationKind::DropView,
            Self::Function => OperationKind::DropFunction,
            Self::Index => OperationKind::DropIndex,
        }
    }
}

impl fmt::Display for SchemaObjectCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ===========================================================================
// OperationKind
// ===========================================================================

/// One atomic planned change to the schema.
///
/// Ordinal values (see [`ordinal`](Self::ordinal)) are part of the hash
/// contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    CreateTable,
    DropTable,
    AlterTable,
    CreateIndex,
    DropIndex,
    CreateFunction,
    DropFunction,
    CreateView,
    DropView,
    InsertData,
    UpdateData,
    DeleteData,
}

impl OperationKind {
    /// Stable ordinal used in operation hashing and step ids.
    pub fn ordinal(&self) -> u8 {
        match self {
            Self::CreateTable => 0,
            Self::DropTable => 1,
            Self::AlterTable => 2,
            Self::CreateIndex => 3,
            Self::DropIndex => 4,
            Self::CreateFunction => 5,
            Self::DropFunction => 6,
            Self::CreateView => 7,
            Self::DropView => 8,
            Self::InsertData => 9,
            Self::UpdateData => 10,
            Self::DeleteData => 11,
        }
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateTable => "create_table",
            Self::DropTable => "drop_table",
            Self::AlterTable => "alter_table",
            Self::CreateIndex => "create_index",
            Self::DropIndex => "drop_index",
            Self::CreateFunction => "create_function",
            Self::DropFunction => "drop_function",
            Self::CreateView => "create_view",
            Self::DropView => "drop_view",
            Self::InsertData => "insert_data",
            Self::UpdateData => "update_data",
            Self::DeleteData => "delete_data",
        }
    }

    /// Returns `true` for operations that discard schema or data.
    pub fn is_destructive(&self) -> bool {
        matches!(
            self,
            Self::DropTable
                | Self::DropIndex
                | Self::DropFunction
                | Self::DropView
                | Self::DeleteData
        )
    }

    /// Returns `true` for schema-shape operations (as opposed to data
    /// manipulation).
    pub fn is_schema(&self) -> bool {
        self.ordinal() <= 8
    }

    /// Execution priority; lower runs first.
    ///
    /// Drops run before creates so that replacement objects never collide
    /// with their predecessors; data operations run last.
    pub fn priority(&self) -> i32 {
        match self {
            Self::DropView => 0,
            Self::DropFunction => 1,
            Self::DropIndex => 2,
            Self::AlterTable => 3,
            Self::DropTable => 4,
            Self::CreateTable => 5,
            Self::CreateFunction => 6,
            Self::CreateView => 7,
            Self::CreateIndex => 8,
            Self::InsertData => 9,
            Self::UpdateData => 10,
            Self::DeleteData => 11,
        }
    }

    /// Human-readable verb for step descriptions.
    pub fn verb(&self) -> &'static str {
        match self {
            Self::CreateTable => "Create table",
            Self::DropTable => "Drop table",
            Self::AlterTable => "Alter table",
            Self::CreateIndex => "Create index",
            Self::DropIndex => "Drop index",
            Self::CreateFunction => "Create function",
            Self::DropFunction => "Drop function",
            Self::CreateView => "Create view",
            Self::DropView => "Drop view",
            Self::InsertData => "Insert data",
            Self::UpdateData => "Update data",
            Self::DeleteData => "Delete data",
        }
    }

    /// Advisory execution timeout in milliseconds, enforced by the external
    /// executor.
    pub fn timeout_ms(&self) -> u64 {
        match self {
            Self::CreateTable => 60_000,
            Self::DropTable => 30_000,
            Self::AlterTable => 120_000,
            Self::CreateIndex => 30_000,
            Self::DropIndex => 15_000,
            Self::InsertData | Self::UpdateData => 300_000,
            _ => 60_000,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
