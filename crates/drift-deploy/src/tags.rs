//! Deployment tag grammar: generation, parsing, chronological comparison,
//! and rollback inference.
//!
//! Wire form: `data-deploy-{environment}-{migration_id}-{timestamp}` where
//! the timestamp is the canonical ISO-8601 instant with `:` and `.` each
//! replaced by `-` (git refs cannot contain them).

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use drift_core::ports::parse_iso_millis;

/// Fixed prefix of every deployment tag.
pub const TAG_PREFIX: &str = "data-deploy-";

/// Number of `-`-separated pieces the sanitized timestamp always has
/// (`YYYY MM DDTHH MM SS mmmZ`).
const TIMESTAMP_PARTS: usize = 6;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised by tag operations.
#[derive(Debug, thiserror::Error)]
pub enum TagError {
    /// Environment or migration id would make the tag ambiguous.
    #[error("invalid {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    /// A timestamp was not a canonical ISO-8601 instant.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// A tag string did not match the grammar.
    #[error("invalid tag {tag}: {reason}")]
    InvalidTag { tag: String, reason: String },
}

/// Convenience alias for tag operations.
pub type Result<T> = std::result::Result<T, TagError>;

// ---------------------------------------------------------------------------
// Parsed form
// ---------------------------------------------------------------------------

/// A deployment tag decomposed into its components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedTag {
    pub environment: String,
    pub migration_id: String,
    /// Reconstructed ISO-8601 instant.
    pub timestamp: String,
}

impl ParsedTag {
    /// The instant this tag was cut.
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        parse_iso_millis(&self.timestamp)
    }
}

// ---------------------------------------------------------------------------
// Grammar
// ---------------------------------------------------------------------------

/// Builds a deployment tag for an environment, migration id, and instant.
///
/// Environment and migration id must be non-empty and `-`-free so that the
/// split-on-`-` parse stays unambiguous; the timestamp must be canonical
/// ISO-8601 (`2025-08-28T12:00:00.000Z`).
pub fn generate_tag(environment: &str, migration_id: &str, timestamp: &str) -> Result<String> {
    check_component("environment", environment)?;
    check_component("migration_id", migration_id)?;
    if parse_iso_millis(timestamp).is_none() {
        return Err(TagError::InvalidTimestamp(timestamp.to_owned()));
    }

    let sanitized = timestamp.replace([':', '.'], "-");
    Ok(format!("{TAG_PREFIX}{environment}-{migration_id}-{sanitized}"))
}

/// Parses a deployment tag back into its components.
pub fn parse_tag(tag: &str) -> Result<ParsedTag> {
    let invalid = |reason: &str| TagError::InvalidTag {
        tag: tag.to_owned(),
        reason: reason.to_owned(),
    };

    let rest = tag
        .strip_prefix(TAG_PREFIX)
        .ok_or_else(|| invalid("missing data-deploy prefix"))?;

    let parts: Vec<&str> = rest.split('-').collect();
    if parts.len() < 3 {
        return Err(invalid(
            "expected environment, migration id, and timestamp",
        ));
    }

    let environment = parts[0];
    let migration_id = parts[1];
    if environment.is_empty() || migration_id.is_empty() {
        return Err(invalid("empty environment or migration id"));
    }

    let timestamp = restore_timestamp(&parts[2..]).ok_or_else(|| invalid("malformed timestamp"))?;

    Ok(ParsedTag {
        environment: environment.to_owned(),
        migration_id: migration_id.to_owned(),
        timestamp,
    })
}

/// Chronological comparison of two tags.
pub fn compare_tags(a: &str, b: &str) -> Result<Ordering> {
    let ta = parsed_instant(a)?;
    let tb = parsed_instant(b)?;
    Ok(ta.cmp(&tb))
}

/// Keeps the tags of one environment, skipping anything unparsable.
pub fn filter_tags_by_environment<'a>(tags: &'a [String], environment: &str) -> Vec<&'a str> {
    tags.iter()
        .filter(|tag| {
            parse_tag(tag)
                .map(|parsed| parsed.environment == environment)
                .unwrap_or(false)
        })
        .map(String::as_str)
        .collect()
}

// ---------------------------------------------------------------------------
// Rollback inference
// ---------------------------------------------------------------------------

/// Whether a deployment is a rollback, and where it rolls back from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackInfo {
    pub is_rollback: bool,
    /// The superseding tag (explicit, or the newest tag cut after this
    /// migration's own tag).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback_from: Option<String>,
}

/// Infers rollback intent from the environment's tag history.
///
/// A deployment is a rollback iff a rollback source is declared explicitly,
/// or the history contains a tag newer than this migration's own tag.
pub fn get_rollback_info(
    migration_id: &str,
    explicit_rollback_from: Option<&str>,
    history: &[String],
) -> Result<RollbackInfo> {
    if let Some(source) = explicit_rollback_from {
        return Ok(RollbackInfo {
            is_rollback: true,
            rollback_from: Some(source.to_owned()),
        });
    }

    let mut own_instant: Option<DateTime<Utc>> = None;
    for tag in history {
        let parsed = parse_tag(tag)?;
        if parsed.migration_id == migration_id {
            own_instant = parsed.instant();
            break;
        }
    }

    let Some(own) = own_instant else {
        return Ok(RollbackInfo {
            is_rollback: false,
            rollback_from: None,
        });
    };

    // The newest tag cut after our own marks what we roll back from.
    let mut newest: Option<(DateTime<Utc>, &str)> = None;
    for tag in history {
        let parsed = parse_tag(tag)?;
        if let Some(instant) = parsed.instant() {
            if instant > own && newest.map(|(t, _)| instant > t).unwrap_or(true) {
                newest = Some((instant, tag));
            }
        }
    }

    Ok(RollbackInfo {
        is_rollback: newest.is_some(),
        rollback_from: newest.map(|(_, tag)| tag.to_owned()),
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn check_component(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(TagError::InvalidInput {
            field: field.to_owned(),
            reason: "must not be empty".to_owned(),
        });
    }
    if value.contains('-') {
        return Err(TagError::InvalidInput {
            field: field.to_owned(),
            reason: "must not contain '-'".to_owned(),
        });
    }
    Ok(())
}

/// Reverses the `:`/`.` substitution given the six sanitized pieces.
fn restore_timestamp(parts: &[&str]) -> Option<String> {
    if parts.len() != TIMESTAMP_PARTS {
        return None;
    }
    let restored = format!(
        "{}-{}-{}:{}:{}.{}",
        parts[0], parts[1], parts[2], parts[3], parts[4], parts[5]
    );
    parse_iso_millis(&restored).map(|_| restored)
}

fn parsed_instant(tag: &str) -> Result<DateTime<Utc>> {
    let parsed = parse_tag(tag)?;
    parsed
        .instant()
        .ok_or_else(|| TagError::InvalidTimestamp(parsed.timestamp))
}
