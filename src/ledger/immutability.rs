//! Immutability guard for approved items.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SieveError};

/// A write that would change an existing item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MutationOperation {
    Update,
    Delete,
}

impl MutationOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationOperation::Update => "UPDATE",
            MutationOperation::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for MutationOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MutationOperation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "UPDATE" => Ok(MutationOperation::Update),
            "DELETE" => Ok(MutationOperation::Delete),
            other => Err(format!("unknown mutation operation: '{}'", other)),
        }
    }
}

/// Refuse `operation` on an approved item.
///
/// Approved items can only be retired through deprecation.
pub fn assert_mutable(is_approved: bool, item_id: &str, operation: MutationOperation) -> Result<()> {
    if is_approved {
        tracing::warn!(item_id, operation = %operation, "mutation of approved item refused");
        return Err(SieveError::immutability_violation(item_id, operation.as_str()));
    }
    Ok(())
}
