//! CLI commands for Sieve.
//!
//! This module provides CLI commands for Sieve, organized into:
//! - **Gate commands**: check, validate (run gates over a draft file)
//! - **History commands**: status, prune (inspect and trim recorded results)
//! - **Utility commands**: transitions, config

// Gate commands
pub mod check;
pub mod validate;

// History commands
pub mod prune;
pub mod status;

// Utility commands
pub mod config_cmd;
pub mod transitions;

pub use check::CheckCommand;
pub use config_cmd::ConfigCommand;
pub use prune::PruneCommand;
pub use status::StatusCommand;
pub use transitions::TransitionsCommand;
pub use validate::ValidateCommand;

use std::fs;
use std::path::Path;

use crate::core::{normalize_draft, DraftPayload, NormalizedDraft};
use crate::error::{Result, SieveError};

/// Read a draft JSON file and normalize it.
pub fn read_draft(path: &Path) -> Result<NormalizedDraft> {
    let content = fs::read_to_string(path).map_err(|e| SieveError::storage(path, e))?;
    let draft: DraftPayload = serde_json::from_str(&content)?;
    normalize_draft(&draft)
}

/// Render any serializable output as pretty JSON.
pub(crate) fn to_json<T: serde::Serialize>(output: &T) -> String {
    serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::fs;
    use std::path::{Path, PathBuf};

    /// Write a draft JSON file into `dir` and return its path.
    pub fn write_draft(dir: &Path, body: serde_json::Value) -> PathBuf {
        let path = dir.join("draft.json");
        fs::write(&path, serde_json::to_string_pretty(&body).unwrap()).unwrap();
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_read_draft_normalizes() {
        let dir = TempDir::new().unwrap();
        let path = testing::write_draft(
            dir.path(),
            json!({"itemId": " w-1 ", "itemType": "word", "text": "  hola   mundo ", "language": "ES"}),
        );

        let draft = read_draft(&path).unwrap();
        assert_eq!(draft.item_id, "w-1");
        assert_eq!(draft.input.text, "hola mundo");
        assert_eq!(draft.input.language, "es");
    }

    #[test]
    fn test_read_draft_missing_file() {
        let result = read_draft(Path::new("/nonexistent/draft.json"));
        assert!(matches!(result, Err(SieveError::Storage { .. })));
    }

    #[test]
    fn test_read_draft_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("draft.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(read_draft(&path), Err(SieveError::Serde { .. })));
    }
}
