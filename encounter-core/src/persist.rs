//! Encounter persistence: versioned JSON snapshots.
//!
//! Collaborators receive read-only snapshots; the engine never blocks on
//! I/O from inside turn processing. RNG state is not part of a snapshot — a
//! loaded encounter reseeds itself.

use crate::engine::{Encounter, TurnState};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tokio::fs;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Current save file version.
const SAVE_VERSION: u32 = 1;

/// A saved encounter with everything needed to resume.
#[derive(Debug, Serialize, Deserialize)]
pub struct SavedEncounter {
    /// Save format version for compatibility checking.
    pub version: u32,

    /// When the save was created (unix seconds).
    pub saved_at: u64,

    /// The complete encounter state.
    pub encounter: Encounter,

    /// Metadata about the save.
    pub metadata: SaveMetadata,
}

/// Metadata about the save file, readable without loading the full state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveMetadata {
    pub encounter_name: String,
    pub combatants: usize,
    pub round: Option<u32>,
}

impl SavedEncounter {
    /// Create a snapshot from the running encounter.
    pub fn new(encounter: Encounter) -> Self {
        let round = match encounter.state() {
            TurnState::Active { round, .. } => Some(round),
            TurnState::NotStarted => None,
        };
        let metadata = SaveMetadata {
            encounter_name: encounter.name.clone(),
            combatants: encounter.len(),
            round,
        };

        Self {
            version: SAVE_VERSION,
            saved_at: unix_now(),
            encounter,
            metadata,
        }
    }

    /// Save to a JSON file.
    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Load from a JSON file.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let content = fs::read_to_string(path).await?;
        let saved: Self = serde_json::from_str(&content)?;

        if saved.version != SAVE_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: SAVE_VERSION,
                found: saved.version,
            });
        }

        Ok(saved)
    }

    /// Read a save's metadata without deserializing the full state.
    pub async fn peek_metadata(path: impl AsRef<Path>) -> Result<SaveMetadata, PersistError> {
        let content = fs::read_to_string(path).await?;

        #[derive(Deserialize)]
        struct Partial {
            version: u32,
            metadata: SaveMetadata,
        }

        let partial: Partial = serde_json::from_str(&content)?;

        if partial.version != SAVE_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: SAVE_VERSION,
                found: partial.version,
            });
        }

        Ok(partial.metadata)
    }
}

/// Current timestamp in unix seconds.
fn unix_now() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
