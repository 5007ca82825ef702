//! Combatant template library.
//!
//! Templates are loaded from JSON files on disk by the hosting application,
//! strictly outside turn processing; the engine only ever consumes the flat
//! fields (via [`crate::Encounter::add_from_template`]).

use crate::combatant::Speed;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tokio::fs;

/// Errors from library loading.
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("duplicate template: {0}")]
    Duplicate(String),
}

/// Saving throw modifiers, kept verbatim from the source data. The engine
/// itself only ever reads `dexterity` indirectly (as a tie-break score); the
/// rest is surfaced to the UI for rolling saves.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SavingThrows {
    pub strength: i32,
    pub dexterity: i32,
    pub constitution: i32,
    pub intelligence: i32,
    pub wisdom: i32,
    pub charisma: i32,
}

/// A reusable combatant definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatantTemplate {
    pub name: String,
    pub max_hp: i32,
    #[serde(default)]
    pub speed: Speed,
    /// Raw dexterity score, used as the second initiative tie-break.
    #[serde(default)]
    pub dexterity: Option<i32>,
    #[serde(default)]
    pub saving_throws: SavingThrows,
}

/// An in-memory set of templates keyed by name.
#[derive(Debug, Clone, Default)]
pub struct CombatantLibrary {
    templates: HashMap<String, CombatantTemplate>,
}

impl CombatantLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, template: CombatantTemplate) -> Result<(), LibraryError> {
        if self.templates.contains_key(&template.name) {
            return Err(LibraryError::Duplicate(template.name));
        }
        self.templates.insert(template.name.clone(), template);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&CombatantTemplate> {
        self.templates.get(name)
    }

    /// Template names, sorted for a stable listing.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.templates.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Load one JSON file holding an array of templates.
    pub async fn load_file(path: impl AsRef<Path>) -> Result<Vec<CombatantTemplate>, LibraryError> {
        let content = fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Load every `.json` file in a directory into one library. Files are
    /// read concurrently; duplicate names across files are an error.
    pub async fn load_dir(dir: impl AsRef<Path>) -> Result<Self, LibraryError> {
        let mut paths = Vec::new();
        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let batches = try_join_all(paths.iter().map(Self::load_file)).await?;

        let mut library = Self::new();
        for template in batches.into_iter().flatten() {
            library.insert(template)?;
        }
        Ok(library)
    }
}
