//! Quest Registry
//!
//! Loads quest definitions from TOML files once at startup. The table is
//! read-only afterwards and shared across workers behind an `Arc`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use super::definition::{QuestDefinition, RawQuestFile};
use crate::error::DefinitionError;

#[derive(Debug, Default)]
pub struct QuestRegistry {
    quests: HashMap<String, Arc<QuestDefinition>>,
}

impl QuestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_definitions(definitions: impl IntoIterator<Item = QuestDefinition>) -> Self {
        let mut registry = Self::new();
        for definition in definitions {
            registry.insert(definition);
        }
        registry
    }

    /// Load all quest definitions from `<data_dir>/quests`. Files that fail
    /// to parse or validate are logged and skipped.
    pub fn load_from_directory(data_dir: &Path) -> Result<Self, DefinitionError> {
        let quest_dir = data_dir.join("quests");
        let mut registry = Self::new();
        info!("Loading quests from {:?}", quest_dir);

        if !quest_dir.exists() {
            warn!("Quest directory does not exist: {:?}", quest_dir);
            return Ok(registry);
        }

        let mut paths = Vec::new();
        collect_toml_files(&quest_dir, &mut paths)?;
        paths.sort();

        for path in paths {
            match load_quest_file(&path) {
                Ok(quest) => {
                    info!("Loaded quest: {} ({})", quest.name, quest.id);
                    if registry.quests.contains_key(&quest.id) {
                        warn!("Quest '{}' defined twice, {:?} wins", quest.id, path);
                    }
                    registry.insert(quest);
                }
                Err(e) => warn!("Failed to load quest {:?}: {}", path, e),
            }
        }

        info!("Loaded {} quest definitions", registry.count());
        registry.validate_prerequisites();
        Ok(registry)
    }

    pub fn insert(&mut self, definition: QuestDefinition) {
        self.quests
            .insert(definition.id.clone(), Arc::new(definition));
    }

    /// Warn about prerequisites that reference unknown quests
    fn validate_prerequisites(&self) {
        for quest in self.quests.values() {
            for prerequisite in &quest.prerequisites {
                if !self.quests.contains_key(prerequisite) {
                    warn!(
                        "Quest '{}' references non-existent prerequisite '{}'",
                        quest.id, prerequisite
                    );
                }
            }
        }
    }

    pub fn get(&self, quest_id: &str) -> Option<Arc<QuestDefinition>> {
        self.quests.get(quest_id).cloned()
    }

    pub fn all(&self) -> Vec<Arc<QuestDefinition>> {
        let mut quests: Vec<_> = self.quests.values().cloned().collect();
        quests.sort_by(|a, b| a.id.cmp(&b.id));
        quests
    }

    pub fn all_ids(&self) -> Vec<String> {
        self.quests.keys().cloned().collect()
    }

    /// Get quests offered by a specific NPC
    pub fn get_quests_for_npc(&self, npc_id: &str) -> Vec<Arc<QuestDefinition>> {
        self.quests
            .values()
            .filter(|q| q.giver_npc.as_deref() == Some(npc_id))
            .cloned()
            .collect()
    }

    /// Get initial quests (those without prerequisites)
    pub fn get_starting_quests(&self) -> Vec<Arc<QuestDefinition>> {
        self.quests
            .values()
            .filter(|q| q.prerequisites.is_empty())
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.quests.len()
    }
}

/// Recursively collect `.toml` files
fn collect_toml_files(dir: &Path, paths: &mut Vec<PathBuf>) -> Result<(), DefinitionError> {
    let entries = std::fs::read_dir(dir).map_err(|source| DefinitionError::Io {
        path: dir.display().to_string(),
        source,
    })?;

    for entry in entries {
        let entry = entry.map_err(|source| DefinitionError::Io {
            path: dir.display().to_string(),
            source,
        })?;
        let path = entry.path();

        if path.is_dir() {
            collect_toml_files(&path, paths)?;
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            paths.push(path);
        }
    }

    Ok(())
}

fn load_quest_file(path: &Path) -> Result<QuestDefinition, DefinitionError> {
    let content = std::fs::read_to_string(path).map_err(|source| DefinitionError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let raw: RawQuestFile = toml::from_str(&content).map_err(|e| DefinitionError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    QuestDefinition::from_raw(&raw.quest)
}
