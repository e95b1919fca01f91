//! Bidirectional mapping between scene model ids and compact local ids.
//!
//! Local ids are dense (`0..len`) so per-model storage can live in a `Vec`;
//! scene ids are whatever the owning scene hands out.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

/// Scene-global model identifier.
pub type SceneId = u32;

/// Dense per-database model identifier.
pub type LocalId = u32;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "StoredIds", from = "StoredIds")]
pub struct IdMap {
    to_local: HashMap<SceneId, LocalId>,
    to_scene: Vec<SceneId>,
    names: Vec<Option<String>>,
}

impl IdMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Local id of `scene`, allocating the next one if unseen.
    pub fn resolve_or_insert(&mut self, scene: SceneId) -> LocalId {
        if let Some(&local) = self.to_local.get(&scene) {
            return local;
        }
        let local = self.to_scene.len() as LocalId;
        self.to_local.insert(scene, local);
        self.to_scene.push(scene);
        self.names.push(None);
        local
    }

    /// Register `scene` with a display name, returning its local id.
    pub fn reserve(&mut self, scene: SceneId, name: Option<String>) -> LocalId {
        let local = self.resolve_or_insert(scene);
        if name.is_some() {
            self.names[local as usize] = name;
        }
        local
    }

    pub fn local(&self, scene: SceneId) -> Option<LocalId> {
        self.to_local.get(&scene).copied()
    }

    pub fn scene(&self, local: LocalId) -> Option<SceneId> {
        self.to_scene.get(local as usize).copied()
    }

    pub fn name(&self, local: LocalId) -> Option<&str> {
        self.names.get(local as usize).and_then(|n| n.as_deref())
    }

    pub fn len(&self) -> usize {
        self.to_scene.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_scene.is_empty()
    }

    /// `(local, scene)` pairs in local id order.
    pub fn iter(&self) -> impl Iterator<Item = (LocalId, SceneId)> + '_ {
        self.to_scene
            .iter()
            .enumerate()
            .map(|(local, &scene)| (local as LocalId, scene))
    }
}

/// Persisted form; the reverse map is rebuilt on load so encoding does not
/// depend on hash iteration order.
#[derive(Serialize, Deserialize)]
struct StoredIds {
    scenes: Vec<SceneId>,
    names: Vec<Option<String>>,
}

impl From<IdMap> for StoredIds {
    fn from(ids: IdMap) -> Self {
        Self {
            scenes: ids.to_scene,
            names: ids.names,
        }
    }
}

impl From<StoredIds> for IdMap {
    fn from(stored: StoredIds) -> Self {
        let mut names = stored.names;
        names.resize(stored.scenes.len(), None);
        let to_local = stored
            .scenes
            .iter()
            .enumerate()
            .map(|(local, &scene)| (scene, local as LocalId))
            .collect();
        Self {
            to_local,
            to_scene: stored.scenes,
            names,
        }
    }
}
