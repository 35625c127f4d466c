use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{MorphTargetHost, MorphWeightMap, VisemeId};

/// Non-viseme targets present on Ready Player Me heads; the engine leaves
/// them alone.
const EXPRESSION_TARGETS: [&str; 4] = ["eyeBlinkLeft", "eyeBlinkRight", "mouthSmile", "browInnerUp"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MorphMesh {
    pub name: String,
    dictionary: BTreeMap<String, usize>,
    influences: Vec<f32>,
}

impl MorphMesh {
    /// Creates a mesh with one zeroed influence slot per target, in order.
    pub fn new<I, S>(name: impl Into<String>, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut dictionary = BTreeMap::new();
        for target in targets {
            let next = dictionary.len();
            dictionary.entry(target.into()).or_insert(next);
        }
        let influences = vec![0.0; dictionary.len()];
        Self {
            name: name.into(),
            dictionary,
            influences,
        }
    }

    /// A mesh carrying every viseme target.
    pub fn with_visemes(name: impl Into<String>) -> Self {
        Self::new(name, VisemeId::ALL.iter().map(|viseme| viseme.morph_target()))
    }

    pub fn weight(&self, key: &str) -> Option<f32> {
        let index = *self.dictionary.get(key)?;
        self.influences.get(index).copied()
    }

    /// Writes a weight, returning `false` when the mesh has no such target.
    pub fn set_weight(&mut self, key: &str, value: f32) -> bool {
        let Some(&index) = self.dictionary.get(key) else {
            return false;
        };
        match self.influences.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Snapshot of every target that has a backing influence slot.
    pub fn weights(&self) -> MorphWeightMap {
        self.dictionary
            .iter()
            .filter_map(|(key, &index)| {
                self.influences
                    .get(index)
                    .map(|value| (key.clone(), *value))
            })
            .collect()
    }
}

/// Collection of morph-able meshes making up one avatar.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvatarScene {
    meshes: Vec<MorphMesh>,
}

impl AvatarScene {
    pub fn new() -> Self {
        Self { meshes: Vec::new() }
    }

    /// Head and teeth meshes laid out like a Ready Player Me export.
    pub fn ready_player_me() -> Self {
        let head_targets = VisemeId::ALL
            .iter()
            .map(|viseme| viseme.morph_target())
            .chain(EXPRESSION_TARGETS);

        let mut scene = Self::new();
        scene.register_mesh(MorphMesh::new("Wolf3D_Head", head_targets));
        scene.register_mesh(MorphMesh::with_visemes("Wolf3D_Teeth"));
        scene
    }

    /// Adds a mesh, replacing any existing mesh of the same name.
    pub fn register_mesh(&mut self, mesh: MorphMesh) {
        match self.meshes.iter_mut().find(|existing| existing.name == mesh.name) {
            Some(existing) => *existing = mesh,
            None => self.meshes.push(mesh),
        }
    }

    pub fn meshes(&self) -> &[MorphMesh] {
        &self.meshes
    }

    pub fn mesh(&self, mesh_id: &str) -> Option<&MorphMesh> {
        self.meshes.iter().find(|mesh| mesh.name == mesh_id)
    }

    pub fn mesh_mut(&mut self, mesh_id: &str) -> Option<&mut MorphMesh> {
        self.meshes.iter_mut().find(|mesh| mesh.name == mesh_id)
    }

    pub fn weight(&self, mesh_id: &str, key: &str) -> Option<f32> {
        self.mesh(mesh_id)?.weight(key)
    }
}

impl MorphTargetHost for AvatarScene {
    fn morph_weight_map(&self, mesh_id: &str) -> Option<MorphWeightMap> {
        self.mesh(mesh_id).map(MorphMesh::weights)
    }

    fn set_morph_weight(&mut self, mesh_id: &str, key: &str, value: f32) {
        if let Some(mesh) = self.mesh_mut(mesh_id) {
            mesh.set_weight(key, value);
        }
    }
}
