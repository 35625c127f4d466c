use serde::{Deserialize, Serialize};

use crate::VisemeEvent;

/// Prefix shared by every morph target the animator is allowed to touch.
pub const VISEME_PREFIX: &str = "viseme_";

/// Whether a mesh leads the mouth shape or follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeshRole {
    /// Head mesh; carries full intensity and idle breathing.
    Primary,
    /// Meshes such as teeth that mirror the head at reduced strength.
    Secondary,
}

/// Describes how the active viseme should be routed onto one mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshBinding {
    pub mesh_id: String,
    pub role: MeshRole,
    pub gain: f32,
}

impl MeshBinding {
    pub fn new(mesh_id: impl Into<String>, role: MeshRole, gain: f32) -> Self {
        Self {
            mesh_id: mesh_id.into(),
            role,
            gain,
        }
    }

    /// Ready Player Me head mesh.
    pub fn head() -> Self {
        Self::new("Wolf3D_Head", MeshRole::Primary, 1.0)
    }

    /// Ready Player Me teeth mesh, damped so it trails the lips.
    pub fn teeth() -> Self {
        Self::new("Wolf3D_Teeth", MeshRole::Secondary, 0.8)
    }

    pub fn is_primary(&self) -> bool {
        self.role == MeshRole::Primary
    }

    /// Weight this binding wants `key` to reach while `active` is playing.
    pub fn target_for(&self, key: &str, active: &VisemeEvent) -> f32 {
        if is_active_key(key, active) {
            active.intensity * self.gain
        } else {
            0.0
        }
    }
}

/// True for morph targets the animator drives.
pub fn is_viseme_key(key: &str) -> bool {
    key.starts_with(VISEME_PREFIX)
}

pub fn is_active_key(key: &str, active: &VisemeEvent) -> bool {
    key == active.viseme.morph_target()
}

/// Concrete weight written to a mesh after a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightUpdate {
    pub mesh_id: String,
    pub key: String,
    pub value: f32,
}
