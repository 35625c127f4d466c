use std::collections::BTreeMap;

use crate::{
    mapping::{is_active_key, is_viseme_key},
    AnimatorConfig, MeshBinding, VisemeEvent, WeightUpdate,
};

/// Snapshot of a mesh's morph weights keyed by target name.
pub type MorphWeightMap = BTreeMap<String, f32>;

/// The renderer side of the animation loop.
///
/// Implementations own the weight buffers; the animator is their only writer.
pub trait MorphTargetHost {
    /// Current weights for `mesh_id`, or `None` if the mesh is not loaded yet.
    fn morph_weight_map(&self, mesh_id: &str) -> Option<MorphWeightMap>;

    /// Writes one weight. Unknown meshes or keys must be ignored.
    fn set_morph_weight(&mut self, mesh_id: &str, key: &str, value: f32);
}

/// Eases every viseme weight toward the active viseme each tick.
#[derive(Debug, Clone, Default)]
pub struct BlendShapeAnimator {
    config: AnimatorConfig,
}

impl BlendShapeAnimator {
    pub fn new(config: AnimatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnimatorConfig {
        &self.config
    }

    /// Advances every bound mesh one frame and returns the weights written.
    ///
    /// `session_active` gates idle breathing: it only runs while the active
    /// viseme is silence and nothing is being spoken. Meshes the host cannot
    /// supply are skipped for this frame.
    pub fn tick<H>(
        &self,
        active: &VisemeEvent,
        session_active: bool,
        now_ms: u64,
        host: &mut H,
    ) -> Vec<WeightUpdate>
    where
        H: MorphTargetHost + ?Sized,
    {
        let breathing = active.viseme.is_silence() && !session_active;
        let mut updates = Vec::new();

        for binding in &self.config.meshes {
            let Some(weights) = host.morph_weight_map(&binding.mesh_id) else {
                tracing::trace!(mesh = %binding.mesh_id, "mesh not available, skipping");
                continue;
            };

            let mut next = self.blend_mesh(binding, active, &weights);
            if breathing && binding.is_primary() {
                self.apply_breathing(&mut next, now_ms);
            }

            for (key, value) in next {
                host.set_morph_weight(&binding.mesh_id, &key, value);
                updates.push(WeightUpdate {
                    mesh_id: binding.mesh_id.clone(),
                    key,
                    value,
                });
            }
        }

        updates
    }

    fn blend_mesh(
        &self,
        binding: &MeshBinding,
        active: &VisemeEvent,
        weights: &MorphWeightMap,
    ) -> MorphWeightMap {
        let attack = self.config.attack_rate.clamp(0.0, 1.0);
        let decay = self.config.decay_rate.clamp(0.0, 1.0);

        weights
            .iter()
            .filter(|(key, _)| is_viseme_key(key))
            .map(|(key, &current)| {
                let target = binding.target_for(key, active);
                let rate = if is_active_key(key, active) { attack } else { decay };
                (key.clone(), lerp(current, target, rate))
            })
            .collect()
    }

    fn apply_breathing(&self, next: &mut MorphWeightMap, now_ms: u64) {
        let rate = self.config.breathing_rate.clamp(0.0, 1.0);
        let level = self.breathing_level(now_ms);
        if let Some(value) = next.get_mut(&self.config.breathing_target) {
            *value = lerp(*value, level, rate);
        }
    }

    /// Sine wave offset so it swings between 0 and twice the amplitude.
    fn breathing_level(&self, now_ms: u64) -> f32 {
        let phase = now_ms as f64 * f64::from(self.config.breathing_frequency);
        let amplitude = self.config.breathing_amplitude;
        phase.sin() as f32 * amplitude + amplitude
    }
}

pub fn lerp(from: f32, to: f32, rate: f32) -> f32 {
    from + (to - from) * rate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AvatarScene, MorphMesh, VisemeId};

    const HEAD: &str = "Wolf3D_Head";
    const TEETH: &str = "Wolf3D_Teeth";

    fn animator() -> BlendShapeAnimator {
        BlendShapeAnimator::new(AnimatorConfig::default())
    }

    #[test]
    fn attack_rises_without_overshoot() {
        let mut scene = AvatarScene::ready_player_me();
        let active = VisemeEvent::new(VisemeId::PP, 0, 120, 0.8);

        animator().tick(&active, true, 0, &mut scene);
        let after_one = scene.weight(HEAD, "viseme_PP").unwrap();
        assert!(after_one > 0.0 && after_one < 0.8);
        assert!((after_one - 0.24).abs() < 1e-6);

        let mut previous = after_one;
        for _ in 0..50 {
            animator().tick(&active, true, 0, &mut scene);
            let value = scene.weight(HEAD, "viseme_PP").unwrap();
            assert!(value >= previous && value <= 0.8);
            previous = value;
        }
        assert!((previous - 0.8).abs() < 1e-3);
    }

    #[test]
    fn decay_falls_toward_zero_after_silence() {
        let mut scene = AvatarScene::ready_player_me();
        let spoken = VisemeEvent::new(VisemeId::PP, 0, 120, 0.8);
        for _ in 0..10 {
            animator().tick(&spoken, true, 0, &mut scene);
        }

        let mut previous = scene.weight(HEAD, "viseme_PP").unwrap();
        for frame in 0..20 {
            animator().tick(&VisemeEvent::silence(), false, frame * 16, &mut scene);
            let value = scene.weight(HEAD, "viseme_PP").unwrap();
            assert!(value < previous && value >= 0.0);
            previous = value;
        }
    }

    #[test]
    fn teeth_follow_at_reduced_strength() {
        let mut scene = AvatarScene::ready_player_me();
        let active = VisemeEvent::new(VisemeId::O, 0, 200, 0.8);
        for _ in 0..200 {
            animator().tick(&active, true, 0, &mut scene);
        }

        let head = scene.weight(HEAD, "viseme_O").unwrap();
        let teeth = scene.weight(TEETH, "viseme_O").unwrap();
        assert!((head - 0.8).abs() < 1e-3);
        assert!((teeth - 0.64).abs() < 1e-3);
    }

    #[test]
    fn non_viseme_targets_are_untouched() {
        let mut scene = AvatarScene::ready_player_me();
        scene.set_morph_weight(HEAD, "mouthSmile", 0.5);
        let updates = animator().tick(
            &VisemeEvent::new(VisemeId::AA, 0, 180, 0.9),
            true,
            0,
            &mut scene,
        );

        assert_eq!(scene.weight(HEAD, "mouthSmile"), Some(0.5));
        assert!(updates.iter().all(|update| update.key.starts_with("viseme_")));
    }

    #[test]
    fn missing_meshes_are_skipped() {
        let mut scene = AvatarScene::new();
        scene.register_mesh(MorphMesh::new(HEAD, ["viseme_aa", "viseme_PP"]));
        let updates = animator().tick(
            &VisemeEvent::new(VisemeId::PP, 0, 120, 0.8),
            true,
            0,
            &mut scene,
        );

        assert_eq!(updates.len(), 2);
        assert!(updates.iter().all(|update| update.mesh_id == HEAD));
    }

    #[test]
    fn empty_host_is_a_no_op() {
        let mut scene = AvatarScene::new();
        let updates = animator().tick(&VisemeEvent::silence(), false, 0, &mut scene);
        assert!(updates.is_empty());
    }

    #[test]
    fn breathing_only_when_idle() {
        let mut idle = AvatarScene::ready_player_me();
        let mut speaking = AvatarScene::ready_player_me();
        // sin(1.5708) is the crest of the wave.
        let crest_ms = 1_571;
        for _ in 0..100 {
            animator().tick(&VisemeEvent::silence(), false, crest_ms, &mut idle);
            animator().tick(&VisemeEvent::silence(), true, crest_ms, &mut speaking);
        }

        let breath = idle.weight(HEAD, "viseme_aa").unwrap();
        assert!(breath > 0.0 && breath <= 0.04 + 1e-6);
        assert_eq!(speaking.weight(HEAD, "viseme_aa"), Some(0.0));
        assert_eq!(idle.weight(TEETH, "viseme_aa"), Some(0.0));
    }

    #[test]
    fn lerp_interpolates_linearly() {
        assert_eq!(lerp(0.0, 1.0, 0.25), 0.25);
        assert_eq!(lerp(1.0, 0.0, 1.0), 0.0);
        assert_eq!(lerp(0.3, 0.9, 0.0), 0.3);
    }
}
