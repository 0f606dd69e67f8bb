//! Movement-exploit loop — the walkfling feature.
//!
//! A re-armable per-frame continuation scheduled by the host's frame
//! clock. While armed it combines a collision-disable pass with velocity
//! amplification: the root velocity is overwritten with itself scaled by a
//! large factor plus a fixed upward vector, compounding frame over frame.
//! The growth is unbounded on purpose; clamping would change the
//! feature's observable behavior.
//!
//! Disable is a single flag write. The continuation checks the flag at the
//! top of its next invocation and uninstalls itself — lazy teardown, no
//! external disconnect.

use serde::Serialize;
use tracing::{debug, info};

use crate::scene::{Scene, Vec3};

/// Per-frame velocity multiplier.
pub const VELOCITY_FACTOR: f64 = 1000.0;

/// Constant upward kick added each frame.
pub const LIFT: f64 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum FlingState {
    #[default]
    Disabled,
    Armed,
}

pub struct FlingLoop {
    state: FlingState,
    /// Whether the continuation is currently scheduled on the frame clock.
    installed: bool,
    velocity_factor: f64,
    lift: Vec3,
}

impl Default for FlingLoop {
    fn default() -> Self {
        Self::new(VELOCITY_FACTOR, LIFT)
    }
}

impl FlingLoop {
    pub fn new(velocity_factor: f64, lift: f64) -> Self {
        Self {
            state: FlingState::Disabled,
            installed: false,
            velocity_factor,
            lift: Vec3::new(0.0, lift, 0.0),
        }
    }

    pub fn state(&self) -> FlingState {
        self.state
    }

    pub fn is_armed(&self) -> bool {
        self.state == FlingState::Armed
    }

    pub fn is_installed(&self) -> bool {
        self.installed
    }

    /// Arm the loop and schedule the continuation. Safe to call while
    /// already armed.
    pub fn arm(&mut self) {
        self.state = FlingState::Armed;
        self.installed = true;
        info!("movement exploit armed");
    }

    /// Clear the armed flag. The continuation notices on its next tick.
    pub fn disarm(&mut self) {
        if self.state == FlingState::Armed {
            info!("movement exploit disarmed");
        }
        self.state = FlingState::Disabled;
    }

    /// The per-frame continuation. Re-applies the collision-disable effect
    /// to every collidable part and amplifies the root velocity; both are
    /// safe to repeat every frame.
    pub fn tick(&mut self, scene: &mut dyn Scene) {
        if !self.installed {
            return;
        }
        if self.state == FlingState::Disabled {
            // Flag cleared since last frame: uninstall ourselves.
            self.installed = false;
            debug!("movement exploit continuation uninstalled");
            return;
        }

        let Some(local) = scene.local_entity() else {
            return;
        };

        for part in scene.collidable_parts(local) {
            scene.set_collide(local, &part, false);
        }

        if let Some(velocity) = scene.root_velocity(local) {
            scene.set_root_velocity(local, velocity.scale(self.velocity_factor).add(self.lift));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{SimEntity, SimPart, SimScene};

    fn scene_with_avatar() -> (SimScene, crate::scene::EntityRef) {
        let mut scene = SimScene::new();
        let local = scene.add_entity(
            SimEntity::named("Me")
                .with_part(SimPart::new("Head", Vec3::new(0.0, 5.0, 0.0)))
                .with_part(SimPart::new("Torso", Vec3::new(0.0, 3.0, 0.0))),
        );
        scene.set_local(local);
        (scene, local)
    }

    fn torso_velocity(scene: &SimScene, local: crate::scene::EntityRef) -> Vec3 {
        scene
            .get(local)
            .unwrap()
            .parts
            .iter()
            .find(|p| p.name == "Torso")
            .unwrap()
            .velocity
    }

    #[test]
    fn test_tick_amplifies_velocity() {
        let (mut scene, local) = scene_with_avatar();
        scene.set_root_velocity(local, Vec3::new(1.0, 0.0, 0.0));

        let mut fling = FlingLoop::default();
        fling.arm();
        fling.tick(&mut scene);

        assert_eq!(torso_velocity(&scene, local), Vec3::new(1000.0, 500.0, 0.0));
    }

    #[test]
    fn test_velocity_compounds_across_frames() {
        let (mut scene, local) = scene_with_avatar();
        scene.set_root_velocity(local, Vec3::new(0.0, 1.0, 0.0));

        let mut fling = FlingLoop::default();
        fling.arm();
        fling.tick(&mut scene);
        assert_eq!(torso_velocity(&scene, local).y, 1500.0);

        fling.tick(&mut scene);
        // Previous frame's already-amplified velocity feeds the next.
        assert_eq!(torso_velocity(&scene, local).y, 1500.0 * 1000.0 + 500.0);
    }

    #[test]
    fn test_tick_disables_collision_every_frame() {
        let (mut scene, local) = scene_with_avatar();
        let mut fling = FlingLoop::default();
        fling.arm();
        fling.tick(&mut scene);

        assert!(scene.get(local).unwrap().parts.iter().all(|p| !p.collide));

        // Host re-enables collision; the next tick re-applies the effect.
        scene.set_collide(local, "Torso", true);
        fling.tick(&mut scene);
        assert!(scene.get(local).unwrap().parts.iter().all(|p| !p.collide));
    }

    #[test]
    fn test_lazy_self_teardown() {
        let (mut scene, _) = scene_with_avatar();
        let mut fling = FlingLoop::default();

        fling.arm();
        fling.tick(&mut scene);
        assert!(fling.is_installed());

        fling.disarm();
        // Still installed until the continuation runs once more.
        assert!(fling.is_installed());
        assert!(!fling.is_armed());

        fling.tick(&mut scene);
        assert!(!fling.is_installed());
    }

    #[test]
    fn test_tick_after_teardown_is_inert() {
        let (mut scene, local) = scene_with_avatar();
        scene.set_root_velocity(local, Vec3::new(1.0, 0.0, 0.0));

        let mut fling = FlingLoop::default();
        fling.arm();
        fling.disarm();
        fling.tick(&mut scene); // uninstalls
        fling.tick(&mut scene); // no-op

        assert_eq!(torso_velocity(&scene, local), Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_rearm_after_disarm() {
        let (mut scene, local) = scene_with_avatar();
        scene.set_root_velocity(local, Vec3::new(1.0, 0.0, 0.0));

        let mut fling = FlingLoop::default();
        fling.arm();
        fling.disarm();
        fling.tick(&mut scene);

        fling.arm();
        fling.tick(&mut scene);
        assert_eq!(torso_velocity(&scene, local), Vec3::new(1000.0, 500.0, 0.0));
    }

    #[test]
    fn test_tick_without_local_entity() {
        let mut scene = SimScene::new();
        let mut fling = FlingLoop::default();
        fling.arm();
        // Must not panic and must stay installed for the next frame.
        fling.tick(&mut scene);
        assert!(fling.is_installed());
    }
}
