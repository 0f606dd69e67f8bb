//! Overlay engine — per-frame projection of tracked entities to screen
//! space and the label pool behind the ESP feature.
//!
//! The engine is the agent-side state machine the compiled enable/disable
//! programs drive: `Disabled → Enabling → Enabled → Disabled`. Enabling
//! always tears down any prior subscriptions first, so sending the enable
//! program twice never stacks a second set of handlers or duplicates
//! labels. Every per-entity step of the frame tick is isolated — one bad
//! entity must never stop the whole overlay.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info};

use crate::scene::{EntityRef, Projector, Scene, Vec2, Vec3};

/// Pixels a label floats above the projected point.
pub const LABEL_OFFSET_PX: f64 = 16.0;

/// Lifecycle of a toggle feature owned by the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum FeatureState {
    #[default]
    Disabled,
    Enabling,
    Enabled,
}

/// The hooks a feature may hold into the host. At most one live
/// subscription per kind at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum HookKind {
    Frame,
    EntityAdded,
    EntityRemoved,
}

/// Entity identity for the label pool: user id, else name, else the raw
/// entity handle. Resolved once at label creation and stored, so a later
/// change of name cannot orphan a label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct EntityKey(String);

impl EntityKey {
    pub fn resolve(scene: &dyn Scene, entity: EntityRef) -> Self {
        if let Some(id) = scene.user_id(entity) {
            return Self(format!("id:{}", id));
        }
        if let Some(name) = scene.name(entity) {
            return Self(format!("name:{}", name));
        }
        Self(format!("ref:{}", entity))
    }
}

/// Handle to the drawing surface the labels attach to, owned by the
/// local player while the feature is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Surface {
    pub owner: EntityRef,
}

/// One on-screen label tracking a remote entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Label {
    pub text: String,
    pub position: Vec2,
    pub visible: bool,
}

impl Label {
    fn new(text: String) -> Self {
        Self {
            text,
            position: Vec2::default(),
            visible: false,
        }
    }
}

pub struct OverlayEngine {
    state: FeatureState,
    surface: Option<Surface>,
    labels: HashMap<EntityKey, Label>,
    subscriptions: Vec<HookKind>,
    label_offset_px: f64,
}

impl Default for OverlayEngine {
    fn default() -> Self {
        Self::new(LABEL_OFFSET_PX)
    }
}

impl OverlayEngine {
    pub fn new(label_offset_px: f64) -> Self {
        Self {
            state: FeatureState::Disabled,
            surface: None,
            labels: HashMap::new(),
            subscriptions: Vec::new(),
            label_offset_px,
        }
    }

    pub fn surface(&self) -> Option<Surface> {
        self.surface
    }

    pub fn state(&self) -> FeatureState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.state == FeatureState::Enabled
    }

    pub fn labels(&self) -> &HashMap<EntityKey, Label> {
        &self.labels
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Enable the overlay: tear down any prior subscriptions, locate or
    /// create the drawing surface on the local player, seed one label per
    /// currently-known remote entity, install fresh hooks.
    pub fn enable(&mut self, scene: &dyn Scene) {
        self.state = FeatureState::Enabling;

        // Idempotency guard: a second enable must not stack handlers.
        self.disconnect_all();
        self.ensure_surface(scene);

        for entity in scene.entities() {
            if Some(entity) == scene.local_entity() {
                continue;
            }
            self.ensure_label(scene, entity);
        }

        self.subscriptions = vec![HookKind::Frame, HookKind::EntityAdded, HookKind::EntityRemoved];
        self.state = FeatureState::Enabled;
        info!(labels = self.labels.len(), "overlay enabled");
    }

    /// Disable the overlay: drop every hook, destroy the whole pool and
    /// the surface with it.
    pub fn disable(&mut self) {
        self.state = FeatureState::Disabled;
        self.disconnect_all();
        let destroyed = self.labels.len();
        self.labels.clear();
        self.surface = None;
        info!(destroyed, "overlay disabled");
    }

    fn disconnect_all(&mut self) {
        self.subscriptions.clear();
    }

    /// Reuse the surface when its owner is still the local player,
    /// otherwise create a fresh one.
    fn ensure_surface(&mut self, scene: &dyn Scene) {
        let Some(local) = scene.local_entity() else {
            return;
        };
        match self.surface {
            Some(surface) if surface.owner == local => {}
            _ => {
                self.surface = Some(Surface { owner: local });
                debug!(owner = local, "overlay surface created");
            }
        }
    }

    fn ensure_label(&mut self, scene: &dyn Scene, entity: EntityRef) -> EntityKey {
        let key = EntityKey::resolve(scene, entity);
        self.labels.entry(key.clone()).or_insert_with(|| {
            let text = scene.name(entity).unwrap_or_else(|| "Player".to_string());
            debug!(key = ?key, "label created");
            Label::new(text)
        });
        key
    }

    /// Per-frame tick. Repositions or hides each label; a label whose
    /// entity is behind the camera is hidden, not destroyed.
    pub fn on_frame(&mut self, scene: &dyn Scene, projector: &dyn Projector) {
        if !self.is_enabled() {
            return;
        }

        let local = scene.local_entity();
        for entity in scene.entities() {
            if Some(entity) == local {
                continue;
            }
            let key = self.ensure_label(scene, entity);

            let Some(world) = resolve_world(scene, entity) else {
                // No position this frame; leave the label as it was.
                continue;
            };
            let Some((mut screen, depth)) = project(projector, world) else {
                continue;
            };
            if let Some(size) = projector.screen_size() {
                screen.y = correct_y(screen.y, size.y);
            }

            let offset = self.label_offset_px;
            if let Some(label) = self.labels.get_mut(&key) {
                if depth > 0.0 {
                    label.visible = true;
                    label.position = Vec2::new(screen.x, screen.y - offset);
                    if let Some(name) = scene.name(entity) {
                        label.text = name;
                    }
                } else {
                    label.visible = false;
                }
            }
        }
    }

    /// Entity-join hook: only creates a label while the feature is on.
    pub fn on_entity_added(&mut self, scene: &dyn Scene, entity: EntityRef) {
        if !self.is_enabled() {
            return;
        }
        if Some(entity) == scene.local_entity() {
            return;
        }
        self.ensure_label(scene, entity);
    }

    /// Entity-leave hook: always evicts, regardless of feature state, so
    /// labels never leak across enable/disable cycles.
    pub fn on_entity_removed(&mut self, scene: &dyn Scene, entity: EntityRef) {
        let key = EntityKey::resolve(scene, entity);
        if self.labels.remove(&key).is_some() {
            debug!(key = ?key, "label destroyed");
        }
    }
}

/// World position for an entity: its own position, else head, torso, root.
fn resolve_world(scene: &dyn Scene, entity: EntityRef) -> Option<Vec3> {
    scene
        .position(entity)
        .or_else(|| scene.part_position(entity, "Head"))
        .or_else(|| scene.part_position(entity, "Torso"))
        .or_else(|| scene.part_position(entity, "Root"))
}

/// Ordered projection fallback: direct world-to-screen, else viewport
/// composed with viewport-to-screen, else viewport scaled by the known
/// screen size.
fn project(projector: &dyn Projector, world: Vec3) -> Option<(Vec2, f64)> {
    if let Some(hit) = projector.world_to_screen(world) {
        return Some(hit);
    }
    let (viewport, depth) = projector.world_to_viewport(world)?;
    if let Some(screen) = projector.viewport_to_screen(viewport) {
        return Some((screen, depth));
    }
    let size = projector.screen_size()?;
    Some((Vec2::new(viewport.x * size.x, viewport.y * size.y), depth))
}

/// Vertical-flip correction for coordinate-origin mismatches between
/// projection backends. Applied only when the original y is out of bounds
/// and the flipped value re-enters `[0, height]`.
fn correct_y(y: f64, height: f64) -> f64 {
    if y < 0.0 || y > height {
        let flipped = height - y;
        if (0.0..=height).contains(&flipped) {
            return flipped;
        }
    }
    y
}
