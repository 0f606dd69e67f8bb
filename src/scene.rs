//! Scene model — the slice of the target's player/object graph the bridge
//! drives. The real surface lives inside the game client; `Scene` and
//! `Projector` are the operations the generated programs rely on, and
//! `SimScene`/`SimProjector` back the demo agent and the test suite.
//!
//! Every accessor is fallible by returning `Option` — a missing avatar, a
//! despawned part, or a projection backend that rejects a point must never
//! abort the caller's frame.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Handle to an entity in the target's object graph.
pub type EntityRef = u64;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn scale(self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y * factor, self.z * factor)
    }

    pub fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Read/mutate surface over the target's entity graph.
pub trait Scene {
    fn local_entity(&self) -> Option<EntityRef>;
    fn entities(&self) -> Vec<EntityRef>;
    fn user_id(&self, entity: EntityRef) -> Option<i64>;
    fn name(&self, entity: EntityRef) -> Option<String>;
    /// The entity's own world position, when it exposes one directly.
    fn position(&self, entity: EntityRef) -> Option<Vec3>;
    /// Position of a named avatar part (Head / Torso / Root).
    fn part_position(&self, entity: EntityRef, part: &str) -> Option<Vec3>;
    /// Names of the avatar's collidable parts.
    fn collidable_parts(&self, entity: EntityRef) -> Vec<String>;
    fn set_collide(&mut self, entity: EntityRef, part: &str, enabled: bool);
    fn root_velocity(&self, entity: EntityRef) -> Option<Vec3>;
    fn set_root_velocity(&mut self, entity: EntityRef, velocity: Vec3);
    fn set_health(&mut self, entity: EntityRef, health: f64);
    fn set_max_health(&mut self, entity: EntityRef, max_health: f64);
    fn set_speed(&mut self, entity: EntityRef, speed: f64);
    fn set_scale(&mut self, entity: EntityRef, scale: Vec3);
}

/// Screen-space projection primitives exposed by the target's renderer.
/// Backends disagree on availability and coordinate origin, hence the
/// ordered fallback chain in the overlay engine.
pub trait Projector {
    /// Project to screen pixels. Returns the point plus a depth component;
    /// depth > 0 means in front of the camera.
    fn world_to_screen(&self, world: Vec3) -> Option<(Vec2, f64)>;
    /// Project to normalized viewport coordinates, with the same depth.
    fn world_to_viewport(&self, world: Vec3) -> Option<(Vec2, f64)>;
    fn viewport_to_screen(&self, viewport: Vec2) -> Option<Vec2>;
    fn screen_size(&self) -> Option<Vec2>;
}

/// One avatar part in the simulated scene.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimPart {
    pub name: String,
    pub position: Option<Vec3>,
    pub velocity: Vec3,
    pub collidable: bool,
    pub collide: bool,
}

impl SimPart {
    pub fn new(name: &str, position: Vec3) -> Self {
        Self {
            name: name.to_string(),
            position: Some(position),
            velocity: Vec3::default(),
            collidable: true,
            collide: true,
        }
    }
}

/// One entity in the simulated scene.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimEntity {
    pub user_id: Option<i64>,
    pub name: String,
    pub position: Option<Vec3>,
    pub health: f64,
    pub max_health: f64,
    pub speed: f64,
    pub scale: Vec3,
    pub parts: Vec<SimPart>,
}

impl SimEntity {
    pub fn named(name: &str) -> Self {
        Self {
            user_id: None,
            name: name.to_string(),
            position: None,
            health: 100.0,
            max_health: 100.0,
            speed: 16.0,
            scale: Vec3::new(1.0, 1.0, 1.0),
            parts: Vec::new(),
        }
    }

    pub fn with_user_id(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_part(mut self, part: SimPart) -> Self {
        self.parts.push(part);
        self
    }
}

/// In-memory scene used by the demo agent and the tests.
#[derive(Debug, Default)]
pub struct SimScene {
    local: Option<EntityRef>,
    entities: BTreeMap<EntityRef, SimEntity>,
    next_ref: EntityRef,
}

impl SimScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entity(&mut self, entity: SimEntity) -> EntityRef {
        self.next_ref += 1;
        let entity_ref = self.next_ref;
        self.entities.insert(entity_ref, entity);
        entity_ref
    }

    pub fn set_local(&mut self, entity: EntityRef) {
        self.local = Some(entity);
    }

    pub fn remove_entity(&mut self, entity: EntityRef) -> Option<SimEntity> {
        if self.local == Some(entity) {
            self.local = None;
        }
        self.entities.remove(&entity)
    }

    pub fn get(&self, entity: EntityRef) -> Option<&SimEntity> {
        self.entities.get(&entity)
    }

    fn part(&self, entity: EntityRef, name: &str) -> Option<&SimPart> {
        self.entities
            .get(&entity)?
            .parts
            .iter()
            .find(|p| p.name == name)
    }

    fn part_mut(&mut self, entity: EntityRef, name: &str) -> Option<&mut SimPart> {
        self.entities
            .get_mut(&entity)?
            .parts
            .iter_mut()
            .find(|p| p.name == name)
    }

    /// The part movement effects act on: Torso first, then Root, matching
    /// the avatar layouts the target exposes.
    fn root_part_name(&self, entity: EntityRef) -> Option<String> {
        for candidate in ["Torso", "Root"] {
            if self.part(entity, candidate).is_some() {
                return Some(candidate.to_string());
            }
        }
        None
    }
}

impl Scene for SimScene {
    fn local_entity(&self) -> Option<EntityRef> {
        self.local
    }

    fn entities(&self) -> Vec<EntityRef> {
        self.entities.keys().copied().collect()
    }

    fn user_id(&self, entity: EntityRef) -> Option<i64> {
        self.entities.get(&entity)?.user_id
    }

    fn name(&self, entity: EntityRef) -> Option<String> {
        Some(self.entities.get(&entity)?.name.clone())
    }

    fn position(&self, entity: EntityRef) -> Option<Vec3> {
        self.entities.get(&entity)?.position
    }

    fn part_position(&self, entity: EntityRef, part: &str) -> Option<Vec3> {
        self.part(entity, part)?.position
    }

    fn collidable_parts(&self, entity: EntityRef) -> Vec<String> {
        self.entities
            .get(&entity)
            .map(|e| {
                e.parts
                    .iter()
                    .filter(|p| p.collidable)
                    .map(|p| p.name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn set_collide(&mut self, entity: EntityRef, part: &str, enabled: bool) {
        if let Some(part) = self.part_mut(entity, part) {
            part.collide = enabled;
        }
    }

    fn root_velocity(&self, entity: EntityRef) -> Option<Vec3> {
        let root = self.root_part_name(entity)?;
        Some(self.part(entity, &root)?.velocity)
    }

    fn set_root_velocity(&mut self, entity: EntityRef, velocity: Vec3) {
        if let Some(root) = self.root_part_name(entity) {
            if let Some(part) = self.part_mut(entity, &root) {
                part.velocity = velocity;
            }
        }
    }

    fn set_health(&mut self, entity: EntityRef, health: f64) {
        if let Some(e) = self.entities.get_mut(&entity) {
            e.health = health;
        }
    }

    fn set_max_health(&mut self, entity: EntityRef, max_health: f64) {
        if let Some(e) = self.entities.get_mut(&entity) {
            e.max_health = max_health;
        }
    }

    fn set_speed(&mut self, entity: EntityRef, speed: f64) {
        if let Some(e) = self.entities.get_mut(&entity) {
            e.speed = speed;
        }
    }

    fn set_scale(&mut self, entity: EntityRef, scale: Vec3) {
        if let Some(e) = self.entities.get_mut(&entity) {
            e.scale = scale;
        }
    }
}

/// Orthographic projector for the simulated scene: world x/y map straight
/// to pixels, world z is the depth component.
#[derive(Debug, Clone, Copy)]
pub struct SimProjector {
    pub screen: Vec2,
}

impl SimProjector {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            screen: Vec2::new(width, height),
        }
    }
}

impl Projector for SimProjector {
    fn world_to_screen(&self, world: Vec3) -> Option<(Vec2, f64)> {
        Some((Vec2::new(world.x, world.y), world.z))
    }

    fn world_to_viewport(&self, world: Vec3) -> Option<(Vec2, f64)> {
        Some((
            Vec2::new(world.x / self.screen.x, world.y / self.screen.y),
            world.z,
        ))
    }

    fn viewport_to_screen(&self, viewport: Vec2) -> Option<Vec2> {
        Some(Vec2::new(
            viewport.x * self.screen.x,
            viewport.y * self.screen.y,
        ))
    }

    fn screen_size(&self) -> Option<Vec2> {
        Some(self.screen)
    }
}

/// A demo world: one local player plus a couple of remote players with
/// avatar parts, used by `hookline agent`.
pub fn demo_scene() -> SimScene {
    let mut scene = SimScene::new();

    let local = scene.add_entity(
        SimEntity::named("LocalPlayer")
            .with_user_id(1)
            .with_part(SimPart::new("Head", Vec3::new(0.0, 5.0, 0.0)))
            .with_part(SimPart::new("Torso", Vec3::new(0.0, 3.0, 0.0))),
    );
    scene.set_local(local);

    scene.add_entity(
        SimEntity::named("Rival")
            .with_user_id(2)
            .with_position(Vec3::new(640.0, 320.0, 12.0)),
    );
    scene.add_entity(
        SimEntity::named("Bystander")
            .with_part(SimPart::new("Head", Vec3::new(900.0, 200.0, 30.0)))
            .with_part(SimPart::new("Torso", Vec3::new(900.0, 180.0, 30.0))),
    );

    scene
}
