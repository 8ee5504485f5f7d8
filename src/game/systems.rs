//! Frame systems
//!
//! Everything here runs once per `Level::update` call, synchronously,
//! in a fixed order. Player control writes the camera transform;
//! spin and animation playback write entity transforms; animation
//! completion lands in the event queue for the level to react to.

use crate::engine::{Engine, Key};
use crate::game::event::{AnimationFinished, Events};
use crate::game::transform::Transform;
use crate::game::world::World;
use crate::math::{Quat, Vec3};

/// First-person camera control: yaw-only mouse look plus WASD
/// movement on the XZ plane. Pitch stays locked — the maze is flat and
/// the minimap carries orientation.
pub struct PlayerControl {
    pub enabled: bool,
    pub sensitivity: f32,
}

impl PlayerControl {
    pub fn new() -> Self {
        Self {
            enabled: true,
            sensitivity: 0.5,
        }
    }

    /// Apply this frame's mouse delta to the camera's yaw.
    pub fn update_look(&self, engine: &dyn Engine, camera: &mut Transform) {
        if !self.enabled || !engine.mouse_grabbed() {
            return;
        }

        let dx = engine.mouse_delta().x;
        if dx != 0.0 {
            let turn = Quat::from_axis_angle(Vec3::UP, -dx * self.sensitivity);
            camera.rotation = turn.mul(camera.rotation).normalize();
        }
    }

    /// Apply held movement keys, scaled by the current speed. Movement
    /// stays on the XZ plane regardless of camera rotation.
    pub fn update_movement(
        &self,
        engine: &dyn Engine,
        camera: &mut Transform,
        speed: f32,
        delta: f32,
    ) {
        if !self.enabled {
            return;
        }

        let mut intent = Vec3::ZERO;
        if engine.key_down(Key::W) {
            intent = intent + Vec3::new(0.0, 0.0, 1.0);
        }
        if engine.key_down(Key::S) {
            intent = intent + Vec3::new(0.0, 0.0, -1.0);
        }
        if engine.key_down(Key::A) {
            intent = intent + Vec3::LEFT;
        }
        if engine.key_down(Key::D) {
            intent = intent + Vec3::new(1.0, 0.0, 0.0);
        }

        if intent == Vec3::ZERO {
            return;
        }

        let mut direction = camera.rotation.rotate(intent.normalize());
        direction.y = 0.0;
        camera.position = camera.position + direction.scale(speed * delta);
    }
}

impl Default for PlayerControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Advance every `Spin` component (orbiting ground keys).
pub fn update_spins(world: &mut World, delta: f32) {
    let spinning: Vec<_> = world.spins.iter().map(|(index, spin)| (index, *spin)).collect();

    for (index, spin) in spinning {
        let Some(entity) = world.entity_at_index(index) else {
            continue;
        };
        if let Some(transform) = world.transforms.get_mut(entity) {
            let step = Quat::from_axis_angle(spin.axis, spin.degrees_per_sec * delta);
            transform.rotation = step.mul(transform.rotation).normalize();
        }
    }
}

/// Advance playing animations, writing the sampled pose into the
/// entity transform and queueing a completion event at the last frame.
pub fn update_animations(world: &mut World, events: &mut Events, now: f64) {
    let mut sampled = Vec::new();
    for (index, animation) in world.animations.iter_mut() {
        if let Some((pose, done)) = animation.sample(now) {
            sampled.push((index, pose, done));
        }
    }

    for (index, pose, done) in sampled {
        let Some(entity) = world.entity_at_index(index) else {
            continue;
        };
        world.transforms.insert(entity, pose);
        if done {
            events.animation_finished.send(AnimationFinished { entity });
        }
    }
}
