//! Level components
//!
//! The closed set of component kinds the maze runtime needs. These are
//! plain data; the renderer and mixer on the other side of the engine
//! contract consume them, and the level's systems mutate them.

use std::collections::HashMap;

use crate::engine::{Alignment, FontHandle, MeshHandle, TextureHandle};
use crate::game::transform::Transform;
use crate::math::{Vec2, Vec3};
use crate::world::map::ColorId;

/// Reference to an engine-side mesh.
#[derive(Debug, Clone, Copy)]
pub struct MeshInstance(pub MeshHandle);

/// One value in a material's property bag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaterialValue {
    Color(Vec3),
    Scalar(f32),
    Texture(TextureHandle),
}

/// String-keyed material property bag.
///
/// Renderers look up the keys they understand ("Color", "Texture",
/// "NormalMap", "Reflectivity", "Damping", "TilingFactor") and ignore
/// the rest.
#[derive(Debug, Clone, Default)]
pub struct Material {
    properties: HashMap<String, MaterialValue>,
}

impl Material {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: MaterialValue) {
        self.properties.insert(name.to_string(), value);
    }

    pub fn set_color(&mut self, name: &str, color: Vec3) {
        self.set(name, MaterialValue::Color(color));
    }

    pub fn set_scalar(&mut self, name: &str, value: f32) {
        self.set(name, MaterialValue::Scalar(value));
    }

    pub fn set_texture(&mut self, name: &str, texture: TextureHandle) {
        self.set(name, MaterialValue::Texture(texture));
    }

    pub fn color(&self, name: &str) -> Option<Vec3> {
        match self.properties.get(name) {
            Some(MaterialValue::Color(c)) => Some(*c),
            _ => None,
        }
    }

    pub fn scalar(&self, name: &str) -> Option<f32> {
        match self.properties.get(name) {
            Some(MaterialValue::Scalar(s)) => Some(*s),
            _ => None,
        }
    }

    pub fn texture(&self, name: &str) -> Option<TextureHandle> {
        match self.properties.get(name) {
            Some(MaterialValue::Texture(t)) => Some(*t),
            _ => None,
        }
    }
}

/// Point light. Position is carried here rather than on a transform —
/// lights are fire-and-forget data for the renderer, and several (the
/// player's halo, key glows) track positions that are not their own.
#[derive(Debug, Clone, Copy)]
pub struct PointLight {
    pub color: Vec3,
    pub intensity: f32,
    pub attenuation: Attenuation,
    pub position: Vec3,
}

/// Light falloff coefficients: `1 / (constant + linear·d + quadratic·d²)`.
#[derive(Debug, Clone, Copy)]
pub struct Attenuation {
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

impl Attenuation {
    pub const fn new(constant: f32, linear: f32, quadratic: f32) -> Self {
        Self {
            constant,
            linear,
            quadratic,
        }
    }
}

/// Keyframed transform animation. Frames play in order across the
/// total duration; completion is reported through the event queue, not
/// a callback.
#[derive(Debug, Clone)]
pub struct Animation {
    frames: Vec<Transform>,
    duration: f32,
    playing: bool,
    started_at: f64,
}

impl Animation {
    pub fn new(duration: f32) -> Self {
        Self {
            frames: Vec::new(),
            duration,
            playing: false,
            started_at: 0.0,
        }
    }

    pub fn add_frame(&mut self, frame: Transform) {
        self.frames.push(frame);
    }

    pub fn play(&mut self, now: f64) {
        self.playing = true;
        self.started_at = now;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Sample the animation at wall-clock time `now`. Returns the pose
    /// and whether the animation just finished; a finished animation
    /// stops playing.
    pub fn sample(&mut self, now: f64) -> Option<(Transform, bool)> {
        if !self.playing || self.frames.is_empty() {
            return None;
        }

        let t = if self.duration <= 0.0 {
            1.0
        } else {
            (((now - self.started_at) / self.duration as f64) as f32).clamp(0.0, 1.0)
        };

        let pose = if self.frames.len() == 1 {
            self.frames[0]
        } else {
            // Piecewise-linear across the frame list
            let span = (self.frames.len() - 1) as f32;
            let pos = t * span;
            let seg = (pos.floor() as usize).min(self.frames.len() - 2);
            let local = pos - seg as f32;
            self.frames[seg].lerp(&self.frames[seg + 1], local)
        };

        let finished = t >= 1.0;
        if finished {
            self.playing = false;
        }
        Some((pose, finished))
    }
}

/// Continuous rotation around a fixed axis (ground keys orbit with
/// this until they are picked up).
#[derive(Debug, Clone, Copy)]
pub struct Spin {
    pub axis: Vec3,
    pub degrees_per_sec: f32,
}

/// Screen-space textured rectangle: the minimap backdrop, the player
/// marker, and the visited-cell dots.
#[derive(Debug, Clone, Copy)]
pub struct Overlay {
    pub texture: TextureHandle,
    pub anchor: Alignment,
    pub position: Vec2,
    pub scale: Vec2,
}

/// Screen-space text: messages, hints.
#[derive(Debug, Clone)]
pub struct TextLabel {
    pub text: String,
    pub font: FontHandle,
    pub alignment: Alignment,
    pub position: Vec2,
    pub scale: Vec2,
}

/// A door blocking a cell. The color must match a held key to open;
/// `rotated` means the panel sits in an east-west wall (90° yaw) and
/// blocks crossing on X instead of Z.
#[derive(Debug, Clone, Copy)]
pub struct DoorPanel {
    pub color: ColorId,
    pub rotated: bool,
}

/// A collectable key, identified by its color.
#[derive(Debug, Clone, Copy)]
pub struct KeyItem {
    pub color: ColorId,
}
