//! Transform component
//!
//! Position, rotation, and non-uniform scale, local to an optional
//! parent. Parenting exists for exactly one reason here: collected
//! keys ride the camera at a fixed HUD offset.

use serde::{Deserialize, Serialize};

use crate::math::{Quat, Vec3};

/// Local transform relative to the parent entity (world space when
/// unparented).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    pub fn new(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn translate(&mut self, offset: Vec3) {
        self.position = self.position + offset;
    }

    /// Where a local point lands after this transform.
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.position
            + self.rotation.rotate(Vec3::new(
                point.x * self.scale.x,
                point.y * self.scale.y,
                point.z * self.scale.z,
            ))
    }

    /// Interpolate toward another transform. Positions and scales
    /// lerp, rotations nlerp — exactly what the two-frame door slide
    /// needs.
    pub fn lerp(&self, other: &Transform, t: f32) -> Transform {
        Transform {
            position: self.position.lerp(other.position, t),
            rotation: self.rotation.nlerp(other.rotation, t),
            scale: self.scale.lerp(other.scale, t),
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}
