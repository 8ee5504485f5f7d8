//! Movement and collision resolution
//!
//! The player is a point nudged by a fixed radius toward its direction
//! of travel on each axis — cheap AABB-vs-grid contact without a real
//! sweep. Wall hits zero only the offending axis so the player slides
//! along walls instead of stopping dead.

use crate::math::Vec3;
use crate::world::map::MapGrid;

/// Contact radius used to probe the grid ahead of the player.
pub const PLAYER_RADIUS: f32 = 0.2;

/// Outcome of one frame of movement against the grid.
#[derive(Debug, Clone, Copy)]
pub struct MoveResolution {
    /// Corrected camera position (blocked axes reverted).
    pub position: Vec3,
    /// The probe cell landed on the win cell; the frame short-circuits.
    pub reached_win: bool,
    /// Cell the player currently stands in (floor of the new position).
    pub current_cell: (i32, i32),
    /// Cell the player stood in last frame.
    pub old_cell: (i32, i32),
}

/// Resolve a movement step from `old` to `new` against the grid.
///
/// The probe cell is the new position pushed outward by
/// [`PLAYER_RADIUS`] along each axis's direction of travel. Reaching
/// the win cell wins immediately; otherwise solid probes revert the
/// axis that caused them, independently per axis.
pub fn resolve_movement(
    grid: &MapGrid,
    old: Vec3,
    new: Vec3,
    win_cell: Option<(i32, i32)>,
) -> MoveResolution {
    let old_x = old.x as i32;
    let old_z = old.z as i32;

    let offset_x = if new.x - old.x < 0.0 { -PLAYER_RADIUS } else { PLAYER_RADIUS };
    let offset_z = if new.z - old.z < 0.0 { -PLAYER_RADIUS } else { PLAYER_RADIUS };

    let probe_x = (new.x + offset_x) as i32;
    let probe_z = (new.z + offset_z) as i32;

    if win_cell == Some((probe_x, probe_z)) {
        return MoveResolution {
            position: new,
            reached_win: true,
            current_cell: (new.x.floor() as i32, new.z.floor() as i32),
            old_cell: (old_x, old_z),
        };
    }

    let solid = |x: i32, z: i32| grid.is_solid(x as usize, z as usize);

    let mut position = new;
    if solid(probe_x, probe_z) || solid(old_x, probe_z) || solid(probe_x, old_z) {
        // Probe each axis alone to find which one crossed into a wall
        let x_wall = solid(probe_x, old_z);
        let z_wall = solid(old_x, probe_z);
        let movement = new - old;
        if x_wall {
            position.x -= movement.x;
        }
        if z_wall {
            position.z -= movement.z;
        }
    }

    MoveResolution {
        position,
        reached_win: false,
        current_cell: (position.x.floor() as i32, position.z.floor() as i32),
        old_cell: (old_x, old_z),
    }
}

/// Clamp movement across a door's thin axis.
///
/// A closed door occupies its cell's center slab; the player may stand
/// within half the slab's depth of either cell edge but cannot push
/// into the interior. `rotated` doors (in east-west walls) block X,
/// default doors block Z.
pub fn clamp_at_door(
    old: Vec3,
    mut position: Vec3,
    door_cell: (i32, i32),
    rotated: bool,
    half_depth: f32,
) -> Vec3 {
    if rotated {
        let cell_x = door_cell.0 as f32;
        if position.x - cell_x > half_depth && (cell_x + 1.0) - position.x > half_depth {
            position.x = old.x;
        }
    } else {
        let cell_z = door_cell.1 as f32;
        if position.z - cell_z > half_depth && (cell_z + 1.0) - position.z > half_depth {
            position.z = old.z;
        }
    }
    position
}
