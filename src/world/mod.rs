//! World data model: the decoded maze grid, the texture atlas layout,
//! and the static geometry built from them.

pub mod atlas;
pub mod geometry;
pub mod map;

pub use atlas::{AtlasLayout, TileUv, TILE_SIZE};
pub use geometry::{build_level_mesh, door_mesh, unit_quad, MeshData, Vertex};
pub use map::{level_dir, level_exists, Cell, ColorId, MapError, MapGrid};
