//! Texture atlas indexing
//!
//! Level textures come packed as a square grid of fixed-size tiles in
//! one image. A map channel value in [0,1] selects a tile; the UV
//! bounds are inset slightly so bilinear filtering never bleeds the
//! neighboring tile in.

/// Pixel size of one atlas tile.
pub const TILE_SIZE: u32 = 224;

/// Inset applied to every tile edge, in atlas units.
const TILE_INSET: f32 = 0.002;

/// UV sub-rectangle of one atlas tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileUv {
    pub u_min: f32,
    pub u_max: f32,
    pub v_min: f32,
    pub v_max: f32,
}

/// Layout of a packed square atlas: `tiles_per_side` tiles along each
/// axis.
#[derive(Debug, Clone, Copy)]
pub struct AtlasLayout {
    tiles_per_side: u32,
}

impl AtlasLayout {
    /// Derive the layout from the atlas texture's pixel width.
    pub fn from_texture_width(width: u32) -> Self {
        let tiles_per_side = (width / TILE_SIZE).max(1);
        Self { tiles_per_side }
    }

    pub fn tiles_per_side(&self) -> u32 {
        self.tiles_per_side
    }

    pub fn tile_count(&self) -> u32 {
        self.tiles_per_side * self.tiles_per_side
    }

    /// Map a channel value in [0,1] to its tile's inset UV bounds.
    ///
    /// The flattened index is `floor(value * tiles²)`, clamped so a
    /// fully saturated channel lands on the last tile instead of
    /// walking off the atlas.
    pub fn tile_uv(&self, value: f32) -> TileUv {
        let count = self.tile_count();
        let index = ((value * count as f32) as u32).min(count - 1);

        let col = (index % self.tiles_per_side) as f32;
        let row = (index / self.tiles_per_side) as f32;
        let n = self.tiles_per_side as f32;

        TileUv {
            u_min: (col + TILE_INSET) / n,
            u_max: (col + 1.0 - TILE_INSET) / n,
            v_min: (row + TILE_INSET) / n,
            v_max: (row + 1.0 - TILE_INSET) / n,
        }
    }
}
