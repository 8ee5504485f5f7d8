//! Map loading
//!
//! A level is authored as four equally-sized raster images living in a
//! per-level directory:
//!
//! - `levelMap.png` — R/G/B select the wall/floor/ceiling atlas tile;
//!   a pure-black pixel is a solid cell
//! - `lightMap.png` — a saturated channel places a point light
//! - `keyMap.png`   — a saturated channel places a key of that color
//! - `doorMap.png`  — a saturated channel places a door of that color
//!
//! The decoded [`MapGrid`] keeps the raw channel bytes; everything
//! downstream (atlas lookup, color identity, light colors) derives from
//! them so that a color written by an artist survives a save/load
//! round trip bit-for-bit.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::math::Vec3;

/// Identity of a key or door: the exact RGB bytes of its map pixel.
///
/// Colors act as IDs (a key opens the door sharing its color), so they
/// are compared as bytes, never as floats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColorId(pub [u8; 3]);

impl ColorId {
    /// The [0,1] float color used for materials and lights.
    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(
            self.0[0] as f32 / 255.0,
            self.0[1] as f32 / 255.0,
            self.0[2] as f32 / 255.0,
        )
    }

    /// Recover the byte identity from a float color (save files store
    /// floats). Exact for any color that originated from bytes.
    pub fn from_vec3(color: Vec3) -> Self {
        let quantize = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        ColorId([quantize(color.x), quantize(color.y), quantize(color.z)])
    }

    /// Does any channel reach full saturation? Map layers use a
    /// saturated channel as the "something is here" marker.
    pub fn any_channel_full(self) -> bool {
        self.0.iter().any(|&c| c == 255)
    }
}

/// One cell of the maze grid.
#[derive(Debug, Clone, Copy)]
pub struct Cell {
    /// Pure black in the index map: wall-occluded, not walkable.
    pub solid: bool,
    /// Wall/floor/ceiling atlas selectors (index map R/G/B).
    pub index_rgb: [u8; 3],
    pub light_rgb: ColorId,
    pub key_rgb: ColorId,
    pub door_rgb: ColorId,
}

impl Cell {
    pub fn wall_value(&self) -> f32 {
        self.index_rgb[0] as f32 / 255.0
    }

    pub fn floor_value(&self) -> f32 {
        self.index_rgb[1] as f32 / 255.0
    }

    pub fn ceiling_value(&self) -> f32 {
        self.index_rgb[2] as f32 / 255.0
    }
}

/// The decoded 2D maze model. X runs along image columns, Z along rows.
///
/// The outermost ring of cells is authored solid and excluded from all
/// iteration; grid access outside the bounds is a programming error and
/// panics rather than returning a recoverable error.
pub struct MapGrid {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

/// Errors from decoding a level's map directory.
#[derive(Debug)]
pub enum MapError {
    Io(std::io::Error),
    Decode(image::ImageError),
    /// The four layers must all share the index map's dimensions.
    LayerSizeMismatch {
        layer: &'static str,
        expected: (u32, u32),
        got: (u32, u32),
    },
}

impl From<std::io::Error> for MapError {
    fn from(e: std::io::Error) -> Self {
        MapError::Io(e)
    }
}

impl From<image::ImageError> for MapError {
    fn from(e: image::ImageError) -> Self {
        MapError::Decode(e)
    }
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapError::Io(e) => write!(f, "IO error: {}", e),
            MapError::Decode(e) => write!(f, "image decode error: {}", e),
            MapError::LayerSizeMismatch { layer, expected, got } => write!(
                f,
                "{} is {}x{} but the index map is {}x{}",
                layer, got.0, got.1, expected.0, expected.1
            ),
        }
    }
}

impl std::error::Error for MapError {}

/// Directory holding one level's map images.
pub fn level_dir(base: &Path, index: u32) -> PathBuf {
    base.join("levels").join(index.to_string())
}

/// Whether a level with this index exists. A missing directory is the
/// "campaign complete" signal, not an error.
pub fn level_exists(base: &Path, index: u32) -> bool {
    level_dir(base, index).is_dir()
}

impl MapGrid {
    /// Decode the four map layers from a level directory.
    pub fn load(dir: &Path) -> Result<MapGrid, MapError> {
        let index_map = image::open(dir.join("levelMap.png"))?.to_rgb8();
        let light_map = image::open(dir.join("lightMap.png"))?.to_rgb8();
        let key_map = image::open(dir.join("keyMap.png"))?.to_rgb8();
        let door_map = image::open(dir.join("doorMap.png"))?.to_rgb8();

        let expected = index_map.dimensions();
        for (layer, img) in [
            ("lightMap.png", &light_map),
            ("keyMap.png", &key_map),
            ("doorMap.png", &door_map),
        ] {
            if img.dimensions() != expected {
                return Err(MapError::LayerSizeMismatch {
                    layer,
                    expected,
                    got: img.dimensions(),
                });
            }
        }

        let (width, height) = (expected.0 as usize, expected.1 as usize);
        let mut cells = Vec::with_capacity(width * height);
        for z in 0..height {
            for x in 0..width {
                let p = index_map.get_pixel(x as u32, z as u32).0;
                cells.push(Cell {
                    solid: p == [0, 0, 0],
                    index_rgb: p,
                    light_rgb: ColorId(light_map.get_pixel(x as u32, z as u32).0),
                    key_rgb: ColorId(key_map.get_pixel(x as u32, z as u32).0),
                    door_rgb: ColorId(door_map.get_pixel(x as u32, z as u32).0),
                });
            }
        }

        Ok(MapGrid { width, height, cells })
    }

    /// Build a grid directly from per-cell layer data. Rows are Z-major,
    /// like the image decode path.
    pub fn from_layers(
        width: usize,
        height: usize,
        index: &[[u8; 3]],
        light: &[[u8; 3]],
        key: &[[u8; 3]],
        door: &[[u8; 3]],
    ) -> MapGrid {
        assert_eq!(index.len(), width * height, "index layer size mismatch");
        assert_eq!(light.len(), width * height, "light layer size mismatch");
        assert_eq!(key.len(), width * height, "key layer size mismatch");
        assert_eq!(door.len(), width * height, "door layer size mismatch");

        let cells = (0..width * height)
            .map(|i| Cell {
                solid: index[i] == [0, 0, 0],
                index_rgb: index[i],
                light_rgb: ColorId(light[i]),
                key_rgb: ColorId(key[i]),
                door_rgb: ColorId(door[i]),
            })
            .collect();

        MapGrid { width, height, cells }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn cell(&self, x: usize, z: usize) -> &Cell {
        assert!(x < self.width && z < self.height, "cell ({}, {}) out of bounds", x, z);
        &self.cells[z * self.width + x]
    }

    pub fn is_solid(&self, x: usize, z: usize) -> bool {
        self.cell(x, z).solid
    }

    /// Iterate the interior cells (the guaranteed-solid border ring is
    /// skipped, so neighbor lookups never leave the grid).
    pub fn iter_interior(&self) -> impl Iterator<Item = (usize, usize, &Cell)> {
        (1..self.width - 1).flat_map(move |x| {
            (1..self.height - 1).map(move |z| (x, z, self.cell(x, z)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid() -> [u8; 3] {
        [0, 0, 0]
    }

    fn open() -> [u8; 3] {
        [64, 128, 192]
    }

    fn empty_layer(n: usize) -> Vec<[u8; 3]> {
        vec![[0, 0, 0]; n]
    }

    #[test]
    fn test_border_is_solid_interior_open() {
        // 3x3 with a single open center cell
        let index = vec![
            solid(), solid(), solid(),
            solid(), open(), solid(),
            solid(), solid(), solid(),
        ];
        let blank = empty_layer(9);
        let grid = MapGrid::from_layers(3, 3, &index, &blank, &blank, &blank);

        assert!(grid.is_solid(0, 0));
        assert!(!grid.is_solid(1, 1));
        let interior: Vec<_> = grid.iter_interior().collect();
        assert_eq!(interior.len(), 1);
        assert_eq!((interior[0].0, interior[0].1), (1, 1));
    }

    #[test]
    fn test_channel_values_scale_to_unit_range() {
        let index = vec![open(); 9];
        let blank = empty_layer(9);
        let grid = MapGrid::from_layers(3, 3, &index, &blank, &blank, &blank);
        let cell = grid.cell(1, 1);
        assert!((cell.wall_value() - 64.0 / 255.0).abs() < 1e-6);
        assert!((cell.floor_value() - 128.0 / 255.0).abs() < 1e-6);
        assert!((cell.ceiling_value() - 192.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_color_id_float_round_trip() {
        for rgb in [[255, 0, 0], [0, 255, 128], [17, 99, 254]] {
            let id = ColorId(rgb);
            assert_eq!(ColorId::from_vec3(id.to_vec3()), id);
        }
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_out_of_bounds_access_panics() {
        let index = vec![solid(); 9];
        let blank = empty_layer(9);
        let grid = MapGrid::from_layers(3, 3, &index, &blank, &blank, &blank);
        grid.is_solid(3, 0);
    }

    #[test]
    fn test_missing_level_dir_signals_campaign_end() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(level_dir(dir.path(), 0)).unwrap();

        assert!(level_exists(dir.path(), 0));
        assert!(!level_exists(dir.path(), 1));
    }
}
