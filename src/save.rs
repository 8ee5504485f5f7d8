//! Save state
//!
//! One ordered record of campaign progress: level index, camera pose,
//! collected keys, opened doors, visited cells, sludge height. Stored
//! as RON, written brotli-compressed; reads auto-detect plain RON so
//! hand-edited files keep working. A missing file is first-run, not an
//! error: defaults are materialized and written back immediately, and
//! a file that fails to parse falls back to the same defaults instead
//! of killing the game.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::math::{Quat, Vec2, Vec3};

/// Where a fresh campaign puts the player.
pub const SPAWN_POSITION: Vec3 = Vec3 { x: 1.5, y: 0.3, z: 1.5 };

/// Sludge height a level starts with (just below the floor).
pub const INITIAL_SLUDGE_LEVEL: f32 = -0.02;

/// Errors from writing a save. Read-side parse problems are not
/// errors — they fall back to defaults.
#[derive(Debug)]
pub enum SaveError {
    Io(std::io::Error),
    Serialize(ron::Error),
}

impl From<std::io::Error> for SaveError {
    fn from(e: std::io::Error) -> Self {
        SaveError::Io(e)
    }
}

impl From<ron::Error> for SaveError {
    fn from(e: ron::Error) -> Self {
        SaveError::Serialize(e)
    }
}

impl std::fmt::Display for SaveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaveError::Io(e) => write!(f, "IO error: {}", e),
            SaveError::Serialize(e) => write!(f, "serialize error: {}", e),
        }
    }
}

impl std::error::Error for SaveError {}

/// Campaign progress snapshot.
///
/// Key and door colors are stored as float triples (the same values
/// their materials use); visited cells as float pairs. Both originate
/// from byte-exact sources, so a save/load round trip is exact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveState {
    pub level_index: u32,
    pub camera_position: Vec3,
    pub camera_rotation: Quat,
    pub collected_keys: Vec<Vec3>,
    pub opened_doors: Vec<Vec3>,
    pub visited_cells: Vec<Vec2>,
    pub sludge_level: f32,
}

impl SaveState {
    /// Fresh progress for a level: spawn pose, empty collections,
    /// starting sludge height.
    pub fn initial(level_index: u32) -> Self {
        Self {
            level_index,
            camera_position: SPAWN_POSITION,
            camera_rotation: Quat::IDENTITY,
            collected_keys: Vec::new(),
            opened_doors: Vec::new(),
            visited_cells: Vec::new(),
            sludge_level: INITIAL_SLUDGE_LEVEL,
        }
    }

    /// Load the save file, materializing defaults when it is missing
    /// or unreadable. The defaults are written back so the file exists
    /// from the first run onward.
    pub fn load_or_create(path: &Path) -> Result<SaveState, SaveError> {
        if !path.exists() {
            let state = SaveState::initial(0);
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir)?;
            }
            state.save(path)?;
            return Ok(state);
        }

        let bytes = fs::read(path)?;
        match Self::decode(&bytes) {
            Some(state) => Ok(state),
            None => {
                log::warn!(
                    "save file {} is unreadable, resetting to defaults",
                    path.display()
                );
                let state = SaveState::initial(0);
                state.save(path)?;
                Ok(state)
            }
        }
    }

    /// Write the save file: pretty RON, brotli-compressed.
    pub fn save(&self, path: &Path) -> Result<(), SaveError> {
        let config = ron::ser::PrettyConfig::new().indentor("  ".to_string());
        let text = ron::ser::to_string_pretty(self, config)?;

        let mut compressed = Vec::new();
        brotli::BrotliCompress(
            &mut Cursor::new(text.as_bytes()),
            &mut compressed,
            &brotli::enc::BrotliEncoderParams {
                quality: 6,
                lgwin: 22,
                ..Default::default()
            },
        )
        .map_err(|e| {
            SaveError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("brotli compression failed: {}", e),
            ))
        })?;

        fs::write(path, compressed)?;
        Ok(())
    }

    /// Decode save bytes, trying plain RON first (files start with '('
    /// or whitespace), then brotli-compressed RON. None on any failure.
    fn decode(bytes: &[u8]) -> Option<SaveState> {
        let looks_plain = bytes
            .first()
            .map(|&b| b == b'(' || b.is_ascii_whitespace())
            .unwrap_or(false);

        let text = if looks_plain {
            String::from_utf8(bytes.to_vec()).ok()?
        } else {
            let mut decompressed = Vec::new();
            brotli::BrotliDecompress(&mut Cursor::new(bytes), &mut decompressed).ok()?;
            String::from_utf8(decompressed).ok()?
        };

        ron::from_str(&text).ok()
    }
}
