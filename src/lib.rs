//! GLOOMMAZE: a bitmap-driven first-person maze crawler core
//!
//! Four raster images become a navigable 3D level:
//! - watertight corridor geometry with atlas-mapped walls/floors/ceilings
//! - point lights, collectable keys, and color-locked sliding doors
//! - a rising sludge hazard that slows and eventually drowns the player
//! - minimap bookkeeping and exact save/restore of campaign progress
//!
//! Rendering, audio mixing, window/input plumbing, and menu widgets
//! live on the far side of the [`engine::Engine`] contract; this crate
//! owns the level model and the gameplay state machine that drives it.

/// Version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod engine;
pub mod game;
pub mod math;
pub mod save;
pub mod world;

pub use engine::Engine;
pub use game::{Level, LevelEvent};
pub use save::SaveState;
