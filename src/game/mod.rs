//! Maze runtime
//!
//! A small ECS-style foundation plus the gameplay that runs on it.
//!
//! Key concepts:
//! - Entity: generational index for safe references to doors/keys/markers
//! - Component: plain data in sparse per-type storage
//! - World: container for one level's entities, owned by the level
//! - Events: completion notifications as data, not callbacks
//!
//! Design philosophy: the component set is closed and known at compile
//! time — this runtime knows exactly what game it is running, so there
//! is no runtime type registration and no dynamic dispatch.

pub mod collision;
pub mod component;
pub mod components;
pub mod entity;
pub mod event;
pub mod level;
pub mod systems;
pub mod transform;
pub mod world;

pub use entity::Entity;
pub use event::Events;
pub use level::{Level, LevelEvent};
pub use transform::Transform;
pub use world::World;
