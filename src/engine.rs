//! The engine contract
//!
//! Everything the maze core needs from the surrounding engine — asset
//! loading, audio playback, input state, menus, the clock — goes through
//! this trait. The core never draws, mixes, or pumps an event loop
//! itself; it creates entities and fires requests, and the host engine
//! consumes them.

use crate::math::{Vec2, Vec3};
use crate::world::geometry::MeshData;

/// Opaque handle to a texture owned by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

/// Opaque handle to a mesh uploaded to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub u32);

/// Opaque handle to a loaded sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SoundHandle(pub u32);

/// Opaque handle to a loaded font atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FontHandle(pub u32);

/// Opaque handle to a playable audio source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioSourceId(pub u32);

/// Opaque handle to an engine-drawn menu widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MenuId(pub u32);

/// A loaded texture together with its pixel dimensions. The width
/// determines the atlas layout for level textures.
#[derive(Debug, Clone, Copy)]
pub struct TextureInfo {
    pub handle: TextureHandle,
    pub width: u32,
    pub height: u32,
}

/// Keys the core cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    W,
    A,
    S,
    D,
    /// Open-door action
    O,
    /// Music toggle
    M,
    /// Pause toggle
    P,
    Up,
    Down,
    Return,
    Escape,
}

/// Screen-space anchoring for overlays and text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    TopRight,
    TopCenter,
    MiddleCenter,
    BottomRight,
}

/// Operations the surrounding engine provides to the maze core.
///
/// Audio and menu calls are fire-and-forget requests; nothing here
/// blocks or re-enters the core. Asset loads resolve to opaque handles
/// (the engine owns fallbacks for missing assets).
pub trait Engine {
    // Assets
    fn load_texture(&mut self, name: &str) -> TextureInfo;
    fn create_texture(&mut self, width: u32, height: u32, rgba: &[u8]) -> TextureInfo;
    fn load_mesh(&mut self, name: &str) -> MeshHandle;
    fn create_mesh(&mut self, mesh: &MeshData) -> MeshHandle;
    fn load_font(&mut self, name: &str) -> FontHandle;
    fn load_sound(&mut self, name: &str, positional: bool) -> SoundHandle;

    // Audio sources
    fn create_audio_source(&mut self, sound: SoundHandle) -> AudioSourceId;
    fn audio_play(&mut self, source: AudioSourceId);
    fn audio_stop(&mut self, source: AudioSourceId);
    fn audio_pause(&mut self, source: AudioSourceId);
    fn audio_loop(&mut self, source: AudioSourceId);
    fn audio_is_playing(&self, source: AudioSourceId) -> bool;
    fn audio_set_volume(&mut self, source: AudioSourceId, volume: f32);
    fn audio_set_pitch(&mut self, source: AudioSourceId, pitch: f32);
    fn audio_set_position(&mut self, source: AudioSourceId, position: Vec3);

    // Menus (widget drawing and layout live engine-side)
    fn create_menu(&mut self, items: &[&str]) -> MenuId;
    fn menu_show(&mut self, menu: MenuId);
    fn menu_hide(&mut self, menu: MenuId);
    fn menu_visible(&self, menu: MenuId) -> bool;
    fn menu_next(&mut self, menu: MenuId);
    fn menu_previous(&mut self, menu: MenuId);
    fn menu_selected(&self, menu: MenuId) -> usize;

    // Input
    /// Edge-triggered: true only on the frame the key went down.
    fn key_pressed(&self, key: Key) -> bool;
    /// Level-triggered: true while the key is held.
    fn key_down(&self, key: Key) -> bool;
    fn mouse_delta(&self) -> Vec2;
    fn mouse_grabbed(&self) -> bool;
    fn set_mouse_grabbed(&mut self, grabbed: bool);

    // Environment
    /// Monotonic wall-clock seconds; all gameplay timers compare
    /// against this, never against frame counts.
    fn seconds(&self) -> f64;
    fn aspect_ratio(&self) -> f32;
    fn request_exit(&mut self);
}

/// Recording stub used by the gameplay tests. Hands out sequential
/// handles, tracks menu/audio state, and lets a test script key
/// presses and the clock.
#[cfg(test)]
pub mod stub {
    use super::*;
    use std::collections::{HashMap, HashSet};

    pub struct StubEngine {
        next_id: u32,
        pub texture_width: u32,
        pub now: f64,
        pub aspect: f32,
        pub grabbed: bool,
        pub pressed: HashSet<Key>,
        pub held: HashSet<Key>,
        pub mouse_delta: Vec2,
        pub played: Vec<AudioSourceId>,
        pub stopped: Vec<AudioSourceId>,
        pub looping: Vec<AudioSourceId>,
        pub playing: HashSet<AudioSourceId>,
        pub volumes: HashMap<AudioSourceId, f32>,
        pub pitches: HashMap<AudioSourceId, f32>,
        pub sounds: HashMap<AudioSourceId, String>,
        next_sound_name: HashMap<SoundHandle, String>,
        pub visible_menus: HashSet<MenuId>,
        pub menu_cursor: HashMap<MenuId, usize>,
        pub menu_len: HashMap<MenuId, usize>,
        pub exit_requested: bool,
    }

    impl StubEngine {
        pub fn new() -> Self {
            Self {
                next_id: 0,
                texture_width: 448,
                now: 0.0,
                aspect: 16.0 / 9.0,
                grabbed: true,
                pressed: HashSet::new(),
                held: HashSet::new(),
                mouse_delta: Vec2::ZERO,
                played: Vec::new(),
                stopped: Vec::new(),
                looping: Vec::new(),
                playing: HashSet::new(),
                volumes: HashMap::new(),
                pitches: HashMap::new(),
                sounds: HashMap::new(),
                next_sound_name: HashMap::new(),
                visible_menus: HashSet::new(),
                menu_cursor: HashMap::new(),
                menu_len: HashMap::new(),
                exit_requested: false,
            }
        }

        fn fresh(&mut self) -> u32 {
            self.next_id += 1;
            self.next_id
        }

        /// Press a key for exactly the next update call.
        pub fn press(&mut self, key: Key) {
            self.pressed.insert(key);
        }

        pub fn end_frame(&mut self) {
            self.pressed.clear();
            self.mouse_delta = Vec2::ZERO;
        }

        /// Names of the sounds played so far, in order.
        pub fn played_names(&self) -> Vec<&str> {
            self.played
                .iter()
                .filter_map(|id| self.sounds.get(id).map(|s| s.as_str()))
                .collect()
        }
    }

    impl Engine for StubEngine {
        fn load_texture(&mut self, _name: &str) -> TextureInfo {
            TextureInfo {
                handle: TextureHandle(self.fresh()),
                width: self.texture_width,
                height: self.texture_width,
            }
        }

        fn create_texture(&mut self, width: u32, height: u32, _rgba: &[u8]) -> TextureInfo {
            TextureInfo {
                handle: TextureHandle(self.fresh()),
                width,
                height,
            }
        }

        fn load_mesh(&mut self, _name: &str) -> MeshHandle {
            MeshHandle(self.fresh())
        }

        fn create_mesh(&mut self, _mesh: &MeshData) -> MeshHandle {
            MeshHandle(self.fresh())
        }

        fn load_font(&mut self, _name: &str) -> FontHandle {
            FontHandle(self.fresh())
        }

        fn load_sound(&mut self, name: &str, _positional: bool) -> SoundHandle {
            let handle = SoundHandle(self.fresh());
            self.next_sound_name.insert(handle, name.to_string());
            handle
        }

        fn create_audio_source(&mut self, sound: SoundHandle) -> AudioSourceId {
            let id = AudioSourceId(self.fresh());
            if let Some(name) = self.next_sound_name.get(&sound) {
                self.sounds.insert(id, name.clone());
            }
            id
        }

        fn audio_play(&mut self, source: AudioSourceId) {
            self.played.push(source);
            self.playing.insert(source);
        }

        fn audio_stop(&mut self, source: AudioSourceId) {
            self.stopped.push(source);
            self.playing.remove(&source);
        }

        fn audio_pause(&mut self, source: AudioSourceId) {
            self.playing.remove(&source);
        }

        fn audio_loop(&mut self, source: AudioSourceId) {
            self.looping.push(source);
        }

        fn audio_is_playing(&self, source: AudioSourceId) -> bool {
            self.playing.contains(&source)
        }

        fn audio_set_volume(&mut self, source: AudioSourceId, volume: f32) {
            self.volumes.insert(source, volume);
        }

        fn audio_set_pitch(&mut self, source: AudioSourceId, pitch: f32) {
            self.pitches.insert(source, pitch);
        }

        fn audio_set_position(&mut self, _source: AudioSourceId, _position: Vec3) {}

        fn create_menu(&mut self, items: &[&str]) -> MenuId {
            let id = MenuId(self.fresh());
            self.menu_len.insert(id, items.len());
            self.menu_cursor.insert(id, 0);
            id
        }

        fn menu_show(&mut self, menu: MenuId) {
            self.visible_menus.insert(menu);
        }

        fn menu_hide(&mut self, menu: MenuId) {
            self.visible_menus.remove(&menu);
        }

        fn menu_visible(&self, menu: MenuId) -> bool {
            self.visible_menus.contains(&menu)
        }

        fn menu_next(&mut self, menu: MenuId) {
            let len = self.menu_len[&menu];
            let cursor = self.menu_cursor.entry(menu).or_insert(0);
            *cursor = (*cursor + 1).min(len.saturating_sub(1));
        }

        fn menu_previous(&mut self, menu: MenuId) {
            let cursor = self.menu_cursor.entry(menu).or_insert(0);
            *cursor = cursor.saturating_sub(1);
        }

        fn menu_selected(&self, menu: MenuId) -> usize {
            self.menu_cursor.get(&menu).copied().unwrap_or(0)
        }

        fn key_pressed(&self, key: Key) -> bool {
            self.pressed.contains(&key)
        }

        fn key_down(&self, key: Key) -> bool {
            self.held.contains(&key)
        }

        fn mouse_delta(&self) -> Vec2 {
            self.mouse_delta
        }

        fn mouse_grabbed(&self) -> bool {
            self.grabbed
        }

        fn set_mouse_grabbed(&mut self, grabbed: bool) {
            self.grabbed = grabbed;
        }

        fn seconds(&self) -> f64 {
            self.now
        }

        fn aspect_ratio(&self) -> f32 {
            self.aspect
        }

        fn request_exit(&mut self) {
            self.exit_requested = true;
        }
    }
}
