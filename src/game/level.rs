//! One playable maze level
//!
//! Owns the decoded grid, the entity world, the key/door/visited
//! bookkeeping, and the per-frame interaction state machine. The level
//! never changes scenes itself — `update` returns a [`LevelEvent`] and
//! the surrounding controller acts on it.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use rand::Rng;

use crate::engine::{Alignment, AudioSourceId, Engine, Key, MenuId, MeshHandle, TextureInfo};
use crate::game::collision::{clamp_at_door, resolve_movement};
use crate::game::components::{
    Animation, Attenuation, DoorPanel, KeyItem, Material, MeshInstance, Overlay, PointLight,
    Spin, TextLabel,
};
use crate::game::entity::Entity;
use crate::game::event::Events;
use crate::game::systems::{self, PlayerControl};
use crate::game::transform::Transform;
use crate::game::world::World;
use crate::math::{Quat, Vec2, Vec3};
use crate::save::{SaveState, INITIAL_SLUDGE_LEVEL};
use crate::world::atlas::AtlasLayout;
use crate::world::geometry;
use crate::world::map::{level_dir, ColorId, MapError, MapGrid};

/// Base movement speed, before the sludge penalty.
const INITIAL_SPEED: f32 = 2.3;

/// How long a locked door pulses when the player rattles it.
const DOOR_FLASH_TIME: f64 = 0.4;

/// Sludge rise per second.
const SLUDGE_RISE_RATE: f32 = 0.002;

/// How far the sludge drops when a door opens (floored at zero).
const SLUDGE_DROP_ON_UNLOCK: f32 = 0.1;

/// The player drowns once the sludge is within this margin of the
/// camera height.
const LOSS_MARGIN: f32 = 0.05;

/// Wall-atlas tile that marks its cell's light as the win trigger.
const WIN_LIGHT_TILE: u32 = 5;

/// Door slab scale: half-cell wide, half-cell tall, thin.
const DOOR_SCALE: Vec3 = Vec3 { x: 0.5, y: 0.5, z: 0.05 };

const UI_FONT: &str = "font.png";

/// What the level asks of the surrounding scene controller this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelEvent {
    None,
    NextLevel,
    RestartLevel,
    RestartGame,
}

/// Plain-data pending action for the yes/no confirmation gate; no
/// closures, just which transition to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingAction {
    RestartLevel,
    RestartGame,
    BackToLose,
    BackToPause,
}

struct Confirmation {
    on_yes: PendingAction,
    on_no: PendingAction,
}

pub struct Level {
    index: u32,
    grid: MapGrid,
    world: World,
    events: Events,

    // Keys and doors, keyed by grid cell and by color identity
    keys_on_ground: HashMap<(i32, i32), (Entity, Entity)>,
    collected_keys: HashMap<ColorId, Entity>,
    doors: HashMap<(i32, i32), Entity>,
    door_locations: HashMap<ColorId, (i32, i32)>,
    opened_doors: HashSet<ColorId>,

    win_cell: Option<(i32, i32)>,

    camera: Entity,
    camera_light: Entity,
    sludge: Entity,

    control: PlayerControl,
    speed: f32,

    // Audio sources (engine-side, fire-and-forget)
    music: AudioSourceId,
    left_step: AudioSourceId,
    right_step: AudioSourceId,
    left_splash: AudioSourceId,
    right_splash: AudioSourceId,
    laugh: AudioSourceId,
    key_pickup_snd: AudioSourceId,
    unlock_snd: AudioSourceId,
    door_opened_snd: AudioSourceId,
    door_locked_snd: AudioSourceId,
    door_splash_snd: AudioSourceId,

    old_position: Vec3,
    step_start: f64,
    last_laugh: f64,
    laugh_delay: f64,
    right_step_next: bool,
    play_splash: bool,

    colliding_door: Option<Entity>,
    flashing_door: Option<Entity>,
    flash_color: Vec3,
    flash_start: f64,

    // Minimap
    player_marker: Entity,
    visited_template: Entity,
    visited: HashMap<(i32, i32), Entity>,
    last_spot: Option<Entity>,
    map_pixel: Vec2,

    // Message / HUD state
    message: Entity,
    old_message: Option<String>,
    message_timed: bool,
    message_start: f64,
    message_show_time: f64,
    escape_hint: Entity,

    pause_menu: MenuId,
    lose_menu: MenuId,
    confirm_menu: MenuId,
    pending_confirm: Option<Confirmation>,
    restart_level: bool,
    restart_game: bool,

    was_mouse_grabbed: bool,

    save_path: PathBuf,
}

impl Level {
    /// Load a level's map directory and assemble it.
    pub fn load(
        engine: &mut dyn Engine,
        index: u32,
        base_dir: &Path,
        save: &SaveState,
        save_path: PathBuf,
    ) -> Result<Level, MapError> {
        let grid = MapGrid::load(&level_dir(base_dir, index))?;
        Ok(Self::from_parts(engine, index, grid, save, save_path))
    }

    /// Assemble a level from an already-decoded grid.
    pub fn from_parts(
        engine: &mut dyn Engine,
        index: u32,
        grid: MapGrid,
        save: &SaveState,
        save_path: PathBuf,
    ) -> Level {
        let mut world = World::new();

        let textures = engine.load_texture(&format!("levels/{}/textures.png", index));
        let normal_maps = engine.load_texture(&format!("levels/{}/normal_maps.png", index));
        let door_texture = engine.load_texture("door.png");
        let door_normals = engine.load_texture("door_normals.png");
        let atlas = AtlasLayout::from_texture_width(textures.width);

        let mut opened_doors: HashSet<ColorId> = HashSet::new();
        for color in &save.opened_doors {
            opened_doors.insert(ColorId::from_vec3(*color));
        }
        let saved_keys: HashSet<ColorId> = save
            .collected_keys
            .iter()
            .map(|c| ColorId::from_vec3(*c))
            .collect();

        // Static level geometry
        let level_mesh = engine.create_mesh(&geometry::build_level_mesh(&grid, &atlas));
        let level_entity = world.spawn();
        world.mesh_instances.insert(level_entity, MeshInstance(level_mesh));
        let mut level_material = Material::new();
        level_material.set_texture("Texture", textures.handle);
        level_material.set_texture("NormalMap", normal_maps.handle);
        level_material.set_scalar("Reflectivity", 0.5);
        level_material.set_scalar("Damping", 4.0);
        world.materials.insert(level_entity, level_material);

        // Camera, restored from the save
        let camera = world.spawn_at(save.camera_position);
        if let Some(t) = world.transforms.get_mut(camera) {
            t.rotation = save.camera_rotation;
        }

        let camera_light = world.spawn();
        world.lights.insert(
            camera_light,
            PointLight {
                color: Vec3::new(1.0, 1.0, 0.9),
                intensity: 0.4,
                attenuation: Attenuation::new(0.0, 0.0, 2.0),
                position: save.camera_position,
            },
        );

        let key_mesh = engine.load_mesh("key.obj");
        let door_mesh = engine.create_mesh(&geometry::door_mesh());

        let mut level = Level {
            index,
            world,
            events: Events::new(),
            keys_on_ground: HashMap::new(),
            collected_keys: HashMap::new(),
            doors: HashMap::new(),
            door_locations: HashMap::new(),
            opened_doors,
            win_cell: None,
            camera,
            camera_light,
            sludge: camera, // placeholder until the sludge entity spawns
            control: PlayerControl::new(),
            speed: INITIAL_SPEED,
            music: AudioSourceId(0),
            left_step: AudioSourceId(0),
            right_step: AudioSourceId(0),
            left_splash: AudioSourceId(0),
            right_splash: AudioSourceId(0),
            laugh: AudioSourceId(0),
            key_pickup_snd: AudioSourceId(0),
            unlock_snd: AudioSourceId(0),
            door_opened_snd: AudioSourceId(0),
            door_locked_snd: AudioSourceId(0),
            door_splash_snd: AudioSourceId(0),
            old_position: save.camera_position,
            step_start: 0.0,
            last_laugh: engine.seconds(),
            laugh_delay: rand::thread_rng().gen_range(15.0..20.0),
            right_step_next: false,
            play_splash: false,
            colliding_door: None,
            flashing_door: None,
            flash_color: Vec3::ZERO,
            flash_start: 0.0,
            player_marker: camera, // placeholders, assigned below
            visited_template: camera,
            visited: HashMap::new(),
            last_spot: None,
            map_pixel: Vec2::ZERO,
            message: camera,
            old_message: None,
            message_timed: false,
            message_start: 0.0,
            message_show_time: 0.0,
            escape_hint: camera,
            pause_menu: MenuId(0),
            lose_menu: MenuId(0),
            confirm_menu: MenuId(0),
            pending_confirm: None,
            restart_level: false,
            restart_game: false,
            was_mouse_grabbed: true,
            save_path,
            grid,
        };

        level.assemble_cells(engine, &atlas, key_mesh, door_mesh, door_texture, door_normals, &saved_keys);
        level.spawn_sludge(engine, save.sludge_level);
        level.build_minimap(engine, save);
        level.create_audio(engine);
        level.create_hud(engine);

        level
    }

    /// Walk the grid interior once, placing lights, keys, and doors.
    fn assemble_cells(
        &mut self,
        engine: &mut dyn Engine,
        atlas: &AtlasLayout,
        key_mesh: MeshHandle,
        door_mesh: MeshHandle,
        door_texture: TextureInfo,
        door_normals: TextureInfo,
        saved_keys: &HashSet<ColorId>,
    ) {
        let aspect = engine.aspect_ratio();
        let mut placements = Vec::new();
        for (x, z, cell) in self.grid.iter_interior() {
            if !cell.solid {
                placements.push((x as i32, z as i32, *cell));
            }
        }

        for (x, z, cell) in placements {
            let center = Vec3::new(x as f32 + 0.5, 0.5, z as f32 + 0.5);

            if cell.light_rgb.any_channel_full() {
                let light_color = cell.light_rgb.to_vec3();
                let wall_tile = (cell.wall_value() * atlas.tile_count() as f32) as u32;

                if wall_tile == WIN_LIGHT_TILE {
                    // The exit beacon: longer throw, and its cell ends
                    // the level on entry.
                    let light = self.world.spawn();
                    self.world.lights.insert(
                        light,
                        PointLight {
                            color: light_color,
                            intensity: 0.2,
                            attenuation: Attenuation::new(0.0, 0.0, 1.0),
                            position: center,
                        },
                    );
                    self.win_cell = Some((x, z));
                } else {
                    let light = self.world.spawn();
                    self.world.lights.insert(
                        light,
                        PointLight {
                            color: light_color,
                            intensity: 0.2,
                            attenuation: Attenuation::new(4.0, 6.0, 1.0),
                            position: Vec3::new(center.x, 0.9, center.z),
                        },
                    );
                }
            }

            if cell.key_rgb.any_channel_full() {
                let color = cell.key_rgb;
                // A key whose door is already open never existed as far
                // as this run is concerned.
                if !self.opened_doors.contains(&color) {
                    let key_position = Vec3::new(center.x, 0.2, center.z);
                    let key = self.world.spawn_at(key_position);
                    self.world.mesh_instances.insert(key, MeshInstance(key_mesh));
                    let mut material = Material::new();
                    material.set_color("Color", color.to_vec3());
                    material.set_scalar("Reflectivity", 4.0);
                    material.set_scalar("Damping", 32.0);
                    self.world.materials.insert(key, material);
                    self.world.key_items.insert(key, KeyItem { color });

                    if saved_keys.contains(&color) {
                        self.attach_held_key(aspect, key, color);
                    } else {
                        let glow = self.world.spawn();
                        self.world.lights.insert(
                            glow,
                            PointLight {
                                color: color.to_vec3(),
                                intensity: 0.2,
                                attenuation: Attenuation::new(0.0, 0.0, 2.0),
                                position: key_position,
                            },
                        );
                        self.world.spins.insert(
                            key,
                            Spin {
                                axis: Vec3::UP + Vec3::LEFT,
                                degrees_per_sec: 80.0,
                            },
                        );
                        self.keys_on_ground.insert((x, z), (key, glow));
                    }
                }
            }

            if cell.door_rgb.any_channel_full() {
                let color = cell.door_rgb;
                if !self.opened_doors.contains(&color) {
                    let mut material = Material::new();
                    material.set_texture("Texture", door_texture.handle);
                    material.set_texture("NormalMap", door_normals.handle);
                    material.set_color("Color", color.to_vec3());
                    material.set_scalar("Reflectivity", 1.0);
                    material.set_scalar("Damping", 8.0);

                    // A door flanked by solid cells north and south sits
                    // flush in an east-west wall: turn it 90 degrees and
                    // slide it along Z instead of X.
                    let rotated = self.grid.is_solid(x as usize, z as usize - 1)
                        && self.grid.is_solid(x as usize, z as usize + 1);
                    let rotation = if rotated {
                        Quat::from_axis_angle(Vec3::UP, 90.0)
                    } else {
                        Quat::IDENTITY
                    };
                    let slide = if rotated {
                        Vec3::new(0.0, 0.0, -1.0)
                    } else {
                        Vec3::new(1.0, 0.0, 0.0)
                    };

                    let closed = Transform::new(center, rotation, DOOR_SCALE);
                    let open = Transform::new(center - slide, rotation, DOOR_SCALE);
                    let mut animation = Animation::new(1.0);
                    animation.add_frame(closed);
                    animation.add_frame(open);

                    let door = self.world.spawn_at(center);
                    if let Some(t) = self.world.transforms.get_mut(door) {
                        *t = closed;
                    }
                    self.world.mesh_instances.insert(door, MeshInstance(door_mesh));
                    self.world.materials.insert(door, material);
                    self.world.animations.insert(door, animation);
                    self.world.door_panels.insert(door, DoorPanel { color, rotated });

                    // Last write wins when two doors share a color; the
                    // map data is expected not to do that.
                    self.doors.insert((x, z), door);
                    self.door_locations.insert(color, (x, z));
                }
            }
        }
    }

    fn spawn_sludge(&mut self, engine: &mut dyn Engine, height: f32) {
        let quad = engine.create_mesh(&geometry::unit_quad());
        let (w, h) = (self.grid.width() as f32, self.grid.height() as f32);

        let sludge = self.world.spawn_at(Vec3::new(w / 2.0, height, h / 2.0));
        if let Some(t) = self.world.transforms.get_mut(sludge) {
            t.scale = Vec3::new(w, 1.0, h);
        }
        self.world.mesh_instances.insert(sludge, MeshInstance(quad));
        let mut material = Material::new();
        material.set_color("Color", Vec3::new(0.15, 0.2, 0.1));
        self.world.materials.insert(sludge, material);
        self.sludge = sludge;
    }

    fn build_minimap(&mut self, engine: &mut dyn Engine, save: &SaveState) {
        let backdrop_tex = engine.create_texture(1, 1, &[128, 128, 128, 255]);
        let player_tex = engine.create_texture(1, 1, &[255, 0, 0, 255]);
        let visited_tex = engine.create_texture(1, 1, &[0, 0, 0, 255]);

        let map_scale = Vec2::splat(0.5);
        let map_size = Vec2::new(self.grid.width() as f32, self.grid.height() as f32);
        self.map_pixel = map_scale.div(map_size);

        let backdrop = self.world.spawn();
        self.world.overlays.insert(
            backdrop,
            Overlay {
                texture: backdrop_tex.handle,
                anchor: Alignment::TopRight,
                position: Vec2::ZERO,
                scale: map_scale,
            },
        );

        let player_cell = Vec2::new(
            save.camera_position.x.floor(),
            save.camera_position.z.floor(),
        );

        let player_marker = self.world.spawn();
        self.world.overlays.insert(
            player_marker,
            Overlay {
                texture: player_tex.handle,
                anchor: Alignment::TopRight,
                position: player_cell.mul(self.map_pixel),
                scale: self.map_pixel,
            },
        );
        self.player_marker = player_marker;

        let template = self.world.spawn();
        self.world.overlays.insert(
            template,
            Overlay {
                texture: visited_tex.handle,
                anchor: Alignment::TopRight,
                position: self.map_pixel,
                scale: self.map_pixel,
            },
        );
        self.world.hide(template);
        self.visited_template = template;

        for location in &save.visited_cells {
            let marker = self.world.copy(template);
            self.world.show(marker);
            if let Some(overlay) = self.world.overlays.get_mut(marker) {
                overlay.position = location.mul(self.map_pixel);
            }
            if *location == player_cell {
                self.world.hide(marker);
            }
            self.visited
                .insert((location.x as i32, location.y as i32), marker);
        }
    }

    fn create_audio(&mut self, engine: &mut dyn Engine) {
        let music_snd = engine.load_sound("music.wav", false);
        self.music = engine.create_audio_source(music_snd);
        engine.audio_set_volume(self.music, 0.5);
        engine.audio_loop(self.music);
        engine.audio_play(self.music);

        let footstep = engine.load_sound("footstep.wav", true);
        let splash = engine.load_sound("splash.wav", true);
        self.left_step = engine.create_audio_source(footstep);
        self.right_step = engine.create_audio_source(footstep);
        self.left_splash = engine.create_audio_source(splash);
        self.right_splash = engine.create_audio_source(splash);

        let laugh_snd = engine.load_sound("monster_laugh.wav", true);
        self.laugh = engine.create_audio_source(laugh_snd);

        let key_snd = engine.load_sound("key_pickup.wav", false);
        self.key_pickup_snd = engine.create_audio_source(key_snd);
        let unlock = engine.load_sound("door_unlocked.wav", false);
        self.unlock_snd = engine.create_audio_source(unlock);
        let opened = engine.load_sound("door_opened.wav", false);
        self.door_opened_snd = engine.create_audio_source(opened);
        let locked = engine.load_sound("door_locked.wav", false);
        self.door_locked_snd = engine.create_audio_source(locked);
        let door_splash = engine.load_sound("door_splash.wav", false);
        self.door_splash_snd = engine.create_audio_source(door_splash);
    }

    fn create_hud(&mut self, engine: &mut dyn Engine) {
        let font = engine.load_font(UI_FONT);

        let message = self.world.spawn();
        self.world.labels.insert(
            message,
            TextLabel {
                text: String::new(),
                font,
                alignment: Alignment::MiddleCenter,
                position: Vec2::ZERO,
                scale: Vec2::splat(1.5),
            },
        );
        self.world.hide(message);
        self.message = message;

        let escape_hint = self.world.spawn();
        self.world.labels.insert(
            escape_hint,
            TextLabel {
                text: "Press Esc to unlock mouse.".to_string(),
                font,
                alignment: Alignment::BottomRight,
                position: Vec2::ZERO,
                scale: Vec2::splat(0.5),
            },
        );
        self.world.hide(escape_hint);
        self.escape_hint = escape_hint;

        self.pause_menu =
            engine.create_menu(&["Continue", "Restart Level", "Restart Game", "Exit"]);
        self.lose_menu = engine.create_menu(&["Restart Level", "Restart Game", "Exit"]);
        self.confirm_menu = engine.create_menu(&["Yes", "No"]);
    }

    // ------------------------------------------------------------------
    // Small accessors
    // ------------------------------------------------------------------

    fn camera_position(&self) -> Vec3 {
        self.world
            .transforms
            .get(self.camera)
            .map(|t| t.position)
            .unwrap_or(Vec3::ZERO)
    }

    fn set_camera_position(&mut self, position: Vec3) {
        if let Some(t) = self.world.transforms.get_mut(self.camera) {
            t.position = position;
        }
    }

    fn sludge_level(&self) -> f32 {
        self.world
            .transforms
            .get(self.sludge)
            .map(|t| t.position.y)
            .unwrap_or(INITIAL_SLUDGE_LEVEL)
    }

    fn change_sludge_level(&mut self, amount: f32) {
        if let Some(t) = self.world.transforms.get_mut(self.sludge) {
            t.translate(Vec3::new(0.0, amount, 0.0));
        }
    }

    /// Whether the loss state is showing.
    pub fn is_lost(&self, engine: &dyn Engine) -> bool {
        engine.menu_visible(self.lose_menu)
    }

    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    fn show_message(&mut self, text: &str) {
        self.show_message_aligned(text, Alignment::MiddleCenter);
    }

    fn show_message_aligned(&mut self, text: &str, alignment: Alignment) {
        if self.world.is_visible(self.message) {
            if let Some(label) = self.world.labels.get(self.message) {
                self.old_message = Some(label.text.clone());
            }
        } else {
            self.world.show(self.message);
        }

        if let Some(label) = self.world.labels.get_mut(self.message) {
            label.text = text.to_string();
            label.alignment = alignment;
        }
    }

    fn show_timed_message(&mut self, text: &str, seconds: f64, now: f64) {
        self.show_message_aligned(text, Alignment::MiddleCenter);
        self.message_timed = true;
        self.message_start = now;
        self.message_show_time = seconds;
    }

    fn hide_message(&mut self, now: f64) {
        if self.message_timed && now - self.message_start < self.message_show_time {
            return;
        }

        match self.old_message.take() {
            Some(previous) => {
                if let Some(label) = self.world.labels.get_mut(self.message) {
                    label.text = previous;
                }
            }
            None => self.world.hide(self.message),
        }
    }

    // ------------------------------------------------------------------
    // Pause / lose / confirmation
    // ------------------------------------------------------------------

    fn show_confirmation(
        &mut self,
        engine: &mut dyn Engine,
        text: &str,
        on_yes: PendingAction,
        on_no: PendingAction,
    ) {
        self.show_message_aligned(text, Alignment::TopCenter);
        engine.menu_show(self.confirm_menu);
        self.pending_confirm = Some(Confirmation { on_yes, on_no });
    }

    fn apply_pending(&mut self, engine: &mut dyn Engine, action: PendingAction) {
        match action {
            PendingAction::RestartLevel => self.restart_level = true,
            PendingAction::RestartGame => self.restart_game = true,
            PendingAction::BackToLose => self.lose(engine),
            PendingAction::BackToPause => self.pause(engine),
        }
    }

    fn lose(&mut self, engine: &mut dyn Engine) {
        self.show_message_aligned("You Lost!", Alignment::TopCenter);
        engine.audio_stop(self.music);
        engine.menu_show(self.lose_menu);
        self.control.enabled = false;
        engine.set_mouse_grabbed(false);
    }

    fn pause(&mut self, engine: &mut dyn Engine) {
        self.show_message_aligned("Paused.", Alignment::TopCenter);
        engine.menu_show(self.pause_menu);
        self.control.enabled = false;
        engine.set_mouse_grabbed(false);
    }

    fn resume(&mut self, engine: &mut dyn Engine, now: f64) {
        self.hide_message(now);
        engine.menu_hide(self.pause_menu);
        self.control.enabled = true;
    }

    // ------------------------------------------------------------------
    // Saving
    // ------------------------------------------------------------------

    /// Current progress as a save record.
    pub fn snapshot(&self) -> SaveState {
        SaveState {
            level_index: self.index,
            camera_position: self.camera_position(),
            camera_rotation: self
                .world
                .transforms
                .get(self.camera)
                .map(|t| t.rotation)
                .unwrap_or(Quat::IDENTITY),
            collected_keys: self.collected_keys.keys().map(|c| c.to_vec3()).collect(),
            opened_doors: self.opened_doors.iter().map(|c| c.to_vec3()).collect(),
            visited_cells: self
                .visited
                .keys()
                .map(|(x, z)| Vec2::new(*x as f32, *z as f32))
                .collect(),
            sludge_level: self.sludge_level(),
        }
    }

    /// Checkpoint save. A failed write is logged, not fatal — losing a
    /// checkpoint must not kill a running game.
    pub fn save(&self) {
        if let Err(e) = self.snapshot().save(&self.save_path) {
            log::warn!("checkpoint save failed: {}", e);
        }
    }

    // ------------------------------------------------------------------
    // Keys
    // ------------------------------------------------------------------

    /// Move a key into the HUD: parent it to the camera at the next
    /// stacking slot, stop its orbit, and dim its material.
    fn attach_held_key(&mut self, aspect: f32, key: Entity, color: ColorId) {
        let offset = 0.02 * self.collected_keys.len() as f32;
        let x_offset = aspect * 0.1 + 0.03;

        self.collected_keys.insert(color, key);
        self.world.set_parent(key, self.camera);
        self.world.spins.remove(key);

        if let Some(t) = self.world.transforms.get_mut(key) {
            t.position = Vec3::new(offset - x_offset, 0.125, 0.2);
            t.rotation = Quat::from_axis_angle(Vec3::new(-0.5, 0.0, 1.0), 45.0);
            t.scale = Vec3::splat(0.05);
        }
        if let Some(material) = self.world.materials.get_mut(key) {
            if let Some(color) = material.color("Color") {
                material.set_color("Color", color.scale(0.25));
            }
        }
    }

    /// Re-pack held keys contiguously after one is consumed.
    fn repack_held_keys(&mut self, aspect: f32) {
        let x_offset = aspect * 0.1 + 0.03;
        let held: Vec<Entity> = self.collected_keys.values().copied().collect();
        for (i, key) in held.into_iter().enumerate() {
            if let Some(t) = self.world.transforms.get_mut(key) {
                t.position = Vec3::new(0.02 * i as f32 - x_offset, 0.125, 0.2);
            }
        }
    }

    // ------------------------------------------------------------------
    // Per-frame update
    // ------------------------------------------------------------------

    pub fn update(&mut self, engine: &mut dyn Engine, delta: f32) -> LevelEvent {
        if self.restart_game {
            return LevelEvent::RestartGame;
        }
        if self.restart_level {
            return LevelEvent::RestartLevel;
        }

        let now = engine.seconds();

        if engine.menu_visible(self.confirm_menu) {
            if engine.key_pressed(Key::Up) {
                engine.menu_previous(self.confirm_menu);
            } else if engine.key_pressed(Key::Down) {
                engine.menu_next(self.confirm_menu);
            } else if engine.key_pressed(Key::Return) {
                let choice = engine.menu_selected(self.confirm_menu);
                if let Some(confirm) = self.pending_confirm.take() {
                    let action = if choice == 0 { confirm.on_yes } else { confirm.on_no };
                    self.apply_pending(engine, action);
                }
                self.hide_message(now);
                engine.menu_hide(self.confirm_menu);
            }
            return LevelEvent::None;
        }

        if engine.menu_visible(self.lose_menu) {
            if engine.key_pressed(Key::Up) {
                engine.menu_previous(self.lose_menu);
            } else if engine.key_pressed(Key::Down) {
                engine.menu_next(self.lose_menu);
            } else if engine.key_pressed(Key::Return) {
                match engine.menu_selected(self.lose_menu) {
                    0 => {
                        engine.menu_hide(self.lose_menu);
                        self.show_confirmation(
                            engine,
                            "Are you sure you want to\nrestart this level?",
                            PendingAction::RestartLevel,
                            PendingAction::BackToLose,
                        );
                    }
                    1 => {
                        engine.menu_hide(self.lose_menu);
                        self.show_confirmation(
                            engine,
                            "Are you sure you want to\nrestart the entire game?",
                            PendingAction::RestartGame,
                            PendingAction::BackToLose,
                        );
                    }
                    _ => engine.request_exit(),
                }
            }
            return LevelEvent::None;
        }

        if engine.key_pressed(Key::M) {
            if engine.audio_is_playing(self.music) {
                engine.audio_pause(self.music);
                self.show_timed_message("Music Off", 1.0, now);
            } else {
                engine.audio_play(self.music);
                self.show_timed_message("Music On", 1.0, now);
            }
        }

        if engine.key_pressed(Key::P) {
            if engine.menu_visible(self.pause_menu) {
                self.resume(engine, now);
            } else {
                self.pause(engine);
            }
            return LevelEvent::None;
        }

        if engine.menu_visible(self.pause_menu) {
            if engine.key_pressed(Key::Up) {
                engine.menu_previous(self.pause_menu);
            } else if engine.key_pressed(Key::Down) {
                engine.menu_next(self.pause_menu);
            } else if engine.key_pressed(Key::Return) {
                match engine.menu_selected(self.pause_menu) {
                    0 => self.resume(engine, now),
                    1 => {
                        engine.menu_hide(self.pause_menu);
                        self.show_confirmation(
                            engine,
                            "Are you sure you want to\nrestart this level?",
                            PendingAction::RestartLevel,
                            PendingAction::BackToPause,
                        );
                    }
                    2 => {
                        engine.menu_hide(self.pause_menu);
                        self.show_confirmation(
                            engine,
                            "Are you sure you want to\nrestart the entire game?",
                            PendingAction::RestartGame,
                            PendingAction::BackToPause,
                        );
                    }
                    _ => {
                        self.save();
                        engine.request_exit();
                    }
                }
            }
            return LevelEvent::None;
        }

        if self.was_mouse_grabbed != engine.mouse_grabbed() {
            if engine.mouse_grabbed() {
                self.hide_message(now);
                self.world.show(self.escape_hint);
            } else {
                self.show_message("Click to control with mouse.");
                self.world.hide(self.escape_hint);
            }
            self.was_mouse_grabbed = engine.mouse_grabbed();
        }

        if self.message_timed && now - self.message_start >= self.message_show_time {
            self.hide_message(now);
            self.message_timed = false;
        }

        // Player control writes the camera; everything after resolves
        // the consequences.
        if let Some(camera) = self.world.transforms.get_mut(self.camera) {
            self.control.update_look(engine, camera);
            self.control
                .update_movement(engine, camera, self.speed, delta);
        }

        self.change_sludge_level(SLUDGE_RISE_RATE * delta);
        let sludge_level = self.sludge_level();
        let new_position = self.camera_position();

        if sludge_level > 0.0 {
            let max_sludge = new_position.y - LOSS_MARGIN;
            let sludge_dist = 1.0 - sludge_level / max_sludge;

            self.speed = INITIAL_SPEED * (sludge_dist * 0.8 + 0.2);

            let splash_volume = (1.0 - sludge_dist) * 0.8 + 0.2;
            let pitch = self.speed / INITIAL_SPEED;
            engine.audio_set_volume(self.left_splash, splash_volume);
            engine.audio_set_pitch(self.left_splash, pitch);
            engine.audio_set_volume(self.right_splash, splash_volume);
            engine.audio_set_pitch(self.right_splash, pitch);

            let step_volume = sludge_dist * 0.8 + 0.2;
            engine.audio_set_volume(self.left_step, step_volume);
            engine.audio_set_volume(self.right_step, step_volume);

            self.play_splash = true;
            if sludge_level >= max_sludge {
                self.lose(engine);
                return LevelEvent::None;
            }
        }

        if new_position != self.old_position {
            if self.resolve_player_movement(engine, new_position, now) {
                return LevelEvent::NextLevel;
            }
            self.update_footsteps(engine, now);
        }

        if now > self.last_laugh + self.laugh_delay {
            let mut rng = rand::thread_rng();
            let jitter = Vec3::new(rng.gen_range(-2.0..2.0), 0.0, rng.gen_range(-2.0..2.0));
            engine.audio_set_position(self.laugh, self.camera_position() + jitter);
            engine.audio_play(self.laugh);
            self.last_laugh = now;
            self.laugh_delay = rng.gen_range(15.0..20.0);
        }

        if engine.key_pressed(Key::O) && self.colliding_door.is_some() && self.flashing_door.is_none()
        {
            self.try_open_door(engine, now);
        }

        self.update_door_flash(now);

        systems::update_spins(&mut self.world, delta);
        systems::update_animations(&mut self.world, &mut self.events, now);
        let finished: Vec<_> = self.events.animation_finished.drain().collect();
        for event in finished {
            // The only animated entities are doors sliding open: play
            // the thud where the door ended up, then free it.
            let position = self.world.world_position(event.entity);
            engine.audio_set_position(self.door_opened_snd, position);
            engine.audio_play(self.door_opened_snd);
            self.world.despawn(event.entity);
        }

        let camera_position = self.camera_position();
        if let Some(light) = self.world.lights.get_mut(self.camera_light) {
            light.position = camera_position;
        }

        self.old_position = camera_position;
        LevelEvent::None
    }

    /// Movement aftermath: win check, minimap, walls, key pickup, door
    /// proximity. Returns true when the win cell was entered.
    fn resolve_player_movement(
        &mut self,
        engine: &mut dyn Engine,
        new_position: Vec3,
        now: f64,
    ) -> bool {
        let resolution =
            resolve_movement(&self.grid, self.old_position, new_position, self.win_cell);
        if resolution.reached_win {
            return true;
        }

        let mut position = resolution.position;

        // Minimap: the marker follows, and the current cell's visited
        // dot hides to act as "you are here".
        let cell = resolution.current_cell;
        let cell_pixel = Vec2::new(cell.0 as f32, cell.1 as f32).mul(self.map_pixel);
        if let Some(overlay) = self.world.overlays.get_mut(self.player_marker) {
            overlay.position = cell_pixel;
        }

        match self.visited.get(&cell).copied() {
            None => {
                let marker = self.world.copy(self.visited_template);
                self.world.show(marker);
                if let Some(overlay) = self.world.overlays.get_mut(marker) {
                    overlay.position = cell_pixel;
                }
                self.visited.insert(cell, marker);
            }
            Some(marker) => {
                if let Some(previous) = self.last_spot {
                    self.world.show(previous);
                }
                self.world.hide(marker);
                self.last_spot = Some(marker);
            }
        }

        // Key pickup happens on the cell the player stood in
        let old_cell = resolution.old_cell;
        if let Some((key, glow)) = self.keys_on_ground.remove(&old_cell) {
            self.world.despawn(glow);
            if let Some(item) = self.world.key_items.get(key).copied() {
                self.attach_held_key(engine.aspect_ratio(), key, item.color);
            }
            self.save();
            engine.audio_play(self.key_pickup_snd);
        }

        match self.doors.get(&old_cell).copied() {
            Some(door) => {
                if let Some(panel) = self.world.door_panels.get(door).copied() {
                    position = clamp_at_door(
                        self.old_position,
                        position,
                        old_cell,
                        panel.rotated,
                        DOOR_SCALE.z * 0.5,
                    );
                }
                self.show_message("Press O to try\nopening the door.");
                self.colliding_door = Some(door);
            }
            None => {
                self.hide_message(now);
                self.colliding_door = None;
            }
        }

        self.set_camera_position(position);
        false
    }

    fn update_footsteps(&mut self, engine: &mut dyn Engine, now: f64) {
        if now <= self.step_start + 0.6 / self.speed as f64 {
            return;
        }
        self.step_start = now;

        let position = self.camera_position();
        let left = position + Vec3::LEFT;
        let right = position + Vec3::new(1.0, 0.0, 0.0);
        engine.audio_set_position(self.left_step, left);
        engine.audio_set_position(self.right_step, right);
        engine.audio_set_position(self.left_splash, left);
        engine.audio_set_position(self.right_splash, right);

        if self.right_step_next {
            engine.audio_play(self.right_step);
            if self.play_splash {
                engine.audio_play(self.right_splash);
            }
        } else {
            engine.audio_play(self.left_step);
            if self.play_splash {
                engine.audio_play(self.left_splash);
            }
        }
        self.right_step_next = !self.right_step_next;
    }

    /// O pressed while standing at a door: unlock if a matching key is
    /// held, otherwise start the locked flash.
    fn try_open_door(&mut self, engine: &mut dyn Engine, now: f64) {
        let Some(door) = self.colliding_door else {
            return;
        };
        let Some(panel) = self.world.door_panels.get(door).copied() else {
            return;
        };

        match self.collected_keys.get(&panel.color).copied() {
            None => {
                self.flash_start = now;
                self.flashing_door = Some(door);
                self.flash_color = panel.color.to_vec3();

                self.show_timed_message("Door Locked!\nFind the key!", DOOR_FLASH_TIME, now);

                let door_position = self.world.world_position(door);
                engine.audio_set_position(self.door_locked_snd, door_position);
                engine.audio_play(self.door_locked_snd);
            }
            Some(key) => {
                self.colliding_door = None;

                engine.audio_play(self.unlock_snd);
                if let Some(animation) = self.world.animations.get_mut(door) {
                    animation.play(now);
                }

                if let Some(location) = self.door_locations.remove(&panel.color) {
                    self.doors.remove(&location);
                }
                self.opened_doors.insert(panel.color);

                self.collected_keys.remove(&panel.color);
                self.world.despawn(key);
                self.repack_held_keys(engine.aspect_ratio());

                self.change_sludge_level(-SLUDGE_DROP_ON_UNLOCK);
                if self.sludge_level() < 0.0 {
                    if let Some(t) = self.world.transforms.get_mut(self.sludge) {
                        t.position.y = 0.0;
                    }
                }

                self.save();
                engine.audio_play(self.door_splash_snd);
            }
        }
    }

    /// Pulse a flashing door between its color and the inverse on a
    /// 0.2 s sawtooth until the flash window closes.
    fn update_door_flash(&mut self, now: f64) {
        let Some(door) = self.flashing_door else {
            return;
        };

        let elapsed = now - self.flash_start;
        let cycle = (elapsed % 0.2) as f32;
        let inverse = Vec3::ONE - self.flash_color;

        let displayed = if cycle < 0.1 {
            self.flash_color.lerp(inverse, cycle * 10.0)
        } else {
            self.flash_color.lerp(inverse, 1.0 - (cycle - 0.1) * 10.0)
        };

        if let Some(material) = self.world.materials.get_mut(door) {
            material.set_color("Color", displayed);
        }

        if elapsed >= DOOR_FLASH_TIME {
            if let Some(material) = self.world.materials.get_mut(door) {
                material.set_color("Color", self.flash_color);
            }
            self.flashing_door = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::stub::StubEngine;

    const OPEN: [u8; 3] = [64, 128, 192];
    const SOLID: [u8; 3] = [0, 0, 0];
    const RED: [u8; 3] = [255, 0, 0];
    const BLUE: [u8; 3] = [0, 0, 255];

    struct MapBuilder {
        width: usize,
        height: usize,
        index: Vec<[u8; 3]>,
        light: Vec<[u8; 3]>,
        key: Vec<[u8; 3]>,
        door: Vec<[u8; 3]>,
    }

    impl MapBuilder {
        fn from_rows(rows: &[&str]) -> Self {
            let height = rows.len();
            let width = rows[0].len();
            let mut index = Vec::with_capacity(width * height);
            for row in rows {
                for ch in row.chars() {
                    index.push(if ch == '#' { SOLID } else { OPEN });
                }
            }
            Self {
                width,
                height,
                index,
                light: vec![[0; 3]; width * height],
                key: vec![[0; 3]; width * height],
                door: vec![[0; 3]; width * height],
            }
        }

        /// Straight east-west corridor, three cells wide.
        fn corridor() -> Self {
            Self::from_rows(&["#####", "#...#", "#####"])
        }

        fn key_at(&mut self, x: usize, z: usize, rgb: [u8; 3]) -> &mut Self {
            self.key[z * self.width + x] = rgb;
            self
        }

        fn door_at(&mut self, x: usize, z: usize, rgb: [u8; 3]) -> &mut Self {
            self.door[z * self.width + x] = rgb;
            self
        }

        fn light_at(&mut self, x: usize, z: usize, rgb: [u8; 3]) -> &mut Self {
            self.light[z * self.width + x] = rgb;
            self
        }

        fn index_at(&mut self, x: usize, z: usize, rgb: [u8; 3]) -> &mut Self {
            self.index[z * self.width + x] = rgb;
            self
        }

        fn build(&self) -> MapGrid {
            MapGrid::from_layers(
                self.width,
                self.height,
                &self.index,
                &self.light,
                &self.key,
                &self.door,
            )
        }
    }

    struct Fixture {
        engine: StubEngine,
        level: Level,
        save_path: PathBuf,
        _dir: tempfile::TempDir,
    }

    fn fixture_with(grid: MapGrid, save: SaveState) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let save_path = dir.path().join("progress.ron");
        let mut engine = StubEngine::new();
        let level = Level::from_parts(&mut engine, save.level_index, grid, &save, save_path.clone());
        Fixture {
            engine,
            level,
            save_path,
            _dir: dir,
        }
    }

    fn step(f: &mut Fixture, dt: f32) -> LevelEvent {
        f.engine.now += dt as f64;
        let event = f.level.update(&mut f.engine, dt);
        f.engine.end_frame();
        event
    }

    /// Walk the player from spawn into the door cell at (2, 1) so the
    /// "try opening" prompt is live.
    fn walk_to_door(f: &mut Fixture) {
        f.engine.held.insert(Key::D);
        step(f, 0.2);
        step(f, 0.2);
        step(f, 0.05);
        f.engine.held.remove(&Key::D);
        assert!(f.level.colliding_door.is_some(), "player never reached the door");
    }

    #[test]
    fn test_key_pickup_collects_and_checkpoints() {
        let grid = MapBuilder::corridor().key_at(1, 1, RED).build();
        let mut f = fixture_with(grid, SaveState::initial(0));

        assert_eq!(f.level.keys_on_ground.len(), 1);
        assert!(f.level.collected_keys.is_empty());

        // Any movement while standing on the key cell picks it up
        f.engine.held.insert(Key::W);
        step(&mut f, 0.1);

        let red = ColorId(RED);
        assert!(f.level.collected_keys.contains_key(&red));
        assert!(f.level.keys_on_ground.is_empty());
        assert!(f.engine.played_names().contains(&"key_pickup.wav"));

        // Held key rides the camera with a darkened material
        let key = f.level.collected_keys[&red];
        assert!(f.level.world.parents.contains(key));
        let color = f.level.world.materials.get(key).unwrap().color("Color").unwrap();
        assert_eq!(color, Vec3::new(0.25, 0.0, 0.0));

        // Checkpoint save captured the pickup
        let saved = SaveState::load_or_create(&f.save_path).unwrap();
        assert_eq!(saved.collected_keys, vec![Vec3::new(1.0, 0.0, 0.0)]);
    }

    #[test]
    fn test_visited_markers_track_movement() {
        let grid = MapBuilder::corridor().build();
        let mut f = fixture_with(grid, SaveState::initial(0));

        f.engine.held.insert(Key::D);
        step(&mut f, 0.1);
        assert!(f.level.visited.contains_key(&(1, 1)));

        // Keep walking east into cell (2, 1)
        step(&mut f, 0.4);
        assert!(f.level.visited.contains_key(&(2, 1)));
        assert_eq!(f.level.visited.len(), 2);
    }

    #[test]
    fn test_locked_door_flashes_and_recovers() {
        let grid = MapBuilder::corridor().door_at(2, 1, BLUE).build();
        let mut f = fixture_with(grid, SaveState::initial(0));
        walk_to_door(&mut f);

        f.engine.press(Key::O);
        step(&mut f, 0.01);

        assert!(f.level.flashing_door.is_some());
        assert!(f.engine.played_names().contains(&"door_locked.wav"));
        let label = f.level.world.labels.get(f.level.message).unwrap();
        assert!(label.text.starts_with("Door Locked!"));

        // Mid-flash the displayed color deviates from the true color
        let door = f.level.flashing_door.unwrap();
        step(&mut f, 0.05);
        let mid = f.level.world.materials.get(door).unwrap().color("Color").unwrap();
        assert_ne!(mid, ColorId(BLUE).to_vec3());

        // Walk the clock past the flash window: color restored exactly
        f.engine.now = f.level.flash_start + DOOR_FLASH_TIME + 1e-6;
        f.level.update(&mut f.engine, 0.01);
        let restored = f.level.world.materials.get(door).unwrap().color("Color").unwrap();
        assert_eq!(restored, ColorId(BLUE).to_vec3());
        assert!(f.level.flashing_door.is_none());

        // The door is still closed and locked
        assert!(f.level.doors.contains_key(&(2, 1)));
        assert!(!f.level.opened_doors.contains(&ColorId(BLUE)));
    }

    #[test]
    fn test_unlock_consumes_key_and_opens_door() {
        let grid = MapBuilder::corridor()
            .key_at(1, 1, RED)
            .door_at(2, 1, RED)
            .build();
        let mut save = SaveState::initial(0);
        save.collected_keys = vec![Vec3::new(1.0, 0.0, 0.0)];
        let mut f = fixture_with(grid, save);

        // The saved key spawned directly in the HUD
        let red = ColorId(RED);
        assert!(f.level.collected_keys.contains_key(&red));
        assert!(f.level.keys_on_ground.is_empty());

        walk_to_door(&mut f);
        let door = f.level.colliding_door.unwrap();
        let key = f.level.collected_keys[&red];

        f.engine.press(Key::O);
        step(&mut f, 0.01);

        assert!(f.level.opened_doors.contains(&red));
        assert!(f.level.doors.is_empty());
        assert!(f.level.door_locations.is_empty());
        assert!(f.level.collected_keys.is_empty());
        assert!(!f.level.world.is_alive(key));
        assert!(f.engine.played_names().contains(&"door_unlocked.wav"));
        assert!(f.engine.played_names().contains(&"door_splash.wav"));

        // Opening a door knocks the sludge down, floored at zero
        assert_eq!(f.level.sludge_level(), 0.0);

        // Checkpoint captured the opened door
        let saved = SaveState::load_or_create(&f.save_path).unwrap();
        assert_eq!(saved.opened_doors, vec![Vec3::new(1.0, 0.0, 0.0)]);

        // The slide animation finishes a second later; the door entity
        // is freed and the thud plays
        assert!(f.level.world.is_alive(door));
        step(&mut f, 1.1);
        assert!(!f.level.world.is_alive(door));
        assert!(f.engine.played_names().contains(&"door_opened.wav"));
    }

    #[test]
    fn test_reopened_door_and_spent_key_never_respawn() {
        let grid = MapBuilder::corridor()
            .key_at(1, 1, RED)
            .door_at(2, 1, RED)
            .build();
        let mut save = SaveState::initial(0);
        save.opened_doors = vec![Vec3::new(1.0, 0.0, 0.0)];
        let f = fixture_with(grid, save);

        assert!(f.level.doors.is_empty());
        assert!(f.level.keys_on_ground.is_empty());
        assert!(f.level.collected_keys.is_empty());
    }

    #[test]
    fn test_win_cell_emits_next_level() {
        let mut builder = MapBuilder::corridor();
        // Wall tile 5 on a 3x3 atlas marks the win beacon
        builder
            .index_at(3, 1, [150, 128, 192])
            .light_at(3, 1, [255, 255, 255]);
        let grid = builder.build();

        let mut save = SaveState::initial(0);
        save.camera_position = Vec3::new(2.5, 0.3, 1.5);
        let dir = tempfile::tempdir().unwrap();
        let save_path = dir.path().join("progress.ron");
        let mut engine = StubEngine::new();
        engine.texture_width = 672; // 3x3 atlas
        let level = Level::from_parts(&mut engine, 0, grid, &save, save_path.clone());
        let mut f = Fixture {
            engine,
            level,
            save_path,
            _dir: dir,
        };

        assert_eq!(f.level.win_cell, Some((3, 1)));

        f.engine.held.insert(Key::D);
        let mut outcome = LevelEvent::None;
        for _ in 0..5 {
            outcome = step(&mut f, 0.2);
            if outcome != LevelEvent::None {
                break;
            }
        }
        assert_eq!(outcome, LevelEvent::NextLevel);
    }

    #[test]
    fn test_sludge_rises_with_time() {
        let grid = MapBuilder::corridor().build();
        let mut f = fixture_with(grid, SaveState::initial(0));

        assert!((f.level.sludge_level() - INITIAL_SLUDGE_LEVEL).abs() < 1e-6);
        step(&mut f, 1.0);
        assert!((f.level.sludge_level() - (INITIAL_SLUDGE_LEVEL + 0.002)).abs() < 1e-6);
        step(&mut f, 3.0);
        assert!((f.level.sludge_level() - (INITIAL_SLUDGE_LEVEL + 0.008)).abs() < 1e-6);
    }

    #[test]
    fn test_sludge_scales_speed_and_audio() {
        let grid = MapBuilder::corridor().build();
        let mut save = SaveState::initial(0);
        save.sludge_level = 0.1;
        let mut f = fixture_with(grid, save);

        step(&mut f, 0.0);

        // sludge 0.1 against feet at 0.3 with a 0.05 margin
        let sludge = f.level.sludge_level();
        let dist = 1.0 - sludge / (0.3 - LOSS_MARGIN);
        let expected = INITIAL_SPEED * (dist * 0.8 + 0.2);
        assert!((f.level.speed - expected).abs() < 1e-5);
        assert!(f.level.speed > INITIAL_SPEED * 0.2);
        assert!(f.level.speed < INITIAL_SPEED);

        let step_volume = f.engine.volumes[&f.level.left_step];
        let splash_volume = f.engine.volumes[&f.level.left_splash];
        assert!((step_volume - (dist * 0.8 + 0.2)).abs() < 1e-5);
        assert!((splash_volume - ((1.0 - dist) * 0.8 + 0.2)).abs() < 1e-5);
    }

    #[test]
    fn test_sludge_reaching_feet_loses() {
        let grid = MapBuilder::corridor().build();
        let mut save = SaveState::initial(0);
        save.sludge_level = 0.26;
        let mut f = fixture_with(grid, save);

        let event = step(&mut f, 0.1);
        assert_eq!(event, LevelEvent::None);
        assert!(f.level.is_lost(&f.engine));
        assert!(!f.level.control.enabled);
        assert!(!f.engine.playing.contains(&f.level.music));
        assert!(!f.engine.grabbed);
        let label = f.level.world.labels.get(f.level.message).unwrap();
        assert_eq!(label.text, "You Lost!");
    }

    #[test]
    fn test_music_toggle_with_timed_message() {
        let grid = MapBuilder::corridor().build();
        let mut f = fixture_with(grid, SaveState::initial(0));
        assert!(f.engine.playing.contains(&f.level.music));

        f.engine.press(Key::M);
        step(&mut f, 0.1);
        assert!(!f.engine.playing.contains(&f.level.music));
        let label = f.level.world.labels.get(f.level.message).unwrap();
        assert_eq!(label.text, "Music Off");

        // The timed message expires on its own
        step(&mut f, 1.5);
        assert!(!f.level.world.is_visible(f.level.message));

        f.engine.press(Key::M);
        step(&mut f, 0.1);
        assert!(f.engine.playing.contains(&f.level.music));
    }

    #[test]
    fn test_restart_flows_through_confirmation() {
        let grid = MapBuilder::corridor().build();
        let mut f = fixture_with(grid, SaveState::initial(0));

        f.engine.press(Key::P);
        step(&mut f, 0.01);
        assert!(f.engine.menu_visible(f.level.pause_menu));
        assert!(!f.level.control.enabled);

        // Select "Restart Level" and confirm
        f.engine.press(Key::Down);
        step(&mut f, 0.01);
        f.engine.press(Key::Return);
        step(&mut f, 0.01);
        assert!(f.engine.menu_visible(f.level.confirm_menu));

        f.engine.press(Key::Return); // "Yes"
        step(&mut f, 0.01);
        assert_eq!(step(&mut f, 0.01), LevelEvent::RestartLevel);
    }

    #[test]
    fn test_confirmation_no_returns_to_pause() {
        let grid = MapBuilder::corridor().build();
        let mut f = fixture_with(grid, SaveState::initial(0));

        f.engine.press(Key::P);
        step(&mut f, 0.01);
        f.engine.press(Key::Down);
        step(&mut f, 0.01);
        f.engine.press(Key::Return);
        step(&mut f, 0.01);
        assert!(f.engine.menu_visible(f.level.confirm_menu));

        // Move to "No" and confirm: back to the pause menu, no restart
        f.engine.press(Key::Down);
        step(&mut f, 0.01);
        f.engine.press(Key::Return);
        step(&mut f, 0.01);
        assert!(f.engine.menu_visible(f.level.pause_menu));
        assert_eq!(step(&mut f, 0.01), LevelEvent::None);
    }

    #[test]
    fn test_snapshot_round_trips_progress() {
        let grid = MapBuilder::corridor().key_at(1, 1, RED).build();
        let mut f = fixture_with(grid, SaveState::initial(0));

        f.engine.held.insert(Key::W);
        step(&mut f, 0.1);

        let snapshot = f.level.snapshot();
        assert_eq!(snapshot.level_index, 0);
        assert_eq!(snapshot.collected_keys, vec![Vec3::new(1.0, 0.0, 0.0)]);
        assert!(!snapshot.visited_cells.is_empty());

        snapshot.save(&f.save_path).unwrap();
        let reloaded = SaveState::load_or_create(&f.save_path).unwrap();
        assert_eq!(reloaded, snapshot);
    }
}
