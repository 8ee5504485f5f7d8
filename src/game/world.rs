//! Level world
//!
//! Container for every entity a level spawns and the storages for the
//! closed component set. The level instance is the sole owner; when it
//! is torn down the world goes with it. Component types are fixed at
//! compile time — this runtime knows exactly what game it is running.

use super::component::ComponentStorage;
use super::components::*;
use super::entity::{Entity, EntityAllocator};
use super::transform::Transform;
use crate::math::Vec3;

pub struct World {
    entities: EntityAllocator,

    pub transforms: ComponentStorage<Transform>,
    /// Parent entity (collected keys parent to the camera)
    pub parents: ComponentStorage<Entity>,
    pub children: ComponentStorage<Vec<Entity>>,

    pub mesh_instances: ComponentStorage<MeshInstance>,
    pub materials: ComponentStorage<Material>,
    pub lights: ComponentStorage<PointLight>,
    pub animations: ComponentStorage<Animation>,
    pub spins: ComponentStorage<Spin>,
    pub overlays: ComponentStorage<Overlay>,
    pub labels: ComponentStorage<TextLabel>,

    pub door_panels: ComponentStorage<DoorPanel>,
    pub key_items: ComponentStorage<KeyItem>,

    /// Hidden entities are skipped by the renderer but keep all state.
    hidden: ComponentStorage<()>,
}

impl World {
    pub fn new() -> Self {
        Self {
            entities: EntityAllocator::new(),
            transforms: ComponentStorage::new(),
            parents: ComponentStorage::new(),
            children: ComponentStorage::new(),
            mesh_instances: ComponentStorage::new(),
            materials: ComponentStorage::new(),
            lights: ComponentStorage::new(),
            animations: ComponentStorage::new(),
            spins: ComponentStorage::new(),
            overlays: ComponentStorage::new(),
            labels: ComponentStorage::new(),
            door_panels: ComponentStorage::new(),
            key_items: ComponentStorage::new(),
            hidden: ComponentStorage::new(),
        }
    }

    /// Spawn an entity with an identity transform.
    pub fn spawn(&mut self) -> Entity {
        let entity = self.entities.allocate();
        self.transforms.insert(entity, Transform::IDENTITY);
        entity
    }

    pub fn spawn_at(&mut self, position: Vec3) -> Entity {
        let entity = self.entities.allocate();
        self.transforms.insert(entity, Transform::from_position(position));
        entity
    }

    /// Free an entity and all its components. Children go with it.
    pub fn despawn(&mut self, entity: Entity) {
        if !self.entities.free(entity) {
            return;
        }

        let idx = entity.index();

        if let Some(parent) = self.parents.remove(entity) {
            if let Some(siblings) = self.children.get_mut(parent) {
                siblings.retain(|&e| e != entity);
            }
        }

        if let Some(child_list) = self.children.remove(entity) {
            for child in child_list {
                self.despawn(child);
            }
        }

        self.transforms.clear_slot(idx);
        self.mesh_instances.clear_slot(idx);
        self.materials.clear_slot(idx);
        self.lights.clear_slot(idx);
        self.animations.clear_slot(idx);
        self.spins.clear_slot(idx);
        self.overlays.clear_slot(idx);
        self.labels.clear_slot(idx);
        self.door_panels.clear_slot(idx);
        self.key_items.clear_slot(idx);
        self.hidden.clear_slot(idx);
    }

    /// Clone an entity's renderable components onto a fresh entity.
    /// Used to stamp out minimap markers from a template.
    pub fn copy(&mut self, source: Entity) -> Entity {
        let entity = self.entities.allocate();

        if let Some(t) = self.transforms.get(source).copied() {
            self.transforms.insert(entity, t);
        } else {
            self.transforms.insert(entity, Transform::IDENTITY);
        }
        if let Some(m) = self.mesh_instances.get(source).copied() {
            self.mesh_instances.insert(entity, m);
        }
        if let Some(m) = self.materials.get(source).cloned() {
            self.materials.insert(entity, m);
        }
        if let Some(l) = self.lights.get(source).copied() {
            self.lights.insert(entity, l);
        }
        if let Some(s) = self.spins.get(source).copied() {
            self.spins.insert(entity, s);
        }
        if let Some(o) = self.overlays.get(source).copied() {
            self.overlays.insert(entity, o);
        }
        if let Some(l) = self.labels.get(source).cloned() {
            self.labels.insert(entity, l);
        }
        if self.hidden.contains(source) {
            self.hidden.insert(entity, ());
        }

        entity
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// Recover the live entity for a component-storage slot index.
    pub fn entity_at_index(&self, index: u32) -> Option<Entity> {
        self.entities.entity_at(index)
    }

    pub fn entity_count(&self) -> u32 {
        self.entities.alive_count()
    }

    // ------------------------------------------------------------------
    // Hierarchy
    // ------------------------------------------------------------------

    pub fn set_parent(&mut self, child: Entity, parent: Entity) {
        if let Some(old_parent) = self.parents.get(child).copied() {
            if let Some(siblings) = self.children.get_mut(old_parent) {
                siblings.retain(|&e| e != child);
            }
        }

        self.parents.insert(child, parent);

        if let Some(children) = self.children.get_mut(parent) {
            children.push(child);
        } else {
            self.children.insert(parent, vec![child]);
        }
    }

    /// World-space position of an entity, resolving the parent chain.
    pub fn world_position(&self, entity: Entity) -> Vec3 {
        let local = self
            .transforms
            .get(entity)
            .map(|t| t.position)
            .unwrap_or(Vec3::ZERO);

        match self.parents.get(entity) {
            Some(&parent) => {
                let parent_rotation = self
                    .transforms
                    .get(parent)
                    .map(|t| t.rotation)
                    .unwrap_or_default();
                self.world_position(parent) + parent_rotation.rotate(local)
            }
            None => local,
        }
    }

    // ------------------------------------------------------------------
    // Visibility
    // ------------------------------------------------------------------

    pub fn hide(&mut self, entity: Entity) {
        self.hidden.insert(entity, ());
    }

    pub fn show(&mut self, entity: Entity) {
        self.hidden.remove(entity);
    }

    pub fn is_visible(&self, entity: Entity) -> bool {
        !self.hidden.contains(entity)
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
