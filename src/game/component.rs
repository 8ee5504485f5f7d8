//! Component storage
//!
//! Sparse per-type storage mapping entity indices to component data.
//! A maze level holds at most a few hundred entities, so a plain
//! `Vec<Option<T>>` beats anything cleverer and stays easy to reason
//! about.

use super::entity::Entity;

/// Sparse storage for a single component type, indexed by
/// `entity.index()`.
pub struct ComponentStorage<T> {
    data: Vec<Option<T>>,
}

impl<T> ComponentStorage<T> {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    fn ensure_capacity(&mut self, index: usize) {
        if index >= self.data.len() {
            self.data.resize_with(index + 1, || None);
        }
    }

    /// Insert a component, replacing any existing one.
    pub fn insert(&mut self, entity: Entity, component: T) {
        let idx = entity.index() as usize;
        self.ensure_capacity(idx);
        self.data[idx] = Some(component);
    }

    /// Remove and return an entity's component.
    pub fn remove(&mut self, entity: Entity) -> Option<T> {
        let idx = entity.index() as usize;
        if idx < self.data.len() {
            self.data[idx].take()
        } else {
            None
        }
    }

    pub fn get(&self, entity: Entity) -> Option<&T> {
        let idx = entity.index() as usize;
        self.data.get(idx).and_then(|opt| opt.as_ref())
    }

    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        let idx = entity.index() as usize;
        self.data.get_mut(idx).and_then(|opt| opt.as_mut())
    }

    pub fn contains(&self, entity: Entity) -> bool {
        let idx = entity.index() as usize;
        idx < self.data.len() && self.data[idx].is_some()
    }

    /// Iterate over (index, component) pairs. The caller is
    /// responsible for checking liveness where it matters.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.data
            .iter()
            .enumerate()
            .filter_map(|(idx, opt)| opt.as_ref().map(|c| (idx as u32, c)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (u32, &mut T)> {
        self.data
            .iter_mut()
            .enumerate()
            .filter_map(|(idx, opt)| opt.as_mut().map(|c| (idx as u32, c)))
    }

    /// Drop the component in a slot. Called when an entity despawns.
    pub fn clear_slot(&mut self, index: u32) {
        let idx = index as usize;
        if idx < self.data.len() {
            self.data[idx] = None;
        }
    }

    pub fn count(&self) -> usize {
        self.data.iter().filter(|opt| opt.is_some()).count()
    }
}

impl<T> Default for ComponentStorage<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut storage: ComponentStorage<i32> = ComponentStorage::new();
        let entity = Entity::new(5, 0);

        storage.insert(entity, 42);
        assert_eq!(storage.get(entity), Some(&42));
        assert!(storage.contains(entity));
    }

    #[test]
    fn test_remove() {
        let mut storage: ComponentStorage<i32> = ComponentStorage::new();
        let entity = Entity::new(3, 0);

        storage.insert(entity, 100);
        assert_eq!(storage.remove(entity), Some(100));
        assert!(!storage.contains(entity));
        assert_eq!(storage.remove(entity), None);
    }

    #[test]
    fn test_sparse_holes() {
        let mut storage: ComponentStorage<i32> = ComponentStorage::new();

        let entity = Entity::new(100, 0);
        storage.insert(entity, 999);

        assert_eq!(storage.get(entity), Some(&999));
        assert!(!storage.contains(Entity::new(50, 0)));
        assert_eq!(storage.count(), 1);
    }

    #[test]
    fn test_iteration() {
        let mut storage: ComponentStorage<&str> = ComponentStorage::new();

        storage.insert(Entity::new(0, 0), "zero");
        storage.insert(Entity::new(2, 0), "two");
        storage.insert(Entity::new(5, 0), "five");

        let items: Vec<_> = storage.iter().collect();
        assert_eq!(items.len(), 3);
        assert!(items.contains(&(2, &"two")));
    }
}
