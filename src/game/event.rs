//! Event queues
//!
//! Completion notifications travel as plain data through queues instead
//! of registered callbacks: the animation system reports which entities
//! finished, and the level's state machine reacts on its own terms
//! (play the "opened" sound, free the door).

use super::entity::Entity;

/// A queue for events of one type, collected during the frame and
/// drained by whoever owns the reaction.
#[derive(Debug)]
pub struct EventQueue<T> {
    events: Vec<T>,
}

impl<T> EventQueue<T> {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn send(&mut self, event: T) {
        self.events.push(event);
    }

    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.events.drain(..)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}

impl<T> Default for EventQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// An entity's animation reached its final frame this tick.
#[derive(Debug, Clone, Copy)]
pub struct AnimationFinished {
    pub entity: Entity,
}

/// All runtime event queues.
pub struct Events {
    pub animation_finished: EventQueue<AnimationFinished>,
}

impl Events {
    pub fn new() -> Self {
        Self {
            animation_finished: EventQueue::new(),
        }
    }
}

impl Default for Events {
    fn default() -> Self {
        Self::new()
    }
}
