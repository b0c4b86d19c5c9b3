//! # Entity Manager
//!
//! Owns entity slots: generations, component masks, labels and the free
//! list of indices. Component data lives in the embedded
//! [`ComponentManager`]; the manager keeps each slot's mask in step with it.

use std::any::type_name;
use std::collections::VecDeque;

use super::component::Component;
use super::entity::{Entity, MAX_INDEX};
use super::mask::ComponentMask;
use super::pool::ComponentManager;
use crate::error::{EcsError, EcsResult};
use crate::message::{MessageSender, SceneEvent, SCENE_MESSAGE};

/// Lifecycle state of an entity slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    /// Unused; the index sits on the free list.
    Free,
    /// Created but not yet visible to systems.
    Pending,
    /// Visible to systems.
    Live,
    /// Queued for destruction at the next flush.
    PendingDestruction,
}

/// Creates, validates and destroys entities.
///
/// # Example
///
/// ```rust,ignore
/// let mut manager = EntityManager::new(components, bus.sender(), 1024);
///
/// let entity = manager.create_entity();
/// manager.add_component(entity, Health(10))?;
/// assert!(manager.destroy_entity(entity));
/// assert!(!manager.is_valid(entity));
/// ```
pub struct EntityManager {
    /// Current generation of each slot.
    generations: Vec<u8>,
    states: Vec<SlotState>,
    masks: Vec<ComponentMask>,
    labels: Vec<String>,
    /// Set while a slot sits in `changed`.
    dirty: Vec<bool>,
    /// Live entities whose mask changed since the last flush.
    changed: Vec<Entity>,
    /// Indices available for reuse, oldest first.
    free_ids: VecDeque<u32>,
    /// Indices are only reused once more than this many are free.
    min_free_ids: usize,
    alive_count: usize,
    components: ComponentManager,
    messages: MessageSender,
}

impl EntityManager {
    /// Creates an empty manager.
    ///
    /// # Arguments
    ///
    /// * `components` - Component storage for this manager's entities
    /// * `messages` - Where `EntityDestroyed` notifications are posted
    /// * `min_free_ids` - Free indices held back before reuse starts
    #[must_use]
    pub fn new(components: ComponentManager, messages: MessageSender, min_free_ids: usize) -> Self {
        Self {
            generations: Vec::new(),
            states: Vec::new(),
            masks: Vec::new(),
            labels: Vec::new(),
            dirty: Vec::new(),
            changed: Vec::new(),
            free_ids: VecDeque::new(),
            min_free_ids,
            alive_count: 0,
            components,
            messages,
        }
    }

    /// Number of entities not yet destroyed.
    #[inline]
    #[must_use]
    pub const fn alive_count(&self) -> usize {
        self.alive_count
    }

    /// Number of slots ever allocated.
    #[inline]
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.generations.len()
    }

    /// Component storage.
    #[inline]
    #[must_use]
    pub const fn components(&self) -> &ComponentManager {
        &self.components
    }

    /// Mutable component storage.
    ///
    /// Changes made here bypass mask upkeep; prefer the entity-level
    /// methods unless only touching existing component values.
    #[inline]
    pub fn components_mut(&mut self) -> &mut ComponentManager {
        &mut self.components
    }

    /// Creates a new entity in the `Pending` state with an empty mask.
    ///
    /// # Returns
    ///
    /// The new handle, or [`Entity::NULL`] if every index is in use.
    pub fn create_entity(&mut self) -> Entity {
        let index = if self.free_ids.len() > self.min_free_ids {
            match self.free_ids.pop_front() {
                Some(index) => index,
                None => return Entity::NULL,
            }
        } else {
            let next = self.generations.len();
            if next >= MAX_INDEX as usize {
                tracing::error!(slots = next, "{}", EcsError::EntityLimit(next));
                return Entity::NULL;
            }
            self.generations.push(0);
            self.states.push(SlotState::Free);
            self.masks.push(ComponentMask::EMPTY);
            self.labels.push(String::new());
            self.dirty.push(false);
            #[allow(clippy::cast_possible_truncation)]
            let index = next as u32;
            index
        };

        let idx = index as usize;
        debug_assert_eq!(self.states[idx], SlotState::Free, "free list handed out a used slot");
        self.states[idx] = SlotState::Pending;
        self.masks[idx].reset();
        self.alive_count += 1;

        let entity = Entity::new(index, self.generations[idx]);
        tracing::trace!(%entity, "created entity");
        entity
    }

    /// Destroys an entity immediately.
    ///
    /// Every component is dropped, the generation advances and the index is
    /// queued for reuse. An `EntityDestroyed` scene message is posted.
    ///
    /// # Returns
    ///
    /// `true` if the entity was destroyed, `false` if the handle was
    /// already stale (destroying twice is a no-op).
    pub fn destroy_entity(&mut self, entity: Entity) -> bool {
        if !self.is_valid(entity) {
            tracing::warn!(%entity, "ignoring destroy of stale entity");
            return false;
        }

        let idx = entity.index() as usize;
        self.components.reset(entity.index());
        self.masks[idx].reset();
        self.labels[idx].clear();
        self.dirty[idx] = false;
        self.states[idx] = SlotState::Free;
        self.generations[idx] = self.generations[idx].wrapping_add(1);
        self.free_ids.push_back(entity.index());
        self.alive_count -= 1;

        let event = SceneEvent {
            entity_id: entity.index(),
            event: SceneEvent::ENTITY_DESTROYED,
        };
        // Overflow is logged by the bus; destruction itself has succeeded.
        let _ = self.messages.post(SCENE_MESSAGE, &event);

        tracing::trace!(%entity, "destroyed entity");
        true
    }

    /// True if the handle refers to an existing entity at its current
    /// generation.
    #[inline]
    #[must_use]
    pub fn is_valid(&self, entity: Entity) -> bool {
        if entity.is_null() {
            return false;
        }
        let idx = entity.index() as usize;
        idx < self.generations.len()
            && self.generations[idx] == entity.generation()
            && self.states[idx] != SlotState::Free
    }

    /// Lifecycle state of a valid handle.
    #[must_use]
    pub fn state(&self, entity: Entity) -> Option<SlotState> {
        self.is_valid(entity)
            .then(|| self.states[entity.index() as usize])
    }

    /// Moves a pending entity to `Live`.
    ///
    /// # Returns
    ///
    /// `true` if the entity was pending.
    pub(crate) fn mark_live(&mut self, entity: Entity) -> bool {
        if self.state(entity) == Some(SlotState::Pending) {
            self.states[entity.index() as usize] = SlotState::Live;
            true
        } else {
            false
        }
    }

    /// Flags an entity for destruction at the next flush.
    ///
    /// # Returns
    ///
    /// `true` the first time a valid entity is flagged.
    pub(crate) fn mark_destroyed(&mut self, entity: Entity) -> bool {
        match self.state(entity) {
            Some(SlotState::Pending | SlotState::Live) => {
                self.states[entity.index() as usize] = SlotState::PendingDestruction;
                true
            }
            _ => false,
        }
    }

    /// True if the entity is flagged for destruction or already gone.
    #[must_use]
    pub fn is_marked_destroyed(&self, entity: Entity) -> bool {
        !matches!(
            self.state(entity),
            Some(SlotState::Pending | SlotState::Live)
        )
    }

    /// Returns the handle currently occupying `index`, if any.
    #[must_use]
    pub fn entity_at(&self, index: u32) -> Option<Entity> {
        let idx = index as usize;
        match self.states.get(idx) {
            Some(SlotState::Free) | None => None,
            Some(_) => Some(Entity::new(index, self.generations[idx])),
        }
    }

    /// Component mask of a valid entity.
    #[must_use]
    pub fn component_mask(&self, entity: Entity) -> Option<ComponentMask> {
        self.is_valid(entity)
            .then(|| self.masks[entity.index() as usize])
    }

    /// Every entity currently in the `Live` state.
    pub fn live_entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.states
            .iter()
            .enumerate()
            .filter(|(_, state)| **state == SlotState::Live)
            .map(|(idx, _)| {
                #[allow(clippy::cast_possible_truncation)]
                let index = idx as u32;
                Entity::new(index, self.generations[idx])
            })
    }

    fn note_change(&mut self, entity: Entity) {
        let idx = entity.index() as usize;
        if self.states[idx] == SlotState::Live && !self.dirty[idx] {
            self.dirty[idx] = true;
            self.changed.push(entity);
        }
    }

    /// Drains the live entities whose mask changed since the last call.
    pub(crate) fn take_changed(&mut self) -> Vec<Entity> {
        let changed = std::mem::take(&mut self.changed);
        for entity in &changed {
            if let Some(flag) = self.dirty.get_mut(entity.index() as usize) {
                *flag = false;
            }
        }
        changed
    }

    /// Attaches a component, replacing any existing one of the same type.
    ///
    /// # Errors
    ///
    /// [`EcsError::StaleEntity`] for dead handles, or any pool error.
    pub fn add_component<T: Component>(&mut self, entity: Entity, value: T) -> EcsResult<&mut T> {
        if !self.is_valid(entity) {
            tracing::warn!(%entity, component = type_name::<T>(), "add_component on stale entity");
            return Err(EcsError::StaleEntity(entity));
        }

        let id = self.components.id_of::<T>()?;
        let idx = entity.index() as usize;
        let newly_added = !self.masks[idx].contains(id);
        let (_, component) = self.components.add(entity, value)?;

        if newly_added {
            self.masks[idx].set(id);
            if self.states[idx] == SlotState::Live && !self.dirty[idx] {
                self.dirty[idx] = true;
                self.changed.push(entity);
            }
        }
        Ok(component)
    }

    /// Detaches a component. Safe to call if the entity never had one.
    ///
    /// # Returns
    ///
    /// The removed value, if there was one.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Option<T> {
        if !self.is_valid(entity) {
            tracing::warn!(%entity, component = type_name::<T>(), "remove_component on stale entity");
            return None;
        }
        let (id, value) = self.components.remove::<T>(entity.index())?;
        self.masks[entity.index() as usize].clear(id);
        self.note_change(entity);
        Some(value)
    }

    /// True if the entity is valid and carries a `T`.
    #[must_use]
    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        match (self.components.registry().get::<T>(), self.component_mask(entity)) {
            (Some(id), Some(mask)) => mask.contains(id),
            _ => false,
        }
    }

    /// The entity's `T`, if present.
    #[must_use]
    pub fn component<T: Component>(&self, entity: Entity) -> Option<&T> {
        if !self.is_valid(entity) {
            return None;
        }
        self.components.get::<T>(entity.index())
    }

    /// The entity's `T` mutably, if present.
    pub fn component_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        if !self.is_valid(entity) {
            return None;
        }
        self.components.get_mut::<T>(entity.index())
    }

    /// Checked access that reports why a component is unavailable.
    ///
    /// # Errors
    ///
    /// [`EcsError::StaleEntity`] or [`EcsError::ComponentNotPresent`].
    pub fn try_component<T: Component>(&self, entity: Entity) -> EcsResult<&T> {
        if !self.is_valid(entity) {
            return Err(EcsError::StaleEntity(entity));
        }
        self.components.try_get::<T>(entity)
    }

    /// Checked mutable access.
    ///
    /// # Errors
    ///
    /// [`EcsError::StaleEntity`] or [`EcsError::ComponentNotPresent`].
    pub fn try_component_mut<T: Component>(&mut self, entity: Entity) -> EcsResult<&mut T> {
        if !self.is_valid(entity) {
            return Err(EcsError::StaleEntity(entity));
        }
        self.components
            .get_mut::<T>(entity.index())
            .ok_or(EcsError::ComponentNotPresent {
                entity,
                component: type_name::<T>(),
            })
    }

    /// Attaches a debug label to an entity.
    pub fn set_label(&mut self, entity: Entity, label: impl Into<String>) -> bool {
        if !self.is_valid(entity) {
            return false;
        }
        self.labels[entity.index() as usize] = label.into();
        true
    }

    /// The entity's label; empty if none was set.
    #[must_use]
    pub fn label(&self, entity: Entity) -> Option<&str> {
        self.is_valid(entity)
            .then(|| self.labels[entity.index() as usize].as_str())
    }
}
