//! # ECS World
//!
//! The context handed to systems and directors: entity storage plus the
//! deferred create/destroy queues and a handle to the message bus.
//!
//! Entities created through the world are `Pending` until the owning
//! scene's next flush; destruction is likewise deferred, so systems may
//! create and destroy freely while the scene iterates them.

use bytemuck::Pod;

use super::component::{Component, ComponentRegistry};
use super::entity::Entity;
use super::entity_manager::EntityManager;
use super::mask::ComponentMask;
use super::pool::{ComponentManager, ComponentPool};
use super::system::SystemCore;
use crate::error::{EcsResult, MessageBusError};
use crate::message::MessageSender;

/// Entity storage plus deferred queues.
///
/// # Example
///
/// ```rust,ignore
/// fn process(&mut self, world: &mut World, dt: f32) {
///     for &entity in self.core.entities() {
///         if world.component::<Lifetime>(entity).is_some_and(|l| l.0 <= 0.0) {
///             world.destroy_entity(entity);
///         }
///     }
/// }
/// ```
pub struct World {
    entities: EntityManager,
    /// Created since the last flush.
    pending: Vec<Entity>,
    /// Flagged for destruction since the last flush.
    destroyed: Vec<Entity>,
    /// Entities `destroy_entity` refuses, such as the default camera.
    protected: Vec<Entity>,
    messages: MessageSender,
}

impl World {
    /// Creates an empty world.
    ///
    /// # Arguments
    ///
    /// * `components` - Component storage, with its type registry
    /// * `messages` - Bus handle for posting
    /// * `min_free_ids` - Free indices held back before reuse
    #[must_use]
    pub fn new(components: ComponentManager, messages: MessageSender, min_free_ids: usize) -> Self {
        Self {
            entities: EntityManager::new(components, messages.clone(), min_free_ids),
            pending: Vec::new(),
            destroyed: Vec::new(),
            protected: Vec::new(),
            messages,
        }
    }

    /// The entity manager.
    #[inline]
    #[must_use]
    pub const fn entities(&self) -> &EntityManager {
        &self.entities
    }

    /// The entity manager, mutably. Crate-only: its `destroy_entity` is
    /// immediate and would leave stale handles in system lists.
    #[inline]
    pub(crate) fn entities_mut(&mut self) -> &mut EntityManager {
        &mut self.entities
    }

    /// Names an entity for diagnostics.
    ///
    /// # Returns
    ///
    /// `false` for a stale handle.
    pub fn set_label(&mut self, entity: Entity, label: impl Into<String>) -> bool {
        self.entities.set_label(entity, label)
    }

    /// Makes `destroy_entity` refuse `entity` from now on.
    pub(crate) fn protect(&mut self, entity: Entity) {
        if !self.protected.contains(&entity) {
            self.protected.push(entity);
        }
    }

    /// True if `destroy_entity` refuses this entity.
    #[inline]
    #[must_use]
    pub fn is_protected(&self, entity: Entity) -> bool {
        self.protected.contains(&entity)
    }

    /// The component type registry.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &ComponentRegistry {
        self.entities.components().registry()
    }

    /// Creates an entity, visible to systems after the next flush.
    ///
    /// Components may be attached straight away.
    pub fn create_entity(&mut self) -> Entity {
        let entity = self.entities.create_entity();
        if !entity.is_null() {
            self.pending.push(entity);
        }
        entity
    }

    /// Queues an entity for destruction at the next flush.
    ///
    /// The handle stays valid until then. Queuing twice is a no-op, and
    /// protected entities (the scene's default camera) are refused.
    ///
    /// # Returns
    ///
    /// `true` if the entity was newly queued.
    pub fn destroy_entity(&mut self, entity: Entity) -> bool {
        if self.is_protected(entity) {
            tracing::warn!(%entity, "refusing to destroy a protected entity");
            return false;
        }
        if self.entities.mark_destroyed(entity) {
            self.destroyed.push(entity);
            true
        } else {
            if !self.entities.is_valid(entity) {
                tracing::warn!(%entity, "ignoring destroy of stale entity");
            }
            false
        }
    }

    /// True if the handle refers to an entity that has not been destroyed.
    #[inline]
    #[must_use]
    pub fn is_valid(&self, entity: Entity) -> bool {
        self.entities.is_valid(entity)
    }

    /// See [`EntityManager::add_component`].
    ///
    /// # Errors
    ///
    /// Stale handle or pool failure.
    pub fn add_component<T: Component>(&mut self, entity: Entity, value: T) -> EcsResult<&mut T> {
        self.entities.add_component(entity, value)
    }

    /// See [`EntityManager::remove_component`].
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Option<T> {
        self.entities.remove_component(entity)
    }

    /// See [`EntityManager::component`].
    #[must_use]
    pub fn component<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.entities.component(entity)
    }

    /// See [`EntityManager::component_mut`].
    pub fn component_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.entities.component_mut(entity)
    }

    /// See [`EntityManager::try_component`].
    ///
    /// # Errors
    ///
    /// Stale handle or missing component.
    pub fn try_component<T: Component>(&self, entity: Entity) -> EcsResult<&T> {
        self.entities.try_component(entity)
    }

    /// See [`EntityManager::has_component`].
    #[must_use]
    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        self.entities.has_component::<T>(entity)
    }

    /// See [`EntityManager::component_mask`].
    #[must_use]
    pub fn component_mask(&self, entity: Entity) -> Option<ComponentMask> {
        self.entities.component_mask(entity)
    }

    /// Typed pool for `T`.
    #[must_use]
    pub fn pool<T: Component>(&self) -> Option<&ComponentPool<T>> {
        self.entities.components().pool::<T>()
    }

    /// Runs `f` in parallel over every `T` owned by an entity of `system`.
    ///
    /// Components of entities outside the system are not touched.
    pub fn par_for_each_mut<T, F>(&mut self, system: &SystemCore, f: F)
    where
        T: Component,
        F: Fn(Entity, &mut T) + Sync + Send,
    {
        if let Some(pool) = self.entities.components_mut().pool_mut::<T>() {
            pool.par_for_each_mut(|entity| system.contains(entity), f);
        }
    }

    /// Posts a message for the next frame.
    ///
    /// # Errors
    ///
    /// See [`MessageSender::post`].
    pub fn post_message<T: Pod>(&self, id: i32, value: &T) -> Result<(), MessageBusError> {
        self.messages.post(id, value)
    }

    /// A posting handle that can move to other threads.
    #[must_use]
    pub fn sender(&self) -> MessageSender {
        self.messages.clone()
    }

    /// Entities waiting for the next flush.
    #[must_use]
    pub fn pending(&self) -> &[Entity] {
        &self.pending
    }

    /// Entities queued for destruction.
    #[must_use]
    pub fn destroyed(&self) -> &[Entity] {
        &self.destroyed
    }

    pub(crate) fn take_pending(&mut self) -> Vec<Entity> {
        std::mem::take(&mut self.pending)
    }

    pub(crate) fn take_destroyed(&mut self) -> Vec<Entity> {
        std::mem::take(&mut self.destroyed)
    }
}
