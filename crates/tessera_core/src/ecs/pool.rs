//! # Component Pools
//!
//! One pool per component type, addressed by entity index.
//!
//! Each pool keeps an index map (entity index to slot) and a free list of
//! slots, so add and remove are O(1) and a component never moves while it
//! is attached. Growable pools append slots on demand; stable pools reserve
//! every slot at creation and report [`EcsError::PoolExhausted`] instead of
//! reallocating.

use std::any::{type_name, Any};

use rayon::prelude::*;

use super::component::{validate_policy, Component, ComponentId, ComponentRegistry, PoolPolicy};
use super::entity::Entity;
use crate::error::{EcsError, EcsResult};

const NULL_SLOT: u32 = u32::MAX;

/// Sizing limits shared by every pool of a manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolLimits {
    /// Slots allocated when a growable pool is first created.
    pub initial_slots: usize,
    /// Hard ceiling on slots for any pool.
    pub max_slots: usize,
}

impl Default for PoolLimits {
    fn default() -> Self {
        Self {
            initial_slots: 128,
            max_slots: 1024 * 64,
        }
    }
}

struct Slot<T> {
    owner: Entity,
    value: T,
}

/// Storage for a single component type.
///
/// # Type Parameters
///
/// * `T` - The component type to store
pub struct ComponentPool<T: Component> {
    /// Slot storage. Stable pools never change this vector's allocation.
    slots: Vec<Option<Slot<T>>>,
    /// Entity index to slot index, `NULL_SLOT` when absent.
    index_map: Vec<u32>,
    /// Free slot indices, popped from the back.
    free_slots: Vec<u32>,
    /// Number of occupied slots.
    len: usize,
    /// Slot ceiling.
    max_slots: usize,
    stable: bool,
}

impl<T: Component> ComponentPool<T> {
    /// Creates a pool following `T::POLICY`.
    ///
    /// # Panics
    ///
    /// Panics if the policy's reservation is zero or above the limit; run
    /// [`validate_policy`] first to get an error instead.
    #[must_use]
    pub fn new(limits: PoolLimits) -> Self {
        let (reserve, max_slots, stable) = match T::POLICY {
            PoolPolicy::Growable => (
                limits.initial_slots.min(limits.max_slots),
                limits.max_slots,
                false,
            ),
            PoolPolicy::Stable { capacity } => {
                assert!(
                    capacity > 0 && capacity <= limits.max_slots,
                    "Stable pool capacity out of range"
                );
                tracing::info!(
                    component = type_name::<T>(),
                    capacity,
                    "reserved fixed component pool"
                );
                (capacity, capacity, true)
            }
        };

        let slots: Vec<Option<Slot<T>>> = (0..reserve).map(|_| None).collect();
        #[allow(clippy::cast_possible_truncation)]
        let free_slots: Vec<u32> = (0..reserve as u32).rev().collect();

        Self {
            slots,
            index_map: Vec::new(),
            free_slots,
            len: 0,
            max_slots,
            stable,
        }
    }

    /// Number of components stored.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// True if the pool stores nothing.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots currently allocated.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// True for fixed-reservation pools.
    #[inline]
    #[must_use]
    pub const fn is_stable(&self) -> bool {
        self.stable
    }

    fn slot_of(&self, index: u32) -> Option<usize> {
        match self.index_map.get(index as usize) {
            Some(&slot) if slot != NULL_SLOT => Some(slot as usize),
            _ => None,
        }
    }

    fn allocate_slot(&mut self) -> EcsResult<u32> {
        if let Some(slot) = self.free_slots.pop() {
            return Ok(slot);
        }

        if self.stable || self.slots.len() >= self.max_slots {
            tracing::error!(
                component = type_name::<T>(),
                capacity = self.slots.len(),
                "component pool exhausted"
            );
            return Err(EcsError::PoolExhausted {
                component: type_name::<T>(),
                capacity: self.slots.len(),
            });
        }

        #[allow(clippy::cast_possible_truncation)]
        let slot = self.slots.len() as u32;
        self.slots.push(None);
        tracing::debug!(
            component = type_name::<T>(),
            slots = self.slots.len(),
            "component pool grew"
        );
        Ok(slot)
    }

    /// Stores `value` for `entity`, replacing any existing value in place.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::PoolExhausted`] when no slot is available. Nothing
    /// is modified in that case.
    pub fn insert(&mut self, entity: Entity, value: T) -> EcsResult<&mut T> {
        let index = entity.index() as usize;
        let slot = if let Some(slot) = self.slot_of(entity.index()) {
            slot
        } else {
            let slot = self.allocate_slot()?;
            if index >= self.index_map.len() {
                self.index_map.resize(index + 1, NULL_SLOT);
            }
            self.index_map[index] = slot;
            self.len += 1;
            slot as usize
        };

        let stored = self.slots[slot].insert(Slot { owner: entity, value });
        Ok(&mut stored.value)
    }

    /// Removes and returns the component stored for an entity index.
    pub fn remove(&mut self, index: u32) -> Option<T> {
        let slot = self.slot_of(index)?;
        self.index_map[index as usize] = NULL_SLOT;
        let taken = self.slots[slot].take()?;
        #[allow(clippy::cast_possible_truncation)]
        let freed = slot as u32;
        self.free_slots.push(freed);
        self.len -= 1;
        Some(taken.value)
    }

    /// Checks whether a component is stored for an entity index.
    #[inline]
    #[must_use]
    pub fn contains(&self, index: u32) -> bool {
        self.slot_of(index).is_some()
    }

    /// Gets the component for an entity index.
    #[inline]
    #[must_use]
    pub fn get(&self, index: u32) -> Option<&T> {
        let slot = self.slot_of(index)?;
        self.slots[slot].as_ref().map(|s| &s.value)
    }

    /// Gets the component for an entity index mutably.
    #[inline]
    pub fn get_mut(&mut self, index: u32) -> Option<&mut T> {
        let slot = self.slot_of(index)?;
        self.slots[slot].as_mut().map(|s| &mut s.value)
    }

    /// Iterates over stored components with their owning entity.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.slots
            .iter()
            .filter_map(|slot| slot.as_ref().map(|s| (s.owner, &s.value)))
    }

    /// Iterates mutably over stored components with their owning entity.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut T)> {
        self.slots
            .iter_mut()
            .filter_map(|slot| slot.as_mut().map(|s| (s.owner, &mut s.value)))
    }

    /// Runs `f` over every component whose owner passes `filter`, in
    /// parallel.
    ///
    /// Each slot is visited by exactly one worker, so `f` gets exclusive
    /// access to its component.
    pub fn par_for_each_mut<P, F>(&mut self, filter: P, f: F)
    where
        P: Fn(Entity) -> bool + Sync,
        F: Fn(Entity, &mut T) + Sync + Send,
    {
        self.slots.par_iter_mut().for_each(|slot| {
            if let Some(s) = slot.as_mut() {
                if filter(s.owner) {
                    f(s.owner, &mut s.value);
                }
            }
        });
    }

    /// Drops every component and releases all slots.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.index_map.clear();
        self.free_slots.clear();
        #[allow(clippy::cast_possible_truncation)]
        let slot_count = self.slots.len() as u32;
        self.free_slots.extend((0..slot_count).rev());
        self.len = 0;
    }

    #[cfg(test)]
    fn storage_ptr(&self) -> *const Option<Slot<T>> {
        self.slots.as_ptr()
    }
}

/// Type-erased view of a [`ComponentPool`].
///
/// Lets the manager reset an entity across every pool without knowing the
/// concrete types.
pub trait Pool: Send + Sync {
    /// Drops the component stored for an entity index, if any.
    fn reset(&mut self, index: u32);
    /// Drops every component.
    fn clear(&mut self);
    /// Number of components stored.
    fn len(&self) -> usize;
    /// True if the pool stores nothing.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Number of slots allocated.
    fn capacity(&self) -> usize;
    /// Type name of the stored component.
    fn name(&self) -> &'static str;
    /// Upcast for downcasting to the typed pool.
    fn as_any(&self) -> &dyn Any;
    /// Mutable upcast for downcasting to the typed pool.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> Pool for ComponentPool<T> {
    fn reset(&mut self, index: u32) {
        self.remove(index);
    }

    fn clear(&mut self) {
        Self::clear(self);
    }

    fn len(&self) -> usize {
        self.len
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn name(&self) -> &'static str {
        type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Occupancy snapshot of one pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolStats {
    /// The pool's component ID.
    pub id: ComponentId,
    /// Component type name.
    pub name: &'static str,
    /// Components stored.
    pub used: usize,
    /// Slots allocated.
    pub capacity: usize,
}

/// Owns every component pool and the type registry that indexes them.
pub struct ComponentManager {
    registry: ComponentRegistry,
    /// Indexed by component ID.
    pools: Vec<Option<Box<dyn Pool>>>,
    limits: PoolLimits,
}

impl ComponentManager {
    /// Creates a manager with an empty registry.
    #[must_use]
    pub fn new(limits: PoolLimits) -> Self {
        Self::with_registry(ComponentRegistry::new(), limits)
    }

    /// Creates a manager around a pre-built registry.
    #[must_use]
    pub fn with_registry(registry: ComponentRegistry, limits: PoolLimits) -> Self {
        Self {
            registry,
            pools: Vec::new(),
            limits,
        }
    }

    /// The type registry.
    #[inline]
    #[must_use]
    pub const fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Pool sizing limits.
    #[inline]
    #[must_use]
    pub const fn limits(&self) -> PoolLimits {
        self.limits
    }

    /// Returns the ID of `T`, registering it on first use.
    ///
    /// # Errors
    ///
    /// See [`ComponentRegistry::id_of`].
    pub fn id_of<T: Component>(&self) -> EcsResult<ComponentId> {
        self.registry.id_of::<T>()
    }

    /// Typed pool for `T`, if one was created.
    #[must_use]
    pub fn pool<T: Component>(&self) -> Option<&ComponentPool<T>> {
        let id = self.registry.get::<T>()?;
        self.pools
            .get(usize::from(id.index()))?
            .as_deref()?
            .as_any()
            .downcast_ref::<ComponentPool<T>>()
    }

    /// Typed pool for `T` mutably, if one was created.
    pub fn pool_mut<T: Component>(&mut self) -> Option<&mut ComponentPool<T>> {
        let id = self.registry.get::<T>()?;
        self.pools
            .get_mut(usize::from(id.index()))?
            .as_deref_mut()?
            .as_any_mut()
            .downcast_mut::<ComponentPool<T>>()
    }

    fn pool_or_create<T: Component>(&mut self) -> EcsResult<(ComponentId, &mut ComponentPool<T>)> {
        validate_policy::<T>(self.limits.max_slots)?;
        let id = self.registry.id_of::<T>()?;
        let slot = usize::from(id.index());
        if slot >= self.pools.len() {
            self.pools.resize_with(slot + 1, || None);
        }

        let limits = self.limits;
        let Some(pool) = self.pools[slot]
            .get_or_insert_with(|| Box::new(ComponentPool::<T>::new(limits)))
            .as_any_mut()
            .downcast_mut::<ComponentPool<T>>()
        else {
            unreachable!("component pool registered under a foreign type");
        };
        Ok((id, pool))
    }

    /// Stores a component for `entity`.
    ///
    /// # Errors
    ///
    /// Fails if `T` cannot be registered or its pool is exhausted.
    pub fn add<T: Component>(&mut self, entity: Entity, value: T) -> EcsResult<(ComponentId, &mut T)> {
        let (id, pool) = self.pool_or_create::<T>()?;
        let component = pool.insert(entity, value)?;
        Ok((id, component))
    }

    /// Removes `T` from an entity index. Safe if it was never added.
    pub fn remove<T: Component>(&mut self, index: u32) -> Option<(ComponentId, T)> {
        let id = self.registry.get::<T>()?;
        let value = self.pool_mut::<T>()?.remove(index)?;
        Some((id, value))
    }

    /// Gets the `T` stored for an entity index.
    #[must_use]
    pub fn get<T: Component>(&self, index: u32) -> Option<&T> {
        self.pool::<T>()?.get(index)
    }

    /// Gets the `T` stored for an entity index mutably.
    pub fn get_mut<T: Component>(&mut self, index: u32) -> Option<&mut T> {
        self.pool_mut::<T>()?.get_mut(index)
    }

    /// Gets the `T` attached to an entity.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentNotPresent`] when the entity has no `T`.
    pub fn try_get<T: Component>(&self, entity: Entity) -> EcsResult<&T> {
        self.get::<T>(entity.index())
            .ok_or(EcsError::ComponentNotPresent {
                entity,
                component: type_name::<T>(),
            })
    }

    /// Drops every component of an entity index.
    pub fn reset(&mut self, index: u32) {
        for pool in self.pools.iter_mut().flatten() {
            pool.reset(index);
        }
    }

    /// Drops every component in every pool.
    pub fn clear(&mut self) {
        for pool in self.pools.iter_mut().flatten() {
            pool.clear();
        }
    }

    /// Occupancy of each created pool, in ID order.
    #[must_use]
    pub fn stats(&self) -> Vec<PoolStats> {
        self.pools
            .iter()
            .enumerate()
            .filter_map(|(i, pool)| {
                #[allow(clippy::cast_possible_truncation)]
                let id = ComponentId::from_index(i as u8);
                pool.as_deref().map(|p| PoolStats {
                    id,
                    name: p.name(),
                    used: p.len(),
                    capacity: p.capacity(),
                })
            })
            .collect()
    }
}
