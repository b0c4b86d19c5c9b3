//! # Component Types
//!
//! Components are plain data attached to entities. Each concrete type is
//! given a small integer ID the first time a component manager sees it;
//! the ID selects the type's pool and its bit in every [`ComponentMask`].
//!
//! [`ComponentMask`]: super::ComponentMask

use std::any::{type_name, TypeId};
use std::collections::HashMap;

use parking_lot::RwLock;

use super::mask::MAX_COMPONENTS;
use crate::error::{EcsError, EcsResult};

/// Storage policy for a component type's pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoolPolicy {
    /// The pool grows on demand, up to the manager's slot limit.
    Growable,
    /// The pool reserves `capacity` slots up front and never reallocates.
    ///
    /// Adding a component beyond the reservation fails with
    /// [`EcsError::PoolExhausted`].
    Stable {
        /// Number of slots reserved.
        capacity: usize,
    },
}

/// Marker trait for ECS components.
///
/// Any `Send + Sync + 'static` type can be a component. Override
/// [`Component::POLICY`] for types whose storage must never move.
///
/// # Example
///
/// ```rust
/// use tessera_core::ecs::{Component, PoolPolicy};
///
/// #[derive(Default)]
/// struct Health(u32);
///
/// impl Component for Health {}
///
/// struct Emitter { channel: u8 }
///
/// impl Component for Emitter {
///     const POLICY: PoolPolicy = PoolPolicy::Stable { capacity: 256 };
/// }
/// ```
pub trait Component: Send + Sync + 'static {
    /// Pool policy for this type.
    const POLICY: PoolPolicy = PoolPolicy::Growable;
}

/// Small integer identifying a component type within one manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ComponentId(u8);

impl ComponentId {
    /// Builds an ID from its raw index.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below [`MAX_COMPONENTS`].
    #[inline]
    #[must_use]
    pub const fn from_index(index: u8) -> Self {
        assert!((index as usize) < MAX_COMPONENTS, "Component ID out of range");
        Self(index)
    }

    /// Returns the raw index (0-63).
    #[inline]
    #[must_use]
    pub const fn index(self) -> u8 {
        self.0
    }
}

#[derive(Default)]
struct RegistryTable {
    ids: HashMap<TypeId, ComponentId>,
    names: Vec<&'static str>,
}

/// Thread-safe type to ID cache.
///
/// IDs are assigned in registration order starting at zero and never
/// change for the life of the registry. Lookups take a read lock;
/// registration takes the write lock, so there is only ever one writer.
#[derive(Default)]
pub struct ComponentRegistry {
    table: RwLock<RegistryTable>,
}

impl ComponentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts an explicit, closed registration list.
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Returns the ID of `T`, registering it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::TooManyComponents`] once every ID is taken.
    pub fn id_of<T: Component>(&self) -> EcsResult<ComponentId> {
        if let Some(id) = self.get::<T>() {
            return Ok(id);
        }

        let mut table = self.table.write();
        // Another writer may have won the race between the two locks.
        if let Some(&id) = table.ids.get(&TypeId::of::<T>()) {
            return Ok(id);
        }

        let next = table.names.len();
        if next >= MAX_COMPONENTS {
            tracing::error!(component = type_name::<T>(), "component type limit reached");
            return Err(EcsError::TooManyComponents {
                component: type_name::<T>(),
                limit: MAX_COMPONENTS,
            });
        }

        #[allow(clippy::cast_possible_truncation)]
        let id = ComponentId::from_index(next as u8);
        table.ids.insert(TypeId::of::<T>(), id);
        table.names.push(type_name::<T>());
        tracing::debug!(component = type_name::<T>(), id = next, "registered component type");
        Ok(id)
    }

    /// Returns the ID of `T` if it has been registered.
    #[must_use]
    pub fn get<T: Component>(&self) -> Option<ComponentId> {
        self.get_by_type_id(TypeId::of::<T>())
    }

    /// Returns the ID registered for a raw `TypeId`.
    #[must_use]
    pub fn get_by_type_id(&self, type_id: TypeId) -> Option<ComponentId> {
        self.table.read().ids.get(&type_id).copied()
    }

    /// Returns the type name registered under `id`.
    #[must_use]
    pub fn name(&self, id: ComponentId) -> Option<&'static str> {
        self.table.read().names.get(usize::from(id.index())).copied()
    }

    /// Number of registered component types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.read().names.len()
    }

    /// True if nothing has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

type RegisterFn = fn(&ComponentRegistry, usize) -> EcsResult<ComponentId>;

/// Collects component types for up-front registration.
///
/// Errors (too many types, bad stable reservations) surface from
/// [`RegistryBuilder::build`], so a misconfigured component set fails at
/// startup rather than during play.
#[derive(Default)]
pub struct RegistryBuilder {
    entries: Vec<RegisterFn>,
}

impl RegistryBuilder {
    /// Adds `T` to the list. Order of calls is the order of IDs.
    #[must_use]
    pub fn register<T: Component>(mut self) -> Self {
        self.entries.push(register_checked::<T>);
        self
    }

    /// Registers every listed type.
    ///
    /// `max_pool_slots` bounds stable reservations.
    ///
    /// # Errors
    ///
    /// Returns the first registration or validation failure.
    pub fn build(self, max_pool_slots: usize) -> EcsResult<ComponentRegistry> {
        let registry = ComponentRegistry::new();
        for register in self.entries {
            register(&registry, max_pool_slots)?;
        }
        Ok(registry)
    }
}

fn register_checked<T: Component>(
    registry: &ComponentRegistry,
    max_pool_slots: usize,
) -> EcsResult<ComponentId> {
    validate_policy::<T>(max_pool_slots)?;
    registry.id_of::<T>()
}

/// Checks a type's stable reservation against the slot limit.
///
/// # Errors
///
/// Returns [`EcsError::InvalidPoolCapacity`] for a zero or oversized
/// reservation.
pub fn validate_policy<T: Component>(max_pool_slots: usize) -> EcsResult<()> {
    if let PoolPolicy::Stable { capacity } = T::POLICY {
        if capacity == 0 || capacity > max_pool_slots {
            return Err(EcsError::InvalidPoolCapacity {
                component: type_name::<T>(),
                capacity,
            });
        }
    }
    Ok(())
}
