//! # Systems
//!
//! A system declares the components it requires and receives every live
//! entity whose mask covers them. The [`SystemManager`] keeps systems in
//! registration order; that order is the processing order and is how
//! pipeline dependencies are expressed.
//!
//! ## Lifecycle
//!
//! ```text
//!  SystemCore::new ─▶ require::<T>() ... ─▶ add_system ─▶ process / render
//!                     (builds pending list)  (mask fixed, live entities scanned)
//! ```

use std::any::{type_name, Any, TypeId};
use std::time::{Duration, Instant};

use rayon::prelude::*;

use super::component::{Component, ComponentId, ComponentRegistry};
use super::entity::Entity;
use super::mask::ComponentMask;
use super::renderable::Renderable;
use super::world::World;
use crate::error::EcsResult;
use crate::message::Message;

const NO_POSITION: u32 = u32::MAX;

type Requirement = fn(&ComponentRegistry) -> EcsResult<ComponentId>;

/// Upcast helper so boxed systems can be downcast to their concrete type.
pub trait AsAny: Any {
    /// Upcast to `&dyn Any`.
    fn as_any(&self) -> &dyn Any;
    /// Upcast to `&mut dyn Any`.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// State every system carries: requirements, mask and entity list.
///
/// # Example
///
/// ```rust,ignore
/// struct Movement {
///     core: SystemCore,
/// }
///
/// impl Movement {
///     fn new() -> Self {
///         Self {
///             core: SystemCore::new("movement")
///                 .with::<Transform>()
///                 .with::<Velocity>(),
///         }
///     }
/// }
/// ```
pub struct SystemCore {
    name: &'static str,
    requirements: Vec<Requirement>,
    mask: ComponentMask,
    entities: Vec<Entity>,
    /// Entity index to position in `entities`.
    positions: Vec<u32>,
    registered: bool,
    active: bool,
}

impl SystemCore {
    /// Creates an unregistered core with no requirements.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            requirements: Vec::new(),
            mask: ComponentMask::EMPTY,
            entities: Vec::new(),
            positions: Vec::new(),
            registered: false,
            active: true,
        }
    }

    /// Requires component `T`. Builder form of [`SystemCore::require`].
    #[must_use]
    pub fn with<T: Component>(mut self) -> Self {
        self.require::<T>();
        self
    }

    /// Requires component `T`.
    ///
    /// Only meaningful before the system is registered; later calls are
    /// ignored and logged.
    ///
    /// # Panics
    ///
    /// Debug builds panic if called after registration.
    pub fn require<T: Component>(&mut self) {
        debug_assert!(
            !self.registered,
            "require::<{}>() after registration",
            type_name::<T>()
        );
        if self.registered {
            tracing::error!(
                system = self.name,
                component = type_name::<T>(),
                "require called after registration; ignored"
            );
            return;
        }
        self.requirements.push(ComponentRegistry::id_of::<T>);
    }

    /// Resolves requirements into the mask. Called once by the manager.
    ///
    /// # Errors
    ///
    /// Fails if a required type cannot be registered.
    pub(crate) fn register(&mut self, registry: &ComponentRegistry) -> EcsResult<()> {
        for requirement in &self.requirements {
            self.mask.set(requirement(registry)?);
        }
        self.registered = true;
        Ok(())
    }

    /// Display name.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Required component mask. Empty until registered.
    #[inline]
    #[must_use]
    pub const fn mask(&self) -> ComponentMask {
        self.mask
    }

    /// True once added to a manager.
    #[inline]
    #[must_use]
    pub const fn is_registered(&self) -> bool {
        self.registered
    }

    /// True unless deactivated through the manager.
    #[inline]
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Entities currently matched, in arrival order until a removal swaps
    /// the last one into the gap.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Number of matched entities.
    #[inline]
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// True if `entity` (at its current generation) is in the list.
    #[inline]
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        match self.positions.get(entity.index() as usize) {
            Some(&pos) if pos != NO_POSITION => self.entities[pos as usize] == entity,
            _ => false,
        }
    }

    /// Appends an entity in O(1).
    ///
    /// # Returns
    ///
    /// `false` if it was already present.
    pub fn add_entity(&mut self, entity: Entity) -> bool {
        if self.contains(entity) {
            return false;
        }
        let idx = entity.index() as usize;
        if idx >= self.positions.len() {
            self.positions.resize(idx + 1, NO_POSITION);
        }
        #[allow(clippy::cast_possible_truncation)]
        let pos = self.entities.len() as u32;
        self.positions[idx] = pos;
        self.entities.push(entity);
        true
    }

    /// Removes an entity in O(1) by swapping the last entry into its place.
    ///
    /// # Returns
    ///
    /// `false` if it was not present.
    pub fn remove_entity(&mut self, entity: Entity) -> bool {
        if !self.contains(entity) {
            return false;
        }
        let idx = entity.index() as usize;
        let pos = self.positions[idx] as usize;
        self.entities.swap_remove(pos);
        self.positions[idx] = NO_POSITION;
        if let Some(&moved) = self.entities.get(pos) {
            #[allow(clippy::cast_possible_truncation)]
            let moved_pos = pos as u32;
            self.positions[moved.index() as usize] = moved_pos;
        }
        true
    }

    /// Runs a read-only closure over every matched entity in parallel.
    pub fn par_for_each<F>(&self, world: &World, f: F)
    where
        F: Fn(&World, Entity) + Sync + Send,
    {
        self.entities.par_iter().for_each(|&entity| f(world, entity));
    }
}

/// Behaviour run by the scene each frame.
///
/// Only [`System::core`] and [`System::core_mut`] are required.
pub trait System: AsAny + Send {
    /// Shared system state.
    fn core(&self) -> &SystemCore;

    /// Shared system state, mutably.
    fn core_mut(&mut self) -> &mut SystemCore;

    /// Per-frame update.
    fn process(&mut self, _world: &mut World, _dt: f32) {}

    /// Receives every message forwarded by the scene.
    fn handle_message(&mut self, _world: &mut World, _message: &Message) {}

    /// Called after an entity joins this system.
    fn on_entity_added(&mut self, _world: &mut World, _entity: Entity) {}

    /// Called after an entity leaves this system.
    fn on_entity_removed(&mut self, _world: &mut World, _entity: Entity) {}

    /// Drawing capability, for systems that render.
    fn as_renderable(&mut self) -> Option<&mut dyn Renderable> {
        None
    }
}

struct SystemEntry {
    type_id: TypeId,
    system: Box<dyn System>,
    last_process: Duration,
}

impl SystemEntry {
    fn downcast<S: System>(&self) -> Option<&S> {
        self.system.as_ref().as_any().downcast_ref::<S>()
    }

    fn downcast_mut<S: System>(&mut self) -> Option<&mut S> {
        self.system.as_mut().as_any_mut().downcast_mut::<S>()
    }
}

/// One row of [`SystemManager::report`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SystemReport {
    /// System name.
    pub name: &'static str,
    /// Entities matched.
    pub entity_count: usize,
    /// Whether it runs.
    pub active: bool,
    /// Duration of the last `process` call, zero unless timings are on.
    pub last_process: Duration,
}

/// Ordered registry of systems.
#[derive(Default)]
pub struct SystemManager {
    systems: Vec<SystemEntry>,
    record_timings: bool,
}

impl SystemManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new(record_timings: bool) -> Self {
        Self {
            systems: Vec::new(),
            record_timings,
        }
    }

    fn position_of<S: System>(&self) -> Option<usize> {
        let type_id = TypeId::of::<S>();
        self.systems.iter().position(|entry| entry.type_id == type_id)
    }

    /// Registers a system at the end of the processing order.
    ///
    /// If a system of the same type exists it is returned instead and
    /// `system` is dropped. A new system is immediately offered every
    /// live entity matching its requirements.
    ///
    /// # Errors
    ///
    /// Fails if a required component type cannot be registered.
    pub fn add_system<S: System>(&mut self, world: &mut World, mut system: S) -> EcsResult<&mut S> {
        let position = match self.position_of::<S>() {
            Some(position) => {
                tracing::warn!(system = type_name::<S>(), "system already registered");
                position
            }
            None => {
                system.core_mut().register(world.registry())?;
                let mask = system.core().mask();
                let late: Vec<Entity> = world
                    .entities()
                    .live_entities()
                    .filter(|&e| world.component_mask(e).is_some_and(|m| m.is_superset_of(mask)))
                    .collect();

                tracing::info!(
                    system = system.core().name(),
                    mask = ?mask,
                    existing = late.len(),
                    "system registered"
                );

                self.systems.push(SystemEntry {
                    type_id: TypeId::of::<S>(),
                    system: Box::new(system),
                    last_process: Duration::ZERO,
                });
                let position = self.systems.len() - 1;
                let system = &mut self.systems[position].system;
                for entity in late {
                    if system.core_mut().add_entity(entity) {
                        system.on_entity_added(world, entity);
                    }
                }
                position
            }
        };

        match self.systems[position].downcast_mut::<S>() {
            Some(system) => Ok(system),
            None => unreachable!("system stored under a foreign type id"),
        }
    }

    /// Unregisters a system.
    ///
    /// # Returns
    ///
    /// `true` if a system of that type was registered.
    pub fn remove_system<S: System>(&mut self) -> bool {
        match self.position_of::<S>() {
            Some(position) => {
                let entry = self.systems.remove(position);
                tracing::info!(system = entry.system.core().name(), "system removed");
                true
            }
            None => false,
        }
    }

    /// Enables or disables a system. Inactive systems keep their entity
    /// lists but neither process nor render.
    ///
    /// # Returns
    ///
    /// `false` if no system of that type is registered.
    pub fn set_system_active<S: System>(&mut self, active: bool) -> bool {
        match self.position_of::<S>() {
            Some(position) => {
                let core = self.systems[position].system.core_mut();
                core.active = active;
                tracing::debug!(system = core.name(), active, "system activation changed");
                true
            }
            None => false,
        }
    }

    /// The registered system of type `S`.
    #[must_use]
    pub fn system<S: System>(&self) -> Option<&S> {
        self.systems[self.position_of::<S>()?].downcast::<S>()
    }

    /// The registered system of type `S`, mutably.
    pub fn system_mut<S: System>(&mut self) -> Option<&mut S> {
        let position = self.position_of::<S>()?;
        self.systems[position].downcast_mut::<S>()
    }

    /// True if a system of type `S` is registered.
    #[must_use]
    pub fn has_system<S: System>(&self) -> bool {
        self.position_of::<S>().is_some()
    }

    /// Number of registered systems.
    #[must_use]
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    /// True if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// Offers an entity to every system whose mask it covers.
    pub fn add_to_systems(&mut self, world: &mut World, entity: Entity) {
        let Some(mask) = world.component_mask(entity) else {
            return;
        };
        for entry in &mut self.systems {
            let system = &mut entry.system;
            if mask.is_superset_of(system.core().mask()) && system.core_mut().add_entity(entity) {
                system.on_entity_added(world, entity);
            }
        }
    }

    /// Removes an entity from every system holding it.
    pub fn remove_from_systems(&mut self, world: &mut World, entity: Entity) {
        for entry in &mut self.systems {
            let system = &mut entry.system;
            if system.core_mut().remove_entity(entity) {
                system.on_entity_removed(world, entity);
            }
        }
    }

    /// Re-evaluates membership after an entity's mask changed.
    pub fn refresh(&mut self, world: &mut World, entity: Entity) {
        let Some(mask) = world.component_mask(entity) else {
            return;
        };
        for entry in &mut self.systems {
            let system = &mut entry.system;
            let wanted = mask.is_superset_of(system.core().mask());
            let present = system.core().contains(entity);
            if wanted && !present {
                system.core_mut().add_entity(entity);
                system.on_entity_added(world, entity);
            } else if !wanted && present {
                system.core_mut().remove_entity(entity);
                system.on_entity_removed(world, entity);
            }
        }
    }

    /// Tells every renderable that an entity is going away.
    pub fn flush_entity(&mut self, entity: Entity) {
        for entry in &mut self.systems {
            if let Some(renderable) = entry.system.as_renderable() {
                renderable.flush_entity(entity);
            }
        }
    }

    /// Runs every active system in registration order.
    pub fn process(&mut self, world: &mut World, dt: f32) {
        for entry in &mut self.systems {
            if !entry.system.core().is_active() {
                continue;
            }
            if self.record_timings {
                let start = Instant::now();
                entry.system.process(world, dt);
                entry.last_process = start.elapsed();
            } else {
                entry.system.process(world, dt);
            }
        }
    }

    /// Hands a message to every system, active or not.
    pub fn forward_message(&mut self, world: &mut World, message: &Message) {
        for entry in &mut self.systems {
            entry.system.handle_message(world, message);
        }
    }

    /// Renderable capabilities of active systems, in registration order.
    pub fn renderables_mut(&mut self) -> impl Iterator<Item = &mut dyn Renderable> + '_ {
        self.systems
            .iter_mut()
            .filter(|entry| entry.system.core().is_active())
            .filter_map(|entry| entry.system.as_renderable())
    }

    /// Turns per-system timing on or off.
    pub fn set_record_timings(&mut self, record: bool) {
        self.record_timings = record;
    }

    /// Name, load and state of every system in order.
    #[must_use]
    pub fn report(&self) -> Vec<SystemReport> {
        self.systems
            .iter()
            .map(|entry| {
                let core = entry.system.core();
                SystemReport {
                    name: core.name(),
                    entity_count: core.entity_count(),
                    active: core.is_active(),
                    last_process: entry.last_process,
                }
            })
            .collect()
    }
}
