//! # Entity Component System
//!
//! Generational entity handles, per-type component pools and ordered
//! systems.
//!
//! ## Design Philosophy
//!
//! - Entity handles are an index plus a generation; stale handles are
//!   detected, never dereferenced
//! - One pool per component type, addressed by entity index
//! - Systems match entities by component mask and keep their own lists
//! - Creation and destruction are deferred to the scene's flush

mod component;
mod components;
mod entity;
mod entity_manager;
mod mask;
mod pool;
mod renderable;
mod system;
mod world;

pub use component::{validate_policy, Component, ComponentId, ComponentRegistry, PoolPolicy, RegistryBuilder};
pub use components::{Camera, FloatRect, Transform};
pub use entity::{Entity, GENERATION_BITS, INDEX_BITS, MAX_INDEX};
pub use entity_manager::{EntityManager, SlotState};
pub use mask::{ComponentMask, MAX_COMPONENTS};
pub use pool::{ComponentManager, ComponentPool, Pool, PoolLimits, PoolStats};
pub use renderable::{RenderFlags, RenderTarget, Renderable};
pub use system::{AsAny, System, SystemCore, SystemManager, SystemReport};
pub use world::World;
