//! # Tessera Core
//!
//! Entity Component System runtime:
//! - Generational entity handles with safe index reuse
//! - Per-type component pools, growable or fixed-capacity
//! - Systems run in registration order
//! - Scenes that defer entity creation and destruction to frame boundaries
//! - A double-buffered message bus with one frame of latency
//!
//! ## Architecture Rules
//!
//! 1. **Handles, not pointers** - Cross-entity references are `Entity` values
//!    re-resolved on every use
//! 2. **Deferred structural change** - Systems never see an entity appear or
//!    vanish mid-frame
//! 3. **Order is the pipeline** - A system observes the output of every
//!    system registered before it
//!
//! ## Example
//!
//! ```rust,ignore
//! use tessera_core::{EngineConfig, MessageBus, Scene};
//!
//! let config = EngineConfig::default();
//! let mut bus = MessageBus::new(&config.message_bus);
//! let mut scene = Scene::new(bus.sender(), &config.scene)?;
//!
//! let entity = scene.create_entity();
//! scene.world_mut().add_component(entity, Transform::default())?;
//! scene.simulate(1.0 / 60.0);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;
pub mod error;
pub mod message;
pub mod scene;

pub use config::{EngineConfig, MessageBusConfig, SceneConfig};
pub use ecs::{
    Camera, Component, ComponentId, ComponentMask, Entity, PoolPolicy, RenderTarget, Renderable,
    System, SystemCore, Transform, World,
};
pub use error::{ConfigError, EcsError, EcsResult, MessageBusError};
pub use message::{Message, MessageBus, MessageSender};
pub use scene::{Director, PostProcess, Scene};
