//! # Error Types
//!
//! All recoverable errors raised by the ECS runtime, the message bus and
//! configuration loading.

use thiserror::Error;

use crate::ecs::Entity;

/// Errors raised by entity and component operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// The handle's generation no longer matches its slot, or the index was
    /// never allocated.
    #[error("stale or unknown entity handle {0}")]
    StaleEntity(Entity),

    /// The entity exists but does not carry the requested component.
    #[error("entity {entity} has no `{component}` component")]
    ComponentNotPresent {
        /// The entity that was queried.
        entity: Entity,
        /// Type name of the missing component.
        component: &'static str,
    },

    /// A component pool ran out of slots.
    #[error("component pool `{component}` exhausted (capacity {capacity})")]
    PoolExhausted {
        /// Type name of the component.
        component: &'static str,
        /// The pool's slot capacity.
        capacity: usize,
    },

    /// More distinct component types than a mask can represent.
    #[error("cannot register `{component}`: limit of {limit} component types reached")]
    TooManyComponents {
        /// Type name of the rejected component.
        component: &'static str,
        /// The component type limit.
        limit: usize,
    },

    /// Every entity index is in use.
    #[error("entity limit reached ({0} slots)")]
    EntityLimit(usize),

    /// A stable pool was declared with an unusable capacity.
    #[error("invalid pool capacity {capacity} for `{component}`")]
    InvalidPoolCapacity {
        /// Type name of the component.
        component: &'static str,
        /// The rejected capacity.
        capacity: usize,
    },
}

/// Result type for ECS operations.
pub type EcsResult<T> = Result<T, EcsError>;

/// Errors raised when posting to the message bus.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageBusError {
    /// The pending arena cannot hold the message; nothing was written.
    #[error("message bus overflow: message {id} needs {needed} bytes, {available} available")]
    Overflow {
        /// ID of the rejected message.
        id: i32,
        /// Bytes the message would occupy.
        needed: usize,
        /// Bytes left in the arena.
        available: usize,
    },

    /// Payload exceeds the per-message limit.
    #[error("message {id} payload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge {
        /// ID of the rejected message.
        id: i32,
        /// Payload size in bytes.
        size: usize,
        /// Maximum payload size.
        limit: usize,
    },

    /// The bus was disabled and accepts no more messages.
    #[error("message bus is disabled")]
    Disabled,
}

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid TOML for the expected schema.
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration could not be serialized.
    #[error("serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value is out of its allowed range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
