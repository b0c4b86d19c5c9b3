//! Scene-level controllers.

use crate::ecs::{AsAny, World};
use crate::message::Message;

/// Drives entities and events from outside any system.
///
/// Directors run at the start of every [`Scene::simulate`] call, before
/// pending entities are flushed, so anything they create is visible to
/// systems in the same frame.
///
/// [`Scene::simulate`]: super::Scene::simulate
pub trait Director: AsAny + Send {
    /// Per-frame update.
    fn process(&mut self, _world: &mut World, _dt: f32) {}

    /// Receives every message forwarded by the scene, after systems.
    fn handle_message(&mut self, _world: &mut World, _message: &Message) {}
}
