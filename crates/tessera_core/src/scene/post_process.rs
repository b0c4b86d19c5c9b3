//! Post-process chain hooks.

use crate::ecs::{AsAny, RenderTarget};

/// A full-screen effect applied after every renderable has drawn.
pub trait PostProcess: AsAny + Send {
    /// Per-frame update, run at the end of every `simulate`.
    ///
    /// Runs even while the chain is disabled; only [`PostProcess::apply`]
    /// is gated.
    fn process(&mut self, _dt: f32) {}

    /// Called when the output size changes and once when added.
    fn resize_buffer(&mut self, _width: u32, _height: u32) {}

    /// Applies the effect to the drawn frame.
    fn apply(&mut self, target: &dyn RenderTarget);
}
