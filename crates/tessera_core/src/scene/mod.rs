//! # Scene
//!
//! Composition root: one [`World`], one [`SystemManager`], the directors
//! and post effects, and the cameras.
//!
//! ## Frame Order
//!
//! ```text
//! simulate(dt)
//!   1. directors process
//!   2. pending entities become Live and join systems
//!   3. Live entities whose components changed are re-matched
//!   4. destroyed entities leave systems, renderables, then storage
//!   5. active systems process, in registration order
//!   6. post effects process (enabled or not)
//!
//! render(target)
//!   renderables (active systems, registration order) then post effects,
//!   if enabled
//! ```

mod director;
mod post_process;

use std::any::type_name;

use crate::config::SceneConfig;
use crate::ecs::{
    Camera, ComponentManager, ComponentRegistry, Entity, RenderTarget, System, SystemManager,
    SystemReport, Transform, World,
};
use crate::error::{EcsError, EcsResult};
use crate::message::{Message, MessageSender, WindowEvent, WINDOW_MESSAGE};

pub use director::Director;
pub use post_process::PostProcess;

/// A self-contained simulation: entities, systems and cameras.
///
/// # Example
///
/// ```rust,ignore
/// let mut bus = MessageBus::new(&config.message_bus);
/// let mut scene = Scene::new(bus.sender(), &config.scene)?;
/// scene.add_system(Movement::new())?;
///
/// loop {
///     while !bus.empty() {
///         if let Some(message) = bus.poll() {
///             scene.forward_message(&message);
///         }
///     }
///     scene.simulate(dt);
///     scene.render(&target);
/// }
/// ```
pub struct Scene {
    world: World,
    systems: SystemManager,
    directors: Vec<Box<dyn Director>>,
    post_effects: Vec<Box<dyn PostProcess>>,
    post_enabled: bool,
    default_camera: Entity,
    active_camera: Entity,
    target_size: (u32, u32),
}

impl Scene {
    /// Creates a scene with its own component registry.
    ///
    /// # Errors
    ///
    /// Fails if the default camera's components cannot be stored.
    pub fn new(messages: MessageSender, config: &SceneConfig) -> EcsResult<Self> {
        Self::with_registry(ComponentRegistry::new(), messages, config)
    }

    /// Creates a scene around a pre-built registry.
    ///
    /// # Errors
    ///
    /// Fails if the default camera's components cannot be stored.
    pub fn with_registry(
        registry: ComponentRegistry,
        messages: MessageSender,
        config: &SceneConfig,
    ) -> EcsResult<Self> {
        let components = ComponentManager::with_registry(registry, config.pool_limits());
        let mut world = World::new(components, messages, config.min_free_ids);
        let [width, height] = config.target_size;

        let camera = world.create_entity();
        world.add_component(camera, Transform::default())?;
        world.add_component(camera, Camera::default())?.update_view(width, height);
        world.set_label(camera, "default camera");
        world.protect(camera);
        for entity in world.take_pending() {
            world.entities_mut().mark_live(entity);
        }

        tracing::debug!(%camera, width, height, "scene created");
        Ok(Self {
            world,
            systems: SystemManager::new(config.record_system_timings),
            directors: Vec::new(),
            post_effects: Vec::new(),
            post_enabled: false,
            default_camera: camera,
            active_camera: camera,
            target_size: (width, height),
        })
    }

    /// The entity world.
    #[inline]
    #[must_use]
    pub const fn world(&self) -> &World {
        &self.world
    }

    /// The entity world, mutably.
    #[inline]
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Creates an entity. It joins systems at the next `simulate`.
    pub fn create_entity(&mut self) -> Entity {
        self.world.create_entity()
    }

    /// Queues an entity for destruction at the next `simulate`.
    ///
    /// The default camera cannot be destroyed.
    ///
    /// # Returns
    ///
    /// `true` if the entity was newly queued.
    pub fn destroy_entity(&mut self, entity: Entity) -> bool {
        self.world.destroy_entity(entity)
    }

    /// Registers a system. See [`SystemManager::add_system`].
    ///
    /// # Errors
    ///
    /// Fails if a required component type cannot be registered.
    pub fn add_system<S: System>(&mut self, system: S) -> EcsResult<&mut S> {
        self.systems.add_system(&mut self.world, system)
    }

    /// The registered system of type `S`.
    #[must_use]
    pub fn system<S: System>(&self) -> Option<&S> {
        self.systems.system::<S>()
    }

    /// The registered system of type `S`, mutably.
    pub fn system_mut<S: System>(&mut self) -> Option<&mut S> {
        self.systems.system_mut::<S>()
    }

    /// True if a system of type `S` is registered.
    #[must_use]
    pub fn has_system<S: System>(&self) -> bool {
        self.systems.has_system::<S>()
    }

    /// Unregisters a system.
    pub fn remove_system<S: System>(&mut self) -> bool {
        self.systems.remove_system::<S>()
    }

    /// Enables or disables a system.
    pub fn set_system_active<S: System>(&mut self, active: bool) -> bool {
        self.systems.set_system_active::<S>(active)
    }

    /// Per-system load and state, in processing order.
    #[must_use]
    pub fn system_report(&self) -> Vec<SystemReport> {
        self.systems.report()
    }

    /// Adds a director, or returns the existing one of the same type.
    pub fn add_director<D: Director>(&mut self, director: D) -> &mut D {
        let position = if let Some(position) = self.director_position::<D>() {
            tracing::warn!(director = type_name::<D>(), "director already added");
            position
        } else {
            self.directors.push(Box::new(director));
            self.directors.len() - 1
        };
        match self.directors[position].as_mut().as_any_mut().downcast_mut::<D>() {
            Some(director) => director,
            None => unreachable!("director position points at a foreign type"),
        }
    }

    /// The director of type `D`.
    pub fn director_mut<D: Director>(&mut self) -> Option<&mut D> {
        let position = self.director_position::<D>()?;
        self.directors[position].as_mut().as_any_mut().downcast_mut::<D>()
    }

    fn director_position<D: Director>(&self) -> Option<usize> {
        self.directors
            .iter()
            .position(|d| d.as_ref().as_any().is::<D>())
    }

    /// Appends an effect to the post-process chain.
    ///
    /// The effect is immediately sized to the current target.
    pub fn add_post_process<P: PostProcess>(&mut self, effect: P) -> &mut P {
        let (width, height) = self.target_size;
        let mut effect = Box::new(effect);
        effect.resize_buffer(width, height);
        self.post_effects.push(effect);
        tracing::debug!(effect = type_name::<P>(), "post process added");

        let last = self.post_effects.len() - 1;
        match self.post_effects[last].as_mut().as_any_mut().downcast_mut::<P>() {
            Some(effect) => effect,
            None => unreachable!("post effect just pushed has a foreign type"),
        }
    }

    /// Turns applying the post-process chain on or off.
    pub fn set_post_enabled(&mut self, enabled: bool) {
        self.post_enabled = enabled;
    }

    /// True if post effects run.
    #[must_use]
    pub const fn post_enabled(&self) -> bool {
        self.post_enabled
    }

    /// The camera created with the scene.
    #[must_use]
    pub const fn default_camera(&self) -> Entity {
        self.default_camera
    }

    /// The camera renderables draw from.
    #[must_use]
    pub const fn active_camera(&self) -> Entity {
        self.active_camera
    }

    /// Makes `camera` the active camera.
    ///
    /// # Returns
    ///
    /// The previously active camera.
    ///
    /// # Errors
    ///
    /// [`EcsError::StaleEntity`] or [`EcsError::ComponentNotPresent`] if the
    /// entity lacks a `Transform` or a `Camera`.
    pub fn set_active_camera(&mut self, camera: Entity) -> EcsResult<Entity> {
        self.world.try_component::<Transform>(camera)?;
        self.world.try_component::<Camera>(camera)?;
        if self.world.entities().is_marked_destroyed(camera) {
            return Err(EcsError::StaleEntity(camera));
        }
        Ok(std::mem::replace(&mut self.active_camera, camera))
    }

    /// Size of the render target last reported by a resize message.
    #[must_use]
    pub const fn target_size(&self) -> (u32, u32) {
        self.target_size
    }

    /// Advances the scene by `dt` seconds.
    pub fn simulate(&mut self, dt: f32) {
        for director in &mut self.directors {
            director.process(&mut self.world, dt);
        }

        for entity in self.world.take_pending() {
            if self.world.entities_mut().mark_live(entity) {
                self.systems.add_to_systems(&mut self.world, entity);
            }
        }

        for entity in self.world.entities_mut().take_changed() {
            self.systems.refresh(&mut self.world, entity);
        }

        for entity in self.world.take_destroyed() {
            self.systems.remove_from_systems(&mut self.world, entity);
            self.systems.flush_entity(entity);
            if entity == self.active_camera {
                tracing::debug!(%entity, "active camera destroyed; reverting to default");
                self.active_camera = self.default_camera;
            }
            self.world.entities_mut().destroy_entity(entity);
        }

        self.systems.process(&mut self.world, dt);

        for effect in &mut self.post_effects {
            effect.process(dt);
        }
    }

    /// Draws every renderable system from the active camera.
    ///
    /// Renderables whose flags share nothing with the camera's are skipped.
    pub fn render(&mut self, target: &dyn RenderTarget) {
        let camera = self.active_camera;
        let camera_flags = self
            .world
            .component::<Camera>(camera)
            .map(|c| c.render_flags)
            .unwrap_or_default();

        for renderable in self.systems.renderables_mut() {
            if !renderable.render_flags().intersects(camera_flags) {
                continue;
            }
            renderable.update_draw_list(&self.world, camera);
            renderable.render(&self.world, camera, target);
        }

        if self.post_enabled {
            for effect in &mut self.post_effects {
                effect.apply(target);
            }
        }
    }

    /// Routes a bus message to the scene, its systems and its directors.
    ///
    /// Window resizes update the default camera's viewport and the post
    /// effect buffers.
    pub fn forward_message(&mut self, message: &Message) {
        let resized = (message.id == WINDOW_MESSAGE)
            .then(|| message.data::<WindowEvent>())
            .flatten()
            .filter(|event| event.event == WindowEvent::RESIZED);

        if let Some(event) = resized {
            self.target_size = (event.width, event.height);
            if let Some(camera) = self.world.component_mut::<Camera>(self.default_camera) {
                camera.update_view(event.width, event.height);
            }
        }

        self.systems.forward_message(&mut self.world, message);
        for director in &mut self.directors {
            director.handle_message(&mut self.world, message);
        }

        if let Some(event) = resized {
            for effect in &mut self.post_effects {
                effect.resize_buffer(event.width, event.height);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{Component, RenderFlags, Renderable, SystemCore};
    use crate::message::MessageBus;

    struct Tag;
    impl Component for Tag {}

    struct Tagged {
        core: SystemCore,
    }

    impl Tagged {
        fn new() -> Self {
            Self {
                core: SystemCore::new("tagged").with::<Tag>(),
            }
        }
    }

    impl System for Tagged {
        fn core(&self) -> &SystemCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut SystemCore {
            &mut self.core
        }
    }

    struct Painter {
        core: SystemCore,
        flags: RenderFlags,
        draws: Vec<Entity>,
        flushed: Vec<Entity>,
    }

    impl System for Painter {
        fn core(&self) -> &SystemCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut SystemCore {
            &mut self.core
        }

        fn as_renderable(&mut self) -> Option<&mut dyn Renderable> {
            Some(self)
        }
    }

    impl Renderable for Painter {
        fn update_draw_list(&mut self, _world: &World, _camera: Entity) {}

        fn render(&mut self, _world: &World, camera: Entity, _target: &dyn RenderTarget) {
            self.draws.push(camera);
        }

        fn flush_entity(&mut self, entity: Entity) {
            self.flushed.push(entity);
        }

        fn render_flags(&self) -> RenderFlags {
            self.flags
        }
    }

    struct Screen;
    impl RenderTarget for Screen {
        fn size(&self) -> (u32, u32) {
            (640, 360)
        }
    }

    #[derive(Default)]
    struct Bloom {
        size: (u32, u32),
        applied: usize,
        processed: usize,
    }

    impl PostProcess for Bloom {
        fn process(&mut self, _dt: f32) {
            self.processed += 1;
        }

        fn resize_buffer(&mut self, width: u32, height: u32) {
            self.size = (width, height);
        }

        fn apply(&mut self, _target: &dyn RenderTarget) {
            self.applied += 1;
        }
    }

    #[derive(Default)]
    struct Spawner {
        spawned: Vec<Entity>,
        messages: usize,
    }

    impl Director for Spawner {
        fn process(&mut self, world: &mut World, _dt: f32) {
            let e = world.create_entity();
            if world.add_component(e, Tag).is_ok() {
                self.spawned.push(e);
            }
        }

        fn handle_message(&mut self, _world: &mut World, _message: &Message) {
            self.messages += 1;
        }
    }

    fn scene(bus: &MessageBus) -> Scene {
        Scene::new(bus.sender(), &SceneConfig::default()).unwrap()
    }

    fn painter(flags: RenderFlags) -> Painter {
        Painter {
            core: SystemCore::new("painter"),
            flags,
            draws: Vec::new(),
            flushed: Vec::new(),
        }
    }

    #[test]
    fn test_default_camera_is_live() {
        let bus = MessageBus::with_capacity(1024);
        let scene = scene(&bus);
        let camera = scene.default_camera();
        assert_eq!(scene.active_camera(), camera);
        assert!(scene.world().has_component::<Camera>(camera));
        assert!(scene.world().has_component::<Transform>(camera));
        assert_eq!(scene.world().entities().label(camera), Some("default camera"));
        assert!(scene.world().pending().is_empty());
    }

    #[test]
    fn test_entities_join_at_simulate() {
        let bus = MessageBus::with_capacity(1024);
        let mut scene = scene(&bus);
        scene.add_system(Tagged::new()).unwrap();

        let e = scene.create_entity();
        scene.world_mut().add_component(e, Tag).unwrap();
        assert_eq!(scene.system::<Tagged>().unwrap().core().entity_count(), 0);

        scene.simulate(0.016);
        assert_eq!(scene.system::<Tagged>().unwrap().core().entities(), &[e]);

        // Removing a component takes effect at the next boundary.
        scene.world_mut().remove_component::<Tag>(e);
        assert_eq!(scene.system::<Tagged>().unwrap().core().entity_count(), 1);
        scene.simulate(0.016);
        assert_eq!(scene.system::<Tagged>().unwrap().core().entity_count(), 0);
    }

    #[test]
    fn test_default_camera_cannot_be_destroyed() {
        let bus = MessageBus::with_capacity(1024);
        let mut scene = scene(&bus);
        let camera = scene.default_camera();
        assert!(!scene.destroy_entity(camera));
        assert!(!scene.world_mut().destroy_entity(camera));
        scene.simulate(0.0);
        assert!(scene.world().is_valid(camera));
        assert_eq!(scene.active_camera(), camera);
    }

    #[test]
    fn test_active_camera() {
        let bus = MessageBus::with_capacity(1024);
        let mut scene = scene(&bus);
        let plain = scene.create_entity();
        assert!(matches!(
            scene.set_active_camera(plain),
            Err(EcsError::ComponentNotPresent { .. })
        ));

        let camera = scene.create_entity();
        scene.world_mut().add_component(camera, Transform::default()).unwrap();
        scene.world_mut().add_component(camera, Camera::default()).unwrap();
        let previous = scene.set_active_camera(camera).unwrap();
        assert_eq!(previous, scene.default_camera());
        assert_eq!(scene.active_camera(), camera);

        scene.destroy_entity(camera);
        scene.simulate(0.0);
        assert_eq!(scene.active_camera(), scene.default_camera());
    }

    #[test]
    fn test_render_calls_renderables_with_matching_flags() {
        let bus = MessageBus::with_capacity(1024);
        let mut scene = scene(&bus);
        scene.add_system(painter(RenderFlags::ALL)).unwrap();

        scene.render(&Screen);
        assert_eq!(scene.system::<Painter>().unwrap().draws, vec![scene.default_camera()]);

        let camera = scene.default_camera();
        scene.world_mut().component_mut::<Camera>(camera).unwrap().render_flags =
            !RenderFlags::REFLECTION_PLANE;
        scene.system_mut::<Painter>().unwrap().flags = RenderFlags::REFLECTION_PLANE;
        scene.render(&Screen);
        assert_eq!(scene.system::<Painter>().unwrap().draws.len(), 1);

        scene.system_mut::<Painter>().unwrap().flags = RenderFlags::ALL;
        scene.set_system_active::<Painter>(false);
        scene.render(&Screen);
        assert_eq!(scene.system::<Painter>().unwrap().draws.len(), 1);
    }

    #[test]
    fn test_destroyed_entities_flushed_from_renderables() {
        let bus = MessageBus::with_capacity(1024);
        let mut scene = scene(&bus);
        scene.add_system(painter(RenderFlags::ALL)).unwrap();
        let e = scene.create_entity();
        scene.simulate(0.0);
        scene.destroy_entity(e);
        scene.simulate(0.0);
        assert_eq!(scene.system::<Painter>().unwrap().flushed, vec![e]);
        assert!(!scene.world().is_valid(e));
    }

    #[test]
    fn test_resize_message() {
        let mut bus = MessageBus::with_capacity(1024);
        let mut scene = scene(&bus);
        scene.add_post_process(Bloom::default());
        scene.add_director(Spawner::default());
        assert_eq!(scene.post_effects_size(), (1280, 720));

        bus.post(WINDOW_MESSAGE, &WindowEvent::resized(1600, 1200)).unwrap();
        while !bus.empty() {
            if let Some(message) = bus.poll() {
                scene.forward_message(&message);
            }
        }

        assert_eq!(scene.target_size(), (1600, 1200));
        assert_eq!(scene.post_effects_size(), (1600, 1200));
        let camera = scene.world().component::<Camera>(scene.default_camera()).unwrap();
        assert!((camera.viewport.height - 0.75).abs() < 1e-5);
        assert_eq!(scene.director_mut::<Spawner>().unwrap().messages, 1);
    }

    #[test]
    fn test_director_entities_visible_same_frame() {
        let bus = MessageBus::with_capacity(1024);
        let mut scene = scene(&bus);
        scene.add_system(Tagged::new()).unwrap();
        scene.add_director(Spawner::default());

        scene.simulate(0.0);
        let spawned = scene.director_mut::<Spawner>().unwrap().spawned.clone();
        assert_eq!(spawned.len(), 1);
        assert_eq!(scene.system::<Tagged>().unwrap().core().entities(), spawned.as_slice());
    }

    #[test]
    fn test_post_chain_applies_only_when_enabled() {
        let bus = MessageBus::with_capacity(1024);
        let mut scene = scene(&bus);
        scene.add_post_process(Bloom::default());

        scene.simulate(0.0);
        scene.render(&Screen);
        assert_eq!(scene.bloom().applied, 0);
        assert_eq!(scene.bloom().processed, 1);

        scene.set_post_enabled(true);
        scene.simulate(0.0);
        scene.render(&Screen);
        assert_eq!(scene.bloom().applied, 1);
        assert_eq!(scene.bloom().processed, 2);
    }

    impl Scene {
        fn bloom(&self) -> &Bloom {
            self.post_effects[0].as_ref().as_any().downcast_ref::<Bloom>().unwrap()
        }

        fn post_effects_size(&self) -> (u32, u32) {
            self.bloom().size
        }
    }
}
