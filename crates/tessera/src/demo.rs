//! Sample components, systems and directors for the headless run.

use tessera_core::ecs::{RenderTarget, Renderable, System, SystemCore, World};
use tessera_core::message::{SceneEvent, SCENE_MESSAGE};
use tessera_core::{Component, Director, Entity, Message, Transform};

/// Units per second.
#[derive(Clone, Copy, Debug, Default)]
pub struct Velocity(pub [f32; 3]);

impl Component for Velocity {}

/// Seconds left before the entity is destroyed.
#[derive(Clone, Copy, Debug)]
pub struct Lifetime(pub f32);

impl Component for Lifetime {}

/// Integrates velocity into position.
pub struct MovementSystem {
    core: SystemCore,
}

impl MovementSystem {
    /// Requires `Transform` and `Velocity`.
    pub fn new() -> Self {
        Self {
            core: SystemCore::new("movement")
                .with::<Transform>()
                .with::<Velocity>(),
        }
    }
}

impl System for MovementSystem {
    fn core(&self) -> &SystemCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SystemCore {
        &mut self.core
    }

    fn process(&mut self, world: &mut World, dt: f32) {
        for &entity in self.core.entities() {
            let Some(Velocity(velocity)) = world.component::<Velocity>(entity).copied() else {
                continue;
            };
            if let Some(transform) = world.component_mut::<Transform>(entity) {
                for (axis, value) in transform.position.iter_mut().enumerate() {
                    *value += velocity[axis] * dt;
                }
            }
        }
    }
}

/// Counts lifetimes down and destroys expired entities.
pub struct LifetimeSystem {
    core: SystemCore,
}

impl LifetimeSystem {
    /// Requires `Lifetime`.
    pub fn new() -> Self {
        Self {
            core: SystemCore::new("lifetime").with::<Lifetime>(),
        }
    }
}

impl System for LifetimeSystem {
    fn core(&self) -> &SystemCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SystemCore {
        &mut self.core
    }

    fn process(&mut self, world: &mut World, dt: f32) {
        world.par_for_each_mut::<Lifetime, _>(&self.core, |_, lifetime| lifetime.0 -= dt);

        let expired: Vec<Entity> = self
            .core
            .entities()
            .iter()
            .copied()
            .filter(|&e| world.component::<Lifetime>(e).is_some_and(|l| l.0 <= 0.0))
            .collect();
        for entity in expired {
            world.destroy_entity(entity);
        }
    }
}

/// Logs what the camera would draw.
pub struct ConsoleRenderer {
    core: SystemCore,
    visible: Vec<Entity>,
    frames: u64,
}

impl ConsoleRenderer {
    /// Requires `Transform`.
    pub fn new() -> Self {
        Self {
            core: SystemCore::new("console_renderer").with::<Transform>(),
            visible: Vec::new(),
            frames: 0,
        }
    }
}

impl System for ConsoleRenderer {
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

impl Renderable for ConsoleRenderer {
    fn update_draw_list(&mut self, _world: &World, camera: Entity) {
        self.visible.clear();
        self.visible
            .extend(self.core.entities().iter().copied().filter(|&e| e != camera));
    }

    fn render(&mut self, world: &World, camera: Entity, target: &dyn RenderTarget) {
        self.frames += 1;
        if self.frames % 60 != 0 {
            return;
        }
        let furthest = self
            .visible
            .iter()
            .filter_map(|&e| Transform::world_position(world, e))
            .map(|p| p[0].hypot(p[1]))
            .fold(0.0_f32, f32::max);
        tracing::info!(
            %camera,
            visible = self.visible.len(),
            furthest,
            target = ?target.size(),
            "frame drawn"
        );
    }

    fn flush_entity(&mut self, entity: Entity) {
        self.visible.retain(|&e| e != entity);
    }
}

/// Spawns a short-lived ring of movers every `interval` frames.
pub struct SpawnDirector {
    interval: u32,
    batch: u32,
    frame: u32,
    spawned: u64,
    destroyed: u64,
}

impl SpawnDirector {
    /// Creates a director spawning `batch` entities every `interval` frames.
    pub fn new(interval: u32, batch: u32) -> Self {
        Self {
            interval: interval.max(1),
            batch,
            frame: 0,
            spawned: 0,
            destroyed: 0,
        }
    }

    /// Entities spawned so far.
    pub fn spawned(&self) -> u64 {
        self.spawned
    }

    /// Destruction notifications received so far.
    pub fn destroyed(&self) -> u64 {
        self.destroyed
    }

    fn spawn_one(world: &mut World, angle: f32) -> tessera_core::EcsResult<()> {
        let entity = world.create_entity();
        world.add_component(entity, Transform::default())?;
        world.add_component(entity, Velocity([angle.cos(), angle.sin(), 0.0]))?;
        world.add_component(entity, Lifetime(2.0))?;
        Ok(())
    }
}

impl Director for SpawnDirector {
    fn process(&mut self, world: &mut World, _dt: f32) {
        self.frame += 1;
        if self.frame % self.interval != 0 {
            return;
        }
        for i in 0..self.batch {
            #[allow(clippy::cast_precision_loss)]
            let angle = std::f32::consts::TAU * i as f32 / self.batch as f32;
            match Self::spawn_one(world, angle) {
                Ok(()) => self.spawned += 1,
                Err(err) => {
                    tracing::error!(error = %err, "spawn failed");
                    return;
                }
            }
        }
    }

    fn handle_message(&mut self, _world: &mut World, message: &Message) {
        if message.id != SCENE_MESSAGE {
            return;
        }
        if let Some(event) = message.data::<SceneEvent>() {
            if event.event == SceneEvent::ENTITY_DESTROYED {
                self.destroyed += 1;
            }
        }
    }
}

/// Render target with a size and nothing else.
pub struct HeadlessTarget {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl RenderTarget for HeadlessTarget {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
