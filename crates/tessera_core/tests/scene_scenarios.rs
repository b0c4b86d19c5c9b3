//! # Scene Scenarios
//!
//! End-to-end checks of the frame contract:
//!
//! 1. **Membership**: systems see exactly the matching live entities, and
//!    only after a `simulate` boundary
//! 2. **Ordering**: registration order is processing order
//! 3. **Handles**: destroyed handles stay dead after their index is reused
//! 4. **Messages**: one frame of latency, overflow is reported
//! 5. **Systems mutating the world**: destroys and spawns from `process`
//!    wait for the next boundary, and the default camera survives them
//!
//! Run with: cargo test --test scene_scenarios

#![allow(missing_docs)]

use tessera_core::ecs::{PoolPolicy, SystemCore, World};
use tessera_core::message::{SceneEvent, SCENE_MESSAGE, USER_MESSAGE_START};
use tessera_core::{
    Camera, Component, EcsError, Entity, Message, MessageBus, MessageBusError, Scene, SceneConfig, System,
    Transform,
};

// ============================================================================
// FIXTURES
// ============================================================================

/// Marker the counting system requires. The default camera never has it.
#[derive(Default)]
struct Body;

impl Component for Body {}

struct Counted {
    core: SystemCore,
}

impl Counted {
    fn new() -> Self {
        Self {
            core: SystemCore::new("counted").with::<Body>(),
        }
    }
}

impl System for Counted {
    fn core(&self) -> &SystemCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SystemCore {
        &mut self.core
    }
}

/// Written by `Producer`, read by `Consumer`.
#[derive(Default)]
struct Signal {
    produced: u32,
    consumed_seen: u32,
}

impl Component for Signal {}

struct Producer {
    core: SystemCore,
}

impl System for Producer {
    fn core(&self) -> &SystemCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SystemCore {
        &mut self.core
    }

    fn process(&mut self, world: &mut World, _dt: f32) {
        for &entity in self.core.entities() {
            if let Some(signal) = world.component_mut::<Signal>(entity) {
                signal.produced += 1;
            }
        }
    }
}

struct Consumer {
    core: SystemCore,
}

impl System for Consumer {
    fn core(&self) -> &SystemCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SystemCore {
        &mut self.core
    }

    fn process(&mut self, world: &mut World, _dt: f32) {
        for &entity in self.core.entities() {
            if let Some(signal) = world.component_mut::<Signal>(entity) {
                signal.consumed_seen = signal.produced;
            }
        }
    }
}

fn producer() -> Producer {
    Producer {
        core: SystemCore::new("producer").with::<Signal>(),
    }
}

fn consumer() -> Consumer {
    Consumer {
        core: SystemCore::new("consumer").with::<Signal>(),
    }
}

fn scene(bus: &MessageBus) -> Scene {
    let config = SceneConfig {
        min_free_ids: 0,
        ..SceneConfig::default()
    };
    Scene::new(bus.sender(), &config).unwrap()
}

fn drain(bus: &mut MessageBus, scene: &mut Scene) -> Vec<Message> {
    let mut seen = Vec::new();
    while !bus.empty() {
        if let Some(message) = bus.poll() {
            scene.forward_message(&message);
            seen.push(message);
        }
    }
    seen
}

fn counted(scene: &Scene) -> usize {
    scene.system::<Counted>().unwrap().core().entity_count()
}

// ============================================================================
// MEMBERSHIP
// ============================================================================

#[test]
fn three_entities_then_destroy_one() {
    let bus = MessageBus::with_capacity(4096);
    let mut scene = scene(&bus);

    let entities: Vec<Entity> = (0..3)
        .map(|_| {
            let e = scene.create_entity();
            scene.world_mut().add_component(e, Body).unwrap();
            e
        })
        .collect();
    scene.add_system(Counted::new()).unwrap();

    scene.simulate(0.016);
    assert_eq!(counted(&scene), 3);

    assert!(scene.destroy_entity(entities[1]));
    // Still present until the next boundary.
    assert_eq!(counted(&scene), 3);
    assert!(scene.world().is_valid(entities[1]));

    scene.simulate(0.016);
    assert_eq!(counted(&scene), 2);
    assert!(!scene.world().is_valid(entities[1]));
    assert!(scene.world().component::<Body>(entities[1]).is_none());
    assert!(scene.world().is_valid(entities[0]));
    assert!(scene.world().is_valid(entities[2]));
}

#[test]
fn system_added_after_entities_went_live_still_sees_them() {
    let bus = MessageBus::with_capacity(4096);
    let mut scene = scene(&bus);
    for _ in 0..4 {
        let e = scene.create_entity();
        scene.world_mut().add_component(e, Body).unwrap();
    }
    scene.simulate(0.016);

    scene.add_system(Counted::new()).unwrap();
    assert_eq!(counted(&scene), 4);
}

#[test]
fn membership_changes_only_at_boundaries() {
    let bus = MessageBus::with_capacity(4096);
    let mut scene = scene(&bus);
    scene.add_system(Counted::new()).unwrap();

    let e = scene.create_entity();
    scene.simulate(0.016);
    assert_eq!(counted(&scene), 0);

    scene.world_mut().add_component(e, Body).unwrap();
    assert_eq!(counted(&scene), 0);
    scene.simulate(0.016);
    assert_eq!(counted(&scene), 1);

    scene.world_mut().remove_component::<Body>(e);
    scene.world_mut().add_component(e, Body).unwrap();
    scene.simulate(0.016);
    assert_eq!(counted(&scene), 1);
}

#[test]
fn created_and_destroyed_in_same_frame_never_joins() {
    let bus = MessageBus::with_capacity(4096);
    let mut scene = scene(&bus);
    scene.add_system(Counted::new()).unwrap();

    let e = scene.create_entity();
    scene.world_mut().add_component(e, Body).unwrap();
    scene.destroy_entity(e);
    scene.simulate(0.016);

    assert_eq!(counted(&scene), 0);
    assert!(!scene.world().is_valid(e));
}

// ============================================================================
// ORDERING
// ============================================================================

#[test]
fn producer_before_consumer_sees_this_frames_output() {
    let bus = MessageBus::with_capacity(4096);
    let mut scene = scene(&bus);
    scene.add_system(producer()).unwrap();
    scene.add_system(consumer()).unwrap();
    let e = scene.create_entity();
    scene.world_mut().add_component(e, Signal::default()).unwrap();

    scene.simulate(0.016);
    let signal = scene.world().component::<Signal>(e).unwrap();
    assert_eq!(signal.produced, 1);
    assert_eq!(signal.consumed_seen, 1);
}

#[test]
fn consumer_before_producer_lags_one_frame() {
    let bus = MessageBus::with_capacity(4096);
    let mut scene = scene(&bus);
    scene.add_system(consumer()).unwrap();
    scene.add_system(producer()).unwrap();
    let e = scene.create_entity();
    scene.world_mut().add_component(e, Signal::default()).unwrap();

    scene.simulate(0.016);
    let signal = scene.world().component::<Signal>(e).unwrap();
    assert_eq!(signal.produced, 1);
    assert_eq!(signal.consumed_seen, 0);
}

// ============================================================================
// HANDLES
// ============================================================================

#[test]
fn validity_tracks_create_and_destroy() {
    let bus = MessageBus::with_capacity(64 * 1024);
    let mut scene = scene(&bus);
    let mut live: Vec<Entity> = Vec::new();
    let mut dead: Vec<Entity> = Vec::new();

    for round in 0..20u32 {
        for _ in 0..5 {
            live.push(scene.create_entity());
        }
        // Destroy a spread of live entities, shifting each round.
        let mut i = (round as usize) % 3;
        while i < live.len() {
            let e = live.remove(i);
            scene.destroy_entity(e);
            dead.push(e);
            i += 2;
        }
        scene.simulate(0.016);

        for &e in &live {
            assert!(scene.world().is_valid(e), "live handle {e} reported dead");
        }
        for &e in &dead {
            assert!(!scene.world().is_valid(e), "dead handle {e} reported live");
        }
    }
}

#[test]
fn recycled_index_gets_newer_generation() {
    let bus = MessageBus::with_capacity(4096);
    let mut scene = scene(&bus);
    let old = scene.create_entity();
    scene.destroy_entity(old);
    scene.simulate(0.016);

    let new = scene.create_entity();
    assert_eq!(new.index(), old.index());
    assert!(new.generation() > old.generation());
    assert!(scene.world().is_valid(new));
    assert!(!scene.world().is_valid(old));

    let err = scene
        .world_mut()
        .add_component(old, Transform::default())
        .unwrap_err();
    assert_eq!(err, EcsError::StaleEntity(old));
}

#[test]
fn stable_pool_overflow_is_an_error() {
    struct Slot(u64);
    impl Component for Slot {
        const POLICY: PoolPolicy = PoolPolicy::Stable { capacity: 3 };
    }

    let bus = MessageBus::with_capacity(4096);
    let mut scene = scene(&bus);
    let entities: Vec<Entity> = (0..4).map(|_| scene.create_entity()).collect();
    for (i, &e) in entities.iter().take(3).enumerate() {
        scene.world_mut().add_component(e, Slot(i as u64)).unwrap();
    }

    let err = scene.world_mut().add_component(entities[3], Slot(99));
    assert!(matches!(err, Err(EcsError::PoolExhausted { capacity: 3, .. })));
    assert!(!scene.world().has_component::<Slot>(entities[3]));
    for (i, &e) in entities.iter().take(3).enumerate() {
        assert_eq!(scene.world().component::<Slot>(e).unwrap().0, i as u64);
    }
}

// ============================================================================
// SYSTEMS MUTATING THE WORLD
// ============================================================================

/// On its first frame, destroys the first entity it sees and spawns a
/// replacement.
struct Reaper {
    core: SystemCore,
    victim: Option<Entity>,
    spawned: Option<Entity>,
    count_after_spawn: usize,
}

impl System for Reaper {
    fn core(&self) -> &SystemCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SystemCore {
        &mut self.core
    }

    fn process(&mut self, world: &mut World, _dt: f32) {
        if self.victim.is_some() {
            return;
        }
        let Some(&victim) = self.core.entities().first() else {
            return;
        };
        assert!(world.destroy_entity(victim));
        let spawned = world.create_entity();
        world.add_component(spawned, Body).unwrap();

        self.victim = Some(victim);
        self.spawned = Some(spawned);
        self.count_after_spawn = self.core.entity_count();
    }
}

/// Tries to destroy `target` every frame.
struct CameraBreaker {
    core: SystemCore,
    target: Entity,
    refusals: u32,
}

impl System for CameraBreaker {
    fn core(&self) -> &SystemCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SystemCore {
        &mut self.core
    }

    fn process(&mut self, world: &mut World, _dt: f32) {
        if !world.destroy_entity(self.target) {
            self.refusals += 1;
        }
    }
}

#[test]
fn destroy_and_spawn_inside_process_wait_for_next_simulate() {
    let bus = MessageBus::with_capacity(4096);
    let mut scene = scene(&bus);
    for _ in 0..3 {
        let e = scene.create_entity();
        scene.world_mut().add_component(e, Body).unwrap();
    }
    scene
        .add_system(Reaper {
            core: SystemCore::new("reaper").with::<Body>(),
            victim: None,
            spawned: None,
            count_after_spawn: 0,
        })
        .unwrap();

    scene.simulate(0.016);
    let reaper = scene.system::<Reaper>().unwrap();
    let victim = reaper.victim.unwrap();
    let spawned = reaper.spawned.unwrap();
    assert_eq!(reaper.count_after_spawn, 3);
    // Membership is untouched until the next boundary.
    assert_eq!(reaper.core().entity_count(), 3);
    assert!(reaper.core().contains(victim));
    assert!(!reaper.core().contains(spawned));
    assert!(scene.world().is_valid(victim));
    assert_eq!(scene.world().pool::<Body>().unwrap().len(), 4);

    scene.simulate(0.016);
    let reaper = scene.system::<Reaper>().unwrap();
    assert_eq!(reaper.core().entity_count(), 3);
    assert!(!reaper.core().contains(victim));
    assert!(reaper.core().contains(spawned));
    assert!(!scene.world().is_valid(victim));
    assert!(scene.world().component::<Body>(victim).is_none());
    assert_eq!(scene.world().pool::<Body>().unwrap().len(), 3);
}

#[test]
fn recycled_index_never_leaves_a_stale_handle_in_a_system() {
    let bus = MessageBus::with_capacity(4096);
    let mut scene = scene(&bus);
    for _ in 0..3 {
        let e = scene.create_entity();
        scene.world_mut().add_component(e, Body).unwrap();
    }
    scene
        .add_system(Reaper {
            core: SystemCore::new("reaper").with::<Body>(),
            victim: None,
            spawned: None,
            count_after_spawn: 0,
        })
        .unwrap();
    scene.simulate(0.016);
    scene.simulate(0.016);
    let victim = scene.system::<Reaper>().unwrap().victim.unwrap();

    // No free ids are held back, so the victim's index comes straight back.
    let reused = scene.create_entity();
    scene.world_mut().add_component(reused, Body).unwrap();
    assert_eq!(reused.index(), victim.index());
    scene.simulate(0.016);

    let core = scene.system::<Reaper>().unwrap().core();
    assert_eq!(core.entity_count(), 4);
    assert!(!core.contains(victim));
    assert!(core.contains(reused));
    for &e in core.entities() {
        assert!(scene.world().is_valid(e), "stale handle {e} left in system");
    }
}

#[test]
fn system_cannot_destroy_the_default_camera() {
    let bus = MessageBus::with_capacity(4096);
    let mut scene = scene(&bus);
    let camera = scene.default_camera();
    scene
        .add_system(CameraBreaker {
            core: SystemCore::new("camera breaker"),
            target: camera,
            refusals: 0,
        })
        .unwrap();

    scene.simulate(0.016);
    scene.simulate(0.016);

    assert_eq!(scene.system::<CameraBreaker>().unwrap().refusals, 2);
    assert!(scene.world().is_valid(camera));
    assert!(!scene.world().entities().is_marked_destroyed(camera));
    assert_eq!(scene.active_camera(), camera);
    assert!(scene.world().has_component::<Transform>(camera));
    assert!(scene.world().has_component::<Camera>(camera));
}

// ============================================================================
// MESSAGES
// ============================================================================

#[test]
fn message_posted_in_frame_n_is_read_in_frame_n_plus_1() {
    let mut bus = MessageBus::with_capacity(4096);
    let mut scene = scene(&bus);

    // Frame 1: nothing queued yet, then a system-side post.
    assert!(drain(&mut bus, &mut scene).is_empty());
    scene.world().post_message(USER_MESSAGE_START, &42u32).unwrap();
    scene.simulate(0.016);
    assert!(bus.poll().is_none());

    // Frame 2: the message arrives.
    let frame2 = drain(&mut bus, &mut scene);
    assert_eq!(frame2.len(), 1);
    assert_eq!(frame2[0].data::<u32>(), Some(42));

    // Frame 3: nothing left.
    assert!(drain(&mut bus, &mut scene).is_empty());
}

#[test]
fn destruction_is_announced_next_frame() {
    let mut bus = MessageBus::with_capacity(4096);
    let mut scene = scene(&bus);
    let e = scene.create_entity();
    drain(&mut bus, &mut scene);
    scene.simulate(0.016);

    scene.destroy_entity(e);
    drain(&mut bus, &mut scene);
    scene.simulate(0.016);

    let events: Vec<SceneEvent> = drain(&mut bus, &mut scene)
        .iter()
        .filter(|m| m.id == SCENE_MESSAGE)
        .filter_map(Message::data::<SceneEvent>)
        .collect();
    assert_eq!(
        events,
        vec![SceneEvent {
            entity_id: e.index(),
            event: SceneEvent::ENTITY_DESTROYED,
        }]
    );
}

#[test]
fn overflow_is_detectable() {
    let mut bus = MessageBus::with_capacity(160);
    let mut scene = scene(&bus);
    let mut accepted = 0;
    let mut rejected = 0;
    for i in 0..20u32 {
        match scene.world().post_message(USER_MESSAGE_START, &i) {
            Ok(()) => accepted += 1,
            Err(MessageBusError::Overflow { .. }) => rejected += 1,
            Err(other) => panic!("unexpected error {other}"),
        }
    }

    assert_eq!(accepted, 10);
    assert_eq!(rejected, 10);
    assert_eq!(bus.dropped_count(), 10);
    assert!(bus.pending_bytes() <= bus.capacity());
    assert_eq!(drain(&mut bus, &mut scene).len(), 10);
}
