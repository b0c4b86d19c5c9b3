//! # Tessera Headless Sample
//!
//! Runs a scene for a fixed number of frames with no window and no GPU.
//!
//! ```bash
//! # Defaults: built-in config, 600 frames
//! tessera
//!
//! # Custom config and frame count, verbose
//! RUST_LOG=debug tessera tessera.toml 1200
//! ```

mod demo;

use std::process::ExitCode;

use tessera_core::message::{WindowEvent, WINDOW_MESSAGE};
use tessera_core::{EngineConfig, MessageBus, Scene};
use tracing_subscriber::EnvFilter;

use demo::{ConsoleRenderer, HeadlessTarget, LifetimeSystem, MovementSystem, SpawnDirector};

/// Fixed simulation step.
const FRAME_TIME: f32 = 1.0 / 60.0;

/// Frames run when none are given.
const DEFAULT_FRAMES: u32 = 600;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "tessera failed");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let frames = match args.next() {
        Some(count) => count.parse()?,
        None => DEFAULT_FRAMES,
    };

    let mut bus = MessageBus::new(&config.message_bus);
    let mut scene = Scene::new(bus.sender(), &config.scene)?;

    // Order is the pipeline: movement before expiry before drawing.
    scene.add_system(MovementSystem::new())?;
    scene.add_system(LifetimeSystem::new())?;
    scene.add_system(ConsoleRenderer::new())?;
    scene.add_director(SpawnDirector::new(30, 16));

    let [width, height] = config.scene.target_size;
    let target = HeadlessTarget { width, height };
    bus.post(WINDOW_MESSAGE, &WindowEvent::resized(width, height))?;

    tracing::info!(frames, "simulation started");
    for _ in 0..frames {
        while !bus.empty() {
            if let Some(message) = bus.poll() {
                scene.forward_message(&message);
            }
        }
        scene.simulate(FRAME_TIME);
        scene.render(&target);
    }

    for row in scene.system_report() {
        tracing::info!(
            system = row.name,
            entities = row.entity_count,
            active = row.active,
            last_process = ?row.last_process,
            "system report"
        );
    }
    let (spawned, destroyed) = scene
        .director_mut::<SpawnDirector>()
        .map_or((0, 0), |d| (d.spawned(), d.destroyed()));
    tracing::info!(
        spawned,
        destroyed,
        alive = scene.world().entities().alive_count(),
        dropped_messages = bus.dropped_count(),
        "simulation finished"
    );
    Ok(())
}
