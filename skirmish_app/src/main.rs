//! Skirmish demo application
//!
//! Assembles the grid/unit/building scene through the entity registry and
//! drives the render loop until the window closes. Any unrecovered setup or
//! frame-loop error is logged and terminates the process with a failure
//! status.

mod scene;

use glfw::{Action, Key};
use grid_engine::config::AppConfig;
use grid_engine::ecs::components::MeshComponent;
use grid_engine::render::{Renderer, UniformBufferObject, Window};
use grid_engine::EngineResult;
use std::path::Path;
use std::time::Instant;

const CONFIG_PATH: &str = "resources/config/app.toml";
const TEXTURE_PATH: &str = "resources/textures/tileset.png";

/// Model spin in radians per second
const ANGULAR_VELOCITY: f32 = std::f32::consts::PI / 4.0;

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> EngineResult<()> {
    let config = AppConfig::load(CONFIG_PATH)?;

    let mut window = Window::new(
        &config.window.title,
        config.window.width,
        config.window.height,
    )?;

    let mut renderer = Renderer::new(
        &mut window,
        &config.window.title,
        &config.device.requirements(),
        config.render.clear_color,
        Path::new(TEXTURE_PATH),
    )?;

    let registry = scene::build_scene(config.scene.grid_size);
    for (_, drawable) in registry.components::<MeshComponent>() {
        renderer.upload_mesh(&drawable.mesh)?;
    }
    log::info!(
        "Scene ready: {} entities, {} meshes",
        registry.entity_count(),
        registry.components::<MeshComponent>().count()
    );

    let start_time = Instant::now();
    while !window.should_close() {
        window.poll_events();
        if let Some((Key::Escape, Action::Press)) = window.get_key() {
            window.set_should_close(true);
        }

        let (width, height) = renderer.swapchain_extent();
        let aspect = width as f32 / height as f32;
        let angle = start_time.elapsed().as_secs_f32() * ANGULAR_VELOCITY;
        let ubo = UniformBufferObject::orbiting(angle, aspect);

        renderer.draw_frame(&mut window, &ubo)?;
    }

    // Drain pending frames before teardown begins.
    renderer.wait_idle()?;
    log::info!("Shutting down");
    Ok(())
}
