//! Aurora entry point.
//!
//! Reads `aurora.toml`, opens a window, and drives the renderer from the
//! winit event loop. The camera is free-flying: WASD plus QE to move, hold
//! the right mouse button to look around.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{error, info};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use aurora_core::{AppConfig, Timer};
use aurora_platform::{InputState, Window};
use aurora_renderer::Renderer;

const CONFIG_PATH: &str = "aurora.toml";

struct App {
    config: AppConfig,
    window: Option<Window>,
    renderer: Option<Renderer>,
    input: InputState,
    timer: Timer,
}

impl App {
    fn new(config: AppConfig) -> Self {
        Self {
            config,
            window: None,
            renderer: None,
            input: InputState::new(),
            timer: Timer::new(),
        }
    }

    /// Creates the window and the renderer attached to it.
    ///
    /// winit only allows window creation once the event loop is live, so
    /// this runs from `resumed` rather than `main`.
    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let win = &self.config.window;
        let window = Window::new(event_loop, win.width, win.height, &win.title)
            .context("window creation failed")?;
        let renderer = Renderer::new(&window, &self.config).context("renderer setup failed")?;

        info!("Initialization complete, entering main loop");
        self.renderer = Some(renderer);
        self.window = Some(window);
        Ok(())
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let delta = self.timer.delta_secs();

        if let Some(renderer) = self.renderer.as_mut() {
            renderer.update(&self.input, delta);
            if let Err(e) = renderer.render_frame() {
                error!("Unrecoverable render error: {e:?}");
                event_loop.exit();
            }
        }

        // Frame is done with this input snapshot; reset per-frame state.
        self.input.begin_frame();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        // On desktop platforms `resumed` fires exactly once.
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.init(event_loop) {
            error!("Startup failed: {e:?}");
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(window) = self.window.as_mut() {
                    window.resize(size.width, size.height);
                }
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            WindowEvent::KeyboardInput { event, .. } => {
                if let winit::keyboard::PhysicalKey::Code(key) = event.physical_key {
                    if event.state.is_pressed() {
                        self.input.on_key_pressed(key);
                    } else {
                        self.input.on_key_released(key);
                    }
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                if state.is_pressed() {
                    self.input.on_mouse_pressed(button.into());
                } else {
                    self.input.on_mouse_released(button.into());
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.input
                    .on_mouse_moved(position.x as f32, position.y as f32);
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        // Poll mode: keep redrawing as fast as presentation allows.
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    aurora_core::init_logging();

    let config = AppConfig::load_or_default(Path::new(CONFIG_PATH));
    info!("Starting Aurora");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    Ok(())
}
