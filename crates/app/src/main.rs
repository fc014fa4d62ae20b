//! glimmer - Vulkan triangle renderer entry point.
//!
//! Loads the startup configuration, opens a fixed-size window, and drives
//! the render loop until the window is closed or a frame fails.

use anyhow::Result;
use tracing::{debug, error, info};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use glimmer_core::{Config, FrameClock, LogContext};
use glimmer_platform::Window;
use glimmer_renderer::Renderer;

struct App {
    config: Config,
    clock: FrameClock,
    window: Option<Window>,
    renderer: Option<Renderer>,
}

impl App {
    fn new(config: Config) -> Self {
        Self {
            config,
            clock: FrameClock::new(),
            window: None,
            renderer: None,
        }
    }

    /// Opens the window and brings up the renderer against it.
    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window_config = &self.config.window;
        let window = Window::new(
            event_loop,
            window_config.width,
            window_config.height,
            &window_config.title,
        )?;
        let renderer = Renderer::new(&window, &self.config)?;

        info!("Initialization complete, entering main loop");
        self.renderer = Some(renderer);
        self.window = Some(window);
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.init(event_loop) {
            error!("Startup failed: {:#}", e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, exiting");
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                if let Some(ref mut renderer) = self.renderer {
                    if let Err(e) = renderer.render_frame() {
                        // Rendering failures are not recoverable: the
                        // swapchain is never rebuilt.
                        error!("Render error, shutting down: {:?}", e);
                        event_loop.exit();
                        return;
                    }

                    self.clock.tick();
                    if let Some(fps) = self.clock.fps_sample() {
                        debug!("{:.1} fps", fps);
                    }
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    let log_context = LogContext::init()?;
    info!(
        "Starting glimmer (log filter: {})",
        log_context.directives()
    );

    let config = Config::load()?;
    let mut app = App::new(config);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);
    event_loop.run_app(&mut app)?;

    info!("glimmer exited cleanly");
    Ok(())
}
