//! Native window running the stock backdrop.
//!
//! Hold the left mouse button to speed the rings up.
//!
//! ```sh
//! RUST_LOG=info cargo run --example background
//! ```

use std::{
    cell::Cell,
    rc::Rc,
    sync::Arc,
};

use backdrop_ngin::{
    Engine, EngineConfig, behaviours, context::GraphicsDevice, engine::DeviceState,
};
use winit::{
    application::ApplicationHandler,
    event::{ElementState, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

const MESH_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/assets/meshes");

struct App {
    runtime: tokio::runtime::Runtime,
    window: Option<Arc<Window>>,
    engine: Option<Engine<GraphicsDevice>>,
    fast: Rc<Cell<bool>>,
    mouse_ndc: [f32; 2],
    last_frame: instant::Instant,
}

impl App {
    fn new() -> anyhow::Result<Self> {
        Ok(Self {
            runtime: tokio::runtime::Runtime::new()?,
            window: None,
            engine: None,
            fast: Rc::new(Cell::new(false)),
            mouse_ndc: [0.0, 0.0],
            last_frame: instant::Instant::now(),
        })
    }

    fn start(&mut self, window: Arc<Window>) -> anyhow::Result<()> {
        let size = window.inner_size();
        let config = EngineConfig::default().with_clear_color([0.02, 0.02, 0.05, 1.0]);
        let mut engine = self.runtime.block_on(Engine::create(
            Arc::clone(&window),
            size.width,
            size.height,
            config,
        ))?;

        if let Err(e) = engine.registry_mut().discover(MESH_DIR) {
            log::warn!("{}, using the embedded meshes", e);
        }
        engine.registry_mut().register_builtin();
        behaviours::spawn_background(&mut engine, Rc::clone(&self.fast), 0x5eed);

        self.engine = Some(engine);
        self.window = Some(window);
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let attributes = Window::default_attributes().with_title("backdrop-ngin");
        let started = event_loop
            .create_window(attributes)
            .map_err(anyhow::Error::from)
            .and_then(|window| self.start(Arc::new(window)));
        if let Err(e) = started {
            log::error!("{:#}", e);
            event_loop.exit();
            return;
        }
        self.last_frame = instant::Instant::now();
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let (Some(window), Some(engine)) = (&self.window, &mut self.engine) else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                engine.destroy();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                let (width, height) = engine.resize(size.width, size.height);
                log::debug!("resized to {}x{}", width, height);
            }
            WindowEvent::CursorMoved { position, .. } => {
                let size = window.inner_size();
                self.mouse_ndc = [
                    (position.x as f32 / size.width.max(1) as f32) * 2.0 - 1.0,
                    (position.y as f32 / size.height.max(1) as f32) * 2.0 - 1.0,
                ];
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                self.fast.set(state == ElementState::Pressed);
            }
            WindowEvent::RedrawRequested => {
                let now = instant::Instant::now();
                let dt = (now - self.last_frame).as_secs_f32();
                self.last_frame = now;

                engine.update(self.mouse_ndc, dt);
                if let Err(e) = self.runtime.block_on(engine.render()) {
                    log::error!("{}", e);
                    event_loop.exit();
                    return;
                }
                if engine.state() == DeviceState::Active {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }
}

fn main() -> anyhow::Result<()> {
    if let Err(e) = env_logger::try_init() {
        println!("Warning: Could not initialize logger: {}", e);
    }

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);
    let mut app = App::new()?;
    event_loop.run_app(&mut app)?;
    Ok(())
}
