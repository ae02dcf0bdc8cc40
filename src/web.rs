//! Browser entry point.
//!
//! A host page creates one [`Background`] per canvas and drives it from its
//! own `requestAnimationFrame` loop:
//!
//! ```js
//! const bg = await Background.create("backdrop");
//! function frame(t) {
//!     bg.update(mouseX, mouseY, dt);
//!     bg.render();
//!     requestAnimationFrame(frame);
//! }
//! ```

use std::{cell::Cell, rc::Rc};

use wasm_bindgen::{JsCast, prelude::*};

use crate::{
    behaviours,
    context::GraphicsDevice,
    engine::{Engine, EngineConfig},
    shared::SharedEngine,
};

fn js_error(message: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&message.to_string())
}

#[wasm_bindgen]
pub struct Background {
    engine: SharedEngine<GraphicsDevice>,
    fast: Rc<Cell<bool>>,
}

#[wasm_bindgen]
impl Background {
    /// Start the engine on the canvas with id `canvas_id` and spawn the stock scene.
    ///
    /// Rejects when the browser offers no WebGPU adapter or the canvas is missing.
    pub async fn create(canvas_id: String) -> Result<Background, JsValue> {
        if let Err(e) = console_log::init_with_level(log::Level::Info) {
            log::debug!("logger already set: {}", e);
        }

        let window = web_sys::window().ok_or_else(|| js_error("no window"))?;
        let document = window.document().ok_or_else(|| js_error("no document"))?;
        let canvas = document
            .get_element_by_id(&canvas_id)
            .ok_or_else(|| js_error(format!("no element with id '{}'", canvas_id)))?
            .dyn_into::<web_sys::HtmlCanvasElement>()
            .map_err(|_| js_error(format!("'{}' is not a canvas", canvas_id)))?;
        let (width, height) = (canvas.width().max(1), canvas.height().max(1));

        let mut engine = Engine::create(
            wgpu::SurfaceTarget::Canvas(canvas),
            width,
            height,
            EngineConfig::default(),
        )
        .await
        .map_err(js_error)?;

        engine.registry_mut().register_builtin();
        let fast = Rc::new(Cell::new(false));
        behaviours::spawn_background(&mut engine, Rc::clone(&fast), page_seed());

        Ok(Background {
            engine: SharedEngine::new(engine),
            fast,
        })
    }

    /// Returns the size actually applied after clamping.
    pub fn resize(&self, width: u32, height: u32) -> Vec<u32> {
        match self.engine.with(|engine| engine.resize(width, height)) {
            Some((width, height)) => vec![width, height],
            None => {
                log::warn!("resize while a frame is in flight, ignored");
                Vec::new()
            }
        }
    }

    /// `mouse_x` and `mouse_y` are normalized device coordinates, `dt` is in seconds.
    pub fn update(&self, mouse_x: f32, mouse_y: f32, dt: f32) {
        self.engine.with(|engine| engine.update([mouse_x, mouse_y], dt));
    }

    /// Queue a frame. Returns `false` if the previous one has not finished
    /// yet or the background is being destroyed.
    pub fn render(&self) -> bool {
        match self.engine.frame() {
            Some(frame) => {
                wasm_bindgen_futures::spawn_local(frame);
                true
            }
            None => false,
        }
    }

    /// Speed the rings up (or let them slow down again).
    pub fn set_fast(&self, fast: bool) {
        self.fast.set(fast);
    }

    pub fn set_clear_color(&self, r: f32, g: f32, b: f32, a: f32) {
        self.engine.with(|engine| engine.set_clear_color([r, g, b, a]));
    }

    pub fn set_global_light_color(&self, r: f32, g: f32, b: f32, a: f32) {
        self.engine
            .with(|engine| engine.set_global_light_color([r, g, b, a]));
    }

    /// Release the GPU. A frame in flight finishes first and then destroys.
    pub fn destroy(&self) {
        self.engine.destroy();
    }
}

/// Seed for the asteroid field. Differs per page load.
fn page_seed() -> u64 {
    (instant::now() * 1000.0) as u64
}
