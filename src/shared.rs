//! An engine shared between a host's callbacks and its in-flight frame.
//!
//! Rendering is async, so on the web the frame future keeps the engine
//! borrowed across `.await` while the page keeps calling in. Calls that find
//! the engine busy are dropped, except `destroy`: it is remembered and run by
//! whoever holds the engine next.

use std::{
    cell::{Cell, RefCell},
    future::Future,
    rc::Rc,
};

use crate::{backend::RenderBackend, engine::Engine};

#[derive(Debug)]
pub struct SharedEngine<B: RenderBackend> {
    engine: Rc<RefCell<Engine<B>>>,
    destroy_requested: Rc<Cell<bool>>,
}

impl<B: RenderBackend> Clone for SharedEngine<B> {
    fn clone(&self) -> Self {
        Self {
            engine: Rc::clone(&self.engine),
            destroy_requested: Rc::clone(&self.destroy_requested),
        }
    }
}

impl<B: RenderBackend + 'static> SharedEngine<B> {
    pub fn new(engine: Engine<B>) -> Self {
        Self {
            engine: Rc::new(RefCell::new(engine)),
            destroy_requested: Rc::new(Cell::new(false)),
        }
    }

    /// Run `f` on the engine. Returns `None` while a frame holds it.
    pub fn with<R>(&self, f: impl FnOnce(&mut Engine<B>) -> R) -> Option<R> {
        let mut engine = self.engine.try_borrow_mut().ok()?;
        let result = f(&mut engine);
        self.finish(&mut engine);
        Some(result)
    }

    /// The next frame, or `None` if one is in flight or the engine is being destroyed.
    pub fn frame(&self) -> Option<impl Future<Output = ()> + 'static> {
        if self.destroy_requested.get() || self.engine.try_borrow_mut().is_err() {
            return None;
        }
        let shared = self.clone();
        Some(async move {
            let Ok(mut engine) = shared.engine.try_borrow_mut() else {
                return;
            };
            // a destroyed engine renders nothing
            if let Err(e) = engine.render().await {
                log::error!("frame failed: {}", e);
            }
            shared.finish(&mut engine);
        })
    }

    /// Destroy the engine now, or as soon as the frame holding it is done.
    ///
    /// Returns `false` if the destroy was deferred.
    pub fn destroy(&self) -> bool {
        self.destroy_requested.set(true);
        match self.engine.try_borrow_mut() {
            Ok(mut engine) => {
                engine.destroy();
                true
            }
            Err(_) => {
                log::info!("destroy deferred until the current frame is done");
                false
            }
        }
    }

    pub fn is_destroy_requested(&self) -> bool {
        self.destroy_requested.get()
    }

    fn finish(&self, engine: &mut Engine<B>) {
        if self.destroy_requested.get() {
            engine.destroy();
        }
    }
}
