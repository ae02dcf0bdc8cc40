//! backdrop-ngin
//!
//! A small instancing-oriented rendering engine that draws an animated 3D
//! scene behind a static web page. The same code runs natively (wgpu on
//! Vulkan/Metal/DX12) and in the browser (WebGPU through WASM).
//!
//! High-level modules
//! - `backend`: the narrow GPU capability surface the engine talks to, plus a
//!   headless recorder used by tests
//! - `context`: the wgpu device, surface and pipelines behind that surface
//! - `pipelines`: the unique and instanced model pipelines and their shader
//! - `data_structures`: ids, transforms, model buffers, models and entities
//! - `resources`: OBJ parsing, mesh registry and geometry buffers
//! - `camera`: eye, projection and screen-to-world mapping
//! - `world`: the scene container and its two-pass frame
//! - `engine`: lifecycle, device-loss recovery and the host API
//! - `shared`: the engine behind `Rc<RefCell<..>>` for hosts with async frames
//! - `behaviours`: stock update strategies and the default backdrop scene
//! - `web`: the wasm-bindgen facade a host page drives (wasm32 only)
//!

pub mod backend;
pub mod behaviours;
pub mod camera;
pub mod context;
pub mod data_structures;
pub mod engine;
pub mod pipelines;
pub mod resources;
pub mod shared;
pub mod world;

#[cfg(target_arch = "wasm32")]
pub mod web;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath;
pub use engine::{Engine, EngineConfig, EngineError};
pub use world::{EntityId, SpawnMode, World};
