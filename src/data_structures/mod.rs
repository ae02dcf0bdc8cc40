//! Engine data structures: ids, transforms, model buffers, models and entities.
//!
//! - `id_pool` hands out reusable integer ids
//! - `transform` holds position/rotation/scale and the packed GPU record
//! - `model_buffer` owns per-model uniforms and per-mesh instance groups
//! - `model` binds a mesh's geometry to one of those buffers
//! - `entity` adds a transform and an update behaviour to a model
//! - `texture` contains the depth and multisample render targets

pub mod entity;
pub mod id_pool;
pub mod model;
pub mod model_buffer;
pub mod texture;
pub mod transform;
