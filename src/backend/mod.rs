//! The GPU capability surface the engine renders through.
//!
//! Everything above this module speaks in small copyable handles and plain
//! frame descriptions. [`crate::context::GraphicsDevice`] turns those into
//! wgpu calls, [`headless::HeadlessBackend`] records them so scene logic can
//! be tested without an adapter.

pub mod headless;

use crate::{data_structures::id_pool::IdPool, engine::EngineError};

/// Linear RGBA colour.
pub type Rgba = [f32; 4];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(u32);

impl From<u32> for BufferHandle {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl BufferHandle {
    pub fn id(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindGroupHandle(u32);

impl From<u32> for BindGroupHandle {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl BindGroupHandle {
    pub fn id(self) -> u32 {
        self.0
    }
}

/// What a buffer is going to be bound as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    /// Vertex and index data of one mesh, packed into a single buffer.
    Geometry,
    Uniform,
    /// Read-only storage array of per-instance records.
    Storage,
    /// Arguments of an indexed indirect draw.
    Indirect,
}

/// The bind group layout a buffer is attached through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingSlot {
    /// Group 0: projection and light colour.
    Scene,
    /// Group 1 of the unique pipeline: one model record as a uniform.
    UniqueModel,
    /// Group 1 of the instanced pipeline: a storage array of model records.
    InstancedModel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineKind {
    Unique,
    Instanced,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadOp {
    Clear(Rgba),
    Load,
}

/// A byte range inside a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferSlice {
    pub buffer: BufferHandle,
    pub offset: u64,
    pub size: u64,
}

/// Where the three vertex streams and the index stream of a mesh live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometrySlices {
    pub vertices: BufferSlice,
    pub normals: BufferSlice,
    pub texels: BufferSlice,
    pub indices: BufferSlice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawKind {
    Direct { index_count: u32 },
    /// Arguments are read from an indirect buffer at offset 0.
    Indirect { buffer: BufferHandle },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCall {
    pub bind_group: BindGroupHandle,
    pub geometry: GeometrySlices,
    pub kind: DrawKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pass {
    pub label: &'static str,
    pub pipeline: PipelineKind,
    pub load: LoadOp,
    pub draws: Vec<DrawCall>,
}

/// Everything that has to be encoded to present one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub scene: BindGroupHandle,
    pub passes: Vec<Pass>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossReason {
    /// The device was torn down on purpose.
    Destroyed,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceLoss {
    pub reason: LossReason,
    pub message: String,
}

/// The operations the engine needs from a GPU.
///
/// Resource handles stay valid until they are destroyed or until the device
/// is lost. After [`RenderBackend::release_resources`] every handle is stale
/// and the owners are expected to recreate their resources.
#[allow(async_fn_in_trait)]
pub trait RenderBackend {
    fn create_buffer(&mut self, label: &str, size: u64, usage: BufferUsage) -> BufferHandle;
    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]);
    fn destroy_buffer(&mut self, buffer: BufferHandle);
    fn create_bind_group(
        &mut self,
        label: &str,
        slot: BindingSlot,
        buffer: BufferHandle,
    ) -> BindGroupHandle;
    fn destroy_bind_group(&mut self, group: BindGroupHandle);

    fn max_texture_dimension(&self) -> u32;
    fn surface_size(&self) -> (u32, u32);
    /// Resize the presentation surface, clamping both sides to
    /// `1..=max_texture_dimension()`. Returns the size actually applied.
    fn resize(&mut self, width: u32, height: u32) -> (u32, u32);

    fn submit(&mut self, frame: &Frame) -> Result<(), EngineError>;

    /// Returns a pending device loss once.
    fn take_device_loss(&mut self) -> Option<DeviceLoss>;
    /// Drop every buffer and bind group of the lost device.
    fn release_resources(&mut self);
    /// Acquire a fresh device, keeping the surface and its size.
    async fn recreate(&mut self) -> Result<(), EngineError>;
    fn destroy(&mut self);
}

/// Dense storage for backend objects addressed by reusable ids.
#[derive(Debug)]
pub(crate) struct ResourceTable<T> {
    slots: Vec<Option<T>>,
    ids: IdPool<u32>,
}

impl<T> ResourceTable<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            ids: IdPool::new(),
        }
    }

    pub(crate) fn insert(&mut self, value: T) -> u32 {
        let id = self.ids.acquire();
        let index = id as usize;
        if index >= self.slots.len() {
            self.slots.resize_with(index + 1, || None);
        }
        self.slots[index] = Some(value);
        id
    }

    pub(crate) fn get(&self, id: u32) -> Option<&T> {
        self.slots.get(id as usize).and_then(Option::as_ref)
    }

    pub(crate) fn get_mut(&mut self, id: u32) -> Option<&mut T> {
        self.slots.get_mut(id as usize).and_then(Option::as_mut)
    }

    pub(crate) fn remove(&mut self, id: u32) -> Option<T> {
        if !self.ids.remove(id) {
            return None;
        }
        self.slots.get_mut(id as usize).and_then(Option::take)
    }

    pub(crate) fn len(&self) -> usize {
        self.ids.count()
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.ids.clear();
    }
}
