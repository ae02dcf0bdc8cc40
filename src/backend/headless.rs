//! A backend without a GPU.
//!
//! Buffers are plain byte vectors and submitted frames are kept for
//! inspection. Device loss can be injected to drive the recovery path.

use super::{
    BindGroupHandle, BindingSlot, BufferHandle, BufferUsage, DeviceLoss, Frame, LossReason,
    RenderBackend, ResourceTable,
};
use crate::engine::EngineError;

/// Largest texture side the headless device reports unless configured otherwise.
pub const DEFAULT_MAX_DIMENSION: u32 = 8192;

#[derive(Debug, Clone)]
pub struct HeadlessBuffer {
    pub label: String,
    pub usage: BufferUsage,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
pub struct HeadlessBindGroup {
    pub slot: BindingSlot,
    pub buffer: BufferHandle,
}

#[derive(Debug)]
pub struct HeadlessBackend {
    buffers: ResourceTable<HeadlessBuffer>,
    bind_groups: ResourceTable<HeadlessBindGroup>,
    max_dimension: u32,
    size: (u32, u32),
    frames: Vec<Frame>,
    uploads: usize,
    pending_loss: Option<DeviceLoss>,
    fail_recreate: bool,
    recreations: usize,
    destroyed: bool,
}

impl HeadlessBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_max_dimension(width, height, DEFAULT_MAX_DIMENSION)
    }

    pub fn with_max_dimension(width: u32, height: u32, max_dimension: u32) -> Self {
        let max_dimension = max_dimension.max(1);
        Self {
            buffers: ResourceTable::new(),
            bind_groups: ResourceTable::new(),
            max_dimension,
            size: (width.clamp(1, max_dimension), height.clamp(1, max_dimension)),
            frames: Vec::new(),
            uploads: 0,
            pending_loss: None,
            fail_recreate: false,
            recreations: 0,
            destroyed: false,
        }
    }

    pub fn buffer(&self, handle: BufferHandle) -> Option<&HeadlessBuffer> {
        self.buffers.get(handle.id())
    }

    pub fn buffer_size(&self, handle: BufferHandle) -> Option<u64> {
        self.buffer(handle).map(|buffer| buffer.data.len() as u64)
    }

    pub fn bind_group(&self, handle: BindGroupHandle) -> Option<HeadlessBindGroup> {
        self.bind_groups.get(handle.id()).copied()
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_bind_groups(&self) -> usize {
        self.bind_groups.len()
    }

    /// Number of `write_buffer` calls since creation or the last reset.
    pub fn upload_count(&self) -> usize {
        self.uploads
    }

    pub fn reset_upload_count(&mut self) {
        self.uploads = 0;
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn last_frame(&self) -> Option<&Frame> {
        self.frames.last()
    }

    /// Queue a device loss that the engine observes on its next render.
    pub fn simulate_device_loss(&mut self, reason: LossReason) {
        self.pending_loss = Some(DeviceLoss {
            reason,
            message: "simulated device loss".to_string(),
        });
    }

    /// Make the next `recreate` call fail.
    pub fn fail_next_recreate(&mut self) {
        self.fail_recreate = true;
    }

    pub fn recreations(&self) -> usize {
        self.recreations
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

impl RenderBackend for HeadlessBackend {
    fn create_buffer(&mut self, label: &str, size: u64, usage: BufferUsage) -> BufferHandle {
        BufferHandle::from(self.buffers.insert(HeadlessBuffer {
            label: label.to_string(),
            usage,
            data: vec![0; size as usize],
        }))
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        let Some(target) = self.buffers.get_mut(buffer.id()) else {
            log::warn!("write to unknown buffer {:?}", buffer);
            return;
        };
        let start = offset as usize;
        let end = start + data.len();
        if end > target.data.len() {
            log::warn!(
                "write of {} bytes at {} overflows buffer '{}' of {} bytes",
                data.len(),
                offset,
                target.label,
                target.data.len()
            );
            return;
        }
        target.data[start..end].copy_from_slice(data);
        self.uploads += 1;
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if self.buffers.remove(buffer.id()).is_none() {
            log::warn!("destroying unknown buffer {:?}", buffer);
        }
    }

    fn create_bind_group(
        &mut self,
        _label: &str,
        slot: BindingSlot,
        buffer: BufferHandle,
    ) -> BindGroupHandle {
        BindGroupHandle::from(self.bind_groups.insert(HeadlessBindGroup { slot, buffer }))
    }

    fn destroy_bind_group(&mut self, group: BindGroupHandle) {
        if self.bind_groups.remove(group.id()).is_none() {
            log::warn!("destroying unknown bind group {:?}", group);
        }
    }

    fn max_texture_dimension(&self) -> u32 {
        self.max_dimension
    }

    fn surface_size(&self) -> (u32, u32) {
        self.size
    }

    fn resize(&mut self, width: u32, height: u32) -> (u32, u32) {
        self.size = (
            width.clamp(1, self.max_dimension),
            height.clamp(1, self.max_dimension),
        );
        self.size
    }

    fn submit(&mut self, frame: &Frame) -> Result<(), EngineError> {
        if self.destroyed {
            return Err(EngineError::DeviceLost("device was destroyed".to_string()));
        }
        self.frames.push(frame.clone());
        Ok(())
    }

    fn take_device_loss(&mut self) -> Option<DeviceLoss> {
        self.pending_loss.take()
    }

    fn release_resources(&mut self) {
        self.buffers.clear();
        self.bind_groups.clear();
    }

    async fn recreate(&mut self) -> Result<(), EngineError> {
        if self.fail_recreate {
            self.fail_recreate = false;
            return Err(EngineError::Unsupported(
                "no adapter available for recreation".to_string(),
            ));
        }
        self.release_resources();
        self.recreations += 1;
        Ok(())
    }

    fn destroy(&mut self) {
        self.release_resources();
        self.destroyed = true;
        self.pending_loss = Some(DeviceLoss {
            reason: LossReason::Destroyed,
            message: "device destroyed".to_string(),
        });
    }
}
