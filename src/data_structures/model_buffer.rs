//! Per-model and per-mesh-group GPU records.
//!
//! A unique model owns one uniform sized to a single [`ModelRecord`]. All
//! instanced models of one mesh share a storage array that is reallocated to
//! exactly the live instance count whenever models join or leave the group,
//! and drawn with one indirect call.

use std::collections::HashMap;

use bytemuck::Zeroable;

use crate::backend::{
    BindGroupHandle, BindingSlot, BufferHandle, BufferUsage, DrawCall, DrawKind, RenderBackend,
};
use crate::resources::geometry::GeometryBuffer;

use super::{
    id_pool::IdPool,
    transform::{MODEL_RECORD_SIZE, ModelRecord},
};

/// Bytes of `[index_count, instance_count, first_index, base_vertex, first_instance]`.
pub const INDIRECT_ARGS_SIZE: u64 = 5 * std::mem::size_of::<u32>() as u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferMode {
    Unique,
    Instanced,
}

#[derive(Debug)]
pub struct ModelBuffer {
    label: String,
    mode: BufferMode,
    records: Vec<ModelRecord>,
    buffer: Option<BufferHandle>,
    bind_group: Option<BindGroupHandle>,
    indirect: [u32; 5],
    indirect_buffer: Option<BufferHandle>,
    instances: IdPool<u32>,
    count_changed: bool,
    offset: usize,
    // CPU records are newer than the GPU copy
    dirty: bool,
    written: bool,
}

impl ModelBuffer {
    pub fn unique(gpu: &mut impl RenderBackend, label: &str, index_count: u32) -> Self {
        let mut buffer = Self::empty(label, BufferMode::Unique, index_count);
        buffer.indirect[1] = 1;
        buffer.records = vec![ModelRecord::zeroed()];
        buffer.allocate_uniform(gpu);
        buffer
    }

    pub fn instanced(gpu: &mut impl RenderBackend, label: &str, index_count: u32) -> Self {
        let mut buffer = Self::empty(label, BufferMode::Instanced, index_count);
        buffer.allocate_indirect(gpu);
        buffer
    }

    fn empty(label: &str, mode: BufferMode, index_count: u32) -> Self {
        Self {
            label: label.to_string(),
            mode,
            records: Vec::new(),
            buffer: None,
            bind_group: None,
            indirect: [index_count, 0, 0, 0, 0],
            indirect_buffer: None,
            instances: IdPool::new(),
            count_changed: false,
            offset: 0,
            dirty: false,
            written: false,
        }
    }

    fn allocate_uniform(&mut self, gpu: &mut impl RenderBackend) {
        let buffer = gpu.create_buffer(&self.label, MODEL_RECORD_SIZE, BufferUsage::Uniform);
        self.bind_group = Some(gpu.create_bind_group(&self.label, BindingSlot::UniqueModel, buffer));
        self.buffer = Some(buffer);
        self.dirty = true;
    }

    fn allocate_indirect(&mut self, gpu: &mut impl RenderBackend) {
        let buffer = gpu.create_buffer(
            &format!("{} indirect", self.label),
            INDIRECT_ARGS_SIZE,
            BufferUsage::Indirect,
        );
        gpu.write_buffer(buffer, 0, bytemuck::cast_slice(&self.indirect));
        self.indirect_buffer = Some(buffer);
    }

    /// Resize the storage array to exactly the live instance count.
    fn reallocate(&mut self, gpu: &mut impl RenderBackend) {
        if let Some(group) = self.bind_group.take() {
            gpu.destroy_bind_group(group);
        }
        if let Some(buffer) = self.buffer.take() {
            gpu.destroy_buffer(buffer);
        }

        let count = self.instances.count();
        self.records = vec![ModelRecord::zeroed(); count];
        if count > 0 {
            let buffer = gpu.create_buffer(
                &self.label,
                count as u64 * MODEL_RECORD_SIZE,
                BufferUsage::Storage,
            );
            self.bind_group =
                Some(gpu.create_bind_group(&self.label, BindingSlot::InstancedModel, buffer));
            self.buffer = Some(buffer);
        }

        self.indirect[1] = count as u32;
        if let Some(indirect) = self.indirect_buffer {
            gpu.write_buffer(indirect, 0, bytemuck::cast_slice(&self.indirect));
        }
        log::debug!("reallocated '{}' for {} instances", self.label, count);

        self.count_changed = false;
        self.offset = 0;
        self.dirty = count > 0;
    }

    pub fn add_instance(&mut self) -> u32 {
        if self.mode == BufferMode::Unique {
            log::warn!("'{}' is a unique buffer and holds no instances", self.label);
            return 0;
        }
        self.count_changed = true;
        self.instances.acquire()
    }

    pub fn remove_instance(&mut self, id: u32) -> bool {
        if !self.instances.remove(id) {
            return false;
        }
        self.count_changed = true;
        true
    }

    /// Store `record` for upload.
    ///
    /// Unique buffers overwrite their single record. Instanced buffers append
    /// at the batch offset, reallocating first if the instance count changed.
    pub fn update_uniform(&mut self, gpu: &mut impl RenderBackend, record: ModelRecord) {
        match self.mode {
            BufferMode::Unique => {
                self.records[0] = record;
                self.dirty = true;
            }
            BufferMode::Instanced => {
                if self.count_changed {
                    self.reallocate(gpu);
                }
                match self.records.get_mut(self.offset) {
                    Some(slot) => {
                        *slot = record;
                        self.offset += 1;
                        self.dirty = true;
                    }
                    None => log::warn!(
                        "'{}' received more records than its {} instances",
                        self.label,
                        self.records.len()
                    ),
                }
            }
        }
    }

    /// Upload pending records, at most once per frame.
    ///
    /// Returns whether anything was uploaded.
    pub fn write_uniform(&mut self, gpu: &mut impl RenderBackend) -> bool {
        if self.count_changed {
            self.reallocate(gpu);
        }
        if self.written || !self.dirty {
            return false;
        }
        let Some(buffer) = self.buffer else {
            return false;
        };
        gpu.write_buffer(buffer, 0, bytemuck::cast_slice(&self.records));
        self.dirty = false;
        self.written = true;
        self.offset = 0;
        true
    }

    pub fn begin_frame(&mut self) {
        self.written = false;
        self.offset = 0;
    }

    /// Recreate GPU objects on a fresh device. Old handles are assumed gone.
    pub fn restore(&mut self, gpu: &mut impl RenderBackend) {
        self.buffer = None;
        self.bind_group = None;
        self.written = false;
        match self.mode {
            BufferMode::Unique => self.allocate_uniform(gpu),
            BufferMode::Instanced => {
                self.allocate_indirect(gpu);
                self.count_changed = true;
            }
        }
    }

    pub fn destroy(mut self, gpu: &mut impl RenderBackend) {
        if let Some(group) = self.bind_group.take() {
            gpu.destroy_bind_group(group);
        }
        if let Some(buffer) = self.buffer.take() {
            gpu.destroy_buffer(buffer);
        }
        if let Some(buffer) = self.indirect_buffer.take() {
            gpu.destroy_buffer(buffer);
        }
    }

    pub fn mode(&self) -> BufferMode {
        self.mode
    }

    pub fn buffer(&self) -> Option<BufferHandle> {
        self.buffer
    }

    pub fn bind_group(&self) -> Option<BindGroupHandle> {
        self.bind_group
    }

    pub fn indirect_buffer(&self) -> Option<BufferHandle> {
        self.indirect_buffer
    }

    pub fn indirect_args(&self) -> [u32; 5] {
        self.indirect
    }

    pub fn instance_count(&self) -> usize {
        match self.mode {
            BufferMode::Unique => 1,
            BufferMode::Instanced => self.instances.count(),
        }
    }

    /// The instance count changed since the storage array was last sized.
    pub fn needs_reallocation(&self) -> bool {
        self.count_changed
    }

    pub fn records(&self) -> &[ModelRecord] {
        &self.records
    }
}

#[derive(Debug)]
struct InstanceGroup {
    buffer: ModelBuffer,
    stale: bool,
    drawn: bool,
}

/// One instanced [`ModelBuffer`] per mesh name.
#[derive(Debug, Default)]
pub struct InstanceGroups {
    groups: HashMap<String, InstanceGroup>,
}

impl InstanceGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an instance to `mesh`'s group, creating the group on first use.
    pub fn join(&mut self, gpu: &mut impl RenderBackend, mesh: &str, index_count: u32) -> u32 {
        let group = self
            .groups
            .entry(mesh.to_string())
            .or_insert_with(|| InstanceGroup {
                buffer: ModelBuffer::instanced(gpu, &format!("{} instances", mesh), index_count),
                stale: true,
                drawn: false,
            });
        group.stale = true;
        group.buffer.add_instance()
    }

    /// Remove an instance. The group is destroyed with its last instance.
    pub fn leave(&mut self, gpu: &mut impl RenderBackend, mesh: &str, slot: u32) {
        let Some(group) = self.groups.get_mut(mesh) else {
            log::warn!("no instance group for mesh '{}'", mesh);
            return;
        };
        group.buffer.remove_instance(slot);
        group.stale = true;
        if group.buffer.instance_count() == 0 {
            if let Some(group) = self.groups.remove(mesh) {
                group.buffer.destroy(gpu);
            }
        }
    }

    pub fn get(&self, mesh: &str) -> Option<&ModelBuffer> {
        self.groups.get(mesh).map(|group| &group.buffer)
    }

    pub fn get_mut(&mut self, mesh: &str) -> Option<&mut ModelBuffer> {
        self.groups.get_mut(mesh).map(|group| &mut group.buffer)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn begin_frame(&mut self) {
        for group in self.groups.values_mut() {
            group.buffer.begin_frame();
            group.stale = group.buffer.needs_reallocation();
            group.drawn = false;
        }
    }

    /// Every member of a stale group re-appends its record this frame.
    pub fn mark_stale(&mut self, mesh: &str) {
        if let Some(group) = self.groups.get_mut(mesh) {
            group.stale = true;
        }
    }

    pub fn is_stale(&self, mesh: &str) -> bool {
        self.groups.get(mesh).is_some_and(|group| group.stale)
    }

    /// Upload the group's batch and describe its indirect draw.
    ///
    /// Returns `None` if the group was already drawn this frame or has
    /// nothing to draw.
    pub fn draw(
        &mut self,
        gpu: &mut impl RenderBackend,
        geometry: &GeometryBuffer,
    ) -> Option<DrawCall> {
        let group = self.groups.get_mut(geometry.name())?;
        if group.drawn {
            return None;
        }
        group.drawn = true;
        group.buffer.write_uniform(gpu);
        Some(DrawCall {
            bind_group: group.buffer.bind_group()?,
            geometry: geometry.slices(),
            kind: DrawKind::Indirect {
                buffer: group.buffer.indirect_buffer()?,
            },
        })
    }

    pub fn restore(&mut self, gpu: &mut impl RenderBackend) {
        for group in self.groups.values_mut() {
            group.buffer.restore(gpu);
            group.stale = true;
        }
    }

    /// Drop every group without touching the backend.
    pub fn forget(&mut self) {
        self.groups.clear();
    }

    pub fn destroy(&mut self, gpu: &mut impl RenderBackend) {
        for (_, group) in self.groups.drain() {
            group.buffer.destroy(gpu);
        }
    }
}
