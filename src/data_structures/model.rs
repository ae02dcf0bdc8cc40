//! A mesh bound to the buffer its per-model record lives in.

use crate::{
    backend::{DrawCall, DrawKind, RenderBackend},
    resources::{MeshError, MeshRegistry, geometry::GeometryBuffer},
};

use super::{
    model_buffer::{InstanceGroups, ModelBuffer},
    transform::ModelRecord,
};

/// How a spawned model is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnMode {
    /// Own uniform, one direct draw per model.
    Unique,
    /// Shares the mesh's instance group and its single indirect draw.
    Instanced,
}

#[derive(Debug)]
pub enum ModelBinding {
    Unique(ModelBuffer),
    /// Slot id inside the instance group named after the mesh.
    Instanced(u32),
}

#[derive(Debug)]
pub struct Model {
    geometry: GeometryBuffer,
    binding: ModelBinding,
}

impl Model {
    pub fn load(
        gpu: &mut impl RenderBackend,
        registry: &mut MeshRegistry,
        groups: &mut InstanceGroups,
        mesh: &str,
        mode: SpawnMode,
    ) -> Result<Self, MeshError> {
        let geometry = registry.get_mesh(mesh, gpu)?;
        let binding = match mode {
            SpawnMode::Unique => ModelBinding::Unique(ModelBuffer::unique(
                gpu,
                &format!("{} model", mesh),
                geometry.index_count(),
            )),
            SpawnMode::Instanced => {
                ModelBinding::Instanced(groups.join(gpu, mesh, geometry.index_count()))
            }
        };
        Ok(Self { geometry, binding })
    }

    pub fn name(&self) -> &str {
        self.geometry.name()
    }

    pub fn geometry(&self) -> &GeometryBuffer {
        &self.geometry
    }

    pub fn binding(&self) -> &ModelBinding {
        &self.binding
    }

    pub fn is_instance(&self) -> bool {
        matches!(self.binding, ModelBinding::Instanced(_))
    }

    pub fn update_uniform(
        &mut self,
        gpu: &mut impl RenderBackend,
        groups: &mut InstanceGroups,
        record: ModelRecord,
    ) {
        match &mut self.binding {
            ModelBinding::Unique(buffer) => buffer.update_uniform(gpu, record),
            ModelBinding::Instanced(_) => match groups.get_mut(self.geometry.name()) {
                Some(buffer) => buffer.update_uniform(gpu, record),
                None => log::warn!("instance group '{}' is gone", self.geometry.name()),
            },
        }
    }

    /// Upload a unique model's record. Instanced records go up with their group.
    pub fn write_uniform(&mut self, gpu: &mut impl RenderBackend) -> bool {
        match &mut self.binding {
            ModelBinding::Unique(buffer) => buffer.write_uniform(gpu),
            ModelBinding::Instanced(_) => false,
        }
    }

    pub fn begin_frame(&mut self) {
        if let ModelBinding::Unique(buffer) = &mut self.binding {
            buffer.begin_frame();
        }
    }

    /// The direct draw of a unique model.
    pub fn draw_call(&self) -> Option<DrawCall> {
        match &self.binding {
            ModelBinding::Unique(buffer) => Some(DrawCall {
                bind_group: buffer.bind_group()?,
                geometry: self.geometry.slices(),
                kind: DrawKind::Direct {
                    index_count: buffer.indirect_args()[0],
                },
            }),
            ModelBinding::Instanced(_) => None,
        }
    }

    pub fn restore(&mut self, gpu: &mut impl RenderBackend) {
        self.geometry.restore(gpu);
        if let ModelBinding::Unique(buffer) = &mut self.binding {
            buffer.restore(gpu);
        }
    }

    /// Release the geometry, leave the buffer or group, then drop the mesh use.
    pub fn destroy(
        self,
        gpu: &mut impl RenderBackend,
        registry: &mut MeshRegistry,
        groups: &mut InstanceGroups,
    ) {
        let name = self.geometry.name().to_string();
        self.geometry.destroy(gpu);
        match self.binding {
            ModelBinding::Unique(buffer) => buffer.destroy(gpu),
            ModelBinding::Instanced(slot) => groups.leave(gpu, &name, slot),
        }
        registry.release(&name);
    }
}
