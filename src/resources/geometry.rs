//! Per-consumer GPU copy of a mesh.

use std::sync::Arc;

use crate::backend::{BufferHandle, BufferSlice, BufferUsage, GeometrySlices, RenderBackend};

use super::mesh::MeshData;

/// One GPU buffer laid out as `[vertices | normals | indices | texels]`.
///
/// The CPU arrays stay shared with the registry through the `Arc`; the GPU
/// buffer belongs to this value alone and is re-uploaded from those arrays
/// after a device loss.
#[derive(Debug)]
pub struct GeometryBuffer {
    mesh: Arc<MeshData>,
    buffer: BufferHandle,
    normals_offset: u64,
    indices_offset: u64,
    texels_offset: u64,
    size: u64,
}

impl GeometryBuffer {
    pub fn upload(gpu: &mut impl RenderBackend, mesh: Arc<MeshData>) -> Self {
        let vertices: &[u8] = bytemuck::cast_slice(&mesh.vertices);
        let normals: &[u8] = bytemuck::cast_slice(&mesh.normals);
        let indices: &[u8] = bytemuck::cast_slice(&mesh.indices);
        let texels: &[u8] = bytemuck::cast_slice(&mesh.texels);

        let normals_offset = vertices.len() as u64;
        let indices_offset = normals_offset + normals.len() as u64;
        let texels_offset = indices_offset + indices.len() as u64;
        let size = texels_offset + texels.len() as u64;

        let buffer = gpu.create_buffer(
            &format!("{}'s geometry buffer", mesh.name),
            size,
            BufferUsage::Geometry,
        );
        let geometry = Self {
            mesh,
            buffer,
            normals_offset,
            indices_offset,
            texels_offset,
            size,
        };
        geometry.write(gpu);
        geometry
    }

    fn write(&self, gpu: &mut impl RenderBackend) {
        gpu.write_buffer(self.buffer, 0, bytemuck::cast_slice(&self.mesh.vertices));
        gpu.write_buffer(
            self.buffer,
            self.normals_offset,
            bytemuck::cast_slice(&self.mesh.normals),
        );
        gpu.write_buffer(
            self.buffer,
            self.indices_offset,
            bytemuck::cast_slice(&self.mesh.indices),
        );
        gpu.write_buffer(
            self.buffer,
            self.texels_offset,
            bytemuck::cast_slice(&self.mesh.texels),
        );
    }

    /// Recreate the GPU buffer on a new device. The old handle is assumed gone.
    pub fn restore(&mut self, gpu: &mut impl RenderBackend) {
        self.buffer = gpu.create_buffer(
            &format!("{}'s geometry buffer", self.mesh.name),
            self.size,
            BufferUsage::Geometry,
        );
        self.write(gpu);
    }

    pub fn destroy(self, gpu: &mut impl RenderBackend) {
        gpu.destroy_buffer(self.buffer);
    }

    pub fn name(&self) -> &str {
        &self.mesh.name
    }

    pub fn mesh(&self) -> &MeshData {
        &self.mesh
    }

    pub fn buffer(&self) -> BufferHandle {
        self.buffer
    }

    pub fn index_count(&self) -> u32 {
        self.mesh.index_count()
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn slices(&self) -> GeometrySlices {
        let slice = |offset: u64, end: u64| BufferSlice {
            buffer: self.buffer,
            offset,
            size: end - offset,
        };
        GeometrySlices {
            vertices: slice(0, self.normals_offset),
            normals: slice(self.normals_offset, self.indices_offset),
            indices: slice(self.indices_offset, self.texels_offset),
            texels: slice(self.texels_offset, self.size),
        }
    }
}
