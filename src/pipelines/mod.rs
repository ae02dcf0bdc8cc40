//! The unique and instanced model pipelines.
//!
//! Both are compiled from one WGSL template. The unique variant reads its
//! model record from a uniform, the instanced variant indexes a storage array
//! with the built-in instance index. They share the scene bind group, the
//! vertex layout and the colour and depth targets owned here. Without
//! multisampling there is no colour target and passes draw straight onto the
//! surface.

pub mod model;

use crate::{
    backend::{BindingSlot, BufferSlice, DrawKind, LoadOp, Pass, PipelineKind, ResourceTable},
    data_structures::texture::Texture,
};

/// Multisample count the pipelines are built with when the surface format allows it.
pub const SAMPLE_COUNT: u32 = 4;

const MODEL_SHADER: &str = include_str!("model.wgsl");

/// WGSL source of the pipeline variant `kind`.
pub fn shader_source(kind: PipelineKind) -> String {
    let (binding, access) = match kind {
        PipelineKind::Unique => (
            "@group(1) @binding(0)\nvar<uniform> model_data: ModelData;",
            "model_data",
        ),
        PipelineKind::Instanced => (
            "@group(1) @binding(0)\nvar<storage, read> model_data: array<ModelData>;",
            "model_data[instance]",
        ),
    };
    MODEL_SHADER
        .replace("{{MODEL_BINDING}}", binding)
        .replace("{{MODEL_ACCESS}}", access)
}

#[derive(Debug)]
pub struct RenderPipelines {
    scene_layout: wgpu::BindGroupLayout,
    unique_layout: wgpu::BindGroupLayout,
    instanced_layout: wgpu::BindGroupLayout,
    unique: wgpu::RenderPipeline,
    instanced: wgpu::RenderPipeline,
    depth: Texture,
    multisample: Option<Texture>,
    format: wgpu::TextureFormat,
    sample_count: u32,
}

impl RenderPipelines {
    pub fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        size: [u32; 2],
        sample_count: u32,
    ) -> Self {
        let scene_layout = model::mk_buffer_layout(
            device,
            "scene_bind_group_layout",
            wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            wgpu::BufferBindingType::Uniform,
        );
        let unique_layout = model::mk_buffer_layout(
            device,
            "unique_model_bind_group_layout",
            wgpu::ShaderStages::VERTEX,
            wgpu::BufferBindingType::Uniform,
        );
        let instanced_layout = model::mk_buffer_layout(
            device,
            "instanced_model_bind_group_layout",
            wgpu::ShaderStages::VERTEX,
            wgpu::BufferBindingType::Storage { read_only: true },
        );

        let unique = model::mk_model_pipeline(
            device,
            PipelineKind::Unique,
            format,
            sample_count,
            &scene_layout,
            &unique_layout,
        );
        let instanced = model::mk_model_pipeline(
            device,
            PipelineKind::Instanced,
            format,
            sample_count,
            &scene_layout,
            &instanced_layout,
        );

        Self {
            depth: Texture::create_depth_texture(device, size, sample_count, "depth_texture"),
            multisample: mk_multisample(device, size, sample_count, format),
            scene_layout,
            unique_layout,
            instanced_layout,
            unique,
            instanced,
            format,
            sample_count,
        }
    }

    pub fn layout(&self, slot: BindingSlot) -> &wgpu::BindGroupLayout {
        match slot {
            BindingSlot::Scene => &self.scene_layout,
            BindingSlot::UniqueModel => &self.unique_layout,
            BindingSlot::InstancedModel => &self.instanced_layout,
        }
    }

    pub fn pipeline(&self, kind: PipelineKind) -> &wgpu::RenderPipeline {
        match kind {
            PipelineKind::Unique => &self.unique,
            PipelineKind::Instanced => &self.instanced,
        }
    }

    /// Destroy and recreate the depth and multisample targets at `size`.
    ///
    /// Without multisampling only the depth target is recreated.
    pub fn resize(&mut self, device: &wgpu::Device, size: [u32; 2]) {
        let depth =
            Texture::create_depth_texture(device, size, self.sample_count, "depth_texture");
        let multisample = mk_multisample(device, size, self.sample_count, self.format);
        std::mem::replace(&mut self.depth, depth).destroy();
        if let Some(old) = std::mem::replace(&mut self.multisample, multisample) {
            old.destroy();
        }
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn depth_view(&self) -> &wgpu::TextureView {
        &self.depth.view
    }

    /// The view a pass renders into and the view it resolves onto, if any.
    pub fn color_attachment<'a>(
        &'a self,
        target: &'a wgpu::TextureView,
    ) -> (&'a wgpu::TextureView, Option<&'a wgpu::TextureView>) {
        match &self.multisample {
            Some(multisample) => (&multisample.view, Some(target)),
            None => (target, None),
        }
    }

    /// Encode one pass into `encoder` that ends up on `target`.
    ///
    /// Draws whose resources are unknown are skipped with a warning.
    pub(crate) fn encode(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        pass: &Pass,
        scene: &wgpu::BindGroup,
        buffers: &ResourceTable<wgpu::Buffer>,
        bind_groups: &ResourceTable<wgpu::BindGroup>,
    ) {
        // the instance pass keeps what the unique pass drew
        let (color_load, depth_load) = match pass.load {
            LoadOp::Clear([r, g, b, a]) => (
                wgpu::LoadOp::Clear(wgpu::Color {
                    r: r as f64,
                    g: g as f64,
                    b: b as f64,
                    a: a as f64,
                }),
                wgpu::LoadOp::Clear(1.0),
            ),
            LoadOp::Load => (wgpu::LoadOp::Load, wgpu::LoadOp::Load),
        };

        let (view, resolve_target) = self.color_attachment(target);
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(pass.label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target,
                ops: wgpu::Operations {
                    load: color_load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: depth_load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        render_pass.set_pipeline(self.pipeline(pass.pipeline));
        render_pass.set_bind_group(0, scene, &[]);

        let slice = |range: &BufferSlice| {
            buffers
                .get(range.buffer.id())
                .map(|buffer| buffer.slice(range.offset..range.offset + range.size))
        };

        for draw in &pass.draws {
            let (Some(group), Some(vertices), Some(normals), Some(texels), Some(indices)) = (
                bind_groups.get(draw.bind_group.id()),
                slice(&draw.geometry.vertices),
                slice(&draw.geometry.normals),
                slice(&draw.geometry.texels),
                slice(&draw.geometry.indices),
            ) else {
                log::warn!("skipping draw with released resources in {}", pass.label);
                continue;
            };

            render_pass.set_bind_group(1, group, &[]);
            render_pass.set_vertex_buffer(0, vertices);
            render_pass.set_vertex_buffer(1, normals);
            render_pass.set_vertex_buffer(2, texels);
            render_pass.set_index_buffer(indices, wgpu::IndexFormat::Uint32);

            match draw.kind {
                DrawKind::Direct { index_count } => {
                    render_pass.draw_indexed(0..index_count, 0, 0..1);
                }
                DrawKind::Indirect { buffer } => match buffers.get(buffer.id()) {
                    Some(indirect) => render_pass.draw_indexed_indirect(indirect, 0),
                    None => log::warn!("skipping indirect draw without arguments"),
                },
            }
        }
    }

    pub fn destroy(self) {
        self.depth.destroy();
        if let Some(multisample) = self.multisample {
            multisample.destroy();
        }
    }
}

fn mk_multisample(
    device: &wgpu::Device,
    size: [u32; 2],
    sample_count: u32,
    format: wgpu::TextureFormat,
) -> Option<Texture> {
    (sample_count > 1).then(|| {
        Texture::create_multisample_texture(
            device,
            size,
            sample_count,
            format,
            "multisample_texture",
        )
    })
}
