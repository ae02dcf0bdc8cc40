//! The scene: entities, instance groups, the camera and the scene uniform.
//!
//! A frame is recorded in two passes. The unique pass clears the targets and
//! draws every non-instanced entity with its own uniform. The instance pass
//! loads what the unique pass left and issues one indirect draw per mesh
//! group.

use cgmath::Matrix4;

use crate::{
    backend::{
        BindGroupHandle, BindingSlot, BufferHandle, BufferUsage, Frame, LoadOp, Pass,
        PipelineKind, RenderBackend, Rgba,
    },
    camera::Camera,
    data_structures::{
        entity::{Behaviour, Entity, FrameInput},
        id_pool::IdPool,
        model::Model,
        model_buffer::InstanceGroups,
        transform::Transform,
    },
    engine::EngineError,
    resources::{MeshError, MeshRegistry},
};

pub use crate::data_structures::model::SpawnMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u32);

impl From<u32> for EntityId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/**
 * The scene uniform bound at group 0 of both pipelines:
 *
 * projection: 4x4 column major, wgpu clip space
 * light_color: rgba
 */
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SceneUniform {
    pub projection: [[f32; 4]; 4],
    pub light_color: [f32; 4],
}

#[derive(Debug)]
struct SceneResources {
    buffer: BufferHandle,
    bind_group: BindGroupHandle,
    light_color: Rgba,
    dirty: bool,
}

impl SceneResources {
    fn new(gpu: &mut impl RenderBackend, light_color: Rgba) -> Self {
        let buffer = gpu.create_buffer(
            "scene uniform",
            std::mem::size_of::<SceneUniform>() as u64,
            BufferUsage::Uniform,
        );
        let bind_group = gpu.create_bind_group("scene_bind_group", BindingSlot::Scene, buffer);
        Self {
            buffer,
            bind_group,
            light_color,
            dirty: true,
        }
    }

    fn upload(&mut self, gpu: &mut impl RenderBackend, projection: Matrix4<f32>) {
        let uniform = SceneUniform {
            projection: projection.into(),
            light_color: self.light_color,
        };
        gpu.write_buffer(self.buffer, 0, bytemuck::bytes_of(&uniform));
        self.dirty = false;
    }

    fn destroy(&self, gpu: &mut impl RenderBackend) {
        gpu.destroy_bind_group(self.bind_group);
        gpu.destroy_buffer(self.buffer);
    }
}

#[derive(Debug)]
pub struct World {
    camera: Camera,
    entities: Vec<(EntityId, Entity)>,
    ids: IdPool<EntityId>,
    groups: InstanceGroups,
    scene: SceneResources,
    clear_color: Rgba,
}

impl World {
    pub fn new(
        gpu: &mut impl RenderBackend,
        camera: Camera,
        clear_color: Rgba,
        light_color: Rgba,
    ) -> Self {
        Self {
            camera,
            entities: Vec::new(),
            ids: IdPool::new(),
            groups: InstanceGroups::new(),
            scene: SceneResources::new(gpu, light_color),
            clear_color,
        }
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn groups(&self) -> &InstanceGroups {
        &self.groups
    }

    pub fn clear_color(&self) -> Rgba {
        self.clear_color
    }

    pub fn set_clear_color(&mut self, color: Rgba) {
        self.clear_color = color;
    }

    pub fn light_color(&self) -> Rgba {
        self.scene.light_color
    }

    pub fn set_light_color(&mut self, color: Rgba) {
        self.scene.light_color = color;
        self.scene.dirty = true;
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities
            .iter()
            .find_map(|(entity_id, entity)| (*entity_id == id).then_some(entity))
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities
            .iter_mut()
            .find_map(|(entity_id, entity)| (*entity_id == id).then_some(entity))
    }

    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities.iter().map(|(id, entity)| (*id, entity))
    }

    /// Load `mesh` and add an entity drawing it.
    ///
    /// A mesh that fails to load is logged and no entity is created; the
    /// rest of the scene is untouched.
    pub fn spawn(
        &mut self,
        gpu: &mut impl RenderBackend,
        registry: &mut MeshRegistry,
        mesh: &str,
        mode: SpawnMode,
        transform: Transform,
        behaviour: Option<Box<dyn Behaviour>>,
    ) -> Result<EntityId, MeshError> {
        let model = Model::load(gpu, registry, &mut self.groups, mesh, mode)
            .inspect_err(|e| log::warn!("not spawning '{}': {}", mesh, e))?;
        let id = self.ids.acquire();
        self.entities
            .push((id, Entity::new(transform, model, behaviour)));
        Ok(id)
    }

    /// Remove an entity and release its model. Returns `false` for unknown ids.
    pub fn despawn(
        &mut self,
        gpu: &mut impl RenderBackend,
        registry: &mut MeshRegistry,
        id: EntityId,
    ) -> bool {
        let Some(index) = self.entities.iter().position(|(entity_id, _)| *entity_id == id) else {
            log::warn!("despawning unknown entity {:?}", id);
            return false;
        };
        let (_, entity) = self.entities.remove(index);
        entity.into_model().destroy(gpu, registry, &mut self.groups);
        self.ids.remove(id);
        true
    }

    /// Run every entity's behaviour in list order.
    pub fn update(&mut self, mouse_ndc: [f32; 2], dt: f32) {
        let input = FrameInput {
            mouse_ndc,
            mouse_world: self.camera.screen_to_world(mouse_ndc),
            dt,
        };
        for (_, entity) in self.entities.iter_mut() {
            entity.update(&input);
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.camera.resize(width, height);
    }

    /// Record both passes of this frame and submit them.
    pub fn render(&mut self, gpu: &mut impl RenderBackend) -> Result<(), EngineError> {
        let frame = self.record_frame(gpu);
        gpu.submit(&frame)
    }

    pub fn record_frame(&mut self, gpu: &mut impl RenderBackend) -> Frame {
        let view_changed = self.camera.eye_mut().refresh_view();
        let view = self.camera.eye().view_matrix();
        if self.camera.take_projection_changed() || self.scene.dirty {
            self.scene.upload(gpu, self.camera.projection().calc_matrix());
        }

        self.groups.begin_frame();
        for (_, entity) in self.entities.iter_mut() {
            entity.model_mut().begin_frame();
            if entity.model().is_instance() && entity.needs_upload(view_changed) {
                self.groups.mark_stale(entity.model().name());
            }
        }

        let mut unique = Pass {
            label: "unique pass",
            pipeline: PipelineKind::Unique,
            load: LoadOp::Clear(self.clear_color),
            draws: Vec::new(),
        };
        for (_, entity) in self.entities.iter_mut() {
            if entity.model().is_instance() {
                continue;
            }
            entity.write_buffers(gpu, &view, view_changed, &mut self.groups);
            entity.model_mut().write_uniform(gpu);
            if let Some(draw) = entity.model().draw_call() {
                unique.draws.push(draw);
            }
        }

        // stale groups get their whole batch rewritten
        for (_, entity) in self.entities.iter_mut() {
            if entity.model().is_instance() && self.groups.is_stale(entity.model().name()) {
                entity.write_buffers(gpu, &view, true, &mut self.groups);
            }
        }
        let mut instanced = Pass {
            label: "instance pass",
            pipeline: PipelineKind::Instanced,
            load: LoadOp::Load,
            draws: Vec::new(),
        };
        for (_, entity) in self.entities.iter() {
            if !entity.model().is_instance() {
                continue;
            }
            if let Some(draw) = self.groups.draw(gpu, entity.model().geometry()) {
                instanced.draws.push(draw);
            }
        }

        self.camera.eye_mut().clear_updated_view();

        Frame {
            scene: self.scene.bind_group,
            passes: vec![unique, instanced],
        }
    }

    /// Rebuild every GPU resource on a fresh device from the CPU copies.
    pub fn restore(&mut self, gpu: &mut impl RenderBackend) {
        let light_color = self.scene.light_color;
        self.scene = SceneResources::new(gpu, light_color);
        self.groups.restore(gpu);
        for (_, entity) in self.entities.iter_mut() {
            entity.model_mut().restore(gpu);
        }
        log::info!("restored {} entities", self.entities.len());
    }

    /// Drop every entity and group after the device is gone.
    ///
    /// The backend already released the handles, so only the mesh uses and
    /// ids are given back.
    pub fn forget(&mut self, registry: &mut MeshRegistry) {
        for (id, entity) in self.entities.drain(..) {
            registry.release(entity.model().name());
            self.ids.remove(id);
        }
        self.groups.forget();
    }

    /// Despawn everything and release the scene uniform.
    pub fn destroy(&mut self, gpu: &mut impl RenderBackend, registry: &mut MeshRegistry) {
        for (id, entity) in self.entities.drain(..) {
            entity.into_model().destroy(gpu, registry, &mut self.groups);
            self.ids.remove(id);
        }
        self.groups.destroy(gpu);
        self.scene.destroy(gpu);
    }
}
