//! Scene entities: a transform, the model drawn with it and an optional
//! per-frame behaviour.

use cgmath::{Matrix4, Point3, Quaternion, Vector3};

use crate::backend::RenderBackend;

use super::{
    model::Model,
    model_buffer::InstanceGroups,
    transform::{ModelRecord, Transform},
};

/// Input handed to behaviours once per frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameInput {
    /// Mouse position in normalized device coordinates.
    pub mouse_ndc: [f32; 2],
    /// The mouse unprojected onto the camera's near plane.
    pub mouse_world: Point3<f32>,
    /// Seconds since the previous frame.
    pub dt: f32,
}

/// Per-frame motion logic of an entity.
pub trait Behaviour {
    fn update(&mut self, transform: &mut Transform, input: &FrameInput);
}

impl<F> Behaviour for F
where
    F: FnMut(&mut Transform, &FrameInput),
{
    fn update(&mut self, transform: &mut Transform, input: &FrameInput) {
        self(transform, input)
    }
}

pub struct Entity {
    transform: Transform,
    model: Model,
    behaviour: Option<Box<dyn Behaviour>>,
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entity")
            .field("transform", &self.transform)
            .field("model", &self.model.name())
            .field("behaviour", &self.behaviour.is_some())
            .finish()
    }
}

impl Entity {
    pub fn new(transform: Transform, model: Model, behaviour: Option<Box<dyn Behaviour>>) -> Self {
        Self {
            transform,
            model,
            behaviour,
        }
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn position(&self) -> Vector3<f32> {
        self.transform.position()
    }

    pub fn rotation(&self) -> Quaternion<f32> {
        self.transform.rotation()
    }

    pub fn scale(&self) -> Vector3<f32> {
        self.transform.scale()
    }

    pub fn set_position(&mut self, position: Vector3<f32>) {
        self.transform.set_position(position);
    }

    pub fn set_rotation(&mut self, rotation: Quaternion<f32>) {
        self.transform.set_rotation(rotation);
    }

    pub fn set_scale(&mut self, scale: Vector3<f32>) {
        self.transform.set_scale(scale);
    }

    pub fn set_behaviour(&mut self, behaviour: Option<Box<dyn Behaviour>>) {
        self.behaviour = behaviour;
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    pub fn into_model(self) -> Model {
        self.model
    }

    pub fn update(&mut self, input: &FrameInput) {
        if let Some(behaviour) = self.behaviour.as_mut() {
            behaviour.update(&mut self.transform, input);
        }
    }

    /// Whether this entity's record has to be rewritten this frame.
    pub fn needs_upload(&self, view_changed: bool) -> bool {
        self.transform.is_changed() || view_changed
    }

    /// Recompute the matrix if dirty and hand a fresh record to the model.
    ///
    /// `force` covers the independent triggers: a changed camera view, or an
    /// instance group that needs its whole batch rewritten. Returns whether a
    /// record was submitted.
    pub fn write_buffers(
        &mut self,
        gpu: &mut impl RenderBackend,
        view: &Matrix4<f32>,
        force: bool,
        groups: &mut InstanceGroups,
    ) -> bool {
        let changed = self.transform.update_matrix();
        if !changed && !force {
            return false;
        }
        let record = ModelRecord::new(view, &self.transform.matrix());
        self.model.update_uniform(gpu, groups, record);
        self.transform.clear_changed();
        true
    }
}
