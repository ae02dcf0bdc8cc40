//! Entity transforms and the per-model record uploaded to the GPU.
//!
//! A transform is position, rotation and scale with a cached world matrix.
//! Setters mark it dirty so the matrix and the uploaded record are only
//! recomputed when something actually moved.

use cgmath::{Matrix, Matrix3, Matrix4, One, Quaternion, SquareMatrix, Vector3};

/// Position, rotation (as quaternion) and scale of one entity.
#[derive(Clone, Debug)]
pub struct Transform {
    position: Vector3<f32>,
    rotation: Quaternion<f32>,
    scale: Vector3<f32>,
    matrix: Matrix4<f32>,
    changed: bool,
}

impl Transform {
    pub fn new(position: Vector3<f32>, rotation: Quaternion<f32>, scale: Vector3<f32>) -> Self {
        Self {
            position,
            rotation,
            scale,
            matrix: Matrix4::identity(),
            // a fresh transform has never been uploaded
            changed: true,
        }
    }

    pub fn position(&self) -> Vector3<f32> {
        self.position
    }

    pub fn rotation(&self) -> Quaternion<f32> {
        self.rotation
    }

    pub fn scale(&self) -> Vector3<f32> {
        self.scale
    }

    pub fn set_position(&mut self, position: Vector3<f32>) {
        self.position = position;
        self.changed = true;
    }

    pub fn set_rotation(&mut self, rotation: Quaternion<f32>) {
        self.rotation = rotation;
        self.changed = true;
    }

    pub fn set_scale(&mut self, scale: Vector3<f32>) {
        self.scale = scale;
        self.changed = true;
    }

    /// Apply `delta` after the current rotation.
    pub fn rotate(&mut self, delta: Quaternion<f32>) {
        self.rotation = self.rotation * delta;
        self.changed = true;
    }

    pub fn translate(&mut self, delta: Vector3<f32>) {
        self.position += delta;
        self.changed = true;
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Recompute the cached matrix if the transform is dirty.
    ///
    /// Returns whether it was dirty. The flag stays set until
    /// [`Transform::clear_changed`] so callers can still decide to upload.
    pub fn update_matrix(&mut self) -> bool {
        if self.changed {
            self.matrix = self.compose();
        }
        self.changed
    }

    pub fn clear_changed(&mut self) {
        self.changed = false;
    }

    /// The cached world matrix as of the last [`Transform::update_matrix`].
    pub fn matrix(&self) -> Matrix4<f32> {
        self.matrix
    }

    /// Translation * rotation * scale.
    pub fn compose(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position)
            * Matrix4::from(self.rotation)
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }
}

impl From<Vector3<f32>> for Transform {
    fn from(position: Vector3<f32>) -> Self {
        Transform::new(position, Quaternion::one(), Vector3::new(1.0, 1.0, 1.0))
    }
}

impl Default for Transform {
    fn default() -> Self {
        Transform::from(Vector3::new(0.0, 0.0, 0.0))
    }
}

/// Size in bytes of one [`ModelRecord`] on the GPU.
pub const MODEL_RECORD_SIZE: u64 = std::mem::size_of::<ModelRecord>() as u64;

/**
 * The record is the data stored on the GPU for each drawn model:
 *
 * model_view: view * model as 4x4 column major matrix
 * normal_matrix: transpose(inverse(upper 3x3 of model_view)), each column
 * padded to 16 bytes to match the WGSL mat3x3 layout
 */
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelRecord {
    pub model_view: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 3],
}

impl ModelRecord {
    pub fn new(view: &Matrix4<f32>, model: &Matrix4<f32>) -> Self {
        let model_view = view * model;
        let upper = Matrix3::from_cols(
            model_view.x.truncate(),
            model_view.y.truncate(),
            model_view.z.truncate(),
        );
        // singular (zero scale) models fall back to identity
        let normal = upper
            .invert()
            .map(|inverse| inverse.transpose())
            .unwrap_or_else(Matrix3::identity);

        Self {
            model_view: model_view.into(),
            normal_matrix: [
                normal.x.extend(0.0).into(),
                normal.y.extend(0.0).into(),
                normal.z.extend(0.0).into(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use cgmath::{Deg, Matrix4, Quaternion, Rotation3, SquareMatrix, Vector3, Vector4};

    use super::{MODEL_RECORD_SIZE, ModelRecord, Transform};

    #[test]
    fn record_is_112_bytes() {
        assert_eq!(MODEL_RECORD_SIZE, 112);
    }

    #[test]
    fn matrix_is_translation_rotation_scale() {
        let mut transform = Transform::new(
            Vector3::new(1.0, 2.0, 3.0),
            Quaternion::from_angle_z(Deg(90.0)),
            Vector3::new(2.0, 2.0, 2.0),
        );
        assert!(transform.update_matrix());
        let p = transform.matrix() * Vector4::new(1.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(p.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(p.y, 4.0, epsilon = 1e-5);
        assert_relative_eq!(p.z, 3.0, epsilon = 1e-5);
    }

    #[test]
    fn setters_mark_the_transform_dirty() {
        let mut transform = Transform::default();
        transform.update_matrix();
        transform.clear_changed();
        assert!(!transform.update_matrix());

        transform.set_position(Vector3::new(0.0, 1.0, 0.0));
        assert!(transform.is_changed());
        assert!(transform.update_matrix());
        assert_relative_eq!(transform.matrix().w.y, 1.0);
    }

    #[test]
    fn normal_matrix_undoes_non_uniform_scale() {
        let model = Matrix4::from_nonuniform_scale(2.0, 1.0, 1.0);
        let record = ModelRecord::new(&Matrix4::identity(), &model);
        assert_relative_eq!(record.normal_matrix[0][0], 0.5);
        assert_relative_eq!(record.normal_matrix[1][1], 1.0);
        assert_relative_eq!(record.normal_matrix[0][3], 0.0);
        assert_relative_eq!(record.model_view[0][0], 2.0);
    }

    #[test]
    fn zero_scale_yields_identity_normals() {
        let model = Matrix4::from_scale(0.0);
        let record = ModelRecord::new(&Matrix4::identity(), &model);
        assert_relative_eq!(record.normal_matrix[2][2], 1.0);
    }
}
