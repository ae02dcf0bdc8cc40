//! Camera: where the scene is looked at from and how it is projected.
//!
//! The eye is a position plus a viewing direction rather than a look-at
//! target. Its view matrix is only rebuilt when one of them changes, and the
//! `updated_view` flag tells the world that every model-view product has to
//! be recomputed this frame.

use cgmath::{InnerSpace, Matrix4, Point3, Rad, SquareMatrix, Vector3, Vector4, perspective};

/// Maps OpenGL clip space (depth -1..1) to wgpu clip space (depth 0..1).
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

const WORLD_UP: Vector3<f32> = Vector3::new(0.0, 1.0, 0.0);

/// Up axis for a view along `forward`.
///
/// Looking (almost) straight up or down the world up axis has no defined
/// roll, so the up axis falls back to ±Z: looking down puts -Z at the top of
/// the screen, looking up puts +Z there.
fn up_axis(forward: Vector3<f32>) -> Vector3<f32> {
    if forward.cross(WORLD_UP).magnitude2() < 1e-8 {
        Vector3::unit_z() * forward.y.signum()
    } else {
        WORLD_UP
    }
}

#[derive(Debug, Clone)]
pub struct Eye {
    position: Point3<f32>,
    forward: Vector3<f32>,
    view: Matrix4<f32>,
    updated_view: bool,
}

impl Eye {
    /// A zero `forward` falls back to looking down -Z.
    pub fn new<P: Into<Point3<f32>>, F: Into<Vector3<f32>>>(position: P, forward: F) -> Self {
        let forward = forward.into();
        let forward = if forward.magnitude2() > f32::EPSILON {
            forward.normalize()
        } else {
            log::warn!("eye created with zero forward vector, looking down -Z instead");
            -Vector3::unit_z()
        };
        let mut eye = Self {
            position: position.into(),
            forward,
            view: Matrix4::identity(),
            updated_view: true,
        };
        eye.view = eye.compute_view_matrix();
        eye
    }

    pub fn position(&self) -> Point3<f32> {
        self.position
    }

    /// Unit viewing direction.
    pub fn forward(&self) -> Vector3<f32> {
        self.forward
    }

    pub fn set_position<P: Into<Point3<f32>>>(&mut self, position: P) {
        self.position = position.into();
        self.updated_view = true;
    }

    /// Returns `false` and keeps the old direction if `forward` has no length.
    pub fn set_forward<F: Into<Vector3<f32>>>(&mut self, forward: F) -> bool {
        let forward = forward.into();
        if forward.magnitude2() <= f32::EPSILON {
            log::warn!("ignoring zero forward vector");
            return false;
        }
        self.forward = forward.normalize();
        self.updated_view = true;
        true
    }

    /// Right, up and forward unit vectors of the view.
    pub fn basis(&self) -> (Vector3<f32>, Vector3<f32>, Vector3<f32>) {
        let right = self.forward.cross(up_axis(self.forward)).normalize();
        let up = right.cross(self.forward);
        (right, up, self.forward)
    }

    pub fn compute_view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_to_rh(self.position, self.forward, up_axis(self.forward))
    }

    /// Rebuild the cached view matrix if the eye moved. Returns whether it did.
    pub fn refresh_view(&mut self) -> bool {
        if self.updated_view {
            self.view = self.compute_view_matrix();
        }
        self.updated_view
    }

    /// The cached view matrix as of the last [`Eye::refresh_view`].
    pub fn view_matrix(&self) -> Matrix4<f32> {
        self.view
    }

    pub fn updated_view(&self) -> bool {
        self.updated_view
    }

    pub fn clear_updated_view(&mut self) {
        self.updated_view = false;
    }
}

#[derive(Debug, Clone)]
pub struct Projection {
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width.max(1) as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width.max(1) as f32 / height.max(1) as f32;
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn fovy(&self) -> Rad<f32> {
        self.fovy
    }

    pub fn znear(&self) -> f32 {
        self.znear
    }

    pub fn zfar(&self) -> f32 {
        self.zfar
    }

    /// Perspective matrix in wgpu clip space.
    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

#[derive(Debug, Clone)]
pub struct Camera {
    eye: Eye,
    projection: Projection,
    projection_changed: bool,
}

impl Camera {
    pub fn new(eye: Eye, projection: Projection) -> Self {
        Self {
            eye,
            projection,
            projection_changed: true,
        }
    }

    pub fn eye(&self) -> &Eye {
        &self.eye
    }

    pub fn eye_mut(&mut self) -> &mut Eye {
        &mut self.eye
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn set_projection(&mut self, projection: Projection) {
        self.projection = projection;
        self.projection_changed = true;
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.projection.resize(width, height);
        self.projection_changed = true;
    }

    /// Whether the projection changed since the last call.
    pub fn take_projection_changed(&mut self) -> bool {
        std::mem::take(&mut self.projection_changed)
    }

    pub fn view_projection(&self) -> Matrix4<f32> {
        self.projection.calc_matrix() * self.eye.compute_view_matrix()
    }

    /// Unproject a point given in normalized device coordinates onto the near
    /// plane and return it in world space.
    ///
    /// Falls back to the eye position if the view projection is singular.
    pub fn screen_to_world(&self, ndc: [f32; 2]) -> Point3<f32> {
        let Some(inverse) = self.view_projection().invert() else {
            log::warn!("view projection is not invertible");
            return self.eye.position();
        };
        let point = inverse * Vector4::new(ndc[0], ndc[1], 0.0, 1.0);
        if point.w.abs() <= f32::EPSILON {
            return self.eye.position();
        }
        Point3::new(point.x / point.w, point.y / point.w, point.z / point.w)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use cgmath::{InnerSpace, Vector3};

    use super::{Eye, up_axis};

    #[test]
    fn looking_down_puts_negative_z_on_top() {
        assert_eq!(up_axis(Vector3::new(0.0, -1.0, 0.0)), Vector3::new(0.0, 0.0, -1.0));
        assert_eq!(up_axis(Vector3::new(0.0, 1.0, 0.0)), Vector3::new(0.0, 0.0, 1.0));
        assert_eq!(up_axis(Vector3::new(0.0, 0.0, -1.0)), Vector3::unit_y());
    }

    #[test]
    fn degenerate_basis_has_no_nans() {
        let eye = Eye::new((0.0, 10.0, 0.0), (0.0, -1.0, 0.0));
        let (right, up, forward) = eye.basis();
        assert_relative_eq!(right.magnitude(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(up.magnitude(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(forward.y, -1.0);
        assert!(eye.view_matrix().x.x.is_finite());
    }
}
