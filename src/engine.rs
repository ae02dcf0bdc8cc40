//! The composition root.
//!
//! [`Engine`] ties a [`RenderBackend`] to the mesh registry and the world
//! and exposes the calls a host page drives it with. It also owns the device
//! state machine: a lost device is recreated once, unless it was lost
//! because the engine itself destroyed it.

use cgmath::{Point3, Rad, Vector3};

use crate::{
    backend::{DeviceLoss, LossReason, RenderBackend, Rgba},
    camera::{Camera, Eye, Projection},
    context::GraphicsDevice,
    data_structures::{entity::Behaviour, transform::Transform},
    resources::{MeshError, MeshRegistry},
    world::{EntityId, SpawnMode, World},
};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No adapter, device or surface context. The engine cannot start.
    #[error("graphics are unsupported: {0}")]
    Unsupported(String),
    /// A lost device could not be brought back.
    #[error("graphics device lost: {0}")]
    DeviceLost(String),
    #[error("surface error: {0}")]
    Surface(String),
    #[error(transparent)]
    Mesh(#[from] MeshError),
}

/// Startup settings. Colours can be changed later through the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub clear_color: Rgba,
    pub light_color: Rgba,
    pub eye_position: Point3<f32>,
    pub eye_forward: Vector3<f32>,
    pub fovy: Rad<f32>,
    pub znear: f32,
    pub zfar: f32,
    pub power_preference: wgpu::PowerPreference,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.0, 0.0, 0.0, 1.0],
            light_color: [1.0, 1.0, 1.0, 1.0],
            eye_position: Point3::new(0.0, 0.0, 5.0),
            eye_forward: Vector3::new(0.0, 0.0, -1.0),
            fovy: Rad(std::f32::consts::PI / 5.0),
            znear: 0.1,
            zfar: 100.0,
            power_preference: wgpu::PowerPreference::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_clear_color(mut self, color: Rgba) -> Self {
        self.clear_color = color;
        self
    }

    pub fn with_light_color(mut self, color: Rgba) -> Self {
        self.light_color = color;
        self
    }

    pub fn with_eye(mut self, position: Point3<f32>, forward: Vector3<f32>) -> Self {
        self.eye_position = position;
        self.eye_forward = forward;
        self
    }

    pub fn with_fovy(mut self, fovy: impl Into<Rad<f32>>) -> Self {
        self.fovy = fovy.into();
        self
    }

    pub fn with_planes(mut self, znear: f32, zfar: f32) -> Self {
        self.znear = znear;
        self.zfar = zfar;
        self
    }

    pub fn with_power_preference(mut self, power_preference: wgpu::PowerPreference) -> Self {
        self.power_preference = power_preference;
        self
    }

    fn camera(&self, width: u32, height: u32) -> Camera {
        Camera::new(
            Eye::new(self.eye_position, self.eye_forward),
            Projection::new(width, height, self.fovy, self.znear, self.zfar),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Active,
    /// `explicit` losses come from [`Engine::destroy`] and are never recovered.
    Lost { explicit: bool },
    Recreating,
}

#[derive(Debug)]
pub struct Engine<B: RenderBackend> {
    backend: B,
    state: DeviceState,
    registry: MeshRegistry,
    world: World,
}

impl Engine<GraphicsDevice> {
    /// Start the engine on a window or canvas of `width`x`height` pixels.
    pub async fn create(
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        let backend = GraphicsDevice::new(target, width, height, config.power_preference)
            .await
            .inspect_err(|e| log::error!("could not start the engine: {}", e))?;
        Ok(Self::with_backend(backend, config))
    }
}

impl<B: RenderBackend> Engine<B> {
    pub fn with_backend(mut backend: B, config: EngineConfig) -> Self {
        let (width, height) = backend.surface_size();
        let world = World::new(
            &mut backend,
            config.camera(width, height),
            config.clear_color,
            config.light_color,
        );
        Self {
            backend,
            state: DeviceState::Active,
            registry: MeshRegistry::new(),
            world,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn registry(&self) -> &MeshRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut MeshRegistry {
        &mut self.registry
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn spawn(
        &mut self,
        mesh: &str,
        mode: SpawnMode,
        transform: Transform,
        behaviour: Option<Box<dyn Behaviour>>,
    ) -> Result<EntityId, MeshError> {
        self.world.spawn(
            &mut self.backend,
            &mut self.registry,
            mesh,
            mode,
            transform,
            behaviour,
        )
    }

    pub fn despawn(&mut self, id: EntityId) -> bool {
        self.world
            .despawn(&mut self.backend, &mut self.registry, id)
    }

    /// Resize the surface. Sizes beyond the device limit are clamped.
    pub fn resize(&mut self, width: u32, height: u32) -> (u32, u32) {
        let (width, height) = self.backend.resize(width, height);
        self.world.resize(width, height);
        (width, height)
    }

    pub fn update(&mut self, mouse_ndc: [f32; 2], dt: f32) {
        self.world.update(mouse_ndc, dt);
    }

    pub fn set_clear_color(&mut self, color: Rgba) {
        self.world.set_clear_color(color);
    }

    pub fn set_global_light_color(&mut self, color: Rgba) {
        self.world.set_light_color(color);
    }

    /// Draw one frame, recovering from a device loss first if one happened.
    pub async fn render(&mut self) -> Result<(), EngineError> {
        if let Some(loss) = self.backend.take_device_loss() {
            self.handle_device_loss(loss).await?;
        }
        match self.state {
            DeviceState::Active => self.world.render(&mut self.backend),
            DeviceState::Lost { explicit: true } => Ok(()),
            DeviceState::Lost { explicit: false } | DeviceState::Recreating => Err(
                EngineError::DeviceLost("the graphics device is unavailable".to_string()),
            ),
        }
    }

    async fn handle_device_loss(&mut self, loss: DeviceLoss) -> Result<(), EngineError> {
        let explicit = loss.reason == LossReason::Destroyed;
        self.state = DeviceState::Lost { explicit };
        self.backend.release_resources();
        if explicit {
            log::info!("device destroyed: {}", loss.message);
            self.world.forget(&mut self.registry);
            return Ok(());
        }

        log::warn!("device lost: {}, recreating", loss.message);
        self.state = DeviceState::Recreating;
        match self.backend.recreate().await {
            Ok(()) => {
                self.world.restore(&mut self.backend);
                self.state = DeviceState::Active;
                log::info!("device recreated");
                Ok(())
            }
            Err(e) => {
                log::error!("could not recreate the device: {}", e);
                self.state = DeviceState::Lost { explicit: false };
                Err(EngineError::DeviceLost(e.to_string()))
            }
        }
    }

    /// Release every GPU resource and the device itself.
    ///
    /// Later renders are no-ops; the resulting device loss is not recovered.
    /// If the device is already gone the scene is dropped without GPU calls.
    pub fn destroy(&mut self) {
        match self.state {
            DeviceState::Lost { explicit: true } => return,
            DeviceState::Active => self.world.destroy(&mut self.backend, &mut self.registry),
            DeviceState::Lost { explicit: false } | DeviceState::Recreating => {
                self.world.forget(&mut self.registry)
            }
        }
        self.state = DeviceState::Lost { explicit: true };
        self.backend.destroy();
    }
}
