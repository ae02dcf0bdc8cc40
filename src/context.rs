//! The wgpu side of the engine.
//!
//! [`GraphicsDevice`] owns the instance, surface, adapter, device and queue
//! together with the model pipelines, and implements [`RenderBackend`] on
//! top of them. Device loss is reported by wgpu through a callback; the
//! callback only records the loss, the engine picks it up on its next frame.

use std::{
    iter,
    sync::{Arc, Mutex},
};

use crate::{
    backend::{
        BindGroupHandle, BindingSlot, BufferHandle, BufferUsage, DeviceLoss, Frame, LossReason,
        RenderBackend, ResourceTable,
    },
    engine::EngineError,
    pipelines::{RenderPipelines, SAMPLE_COUNT},
};

pub struct GraphicsDevice {
    instance: wgpu::Instance,
    surface: wgpu::Surface<'static>,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pipelines: RenderPipelines,
    buffers: ResourceTable<wgpu::Buffer>,
    bind_groups: ResourceTable<wgpu::BindGroup>,
    power_preference: wgpu::PowerPreference,
    lost: Arc<Mutex<Option<DeviceLoss>>>,
    destroying: bool,
}

impl std::fmt::Debug for GraphicsDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsDevice")
            .field("adapter", &self.adapter.get_info())
            .field("config", &self.config)
            .field("buffers", &self.buffers.len())
            .field("bind_groups", &self.bind_groups.len())
            .finish()
    }
}

impl GraphicsDevice {
    /// Acquire a GPU for `target` and configure its surface at `width`x`height`.
    ///
    /// Fails with [`EngineError::Unsupported`] if there is no usable adapter,
    /// device or surface.
    pub async fn new(
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
        power_preference: wgpu::PowerPreference,
    ) -> Result<Self, EngineError> {
        // The instance is a handle to our GPU
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::BROWSER_WEBGPU,
            ..Default::default()
        });
        let surface = instance
            .create_surface(target)
            .map_err(|e| EngineError::Unsupported(format!("no surface context: {}", e)))?;

        let (adapter, device, queue) =
            request_device(&instance, &surface, power_preference).await?;
        let config = surface_config(&surface, &adapter, &device, width, height)?;
        surface.configure(&device, &config);

        let pipelines = RenderPipelines::new(
            &device,
            config.format,
            [config.width, config.height],
            sample_count(&adapter, config.format),
        );

        let lost = Arc::new(Mutex::new(None));
        watch_device_loss(&device, &lost);

        Ok(Self {
            instance,
            surface,
            adapter,
            device,
            queue,
            config,
            pipelines,
            buffers: ResourceTable::new(),
            bind_groups: ResourceTable::new(),
            power_preference,
            lost,
            destroying: false,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn config(&self) -> &wgpu::SurfaceConfiguration {
        &self.config
    }
}

async fn request_device(
    instance: &wgpu::Instance,
    surface: &wgpu::Surface<'static>,
    power_preference: wgpu::PowerPreference,
) -> Result<(wgpu::Adapter, wgpu::Device, wgpu::Queue), EngineError> {
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference,
            compatible_surface: Some(surface),
            force_fallback_adapter: false,
        })
        .await
        .ok_or_else(|| EngineError::Unsupported("no compatible GPU adapter".to_string()))?;
    log::info!("using adapter {:?}", adapter.get_info());

    let required = wgpu::DownlevelFlags::INDIRECT_EXECUTION | wgpu::DownlevelFlags::VERTEX_STORAGE;
    let missing = required - adapter.get_downlevel_capabilities().flags;
    if !missing.is_empty() {
        return Err(EngineError::Unsupported(format!(
            "adapter lacks {:?}",
            missing
        )));
    }

    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("backdrop device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults()
                    .using_resolution(adapter.limits()),
                memory_hints: Default::default(),
            },
            None,
        )
        .await
        .map_err(|e| EngineError::Unsupported(format!("no device: {}", e)))?;

    Ok((adapter, device, queue))
}

fn surface_config(
    surface: &wgpu::Surface<'static>,
    adapter: &wgpu::Adapter,
    device: &wgpu::Device,
    width: u32,
    height: u32,
) -> Result<wgpu::SurfaceConfiguration, EngineError> {
    let caps = surface.get_capabilities(adapter);
    let format = caps
        .formats
        .first()
        .copied()
        .ok_or_else(|| EngineError::Unsupported("surface reports no formats".to_string()))?;
    // the page shows through wherever the scene is transparent
    let alpha_mode = if caps
        .alpha_modes
        .contains(&wgpu::CompositeAlphaMode::PreMultiplied)
    {
        wgpu::CompositeAlphaMode::PreMultiplied
    } else {
        let fallback = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);
        log::warn!(
            "surface does not support premultiplied alpha, using {:?}",
            fallback
        );
        fallback
    };
    let max = device.limits().max_texture_dimension_2d;

    Ok(wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format,
        width: width.clamp(1, max),
        height: height.clamp(1, max),
        present_mode: caps
            .present_modes
            .first()
            .copied()
            .unwrap_or(wgpu::PresentMode::Fifo),
        alpha_mode,
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    })
}

fn sample_count(adapter: &wgpu::Adapter, format: wgpu::TextureFormat) -> u32 {
    let flags = adapter.get_texture_format_features(format).flags;
    let depth_flags = adapter
        .get_texture_format_features(crate::data_structures::texture::Texture::DEPTH_FORMAT)
        .flags;
    if flags.sample_count_supported(SAMPLE_COUNT) && depth_flags.sample_count_supported(SAMPLE_COUNT)
    {
        SAMPLE_COUNT
    } else {
        log::warn!("{:?} does not support {}x multisampling", format, SAMPLE_COUNT);
        1
    }
}

fn watch_device_loss(device: &wgpu::Device, lost: &Arc<Mutex<Option<DeviceLoss>>>) {
    let lost = Arc::clone(lost);
    device.set_device_lost_callback(move |reason, message| {
        let reason = match reason {
            wgpu::DeviceLostReason::Destroyed => LossReason::Destroyed,
            _ => LossReason::Unknown,
        };
        if let Ok(mut slot) = lost.lock() {
            *slot = Some(DeviceLoss { reason, message });
        }
    });
}

fn buffer_usages(usage: BufferUsage) -> wgpu::BufferUsages {
    let usages = match usage {
        BufferUsage::Geometry => wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::INDEX,
        BufferUsage::Uniform => wgpu::BufferUsages::UNIFORM,
        BufferUsage::Storage => wgpu::BufferUsages::STORAGE,
        BufferUsage::Indirect => wgpu::BufferUsages::INDIRECT,
    };
    usages | wgpu::BufferUsages::COPY_DST
}

impl RenderBackend for GraphicsDevice {
    fn create_buffer(&mut self, label: &str, size: u64, usage: BufferUsage) -> BufferHandle {
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: buffer_usages(usage),
            mapped_at_creation: false,
        });
        BufferHandle::from(self.buffers.insert(buffer))
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        match self.buffers.get(buffer.id()) {
            Some(target) => self.queue.write_buffer(target, offset, data),
            None => log::warn!("write to unknown buffer {:?}", buffer),
        }
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        match self.buffers.remove(buffer.id()) {
            Some(buffer) => buffer.destroy(),
            None => log::warn!("destroying unknown buffer {:?}", buffer),
        }
    }

    fn create_bind_group(
        &mut self,
        label: &str,
        slot: BindingSlot,
        buffer: BufferHandle,
    ) -> BindGroupHandle {
        let Some(resource) = self.buffers.get(buffer.id()) else {
            log::warn!("bind group '{}' refers to unknown buffer {:?}", label, buffer);
            return BindGroupHandle::from(u32::MAX);
        };
        let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: self.pipelines.layout(slot),
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: resource.as_entire_binding(),
            }],
            label: Some(label),
        });
        BindGroupHandle::from(self.bind_groups.insert(group))
    }

    fn destroy_bind_group(&mut self, group: BindGroupHandle) {
        if self.bind_groups.remove(group.id()).is_none() {
            log::warn!("destroying unknown bind group {:?}", group);
        }
    }

    fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    fn surface_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn resize(&mut self, width: u32, height: u32) -> (u32, u32) {
        let max = self.max_texture_dimension();
        let size = (width.clamp(1, max), height.clamp(1, max));
        if size != (width, height) {
            log::debug!("clamped surface {}x{} to {}x{}", width, height, size.0, size.1);
        }
        self.config.width = size.0;
        self.config.height = size.1;
        self.surface.configure(&self.device, &self.config);
        self.pipelines.resize(&self.device, [size.0, size.1]);
        size
    }

    fn submit(&mut self, frame: &Frame) -> Result<(), EngineError> {
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            // Reconfigure the surface if it's lost or outdated
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("surface timeout, skipping frame");
                return Ok(());
            }
            Err(e) => return Err(EngineError::Surface(e.to_string())),
        };
        let Some(scene) = self.bind_groups.get(frame.scene.id()) else {
            log::warn!("frame without scene bind group");
            return Ok(());
        };

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });
        for pass in &frame.passes {
            self.pipelines.encode(
                &mut encoder,
                &view,
                pass,
                scene,
                &self.buffers,
                &self.bind_groups,
            );
        }
        self.queue.submit(iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    fn take_device_loss(&mut self) -> Option<DeviceLoss> {
        let mut loss = self.lost.lock().ok()?.take()?;
        if self.destroying {
            loss.reason = LossReason::Destroyed;
        }
        Some(loss)
    }

    fn release_resources(&mut self) {
        self.bind_groups.clear();
        self.buffers.clear();
    }

    async fn recreate(&mut self) -> Result<(), EngineError> {
        self.release_resources();
        let (adapter, device, queue) =
            request_device(&self.instance, &self.surface, self.power_preference).await?;
        let config = surface_config(
            &self.surface,
            &adapter,
            &device,
            self.config.width,
            self.config.height,
        )?;
        self.surface.configure(&device, &config);
        self.pipelines = RenderPipelines::new(
            &device,
            config.format,
            [config.width, config.height],
            sample_count(&adapter, config.format),
        );
        if let Ok(mut slot) = self.lost.lock() {
            *slot = None;
        }
        watch_device_loss(&device, &self.lost);

        self.adapter = adapter;
        self.device = device;
        self.queue = queue;
        self.config = config;
        self.destroying = false;
        Ok(())
    }

    fn destroy(&mut self) {
        self.destroying = true;
        self.release_resources();
        self.device.destroy();
    }
}
