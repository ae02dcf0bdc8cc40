//! Render target textures.
//!
//! The pipelines render into a multisampled colour target resolved onto the
//! surface, with a matching multisampled depth buffer. At a sample count of 1
//! only the depth buffer exists. Both are recreated whenever the surface size
//! changes.

/// A GPU texture with its default view.
#[derive(Debug)]
pub struct Texture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl Texture {
    /// Standard depth buffer texture format (32-bit float).
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    /// Create a depth texture for depth-testing during rendering.
    ///
    /// * `size` is [width, height] of the texture in pixels
    /// * `sample_count` has to match the colour target it is used with
    pub fn create_depth_texture(
        device: &wgpu::Device,
        size: [u32; 2],
        sample_count: u32,
        label: &str,
    ) -> Self {
        Self::create_attachment(device, size, sample_count, Self::DEPTH_FORMAT, label)
    }

    /// Create the multisampled colour target that is resolved onto the surface.
    pub fn create_multisample_texture(
        device: &wgpu::Device,
        size: [u32; 2],
        sample_count: u32,
        format: wgpu::TextureFormat,
        label: &str,
    ) -> Self {
        Self::create_attachment(device, size, sample_count, format, label)
    }

    fn create_attachment(
        device: &wgpu::Device,
        size: [u32; 2],
        sample_count: u32,
        format: wgpu::TextureFormat,
        label: &str,
    ) -> Self {
        let size = wgpu::Extent3d {
            width: size[0].max(1),
            height: size[1].max(1),
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self { texture, view }
    }

    pub fn destroy(self) {
        self.texture.destroy();
    }
}
