#[cfg(feature = "integration-tests")]
use backdrop_ngin::{
    backend::{BindingSlot, PipelineKind},
    pipelines::{RenderPipelines, SAMPLE_COUNT},
};

#[cfg(feature = "integration-tests")]
async fn device() -> Option<(wgpu::Device, wgpu::Queue)> {
    let instance = wgpu::Instance::default();
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions::default())
        .await?;
    adapter
        .request_device(&wgpu::DeviceDescriptor::default(), None)
        .await
        .ok()
}

#[test]
#[cfg(feature = "integration-tests")]
fn pipelines_validate_on_a_real_device() {
    futures::executor::block_on(async {
        let Some((device, _queue)) = device().await else {
            eprintln!("no adapter, skipping");
            return;
        };

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        for sample_count in [1, SAMPLE_COUNT] {
            let mut pipelines = RenderPipelines::new(
                &device,
                wgpu::TextureFormat::Rgba8UnormSrgb,
                [256, 128],
                sample_count,
            );
            let _ = pipelines.pipeline(PipelineKind::Unique);
            let _ = pipelines.pipeline(PipelineKind::Instanced);
            let _ = pipelines.layout(BindingSlot::InstancedModel);
            pipelines.resize(&device, [512, 512]);
            pipelines.destroy();
        }
        let error = device.pop_error_scope().await;
        assert!(error.is_none(), "{:?}", error);
    });
}

#[test]
#[cfg(feature = "integration-tests")]
fn passes_encode_with_and_without_multisampling() {
    futures::executor::block_on(async {
        let Some((device, queue)) = device().await else {
            eprintln!("no adapter, skipping");
            return;
        };

        let format = wgpu::TextureFormat::Rgba8UnormSrgb;
        let target = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("offscreen target"),
            size: wgpu::Extent3d {
                width: 64,
                height: 64,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let target_view = target.create_view(&wgpu::TextureViewDescriptor::default());

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        for sample_count in [1, SAMPLE_COUNT] {
            let pipelines = RenderPipelines::new(&device, format, [64, 64], sample_count);
            let (view, resolve_target) = pipelines.color_attachment(&target_view);
            assert_eq!(resolve_target.is_some(), sample_count > 1);

            let mut encoder =
                device.create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
            let passes = [
                (
                    PipelineKind::Unique,
                    wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    wgpu::LoadOp::Clear(1.0),
                ),
                (PipelineKind::Instanced, wgpu::LoadOp::Load, wgpu::LoadOp::Load),
            ];
            for (kind, color_load, depth_load) in passes {
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("test pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view,
                        resolve_target,
                        ops: wgpu::Operations {
                            load: color_load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                        view: pipelines.depth_view(),
                        depth_ops: Some(wgpu::Operations {
                            load: depth_load,
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }),
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
                pass.set_pipeline(pipelines.pipeline(kind));
            }
            queue.submit(std::iter::once(encoder.finish()));
            assert_eq!(pipelines.sample_count(), sample_count);
            pipelines.destroy();
        }
        let error = device.pop_error_scope().await;
        assert!(error.is_none(), "{:?}", error);
    });
}
