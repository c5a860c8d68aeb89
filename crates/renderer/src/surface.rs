use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use image::RgbaImage;
use tracing::{debug, warn};
use winit::window::Window;

const FRAME_SHADER: &str = r#"
struct VertexOut {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> VertexOut {
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    var out: VertexOut;
    out.position = vec4<f32>(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0, 0.0, 1.0);
    out.uv = uv;
    return out;
}

@group(0) @binding(0) var frame_texture: texture_2d<f32>;
@group(0) @binding(1) var frame_sampler: sampler;

@fragment
fn fs_premultiplied(in: VertexOut) -> @location(0) vec4<f32> {
    let texel = textureSample(frame_texture, frame_sampler, in.uv);
    return vec4<f32>(texel.rgb * texel.a, texel.a);
}

@fragment
fn fs_straight(in: VertexOut) -> @location(0) vec4<f32> {
    return textureSample(frame_texture, frame_sampler, in.uv);
}
"#;

const FRAME_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Picks a composite mode that lets the desktop show through keyed pixels.
pub(crate) fn pick_alpha_mode(
    modes: &[wgpu::CompositeAlphaMode],
) -> Option<wgpu::CompositeAlphaMode> {
    [
        wgpu::CompositeAlphaMode::PreMultiplied,
        wgpu::CompositeAlphaMode::PostMultiplied,
    ]
    .into_iter()
    .find(|mode| modes.contains(mode))
}

/// Fragment entry point matching how the compositor interprets alpha.
pub(crate) fn fragment_entry(mode: wgpu::CompositeAlphaMode) -> &'static str {
    match mode {
        wgpu::CompositeAlphaMode::PostMultiplied => "fs_straight",
        _ => "fs_premultiplied",
    }
}

/// Prefers a non-sRGB format so 8-bit frame values reach the screen unchanged.
pub(crate) fn pick_surface_format(
    formats: &[wgpu::TextureFormat],
) -> Option<wgpu::TextureFormat> {
    formats
        .iter()
        .copied()
        .find(|format| !format.is_srgb())
        .or_else(|| formats.first().copied())
}

/// Adapter, device and frame pipelines shared by every pet window.
struct Gpu {
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    shader: wgpu::ShaderModule,
    bind_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    pipelines: Vec<(wgpu::TextureFormat, &'static str, wgpu::RenderPipeline)>,
}

impl Gpu {
    fn new(instance: &wgpu::Instance, surface: &wgpu::Surface<'static>) -> Result<Self> {
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::LowPower,
            compatible_surface: Some(surface),
            force_fallback_adapter: false,
        }))
        .context("failed to find a suitable GPU adapter")?;
        let info = adapter.get_info();
        debug!(
            name = %info.name,
            backend = ?info.backend,
            device_type = ?info.device_type,
            "selected GPU adapter"
        );

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("floatpet device"),
            required_features: wgpu::Features::empty(),
            required_limits: adapter.limits(),
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            trace: wgpu::Trace::default(),
        }))
        .context("failed to create GPU device")?;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("pet frame shader"),
            source: wgpu::ShaderSource::Wgsl(FRAME_SHADER.into()),
        });
        let bind_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("pet frame layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("pet frame pipeline layout"),
            bind_group_layouts: &[&bind_layout],
            push_constant_ranges: &[],
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Ok(Self {
            adapter,
            device,
            queue,
            shader,
            bind_layout,
            pipeline_layout,
            sampler,
            pipelines: Vec::new(),
        })
    }

    fn pipeline(
        &mut self,
        format: wgpu::TextureFormat,
        alpha_mode: wgpu::CompositeAlphaMode,
    ) -> wgpu::RenderPipeline {
        let entry = fragment_entry(alpha_mode);
        if let Some((_, _, pipeline)) = self
            .pipelines
            .iter()
            .find(|(cached, cached_entry, _)| *cached == format && *cached_entry == entry)
        {
            return pipeline.clone();
        }

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("pet frame pipeline"),
                layout: Some(&self.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &self.shader,
                    entry_point: Some("vs_main"),
                    buffers: &[],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &self.shader,
                    entry_point: Some(entry),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                multiview: None,
                cache: None,
            });
        self.pipelines.push((format, entry, pipeline.clone()));
        pipeline
    }
}

/// Owns the wgpu instance and lazily opens the shared device on the first
/// window, so the adapter is one that can present to it.
pub(crate) struct Presenter {
    instance: wgpu::Instance,
    gpu: Option<Gpu>,
}

impl Presenter {
    pub(crate) fn new() -> Self {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
            backend_options: wgpu::BackendOptions::default(),
        });
        Self {
            instance,
            gpu: None,
        }
    }

    pub(crate) fn attach(&mut self, window: Arc<Window>) -> Result<PetSurface> {
        let surface = self
            .instance
            .create_surface(window.clone())
            .context("failed to create rendering surface")?;
        let gpu = match self.gpu.take() {
            Some(gpu) => gpu,
            None => Gpu::new(&self.instance, &surface)?,
        };
        let gpu = self.gpu.insert(gpu);

        let caps = surface.get_capabilities(&gpu.adapter);
        let format = pick_surface_format(&caps.formats)
            .ok_or_else(|| anyhow!("surface is not supported by the selected adapter"))?;
        let alpha_mode = match pick_alpha_mode(&caps.alpha_modes) {
            Some(mode) => mode,
            None => {
                let fallback = caps
                    .alpha_modes
                    .first()
                    .copied()
                    .unwrap_or(wgpu::CompositeAlphaMode::Auto);
                warn!(
                    ?fallback,
                    available = ?caps.alpha_modes,
                    "surface cannot blend with the desktop; keyed pixels will be opaque"
                );
                fallback
            }
        };
        let present_mode = caps
            .present_modes
            .iter()
            .copied()
            .find(|mode| *mode == wgpu::PresentMode::Fifo)
            .or_else(|| caps.present_modes.first().copied())
            .unwrap_or(wgpu::PresentMode::Fifo);
        debug!(?format, ?alpha_mode, ?present_mode, "configured pet surface");

        let size = window.inner_size();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&gpu.device, &config);

        Ok(PetSurface {
            surface,
            device: gpu.device.clone(),
            queue: gpu.queue.clone(),
            pipeline: gpu.pipeline(format, alpha_mode),
            bind_layout: gpu.bind_layout.clone(),
            sampler: gpu.sampler.clone(),
            config,
            frame: None,
        })
    }
}

/// Texture holding the latest keyed frame of one window.
struct FrameTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    size: (u32, u32),
}

/// Presentation target for one pet window.
pub(crate) struct PetSurface {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::RenderPipeline,
    bind_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    config: wgpu::SurfaceConfiguration,
    frame: Option<FrameTexture>,
}

impl PetSurface {
    pub(crate) fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        if (self.config.width, self.config.height) == (width, height) {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
    }

    fn upload(&mut self, frame: &RgbaImage) -> Result<()> {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return Err(anyhow!("cannot present a {width}x{height} frame"));
        }
        let extent = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        if self.frame.as_ref().map(|frame| frame.size) != Some((width, height)) {
            let texture = self.device.create_texture(&wgpu::TextureDescriptor {
                label: Some("pet frame texture"),
                size: extent,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: FRAME_FORMAT,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("pet frame bind group"),
                layout: &self.bind_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                ],
            });
            self.frame = Some(FrameTexture {
                texture,
                bind_group,
                size: (width, height),
            });
        }

        let Some(target) = &self.frame else {
            return Ok(());
        };
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            frame.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            extent,
        );
        Ok(())
    }

    fn acquire(&mut self) -> Result<wgpu::SurfaceTexture> {
        match self.surface.get_current_texture() {
            Ok(output) => Ok(output),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                self.surface
                    .get_current_texture()
                    .context("failed to acquire surface texture after reconfigure")
            }
            Err(err) => Err(err).context("failed to acquire surface texture"),
        }
    }

    pub(crate) fn present(&mut self, frame: &RgbaImage) -> Result<()> {
        self.upload(frame)?;
        let Some(target) = &self.frame else {
            return Ok(());
        };
        let bind_group = target.bind_group.clone();
        let output = self.acquire()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("pet frame encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("pet frame pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            render_pass.set_pipeline(&self.pipeline);
            render_pass.set_bind_group(0, &bind_group, &[]);
            render_pass.draw(0..3, 0..1);
        }
        self.queue.submit(Some(encoder.finish()));
        output.present();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wgpu::{CompositeAlphaMode, TextureFormat};

    #[test]
    fn prefers_premultiplied_over_first_reported_mode() {
        let modes = [
            CompositeAlphaMode::Opaque,
            CompositeAlphaMode::PostMultiplied,
            CompositeAlphaMode::PreMultiplied,
        ];
        assert_eq!(pick_alpha_mode(&modes), Some(CompositeAlphaMode::PreMultiplied));
    }

    #[test]
    fn falls_back_to_postmultiplied() {
        let modes = [CompositeAlphaMode::Opaque, CompositeAlphaMode::PostMultiplied];
        assert_eq!(pick_alpha_mode(&modes), Some(CompositeAlphaMode::PostMultiplied));
    }

    #[test]
    fn opaque_only_surfaces_have_no_blending_mode() {
        assert_eq!(pick_alpha_mode(&[CompositeAlphaMode::Opaque]), None);
        assert_eq!(pick_alpha_mode(&[]), None);
    }

    #[test]
    fn straight_alpha_only_for_postmultiplied() {
        assert_eq!(fragment_entry(CompositeAlphaMode::PostMultiplied), "fs_straight");
        assert_eq!(fragment_entry(CompositeAlphaMode::PreMultiplied), "fs_premultiplied");
        assert_eq!(fragment_entry(CompositeAlphaMode::Opaque), "fs_premultiplied");
    }

    #[test]
    fn shader_defines_every_entry_point() {
        for entry in ["vs_main", "fs_straight", "fs_premultiplied"] {
            assert!(FRAME_SHADER.contains(&format!("fn {entry}(")), "{entry}");
        }
    }

    #[test]
    fn surface_format_avoids_srgb_when_possible() {
        let formats = [TextureFormat::Bgra8UnormSrgb, TextureFormat::Bgra8Unorm];
        assert_eq!(pick_surface_format(&formats), Some(TextureFormat::Bgra8Unorm));
        let srgb_only = [TextureFormat::Rgba8UnormSrgb];
        assert_eq!(pick_surface_format(&srgb_only), Some(TextureFormat::Rgba8UnormSrgb));
        assert_eq!(pick_surface_format(&[]), None);
    }
}
