//! Window surface and device setup.
//!
//! [`Context`] owns the surface of a window and its configuration; the
//! device and queue live in the [`WgpuGl`] it hands out, which is what the
//! renderer talks to. [`offscreen`] builds the same backend without a
//! window, for tests and tools.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use winit::window::Window;

use crate::gl::wgpu_backend::{SurfaceViews, WgpuGl};

/// Parameters of the graphics context.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContextOptions {
    /// Composite the canvas with alpha.
    pub alpha: bool,
    /// Give the back buffer a stencil buffer.
    pub stencil: bool,
    /// Report a WebGL2-tier context. Without it the renderer applies the
    /// WebGL1 restrictions.
    pub prefer_webgl2: bool,
    pub power_preference: wgpu::PowerPreference,
}

impl ContextOptions {
    pub fn version(&self) -> u32 {
        if self.prefer_webgl2 { 2 } else { 1 }
    }

    fn depth_format(&self) -> wgpu::TextureFormat {
        if self.stencil {
            wgpu::TextureFormat::Depth24PlusStencil8
        } else {
            wgpu::TextureFormat::Depth32Float
        }
    }
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            alpha: false,
            stencil: true,
            prefer_webgl2: true,
            power_preference: wgpu::PowerPreference::default(),
        }
    }
}

#[derive(Debug)]
pub struct Context {
    pub window: Arc<Window>,
    pub surface: wgpu::Surface<'static>,
    pub config: wgpu::SurfaceConfiguration,
    pub options: ContextOptions,
    device: wgpu::Device,
    depth_texture: wgpu::Texture,
}

fn instance() -> wgpu::Instance {
    wgpu::Instance::new(wgpu::InstanceDescriptor {
        #[cfg(not(target_arch = "wasm32"))]
        backends: wgpu::Backends::PRIMARY,
        #[cfg(target_arch = "wasm32")]
        backends: wgpu::Backends::GL,
        ..wgpu::InstanceDescriptor::new_without_display_handle()
    })
}

async fn request_device(
    instance: &wgpu::Instance,
    surface: Option<&wgpu::Surface<'_>>,
    options: &ContextOptions,
) -> Result<(wgpu::Adapter, wgpu::Device, wgpu::Queue)> {
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: options.power_preference,
            compatible_surface: surface,
            force_fallback_adapter: false,
        })
        .await
        .context("no suitable graphics adapter")?;
    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: None,
            required_features: wgpu::Features::empty(),
            // WebGL doesn't support all of wgpu's features
            required_limits: if cfg!(target_arch = "wasm32") {
                wgpu::Limits::downlevel_webgl2_defaults()
            } else {
                wgpu::Limits::default()
            },
            memory_hints: Default::default(),
            trace: wgpu::Trace::Off,
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
        })
        .await
        .context("failed to create a graphics device")?;
    Ok((adapter, device, queue))
}

/// A backend without a window. The default framebuffer has no surface, so
/// only off-screen render targets can be drawn into.
pub async fn offscreen(options: ContextOptions) -> Result<WgpuGl> {
    let instance = instance();
    let (_, device, queue) = request_device(&instance, None, &options).await?;
    Ok(WgpuGl::new(device, queue, options.version()))
}

impl Context {
    pub async fn new(window: Arc<Window>, options: ContextOptions) -> Result<(Self, WgpuGl)> {
        let size = window.inner_size();
        let instance = instance();
        let surface = instance
            .create_surface(window.clone())
            .context("failed to create a surface for the window")?;
        let (adapter, device, queue) = request_device(&instance, Some(&surface), &options).await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("surface supports no formats")?;
        let wanted_alpha = if options.alpha {
            wgpu::CompositeAlphaMode::PreMultiplied
        } else {
            wgpu::CompositeAlphaMode::Opaque
        };
        let alpha_mode = if surface_caps.alpha_modes.contains(&wanted_alpha) {
            wanted_alpha
        } else {
            surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto)
        };
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps
                .present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let depth_texture = create_depth_texture(&device, &config, options.depth_format());
        log::info!(
            "created {}x{} surface ({:?}) on {}",
            config.width,
            config.height,
            config.format,
            adapter.get_info().name
        );

        let gl = WgpuGl::new(device.clone(), queue, options.version());
        let context = Self {
            window,
            surface,
            config,
            options,
            device,
            depth_texture,
        };
        Ok((context, gl))
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn new_blocking(window: Arc<Window>, options: ContextOptions) -> Result<(Self, WgpuGl)> {
        futures::executor::block_on(Self::new(window, options))
    }

    /// Reconfigure the surface. Zero sizes are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.depth_texture =
            create_depth_texture(&self.device, &self.config, self.options.depth_format());
    }

    /// Acquire the next frame and make it the default framebuffer of `gl`.
    pub fn begin_frame(&self, gl: &mut WgpuGl) -> Result<wgpu::SurfaceTexture> {
        let frame = match self.surface.get_current_texture() {
            wgpu::CurrentSurfaceTexture::Success(frame)
            | wgpu::CurrentSurfaceTexture::Suboptimal(frame) => frame,
            other => anyhow::bail!("failed to acquire the next surface texture: {other:?}"),
        };
        let color = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let depth = self
            .depth_texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        gl.set_surface(Some(SurfaceViews {
            color,
            depth: Some((depth, self.depth_texture.format())),
        }));
        Ok(frame)
    }

    /// Present a frame acquired by [`begin_frame`](Self::begin_frame).
    pub fn end_frame(&self, gl: &mut WgpuGl, frame: wgpu::SurfaceTexture) {
        gl.set_surface(None);
        self.window.pre_present_notify();
        frame.present();
    }
}

fn create_depth_texture(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
    format: wgpu::TextureFormat,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth_texture"),
        size: wgpu::Extent3d {
            width: config.width,
            height: config.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_ask_for_webgl2() {
        let options = ContextOptions::default();
        assert_eq!(options.version(), 2);
        assert_eq!(options.depth_format(), wgpu::TextureFormat::Depth24PlusStencil8);
    }

    #[test]
    fn webgl1_tier_can_be_forced() {
        let options = ContextOptions {
            prefer_webgl2: false,
            stencil: false,
            ..Default::default()
        };
        assert_eq!(options.version(), 1);
        assert_eq!(options.depth_format(), wgpu::TextureFormat::Depth32Float);
    }
}
