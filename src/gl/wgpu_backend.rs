//! [`GraphicsApi`] on top of a `wgpu` device.
//!
//! WebGL objects map onto wgpu ones as follows:
//!
//! - a texture handle owns a `wgpu::Texture` that is (re)allocated by the
//!   level 0 upload, with a full mip chain and six layers for cube maps
//! - sampling parameters are recorded per texture and turned into a
//!   `wgpu::Sampler` on request
//! - framebuffers and renderbuffers are attachment records; a clear runs a
//!   render pass over the attached views
//! - mipmaps of RGBA8 textures are generated on the CPU from a copy of the
//!   base level
//!
//! The back buffer is whatever view was last handed to
//! [`WgpuGl::set_surface`], usually the current swapchain frame.

use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};
use image::{RgbaImage, imageops};

use super::{
    Attachment, ClearMask, FramebufferHandle, FramebufferStatus, GraphicsApi, ImageTarget,
    PixelFormat, PixelType, RenderbufferFormat, RenderbufferHandle, TexImage, TexParameter,
    TextureFilter, TextureHandle, TextureTarget, WrapMode, extension,
};
use crate::resources::texture::RESAMPLE_FILTER;

const MAX_ANISOTROPY: f32 = 16.0;

#[derive(Clone, Copy, Debug, PartialEq)]
struct SamplerState {
    wrap_s: WrapMode,
    wrap_t: WrapMode,
    mag_filter: TextureFilter,
    min_filter: TextureFilter,
    anisotropy: f32,
}

impl Default for SamplerState {
    /// The native defaults of a fresh texture object.
    fn default() -> Self {
        Self {
            wrap_s: WrapMode::Repeat,
            wrap_t: WrapMode::Repeat,
            mag_filter: TextureFilter::Linear,
            min_filter: TextureFilter::NearestMipmapLinear,
            anisotropy: 1.0,
        }
    }
}

#[derive(Debug, Default)]
struct TextureRecord {
    target: Option<TextureTarget>,
    texture: Option<wgpu::Texture>,
    size: (u32, u32),
    sampler: SamplerState,
    /// CPU copy of level 0 per layer, kept for RGBA8 textures only.
    base_images: BTreeMap<u32, RgbaImage>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Attached {
    Texture(TextureHandle, ImageTarget, u32),
    Renderbuffer(RenderbufferHandle),
}

#[derive(Debug, Default)]
struct FramebufferRecord {
    attachments: BTreeMap<Attachment, Attached>,
    draw_buffers: Vec<Attachment>,
}

#[derive(Debug, Default)]
struct RenderbufferRecord {
    texture: Option<wgpu::Texture>,
    size: (u32, u32),
}

/// The on-screen destination of the default framebuffer.
#[derive(Clone, Debug)]
pub struct SurfaceViews {
    pub color: wgpu::TextureView,
    pub depth: Option<(wgpu::TextureView, wgpu::TextureFormat)>,
}

#[derive(Debug)]
pub struct WgpuGl {
    device: wgpu::Device,
    queue: wgpu::Queue,
    version: u32,
    next_handle: u32,
    textures: HashMap<TextureHandle, TextureRecord>,
    framebuffers: HashMap<FramebufferHandle, FramebufferRecord>,
    renderbuffers: HashMap<RenderbufferHandle, RenderbufferRecord>,
    active_slot: u32,
    bound_textures: HashMap<(u32, TextureTarget), TextureHandle>,
    bound_framebuffer: Option<FramebufferHandle>,
    bound_renderbuffer: Option<RenderbufferHandle>,
    flip_y: bool,
    clear_color: wgpu::Color,
    surface: Option<SurfaceViews>,
}

impl WgpuGl {
    /// Wrap a device. `version` is the API tier reported to the renderer,
    /// `1` restricts it to WebGL1 behavior.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, version: u32) -> Self {
        Self {
            device,
            queue,
            version,
            next_handle: 1,
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            renderbuffers: HashMap::new(),
            active_slot: 0,
            bound_textures: HashMap::new(),
            bound_framebuffer: None,
            bound_renderbuffer: None,
            flip_y: false,
            clear_color: wgpu::Color::BLACK,
            surface: None,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Set the views the default framebuffer renders into.
    pub fn set_surface(&mut self, surface: Option<SurfaceViews>) {
        self.surface = surface;
    }

    pub fn texture(&self, handle: TextureHandle) -> Option<&wgpu::Texture> {
        self.textures.get(&handle)?.texture.as_ref()
    }

    /// A view over every level and layer of the texture, typed by the
    /// target it was first bound to.
    pub fn texture_view(&self, handle: TextureHandle) -> Option<wgpu::TextureView> {
        let record = self.textures.get(&handle)?;
        let texture = record.texture.as_ref()?;
        let dimension = match record.target {
            Some(TextureTarget::CubeMap) => wgpu::TextureViewDimension::Cube,
            _ => wgpu::TextureViewDimension::D2,
        };
        Some(texture.create_view(&wgpu::TextureViewDescriptor {
            dimension: Some(dimension),
            ..Default::default()
        }))
    }

    /// A sampler matching the parameters last set on the texture.
    pub fn sampler(&self, handle: TextureHandle) -> Option<wgpu::Sampler> {
        let state = self.textures.get(&handle)?.sampler;
        let (mag_filter, _) = filter_modes(state.mag_filter);
        let (min_filter, mipmap) = filter_modes(state.min_filter);
        let all_linear = mag_filter == wgpu::FilterMode::Linear
            && min_filter == wgpu::FilterMode::Linear
            && mipmap == Some(wgpu::FilterMode::Linear);
        let anisotropy_clamp = if all_linear {
            state.anisotropy.clamp(1.0, MAX_ANISOTROPY) as u16
        } else {
            1
        };

        Some(self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("flow-gl sampler"),
            address_mode_u: address_mode(state.wrap_s),
            address_mode_v: address_mode(state.wrap_t),
            address_mode_w: address_mode(state.wrap_t),
            mag_filter,
            min_filter,
            mipmap_filter: match mipmap.unwrap_or(wgpu::FilterMode::Nearest) {
                wgpu::FilterMode::Nearest => wgpu::MipmapFilterMode::Nearest,
                wgpu::FilterMode::Linear => wgpu::MipmapFilterMode::Linear,
            },
            lod_min_clamp: 0.0,
            lod_max_clamp: if mipmap.is_some() { 32.0 } else { 0.0 },
            anisotropy_clamp,
            ..Default::default()
        }))
    }

    fn allocate_handle(&mut self, kind: &str) -> Result<u32> {
        let handle = self.next_handle;
        self.next_handle = handle
            .checked_add(1)
            .with_context(|| format!("out of {kind} handles"))?;
        Ok(handle)
    }

    fn bound_texture(&self, target: TextureTarget) -> Option<TextureHandle> {
        self.bound_textures.get(&(self.active_slot, target)).copied()
    }

    fn allocate_texture(
        &self,
        target: TextureTarget,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Option<wgpu::Texture> {
        let Some(size) = texture_extent(target, width, height) else {
            log::warn!("skipping storage for an empty {width}x{height} {target:?}");
            return None;
        };
        let mip_level_count = if format.is_depth_stencil_format() {
            1
        } else {
            32 - width.max(height).max(1).leading_zeros()
        };
        let wanted = wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_DST
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::RENDER_ATTACHMENT;
        let allowed = format
            .guaranteed_format_features(self.device.features())
            .allowed_usages;

        Some(self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("flow-gl texture"),
            size,
            mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wanted & allowed,
            view_formats: &[],
        }))
    }

    fn framebuffer_status(&self, framebuffer: FramebufferHandle) -> FramebufferStatus {
        let Some(record) = self.framebuffers.get(&framebuffer) else {
            return FramebufferStatus::IncompleteMissingAttachment;
        };
        attachment_status(
            record
                .attachments
                .values()
                .map(|attached| self.attached_size(attached)),
        )
    }

    fn attached_size(&self, attached: &Attached) -> Option<(u32, u32)> {
        match attached {
            Attached::Texture(handle, _, level) => {
                let record = self.textures.get(handle)?;
                record.texture.as_ref()?;
                Some(((record.size.0 >> level).max(1), (record.size.1 >> level).max(1)))
            }
            Attached::Renderbuffer(handle) => {
                let record = self.renderbuffers.get(handle)?;
                record.texture.as_ref()?;
                Some(record.size)
            }
        }
    }

    fn attachment_view(&self, attached: &Attached) -> Option<(wgpu::TextureView, wgpu::TextureFormat)> {
        match attached {
            Attached::Texture(handle, target, level) => {
                let texture = self.textures.get(handle)?.texture.as_ref()?;
                let layer = match target {
                    ImageTarget::Texture2D => 0,
                    ImageTarget::CubeFace(face) => face.index() as u32,
                };
                let view = texture.create_view(&wgpu::TextureViewDescriptor {
                    dimension: Some(wgpu::TextureViewDimension::D2),
                    base_mip_level: *level,
                    mip_level_count: Some(1),
                    base_array_layer: layer,
                    array_layer_count: Some(1),
                    ..Default::default()
                });
                Some((view, texture.format()))
            }
            Attached::Renderbuffer(handle) => {
                let texture = self.renderbuffers.get(handle)?.texture.as_ref()?;
                Some((
                    texture.create_view(&wgpu::TextureViewDescriptor::default()),
                    texture.format(),
                ))
            }
        }
    }

    /// Color views in draw-buffer order and the depth view of a framebuffer.
    fn framebuffer_views(
        &self,
        framebuffer: FramebufferHandle,
    ) -> (Vec<wgpu::TextureView>, Option<(wgpu::TextureView, wgpu::TextureFormat)>) {
        let Some(record) = self.framebuffers.get(&framebuffer) else {
            return (Vec::new(), None);
        };
        let default_buffers = [Attachment::Color(0)];
        let draw_buffers: &[Attachment] = if record.draw_buffers.is_empty() {
            &default_buffers
        } else {
            &record.draw_buffers
        };
        let colors = draw_buffers
            .iter()
            .filter_map(|point| record.attachments.get(point))
            .filter_map(|attached| self.attachment_view(attached))
            .map(|(view, _)| view)
            .collect();
        let depth = [Attachment::DepthStencil, Attachment::Depth]
            .iter()
            .filter_map(|point| record.attachments.get(point))
            .find_map(|attached| self.attachment_view(attached));
        (colors, depth)
    }
}

impl GraphicsApi for WgpuGl {
    fn context_version(&self) -> u32 {
        self.version
    }

    fn max_texture_size(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    fn max_anisotropy(&self) -> f32 {
        MAX_ANISOTROPY
    }

    /// wgpu covers every extension the renderer asks for.
    fn query_extension(&self, name: &str) -> bool {
        matches!(
            name,
            extension::TEXTURE_HALF_FLOAT
                | extension::TEXTURE_FLOAT
                | extension::DEPTH_TEXTURE
                | extension::DRAW_BUFFERS
                | extension::TEXTURE_FILTER_ANISOTROPIC
        )
    }

    fn create_texture(&mut self) -> Result<TextureHandle> {
        let handle = TextureHandle(self.allocate_handle("texture")?);
        self.textures.insert(handle, TextureRecord::default());
        Ok(handle)
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        if let Some(record) = self.textures.remove(&texture) {
            if let Some(native) = record.texture {
                native.destroy();
            }
        }
        self.bound_textures.retain(|_, bound| *bound != texture);
    }

    fn active_texture(&mut self, slot: u32) {
        self.active_slot = slot;
    }

    fn bind_texture(&mut self, target: TextureTarget, texture: Option<TextureHandle>) {
        let Some(handle) = texture else {
            self.bound_textures.remove(&(self.active_slot, target));
            return;
        };
        let Some(record) = self.textures.get_mut(&handle) else {
            log::warn!("bind of unknown texture {handle:?}");
            return;
        };
        match record.target {
            None => record.target = Some(target),
            Some(existing) if existing != target => {
                log::warn!("texture {handle:?} is a {existing:?}, cannot bind it as {target:?}");
                return;
            }
            Some(_) => (),
        }
        self.bound_textures.insert((self.active_slot, target), handle);
    }

    fn pixel_store_flip_y(&mut self, flip_y: bool) {
        self.flip_y = flip_y;
    }

    fn tex_parameter_i(&mut self, target: TextureTarget, parameter: TexParameter, value: u32) {
        let Some(handle) = self.bound_texture(target) else {
            return;
        };
        let Some(record) = self.textures.get_mut(&handle) else {
            return;
        };
        let sampler = &mut record.sampler;
        match parameter {
            TexParameter::WrapS => sampler.wrap_s = WrapMode::from_gl(value).unwrap_or(sampler.wrap_s),
            TexParameter::WrapT => sampler.wrap_t = WrapMode::from_gl(value).unwrap_or(sampler.wrap_t),
            TexParameter::MagFilter => {
                sampler.mag_filter = TextureFilter::from_gl(value).unwrap_or(sampler.mag_filter)
            }
            TexParameter::MinFilter => {
                sampler.min_filter = TextureFilter::from_gl(value).unwrap_or(sampler.min_filter)
            }
            TexParameter::MaxAnisotropy => sampler.anisotropy = value as f32,
        }
    }

    fn tex_parameter_f(&mut self, target: TextureTarget, parameter: TexParameter, value: f32) {
        if parameter != TexParameter::MaxAnisotropy {
            self.tex_parameter_i(target, parameter, value as u32);
            return;
        }
        if let Some(record) = self
            .bound_texture(target)
            .and_then(|handle| self.textures.get_mut(&handle))
        {
            record.sampler.anisotropy = value;
        }
    }

    fn tex_image_2d(&mut self, target: ImageTarget, level: u32, image: TexImage<'_>) {
        let texture_target = target.texture_target();
        let Some(handle) = self.bound_texture(texture_target) else {
            log::warn!("tex_image_2d without a bound {texture_target:?}");
            return;
        };
        let Some((format, bytes_per_pixel)) = texture_format(&image) else {
            log::warn!(
                "unsupported texture format {:?}/{:?}/{:?}",
                image.internal_format,
                image.format,
                image.pixel_type
            );
            return;
        };
        let layer = match target {
            ImageTarget::Texture2D => 0,
            ImageTarget::CubeFace(face) => face.index() as u32,
        };

        if level == 0 {
            let current = self.textures.get(&handle).and_then(|record| {
                let texture = record.texture.as_ref()?;
                Some((texture.format(), record.size))
            });
            if current != Some((format, (image.width, image.height))) {
                let texture = self.allocate_texture(texture_target, format, image.width, image.height);
                if let Some(record) = self.textures.get_mut(&handle) {
                    if let Some(old) = std::mem::replace(&mut record.texture, texture) {
                        old.destroy();
                    }
                    record.size = (image.width, image.height);
                    record.base_images.clear();
                }
            }
        }

        let Some(record) = self.textures.get_mut(&handle) else {
            return;
        };
        let Some(texture) = record.texture.as_ref() else {
            if level > 0 {
                log::warn!("level {level} uploaded before level 0");
            }
            return;
        };
        if level >= texture.mip_level_count()
            || image.width > (record.size.0 >> level).max(1)
            || image.height > (record.size.1 >> level).max(1)
        {
            log::warn!(
                "level {level} of size {}x{} does not fit a {}x{} texture",
                image.width,
                image.height,
                record.size.0,
                record.size.1
            );
            return;
        }

        let Some(data) = image.data else {
            return;
        };
        if format.is_depth_stencil_format() {
            log::debug!("ignoring pixel data for depth texture {handle:?}");
            return;
        }
        let Some(mut pixels) = convert_pixels(&image, data, bytes_per_pixel) else {
            log::warn!(
                "pixel data of {} bytes is too short for a {}x{} {:?} image",
                data.len(),
                image.width,
                image.height,
                image.format
            );
            return;
        };
        if self.flip_y {
            flip_rows(&mut pixels, (image.width * bytes_per_pixel) as usize);
        }

        write_level(
            &self.queue,
            texture,
            level,
            layer,
            image.width,
            image.height,
            bytes_per_pixel,
            &pixels,
        );

        if level == 0 && format == wgpu::TextureFormat::Rgba8Unorm {
            if let Some(base) = RgbaImage::from_raw(image.width, image.height, pixels) {
                record.base_images.insert(layer, base);
            }
        }
    }

    fn generate_mipmap(&mut self, target: TextureTarget) {
        let Some(handle) = self.bound_texture(target) else {
            return;
        };
        let Some(record) = self.textures.get(&handle) else {
            return;
        };
        let Some(texture) = record.texture.as_ref() else {
            return;
        };
        if record.base_images.is_empty() {
            log::debug!("no CPU copy of texture {handle:?}, mipmaps not generated");
            return;
        }
        for (layer, base) in &record.base_images {
            for level in 1..texture.mip_level_count() {
                let width = (base.width() >> level).max(1);
                let height = (base.height() >> level).max(1);
                let resized = imageops::resize(base, width, height, RESAMPLE_FILTER);
                write_level(&self.queue, texture, level, *layer, width, height, 4, resized.as_raw());
            }
        }
    }

    fn create_framebuffer(&mut self) -> Result<FramebufferHandle> {
        let handle = FramebufferHandle(self.allocate_handle("framebuffer")?);
        self.framebuffers.insert(handle, FramebufferRecord::default());
        Ok(handle)
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        self.framebuffers.remove(&framebuffer);
        if self.bound_framebuffer == Some(framebuffer) {
            self.bound_framebuffer = None;
        }
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>) {
        self.bound_framebuffer = framebuffer;
    }

    fn framebuffer_texture_2d(
        &mut self,
        attachment: Attachment,
        target: ImageTarget,
        texture: Option<TextureHandle>,
        level: u32,
    ) {
        let Some(record) = self
            .bound_framebuffer
            .and_then(|framebuffer| self.framebuffers.get_mut(&framebuffer))
        else {
            log::warn!("framebuffer_texture_2d without a bound framebuffer");
            return;
        };
        match texture {
            Some(handle) => {
                record
                    .attachments
                    .insert(attachment, Attached::Texture(handle, target, level));
            }
            None => {
                record.attachments.remove(&attachment);
            }
        }
    }

    fn check_framebuffer_status(&mut self) -> FramebufferStatus {
        match self.bound_framebuffer {
            Some(framebuffer) => self.framebuffer_status(framebuffer),
            None => FramebufferStatus::Complete,
        }
    }

    fn draw_buffers(&mut self, buffers: &[Attachment]) {
        if let Some(record) = self
            .bound_framebuffer
            .and_then(|framebuffer| self.framebuffers.get_mut(&framebuffer))
        {
            record.draw_buffers = buffers.to_vec();
        }
    }

    fn draw_buffers_webgl(&mut self, buffers: &[Attachment]) {
        self.draw_buffers(buffers);
    }

    fn create_renderbuffer(&mut self) -> Result<RenderbufferHandle> {
        let handle = RenderbufferHandle(self.allocate_handle("renderbuffer")?);
        self.renderbuffers.insert(handle, RenderbufferRecord::default());
        Ok(handle)
    }

    fn delete_renderbuffer(&mut self, renderbuffer: RenderbufferHandle) {
        if let Some(native) = self
            .renderbuffers
            .remove(&renderbuffer)
            .and_then(|record| record.texture)
        {
            native.destroy();
        }
        if self.bound_renderbuffer == Some(renderbuffer) {
            self.bound_renderbuffer = None;
        }
    }

    fn bind_renderbuffer(&mut self, renderbuffer: Option<RenderbufferHandle>) {
        self.bound_renderbuffer = renderbuffer;
    }

    fn renderbuffer_storage(&mut self, format: RenderbufferFormat, width: u32, height: u32) {
        let Some(handle) = self.bound_renderbuffer else {
            log::warn!("renderbuffer_storage without a bound renderbuffer");
            return;
        };
        let format = match format {
            RenderbufferFormat::DepthComponent16 => wgpu::TextureFormat::Depth16Unorm,
            RenderbufferFormat::DepthStencil => wgpu::TextureFormat::Depth24PlusStencil8,
        };
        let Some(size) = texture_extent(TextureTarget::Texture2D, width, height) else {
            log::warn!("skipping storage for an empty {width}x{height} renderbuffer");
            return;
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("flow-gl renderbuffer"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        if let Some(record) = self.renderbuffers.get_mut(&handle) {
            if let Some(old) = record.texture.replace(texture) {
                old.destroy();
            }
            record.size = (width, height);
        }
    }

    fn framebuffer_renderbuffer(
        &mut self,
        attachment: Attachment,
        renderbuffer: Option<RenderbufferHandle>,
    ) {
        let Some(record) = self
            .bound_framebuffer
            .and_then(|framebuffer| self.framebuffers.get_mut(&framebuffer))
        else {
            log::warn!("framebuffer_renderbuffer without a bound framebuffer");
            return;
        };
        match renderbuffer {
            Some(handle) => {
                record
                    .attachments
                    .insert(attachment, Attached::Renderbuffer(handle));
            }
            None => {
                record.attachments.remove(&attachment);
            }
        }
    }

    fn clear_color(&mut self, rgba: [f32; 4]) {
        let [r, g, b, a] = rgba.map(f64::from);
        self.clear_color = wgpu::Color { r, g, b, a };
    }

    fn clear(&mut self, mask: ClearMask) {
        let (colors, depth) = match self.bound_framebuffer {
            Some(framebuffer) => {
                let status = self.framebuffer_status(framebuffer);
                if status != FramebufferStatus::Complete {
                    log::warn!("not clearing incomplete framebuffer {framebuffer:?}: {status:?}");
                    return;
                }
                self.framebuffer_views(framebuffer)
            }
            None => match &self.surface {
                Some(surface) => (vec![surface.color.clone()], surface.depth.clone()),
                None => {
                    log::debug!("no surface to clear");
                    return;
                }
            },
        };
        if colors.is_empty() && depth.is_none() {
            return;
        }

        let color_load = if mask.color {
            wgpu::LoadOp::Clear(self.clear_color)
        } else {
            wgpu::LoadOp::Load
        };
        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment<'_>>> = colors
            .iter()
            .map(|view| {
                Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })
            })
            .collect();
        let depth_stencil_attachment =
            depth
                .as_ref()
                .map(|(view, format)| wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations {
                        load: if mask.depth {
                            wgpu::LoadOp::Clear(1.0)
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: format.has_stencil_aspect().then_some(wgpu::Operations {
                        load: if mask.stencil {
                            wgpu::LoadOp::Clear(0)
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    }),
                });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Clear Encoder"),
            });
        {
            let _render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Clear Pass"),
                color_attachments: &color_attachments,
                depth_stencil_attachment,
                occlusion_query_set: None,
                timestamp_writes: None,
                multiview_mask: None,
            });
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}

/// Completeness from the sizes of every attachment, `None` for one without
/// storage.
fn attachment_status(sizes: impl IntoIterator<Item = Option<(u32, u32)>>) -> FramebufferStatus {
    let mut size = None;
    let mut attached = false;
    for current in sizes {
        attached = true;
        let Some(current) = current else {
            return FramebufferStatus::IncompleteAttachment;
        };
        if *size.get_or_insert(current) != current {
            return FramebufferStatus::IncompleteDimensions;
        }
    }
    if attached {
        FramebufferStatus::Complete
    } else {
        FramebufferStatus::IncompleteMissingAttachment
    }
}

/// Extent of a texture's storage; `None` when either side is zero.
fn texture_extent(target: TextureTarget, width: u32, height: u32) -> Option<wgpu::Extent3d> {
    if width == 0 || height == 0 {
        return None;
    }
    let depth_or_array_layers = match target {
        TextureTarget::Texture2D => 1,
        TextureTarget::CubeMap => 6,
    };
    Some(wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers,
    })
}

fn address_mode(wrap: WrapMode) -> wgpu::AddressMode {
    match wrap {
        WrapMode::Repeat => wgpu::AddressMode::Repeat,
        WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        WrapMode::MirroredRepeat => wgpu::AddressMode::MirrorRepeat,
    }
}

/// Texel filter and, for mipmapped filters, the filter between levels.
fn filter_modes(filter: TextureFilter) -> (wgpu::FilterMode, Option<wgpu::FilterMode>) {
    use wgpu::FilterMode::{Linear, Nearest};
    match filter {
        TextureFilter::Nearest => (Nearest, None),
        TextureFilter::Linear => (Linear, None),
        TextureFilter::NearestMipmapNearest => (Nearest, Some(Nearest)),
        TextureFilter::LinearMipmapNearest => (Linear, Some(Nearest)),
        TextureFilter::NearestMipmapLinear => (Nearest, Some(Linear)),
        TextureFilter::LinearMipmapLinear => (Linear, Some(Linear)),
    }
}

/// wgpu format and its texel size for an upload.
fn texture_format(image: &TexImage<'_>) -> Option<(wgpu::TextureFormat, u32)> {
    use wgpu::TextureFormat as F;
    let half = image.pixel_type.is_half_float();
    match (image.internal_format, image.pixel_type) {
        (PixelFormat::DepthComponent, _) => Some((F::Depth32Float, 4)),
        (PixelFormat::DepthStencil, _) => Some((F::Depth24PlusStencil8, 4)),
        (PixelFormat::Rgba32F, _) | (PixelFormat::Rgba, PixelType::Float) => {
            Some((F::Rgba32Float, 16))
        }
        (PixelFormat::Rgba16F, _) => Some((F::Rgba16Float, 8)),
        (PixelFormat::Rgba, _) if half => Some((F::Rgba16Float, 8)),
        (PixelFormat::Rgba | PixelFormat::Rgb, PixelType::UnsignedByte) => Some((F::Rgba8Unorm, 4)),
        (
            PixelFormat::Red | PixelFormat::Luminance | PixelFormat::Alpha,
            PixelType::UnsignedByte,
        ) => Some((F::R8Unorm, 1)),
        (PixelFormat::Rg | PixelFormat::LuminanceAlpha, PixelType::UnsignedByte) => {
            Some((F::Rg8Unorm, 2))
        }
        _ => None,
    }
}

fn component_size(pixel_type: PixelType) -> u32 {
    match pixel_type {
        PixelType::UnsignedByte => 1,
        PixelType::UnsignedShort | PixelType::HalfFloat | PixelType::HalfFloatCore => 2,
        PixelType::UnsignedInt | PixelType::Float => 4,
        PixelType::UnsignedInt248 => 4,
        PixelType::UnsignedShort565
        | PixelType::UnsignedShort4444
        | PixelType::UnsignedShort5551 => 2,
    }
}

/// Bring client pixels into the texel layout of the wgpu format. RGB bytes
/// gain an opaque alpha channel; everything else must already match.
fn convert_pixels(image: &TexImage<'_>, data: &[u8], bytes_per_pixel: u32) -> Option<Vec<u8>> {
    let pixels = (image.width * image.height) as usize;
    let packed = matches!(
        image.pixel_type,
        PixelType::UnsignedInt248
            | PixelType::UnsignedShort565
            | PixelType::UnsignedShort4444
            | PixelType::UnsignedShort5551
    );
    let source_size = if packed {
        component_size(image.pixel_type)
    } else {
        image.format.components() * component_size(image.pixel_type)
    } as usize;
    let data = data.get(..pixels * source_size)?;

    if image.format == PixelFormat::Rgb && bytes_per_pixel == 4 {
        let mut rgba = Vec::with_capacity(pixels * 4);
        for rgb in data.chunks_exact(3) {
            rgba.extend_from_slice(rgb);
            rgba.push(u8::MAX);
        }
        return Some(rgba);
    }
    (source_size == bytes_per_pixel as usize).then(|| data.to_vec())
}

fn flip_rows(pixels: &mut [u8], row_len: usize) {
    if row_len == 0 {
        return;
    }
    let rows = pixels.len() / row_len;
    for row in 0..rows / 2 {
        let (top, bottom) = pixels.split_at_mut((rows - 1 - row) * row_len);
        top[row * row_len..(row + 1) * row_len].swap_with_slice(&mut bottom[..row_len]);
    }
}

#[allow(clippy::too_many_arguments)]
fn write_level(
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    level: u32,
    layer: u32,
    width: u32,
    height: u32,
    bytes_per_pixel: u32,
    data: &[u8],
) {
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            aspect: wgpu::TextureAspect::All,
            texture,
            mip_level: level,
            origin: wgpu::Origin3d {
                x: 0,
                y: 0,
                z: layer,
            },
        },
        data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(width * bytes_per_pixel),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb_image(data: &[u8]) -> TexImage<'_> {
        TexImage {
            internal_format: PixelFormat::Rgb,
            width: 2,
            height: 1,
            format: PixelFormat::Rgb,
            pixel_type: PixelType::UnsignedByte,
            data: Some(data),
        }
    }

    #[test]
    fn rgb_is_padded_to_rgba() {
        let data = [1, 2, 3, 4, 5, 6];
        let image = rgb_image(&data);
        let (format, size) = texture_format(&image).unwrap();
        assert_eq!(format, wgpu::TextureFormat::Rgba8Unorm);
        assert_eq!(
            convert_pixels(&image, &data, size).unwrap(),
            vec![1, 2, 3, 255, 4, 5, 6, 255]
        );
    }

    #[test]
    fn short_data_is_rejected() {
        let data = [1, 2, 3];
        let image = rgb_image(&data);
        assert!(convert_pixels(&image, &data, 4).is_none());
    }

    #[test]
    fn float_and_half_float_formats() {
        let mut image = rgb_image(&[]);
        image.format = PixelFormat::Rgba;
        image.internal_format = PixelFormat::Rgba;
        image.pixel_type = PixelType::Float;
        assert_eq!(texture_format(&image), Some((wgpu::TextureFormat::Rgba32Float, 16)));
        image.pixel_type = PixelType::HalfFloatCore;
        assert_eq!(texture_format(&image), Some((wgpu::TextureFormat::Rgba16Float, 8)));
        image.format = PixelFormat::Rgb;
        image.internal_format = PixelFormat::Rgb;
        assert_eq!(texture_format(&image), None);
    }

    #[test]
    fn rows_are_flipped_in_place() {
        let mut pixels = vec![1, 1, 2, 2, 3, 3];
        flip_rows(&mut pixels, 2);
        assert_eq!(pixels, vec![3, 3, 2, 2, 1, 1]);
    }

    #[test]
    fn mipmapped_filters_map_to_a_mipmap_filter() {
        assert_eq!(filter_modes(TextureFilter::Linear).1, None);
        assert_eq!(
            filter_modes(TextureFilter::NearestMipmapLinear),
            (wgpu::FilterMode::Nearest, Some(wgpu::FilterMode::Linear))
        );
    }

    #[test]
    fn mismatched_or_missing_attachments_are_incomplete() {
        assert_eq!(
            attachment_status([Some((64, 64)), Some((64, 64))]),
            FramebufferStatus::Complete
        );
        assert_eq!(
            attachment_status([Some((64, 64)), Some((32, 32))]),
            FramebufferStatus::IncompleteDimensions
        );
        assert_eq!(
            attachment_status([Some((64, 64)), None]),
            FramebufferStatus::IncompleteAttachment
        );
        assert_eq!(
            attachment_status(std::iter::empty()),
            FramebufferStatus::IncompleteMissingAttachment
        );
    }

    #[test]
    fn empty_storage_has_no_extent() {
        assert_eq!(texture_extent(TextureTarget::Texture2D, 0, 0), None);
        assert_eq!(texture_extent(TextureTarget::CubeMap, 16, 0), None);
        assert_eq!(
            texture_extent(TextureTarget::CubeMap, 16, 16),
            Some(wgpu::Extent3d {
                width: 16,
                height: 16,
                depth_or_array_layers: 6,
            })
        );
    }
}
