//! Texture upload pipeline.
//!
//! Turns logical [`Texture2D`]/[`TextureCube`] values into native textures:
//! allocates handles, fixes up images the context cannot take as they are
//! (oversized surfaces, non-power-of-two images under WebGL1), checks the
//! requested format against the available extensions, applies sampling
//! parameters and uploads the pixels. Nothing here fails for content
//! reasons; problems are logged and the upload goes ahead.

use std::borrow::Cow;

use anyhow::{Context, Result};
use image::{
    RgbaImage,
    imageops::{self, FilterType},
};

use crate::{
    cache::ResourceId,
    capabilities::Capabilities,
    core::GlCore,
    data_structures::texture::{Image, Texture2D, TextureCube, TextureDescriptor},
    gl::{
        CubeFace, GraphicsApi, ImageTarget, PixelFormat, PixelType, TexImage, TexParameter,
        TextureFilter, TextureHandle, TextureTarget, WrapMode, extension,
    },
};

/// Resampling filter used whenever a surface has to be rescaled.
pub const RESAMPLE_FILTER: FilterType = FilterType::Triangle;

pub fn is_power_of_two(value: u32) -> bool {
    value != 0 && value & (value - 1) == 0
}

/// The power of two closest to `value` on a log scale, `2^round(log2(value))`.
///
/// 300 becomes 256 and 450 becomes 512.
pub fn nearest_power_of_two(value: u32) -> u32 {
    if value <= 1 {
        return 1;
    }
    let exponent = (value as f64).log2().round() as u32;
    1u32 << exponent.min(31)
}

pub fn image_is_power_of_two(image: &Image) -> bool {
    is_power_of_two(image.width()) && is_power_of_two(image.height())
}

/// Downscale `image` so neither side exceeds `max_size`, keeping the aspect
/// ratio and rounding down. Returns `None` when it already fits.
pub fn clamp_to_max_size(image: &RgbaImage, max_size: u32) -> Option<RgbaImage> {
    let (width, height) = image.dimensions();
    if width <= max_size && height <= max_size {
        return None;
    }
    let scale = max_size as f64 / width.max(height) as f64;
    let new_width = ((width as f64 * scale).floor() as u32).max(1);
    let new_height = ((height as f64 * scale).floor() as u32).max(1);
    log::warn!(
        "image is too big ({width}x{height}). Resized to {new_width}x{new_height}, max size is {max_size}x{max_size}"
    );
    Some(imageops::resize(image, new_width, new_height, RESAMPLE_FILTER))
}

/// Resample `image` to the nearest power-of-two size in both dimensions.
pub fn make_power_of_two(image: &RgbaImage) -> RgbaImage {
    let (width, height) = image.dimensions();
    let new_width = nearest_power_of_two(width);
    let new_height = nearest_power_of_two(height);
    log::warn!(
        "image is not power of two ({width}x{height}). Resized to {new_width}x{new_height}"
    );
    imageops::resize(image, new_width, new_height, RESAMPLE_FILTER)
}

/// The sampling state actually applied to a native texture.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SamplerParameters {
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    pub mag_filter: TextureFilter,
    pub min_filter: TextureFilter,
    pub anisotropy: f32,
}

/// Effective parameters for `desc`. With `needs_fallback` the wrap modes are
/// forced to clamp-to-edge and both filters to their non-mipmapped
/// equivalent.
pub fn texture_parameters(desc: &TextureDescriptor, needs_fallback: bool) -> SamplerParameters {
    let mut parameters = SamplerParameters {
        wrap_s: desc.wrap_s,
        wrap_t: desc.wrap_t,
        mag_filter: desc.mag_filter,
        min_filter: desc.min_filter,
        anisotropy: desc.anisotropy,
    };
    if !needs_fallback {
        return parameters;
    }

    parameters.wrap_s = WrapMode::ClampToEdge;
    parameters.wrap_t = WrapMode::ClampToEdge;
    if desc.wrap_s != WrapMode::ClampToEdge || desc.wrap_t != WrapMode::ClampToEdge {
        log::warn!(
            "texture is not power of two. wrap_s and wrap_t should be set to WrapMode::ClampToEdge"
        );
    }

    parameters.mag_filter = desc.mag_filter.fallback();
    parameters.min_filter = desc.min_filter.fallback();
    if desc.min_filter.is_mipmapped() || desc.mag_filter.is_mipmapped() {
        log::warn!(
            "texture is not power of two. min_filter and mag_filter should be set to TextureFilter::Nearest or TextureFilter::Linear"
        );
    }
    log::debug!("non power of two texture uses fallback parameters {parameters:?}");
    parameters
}

/// Apply the size fixes a context needs before `image` can be uploaded.
/// Only surfaces are rescaled; raw pixel buffers go up as they are.
fn prepare_image<'a>(
    image: &'a Image,
    desc: &TextureDescriptor,
    capabilities: &Capabilities,
) -> Cow<'a, Image> {
    let max_size = capabilities.max_texture_size();
    let Image::Surface(surface) = image else {
        if image.width() > max_size || image.height() > max_size {
            log::warn!(
                "image is too big ({}x{}). max size is {max_size}x{max_size}",
                image.width(),
                image.height()
            );
        }
        return Cow::Borrowed(image);
    };

    let mut prepared: Cow<'a, RgbaImage> = Cow::Borrowed(surface);
    if let Some(clamped) = clamp_to_max_size(&prepared, max_size) {
        prepared = Cow::Owned(clamped);
    }
    let (width, height) = prepared.dimensions();
    if desc.needs_power_of_two()
        && !(is_power_of_two(width) && is_power_of_two(height))
        && capabilities.version() < 2
    {
        prepared = Cow::Owned(make_power_of_two(&prepared));
    }

    match prepared {
        Cow::Borrowed(_) => Cow::Borrowed(image),
        Cow::Owned(resized) => Cow::Owned(Image::Surface(resized)),
    }
}

fn tex_image<'a>(image: &'a Image, desc: &TextureDescriptor, pixel_type: PixelType) -> TexImage<'a> {
    TexImage {
        internal_format: desc.internal_format(),
        width: image.width(),
        height: image.height(),
        format: desc.format,
        pixel_type,
        data: image.data(),
    }
}

impl<G: GraphicsApi> GlCore<G> {
    /// Realize `texture` on the context and bind it to `slot`.
    ///
    /// When the texture was already uploaded at its current version this
    /// only activates the slot and rebinds the handle. `slot = None` keeps
    /// the current texture unit, which is how render targets realize their
    /// attachments.
    pub fn bind_texture_2d(
        &mut self,
        texture: &mut Texture2D,
        slot: Option<u32>,
    ) -> Result<TextureHandle> {
        let id = texture.id();
        let content_version = texture.version();
        let uploaded_version = self.cache.texture(id).and_then(|p| p.version);
        let handle = self.ensure_texture_handle(id)?;

        self.activate_slot(slot);
        self.gl.bind_texture(TextureTarget::Texture2D, Some(handle));

        let Some(image) = texture.image.as_ref() else {
            return Ok(handle);
        };
        if uploaded_version == Some(content_version) {
            return Ok(handle);
        }

        let version = self.capabilities.version();
        let image = prepare_image(image, &texture.desc, &self.capabilities);
        let needs_fallback = !image_is_power_of_two(&image) && version < 2;

        self.gl.pixel_store_flip_y(texture.desc.flip_y);
        self.apply_parameters(TextureTarget::Texture2D, &texture.desc, needs_fallback);
        let pixel_type = self.check_format_support(&texture.desc);

        if !texture.mipmaps.is_empty() && !needs_fallback {
            for (level, mipmap) in texture.mipmaps.iter().enumerate() {
                self.gl.tex_image_2d(
                    ImageTarget::Texture2D,
                    level as u32,
                    tex_image(mipmap, &texture.desc, pixel_type),
                );
            }
            texture.desc.generate_mipmaps = false;
        } else {
            self.gl.tex_image_2d(
                ImageTarget::Texture2D,
                0,
                tex_image(&image, &texture.desc, pixel_type),
            );
        }

        if texture.desc.generate_mipmaps && !needs_fallback {
            self.gl.generate_mipmap(TextureTarget::Texture2D);
        }

        self.cache.texture_mut(id).version = Some(content_version);
        Ok(handle)
    }

    /// Realize a cube texture. All six faces share one fallback decision and
    /// one parameter set; a cube with fewer than six faces is only bound.
    pub fn bind_texture_cube(
        &mut self,
        texture: &mut TextureCube,
        slot: Option<u32>,
    ) -> Result<TextureHandle> {
        let id = texture.id();
        let content_version = texture.version();
        let uploaded_version = self.cache.texture(id).and_then(|p| p.version);
        let handle = self.ensure_texture_handle(id)?;

        self.activate_slot(slot);
        self.gl.bind_texture(TextureTarget::CubeMap, Some(handle));

        if !texture.is_complete() || uploaded_version == Some(content_version) {
            return Ok(handle);
        }

        let version = self.capabilities.version();
        let pixel_type = self.check_format_support(&texture.desc);
        let images: Vec<Cow<'_, Image>> = texture
            .images
            .iter()
            .map(|image| prepare_image(image, &texture.desc, &self.capabilities))
            .collect();
        let needs_fallback = version < 2 && images.iter().any(|image| !image_is_power_of_two(image));

        self.gl.pixel_store_flip_y(texture.desc.flip_y);
        self.apply_parameters(TextureTarget::CubeMap, &texture.desc, needs_fallback);

        for (face, image) in CubeFace::ALL.iter().zip(images.iter()) {
            self.gl.tex_image_2d(
                ImageTarget::CubeFace(*face),
                0,
                tex_image(image, &texture.desc, pixel_type),
            );
        }

        if texture.desc.generate_mipmaps && !needs_fallback {
            self.gl.generate_mipmap(TextureTarget::CubeMap);
        }

        self.cache.texture_mut(id).version = Some(content_version);
        Ok(handle)
    }

    /// Issue the sampling parameters for the texture bound at `target`.
    pub fn apply_parameters(
        &mut self,
        target: TextureTarget,
        desc: &TextureDescriptor,
        needs_fallback: bool,
    ) -> SamplerParameters {
        let parameters = texture_parameters(desc, needs_fallback);

        self.gl
            .tex_parameter_i(target, TexParameter::WrapS, parameters.wrap_s.gl_enum());
        self.gl
            .tex_parameter_i(target, TexParameter::WrapT, parameters.wrap_t.gl_enum());
        self.gl.tex_parameter_i(
            target,
            TexParameter::MagFilter,
            parameters.mag_filter.gl_enum(),
        );
        self.gl.tex_parameter_i(
            target,
            TexParameter::MinFilter,
            parameters.min_filter.gl_enum(),
        );

        if self.capabilities.anisotropy_supported() {
            let anisotropy = parameters
                .anisotropy
                .min(self.capabilities.max_anisotropy());
            self.gl
                .tex_parameter_f(target, TexParameter::MaxAnisotropy, anisotropy);
        }

        parameters
    }

    /// Drop the native texture behind `id`. Releasing twice is a no-op.
    pub fn release_texture(&mut self, id: ResourceId) -> bool {
        let Some(properties) = self.cache.remove_texture(id) else {
            return false;
        };
        if let Some(handle) = properties.handle {
            log::debug!("deleting texture {handle:?} of {id:?}");
            self.gl.delete_texture(handle);
        }
        true
    }

    pub fn texture_handle(&self, id: ResourceId) -> Option<TextureHandle> {
        self.cache.texture(id).and_then(|properties| properties.handle)
    }

    fn ensure_texture_handle(&mut self, id: ResourceId) -> Result<TextureHandle> {
        if let Some(handle) = self.texture_handle(id) {
            return Ok(handle);
        }
        let handle = self
            .gl
            .create_texture()
            .with_context(|| format!("failed to allocate a texture for {id:?}"))?;
        log::debug!("allocated texture {handle:?} for {id:?}");
        self.cache.texture_mut(id).handle = Some(handle);
        Ok(handle)
    }

    /// Warn about formats the context cannot take and resolve the pixel type
    /// code for the context version.
    fn check_format_support(&mut self, desc: &TextureDescriptor) -> PixelType {
        let version = self.capabilities.version();
        if version >= 2 {
            return desc.pixel_type.resolve(version);
        }

        if desc.format != desc.internal_format() {
            log::warn!(
                "texture format {:?} not same as internal format {:?} in webgl 1.0",
                desc.format,
                desc.internal_format()
            );
        }
        if desc.pixel_type == PixelType::HalfFloat
            && self
                .capabilities
                .get_extension(&self.gl, extension::TEXTURE_HALF_FLOAT)
                .is_none()
        {
            log::warn!("extension {} is not supported in webgl 1.0", extension::TEXTURE_HALF_FLOAT);
        }
        if desc.pixel_type == PixelType::Float
            && self
                .capabilities
                .get_extension(&self.gl, extension::TEXTURE_FLOAT)
                .is_none()
        {
            log::warn!("extension {} is not supported in webgl 1.0", extension::TEXTURE_FLOAT);
        }
        if matches!(desc.format, PixelFormat::DepthComponent | PixelFormat::DepthStencil)
            && self
                .capabilities
                .get_extension(&self.gl, extension::DEPTH_TEXTURE)
                .is_none()
        {
            log::warn!("extension {} is not supported in webgl 1.0", extension::DEPTH_TEXTURE);
        }
        desc.pixel_type.resolve(version)
    }
}
