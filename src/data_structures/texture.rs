//! Logical textures.
//!
//! A [`Texture2D`] or [`TextureCube`] describes image content and sampling
//! configuration. It owns no GPU memory: the upload pipeline (see
//! `resources::texture`) derives the native texture from it on first use and
//! re-uploads only when [`version`](Texture2D::version) moves.

use anyhow::*;
use image::{ImageFormat, RgbaImage, load_from_memory_with_format};

use crate::{
    cache::ResourceId,
    gl::{PixelFormat, PixelType, TextureFilter, WrapMode},
};

/// Pixel content of one texture level or cube face.
#[derive(Clone, Debug, PartialEq)]
pub enum Image {
    /// A decoded, renderable-surface-like RGBA image. Surfaces may be
    /// rescaled before upload to satisfy size limits.
    Surface(RgbaImage),
    /// Raw pixel bytes in the texture's format/type. Uploaded as they are.
    Raw {
        width: u32,
        height: u32,
        data: Vec<u8>,
    },
    /// Storage without content, used by render target textures.
    Empty { width: u32, height: u32 },
}

impl Image {
    pub fn width(&self) -> u32 {
        match self {
            Image::Surface(image) => image.width(),
            Image::Raw { width, .. } | Image::Empty { width, .. } => *width,
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Image::Surface(image) => image.height(),
            Image::Raw { height, .. } | Image::Empty { height, .. } => *height,
        }
    }

    pub fn is_surface(&self) -> bool {
        matches!(self, Image::Surface(_))
    }

    pub fn data(&self) -> Option<&[u8]> {
        match self {
            Image::Surface(image) => Some(image.as_raw()),
            Image::Raw { data, .. } => Some(data),
            Image::Empty { .. } => None,
        }
    }

    /// Decode encoded image bytes (PNG, JPEG, ...) into a surface.
    ///
    /// `format` is an optional file extension hint; without it the format is
    /// guessed from the content.
    pub fn from_bytes(bytes: &[u8], format: Option<&str>) -> Result<Self> {
        let img = match format {
            None => image::load_from_memory(bytes)?,
            Some(fmt) => {
                let format = ImageFormat::from_extension(fmt)
                    .with_context(|| format!("unknown image format {fmt}"))?;
                load_from_memory_with_format(bytes, format)?
            }
        };
        Ok(Image::Surface(img.to_rgba8()))
    }
}

/// Sampling and storage configuration shared by 2D and cube textures.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextureDescriptor {
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    pub mag_filter: TextureFilter,
    pub min_filter: TextureFilter,
    pub anisotropy: f32,
    pub format: PixelFormat,
    /// Defaults to `format` when unset.
    pub internal_format: Option<PixelFormat>,
    pub pixel_type: PixelType,
    pub generate_mipmaps: bool,
    pub flip_y: bool,
}

impl TextureDescriptor {
    /// Configuration for textures that are rendered into: clamped, linear,
    /// no mipmaps.
    pub fn render_target() -> Self {
        Self {
            wrap_s: WrapMode::ClampToEdge,
            wrap_t: WrapMode::ClampToEdge,
            mag_filter: TextureFilter::Linear,
            min_filter: TextureFilter::Linear,
            generate_mipmaps: false,
            flip_y: false,
            ..Self::default()
        }
    }

    pub fn internal_format(&self) -> PixelFormat {
        self.internal_format.unwrap_or(self.format)
    }

    /// Whether these settings only work on power-of-two images under a
    /// WebGL1 context: any wrap besides clamp-to-edge or a mipmapped
    /// minification filter.
    pub fn needs_power_of_two(&self) -> bool {
        self.wrap_s != WrapMode::ClampToEdge
            || self.wrap_t != WrapMode::ClampToEdge
            || self.min_filter.is_mipmapped()
    }
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self {
            wrap_s: WrapMode::Repeat,
            wrap_t: WrapMode::Repeat,
            mag_filter: TextureFilter::Linear,
            min_filter: TextureFilter::LinearMipmapLinear,
            anisotropy: 1.0,
            format: PixelFormat::Rgba,
            internal_format: None,
            pixel_type: PixelType::UnsignedByte,
            generate_mipmaps: true,
            flip_y: true,
        }
    }
}

/// A 2D texture.
#[derive(Debug)]
pub struct Texture2D {
    id: ResourceId,
    version: u64,
    pub image: Option<Image>,
    /// Precomputed levels, level 0 first. When present they replace
    /// generated mipmaps.
    pub mipmaps: Vec<Image>,
    pub desc: TextureDescriptor,
}

impl Texture2D {
    /// A texture without content. Binding it only allocates a handle.
    pub fn new() -> Self {
        Self {
            id: ResourceId::next(),
            version: 0,
            image: None,
            mipmaps: Vec::new(),
            desc: TextureDescriptor::default(),
        }
    }

    pub fn from_image(image: Image) -> Self {
        let mut texture = Self::new();
        texture.set_image(image);
        texture
    }

    /// Load a texture from encoded image bytes.
    pub fn from_bytes(bytes: &[u8], format: Option<&str>) -> Result<Self> {
        Ok(Self::from_image(Image::from_bytes(bytes, format)?))
    }

    /// Storage for a render target attachment.
    pub fn render_target(width: u32, height: u32) -> Self {
        Self {
            image: Some(Image::Empty { width, height }),
            desc: TextureDescriptor::render_target(),
            ..Self::new()
        }
    }

    pub fn with_descriptor(mut self, desc: TextureDescriptor) -> Self {
        self.desc = desc;
        self
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Marks the content as changed so the next bind uploads it again.
    pub fn bump_version(&mut self) {
        self.version += 1;
    }

    pub fn set_image(&mut self, image: Image) {
        self.image = Some(image);
        self.bump_version();
    }

    pub fn width(&self) -> u32 {
        self.image.as_ref().map_or(0, Image::width)
    }

    pub fn height(&self) -> u32 {
        self.image.as_ref().map_or(0, Image::height)
    }
}

impl Default for Texture2D {
    fn default() -> Self {
        Self::new()
    }
}

/// A cube map: six face images sharing one configuration.
#[derive(Debug)]
pub struct TextureCube {
    id: ResourceId,
    version: u64,
    /// Faces in `CubeFace` order. Fewer than six means "not loaded yet".
    pub images: Vec<Image>,
    pub desc: TextureDescriptor,
}

impl TextureCube {
    pub fn new() -> Self {
        Self {
            id: ResourceId::next(),
            version: 0,
            images: Vec::new(),
            desc: TextureDescriptor::default(),
        }
    }

    pub fn from_images(images: [Image; 6]) -> Self {
        let mut texture = Self::new();
        texture.set_images(images);
        texture
    }

    pub fn render_target(size: u32) -> Self {
        Self {
            images: (0..6)
                .map(|_| Image::Empty {
                    width: size,
                    height: size,
                })
                .collect(),
            desc: TextureDescriptor::render_target(),
            ..Self::new()
        }
    }

    pub fn with_descriptor(mut self, desc: TextureDescriptor) -> Self {
        self.desc = desc;
        self
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn bump_version(&mut self) {
        self.version += 1;
    }

    pub fn set_images(&mut self, images: [Image; 6]) {
        self.images = images.into();
        self.bump_version();
    }

    pub fn is_complete(&self) -> bool {
        self.images.len() == 6
    }
}

impl Default for TextureCube {
    fn default() -> Self {
        Self::new()
    }
}
