//! The native graphics boundary.
//!
//! Everything above this module speaks in terms of [`GraphicsApi`], a
//! WebGL-shaped command surface: textures, framebuffers and renderbuffers
//! are created, bound, filled and deleted through it and nothing else.
//! Native constants are modelled as enums with a fixed mapping to their
//! WebGL values so attachment points and filters are resolved once, when
//! they are configured, instead of per frame.
//!
//! Two implementations ship with the crate:
//!
//! - [`headless::HeadlessGl`] records every call and never touches a GPU
//! - [`wgpu_backend::WgpuGl`] maps the calls onto a `wgpu` device (WebGL2 on
//!   the web, the primary backends natively)

pub mod headless;
pub mod wgpu_backend;

use anyhow::Result;

/// Native texture object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u32);

/// Native framebuffer object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FramebufferHandle(pub u32);

/// Native renderbuffer object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderbufferHandle(pub u32);

/// The six faces of a cube map in native order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CubeFace {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl CubeFace {
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PositiveX,
        CubeFace::NegativeX,
        CubeFace::PositiveY,
        CubeFace::NegativeY,
        CubeFace::PositiveZ,
        CubeFace::NegativeZ,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn gl_enum(self) -> u32 {
        0x8515 + self as u32
    }
}

/// Bind points for whole texture objects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureTarget {
    Texture2D,
    CubeMap,
}

impl TextureTarget {
    pub fn gl_enum(self) -> u32 {
        match self {
            TextureTarget::Texture2D => 0x0DE1,
            TextureTarget::CubeMap => 0x8513,
        }
    }
}

/// Targets for image upload and framebuffer attachment: a 2D
/// texture or one face of a cube map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageTarget {
    Texture2D,
    CubeFace(CubeFace),
}

impl ImageTarget {
    pub fn gl_enum(self) -> u32 {
        match self {
            ImageTarget::Texture2D => TextureTarget::Texture2D.gl_enum(),
            ImageTarget::CubeFace(face) => face.gl_enum(),
        }
    }

    pub fn texture_target(self) -> TextureTarget {
        match self {
            ImageTarget::Texture2D => TextureTarget::Texture2D,
            ImageTarget::CubeFace(_) => TextureTarget::CubeMap,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WrapMode {
    Repeat,
    ClampToEdge,
    MirroredRepeat,
}

impl WrapMode {
    pub fn gl_enum(self) -> u32 {
        match self {
            WrapMode::Repeat => 0x2901,
            WrapMode::ClampToEdge => 0x812F,
            WrapMode::MirroredRepeat => 0x8370,
        }
    }

    pub fn from_gl(value: u32) -> Option<Self> {
        match value {
            0x2901 => Some(WrapMode::Repeat),
            0x812F => Some(WrapMode::ClampToEdge),
            0x8370 => Some(WrapMode::MirroredRepeat),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureFilter {
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    NearestMipmapLinear,
    LinearMipmapLinear,
}

impl TextureFilter {
    pub fn gl_enum(self) -> u32 {
        match self {
            TextureFilter::Nearest => 0x2600,
            TextureFilter::Linear => 0x2601,
            TextureFilter::NearestMipmapNearest => 0x2700,
            TextureFilter::LinearMipmapNearest => 0x2701,
            TextureFilter::NearestMipmapLinear => 0x2702,
            TextureFilter::LinearMipmapLinear => 0x2703,
        }
    }

    pub fn from_gl(value: u32) -> Option<Self> {
        match value {
            0x2600 => Some(TextureFilter::Nearest),
            0x2601 => Some(TextureFilter::Linear),
            0x2700 => Some(TextureFilter::NearestMipmapNearest),
            0x2701 => Some(TextureFilter::LinearMipmapNearest),
            0x2702 => Some(TextureFilter::NearestMipmapLinear),
            0x2703 => Some(TextureFilter::LinearMipmapLinear),
            _ => None,
        }
    }

    /// Whether sampling with this filter reads more than the base level.
    pub fn is_mipmapped(self) -> bool {
        !matches!(self, TextureFilter::Nearest | TextureFilter::Linear)
    }

    /// The closest filter that works without mipmaps: everything in the
    /// nearest family collapses to `Nearest`, the rest to `Linear`.
    pub fn fallback(self) -> Self {
        match self {
            TextureFilter::Nearest
            | TextureFilter::NearestMipmapNearest
            | TextureFilter::NearestMipmapLinear => TextureFilter::Nearest,
            _ => TextureFilter::Linear,
        }
    }
}

/// Pixel formats, used both as the client format and the internal format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Alpha,
    Red,
    Rg,
    Rgb,
    Rgba,
    Luminance,
    LuminanceAlpha,
    DepthComponent,
    DepthStencil,
    Rgba16F,
    Rgba32F,
}

impl PixelFormat {
    pub fn gl_enum(self) -> u32 {
        match self {
            PixelFormat::Alpha => 0x1906,
            PixelFormat::Red => 0x1903,
            PixelFormat::Rg => 0x8227,
            PixelFormat::Rgb => 0x1907,
            PixelFormat::Rgba => 0x1908,
            PixelFormat::Luminance => 0x1909,
            PixelFormat::LuminanceAlpha => 0x190A,
            PixelFormat::DepthComponent => 0x1902,
            PixelFormat::DepthStencil => 0x84F9,
            PixelFormat::Rgba16F => 0x881A,
            PixelFormat::Rgba32F => 0x8814,
        }
    }

    pub fn is_depth(self) -> bool {
        matches!(self, PixelFormat::DepthComponent | PixelFormat::DepthStencil)
    }

    pub fn components(self) -> u32 {
        match self {
            PixelFormat::Alpha
            | PixelFormat::Red
            | PixelFormat::Luminance
            | PixelFormat::DepthComponent
            | PixelFormat::DepthStencil => 1,
            PixelFormat::Rg | PixelFormat::LuminanceAlpha => 2,
            PixelFormat::Rgb => 3,
            PixelFormat::Rgba | PixelFormat::Rgba16F | PixelFormat::Rgba32F => 4,
        }
    }
}

/// Component types of uploaded pixel data.
///
/// `HalfFloat` carries the `OES_texture_half_float` code that WebGL1
/// expects; WebGL2 contexts want the core `HALF_FLOAT` code instead, which
/// is what [`PixelType::resolve`] hands out as `HalfFloatCore`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelType {
    UnsignedByte,
    UnsignedShort,
    UnsignedInt,
    Float,
    HalfFloat,
    HalfFloatCore,
    UnsignedInt248,
    UnsignedShort565,
    UnsignedShort4444,
    UnsignedShort5551,
}

impl PixelType {
    pub fn gl_enum(self) -> u32 {
        match self {
            PixelType::UnsignedByte => 0x1401,
            PixelType::UnsignedShort => 0x1403,
            PixelType::UnsignedInt => 0x1405,
            PixelType::Float => 0x1406,
            PixelType::HalfFloat => 0x8D61,
            PixelType::HalfFloatCore => 0x140B,
            PixelType::UnsignedInt248 => 0x84FA,
            PixelType::UnsignedShort565 => 0x8363,
            PixelType::UnsignedShort4444 => 0x8033,
            PixelType::UnsignedShort5551 => 0x8034,
        }
    }

    /// The type code to hand to a context of the given major version.
    pub fn resolve(self, version: u32) -> Self {
        match self {
            PixelType::HalfFloat if version >= 2 => PixelType::HalfFloatCore,
            other => other,
        }
    }

    pub fn is_half_float(self) -> bool {
        matches!(self, PixelType::HalfFloat | PixelType::HalfFloatCore)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TexParameter {
    WrapS,
    WrapT,
    MagFilter,
    MinFilter,
    MaxAnisotropy,
}

impl TexParameter {
    pub fn gl_enum(self) -> u32 {
        match self {
            TexParameter::WrapS => 0x2802,
            TexParameter::WrapT => 0x2803,
            TexParameter::MagFilter => 0x2800,
            TexParameter::MinFilter => 0x2801,
            TexParameter::MaxAnisotropy => 0x84FE,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RenderbufferFormat {
    DepthComponent16,
    DepthStencil,
}

impl RenderbufferFormat {
    pub fn gl_enum(self) -> u32 {
        match self {
            RenderbufferFormat::DepthComponent16 => 0x81A5,
            RenderbufferFormat::DepthStencil => 0x84F9,
        }
    }
}

/// Framebuffer attachment points.
///
/// Color points are numbered `0..=15`. The derived ordering sorts color
/// attachments by index, which matches their native numeric order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Attachment {
    Color(u8),
    Depth,
    Stencil,
    DepthStencil,
}

impl Attachment {
    pub const MAX_COLOR_ATTACHMENTS: u8 = 16;

    pub fn gl_enum(self) -> u32 {
        match self {
            Attachment::Color(index) => 0x8CE0 + index as u32,
            Attachment::Depth => 0x8D00,
            Attachment::Stencil => 0x8D20,
            Attachment::DepthStencil => 0x821A,
        }
    }

    /// Maps a native attachment constant back to its point.
    pub fn from_gl(value: u32) -> Option<Self> {
        match value {
            0x8CE0..=0x8CEF => Some(Attachment::Color((value - 0x8CE0) as u8)),
            0x8D00 => Some(Attachment::Depth),
            0x8D20 => Some(Attachment::Stencil),
            0x821A => Some(Attachment::DepthStencil),
            _ => None,
        }
    }

    pub fn is_color(self) -> bool {
        matches!(self, Attachment::Color(_))
    }

    pub fn is_depth(self) -> bool {
        matches!(self, Attachment::Depth | Attachment::DepthStencil)
    }
}

/// Result of a framebuffer completeness query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FramebufferStatus {
    Complete,
    IncompleteAttachment,
    IncompleteMissingAttachment,
    IncompleteDimensions,
    Unsupported,
    Other(u32),
}

impl FramebufferStatus {
    pub fn from_gl(value: u32) -> Self {
        match value {
            0x8CD5 => FramebufferStatus::Complete,
            0x8CD6 => FramebufferStatus::IncompleteAttachment,
            0x8CD7 => FramebufferStatus::IncompleteMissingAttachment,
            0x8CD9 => FramebufferStatus::IncompleteDimensions,
            0x8CDD => FramebufferStatus::Unsupported,
            other => FramebufferStatus::Other(other),
        }
    }

    /// Native name of the incompleteness reason, `None` when complete.
    pub fn reason(self) -> Option<&'static str> {
        match self {
            FramebufferStatus::Complete => None,
            FramebufferStatus::IncompleteAttachment => Some("FRAMEBUFFER_INCOMPLETE_ATTACHMENT"),
            FramebufferStatus::IncompleteMissingAttachment => {
                Some("FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT")
            }
            FramebufferStatus::IncompleteDimensions => Some("FRAMEBUFFER_INCOMPLETE_DIMENSIONS"),
            FramebufferStatus::Unsupported => Some("FRAMEBUFFER_UNSUPPORTED"),
            FramebufferStatus::Other(_) => Some("unknown"),
        }
    }
}

/// Which buffers a clear touches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClearMask {
    pub color: bool,
    pub depth: bool,
    pub stencil: bool,
}

impl ClearMask {
    pub const ALL: ClearMask = ClearMask {
        color: true,
        depth: true,
        stencil: true,
    };
}

impl Default for ClearMask {
    fn default() -> Self {
        Self::ALL
    }
}

/// Names of the extensions the renderer asks for.
pub mod extension {
    pub const TEXTURE_HALF_FLOAT: &str = "OES_texture_half_float";
    pub const TEXTURE_FLOAT: &str = "OES_texture_float";
    pub const DEPTH_TEXTURE: &str = "WEBGL_depth_texture";
    pub const DRAW_BUFFERS: &str = "WEBGL_draw_buffers";
    pub const TEXTURE_FILTER_ANISOTROPIC: &str = "EXT_texture_filter_anisotropic";
}

/// A loaded extension object.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Extension {
    name: String,
}

impl Extension {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// One `texImage2D` worth of pixel data.
///
/// `data` is `None` when only storage is being allocated (render target
/// textures). `pixel_type` has already been resolved for the context
/// version.
#[derive(Clone, Copy, Debug)]
pub struct TexImage<'a> {
    pub internal_format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub pixel_type: PixelType,
    pub data: Option<&'a [u8]>,
}

/// The native command surface.
///
/// Every method maps to one WebGL entry point. Calls are synchronous and
/// issued from a single thread; allocation is the only operation allowed
/// to fail.
pub trait GraphicsApi {
    /// Major API version of the context, `1` or `2`.
    fn context_version(&self) -> u32;
    fn max_texture_size(&self) -> u32;
    /// Only meaningful when `EXT_texture_filter_anisotropic` is present.
    fn max_anisotropy(&self) -> f32;
    fn query_extension(&self, name: &str) -> bool;

    fn create_texture(&mut self) -> Result<TextureHandle>;
    fn delete_texture(&mut self, texture: TextureHandle);
    /// Selects texture unit `slot` (relative to `TEXTURE0`).
    fn active_texture(&mut self, slot: u32);
    fn bind_texture(&mut self, target: TextureTarget, texture: Option<TextureHandle>);
    fn pixel_store_flip_y(&mut self, flip_y: bool);
    fn tex_parameter_i(&mut self, target: TextureTarget, parameter: TexParameter, value: u32);
    fn tex_parameter_f(&mut self, target: TextureTarget, parameter: TexParameter, value: f32);
    fn tex_image_2d(&mut self, target: ImageTarget, level: u32, image: TexImage<'_>);
    fn generate_mipmap(&mut self, target: TextureTarget);

    fn create_framebuffer(&mut self) -> Result<FramebufferHandle>;
    fn delete_framebuffer(&mut self, framebuffer: FramebufferHandle);
    /// `None` binds the default (on-screen) framebuffer.
    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>);
    fn framebuffer_texture_2d(
        &mut self,
        attachment: Attachment,
        target: ImageTarget,
        texture: Option<TextureHandle>,
        level: u32,
    );
    fn check_framebuffer_status(&mut self) -> FramebufferStatus;
    /// Core `drawBuffers`, available from version 2.
    fn draw_buffers(&mut self, buffers: &[Attachment]);
    /// `WEBGL_draw_buffers.drawBuffersWEBGL` for version 1 contexts.
    fn draw_buffers_webgl(&mut self, buffers: &[Attachment]);

    fn create_renderbuffer(&mut self) -> Result<RenderbufferHandle>;
    fn delete_renderbuffer(&mut self, renderbuffer: RenderbufferHandle);
    fn bind_renderbuffer(&mut self, renderbuffer: Option<RenderbufferHandle>);
    fn renderbuffer_storage(&mut self, format: RenderbufferFormat, width: u32, height: u32);
    fn framebuffer_renderbuffer(
        &mut self,
        attachment: Attachment,
        renderbuffer: Option<RenderbufferHandle>,
    );

    fn clear_color(&mut self, rgba: [f32; 4]);
    fn clear(&mut self, mask: ClearMask);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_constants_round_trip_through_native_values() {
        assert_eq!(Attachment::Color(0).gl_enum(), 0x8CE0);
        assert_eq!(Attachment::Color(15).gl_enum(), 0x8CEF);
        assert_eq!(Attachment::from_gl(0x8CE3), Some(Attachment::Color(3)));
        assert_eq!(Attachment::from_gl(0x821A), Some(Attachment::DepthStencil));
        assert_eq!(Attachment::from_gl(0x1234), None);
    }

    #[test]
    fn color_attachments_sort_by_index() {
        let mut points = vec![
            Attachment::Color(2),
            Attachment::Depth,
            Attachment::Color(0),
            Attachment::Color(1),
        ];
        points.sort();
        assert_eq!(
            points,
            vec![
                Attachment::Color(0),
                Attachment::Color(1),
                Attachment::Color(2),
                Attachment::Depth
            ]
        );
    }

    #[test]
    fn filter_fallback_collapses_mipmapped_filters() {
        assert_eq!(TextureFilter::NearestMipmapLinear.fallback(), TextureFilter::Nearest);
        assert_eq!(TextureFilter::NearestMipmapNearest.fallback(), TextureFilter::Nearest);
        assert_eq!(TextureFilter::LinearMipmapNearest.fallback(), TextureFilter::Linear);
        assert_eq!(TextureFilter::LinearMipmapLinear.fallback(), TextureFilter::Linear);
        assert!(!TextureFilter::Linear.is_mipmapped());
        assert!(TextureFilter::LinearMipmapLinear.is_mipmapped());
    }

    #[test]
    fn half_float_type_depends_on_version() {
        assert_eq!(PixelType::HalfFloat.resolve(1).gl_enum(), 0x8D61);
        assert_eq!(PixelType::HalfFloat.resolve(2).gl_enum(), 0x140B);
        assert_eq!(PixelType::Float.resolve(2), PixelType::Float);
    }

    #[test]
    fn cube_faces_follow_native_order() {
        assert_eq!(CubeFace::PositiveX.gl_enum(), 0x8515);
        assert_eq!(CubeFace::NegativeZ.gl_enum(), 0x851A);
        assert_eq!(CubeFace::from_index(3), Some(CubeFace::NegativeY));
        assert_eq!(CubeFace::from_index(6), None);
    }
}
