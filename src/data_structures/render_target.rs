//! Logical render targets: where a frame is drawn to.

use std::collections::BTreeMap;

use crate::{
    cache::ResourceId,
    data_structures::texture::{Image, Texture2D, TextureCube},
    gl::{Attachment, CubeFace},
};

/// The on-screen surface.
#[derive(Debug)]
pub struct RenderTargetBack {
    id: ResourceId,
    pub width: u32,
    pub height: u32,
}

impl RenderTargetBack {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            id: ResourceId::next(),
            width,
            height,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }
}

/// An off-screen target with any number of 2D texture attachments.
#[derive(Debug)]
pub struct RenderTarget2D {
    id: ResourceId,
    width: u32,
    height: u32,
    /// Allocate a depth renderbuffer when no depth texture is attached.
    pub depth_buffer: bool,
    /// Make that renderbuffer depth+stencil.
    pub stencil_buffer: bool,
    attachments: BTreeMap<Attachment, Texture2D>,
}

impl RenderTarget2D {
    /// A target with an RGBA color texture on `Color(0)` and a depth buffer.
    pub fn new(width: u32, height: u32) -> Self {
        let mut attachments = BTreeMap::new();
        attachments.insert(Attachment::Color(0), Texture2D::render_target(width, height));
        Self {
            id: ResourceId::next(),
            width,
            height,
            depth_buffer: true,
            stencil_buffer: true,
            attachments,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Attach `texture` at `point`, returning whatever was attached there.
    ///
    /// Attachments are read when the framebuffer is first created; changing
    /// them afterwards needs a release of the target.
    pub fn attach(&mut self, point: Attachment, texture: Texture2D) -> Option<Texture2D> {
        if let Attachment::Color(index) = point {
            if index >= Attachment::MAX_COLOR_ATTACHMENTS {
                log::warn!("color attachment {index} is out of range and was ignored");
                return Some(texture);
            }
        }
        self.attachments.insert(point, texture)
    }

    pub fn detach(&mut self, point: Attachment) -> Option<Texture2D> {
        self.attachments.remove(&point)
    }

    pub fn attachment(&self, point: Attachment) -> Option<&Texture2D> {
        self.attachments.get(&point)
    }

    pub fn attachment_mut(&mut self, point: Attachment) -> Option<&mut Texture2D> {
        self.attachments.get_mut(&point)
    }

    pub fn attachments(&self) -> impl Iterator<Item = (&Attachment, &Texture2D)> {
        self.attachments.iter()
    }

    pub(crate) fn attachments_mut(
        &mut self,
    ) -> impl Iterator<Item = (&Attachment, &mut Texture2D)> {
        self.attachments.iter_mut()
    }

    pub fn has_depth_attachment(&self) -> bool {
        self.attachments.keys().any(|point| point.is_depth())
    }

    /// The color texture on `Color(0)`.
    pub fn texture(&self) -> Option<&Texture2D> {
        self.attachment(Attachment::Color(0))
    }

    pub fn texture_mut(&mut self) -> Option<&mut Texture2D> {
        self.attachment_mut(Attachment::Color(0))
    }

    /// Change the logical size. Empty attachments are resized in place and
    /// their versions bumped; the native framebuffer must be released by the
    /// caller (`GlCore::resize_render_target` does both).
    pub(crate) fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        for texture in self.attachments.values_mut() {
            if matches!(texture.image, Some(Image::Empty { .. })) {
                texture.set_image(Image::Empty { width, height });
            }
        }
    }
}

/// An off-screen target drawing into one face of a cube texture at a time.
#[derive(Debug)]
pub struct RenderTargetCube {
    id: ResourceId,
    pub width: u32,
    pub height: u32,
    pub depth_buffer: bool,
    pub stencil_buffer: bool,
    pub texture: TextureCube,
    /// The face the next draw goes to. May change between frames without
    /// recreating the framebuffer.
    pub active_cube_face: CubeFace,
}

impl RenderTargetCube {
    pub fn new(size: u32) -> Self {
        Self {
            id: ResourceId::next(),
            width: size,
            height: size,
            depth_buffer: true,
            stencil_buffer: true,
            texture: TextureCube::render_target(size),
            active_cube_face: CubeFace::PositiveX,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }
}

/// Any destination a frame can be rendered into.
#[derive(Debug)]
pub enum RenderTarget {
    Back(RenderTargetBack),
    Target2D(RenderTarget2D),
    Cube(RenderTargetCube),
}

impl RenderTarget {
    pub fn id(&self) -> ResourceId {
        match self {
            RenderTarget::Back(target) => target.id(),
            RenderTarget::Target2D(target) => target.id(),
            RenderTarget::Cube(target) => target.id(),
        }
    }

    pub fn size(&self) -> (u32, u32) {
        match self {
            RenderTarget::Back(target) => (target.width, target.height),
            RenderTarget::Target2D(target) => (target.width, target.height),
            RenderTarget::Cube(target) => (target.width, target.height),
        }
    }

    pub fn is_back(&self) -> bool {
        matches!(self, RenderTarget::Back(_))
    }

    /// Whether the target draws into a color texture of its own.
    pub fn has_color_texture(&self) -> bool {
        match self {
            RenderTarget::Back(_) => false,
            RenderTarget::Target2D(target) => target.texture().is_some(),
            RenderTarget::Cube(_) => true,
        }
    }
}

impl From<RenderTargetBack> for RenderTarget {
    fn from(target: RenderTargetBack) -> Self {
        RenderTarget::Back(target)
    }
}

impl From<RenderTarget2D> for RenderTarget {
    fn from(target: RenderTarget2D) -> Self {
        RenderTarget::Target2D(target)
    }
}

impl From<RenderTargetCube> for RenderTarget {
    fn from(target: RenderTargetCube) -> Self {
        RenderTarget::Cube(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_target_has_a_color_texture_of_its_size() {
        let target = RenderTarget2D::new(128, 64);
        let texture = target.texture().unwrap();
        assert_eq!((texture.width(), texture.height()), (128, 64));
        assert!(!target.has_depth_attachment());
    }

    #[test]
    fn attaching_depth_texture_is_detected() {
        let mut target = RenderTarget2D::new(16, 16);
        target.attach(Attachment::DepthStencil, Texture2D::render_target(16, 16));
        assert!(target.has_depth_attachment());
    }

    #[test]
    fn out_of_range_color_attachment_is_rejected() {
        let mut target = RenderTarget2D::new(16, 16);
        assert!(target
            .attach(Attachment::Color(16), Texture2D::render_target(16, 16))
            .is_some());
        assert!(target.attachment(Attachment::Color(16)).is_none());
    }

    #[test]
    fn resizing_bumps_empty_attachments() {
        let mut target = RenderTarget2D::new(16, 16);
        let before = target.texture().unwrap().version();
        target.set_size(32, 8);
        let texture = target.texture().unwrap();
        assert_eq!(texture.version(), before + 1);
        assert_eq!((texture.width(), texture.height()), (32, 8));
    }
}
