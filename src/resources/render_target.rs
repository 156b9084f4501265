//! Render target binder.
//!
//! Creates framebuffers for off-screen targets on first use, attaches their
//! textures and depth storage, and afterwards only rebinds. Cube targets may
//! switch faces between frames; that re-attaches the face and nothing else.
//! Incomplete framebuffers are reported and left bound.

use anyhow::{Context, Result};

use crate::{
    cache::ResourceId,
    core::GlCore,
    data_structures::render_target::{RenderTarget, RenderTarget2D, RenderTargetCube},
    gl::{
        Attachment, FramebufferHandle, FramebufferStatus, GraphicsApi, ImageTarget,
        RenderbufferFormat, RenderbufferHandle, TextureTarget, extension,
    },
    resources::texture::is_power_of_two,
};

impl<G: GraphicsApi> GlCore<G> {
    /// Make `target` the destination of subsequent draws.
    pub fn set_render_target(&mut self, target: &mut RenderTarget) -> Result<()> {
        let id = target.id();
        let is_current = self.state.current_render_target == Some(id);

        match target {
            RenderTarget::Back(_) => {
                if !is_current {
                    self.gl.bind_framebuffer(None);
                    self.state.current_render_target = Some(id);
                }
            }
            RenderTarget::Target2D(target) => {
                if !is_current {
                    self.bind_render_target_2d(target)?;
                    self.state.current_render_target = Some(id);
                }
            }
            RenderTarget::Cube(target) => {
                if !is_current {
                    self.bind_render_target_cube(target)?;
                    self.state.current_render_target = Some(id);
                } else {
                    self.attach_cube_face(target);
                }
            }
        }
        Ok(())
    }

    fn bind_render_target_2d(&mut self, target: &mut RenderTarget2D) -> Result<()> {
        match self.framebuffer_handle(target.id()) {
            Some(framebuffer) => {
                self.gl.bind_framebuffer(Some(framebuffer));
                Ok(())
            }
            None => {
                let result = self.create_render_target_2d(target);
                self.discard_on_error(target.id(), result)
            }
        }
    }

    /// First use of a 2D target: framebuffer, attachments, draw buffers,
    /// depth storage, completeness check.
    fn create_render_target_2d(&mut self, target: &mut RenderTarget2D) -> Result<()> {
        let id = target.id();
        let framebuffer = self.allocate_framebuffer(id)?;
        self.gl.bind_framebuffer(Some(framebuffer));

        let version = self.capabilities.version();
        let mut draw_buffers = Vec::new();
        for (&attachment, texture) in target.attachments_mut() {
            let handle = self.bind_texture_2d(texture, None)?;

            if attachment.is_depth()
                && version < 2
                && self
                    .capabilities
                    .get_extension(&self.gl, extension::DEPTH_TEXTURE)
                    .is_none()
            {
                log::warn!("extension {} is not supported in webgl 1.0", extension::DEPTH_TEXTURE);
            }

            self.gl
                .framebuffer_texture_2d(attachment, ImageTarget::Texture2D, Some(handle), 0);
            self.gl.bind_texture(TextureTarget::Texture2D, None);

            if attachment.is_color() {
                draw_buffers.push(attachment);
            }
        }

        if draw_buffers.len() > 1 {
            draw_buffers.sort();
            self.enable_draw_buffers(&draw_buffers);
        }

        if target.depth_buffer && !target.has_depth_attachment() {
            self.attach_depth_renderbuffer(
                id,
                target.width(),
                target.height(),
                target.stencil_buffer,
            )?;
        }

        self.report_framebuffer_status();
        Ok(())
    }

    fn bind_render_target_cube(&mut self, target: &mut RenderTargetCube) -> Result<()> {
        let texture_ready = self.texture_handle(target.texture.id()).is_some();
        match self.framebuffer_handle(target.id()) {
            Some(framebuffer) if texture_ready => {
                self.gl.bind_framebuffer(Some(framebuffer));
                self.attach_cube_face(target);
                Ok(())
            }
            _ => {
                let result = self.create_render_target_cube(target);
                self.discard_on_error(target.id(), result)
            }
        }
    }

    /// A framebuffer whose creation failed part way is deleted again, so the
    /// next bind builds it from scratch instead of rebinding an empty one.
    fn discard_on_error(&mut self, id: ResourceId, result: Result<()>) -> Result<()> {
        if let Err(e) = &result {
            log::warn!("discarding partially created render target {id:?}: {e:#}");
            self.release_framebuffer(id);
        }
        result
    }

    fn create_render_target_cube(&mut self, target: &mut RenderTargetCube) -> Result<()> {
        let id = target.id();
        let framebuffer = match self.framebuffer_handle(id) {
            Some(framebuffer) => framebuffer,
            None => self.allocate_framebuffer(id)?,
        };
        self.gl.bind_framebuffer(Some(framebuffer));

        let handle = self.bind_texture_cube(&mut target.texture, None)?;
        self.gl.framebuffer_texture_2d(
            Attachment::Color(0),
            ImageTarget::CubeFace(target.active_cube_face),
            Some(handle),
            0,
        );
        self.gl.bind_texture(TextureTarget::CubeMap, None);

        if target.depth_buffer && self.depthbuffer_handle(id).is_none() {
            self.attach_depth_renderbuffer(id, target.width, target.height, target.stencil_buffer)?;
        }

        self.report_framebuffer_status();
        Ok(())
    }

    /// Point color attachment 0 at the target's active face.
    fn attach_cube_face(&mut self, target: &RenderTargetCube) {
        let handle = self.texture_handle(target.texture.id());
        self.gl.framebuffer_texture_2d(
            Attachment::Color(0),
            ImageTarget::CubeFace(target.active_cube_face),
            handle,
            0,
        );
    }

    fn enable_draw_buffers(&mut self, buffers: &[Attachment]) {
        if self.capabilities.version() >= 2 {
            self.gl.draw_buffers(buffers);
        } else if self
            .capabilities
            .get_extension(&self.gl, extension::DRAW_BUFFERS)
            .is_some()
        {
            self.gl.draw_buffers_webgl(buffers);
        } else {
            log::debug!(
                "{} is unavailable, rendering to {} color attachments is undefined",
                extension::DRAW_BUFFERS,
                buffers.len()
            );
        }
    }

    fn allocate_framebuffer(&mut self, id: ResourceId) -> Result<FramebufferHandle> {
        let framebuffer = self
            .gl
            .create_framebuffer()
            .with_context(|| format!("failed to allocate a framebuffer for {id:?}"))?;
        log::debug!("allocated framebuffer {framebuffer:?} for {id:?}");
        self.cache.render_target_mut(id).framebuffer = Some(framebuffer);
        Ok(framebuffer)
    }

    fn attach_depth_renderbuffer(
        &mut self,
        id: ResourceId,
        width: u32,
        height: u32,
        stencil: bool,
    ) -> Result<()> {
        let renderbuffer = self
            .gl
            .create_renderbuffer()
            .with_context(|| format!("failed to allocate a depth buffer for {id:?}"))?;
        self.cache.render_target_mut(id).depthbuffer = Some(renderbuffer);

        self.gl.bind_renderbuffer(Some(renderbuffer));
        if stencil {
            self.gl
                .renderbuffer_storage(RenderbufferFormat::DepthStencil, width, height);
            self.gl
                .framebuffer_renderbuffer(Attachment::DepthStencil, Some(renderbuffer));
        } else {
            self.gl
                .renderbuffer_storage(RenderbufferFormat::DepthComponent16, width, height);
            self.gl
                .framebuffer_renderbuffer(Attachment::Depth, Some(renderbuffer));
        }
        self.gl.bind_renderbuffer(None);
        Ok(())
    }

    /// Query completeness of the bound framebuffer and log the reason when
    /// it is not complete.
    fn report_framebuffer_status(&mut self) -> FramebufferStatus {
        let status = self.gl.check_framebuffer_status();
        match status {
            FramebufferStatus::Complete => (),
            FramebufferStatus::Other(code) => {
                log::warn!("framebuffer not complete (status {code:#06x})")
            }
            status => {
                if let Some(reason) = status.reason() {
                    log::warn!("framebuffer not complete: {reason}");
                }
            }
        }
        status
    }

    /// Regenerate the mip chain of the target's color texture after drawing
    /// into it. Only done for power-of-two targets whose texture asks for
    /// mipmaps and samples them.
    pub fn regenerate_mipmaps(&mut self, target: &RenderTarget) {
        let (texture_target, id, desc) = match target {
            RenderTarget::Back(_) => return,
            RenderTarget::Target2D(target) => match target.texture() {
                Some(texture) => (TextureTarget::Texture2D, texture.id(), texture.desc),
                None => return,
            },
            RenderTarget::Cube(target) => {
                (TextureTarget::CubeMap, target.texture.id(), target.texture.desc)
            }
        };
        let (width, height) = target.size();
        if !desc.generate_mipmaps
            || !is_power_of_two(width)
            || !is_power_of_two(height)
            || !desc.min_filter.is_mipmapped()
        {
            return;
        }
        let Some(handle) = self.texture_handle(id) else {
            return;
        };
        self.gl.bind_texture(texture_target, Some(handle));
        self.gl.generate_mipmap(texture_target);
        self.gl.bind_texture(texture_target, None);
    }

    /// Delete the framebuffer, the depth buffer and the owned textures of
    /// `target`. Releasing twice is a no-op.
    pub fn release_render_target(&mut self, target: &RenderTarget) {
        let id = target.id();
        self.release_framebuffer(id);
        match target {
            RenderTarget::Back(_) => (),
            RenderTarget::Target2D(target) => {
                for (_, texture) in target.attachments() {
                    self.release_texture(texture.id());
                }
            }
            RenderTarget::Cube(target) => {
                self.release_texture(target.texture.id());
            }
        }
    }

    /// Resize a 2D target. The framebuffer and depth buffer are dropped and
    /// rebuilt on the next bind at the new size; attached textures re-upload
    /// their storage.
    pub fn resize_render_target(&mut self, target: &mut RenderTarget2D, width: u32, height: u32) {
        if (target.width(), target.height()) == (width, height) {
            return;
        }
        target.set_size(width, height);
        self.release_framebuffer(target.id());
    }

    fn release_framebuffer(&mut self, id: ResourceId) {
        if self.state.current_render_target == Some(id) {
            self.state.current_render_target = None;
        }
        let Some(properties) = self.cache.remove_render_target(id) else {
            return;
        };
        if let Some(framebuffer) = properties.framebuffer {
            log::debug!("deleting framebuffer {framebuffer:?} of {id:?}");
            self.gl.delete_framebuffer(framebuffer);
        }
        if let Some(renderbuffer) = properties.depthbuffer {
            self.gl.delete_renderbuffer(renderbuffer);
        }
    }

    pub fn framebuffer_handle(&self, id: ResourceId) -> Option<FramebufferHandle> {
        self.cache
            .render_target(id)
            .and_then(|properties| properties.framebuffer)
    }

    pub fn depthbuffer_handle(&self, id: ResourceId) -> Option<RenderbufferHandle> {
        self.cache
            .render_target(id)
            .and_then(|properties| properties.depthbuffer)
    }
}
