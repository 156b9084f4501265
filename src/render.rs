//! Frame orchestration.
//!
//! [`Renderer`] drives one frame through a fixed sequence:
//!
//! 1. update scene matrices (if `matrix_auto_update`)
//! 2. update light uniforms (if `lights_auto_update`)
//! 3. run the shadow pre-pass (if `shadow_auto_update` or the one-shot
//!    `shadow_needs_update` flag)
//! 4. bind the destination render target, the back buffer by default
//! 5. clear (if `auto_clear` or the per-call force flag)
//! 6. run the draw pass
//! 7. regenerate mipmaps of the destination's color texture
//!
//! Scene traversal, shadow rendering and drawing are collaborators behind
//! the [`Scene`], [`ShadowPass`] and [`DrawPass`] traits.

use anyhow::Result;

use crate::{
    cache::ResourceId,
    core::GlCore,
    data_structures::render_target::{RenderTarget, RenderTargetBack},
    gl::{ClearMask, GraphicsApi},
    math::color::Color3,
};

/// The scene side of a frame.
pub trait Scene {
    /// Recompute world transforms.
    fn update_matrix(&mut self);
    /// Recompute aggregated light uniforms.
    fn update_lights(&mut self);
}

/// Renders shadow maps before the main pass.
pub trait ShadowPass<G: GraphicsApi, S> {
    fn render(&mut self, core: &mut GlCore<G>, scene: &S) -> Result<()>;
}

/// Draws the scene into the bound render target.
pub trait DrawPass<G: GraphicsApi, S, C> {
    fn render(&mut self, core: &mut GlCore<G>, scene: &S, camera: &C) -> Result<()>;
}

/// A shadow pass that renders nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoShadows;

impl<G: GraphicsApi, S> ShadowPass<G, S> for NoShadows {
    fn render(&mut self, _: &mut GlCore<G>, _: &S) -> Result<()> {
        Ok(())
    }
}

/// Renderer toggles. All automatic steps are on by default.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RendererConfig {
    pub matrix_auto_update: bool,
    pub lights_auto_update: bool,
    pub shadow_auto_update: bool,
    pub auto_clear: bool,
    pub clear_mask: ClearMask,
    pub clear_colour: Color3,
    pub clear_alpha: f32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            matrix_auto_update: true,
            lights_auto_update: true,
            shadow_auto_update: true,
            auto_clear: true,
            clear_mask: ClearMask::ALL,
            clear_colour: Color3::new(0.0, 0.0, 0.0),
            clear_alpha: 1.0,
        }
    }
}

/// A forward renderer for one graphics context.
pub struct Renderer<G: GraphicsApi, S: Scene, C> {
    pub core: GlCore<G>,
    pub config: RendererConfig,
    /// Run the shadow pass on the next frame even without
    /// `shadow_auto_update`. Reset after that frame.
    pub shadow_needs_update: bool,
    back_render_target: RenderTarget,
    shadow_pass: Box<dyn ShadowPass<G, S>>,
    draw_pass: Box<dyn DrawPass<G, S, C>>,
}

impl<G: GraphicsApi, S: Scene, C> Renderer<G, S, C> {
    pub fn new(
        gl: G,
        config: RendererConfig,
        width: u32,
        height: u32,
        draw_pass: Box<dyn DrawPass<G, S, C>>,
    ) -> Self {
        let core = GlCore::new(gl);
        log::info!(
            "forward renderer uses WebGL version {}",
            core.capabilities().version()
        );
        Self {
            core,
            config,
            shadow_needs_update: false,
            back_render_target: RenderTargetBack::new(width, height).into(),
            shadow_pass: Box::new(NoShadows),
            draw_pass,
        }
    }

    pub fn with_shadow_pass(mut self, shadow_pass: Box<dyn ShadowPass<G, S>>) -> Self {
        self.shadow_pass = shadow_pass;
        self
    }

    pub fn back_render_target(&self) -> &RenderTarget {
        &self.back_render_target
    }

    /// Track a resized surface.
    pub fn resize(&mut self, width: u32, height: u32) {
        if let RenderTarget::Back(back) = &mut self.back_render_target {
            back.width = width;
            back.height = height;
        }
    }

    /// Render `scene` through `camera` into `render_target`, or into the back
    /// buffer when none is given.
    ///
    /// Only native allocation failures abort a frame. Errors reported by the
    /// shadow or draw pass are logged and the sequence carries on.
    pub fn render(
        &mut self,
        scene: &mut S,
        camera: &C,
        render_target: Option<&mut RenderTarget>,
        force_clear: bool,
    ) -> Result<()> {
        if self.config.matrix_auto_update {
            scene.update_matrix();
        }
        if self.config.lights_auto_update {
            scene.update_lights();
        }

        if self.config.shadow_auto_update || self.shadow_needs_update {
            if let Err(e) = self.shadow_pass.render(&mut self.core, scene) {
                log::error!("shadow pass failed: {e:#}");
            }
            self.shadow_needs_update = false;
        }

        let target = match render_target {
            Some(target) => target,
            None => &mut self.back_render_target,
        };
        self.core.set_render_target(target)?;

        if self.config.auto_clear || force_clear {
            let [r, g, b] = self.config.clear_colour.to_array();
            self.core.set_clear_color([r, g, b, self.config.clear_alpha]);
            let mask = self.config.clear_mask;
            self.core.clear(mask.color, mask.depth, mask.stencil);
        }

        if let Err(e) = self.draw_pass.render(&mut self.core, scene, camera) {
            log::error!("draw pass failed: {e:#}");
        }

        if target.has_color_texture() {
            self.core.regenerate_mipmaps(target);
        }
        Ok(())
    }

    /// Bind a render target outside of [`render`](Self::render), e.g. from a
    /// custom pass.
    pub fn set_render_target(&mut self, target: &mut RenderTarget) -> Result<()> {
        self.core.set_render_target(target)
    }

    pub fn release_texture(&mut self, id: ResourceId) -> bool {
        self.core.release_texture(id)
    }

    pub fn release_render_target(&mut self, target: &RenderTarget) {
        self.core.release_render_target(target)
    }
}
