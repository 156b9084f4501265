//! Per-context renderer state.
//!
//! [`GlCore`] bundles a [`GraphicsApi`] with everything tracked on top of it:
//! the capability snapshot, the current binding state and the GPU resource
//! cache. Texture upload lives in `resources::texture`, render target
//! binding in `resources::render_target`; both extend `GlCore` there. Every
//! renderer owns its own core, so several contexts never share binding
//! state.

use crate::{
    cache::{ResourceCache, ResourceId},
    capabilities::Capabilities,
    gl::{ClearMask, GraphicsApi},
};

/// Bindings the core believes are current on the context.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GlState {
    pub current_render_target: Option<ResourceId>,
    pub current_texture_slot: Option<u32>,
}

#[derive(Debug)]
pub struct GlCore<G: GraphicsApi> {
    pub gl: G,
    pub(crate) capabilities: Capabilities,
    pub(crate) state: GlState,
    pub(crate) cache: ResourceCache,
}

impl<G: GraphicsApi> GlCore<G> {
    pub fn new(gl: G) -> Self {
        let capabilities = Capabilities::new(&gl);
        Self {
            gl,
            capabilities,
            state: GlState::default(),
            cache: ResourceCache::new(),
        }
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn state(&self) -> &GlState {
        &self.state
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    pub fn set_clear_color(&mut self, rgba: [f32; 4]) {
        self.gl.clear_color(rgba);
    }

    /// Clears the selected buffers of the bound render target.
    pub fn clear(&mut self, color: bool, depth: bool, stencil: bool) {
        self.gl.clear(ClearMask {
            color,
            depth,
            stencil,
        });
    }

    pub(crate) fn activate_slot(&mut self, slot: Option<u32>) {
        if let Some(slot) = slot {
            self.gl.active_texture(slot);
            self.state.current_texture_slot = Some(slot);
        }
    }
}
