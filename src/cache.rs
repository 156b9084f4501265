//! Side table from logical objects to their native GPU state.
//!
//! Textures and render targets receive a [`ResourceId`] when they are
//! created. The [`ResourceCache`] is indexed by that id and stores the
//! native handles plus the content version that was last uploaded. The
//! logical object owns its entry: releasing the object (see
//! `GlCore::release_texture` and `GlCore::release_render_target`) deletes
//! the handles and drops the entry.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicU32, Ordering},
};

use crate::gl::{FramebufferHandle, RenderbufferHandle, TextureHandle};

static NEXT_RESOURCE_ID: AtomicU32 = AtomicU32::new(1);

/// Stable identity of a logical texture or render target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u32);

impl ResourceId {
    pub fn next() -> Self {
        Self(NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Native state of one texture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextureProperties {
    pub handle: Option<TextureHandle>,
    /// Content version of the last upload, `None` before the first one.
    pub version: Option<u64>,
}

/// Native state of one off-screen render target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderTargetProperties {
    pub framebuffer: Option<FramebufferHandle>,
    pub depthbuffer: Option<RenderbufferHandle>,
}

#[derive(Debug, Default)]
pub struct ResourceCache {
    textures: HashMap<ResourceId, TextureProperties>,
    render_targets: HashMap<ResourceId, RenderTargetProperties>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn texture(&self, id: ResourceId) -> Option<&TextureProperties> {
        self.textures.get(&id)
    }

    pub(crate) fn texture_mut(&mut self, id: ResourceId) -> &mut TextureProperties {
        self.textures.entry(id).or_default()
    }

    pub(crate) fn remove_texture(&mut self, id: ResourceId) -> Option<TextureProperties> {
        self.textures.remove(&id)
    }

    pub fn render_target(&self, id: ResourceId) -> Option<&RenderTargetProperties> {
        self.render_targets.get(&id)
    }

    pub(crate) fn render_target_mut(&mut self, id: ResourceId) -> &mut RenderTargetProperties {
        self.render_targets.entry(id).or_default()
    }

    pub(crate) fn remove_render_target(
        &mut self,
        id: ResourceId,
    ) -> Option<RenderTargetProperties> {
        self.render_targets.remove(&id)
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn render_target_count(&self) -> usize {
        self.render_targets.len()
    }
}
