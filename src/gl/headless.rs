//! A recording [`GraphicsApi`] without a GPU behind it.
//!
//! Every call is appended to a log of [`GlCall`]s, handles are handed out
//! from a counter and framebuffer attachments are tracked well enough to
//! answer completeness queries. Tests assert on the recorded sequence; the
//! same backend is handy for dry-running a frame on machines without an
//! adapter.

use std::{
    cell::RefCell,
    collections::{BTreeMap, HashMap, HashSet},
};

use anyhow::{Result, bail};

use super::{
    Attachment, ClearMask, FramebufferHandle, FramebufferStatus, GraphicsApi, ImageTarget,
    PixelFormat, PixelType, RenderbufferFormat, RenderbufferHandle, TexImage, TexParameter,
    TextureHandle, TextureTarget,
};

/// One recorded native call.
#[derive(Clone, Debug, PartialEq)]
pub enum GlCall {
    CreateTexture(TextureHandle),
    DeleteTexture(TextureHandle),
    ActiveTexture(u32),
    BindTexture(TextureTarget, Option<TextureHandle>),
    PixelStoreFlipY(bool),
    TexParameterI(TextureTarget, TexParameter, u32),
    TexParameterF(TextureTarget, TexParameter, f32),
    TexImage2D {
        target: ImageTarget,
        level: u32,
        internal_format: PixelFormat,
        width: u32,
        height: u32,
        format: PixelFormat,
        pixel_type: PixelType,
        has_data: bool,
    },
    GenerateMipmap(TextureTarget),
    CreateFramebuffer(FramebufferHandle),
    DeleteFramebuffer(FramebufferHandle),
    BindFramebuffer(Option<FramebufferHandle>),
    FramebufferTexture2D(Attachment, ImageTarget, Option<TextureHandle>, u32),
    CheckFramebufferStatus(FramebufferStatus),
    DrawBuffers(Vec<Attachment>),
    DrawBuffersWebgl(Vec<Attachment>),
    CreateRenderbuffer(RenderbufferHandle),
    DeleteRenderbuffer(RenderbufferHandle),
    BindRenderbuffer(Option<RenderbufferHandle>),
    RenderbufferStorage(RenderbufferFormat, u32, u32),
    FramebufferRenderbuffer(Attachment, Option<RenderbufferHandle>),
    ClearColor([f32; 4]),
    Clear(ClearMask),
}

/// What a framebuffer attachment point currently refers to.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Attached {
    Texture(TextureHandle, ImageTarget),
    Renderbuffer(RenderbufferHandle),
}

#[derive(Debug)]
pub struct HeadlessGl {
    version: u32,
    max_texture_size: u32,
    max_anisotropy: f32,
    extensions: HashSet<String>,
    extension_queries: RefCell<Vec<String>>,
    allocation_budget: Option<usize>,
    forced_status: Option<FramebufferStatus>,
    next_handle: u32,
    calls: Vec<GlCall>,
    live_textures: HashSet<TextureHandle>,
    live_framebuffers: HashSet<FramebufferHandle>,
    live_renderbuffers: HashSet<RenderbufferHandle>,
    texture_sizes: HashMap<(TextureHandle, ImageTarget), (u32, u32)>,
    renderbuffer_sizes: HashMap<RenderbufferHandle, (u32, u32)>,
    attachments: HashMap<FramebufferHandle, BTreeMap<Attachment, Attached>>,
    active_slot: u32,
    bound_textures: HashMap<(u32, TextureTarget), TextureHandle>,
    bound_framebuffer: Option<FramebufferHandle>,
    bound_renderbuffer: Option<RenderbufferHandle>,
}

impl HeadlessGl {
    /// A WebGL2-like context with no extensions.
    pub fn new() -> Self {
        Self {
            version: 2,
            max_texture_size: 4096,
            max_anisotropy: 16.0,
            extensions: HashSet::new(),
            extension_queries: RefCell::new(Vec::new()),
            allocation_budget: None,
            forced_status: None,
            next_handle: 1,
            calls: Vec::new(),
            live_textures: HashSet::new(),
            live_framebuffers: HashSet::new(),
            live_renderbuffers: HashSet::new(),
            texture_sizes: HashMap::new(),
            renderbuffer_sizes: HashMap::new(),
            attachments: HashMap::new(),
            active_slot: 0,
            bound_textures: HashMap::new(),
            bound_framebuffer: None,
            bound_renderbuffer: None,
        }
    }

    /// A WebGL1-like context with no extensions.
    pub fn webgl1() -> Self {
        Self::new().with_version(1)
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_max_texture_size(mut self, size: u32) -> Self {
        self.max_texture_size = size;
        self
    }

    pub fn with_max_anisotropy(mut self, anisotropy: f32) -> Self {
        self.max_anisotropy = anisotropy;
        self
    }

    pub fn with_extension(mut self, name: &str) -> Self {
        self.extensions.insert(name.to_string());
        self
    }

    /// Makes every subsequent `create_*` call fail.
    pub fn failing_allocations(self) -> Self {
        self.failing_after(0)
    }

    /// Lets `count` more `create_*` calls succeed, then fails the rest.
    pub fn failing_after(mut self, count: usize) -> Self {
        self.allocation_budget = Some(count);
        self
    }

    /// Lifts any allocation limit.
    pub fn allow_allocations(&mut self) {
        self.allocation_budget = None;
    }

    /// Overrides the answer of the next completeness queries.
    pub fn force_framebuffer_status(&mut self, status: Option<FramebufferStatus>) {
        self.forced_status = status;
    }

    pub fn calls(&self) -> &[GlCall] {
        &self.calls
    }

    /// Returns and forgets the recorded calls.
    pub fn take_calls(&mut self) -> Vec<GlCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn count(&self, predicate: impl Fn(&GlCall) -> bool) -> usize {
        self.calls.iter().filter(|call| predicate(call)).count()
    }

    pub fn upload_count(&self) -> usize {
        self.count(|call| matches!(call, GlCall::TexImage2D { .. }))
    }

    pub fn extension_queries(&self) -> Vec<String> {
        self.extension_queries.borrow().clone()
    }

    pub fn live_texture_count(&self) -> usize {
        self.live_textures.len()
    }

    pub fn live_framebuffer_count(&self) -> usize {
        self.live_framebuffers.len()
    }

    pub fn live_renderbuffer_count(&self) -> usize {
        self.live_renderbuffers.len()
    }

    pub fn bound_framebuffer(&self) -> Option<FramebufferHandle> {
        self.bound_framebuffer
    }

    fn next_handle(&mut self, kind: &str) -> Result<u32> {
        match self.allocation_budget.as_mut() {
            Some(0) => bail!("headless context refused to allocate a {kind}"),
            Some(remaining) => *remaining -= 1,
            None => {}
        }
        let handle = self.next_handle;
        self.next_handle += 1;
        Ok(handle)
    }

    fn attached_size(&self, attached: &Attached) -> Option<(u32, u32)> {
        match attached {
            Attached::Texture(handle, target) => self.texture_sizes.get(&(*handle, *target)).copied(),
            Attached::Renderbuffer(handle) => self.renderbuffer_sizes.get(handle).copied(),
        }
    }

    fn compute_status(&self) -> FramebufferStatus {
        if let Some(status) = self.forced_status {
            return status;
        }
        let Some(framebuffer) = self.bound_framebuffer else {
            return FramebufferStatus::Complete;
        };
        let attachments = match self.attachments.get(&framebuffer) {
            Some(attachments) if !attachments.is_empty() => attachments,
            _ => return FramebufferStatus::IncompleteMissingAttachment,
        };
        let mut size = None;
        for attached in attachments.values() {
            let Some(current) = self.attached_size(attached) else {
                return FramebufferStatus::IncompleteAttachment;
            };
            match size {
                None => size = Some(current),
                Some(previous) if previous != current => {
                    return FramebufferStatus::IncompleteDimensions;
                }
                Some(_) => (),
            }
        }
        FramebufferStatus::Complete
    }
}

impl Default for HeadlessGl {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsApi for HeadlessGl {
    fn context_version(&self) -> u32 {
        self.version
    }

    fn max_texture_size(&self) -> u32 {
        self.max_texture_size
    }

    fn max_anisotropy(&self) -> f32 {
        self.max_anisotropy
    }

    fn query_extension(&self, name: &str) -> bool {
        self.extension_queries.borrow_mut().push(name.to_string());
        self.extensions.contains(name)
    }

    fn create_texture(&mut self) -> Result<TextureHandle> {
        let handle = TextureHandle(self.next_handle("texture")?);
        self.live_textures.insert(handle);
        self.calls.push(GlCall::CreateTexture(handle));
        Ok(handle)
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        self.live_textures.remove(&texture);
        self.texture_sizes.retain(|(handle, _), _| *handle != texture);
        self.calls.push(GlCall::DeleteTexture(texture));
    }

    fn active_texture(&mut self, slot: u32) {
        self.active_slot = slot;
        self.calls.push(GlCall::ActiveTexture(slot));
    }

    fn bind_texture(&mut self, target: TextureTarget, texture: Option<TextureHandle>) {
        match texture {
            Some(handle) => {
                self.bound_textures.insert((self.active_slot, target), handle);
            }
            None => {
                self.bound_textures.remove(&(self.active_slot, target));
            }
        }
        self.calls.push(GlCall::BindTexture(target, texture));
    }

    fn pixel_store_flip_y(&mut self, flip_y: bool) {
        self.calls.push(GlCall::PixelStoreFlipY(flip_y));
    }

    fn tex_parameter_i(&mut self, target: TextureTarget, parameter: TexParameter, value: u32) {
        self.calls.push(GlCall::TexParameterI(target, parameter, value));
    }

    fn tex_parameter_f(&mut self, target: TextureTarget, parameter: TexParameter, value: f32) {
        self.calls.push(GlCall::TexParameterF(target, parameter, value));
    }

    fn tex_image_2d(&mut self, target: ImageTarget, level: u32, image: TexImage<'_>) {
        if level == 0 {
            if let Some(handle) = self
                .bound_textures
                .get(&(self.active_slot, target.texture_target()))
                .copied()
            {
                self.texture_sizes
                    .insert((handle, target), (image.width, image.height));
            }
        }
        self.calls.push(GlCall::TexImage2D {
            target,
            level,
            internal_format: image.internal_format,
            width: image.width,
            height: image.height,
            format: image.format,
            pixel_type: image.pixel_type,
            has_data: image.data.is_some(),
        });
    }

    fn generate_mipmap(&mut self, target: TextureTarget) {
        self.calls.push(GlCall::GenerateMipmap(target));
    }

    fn create_framebuffer(&mut self) -> Result<FramebufferHandle> {
        let handle = FramebufferHandle(self.next_handle("framebuffer")?);
        self.live_framebuffers.insert(handle);
        self.calls.push(GlCall::CreateFramebuffer(handle));
        Ok(handle)
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        self.live_framebuffers.remove(&framebuffer);
        self.attachments.remove(&framebuffer);
        if self.bound_framebuffer == Some(framebuffer) {
            self.bound_framebuffer = None;
        }
        self.calls.push(GlCall::DeleteFramebuffer(framebuffer));
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>) {
        self.bound_framebuffer = framebuffer;
        self.calls.push(GlCall::BindFramebuffer(framebuffer));
    }

    fn framebuffer_texture_2d(
        &mut self,
        attachment: Attachment,
        target: ImageTarget,
        texture: Option<TextureHandle>,
        level: u32,
    ) {
        if let Some(framebuffer) = self.bound_framebuffer {
            let attachments = self.attachments.entry(framebuffer).or_default();
            match texture {
                Some(handle) => {
                    attachments.insert(attachment, Attached::Texture(handle, target));
                }
                None => {
                    attachments.remove(&attachment);
                }
            }
        }
        self.calls
            .push(GlCall::FramebufferTexture2D(attachment, target, texture, level));
    }

    fn check_framebuffer_status(&mut self) -> FramebufferStatus {
        let status = self.compute_status();
        self.calls.push(GlCall::CheckFramebufferStatus(status));
        status
    }

    fn draw_buffers(&mut self, buffers: &[Attachment]) {
        self.calls.push(GlCall::DrawBuffers(buffers.to_vec()));
    }

    fn draw_buffers_webgl(&mut self, buffers: &[Attachment]) {
        self.calls.push(GlCall::DrawBuffersWebgl(buffers.to_vec()));
    }

    fn create_renderbuffer(&mut self) -> Result<RenderbufferHandle> {
        let handle = RenderbufferHandle(self.next_handle("renderbuffer")?);
        self.live_renderbuffers.insert(handle);
        self.calls.push(GlCall::CreateRenderbuffer(handle));
        Ok(handle)
    }

    fn delete_renderbuffer(&mut self, renderbuffer: RenderbufferHandle) {
        self.live_renderbuffers.remove(&renderbuffer);
        self.renderbuffer_sizes.remove(&renderbuffer);
        self.calls.push(GlCall::DeleteRenderbuffer(renderbuffer));
    }

    fn bind_renderbuffer(&mut self, renderbuffer: Option<RenderbufferHandle>) {
        self.bound_renderbuffer = renderbuffer;
        self.calls.push(GlCall::BindRenderbuffer(renderbuffer));
    }

    fn renderbuffer_storage(&mut self, format: RenderbufferFormat, width: u32, height: u32) {
        if let Some(renderbuffer) = self.bound_renderbuffer {
            self.renderbuffer_sizes.insert(renderbuffer, (width, height));
        }
        self.calls
            .push(GlCall::RenderbufferStorage(format, width, height));
    }

    fn framebuffer_renderbuffer(
        &mut self,
        attachment: Attachment,
        renderbuffer: Option<RenderbufferHandle>,
    ) {
        if let Some(framebuffer) = self.bound_framebuffer {
            let attachments = self.attachments.entry(framebuffer).or_default();
            match renderbuffer {
                Some(handle) => {
                    attachments.insert(attachment, Attached::Renderbuffer(handle));
                }
                None => {
                    attachments.remove(&attachment);
                }
            }
        }
        self.calls
            .push(GlCall::FramebufferRenderbuffer(attachment, renderbuffer));
    }

    fn clear_color(&mut self, rgba: [f32; 4]) {
        self.calls.push(GlCall::ClearColor(rgba));
    }

    fn clear(&mut self, mask: ClearMask) {
        self.calls.push(GlCall::Clear(mask));
    }
}
