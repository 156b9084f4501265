//! flow-gl
//!
//! The GPU resource core of a forward renderer: it turns logical textures
//! and render targets into native objects, keeps them cached per context and
//! drives one frame through a fixed update, shadow, bind, clear, draw and
//! mipmap sequence. Everything native goes through the WebGL-shaped
//! [`gl::GraphicsApi`] trait, implemented on top of `wgpu` and by a
//! recording headless backend.
//!
//! High-level modules
//! - `gl`: the native command surface, its constants and both backends
//! - `capabilities`: API tier, limits and the extension cache of a context
//! - `cache`: GPU handles keyed by logical resource id
//! - `core`: per-context state that the binders extend
//! - `data_structures`: logical textures and render targets
//! - `resources`: the texture upload pipeline and the render target binder
//! - `render`: the frame orchestrator and its collaborator traits
//! - `context`: window surface and wgpu device setup
//! - `animation`: skeletons and bone matrices
//! - `math`: colors, planes and transform decomposition
//! - `lights`: light definitions and uniforms
//! - `logging`: logger bootstrap
//!

pub mod animation;
pub mod cache;
pub mod capabilities;
pub mod context;
pub mod core;
pub mod data_structures;
pub mod gl;
pub mod lights;
pub mod logging;
pub mod math;
pub mod render;
pub mod resources;

// Re-exports commonly used types for convenience in downstream code.
pub use cache::ResourceId;
pub use crate::core::GlCore;
pub use data_structures::render_target::{RenderTarget, RenderTarget2D, RenderTargetBack, RenderTargetCube};
pub use data_structures::texture::{Image, Texture2D, TextureCube, TextureDescriptor};
pub use gl::GraphicsApi;
pub use render::{DrawPass, NoShadows, Renderer, RendererConfig, Scene, ShadowPass};
