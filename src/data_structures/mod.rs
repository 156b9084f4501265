//! Logical GPU resources.
//!
//! - `texture` holds 2D and cube textures, their images and sampling settings
//! - `render_target` holds the back buffer, 2D and cube render targets
//!
//! None of these own native objects; see `resources` for how they are
//! realized on a context.

pub mod render_target;
pub mod texture;
