//! Math value types used by the renderer core.
//!
//! Vectors, matrices and quaternions come from `cgmath` (column-major, right
//! handed). This module adds what the engine needs on top:
//!
//! - `color` holds [`Color3`](color::Color3), an RGB triple with hex/HSL helpers
//! - `plane` holds [`Plane`](plane::Plane) in Hessian normal form
//! - `transform` holds TRS transforms and matrix decomposition

pub mod color;
pub mod plane;
pub mod transform;
