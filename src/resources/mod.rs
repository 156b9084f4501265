/**
 * This module contains all logic for realizing logical resources on a context.
 */
pub mod render_target;
pub mod texture;
