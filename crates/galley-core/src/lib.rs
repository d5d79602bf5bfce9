//! Core shared types for Galley.
//!
//! This crate is intentionally small: text measurement primitives and the
//! [`Width`] value type the layout engine does its arithmetic in.

mod text;
mod width;

pub use text::{visual_width, SmolStr, TextRange, TextSize};
pub use width::Width;
