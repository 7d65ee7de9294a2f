//! Geometry, colours, errors and the handle registry shared by every other module.

/// Pixel boxes, workspace ids, output transforms and premultiplied colours.
pub mod core;
/// Error type and result alias.
pub mod error;
pub(crate) mod handle;
pub(crate) mod math;
