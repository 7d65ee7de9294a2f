//! Graphics and presentation boundary, render targets and the software backend.

/// Premultiplied RGBA8 pixel operations.
pub mod composite;
/// Software device and presenter backed by `vello_cpu` pixmaps.
pub mod cpu;
/// `RenderDevice`, `Presenter` and `OutputBackend`.
pub mod device;
/// Owned render targets and scoped binds.
pub mod framebuffer;
