//! The per-output paint orchestrator and its workspace stream caches.

/// [`RenderManager`](manager::RenderManager) and the frame state machine.
pub mod manager;
/// Cached per-workspace renderings.
pub mod stream;
