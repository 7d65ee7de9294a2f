//! Outpaint is the per-output paint pipeline of a windowing compositor.
//!
//! Each output owns a [`RenderManager`]. Clients and plugins add damage; every frame event the
//! manager repaints only what changed:
//!
//! - Collect damage and compensate for the age of the back buffer ([`DamageTracker`])
//! - Bring the displayed workspace's cached rendering up to date and blit it to the target
//! - Run effect hooks, draw cursors, run the post-processing chain and present
//!
//! A software backend ([`SoftwareBackend`]) and an in-memory scene ([`scene::scripted`]) make
//! the whole pipeline runnable headless, which is what the `outpaint replay` tool and the tests
//! use.
#![forbid(unsafe_code)]

mod foundation;

/// Frame orchestration and workspace stream caches.
pub mod compositor;
/// Runtime paint configuration.
pub mod config;
/// Damage regions and tracking.
pub mod damage;
/// Effect hooks, post-processing and stream signals.
pub mod effects;
/// Device and presentation boundary plus the software backend.
pub mod render;
/// Scene traces replayed headless.
pub mod replay;
/// Window content collaborators.
pub mod scene;

pub use crate::foundation::core::{
    Affine, OutputTransform, PixelBox, Point, Rect, Rgba8Premul, WorkspaceId,
};
pub use crate::foundation::error::{OutpaintError, OutpaintResult};

pub use crate::compositor::manager::{
    FrameOutcome, FramePhase, FrameStats, PendingAction, RenderManager, RenderOverride,
};
pub use crate::compositor::stream::{StreamUpdate, WorkspaceStream};
pub use crate::config::PaintConfig;
pub use crate::damage::region::Region;
pub use crate::damage::tracker::{CarryForward, DamageTracker, MAX_HISTORY_DEPTH};
pub use crate::effects::blur::{BlurKernel, BlurPadding, padding_listeners};
pub use crate::effects::hooks::{EffectHandle, EffectStage};
pub use crate::effects::post::{PostHandle, blur_stage, invert_stage, passthrough_stage};
pub use crate::effects::signals::{SignalHandle, SignalKind, StreamSignal};
pub use crate::render::cpu::{FrameRgba, SoftwareBackend, SoftwareBackendOpts};
pub use crate::render::device::{BufferId, OutputBackend, OutputInfo, Presenter, RenderDevice};
pub use crate::render::framebuffer::{BindGuard, Framebuffer, FramebufferDesc};
pub use crate::replay::{FrameReport, Replay, Trace};
pub use crate::scene::{LayerMask, Surface, SurfaceId, View, ViewRole, WorkspaceLayout};
