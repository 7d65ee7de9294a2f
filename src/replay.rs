//! Scene traces: a JSON description of one output, its windows and per-frame events, replayed
//! headless through a [`RenderManager`] on the software backend.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    rc::Rc,
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};

use crate::{
    compositor::manager::{FrameOutcome, RenderManager},
    config::PaintConfig,
    effects::post::{blur_stage, invert_stage, passthrough_stage},
    foundation::{
        core::{OutputTransform, PixelBox, Rgba8Premul, WorkspaceId},
        error::{OutpaintError, OutpaintResult},
    },
    render::{
        cpu::{FrameRgba, SoftwareBackend, SoftwareBackendOpts},
        device::Presenter,
    },
    scene::{
        View, ViewRole, WorkspaceLayout,
        scripted::{Layer, ScriptedLayout, SolidSurface, SolidView},
    },
};

/// Nominal refresh interval used for frame timestamps.
const FRAME_INTERVAL: Duration = Duration::from_micros(16_667);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TraceOutput {
    pub width: u32,
    pub height: u32,
    pub scale: f64,
    pub transform: OutputTransform,
    pub swapchain_len: usize,
}

impl Default for TraceOutput {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            scale: 1.0,
            transform: OutputTransform::Normal,
            swapchain_len: 2,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceLayer {
    Background,
    Bottom,
    #[default]
    Workspace,
    Top,
    Unmanaged,
    Lock,
}

impl From<TraceLayer> for Layer {
    fn from(layer: TraceLayer) -> Self {
        match layer {
            TraceLayer::Background => Layer::Background,
            TraceLayer::Bottom => Layer::Bottom,
            TraceLayer::Workspace => Layer::Workspace,
            TraceLayer::Top => Layer::Top,
            TraceLayer::Unmanaged => Layer::Unmanaged,
            TraceLayer::Lock => Layer::Lock,
        }
    }
}

/// A window made of one solid rectangle, in logical coordinates of workspace `(0, 0)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TraceView {
    pub id: u64,
    pub rect: PixelBox,
    /// Straight RGBA.
    pub color: [u8; 4],
    #[serde(default)]
    pub layer: TraceLayer,
    /// Shell views (panels, backgrounds) stay put across workspaces.
    #[serde(default)]
    pub shell: bool,
    #[serde(default = "default_alpha")]
    pub alpha: f32,
}

fn default_alpha() -> f32 {
    1.0
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case", deny_unknown_fields)]
pub enum TracePost {
    Passthrough,
    Invert,
    Blur { radius: u32, sigma: f32 },
}

/// Something that happens before a frame is painted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case", deny_unknown_fields)]
pub enum TraceEvent {
    /// Damage in output damage coordinates.
    Damage { rect: PixelBox },
    DamageWhole,
    /// Move a view; its old and new boxes are damaged.
    Move { view: u64, dx: i32, dy: i32 },
    Recolor { view: u64, color: [u8; 4] },
    Map { view: u64 },
    Unmap { view: u64 },
    Switch { workspace: WorkspaceId },
    AutoRedraw { on: bool },
    Inhibit { on: bool },
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TraceFrame {
    pub events: Vec<TraceEvent>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Trace {
    pub config: PaintConfig,
    pub output: TraceOutput,
    /// Workspace grid as `[columns, rows]`.
    pub grid: [i32; 2],
    pub views: Vec<TraceView>,
    pub post: Vec<TracePost>,
    pub frames: Vec<TraceFrame>,
}

impl Default for Trace {
    fn default() -> Self {
        Self {
            config: PaintConfig::default(),
            output: TraceOutput::default(),
            grid: [1, 1],
            views: Vec::new(),
            post: Vec::new(),
            frames: Vec::new(),
        }
    }
}

impl Trace {
    pub fn from_json_str(s: &str) -> OutpaintResult<Self> {
        let trace: Self = serde_json::from_str(s)
            .map_err(|e| OutpaintError::config(format!("invalid scene trace: {e}")))?;
        trace.validate()?;
        Ok(trace)
    }

    pub fn validate(&self) -> OutpaintResult<()> {
        self.config.validate()?;
        if self.grid[0] < 1 || self.grid[1] < 1 {
            return Err(OutpaintError::config(format!(
                "workspace grid must be at least 1x1, got {}x{}",
                self.grid[0], self.grid[1]
            )));
        }
        let mut seen = BTreeSet::new();
        for v in &self.views {
            if !seen.insert(v.id) {
                return Err(OutpaintError::config(format!("duplicate view id {}", v.id)));
            }
        }
        for (i, frame) in self.frames.iter().enumerate() {
            for event in &frame.events {
                let view = match event {
                    TraceEvent::Move { view, .. }
                    | TraceEvent::Recolor { view, .. }
                    | TraceEvent::Map { view }
                    | TraceEvent::Unmap { view } => *view,
                    _ => continue,
                };
                if !seen.contains(&view) {
                    return Err(OutpaintError::config(format!(
                        "frame {i} refers to unknown view {view}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Outcome of one replayed frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameReport {
    pub index: usize,
    pub outcome: FrameOutcome,
}

impl FrameReport {
    pub fn label(&self) -> &'static str {
        match self.outcome {
            FrameOutcome::Aborted => "aborted",
            FrameOutcome::Skipped => "skipped",
            FrameOutcome::Presented(_) => "presented",
        }
    }
}

impl fmt::Display for FrameReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame {:>4} {:<9}", self.index, self.label())?;
        if let Some(stats) = self.outcome.stats() {
            write!(
                f,
                " committed={} swap={} age={} draws={} clears={} post={}",
                stats.committed.area(),
                stats.swap_damage.area(),
                stats.buffer_age,
                stats.draw_items,
                stats.clears,
                stats.post_stages,
            )?;
            if stats.stream_switched {
                write!(f, " switched")?;
            }
        }
        Ok(())
    }
}

/// A trace loaded into a live pipeline.
pub struct Replay {
    manager: RenderManager<SoftwareBackend>,
    layout: Rc<ScriptedLayout>,
    views: BTreeMap<u64, Rc<SolidView>>,
    frames: Vec<TraceFrame>,
    next: usize,
    epoch: Instant,
}

impl Replay {
    pub fn new(trace: Trace) -> OutpaintResult<Self> {
        trace.validate()?;
        let backend = SoftwareBackend::new(SoftwareBackendOpts {
            width: trace.output.width,
            height: trace.output.height,
            scale: trace.output.scale,
            transform: trace.output.transform,
            swapchain_len: trace.output.swapchain_len,
        })?;

        let logical = backend.output_info().relative_geometry();
        let layout = Rc::new(ScriptedLayout::new(
            (trace.grid[0], trace.grid[1]),
            (logical.width, logical.height),
        ));
        let mut views = BTreeMap::new();
        for v in &trace.views {
            let color = Rgba8Premul::from_straight(v.color);
            let view = if v.shell {
                SolidView::new(
                    ViewRole::Shell,
                    vec![SolidSurface::new(v.id, v.rect, color)],
                )
            } else {
                SolidView::single(v.id, v.rect, color)
            };
            if let Some(surface) = view.main_surface() {
                surface.set_alpha(v.alpha);
            }
            layout.add_view(Rc::clone(&view), v.layer.into());
            views.insert(v.id, view);
        }

        let mut manager = RenderManager::new(
            backend,
            Rc::clone(&layout) as Rc<dyn WorkspaceLayout>,
            trace.config,
        )?;
        for stage in &trace.post {
            match *stage {
                TracePost::Passthrough => manager.add_post(passthrough_stage()),
                TracePost::Invert => manager.add_post(invert_stage()),
                TracePost::Blur { radius, sigma } => manager.add_post(blur_stage(radius, sigma)),
            };
        }
        tracing::debug!(
            views = views.len(),
            frames = trace.frames.len(),
            post = trace.post.len(),
            "scene trace loaded"
        );

        Ok(Self {
            manager,
            layout,
            views,
            frames: trace.frames,
            next: 0,
            epoch: Instant::now(),
        })
    }

    pub fn manager(&self) -> &RenderManager<SoftwareBackend> {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut RenderManager<SoftwareBackend> {
        &mut self.manager
    }

    pub fn layout(&self) -> &Rc<ScriptedLayout> {
        &self.layout
    }

    pub fn view(&self, id: u64) -> Option<&Rc<SolidView>> {
        self.views.get(&id)
    }

    /// Number of frames described by the trace.
    pub fn trace_len(&self) -> usize {
        self.frames.len()
    }

    /// Apply the events of the next frame (none past the end of the trace) and paint it.
    pub fn step(&mut self) -> FrameReport {
        let index = self.next;
        self.next += 1;
        if let Some(frame) = self.frames.get(index).cloned() {
            for event in &frame.events {
                self.apply(event);
            }
        }
        let now = self.epoch + FRAME_INTERVAL * u32::try_from(index).unwrap_or(u32::MAX);
        let outcome = self.manager.paint(now);
        FrameReport { index, outcome }
    }

    /// Replay `frames` frames.
    pub fn run(&mut self, frames: usize) -> Vec<FrameReport> {
        (0..frames).map(|_| self.step()).collect()
    }

    /// The most recently presented frame.
    pub fn last_frame(&self) -> Option<FrameRgba> {
        self.manager.backend().last_presented_frame()
    }

    fn apply(&mut self, event: &TraceEvent) {
        match *event {
            TraceEvent::Damage { rect } => self.manager.damage_box(rect),
            TraceEvent::DamageWhole => self.manager.damage_whole(),
            TraceEvent::Move { view, dx, dy } => self.with_view(view, |v| v.translate(dx, dy)),
            TraceEvent::Recolor { view, color } => self.with_view(view, |v| {
                if let Some(s) = v.main_surface() {
                    s.set_color(Rgba8Premul::from_straight(color));
                }
            }),
            TraceEvent::Map { view } => self.with_view(view, |v| {
                v.set_mapped(true);
                v.set_visible(true);
            }),
            TraceEvent::Unmap { view } => self.with_view(view, |v| {
                v.set_mapped(false);
                v.set_visible(false);
            }),
            TraceEvent::Switch { workspace } => {
                self.layout.set_current_workspace(workspace);
                self.manager.schedule_redraw();
            }
            TraceEvent::AutoRedraw { on } => self.manager.auto_redraw(on),
            TraceEvent::Inhibit { on } => self.manager.add_inhibit(on),
        }
    }

    /// Change a view and damage the boxes it covered before and after.
    fn with_view(&mut self, id: u64, f: impl FnOnce(&SolidView)) {
        let Some(view) = self.views.get(&id).cloned() else {
            tracing::warn!(view = id, "event for unknown view ignored");
            return;
        };
        let scale = self.manager.backend().output_info().scale;
        let before = view.bounding_box();
        f(&view);
        let after = view.bounding_box();
        self.manager.damage_box(before.scaled(scale));
        self.manager.damage_box(after.scaled(scale));
    }
}

#[cfg(test)]
#[path = "../tests/unit/replay.rs"]
mod tests;
