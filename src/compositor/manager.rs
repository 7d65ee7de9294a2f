use std::{
    cell::RefCell,
    collections::{HashSet, VecDeque},
    rc::Rc,
    time::Instant,
};

use crate::{
    compositor::stream::{StreamEnv, StreamUpdate, WorkspaceStream, workspace_box},
    config::PaintConfig,
    damage::{
        region::Region,
        tracker::{CommittedDamage, DamageTracker},
    },
    effects::{
        hooks::{EffectHandle, EffectHooks, EffectStage, fire},
        post::{ChainGeometry, PostChain, PostHandle},
        signals::{SignalHandle, SignalKind, Signals, StreamSignal},
    },
    foundation::{
        core::{PixelBox, Rgba8Premul, WorkspaceId},
        error::{OutpaintError, OutpaintResult},
    },
    render::{
        device::{OutputBackend, OutputInfo, RenderDevice},
        framebuffer::{BindGuard, Framebuffer, FramebufferDesc},
    },
    scene::{LayerMask, WorkspaceLayout},
};

/// Full-frame renderer that replaces workspace compositing while installed.
///
/// The renderer only sees the device and the frame target. Plugins that draw workspace
/// streams themselves (workspace switchers, overviews) bring them up to date from an OVERLAY
/// hook with [`RenderManager::workspace_stream_update`] and draw through
/// [`RenderManager::backend_mut`] into [`RenderManager::target_framebuffer`].
pub type RenderOverride = dyn FnMut(&mut dyn RenderDevice, &FramebufferDesc);

/// Mutation queued for the start of the next frame.
#[derive(Clone, Debug, PartialEq)]
pub enum PendingAction {
    ResetRenderer,
    DamageWhole,
    ApplyConfig(PaintConfig),
}

/// Where [`RenderManager::paint`] currently is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FramePhase {
    #[default]
    Idle,
    DamageCollected,
    Skipped,
    Compositing,
    Overlay,
    Cursor,
    PostProcess,
    Swapped,
    PostNotify,
}

/// What a presented frame did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameStats {
    /// Damage committed by the tracker, age compensation included.
    pub committed: Region,
    /// Damage handed to the presenter, in damage coordinates.
    pub swap_damage: Region,
    pub buffer_age: u32,
    pub stream_switched: bool,
    pub draw_items: usize,
    pub clears: usize,
    pub post_stages: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FrameOutcome {
    /// Nothing was drawn or presented; pending damage is kept for the next frame.
    Aborted,
    /// No swap was needed.
    Skipped,
    Presented(FrameStats),
}

impl FrameOutcome {
    pub fn is_presented(&self) -> bool {
        matches!(self, FrameOutcome::Presented(_))
    }

    pub fn stats(&self) -> Option<&FrameStats> {
        match self {
            FrameOutcome::Presented(stats) => Some(stats),
            _ => None,
        }
    }
}

/// Per-output paint pipeline.
///
/// One instance per output, driven by calling [`RenderManager::paint`] whenever the output's
/// frame event fires. Plugins talk to it through effect hooks, the render override, the post
/// chain and the stream signals. Hooks receive `&mut RenderManager` and may call any public
/// method; mutations that would disturb a frame in flight are deferred to the next frame.
pub struct RenderManager<B: OutputBackend> {
    backend: B,
    layout: Rc<dyn WorkspaceLayout>,
    config: PaintConfig,
    tracker: DamageTracker,
    frame_damage: Region,
    // damage handed to the presenter for the frame in flight
    frame_swap: Region,
    frame_target: Option<FramebufferDesc>,
    effects: EffectHooks<RenderManager<B>>,
    signals: Signals,
    renderer: Option<Box<RenderOverride>>,
    post: PostChain,
    default_buffer: Framebuffer,
    grid: (i32, i32),
    streams: Vec<WorkspaceStream>,
    current_stream: Option<WorkspaceId>,
    pending: VecDeque<PendingAction>,
    redraw_demand: u32,
    inhibit: u32,
    phase: FramePhase,
    painting: bool,
    allocation_failing: bool,
    last_info: OutputInfo,
    shut_down: bool,
}

impl<B: OutputBackend> RenderManager<B> {
    /// Build the pipeline for one output and request its first frame.
    pub fn new(
        backend: B,
        layout: Rc<dyn WorkspaceLayout>,
        config: PaintConfig,
    ) -> OutpaintResult<Self> {
        config.validate()?;
        let (cols, rows) = layout.grid_size();
        let grid = (cols.max(1), rows.max(1));
        let stream_bg = config.stream_background_color();
        let mut streams = Vec::with_capacity((grid.0 * grid.1) as usize);
        for y in 0..grid.1 {
            for x in 0..grid.0 {
                streams.push(WorkspaceStream::new(WorkspaceId::new(x, y), stream_bg));
            }
        }
        let last_info = backend.output_info();

        let mut mgr = Self {
            backend,
            layout,
            config,
            tracker: DamageTracker::new(),
            frame_damage: Region::new(),
            frame_swap: Region::new(),
            frame_target: None,
            effects: EffectHooks::default(),
            signals: Signals::default(),
            renderer: None,
            post: PostChain::default(),
            default_buffer: Framebuffer::new(),
            grid,
            streams,
            current_stream: None,
            pending: VecDeque::new(),
            redraw_demand: 0,
            inhibit: 0,
            phase: FramePhase::Idle,
            painting: false,
            allocation_failing: false,
            last_info,
            shut_down: false,
        };
        mgr.damage_whole();
        Ok(mgr)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn layout(&self) -> &Rc<dyn WorkspaceLayout> {
        &self.layout
    }

    pub fn config(&self) -> &PaintConfig {
        &self.config
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    pub fn redraw_demand(&self) -> u32 {
        self.redraw_demand
    }

    pub fn inhibit_count(&self) -> u32 {
        self.inhibit
    }

    pub fn has_renderer(&self) -> bool {
        self.renderer.is_some()
    }

    pub fn post_stage_count(&self) -> usize {
        self.post.len()
    }

    pub fn effect_count(&self, stage: EffectStage) -> usize {
        self.effects.len(stage)
    }

    /// Workspace whose stream is currently displayed.
    pub fn current_stream(&self) -> Option<WorkspaceId> {
        self.current_stream
    }

    pub fn workspace_stream(&self, ws: WorkspaceId) -> Option<&WorkspaceStream> {
        self.stream_index(ws).map(|i| &self.streams[i])
    }

    /// Current buffers of the post stages, in chain order.
    pub fn post_buffers(&self) -> Vec<Option<FramebufferDesc>> {
        self.post.stage_buffers()
    }

    // effects

    pub fn add_effect(
        &mut self,
        hook: impl FnMut(&mut RenderManager<B>) + 'static,
        stage: EffectStage,
    ) -> EffectHandle {
        let hook: Rc<RefCell<dyn FnMut(&mut RenderManager<B>)>> = Rc::new(RefCell::new(hook));
        self.effects.add(stage, hook)
    }

    /// Returns `false` for stale or foreign handles.
    pub fn rem_effect(&mut self, handle: EffectHandle) -> bool {
        self.effects.remove(handle)
    }

    pub fn has_effect(&self, handle: EffectHandle) -> bool {
        self.effects.contains(handle)
    }

    // render override

    /// Install a full-frame renderer. Replaces any previous one.
    pub fn set_renderer(
        &mut self,
        renderer: impl FnMut(&mut dyn RenderDevice, &FramebufferDesc) + 'static,
    ) {
        if self.renderer.is_some() {
            tracing::debug!("render override replaced");
        }
        self.pending
            .retain(|a| !matches!(a, PendingAction::ResetRenderer));
        self.renderer = Some(Box::new(renderer));
        self.tracker.request_frame(&mut self.backend);
    }

    /// Remove the override at the start of the next frame.
    pub fn reset_renderer(&mut self) {
        if !self.pending.contains(&PendingAction::ResetRenderer) {
            self.pending.push_back(PendingAction::ResetRenderer);
        }
        self.tracker.request_frame(&mut self.backend);
    }

    // post chain

    pub fn add_post(
        &mut self,
        hook: impl FnMut(&mut dyn RenderDevice, &FramebufferDesc, &FramebufferDesc) + 'static,
    ) -> PostHandle {
        let info = self.backend.output_info();
        if let Err(err) = self.ensure_default_target(&info) {
            tracing::warn!(%err, "default target allocation failed");
        }
        let handle = self
            .post
            .add(&mut self.backend, Box::new(hook), chain_geometry(&info));
        self.damage_whole();
        handle
    }

    /// Mark a post stage for removal; it is dropped between frames.
    pub fn rem_post(&mut self, handle: PostHandle) -> bool {
        if !self.post.mark_removed(handle) {
            return false;
        }
        tracing::debug!("post stage marked for removal");
        self.damage_whole();
        true
    }

    // damage

    pub fn damage_box(&mut self, b: PixelBox) {
        if b.is_empty() {
            return;
        }
        self.damage_region(&Region::from_box(b));
    }

    /// Damage in output damage coordinates. Parts outside the output are routed to the streams
    /// of the workspaces they fall on.
    ///
    /// Damage added while the frame is being composited (from the override or an OVERLAY hook)
    /// is also presented with that frame, so whatever the hook drew there reaches the screen.
    pub fn damage_region(&mut self, region: &Region) {
        if region.is_empty() {
            return;
        }
        let info = self.backend.output_info();
        let whole = info.damage_box();
        let outside = region.subtract_box(whole);
        let inside = region.intersect_box(whole);
        let cur = self.layout.current_workspace();

        for stream in &mut self.streams {
            let ws = stream.ws();
            if ws == cur {
                // an overridden frame never reaches the displayed stream
                if self.renderer.is_some() && !inside.is_empty() {
                    stream.add_damage(&inside);
                }
                continue;
            }
            if outside.is_empty() {
                continue;
            }
            let ws_box = workspace_box(&info, self.layout.as_ref(), ws);
            let part = outside.intersect_box(ws_box);
            if !part.is_empty() {
                stream.add_damage(&part.translate(-ws_box.x, -ws_box.y));
            }
        }
        if matches!(self.phase, FramePhase::Compositing | FramePhase::Overlay) {
            self.frame_swap |= &inside;
        }
        self.tracker.add_region(&mut self.backend, &inside);
    }

    pub fn damage_whole(&mut self) {
        self.damage_box(self.backend.output_info().damage_box());
    }

    /// Damage scheduled for the next frame.
    pub fn scheduled_damage(&self) -> Region {
        self.tracker.scheduled_damage()
    }

    // redraw demand and inhibit

    /// Ask for a frame without adding damage.
    pub fn schedule_redraw(&mut self) {
        self.tracker.request_frame(&mut self.backend);
    }

    /// Keep rendering frames while any caller asks for it.
    pub fn auto_redraw(&mut self, redraw: bool) {
        if redraw {
            self.redraw_demand += 1;
            if self.redraw_demand == 1 {
                self.tracker.request_frame(&mut self.backend);
            }
        } else {
            self.redraw_demand = self.redraw_demand.saturating_sub(1);
        }
    }

    /// Present black frames while any caller inhibits the output.
    pub fn add_inhibit(&mut self, add: bool) {
        if add {
            self.inhibit += 1;
            return;
        }
        if self.inhibit == 0 {
            return;
        }
        self.inhibit -= 1;
        if self.inhibit == 0 {
            self.damage_whole();
            self.signals.emit_start_rendering();
        }
    }

    // targets and streams

    /// Target of the frame in progress, or the default buffer between frames.
    pub fn target_framebuffer(&self) -> Option<FramebufferDesc> {
        if self.frame_target.is_some() {
            return self.frame_target;
        }
        if self.default_buffer.is_allocated() {
            self.default_buffer.desc()
        } else {
            None
        }
    }

    pub fn workspace_stream_start(&mut self, ws: WorkspaceId) -> OutpaintResult<StreamUpdate> {
        self.with_stream(ws, |stream, env| stream.start(env))
    }

    pub fn workspace_stream_update(
        &mut self,
        ws: WorkspaceId,
        scale_x: f32,
        scale_y: f32,
    ) -> OutpaintResult<StreamUpdate> {
        self.with_stream(ws, |stream, env| stream.update(env, scale_x, scale_y))
    }

    pub fn workspace_stream_stop(&mut self, ws: WorkspaceId) -> bool {
        let Some(i) = self.stream_index(ws) else {
            return false;
        };
        self.streams[i].stop();
        if self.current_stream == Some(ws) {
            self.current_stream = None;
        }
        true
    }

    // signals

    pub fn connect_stream_pre(
        &mut self,
        f: impl FnMut(&mut StreamSignal<'_>) + 'static,
    ) -> SignalHandle {
        self.signals.connect_stream_pre(f)
    }

    pub fn connect_stream_post(
        &mut self,
        f: impl FnMut(&mut StreamSignal<'_>) + 'static,
    ) -> SignalHandle {
        self.signals.connect_stream_post(f)
    }

    pub fn connect_start_rendering(&mut self, f: impl FnMut() + 'static) -> SignalHandle {
        self.signals.connect_start_rendering(f)
    }

    pub fn disconnect(&mut self, handle: SignalHandle) -> bool {
        self.signals.disconnect(handle)
    }

    pub fn listener_count(&self, kind: SignalKind) -> usize {
        self.signals.listener_count(kind)
    }

    // configuration

    /// Validate `config` and apply it at the start of the next frame.
    pub fn reconfigure(&mut self, config: PaintConfig) -> OutpaintResult<()> {
        config.validate()?;
        self.pending.push_back(PendingAction::ApplyConfig(config));
        self.tracker.request_frame(&mut self.backend);
        Ok(())
    }

    /// Queue a whole-output repaint for the next frame.
    pub fn queue_damage_whole(&mut self) {
        self.pending.push_back(PendingAction::DamageWhole);
        self.tracker.request_frame(&mut self.backend);
    }

    pub fn pending_actions(&self) -> impl Iterator<Item = &PendingAction> {
        self.pending.iter()
    }

    // frame

    /// Run one frame.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn paint(&mut self, now: Instant) -> FrameOutcome {
        if self.painting {
            tracing::warn!("paint re-entered from a hook, refused");
            return FrameOutcome::Aborted;
        }
        if self.shut_down {
            return FrameOutcome::Aborted;
        }
        self.painting = true;
        let outcome = self.paint_frame(now);
        self.painting = false;
        self.frame_target = None;
        self.frame_swap.clear();
        self.phase = FramePhase::Idle;
        outcome
    }

    fn paint_frame(&mut self, now: Instant) -> FrameOutcome {
        self.tracker.frame_started();
        self.check_output_mode();
        self.drain_pending();
        self.sweep_post();
        self.frame_damage.clear();
        self.fire_effects(EffectStage::Pre);

        let carry = self.config.carry_forward;
        let committed = match self.tracker.begin_frame(
            &mut self.backend,
            carry,
            self.config.force_full_damage,
        ) {
            Ok(c) => c,
            Err(err) => {
                tracing::trace!(%err, "frame aborted");
                return FrameOutcome::Aborted;
            }
        };
        self.phase = FramePhase::DamageCollected;
        self.frame_damage |= &committed.damage;

        let info = self.backend.output_info();
        let whole = info.damage_box();
        let switch_pending = self.renderer.is_none()
            && self.current_stream != Some(self.layout.current_workspace());
        if !committed.needs_swap && self.redraw_demand == 0 && !switch_pending {
            tracing::trace!("nothing to present");
            self.phase = FramePhase::Skipped;
            self.tracker.skip_frame(whole, carry);
            self.post_notify(now);
            return FrameOutcome::Skipped;
        }

        let shown = self.current_stream;
        match self.draw_and_present(now, &info, &committed) {
            Ok(stats) => {
                self.allocation_failing = false;
                self.tracker.finish_frame(&stats.swap_damage, carry);
                self.post_notify(now);
                FrameOutcome::Presented(stats)
            }
            Err(err) => {
                if !err.is_transient() && !self.allocation_failing {
                    tracing::warn!(%err, "frame aborted");
                } else {
                    tracing::trace!(%err, "frame aborted");
                }
                self.allocation_failing = matches!(err, OutpaintError::Allocation(_));
                self.tracker.skip_frame(whole, carry);
                if self.current_stream != shown {
                    // the switch never reached the screen
                    self.current_stream = shown;
                    self.damage_whole();
                }
                FrameOutcome::Aborted
            }
        }
    }

    fn draw_and_present(
        &mut self,
        now: Instant,
        info: &OutputInfo,
        committed: &CommittedDamage,
    ) -> OutpaintResult<FrameStats> {
        let whole = info.damage_box();
        let present = FramebufferDesc {
            buffer: committed.target,
            width: info.width,
            height: info.height,
            scale: info.scale,
            geometry: info.relative_geometry(),
            transform: info.transform,
        };
        let uses_chain = !self.post.is_empty();
        let target = if uses_chain {
            let (desc, fresh) = self.ensure_default_target(info)?;
            if fresh {
                self.frame_damage |= whole;
            }
            desc
        } else {
            present
        };
        self.frame_target = Some(target);

        let mut stats = FrameStats {
            committed: committed.damage.clone(),
            buffer_age: committed.buffer_age,
            ..FrameStats::default()
        };
        self.frame_swap.clear();

        if self.config.damage_debug {
            self.frame_swap |= whole;
            BindGuard::new(&mut self.backend, target)
                .clear(whole, Rgba8Premul::from_straight_rgba(255, 255, 0, 255));
        }

        self.phase = FramePhase::Compositing;
        if self.renderer.is_some() {
            if let Some(ws) = self.current_stream.take()
                && let Some(i) = self.stream_index(ws)
            {
                self.streams[i].stop();
                tracing::debug!(%ws, "workspace stream stopped for render override");
            }
            BindGuard::new(&mut self.backend, target).clear(whole, self.config.background_color());
            if let Some(renderer) = self.renderer.as_deref_mut() {
                renderer(&mut self.backend, &target);
            }
            self.frame_swap |= whole;
        } else {
            self.frame_damage &= whole;
            let cur = self.layout.current_workspace();
            let switched = self.current_stream != Some(cur);
            if !self.frame_damage.is_empty() || switched {
                self.frame_swap |= &self.frame_damage;
                let mut blit = self.frame_damage.clone();
                let update = if switched {
                    if let Some(prev) = self.current_stream
                        && let Some(i) = self.stream_index(prev)
                    {
                        self.streams[i].stop();
                    }
                    let update = self.with_stream(cur, |stream, env| stream.start(env))?;
                    tracing::debug!(ws = %cur, "workspace stream switched");
                    self.current_stream = Some(cur);
                    self.frame_swap |= whole;
                    blit |= whole;
                    update
                } else {
                    self.with_stream(cur, |stream, env| stream.update(env, 1.0, 1.0))?
                };
                stats.stream_switched = switched;
                stats.draw_items = update.draw_items;
                stats.clears = update.clears;

                if let Some(cache) = self.workspace_stream(cur).and_then(WorkspaceStream::desc) {
                    BindGuard::new(&mut self.backend, target).copy_from(cache.buffer, &blit);
                }
            }
        }

        self.phase = FramePhase::Overlay;
        self.fire_effects(EffectStage::Overlay);
        if uses_chain {
            self.frame_swap |= whole;
        }

        self.phase = FramePhase::Cursor;
        self.backend.render_cursors(&target, &self.frame_swap);

        self.phase = FramePhase::PostProcess;
        if uses_chain {
            stats.post_stages =
                self.post
                    .run(&mut self.backend, &target, &present, chain_geometry(info))?;
            self.sweep_post();
        }

        if self.inhibit > 0 {
            self.frame_swap |= whole;
            BindGuard::new(&mut self.backend, present).clear(whole, Rgba8Premul::black());
        }

        self.phase = FramePhase::Swapped;
        let (w, h) = info.transformed_size();
        let buffer_damage = self.frame_swap.transform(info.transform.invert(), w, h);
        self.backend.swap(now, &buffer_damage)?;
        stats.swap_damage = std::mem::take(&mut self.frame_swap);
        Ok(stats)
    }

    fn post_notify(&mut self, now: Instant) {
        self.phase = FramePhase::PostNotify;
        self.frame_target = None;
        self.sweep_post();
        self.fire_effects(EffectStage::Post);
        self.send_frame_done(now);
        if self.redraw_demand > 0 {
            self.tracker.request_frame(&mut self.backend);
        }
    }

    fn send_frame_done(&self, now: Instant) {
        let views = if self.renderer.is_some() {
            self.layout.views_in_layers(LayerMask::VISIBLE)
        } else {
            let mut views = self.layout.views_on_workspace(
                self.layout.current_workspace(),
                LayerMask::MIDDLE,
                false,
            );
            views.extend(self.layout.views_in_layers(LayerMask::BELOW | LayerMask::ABOVE));
            views
        };

        let mut notified = HashSet::new();
        for view in views {
            if !view.is_mapped() {
                continue;
            }
            for surface in view.surfaces() {
                if surface.is_mapped() && notified.insert(surface.id()) {
                    surface.send_frame_done(now);
                }
            }
        }
    }

    fn fire_effects(&mut self, stage: EffectStage) {
        let hooks = self.effects.snapshot(stage);
        if hooks.is_empty() {
            return;
        }
        fire(hooks, self, stage);
    }

    fn drain_pending(&mut self) {
        while let Some(action) = self.pending.pop_front() {
            match action {
                PendingAction::ResetRenderer => {
                    if self.renderer.take().is_some() {
                        tracing::debug!("render override removed");
                    }
                    self.damage_whole();
                }
                PendingAction::DamageWhole => self.damage_whole(),
                PendingAction::ApplyConfig(config) => self.apply_config(config),
            }
        }
    }

    fn apply_config(&mut self, config: PaintConfig) {
        if config.carry_forward != self.config.carry_forward {
            self.tracker.reset_history();
        }
        let stream_bg = config.stream_background_color();
        for stream in &mut self.streams {
            stream.set_background(stream_bg);
        }
        tracing::debug!(?config, "paint config applied");
        self.config = config;
        self.damage_whole();
    }

    /// Output size, scale or transform changed since the last frame: nothing cached survives.
    fn check_output_mode(&mut self) {
        let info = self.backend.output_info();
        if info == self.last_info {
            return;
        }
        tracing::debug!(
            width = info.width,
            height = info.height,
            scale = info.scale,
            "output mode changed"
        );
        self.last_info = info;
        self.tracker.reset_history();
        for stream in &mut self.streams {
            stream.invalidate();
        }
        self.damage_whole();
    }

    fn sweep_post(&mut self) {
        if self.post.sweep(&mut self.backend) > 0
            && self.post.is_empty()
            && self.default_buffer.is_allocated()
        {
            self.default_buffer.release(&mut self.backend);
        }
    }

    /// Allocate the default target if needed. A fresh buffer is cleared to the background.
    fn ensure_default_target(
        &mut self,
        info: &OutputInfo,
    ) -> OutpaintResult<(FramebufferDesc, bool)> {
        let fresh = self
            .default_buffer
            .allocate(&mut self.backend, info.width, info.height)?;
        self.default_buffer
            .set_geometry(info.relative_geometry(), info.scale, info.transform);
        let desc = self
            .default_buffer
            .desc()
            .ok_or_else(|| OutpaintError::allocation("default target unavailable"))?;
        if fresh {
            BindGuard::new(&mut self.backend, desc)
                .clear(info.damage_box(), self.config.background_color());
        }
        Ok((desc, fresh))
    }

    fn stream_index(&self, ws: WorkspaceId) -> Option<usize> {
        if ws.x < 0 || ws.y < 0 || ws.x >= self.grid.0 || ws.y >= self.grid.1 {
            return None;
        }
        Some((ws.y * self.grid.0 + ws.x) as usize)
    }

    fn with_stream<R>(
        &mut self,
        ws: WorkspaceId,
        f: impl FnOnce(&mut WorkspaceStream, &mut StreamEnv<'_>) -> OutpaintResult<R>,
    ) -> OutpaintResult<R> {
        let i = self
            .stream_index(ws)
            .ok_or(OutpaintError::UnknownWorkspace(ws))?;
        let info = self.backend.output_info();
        let mut env = StreamEnv {
            device: &mut self.backend,
            layout: self.layout.as_ref(),
            signals: &self.signals,
            info,
            frame_damage: &mut self.frame_damage,
            drag_icons: self.renderer.is_none(),
        };
        f(&mut self.streams[i], &mut env)
    }

    /// Release every buffer owned by the pipeline. Later frames are refused.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        for stream in &mut self.streams {
            stream.release(&mut self.backend);
        }
        self.post.release_all(&mut self.backend);
        if self.default_buffer.is_allocated() {
            self.default_buffer.release(&mut self.backend);
        }
        self.current_stream = None;
        self.shut_down = true;
        tracing::debug!("render manager shut down");
    }
}

impl<B: OutputBackend> Drop for RenderManager<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn chain_geometry(info: &OutputInfo) -> ChainGeometry {
    ChainGeometry {
        width: info.width,
        height: info.height,
        scale: info.scale,
        geometry: info.relative_geometry(),
        transform: info.transform,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compositor/manager.rs"]
mod tests;
