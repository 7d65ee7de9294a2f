use std::rc::Rc;

use crate::{
    damage::region::Region,
    effects::signals::{Signals, StreamSignal},
    foundation::{
        core::{PixelBox, Rgba8Premul, WorkspaceId},
        error::OutpaintResult,
    },
    render::{
        device::{OutputInfo, RenderDevice},
        framebuffer::{BindGuard, Framebuffer, FramebufferDesc},
    },
    scene::{DrawItem, LayerMask, Surface, View, ViewRole, WorkspaceLayout},
};

/// Surfaces at or above this opacity hide what is behind them.
const OPAQUE_ALPHA: f32 = 0.999;

/// Result of one stream update.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StreamUpdate {
    /// Workspace-local damage that was repainted.
    pub damage: Region,
    pub draw_items: usize,
    pub clears: usize,
}

impl StreamUpdate {
    pub fn is_empty(&self) -> bool {
        self.damage.is_empty()
    }
}

/// Cached rendering of one workspace.
///
/// The cache keeps its contents while the workspace is not displayed; damage that arrives in
/// the meantime is collected in `damage` and repainted by the next update.
#[derive(Debug)]
pub struct WorkspaceStream {
    ws: WorkspaceId,
    buffer: Framebuffer,
    running: bool,
    scale_x: f32,
    scale_y: f32,
    background: Rgba8Premul,
    damage: Region,
    valid: bool,
}

/// Everything an update reads or writes besides the stream itself.
pub(crate) struct StreamEnv<'a> {
    pub device: &'a mut dyn RenderDevice,
    pub layout: &'a dyn WorkspaceLayout,
    pub signals: &'a Signals,
    pub info: OutputInfo,
    /// Damage of the current frame in output damage coordinates.
    pub frame_damage: &'a mut Region,
    /// Drag icons are drawn into the stream only while no override renderer is active.
    pub drag_icons: bool,
}

impl WorkspaceStream {
    pub(crate) fn new(ws: WorkspaceId, background: Rgba8Premul) -> Self {
        Self {
            ws,
            buffer: Framebuffer::new(),
            running: false,
            scale_x: 1.0,
            scale_y: 1.0,
            background,
            damage: Region::new(),
            valid: false,
        }
    }

    pub fn ws(&self) -> WorkspaceId {
        self.ws
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// `true` once the cache holds a complete rendering of the workspace.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn scale(&self) -> (f32, f32) {
        (self.scale_x, self.scale_y)
    }

    pub fn background(&self) -> Rgba8Premul {
        self.background
    }

    /// Damage collected while the stream was not updated, workspace-local.
    pub fn pending_damage(&self) -> &Region {
        &self.damage
    }

    /// The cache buffer, once allocated.
    pub fn desc(&self) -> Option<FramebufferDesc> {
        if self.buffer.is_allocated() {
            self.buffer.desc()
        } else {
            None
        }
    }

    pub(crate) fn add_damage(&mut self, local: &Region) {
        self.damage |= local;
    }

    pub(crate) fn set_background(&mut self, background: Rgba8Premul) {
        if self.background != background {
            self.background = background;
            self.valid = false;
        }
    }

    pub(crate) fn invalidate(&mut self) {
        self.valid = false;
    }

    pub(crate) fn release(&mut self, device: &mut dyn RenderDevice) {
        if self.buffer.is_allocated() {
            self.buffer.release(device);
        }
        self.valid = false;
        self.running = false;
    }

    /// Make this the displayed stream and bring it up to date.
    pub(crate) fn start(&mut self, env: &mut StreamEnv<'_>) -> OutpaintResult<StreamUpdate> {
        self.running = true;
        self.scale_x = 1.0;
        self.scale_y = 1.0;
        if !self.valid {
            *env.frame_damage |= workspace_box(&env.info, env.layout, self.ws);
        }
        self.update(env, 1.0, 1.0)
    }

    pub(crate) fn stop(&mut self) {
        self.running = false;
    }

    /// Repaint the damaged part of the cache.
    pub(crate) fn update(
        &mut self,
        env: &mut StreamEnv<'_>,
        scale_x: f32,
        scale_y: f32,
    ) -> OutpaintResult<StreamUpdate> {
        let whole = env.info.damage_box();
        let ws_box = workspace_box(&env.info, env.layout, self.ws);

        let mut damage = env
            .frame_damage
            .intersect_box(ws_box)
            .translate(-ws_box.x, -ws_box.y);
        damage |= &self.damage;
        if !self.valid {
            damage |= whole;
        }
        if scale_x != self.scale_x || scale_y != self.scale_y {
            self.scale_x = scale_x;
            self.scale_y = scale_y;
            damage |= whole;
        }
        if damage.is_empty() {
            return Ok(StreamUpdate::default());
        }

        if self
            .buffer
            .allocate(&mut *env.device, env.info.width, env.info.height)?
        {
            damage |= whole;
        }
        self.buffer.set_geometry(
            env.info.relative_geometry(),
            env.info.scale,
            env.info.transform,
        );
        let Some(desc) = self.buffer.desc() else {
            return Ok(StreamUpdate::default());
        };

        env.signals.emit_stream_pre(&mut StreamSignal {
            workspace: self.ws,
            damage: &mut damage,
            target: &desc,
            device: &mut *env.device,
        });
        damage &= whole;
        if damage.is_empty() {
            return Ok(StreamUpdate::default());
        }

        let mut remaining = damage.clone();
        let items = self.draw_list(env, &desc, &mut remaining);

        let mut clears = 0;
        {
            let mut target = BindGuard::new(&mut *env.device, desc);
            for r in &remaining {
                target.clear(*r, self.background);
                clears += 1;
            }
            for item in items.iter().rev() {
                item.render(&mut target);
            }
        }

        env.signals.emit_stream_post(&mut StreamSignal {
            workspace: self.ws,
            damage: &mut damage,
            target: &desc,
            device: &mut *env.device,
        });

        self.valid = true;
        self.damage.clear();
        tracing::trace!(
            ws = %self.ws,
            items = items.len(),
            clears,
            "workspace stream updated"
        );
        Ok(StreamUpdate {
            damage,
            draw_items: items.len(),
            clears,
        })
    }

    /// Front-to-back draw list; `remaining` loses every opaque surface's footprint.
    fn draw_list(
        &self,
        env: &StreamEnv<'_>,
        desc: &FramebufferDesc,
        remaining: &mut Region,
    ) -> Vec<DrawItem> {
        let cur = env.layout.current_workspace();
        let g = env.info.relative_geometry();
        let dx = (self.ws.x - cur.x) * g.width;
        let dy = (self.ws.y - cur.y) * g.height;

        let mut items = Vec::new();
        if env.drag_icons {
            for icon in env.layout.drag_icons() {
                if !icon.is_mapped() {
                    continue;
                }
                for surface in icon.surfaces() {
                    schedule_surface(surface, (0, 0), desc, remaining, &mut items);
                }
            }
        }

        for view in env.layout.views_on_workspace(self.ws, LayerMask::VISIBLE, false) {
            if remaining.is_empty() {
                break;
            }
            if !view.is_visible() {
                continue;
            }
            let offset = if view.role() == ViewRole::Shell {
                (0, 0)
            } else {
                (dx, dy)
            };
            if view.has_transform() || !view.is_mapped() {
                schedule_snapshot(view, offset, desc, remaining, &mut items);
                continue;
            }
            for surface in view.surfaces() {
                schedule_surface(surface, offset, desc, remaining, &mut items);
            }
        }
        items
    }
}

/// Box of `ws` in output damage coordinates, relative to the displayed workspace.
pub(crate) fn workspace_box(
    info: &OutputInfo,
    layout: &dyn WorkspaceLayout,
    ws: WorkspaceId,
) -> PixelBox {
    let cur = layout.current_workspace();
    let b = info.damage_box();
    PixelBox::new(
        (ws.x - cur.x) * b.width,
        (ws.y - cur.y) * b.height,
        b.width,
        b.height,
    )
}

fn schedule_surface(
    surface: Rc<dyn Surface>,
    (dx, dy): (i32, i32),
    desc: &FramebufferDesc,
    remaining: &mut Region,
    items: &mut Vec<DrawItem>,
) {
    if !surface.is_mapped() || remaining.is_empty() {
        return;
    }
    let local = surface.output_geometry().translate(-dx, -dy);
    let footprint = desc.damage_box_from_geometry_box(local);
    let damage = remaining.intersect_box(footprint);
    if damage.is_empty() {
        return;
    }
    if surface.alpha() >= OPAQUE_ALPHA {
        surface.subtract_opaque(remaining, footprint.x, footprint.y, desc.scale);
    }
    items.push(DrawItem::Surface {
        surface,
        x: local.x,
        y: local.y,
        damage,
    });
}

fn schedule_snapshot(
    view: Rc<dyn View>,
    (dx, dy): (i32, i32),
    desc: &FramebufferDesc,
    remaining: &Region,
    items: &mut Vec<DrawItem>,
) {
    let local = view.bounding_box().translate(-dx, -dy);
    let damage = remaining.intersect_box(desc.damage_box_from_geometry_box(local));
    if damage.is_empty() {
        return;
    }
    items.push(DrawItem::Snapshot {
        view,
        x: local.x,
        y: local.y,
        damage,
    });
}

#[cfg(test)]
#[path = "../../tests/unit/compositor/stream.rs"]
mod tests;
