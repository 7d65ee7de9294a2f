//! In-memory scene of solid-colour views, driven by code or by a replay trace.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
    time::Instant,
};

use crate::{
    damage::region::Region,
    foundation::{
        core::{Affine, PixelBox, Rgba8Premul, WorkspaceId},
        math::mul_div255_u8,
    },
    scene::{
        LayerMask, RenderTarget, Surface, SurfaceId, Transformed, View, ViewRole, WorkspaceLayout,
    },
};

/// Rectangle of one colour.
#[derive(Debug)]
pub struct SolidSurface {
    id: SurfaceId,
    geometry: Cell<PixelBox>,
    color: Cell<Rgba8Premul>,
    alpha: Cell<f32>,
    mapped: Cell<bool>,
    renders: Cell<u32>,
    frame_done: Cell<u32>,
    last_frame_done: Cell<Option<Instant>>,
}

impl SolidSurface {
    pub fn new(id: u64, geometry: PixelBox, color: Rgba8Premul) -> Rc<Self> {
        Rc::new(Self {
            id: SurfaceId(id),
            geometry: Cell::new(geometry),
            color: Cell::new(color),
            alpha: Cell::new(1.0),
            mapped: Cell::new(true),
            renders: Cell::new(0),
            frame_done: Cell::new(0),
            last_frame_done: Cell::new(None),
        })
    }

    pub fn geometry(&self) -> PixelBox {
        self.geometry.get()
    }

    pub fn set_geometry(&self, geometry: PixelBox) {
        self.geometry.set(geometry);
    }

    pub fn color(&self) -> Rgba8Premul {
        self.color.get()
    }

    pub fn set_color(&self, color: Rgba8Premul) {
        self.color.set(color);
    }

    pub fn set_alpha(&self, alpha: f32) {
        self.alpha.set(alpha.clamp(0.0, 1.0));
    }

    pub fn set_mapped(&self, mapped: bool) {
        self.mapped.set(mapped);
    }

    /// Number of `render` calls so far.
    pub fn render_count(&self) -> u32 {
        self.renders.get()
    }

    /// Number of frame-done events received so far.
    pub fn frame_done_count(&self) -> u32 {
        self.frame_done.get()
    }

    pub fn last_frame_done(&self) -> Option<Instant> {
        self.last_frame_done.get()
    }

    fn effective_color(&self) -> Rgba8Premul {
        let c = self.color.get();
        let alpha = self.alpha.get();
        if alpha >= 1.0 {
            return c;
        }
        let op = (alpha * 255.0).round() as u16;
        let scale = |v: u8| mul_div255_u8(u16::from(v), op);
        Rgba8Premul {
            r: scale(c.r),
            g: scale(c.g),
            b: scale(c.b),
            a: scale(c.a),
        }
    }
}

impl Surface for SolidSurface {
    fn id(&self) -> SurfaceId {
        self.id
    }

    fn render(&self, target: &mut RenderTarget<'_>, x: i32, y: i32, damage: &Region) {
        let g = self.geometry.get();
        let footprint = target
            .desc()
            .damage_box_from_geometry_box(PixelBox::new(x, y, g.width, g.height));
        let color = self.effective_color();
        for r in &damage.intersect_box(footprint) {
            target.fill(*r, color);
        }
        self.renders.set(self.renders.get() + 1);
    }

    fn output_geometry(&self) -> PixelBox {
        self.geometry.get()
    }

    fn is_mapped(&self) -> bool {
        self.mapped.get()
    }

    fn alpha(&self) -> f32 {
        self.alpha.get()
    }

    fn subtract_opaque(&self, region: &mut Region, x: i32, y: i32, scale: f64) {
        if self.color.get().a != 255 {
            return;
        }
        let g = self.geometry.get();
        let size = PixelBox::new(0, 0, g.width, g.height).scaled(scale);
        *region = region.subtract_box(PixelBox::new(x, y, size.width, size.height));
    }

    fn send_frame_done(&self, when: Instant) {
        self.frame_done.set(self.frame_done.get() + 1);
        self.last_frame_done.set(Some(when));
    }
}

/// A view made of solid surfaces.
#[derive(Debug)]
pub struct SolidView {
    role: ViewRole,
    surfaces: RefCell<Vec<Rc<SolidSurface>>>,
    visible: Cell<bool>,
    mapped: Cell<bool>,
    transform: Cell<Option<Affine>>,
    snapshots: Cell<u32>,
}

impl SolidView {
    /// View from surfaces listed front to back.
    pub fn new(role: ViewRole, surfaces: Vec<Rc<SolidSurface>>) -> Rc<Self> {
        Rc::new(Self {
            role,
            surfaces: RefCell::new(surfaces),
            visible: Cell::new(true),
            mapped: Cell::new(true),
            transform: Cell::new(None),
            snapshots: Cell::new(0),
        })
    }

    /// Toplevel with one surface.
    pub fn single(id: u64, geometry: PixelBox, color: Rgba8Premul) -> Rc<Self> {
        Self::new(
            ViewRole::Toplevel,
            vec![SolidSurface::new(id, geometry, color)],
        )
    }

    pub fn main_surface(&self) -> Option<Rc<SolidSurface>> {
        self.surfaces.borrow().last().cloned()
    }

    pub fn solid_surfaces(&self) -> Vec<Rc<SolidSurface>> {
        self.surfaces.borrow().clone()
    }

    /// Add a surface in front of the existing ones.
    pub fn push_front_surface(&self, surface: Rc<SolidSurface>) {
        self.surfaces.borrow_mut().insert(0, surface);
    }

    pub fn set_visible(&self, visible: bool) {
        self.visible.set(visible);
    }

    /// Unmapping keeps the view visible (retained for an animation) until hidden.
    pub fn set_mapped(&self, mapped: bool) {
        self.mapped.set(mapped);
        for s in self.surfaces.borrow().iter() {
            s.set_mapped(mapped);
        }
    }

    pub fn set_transform(&self, transform: Option<Affine>) {
        self.transform.set(transform);
    }

    pub fn translate(&self, dx: i32, dy: i32) {
        for s in self.surfaces.borrow().iter() {
            s.set_geometry(s.geometry().translate(dx, dy));
        }
    }

    /// Number of `render_snapshot` calls so far.
    pub fn snapshot_count(&self) -> u32 {
        self.snapshots.get()
    }

    fn base_box(&self) -> PixelBox {
        let surfaces = self.surfaces.borrow();
        let region = Region::from_boxes(surfaces.iter().map(|s| s.geometry()));
        region.extents().unwrap_or_default()
    }
}

impl View for SolidView {
    fn bounding_box(&self) -> PixelBox {
        let base = self.base_box();
        match self.transform.get() {
            Some(affine) => Transformed::around_center(base, affine).bounding_box(),
            None => base,
        }
    }

    fn is_visible(&self) -> bool {
        self.visible.get()
    }

    fn is_mapped(&self) -> bool {
        self.mapped.get()
    }

    fn has_transform(&self) -> bool {
        self.transform.get().is_some()
    }

    fn role(&self) -> ViewRole {
        self.role
    }

    fn surfaces(&self) -> Vec<Rc<dyn Surface>> {
        self.surfaces
            .borrow()
            .iter()
            .map(|s| Rc::clone(s) as Rc<dyn Surface>)
            .collect()
    }

    fn render_snapshot(&self, target: &mut RenderTarget<'_>, x: i32, y: i32, damage: &Region) {
        let bb = self.bounding_box();
        for s in self.surfaces.borrow().iter().rev() {
            let g = s.geometry();
            s.render(target, x + (g.x - bb.x), y + (g.y - bb.y), damage);
        }
        self.snapshots.set(self.snapshots.get() + 1);
    }
}

/// Stacking layer of a scripted view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Layer {
    Background,
    Bottom,
    Workspace,
    Top,
    Unmanaged,
    Lock,
}

impl Layer {
    pub fn mask(self) -> LayerMask {
        match self {
            Self::Background => LayerMask::BACKGROUND,
            Self::Bottom => LayerMask::BOTTOM,
            Self::Workspace => LayerMask::WORKSPACE,
            Self::Top => LayerMask::TOP,
            Self::Unmanaged => LayerMask::UNMANAGED,
            Self::Lock => LayerMask::LOCK,
        }
    }
}

struct Placed {
    view: Rc<SolidView>,
    layer: Layer,
}

/// Workspace grid holding [`SolidView`]s.
///
/// Like a real workspace manager, switching workspaces moves every non-shell view so that
/// geometry stays relative to the displayed workspace.
pub struct ScriptedLayout {
    grid: (i32, i32),
    output_size: (i32, i32),
    current: Cell<WorkspaceId>,
    views: RefCell<Vec<Placed>>,
    drag_icons: RefCell<Vec<Rc<SolidView>>>,
}

impl ScriptedLayout {
    /// `output_size` is the logical size of one workspace.
    pub fn new(grid: (i32, i32), output_size: (i32, i32)) -> Self {
        Self {
            grid: (grid.0.max(1), grid.1.max(1)),
            output_size,
            current: Cell::new(WorkspaceId::new(0, 0)),
            views: RefCell::new(Vec::new()),
            drag_icons: RefCell::new(Vec::new()),
        }
    }

    /// Place `view` on top of `layer`.
    pub fn add_view(&self, view: Rc<SolidView>, layer: Layer) {
        self.views.borrow_mut().push(Placed { view, layer });
    }

    pub fn remove_view(&self, view: &Rc<SolidView>) {
        self.views
            .borrow_mut()
            .retain(|p| !Rc::ptr_eq(&p.view, view));
    }

    pub fn add_drag_icon(&self, icon: Rc<SolidView>) {
        self.drag_icons.borrow_mut().push(icon);
    }

    pub fn clear_drag_icons(&self) {
        self.drag_icons.borrow_mut().clear();
    }

    /// Display `ws`; out-of-grid coordinates are clamped.
    pub fn set_current_workspace(&self, ws: WorkspaceId) {
        let ws = WorkspaceId::new(
            ws.x.clamp(0, self.grid.0 - 1),
            ws.y.clamp(0, self.grid.1 - 1),
        );
        let old = self.current.replace(ws);
        let dx = (old.x - ws.x) * self.output_size.0;
        let dy = (old.y - ws.y) * self.output_size.1;
        if dx == 0 && dy == 0 {
            return;
        }
        for p in self.views.borrow().iter() {
            if p.view.role() != ViewRole::Shell {
                p.view.translate(dx, dy);
            }
        }
    }

    /// Logical box of `ws` relative to the displayed workspace.
    pub fn workspace_box(&self, ws: WorkspaceId) -> PixelBox {
        let cur = self.current.get();
        PixelBox::new(
            (ws.x - cur.x) * self.output_size.0,
            (ws.y - cur.y) * self.output_size.1,
            self.output_size.0,
            self.output_size.1,
        )
    }

    fn collect(&self, layers: LayerMask, keep: impl Fn(&SolidView) -> bool) -> Vec<Rc<dyn View>> {
        let views = self.views.borrow();
        let mut placed: Vec<&Placed> = views
            .iter()
            .rev()
            .filter(|p| layers.intersects(p.layer.mask()) && keep(p.view.as_ref()))
            .collect();
        placed.sort_by_key(|p| std::cmp::Reverse(p.layer));
        placed
            .into_iter()
            .map(|p| Rc::clone(&p.view) as Rc<dyn View>)
            .collect()
    }
}

impl WorkspaceLayout for ScriptedLayout {
    fn grid_size(&self) -> (i32, i32) {
        self.grid
    }

    fn current_workspace(&self) -> WorkspaceId {
        self.current.get()
    }

    fn views_on_workspace(
        &self,
        ws: WorkspaceId,
        layers: LayerMask,
        mapped_only: bool,
    ) -> Vec<Rc<dyn View>> {
        let ws_box = self.workspace_box(ws);
        self.collect(layers, |v| {
            if mapped_only && !v.is_mapped() {
                return false;
            }
            v.role() == ViewRole::Shell || v.bounding_box().intersect(ws_box).is_some()
        })
    }

    fn views_in_layers(&self, layers: LayerMask) -> Vec<Rc<dyn View>> {
        self.collect(layers, |_| true)
    }

    fn drag_icons(&self) -> Vec<Rc<dyn View>> {
        self.drag_icons
            .borrow()
            .iter()
            .rev()
            .map(|v| Rc::clone(v) as Rc<dyn View>)
            .collect()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/scripted.rs"]
mod tests;
