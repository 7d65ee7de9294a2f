//! Collaborators that own window content.
//!
//! The pipeline never produces pixels for windows itself: it asks [`View`]s and their
//! [`Surface`]s to draw into a bound target, restricted to a damage region. Geometry reported by
//! views is logical and relative to the output's *current* workspace, so a view on the workspace
//! to the right has `x >= output_width`.

use std::{ops::BitOr, rc::Rc, time::Instant};

use crate::{
    damage::region::Region,
    foundation::core::{Affine, PixelBox, WorkspaceId},
    render::framebuffer::BindGuard,
};

pub mod scripted;

/// A bound render target handed to drawing collaborators for one call.
pub type RenderTarget<'d> = BindGuard<'d>;

/// Identity of a surface, stable for its lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u64);

/// A piece of client content (a toplevel, subsurface, popup or drag icon).
pub trait Surface {
    fn id(&self) -> SurfaceId;

    /// Draw with the top-left corner at logical `(x, y)` of `target`, touching only `damage`
    /// (damage coordinates of `target`).
    fn render(&self, target: &mut RenderTarget<'_>, x: i32, y: i32, damage: &Region);

    /// Logical box covered on the output when the surface's workspace is displayed.
    fn output_geometry(&self) -> PixelBox;

    fn is_mapped(&self) -> bool;

    /// Opacity the surface is drawn with, in `[0, 1]`.
    fn alpha(&self) -> f32;

    /// Remove the surface's known-opaque pixels from `region`. `(x, y)` is the surface origin in
    /// damage coordinates and `scale` the logical-to-damage scale of the target.
    fn subtract_opaque(&self, region: &mut Region, x: i32, y: i32, scale: f64);

    fn send_frame_done(&self, when: Instant);
}

/// How a view takes part in workspace layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ViewRole {
    #[default]
    Toplevel,
    Unmanaged,
    /// Panels, docks and backgrounds: shown at their own coordinates on every workspace.
    Shell,
}

/// A window as seen by the compositor.
pub trait View {
    /// Logical bounding box, including any active transform.
    fn bounding_box(&self) -> PixelBox;

    fn is_visible(&self) -> bool;

    fn is_mapped(&self) -> bool;

    /// `true` while a plugin draws the view through a visual transform.
    fn has_transform(&self) -> bool;

    fn role(&self) -> ViewRole;

    /// Mapped and unmapped surfaces of the view, front to back.
    fn surfaces(&self) -> Vec<Rc<dyn Surface>>;

    /// Draw the whole view (transform applied) with its bounding box at logical `(x, y)`.
    fn render_snapshot(&self, target: &mut RenderTarget<'_>, x: i32, y: i32, damage: &Region);
}

/// Stacking layers, as a bit set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct LayerMask(u32);

impl LayerMask {
    pub const NONE: Self = Self(0);
    pub const BACKGROUND: Self = Self(1 << 0);
    pub const BOTTOM: Self = Self(1 << 1);
    pub const WORKSPACE: Self = Self(1 << 2);
    pub const TOP: Self = Self(1 << 3);
    pub const UNMANAGED: Self = Self(1 << 4);
    pub const LOCK: Self = Self(1 << 5);

    pub const BELOW: Self = Self(Self::BACKGROUND.0 | Self::BOTTOM.0);
    pub const MIDDLE: Self = Self(Self::WORKSPACE.0);
    pub const ABOVE: Self = Self(Self::TOP.0 | Self::UNMANAGED.0 | Self::LOCK.0);
    pub const VISIBLE: Self = Self(Self::BELOW.0 | Self::MIDDLE.0 | Self::ABOVE.0);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for LayerMask {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Workspace grid and stacking order of one output.
pub trait WorkspaceLayout {
    /// Number of workspaces as `(columns, rows)`.
    fn grid_size(&self) -> (i32, i32);

    fn current_workspace(&self) -> WorkspaceId;

    /// Views on `ws` in `layers`, front to back. Recomputed on every call.
    fn views_on_workspace(
        &self,
        ws: WorkspaceId,
        layers: LayerMask,
        mapped_only: bool,
    ) -> Vec<Rc<dyn View>>;

    /// Every view in `layers` regardless of workspace, front to back.
    fn views_in_layers(&self, layers: LayerMask) -> Vec<Rc<dyn View>>;

    /// Drag-and-drop icons currently following the pointer, front to back.
    fn drag_icons(&self) -> Vec<Rc<dyn View>> {
        Vec::new()
    }
}

/// One entry of a workspace stream's draw list.
#[derive(Clone)]
pub enum DrawItem {
    /// A live surface, drawn at workspace-local logical `(x, y)`.
    Surface {
        surface: Rc<dyn Surface>,
        x: i32,
        y: i32,
        damage: Region,
    },
    /// A transformed or retained view, drawn as a whole at workspace-local `(x, y)`.
    Snapshot {
        view: Rc<dyn View>,
        x: i32,
        y: i32,
        damage: Region,
    },
}

impl DrawItem {
    /// Damage the item is limited to (damage coordinates of the stream buffer).
    pub fn damage(&self) -> &Region {
        match self {
            Self::Surface { damage, .. } | Self::Snapshot { damage, .. } => damage,
        }
    }

    pub fn render(&self, target: &mut RenderTarget<'_>) {
        match self {
            Self::Surface {
                surface,
                x,
                y,
                damage,
            } => surface.render(target, *x, *y, damage),
            Self::Snapshot { view, x, y, damage } => view.render_snapshot(target, *x, *y, damage),
        }
    }
}

impl std::fmt::Debug for DrawItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Surface { surface, x, y, damage } => f
                .debug_struct("Surface")
                .field("id", &surface.id())
                .field("x", x)
                .field("y", y)
                .field("damage", damage)
                .finish(),
            Self::Snapshot { view, x, y, damage } => f
                .debug_struct("Snapshot")
                .field("bounding_box", &view.bounding_box())
                .field("x", x)
                .field("y", y)
                .field("damage", damage)
                .finish(),
        }
    }
}

/// A box drawn through an affine transform around its centre.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transformed {
    pub base: PixelBox,
    pub affine: Affine,
}

impl Transformed {
    /// `affine` applied relative to the centre of `base`.
    pub fn around_center(base: PixelBox, affine: Affine) -> Self {
        let c = base.to_rect().center().to_vec2();
        Self {
            base,
            affine: Affine::translate(c) * affine * Affine::translate(-c),
        }
    }

    /// Smallest pixel box covering the transformed base.
    pub fn bounding_box(&self) -> PixelBox {
        PixelBox::from_rect(self.affine.transform_rect_bbox(self.base.to_rect()))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/mod.rs"]
mod tests;
