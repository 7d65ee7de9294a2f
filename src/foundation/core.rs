pub use kurbo::{Affine, Point, Rect};

/// Integer pixel rectangle `[x, x + width) x [y, y + height)`.
///
/// Boxes with a non-positive width or height are degenerate: they cover no pixels and are never
/// stored inside a [`Region`](crate::Region).
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct PixelBox {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
}

impl PixelBox {
    /// Create a box from its origin and extent.
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a box from its edges (`x1`/`y1` exclusive).
    pub fn from_edges(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self::new(x1, y1, x2.saturating_sub(x1), y2.saturating_sub(y1))
    }

    /// Exclusive right edge.
    pub fn x2(self) -> i32 {
        self.x.saturating_add(self.width)
    }

    /// Exclusive bottom edge.
    pub fn y2(self) -> i32 {
        self.y.saturating_add(self.height)
    }

    /// `true` when the box covers no pixels.
    pub fn is_empty(self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Pixel area (0 for degenerate boxes).
    pub fn area(self) -> i64 {
        if self.is_empty() {
            return 0;
        }
        i64::from(self.width) * i64::from(self.height)
    }

    /// Overlap of two boxes, `None` when they do not share a pixel.
    pub fn intersect(self, other: Self) -> Option<Self> {
        let out = Self::from_edges(
            self.x.max(other.x),
            self.y.max(other.y),
            self.x2().min(other.x2()),
            self.y2().min(other.y2()),
        );
        (!out.is_empty()).then_some(out)
    }

    /// `true` when pixel `(px, py)` lies inside the box.
    pub fn contains_point(self, px: i32, py: i32) -> bool {
        px >= self.x && px < self.x2() && py >= self.y && py < self.y2()
    }

    /// `true` when `other` lies entirely inside `self`.
    pub fn contains_box(self, other: Self) -> bool {
        other.is_empty()
            || (other.x >= self.x
                && other.y >= self.y
                && other.x2() <= self.x2()
                && other.y2() <= self.y2())
    }

    /// Move the box by `(dx, dy)`.
    pub fn translate(self, dx: i32, dy: i32) -> Self {
        Self::new(
            self.x.saturating_add(dx),
            self.y.saturating_add(dy),
            self.width,
            self.height,
        )
    }

    /// Grow the box by `px` on every side.
    pub fn expand(self, px: i32) -> Self {
        Self::from_edges(
            self.x.saturating_sub(px),
            self.y.saturating_sub(px),
            self.x2().saturating_add(px),
            self.y2().saturating_add(px),
        )
    }

    /// Scale both origin and extent, rounding outward so no covered pixel is lost.
    pub fn scaled(self, scale: f64) -> Self {
        Self::from_rect(self.to_rect().scale_from_origin(scale))
    }

    /// Smallest box covering a floating-point rectangle.
    pub fn from_rect(rect: Rect) -> Self {
        let r = rect.abs().expand();
        Self::from_edges(
            clamp_to_i32(r.x0),
            clamp_to_i32(r.y0),
            clamp_to_i32(r.x1),
            clamp_to_i32(r.y1),
        )
    }

    /// Convert to a `kurbo` rectangle.
    pub fn to_rect(self) -> Rect {
        Rect::new(
            f64::from(self.x),
            f64::from(self.y),
            f64::from(self.x2()),
            f64::from(self.y2()),
        )
    }
}

fn clamp_to_i32(v: f64) -> i32 {
    if v.is_nan() {
        return 0;
    }
    v.clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32
}

/// Coordinates of a workspace in the output's workspace grid.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize,
    serde::Deserialize,
)]
pub struct WorkspaceId {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl WorkspaceId {
    /// Create a workspace id.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl std::fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Output orientation, matching the eight `wl_output` transforms.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum OutputTransform {
    /// No transform.
    #[default]
    Normal,
    /// 90 degrees counter-clockwise.
    Rotate90,
    /// 180 degrees.
    Rotate180,
    /// 270 degrees counter-clockwise.
    Rotate270,
    /// Mirrored around the vertical axis.
    Flipped,
    /// Mirrored, then rotated 90 degrees.
    Flipped90,
    /// Mirrored, then rotated 180 degrees.
    Flipped180,
    /// Mirrored, then rotated 270 degrees.
    Flipped270,
}

impl OutputTransform {
    /// `true` for the transforms that exchange width and height.
    pub fn swaps_axes(self) -> bool {
        matches!(
            self,
            Self::Rotate90 | Self::Rotate270 | Self::Flipped90 | Self::Flipped270
        )
    }

    /// Transform undoing `self`. Flipped transforms are their own inverse.
    pub fn invert(self) -> Self {
        match self {
            Self::Rotate90 => Self::Rotate270,
            Self::Rotate270 => Self::Rotate90,
            other => other,
        }
    }

    /// Map a box living in a `width x height` space through this transform.
    pub fn transform_box(self, b: PixelBox, width: i32, height: i32) -> PixelBox {
        let (w, h) = if self.swaps_axes() {
            (b.height, b.width)
        } else {
            (b.width, b.height)
        };
        let (x, y) = match self {
            Self::Normal => (b.x, b.y),
            Self::Rotate90 => (height - b.y - b.height, b.x),
            Self::Rotate180 => (width - b.x - b.width, height - b.y - b.height),
            Self::Rotate270 => (b.y, width - b.x - b.width),
            Self::Flipped => (width - b.x - b.width, b.y),
            Self::Flipped90 => (b.y, b.x),
            Self::Flipped180 => (b.x, height - b.y - b.height),
            Self::Flipped270 => (height - b.y - b.height, width - b.x - b.width),
        };
        PixelBox::new(x, y, w, h)
    }
}

/// Premultiplied RGBA8 (r,g,b already multiplied by a).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba8Premul {
    /// Red channel premultiplied by alpha.
    pub r: u8,
    /// Green channel premultiplied by alpha.
    pub g: u8,
    /// Blue channel premultiplied by alpha.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Rgba8Premul {
    /// Fully transparent black.
    pub fn transparent() -> Self {
        Self {
            r: 0,
            g: 0,
            b: 0,
            a: 0,
        }
    }

    /// Opaque black.
    pub fn black() -> Self {
        Self {
            r: 0,
            g: 0,
            b: 0,
            a: 255,
        }
    }

    /// Convert straight-alpha RGBA8 into premultiplied RGBA8.
    pub fn from_straight_rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        fn premul(c: u8, a: u8) -> u8 {
            crate::foundation::math::mul_div255_u8(u16::from(c), u16::from(a))
        }

        Self {
            r: premul(r, a),
            g: premul(g, a),
            b: premul(b, a),
            a,
        }
    }

    /// Same as [`Rgba8Premul::from_straight_rgba`] for an `[r, g, b, a]` array.
    pub fn from_straight(rgba: [u8; 4]) -> Self {
        let [r, g, b, a] = rgba;
        Self::from_straight_rgba(r, g, b, a)
    }

    /// Channel array in memory order.
    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
