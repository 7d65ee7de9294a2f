use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, BitXor, BitXorAssign, Sub, SubAssign};

use smallvec::SmallVec;

use crate::foundation::core::{OutputTransform, PixelBox};

/// Horizontal spans `[x1, x2)` of one band, sorted and never touching.
type Spans = SmallVec<[(i32, i32); 4]>;

/// Set of pixels stored as non-overlapping boxes.
///
/// The representation is canonical (y-x banded, like pixman): boxes are grouped in horizontal
/// bands sorted top to bottom, spans inside a band are sorted and never touch, and vertically
/// adjacent bands with identical spans are merged. Two regions covering the same pixels
/// therefore compare equal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Region {
    rects: Vec<PixelBox>,
}

#[derive(Clone, Copy, Debug)]
enum Op {
    Union,
    Intersect,
    Subtract,
    Xor,
}

impl Op {
    fn keep(self, in_a: bool, in_b: bool) -> bool {
        match self {
            Self::Union => in_a || in_b,
            Self::Intersect => in_a && in_b,
            Self::Subtract => in_a && !in_b,
            Self::Xor => in_a != in_b,
        }
    }
}

impl Region {
    /// The empty region.
    pub fn new() -> Self {
        Self::default()
    }

    /// Region covering a single box (empty if the box is degenerate).
    pub fn from_box(b: PixelBox) -> Self {
        if b.is_empty() {
            return Self::new();
        }
        Self { rects: vec![b] }
    }

    /// Region covering the union of arbitrary, possibly overlapping boxes.
    pub fn from_boxes(boxes: impl IntoIterator<Item = PixelBox>) -> Self {
        let input: Vec<PixelBox> = boxes.into_iter().filter(|b| !b.is_empty()).collect();
        Self {
            rects: combine(&input, &[], Op::Union),
        }
    }

    /// `true` when no pixel is covered.
    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Canonical boxes, top to bottom then left to right.
    pub fn rects(&self) -> &[PixelBox] {
        &self.rects
    }

    /// Iterate over the canonical boxes.
    pub fn iter(&self) -> impl Iterator<Item = PixelBox> + '_ {
        self.rects.iter().copied()
    }

    /// Bounding box of the region, `None` when empty.
    pub fn extents(&self) -> Option<PixelBox> {
        let first = self.rects.first()?;
        let (mut x1, mut y1, mut x2, mut y2) = (first.x, first.y, first.x2(), first.y2());
        for r in &self.rects[1..] {
            x1 = x1.min(r.x);
            y1 = y1.min(r.y);
            x2 = x2.max(r.x2());
            y2 = y2.max(r.y2());
        }
        Some(PixelBox::from_edges(x1, y1, x2, y2))
    }

    /// Number of covered pixels.
    pub fn area(&self) -> i64 {
        self.rects.iter().map(|r| r.area()).sum()
    }

    /// `true` when pixel `(x, y)` is covered.
    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        self.rects.iter().any(|r| r.contains_point(x, y))
    }

    /// `true` when every pixel of `other` is covered by `self`.
    pub fn contains_region(&self, other: &Region) -> bool {
        other.subtract(self).is_empty()
    }

    /// Remove every pixel.
    pub fn clear(&mut self) {
        self.rects.clear();
    }

    /// In-place union with a box.
    pub fn add_box(&mut self, b: PixelBox) {
        if b.is_empty() {
            return;
        }
        if self.rects.is_empty() {
            self.rects.push(b);
            return;
        }
        self.rects = combine(&self.rects, &[b], Op::Union);
    }

    /// In-place union with another region.
    pub fn add_region(&mut self, other: &Region) {
        if other.is_empty() {
            return;
        }
        if self.is_empty() {
            self.rects.clone_from(&other.rects);
            return;
        }
        self.rects = combine(&self.rects, &other.rects, Op::Union);
    }

    /// Pixels in either region.
    pub fn union(&self, other: &Region) -> Region {
        let mut out = self.clone();
        out.add_region(other);
        out
    }

    /// Pixels in both regions.
    pub fn intersect(&self, other: &Region) -> Region {
        if self.is_empty() || other.is_empty() {
            return Region::new();
        }
        Region {
            rects: combine(&self.rects, &other.rects, Op::Intersect),
        }
    }

    /// Pixels of `self` inside box `b`.
    pub fn intersect_box(&self, b: PixelBox) -> Region {
        self.intersect(&Region::from_box(b))
    }

    /// Pixels of `self` not in `other`.
    pub fn subtract(&self, other: &Region) -> Region {
        if self.is_empty() || other.is_empty() {
            return self.clone();
        }
        Region {
            rects: combine(&self.rects, &other.rects, Op::Subtract),
        }
    }

    /// Pixels of `self` outside box `b`.
    pub fn subtract_box(&self, b: PixelBox) -> Region {
        self.subtract(&Region::from_box(b))
    }

    /// Pixels in exactly one of the two regions.
    pub fn xor(&self, other: &Region) -> Region {
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }
        Region {
            rects: combine(&self.rects, &other.rects, Op::Xor),
        }
    }

    /// Region moved by `(dx, dy)`.
    pub fn translate(&self, dx: i32, dy: i32) -> Region {
        Region {
            rects: self.rects.iter().map(|r| r.translate(dx, dy)).collect(),
        }
    }

    /// Every box grown by `px` on all sides.
    pub fn expand(&self, px: i32) -> Region {
        Region::from_boxes(self.rects.iter().map(|r| r.expand(px)))
    }

    /// Every box mapped through an output transform of a `width x height` space.
    pub fn transform(&self, t: OutputTransform, width: i32, height: i32) -> Region {
        if t == OutputTransform::Normal {
            return self.clone();
        }
        Region::from_boxes(self.rects.iter().map(|r| t.transform_box(*r, width, height)))
    }
}

impl From<PixelBox> for Region {
    fn from(b: PixelBox) -> Self {
        Region::from_box(b)
    }
}

impl<'a> IntoIterator for &'a Region {
    type Item = &'a PixelBox;
    type IntoIter = std::slice::Iter<'a, PixelBox>;

    fn into_iter(self) -> Self::IntoIter {
        self.rects.iter()
    }
}

impl BitOr for &Region {
    type Output = Region;
    fn bitor(self, rhs: &Region) -> Region {
        self.union(rhs)
    }
}

impl BitAnd for &Region {
    type Output = Region;
    fn bitand(self, rhs: &Region) -> Region {
        self.intersect(rhs)
    }
}

impl Sub for &Region {
    type Output = Region;
    fn sub(self, rhs: &Region) -> Region {
        self.subtract(rhs)
    }
}

impl BitXor for &Region {
    type Output = Region;
    fn bitxor(self, rhs: &Region) -> Region {
        self.xor(rhs)
    }
}

impl BitOrAssign<&Region> for Region {
    fn bitor_assign(&mut self, rhs: &Region) {
        self.add_region(rhs);
    }
}

impl BitOrAssign<PixelBox> for Region {
    fn bitor_assign(&mut self, rhs: PixelBox) {
        self.add_box(rhs);
    }
}

impl BitAndAssign<&Region> for Region {
    fn bitand_assign(&mut self, rhs: &Region) {
        *self = self.intersect(rhs);
    }
}

impl BitAndAssign<PixelBox> for Region {
    fn bitand_assign(&mut self, rhs: PixelBox) {
        *self = self.intersect_box(rhs);
    }
}

impl SubAssign<&Region> for Region {
    fn sub_assign(&mut self, rhs: &Region) {
        *self = self.subtract(rhs);
    }
}

impl BitXorAssign<&Region> for Region {
    fn bitxor_assign(&mut self, rhs: &Region) {
        *self = self.xor(rhs);
    }
}

impl BitXorAssign<PixelBox> for Region {
    fn bitxor_assign(&mut self, rhs: PixelBox) {
        *self = self.xor(&Region::from_box(rhs));
    }
}

/// Band sweep over the y edges of both operands.
///
/// Every input box either covers a band completely or not at all, so per band the operands
/// reduce to sorted span lists that are combined with `op`.
fn combine(a: &[PixelBox], b: &[PixelBox], op: Op) -> Vec<PixelBox> {
    let mut ys: Vec<i32> = a
        .iter()
        .chain(b.iter())
        .flat_map(|r| [r.y, r.y2()])
        .collect();
    ys.sort_unstable();
    ys.dedup();

    let mut bands: Vec<(i32, i32, Spans)> = Vec::new();
    for w in ys.windows(2) {
        let (y1, y2) = (w[0], w[1]);
        let sa = band_spans(a, y1, y2);
        let sb = band_spans(b, y1, y2);
        let spans = combine_spans(&sa, &sb, op);
        if spans.is_empty() {
            continue;
        }
        match bands.last_mut() {
            Some((_, last_y2, last_spans)) if *last_y2 == y1 && *last_spans == spans => {
                *last_y2 = y2;
            }
            _ => bands.push((y1, y2, spans)),
        }
    }

    let mut out = Vec::with_capacity(bands.iter().map(|(_, _, s)| s.len()).sum());
    for (y1, y2, spans) in bands {
        for (x1, x2) in spans {
            out.push(PixelBox::from_edges(x1, y1, x2, y2));
        }
    }
    out
}

fn band_spans(rects: &[PixelBox], y1: i32, y2: i32) -> Spans {
    let mut spans: Spans = rects
        .iter()
        .filter(|r| r.y <= y1 && r.y2() >= y2)
        .map(|r| (r.x, r.x2()))
        .collect();
    spans.sort_unstable();

    let mut merged = Spans::new();
    for (x1, x2) in spans {
        match merged.last_mut() {
            Some(last) if x1 <= last.1 => last.1 = last.1.max(x2),
            _ => merged.push((x1, x2)),
        }
    }
    merged
}

fn combine_spans(a: &Spans, b: &Spans, op: Op) -> Spans {
    let mut xs: SmallVec<[i32; 16]> = a
        .iter()
        .chain(b.iter())
        .flat_map(|&(x1, x2)| [x1, x2])
        .collect();
    xs.sort_unstable();
    xs.dedup();

    let covers = |spans: &Spans, x: i32| spans.iter().any(|&(s, e)| s <= x && x < e);

    let mut out = Spans::new();
    for w in xs.windows(2) {
        let (x1, x2) = (w[0], w[1]);
        if !op.keep(covers(a, x1), covers(b, x1)) {
            continue;
        }
        match out.last_mut() {
            Some(last) if last.1 == x1 => last.1 = x2,
            _ => out.push((x1, x2)),
        }
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/damage/region.rs"]
mod tests;
