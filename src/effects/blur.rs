//! Damage-limited gaussian blur.
//!
//! A blurred pixel depends on its neighbours up to the kernel radius away, so repainting only
//! the damaged part of a blurred area needs the undamaged pixels around it. [`BlurKernel`]
//! blurs a region of a buffer while reading outside it; [`BlurPadding`] is the workspace
//! stream side: it grows stream damage by the radius and puts the padding back afterwards.

use std::{cell::RefCell, rc::Rc};

use crate::{
    damage::region::Region,
    effects::signals::StreamSignal,
    foundation::{
        core::PixelBox,
        error::{OutpaintError, OutpaintResult},
        math::rgba8_len,
    },
    render::composite::clip_to_buffer,
};

/// Largest accepted kernel radius, in pixels.
pub const MAX_BLUR_RADIUS: u32 = 64;

/// Normalised one-dimensional gaussian weights, applied horizontally then vertically.
#[derive(Clone, Debug, PartialEq)]
pub struct BlurKernel {
    radius: i32,
    weights: Vec<f32>,
}

impl BlurKernel {
    pub fn new(radius: u32, sigma: f32) -> OutpaintResult<Self> {
        if radius > MAX_BLUR_RADIUS {
            return Err(OutpaintError::config(format!(
                "blur radius must be at most {MAX_BLUR_RADIUS}, got {radius}"
            )));
        }
        if !sigma.is_finite() || sigma <= 0.0 {
            return Err(OutpaintError::config("blur sigma must be > 0"));
        }
        let radius = radius as i32;
        let two_s2 = 2.0 * sigma * sigma;
        let mut weights: Vec<f32> = (-radius..=radius)
            .map(|i| (-((i * i) as f32) / two_s2).exp())
            .collect();
        // the centre weight is 1, so the sum is never zero
        let total: f32 = weights.iter().sum();
        for w in &mut weights {
            *w /= total;
        }
        Ok(Self { radius, weights })
    }

    pub fn radius(&self) -> i32 {
        self.radius
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    /// Blur the pixels of `region` (buffer coordinates) in place.
    ///
    /// Pixels outside `region` are sampled, never written, and every output pixel is computed
    /// from the unblurred buffer. Samples past the buffer edge repeat the edge pixel.
    pub fn apply(
        &self,
        data: &mut [u8],
        width: u32,
        height: u32,
        region: &Region,
    ) -> OutpaintResult<()> {
        let len = rgba8_len(width, height)
            .ok_or_else(|| OutpaintError::backend("blur buffer size overflow"))?;
        if data.len() != len {
            return Err(OutpaintError::backend(format!(
                "blur buffer holds {} bytes, {width}x{height} needs {len}",
                data.len()
            )));
        }
        if self.radius == 0 || len == 0 {
            return Ok(());
        }

        let blurred: Vec<(PixelBox, Vec<u8>)> = region
            .iter()
            .filter_map(|r| clip_box(r, width, height))
            .map(|b| (b, self.blur_box(data, width, height, b)))
            .collect();
        for (b, pixels) in blurred {
            write_box(data, width, b, &pixels);
        }
        Ok(())
    }

    /// Blurred pixels of `b`, row-major.
    fn blur_box(&self, data: &[u8], width: u32, height: u32, b: PixelBox) -> Vec<u8> {
        let (w, h) = (width as i32, height as i32);
        let stride = width as usize * 4;
        let sample = |x: i32, y: i32| {
            let i = y.clamp(0, h - 1) as usize * stride + x.clamp(0, w - 1) as usize * 4;
            &data[i..i + 4]
        };

        // horizontal pass over every row the vertical pass reads, restricted to b's columns
        let rows = (b.y - self.radius)..(b.y2() + self.radius);
        let cols = b.width as usize;
        let mut horizontal = vec![[0.0f32; 4]; rows.len() * cols];
        for (ri, y) in rows.clone().enumerate() {
            for (ci, x) in (b.x..b.x2()).enumerate() {
                let acc = &mut horizontal[ri * cols + ci];
                for (k, weight) in (-self.radius..=self.radius).zip(&self.weights) {
                    let px = sample(x + k, y);
                    for c in 0..4 {
                        acc[c] += weight * f32::from(px[c]);
                    }
                }
            }
        }

        let mut out = Vec::with_capacity(cols * b.height as usize * 4);
        for y in b.y..b.y2() {
            for ci in 0..cols {
                let mut acc = [0.0f32; 4];
                for (k, weight) in (-self.radius..=self.radius).zip(&self.weights) {
                    let src = &horizontal[(y + k - rows.start) as usize * cols + ci];
                    for c in 0..4 {
                        acc[c] += weight * src[c];
                    }
                }
                out.extend(acc.iter().map(|v| v.round().clamp(0.0, 255.0) as u8));
            }
        }
        out
    }
}

/// Stream listener state that lets a blur see the undamaged neighbours of stream damage.
///
/// [`BlurPadding::expand`] runs on `stream-pre`: it saves the pixels of a band of `radius`
/// around the damage and adds the band to the damage, so the stream redraws the neighbours a
/// blur samples. [`BlurPadding::restore`] runs on `stream-post`, after the blur: it writes the
/// saved band back, so only the original damage changes.
#[derive(Debug, Default)]
pub struct BlurPadding {
    radius: i32,
    // band in buffer coordinates, with its saved pixels
    saved: Vec<(PixelBox, Vec<u8>)>,
}

impl BlurPadding {
    pub fn new(radius: u32) -> Self {
        Self {
            radius: radius.min(MAX_BLUR_RADIUS) as i32,
            saved: Vec::new(),
        }
    }

    /// Area currently saved, in buffer coordinates.
    pub fn padded(&self) -> Region {
        Region::from_boxes(self.saved.iter().map(|(b, _)| *b))
    }

    pub fn expand(&mut self, signal: &mut StreamSignal<'_>) {
        self.saved.clear();
        if self.radius == 0 || signal.damage.is_empty() {
            return;
        }
        let target = *signal.target;
        let expanded = signal
            .damage
            .expand(self.radius)
            .intersect_box(target.damage_box());
        let band = target.framebuffer_region_from_damage(&expanded.subtract(signal.damage));
        if let Some(px) = signal.device.pixels(target.buffer) {
            for r in &band {
                if let Some(b) = clip_box(*r, target.width, target.height) {
                    self.saved.push((b, read_box(px, target.width, b)));
                }
            }
        }
        *signal.damage = expanded;
    }

    pub fn restore(&mut self, signal: &mut StreamSignal<'_>) {
        let target = signal.target;
        let Some(px) = signal.device.pixels_mut(target.buffer) else {
            self.saved.clear();
            return;
        };
        for (b, pixels) in self.saved.drain(..) {
            if clip_box(b, target.width, target.height) == Some(b) {
                write_box(px, target.width, b, &pixels);
            }
        }
    }
}

/// `stream-pre` and `stream-post` listeners sharing one [`BlurPadding`].
///
/// Connect the post listener after whatever blurs the stream, since listeners run in
/// connection order.
pub fn padding_listeners(
    radius: u32,
) -> (
    impl FnMut(&mut StreamSignal<'_>) + 'static,
    impl FnMut(&mut StreamSignal<'_>) + 'static,
) {
    let pre = Rc::new(RefCell::new(BlurPadding::new(radius)));
    let post = Rc::clone(&pre);
    (
        move |signal: &mut StreamSignal<'_>| pre.borrow_mut().expand(signal),
        move |signal: &mut StreamSignal<'_>| post.borrow_mut().restore(signal),
    )
}

fn clip_box(b: PixelBox, width: u32, height: u32) -> Option<PixelBox> {
    let [x0, y0, x1, y1] = clip_to_buffer(b, width, height)?;
    Some(PixelBox::new(
        x0 as i32,
        y0 as i32,
        (x1 - x0) as i32,
        (y1 - y0) as i32,
    ))
}

fn read_box(data: &[u8], width: u32, b: PixelBox) -> Vec<u8> {
    let stride = width as usize * 4;
    let row = b.width as usize * 4;
    let mut out = Vec::with_capacity(row * b.height as usize);
    for y in b.y..b.y2() {
        let start = y as usize * stride + b.x as usize * 4;
        out.extend_from_slice(&data[start..start + row]);
    }
    out
}

fn write_box(data: &mut [u8], width: u32, b: PixelBox, pixels: &[u8]) {
    let stride = width as usize * 4;
    let row = b.width as usize * 4;
    for (i, src) in pixels.chunks_exact(row).enumerate() {
        let start = (b.y as usize + i) * stride + b.x as usize * 4;
        data[start..start + row].copy_from_slice(src);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/effects/blur.rs"]
mod tests;
