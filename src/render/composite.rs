use crate::foundation::{core::PixelBox, math::mul_div255_u8};

pub type PremulRgba8 = [u8; 4];

pub fn over(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src[3] == 0 {
        return dst;
    }

    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u16;
    let sa = mul_div255(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }

    let inv = 255u16 - u16::from(sa);

    let mut out = [0u8; 4];
    out[3] = add_sat_u8(sa, mul_div255(u16::from(dst[3]), inv));

    for i in 0..3 {
        let sc = mul_div255(u16::from(src[i]), op);
        let dc = mul_div255(u16::from(dst[i]), inv);
        out[i] = add_sat_u8(sc, dc);
    }
    out
}

/// `rgb' = a - rgb`, alpha untouched (premultiplied colour inversion).
pub fn invert(px: PremulRgba8) -> PremulRgba8 {
    let a = px[3];
    [
        a.saturating_sub(px[0]),
        a.saturating_sub(px[1]),
        a.saturating_sub(px[2]),
        a,
    ]
}

/// Part of `b` inside a `width x height` buffer, as `(x0, y0, x1, y1)` in `usize`.
pub(crate) fn clip_to_buffer(b: PixelBox, width: u32, height: u32) -> Option<[usize; 4]> {
    let w = i32::try_from(width).unwrap_or(i32::MAX);
    let h = i32::try_from(height).unwrap_or(i32::MAX);
    let c = b.intersect(PixelBox::new(0, 0, w, h))?;
    Some([c.x as usize, c.y as usize, c.x2() as usize, c.y2() as usize])
}

/// Overwrite `b` with `color`.
pub fn clear_box(data: &mut [u8], width: u32, height: u32, b: PixelBox, color: PremulRgba8) {
    let Some([x0, y0, x1, y1]) = clip_to_buffer(b, width, height) else {
        return;
    };
    let stride = width as usize * 4;
    for y in y0..y1 {
        let row = &mut data[y * stride + x0 * 4..y * stride + x1 * 4];
        for px in row.chunks_exact_mut(4) {
            px.copy_from_slice(&color);
        }
    }
}

/// Composite `color` over `b`.
pub fn fill_box(data: &mut [u8], width: u32, height: u32, b: PixelBox, color: PremulRgba8) {
    if color[3] == 255 {
        clear_box(data, width, height, b, color);
        return;
    }
    let Some([x0, y0, x1, y1]) = clip_to_buffer(b, width, height) else {
        return;
    };
    let stride = width as usize * 4;
    for y in y0..y1 {
        let row = &mut data[y * stride + x0 * 4..y * stride + x1 * 4];
        for px in row.chunks_exact_mut(4) {
            let out = over([px[0], px[1], px[2], px[3]], color, 1.0);
            px.copy_from_slice(&out);
        }
    }
}

/// Copy `b` between two buffers, clipped to both of them.
pub fn copy_box(
    src: &[u8],
    src_size: (u32, u32),
    dst: &mut [u8],
    dst_size: (u32, u32),
    b: PixelBox,
) {
    let w = src_size.0.min(dst_size.0);
    let h = src_size.1.min(dst_size.1);
    let Some([x0, y0, x1, y1]) = clip_to_buffer(b, w, h) else {
        return;
    };
    let src_stride = src_size.0 as usize * 4;
    let dst_stride = dst_size.0 as usize * 4;
    for y in y0..y1 {
        dst[y * dst_stride + x0 * 4..y * dst_stride + x1 * 4]
            .copy_from_slice(&src[y * src_stride + x0 * 4..y * src_stride + x1 * 4]);
    }
}

/// Apply `f` to every pixel of `b`.
pub fn map_box(
    data: &mut [u8],
    width: u32,
    height: u32,
    b: PixelBox,
    f: impl Fn(PremulRgba8) -> PremulRgba8,
) {
    let Some([x0, y0, x1, y1]) = clip_to_buffer(b, width, height) else {
        return;
    };
    let stride = width as usize * 4;
    for y in y0..y1 {
        let row = &mut data[y * stride + x0 * 4..y * stride + x1 * 4];
        for px in row.chunks_exact_mut(4) {
            let out = f([px[0], px[1], px[2], px[3]]);
            px.copy_from_slice(&out);
        }
    }
}

fn mul_div255(x: u16, y: u16) -> u8 {
    mul_div255_u8(x, y)
}

fn add_sat_u8(a: u8, b: u8) -> u8 {
    a.saturating_add(b)
}

#[cfg(test)]
#[path = "../../tests/unit/render/composite.rs"]
mod tests;
