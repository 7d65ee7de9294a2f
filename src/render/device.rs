use std::time::Instant;

use crate::{
    damage::region::Region,
    foundation::{
        core::{OutputTransform, PixelBox, Rgba8Premul},
        error::OutpaintResult,
    },
    render::framebuffer::FramebufferDesc,
};

/// Opaque identifier of a device pixel buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u64);

/// Graphics device boundary: buffer storage plus the handful of raster operations the pipeline
/// issues itself.
///
/// `clear` and `fill` act on the currently bound buffer and take boxes in buffer pixel
/// coordinates. All operations are synchronous: commands are complete when the call returns.
pub trait RenderDevice {
    /// Allocate a `width x height` buffer.
    fn allocate(&mut self, width: u32, height: u32) -> OutpaintResult<BufferId>;

    /// Free a buffer. Unknown ids are ignored.
    fn release(&mut self, id: BufferId);

    /// Make `id` the target of subsequent `clear`/`fill` calls.
    fn bind(&mut self, id: BufferId);

    /// Drop the current binding.
    fn unbind(&mut self);

    /// Overwrite `scissor` in the bound buffer with `color`.
    fn clear(&mut self, scissor: PixelBox, color: Rgba8Premul);

    /// Composite `color` over `rect` in the bound buffer.
    fn fill(&mut self, rect: PixelBox, color: Rgba8Premul);

    /// Copy the pixels of `region` from `src` to `dst` (same coordinates in both).
    fn copy_region(&mut self, src: BufferId, dst: BufferId, region: &Region);

    /// Pixel size of a live buffer.
    fn buffer_size(&self, id: BufferId) -> Option<(u32, u32)>;

    /// CPU view of a buffer's premultiplied RGBA8 pixels, when the device has one.
    fn pixels(&self, _id: BufferId) -> Option<&[u8]> {
        None
    }

    /// Mutable CPU view of a buffer's premultiplied RGBA8 pixels, when the device has one.
    fn pixels_mut(&mut self, _id: BufferId) -> Option<&mut [u8]> {
        None
    }
}

/// Current mode of an output.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OutputInfo {
    /// Buffer width in pixels (before the output transform).
    pub width: u32,
    /// Buffer height in pixels (before the output transform).
    pub height: u32,
    /// Output scale factor.
    pub scale: f64,
    /// Output orientation.
    pub transform: OutputTransform,
}

impl OutputInfo {
    /// Size of the output in damage coordinates (after the transform).
    pub fn transformed_size(&self) -> (i32, i32) {
        let w = i32::try_from(self.width).unwrap_or(i32::MAX);
        let h = i32::try_from(self.height).unwrap_or(i32::MAX);
        if self.transform.swaps_axes() {
            (h, w)
        } else {
            (w, h)
        }
    }

    /// The whole output in damage coordinates.
    pub fn damage_box(&self) -> PixelBox {
        let (w, h) = self.transformed_size();
        PixelBox::new(0, 0, w, h)
    }

    /// Logical geometry of the output relative to itself.
    pub fn relative_geometry(&self) -> PixelBox {
        let (w, h) = self.transformed_size();
        if self.scale > 0.0 && self.scale != 1.0 {
            return PixelBox::new(
                0,
                0,
                (f64::from(w) / self.scale).round() as i32,
                (f64::from(h) / self.scale).round() as i32,
            );
        }
        PixelBox::new(0, 0, w, h)
    }
}

/// Result of asking the presentation layer to start a frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameBegin {
    /// `false` when nothing changed since the last presented frame.
    pub needs_swap: bool,
    /// Damage the presenter knows about, already compensated for the back buffer's age.
    pub damage: Region,
    /// Frames since the back buffer was last presented; 0 means its contents are unknown.
    pub buffer_age: u32,
    /// The buffer that will be presented by the next `swap`.
    pub target: BufferId,
}

/// Presentation boundary of one output.
pub trait Presenter {
    /// Current output mode.
    fn output_info(&self) -> OutputInfo;

    /// Record damage (damage coordinates) for buffer-age bookkeeping.
    fn add_damage(&mut self, region: &Region);

    /// Ask for a frame event. Repeated calls before the event are harmless.
    fn schedule_frame(&mut self);

    /// Start a frame on the next back buffer.
    fn begin_frame(&mut self) -> OutpaintResult<FrameBegin>;

    /// Draw software cursors into `target`, limited to `damage`.
    fn render_cursors(&mut self, _target: &FramebufferDesc, _damage: &Region) {}

    /// Present the back buffer. `damage` is in buffer orientation.
    fn swap(&mut self, when: Instant, damage: &Region) -> OutpaintResult<()>;
}

/// Everything a [`RenderManager`](crate::RenderManager) needs from the layer below it.
pub trait OutputBackend: RenderDevice + Presenter {}

impl<T: RenderDevice + Presenter> OutputBackend for T {}
