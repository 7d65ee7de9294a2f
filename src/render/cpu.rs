use std::{
    collections::{HashMap, VecDeque},
    time::Instant,
};

use crate::{
    damage::region::Region,
    foundation::{
        core::{OutputTransform, PixelBox, Rgba8Premul},
        error::{OutpaintError, OutpaintResult},
    },
    render::{
        composite::{clear_box, copy_box, fill_box},
        device::{BufferId, FrameBegin, OutputInfo, Presenter, RenderDevice},
        framebuffer::FramebufferDesc,
    },
};

/// Entries kept by [`SoftwareBackend::swaps`] and [`SoftwareBackend::allocation_log`].
pub const RECORD_LIMIT: usize = 256;

/// A presented frame as RGBA8 pixels.
///
/// Frames are **premultiplied alpha**; the `premultiplied` flag makes this explicit at API
/// boundaries.
#[derive(Clone, Debug)]
pub struct FrameRgba {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
    /// Whether the `data` is premultiplied alpha.
    pub premultiplied: bool,
}

impl FrameRgba {
    /// Straight-alpha copy of the pixels, suitable for image encoders.
    pub fn to_straight(&self) -> Vec<u8> {
        let mut out = self.data.clone();
        for px in out.chunks_exact_mut(4) {
            let a = u16::from(px[3]);
            if a == 0 || a == 255 || !self.premultiplied {
                continue;
            }
            for c in &mut px[..3] {
                *c = ((u16::from(*c) * 255 + a / 2) / a).min(255) as u8;
            }
        }
        out
    }
}

/// Options for [`SoftwareBackend::new`].
#[derive(Clone, Debug)]
pub struct SoftwareBackendOpts {
    pub width: u32,
    pub height: u32,
    pub scale: f64,
    pub transform: OutputTransform,
    /// Number of presentable buffers rotated by `swap`.
    pub swapchain_len: usize,
}

impl Default for SoftwareBackendOpts {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            scale: 1.0,
            transform: OutputTransform::Normal,
            swapchain_len: 2,
        }
    }
}

/// Counters of device work, for tests and the replay CLI.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SoftwareStats {
    pub allocations: u64,
    pub releases: u64,
    pub binds: u64,
    pub unbinds: u64,
    pub clears: u64,
    pub fills: u64,
    pub copies: u64,
    pub schedule_calls: u64,
    pub cursor_renders: u64,
    pub swaps: u64,
}

/// One presented frame.
#[derive(Clone, Debug)]
pub struct SwapRecord {
    pub buffer: BufferId,
    /// Damage handed to `swap`, in buffer orientation.
    pub damage: Region,
    pub buffer_age: u32,
    pub when: Instant,
}

struct CpuBuffer {
    width: u16,
    height: u16,
    pixmap: vello_cpu::Pixmap,
}

#[derive(Clone, Copy, Debug)]
struct SwapSlot {
    buffer: BufferId,
    age: u32,
}

/// CPU render device and headless presenter for a single output.
///
/// Buffers are `vello_cpu` pixmaps. Presentation rotates through a fixed swapchain and reports
/// real buffer ages, with damage remembered for as many frames as there are buffers.
pub struct SoftwareBackend {
    info: OutputInfo,
    buffers: HashMap<BufferId, CpuBuffer>,
    next_id: u64,
    bound: Option<BufferId>,
    swapchain: Vec<SwapSlot>,
    swapchain_len: usize,
    back: usize,
    current_damage: Region,
    previous: VecDeque<Region>,
    ready: bool,
    frame_requested: bool,
    failing_allocations: u32,
    cursor: Option<(PixelBox, Rgba8Premul)>,
    stats: SoftwareStats,
    allocation_log: VecDeque<(BufferId, u32, u32)>,
    swaps: VecDeque<SwapRecord>,
}

impl SoftwareBackend {
    pub fn new(opts: SoftwareBackendOpts) -> OutpaintResult<Self> {
        if opts.swapchain_len == 0 {
            return Err(OutpaintError::backend("swapchain needs at least one buffer"));
        }
        let mut backend = Self {
            info: OutputInfo {
                width: opts.width,
                height: opts.height,
                scale: opts.scale,
                transform: opts.transform,
            },
            buffers: HashMap::new(),
            next_id: 1,
            bound: None,
            swapchain: Vec::new(),
            swapchain_len: opts.swapchain_len,
            back: 0,
            current_damage: Region::new(),
            previous: VecDeque::new(),
            ready: true,
            frame_requested: false,
            failing_allocations: 0,
            cursor: None,
            stats: SoftwareStats::default(),
            allocation_log: VecDeque::new(),
            swaps: VecDeque::new(),
        };
        backend.rebuild_swapchain()?;
        Ok(backend)
    }

    /// Change the output mode. The swapchain is recreated, so every buffer age resets to 0.
    pub fn resize(&mut self, width: u32, height: u32) -> OutpaintResult<()> {
        self.info.width = width;
        self.info.height = height;
        self.rebuild_swapchain()
    }

    pub fn set_transform(&mut self, transform: OutputTransform) -> OutpaintResult<()> {
        self.info.transform = transform;
        self.rebuild_swapchain()
    }

    /// Make `begin_frame`/`swap` fail with [`OutpaintError::OutputNotReady`].
    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    /// Fail the next `n` calls to [`RenderDevice::allocate`].
    pub fn fail_allocations(&mut self, n: u32) {
        self.failing_allocations = n;
    }

    /// Software cursor drawn by `render_cursors`.
    pub fn set_cursor(&mut self, cursor: Option<(PixelBox, Rgba8Premul)>) {
        self.cursor = cursor;
    }

    /// `true` while a frame was requested and not yet started.
    pub fn frame_requested(&self) -> bool {
        self.frame_requested
    }

    pub fn stats(&self) -> &SoftwareStats {
        &self.stats
    }

    /// The last [`RECORD_LIMIT`] successful `allocate` calls as `(id, width, height)`, oldest
    /// first.
    pub fn allocation_log(&self) -> Vec<(BufferId, u32, u32)> {
        self.allocation_log.iter().copied().collect()
    }

    /// The last [`RECORD_LIMIT`] presented frames, oldest first.
    pub fn swaps(&self) -> Vec<SwapRecord> {
        self.swaps.iter().cloned().collect()
    }

    /// Number of buffers currently alive, swapchain included.
    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_live(&self, id: BufferId) -> bool {
        self.buffers.contains_key(&id)
    }

    /// Buffers of the swapchain in rotation order.
    pub fn swapchain_buffers(&self) -> Vec<BufferId> {
        self.swapchain.iter().map(|s| s.buffer).collect()
    }

    /// Copy of the most recently presented buffer.
    pub fn last_presented_frame(&self) -> Option<FrameRgba> {
        let last = self.swaps.back()?;
        self.read_frame(last.buffer)
    }

    /// Copy of any live buffer.
    pub fn read_frame(&self, id: BufferId) -> Option<FrameRgba> {
        let buf = self.buffers.get(&id)?;
        Some(FrameRgba {
            width: u32::from(buf.width),
            height: u32::from(buf.height),
            data: buf.pixmap.data_as_u8_slice().to_vec(),
            premultiplied: true,
        })
    }

    /// Premultiplied pixel at `(x, y)` of a live buffer.
    pub fn pixel(&self, id: BufferId, x: u32, y: u32) -> Option<[u8; 4]> {
        let buf = self.buffers.get(&id)?;
        if x >= u32::from(buf.width) || y >= u32::from(buf.height) {
            return None;
        }
        let idx = (y as usize * usize::from(buf.width) + x as usize) * 4;
        let data = buf.pixmap.data_as_u8_slice();
        Some([data[idx], data[idx + 1], data[idx + 2], data[idx + 3]])
    }

    fn create_buffer(&mut self, width: u32, height: u32) -> OutpaintResult<BufferId> {
        let width_u16: u16 = width
            .try_into()
            .map_err(|_| OutpaintError::allocation("buffer width exceeds u16"))?;
        let height_u16: u16 = height
            .try_into()
            .map_err(|_| OutpaintError::allocation("buffer height exceeds u16"))?;
        if width_u16 == 0 || height_u16 == 0 {
            return Err(OutpaintError::allocation(format!(
                "cannot allocate {width}x{height} buffer"
            )));
        }

        let id = BufferId(self.next_id);
        self.next_id += 1;
        self.buffers.insert(
            id,
            CpuBuffer {
                width: width_u16,
                height: height_u16,
                pixmap: vello_cpu::Pixmap::new(width_u16, height_u16),
            },
        );
        Ok(id)
    }

    fn rebuild_swapchain(&mut self) -> OutpaintResult<()> {
        for slot in std::mem::take(&mut self.swapchain) {
            self.buffers.remove(&slot.buffer);
        }
        for _ in 0..self.swapchain_len {
            let buffer = self.create_buffer(self.info.width, self.info.height)?;
            self.swapchain.push(SwapSlot { buffer, age: 0 });
        }
        self.back = 0;
        self.previous.clear();
        self.current_damage = Region::from_box(self.info.damage_box());
        Ok(())
    }
}

impl RenderDevice for SoftwareBackend {
    fn allocate(&mut self, width: u32, height: u32) -> OutpaintResult<BufferId> {
        if self.failing_allocations > 0 {
            self.failing_allocations -= 1;
            return Err(OutpaintError::allocation(format!(
                "injected failure for {width}x{height} buffer"
            )));
        }
        let id = self.create_buffer(width, height)?;
        self.stats.allocations += 1;
        push_capped(&mut self.allocation_log, (id, width, height));
        Ok(id)
    }

    fn release(&mut self, id: BufferId) {
        if self.swapchain.iter().any(|s| s.buffer == id) {
            tracing::debug!(buffer = id.0, "ignoring release of a swapchain buffer");
            return;
        }
        if self.buffers.remove(&id).is_some() {
            self.stats.releases += 1;
        }
        if self.bound == Some(id) {
            self.bound = None;
        }
    }

    fn bind(&mut self, id: BufferId) {
        self.bound = Some(id);
        self.stats.binds += 1;
    }

    fn unbind(&mut self) {
        self.bound = None;
        self.stats.unbinds += 1;
    }

    fn clear(&mut self, scissor: PixelBox, color: Rgba8Premul) {
        let Some(buf) = self.bound.and_then(|id| self.buffers.get_mut(&id)) else {
            return;
        };
        let (w, h) = (u32::from(buf.width), u32::from(buf.height));
        clear_box(buf.pixmap.data_as_u8_slice_mut(), w, h, scissor, color.to_array());
        self.stats.clears += 1;
    }

    fn fill(&mut self, rect: PixelBox, color: Rgba8Premul) {
        let Some(buf) = self.bound.and_then(|id| self.buffers.get_mut(&id)) else {
            return;
        };
        let (w, h) = (u32::from(buf.width), u32::from(buf.height));
        fill_box(buf.pixmap.data_as_u8_slice_mut(), w, h, rect, color.to_array());
        self.stats.fills += 1;
    }

    fn copy_region(&mut self, src: BufferId, dst: BufferId, region: &Region) {
        if src == dst || region.is_empty() {
            return;
        }
        let Some(source) = self.buffers.remove(&src) else {
            return;
        };
        if let Some(target) = self.buffers.get_mut(&dst) {
            let src_size = (u32::from(source.width), u32::from(source.height));
            let dst_size = (u32::from(target.width), u32::from(target.height));
            let src_data = source.pixmap.data_as_u8_slice();
            let dst_data = target.pixmap.data_as_u8_slice_mut();
            for r in region {
                copy_box(src_data, src_size, dst_data, dst_size, *r);
            }
            self.stats.copies += 1;
        }
        self.buffers.insert(src, source);
    }

    fn buffer_size(&self, id: BufferId) -> Option<(u32, u32)> {
        self.buffers
            .get(&id)
            .map(|b| (u32::from(b.width), u32::from(b.height)))
    }

    fn pixels(&self, id: BufferId) -> Option<&[u8]> {
        self.buffers.get(&id).map(|b| b.pixmap.data_as_u8_slice())
    }

    fn pixels_mut(&mut self, id: BufferId) -> Option<&mut [u8]> {
        self.buffers
            .get_mut(&id)
            .map(|b| b.pixmap.data_as_u8_slice_mut())
    }
}

impl Presenter for SoftwareBackend {
    fn output_info(&self) -> OutputInfo {
        self.info
    }

    fn add_damage(&mut self, region: &Region) {
        let clipped = region.intersect_box(self.info.damage_box());
        self.current_damage |= &clipped;
    }

    fn schedule_frame(&mut self) {
        self.frame_requested = true;
        self.stats.schedule_calls += 1;
    }

    fn begin_frame(&mut self) -> OutpaintResult<FrameBegin> {
        if !self.ready {
            return Err(OutpaintError::OutputNotReady);
        }
        self.frame_requested = false;

        let slot = self.swapchain[self.back];
        let mut damage = self.current_damage.clone();
        let missing = slot.age.saturating_sub(1) as usize;
        if slot.age == 0 || missing > self.previous.len() {
            damage |= self.info.damage_box();
        } else {
            for prev in self.previous.iter().take(missing) {
                damage |= prev;
            }
        }

        Ok(FrameBegin {
            needs_swap: !self.current_damage.is_empty(),
            damage,
            buffer_age: slot.age,
            target: slot.buffer,
        })
    }

    fn render_cursors(&mut self, target: &FramebufferDesc, damage: &Region) {
        let Some((cursor, color)) = self.cursor else {
            return;
        };
        let Some(buf) = self.buffers.get_mut(&target.buffer) else {
            return;
        };
        let (w, h) = (u32::from(buf.width), u32::from(buf.height));
        for r in &damage.intersect_box(cursor) {
            let fb_box = target.framebuffer_box_from_damage_box(*r);
            fill_box(buf.pixmap.data_as_u8_slice_mut(), w, h, fb_box, color.to_array());
        }
        self.stats.cursor_renders += 1;
    }

    fn swap(&mut self, when: Instant, damage: &Region) -> OutpaintResult<()> {
        if !self.ready {
            return Err(OutpaintError::OutputNotReady);
        }
        let presented = self.swapchain[self.back];
        for (i, slot) in self.swapchain.iter_mut().enumerate() {
            if i == self.back {
                slot.age = 1;
            } else if slot.age > 0 {
                slot.age += 1;
            }
        }
        self.previous
            .push_front(std::mem::take(&mut self.current_damage));
        self.previous.truncate(self.swapchain_len);
        push_capped(
            &mut self.swaps,
            SwapRecord {
                buffer: presented.buffer,
                damage: damage.clone(),
                buffer_age: presented.age,
                when,
            },
        );
        self.stats.swaps += 1;
        self.back = (self.back + 1) % self.swapchain.len();
        Ok(())
    }
}

fn push_capped<T>(log: &mut VecDeque<T>, entry: T) {
    if log.len() == RECORD_LIMIT {
        log.pop_front();
    }
    log.push_back(entry);
}

#[cfg(test)]
#[path = "../../tests/unit/render/cpu.rs"]
mod tests;
