use crate::{
    damage::region::Region,
    effects::blur::BlurKernel,
    foundation::{
        core::{OutputTransform, PixelBox},
        error::OutpaintResult,
        handle::{HandleAllocator, RawHandle},
    },
    render::{
        composite::{invert, map_box},
        device::RenderDevice,
        framebuffer::{Framebuffer, FramebufferDesc},
    },
};

/// A post-processing stage: read `src`, write `dst`.
pub type PostHook = dyn FnMut(&mut dyn RenderDevice, &FramebufferDesc, &FramebufferDesc);

/// Registration token returned by `add_post`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PostHandle(RawHandle);

struct PostStage {
    handle: PostHandle,
    hook: Box<PostHook>,
    buffer: Framebuffer,
    to_remove: bool,
}

/// Output size and mapping every stage buffer is validated against.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChainGeometry {
    pub width: u32,
    pub height: u32,
    pub scale: f64,
    pub geometry: PixelBox,
    pub transform: OutputTransform,
}

/// Ordered buffer-to-buffer stages run after compositing.
///
/// Stage 0 reads the composited frame, stage `i` reads the buffer of stage `i - 1`, and the last
/// stage writes the presentable buffer. Removal only marks a stage; [`PostChain::sweep`] drops
/// marked stages outside of [`PostChain::run`].
#[derive(Default)]
pub struct PostChain {
    alloc: HandleAllocator,
    stages: Vec<PostStage>,
    last_target: Option<FramebufferDesc>,
}

impl PostChain {
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Append a stage. A failed buffer allocation is retried when the chain next runs.
    pub fn add(
        &mut self,
        device: &mut dyn RenderDevice,
        hook: Box<PostHook>,
        geom: ChainGeometry,
    ) -> PostHandle {
        let handle = PostHandle(self.alloc.alloc());
        let mut buffer = Framebuffer::new();
        if let Err(err) = buffer.allocate(device, geom.width, geom.height) {
            tracing::warn!(%err, "post stage buffer allocation failed");
        }
        buffer.set_geometry(geom.geometry, geom.scale, geom.transform);
        self.stages.push(PostStage {
            handle,
            hook,
            buffer,
            to_remove: false,
        });
        tracing::debug!(stages = self.stages.len(), "post stage added");
        handle
    }

    /// Mark a stage for removal. Returns `false` for stale, foreign or already marked handles.
    pub fn mark_removed(&mut self, handle: PostHandle) -> bool {
        if !self.alloc.is_live(handle.0) {
            return false;
        }
        match self
            .stages
            .iter_mut()
            .find(|s| s.handle == handle && !s.to_remove)
        {
            Some(stage) => {
                stage.to_remove = true;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, handle: PostHandle) -> bool {
        self.stages.iter().any(|s| s.handle == handle && !s.to_remove)
    }

    /// Drop marked stages and release their buffers. Returns the number removed.
    pub fn sweep(&mut self, device: &mut dyn RenderDevice) -> usize {
        let before = self.stages.len();
        let mut kept = Vec::with_capacity(before);
        for mut stage in std::mem::take(&mut self.stages) {
            if stage.to_remove {
                stage.buffer.release(device);
                self.alloc.free(stage.handle.0);
            } else {
                kept.push(stage);
            }
        }
        self.stages = kept;
        let removed = before - self.stages.len();
        if removed > 0 {
            tracing::debug!(removed, stages = self.stages.len(), "post stages swept");
        }
        if self.stages.is_empty() {
            self.last_target = None;
        }
        removed
    }

    /// Run every stage. `input` is the composited frame, `output` the presentable buffer.
    ///
    /// All stage buffers are validated against `geom` before the first stage runs; on allocation
    /// failure no stage runs.
    pub fn run(
        &mut self,
        device: &mut dyn RenderDevice,
        input: &FramebufferDesc,
        output: &FramebufferDesc,
        geom: ChainGeometry,
    ) -> OutpaintResult<usize> {
        for stage in &mut self.stages {
            stage.buffer.allocate(device, geom.width, geom.height)?;
            stage.buffer.set_geometry(geom.geometry, geom.scale, geom.transform);
        }

        let n = self.stages.len();
        let mut src = *input;
        for (i, stage) in self.stages.iter_mut().enumerate() {
            let dst = if i + 1 == n {
                *output
            } else {
                match stage.buffer.desc() {
                    Some(d) => d,
                    None => continue,
                }
            };
            (stage.hook)(device, &src, &dst);
            src = dst;
        }
        self.last_target = (n > 0).then_some(src);
        Ok(n)
    }

    /// Target written by the last stage in the most recent run.
    pub fn last_target(&self) -> Option<FramebufferDesc> {
        self.last_target
    }

    /// Current buffer of every stage, in chain order.
    pub fn stage_buffers(&self) -> Vec<Option<FramebufferDesc>> {
        self.stages
            .iter()
            .map(|s| if s.buffer.is_allocated() { s.buffer.desc() } else { None })
            .collect()
    }

    /// Release every stage buffer; the chain keeps its stages.
    pub fn release_all(&mut self, device: &mut dyn RenderDevice) {
        for stage in &mut self.stages {
            if stage.buffer.is_allocated() {
                stage.buffer.release(device);
            }
        }
    }
}

/// Copy `src` to `dst` unchanged.
pub fn passthrough_stage()
-> impl FnMut(&mut dyn RenderDevice, &FramebufferDesc, &FramebufferDesc) + 'static {
    |device: &mut dyn RenderDevice, src: &FramebufferDesc, dst: &FramebufferDesc| {
        copy_whole(device, src, dst);
    }
}

/// Gaussian blur of the whole frame. An invalid kernel copies the frame through.
pub fn blur_stage(
    radius: u32,
    sigma: f32,
) -> impl FnMut(&mut dyn RenderDevice, &FramebufferDesc, &FramebufferDesc) + 'static {
    let kernel = BlurKernel::new(radius, sigma)
        .inspect_err(|err| tracing::warn!(%err, "blur stage copies frames through"))
        .ok();
    move |device: &mut dyn RenderDevice, src: &FramebufferDesc, dst: &FramebufferDesc| {
        copy_whole(device, src, dst);
        let Some(kernel) = &kernel else {
            return;
        };
        let whole = Region::from_box(buffer_box(dst));
        if let Some(out) = device.pixels_mut(dst.buffer)
            && let Err(err) = kernel.apply(out, dst.width, dst.height, &whole)
        {
            tracing::warn!(%err, "blur stage failed");
        }
    }
}

/// Colour inversion of the whole frame (alpha preserved).
pub fn invert_stage()
-> impl FnMut(&mut dyn RenderDevice, &FramebufferDesc, &FramebufferDesc) + 'static {
    |device: &mut dyn RenderDevice, src: &FramebufferDesc, dst: &FramebufferDesc| {
        copy_whole(device, src, dst);
        let whole = buffer_box(dst);
        if let Some(out) = device.pixels_mut(dst.buffer) {
            map_box(out, dst.width, dst.height, whole, invert);
        }
    }
}

fn buffer_box(desc: &FramebufferDesc) -> PixelBox {
    PixelBox::new(
        0,
        0,
        i32::try_from(desc.width).unwrap_or(i32::MAX),
        i32::try_from(desc.height).unwrap_or(i32::MAX),
    )
}

fn copy_whole(device: &mut dyn RenderDevice, src: &FramebufferDesc, dst: &FramebufferDesc) {
    device.copy_region(src.buffer, dst.buffer, &Region::from_box(buffer_box(dst)));
}

#[cfg(test)]
#[path = "../../tests/unit/effects/post.rs"]
mod tests;
