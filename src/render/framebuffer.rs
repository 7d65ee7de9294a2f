use crate::{
    damage::region::Region,
    foundation::{
        core::{OutputTransform, PixelBox, Rgba8Premul},
        error::OutpaintResult,
    },
    render::device::{BufferId, RenderDevice},
};

/// Borrowed description of a render target, valid for a single call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FramebufferDesc {
    /// Device buffer drawn into.
    pub buffer: BufferId,
    /// Buffer width in pixels.
    pub width: u32,
    /// Buffer height in pixels.
    pub height: u32,
    /// Logical-to-pixel scale.
    pub scale: f64,
    /// Logical geometry the buffer shows (origin of the logical coordinate space).
    pub geometry: PixelBox,
    /// Orientation of the buffer relative to damage coordinates.
    pub transform: OutputTransform,
}

impl FramebufferDesc {
    /// Size of the target in damage coordinates.
    pub fn damage_size(&self) -> (i32, i32) {
        let w = i32::try_from(self.width).unwrap_or(i32::MAX);
        let h = i32::try_from(self.height).unwrap_or(i32::MAX);
        if self.transform.swaps_axes() {
            (h, w)
        } else {
            (w, h)
        }
    }

    /// The whole target in damage coordinates.
    pub fn damage_box(&self) -> PixelBox {
        let (w, h) = self.damage_size();
        PixelBox::new(0, 0, w, h)
    }

    /// Map a logical box into damage coordinates.
    pub fn damage_box_from_geometry_box(&self, b: PixelBox) -> PixelBox {
        let local = b.translate(-self.geometry.x, -self.geometry.y);
        if self.scale == 1.0 {
            return local;
        }
        local.scaled(self.scale)
    }

    /// Map a damage box into buffer pixel coordinates.
    pub fn framebuffer_box_from_damage_box(&self, b: PixelBox) -> PixelBox {
        let (w, h) = self.damage_size();
        self.transform.invert().transform_box(b, w, h)
    }

    /// Map a damage region into buffer pixel coordinates.
    pub fn framebuffer_region_from_damage(&self, damage: &Region) -> Region {
        let (w, h) = self.damage_size();
        damage.transform(self.transform.invert(), w, h)
    }

    /// Same target with a different logical origin.
    pub fn with_origin(mut self, x: i32, y: i32) -> Self {
        self.geometry.x = x;
        self.geometry.y = y;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BufferState {
    Unallocated,
    Live(BufferId),
    Released,
}

/// Owned, resizable device buffer with a logical-to-pixel mapping.
///
/// The owner must call [`Framebuffer::release`] before dropping it. Using a released buffer is a
/// programmer error: debug builds assert, release builds ignore the call.
#[derive(Debug)]
pub struct Framebuffer {
    width: u32,
    height: u32,
    scale: f64,
    geometry: PixelBox,
    transform: OutputTransform,
    state: BufferState,
}

impl Default for Framebuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Framebuffer {
    /// An unallocated framebuffer.
    pub fn new() -> Self {
        Self {
            width: 0,
            height: 0,
            scale: 1.0,
            geometry: PixelBox::default(),
            transform: OutputTransform::Normal,
            state: BufferState::Unallocated,
        }
    }

    /// Backing buffer, if allocated.
    pub fn buffer(&self) -> Option<BufferId> {
        match self.state {
            BufferState::Live(id) => Some(id),
            _ => None,
        }
    }

    /// `true` while backing storage exists.
    pub fn is_allocated(&self) -> bool {
        self.buffer().is_some()
    }

    /// `true` after [`Framebuffer::release`] until the next allocation.
    pub fn is_released(&self) -> bool {
        self.state == BufferState::Released
    }

    /// Pixel size of the current storage (0x0 when unallocated).
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Ensure backing storage of exactly `width x height`.
    ///
    /// Returns `Ok(false)` when the storage already had that size. On failure the previous
    /// storage and its contents are kept.
    pub fn allocate(
        &mut self,
        device: &mut dyn RenderDevice,
        width: u32,
        height: u32,
    ) -> OutpaintResult<bool> {
        if let BufferState::Live(_) = self.state
            && self.width == width
            && self.height == height
        {
            return Ok(false);
        }

        let id = device.allocate(width, height)?;
        if let BufferState::Live(old) = self.state {
            device.release(old);
        }
        self.state = BufferState::Live(id);
        self.width = width;
        self.height = height;
        Ok(true)
    }

    /// Set the logical mapping reported by [`Framebuffer::desc`].
    pub fn set_geometry(&mut self, geometry: PixelBox, scale: f64, transform: OutputTransform) {
        self.geometry = geometry;
        self.scale = scale;
        self.transform = transform;
    }

    /// Descriptor for handing the buffer to collaborators.
    pub fn desc(&self) -> Option<FramebufferDesc> {
        debug_assert!(
            !self.is_released(),
            "framebuffer used after release without reallocation"
        );
        let buffer = self.buffer()?;
        Some(FramebufferDesc {
            buffer,
            width: self.width,
            height: self.height,
            scale: self.scale,
            geometry: self.geometry,
            transform: self.transform,
        })
    }

    /// Bind the buffer for drawing; the returned guard unbinds when dropped.
    pub fn bind<'d>(&self, device: &'d mut dyn RenderDevice) -> Option<BindGuard<'d>> {
        let desc = self.desc()?;
        Some(BindGuard::new(device, desc))
    }

    /// Free the backing storage.
    pub fn release(&mut self, device: &mut dyn RenderDevice) {
        match self.state {
            BufferState::Live(id) => {
                device.release(id);
                self.state = BufferState::Released;
                self.width = 0;
                self.height = 0;
            }
            BufferState::Released => {
                debug_assert!(false, "framebuffer released twice");
            }
            BufferState::Unallocated => {}
        }
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        if let BufferState::Live(id) = self.state {
            tracing::warn!(buffer = id.0, "framebuffer dropped without release");
        }
    }
}

/// Scoped binding of a device buffer.
///
/// Boxes passed to the drawing helpers are in damage coordinates and are mapped through the
/// target's transform.
pub struct BindGuard<'d> {
    device: &'d mut dyn RenderDevice,
    desc: FramebufferDesc,
}

impl<'d> BindGuard<'d> {
    /// Bind `desc.buffer` on `device`.
    pub fn new(device: &'d mut dyn RenderDevice, desc: FramebufferDesc) -> Self {
        device.bind(desc.buffer);
        Self { device, desc }
    }

    /// The bound target.
    pub fn desc(&self) -> &FramebufferDesc {
        &self.desc
    }

    /// The device, for operations the guard does not wrap.
    pub fn device(&mut self) -> &mut dyn RenderDevice {
        &mut *self.device
    }

    /// Overwrite a damage box with `color`.
    pub fn clear(&mut self, damage_box: PixelBox, color: Rgba8Premul) {
        let fb_box = self.desc.framebuffer_box_from_damage_box(damage_box);
        self.device.clear(fb_box, color);
    }

    /// Composite `color` over a damage box.
    pub fn fill(&mut self, damage_box: PixelBox, color: Rgba8Premul) {
        let fb_box = self.desc.framebuffer_box_from_damage_box(damage_box);
        self.device.fill(fb_box, color);
    }

    /// Copy a damage region from `src` into the bound target. Both buffers share this
    /// target's orientation.
    pub fn copy_from(&mut self, src: BufferId, damage: &Region) {
        let region = self.desc.framebuffer_region_from_damage(damage);
        self.device.copy_region(src, self.desc.buffer, &region);
    }
}

impl Drop for BindGuard<'_> {
    fn drop(&mut self) {
        self.device.unbind();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/framebuffer.rs"]
mod tests;
