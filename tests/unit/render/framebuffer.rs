use super::*;

use crate::render::cpu::{SoftwareBackend, SoftwareBackendOpts};

fn device() -> SoftwareBackend {
    SoftwareBackend::new(SoftwareBackendOpts {
        width: 16,
        height: 16,
        swapchain_len: 1,
        ..SoftwareBackendOpts::default()
    })
    .unwrap()
}

#[test]
fn allocate_same_size_is_noop() {
    let mut dev = device();
    let mut fb = Framebuffer::new();

    assert!(fb.allocate(&mut dev, 8, 4).unwrap());
    let first = fb.buffer().unwrap();
    assert!(!fb.allocate(&mut dev, 8, 4).unwrap());
    assert_eq!(fb.buffer(), Some(first));
    assert_eq!(dev.stats().allocations, 1);

    fb.release(&mut dev);
}

#[test]
fn resize_replaces_storage_and_releases_old() {
    let mut dev = device();
    let mut fb = Framebuffer::new();
    fb.allocate(&mut dev, 8, 4).unwrap();
    let old = fb.buffer().unwrap();

    assert!(fb.allocate(&mut dev, 4, 8).unwrap());
    assert!(!dev.is_live(old));
    assert_eq!(fb.size(), (4, 8));

    fb.release(&mut dev);
}

#[test]
fn failed_allocation_keeps_previous_storage() {
    let mut dev = device();
    let mut fb = Framebuffer::new();
    fb.allocate(&mut dev, 8, 4).unwrap();
    let old = fb.buffer().unwrap();

    dev.fail_allocations(1);
    assert!(fb.allocate(&mut dev, 10, 10).is_err());
    assert_eq!(fb.buffer(), Some(old));
    assert_eq!(fb.size(), (8, 4));
    assert!(dev.is_live(old));

    fb.release(&mut dev);
}

#[test]
fn release_frees_storage_and_allows_reallocation() {
    let mut dev = device();
    let mut fb = Framebuffer::new();
    fb.allocate(&mut dev, 8, 4).unwrap();
    let id = fb.buffer().unwrap();

    fb.release(&mut dev);
    assert!(fb.is_released());
    assert!(!dev.is_live(id));

    assert!(fb.allocate(&mut dev, 8, 4).unwrap());
    assert!(fb.is_allocated());
    fb.release(&mut dev);
}

#[test]
fn releasing_unallocated_buffer_is_noop() {
    let mut dev = device();
    let mut fb = Framebuffer::new();
    fb.release(&mut dev);
    assert!(!fb.is_released());
    assert_eq!(dev.stats().releases, 0);
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "released twice")]
fn double_release_asserts_in_debug() {
    let mut dev = device();
    let mut fb = Framebuffer::new();
    fb.allocate(&mut dev, 2, 2).unwrap();
    fb.release(&mut dev);
    fb.release(&mut dev);
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "after release")]
fn bind_after_release_asserts_in_debug() {
    let mut dev = device();
    let mut fb = Framebuffer::new();
    fb.allocate(&mut dev, 2, 2).unwrap();
    fb.release(&mut dev);
    let _ = fb.bind(&mut dev);
}

#[test]
fn guard_unbinds_on_every_exit_path() {
    fn draw_if(fb: &Framebuffer, dev: &mut SoftwareBackend, early: bool) -> bool {
        let Some(mut guard) = fb.bind(dev) else {
            return false;
        };
        if early {
            return true;
        }
        guard.clear(PixelBox::new(0, 0, 1, 1), Rgba8Premul::black());
        true
    }

    let mut dev = device();
    let mut fb = Framebuffer::new();
    fb.allocate(&mut dev, 4, 4).unwrap();

    assert!(draw_if(&fb, &mut dev, true));
    assert!(draw_if(&fb, &mut dev, false));
    assert_eq!(dev.stats().binds, 2);
    assert_eq!(dev.stats().unbinds, 2);

    fb.release(&mut dev);
}

#[test]
fn guard_clear_maps_through_transform() {
    let mut dev = device();
    let mut fb = Framebuffer::new();
    fb.allocate(&mut dev, 4, 2).unwrap();
    fb.set_geometry(PixelBox::new(0, 0, 2, 4), 1.0, OutputTransform::Rotate90);
    let desc = fb.desc().unwrap();
    assert_eq!(desc.damage_box(), PixelBox::new(0, 0, 2, 4));

    {
        let mut guard = fb.bind(&mut dev).unwrap();
        guard.clear(desc.damage_box(), Rgba8Premul::black());
    }

    let id = fb.buffer().unwrap();
    for (x, y) in [(0, 0), (3, 0), (0, 1), (3, 1)] {
        assert_eq!(dev.pixel(id, x, y), Some([0, 0, 0, 255]), "({x}, {y})");
    }
    fb.release(&mut dev);
}

#[test]
fn geometry_box_maps_to_damage_space() {
    let desc = FramebufferDesc {
        buffer: BufferId(1),
        width: 200,
        height: 100,
        scale: 2.0,
        geometry: PixelBox::new(100, 0, 100, 50),
        transform: OutputTransform::Normal,
    };
    assert_eq!(
        desc.damage_box_from_geometry_box(PixelBox::new(110, 5, 10, 10)),
        PixelBox::new(20, 10, 20, 20)
    );
    assert_eq!(
        desc.framebuffer_box_from_damage_box(PixelBox::new(1, 2, 3, 4)),
        PixelBox::new(1, 2, 3, 4)
    );
}

#[test]
fn guard_copy_from_copies_only_damage() {
    let mut dev = device();
    let mut src = Framebuffer::new();
    let mut dst = Framebuffer::new();
    src.allocate(&mut dev, 6, 6).unwrap();
    dst.allocate(&mut dev, 6, 6).unwrap();
    src.set_geometry(PixelBox::new(0, 0, 6, 6), 1.0, OutputTransform::Normal);
    dst.set_geometry(PixelBox::new(0, 0, 6, 6), 1.0, OutputTransform::Normal);

    let red = Rgba8Premul::from_straight_rgba(255, 0, 0, 255);
    {
        let mut guard = src.bind(&mut dev).unwrap();
        guard.clear(PixelBox::new(0, 0, 6, 6), red);
    }
    let src_id = src.buffer().unwrap();
    {
        let mut guard = dst.bind(&mut dev).unwrap();
        guard.copy_from(src_id, &Region::from_box(PixelBox::new(1, 1, 2, 2)));
    }

    let dst_id = dst.buffer().unwrap();
    assert_eq!(dev.pixel(dst_id, 1, 1), Some([255, 0, 0, 255]));
    assert_eq!(dev.pixel(dst_id, 2, 2), Some([255, 0, 0, 255]));
    assert_eq!(dev.pixel(dst_id, 3, 3), Some([0, 0, 0, 0]));

    src.release(&mut dev);
    dst.release(&mut dev);
}
