use super::*;

use crate::{
    foundation::core::{OutputTransform, Rgba8Premul, WorkspaceId},
    render::{
        cpu::{SoftwareBackend, SoftwareBackendOpts},
        device::{BufferId, RenderDevice},
        framebuffer::FramebufferDesc,
    },
};

fn whole(w: u32, h: u32) -> Region {
    Region::from_box(PixelBox::new(0, 0, w as i32, h as i32))
}

fn px(data: &[u8], width: u32, x: u32, y: u32) -> [u8; 4] {
    let i = ((y * width + x) * 4) as usize;
    [data[i], data[i + 1], data[i + 2], data[i + 3]]
}

// left half opaque white, right half transparent
fn half_white(w: u32, h: u32) -> Vec<u8> {
    let mut data = vec![0u8; (w * h * 4) as usize];
    for y in 0..h {
        for x in 0..w / 2 {
            let i = ((y * w + x) * 4) as usize;
            data[i..i + 4].copy_from_slice(&[255, 255, 255, 255]);
        }
    }
    data
}

#[test]
fn weights_are_normalised_and_symmetric() {
    for (radius, sigma) in [(1, 0.5), (3, 2.0), (8, 3.3)] {
        let k = BlurKernel::new(radius, sigma).unwrap();
        assert_eq!(k.weights().len(), (2 * radius + 1) as usize);
        let sum: f32 = k.weights().iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        let w = k.weights();
        assert!(w.iter().zip(w.iter().rev()).all(|(a, b)| a == b));
    }
}

#[test]
fn rejects_bad_kernels_and_buffers() {
    assert!(BlurKernel::new(2, 0.0).is_err());
    assert!(BlurKernel::new(2, f32::NAN).is_err());
    assert!(BlurKernel::new(MAX_BLUR_RADIUS + 1, 1.0).is_err());

    let k = BlurKernel::new(1, 1.0).unwrap();
    let mut short = vec![0u8; 7];
    assert!(k.apply(&mut short, 1, 2, &whole(1, 2)).is_err());
}

#[test]
fn zero_radius_and_uniform_buffers_are_unchanged() {
    let (w, h) = (4u32, 3u32);
    let src = [10u8, 20, 30, 40].repeat((w * h) as usize);

    let mut data = src.clone();
    BlurKernel::new(0, 1.0)
        .unwrap()
        .apply(&mut data, w, h, &whole(w, h))
        .unwrap();
    assert_eq!(data, src);

    BlurKernel::new(3, 2.0)
        .unwrap()
        .apply(&mut data, w, h, &whole(w, h))
        .unwrap();
    assert_eq!(data, src);
}

#[test]
fn only_the_region_is_written() {
    let (w, h) = (8u32, 8u32);
    let mut data = half_white(w, h);
    let region = Region::from_box(PixelBox::new(2, 0, 4, 2));
    BlurKernel::new(2, 1.0)
        .unwrap()
        .apply(&mut data, w, h, &region)
        .unwrap();

    let inside = px(&data, w, 3, 1);
    assert!(inside[3] < 255 && inside[3] > 0);
    assert!(px(&data, w, 4, 1)[3] > 0);
    // same edge, outside the region
    assert_eq!(px(&data, w, 3, 5), [255, 255, 255, 255]);
    assert_eq!(px(&data, w, 4, 5), [0, 0, 0, 0]);
}

#[test]
fn split_region_matches_a_whole_buffer_blur() {
    let (w, h) = (8u32, 8u32);
    let kernel = BlurKernel::new(2, 1.2).unwrap();
    let mut full = half_white(w, h);
    kernel.apply(&mut full, w, h, &whole(w, h)).unwrap();

    // two touching boxes: the second must not sample the already blurred first
    let region = Region::from_boxes([PixelBox::new(0, 0, 8, 3), PixelBox::new(2, 3, 4, 3)]);
    let mut part = half_white(w, h);
    kernel.apply(&mut part, w, h, &region).unwrap();

    for r in &region {
        for y in r.y..r.y2() {
            for x in r.x..r.x2() {
                assert_eq!(
                    px(&part, w, x as u32, y as u32),
                    px(&full, w, x as u32, y as u32)
                );
            }
        }
    }
}

#[test]
fn single_pixel_energy_spreads_and_is_kept() {
    let (w, h) = (9u32, 9u32);
    let mut data = vec![0u8; (w * h * 4) as usize];
    let center = ((4 * w + 4) * 4) as usize;
    data[center..center + 4].copy_from_slice(&[255, 255, 255, 255]);

    BlurKernel::new(2, 1.2)
        .unwrap()
        .apply(&mut data, w, h, &whole(w, h))
        .unwrap();

    assert!(data.chunks_exact(4).filter(|p| p[3] != 0).count() > 1);
    let sum_a: u32 = data.chunks_exact(4).map(|p| u32::from(p[3])).sum();
    assert!((sum_a as i32 - 255).abs() <= 13);
    assert!(data.chunks_exact(4).all(|p| p[0] <= p[3]));
}

fn stream_target(dev: &mut SoftwareBackend) -> FramebufferDesc {
    let buffer = dev.allocate(8, 8).unwrap();
    FramebufferDesc {
        buffer,
        width: 8,
        height: 8,
        scale: 1.0,
        geometry: PixelBox::new(0, 0, 8, 8),
        transform: OutputTransform::Normal,
    }
}

fn paint(dev: &mut SoftwareBackend, buffer: BufferId, b: PixelBox, rgba: [u8; 4]) {
    dev.bind(buffer);
    dev.clear(b, Rgba8Premul::from_straight(rgba));
    dev.unbind();
}

#[test]
fn padding_grows_damage_and_restores_the_band() {
    let mut dev = SoftwareBackend::new(SoftwareBackendOpts {
        width: 8,
        height: 8,
        swapchain_len: 1,
        ..SoftwareBackendOpts::default()
    })
    .unwrap();
    let target = stream_target(&mut dev);
    paint(&mut dev, target.buffer, PixelBox::new(0, 0, 8, 8), [10, 20, 30, 255]);

    let mut padding = BlurPadding::new(2);
    let mut damage = Region::from_box(PixelBox::new(3, 3, 2, 2));
    padding.expand(&mut StreamSignal {
        workspace: WorkspaceId::new(0, 0),
        damage: &mut damage,
        target: &target,
        device: &mut dev,
    });
    assert_eq!(damage, Region::from_box(PixelBox::new(1, 1, 6, 6)));
    assert_eq!(
        padding.padded(),
        Region::from_box(PixelBox::new(1, 1, 6, 6)).subtract_box(PixelBox::new(3, 3, 2, 2))
    );

    // the stream redraws and blurs everything it was told to
    paint(&mut dev, target.buffer, PixelBox::new(0, 0, 8, 8), [200, 0, 0, 255]);
    padding.restore(&mut StreamSignal {
        workspace: WorkspaceId::new(0, 0),
        damage: &mut damage,
        target: &target,
        device: &mut dev,
    });

    assert_eq!(dev.pixel(target.buffer, 1, 1), Some([10, 20, 30, 255]));
    assert_eq!(dev.pixel(target.buffer, 6, 4), Some([10, 20, 30, 255]));
    assert_eq!(dev.pixel(target.buffer, 3, 3), Some([200, 0, 0, 255]));
    assert_eq!(dev.pixel(target.buffer, 0, 0), Some([200, 0, 0, 255]));
    assert!(padding.padded().is_empty());
}

#[test]
fn padding_is_clipped_to_the_target() {
    let mut dev = SoftwareBackend::new(SoftwareBackendOpts {
        width: 8,
        height: 8,
        swapchain_len: 1,
        ..SoftwareBackendOpts::default()
    })
    .unwrap();
    let target = stream_target(&mut dev);
    let mut padding = BlurPadding::new(3);
    let mut damage = Region::from_box(PixelBox::new(0, 0, 2, 2));
    padding.expand(&mut StreamSignal {
        workspace: WorkspaceId::new(0, 0),
        damage: &mut damage,
        target: &target,
        device: &mut dev,
    });
    assert_eq!(damage, Region::from_box(PixelBox::new(0, 0, 5, 5)));
}
