use super::*;

use std::{cell::RefCell, rc::Rc};

use crate::{
    foundation::{core::Rgba8Premul, error::OutpaintError},
    render::{
        cpu::{SoftwareBackend, SoftwareBackendOpts},
        device::BufferId,
    },
};

fn device() -> SoftwareBackend {
    SoftwareBackend::new(SoftwareBackendOpts {
        width: 8,
        height: 8,
        swapchain_len: 1,
        ..SoftwareBackendOpts::default()
    })
    .unwrap()
}

fn geom() -> ChainGeometry {
    ChainGeometry {
        width: 8,
        height: 8,
        scale: 1.0,
        geometry: PixelBox::new(0, 0, 8, 8),
        transform: OutputTransform::Normal,
    }
}

fn desc_of(buffer: BufferId) -> FramebufferDesc {
    FramebufferDesc {
        buffer,
        width: 8,
        height: 8,
        scale: 1.0,
        geometry: PixelBox::new(0, 0, 8, 8),
        transform: OutputTransform::Normal,
    }
}

type Log = Rc<RefCell<Vec<(usize, BufferId, BufferId)>>>;

fn recording(id: usize, log: &Log) -> Box<PostHook> {
    let log = Rc::clone(log);
    Box::new(move |_dev: &mut dyn RenderDevice, src: &FramebufferDesc, dst: &FramebufferDesc| {
        log.borrow_mut().push((id, src.buffer, dst.buffer));
    })
}

#[test]
fn stages_chain_buffers_and_last_writes_output() {
    let mut dev = device();
    let input = dev.allocate(8, 8).unwrap();
    let output = dev.allocate(8, 8).unwrap();
    let log: Log = Rc::default();

    let mut chain = PostChain::default();
    chain.add(&mut dev, recording(0, &log), geom());
    chain.add(&mut dev, recording(1, &log), geom());
    chain.add(&mut dev, recording(2, &log), geom());

    let ran = chain
        .run(&mut dev, &desc_of(input), &desc_of(output), geom())
        .unwrap();
    assert_eq!(ran, 3);

    let buffers: Vec<BufferId> = chain
        .stage_buffers()
        .into_iter()
        .map(|d| d.unwrap().buffer)
        .collect();
    let log = log.borrow();
    assert_eq!(log[0], (0, input, buffers[0]));
    assert_eq!(log[1], (1, buffers[0], buffers[1]));
    assert_eq!(log[2], (2, buffers[1], output));
    assert_eq!(chain.last_target().map(|d| d.buffer), Some(output));

    chain.release_all(&mut dev);
}

#[test]
fn single_stage_reads_input_and_writes_output() {
    let mut dev = device();
    let input = dev.allocate(8, 8).unwrap();
    let output = dev.allocate(8, 8).unwrap();
    let log: Log = Rc::default();

    let mut chain = PostChain::default();
    chain.add(&mut dev, recording(0, &log), geom());
    chain
        .run(&mut dev, &desc_of(input), &desc_of(output), geom())
        .unwrap();

    assert_eq!(log.borrow().as_slice(), &[(0, input, output)]);
    chain.release_all(&mut dev);
}

#[test]
fn removal_is_deferred_until_sweep() {
    let mut dev = device();
    let log: Log = Rc::default();
    let mut chain = PostChain::default();
    let h0 = chain.add(&mut dev, recording(0, &log), geom());
    let _h1 = chain.add(&mut dev, recording(1, &log), geom());
    let live_before = dev.live_buffers();

    assert!(chain.mark_removed(h0));
    assert!(!chain.mark_removed(h0));
    assert!(!chain.contains(h0));
    assert_eq!(chain.len(), 2);

    assert_eq!(chain.sweep(&mut dev), 1);
    assert_eq!(chain.len(), 1);
    assert_eq!(dev.live_buffers(), live_before - 1);
    assert!(!chain.mark_removed(h0));

    chain.release_all(&mut dev);
}

#[test]
fn handles_from_another_chain_are_rejected() {
    let mut dev = device();
    let log: Log = Rc::default();
    let mut a = PostChain::default();
    let mut b = PostChain::default();
    let ha = a.add(&mut dev, recording(0, &log), geom());
    let _hb = b.add(&mut dev, recording(1, &log), geom());

    assert!(!b.mark_removed(ha));
    assert_eq!(b.sweep(&mut dev), 0);

    a.release_all(&mut dev);
    b.release_all(&mut dev);
}

#[test]
fn run_reallocates_after_resize_before_any_stage() {
    let mut dev = device();
    let log: Log = Rc::default();
    let mut chain = PostChain::default();
    chain.add(&mut dev, recording(0, &log), geom());
    chain.add(&mut dev, recording(1, &log), geom());

    let bigger = ChainGeometry {
        width: 12,
        height: 6,
        geometry: PixelBox::new(0, 0, 12, 6),
        ..geom()
    };
    let input = dev.allocate(12, 6).unwrap();
    let output = dev.allocate(12, 6).unwrap();
    let mut input_desc = desc_of(input);
    input_desc.width = 12;
    input_desc.height = 6;
    let mut output_desc = desc_of(output);
    output_desc.width = 12;
    output_desc.height = 6;

    chain.run(&mut dev, &input_desc, &output_desc, bigger).unwrap();
    for d in chain.stage_buffers() {
        let d = d.unwrap();
        assert_eq!((d.width, d.height), (12, 6));
        assert_eq!(dev.buffer_size(d.buffer), Some((12, 6)));
    }
    chain.release_all(&mut dev);
}

#[test]
fn allocation_failure_runs_no_stage() {
    let mut dev = device();
    let log: Log = Rc::default();
    let mut chain = PostChain::default();
    chain.add(&mut dev, recording(0, &log), geom());
    chain.add(&mut dev, recording(1, &log), geom());
    let input = dev.allocate(8, 8).unwrap();
    let output = dev.allocate(8, 8).unwrap();

    dev.fail_allocations(1);
    let bigger = ChainGeometry {
        width: 9,
        ..geom()
    };
    let err = chain
        .run(&mut dev, &desc_of(input), &desc_of(output), bigger)
        .unwrap_err();
    assert!(matches!(err, OutpaintError::Allocation(_)));
    assert!(log.borrow().is_empty());

    chain.release_all(&mut dev);
}

#[test]
fn failed_add_allocation_is_retried_on_run() {
    let mut dev = device();
    let log: Log = Rc::default();
    let mut chain = PostChain::default();
    dev.fail_allocations(1);
    chain.add(&mut dev, recording(0, &log), geom());
    chain.add(&mut dev, recording(1, &log), geom());
    assert!(chain.stage_buffers()[0].is_none());

    let input = dev.allocate(8, 8).unwrap();
    let output = dev.allocate(8, 8).unwrap();
    chain
        .run(&mut dev, &desc_of(input), &desc_of(output), geom())
        .unwrap();
    assert!(chain.stage_buffers().iter().all(Option::is_some));
    assert_eq!(log.borrow().len(), 2);

    chain.release_all(&mut dev);
}

#[test]
fn invert_stage_inverts_colour_keeps_alpha() {
    let mut dev = device();
    let input = dev.allocate(8, 8).unwrap();
    let output = dev.allocate(8, 8).unwrap();
    dev.bind(input);
    dev.clear(PixelBox::new(0, 0, 8, 8), Rgba8Premul::from_straight_rgba(10, 200, 0, 255));
    dev.unbind();

    let mut stage = invert_stage();
    stage(&mut dev, &desc_of(input), &desc_of(output));
    assert_eq!(dev.pixel(output, 3, 3), Some([245, 55, 255, 255]));
    assert_eq!(dev.pixel(input, 3, 3), Some([10, 200, 0, 255]));
}

#[test]
fn blur_stage_keeps_uniform_frame_uniform() {
    let mut dev = device();
    let input = dev.allocate(8, 8).unwrap();
    let output = dev.allocate(8, 8).unwrap();
    dev.bind(input);
    dev.clear(PixelBox::new(0, 0, 8, 8), Rgba8Premul::from_straight_rgba(40, 80, 120, 255));
    dev.unbind();

    let mut stage = blur_stage(2, 1.5);
    stage(&mut dev, &desc_of(input), &desc_of(output));
    assert_eq!(dev.pixel(output, 0, 0), Some([40, 80, 120, 255]));
    assert_eq!(dev.pixel(output, 7, 4), Some([40, 80, 120, 255]));
}

#[test]
fn blur_stage_softens_an_edge() {
    let mut dev = device();
    let input = dev.allocate(8, 8).unwrap();
    let output = dev.allocate(8, 8).unwrap();
    dev.bind(input);
    dev.clear(PixelBox::new(0, 0, 4, 8), Rgba8Premul::from_straight_rgba(255, 255, 255, 255));
    dev.unbind();

    let mut stage = blur_stage(2, 1.0);
    stage(&mut dev, &desc_of(input), &desc_of(output));
    let left = dev.pixel(output, 3, 4).unwrap();
    let right = dev.pixel(output, 4, 4).unwrap();
    assert!(left[3] < 255 && left[3] > 0);
    assert!(right[3] > 0 && right[3] < 255);
}

#[test]
fn blur_stage_with_bad_sigma_copies_through() {
    let mut dev = device();
    let input = dev.allocate(8, 8).unwrap();
    let output = dev.allocate(8, 8).unwrap();
    dev.bind(input);
    dev.clear(PixelBox::new(0, 0, 8, 8), Rgba8Premul::from_straight_rgba(1, 2, 3, 255));
    dev.unbind();

    let mut stage = blur_stage(3, 0.0);
    stage(&mut dev, &desc_of(input), &desc_of(output));
    assert_eq!(dev.pixel(output, 5, 5), Some([1, 2, 3, 255]));
}
