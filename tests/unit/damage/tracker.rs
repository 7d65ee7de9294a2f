use super::*;

use std::time::Instant;

use crate::{
    foundation::{core::OutputTransform, error::OutpaintError},
    render::device::{FrameBegin, OutputInfo},
};

struct MockPresenter {
    added: Vec<Region>,
    schedules: u32,
    age: u32,
    damage: Region,
    ready: bool,
}

impl MockPresenter {
    fn new() -> Self {
        Self {
            added: Vec::new(),
            schedules: 0,
            age: 1,
            damage: Region::new(),
            ready: true,
        }
    }
}

impl Presenter for MockPresenter {
    fn output_info(&self) -> OutputInfo {
        OutputInfo {
            width: 100,
            height: 50,
            scale: 1.0,
            transform: OutputTransform::Normal,
        }
    }

    fn add_damage(&mut self, region: &Region) {
        self.added.push(region.clone());
        self.damage |= region;
    }

    fn schedule_frame(&mut self) {
        self.schedules += 1;
    }

    fn begin_frame(&mut self) -> OutpaintResult<FrameBegin> {
        if !self.ready {
            return Err(OutpaintError::OutputNotReady);
        }
        Ok(FrameBegin {
            needs_swap: !self.damage.is_empty(),
            damage: std::mem::take(&mut self.damage),
            buffer_age: self.age,
            target: BufferId(7),
        })
    }

    fn swap(&mut self, _when: Instant, _damage: &Region) -> OutpaintResult<()> {
        Ok(())
    }
}

fn whole() -> PixelBox {
    PixelBox::new(0, 0, 100, 50)
}

#[test]
fn adding_same_box_twice_is_idempotent() {
    let mut p = MockPresenter::new();
    let mut t = DamageTracker::new();
    let r = PixelBox::new(3, 4, 10, 10);

    t.add_box(&mut p, r);
    let once = t.scheduled_damage();
    t.add_box(&mut p, r);
    assert_eq!(t.scheduled_damage(), once);
    assert_eq!(once, Region::from_box(r));
}

#[test]
fn scheduled_damage_is_union_of_adds() {
    let mut p = MockPresenter::new();
    let mut t = DamageTracker::new();
    let a = PixelBox::new(0, 0, 10, 10);
    let b = PixelBox::new(5, 5, 10, 10);

    t.add_box(&mut p, a);
    t.add_box(&mut p, b);
    assert_eq!(t.scheduled_damage(), Region::from_boxes([a, b]));
    assert_eq!(t.phase(), TrackerPhase::Accumulating);
}

#[test]
fn frame_requests_are_deduplicated_until_frame_starts() {
    let mut p = MockPresenter::new();
    let mut t = DamageTracker::new();

    for i in 0..5 {
        t.add_box(&mut p, PixelBox::new(i, i, 2, 2));
    }
    assert_eq!(p.schedules, 1);
    assert_eq!(p.added.len(), 5);

    t.frame_started();
    t.add_box(&mut p, PixelBox::new(0, 0, 1, 1));
    assert_eq!(p.schedules, 2);
}

#[test]
fn empty_input_is_ignored() {
    let mut p = MockPresenter::new();
    let mut t = DamageTracker::new();

    t.add_box(&mut p, PixelBox::new(0, 0, 0, 10));
    t.add_region(&mut p, &Region::new());
    assert!(t.scheduled_damage().is_empty());
    assert_eq!(p.schedules, 0);
    assert_eq!(t.phase(), TrackerPhase::Idle);
}

#[test]
fn add_whole_uses_transformed_output_size() {
    let mut p = MockPresenter::new();
    let mut t = DamageTracker::new();
    t.add_whole(&mut p);
    assert_eq!(t.scheduled_damage(), Region::from_box(whole()));
}

#[test]
fn symmetric_difference_commits_whole_output() {
    let mut p = MockPresenter::new();
    let mut t = DamageTracker::new();
    t.add_box(&mut p, PixelBox::new(10, 10, 10, 10));

    let c = t
        .begin_frame(&mut p, CarryForward::SymmetricDifference, false)
        .unwrap();
    assert!(c.needs_swap);
    assert_eq!(c.damage, Region::from_box(whole()));
    assert_eq!(c.target, BufferId(7));
    assert_eq!(t.phase(), TrackerPhase::Committed);

    t.finish_frame(&c.damage, CarryForward::SymmetricDifference);
    assert!(t.scheduled_damage().is_empty());
    assert_eq!(t.phase(), TrackerPhase::Idle);
}

#[test]
fn history_mode_unions_missing_frames() {
    let mut p = MockPresenter::new();
    let mut t = DamageTracker::new();
    let carry = CarryForward::History { depth: 3 };

    let a = PixelBox::new(0, 0, 5, 5);
    t.add_box(&mut p, a);
    let c = t.begin_frame(&mut p, carry, false).unwrap();
    assert_eq!(c.damage, Region::from_box(a));
    t.finish_frame(&c.damage, carry);

    let b = PixelBox::new(50, 20, 5, 5);
    t.add_box(&mut p, b);
    p.age = 2;
    let c = t.begin_frame(&mut p, carry, false).unwrap();
    assert_eq!(c.damage, Region::from_boxes([a, b]));
    t.finish_frame(&Region::from_box(b), carry);
}

#[test]
fn history_mode_unknown_age_repaints_everything() {
    let mut p = MockPresenter::new();
    let mut t = DamageTracker::new();
    let carry = CarryForward::History { depth: 2 };

    for age in [0, 3] {
        p.age = age;
        t.add_box(&mut p, PixelBox::new(1, 1, 1, 1));
        let c = t.begin_frame(&mut p, carry, false).unwrap();
        assert_eq!(c.damage, Region::from_box(whole()), "age {age}");
        t.finish_frame(&c.damage, carry);
    }

    // not enough remembered frames yet
    let mut fresh = DamageTracker::new();
    p.age = 2;
    fresh.add_box(&mut p, PixelBox::new(1, 1, 1, 1));
    let c = fresh.begin_frame(&mut p, carry, false).unwrap();
    assert_eq!(c.damage, Region::from_box(whole()));
}

#[test]
fn force_full_unions_whole_output() {
    let mut p = MockPresenter::new();
    let mut t = DamageTracker::new();
    t.add_box(&mut p, PixelBox::new(1, 1, 1, 1));
    let c = t
        .begin_frame(&mut p, CarryForward::History { depth: 2 }, true)
        .unwrap();
    assert_eq!(c.damage, Region::from_box(whole()));
}

#[test]
fn presenter_failure_leaves_state_untouched() {
    let mut p = MockPresenter::new();
    let mut t = DamageTracker::new();
    let r = PixelBox::new(2, 2, 4, 4);
    t.add_box(&mut p, r);
    p.ready = false;

    let err = t
        .begin_frame(&mut p, CarryForward::SymmetricDifference, false)
        .unwrap_err();
    assert!(matches!(err, OutpaintError::OutputNotReady));
    assert_eq!(t.scheduled_damage(), Region::from_box(r));
    assert_eq!(t.phase(), TrackerPhase::Accumulating);
}

#[test]
fn skipped_frame_restores_pending() {
    let mut p = MockPresenter::new();
    let mut t = DamageTracker::new();
    let r = PixelBox::new(2, 2, 4, 4);
    t.add_box(&mut p, r);

    let _ = t
        .begin_frame(&mut p, CarryForward::SymmetricDifference, false)
        .unwrap();
    t.skip_frame(whole(), CarryForward::SymmetricDifference);
    assert_eq!(t.scheduled_damage(), Region::from_box(r));
    assert_eq!(t.phase(), TrackerPhase::Accumulating);
}

#[test]
fn damage_added_mid_frame_survives_finish() {
    let mut p = MockPresenter::new();
    let mut t = DamageTracker::new();
    let carry = CarryForward::History { depth: 2 };
    t.add_box(&mut p, PixelBox::new(0, 0, 4, 4));
    let c = t.begin_frame(&mut p, carry, false).unwrap();
    t.frame_started();

    let late = PixelBox::new(30, 30, 4, 4);
    t.add_box(&mut p, late);
    t.finish_frame(&c.damage, carry);

    assert_eq!(t.scheduled_damage(), Region::from_box(late));
    assert_eq!(t.phase(), TrackerPhase::Accumulating);
    assert!(t.frame_scheduled());
}

#[test]
fn carried_damage_is_not_remembered_again() {
    let mut p = MockPresenter::new();
    let mut t = DamageTracker::new();
    let carry = CarryForward::History { depth: 3 };
    let a = PixelBox::new(0, 0, 5, 5);

    t.add_box(&mut p, a);
    let c = t.begin_frame(&mut p, carry, false).unwrap();
    t.finish_frame(&c.damage, carry);

    // age 2 carries `a` into this frame once
    p.age = 2;
    let c = t.begin_frame(&mut p, carry, false).unwrap();
    assert_eq!(c.damage, Region::from_box(a));
    t.finish_frame(&c.damage, carry);

    // the buffer presented two frames ago already shows `a`; nothing changed since
    let c = t.begin_frame(&mut p, carry, false).unwrap();
    assert!(c.damage.is_empty());
}

#[test]
fn extra_swap_damage_is_remembered() {
    let mut p = MockPresenter::new();
    let mut t = DamageTracker::new();
    let carry = CarryForward::History { depth: 2 };
    let extra = Region::from_box(PixelBox::new(10, 10, 10, 10));

    let c = t.begin_frame(&mut p, carry, false).unwrap();
    assert!(c.damage.is_empty());
    t.finish_frame(&extra, carry);

    p.age = 2;
    let c = t.begin_frame(&mut p, carry, false).unwrap();
    assert_eq!(c.damage, extra);
}
