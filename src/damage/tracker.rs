use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::{
    damage::region::Region,
    foundation::{core::PixelBox, error::OutpaintResult},
    render::device::{BufferId, Presenter},
};

/// Largest history depth accepted by [`CarryForward::History`].
pub const MAX_HISTORY_DEPTH: u32 = 8;

/// How damage from earlier frames is carried into a back buffer that is several frames old.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CarryForward {
    /// `pending ^= whole`, then `committed = presenter_damage | pending`.
    #[default]
    SymmetricDifference,
    /// Union the swap damage of the last `age - 1` frames; unknown ages repaint everything.
    History { depth: u32 },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TrackerPhase {
    #[default]
    Idle,
    Accumulating,
    Committed,
}

/// Damage a frame must repaint, as decided by [`DamageTracker::begin_frame`].
#[derive(Clone, Debug, PartialEq)]
pub struct CommittedDamage {
    pub damage: Region,
    pub needs_swap: bool,
    pub buffer_age: u32,
    pub target: BufferId,
}

/// Per-output damage accumulation and buffer-age compensation.
#[derive(Debug, Default)]
pub struct DamageTracker {
    pending: Region,
    // damage that arrived while a frame was in flight
    late: Region,
    // new damage of the frame in flight, and everything it committed
    fresh: Region,
    committed: Region,
    phase: TrackerPhase,
    history: VecDeque<Region>,
    frame_scheduled: bool,
}

impl DamageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> TrackerPhase {
        self.phase
    }

    /// `true` between a frame request and the start of the next paint.
    pub fn frame_scheduled(&self) -> bool {
        self.frame_scheduled
    }

    pub fn add_box(&mut self, presenter: &mut dyn Presenter, b: PixelBox) {
        if b.is_empty() {
            return;
        }
        self.add_region(presenter, &Region::from_box(b));
    }

    pub fn add_region(&mut self, presenter: &mut dyn Presenter, region: &Region) {
        if region.is_empty() {
            return;
        }
        self.pending |= region;
        match self.phase {
            TrackerPhase::Idle => self.phase = TrackerPhase::Accumulating,
            TrackerPhase::Committed => self.late |= region,
            TrackerPhase::Accumulating => {}
        }
        presenter.add_damage(region);
        self.request_frame(presenter);
    }

    /// Damage the whole output (transformed size).
    pub fn add_whole(&mut self, presenter: &mut dyn Presenter) {
        let whole = presenter.output_info().damage_box();
        self.add_box(presenter, whole);
    }

    /// Damage accumulated since the last committed frame.
    pub fn scheduled_damage(&self) -> Region {
        self.pending.clone()
    }

    /// Ask the presenter for a frame unless one is already on its way.
    pub fn request_frame(&mut self, presenter: &mut dyn Presenter) {
        if self.frame_scheduled {
            return;
        }
        self.frame_scheduled = true;
        presenter.schedule_frame();
    }

    /// The requested frame event arrived; later damage needs a new request.
    pub fn frame_started(&mut self) {
        self.frame_scheduled = false;
    }

    /// Compute the damage the coming frame must repaint.
    ///
    /// On presenter failure nothing is modified.
    pub fn begin_frame(
        &mut self,
        presenter: &mut dyn Presenter,
        carry: CarryForward,
        force_full: bool,
    ) -> OutpaintResult<CommittedDamage> {
        let begin = presenter.begin_frame()?;
        let whole = presenter.output_info().damage_box();

        let mut damage = begin.damage;
        self.fresh = self.pending.clone();
        match carry {
            CarryForward::SymmetricDifference => {
                self.pending ^= whole;
                damage |= &self.pending;
            }
            CarryForward::History { depth } => {
                damage |= &self.pending;
                let missing = begin.buffer_age.saturating_sub(1) as usize;
                if begin.buffer_age == 0
                    || begin.buffer_age > depth
                    || missing > self.history.len()
                {
                    damage |= whole;
                } else {
                    for past in self.history.iter().take(missing) {
                        damage |= past;
                    }
                }
            }
        }
        if force_full {
            damage |= whole;
        }

        self.committed = damage.clone();
        self.phase = TrackerPhase::Committed;
        Ok(CommittedDamage {
            damage,
            needs_swap: begin.needs_swap,
            buffer_age: begin.buffer_age,
            target: begin.target,
        })
    }

    /// The committed frame was not drawn; keep the pending damage for the next one.
    pub fn skip_frame(&mut self, whole: PixelBox, carry: CarryForward) {
        if self.phase != TrackerPhase::Committed {
            return;
        }
        if carry == CarryForward::SymmetricDifference {
            // xor is its own inverse
            self.pending ^= whole;
            self.pending |= &self.late;
        }
        self.late.clear();
        self.fresh.clear();
        self.committed.clear();
        self.phase = if self.pending.is_empty() {
            TrackerPhase::Idle
        } else {
            TrackerPhase::Accumulating
        };
    }

    /// The frame was presented with `swap_damage` (damage coordinates).
    ///
    /// History remembers what changed in the frame: its new damage plus whatever was drawn
    /// beyond the committed damage. Carried-forward damage is not remembered again.
    pub fn finish_frame(&mut self, swap_damage: &Region, carry: CarryForward) {
        let mut changed = std::mem::take(&mut self.fresh);
        changed |= &swap_damage.subtract(&std::mem::take(&mut self.committed));
        match carry {
            CarryForward::History { depth } => {
                self.history.push_front(changed);
                self.history
                    .truncate(depth.clamp(1, MAX_HISTORY_DEPTH) as usize);
            }
            CarryForward::SymmetricDifference => self.history.clear(),
        }
        self.pending = std::mem::take(&mut self.late);
        self.phase = if self.pending.is_empty() {
            TrackerPhase::Idle
        } else {
            TrackerPhase::Accumulating
        };
    }

    /// Forget remembered frames (output mode changed or carry-forward switched).
    pub fn reset_history(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/damage/tracker.rs"]
mod tests;
