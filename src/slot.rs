// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! Slot selection with hysteresis and a minimum dwell before stepping down.
//!
//! ```text
//!   signal outside [from - margin, to + margin]
//!        |
//!        v
//!   candidate = find(signal)
//!        |-- candidate higher ----------------> apply now
//!        |-- dwell >= min_down_ticks ---------> apply
//!        `-- otherwise -----------------------> deferred
//!
//!   signal inside [from, to] --> refresh the dwell clock
//! ```

use crate::curve::{FanCurveSpec, Slot};

pub const DEFAULT_MARGIN_C: f64 = 2.5;
pub const DEFAULT_MIN_DOWN_TICKS: u64 = 16;

/// Outcome of a [`SlotStateMachine::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// First slot picked since start (or since a reset).
    Selected,
    /// Moved to a higher slot.
    Raised,
    /// Moved to a lower slot after the dwell elapsed.
    Lowered,
    /// Stayed in the current slot.
    Held,
    /// A lower slot is wanted but the dwell has not elapsed yet.
    Deferred,
}

impl Transition {
    pub fn changed(self) -> bool {
        matches!(self, Self::Selected | Self::Raised | Self::Lowered)
    }
}

#[derive(Debug, Clone)]
pub struct SlotStateMachine {
    current: Option<Slot>,
    confirmed_at: u64,
    margin: f64,
    min_down_ticks: u64,
}

impl SlotStateMachine {
    pub fn new(margin: f64, min_down_ticks: u64) -> Self {
        Self {
            current: None,
            confirmed_at: 0,
            margin,
            min_down_ticks,
        }
    }

    pub fn current(&self) -> Option<Slot> {
        self.current
    }

    pub fn confirmed_at(&self) -> u64 {
        self.confirmed_at
    }

    /// Forget the selected slot so the next update starts over.
    pub fn reset(&mut self) {
        self.current = None;
        self.confirmed_at = 0;
    }

    /// Feed the weighted signal observed at tick `tick` and return the slot
    /// in effect afterwards.
    pub fn update(&mut self, curve: &FanCurveSpec, signal: f64, tick: u64) -> (Slot, Transition) {
        let Some(current) = self.current else {
            let slot = curve.find(signal);
            self.apply(slot, tick);
            return (slot, Transition::Selected);
        };

        if current.contains(signal, self.margin) {
            if current.contains(signal, 0.0) {
                self.confirmed_at = tick;
            }
            return (current, Transition::Held);
        }

        let candidate = curve.find(signal);
        if candidate.from > current.from {
            self.apply(candidate, tick);
            return (candidate, Transition::Raised);
        }

        if tick.saturating_sub(self.confirmed_at) >= self.min_down_ticks {
            self.apply(candidate, tick);
            let transition = if candidate.from < current.from {
                Transition::Lowered
            } else {
                Transition::Held
            };
            return (candidate, transition);
        }

        (current, Transition::Deferred)
    }

    fn apply(&mut self, slot: Slot, tick: u64) {
        self.current = Some(slot);
        self.confirmed_at = tick;
    }
}

impl Default for SlotStateMachine {
    fn default() -> Self {
        Self::new(DEFAULT_MARGIN_C, DEFAULT_MIN_DOWN_TICKS)
    }
}
