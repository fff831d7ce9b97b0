// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! The fan control step.
//!
//! [`ControllerState`] holds everything the loop mutates. The daemon owns a
//! single instance behind its lock and calls [`ControllerState::tick`] once
//! per second.

use crate::actuator::Actuator;
use crate::config::ControlConfig;
use crate::curve::{FanCurveSpec, MAX_SPEED, Slot};
use crate::history::HistoryBuffer;
use crate::slot::{SlotStateMachine, Transition};

/// Recorded speed before the first actuation and while paused. Below any
/// valid percentage, so the next evaluation always actuates.
pub const SPEED_UNSET: i32 = -1;

/// Snapshot answered to `status` requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Status {
    pub cpu_temp: f64,
    pub fan_speed: i32,
    pub paused: bool,
}

/// Result of an evaluation tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub signal: f64,
    pub slot: Slot,
    pub transition: Transition,
    pub target: u8,
    pub actuated: bool,
}

/// Whether moving from `last` to `target` warrants a new command.
///
/// Changes within the dead band are suppressed, except a move up to full
/// speed, which always goes through.
pub fn needs_actuation(last: i32, target: u8, dead_band: u8) -> bool {
    let target = i32::from(target);
    last < 0
        || (last - target).abs() > i32::from(dead_band)
        || (target == i32::from(MAX_SPEED) && last < target)
}

#[derive(Debug)]
pub struct ControllerState {
    curve: FanCurveSpec,
    history: HistoryBuffer,
    slots: SlotStateMachine,
    cpu_temp: f64,
    ticks: u64,
    fan_speed: i32,
    paused: bool,
    update_interval: u64,
    dead_band: u8,
}

impl ControllerState {
    pub fn new(curve: FanCurveSpec, control: &ControlConfig) -> Self {
        Self {
            curve,
            history: HistoryBuffer::new(control.history_len, control.recent_len),
            slots: SlotStateMachine::new(control.temp_margin, control.min_down_ticks),
            cpu_temp: 0.0,
            ticks: 0,
            fan_speed: SPEED_UNSET,
            paused: false,
            update_interval: control.update_interval.max(1),
            dead_band: control.speed_dead_band,
        }
    }

    /// Record a new sample and, every `update_interval` ticks while running,
    /// re-evaluate the slot and actuate.
    pub fn tick(&mut self, temp: f64, actuator: &dyn Actuator) -> Option<Evaluation> {
        self.cpu_temp = temp;
        self.history.push(temp);

        let evaluation = if self.ticks % self.update_interval == 0 && !self.paused {
            self.evaluate(actuator)
        } else {
            None
        };

        self.ticks += 1;
        evaluation
    }

    fn evaluate(&mut self, actuator: &dyn Actuator) -> Option<Evaluation> {
        let signal = self.history.weighted_average()?;
        let (slot, transition) = self.slots.update(&self.curve, signal, self.ticks);
        if transition.changed() {
            log::info!("- set slot: {:.0}", slot.from);
        }

        let target = self.curve.speed_at(&slot, signal);
        let actuated = needs_actuation(self.fan_speed, target, self.dead_band);
        if actuated {
            self.fan_speed = i32::from(target);
            log::info!("- set speed: {target}");
            if let Err(e) = actuator.set_duty(target) {
                log::error!("Failed to set fan speed: {e}");
            }
        }

        log::info!(
            "[{:.0}-{:.0}:{}] {signal:.2}°C - fan {} ({target})",
            slot.from,
            slot.to,
            slot.speed,
            self.fan_speed
        );
        log::debug!("{:?}", self.history.samples().collect::<Vec<_>>());

        Some(Evaluation {
            signal,
            slot,
            transition,
            target,
            actuated,
        })
    }

    /// Stop evaluating and hand the fan back to the firmware.
    pub fn pause(&mut self, actuator: &dyn Actuator) {
        self.paused = true;
        self.fan_speed = SPEED_UNSET;
        log::info!("pause");
        if let Err(e) = actuator.set_auto() {
            log::error!("Failed to set fan to auto: {e}");
        }
    }

    /// Resume evaluation; the next eligible tick picks a slot from scratch.
    /// No-op while already running.
    pub fn resume(&mut self) {
        if std::mem::replace(&mut self.paused, false) {
            self.slots.reset();
            log::info!("resume");
        }
    }

    pub fn status(&self) -> Status {
        Status {
            cpu_temp: self.cpu_temp,
            fan_speed: self.fan_speed,
            paused: self.paused,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn slot(&self) -> Option<Slot> {
        self.slots.current()
    }

    pub fn fan_speed(&self) -> i32 {
        self.fan_speed
    }
}
