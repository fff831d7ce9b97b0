// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! Fan curve definitions and slot lookup.
//!
//! A curve is an ordered table of temperature breakpoints. Each breakpoint
//! opens a [`Slot`] that runs up to the next breakpoint and maps to a fan
//! duty percentage, either flat or ramping toward the next breakpoint's
//! speed.

use serde::{Deserialize, Serialize};

/// Upper bound of the last slot.
pub const OPEN_END_C: f64 = 1000.0;

/// Highest valid duty percentage.
pub const MAX_SPEED: u8 = 100;

/// A single configured breakpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Breakpoint {
    /// Temperature in degrees Celsius at which this slot starts
    pub temperature: f64,
    /// Fan duty percentage (0-100)
    pub speed: u8,
    /// Ramp toward the next breakpoint's speed instead of holding flat
    #[serde(default)]
    pub dynamic: bool,
}

/// A contiguous temperature range mapped to a fan speed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slot {
    pub from: f64,
    pub to: f64,
    pub speed: u8,
    /// Speed reached at `to`. Equal to `speed` for flat slots.
    pub ramp_target_speed: u8,
}

impl Slot {
    /// Whether `temp` lies within `[from - margin, to + margin]`.
    pub fn contains(&self, temp: f64, margin: f64) -> bool {
        temp >= self.from - margin && temp <= self.to + margin
    }

    pub fn is_flat(&self) -> bool {
        self.speed == self.ramp_target_speed
    }
}

/// The immutable slot table built from a breakpoint list.
#[derive(Debug, Clone)]
pub struct FanCurveSpec {
    slots: Vec<Slot>,
}

impl FanCurveSpec {
    /// Build the slot table. Fails if the breakpoints are not a valid curve.
    pub fn new(breakpoints: &[Breakpoint]) -> Result<Self, String> {
        validate(breakpoints)?;

        let slots = breakpoints
            .iter()
            .enumerate()
            .map(|(i, bp)| match breakpoints.get(i + 1) {
                Some(next) => Slot {
                    from: bp.temperature,
                    to: next.temperature,
                    speed: bp.speed,
                    ramp_target_speed: if bp.dynamic { next.speed } else { bp.speed },
                },
                None => Slot {
                    from: bp.temperature,
                    to: OPEN_END_C,
                    speed: bp.speed,
                    ramp_target_speed: MAX_SPEED,
                },
            })
            .collect();

        Ok(Self { slots })
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Return the highest slot whose lower bound is strictly below `temp`.
    ///
    /// Temperatures at or below the first breakpoint map to the lowest slot.
    pub fn find(&self, temp: f64) -> Slot {
        let lowest = self.slots[0];
        self.slots
            .iter()
            .take_while(|s| temp > s.from)
            .last()
            .copied()
            .unwrap_or(lowest)
    }

    /// Fan speed for `temp` within `slot`.
    ///
    /// Ramping slots interpolate linearly between `speed` and
    /// `ramp_target_speed`, truncating toward the base speed.
    pub fn speed_at(&self, slot: &Slot, temp: f64) -> u8 {
        if slot.is_flat() {
            return slot.speed;
        }
        let frac = ((temp - slot.from) / (slot.to - slot.from)).clamp(0.0, 1.0);
        let span = f64::from(slot.ramp_target_speed.saturating_sub(slot.speed));
        slot.speed + (span * frac) as u8
    }
}

/// The curve used when no configuration overrides it.
pub fn default_breakpoints() -> Vec<Breakpoint> {
    vec![
        Breakpoint { temperature: 0.0, speed: 0, dynamic: false },
        Breakpoint { temperature: 51.0, speed: 15, dynamic: false },
        Breakpoint { temperature: 56.0, speed: 20, dynamic: false },
        Breakpoint { temperature: 65.0, speed: 25, dynamic: false },
        Breakpoint { temperature: 75.0, speed: 35, dynamic: true },
        Breakpoint { temperature: 90.0, speed: 100, dynamic: false },
    ]
}

/// Validate a breakpoint list: non-empty, strictly increasing temperatures,
/// speeds within 0-100.
pub fn validate(breakpoints: &[Breakpoint]) -> Result<(), String> {
    if breakpoints.is_empty() {
        return Err("Curve must have at least 1 breakpoint".to_string());
    }
    for (i, bp) in breakpoints.iter().enumerate() {
        if !bp.temperature.is_finite() || bp.temperature >= OPEN_END_C {
            return Err(format!("Breakpoint {i} has an invalid temperature"));
        }
        if bp.speed > MAX_SPEED {
            return Err(format!("Breakpoint {i} speed {} exceeds {MAX_SPEED}", bp.speed));
        }
        if i > 0 && bp.temperature <= breakpoints[i - 1].temperature {
            return Err(format!(
                "Breakpoints must have strictly increasing temperatures (breakpoint {i})"
            ));
        }
        if bp.dynamic {
            let next = breakpoints.get(i + 1).map_or(MAX_SPEED, |n| n.speed);
            if next < bp.speed {
                return Err(format!("Breakpoint {i} ramps down to a lower speed"));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_curve() -> FanCurveSpec {
        FanCurveSpec::new(&default_breakpoints()).unwrap()
    }

    #[test]
    fn test_slots_are_contiguous() {
        let curve = default_curve();
        let slots = curve.slots();
        assert_eq!(slots.len(), 6);
        for pair in slots.windows(2) {
            assert_eq!(pair[0].to, pair[1].from);
        }
        assert_eq!(slots[5].to, OPEN_END_C);
        assert!(slots.iter().all(|s| s.speed <= s.ramp_target_speed));
    }

    #[test]
    fn test_dynamic_slot_ramps_to_next_speed() {
        let curve = default_curve();
        let ramp = curve.slots()[4];
        assert_eq!(ramp.from, 75.0);
        assert_eq!(ramp.to, 90.0);
        assert_eq!(ramp.speed, 35);
        assert_eq!(ramp.ramp_target_speed, 100);
        assert!(curve.slots()[3].is_flat());
    }

    #[test]
    fn test_find_middle_slot() {
        let slot = default_curve().find(60.0);
        assert_eq!(slot.from, 56.0);
        assert_eq!(slot.to, 65.0);
        assert_eq!(slot.speed, 20);
    }

    #[test]
    fn test_find_top_slot() {
        let slot = default_curve().find(95.0);
        assert_eq!(slot.from, 90.0);
        assert_eq!(slot.to, OPEN_END_C);
        assert_eq!(slot.speed, 100);
    }

    #[test]
    fn test_find_on_breakpoint_uses_lower_slot() {
        assert_eq!(default_curve().find(56.0).from, 51.0);
    }

    #[test]
    fn test_find_at_zero_returns_lowest_slot() {
        let curve = default_curve();
        assert_eq!(curve.find(0.0).from, 0.0);
        assert_eq!(curve.find(-5.0).from, 0.0);
    }

    #[test]
    fn test_speed_at_ramp_midpoint() {
        let curve = default_curve();
        let slot = Slot { from: 75.0, to: 90.0, speed: 35, ramp_target_speed: 100 };
        assert_eq!(curve.speed_at(&slot, 82.5), 67);
    }

    #[test]
    fn test_speed_at_ramp_is_clamped_to_slot() {
        let curve = default_curve();
        let slot = curve.slots()[4];
        assert_eq!(curve.speed_at(&slot, 73.0), 35);
        assert_eq!(curve.speed_at(&slot, 91.0), 100);
    }

    #[test]
    fn test_speed_at_flat_slot() {
        let curve = default_curve();
        let slot = curve.find(60.0);
        assert_eq!(curve.speed_at(&slot, 64.0), 20);
    }

    #[test]
    fn test_speed_at_descending_slot_holds_base_speed() {
        let curve = default_curve();
        let slot = Slot { from: 50.0, to: 60.0, speed: 40, ramp_target_speed: 30 };
        assert!(!slot.is_flat());
        assert_eq!(curve.speed_at(&slot, 55.0), 40);
    }

    #[test]
    fn test_validation_rejects_unsorted() {
        let bps = vec![
            Breakpoint { temperature: 0.0, speed: 0, dynamic: false },
            Breakpoint { temperature: 50.0, speed: 20, dynamic: false },
            Breakpoint { temperature: 50.0, speed: 30, dynamic: false },
        ];
        assert!(FanCurveSpec::new(&bps).is_err());
    }

    #[test]
    fn test_validation_rejects_speed_over_100() {
        let bps = vec![Breakpoint { temperature: 0.0, speed: 101, dynamic: false }];
        assert!(validate(&bps).is_err());
    }

    #[test]
    fn test_validation_rejects_empty() {
        assert!(FanCurveSpec::new(&[]).is_err());
    }
}
