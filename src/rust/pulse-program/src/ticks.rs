// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Conversion between seconds and device clock ticks.

/// Duration of one toggle half cycle per period unit.
pub fn half_tick(clock_resolution: f64) -> f64 {
    clock_resolution / 2.0
}

/// Round a duration in seconds to the nearest multiple of `unit`.
pub fn length_to_units(t: f64, unit: f64) -> i64 {
    (t / unit).round() as i64
}

pub fn length_to_ticks(t: f64, clock_resolution: f64) -> i64 {
    length_to_units(t, clock_resolution)
}

pub fn length_to_half_ticks(t: f64, clock_resolution: f64) -> i64 {
    length_to_units(t, half_tick(clock_resolution))
}

pub fn ticks_to_length(ticks: u64, clock_resolution: f64) -> f64 {
    ticks as f64 * clock_resolution
}
