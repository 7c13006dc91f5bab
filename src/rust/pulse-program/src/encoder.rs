// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Compilation of timed level changes into pulse programs.
//!
//! Event times of the first segment are measured from program start. A
//! [`EventKind::Wait`] ends a segment: the wait is resolved at run time, so the
//! first level event after it only defines the origin of the next segment and
//! its absolute time is not encoded.

use pulse_log::{debug, diagnostic};
use serde::{Deserialize, Serialize};

use crate::bitplane::SnapshotLayout;
use crate::calibration::Capabilities;
use crate::instruction::{Instruction, Program, SnapshotInstruction, ToggleInstruction};
use crate::ticks::{length_to_half_ticks, length_to_ticks};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Output level (toggle) or packed output word (snapshot) from this time on.
    Level(u64),
    /// Pause until triggered.
    Wait,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EventRecord", into = "EventRecord")]
pub struct PulseEvent {
    pub time: f64,
    pub kind: EventKind,
}

impl PulseEvent {
    pub fn level(time: f64, value: u64) -> Self {
        PulseEvent {
            time,
            kind: EventKind::Level(value),
        }
    }

    pub fn wait(time: f64) -> Self {
        PulseEvent {
            time,
            kind: EventKind::Wait,
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// File representation: `{"time": t, "level": v}` or `{"time": t, "wait": true}`.
#[derive(Serialize, Deserialize)]
struct EventRecord {
    time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    level: Option<u64>,
    #[serde(default, skip_serializing_if = "is_false")]
    wait: bool,
}

impl TryFrom<EventRecord> for PulseEvent {
    type Error = Error;

    fn try_from(record: EventRecord) -> Result<Self> {
        match (record.level, record.wait) {
            (Some(level), false) => Ok(PulseEvent::level(record.time, level)),
            (None, true) => Ok(PulseEvent::wait(record.time)),
            _ => Err(Error::InvalidTimeline(format!(
                "event at {} must carry either a level or `wait: true`",
                record.time
            ))),
        }
    }
}

impl From<PulseEvent> for EventRecord {
    fn from(event: PulseEvent) -> Self {
        match event.kind {
            EventKind::Level(level) => EventRecord {
                time: event.time,
                level: Some(level),
                wait: false,
            },
            EventKind::Wait => EventRecord {
                time: event.time,
                level: None,
                wait: true,
            },
        }
    }
}

fn check_ordering(events: &[PulseEvent]) -> Result<()> {
    if let Some(event) = events.iter().find(|e| !e.time.is_finite()) {
        return Err(Error::InvalidTimeline(format!(
            "event time {} is not finite",
            event.time
        )));
    }
    if let Some(pair) = events.windows(2).find(|w| w[1].time < w[0].time) {
        return Err(Error::InvalidTimeline(format!(
            "events must be sorted by time, but {} follows {}",
            pair[1].time, pair[0].time
        )));
    }
    Ok(())
}

fn half_period(high: i64, capabilities: &Capabilities, time: f64) -> Result<u32> {
    if high < i64::from(capabilities.min_period) {
        return Err(Error::InvalidTimeline(format!(
            "high phase ending at {time} lasts {high} half ticks, the device needs at least {}",
            capabilities.min_period
        )));
    }
    u32::try_from(high).map_err(|_| {
        Error::InvalidTimeline(format!(
            "high phase ending at {time} lasts {high} half ticks, which exceeds the period register"
        ))
    })
}

/// Append one clock cycle, extending the previous instruction if it has the same period.
fn push_cycle(body: &mut Vec<ToggleInstruction>, period: u32) {
    match body.last_mut() {
        Some(last) if !last.is_wait() && last.period == period && last.reps < u32::MAX => {
            last.reps += 1;
        }
        _ => body.push(ToggleInstruction::new(period, 1)),
    }
}

/// Compile a clock line timeline into a toggle program.
///
/// Levels must alternate starting high, and every cycle must spend as long low
/// as high (after quantization to half ticks). The first rising edge must sit
/// at program start. The low phase of the final cycle is not encoded in the
/// input and is taken to mirror its high phase.
pub fn encode_toggle(
    events: &[PulseEvent],
    capabilities: &Capabilities,
) -> Result<Program<ToggleInstruction>> {
    capabilities.validate()?;
    check_ordering(events)?;
    let resolution = capabilities.clock_resolution;

    let mut body: Vec<ToggleInstruction> = Vec::new();
    let mut origin = 0.0;
    let mut after_wait = false;
    let mut segment_start = true;
    let mut rise: Option<i64> = None;

    for (index, event) in events.iter().enumerate() {
        match event.kind {
            EventKind::Wait => {
                if rise.is_some() {
                    return Err(Error::InvalidTimeline(format!(
                        "wait at {} while the clock line is high",
                        event.time
                    )));
                }
                body.push(ToggleInstruction::wait());
                after_wait = true;
                segment_start = true;
            }
            EventKind::Level(1) => {
                if rise.is_some() {
                    return Err(Error::InvalidTimeline(format!(
                        "rising edge at {} while the clock line is already high",
                        event.time
                    )));
                }
                if segment_start && after_wait {
                    origin = event.time;
                }
                let position = length_to_half_ticks(event.time - origin, resolution);
                if segment_start && !after_wait && position != 0 {
                    return Err(Error::InvalidTimeline(format!(
                        "the first rising edge must be at program start, found it at {}",
                        event.time
                    )));
                }
                segment_start = false;
                rise = Some(position);
            }
            EventKind::Level(0) => {
                let Some(rise_position) = rise.take() else {
                    return Err(Error::InvalidTimeline(format!(
                        "falling edge at {} while the clock line is low",
                        event.time
                    )));
                };
                let fall = length_to_half_ticks(event.time - origin, resolution);
                let high = fall - rise_position;
                if let Some(next) = events.get(index + 1) {
                    let low = length_to_half_ticks(next.time - origin, resolution) - fall;
                    if low != high {
                        return Err(Error::InvalidTimeline(format!(
                            "cycle ending at {} is high for {high} but low for {low} half ticks",
                            next.time
                        )));
                    }
                }
                push_cycle(&mut body, half_period(high, capabilities, event.time)?);
            }
            EventKind::Level(level) => {
                return Err(Error::InvalidTimeline(format!(
                    "clock line level at {} must be 0 or 1, got {level}",
                    event.time
                )));
            }
        }
    }
    if rise.is_some() {
        return Err(Error::InvalidTimeline(
            "timeline ends while the clock line is high".to_string(),
        ));
    }

    capabilities.check_capacity(body.len())?;
    diagnostic!(
        "run-length encoded {} events into {} instructions",
        events.len(),
        body.len()
    );
    Ok(Program::from_body(body))
}

/// Compile a timeline of packed output words into a snapshot program.
///
/// Each level event holds its word until the next event of its segment; the
/// last word of the program is held for a single tick. A wait keeps the
/// currently held word on the outputs.
pub fn encode_snapshot(
    events: &[PulseEvent],
    layout: &SnapshotLayout,
    capabilities: &Capabilities,
) -> Result<Program<SnapshotInstruction>> {
    capabilities.validate()?;
    layout.validate()?;
    check_ordering(events)?;
    let resolution = capabilities.clock_resolution;

    let mut body = Vec::with_capacity(events.len());
    let mut held = 0;
    let mut origin: Option<f64> = None;

    for (index, event) in events.iter().enumerate() {
        match event.kind {
            EventKind::Wait => {
                body.push(SnapshotInstruction::wait(held));
                origin = None;
            }
            EventKind::Level(bits) => {
                if !layout.fits(bits) {
                    return Err(Error::InvalidTimeline(format!(
                        "word {bits:#x} at {} drives more than {} channels",
                        event.time, layout.channels
                    )));
                }
                let origin = *origin.get_or_insert(event.time);
                let reps = match events.get(index + 1) {
                    Some(next) => {
                        let ticks = length_to_ticks(next.time - origin, resolution)
                            - length_to_ticks(event.time - origin, resolution);
                        if ticks < 1 {
                            return Err(Error::InvalidTimeline(format!(
                                "events at {} and {} fall into the same clock tick",
                                event.time, next.time
                            )));
                        }
                        u32::try_from(ticks).map_err(|_| {
                            Error::InvalidTimeline(format!(
                                "word at {} is held for {ticks} ticks, which exceeds the repetition register",
                                event.time
                            ))
                        })?
                    }
                    None => 1,
                };
                body.push(SnapshotInstruction::new(reps, bits));
                held = bits;
            }
        }
    }

    capabilities.check_capacity(body.len())?;
    debug!(
        "compiled {} snapshot events into {} instructions",
        events.len(),
        body.len()
    );
    Ok(Program::from_body(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitplane::ByteOrder;

    fn caps() -> Capabilities {
        Capabilities::new(25e-9, 100)
    }

    fn clock(cycles: &[(f64, f64)]) -> Vec<PulseEvent> {
        // (rise time, half period) pairs
        cycles
            .iter()
            .flat_map(|(t, half)| [PulseEvent::level(*t, 1), PulseEvent::level(t + half, 0)])
            .collect()
    }

    #[test]
    fn test_worked_scenario() {
        let mut events = clock(&[(0.0, 50e-9), (100e-9, 50e-9)]);
        events.push(PulseEvent::wait(200e-9));
        events.extend(clock(&[(2700e-9, 50e-9)]));
        let program = encode_toggle(&events, &caps()).unwrap();
        assert_eq!(
            program.body(),
            &[
                ToggleInstruction::new(4, 2),
                ToggleInstruction::wait(),
                ToggleInstruction::new(4, 1),
            ]
        );
        assert_eq!(program.len(), 5);
    }

    #[test]
    fn test_changing_period_starts_new_instruction() {
        let events = clock(&[(0.0, 50e-9), (100e-9, 100e-9), (300e-9, 100e-9)]);
        let program = encode_toggle(&events, &caps()).unwrap();
        assert_eq!(
            program.body(),
            &[ToggleInstruction::new(4, 1), ToggleInstruction::new(8, 2)]
        );
    }

    #[test]
    fn test_indefinite_wait_is_two_markers() {
        let mut events = clock(&[(0.0, 50e-9)]);
        events.push(PulseEvent::wait(100e-9));
        events.push(PulseEvent::wait(100e-9));
        events.extend(clock(&[(5e-6, 50e-9)]));
        let program = encode_toggle(&events, &caps()).unwrap();
        assert_eq!(program.wait_count(), 2);
        assert_eq!(program.body().len(), 4);
    }

    #[test]
    fn test_asymmetric_cycle_is_rejected() {
        let events = vec![
            PulseEvent::level(0.0, 1),
            PulseEvent::level(50e-9, 0),
            PulseEvent::level(150e-9, 1),
            PulseEvent::level(200e-9, 0),
        ];
        assert!(matches!(
            encode_toggle(&events, &caps()),
            Err(Error::InvalidTimeline(_))
        ));
    }

    #[test]
    fn test_invalid_toggle_timelines() {
        let late_start = clock(&[(100e-9, 50e-9)]);
        assert!(encode_toggle(&late_start, &caps()).is_err());

        let ends_high = vec![PulseEvent::level(0.0, 1)];
        assert!(encode_toggle(&ends_high, &caps()).is_err());

        let wait_while_high = vec![PulseEvent::level(0.0, 1), PulseEvent::wait(50e-9)];
        assert!(encode_toggle(&wait_while_high, &caps()).is_err());

        let not_a_level = vec![PulseEvent::level(0.0, 2)];
        assert!(encode_toggle(&not_a_level, &caps()).is_err());

        let unsorted = vec![PulseEvent::level(1e-6, 1), PulseEvent::level(0.0, 0)];
        assert!(encode_toggle(&unsorted, &caps()).is_err());

        let too_short = clock(&[(0.0, 50e-9)]);
        assert!(encode_toggle(&too_short, &caps().with_min_period(5)).is_err());
    }

    #[test]
    fn test_capacity_is_checked_before_returning() {
        // Alternating periods cannot be merged, one instruction per cycle.
        let mut cycles = vec![];
        let mut t = 0.0;
        for i in 0..10 {
            let half = if i % 2 == 0 { 50e-9 } else { 100e-9 };
            cycles.push((t, half));
            t += 2.0 * half;
        }
        let events = clock(&cycles);
        let exact = Capabilities::new(25e-9, 12);
        assert_eq!(encode_toggle(&events, &exact).unwrap().len(), 12);

        let small = Capabilities::new(25e-9, 11);
        match encode_toggle(&events, &small) {
            Err(Error::CapacityExceeded { required, max }) => {
                assert_eq!(required, 12);
                assert_eq!(max, 11);
            }
            other => panic!("expected capacity error, got {other:?}"),
        }
    }

    #[test]
    fn test_encode_snapshot() {
        let layout = SnapshotLayout::new(8, 8, ByteOrder::Big).unwrap();
        let events = vec![
            PulseEvent::level(0.0, 0b0001),
            PulseEvent::level(100e-9, 0b0011),
            PulseEvent::wait(250e-9),
            PulseEvent::level(3e-6, 0b1000),
        ];
        let program = encode_snapshot(&events, &layout, &caps()).unwrap();
        assert_eq!(
            program.body(),
            &[
                SnapshotInstruction::new(4, 0b0001),
                SnapshotInstruction::new(6, 0b0011),
                SnapshotInstruction::wait(0b0011),
                SnapshotInstruction::new(1, 0b1000),
            ]
        );
    }

    #[test]
    fn test_invalid_snapshot_timelines() {
        let layout = SnapshotLayout::new(4, 8, ByteOrder::Big).unwrap();
        let same_tick = vec![PulseEvent::level(0.0, 1), PulseEvent::level(5e-9, 2)];
        assert!(encode_snapshot(&same_tick, &layout, &caps()).is_err());

        let too_wide = vec![PulseEvent::level(0.0, 0b1_0000)];
        assert!(encode_snapshot(&too_wide, &layout, &caps()).is_err());

        let full = vec![PulseEvent::level(0.0, 1); 1];
        assert!(encode_snapshot(&full, &layout, &Capabilities::new(25e-9, 2)).is_err());
    }

    #[test]
    fn test_event_file_format() {
        let events: Vec<PulseEvent> =
            serde_json::from_str(r#"[{"time": 0.0, "level": 1}, {"time": 2.0, "wait": true}]"#)
                .unwrap();
        assert_eq!(events, vec![PulseEvent::level(0.0, 1), PulseEvent::wait(2.0)]);
        assert_eq!(
            serde_json::to_string(&events[1]).unwrap(),
            r#"{"time":2.0,"wait":true}"#
        );
        assert!(serde_json::from_str::<PulseEvent>(r#"{"time": 0.0}"#).is_err());
        assert!(
            serde_json::from_str::<PulseEvent>(r#"{"time": 0.0, "level": 1, "wait": true}"#)
                .is_err()
        );
    }
}
