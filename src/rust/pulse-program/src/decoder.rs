// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Reconstruction of output timelines from pulse programs.
//!
//! A channel is either self-timed, in which case every wait is assumed to last
//! the calibrated `wait_delay`, or triggered by another device. A triggered
//! channel starts at its first trigger edge and resumes after each wait at the
//! next one. Trigger consumption is tracked per decode: channels sharing one
//! reference clock each replay the full trigger list from its start.

use pulse_log::{debug, diagnostic};

use crate::bitplane::SnapshotLayout;
use crate::calibration::Calibration;
use crate::instruction::{Instruction, Program, SnapshotInstruction, ToggleInstruction};
use crate::ticks::ticks_to_length;
use crate::trace::Trace;
use crate::{Error, Result};

/// Running state of a single decode.
struct DecodeContext<'a> {
    clock: f64,
    triggers: Option<&'a [f64]>,
    next_trigger: usize,
    previous_was_wait: bool,
}

impl<'a> DecodeContext<'a> {
    /// Start at time zero, or at the first trigger edge for a triggered channel.
    fn new(triggers: Option<&'a [f64]>) -> Result<Self> {
        let mut context = DecodeContext {
            clock: 0.0,
            triggers,
            next_trigger: 0,
            previous_was_wait: false,
        };
        if context.is_triggered() {
            context.clock = context.take_trigger()?;
        }
        Ok(context)
    }

    fn is_triggered(&self) -> bool {
        self.triggers.is_some()
    }

    fn take_trigger(&mut self) -> Result<f64> {
        let triggers = self.triggers.unwrap_or_default();
        let edge = triggers
            .get(self.next_trigger)
            .copied()
            .ok_or(Error::TriggerExhausted {
                requested: self.next_trigger + 1,
                available: triggers.len(),
            })?;
        self.next_trigger += 1;
        Ok(edge)
    }

    /// Register a wait marker. Returns false for the continuation marker of an
    /// indefinite wait, which neither advances time nor consumes a trigger.
    fn enter_wait(&mut self) -> bool {
        let starts_wait = !self.previous_was_wait;
        self.previous_was_wait = true;
        starts_wait
    }

    fn leave_wait(&mut self) {
        self.previous_was_wait = false;
    }

    fn finish(self) {
        if let Some(triggers) = self.triggers
            && self.next_trigger < triggers.len()
        {
            diagnostic!(
                "{} of {} trigger edges were not needed by the program",
                triggers.len() - self.next_trigger,
                triggers.len()
            );
        }
    }
}

/// Reconstruct the clock line driven by a toggle program.
///
/// `triggers` are the trigger edge times of the device that triggers this
/// channel, `None` for a self-timed channel.
pub fn decode_toggle(
    program: &Program<ToggleInstruction>,
    calibration: &Calibration,
    triggers: Option<&[f64]>,
) -> Result<Trace> {
    calibration.validate()?;
    let body = program.body();
    let half_tick = calibration.half_tick();

    let mut context = DecodeContext::new(triggers)?;
    if context.is_triggered() {
        context.clock += calibration.trigger_delay;
    }
    let transitions = body
        .iter()
        .filter(|i| !i.is_wait())
        .map(|i| 2 * i.reps as usize)
        .sum();
    let mut trace = Trace::with_capacity(transitions);

    for instruction in body {
        if instruction.is_wait() {
            if !context.enter_wait() {
                continue;
            }
            if context.is_triggered() {
                context.clock = context.take_trigger()? + calibration.trigger_delay;
            } else {
                context.clock += calibration.wait_delay;
            }
            continue;
        }
        context.leave_wait();
        let step = instruction.period as f64 * half_tick;
        for _ in 0..instruction.reps {
            for level in [1, 0] {
                trace.push(context.clock, level);
                context.clock += step;
            }
        }
    }
    debug!(
        "decoded {} instructions into {} transitions",
        body.len(),
        trace.len()
    );
    context.finish();
    Ok(trace)
}

/// Reconstruct the packed output words driven by a snapshot program.
///
/// The first word appears `trigger_delay` after the origin (the first trigger
/// edge, or zero for a self-timed channel). Each word lasts `reps` ticks; a
/// wait additionally lasts `trigger_delay` when triggered and `wait_delay`
/// otherwise.
pub fn decode_snapshot_words(
    program: &Program<SnapshotInstruction>,
    calibration: &Calibration,
    triggers: Option<&[f64]>,
) -> Result<Trace<u64>> {
    calibration.validate()?;
    let body = program.body();

    let mut context = DecodeContext::new(triggers)?;
    context.clock += calibration.trigger_delay;
    let wait_delay = if context.is_triggered() {
        calibration.trigger_delay
    } else {
        calibration.wait_delay
    };
    let mut words = Trace::with_capacity(body.len());

    for instruction in body {
        let delta = if instruction.is_wait() {
            if !context.enter_wait() {
                continue;
            }
            wait_delay
        } else {
            context.leave_wait();
            ticks_to_length(u64::from(instruction.reps), calibration.clock_resolution)
        };
        words.push(context.clock, instruction.bits);
        context.clock += delta;
    }
    debug!(
        "decoded {} instructions into {} output words",
        body.len(),
        words.len()
    );
    context.finish();
    Ok(words)
}

/// Reconstruct one level trace per channel of a snapshot program.
///
/// Every stored word, including those held during waits, must drive only the
/// channels of `layout`.
pub fn decode_snapshot(
    program: &Program<SnapshotInstruction>,
    calibration: &Calibration,
    layout: &SnapshotLayout,
    triggers: Option<&[f64]>,
) -> Result<Vec<Trace>> {
    layout.validate()?;
    if let Some((index, instruction)) = program
        .body()
        .iter()
        .enumerate()
        .find(|(_, i)| !layout.fits(i.bits))
    {
        return Err(Error::MalformedProgram(format!(
            "instruction {index} stores word {:#x}, which drives more than {} channels",
            instruction.bits, layout.channels
        )));
    }
    let words = decode_snapshot_words(program, calibration, triggers)?;
    Ok(layout.demultiplex(&words))
}
