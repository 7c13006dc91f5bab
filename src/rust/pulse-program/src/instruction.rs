// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Number of trailing instructions that terminate every program.
pub const STOP_SEQUENCE_LEN: usize = 2;

/// A record of a pulse program.
pub trait Instruction: Copy + std::fmt::Debug {
    /// Whether the instruction pauses execution until a trigger arrives.
    fn is_wait(&self) -> bool;

    /// The record written for each slot of the stop sequence.
    fn stop() -> Self;
}

/// Run-length clock instruction: `reps` cycles of high then low, each half
/// lasting `period` half ticks. A `period` of zero marks a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToggleInstruction {
    pub period: u32,
    pub reps: u32,
}

impl ToggleInstruction {
    pub fn new(period: u32, reps: u32) -> Self {
        ToggleInstruction { period, reps }
    }

    pub fn wait() -> Self {
        ToggleInstruction { period: 0, reps: 0 }
    }
}

impl Instruction for ToggleInstruction {
    fn is_wait(&self) -> bool {
        self.period == 0
    }

    fn stop() -> Self {
        ToggleInstruction { period: 0, reps: 0 }
    }
}

/// Absolute output instruction: drive `bits` and hold for `reps` clock ticks.
/// A `reps` of zero marks a wait; `bits` stays on the outputs while waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotInstruction {
    pub reps: u32,
    pub bits: u64,
}

impl SnapshotInstruction {
    pub fn new(reps: u32, bits: u64) -> Self {
        SnapshotInstruction { reps, bits }
    }

    pub fn wait(bits: u64) -> Self {
        SnapshotInstruction { reps: 0, bits }
    }
}

impl Instruction for SnapshotInstruction {
    fn is_wait(&self) -> bool {
        self.reps == 0
    }

    fn stop() -> Self {
        SnapshotInstruction { reps: 0, bits: 0 }
    }
}

/// A complete instruction stream as loaded onto the device, stop sequence included.
///
/// Programs are immutable once built; decoders only ever borrow them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program<I> {
    instructions: Vec<I>,
}

impl<I: Instruction> Program<I> {
    /// Wrap a persisted instruction stream, which must end in a stop sequence.
    pub fn new(instructions: Vec<I>) -> Result<Self> {
        if instructions.len() < STOP_SEQUENCE_LEN {
            return Err(Error::MalformedProgram(format!(
                "expected at least {STOP_SEQUENCE_LEN} instructions for the stop sequence, found {}",
                instructions.len()
            )));
        }
        Ok(Program { instructions })
    }

    /// Terminate `body` with a stop sequence.
    pub fn from_body(mut body: Vec<I>) -> Self {
        body.extend(std::iter::repeat_n(I::stop(), STOP_SEQUENCE_LEN));
        Program { instructions: body }
    }

    /// All instructions, stop sequence included.
    pub fn instructions(&self) -> &[I] {
        &self.instructions
    }

    /// The instructions that carry timing, i.e. without the stop sequence.
    pub fn body(&self) -> &[I] {
        &self.instructions[..self.instructions.len() - STOP_SEQUENCE_LEN]
    }

    /// Number of instructions occupying device memory.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Whether the program carries no instruction besides the stop sequence.
    pub fn is_empty(&self) -> bool {
        self.body().is_empty()
    }

    pub fn wait_count(&self) -> usize {
        self.body().iter().filter(|i| i.is_wait()).count()
    }

    pub fn into_instructions(self) -> Vec<I> {
        self.instructions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_markers() {
        assert!(ToggleInstruction::wait().is_wait());
        assert!(ToggleInstruction::new(0, 7).is_wait());
        assert!(!ToggleInstruction::new(4, 0).is_wait());
        assert!(SnapshotInstruction::wait(0b101).is_wait());
        assert!(!SnapshotInstruction::new(1, 0).is_wait());
    }

    #[test]
    fn test_stop_sequence_is_stripped_regardless_of_values() {
        let program = Program::new(vec![
            ToggleInstruction::new(4, 2),
            ToggleInstruction::new(17, 3),
            ToggleInstruction::new(99, 1),
        ])
        .unwrap();
        assert_eq!(program.body(), &[ToggleInstruction::new(4, 2)]);
        assert_eq!(program.len(), 3);
    }

    #[test]
    fn test_short_program_is_malformed() {
        let err = Program::new(vec![SnapshotInstruction::new(3, 1)]).unwrap_err();
        assert!(matches!(err, Error::MalformedProgram(_)));
        assert!(Program::<SnapshotInstruction>::new(vec![]).is_err());
    }

    #[test]
    fn test_from_body_appends_stop_sequence() {
        let program = Program::from_body(vec![ToggleInstruction::new(4, 1)]);
        assert_eq!(program.len(), 1 + STOP_SEQUENCE_LEN);
        assert_eq!(
            &program.instructions()[1..],
            &[ToggleInstruction::stop(), ToggleInstruction::stop()]
        );
        assert!(Program::<ToggleInstruction>::from_body(vec![]).is_empty());
    }
}
