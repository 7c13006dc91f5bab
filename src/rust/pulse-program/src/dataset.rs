// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Persisted form of compiled programs.
//!
//! Each program is stored as a columnar table, one column per instruction
//! field, and a device stores one table per pseudoclock. Tables always include
//! the stop sequence, exactly as loaded onto the hardware.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::instruction::{Program, SnapshotInstruction, ToggleInstruction};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InstructionTable {
    Toggle { period: Vec<u32>, reps: Vec<u32> },
    Snapshot { reps: Vec<u32>, bits: Vec<u64> },
}

fn check_columns(name: &str, other: &str, a: usize, b: usize) -> Result<()> {
    if a != b {
        return Err(Error::MalformedProgram(format!(
            "column `{name}` has {a} rows but column `{other}` has {b}"
        )));
    }
    Ok(())
}

impl InstructionTable {
    pub fn len(&self) -> usize {
        match self {
            InstructionTable::Toggle { reps, .. } | InstructionTable::Snapshot { reps, .. } => {
                reps.len()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn shape(&self) -> &'static str {
        match self {
            InstructionTable::Toggle { .. } => "(period, reps)",
            InstructionTable::Snapshot { .. } => "(reps, bits)",
        }
    }

    pub fn to_toggle_program(&self) -> Result<Program<ToggleInstruction>> {
        let InstructionTable::Toggle { period, reps } = self else {
            return Err(Error::MalformedProgram(format!(
                "expected a (period, reps) table, found {}",
                self.shape()
            )));
        };
        check_columns("period", "reps", period.len(), reps.len())?;
        Program::new(
            period
                .iter()
                .zip(reps)
                .map(|(period, reps)| ToggleInstruction::new(*period, *reps))
                .collect(),
        )
    }

    pub fn to_snapshot_program(&self) -> Result<Program<SnapshotInstruction>> {
        let InstructionTable::Snapshot { reps, bits } = self else {
            return Err(Error::MalformedProgram(format!(
                "expected a (reps, bits) table, found {}",
                self.shape()
            )));
        };
        check_columns("reps", "bits", reps.len(), bits.len())?;
        Program::new(
            reps.iter()
                .zip(bits)
                .map(|(reps, bits)| SnapshotInstruction::new(*reps, *bits))
                .collect(),
        )
    }
}

impl From<&Program<ToggleInstruction>> for InstructionTable {
    fn from(program: &Program<ToggleInstruction>) -> Self {
        let (period, reps) = program
            .instructions()
            .iter()
            .map(|i| (i.period, i.reps))
            .unzip();
        InstructionTable::Toggle { period, reps }
    }
}

impl From<&Program<SnapshotInstruction>> for InstructionTable {
    fn from(program: &Program<SnapshotInstruction>) -> Self {
        let (reps, bits) = program
            .instructions()
            .iter()
            .map(|i| (i.reps, i.bits))
            .unzip();
        InstructionTable::Snapshot { reps, bits }
    }
}

/// All instruction tables compiled for one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramDataset {
    pub device: String,
    pub tables: IndexMap<String, InstructionTable>,
}

impl ProgramDataset {
    pub fn new(device: impl Into<String>) -> Self {
        ProgramDataset {
            device: device.into(),
            tables: IndexMap::new(),
        }
    }

    pub fn table(&self, name: &str) -> Result<&InstructionTable> {
        self.tables.get(name).ok_or_else(|| {
            Error::MalformedProgram(format!(
                "dataset of device '{}' has no table '{name}'",
                self.device
            ))
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn read(path: &Path) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
