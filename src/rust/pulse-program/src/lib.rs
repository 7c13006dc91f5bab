// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Codec and timeline reconstruction for pseudoclock pulse programs.
//!
//! A pulse program is a run-length instruction stream executed by a
//! microcontroller that drives one or more digital clock lines. Two record
//! shapes exist:
//!
//! - **Toggle** instructions (`period`, `reps`) emit `reps` high/low cycles
//!   with a half period of `period` half ticks.
//! - **Snapshot** instructions (`reps`, `bits`) output a packed word and hold it
//!   for `reps` clock ticks.
//!
//! The [`encoder`] compiles timed level changes into a [`Program`], the
//! [`decoder`] replays a program, optionally aligned to trigger edges extracted
//! from a reference clock trace by [`edges`], back into per-channel traces.

use std::fmt::Display;

pub mod bitplane;
pub mod calibration;
pub mod config;
pub mod dataset;
pub mod decoder;
pub mod device;
pub mod edges;
pub mod encoder;
pub mod instruction;
pub mod ticks;
pub mod trace;


pub use bitplane::{ByteOrder, SnapshotLayout};
pub use calibration::{Calibration, Capabilities};
pub use config::{DeviceConfig, Variant};
pub use dataset::{InstructionTable, ProgramDataset};
pub use decoder::{decode_snapshot, decode_snapshot_words, decode_toggle};
pub use device::{ReplayReport, compile_device, replay_device};
pub use edges::{ClockTrace, rising_edges};
pub use encoder::{EventKind, PulseEvent, encode_snapshot, encode_toggle};
pub use instruction::{
    Instruction, Program, STOP_SEQUENCE_LEN, SnapshotInstruction, ToggleInstruction,
};
pub use trace::{Trace, TraceSink};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(
        "program needs {required} instructions including the stop sequence, but the device holds at most {max}"
    )]
    CapacityExceeded { required: usize, max: usize },

    #[error("malformed program: {0}")]
    MalformedProgram(String),

    #[error("wait requires trigger edge #{requested}, but only {available} trigger edges are available")]
    TriggerExhausted { requested: usize, available: usize },

    #[error("unsupported calibration: {0}")]
    UnsupportedCalibration(String),

    #[error("timeline cannot be encoded: {0}")]
    InvalidTimeline(String),

    #[error("invalid reference trace: {0}")]
    InvalidTrace(String),

    #[error("invalid snapshot layout: {0}")]
    InvalidLayout(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    pub fn new<T>(msg: T) -> Self
    where
        T: Display,
    {
        Error::Anyhow(anyhow::anyhow!(msg.to_string()))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
