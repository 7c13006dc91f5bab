// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Device level compile and replay.
//!
//! A device owns one instruction table per pseudoclock (toggle devices) or a
//! single table of packed output words (snapshot devices). The instruction
//! capacity applies to each table separately.

use indexmap::IndexMap;
use pulse_log::{info, warn};

use crate::config::{DeviceConfig, Variant};
use crate::dataset::{InstructionTable, ProgramDataset};
use crate::decoder::{decode_snapshot, decode_toggle};
use crate::edges::{ClockTrace, rising_edges};
use crate::encoder::{PulseEvent, encode_snapshot, encode_toggle};
use crate::trace::TraceSink;
use crate::{Error, Result};

fn table_names(config: &DeviceConfig) -> Vec<&str> {
    match &config.variant {
        Variant::Toggle { pseudoclocks } => pseudoclocks.iter().map(String::as_str).collect(),
        Variant::Snapshot { table, .. } => vec![table.as_str()],
    }
}

/// Compile the timelines of all tables of a device.
///
/// Tables without a timeline compile to an empty program. Either every table
/// compiles and fits into device memory, or no dataset is returned.
pub fn compile_device(
    config: &DeviceConfig,
    timelines: &IndexMap<String, Vec<PulseEvent>>,
) -> Result<ProgramDataset> {
    config.validate()?;
    let tables = table_names(config);
    if let Some(unknown) = timelines.keys().find(|name| !tables.contains(&name.as_str())) {
        return Err(Error::InvalidTimeline(format!(
            "device '{}' has no table named '{unknown}'",
            config.name
        )));
    }

    let mut dataset = ProgramDataset::new(&config.name);
    for name in tables {
        let events = timelines.get(name).map(Vec::as_slice).unwrap_or_default();
        let compiled = match &config.variant {
            Variant::Toggle { .. } => {
                encode_toggle(events, &config.capabilities).map(|p| InstructionTable::from(&p))
            }
            Variant::Snapshot { layout, .. } => {
                encode_snapshot(events, layout, &config.capabilities)
                    .map(|p| InstructionTable::from(&p))
            }
        };
        let table = compiled.inspect_err(|e| {
            warn!("compiling table '{}' of device '{}' failed: {}", name, config.name, e);
        })?;
        dataset.tables.insert(name.to_string(), table);
    }
    info!(
        "compiled {} tables for device '{}' ({} instructions)",
        dataset.tables.len(),
        config.name,
        dataset.tables.values().map(InstructionTable::len).sum::<usize>()
    );
    Ok(dataset)
}

/// Outcome of a device replay. A failing table does not prevent the others
/// from being replayed.
#[derive(Debug, Default)]
pub struct ReplayReport {
    /// Tables whose channels were handed to the sink.
    pub decoded: Vec<String>,
    pub failures: Vec<(String, Error)>,
}

impl ReplayReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Turn the first failure into an error.
    pub fn into_result(self) -> Result<Vec<String>> {
        match self.failures.into_iter().next() {
            Some((_, error)) => Err(error),
            None => Ok(self.decoded),
        }
    }
}

/// Reconstruct every channel of a device and hand the traces to `sink`.
///
/// With a `reference` trace, all tables are treated as triggered by the rising
/// edges of that trace; each table replays the full edge list on its own.
pub fn replay_device<S: TraceSink>(
    config: &DeviceConfig,
    dataset: &ProgramDataset,
    reference: Option<&ClockTrace>,
    sink: &mut S,
) -> Result<ReplayReport> {
    config.validate()?;
    let calibration = config.calibration()?;
    if dataset.device != config.name {
        warn!(
            "replaying a dataset of device '{}' with the configuration of device '{}'",
            dataset.device, config.name
        );
    }
    let triggers = reference.map(rising_edges);
    let triggers = triggers.as_deref();

    let mut report = ReplayReport::default();
    for name in table_names(config) {
        let replayed = match &config.variant {
            Variant::Toggle { .. } => dataset
                .table(name)
                .and_then(InstructionTable::to_toggle_program)
                .and_then(|program| decode_toggle(&program, &calibration, triggers))
                .map(|trace| sink.add_trace(name, trace)),
            Variant::Snapshot { layout, .. } => dataset
                .table(name)
                .and_then(InstructionTable::to_snapshot_program)
                .and_then(|program| decode_snapshot(&program, &calibration, layout, triggers))
                .map(|traces| {
                    for (channel, trace) in config.channel_names().iter().zip(traces) {
                        sink.add_trace(channel, trace);
                    }
                }),
        };
        match replayed {
            Ok(()) => report.decoded.push(name.to_string()),
            Err(error) => {
                warn!("replay of table '{}' failed: {}", name, error);
                report.failures.push((name.to_string(), error));
            }
        }
    }
    Ok(report)
}
