// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::trace::Trace;
use crate::{Error, Result};

/// Sampled level waveform of an upstream clock, used to locate trigger instants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Trace", into = "Trace")]
pub struct ClockTrace {
    times: Vec<f64>,
    levels: Vec<u8>,
}

impl ClockTrace {
    pub fn new(times: Vec<f64>, levels: Vec<u8>) -> Result<Self> {
        if times.len() != levels.len() {
            return Err(Error::InvalidTrace(format!(
                "{} timestamps but {} levels",
                times.len(),
                levels.len()
            )));
        }
        if let Some(level) = levels.iter().find(|level| **level > 1) {
            return Err(Error::InvalidTrace(format!(
                "levels must be 0 or 1, found {level}"
            )));
        }
        if times.windows(2).any(|w| w[1] < w[0]) {
            return Err(Error::InvalidTrace(
                "timestamps must be in ascending order".to_string(),
            ));
        }
        Ok(ClockTrace { times, levels })
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn levels(&self) -> &[u8] {
        &self.levels
    }
}

impl TryFrom<Trace> for ClockTrace {
    type Error = Error;

    fn try_from(trace: Trace) -> Result<Self> {
        ClockTrace::new(trace.times, trace.values)
    }
}

impl From<ClockTrace> for Trace {
    fn from(trace: ClockTrace) -> Self {
        Trace {
            times: trace.times,
            values: trace.levels,
        }
    }
}

/// Timestamps of the rising edges of `trace`, in ascending order.
///
/// A trace that is already high at its first sample counts as having risen at
/// that sample, since the edge happened at or before the start of observation.
pub fn rising_edges(trace: &ClockTrace) -> Vec<f64> {
    let mut edges = Vec::new();
    if trace.levels.first() == Some(&1) {
        edges.push(trace.times[0]);
    }
    edges.extend(
        trace
            .levels
            .windows(2)
            .zip(trace.times.iter().skip(1))
            .filter(|(pair, _)| pair[..] == [0, 1])
            .map(|(_, time)| *time),
    );
    edges
}
