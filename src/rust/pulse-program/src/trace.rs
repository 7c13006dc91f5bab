// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Reconstructed output of one channel: `values[i]` holds from `times[i]` on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trace<V = u8> {
    pub times: Vec<f64>,
    pub values: Vec<V>,
}

impl<V> Trace<V> {
    pub fn new() -> Self {
        Trace {
            times: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Trace {
            times: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, time: f64, value: V) {
        self.times.push(time);
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, &V)> {
        self.times.iter().copied().zip(self.values.iter())
    }
}

/// Receiver of reconstructed channel traces.
pub trait TraceSink {
    fn add_trace(&mut self, channel: &str, trace: Trace);
}

impl<F> TraceSink for F
where
    F: FnMut(&str, Trace),
{
    fn add_trace(&mut self, channel: &str, trace: Trace) {
        self(channel, trace)
    }
}

impl TraceSink for IndexMap<String, Trace> {
    fn add_trace(&mut self, channel: &str, trace: Trace) {
        self.insert(channel.to_string(), trace);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_sink() {
        let mut seen = vec![];
        let mut sink = |channel: &str, trace: Trace| seen.push((channel.to_string(), trace.len()));
        let mut trace = Trace::new();
        trace.push(0.0, 1);
        trace.push(1e-9, 0);
        sink.add_trace("clock", trace);
        assert_eq!(seen, vec![("clock".to_string(), 2)]);
    }

    #[test]
    fn test_map_sink_keeps_channel_order() {
        let mut sink: IndexMap<String, Trace> = IndexMap::new();
        sink.add_trace("b", Trace::new());
        sink.add_trace("a", Trace::new());
        assert_eq!(sink.keys().collect::<Vec<_>>(), vec!["b", "a"]);
    }
}
