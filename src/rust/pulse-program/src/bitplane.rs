// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Bit-plane demultiplexing of packed snapshot words.
//!
//! A snapshot instruction stores the state of all outputs as one packed word.
//! Which bit of the word drives which output is a property of the firmware: the
//! word is reinterpreted as bytes in the configured [`ByteOrder`], the bytes are
//! unpacked most significant bit first, and the resulting bit sequence is
//! reversed so that position `k` belongs to channel `k`. With [`ByteOrder::Big`]
//! this puts channel `k` on bit `k` of the integer value.

use bitvec::prelude::*;
use serde::{Deserialize, Serialize};

use crate::trace::Trace;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    #[default]
    Big,
    Little,
}

/// Packing contract of a snapshot word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotLayout {
    /// Number of physical output channels.
    pub channels: usize,
    /// Width of the stored word; one of 8, 16, 32 or 64.
    pub word_bits: u32,
    #[serde(default)]
    pub byte_order: ByteOrder,
}

impl SnapshotLayout {
    pub fn new(channels: usize, word_bits: u32, byte_order: ByteOrder) -> Result<Self> {
        let layout = SnapshotLayout {
            channels,
            word_bits,
            byte_order,
        };
        layout.validate()?;
        Ok(layout)
    }

    pub fn validate(&self) -> Result<()> {
        if !matches!(self.word_bits, 8 | 16 | 32 | 64) {
            return Err(Error::InvalidLayout(format!(
                "word width must be 8, 16, 32 or 64 bits, got {}",
                self.word_bits
            )));
        }
        if self.channels == 0 || self.channels > self.word_bits as usize {
            return Err(Error::InvalidLayout(format!(
                "{} channels do not fit into a {} bit word",
                self.channels, self.word_bits
            )));
        }
        Ok(())
    }

    /// Whether `word` drives only existing channels.
    pub fn fits(&self, word: u64) -> bool {
        self.channels >= u64::BITS as usize || word >> self.channels == 0
    }

    fn word_bytes(&self, word: u64) -> Vec<u8> {
        let width = (self.word_bits / 8) as usize;
        match self.byte_order {
            ByteOrder::Big => word.to_be_bytes()[8 - width..].to_vec(),
            ByteOrder::Little => word.to_le_bytes()[..width].to_vec(),
        }
    }

    /// Unpack `word` into one bit per channel, channel 0 first.
    pub fn unpack(&self, word: u64) -> BitVec<u8, Msb0> {
        let mut bits = BitVec::<u8, Msb0>::from_vec(self.word_bytes(word));
        bits.reverse();
        bits.truncate(self.channels);
        bits
    }

    /// Split a trace of packed words into one level trace per channel.
    pub fn demultiplex(&self, words: &Trace<u64>) -> Vec<Trace> {
        let mut traces = vec![Trace::with_capacity(words.len()); self.channels];
        for (time, word) in words.iter() {
            let bits = self.unpack(*word);
            for (trace, bit) in traces.iter_mut().zip(bits.iter()) {
                trace.push(time, u8::from(*bit));
            }
        }
        traces
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_channel_high() {
        let layout = SnapshotLayout::new(16, 16, ByteOrder::Big).unwrap();
        let bits = layout.unpack(1 << 3);
        for (channel, bit) in bits.iter().enumerate() {
            assert_eq!(*bit, channel == 3, "channel {channel}");
        }
    }

    #[test]
    fn test_little_endian_word_swaps_bytes() {
        let layout = SnapshotLayout::new(16, 16, ByteOrder::Little).unwrap();
        let bits = layout.unpack(1 << 3);
        assert_eq!(bits.iter_ones().collect::<Vec<_>>(), vec![11]);
        let bits = layout.unpack(1 << 12);
        assert_eq!(bits.iter_ones().collect::<Vec<_>>(), vec![4]);
    }

    #[test]
    fn test_unused_high_bits_are_dropped() {
        let layout = SnapshotLayout::new(4, 8, ByteOrder::Big).unwrap();
        assert_eq!(layout.unpack(0b1111_0101).len(), 4);
        assert_eq!(
            layout.unpack(0b1111_0101).iter_ones().collect::<Vec<_>>(),
            vec![0, 2]
        );
        assert!(layout.fits(0b1010));
        assert!(!layout.fits(0b1_0000));
    }

    #[test]
    fn test_layout_validation() {
        assert!(SnapshotLayout::new(16, 12, ByteOrder::Big).is_err());
        assert!(SnapshotLayout::new(17, 16, ByteOrder::Big).is_err());
        assert!(SnapshotLayout::new(0, 16, ByteOrder::Big).is_err());
        assert!(SnapshotLayout::new(64, 64, ByteOrder::Little).unwrap().fits(u64::MAX));
    }

    #[test]
    fn test_demultiplex() {
        let layout = SnapshotLayout::new(4, 8, ByteOrder::Big).unwrap();
        let mut words = Trace::new();
        words.push(0.0, 0b0001);
        words.push(1e-6, 0b1000);
        words.push(2e-6, 0b1001);
        let traces = layout.demultiplex(&words);
        assert_eq!(traces.len(), 4);
        assert_eq!(traces[0].values, vec![1, 0, 1]);
        assert_eq!(traces[1].values, vec![0, 0, 0]);
        assert_eq!(traces[3].values, vec![0, 1, 1]);
        assert_eq!(traces[3].times, words.times);
    }
}
