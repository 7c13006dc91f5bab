// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::instruction::STOP_SEQUENCE_LEN;
use crate::{Error, Result};

/// Timing constants of one device instance, supplied at decode time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    /// Seconds per clock tick.
    pub clock_resolution: f64,
    /// Seconds from an observed trigger edge to the first valid instruction time.
    pub trigger_delay: f64,
    /// Seconds assumed to elapse for a wait that is not resolved by a trigger.
    pub wait_delay: f64,
}

impl Calibration {
    pub fn new(clock_resolution: f64, trigger_delay: f64, wait_delay: f64) -> Result<Self> {
        let calibration = Calibration {
            clock_resolution,
            trigger_delay,
            wait_delay,
        };
        calibration.validate()?;
        Ok(calibration)
    }

    pub fn validate(&self) -> Result<()> {
        validate_clock_resolution(self.clock_resolution)?;
        for (name, value) in [
            ("trigger_delay", self.trigger_delay),
            ("wait_delay", self.wait_delay),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::UnsupportedCalibration(format!(
                    "`{name}` must be a finite, non-negative number of seconds, got {value}"
                )));
            }
        }
        Ok(())
    }

    pub fn half_tick(&self) -> f64 {
        crate::ticks::half_tick(self.clock_resolution)
    }
}

pub(crate) fn validate_clock_resolution(clock_resolution: f64) -> Result<()> {
    if !clock_resolution.is_finite() || clock_resolution <= 0.0 {
        return Err(Error::UnsupportedCalibration(format!(
            "`clock_resolution` must be a positive number of seconds, got {clock_resolution}"
        )));
    }
    Ok(())
}

fn default_min_period() -> u32 {
    1
}

/// What the encoder may emit for a device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Seconds per clock tick.
    pub clock_resolution: f64,
    /// Instruction memory size, stop sequence included.
    pub max_instructions: usize,
    /// Shortest half period in half ticks that the firmware can toggle.
    #[serde(default = "default_min_period")]
    pub min_period: u32,
}

impl Capabilities {
    pub fn new(clock_resolution: f64, max_instructions: usize) -> Self {
        Capabilities {
            clock_resolution,
            max_instructions,
            min_period: default_min_period(),
        }
    }

    pub fn with_min_period(mut self, min_period: u32) -> Self {
        self.min_period = min_period;
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_clock_resolution(self.clock_resolution)?;
        if self.max_instructions < STOP_SEQUENCE_LEN {
            return Err(Error::new(format!(
                "`max_instructions` must leave room for the {STOP_SEQUENCE_LEN} instruction stop sequence, got {}",
                self.max_instructions
            )));
        }
        if self.min_period == 0 {
            return Err(Error::new("`min_period` must be at least 1"));
        }
        Ok(())
    }

    /// Fail if a program body of `body_len` instructions does not fit into device memory.
    pub fn check_capacity(&self, body_len: usize) -> Result<()> {
        let required = body_len + STOP_SEQUENCE_LEN;
        if required > self.max_instructions {
            return Err(Error::CapacityExceeded {
                required,
                max: self.max_instructions,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calibration_validation() {
        assert!(Calibration::new(25e-9, 350e-9, 2.5e-6).is_ok());
        assert!(matches!(
            Calibration::new(0.0, 0.0, 0.0),
            Err(Error::UnsupportedCalibration(_))
        ));
        assert!(matches!(
            Calibration::new(25e-9, -1e-9, 0.0),
            Err(Error::UnsupportedCalibration(_))
        ));
        assert!(Calibration::new(25e-9, 0.0, f64::NAN).is_err());
    }

    #[test]
    fn test_capacity() {
        let caps = Capabilities::new(25e-9, 10);
        assert!(caps.check_capacity(8).is_ok());
        match caps.check_capacity(9) {
            Err(Error::CapacityExceeded { required, max }) => {
                assert_eq!(required, 11);
                assert_eq!(max, 10);
            }
            other => panic!("expected capacity error, got {other:?}"),
        }
    }

    #[test]
    fn test_capabilities_validation() {
        assert!(Capabilities::new(25e-9, 2).validate().is_ok());
        assert!(Capabilities::new(25e-9, 1).validate().is_err());
        assert!(Capabilities::new(25e-9, 100).with_min_period(0).validate().is_err());
    }
}
