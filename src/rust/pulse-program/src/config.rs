// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Device configuration.
//!
//! A device is described by a JSON document:
//!
//! ```json
//! {
//!   "name": "pseudoclock_board",
//!   "capabilities": {"clock_resolution": 25e-9, "max_instructions": 30000},
//!   "calibration": {"trigger_delay": 350e-9, "wait_delay": 2.5e-6},
//!   "variant": {"kind": "toggle", "pseudoclocks": ["clock0", "clock1"]}
//! }
//! ```
//!
//! Calibration constants may be left out of the document for devices that are
//! only ever compiled for. They are resolved when a replay needs them.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::bitplane::SnapshotLayout;
use crate::calibration::{Calibration, Capabilities};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    #[serde(default)]
    pub trigger_delay: Option<f64>,
    #[serde(default)]
    pub wait_delay: Option<f64>,
}

fn default_snapshot_table() -> String {
    "pulse_program".to_string()
}

/// Instruction shape of a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Variant {
    /// Independent clock lines, one toggle table per pseudoclock.
    Toggle { pseudoclocks: Vec<String> },
    /// A bank of digital outputs driven by one table of packed words.
    Snapshot {
        #[serde(default = "default_snapshot_table")]
        table: String,
        layout: SnapshotLayout,
        #[serde(default)]
        channel_names: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub name: String,
    pub capabilities: Capabilities,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    pub variant: Variant,
}

impl DeviceConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: DeviceConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.capabilities.validate()?;
        for (field, value) in [
            ("trigger_delay", self.calibration.trigger_delay),
            ("wait_delay", self.calibration.wait_delay),
        ] {
            if let Some(value) = value
                && (!value.is_finite() || value < 0.0)
            {
                return Err(Error::UnsupportedCalibration(format!(
                    "device '{}': `{field}` must be a finite, non-negative number of seconds, got {value}",
                    self.name
                )));
            }
        }
        match &self.variant {
            Variant::Toggle { pseudoclocks } => {
                if pseudoclocks.is_empty() {
                    return Err(Error::new(format!(
                        "device '{}' declares no pseudoclocks",
                        self.name
                    )));
                }
                check_names(&self.name, pseudoclocks)?;
            }
            Variant::Snapshot {
                table,
                layout,
                channel_names,
            } => {
                if table.is_empty() {
                    return Err(Error::new(format!(
                        "device '{}' has an empty table name",
                        self.name
                    )));
                }
                layout.validate()?;
                if !channel_names.is_empty() && channel_names.len() != layout.channels {
                    return Err(Error::InvalidLayout(format!(
                        "device '{}' names {} channels but the layout has {}",
                        self.name,
                        channel_names.len(),
                        layout.channels
                    )));
                }
                check_names(&self.name, channel_names)?;
            }
        }
        Ok(())
    }

    /// Resolve the calibration constants needed for a replay.
    pub fn calibration(&self) -> Result<Calibration> {
        let missing = |field: &str| {
            Error::UnsupportedCalibration(format!(
                "device '{}' does not define `{field}`",
                self.name
            ))
        };
        Calibration::new(
            self.capabilities.clock_resolution,
            self.calibration
                .trigger_delay
                .ok_or_else(|| missing("trigger_delay"))?,
            self.calibration
                .wait_delay
                .ok_or_else(|| missing("wait_delay"))?,
        )
    }

    /// Identifiers under which the device's channels are reported.
    pub fn channel_names(&self) -> Vec<String> {
        match &self.variant {
            Variant::Toggle { pseudoclocks } => pseudoclocks.clone(),
            Variant::Snapshot {
                layout,
                channel_names,
                ..
            } => {
                if channel_names.is_empty() {
                    (0..layout.channels).map(|k| format!("channel{k}")).collect()
                } else {
                    channel_names.clone()
                }
            }
        }
    }
}

fn check_names(device: &str, names: &[String]) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        if name.is_empty() {
            return Err(Error::new(format!(
                "device '{device}' has an empty channel name"
            )));
        }
        if !seen.insert(name.as_str()) {
            return Err(Error::new(format!(
                "device '{device}' uses the channel name '{name}' twice"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitplane::ByteOrder;

    const TOGGLE_DEVICE: &str = r#"{
        "name": "board",
        "capabilities": {"clock_resolution": 25e-9, "max_instructions": 30000},
        "calibration": {"trigger_delay": 350e-9, "wait_delay": 2.5e-6},
        "variant": {"kind": "toggle", "pseudoclocks": ["clock0", "clock1"]}
    }"#;

    #[test]
    fn test_toggle_device() {
        let config = DeviceConfig::from_json(TOGGLE_DEVICE).unwrap();
        assert_eq!(config.capabilities.min_period, 1);
        assert_eq!(config.channel_names(), vec!["clock0", "clock1"]);
        let calibration = config.calibration().unwrap();
        assert!((calibration.trigger_delay - 350e-9).abs() < 1e-18);
        assert!((calibration.wait_delay - 2.5e-6).abs() < 1e-18);
    }

    #[test]
    fn test_snapshot_device() {
        let config = DeviceConfig::from_json(
            r#"{
                "name": "outputs",
                "capabilities": {"clock_resolution": 1e-8, "max_instructions": 100, "min_period": 4},
                "variant": {"kind": "snapshot", "layout": {"channels": 3, "word_bits": 16, "byte_order": "little"}}
            }"#,
        )
        .unwrap();
        let Variant::Snapshot { table, layout, .. } = &config.variant else {
            panic!("expected a snapshot device");
        };
        assert_eq!(table, "pulse_program");
        assert_eq!(layout.byte_order, ByteOrder::Little);
        assert_eq!(
            config.channel_names(),
            vec!["channel0", "channel1", "channel2"]
        );
    }

    #[test]
    fn test_missing_calibration() {
        let mut config = DeviceConfig::from_json(TOGGLE_DEVICE).unwrap();
        config.calibration.wait_delay = None;
        assert!(matches!(
            config.calibration(),
            Err(Error::UnsupportedCalibration(_))
        ));
    }

    #[test]
    fn test_invalid_devices() {
        let mut config = DeviceConfig::from_json(TOGGLE_DEVICE).unwrap();
        config.variant = Variant::Toggle {
            pseudoclocks: vec!["a".to_string(), "a".to_string()],
        };
        assert!(config.validate().is_err());

        config.variant = Variant::Toggle {
            pseudoclocks: vec![],
        };
        assert!(config.validate().is_err());

        config.variant = Variant::Snapshot {
            table: "pulse_program".to_string(),
            layout: SnapshotLayout {
                channels: 2,
                word_bits: 8,
                byte_order: ByteOrder::Big,
            },
            channel_names: vec!["only_one".to_string()],
        };
        assert!(matches!(config.validate(), Err(Error::InvalidLayout(_))));

        let mut config = DeviceConfig::from_json(TOGGLE_DEVICE).unwrap();
        config.calibration.trigger_delay = Some(-1.0);
        assert!(matches!(
            config.validate(),
            Err(Error::UnsupportedCalibration(_))
        ));
    }
}
