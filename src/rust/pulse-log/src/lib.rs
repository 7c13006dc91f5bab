// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Logging macros for the pulse program crates.
//!
//! All records are emitted through the [`log`] facade with a target of the form
//! `pulseprog.rust::<module path>`, so that a host application can route the
//! engine's output independently of its own. No logger is installed here.

use std::sync::{atomic::AtomicBool, atomic::Ordering};

#[doc(hidden)]
pub use log as _log;

#[macro_export]
macro_rules! info {
    ($msg:literal, $($arg:tt)+) => {
        pulse_log::_log::info!(target: concat!("pulseprog.rust::", module_path!()), $msg, $($arg)+);
    };
    ($msg:literal) => {
        pulse_log::_log::info!(target: concat!("pulseprog.rust::", module_path!()), $msg);
    };
}

#[macro_export]
macro_rules! warn {
    ($msg:literal, $($arg:tt)+) => {
        pulse_log::_log::warn!(target: concat!("pulseprog.rust::", module_path!()), $msg, $($arg)+);
    };
    ($msg:literal) => {
        pulse_log::_log::warn!(target: concat!("pulseprog.rust::", module_path!()), $msg);
    };
}

#[macro_export]
macro_rules! debug {
    ($msg:literal, $($arg:tt)+) => {
        pulse_log::_log::debug!(target: concat!("pulseprog.rust::", module_path!()), $msg, $($arg)+);
    };
    ($msg:literal) => {
        pulse_log::_log::debug!(target: concat!("pulseprog.rust::", module_path!()), $msg);
    };
}

/// Log a diagnostic message at info level if diagnostics logging is enabled.
///
/// Diagnostics cover details of a compile or replay that are useful when
/// verifying a run (unused trigger edges, run-length statistics) but too noisy
/// for regular operation.
#[macro_export]
macro_rules! diagnostic {
    ($msg:literal, $($arg:tt)+) => {
        if pulse_log::is_diagnostics_enabled() {
            pulse_log::_log::info!(target: concat!("pulseprog.rust::", module_path!()), $msg, $($arg)+);
        }
    };
    ($msg:literal) => {
        if pulse_log::is_diagnostics_enabled() {
            pulse_log::_log::info!(target: concat!("pulseprog.rust::", module_path!()), $msg);
        }
    };
}

static DIAGNOSTICS_ENABLED: AtomicBool = AtomicBool::new(false);

#[inline]
pub fn is_diagnostics_enabled() -> bool {
    DIAGNOSTICS_ENABLED.load(Ordering::Acquire)
}

/// Initialize the logging.
///
/// Meant to be called once at the start of the program. Only the diagnostics
/// switch is set here; installing a concrete logger is left to the binary.
pub fn init_logging(with_diagnostics: bool) {
    DIAGNOSTICS_ENABLED.store(with_diagnostics, Ordering::Release);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostics_switch() {
        init_logging(true);
        assert!(is_diagnostics_enabled());
        init_logging(false);
        assert!(!is_diagnostics_enabled());
    }
}
