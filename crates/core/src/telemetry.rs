// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Telemetry and debug-event shapes (spec §6 `Config`, §4.5 step loop).

use crate::ids::StepId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// `Config.Debug` (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebugLevel {
    #[default]
    Off,
    Paths,
    Detailed,
}

/// `Config.Telemetry` (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TelemetryLevel {
    #[default]
    Off,
    Basic,
    Timing,
}

/// Per-step timing/outcome, recorded when `Telemetry != Off`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepTelemetry {
    pub step_id: StepId,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    pub failed: bool,
}

/// Accumulated telemetry for one `Execute` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    pub steps: Vec<StepTelemetry>,
    pub failed_step: Option<StepId>,
}

/// A single debug-mode observation, emitted only when `Debug != Off`.
#[derive(Debug, Clone, PartialEq)]
pub enum DebugEvent {
    /// `Debug::Paths` — records which tree path was taken.
    NodeEntered { description: String },
    /// `Debug::Detailed` — additionally records resolved args, deltas, etc.
    Detail { description: String },
}


mod duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
        duration.as_millis().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}
