/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! What a worker does between RUNNING and its terminal status.

use std::time::Duration;

/// Shape of the simulated work a task performs.
///
/// Work is split into units; stop requests are honoured between units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkloadConfig {
    pub unit_duration: Duration,
    /// Finish on its own after this many units.  `None` runs until stopped.
    pub max_units: Option<u64>,
    /// Report FAILED after this many units.
    pub fail_after: Option<u64>,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            unit_duration: Duration::from_millis(100),
            max_units: None,
            fail_after: None,
        }
    }
}

impl WorkloadConfig {
    /// Apply per-task overrides from the executor's JSON payload.
    ///
    /// Recognised keys: `units`, `unit_ms`, `fail_after`.  Anything else,
    /// including a non-object payload, leaves `self` unchanged.
    pub fn with_payload(mut self, payload: &serde_json::Value) -> Self {
        if let Some(units) = payload.get("units").and_then(|v| v.as_u64()) {
            self.max_units = Some(units);
        }
        if let Some(ms) = payload.get("unit_ms").and_then(|v| v.as_u64()) {
            self.unit_duration = Duration::from_millis(ms);
        }
        if let Some(n) = payload.get("fail_after").and_then(|v| v.as_u64()) {
            self.fail_after = Some(n);
        }
        self
    }

    /// `true` once `done` units satisfy `max_units`.
    pub fn is_complete(&self, done: u64) -> bool {
        self.max_units.is_some_and(|max| done >= max)
    }

    pub fn fails_at(&self, done: u64) -> bool {
        self.fail_after == Some(done)
    }
}
