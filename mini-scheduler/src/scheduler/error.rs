/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Structured error types for the offer allocator.
//!
//! Two types model the two outcomes that are not a launch:
//!
//! * [`SkipReason`]: why an application or executor was passed over for the
//!   current offer.  This is **not** an error: the candidate is simply
//!   re-evaluated on the next offer.  It exists so the `debug!` trace names
//!   the exact values that did not fit.
//! * [`SchedulerError`]: a real failure while recording a launch or encoding
//!   a control message.  Under correct operation it is never produced.

use thiserror::Error;

use crate::control::ControlError;
use crate::registry::RegistryError;

// ── Soft skips ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// The application has been terminated and takes no new tasks.
    AppTerminated,

    /// Running CPU usage is at or above the per-application ceiling.
    CpuCeiling { used: f64, limit: f64 },

    /// Running memory usage is at or above the per-application ceiling.
    MemCeiling { used: f64, limit: f64 },

    /// Running plus in-flight launches are at or above the instance ceiling.
    InstanceCeiling { active: usize, limit: usize },

    /// The executor already has its target number of launched tasks.
    TargetReached { launched: usize, target: u32 },

    /// Per-instance CPU requirement exceeds what is left of the offer.
    InsufficientCpu { required: f64, remaining: f64 },

    /// Per-instance memory requirement exceeds what is left of the offer.
    InsufficientMem { required: f64, remaining: f64 },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::AppTerminated => write!(f, "application is terminated"),

            SkipReason::CpuCeiling { used, limit } => {
                write!(f, "cpu usage {:.2} is at or above ceiling {:.2}", used, limit)
            }

            SkipReason::MemCeiling { used, limit } => {
                write!(f, "mem usage {:.1} is at or above ceiling {:.1}", used, limit)
            }

            SkipReason::InstanceCeiling { active, limit } => write!(
                f,
                "{} running or launched instances, ceiling is {}",
                active, limit
            ),

            SkipReason::TargetReached { launched, target } => write!(
                f,
                "{} launched instances, target is {}",
                launched, target
            ),

            SkipReason::InsufficientCpu {
                required,
                remaining,
            } => write!(
                f,
                "needs {:.2} cpus but offer only has {:.2} left",
                required, remaining
            ),

            SkipReason::InsufficientMem {
                required,
                remaining,
            } => write!(
                f,
                "needs {:.1} mem but offer only has {:.1} left",
                required, remaining
            ),
        }
    }
}

// ── Hard failures ─────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Recording a launch or a status transition in the registry failed.
    #[error("registry bookkeeping failed: {0}")]
    Registry(#[from] RegistryError),

    /// A stop message could not be encoded.
    #[error("control message encoding failed: {0}")]
    Control(#[from] ControlError),
}
