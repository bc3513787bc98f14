/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Structured error types for registry bookkeeping.
//!
//! None of these are produced on the hot offer / status paths under normal
//! operation.  They surface caller mistakes (registering the same name twice,
//! launching the same task id twice) instead of silently absorbing them.

use thiserror::Error;

use crate::task::TaskId;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    #[error("application '{0}' is already registered")]
    DuplicateApplication(String),

    #[error("application '{app}' already has an executor named '{executor}'")]
    DuplicateExecutor { app: String, executor: String },

    #[error("application '{0}' is not registered")]
    UnknownApplication(String),

    #[error("application '{app}' has no executor named '{executor}'")]
    UnknownExecutor { app: String, executor: String },

    /// The task id is already tracked as launched or running.
    #[error("task '{0}' is already tracked")]
    DuplicateTask(TaskId),

    /// The task id is absent from the reverse index.
    #[error("task '{0}' is not tracked")]
    UnknownTask(TaskId),

    /// Per-instance requirements must be positive, finite numbers.
    #[error("executor '{executor}' has invalid requirements: cpus={cpus}, mem={mem}")]
    InvalidRequirement {
        executor: String,
        cpus: f64,
        mem: f64,
    },
}
