/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Mini node runtime – runs launched tasks as cooperative tokio workers.
//!
//! ```text
//! lib.rs
//! ├── runtime   – NodeRuntime: launch, deliver control messages, reap
//! ├── workload  – unit-based simulated work, payload overrides
//! └── error     – NodeError
//! ```

pub mod error;
pub mod runtime;
pub mod workload;

pub use error::NodeError;
pub use runtime::NodeRuntime;
pub use workload::WorkloadConfig;
