/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Mini framework scheduler.
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── task          – ids, offers, resources, status events, launch requests
//! ├── control       – scheduler → runtime control messages (JSON, tagged)
//! ├── registry/     – applications, executor templates, reverse task index
//! ├── scheduler/    – offer allocator (AllocationPolicy, NaiveAllocator)
//! ├── termination/  – application and session termination
//! ├── driver        – provider-facing SchedulerDriver trait
//! ├── dispatch/     – Framework: offer and status callbacks
//! └── config/       – YAML configuration
//! ```

pub mod config;
pub mod control;
pub mod dispatch;
pub mod driver;
pub mod registry;
pub mod scheduler;
pub mod task;
pub mod termination;
