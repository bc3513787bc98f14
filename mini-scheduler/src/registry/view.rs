/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Read-only inspection projections.
//!
//! Flat, hand-written output shapes built from registry entities.  Nothing
//! here mutates the registry, and provider-native types are never serialised
//! directly.

use serde::Serialize;

use super::{Application, ExecutorSpec, Registry};

/// Snapshot of one executor template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutorView {
    pub name: String,
    pub image: String,
    pub cpus: f64,
    pub mem: f64,
    pub instances: u32,
    pub launched: Vec<String>,
    pub running: Vec<String>,
}

impl From<&ExecutorSpec> for ExecutorView {
    fn from(e: &ExecutorSpec) -> Self {
        Self {
            name: e.name().to_string(),
            image: e.info().image.clone(),
            cpus: e.required_cpu(),
            mem: e.required_mem(),
            instances: e.instances(),
            launched: e.launched_tasks().map(|t| t.to_string()).collect(),
            running: e.running_tasks().map(|t| t.to_string()).collect(),
        }
    }
}

/// Snapshot of one application.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicationView {
    pub name: String,
    pub terminated: bool,
    pub launched: usize,
    pub running: usize,
    pub cpu_used: f64,
    pub mem_used: f64,
    pub executors: Vec<ExecutorView>,
}

impl From<&Application> for ApplicationView {
    fn from(a: &Application) -> Self {
        Self {
            name: a.name().to_string(),
            terminated: a.is_terminated(),
            launched: a.num_launched(),
            running: a.num_running(),
            cpu_used: a.cpu_used(),
            mem_used: a.mem_used(),
            executors: a.executors().map(ExecutorView::from).collect(),
        }
    }
}

/// Names of every registered application.
pub fn application_names(registry: &Registry) -> Vec<String> {
    registry.app_names()
}

/// Snapshot of `name`, or `None` if it is not registered.
pub fn snapshot(registry: &Registry, name: &str) -> Option<ApplicationView> {
    registry.app(name).map(ApplicationView::from)
}
