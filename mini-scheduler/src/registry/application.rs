/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Applications and their executor templates.
//!
//! An [`ExecutorSpec`] is a per-instance resource template plus the live
//! `launched` and `running` task sets.  The three lifecycle mutators
//! ([`on_launched`](ExecutorSpec::on_launched),
//! [`on_running`](ExecutorSpec::on_running),
//! [`on_stopped`](ExecutorSpec::on_stopped)) are the only way a task id moves
//! between the sets:
//!
//! ```text
//!   on_launched        on_running          on_stopped
//!  ───────────► launched ─────────► running ──────────► (gone)
//! ```
//!
//! A task id is never in both sets.  Resource usage is always
//! `required × |running|`; launched tasks do not count.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use super::error::RegistryError;
use crate::task::{Capacity, ExecutorInfo, TaskId};

// ── ExecutorSpec ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ExecutorSpec {
    name: String,
    info: ExecutorInfo,
    required: Capacity,
    /// Target instance count.
    instances: u32,
    /// Verbatim payload forwarded with every task.
    payload: serde_json::Value,
    launched: BTreeSet<TaskId>,
    running: BTreeSet<TaskId>,
}

impl ExecutorSpec {
    /// Create a template requiring `cpus` / `mem` per instance, targeting
    /// `instances` launched tasks.
    ///
    /// # Errors
    /// [`RegistryError::InvalidRequirement`] unless both requirements are
    /// positive and finite.
    pub fn new(
        name: impl Into<String>,
        cpus: f64,
        mem: f64,
        instances: u32,
    ) -> Result<Self, RegistryError> {
        let name = name.into();
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if !valid(cpus) || !valid(mem) {
            return Err(RegistryError::InvalidRequirement {
                executor: name,
                cpus,
                mem,
            });
        }

        Ok(Self {
            info: ExecutorInfo {
                executor_id: name.clone(),
                ..Default::default()
            },
            name,
            required: Capacity::new(cpus, mem),
            instances,
            payload: serde_json::Value::Null,
            launched: BTreeSet::new(),
            running: BTreeSet::new(),
        })
    }

    /// Attach container details (image, command, force-pull flag).
    pub fn with_container(
        mut self,
        image: impl Into<String>,
        command: impl Into<String>,
        force_pull: bool,
    ) -> Self {
        self.info.image = image.into();
        self.info.command = command.into();
        self.info.force_pull = force_pull;
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn info(&self) -> &ExecutorInfo {
        &self.info
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    /// Per-instance requirement.
    pub fn required(&self) -> Capacity {
        self.required
    }

    pub fn required_cpu(&self) -> f64 {
        self.required.cpus
    }

    pub fn required_mem(&self) -> f64 {
        self.required.mem
    }

    pub fn instances(&self) -> u32 {
        self.instances
    }

    pub fn num_launched(&self) -> usize {
        self.launched.len()
    }

    pub fn num_running(&self) -> usize {
        self.running.len()
    }

    pub fn launched_tasks(&self) -> impl Iterator<Item = &TaskId> {
        self.launched.iter()
    }

    pub fn running_tasks(&self) -> impl Iterator<Item = &TaskId> {
        self.running.iter()
    }

    /// `true` if `task` is in either set.
    pub fn tracks(&self, task: &TaskId) -> bool {
        self.launched.contains(task) || self.running.contains(task)
    }

    pub fn cpu_used(&self) -> f64 {
        self.required.cpus * self.running.len() as f64
    }

    pub fn mem_used(&self) -> f64 {
        self.required.mem * self.running.len() as f64
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    /// Record a freshly launched task.
    ///
    /// # Errors
    /// [`RegistryError::DuplicateTask`] if `task` is already launched or
    /// running; the sets are left untouched.
    pub fn on_launched(&mut self, task: TaskId) -> Result<(), RegistryError> {
        if self.tracks(&task) {
            return Err(RegistryError::DuplicateTask(task));
        }
        debug!(executor = %self.name, task = %task, "launched");
        self.launched.insert(task);
        Ok(())
    }

    /// Move `task` from launched to running.  A task that was never seen as
    /// launched still becomes running.
    pub fn on_running(&mut self, task: TaskId) {
        self.launched.remove(&task);
        debug!(executor = %self.name, task = %task, "running");
        self.running.insert(task);
    }

    /// Drop `task` from both sets.  Returns `true` if it was tracked.
    pub fn on_stopped(&mut self, task: &TaskId) -> bool {
        let was_running = self.running.remove(task);
        let was_launched = self.launched.remove(task);
        debug!(
            executor = %self.name,
            task = %task,
            was_running,
            was_launched,
            "stopped"
        );
        was_running || was_launched
    }
}

// ── Application ───────────────────────────────────────────────────────────────

/// A named unit of demand made of one or more executor templates.
#[derive(Debug, Clone)]
pub struct Application {
    name: String,
    /// `BTreeMap` so iteration (and therefore allocation within one app and
    /// every snapshot) is deterministic.
    executors: BTreeMap<String, ExecutorSpec>,
    terminated: bool,
}

impl Application {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            executors: BTreeMap::new(),
            terminated: false,
        }
    }

    /// Builder form of [`add_executor`](Self::add_executor).
    pub fn with_executor(mut self, spec: ExecutorSpec) -> Result<Self, RegistryError> {
        self.add_executor(spec)?;
        Ok(self)
    }

    /// Add an executor template.  Existing executors are never overwritten.
    pub fn add_executor(&mut self, spec: ExecutorSpec) -> Result<(), RegistryError> {
        if self.executors.contains_key(spec.name()) {
            return Err(RegistryError::DuplicateExecutor {
                app: self.name.clone(),
                executor: spec.name().to_string(),
            });
        }
        self.executors.insert(spec.name().to_string(), spec);
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn executor(&self, name: &str) -> Option<&ExecutorSpec> {
        self.executors.get(name)
    }

    pub fn executor_mut(&mut self, name: &str) -> Option<&mut ExecutorSpec> {
        self.executors.get_mut(name)
    }

    pub fn executors(&self) -> impl Iterator<Item = &ExecutorSpec> {
        self.executors.values()
    }

    pub fn executors_mut(&mut self) -> impl Iterator<Item = &mut ExecutorSpec> {
        self.executors.values_mut()
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Set the terminated flag.  Returns `true` only on the false → true
    /// transition; there is no way back.
    pub fn mark_terminated(&mut self) -> bool {
        let transitioned = !self.terminated;
        self.terminated = true;
        transitioned
    }

    pub fn num_launched(&self) -> usize {
        self.executors.values().map(ExecutorSpec::num_launched).sum()
    }

    pub fn num_running(&self) -> usize {
        self.executors.values().map(ExecutorSpec::num_running).sum()
    }

    pub fn cpu_used(&self) -> f64 {
        self.executors.values().map(ExecutorSpec::cpu_used).sum()
    }

    pub fn mem_used(&self) -> f64 {
        self.executors.values().map(ExecutorSpec::mem_used).sum()
    }

    /// `(executor name, task id)` for every running task of every executor.
    pub fn running_tasks(&self) -> Vec<(&str, &TaskId)> {
        self.executors
            .values()
            .flat_map(|e| e.running_tasks().map(move |t| (e.name(), t)))
            .collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
