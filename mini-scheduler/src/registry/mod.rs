/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Registry of applications plus the task-id → [`TaskRef`] reverse index.
//!
//! The registry is a plain owned value.  The allocator, the status
//! dispatcher and the termination coordinator all receive it by `&mut`
//! reference; there is no global or shared registry, and the borrow checker
//! enforces that offer and status processing never interleave.
//!
//! # Invariants
//! * Every id in the reverse index is tracked (launched or running) by
//!   exactly the executor its [`TaskRef`] names.
//! * Applications and executors are never removed, only marked terminated.

pub mod application;
pub mod error;
pub mod view;

pub use application::{Application, ExecutorSpec};
pub use error::RegistryError;

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info};

use crate::task::{AgentId, TaskId, TaskRef};

#[derive(Debug, Default)]
pub struct Registry {
    apps: BTreeMap<String, Application>,
    index: HashMap<TaskId, TaskRef>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Registration ──────────────────────────────────────────────────────────

    /// Register `app`.  Names are unique; an existing application is never
    /// replaced.
    pub fn register(&mut self, app: Application) -> Result<(), RegistryError> {
        if self.apps.contains_key(app.name()) {
            return Err(RegistryError::DuplicateApplication(app.name().to_string()));
        }
        info!(
            app = %app.name(),
            executors = app.executors().count(),
            "application registered"
        );
        self.apps.insert(app.name().to_string(), app);
        Ok(())
    }

    // ── Lookup ────────────────────────────────────────────────────────────────

    pub fn app(&self, name: &str) -> Option<&Application> {
        self.apps.get(name)
    }

    pub fn app_mut(&mut self, name: &str) -> Option<&mut Application> {
        self.apps.get_mut(name)
    }

    pub fn apps(&self) -> impl Iterator<Item = &Application> {
        self.apps.values()
    }

    /// Registered names in sorted order.
    pub fn app_names(&self) -> Vec<String> {
        self.apps.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    /// Resolve a task id through the reverse index.
    pub fn resolve(&self, task: &TaskId) -> Option<&TaskRef> {
        self.index.get(task)
    }

    /// Number of tasks currently in the reverse index.
    pub fn tracked_tasks(&self) -> usize {
        self.index.len()
    }

    // ── Task lifecycle ────────────────────────────────────────────────────────

    /// Record a launch decided by the allocator: add `task` to the
    /// executor's launched set and to the reverse index.
    pub fn record_launch(
        &mut self,
        app: &str,
        executor: &str,
        task: TaskId,
        agent_id: AgentId,
    ) -> Result<TaskRef, RegistryError> {
        if self.index.contains_key(&task) {
            return Err(RegistryError::DuplicateTask(task));
        }
        let spec = self
            .apps
            .get_mut(app)
            .ok_or_else(|| RegistryError::UnknownApplication(app.to_string()))?
            .executor_mut(executor)
            .ok_or_else(|| RegistryError::UnknownExecutor {
                app: app.to_string(),
                executor: executor.to_string(),
            })?;

        spec.on_launched(task.clone())?;

        let task_ref = TaskRef {
            task_id: task.clone(),
            app: app.to_string(),
            executor: executor.to_string(),
            agent_id,
        };
        self.index.insert(task, task_ref.clone());
        Ok(task_ref)
    }

    /// Apply a RUNNING status.  Returns the owning application's name.
    pub fn mark_running(&mut self, task: &TaskId) -> Result<String, RegistryError> {
        let task_ref = self
            .index
            .get(task)
            .ok_or_else(|| RegistryError::UnknownTask(task.clone()))?;
        let spec = Self::spec_mut(&mut self.apps, task_ref)?;
        spec.on_running(task.clone());
        Ok(task_ref.app.clone())
    }

    /// Apply a FINISHED status: drop the task from its executor's sets and
    /// from the reverse index.  Returns the owning application's name.
    pub fn mark_stopped(&mut self, task: &TaskId) -> Result<String, RegistryError> {
        let task_ref = self
            .index
            .remove(task)
            .ok_or_else(|| RegistryError::UnknownTask(task.clone()))?;
        let spec = Self::spec_mut(&mut self.apps, &task_ref)?;
        if !spec.on_stopped(task) {
            debug!(task = %task, executor = %task_ref.executor, "stopped task was not in any set");
        }
        Ok(task_ref.app)
    }

    /// Full [`TaskRef`] for every running task of `app` (used to address stop
    /// messages).  Running ids missing from the index are skipped.
    pub fn running_task_refs(&self, app: &str) -> Vec<TaskRef> {
        let Some(application) = self.apps.get(app) else {
            return Vec::new();
        };
        application
            .running_tasks()
            .into_iter()
            .filter_map(|(_, task)| self.index.get(task).cloned())
            .collect()
    }

    /// `true` when every application is terminated and has no running task.
    ///
    /// Re-evaluated from scratch on every call; no incremental counter.
    pub fn is_quiescent(&self) -> bool {
        self.apps
            .values()
            .all(|a| a.is_terminated() && a.num_running() == 0)
    }

    fn spec_mut<'a>(
        apps: &'a mut BTreeMap<String, Application>,
        task_ref: &TaskRef,
    ) -> Result<&'a mut ExecutorSpec, RegistryError> {
        apps.get_mut(&task_ref.app)
            .ok_or_else(|| RegistryError::UnknownApplication(task_ref.app.clone()))?
            .executor_mut(&task_ref.executor)
            .ok_or_else(|| RegistryError::UnknownExecutor {
                app: task_ref.app.clone(),
                executor: task_ref.executor.clone(),
            })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
