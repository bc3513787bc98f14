/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Two-level termination.
//!
//! * **Application level**: once an application's aggregate running count
//!   reaches the threshold, every running task gets a graceful stop signal
//!   and the application is marked terminated.  Runs at most once per
//!   application.
//! * **Session level**: once every application is terminated and drained to
//!   zero running tasks, shutdown is requested.  Fires at most once.
//!
//! The coordinator only decides.  Sending the stop messages and the shutdown
//! request through the driver is the dispatcher's job.

use tracing::{debug, info};

use crate::registry::Registry;
use crate::task::{AgentId, TaskId};

/// Default running-task count that terminates an application.
pub const DEFAULT_RUNNING_THRESHOLD: usize = 3;

/// Addressing for one graceful stop message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopSignal {
    pub task_id: TaskId,
    pub executor_id: String,
    pub agent_id: AgentId,
}

#[derive(Debug)]
pub struct TerminationCoordinator {
    running_threshold: usize,
    shutdown_requested: bool,
}

impl TerminationCoordinator {
    pub fn new(running_threshold: usize) -> Self {
        Self {
            running_threshold,
            shutdown_requested: false,
        }
    }

    pub fn running_threshold(&self) -> usize {
        self.running_threshold
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested
    }

    // ── Application level ─────────────────────────────────────────────────────

    /// Terminate `app` if its running count has reached the threshold.
    ///
    /// Returns the stop signals to send; empty when nothing happened.
    pub fn check_application(&self, registry: &mut Registry, app: &str) -> Vec<StopSignal> {
        let Some(application) = registry.app(app) else {
            return Vec::new();
        };
        if application.is_terminated() {
            return Vec::new();
        }
        let running = application.num_running();
        if running < self.running_threshold {
            debug!(
                app = %app,
                running,
                threshold = self.running_threshold,
                "application below termination threshold"
            );
            return Vec::new();
        }

        info!(
            app = %app,
            running,
            threshold = self.running_threshold,
            "running threshold reached, terminating application"
        );
        self.terminate_application(registry, app)
    }

    /// Unconditionally terminate `app`: one stop signal per running task,
    /// then set the terminated flag.  A second call is a no-op.
    pub fn terminate_application(&self, registry: &mut Registry, app: &str) -> Vec<StopSignal> {
        match registry.app(app) {
            Some(a) if !a.is_terminated() => {}
            _ => return Vec::new(),
        }

        let signals: Vec<StopSignal> = registry
            .running_task_refs(app)
            .into_iter()
            .map(|r| StopSignal {
                task_id: r.task_id,
                executor_id: r.executor,
                agent_id: r.agent_id,
            })
            .collect();

        if let Some(a) = registry.app_mut(app) {
            a.mark_terminated();
        }
        info!(app = %app, stops = signals.len(), "application terminated");
        signals
    }

    // ── Session level ─────────────────────────────────────────────────────────

    /// `true` exactly once: the first time the registry is quiescent.
    pub fn check_session(&mut self, registry: &Registry) -> bool {
        if self.shutdown_requested || !registry.is_quiescent() {
            return false;
        }
        self.shutdown_requested = true;
        info!(apps = registry.len(), "all applications drained, requesting shutdown");
        true
    }
}

impl Default for TerminationCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_RUNNING_THRESHOLD)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Application, ExecutorSpec};

    fn registry(apps: &[&str]) -> Registry {
        let mut reg = Registry::new();
        for name in apps {
            reg.register(
                Application::new(*name)
                    .with_executor(ExecutorSpec::new("x", 0.1, 1.0, 10).unwrap())
                    .unwrap()
                    .with_executor(ExecutorSpec::new("y", 0.1, 1.0, 10).unwrap())
                    .unwrap(),
            )
            .unwrap();
        }
        reg
    }

    fn run(reg: &mut Registry, app: &str, exec: &str, id: &str) {
        reg.record_launch(app, exec, id.into(), "agent-1".into())
            .unwrap();
        reg.mark_running(&id.into()).unwrap();
    }

    #[test]
    fn below_threshold_does_nothing() {
        let mut reg = registry(&["a"]);
        run(&mut reg, "a", "x", "t1");
        run(&mut reg, "a", "y", "t2");
        let coord = TerminationCoordinator::new(3);

        assert!(coord.check_application(&mut reg, "a").is_empty());
        assert!(!reg.app("a").unwrap().is_terminated());
    }

    #[test]
    fn threshold_counts_across_executors_and_stops_all() {
        let mut reg = registry(&["a"]);
        run(&mut reg, "a", "x", "t1");
        run(&mut reg, "a", "x", "t2");
        run(&mut reg, "a", "y", "t3");
        let coord = TerminationCoordinator::new(3);

        let mut stops = coord.check_application(&mut reg, "a");
        stops.sort_by(|l, r| l.task_id.cmp(&r.task_id));
        let ids: Vec<&str> = stops.iter().map(|s| s.task_id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2", "t3"]);
        assert_eq!(stops[2].executor_id, "y");
        assert_eq!(stops[0].agent_id.as_str(), "agent-1");
        assert!(reg.app("a").unwrap().is_terminated());
    }

    #[test]
    fn termination_is_idempotent() {
        let mut reg = registry(&["a"]);
        for id in ["t1", "t2", "t3", "t4"] {
            run(&mut reg, "a", "x", id);
        }
        let coord = TerminationCoordinator::new(3);

        assert_eq!(coord.check_application(&mut reg, "a").len(), 4);
        assert!(coord.check_application(&mut reg, "a").is_empty());
        assert!(coord.terminate_application(&mut reg, "a").is_empty());
    }

    #[test]
    fn launched_tasks_are_not_signalled() {
        let mut reg = registry(&["a"]);
        reg.record_launch("a", "x", "pending".into(), "ag".into())
            .unwrap();
        run(&mut reg, "a", "x", "t1");
        let coord = TerminationCoordinator::new(1);

        let stops = coord.check_application(&mut reg, "a");
        assert_eq!(stops.len(), 1);
        assert_eq!(stops[0].task_id.as_str(), "t1");
    }

    #[test]
    fn unknown_application_is_ignored() {
        let mut reg = registry(&["a"]);
        let coord = TerminationCoordinator::default();
        assert!(coord.check_application(&mut reg, "ghost").is_empty());
        assert_eq!(coord.running_threshold(), DEFAULT_RUNNING_THRESHOLD);
    }

    #[test]
    fn session_shutdown_fires_exactly_once() {
        let mut reg = registry(&["a", "b"]);
        let mut coord = TerminationCoordinator::new(1);
        assert!(!coord.check_session(&reg));

        run(&mut reg, "a", "x", "t1");
        coord.check_application(&mut reg, "a");
        reg.app_mut("b").unwrap().mark_terminated();
        assert!(!coord.check_session(&reg), "t1 still running");

        reg.mark_stopped(&"t1".into()).unwrap();
        assert!(coord.check_session(&reg));
        assert!(coord.shutdown_requested());
        assert!(!coord.check_session(&reg));
    }
}
