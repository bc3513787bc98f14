/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Per-agent task runtime.
//!
//! Every launched task gets its own tokio task (a *worker*) and its own
//! control channel.  Workers talk to the scheduler only through
//! [`StatusEvent`]s on the shared status channel.
//!
//! ```text
//! launch(req) ──spawn──▶ worker ──RUNNING──▶ status_tx
//!                          │  unit, unit, ...
//! deliver(bytes) ─Stop─▶ control_rx (checked after each unit)
//!                          └──FINISHED / FAILED──▶ status_tx
//! ```

use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use mini_scheduler::control::ControlMessage;
use mini_scheduler::task::{AgentId, StatusEvent, StatusPayload, TaskId, TaskRequest, TaskState};

use crate::error::NodeError;
use crate::workload::WorkloadConfig;

struct Worker {
    control_tx: mpsc::Sender<ControlMessage>,
    handle: JoinHandle<()>,
}

pub struct NodeRuntime {
    agent_id: AgentId,
    workload: WorkloadConfig,
    status_tx: mpsc::UnboundedSender<StatusEvent>,
    workers: HashMap<TaskId, Worker>,
}

impl NodeRuntime {
    pub fn new(
        agent_id: impl Into<AgentId>,
        workload: WorkloadConfig,
        status_tx: mpsc::UnboundedSender<StatusEvent>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            workload,
            status_tx,
            workers: HashMap::new(),
        }
    }

    pub fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    /// Workers that have not exited yet.
    pub fn active(&self) -> usize {
        self.workers.values().filter(|w| !w.handle.is_finished()).count()
    }

    // ── Launch ────────────────────────────────────────────────────────────────

    /// Spawn a worker for `request`.  Must be called inside a tokio runtime.
    pub fn launch(&mut self, request: TaskRequest) -> Result<(), NodeError> {
        self.reap();
        if self.workers.contains_key(&request.task_id) {
            return Err(NodeError::DuplicateTask(request.task_id));
        }

        let workload = self.workload.with_payload(&request.payload);
        let (control_tx, control_rx) = mpsc::channel(1);

        info!(
            task     = %request.task_id,
            executor = %request.executor.executor_id,
            agent    = %self.agent_id,
            units    = ?workload.max_units,
            "starting worker"
        );

        let handle = tokio::spawn(run_worker(
            request.task_id.clone(),
            request.executor.executor_id.clone(),
            workload,
            control_rx,
            self.status_tx.clone(),
        ));
        self.workers
            .insert(request.task_id, Worker { control_tx, handle });
        Ok(())
    }

    // ── Control messages ──────────────────────────────────────────────────────

    /// Decode a framework message and hand it to its worker.
    pub fn deliver(&mut self, bytes: &[u8]) -> Result<(), NodeError> {
        let msg = ControlMessage::decode(bytes)?;
        let task_id = msg.task_id().clone();

        let worker = self
            .workers
            .get(&task_id)
            .ok_or_else(|| NodeError::UnknownTask(task_id.clone()))?;

        match worker.control_tx.try_send(msg) {
            Ok(()) => {
                debug!(task = %task_id, "control message delivered");
                Ok(())
            }
            // A stop is already queued; the worker will act on it.
            Err(mpsc::error::TrySendError::Full(_)) => Ok(()),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(NodeError::WorkerGone(task_id)),
        }
    }

    /// Forget workers that have exited.
    pub fn reap(&mut self) -> usize {
        let before = self.workers.len();
        self.workers.retain(|_, w| !w.handle.is_finished());
        before - self.workers.len()
    }

    /// Abort every worker without a terminal status.
    pub fn shutdown(&mut self) {
        for (task, worker) in self.workers.drain() {
            if !worker.handle.is_finished() {
                warn!(task = %task, "aborting worker");
                worker.handle.abort();
            }
        }
    }
}

impl Drop for NodeRuntime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ── Worker ────────────────────────────────────────────────────────────────────

async fn run_worker(
    task_id: TaskId,
    executor_id: String,
    workload: WorkloadConfig,
    mut control_rx: mpsc::Receiver<ControlMessage>,
    status_tx: mpsc::UnboundedSender<StatusEvent>,
) {
    let report = |state: TaskState, payload: StatusPayload| {
        let event = StatusEvent::new(task_id.clone(), &executor_id, state)
            .with_message(payload.to_bytes());
        if status_tx.send(event).is_err() {
            debug!(task = %task_id, %state, "status receiver gone");
        }
    };

    report(
        TaskState::Running,
        StatusPayload {
            phase: Some("started".into()),
            ..Default::default()
        },
    );

    let mut units: u64 = 0;
    while !workload.is_complete(units) {
        tokio::time::sleep(workload.unit_duration).await;
        units += 1;

        if workload.fails_at(units) {
            warn!(task = %task_id, units, "workload failed");
            report(
                TaskState::Failed,
                StatusPayload {
                    phase: Some("error".into()),
                    units: Some(units),
                    error: Some(format!("workload failed after {} units", units)),
                },
            );
            return;
        }

        match control_rx.try_recv() {
            Ok(ControlMessage::Stop { .. }) => {
                info!(task = %task_id, units, "stop requested");
                break;
            }
            Err(mpsc::error::TryRecvError::Empty) => {}
            Err(mpsc::error::TryRecvError::Disconnected) => {
                debug!(task = %task_id, "control channel closed");
                break;
            }
        }
    }

    report(
        TaskState::Finished,
        StatusPayload {
            phase: Some("completed".into()),
            units: Some(units),
            error: None,
        },
    );
}

// ── Tests ─────────────────────────────────────────────────────────────────────
