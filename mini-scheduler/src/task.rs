/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Core task and offer data structures shared by the scheduler, the node
//! runtime and the simulator.
//!
//! ```text
//! provider ──(Offer)──►  Allocator  ──(TaskRequest)──►  provider ──► node runtime
//!    ▲                                                                    │
//!    └──────────────────────────(StatusEvent)──────────────────────────────┘
//! ```
//!
//! # Ownership model
//! An [`Offer`] is borrowed by one allocation pass and then dropped; nothing
//! in the registry keeps a reference to it.  A [`TaskRequest`] is **moved**
//! into the driver's accept call.  The only long-lived record of a task is
//! its [`TaskRef`] in the registry's reverse index.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Resource names ────────────────────────────────────────────────────────────

/// Scalar resource name for CPU shares.
pub const CPUS: &str = "cpus";

/// Scalar resource name for memory (MB).
pub const MEM: &str = "mem";

// ── Identifiers ───────────────────────────────────────────────────────────────

/// Opaque task identifier assigned by the scheduler at launch time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Generate a fresh id of the form `<app>-<uuid v4>`.
    pub fn generate(app: &str) -> Self {
        Self(format!("{}-{}", app, Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Opaque identifier of the agent (slave) an offer comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AgentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Opaque offer identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OfferId(String);

impl fmt::Display for OfferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OfferId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for OfferId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ── Resources and offers ──────────────────────────────────────────────────────

/// One named scalar resource, e.g. `cpus = 2.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    pub scalar: f64,
}

impl Resource {
    pub fn cpus(value: f64) -> Self {
        Self {
            name: CPUS.to_string(),
            scalar: value,
        }
    }

    pub fn mem(value: f64) -> Self {
        Self {
            name: MEM.to_string(),
            scalar: value,
        }
    }
}

/// CPU / memory pair used for remaining offer capacity and per-instance
/// requirements.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Capacity {
    pub cpus: f64,
    pub mem: f64,
}

impl Capacity {
    pub fn new(cpus: f64, mem: f64) -> Self {
        Self { cpus, mem }
    }

    /// `true` if `need` fits entirely inside `self`.
    pub fn fits(&self, need: Capacity) -> bool {
        need.cpus <= self.cpus && need.mem <= self.mem
    }

    /// Subtract `used`, clamping at zero.
    pub fn deduct(&mut self, used: Capacity) {
        self.cpus = (self.cpus - used.cpus).max(0.0);
        self.mem = (self.mem - used.mem).max(0.0);
    }
}

/// A time-boxed grant of capacity on one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub agent_id: AgentId,
    pub resources: Vec<Resource>,
}

impl Offer {
    /// Convenience constructor for an offer carrying only `cpus` and `mem`.
    pub fn new(id: impl Into<OfferId>, agent_id: impl Into<AgentId>, cpus: f64, mem: f64) -> Self {
        Self {
            id: id.into(),
            agent_id: agent_id.into(),
            resources: vec![Resource::cpus(cpus), Resource::mem(mem)],
        }
    }

    /// Sum of every scalar resource called `name`.  Repeated entries are
    /// added together; absent names sum to `0.0`.
    pub fn scalar(&self, name: &str) -> f64 {
        self.resources
            .iter()
            .filter(|r| r.name == name)
            .map(|r| r.scalar)
            .sum()
    }

    /// Total `cpus` / `mem` advertised by this offer.
    pub fn capacity(&self) -> Capacity {
        Capacity::new(self.scalar(CPUS), self.scalar(MEM))
    }
}

// ── Task state ────────────────────────────────────────────────────────────────

/// Task state reported by a status event.
///
/// Mirrors the provider's `TASK_*` states.  Only `Running` and `Finished`
/// drive bookkeeping; `Lost`, `Killed` and `Failed` are fatal for the whole
/// session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Staging,
    Running,
    Finished,
    Killed,
    Failed,
    Lost,
}

impl TaskState {
    /// No further transition is expected from this state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Finished | TaskState::Killed | TaskState::Failed | TaskState::Lost
        )
    }

    /// Terminal states the scheduler does not know how to recover from.
    pub fn is_unexpected_terminal(self) -> bool {
        matches!(self, TaskState::Killed | TaskState::Failed | TaskState::Lost)
    }

    /// Wire name, e.g. `TASK_RUNNING`.
    pub fn as_wire_str(self) -> &'static str {
        match self {
            TaskState::Staging => "TASK_STAGING",
            TaskState::Running => "TASK_RUNNING",
            TaskState::Finished => "TASK_FINISHED",
            TaskState::Killed => "TASK_KILLED",
            TaskState::Failed => "TASK_FAILED",
            TaskState::Lost => "TASK_LOST",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire_str())
    }
}

/// Returned by [`TaskState::from_str`] for names outside the known set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task state '{0}'")]
pub struct UnknownTaskState(pub String);

impl FromStr for TaskState {
    type Err = UnknownTaskState;

    /// Accepts both the wire form (`TASK_RUNNING`) and the bare form
    /// (`running`), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let bare = upper.strip_prefix("TASK_").unwrap_or(&upper);
        match bare {
            "STAGING" => Ok(TaskState::Staging),
            "RUNNING" => Ok(TaskState::Running),
            "FINISHED" => Ok(TaskState::Finished),
            "KILLED" => Ok(TaskState::Killed),
            "FAILED" => Ok(TaskState::Failed),
            "LOST" => Ok(TaskState::Lost),
            _ => Err(UnknownTaskState(s.to_string())),
        }
    }
}

// ── Status events ─────────────────────────────────────────────────────────────

/// Asynchronous task status update delivered by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub task_id: TaskId,
    pub executor_id: String,
    pub state: TaskState,
    /// Opaque bytes attached by the task runtime.  Usually a JSON
    /// [`StatusPayload`], but nothing relies on that.
    #[serde(default)]
    pub message: Vec<u8>,
}

impl StatusEvent {
    pub fn new(task_id: impl Into<TaskId>, executor_id: &str, state: TaskState) -> Self {
        Self {
            task_id: task_id.into(),
            executor_id: executor_id.to_string(),
            state,
            message: Vec::new(),
        }
    }

    pub fn with_message(mut self, message: Vec<u8>) -> Self {
        self.message = message;
        self
    }

    /// Best-effort decode of the attached payload.
    ///
    /// Returns `None` for an empty message or anything that is not a JSON
    /// [`StatusPayload`]; the event's `state` stays authoritative either way.
    pub fn payload(&self) -> Option<StatusPayload> {
        if self.message.is_empty() {
            return None;
        }
        serde_json::from_slice(&self.message).ok()
    }
}

/// JSON body the node runtime attaches to its status updates.
///
/// Every field is optional so partial or foreign payloads still decode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusPayload {
    /// `"started"`, `"completed"` or `"error"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    /// Work units completed before the update was sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusPayload {
    pub fn to_bytes(&self) -> Vec<u8> {
        // A struct of strings and integers always serialises.
        serde_json::to_vec(self).unwrap_or_default()
    }
}

// ── Launch requests ───────────────────────────────────────────────────────────

/// Container / command description of an executor, forwarded verbatim with
/// every task launched from it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutorInfo {
    /// Executor id; equal to the executor's name inside its application.
    pub executor_id: String,
    pub image: String,
    pub command: String,
    pub force_pull: bool,
}

/// One task the scheduler asks the provider to launch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRequest {
    pub task_id: TaskId,
    /// Human-readable name, `task <id>`.
    pub name: String,
    pub agent_id: AgentId,
    pub executor: ExecutorInfo,
    pub resources: Vec<Resource>,
    /// Verbatim JSON payload configured on the executor template.
    pub payload: serde_json::Value,
}

impl TaskRequest {
    /// `cpus` / `mem` claimed by this request.
    pub fn capacity(&self) -> Capacity {
        let sum = |name: &str| -> f64 {
            self.resources
                .iter()
                .filter(|r| r.name == name)
                .map(|r| r.scalar)
                .sum()
        };
        Capacity::new(sum(CPUS), sum(MEM))
    }
}

// ── Reverse index entry ───────────────────────────────────────────────────────

/// Where a launched task belongs.  Held only in the registry's reverse
/// index; created at launch, dropped on a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRef {
    pub task_id: TaskId,
    pub app: String,
    pub executor: String,
    /// Agent the task was placed on; needed to address stop messages.
    pub agent_id: AgentId,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
