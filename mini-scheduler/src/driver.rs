/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Provider-facing calls.
//!
//! Everything the scheduler asks of the cluster-resource provider goes
//! through [`SchedulerDriver`].  The wire protocol behind it is not part of
//! this crate; the simulator and the tests supply their own drivers.

use crate::task::{AgentId, OfferId, StatusEvent, TaskRequest};

pub trait SchedulerDriver {
    /// Accept `offer` with `tasks` (possibly empty).  The unused remainder
    /// should not be re-offered for `refuse_seconds`.
    fn accept_offer(&mut self, offer: &OfferId, tasks: Vec<TaskRequest>, refuse_seconds: f64);

    /// Send opaque bytes to an executor on an agent.
    fn send_framework_message(&mut self, executor_id: &str, agent_id: &AgentId, data: Vec<u8>);

    /// Explicitly acknowledge a processed status event.
    fn acknowledge(&mut self, event: &StatusEvent);

    /// Abort the session.
    fn abort(&mut self);

    /// Ask the provider to end the session cleanly.
    fn request_shutdown(&mut self);
}

// ── Recording driver ──────────────────────────────────────────────────────────

/// One call observed by [`RecordingDriver`].
#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    Accept {
        offer: OfferId,
        tasks: Vec<TaskRequest>,
        refuse_seconds: f64,
    },
    Message {
        executor_id: String,
        agent_id: AgentId,
        data: Vec<u8>,
    },
    Acknowledge(StatusEvent),
    Abort,
    Shutdown,
}

/// Driver that only records calls, in order.  Used by tests and by the
/// scheduler binary's dry run.
#[derive(Debug, Default)]
pub struct RecordingDriver {
    pub calls: Vec<DriverCall>,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every task passed to `accept_offer`, flattened.
    pub fn launched(&self) -> Vec<&TaskRequest> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                DriverCall::Accept { tasks, .. } => Some(tasks.iter()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// `(executor_id, data)` for every framework message.
    pub fn messages(&self) -> Vec<(&str, &[u8])> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                DriverCall::Message {
                    executor_id, data, ..
                } => Some((executor_id.as_str(), data.as_slice())),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&DriverCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn aborts(&self) -> usize {
        self.count(|c| matches!(c, DriverCall::Abort))
    }

    pub fn shutdowns(&self) -> usize {
        self.count(|c| matches!(c, DriverCall::Shutdown))
    }

    pub fn acks(&self) -> usize {
        self.count(|c| matches!(c, DriverCall::Acknowledge(_)))
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

impl SchedulerDriver for RecordingDriver {
    fn accept_offer(&mut self, offer: &OfferId, tasks: Vec<TaskRequest>, refuse_seconds: f64) {
        self.calls.push(DriverCall::Accept {
            offer: offer.clone(),
            tasks,
            refuse_seconds,
        });
    }

    fn send_framework_message(&mut self, executor_id: &str, agent_id: &AgentId, data: Vec<u8>) {
        self.calls.push(DriverCall::Message {
            executor_id: executor_id.to_string(),
            agent_id: agent_id.clone(),
            data,
        });
    }

    fn acknowledge(&mut self, event: &StatusEvent) {
        self.calls.push(DriverCall::Acknowledge(event.clone()));
    }

    fn abort(&mut self) {
        self.calls.push(DriverCall::Abort);
    }

    fn request_shutdown(&mut self) {
        self.calls.push(DriverCall::Shutdown);
    }
}
