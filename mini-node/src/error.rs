/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use thiserror::Error;

use mini_scheduler::control::ControlError;
use mini_scheduler::task::TaskId;

#[derive(Debug, Error)]
pub enum NodeError {
    /// The framework message did not decode into a control message.
    #[error(transparent)]
    Control(#[from] ControlError),

    /// No worker was ever launched for this task on this node.
    #[error("no worker for task {0}")]
    UnknownTask(TaskId),

    /// The worker exists but has already exited.
    #[error("worker for task {0} has already exited")]
    WorkerGone(TaskId),

    #[error("task {0} is already running on this node")]
    DuplicateTask(TaskId),
}
