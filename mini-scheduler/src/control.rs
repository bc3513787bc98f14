/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Control messages sent from the scheduler to the task runtime over the
//! provider's framework-message channel.
//!
//! The channel carries opaque bytes.  Messages are a closed set of variants,
//! JSON-encoded with an internal `type` tag:
//!
//! ```json
//! {"type":"stop","task_id":"team_a-6f1c..."}
//! ```
//!
//! Decoding happens exactly once, at the runtime boundary, via
//! [`ControlMessage::decode`].  Anything that does not decode is a
//! [`ControlError`]; the runtime never inspects raw JSON.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::task::TaskId;

/// Errors raised while encoding or decoding a [`ControlMessage`].
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("control message is empty")]
    Empty,

    #[error("malformed control message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A scheduler → task-runtime instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    /// Finish the current unit of work, report a terminal status and exit.
    Stop { task_id: TaskId },
}

impl ControlMessage {
    pub fn stop(task_id: TaskId) -> Self {
        ControlMessage::Stop { task_id }
    }

    /// Task this message is addressed to.
    pub fn task_id(&self) -> &TaskId {
        match self {
            ControlMessage::Stop { task_id } => task_id,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, ControlError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ControlError> {
        if bytes.is_empty() {
            return Err(ControlError::Empty);
        }
        Ok(serde_json::from_slice(bytes)?)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
