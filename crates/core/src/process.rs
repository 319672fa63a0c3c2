// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The contract per-event workers implement.

use crate::Event;
use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Ways a single process invocation can fail.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The work ran to completion and reported failure. The invocation
    /// logs should shed light on what went wrong.
    #[error("process exited with code {0}")]
    NonZeroExit(i64),
    /// The external runtime refused or lost the work.
    #[error("process runtime failed: {0}")]
    Runtime(String),
    /// The invocation was cancelled before completing.
    #[error("process cancelled")]
    Cancelled,
}

/// Final state of one process invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExitStatus {
    /// In flight, or finished without the runtime reporting an
    /// outcome.
    #[default]
    Unknown,
    /// The work was accepted but never started.
    Unstarted,
    Success,
    Fail,
}

/// What one invocation produced: an instance-unique name, the exit
/// status, and any diagnostic lines harvested from the worker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessStatus {
    pub name: String,
    pub status: ExitStatus,
    pub logs: Vec<String>,
}

/// A worker invoked once per event.
///
/// Stateless from the orchestrator's point of view. Implementations
/// may hold connection pools or clients internally, but nothing about
/// one invocation is contractual for the next.
#[async_trait]
pub trait Process: Send + Sync {
    /// Stable identifier for this process. Inputs and processes share
    /// one ID namespace.
    fn id(&self) -> String;

    /// Execute one unit of work for `event`.
    ///
    /// Implementations must honour `cancel` and stop their external
    /// side-effect when it fires.
    async fn run(
        &self,
        cancel: CancellationToken,
        event: Event,
    ) -> Result<ProcessStatus, ProcessError>;
}
