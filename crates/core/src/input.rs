// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The contract long-running event producers implement.

use crate::Event;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Ways an input's stream can die.
#[derive(Debug, Error)]
pub enum InputError {
    /// The source handed over a payload that cannot be made sense of.
    #[error("malformed change payload: {0}")]
    Decode(String),
    /// Setting up source-side machinery (triggers, subscriptions)
    /// failed.
    #[error("input bootstrap failed: {0}")]
    Bootstrap(String),
    /// The external source failed mid-stream in a way the input could
    /// not recover from.
    #[error("input source failed: {0}")]
    Source(String),
}

/// A long-running producer of events bound to an external observable
/// source.
///
/// The orchestrator owns the channel: it creates the sink, hands it to
/// [`Input::stream`], and drains the other end into downstream
/// processes. It is the orchestrator's job to know which sink belongs
/// to which input and to route accordingly.
#[async_trait]
pub trait Input: Send + Sync {
    /// Stable identifier for this input. Inputs and processes share
    /// one ID namespace.
    fn id(&self) -> String;

    /// Emit events into `sink` until `cancel` fires or the source
    /// fails unrecoverably.
    ///
    /// Sends block until the router accepts the event; implementations
    /// wanting different back-pressure behaviour buffer or drop
    /// internally. Implementations must not assume the sink outlives
    /// the call: a closed sink means the router is gone and the stream
    /// should return `Ok`.
    async fn stream(
        &self,
        cancel: CancellationToken,
        sink: mpsc::Sender<Event>,
    ) -> Result<(), InputError>;
}
