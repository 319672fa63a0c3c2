// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The event router: registries, per-event fan-out, bounded
//! execution, asynchronous error surfacing.

use crate::graph::{Dag, GraphError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use weir_core::{Event, Input, InputError, Process, ProcessError};

/// Default bound on concurrently running process invocations, across
/// all processes.
pub const DEFAULT_CONCURRENT_PROCESSORS: usize = 8;

/// Per-input sink depth. Inputs block on send until the router
/// accepts the event.
const SINK_DEPTH: usize = 1;

/// Error stream depth. A full stream blocks the producing worker
/// until the consumer drains it; errors are considered important.
const ERROR_STREAM_DEPTH: usize = 1;

/// Everything that can go wrong inside the router.
///
/// The `Graph` variant comes back synchronously from the `add_*`
/// operations; the rest are published on the error stream by
/// long-lived tasks.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Registration failed: duplicate ID, missing endpoint, or an
    /// edge that would bend the graph into a cycle.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// The graph listed a successor with no matching process
    /// registration. Indicates torn-down state.
    #[error("unable to run {input:?} -> {process:?}: process {process:?} is unknown")]
    UnknownProcess { input: String, process: String },

    /// A registry entry could not be treated as a process. The typed
    /// registry makes this unreachable here; the variant stays so
    /// hosts migrating from deployments with looser registries keep a
    /// distinguishable error kind.
    #[error("unable to run {input:?} -> {process:?}: registry entry is not a process")]
    ProcessTypeMismatch { input: String, process: String },

    /// An input's producer loop died.
    #[error("input {id:?} stopped")]
    Input {
        id: String,
        #[source]
        source: InputError,
    },

    /// A downstream process failed to handle an event.
    #[error("process {process:?} failed handling event from {input:?}")]
    Process {
        input: String,
        process: String,
        #[source]
        source: ProcessError,
    },
}

/// Runs inputs and processes, routing events along the graph.
///
/// All methods take `&self`; the orchestrator is cheap to share
/// behind an `Arc` and safe to register into from concurrent tasks.
/// `add_input` spawns onto the ambient Tokio runtime, so registration
/// must happen from within one.
pub struct Orchestrator {
    graph: Arc<RwLock<Dag>>,
    inputs: RwLock<HashMap<String, Arc<dyn Input>>>,
    processes: Arc<RwLock<HashMap<String, Arc<dyn Process>>>>,
    permits: Arc<Semaphore>,
    errors: mpsc::Sender<OrchestratorError>,
}

impl Orchestrator {
    /// An orchestrator with the default concurrency bound, plus the
    /// receiving half of its error stream.
    ///
    /// The orchestrator never closes the stream; it ends only when
    /// every producer and worker holding a sender has wound down.
    pub fn new() -> (Self, mpsc::Receiver<OrchestratorError>) {
        Self::with_concurrency(DEFAULT_CONCURRENT_PROCESSORS)
    }

    /// An orchestrator allowing at most `limit` process invocations in
    /// flight at once.
    pub fn with_concurrency(limit: usize) -> (Self, mpsc::Receiver<OrchestratorError>) {
        let (errors, error_stream) = mpsc::channel(ERROR_STREAM_DEPTH);

        (
            Self {
                graph: Arc::new(RwLock::new(Dag::new())),
                inputs: RwLock::new(HashMap::new()),
                processes: Arc::new(RwLock::new(HashMap::new())),
                permits: Arc::new(Semaphore::new(limit)),
                errors,
            },
            error_stream,
        )
    }

    /// Register `input` and start it.
    ///
    /// Two tasks are spawned: the input's own [`Input::stream`]
    /// writing into a fresh sink, and a consumer draining that sink
    /// into downstream fan-out. `cancel` is forwarded into the stream
    /// and is the sole shutdown signal for this input; a producer that
    /// instead dies with an error has it published on the error
    /// stream.
    pub fn add_input(
        &self,
        cancel: CancellationToken,
        input: Arc<dyn Input>,
    ) -> Result<(), OrchestratorError> {
        let id = input.id();
        self.graph.write().add_node(&id)?;
        self.inputs.write().insert(id.clone(), Arc::clone(&input));

        let (sink, source) = mpsc::channel(SINK_DEPTH);

        let errors = self.errors.clone();
        let producer_cancel = cancel.clone();
        let producer_id = id.clone();
        tokio::spawn(async move {
            tracing::debug!(input = %producer_id, "producer started");
            if let Err(source) = input.stream(producer_cancel, sink).await {
                let _ = errors
                    .send(OrchestratorError::Input {
                        id: producer_id,
                        source,
                    })
                    .await;
            } else {
                tracing::debug!(input = %producer_id, "producer finished");
            }
        });

        self.spawn_consumer(id, cancel, source);

        Ok(())
    }

    /// Register `process` so inputs can be linked to it.
    pub fn add_process(&self, process: Arc<dyn Process>) -> Result<(), OrchestratorError> {
        let id = process.id();
        self.graph.write().add_node(&id)?;
        self.processes.write().insert(id, process);

        Ok(())
    }

    /// Link `input` to `process`, so that every event the input emits
    /// from here on runs the process.
    ///
    /// Both endpoints must be registered, in the right roles: links
    /// run from an input to a process, never any other way around.
    pub fn add_link(
        &self,
        input: &dyn Input,
        process: &dyn Process,
    ) -> Result<(), OrchestratorError> {
        let input_id = input.id();
        let process_id = process.id();

        if !self.inputs.read().contains_key(&input_id) {
            return Err(GraphError::UnknownNode(input_id).into());
        }
        if !self.processes.read().contains_key(&process_id) {
            return Err(GraphError::UnknownNode(process_id).into());
        }

        self.graph.write().add_edge(&input_id, &process_id)?;

        Ok(())
    }

    /// Unregister a process, leaving its vertex and links in place.
    ///
    /// The graph stays the source of truth: events still routed to the
    /// vertex surface [`OrchestratorError::UnknownProcess`] on the
    /// error stream until the host tears the links down too.
    pub fn remove_process(&self, id: &str) -> Option<Arc<dyn Process>> {
        self.processes.write().remove(id)
    }

    /// Drain one input's sink into bounded fan-out workers.
    fn spawn_consumer(
        &self,
        id: String,
        cancel: CancellationToken,
        mut source: mpsc::Receiver<Event>,
    ) {
        let graph = Arc::clone(&self.graph);
        let processes = Arc::clone(&self.processes);
        let permits = Arc::clone(&self.permits);
        let errors = self.errors.clone();

        tokio::spawn(async move {
            while let Some(event) = source.recv().await {
                let successors = match graph.read().successors(&id) {
                    Ok(successors) => successors,
                    // The graph is the source of truth: no vertex, no
                    // delivery.
                    Err(_) => continue,
                };

                for successor in successors {
                    // One permit per invocation, acquired before the
                    // worker exists. When every permit is held the
                    // loop stops draining and the sink pushes back on
                    // the input, keeping pending work bounded.
                    let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                        // The semaphore is never closed.
                        return;
                    };

                    let processes = Arc::clone(&processes);
                    let errors = errors.clone();
                    let input = id.clone();
                    let event = event.clone();
                    let run_cancel = cancel.child_token();

                    tokio::spawn(async move {
                        let _permit = permit;
                        if let Err(err) =
                            run_successor(&processes, &input, &successor, run_cancel, event).await
                        {
                            let _ = errors.send(err).await;
                        }
                    });
                }
            }

            tracing::debug!(input = %id, "consumer finished");
        });
    }
}

/// Run one process for one event, reporting its logs on success.
async fn run_successor(
    processes: &RwLock<HashMap<String, Arc<dyn Process>>>,
    input: &str,
    successor: &str,
    cancel: CancellationToken,
    event: Event,
) -> Result<(), OrchestratorError> {
    let process = processes.read().get(successor).cloned();
    let Some(process) = process else {
        return Err(OrchestratorError::UnknownProcess {
            input: input.to_string(),
            process: successor.to_string(),
        });
    };

    let status =
        process
            .run(cancel, event)
            .await
            .map_err(|source| OrchestratorError::Process {
                input: input.to_string(),
                process: successor.to_string(),
                source,
            })?;

    for line in &status.logs {
        tracing::info!("{} -> {}", status.name, line);
    }

    Ok(())
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod orchestrator_tests;
