// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use weir_core::{ExitStatus, Operation, ProcessStatus};

fn ticker_event() -> Event {
    Event {
        location: "dag_test".to_string(),
        operation: Operation::Create,
        id: "1".to_string(),
        trigger: "dummy-input".to_string(),
    }
}

/// Emits [`ticker_event`] every 100ms until cancelled.
struct TickerInput;

#[async_trait]
impl Input for TickerInput {
    fn id(&self) -> String {
        "dummy-input".to_string()
    }

    async fn stream(
        &self,
        cancel: CancellationToken,
        sink: mpsc::Sender<Event>,
    ) -> Result<(), InputError> {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(Duration::from_millis(100)) => {}
            }
            if sink.send(ticker_event()).await.is_err() {
                return Ok(());
            }
        }
    }
}

/// Emits `count` events back to back, then returns.
struct BurstInput {
    id: String,
    count: usize,
}

#[async_trait]
impl Input for BurstInput {
    fn id(&self) -> String {
        self.id.clone()
    }

    async fn stream(
        &self,
        _cancel: CancellationToken,
        sink: mpsc::Sender<Event>,
    ) -> Result<(), InputError> {
        for n in 0..self.count {
            let event = Event {
                location: "burst".to_string(),
                operation: Operation::Create,
                id: n.to_string(),
                trigger: self.id.clone(),
            };
            if sink.send(event).await.is_err() {
                return Ok(());
            }
        }
        Ok(())
    }
}

/// Dies immediately with a source error.
struct FailingInput;

#[async_trait]
impl Input for FailingInput {
    fn id(&self) -> String {
        "failing-input".to_string()
    }

    async fn stream(
        &self,
        _cancel: CancellationToken,
        _sink: mpsc::Sender<Event>,
    ) -> Result<(), InputError> {
        Err(InputError::Source("connection reset".to_string()))
    }
}

/// Records every event it is invoked with.
struct RecordingProcess {
    id: String,
    seen: Mutex<Vec<Event>>,
}

impl RecordingProcess {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn last(&self) -> Option<Event> {
        self.seen.lock().last().cloned()
    }

    fn count(&self) -> usize {
        self.seen.lock().len()
    }
}

#[async_trait]
impl Process for RecordingProcess {
    fn id(&self) -> String {
        self.id.clone()
    }

    async fn run(
        &self,
        _cancel: CancellationToken,
        event: Event,
    ) -> Result<ProcessStatus, ProcessError> {
        let logs = vec![event.operation.to_string(), "Hello, tests!".to_string()];
        self.seen.lock().push(event);

        Ok(ProcessStatus {
            name: self.id.clone(),
            status: ExitStatus::Success,
            logs,
        })
    }
}

/// Counts concurrent invocations while holding each one open briefly.
struct GateProcess {
    id: String,
    running: AtomicUsize,
    peak: AtomicUsize,
    total: AtomicUsize,
}

impl GateProcess {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Process for GateProcess {
    fn id(&self) -> String {
        self.id.clone()
    }

    async fn run(
        &self,
        _cancel: CancellationToken,
        _event: Event,
    ) -> Result<ProcessStatus, ProcessError> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(50)).await;

        self.running.fetch_sub(1, Ordering::SeqCst);
        self.total.fetch_add(1, Ordering::SeqCst);

        Ok(ProcessStatus {
            name: self.id.clone(),
            status: ExitStatus::Success,
            logs: Vec::new(),
        })
    }
}

/// Fails every invocation with a non-zero exit.
struct FailingProcess;

#[async_trait]
impl Process for FailingProcess {
    fn id(&self) -> String {
        "failing-process".to_string()
    }

    async fn run(
        &self,
        _cancel: CancellationToken,
        _event: Event,
    ) -> Result<ProcessStatus, ProcessError> {
        Err(ProcessError::NonZeroExit(2))
    }
}

#[tokio::test(start_paused = true)]
async fn events_flow_from_input_to_linked_process() {
    let (orchestrator, _errors) = Orchestrator::new();
    let input = Arc::new(TickerInput);
    let process = Arc::new(RecordingProcess::new("dummy-process"));

    orchestrator
        .add_input(CancellationToken::new(), input.clone())
        .unwrap();
    orchestrator.add_process(process.clone()).unwrap();
    orchestrator
        .add_link(input.as_ref(), process.as_ref())
        .unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(process.last(), Some(ticker_event()));
}

#[tokio::test]
async fn add_input_rejects_duplicate_ids() {
    let (orchestrator, _errors) = Orchestrator::new();

    orchestrator
        .add_input(CancellationToken::new(), Arc::new(TickerInput))
        .unwrap();
    let err = orchestrator
        .add_input(CancellationToken::new(), Arc::new(TickerInput))
        .unwrap_err();

    assert!(matches!(
        err,
        OrchestratorError::Graph(GraphError::DuplicateNode(id)) if id == "dummy-input"
    ));
}

#[tokio::test]
async fn inputs_and_processes_share_one_id_namespace() {
    let (orchestrator, _errors) = Orchestrator::new();

    orchestrator
        .add_input(CancellationToken::new(), Arc::new(TickerInput))
        .unwrap();
    let err = orchestrator
        .add_process(Arc::new(RecordingProcess::new("dummy-input")))
        .unwrap_err();

    assert!(matches!(
        err,
        OrchestratorError::Graph(GraphError::DuplicateNode(id)) if id == "dummy-input"
    ));
}

#[tokio::test]
async fn add_link_requires_registered_endpoints() {
    let (orchestrator, _errors) = Orchestrator::new();
    let input = TickerInput;
    let process = RecordingProcess::new("dummy-process");

    orchestrator
        .add_input(CancellationToken::new(), Arc::new(TickerInput))
        .unwrap();

    let err = orchestrator.add_link(&input, &process).unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::Graph(GraphError::UnknownNode(id)) if id == "dummy-process"
    ));
}

#[tokio::test(start_paused = true)]
async fn removing_a_process_surfaces_unknown_process_errors() {
    let (orchestrator, mut errors) = Orchestrator::new();
    let input = Arc::new(TickerInput);
    let process = Arc::new(RecordingProcess::new("dummy-process"));

    orchestrator
        .add_input(CancellationToken::new(), input.clone())
        .unwrap();
    orchestrator.add_process(process.clone()).unwrap();
    orchestrator
        .add_link(input.as_ref(), process.as_ref())
        .unwrap();

    assert!(orchestrator.remove_process("dummy-process").is_some());

    let err = errors.recv().await.unwrap();
    assert!(matches!(
        err,
        OrchestratorError::UnknownProcess { input, process }
            if input == "dummy-input" && process == "dummy-process"
    ));
}

#[tokio::test(start_paused = true)]
async fn process_failures_pass_through_to_the_error_stream() {
    let (orchestrator, mut errors) = Orchestrator::new();
    let input = Arc::new(BurstInput {
        id: "burst".to_string(),
        count: 1,
    });
    let process = Arc::new(FailingProcess);

    orchestrator
        .add_input(CancellationToken::new(), input.clone())
        .unwrap();
    orchestrator.add_process(process.clone()).unwrap();
    orchestrator
        .add_link(input.as_ref(), process.as_ref())
        .unwrap();

    let err = errors.recv().await.unwrap();
    assert!(matches!(
        err,
        OrchestratorError::Process {
            input,
            process,
            source: ProcessError::NonZeroExit(2),
        } if input == "burst" && process == "failing-process"
    ));
}

#[tokio::test(start_paused = true)]
async fn producer_errors_surface_on_the_error_stream() {
    let (orchestrator, mut errors) = Orchestrator::new();

    orchestrator
        .add_input(CancellationToken::new(), Arc::new(FailingInput))
        .unwrap();

    let err = errors.recv().await.unwrap();
    assert!(matches!(
        err,
        OrchestratorError::Input {
            id,
            source: InputError::Source(_),
        } if id == "failing-input"
    ));
}

#[tokio::test(start_paused = true)]
async fn concurrent_invocations_stay_bounded() {
    let (orchestrator, _errors) = Orchestrator::with_concurrency(2);
    let input = Arc::new(BurstInput {
        id: "burst".to_string(),
        count: 12,
    });
    let gate = Arc::new(GateProcess::new("gate"));

    orchestrator
        .add_input(CancellationToken::new(), input.clone())
        .unwrap();
    orchestrator.add_process(gate.clone()).unwrap();
    orchestrator.add_link(input.as_ref(), gate.as_ref()).unwrap();

    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(gate.total.load(Ordering::SeqCst), 12);
    assert!(gate.peak.load(Ordering::SeqCst) <= 2);
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_an_input() {
    let (orchestrator, mut errors) = Orchestrator::new();
    let cancel = CancellationToken::new();
    let input = Arc::new(TickerInput);
    let process = Arc::new(RecordingProcess::new("dummy-process"));

    orchestrator.add_input(cancel.clone(), input.clone()).unwrap();
    orchestrator.add_process(process.clone()).unwrap();
    orchestrator
        .add_link(input.as_ref(), process.as_ref())
        .unwrap();

    tokio::time::sleep(Duration::from_millis(250)).await;
    cancel.cancel();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let seen = process.count();
    assert!(seen >= 2);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(process.count(), seen);

    // A cancelled input winds down cleanly, without an error.
    assert!(errors.try_recv().is_err());
}
