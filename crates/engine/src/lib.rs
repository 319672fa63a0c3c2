// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! weir-engine: the event router at the heart of weir.
//!
//! An [`Orchestrator`] holds a directed acyclic graph whose vertices
//! are input and process IDs and whose edges say "events from here run
//! work over there". Registered inputs stream events into per-input
//! sinks; the router drains each sink, fans every event out to the
//! input's direct successors, and runs those processes under a global
//! concurrency bound. Failures anywhere downstream surface on a single
//! error stream handed out at construction:
//!
//! ```ignore
//! let (orchestrator, mut errors) = Orchestrator::new();
//!
//! orchestrator.add_input(CancellationToken::new(), input)?;
//! orchestrator.add_process(process)?;
//! orchestrator.add_link(&*input, &*process)?;
//!
//! while let Some(err) = errors.recv().await {
//!     tracing::error!(error = %err, "pipeline failure");
//! }
//! ```

pub mod graph;
pub mod orchestrator;

pub use graph::{Dag, GraphError};
pub use orchestrator::{Orchestrator, OrchestratorError, DEFAULT_CONCURRENT_PROCESSORS};
