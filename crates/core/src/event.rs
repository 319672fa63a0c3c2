// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The event envelope inputs emit and processes consume.

use crate::Operation;
use serde::{Deserialize, Serialize};

/// Basic metadata describing one observed change.
///
/// Events are immutable once emitted: the router hands clones to
/// downstream workers and never rewrites a field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Where the change happened. Could be a table name, a topic, an
    /// object in some store, or anything really; it is up to both the
    /// input and the process to agree on what it means.
    pub location: String,
    pub operation: Operation,
    /// Identifier of the changed item within `location`.
    pub id: String,
    /// ID of the input which produced this event, useful for routing
    /// and flow control in downstream processes.
    pub trigger: String,
}

impl Event {
    /// The canonical JSON representation handed to processes.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod event_tests;
