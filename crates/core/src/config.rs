// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plain configuration records handed to input and process factories.
//!
//! Loading these from a file is the host application's business; the
//! records only promise serde compatibility and a stable `id()`.

use crate::Operation;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Connection details and supported operations for one input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputConfig {
    pub name: String,
    /// Which input implementation this record configures.
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub connection_string: String,
    /// Operations this input cares about; empty means all of them.
    #[serde(default)]
    pub operations: Vec<Operation>,
}

impl InputConfig {
    /// The ID under which the orchestrator registers this input.
    pub fn id(&self) -> &str {
        &self.name
    }
}

/// Options for one process, including an uninterpreted string map for
/// anything implementation-specific.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessConfig {
    pub name: String,
    /// Which process implementation this record configures.
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub execution_context: HashMap<String, String>,
}

impl ProcessConfig {
    /// The ID under which the orchestrator registers this process.
    pub fn id(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
