// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CRUD operation kinds carried on events.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Returned when a piece of text names no known operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown operation {0:?}")]
pub struct OperationParseError(pub String);

/// One of the basic CRUD operations on a piece of data.
///
/// Every event carries an operation, which lets inputs and processes
/// do clever things around ignoring event kinds they have no interest
/// in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Operation {
    #[default]
    Unknown,
    Create,
    Read,
    Update,
    Delete,
}

impl Operation {
    /// Canonical lowercase name for this operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Unknown => "unknown",
        }
    }

    /// Parse with the fallback used by change-data-capture inputs:
    /// text naming no known operation maps to [`Operation::Unknown`]
    /// instead of failing.
    pub fn parse_lossy(s: &str) -> Operation {
        s.parse().unwrap_or_default()
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = OperationParseError;

    /// Case-insensitive. Accepts the aliases `insert` (Create) and
    /// `remove` (Delete) alongside the canonical names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unknown" => Ok(Operation::Unknown),
            "create" | "insert" => Ok(Operation::Create),
            "read" => Ok(Operation::Read),
            "update" => Ok(Operation::Update),
            "delete" | "remove" => Ok(Operation::Delete),
            _ => Err(OperationParseError(s.to_string())),
        }
    }
}

impl Serialize for Operation {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Operation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
#[path = "operation_tests.rs"]
mod operation_tests;
