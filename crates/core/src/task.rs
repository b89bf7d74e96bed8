// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task and receipt data model.
//!
//! A task says what to execute and on which hardware; a receipt is what
//! the cloud runtime hands back so the container can be found, described
//! and killed later. Both round-trip unknown fields so driver-specific
//! data survives the orchestrator untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// What will be executed. The type is usually `docker`; the name is an
/// image reference in some registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Image {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

/// Required capabilities; the driver picks where the container runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Caps {
    #[serde(default)]
    pub cpu: i64,
    #[serde(default)]
    pub ram: i64,
    #[serde(default)]
    pub gpu: i64,
}

/// What should be executed, on which hardware.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Image>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caps: Option<Caps>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Task {
    /// Decode a task blob, requiring at minimum a non-empty id.
    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        use serde::de::Error;
        let task: Task = serde_json::from_slice(bytes)?;
        if task.id.is_empty() {
            return Err(serde_json::Error::custom("task is missing an id"));
        }
        Ok(task)
    }
}

/// Record of a spawned remote container.
///
/// `addr` is where its file service listens (filled in once the runtime
/// reports a network address); `name` is the driver's identifier for the
/// container. `slot` records which slot spawned it so recovery can claim
/// the same id back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    #[serde(default)]
    pub addr: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Receipt {
    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Stable short identifier used as the receipt-store filename.
    /// Equal receipts hash equally: field order is fixed by the struct
    /// and the extra map is key-ordered.
    pub fn hash(&self) -> Result<String, serde_json::Error> {
        let digest = Sha256::digest(self.encode()?);
        Ok(digest.iter().take(8).map(|b| format!("{b:02x}")).collect())
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
