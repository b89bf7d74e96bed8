// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Progress and error encoding for slot streams.
//!
//! Progress is CSV rows `<fraction>,<description>` on the `state`
//! stream; the terminal row is `1,done!`. Failures are a single JSON
//! object `{"error": …}` on the `err` stream.

use std::sync::Arc;

use outpost_core::Broadcast;
use parking_lot::Mutex;
use tracing::debug;

/// Number of progress steps from trigger to done.
pub(crate) const TOTAL_STEPS: u32 = 7;

/// CSV progress encoder over the slot's `state` stream. Also remembers
/// the latest description, which names the phase in deadline errors.
pub(crate) struct Progress {
    stream: Arc<Broadcast>,
    phase: Mutex<&'static str>,
}

impl Progress {
    pub fn new(stream: Arc<Broadcast>) -> Self {
        Self { stream, phase: Mutex::new("idle") }
    }

    pub fn step(&self, step: u32, description: &'static str) {
        *self.phase.lock() = description;
        let fraction = f64::from(step) / f64::from(TOTAL_STEPS);
        let row = format!("{},{}\n", fraction, description);
        if let Err(e) = self.stream.write(row.as_bytes()) {
            debug!(error = %e, "progress row dropped");
        }
    }

    pub fn phase(&self) -> &'static str {
        *self.phase.lock()
    }

    pub fn close(&self) {
        self.stream.close();
    }
}

/// Encode a failure onto an `err` stream. The message surfaces the
/// lowest-level cause verbatim.
pub(crate) fn write_error(stream: &Broadcast, message: &str) {
    let payload = serde_json::json!({ "error": message });
    if let Err(e) = stream.write(format!("{payload}\n").as_bytes()) {
        debug!(error = %e, "error row dropped");
    }
}

#[cfg(test)]
#[path = "progress_tests.rs"]
mod tests;
