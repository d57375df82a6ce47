// Copyright 2026 Flatsql Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Execution context
//!
//! Carries the cancellation flag and the worker count through every
//! operator. Per-record loops poll the flag at least once per batch; a
//! set flag unwinds as [`Error::Cancelled`] without corrupting shared
//! state (partial loads are disposed by the caller).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::core::{Error, Result};

/// Cancellation token plus scheduling parameters for one statement
#[derive(Debug, Clone)]
pub struct ExecContext {
    cancelled: Arc<AtomicBool>,
    /// Worker count for data-parallel passes
    pub cpu: usize,
}

impl ExecContext {
    pub fn new(cpu: usize) -> ExecContext {
        ExecContext {
            cancelled: Arc::new(AtomicBool::new(false)),
            cpu: cpu.max(1),
        }
    }

    /// Request cancellation; safe to call from another thread
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Error out if cancellation was requested
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Default for ExecContext {
    fn default() -> Self {
        ExecContext::new(
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        )
    }
}
