//! Executor progress events and cancellation

use addonctl_core::types::{Action, AddonState, DiagnosticCode};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Step progress reported while a plan executes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutorEvent {
    /// A step is about to run
    StepStarted {
        index: usize,
        total: usize,
        addon: String,
        action: Action,
    },

    /// A step committed
    StepCommitted {
        index: usize,
        addon: String,
        action: Action,
        state: AddonState,
    },

    /// A step failed and the run stops
    StepFailed {
        index: usize,
        addon: String,
        action: Action,
        code: DiagnosticCode,
        message: String,
    },

    /// Cancellation was observed before step `index`
    Cancelled { index: usize, remaining: usize },
}

/// Receives executor events
pub trait EventSink {
    fn emit(&mut self, event: &ExecutorEvent);
}

/// Discards events
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&mut self, _event: &ExecutorEvent) {}
}

impl<F: FnMut(&ExecutorEvent)> EventSink for F {
    fn emit(&mut self, event: &ExecutorEvent) {
        self(event)
    }
}

/// Shared flag checked between plan steps
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
