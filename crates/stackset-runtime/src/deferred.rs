#![forbid(unsafe_code)]

//! Deferred tasks that run on the next host cycle.
//!
//! Work that must observe finalized undo bookkeeping (override persistence
//! in particular) is not run inline. It is queued on a [`DeferredQueue`] and
//! executed by the next [`run_cycle`](DeferredQueue::run_cycle), after the
//! transaction that queued it has returned.
//!
//! # Invariants
//!
//! 1. Tasks run in the order they were queued.
//! 2. A task queued while a cycle is running (through
//!    [`HostCycle::defer`]) runs no earlier than the following cycle.
//! 3. A task whose [`DeferredHandle`] was cancelled before its turn never
//!    runs.
//! 4. At most `max_tasks_per_cycle` tasks run per cycle; the rest carry over
//!    in order.
//!
//! # Failure Modes
//!
//! - **Task panics during a cycle**: remaining tasks are still run and
//!   follow-ups are still queued. The first panic is re-raised after the
//!   cycle completes.

use std::collections::VecDeque;
use std::fmt;

use stackset_core::EntityWorld;
use tracing::{debug, debug_span};
use web_time::Instant;

use crate::cancellation::{CancellationSource, CancellationToken};
use crate::template::TemplateHost;
use crate::undo::UndoHost;

/// A unit of deferred work.
pub type DeferredTask = Box<dyn FnOnce(&mut HostCycle<'_>)>;

/// Configuration for the deferred queue.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config-files", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config-files", serde(default))]
pub struct DeferredConfig {
    /// Maximum number of tasks executed in one cycle.
    pub max_tasks_per_cycle: usize,
}

impl Default for DeferredConfig {
    fn default() -> Self {
        Self {
            max_tasks_per_cycle: 256,
        }
    }
}

impl DeferredConfig {
    /// Create a configuration with a custom per-cycle cap.
    #[must_use]
    pub fn new(max_tasks_per_cycle: usize) -> Self {
        Self {
            max_tasks_per_cycle,
        }
    }
}

/// Handle to a queued task.
#[derive(Debug, Clone)]
pub struct DeferredHandle {
    label: String,
    source: CancellationSource,
}

impl DeferredHandle {
    /// Label the task was queued with.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Prevent the task from running. No effect once it has run.
    pub fn cancel(&self) {
        self.source.cancel();
    }

    /// Whether [`cancel`](Self::cancel) was called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.source.is_cancelled()
    }
}

struct DeferredEntry {
    label: String,
    token: CancellationToken,
    task: DeferredTask,
}

impl DeferredEntry {
    fn new(label: &str, task: DeferredTask) -> (Self, DeferredHandle) {
        let source = CancellationSource::new();
        let entry = Self {
            label: label.to_string(),
            token: source.token(),
            task,
        };
        let handle = DeferredHandle {
            label: label.to_string(),
            source,
        };
        (entry, handle)
    }
}

/// The host state a deferred task may touch during one cycle.
pub struct HostCycle<'a> {
    pub world: &'a mut EntityWorld,
    pub templates: &'a mut dyn TemplateHost,
    pub undo: &'a dyn UndoHost,
    cycle: u64,
    current: Option<(String, CancellationToken)>,
    followups: Vec<DeferredEntry>,
}

impl<'a> HostCycle<'a> {
    /// Borrow the host state for one cycle.
    pub fn new(
        world: &'a mut EntityWorld,
        templates: &'a mut dyn TemplateHost,
        undo: &'a dyn UndoHost,
    ) -> Self {
        Self {
            world,
            templates,
            undo,
            cycle: 0,
            current: None,
            followups: Vec::new(),
        }
    }

    /// Number of the cycle currently running (1-based, 0 before any cycle).
    #[must_use]
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Queue a follow-up task for the next cycle.
    pub fn defer(
        &mut self,
        label: &str,
        task: impl FnOnce(&mut HostCycle<'_>) + 'static,
    ) -> DeferredHandle {
        let (entry, handle) = DeferredEntry::new(label, Box::new(task));
        self.followups.push(entry);
        handle
    }

    /// Postpone the running task: `task` runs on the next cycle under the
    /// same label and handle, so cancelling the original handle still
    /// applies. Returns `false` when no task is running.
    pub fn requeue(&mut self, task: impl FnOnce(&mut HostCycle<'_>) + 'static) -> bool {
        let Some((label, token)) = self.current.clone() else {
            return false;
        };
        self.followups.push(DeferredEntry {
            label,
            token,
            task: Box::new(task),
        });
        true
    }
}

impl fmt::Debug for HostCycle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostCycle")
            .field("cycle", &self.cycle)
            .field("followups", &self.followups.len())
            .finish_non_exhaustive()
    }
}

/// Outcome of one [`DeferredQueue::run_cycle`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Cycle number.
    pub cycle: u64,
    /// Tasks executed (including ones that panicked).
    pub ran: usize,
    /// Cancelled tasks dropped without running.
    pub cancelled: usize,
    /// Tasks that panicked.
    pub panicked: usize,
    /// Tasks left for the next cycle because of the per-cycle cap.
    pub carried_over: usize,
    /// Follow-ups queued by tasks during this cycle.
    pub deferred: usize,
}

/// FIFO queue of cancellable tasks with next-cycle semantics.
pub struct DeferredQueue {
    pending: VecDeque<DeferredEntry>,
    config: DeferredConfig,
    cycle: u64,
}

impl fmt::Debug for DeferredQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredQueue")
            .field("pending", &self.pending.len())
            .field("cycle", &self.cycle)
            .field("config", &self.config)
            .finish()
    }
}

impl Default for DeferredQueue {
    fn default() -> Self {
        Self::new(DeferredConfig::default())
    }
}

impl DeferredQueue {
    #[must_use]
    pub fn new(config: DeferredConfig) -> Self {
        Self {
            pending: VecDeque::new(),
            config,
            cycle: 0,
        }
    }

    /// Queue `task` for the next cycle.
    pub fn defer(
        &mut self,
        label: &str,
        task: impl FnOnce(&mut HostCycle<'_>) + 'static,
    ) -> DeferredHandle {
        let (entry, handle) = DeferredEntry::new(label, Box::new(task));
        debug!(target: "stackset.deferred", label, "task queued");
        self.pending.push_back(entry);
        handle
    }

    /// Number of queued tasks, cancelled ones included.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Labels of queued tasks, in run order.
    pub fn pending_labels(&self) -> Vec<&str> {
        self.pending.iter().map(|e| e.label.as_str()).collect()
    }

    /// Number of cycles run so far.
    #[must_use]
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    #[must_use]
    pub fn config(&self) -> &DeferredConfig {
        &self.config
    }

    /// Drop every queued task without running it. Returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    /// Run one host cycle.
    pub fn run_cycle(&mut self, host: &mut HostCycle<'_>) -> CycleReport {
        self.cycle += 1;
        host.cycle = self.cycle;
        let mut report = CycleReport {
            cycle: self.cycle,
            ..CycleReport::default()
        };
        if self.pending.is_empty() {
            return report;
        }

        let start = Instant::now();
        let _span = debug_span!(
            "deferred.cycle",
            cycle = self.cycle,
            queued = self.pending.len(),
            ran = tracing::field::Empty,
            cancelled = tracing::field::Empty,
            carried_over = tracing::field::Empty,
            duration_us = tracing::field::Empty,
        )
        .entered();

        // If a task panics, we still run the rest.
        let mut first_panic: Option<Box<dyn std::any::Any + Send>> = None;
        while report.ran < self.config.max_tasks_per_cycle {
            let Some(entry) = self.pending.pop_front() else {
                break;
            };
            if entry.token.is_cancelled() {
                report.cancelled += 1;
                debug!(target: "stackset.deferred", label = %entry.label, "cancelled task dropped");
                continue;
            }
            report.ran += 1;
            host.current = Some((entry.label.clone(), entry.token.clone()));
            let task = entry.task;
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| task(&mut *host)));
            host.current = None;
            if let Err(payload) = result {
                report.panicked += 1;
                tracing::warn!(target: "stackset.deferred", label = %entry.label, "deferred task panicked");
                if first_panic.is_none() {
                    first_panic = Some(payload);
                }
            }
        }

        report.carried_over = self.pending.len();
        report.deferred = host.followups.len();
        self.pending.extend(host.followups.drain(..));

        let duration_us = start.elapsed().as_micros() as u64;
        let span = tracing::Span::current();
        span.record("ran", report.ran);
        span.record("cancelled", report.cancelled);
        span.record("carried_over", report.carried_over);
        span.record("duration_us", duration_us);
        debug!(
            target: "stackset.deferred",
            cycle = report.cycle,
            ran = report.ran,
            cancelled = report.cancelled,
            carried_over = report.carried_over,
            duration_us,
            "deferred cycle completed"
        );

        if let Some(payload) = first_panic {
            std::panic::resume_unwind(payload);
        }
        report
    }
}
