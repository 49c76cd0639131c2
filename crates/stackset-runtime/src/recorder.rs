#![forbid(unsafe_code)]

//! The batch-mutation recorder.
//!
//! [`BatchMutationRecorder::run_transaction`] applies one mutation closure to
//! a set of containers and turns everything it did into a single undo group:
//!
//! ```text
//! clear SnapshotSet ─► collect pre-mutation children of all targets
//!        │
//!        ▼
//! begin_group(label)
//!        │
//!        ▼  per target, in order
//! record_full_snapshot ─► mark dirty ─► mutate ─► defer persist (instances)
//!        │
//!        ▼
//! register_created(children not in SnapshotSet) ─► collapse_group
//! ```
//!
//! # Invariants
//!
//! 1. Exactly one group is opened per call, whatever the number of targets.
//! 2. The created-child check runs against the children of *all* targets
//!    before mutation, so a child moved between targets is not registered.
//! 3. Override persistence never runs inside the call; it is queued on the
//!    [`DeferredQueue`] and observes the collapsed group. If the group was
//!    left open by a failure, the task waits until the caller resolves it.
//!
//! # Failure Modes
//!
//! | Condition | Behavior |
//! |-----------|----------|
//! | empty `targets` / blank `label` | rejected before any snapshot |
//! | stale target | skipped, listed in `skipped_targets`, `warn` |
//! | `mutate` fails at target *k* | targets `0..=k` snapshotted, group left open, error carries its id |
//! | undo host rejects a record | propagated, group left open |
//!
//! The created-child check compares against the global pre-mutation set. A
//! child that one target already owned and that mutation hands to another
//! target is therefore never registered, even if the first target also
//! recreates a child under the same handle.

use std::collections::HashSet;

use stackset_core::{ChildId, ContainerId, ContainerMut, EntityWorld};
use tracing::{debug, debug_span, warn};
use web_time::Instant;

use crate::deferred::{DeferredHandle, DeferredQueue, DeferredTask, HostCycle};
use crate::error::{MutationError, RecorderError, Result};
use crate::template::TemplateHost;
use crate::undo::{GroupId, UndoHost};

/// Host collaborators a transaction runs against.
pub struct RecorderContext<'a> {
    pub world: &'a mut EntityWorld,
    pub undo: &'a mut dyn UndoHost,
    pub templates: &'a dyn TemplateHost,
    pub deferred: &'a mut DeferredQueue,
}

impl<'a> RecorderContext<'a> {
    pub fn new(
        world: &'a mut EntityWorld,
        undo: &'a mut dyn UndoHost,
        templates: &'a dyn TemplateHost,
        deferred: &'a mut DeferredQueue,
    ) -> Self {
        Self {
            world,
            undo,
            templates,
            deferred,
        }
    }
}

/// Outcome of a committed transaction.
#[derive(Debug, Clone)]
pub struct TransactionReport {
    /// The collapsed undo group.
    pub group: GroupId,
    pub label: String,
    /// Targets that were snapshotted and mutated.
    pub processed: usize,
    /// Targets skipped because their handle was stale.
    pub skipped_targets: Vec<ContainerId>,
    /// Children registered as created, in target then sequence order.
    pub created: Vec<ChildId>,
    /// Override-persist tasks queued for template instances.
    pub deferred: Vec<DeferredHandle>,
}

/// Records batch mutations as single undo groups.
#[derive(Debug, Default)]
pub struct BatchMutationRecorder {
    /// Children observed across all targets before mutation.
    snapshot_set: HashSet<ChildId>,
    transactions: u64,
}

impl BatchMutationRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-mutation children collected by the last call.
    #[must_use]
    pub fn snapshot_set(&self) -> &HashSet<ChildId> {
        &self.snapshot_set
    }

    /// Number of transactions committed.
    #[must_use]
    pub fn transactions(&self) -> u64 {
        self.transactions
    }

    /// Apply `mutate` to every target and record the result as one undo
    /// group labelled `label`.
    ///
    /// `mutate` may spawn and destroy children of its argument, edit its
    /// fields, and move children between targets. Effects outside the
    /// targets' children are not recorded.
    pub fn run_transaction<F>(
        &mut self,
        cx: &mut RecorderContext<'_>,
        targets: &[ContainerId],
        label: &str,
        mut mutate: F,
    ) -> Result<TransactionReport>
    where
        F: FnMut(&mut ContainerMut<'_>) -> std::result::Result<(), MutationError>,
    {
        if targets.is_empty() {
            return Err(RecorderError::EmptyTargets);
        }
        if label.trim().is_empty() {
            return Err(RecorderError::EmptyLabel);
        }

        let start = Instant::now();
        let _span = debug_span!(
            "recorder.transaction",
            label = %label,
            targets = targets.len(),
            group_id = tracing::field::Empty,
            created = tracing::field::Empty,
            duration_us = tracing::field::Empty,
        )
        .entered();

        let mut skipped_targets = Vec::new();
        self.collect_pre_mutation(cx.world, targets, &mut skipped_targets);

        let group = cx.undo.begin_group(label);
        tracing::Span::current().record("group_id", group.raw());

        let mut processed = 0;
        let mut deferred = Vec::new();
        for (index, &target) in targets.iter().enumerate() {
            let Ok(snapshot) = cx.world.snapshot_container(target) else {
                if !skipped_targets.contains(&target) {
                    warn!(target: "stackset.recorder", container = %target, "target went stale; skipped");
                    skipped_targets.push(target);
                }
                continue;
            };
            cx.undo.record_full_snapshot(snapshot)?;

            let template_instance = cx.templates.is_template_instance(&*cx.world, target);
            if !template_instance && let Some(container) = cx.world.container_mut(target) {
                container.dirty = true;
            }
            debug!(
                target: "stackset.recorder",
                container = %target,
                template_instance,
                "target snapshotted"
            );

            let mut view = ContainerMut::new(&mut *cx.world, target)?;
            if let Err(source) = mutate(&mut view) {
                warn!(
                    target: "stackset.recorder",
                    container = %target,
                    index,
                    group = %group,
                    error = %source,
                    "mutation failed; group left open"
                );
                return Err(RecorderError::Mutation {
                    index,
                    container: target,
                    group,
                    source,
                });
            }
            processed += 1;

            if template_instance {
                deferred.push(schedule_persist(cx.deferred, target));
            }
        }

        let created = self.collect_created(cx.world, targets);
        for &child in &created {
            cx.undo.register_created(child)?;
        }
        cx.undo.collapse_group(group)?;
        self.transactions += 1;

        let duration_us = start.elapsed().as_micros() as u64;
        let span = tracing::Span::current();
        span.record("created", created.len());
        span.record("duration_us", duration_us);
        debug!(
            target: "stackset.recorder",
            group = %group,
            processed,
            created = created.len(),
            deferred = deferred.len(),
            duration_us,
            "group collapsed"
        );

        Ok(TransactionReport {
            group,
            label: label.to_string(),
            processed,
            skipped_targets,
            created,
            deferred,
        })
    }

    /// Rebuild the snapshot set from every live child of every live target.
    fn collect_pre_mutation(
        &mut self,
        world: &EntityWorld,
        targets: &[ContainerId],
        skipped: &mut Vec<ContainerId>,
    ) {
        self.snapshot_set.clear();
        for &target in targets {
            match world.children_of(target) {
                Ok(children) => self.snapshot_set.extend(
                    children
                        .iter()
                        .copied()
                        .filter(|c| !c.is_null() && world.is_live_child(*c)),
                ),
                Err(err) => {
                    if !skipped.contains(&target) {
                        warn!(target: "stackset.recorder", container = %target, error = %err, "invalid target skipped");
                        skipped.push(target);
                    }
                }
            }
        }
    }

    /// Post-mutation children of all targets that were not seen before.
    fn collect_created(&self, world: &EntityWorld, targets: &[ContainerId]) -> Vec<ChildId> {
        let mut created = Vec::new();
        let mut seen = HashSet::new();
        for &target in targets {
            let Ok(children) = world.children_of(target) else {
                continue;
            };
            for &child in children {
                if !self.snapshot_set.contains(&child) && seen.insert(child) {
                    created.push(child);
                }
            }
        }
        created
    }
}

/// Queue persistence of `target`'s overrides for the next host cycle.
fn schedule_persist(queue: &mut DeferredQueue, target: ContainerId) -> DeferredHandle {
    queue.defer(&format!("persist overrides {target}"), persist_task(target))
}

/// Persist `target`'s overrides once no undo group is open.
///
/// While a group is open the task postpones itself by one cycle under the
/// same handle; it runs once the group is collapsed, reverted or discarded.
fn persist_task(target: ContainerId) -> DeferredTask {
    Box::new(move |cycle: &mut HostCycle<'_>| {
        if let Some(open) = cycle.undo.open_group() {
            debug!(target: "stackset.recorder", container = %target, group = %open, "group still open; persist postponed");
            cycle.requeue(persist_task(target));
            return;
        }
        match cycle.templates.persist_overrides(&*cycle.world, target) {
            Ok(Some(overrides)) => debug!(
                target: "stackset.recorder",
                container = %target,
                overrides = overrides.len(),
                "overrides persisted"
            ),
            Ok(None) => debug!(target: "stackset.recorder", container = %target, "stale handle; persist skipped"),
            Err(err) => warn!(target: "stackset.recorder", container = %target, error = %err, "override persist failed"),
        }
    })
}
