#![forbid(unsafe_code)]

//! Editor session: the host loop the recorder runs inside.
//!
//! [`EditorSession`] owns the world, the undo history, the template host,
//! the deferred queue and one [`BatchMutationRecorder`]. Inspector actions
//! (`set_child_count`, `clear`, `generate`, `reset`, field toggles) are each
//! one transaction; [`tick`](EditorSession::tick) is one turn of the main
//! cycle and runs whatever the previous turn deferred.
//!
//! Because every entry point takes `&mut self`, a deferred task can never
//! run while a transaction is still recording.

use stackset_core::{ContainerFields, ContainerId, ContainerMut, EntityWorld, FadeMode, WorldError};

use crate::config::SessionConfig;
use crate::deferred::{CycleReport, DeferredQueue, HostCycle};
use crate::error::{MutationError, Result};
use crate::recorder::{BatchMutationRecorder, RecorderContext, TransactionReport};
use crate::template::{TemplateHost, TemplateRegistry};
use crate::undo::{GroupId, UndoError, UndoHistory, UndoHost};

/// Value of one field across several targets, for mixed-value display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldSummary<V> {
    /// Every live target has this value.
    Uniform(V),
    /// Live targets disagree.
    Mixed,
    /// No live target.
    Empty,
}

impl<V> FieldSummary<V> {
    #[must_use]
    pub fn is_mixed(&self) -> bool {
        matches!(self, Self::Mixed)
    }

    /// The shared value, if uniform.
    #[must_use]
    pub fn value(&self) -> Option<&V> {
        match self {
            Self::Uniform(v) => Some(v),
            Self::Mixed | Self::Empty => None,
        }
    }
}

/// A single-threaded editing session.
#[derive(Debug)]
pub struct EditorSession<T: TemplateHost = TemplateRegistry> {
    world: EntityWorld,
    history: UndoHistory,
    templates: T,
    deferred: DeferredQueue,
    recorder: BatchMutationRecorder,
    config: SessionConfig,
}

impl Default for EditorSession<TemplateRegistry> {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorSession<TemplateRegistry> {
    /// Create a session with default configuration and an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    #[must_use]
    pub fn with_config(config: SessionConfig) -> Self {
        Self::with_templates(config, TemplateRegistry::new())
    }
}

impl<T: TemplateHost> EditorSession<T> {
    /// Create a session over a caller-provided template host.
    pub fn with_templates(config: SessionConfig, templates: T) -> Self {
        Self {
            world: EntityWorld::new(),
            history: UndoHistory::new(config.history.clone()),
            templates,
            deferred: DeferredQueue::new(config.deferred.clone()),
            recorder: BatchMutationRecorder::new(),
            config,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[must_use]
    pub fn world(&self) -> &EntityWorld {
        &self.world
    }

    /// Direct world access. Edits made here are not recorded.
    pub fn world_mut(&mut self) -> &mut EntityWorld {
        &mut self.world
    }

    #[must_use]
    pub fn history(&self) -> &UndoHistory {
        &self.history
    }

    #[must_use]
    pub fn templates(&self) -> &T {
        &self.templates
    }

    pub fn templates_mut(&mut self) -> &mut T {
        &mut self.templates
    }

    #[must_use]
    pub fn deferred(&self) -> &DeferredQueue {
        &self.deferred
    }

    pub fn deferred_mut(&mut self) -> &mut DeferredQueue {
        &mut self.deferred
    }

    #[must_use]
    pub fn recorder(&self) -> &BatchMutationRecorder {
        &self.recorder
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // ========================================================================
    // Main cycle
    // ========================================================================

    /// Run `mutate` over `targets` as one undoable transaction.
    pub fn transact<F>(
        &mut self,
        targets: &[ContainerId],
        label: &str,
        mutate: F,
    ) -> Result<TransactionReport>
    where
        F: FnMut(&mut ContainerMut<'_>) -> std::result::Result<(), MutationError>,
    {
        let mut cx = RecorderContext::new(
            &mut self.world,
            &mut self.history,
            &self.templates,
            &mut self.deferred,
        );
        self.recorder.run_transaction(&mut cx, targets, label, mutate)
    }

    /// One turn of the main cycle: run the tasks deferred by earlier turns.
    pub fn tick(&mut self) -> CycleReport {
        let mut host = HostCycle::new(&mut self.world, &mut self.templates, &self.history);
        self.deferred.run_cycle(&mut host)
    }

    pub fn undo(&mut self) -> Option<std::result::Result<String, UndoError>> {
        self.history.undo(&mut self.world)
    }

    pub fn redo(&mut self) -> Option<std::result::Result<String, UndoError>> {
        self.history.redo(&mut self.world)
    }

    /// Seal a group left open by a failed transaction.
    pub fn collapse_open_group(&mut self, group: GroupId) -> std::result::Result<(), UndoError> {
        self.history.collapse_group(group)
    }

    /// Roll back a group left open by a failed transaction.
    pub fn revert_open_group(&mut self, group: GroupId) -> std::result::Result<(), UndoError> {
        self.history.revert_group(group, &mut self.world)
    }

    /// Drop a group left open by a failed transaction, keeping its effects.
    pub fn discard_open_group(&mut self, group: GroupId) -> std::result::Result<(), UndoError> {
        self.history.discard_group(group).map(drop)
    }

    // ========================================================================
    // Inspector actions
    // ========================================================================

    pub fn set_child_count(&mut self, targets: &[ContainerId], count: usize) -> Result<TransactionReport> {
        self.transact(targets, "Set Child Count", |c| Ok(c.set_child_count(count)?))
    }

    pub fn clear(&mut self, targets: &[ContainerId]) -> Result<TransactionReport> {
        self.transact(targets, "Clear Children", |c| Ok(c.clear_children()?))
    }

    pub fn generate(&mut self, targets: &[ContainerId]) -> Result<TransactionReport> {
        self.transact(targets, "Generate Children", |c| Ok(c.regenerate_children()?))
    }

    pub fn reset(&mut self, targets: &[ContainerId]) -> Result<TransactionReport> {
        self.transact(targets, "Reset Children", |c| Ok(c.reset_children()?))
    }

    pub fn set_interactive(&mut self, targets: &[ContainerId], interactive: bool) -> Result<TransactionReport> {
        self.transact(targets, "Set Interactive", |c| Ok(c.set_interactive(interactive)?))
    }

    pub fn set_fade(&mut self, targets: &[ContainerId], fade: FadeMode) -> Result<TransactionReport> {
        self.transact(targets, "Set Fade Mode", |c| Ok(c.set_fade(fade)?))
    }

    pub fn set_active_index(&mut self, targets: &[ContainerId], index: usize) -> Result<TransactionReport> {
        self.transact(targets, "Set Active Index", |c| Ok(c.set_active_index(index)?))
    }

    /// Instantiate a container with default fields and generated children.
    ///
    /// Not recorded in the undo history.
    pub fn create_container_with_default_layout(
        &mut self,
        name: impl Into<String>,
    ) -> std::result::Result<ContainerId, WorldError> {
        let id = self.world.spawn_container(name, ContainerFields::default());
        ContainerMut::new(&mut self.world, id)?.regenerate_children()?;
        tracing::debug!(target: "stackset.session", container = %id, "container created");
        Ok(id)
    }

    /// Summarize one field across the live `targets`.
    pub fn summarize<V, F>(&self, targets: &[ContainerId], field: F) -> FieldSummary<V>
    where
        V: PartialEq,
        F: Fn(&ContainerFields) -> V,
    {
        let mut values = targets
            .iter()
            .filter_map(|id| self.world.container(*id))
            .map(|c| field(&c.fields));
        let Some(first) = values.next() else {
            return FieldSummary::Empty;
        };
        for value in values {
            if value != first {
                return FieldSummary::Mixed;
            }
        }
        FieldSummary::Uniform(first)
    }
}
