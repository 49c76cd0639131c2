#![forbid(unsafe_code)]

//! In-memory undo history of collapsed groups.
//!
//! [`UndoHistory`] implements [`UndoHost`] and keeps dual stacks of sealed
//! [`UndoGroup`]s with:
//!
//! - **Memory limits**: oldest groups evicted when the byte budget is exceeded
//! - **Depth limits**: maximum number of groups in undo history
//! - **Branch handling**: committing a new group clears the redo stack
//! - **Partial groups**: an open group can be discarded or reverted in place
//!
//! # Invariants
//!
//! 1. `total_bytes` equals the sum of `size_bytes()` over both stacks
//! 2. `undo_stack.len() <= config.max_depth` after any commit
//! 3. `total_bytes <= config.max_bytes` after any operation, if enforced
//! 4. At most one group is open; undo and redo refuse to run while it is
//!
//! # Failure Modes
//!
//! | Condition | Behavior |
//! |-----------|----------|
//! | record without open group | `UndoError::NoOpenGroup` |
//! | collapse with wrong id | `UndoError::UnknownGroup`, group stays open |
//! | undo/redo while open | `UndoError::GroupStillOpen`, stacks untouched |
//! | `begin_group` while open | open group sealed (or dropped if empty), `warn` |
//!
//! ```text
//! collapse(g3)
//! ┌───────────────────────────────────────────────┐
//! │ Undo Stack: [g1, g2, g3]                      │
//! │ Redo Stack: []                                │
//! └───────────────────────────────────────────────┘
//!
//! undo(world)
//! ┌───────────────────────────────────────────────┐
//! │ Undo Stack: [g1, g2]                          │
//! │ Redo Stack: [g3]                              │
//! └───────────────────────────────────────────────┘
//! ```

use std::collections::VecDeque;
use std::fmt;

use stackset_core::{ChildId, ContainerSnapshot, EntityWorld};

use super::group::UndoGroup;
use super::host::{GroupId, UndoError, UndoHost};

/// Configuration for the undo history.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config-files", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config-files", serde(default))]
pub struct HistoryConfig {
    /// Maximum number of groups to keep in undo history.
    pub max_depth: usize,
    /// Maximum total bytes for all groups (0 = unlimited).
    pub max_bytes: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_depth: 100,
            max_bytes: 10 * 1024 * 1024,
        }
    }
}

impl HistoryConfig {
    /// Create a configuration with custom limits.
    #[must_use]
    pub fn new(max_depth: usize, max_bytes: usize) -> Self {
        Self {
            max_depth,
            max_bytes,
        }
    }

    /// Create unlimited configuration (for testing).
    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            max_depth: usize::MAX,
            max_bytes: 0,
        }
    }
}

/// Undo/redo history of collapsed groups.
pub struct UndoHistory {
    /// Groups available for undo (newest at back).
    undo_stack: VecDeque<UndoGroup>,
    /// Groups available for redo (newest at back).
    redo_stack: VecDeque<UndoGroup>,
    /// The group between `begin_group` and `collapse_group`.
    open: Option<UndoGroup>,
    /// Last issued group id.
    last_group: u64,
    config: HistoryConfig,
    total_bytes: usize,
}

impl fmt::Debug for UndoHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UndoHistory")
            .field("undo_depth", &self.undo_stack.len())
            .field("redo_depth", &self.redo_stack.len())
            .field("open", &self.open.as_ref().map(UndoGroup::id))
            .field("total_bytes", &self.total_bytes)
            .field("config", &self.config)
            .finish()
    }
}

impl Default for UndoHistory {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}

impl UndoHistory {
    /// Create an empty history with the given configuration.
    #[must_use]
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            open: None,
            last_group: 0,
            config,
            total_bytes: 0,
        }
    }

    // ========================================================================
    // Core Operations
    // ========================================================================

    /// Reverse the most recent group.
    ///
    /// # Returns
    ///
    /// - `Ok(label)` if undo succeeded
    /// - `Err(GroupStillOpen)` if a group is open (stacks untouched)
    /// - `None` if there is nothing to undo
    pub fn undo(&mut self, world: &mut EntityWorld) -> Option<Result<String, UndoError>> {
        if let Some(open) = &self.open {
            return Some(Err(UndoError::GroupStillOpen(open.id())));
        }
        let mut group = self.undo_stack.pop_back()?;
        let old_size = group.size_bytes();
        group.revert(world);
        self.total_bytes = self.total_bytes.saturating_sub(old_size) + group.size_bytes();

        let label = group.label().to_string();
        tracing::debug!(
            target: "stackset.undo",
            group = %group.id(),
            label = %label,
            "undo.apply"
        );
        self.redo_stack.push_back(group);
        self.enforce_limits();
        Some(Ok(label))
    }

    /// Re-apply the most recently undone group.
    ///
    /// # Returns
    ///
    /// - `Ok(label)` if redo succeeded
    /// - `Err(GroupStillOpen)` if a group is open (stacks untouched)
    /// - `None` if there is nothing to redo
    pub fn redo(&mut self, world: &mut EntityWorld) -> Option<Result<String, UndoError>> {
        if let Some(open) = &self.open {
            return Some(Err(UndoError::GroupStillOpen(open.id())));
        }
        let mut group = self.redo_stack.pop_back()?;
        group.replay(world);

        let label = group.label().to_string();
        tracing::debug!(
            target: "stackset.undo",
            group = %group.id(),
            label = %label,
            "redo.apply"
        );
        self.undo_stack.push_back(group);
        Some(Ok(label))
    }

    /// Drop the open group without touching the world.
    pub fn discard_group(&mut self, group: GroupId) -> Result<UndoGroup, UndoError> {
        let open = self.take_open(group)?;
        tracing::debug!(target: "stackset.undo", group = %group, entries = open.len(), "group discarded");
        Ok(open)
    }

    /// Reverse the open group in place and drop it.
    ///
    /// Used when a transaction failed part-way and the caller wants the
    /// world back at its pre-transaction state. No redo entry is created.
    pub fn revert_group(&mut self, group: GroupId, world: &mut EntityWorld) -> Result<(), UndoError> {
        let mut open = self.take_open(group)?;
        open.revert(world);
        tracing::debug!(target: "stackset.undo", group = %group, entries = open.len(), "group reverted");
        Ok(())
    }

    /// Check if undo is available.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Check if redo is available.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    // ========================================================================
    // Info
    // ========================================================================

    /// Get the undo stack depth.
    #[must_use]
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Get the redo stack depth.
    #[must_use]
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Labels of undoable groups (most recent first).
    pub fn undo_labels(&self, limit: usize) -> Vec<&str> {
        self.undo_stack
            .iter()
            .rev()
            .take(limit)
            .map(UndoGroup::label)
            .collect()
    }

    /// Labels of redoable groups (most recent first).
    pub fn redo_labels(&self, limit: usize) -> Vec<&str> {
        self.redo_stack
            .iter()
            .rev()
            .take(limit)
            .map(UndoGroup::label)
            .collect()
    }

    /// Label of the next group to undo.
    #[must_use]
    pub fn next_undo_label(&self) -> Option<&str> {
        self.undo_stack.back().map(UndoGroup::label)
    }

    /// Label of the next group to redo.
    #[must_use]
    pub fn next_redo_label(&self) -> Option<&str> {
        self.redo_stack.back().map(UndoGroup::label)
    }

    /// The next group to undo.
    #[must_use]
    pub fn peek_undo(&self) -> Option<&UndoGroup> {
        self.undo_stack.back()
    }

    /// The open group, if any.
    #[must_use]
    pub fn pending(&self) -> Option<&UndoGroup> {
        self.open.as_ref()
    }

    /// Get total memory usage in bytes.
    #[must_use]
    pub fn memory_usage(&self) -> usize {
        self.total_bytes
    }

    /// Get the current configuration.
    #[must_use]
    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Clear all history, including any open group.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.open = None;
        self.total_bytes = 0;
    }

    fn clear_redo(&mut self) {
        for group in self.redo_stack.drain(..) {
            self.total_bytes = self.total_bytes.saturating_sub(group.size_bytes());
        }
    }

    fn take_open(&mut self, group: GroupId) -> Result<UndoGroup, UndoError> {
        match &self.open {
            None => Err(UndoError::NoOpenGroup),
            Some(open) if open.id() != group => Err(UndoError::UnknownGroup(group)),
            Some(_) => self.open.take().ok_or(UndoError::NoOpenGroup),
        }
    }

    fn open_mut(&mut self) -> Result<&mut UndoGroup, UndoError> {
        self.open.as_mut().ok_or(UndoError::NoOpenGroup)
    }

    /// Seal a group onto the undo stack (new branch).
    fn commit(&mut self, group: UndoGroup) {
        self.clear_redo();
        self.total_bytes += group.size_bytes();
        self.undo_stack.push_back(group);
        self.enforce_limits();
    }

    /// Enforce depth and memory limits by evicting oldest groups.
    ///
    /// The newest group of each stack is never evicted: it is the step the
    /// caller just committed, or the one `redo` would re-apply next.
    fn enforce_limits(&mut self) {
        let max_depth = self.config.max_depth.max(1);
        while self.undo_stack.len() > max_depth {
            if let Some(group) = self.undo_stack.pop_front() {
                self.total_bytes = self.total_bytes.saturating_sub(group.size_bytes());
            }
        }

        if self.config.max_bytes > 0 {
            while self.total_bytes > self.config.max_bytes {
                let evicted = if self.redo_stack.len() > 1 {
                    self.redo_stack.pop_front()
                } else if self.undo_stack.len() > 1 {
                    self.undo_stack.pop_front()
                } else {
                    None
                };
                let Some(group) = evicted else {
                    tracing::warn!(
                        target: "stackset.undo",
                        total_bytes = self.total_bytes,
                        max_bytes = self.config.max_bytes,
                        "history over byte budget; newest groups kept"
                    );
                    break;
                };
                self.total_bytes = self.total_bytes.saturating_sub(group.size_bytes());
            }
        }
    }
}

impl UndoHost for UndoHistory {
    fn begin_group(&mut self, label: &str) -> GroupId {
        if let Some(stale) = self.open.take() {
            if stale.is_empty() {
                tracing::warn!(target: "stackset.undo", group = %stale.id(), "dropping empty group left open");
            } else {
                tracing::warn!(target: "stackset.undo", group = %stale.id(), "sealing group left open");
                self.commit(stale);
            }
        }
        self.last_group += 1;
        let id = GroupId::new(self.last_group);
        self.open = Some(UndoGroup::new(id, label));
        id
    }

    fn record_full_snapshot(&mut self, snapshot: ContainerSnapshot) -> Result<(), UndoError> {
        self.open_mut()?.record_snapshot(snapshot);
        Ok(())
    }

    fn register_created(&mut self, child: ChildId) -> Result<(), UndoError> {
        self.open_mut()?.register_created(child);
        Ok(())
    }

    fn collapse_group(&mut self, group: GroupId) -> Result<(), UndoError> {
        let sealed = self.take_open(group)?;
        tracing::debug!(
            target: "stackset.undo",
            group = %group,
            entries = sealed.len(),
            "group collapsed"
        );
        self.commit(sealed);
        Ok(())
    }

    fn open_group(&self) -> Option<GroupId> {
        self.open.as_ref().map(UndoGroup::id)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use stackset_core::{ContainerFields, ContainerId, ContainerMut};

    fn world_with(count: usize) -> (EntityWorld, ContainerId) {
        let mut world = EntityWorld::new();
        let id = world.spawn_container(
            "stack",
            ContainerFields {
                child_count: count,
                ..ContainerFields::default()
            },
        );
        ContainerMut::new(&mut world, id)
            .unwrap()
            .regenerate_children()
            .unwrap();
        (world, id)
    }

    /// Record a resize of `id` to `count` as one collapsed group.
    fn resize(history: &mut UndoHistory, world: &mut EntityWorld, id: ContainerId, count: usize) {
        let group = history.begin_group(&format!("resize {count}"));
        history
            .record_full_snapshot(world.snapshot_container(id).unwrap())
            .unwrap();
        let before: Vec<_> = world.children_of(id).unwrap().to_vec();
        ContainerMut::new(world, id)
            .unwrap()
            .set_child_count(count)
            .unwrap();
        for child in world.children_of(id).unwrap().to_vec() {
            if !before.contains(&child) {
                history.register_created(child).unwrap();
            }
        }
        history.collapse_group(group).unwrap();
    }

    #[test]
    fn test_new_history() {
        let history = UndoHistory::default();
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert_eq!(history.undo_depth(), 0);
        assert_eq!(history.open_group(), None);
    }

    #[test]
    fn test_group_ids_increase() {
        let mut history = UndoHistory::default();
        let a = history.begin_group("a");
        history.collapse_group(a).unwrap();
        let b = history.begin_group("b");
        assert!(b > a);
        assert_eq!(history.open_group(), Some(b));
    }

    #[test]
    fn test_record_without_open_group() {
        let (world, id) = world_with(1);
        let mut history = UndoHistory::default();
        let err = history
            .record_full_snapshot(world.snapshot_container(id).unwrap())
            .unwrap_err();
        assert_eq!(err, UndoError::NoOpenGroup);
        assert_eq!(
            history.register_created(ChildId::new(1)).unwrap_err(),
            UndoError::NoOpenGroup
        );
    }

    #[test]
    fn test_collapse_wrong_id_keeps_group_open() {
        let mut history = UndoHistory::default();
        let g = history.begin_group("edit");
        let err = history.collapse_group(GroupId::new(99)).unwrap_err();
        assert_eq!(err, UndoError::UnknownGroup(GroupId::new(99)));
        assert_eq!(history.open_group(), Some(g));
    }

    #[test]
    fn test_undo_restores_and_redo_replays() {
        let (mut world, id) = world_with(2);
        let original = world.snapshot_container(id).unwrap();
        let mut history = UndoHistory::default();

        resize(&mut history, &mut world, id, 4);
        let grown = world.snapshot_container(id).unwrap();

        assert_eq!(history.undo(&mut world).unwrap().unwrap(), "resize 4");
        assert_eq!(world.snapshot_container(id).unwrap(), original);
        assert_eq!(world.child_count(), 2);

        assert_eq!(history.redo(&mut world).unwrap().unwrap(), "resize 4");
        assert_eq!(world.snapshot_container(id).unwrap(), grown);
        assert_eq!(world.child_count(), 4);
    }

    #[test]
    fn test_undo_refused_while_open() {
        let (mut world, id) = world_with(1);
        let mut history = UndoHistory::default();
        resize(&mut history, &mut world, id, 2);
        let open = history.begin_group("pending");

        let err = history.undo(&mut world).unwrap().unwrap_err();
        assert_eq!(err, UndoError::GroupStillOpen(open));
        assert_eq!(history.undo_depth(), 1);
    }

    #[test]
    fn test_begin_seals_non_empty_open_group() {
        let (world, id) = world_with(1);
        let mut history = UndoHistory::default();
        history.begin_group("first");
        history
            .record_full_snapshot(world.snapshot_container(id).unwrap())
            .unwrap();
        history.begin_group("second");
        assert_eq!(history.undo_depth(), 1);
        assert_eq!(history.next_undo_label(), Some("first"));
    }

    #[test]
    fn test_begin_drops_empty_open_group() {
        let mut history = UndoHistory::default();
        history.begin_group("first");
        history.begin_group("second");
        assert_eq!(history.undo_depth(), 0);
    }

    #[test]
    fn test_commit_clears_redo() {
        let (mut world, id) = world_with(1);
        let mut history = UndoHistory::default();
        resize(&mut history, &mut world, id, 2);
        history.undo(&mut world);
        assert!(history.can_redo());

        resize(&mut history, &mut world, id, 3);
        assert!(!history.can_redo());
        assert_eq!(history.redo_depth(), 0);
    }

    #[test]
    fn test_max_depth_enforced() {
        let (mut world, id) = world_with(1);
        let mut history = UndoHistory::new(HistoryConfig::new(3, 0));
        for count in 2..7 {
            resize(&mut history, &mut world, id, count);
        }
        assert_eq!(history.undo_depth(), 3);
        assert_eq!(history.undo_labels(5), vec!["resize 6", "resize 5", "resize 4"]);
    }

    #[test]
    fn test_memory_byte_limit_evicts_old_groups() {
        let (mut world, id) = world_with(1);
        let mut history = UndoHistory::new(HistoryConfig::new(100, 1));
        for count in 2..7 {
            resize(&mut history, &mut world, id, count);
        }
        assert_eq!(history.undo_depth(), 1);
        assert_eq!(history.next_undo_label(), Some("resize 6"));
        assert!(history.memory_usage() > 1);
    }

    #[test]
    fn test_byte_budget_keeps_committed_group() {
        let (mut world, id) = world_with(1);
        let before = world.snapshot_container(id).unwrap();
        let mut history = UndoHistory::new(HistoryConfig::new(100, 64));
        resize(&mut history, &mut world, id, 4);
        assert_eq!(history.undo_depth(), 1);
        assert!(history.memory_usage() > 64);

        assert_eq!(history.undo(&mut world).unwrap().unwrap(), "resize 4");
        assert_eq!(world.snapshot_container(id).unwrap(), before);
        assert_eq!(history.redo_depth(), 1);

        assert_eq!(history.redo(&mut world).unwrap().unwrap(), "resize 4");
        assert_eq!(world.children_of(id).unwrap().len(), 4);
    }

    #[test]
    fn test_zero_depth_still_keeps_newest_group() {
        let (mut world, id) = world_with(1);
        let mut history = UndoHistory::new(HistoryConfig::new(0, 0));
        resize(&mut history, &mut world, id, 2);
        resize(&mut history, &mut world, id, 3);
        assert_eq!(history.undo_depth(), 1);
        assert_eq!(history.next_undo_label(), Some("resize 3"));
    }

    #[test]
    fn test_memory_tracking() {
        let (mut world, id) = world_with(1);
        let mut history = UndoHistory::new(HistoryConfig::unlimited());
        assert_eq!(history.memory_usage(), 0);

        resize(&mut history, &mut world, id, 2);
        let after_first = history.memory_usage();
        assert!(after_first > 0);

        resize(&mut history, &mut world, id, 3);
        assert!(history.memory_usage() > after_first);

        history.clear();
        assert_eq!(history.memory_usage(), 0);
    }

    #[test]
    fn test_discard_group_leaves_world_alone() {
        let (mut world, id) = world_with(2);
        let mut history = UndoHistory::default();
        let g = history.begin_group("edit");
        history
            .record_full_snapshot(world.snapshot_container(id).unwrap())
            .unwrap();
        ContainerMut::new(&mut world, id)
            .unwrap()
            .clear_children()
            .unwrap();

        let dropped = history.discard_group(g).unwrap();
        assert_eq!(dropped.len(), 1);
        assert_eq!(history.open_group(), None);
        assert!(!history.can_undo());
        assert!(world.children_of(id).unwrap().is_empty());
    }

    #[test]
    fn test_revert_group_restores_without_redo() {
        let (mut world, id) = world_with(2);
        let original = world.snapshot_container(id).unwrap();
        let mut history = UndoHistory::default();
        let g = history.begin_group("edit");
        history.record_full_snapshot(original.clone()).unwrap();
        ContainerMut::new(&mut world, id)
            .unwrap()
            .clear_children()
            .unwrap();

        history.revert_group(g, &mut world).unwrap();
        assert_eq!(world.snapshot_container(id).unwrap(), original);
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_labels_and_peek() {
        let (mut world, id) = world_with(1);
        let mut history = UndoHistory::default();
        resize(&mut history, &mut world, id, 2);
        resize(&mut history, &mut world, id, 3);

        assert_eq!(history.next_undo_label(), Some("resize 3"));
        assert_eq!(history.peek_undo().unwrap().created().count(), 1);
        history.undo(&mut world);
        assert_eq!(history.next_redo_label(), Some("resize 3"));
        assert_eq!(history.redo_labels(1), vec!["resize 3"]);
    }

    #[test]
    fn test_undo_redo_on_empty_history() {
        let mut world = EntityWorld::new();
        let mut history = UndoHistory::default();
        assert!(history.undo(&mut world).is_none());
        assert!(history.redo(&mut world).is_none());
    }

    #[test]
    fn test_config_default_and_unlimited() {
        let config = HistoryConfig::default();
        assert_eq!(config.max_depth, 100);
        assert_eq!(config.max_bytes, 10 * 1024 * 1024);
        let unlimited = HistoryConfig::unlimited();
        assert_eq!(unlimited.max_depth, usize::MAX);
        assert_eq!(unlimited.max_bytes, 0);
    }

    #[test]
    fn test_debug_impl() {
        let history = UndoHistory::default();
        let debug_str = format!("{history:?}");
        assert!(debug_str.contains("UndoHistory"));
        assert!(debug_str.contains("undo_depth"));
    }
}
