#![forbid(unsafe_code)]

//! End-to-end tests for batch transactions through an [`EditorSession`].
//!
//! Validates:
//! - Grow / clear / regenerate transactions reverse exactly
//! - One undo group per call regardless of target count
//! - Children moved between targets are not registered as created
//! - Template instances get exactly one deferred override persist
//! - Mid-transaction failures leave the group open for the caller
//! - Redo, cancellation, stale persist, and depth limits
//! - JSONL structured logging for each step

use std::cell::RefCell;
use std::rc::Rc;

use stackset_core::{ContainerFields, ContainerId, ContainerSnapshot, EntityWorld, WorldError};
use stackset_runtime::template::paths;
use stackset_runtime::{
    EditorSession, HistoryConfig, OverrideSet, OverrideValue, RecorderError, SessionConfig,
    TemplateError, TemplateHost, UndoHost, mutation_error,
};

// ============================================================================
// JSONL log entry
// ============================================================================

#[derive(Debug, serde::Serialize)]
struct LogEntry<'a> {
    event: &'static str,
    step: &'a str,
    undo_depth: usize,
    redo_depth: usize,
    children: usize,
}

fn log_step<T: TemplateHost>(session: &EditorSession<T>, step: &str) {
    let entry = LogEntry {
        event: "batch_transaction",
        step,
        undo_depth: session.history().undo_depth(),
        redo_depth: session.history().redo_depth(),
        children: session.world().child_count(),
    };
    eprintln!("{}", serde_json::to_string(&entry).unwrap());
}

// ============================================================================
// Helpers
// ============================================================================

fn container(session: &mut EditorSession, name: &str, count: usize) -> ContainerId {
    let id = session.create_container_with_default_layout(name).unwrap();
    if count != ContainerFields::default().child_count {
        let world = session.world_mut();
        let mut view = stackset_core::ContainerMut::new(world, id).unwrap();
        view.set_child_count(count).unwrap();
    }
    session.world_mut().container_mut(id).unwrap().dirty = false;
    id
}

fn snapshot<T: TemplateHost>(session: &EditorSession<T>, id: ContainerId) -> ContainerSnapshot {
    session.world().snapshot_container(id).unwrap()
}

fn assert_consistent<T: TemplateHost>(session: &EditorSession<T>) {
    let errors = session.world().validate();
    assert!(errors.is_empty(), "world inconsistent: {errors:?}");
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn grow_two_children_to_four_then_undo() {
    let mut session = EditorSession::new();
    let id = container(&mut session, "stack", 2);
    let before = snapshot(&session, id);
    let original_children = before.child_ids().collect::<Vec<_>>();

    let report = session.set_child_count(&[id], 4).unwrap();
    assert_eq!(report.created.len(), 2);
    assert_eq!(session.world().children_of(id).unwrap().len(), 4);
    log_step(&session, "grow");

    assert_eq!(session.undo().unwrap().unwrap(), "Set Child Count");
    log_step(&session, "undo");
    assert_eq!(session.world().children_of(id).unwrap(), original_children.as_slice());
    assert_eq!(snapshot(&session, id), before);
    assert_eq!(session.world().child_count(), 2);
    assert!(report.created.iter().all(|c| !session.world().is_live_child(*c)));
    assert_consistent(&session);
}

#[test]
fn clear_two_containers_then_undo() {
    let mut session = EditorSession::new();
    let a = container(&mut session, "a", 1);
    let b = container(&mut session, "b", 1);
    let (before_a, before_b) = (snapshot(&session, a), snapshot(&session, b));

    let report = session.clear(&[a, b]).unwrap();
    assert_eq!(report.processed, 2);
    assert!(report.created.is_empty());
    assert_eq!(session.world().child_count(), 0);
    assert_eq!(session.history().undo_depth(), 1);
    log_step(&session, "clear");

    session.undo().unwrap().unwrap();
    log_step(&session, "undo");
    assert_eq!(snapshot(&session, a), before_a);
    assert_eq!(snapshot(&session, b), before_b);
    assert_eq!(session.world().child_count(), 2);
    assert_consistent(&session);
}

#[test]
fn template_instance_persists_once_after_commit() {
    let mut session = EditorSession::new();
    let id = container(&mut session, "card", 3);
    let template = session
        .templates_mut()
        .register_template("card", ContainerFields::default());
    session.templates_mut().link_instance(id, template).unwrap();

    let report = session.set_interactive(&[id], false).unwrap();
    assert_eq!(report.deferred.len(), 1);
    assert_eq!(session.deferred().pending_count(), 1);
    assert_eq!(session.templates().persist_count(), 0);
    assert!(!session.world().container(id).unwrap().dirty);

    let cycle = session.tick();
    assert_eq!(cycle.ran, 1);
    assert_eq!(session.templates().persist_count(), 1);
    let overrides = session.templates().overrides(id).unwrap();
    assert_eq!(overrides.get(paths::INTERACTIVE), Some(OverrideValue::Flag(false)));

    let idle = session.tick();
    assert_eq!(idle.ran, 0);
    assert_eq!(session.templates().persist_count(), 1);
}

#[test]
fn failure_on_third_target_leaves_group_open() {
    let mut session = EditorSession::new();
    let targets = [
        container(&mut session, "a", 1),
        container(&mut session, "b", 1),
        container(&mut session, "c", 1),
    ];
    let before: Vec<_> = targets.iter().map(|id| snapshot(&session, *id)).collect();

    let mut calls = 0;
    let err = session
        .transact(&targets, "Grow", |c| {
            calls += 1;
            if calls == 3 {
                return Err(mutation_error("generator failed"));
            }
            Ok(c.set_child_count(5)?)
        })
        .unwrap_err();

    let (index, failed, group) = match err {
        RecorderError::Mutation {
            index,
            container,
            group,
            ..
        } => (index, container, group),
        other => panic!("expected mutation failure, got {other:?}"),
    };
    assert_eq!(index, 2);
    assert_eq!(failed, targets[2]);
    assert_eq!(session.history().open_group(), Some(group));
    assert_eq!(session.history().undo_depth(), 0);

    let pending = session.history().pending().unwrap();
    assert!(pending.has_snapshot(targets[0]));
    assert!(pending.has_snapshot(targets[1]));
    assert_eq!(pending.created().count(), 0);
    log_step(&session, "failed");

    session.revert_open_group(group).unwrap();
    for (id, expected) in targets.iter().zip(&before) {
        assert_eq!(&snapshot(&session, *id), expected);
    }
    assert_eq!(session.history().open_group(), None);
    assert_consistent(&session);
}

#[test]
fn caller_can_collapse_a_partial_group() {
    let mut session = EditorSession::new();
    let a = container(&mut session, "a", 2);
    let b = container(&mut session, "b", 2);
    let before_a = snapshot(&session, a);

    let err = session
        .transact(&[a, b], "Clear", |c| {
            if c.id() == b {
                return Err(mutation_error("locked"));
            }
            Ok(c.clear_children()?)
        })
        .unwrap_err();
    let group = err.open_group().unwrap();
    session.collapse_open_group(group).unwrap();
    assert_eq!(session.history().undo_depth(), 1);

    session.undo().unwrap().unwrap();
    assert_eq!(snapshot(&session, a), before_a);
    assert_consistent(&session);
}

#[test]
fn persist_waits_until_failed_group_is_resolved() {
    let mut session = EditorSession::new();
    let a = container(&mut session, "card", 2);
    let b = container(&mut session, "plain", 2);
    let template = session
        .templates_mut()
        .register_template("card", ContainerFields::default());
    session.templates_mut().link_instance(a, template).unwrap();

    let err = session
        .transact(&[a, b], "Hide", |c| {
            if c.id() == b {
                return Err(mutation_error("locked"));
            }
            Ok(c.set_interactive(false)?)
        })
        .unwrap_err();
    let group = err.open_group().unwrap();
    assert_eq!(session.deferred().pending_count(), 1);

    for _ in 0..3 {
        let cycle = session.tick();
        assert_eq!(cycle.ran, 1);
        assert_eq!(cycle.deferred, 1);
        assert_eq!(session.templates().persist_count(), 0);
        assert_eq!(session.history().open_group(), Some(group));
    }
    log_step(&session, "persist postponed");

    session.collapse_open_group(group).unwrap();
    let cycle = session.tick();
    assert_eq!(cycle.ran, 1);
    assert_eq!(cycle.deferred, 0);
    assert_eq!(session.templates().persist_count(), 1);
    let overrides = session.templates().overrides(a).unwrap();
    assert_eq!(overrides.get(paths::INTERACTIVE), Some(OverrideValue::Flag(false)));
    assert!(session.deferred().is_empty());
}

#[test]
fn persist_after_revert_sees_reverted_state() {
    let mut session = EditorSession::new();
    let a = container(&mut session, "card", 1);
    let b = container(&mut session, "plain", 1);
    let template = session
        .templates_mut()
        .register_template("card", ContainerFields::default());
    session.templates_mut().link_instance(a, template).unwrap();

    let err = session
        .transact(&[a, b], "Grow", |c| {
            if c.id() == b {
                return Err(mutation_error("locked"));
            }
            Ok(c.set_child_count(4)?)
        })
        .unwrap_err();
    let group = err.open_group().unwrap();

    session.tick();
    assert_eq!(session.templates().persist_count(), 0);
    assert_eq!(session.deferred().pending_count(), 1);

    session.revert_open_group(group).unwrap();
    let cycle = session.tick();
    assert_eq!(cycle.ran, 1);
    assert_eq!(session.templates().persist_count(), 1);
    let overrides = session.templates().overrides(a).unwrap();
    assert_eq!(overrides.get(paths::CHILD_COUNT), Some(OverrideValue::Count(1)));
    assert_consistent(&session);
}

// ============================================================================
// Properties
// ============================================================================

#[test]
fn successive_regenerations_are_independent_groups() {
    let mut session = EditorSession::new();
    let id = container(&mut session, "stack", 3);

    session.generate(&[id]).unwrap();
    let after_first = snapshot(&session, id);
    session.generate(&[id]).unwrap();
    assert_eq!(session.history().undo_depth(), 2);

    session.undo().unwrap().unwrap();
    assert_eq!(snapshot(&session, id), after_first);
    assert_eq!(session.world().child_count(), 3);
    assert_consistent(&session);
}

#[test]
fn moved_child_is_not_registered_as_created() {
    let mut session = EditorSession::new();
    let a = container(&mut session, "a", 2);
    let b = container(&mut session, "b", 1);
    let (before_a, before_b) = (snapshot(&session, a), snapshot(&session, b));
    let moved = before_a.children[0].id;

    let report = session
        .transact(&[a, b], "Move", |c| {
            if c.id() == a {
                c.transfer_to(moved, b, Some(0))?;
            }
            Ok(())
        })
        .unwrap();
    assert!(report.created.is_empty());
    assert_eq!(session.world().children_of(b).unwrap()[0], moved);

    session.undo().unwrap().unwrap();
    assert_eq!(snapshot(&session, a), before_a);
    assert_eq!(snapshot(&session, b), before_b);
    assert!(session.world().is_live_child(moved));
    assert_consistent(&session);
}

#[test]
fn one_group_per_call_for_one_or_many_targets() {
    let mut session = EditorSession::new();
    let ids: Vec<_> = (0..4)
        .map(|i| container(&mut session, &format!("c{i}"), 1))
        .collect();

    session.set_child_count(&ids[..1], 2).unwrap();
    assert_eq!(session.history().undo_depth(), 1);
    session.set_child_count(&ids, 3).unwrap();
    assert_eq!(session.history().undo_depth(), 2);
    assert_eq!(session.history().peek_undo().unwrap().snapshots().count(), 4);
}

#[test]
fn redo_replays_net_effect() {
    let mut session = EditorSession::new();
    let a = container(&mut session, "a", 2);
    let b = container(&mut session, "b", 3);

    session.set_child_count(&[a, b], 1).unwrap();
    session.set_fade(&[a], stackset_core::FadeMode::Dither { steps: 8 }).unwrap();
    let (after_a, after_b) = (snapshot(&session, a), snapshot(&session, b));

    session.undo().unwrap().unwrap();
    session.undo().unwrap().unwrap();
    assert_eq!(session.world().child_count(), 5);

    session.redo().unwrap().unwrap();
    session.redo().unwrap().unwrap();
    log_step(&session, "redo");
    assert_eq!(snapshot(&session, a), after_a);
    assert_eq!(snapshot(&session, b), after_b);
    assert_eq!(session.world().child_count(), 2);
    assert!(!session.history().can_redo());
    assert_consistent(&session);
}

#[test]
fn undo_then_redo_of_regeneration_revives_same_handles() {
    let mut session = EditorSession::new();
    let id = container(&mut session, "stack", 2);
    let report = session.generate(&[id]).unwrap();
    let generated = session.world().children_of(id).unwrap().to_vec();
    assert_eq!(report.created, generated);

    session.undo().unwrap().unwrap();
    assert!(generated.iter().all(|c| !session.world().is_live_child(*c)));
    session.redo().unwrap().unwrap();
    assert_eq!(session.world().children_of(id).unwrap(), generated.as_slice());
}

#[test]
fn reset_restores_defaults_and_undoes() {
    let mut session = EditorSession::new();
    let id = container(&mut session, "stack", 6);
    session.set_interactive(&[id], false).unwrap();
    let before = snapshot(&session, id);

    session.reset(&[id]).unwrap();
    assert_eq!(session.world().container(id).unwrap().fields, ContainerFields::default());

    session.undo().unwrap().unwrap();
    assert_eq!(snapshot(&session, id), before);
}

#[test]
fn cancelled_persist_never_runs() {
    let mut session = EditorSession::new();
    let id = container(&mut session, "card", 1);
    let template = session
        .templates_mut()
        .register_template("card", ContainerFields::default());
    session.templates_mut().link_instance(id, template).unwrap();

    let report = session.set_child_count(&[id], 4).unwrap();
    report.deferred[0].cancel();

    let cycle = session.tick();
    assert_eq!(cycle.ran, 0);
    assert_eq!(cycle.cancelled, 1);
    assert_eq!(session.templates().persist_count(), 0);
    assert!(session.templates().overrides(id).is_none());
}

#[test]
fn persist_on_destroyed_container_is_noop() {
    let mut session = EditorSession::new();
    let id = container(&mut session, "card", 1);
    let template = session
        .templates_mut()
        .register_template("card", ContainerFields::default());
    session.templates_mut().link_instance(id, template).unwrap();

    session.set_interactive(&[id], false).unwrap();
    session.world_mut().destroy_container(id).unwrap();

    let cycle = session.tick();
    assert_eq!(cycle.ran, 1);
    assert_eq!(cycle.panicked, 0);
    assert_eq!(session.templates().persist_count(), 0);
}

#[test]
fn depth_limit_evicts_oldest_groups() {
    let config = SessionConfig {
        history: HistoryConfig::new(3, 0),
        ..SessionConfig::default()
    };
    let mut session = EditorSession::with_config(config);
    let id = container(&mut session, "stack", 1);

    for count in 2..=6 {
        session.set_child_count(&[id], count).unwrap();
    }
    assert_eq!(session.history().undo_depth(), 3);
    while let Some(result) = session.undo() {
        result.unwrap();
    }
    assert_eq!(session.world().children_of(id).unwrap().len(), 3);
    assert_consistent(&session);
}

#[test]
fn byte_budget_never_drops_the_committed_transaction() {
    let config = SessionConfig {
        history: HistoryConfig::new(100, 64),
        ..SessionConfig::default()
    };
    let mut session = EditorSession::with_config(config);
    let id = container(&mut session, "stack", 1);
    let before = snapshot(&session, id);

    let report = session.set_child_count(&[id], 4).unwrap();
    assert_eq!(report.created.len(), 3);
    assert_eq!(session.history().undo_depth(), 1);
    assert!(session.history().memory_usage() > 64);

    session.set_child_count(&[id], 6).unwrap();
    assert_eq!(session.history().undo_depth(), 1);
    assert_eq!(session.history().next_undo_label(), Some("Set Child Count"));

    session.undo().unwrap().unwrap();
    assert_eq!(session.world().children_of(id).unwrap().len(), 4);
    assert_eq!(session.history().redo_depth(), 1);
    session.redo().unwrap().unwrap();
    assert_eq!(session.world().children_of(id).unwrap().len(), 6);
    assert!(session.undo().unwrap().is_ok());
    assert!(session.undo().is_none());
    assert_ne!(snapshot(&session, id), before);
    assert_consistent(&session);
}

#[test]
fn stale_target_is_reported_not_fatal() {
    let mut session = EditorSession::new();
    let live = container(&mut session, "live", 1);
    let gone = container(&mut session, "gone", 1);
    session.world_mut().destroy_container(gone).unwrap();

    let report = session.set_child_count(&[gone, live], 2).unwrap();
    assert_eq!(report.skipped_targets, vec![gone]);
    assert_eq!(report.processed, 1);
    assert_eq!(session.history().undo_depth(), 1);
}

// ============================================================================
// Custom template host
// ============================================================================

/// Template host that records what each persist call observed.
#[derive(Debug, Default)]
struct RecordingTemplates {
    instances: Vec<ContainerId>,
    observed: Rc<RefCell<Vec<(ContainerId, bool)>>>,
}

impl TemplateHost for RecordingTemplates {
    fn is_template_instance(&self, world: &EntityWorld, container: ContainerId) -> bool {
        world.is_live_container(container) && self.instances.contains(&container)
    }

    fn persist_overrides(
        &mut self,
        world: &EntityWorld,
        container: ContainerId,
    ) -> Result<Option<OverrideSet>, TemplateError> {
        let Some(live) = world.container(container) else {
            return Ok(None);
        };
        self.observed
            .borrow_mut()
            .push((container, live.fields.interactive));
        Ok(Some(OverrideSet::diff(&ContainerFields::default(), &live.fields)))
    }
}

#[test]
fn custom_host_sees_mutated_state_exactly_once() {
    let observed = Rc::new(RefCell::new(Vec::new()));
    let templates = RecordingTemplates {
        instances: Vec::new(),
        observed: Rc::clone(&observed),
    };
    let mut session = EditorSession::with_templates(SessionConfig::default(), templates);
    let id = session.create_container_with_default_layout("card").unwrap();
    let plain = session.create_container_with_default_layout("plain").unwrap();
    session.templates_mut().instances.push(id);

    session.set_interactive(&[id, plain], false).unwrap();
    assert!(observed.borrow().is_empty());
    assert!(session.world().container(plain).unwrap().dirty);

    session.tick();
    session.tick();
    assert_eq!(*observed.borrow(), vec![(id, false)]);
}

#[test]
fn world_errors_surface_from_mutation() {
    let mut session = EditorSession::new();
    let id = container(&mut session, "stack", 1);
    let err = session
        .transact(&[id], "Reorder", |c| Ok(c.reorder(0, 5)?))
        .unwrap_err();
    let RecorderError::Mutation { source, .. } = err else {
        panic!("expected mutation failure");
    };
    let world_err = source.downcast_ref::<WorldError>().unwrap();
    assert_eq!(world_err, &WorldError::IndexOutOfBounds { index: 5, len: 1 });
}
