#![forbid(unsafe_code)]

//! Template instances and their property overrides.
//!
//! A container may be an instance of a shared template. Field edits on an
//! instance are local overrides: they are not saved by marking the container
//! dirty, but by explicitly persisting the diff between the instance's
//! fields and its template's fields. The recorder schedules that
//! persistence on the next host cycle through [`TemplateHost`].
//!
//! # Failure Modes
//!
//! | Condition | Behavior |
//! |-----------|----------|
//! | persist on a destroyed container | `Ok(None)`, logged at `debug` |
//! | persist on a container that is not an instance | `TemplateError::NotAnInstance` |
//! | instance linked to an unknown template | `TemplateError::UnknownTemplate` |

use std::collections::HashMap;
use std::fmt;

use stackset_core::{ContainerFields, ContainerId, EntityWorld, FadeMode};
use thiserror::Error;

/// Override paths, one per [`ContainerFields`] member.
pub mod paths {
    pub const CHILD_COUNT: &str = "child_count";
    pub const ACTIVE_INDEX: &str = "active_index";
    pub const INTERACTIVE: &str = "interactive";
    pub const FADE: &str = "fade";
}

/// Identifier of a registered template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TemplateId(pub u64);

impl TemplateId {
    /// Create a template id from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "template#{}", self.0)
    }
}

/// Errors from the template subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("{0} is not registered")]
    UnknownTemplate(TemplateId),

    #[error("{0} is not a template instance")]
    NotAnInstance(ContainerId),
}

/// Host template/override subsystem.
pub trait TemplateHost {
    /// Whether `container` is a live instance of some template.
    fn is_template_instance(&self, world: &EntityWorld, container: ContainerId) -> bool;

    /// Persist the instance's current overrides.
    ///
    /// Returns `Ok(None)` when `container` is no longer live.
    fn persist_overrides(
        &mut self,
        world: &EntityWorld,
        container: ContainerId,
    ) -> Result<Option<OverrideSet>, TemplateError>;
}

// ============================================================================
// Overrides
// ============================================================================

/// Value of one overridden property.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OverrideValue {
    Count(usize),
    Flag(bool),
    Fade(FadeMode),
}

/// One property that differs from the template.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyOverride {
    /// Property path, one of [`paths`].
    pub path: String,
    pub value: OverrideValue,
}

/// The overrides of one instance, in field declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverrideSet {
    overrides: Vec<PropertyOverride>,
}

impl OverrideSet {
    /// Compute the overrides that turn `base` into `instance`.
    #[must_use]
    pub fn diff(base: &ContainerFields, instance: &ContainerFields) -> Self {
        let mut overrides = Vec::new();
        let mut push = |path: &str, value| {
            overrides.push(PropertyOverride {
                path: path.to_string(),
                value,
            });
        };
        if base.child_count != instance.child_count {
            push(paths::CHILD_COUNT, OverrideValue::Count(instance.child_count));
        }
        if base.active_index != instance.active_index {
            push(paths::ACTIVE_INDEX, OverrideValue::Count(instance.active_index));
        }
        if base.interactive != instance.interactive {
            push(paths::INTERACTIVE, OverrideValue::Flag(instance.interactive));
        }
        if base.fade != instance.fade {
            push(paths::FADE, OverrideValue::Fade(instance.fade));
        }
        Self { overrides }
    }

    /// Apply the overrides on top of `base`.
    #[must_use]
    pub fn apply(&self, base: &ContainerFields) -> ContainerFields {
        let mut fields = *base;
        for o in &self.overrides {
            match (o.path.as_str(), o.value) {
                (paths::CHILD_COUNT, OverrideValue::Count(n)) => fields.child_count = n,
                (paths::ACTIVE_INDEX, OverrideValue::Count(n)) => fields.active_index = n,
                (paths::INTERACTIVE, OverrideValue::Flag(b)) => fields.interactive = b,
                (paths::FADE, OverrideValue::Fade(m)) => fields.fade = m,
                _ => {}
            }
        }
        fields
    }

    /// Look up the override for `path`.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<OverrideValue> {
        self.overrides
            .iter()
            .find(|o| o.path == path)
            .map(|o| o.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyOverride> {
        self.overrides.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.overrides.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }
}

// ============================================================================
// Registry
// ============================================================================

/// A shared template.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    pub fields: ContainerFields,
}

/// In-memory [`TemplateHost`].
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    templates: HashMap<TemplateId, Template>,
    instances: HashMap<ContainerId, TemplateId>,
    overrides: HashMap<ContainerId, OverrideSet>,
    last_id: u64,
    persist_count: u64,
}

impl TemplateRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template with the given base fields.
    pub fn register_template(&mut self, name: impl Into<String>, fields: ContainerFields) -> TemplateId {
        self.last_id += 1;
        let id = TemplateId::new(self.last_id);
        self.templates.insert(
            id,
            Template {
                id,
                name: name.into(),
                fields,
            },
        );
        id
    }

    /// Look up a template.
    #[must_use]
    pub fn template(&self, id: TemplateId) -> Option<&Template> {
        self.templates.get(&id)
    }

    /// Mark `container` as an instance of `template`.
    pub fn link_instance(
        &mut self,
        container: ContainerId,
        template: TemplateId,
    ) -> Result<(), TemplateError> {
        if !self.templates.contains_key(&template) {
            return Err(TemplateError::UnknownTemplate(template));
        }
        self.instances.insert(container, template);
        self.overrides.remove(&container);
        Ok(())
    }

    /// Break the link of `container`, dropping its stored overrides.
    pub fn unlink(&mut self, container: ContainerId) -> Option<TemplateId> {
        self.overrides.remove(&container);
        self.instances.remove(&container)
    }

    /// Template `container` is an instance of.
    #[must_use]
    pub fn template_of(&self, container: ContainerId) -> Option<TemplateId> {
        self.instances.get(&container).copied()
    }

    /// Last persisted overrides of `container`.
    #[must_use]
    pub fn overrides(&self, container: ContainerId) -> Option<&OverrideSet> {
        self.overrides.get(&container)
    }

    /// Template fields with the persisted overrides of `container` applied.
    #[must_use]
    pub fn resolve(&self, container: ContainerId) -> Option<ContainerFields> {
        let template = self.templates.get(&self.template_of(container)?)?;
        Some(match self.overrides.get(&container) {
            Some(set) => set.apply(&template.fields),
            None => template.fields,
        })
    }

    /// Number of successful persist calls.
    #[must_use]
    pub fn persist_count(&self) -> u64 {
        self.persist_count
    }
}

impl TemplateHost for TemplateRegistry {
    fn is_template_instance(&self, world: &EntityWorld, container: ContainerId) -> bool {
        world.is_live_container(container) && self.instances.contains_key(&container)
    }

    fn persist_overrides(
        &mut self,
        world: &EntityWorld,
        container: ContainerId,
    ) -> Result<Option<OverrideSet>, TemplateError> {
        let Some(live) = world.container(container) else {
            tracing::debug!(
                target: "stackset.template",
                container = %container,
                "persist skipped: stale handle"
            );
            return Ok(None);
        };
        let template_id = self
            .template_of(container)
            .ok_or(TemplateError::NotAnInstance(container))?;
        let template = self
            .templates
            .get(&template_id)
            .ok_or(TemplateError::UnknownTemplate(template_id))?;

        let set = OverrideSet::diff(&template.fields, &live.fields);
        tracing::debug!(
            target: "stackset.template",
            container = %container,
            template = %template_id,
            overrides = set.len(),
            "overrides persisted"
        );
        self.overrides.insert(container, set.clone());
        self.persist_count += 1;
        Ok(Some(set))
    }
}
