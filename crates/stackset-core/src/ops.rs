#![forbid(unsafe_code)]

//! Container mutation operations.
//!
//! [`ContainerMut`] is the handle handed to mutation closures. It scopes
//! edits to one container while still exposing the world for cross-container
//! moves.
//!
//! Count-managing operations (`set_child_count`, `clear_children`,
//! `regenerate_children`, `reset_children`) leave
//! `children.len() == fields.child_count` and never keep handles to
//! destroyed children. Structural primitives (`spawn_child`, `destroy_child`,
//! `reorder`, `transfer_to`) do not touch `child_count`; callers combine them.

use crate::entity::{Container, ContainerFields, FadeMode};
use crate::error::{Result, WorldError};
use crate::id::{ChildId, ContainerId};
use crate::world::EntityWorld;

/// Mutable view of one container inside an [`EntityWorld`].
#[derive(Debug)]
pub struct ContainerMut<'w> {
    world: &'w mut EntityWorld,
    id: ContainerId,
}

impl<'w> ContainerMut<'w> {
    /// Borrow `id` for mutation. Fails if the handle is stale.
    pub fn new(world: &'w mut EntityWorld, id: ContainerId) -> Result<Self> {
        if !world.is_live_container(id) {
            return Err(WorldError::StaleContainer(id));
        }
        Ok(Self { world, id })
    }

    /// Handle of the container being edited.
    #[must_use]
    pub fn id(&self) -> ContainerId {
        self.id
    }

    /// Read access to the whole world.
    #[must_use]
    pub fn world(&self) -> &EntityWorld {
        &*self.world
    }

    /// Write access to the whole world, for edits spanning containers.
    pub fn world_mut(&mut self) -> &mut EntityWorld {
        &mut *self.world
    }

    /// The container being edited.
    pub fn container(&self) -> Result<&Container> {
        self.world
            .container(self.id)
            .ok_or(WorldError::StaleContainer(self.id))
    }

    fn container_mut(&mut self) -> Result<&mut Container> {
        self.world
            .container_mut(self.id)
            .ok_or(WorldError::StaleContainer(self.id))
    }

    /// Current scalar configuration.
    pub fn fields(&self) -> Result<ContainerFields> {
        Ok(self.container()?.fields)
    }

    /// Mutable scalar configuration. Does not resize the child sequence.
    pub fn fields_mut(&mut self) -> Result<&mut ContainerFields> {
        Ok(&mut self.container_mut()?.fields)
    }

    /// Owned children in display order.
    pub fn children(&self) -> Result<Vec<ChildId>> {
        Ok(self.container()?.children.clone())
    }

    // ========================================================================
    // Count-managing operations
    // ========================================================================

    /// Set the child-count target and grow or shrink the sequence to match.
    ///
    /// Shrinking destroys trailing children; growing appends fresh ones.
    pub fn set_child_count(&mut self, count: usize) -> Result<()> {
        {
            let fields = self.fields_mut()?;
            fields.child_count = count;
            fields.clamp_active();
        }
        loop {
            let children = self.children()?;
            if children.len() <= count {
                break;
            }
            if let Some(last) = children.last() {
                self.world.destroy_child(*last)?;
            }
        }
        loop {
            let len = self.container()?.children.len();
            if len >= count {
                break;
            }
            let label = self.child_label(len)?;
            self.world.spawn_child(self.id, label)?;
        }
        self.sync_active()
    }

    /// Destroy every child and set the target to zero.
    pub fn clear_children(&mut self) -> Result<()> {
        self.destroy_all()?;
        let fields = self.fields_mut()?;
        fields.child_count = 0;
        fields.active_index = 0;
        Ok(())
    }

    /// Destroy every child and spawn `child_count` fresh ones.
    pub fn regenerate_children(&mut self) -> Result<()> {
        self.destroy_all()?;
        let count = {
            let fields = self.fields_mut()?;
            fields.clamp_active();
            fields.child_count
        };
        for index in 0..count {
            let label = self.child_label(index)?;
            self.world.spawn_child(self.id, label)?;
        }
        self.sync_active()
    }

    /// Restore default configuration and regenerate children from it.
    pub fn reset_children(&mut self) -> Result<()> {
        *self.fields_mut()? = ContainerFields::default();
        self.regenerate_children()
    }

    // ========================================================================
    // Field edits
    // ========================================================================

    /// Select the active reference child.
    pub fn set_active_index(&mut self, index: usize) -> Result<()> {
        {
            let fields = self.fields_mut()?;
            fields.active_index = index;
            fields.clamp_active();
        }
        self.sync_active()
    }

    /// Toggle pointer interactivity.
    pub fn set_interactive(&mut self, interactive: bool) -> Result<()> {
        self.fields_mut()?.interactive = interactive;
        Ok(())
    }

    /// Change the appearance-fade strategy.
    pub fn set_fade(&mut self, fade: FadeMode) -> Result<()> {
        self.fields_mut()?.fade = fade;
        Ok(())
    }

    // ========================================================================
    // Structural primitives
    // ========================================================================

    /// Append a child without changing `child_count`.
    pub fn spawn_child(&mut self, label: impl Into<String>) -> Result<ChildId> {
        self.world.spawn_child(self.id, label)
    }

    /// Destroy an owned child without changing `child_count`.
    pub fn destroy_child(&mut self, child: ChildId) -> Result<()> {
        if !self.container()?.owns(child) {
            return Err(WorldError::StaleChild(child));
        }
        self.world.destroy_child(child)
    }

    /// Move the child at `from` to position `to`.
    pub fn reorder(&mut self, from: usize, to: usize) -> Result<()> {
        let container = self.container_mut()?;
        let len = container.children.len();
        if from >= len {
            return Err(WorldError::IndexOutOfBounds { index: from, len });
        }
        if to >= len {
            return Err(WorldError::IndexOutOfBounds { index: to, len });
        }
        let child = container.children.remove(from);
        container.children.insert(to, child);
        self.sync_active()
    }

    /// Move an owned child into another container, keeping its handle.
    pub fn transfer_to(
        &mut self,
        child: ChildId,
        other: ContainerId,
        index: Option<usize>,
    ) -> Result<()> {
        if !self.container()?.owns(child) {
            return Err(WorldError::StaleChild(child));
        }
        self.world.transfer_child(child, other, index)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn destroy_all(&mut self) -> Result<()> {
        for child in self.children()? {
            self.world.destroy_child(child)?;
        }
        Ok(())
    }

    fn child_label(&self, index: usize) -> Result<String> {
        Ok(format!("{} #{}", self.container()?.name, index))
    }

    /// Mark exactly the child at `active_index` as active.
    fn sync_active(&mut self) -> Result<()> {
        let container = self.container()?;
        let active = container.fields.active_index;
        let children = container.children.clone();
        for (index, child) in children.into_iter().enumerate() {
            if let Some(child) = self.world.child_mut(child) {
                child.active = index == active;
            }
        }
        Ok(())
    }
}
