#![forbid(unsafe_code)]

//! Containers, children, and container configuration.
//!
//! A [`Container`] owns an ordered sequence of [`Child`] handles. Sequence
//! order is display order. Each child carries an exclusive back-reference to
//! its owner.
//!
//! # Invariants
//!
//! - A live child appears in exactly one live container's `children`.
//! - `child.owner` names the container whose sequence holds it.
//! - After any operation in [`ops`](crate::ops) that manages counts,
//!   `children.len() == fields.child_count`. The world itself never enforces
//!   this; mutation logic does.

use crate::id::{ChildId, ContainerId};

/// Appearance-fade strategy and its strategy-specific parameters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum FadeMode {
    /// Children switch instantly.
    #[default]
    None,
    /// Blend between adjacent children over a transition band.
    CrossFade {
        /// Width of the transition band, in normalized units.
        width: f32,
        /// Whether the blend is animated over time instead of by distance.
        animated: bool,
    },
    /// Screen-door dithering with a fixed number of steps.
    Dither {
        /// Number of dither steps.
        steps: u32,
    },
}

impl FadeMode {
    /// Numeric code shown by the inspector.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::None => 0,
            Self::CrossFade { .. } => 1,
            Self::Dither { .. } => 2,
        }
    }

    /// Build the mode for a numeric code with default parameters.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            1 => Some(Self::CrossFade {
                width: 0.1,
                animated: false,
            }),
            2 => Some(Self::Dither { steps: 4 }),
            _ => None,
        }
    }

    /// Short name for logs and override paths.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::CrossFade { .. } => "cross_fade",
            Self::Dither { .. } => "dither",
        }
    }
}

/// Scalar configuration of a container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContainerFields {
    /// Target number of children.
    pub child_count: usize,
    /// Index of the active reference child.
    pub active_index: usize,
    /// Whether the container reacts to pointer input.
    pub interactive: bool,
    /// Appearance-fade strategy.
    pub fade: FadeMode,
}

impl Default for ContainerFields {
    fn default() -> Self {
        Self {
            child_count: 3,
            active_index: 0,
            interactive: true,
            fade: FadeMode::None,
        }
    }
}

impl ContainerFields {
    /// Clamp `active_index` into the valid range for `child_count`.
    pub fn clamp_active(&mut self) {
        self.active_index = self.active_index.min(self.child_count.saturating_sub(1));
    }
}

/// A container entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    /// Stable handle.
    pub id: ContainerId,
    /// Display name, used to label generated children.
    pub name: String,
    /// Owned children, in display order.
    pub children: Vec<ChildId>,
    /// Scalar configuration.
    pub fields: ContainerFields,
    /// Set when the container was modified and needs saving.
    pub dirty: bool,
}

impl Container {
    /// Position of `child` in the sequence.
    #[must_use]
    pub fn index_of(&self, child: ChildId) -> Option<usize> {
        self.children.iter().position(|c| *c == child)
    }

    /// Whether `child` is owned by this container.
    #[must_use]
    pub fn owns(&self, child: ChildId) -> bool {
        self.children.contains(&child)
    }
}

/// A child entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Child {
    /// Stable handle.
    pub id: ChildId,
    /// Owning container.
    pub owner: ContainerId,
    /// Display label.
    pub label: String,
    /// Whether this child is the owner's active reference.
    pub active: bool,
}
