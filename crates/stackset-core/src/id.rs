#![forbid(unsafe_code)]

//! Stable entity handles.
//!
//! Handles are plain `u64` newtypes allocated monotonically by
//! [`EntityWorld`](crate::EntityWorld). A handle is never reused, so a handle
//! whose entity has been destroyed stays *stale* forever unless the same
//! entity is revived from a snapshot (undo does this).
//!
//! The raw value `0` is the null handle and is never live.

use std::fmt;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// The null handle. Never refers to a live entity.
            pub const NULL: Self = Self(0);

            /// Create a handle from a raw value.
            #[must_use]
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            /// Get the raw handle value.
            #[must_use]
            pub const fn raw(self) -> u64 {
                self.0
            }

            /// Whether this is the null handle.
            #[must_use]
            pub const fn is_null(self) -> bool {
                self.0 == 0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

entity_id!(
    /// Handle to a [`Container`](crate::Container).
    ContainerId,
    "container"
);

entity_id!(
    /// Handle to a [`Child`](crate::Child).
    ChildId,
    "child"
);

/// Monotonic handle allocator shared by containers and children.
///
/// Both kinds draw from one counter so raw values are unique across kinds,
/// which keeps log output unambiguous.
#[derive(Debug, Clone)]
pub(crate) struct IdAllocator {
    next: u64,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl IdAllocator {
    pub(crate) fn next_raw(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Make sure future allocations never collide with a revived handle.
    pub(crate) fn observe(&mut self, raw: u64) {
        if raw >= self.next {
            self.next = raw + 1;
        }
    }
}
