use thiserror::Error;

use crate::id::{ChildId, ContainerId};

pub type Result<T> = std::result::Result<T, WorldError>;

/// Errors raised by [`EntityWorld`](crate::EntityWorld) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorldError {
    #[error("stale container handle {0}")]
    StaleContainer(ContainerId),

    #[error("stale child handle {0}")]
    StaleChild(ChildId),

    #[error("index {index} out of bounds (length {len})")]
    IndexOutOfBounds { index: usize, len: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_handle() {
        let err = WorldError::StaleChild(ChildId::new(42));
        assert_eq!(err.to_string(), "stale child handle child#42");

        let err = WorldError::IndexOutOfBounds { index: 10, len: 5 };
        assert!(err.to_string().contains("10"));
        assert!(err.to_string().contains('5'));
    }
}
