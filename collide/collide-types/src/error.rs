//! Error types for collision operations.

use thiserror::Error;

/// Errors that can occur building acceleration structures or configuring
/// colliders.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CollideError {
    /// The generic input tree is not complete (2T-1 nodes, one primitive
    /// per leaf), so the no-leaf tree cannot be built from it.
    #[error("input tree is not complete: {nodes} nodes for {primitives} primitives (expected 2T-1)")]
    IncompleteTree {
        /// Node count of the offending tree.
        nodes: usize,
        /// Primitive count of the offending tree.
        primitives: usize,
    },

    /// A mesh with zero triangles was handed to the builder.
    #[error("mesh has no triangles")]
    EmptyMesh,

    /// Collider settings are inconsistent; the query must not be
    /// dispatched.
    #[error("invalid collider settings: {reason}")]
    InvalidSettings {
        /// Human-readable description of the conflict.
        reason: String,
    },

    /// Requested quadtree depth would overflow the block array.
    #[error("quadtree depth {depth} too large (maximum {max})")]
    DepthTooLarge {
        /// Requested depth.
        depth: u32,
        /// Largest depth the block arithmetic supports.
        max: u32,
    },
}

impl CollideError {
    /// Create an invalid-settings error.
    #[must_use]
    pub fn invalid_settings(reason: impl Into<String>) -> Self {
        Self::InvalidSettings {
            reason: reason.into(),
        }
    }

    /// Check if this is a settings error.
    #[must_use]
    pub fn is_settings_error(&self) -> bool {
        matches!(self, Self::InvalidSettings { .. })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CollideError::IncompleteTree {
            nodes: 5,
            primitives: 4,
        };
        assert!(err.to_string().contains('5'));
        assert!(err.to_string().contains('4'));

        let err = CollideError::invalid_settings("temporal coherence requires first-contact");
        assert!(err.to_string().contains("temporal coherence"));
        assert!(err.is_settings_error());
    }
}
