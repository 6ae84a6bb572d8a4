//! Error types for the squad simulation.
//!
//! Every failure here is recoverable: the tick loop never propagates
//! these errors, and callers (the orchestrator) decide whether to surface
//! them to an operator.

use thiserror::Error;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all simulation errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GameError {
    /// A target, squad, agent or cell reference is no longer valid.
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// A squad is already at capacity.
    #[error("Squad {squad} is full ({capacity} members)")]
    CapacityExceeded {
        /// Squad that rejected the member.
        squad: u32,
        /// Squad capacity.
        capacity: usize,
    },

    /// No configuration registered under the requested identifier.
    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),

    /// A grid or world query fell outside the defined area.
    #[error("Position out of bounds: ({x}, {y})")]
    OutOfBounds {
        /// World x coordinate.
        x: f64,
        /// World y coordinate.
        y: f64,
    },

    /// A configuration record failed validation.
    #[error("Invalid configuration '{name}': {reason}")]
    InvalidConfiguration {
        /// Configuration name.
        name: String,
        /// Why validation failed.
        reason: String,
    },

    /// Data file parsing error.
    #[error("Failed to parse data '{source_name}': {message}")]
    DataParseError {
        /// File name or other description of the data source.
        source_name: String,
        /// Error message.
        message: String,
    },

    /// Invalid simulation state (snapshot encoding and similar).
    #[error("Invalid simulation state: {0}")]
    InvalidState(String),
}

impl GameError {
    /// Build an [`GameError::OutOfBounds`] from a fixed-point world position.
    #[must_use]
    pub fn out_of_bounds(position: crate::math::Vec2Fixed) -> Self {
        Self::OutOfBounds {
            x: position.x.to_num(),
            y: position.y.to_num(),
        }
    }
}
