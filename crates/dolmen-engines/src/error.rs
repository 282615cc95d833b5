//! Errors raised by the engines.

use dolmen_core::{CoreError, Mode};
use dolmen_mechanics::MechError;

/// Convenience result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that halt an engine call.
///
/// Rules outcomes (a missed attack, a failed search, an encounter that is not
/// running) are reported in result values, never here.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// Transition or controller failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A dice expression in content data was rejected.
    #[error(transparent)]
    Dice(#[from] MechError),

    /// A room id that is not part of the dungeon.
    #[error("unknown room: {0}")]
    UnknownRoom(String),

    /// An action id that no engine understands.
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// A roll table that was never attached to the encounter.
    #[error("unknown roll table: {0}")]
    UnknownTable(String),

    /// The operation is not allowed in the current mode.
    #[error("{operation} is not allowed from {mode}")]
    WrongMode {
        /// What was attempted.
        operation: &'static str,
        /// The mode the game was in.
        mode: Mode,
    },

    /// A precondition other than the mode failed.
    #[error("precondition failed: {0}")]
    Precondition(String),
}
