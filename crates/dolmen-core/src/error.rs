use dolmen_mechanics::MechError;

use crate::mode::Mode;

/// Convenience result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by the state machine and the global controller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// The trigger is not legal from the current mode.
    #[error("invalid transition '{trigger}' from {from}; valid triggers: {}", valid.join(", "))]
    InvalidTransition {
        /// Mode the machine was in.
        from: Mode,
        /// The rejected trigger.
        trigger: String,
        /// Triggers that are legal from `from`.
        valid: Vec<String>,
    },

    /// `return_to_previous` was called before any transition happened.
    #[error("no previous state to return to")]
    NoPreviousMode,

    /// There is no return mapping for the (current, previous) pair.
    #[error("no return transition from {current} to {previous}")]
    NoReturnTransition {
        /// Current mode.
        current: Mode,
        /// The mode being returned to.
        previous: Mode,
    },

    /// No party member with this id.
    #[error("character not found: {0}")]
    CharacterNotFound(String),

    /// No combatant with this id in the active encounter.
    #[error("combatant not found: {0}")]
    CombatantNotFound(String),

    /// There is no torch or oil flask left to light.
    #[error("no supply left to light a {0}")]
    NoLightSupply(String),

    /// A dice expression was rejected.
    #[error(transparent)]
    Dice(#[from] MechError),
}
