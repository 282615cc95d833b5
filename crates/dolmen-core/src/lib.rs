//! Core state for the Dolmen referee.
//!
//! Holds the unified game-mode [`StateMachine`] and its static transition
//! tables, the shared data model (party, encounter record, light, supplies),
//! the [`WorldClock`], and the [`GlobalController`] through which every
//! engine reads and mutates session state.

/// World clock measured in 10-minute turns.
pub mod clock;
/// Session configuration.
pub mod config;
/// The global controller.
pub mod controller;
/// Error types for the core crate.
pub mod error;
/// Session events and the event log.
pub mod event;
/// The state machine.
pub mod machine;
/// Game modes.
pub mod mode;
/// Party, combatant, and encounter data.
pub mod model;
/// Transition and return tables.
pub mod transition;

pub use clock::{TimeOfDay, WorldClock};
pub use config::{DungeonConfig, RefereeConfig};
pub use controller::{ActiveLight, GlobalController, ResourceReport, ResourceUse, TimeAdvance};
pub use error::{CoreError, CoreResult};
pub use event::{EventLog, SessionEvent, SessionEventKind};
pub use machine::{Context, ModeInfo, StateMachine, TransitionHook, TransitionLogEntry};
pub use mode::Mode;
pub use model::{
    AttackProfile, Character, Combatant, EncounterKind, EncounterRecord, LightSource,
    PartyResources, Side, StatBlock, SurpriseStatus,
};
pub use transition::{TransitionRule, triggers};
