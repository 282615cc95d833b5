//! Resolution engines for the Dolmen referee.
//!
//! The [`EncounterEngine`] runs an encounter from first contact to a fight,
//! a parley, or a clean getaway. The [`CombatEngine`] fights it out round by
//! round, and the [`DungeonEngine`] runs exploration in 10-minute turns. The
//! [`Referee`] owns all three together with the controller and passes the
//! game from one to the next.

pub mod combat;
pub mod dungeon;
pub mod encounter;
pub mod error;
pub mod narration;
pub mod referee;

pub use combat::CombatEngine;
pub use dungeon::DungeonEngine;
pub use encounter::{EncounterEngine, PhaseOutcome};
pub use error::{EngineError, EngineResult};
pub use narration::{Narration, Narrator};
pub use referee::Referee;
