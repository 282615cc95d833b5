//! Game mechanics primitives for the Dolmen referee.
//!
//! Provides dice notation and the [`DiceService`] abstraction every engine
//! rolls through, the 2d6 reaction table, and the class ability registry
//! used for thief skills and bardic enchantment.

pub mod abilities;
pub mod dice;
pub mod error;
pub mod reaction;

pub use abilities::{AbilityLookup, AbilityRegistry, CharacterClass, ThiefSkill};
pub use dice::{DiceNotation, DiceRoll, DiceService, Die, ScriptedDice, SeededDice};
pub use error::{MechError, MechResult};
pub use reaction::{ReactionResult, ReactionRoll, interpret_reaction, roll_reaction};
