//! Shared data model: party members, combatants, and the active encounter
//! record.

use dolmen_mechanics::{CharacterClass, ReactionResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of thing the party ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncounterKind {
    /// Monsters.
    Monster,
    /// People with names and agendas.
    Npc,
    /// Anything else: a lair, a sign, a strange event.
    Other,
}

/// Which side a combatant fights on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// The player characters and their retainers.
    Party,
    /// Everyone else.
    Enemy,
}

impl Side {
    /// The other side.
    pub fn opposing(self) -> Self {
        match self {
            Self::Party => Self::Enemy,
            Self::Enemy => Self::Party,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Party => write!(f, "party"),
            Self::Enemy => write!(f, "enemy"),
        }
    }
}

/// Who was caught unaware at the start of an encounter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurpriseStatus {
    /// Neither side is surprised.
    #[default]
    NoSurprise,
    /// Only the party is surprised.
    PartySurprised,
    /// Only the enemies are surprised.
    EnemiesSurprised,
    /// Both sides are surprised.
    MutualSurprise,
}

impl SurpriseStatus {
    /// Combine the two per-side results.
    pub fn from_sides(party_surprised: bool, enemies_surprised: bool) -> Self {
        match (party_surprised, enemies_surprised) {
            (true, true) => Self::MutualSurprise,
            (true, false) => Self::PartySurprised,
            (false, true) => Self::EnemiesSurprised,
            (false, false) => Self::NoSurprise,
        }
    }

    /// Whether `side` is surprised.
    pub fn is_surprised(self, side: Side) -> bool {
        matches!(
            (self, side),
            (Self::MutualSurprise, _)
                | (Self::PartySurprised, Side::Party)
                | (Self::EnemiesSurprised, Side::Enemy)
        )
    }

    /// Whether `side` alone was caught off guard. Under mutual surprise
    /// neither side has the drop on the other.
    pub fn caught_alone(self, side: Side) -> bool {
        matches!(
            (self, side),
            (Self::PartySurprised, Side::Party) | (Self::EnemiesSurprised, Side::Enemy)
        )
    }

    /// Free rounds granted to the unsurprised side. Only one-sided surprise
    /// grants a round.
    pub fn surprise_rounds(self) -> u32 {
        match self {
            Self::PartySurprised | Self::EnemiesSurprised => 1,
            Self::NoSurprise | Self::MutualSurprise => 0,
        }
    }
}

/// One attack a creature can make.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackProfile {
    /// Weapon or attack name.
    pub name: String,
    /// Damage notation, e.g. `1d6`.
    pub damage: String,
    /// Bonus added to the attack roll.
    pub bonus: i32,
}

impl AttackProfile {
    /// Create an attack.
    pub fn new(name: impl Into<String>, damage: impl Into<String>, bonus: i32) -> Self {
        Self {
            name: name.into(),
            damage: damage.into(),
            bonus,
        }
    }
}

/// Combat statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatBlock {
    /// Armor class, descending (lower is better).
    pub armor_class: i32,
    /// Hit dice notation.
    pub hit_dice: String,
    /// Current hit points. At or below zero the combatant is out.
    pub hp_current: i32,
    /// Maximum hit points.
    pub hp_max: i32,
    /// Movement rate in feet per round.
    pub movement: u32,
    /// Attacks, first is the default.
    pub attacks: Vec<AttackProfile>,
    /// Morale score, 2-12.
    pub morale: u32,
    /// Base number needed on a d20 before armor class is subtracted.
    pub base_to_hit: i32,
}

impl StatBlock {
    /// Create a stat block with no attacks and a base to-hit of 19.
    pub fn new(armor_class: i32, hit_dice: impl Into<String>, hp: i32, movement: u32, morale: u32) -> Self {
        Self {
            armor_class,
            hit_dice: hit_dice.into(),
            hp_current: hp,
            hp_max: hp,
            movement,
            attacks: Vec::new(),
            morale: morale.clamp(2, 12),
            base_to_hit: 19,
        }
    }

    /// Add an attack.
    pub fn with_attack(mut self, attack: AttackProfile) -> Self {
        self.attacks.push(attack);
        self
    }

    /// Override the base to-hit number.
    pub fn with_base_to_hit(mut self, base: i32) -> Self {
        self.base_to_hit = base;
        self
    }

    /// Still standing.
    pub fn is_alive(&self) -> bool {
        self.hp_current > 0
    }

    /// The default attack, or an unarmed 1d2 strike.
    pub fn primary_attack(&self) -> AttackProfile {
        self.attacks
            .first()
            .cloned()
            .unwrap_or_else(|| AttackProfile::new("unarmed", "1d2", 0))
    }
}

/// A participant in an encounter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combatant {
    /// Identifier, unique within the encounter.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Side.
    pub side: Side,
    /// Party member this combatant stands for, if any.
    pub character_ref: Option<String>,
    /// Combat statistics.
    pub stats: StatBlock,
}

impl Combatant {
    /// Create a combatant.
    pub fn new(id: impl Into<String>, name: impl Into<String>, side: Side, stats: StatBlock) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            side,
            character_ref: None,
            stats,
        }
    }

    /// Link this combatant to a party member so damage is mirrored.
    pub fn with_character(mut self, character_id: impl Into<String>) -> Self {
        self.character_ref = Some(character_id.into());
        self
    }

    /// Still standing.
    pub fn is_alive(&self) -> bool {
        self.stats.is_alive()
    }
}

/// The encounter currently being resolved, built up phase by phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncounterRecord {
    /// Unique id.
    pub id: Uuid,
    /// What was met.
    pub kind: EncounterKind,
    /// Distance between the sides in feet.
    pub distance: u32,
    /// Surprise outcome.
    pub surprise: SurpriseStatus,
    /// Reaction, once rolled.
    pub reaction: Option<ReactionResult>,
    /// Everyone involved.
    pub combatants: Vec<Combatant>,
    /// Free text describing the situation.
    pub context: String,
    /// Terrain the encounter takes place in.
    pub terrain: String,
    /// Ids of the actors (monsters, NPCs) behind the enemies.
    pub actor_ids: Vec<String>,
}

impl EncounterRecord {
    /// Create an empty record.
    pub fn new(kind: EncounterKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            distance: 0,
            surprise: SurpriseStatus::NoSurprise,
            reaction: None,
            combatants: Vec::new(),
            context: String::new(),
            terrain: String::new(),
            actor_ids: Vec::new(),
        }
    }

    /// Add a combatant.
    pub fn with_combatant(mut self, combatant: Combatant) -> Self {
        self.combatants.push(combatant);
        self
    }

    /// Set the context text.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// Set the terrain.
    pub fn with_terrain(mut self, terrain: impl Into<String>) -> Self {
        self.terrain = terrain.into();
        self
    }

    /// Add an actor id.
    pub fn with_actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_ids.push(actor_id.into());
        self
    }

    /// Look up a combatant.
    pub fn combatant(&self, id: &str) -> Option<&Combatant> {
        self.combatants.iter().find(|c| c.id == id)
    }

    /// Look up a combatant mutably.
    pub fn combatant_mut(&mut self, id: &str) -> Option<&mut Combatant> {
        self.combatants.iter_mut().find(|c| c.id == id)
    }

    /// All combatants on `side`.
    pub fn side(&self, side: Side) -> impl Iterator<Item = &Combatant> {
        self.combatants.iter().filter(move |c| c.side == side)
    }

    /// Living combatants on `side`.
    pub fn living(&self, side: Side) -> impl Iterator<Item = &Combatant> {
        self.side(side).filter(|c| c.is_alive())
    }
}

/// A party member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    /// Identifier.
    pub id: String,
    /// Name.
    pub name: String,
    /// Class.
    pub class: CharacterClass,
    /// Level, 1 and up.
    pub level: u32,
    /// Current hit points.
    pub hp_current: i32,
    /// Maximum hit points.
    pub hp_max: i32,
    /// Awake and able to act.
    pub conscious: bool,
    /// Bardic enchantments used since the last daily reset.
    pub enchantments_used: u32,
}

impl Character {
    /// Create a conscious character at full hit points.
    pub fn new(id: impl Into<String>, name: impl Into<String>, class: CharacterClass, level: u32, hp: i32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            class,
            level: level.max(1),
            hp_current: hp,
            hp_max: hp,
            conscious: true,
            enchantments_used: 0,
        }
    }

    /// Conscious with hit points left.
    pub fn can_act(&self) -> bool {
        self.conscious && self.hp_current > 0
    }
}

/// Consumable supplies carried by the party.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyResources {
    /// Food, in person-days.
    pub food_days: u32,
    /// Water, in person-days.
    pub water_days: u32,
    /// Unlit torches.
    pub torches: u32,
    /// Flasks of lantern oil.
    pub oil_flasks: u32,
}

impl Default for PartyResources {
    fn default() -> Self {
        Self {
            food_days: 7,
            water_days: 7,
            torches: 6,
            oil_flasks: 2,
        }
    }
}

/// A carried light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightSource {
    /// Burns for 6 turns, consumes a torch.
    Torch,
    /// Burns for 24 turns, consumes an oil flask.
    Lantern,
    /// Burns for 12 turns.
    Candle,
    /// Lasts a full day.
    Magical,
}

impl LightSource {
    /// How many 10-minute turns one lighting lasts.
    pub fn duration_turns(self) -> u32 {
        match self {
            Self::Torch => 6,
            Self::Lantern => 24,
            Self::Candle => 12,
            Self::Magical => 144,
        }
    }
}

impl std::fmt::Display for LightSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Torch => write!(f, "torch"),
            Self::Lantern => write!(f, "lantern"),
            Self::Candle => write!(f, "candle"),
            Self::Magical => write!(f, "magical light"),
        }
    }
}
