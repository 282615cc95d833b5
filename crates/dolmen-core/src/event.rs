use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::mode::Mode;

/// What kind of session event occurred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionEventKind {
    /// The game mode changed through a legal trigger.
    ModeChanged {
        /// Mode before.
        from: Mode,
        /// Mode after.
        to: Mode,
        /// Trigger fired.
        trigger: String,
    },
    /// The game mode was overridden.
    ModeForced {
        /// Mode after.
        to: Mode,
        /// Why.
        reason: String,
    },
    /// Game time passed.
    TimeAdvanced {
        /// Turns that passed.
        turns: u64,
    },
    /// A light source was lit.
    LightLit {
        /// Source name.
        source: String,
    },
    /// The party's light went out.
    LightExtinguished,
    /// A party member took damage.
    CharacterDamaged {
        /// Character id.
        character: String,
        /// Damage taken.
        amount: i32,
    },
    /// A party member regained hit points.
    CharacterHealed {
        /// Character id.
        character: String,
        /// Hit points regained.
        amount: i32,
    },
    /// An encounter record was stored.
    EncounterStarted {
        /// Encounter id.
        encounter: String,
    },
    /// The encounter record was cleared.
    EncounterCleared {
        /// Encounter id.
        encounter: String,
    },
    /// Supplies ran short.
    ResourceWarning {
        /// The warning text.
        message: String,
    },
    /// A user-defined event.
    Custom {
        /// Free-form label for the event.
        label: String,
    },
}

impl SessionEventKind {
    /// Check whether a given character is involved in this event.
    pub fn involves(&self, character_id: &str) -> bool {
        match self {
            Self::CharacterDamaged { character, .. } | Self::CharacterHealed { character, .. } => {
                character == character_id
            }
            _ => false,
        }
    }
}

/// A record of something that happened during a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEvent {
    /// Game turn when this event occurred.
    pub turn: u64,
    /// Wall-clock time it was recorded.
    pub recorded_at: DateTime<Utc>,
    /// What sort of event this is.
    pub kind: SessionEventKind,
    /// What happened, in words.
    pub description: String,
}

impl SessionEvent {
    /// Create a new event with the given turn, kind, and description.
    pub fn new(turn: u64, kind: SessionEventKind, description: impl Into<String>) -> Self {
        Self {
            turn,
            recorded_at: Utc::now(),
            kind,
            description: description.into(),
        }
    }
}

/// Accumulates events during a session.
#[derive(Debug, Default, Clone)]
pub struct EventLog {
    events: Vec<SessionEvent>,
    max_events: usize,
}

impl EventLog {
    /// An empty log holding at most `max_events` (0 keeps everything).
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Vec::new(),
            max_events,
        }
    }

    /// Record an event. Past capacity the oldest entries go first.
    pub fn push(&mut self, event: SessionEvent) {
        self.events.push(event);
        if self.max_events > 0 && self.events.len() > self.max_events {
            let drain_count = self.events.len() - self.max_events;
            self.events.drain(..drain_count);
        }
    }

    /// All recorded events, oldest first.
    pub fn events(&self) -> &[SessionEvent] {
        &self.events
    }

    /// Events recorded at the given turn.
    pub fn events_at_turn(&self, turn: u64) -> Vec<&SessionEvent> {
        self.events.iter().filter(|e| e.turn == turn).collect()
    }

    /// Events involving the given character.
    pub fn events_for_character(&self, character_id: &str) -> Vec<&SessionEvent> {
        self.events
            .iter()
            .filter(|e| e.kind.involves(character_id))
            .collect()
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
