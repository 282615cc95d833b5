use serde::{Deserialize, Serialize};

use crate::mode::Mode;

/// Configuration for a referee session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefereeConfig {
    /// RNG seed for the default dice.
    pub seed: u64,
    /// Mode the session starts in.
    pub initial_mode: Mode,
    /// Maximum transition log and session event log size. 0 = unlimited.
    pub max_log_entries: usize,
    /// Party movement rate in feet per turn.
    pub party_speed: u32,
    /// Dungeon turns between wandering monster checks.
    pub wandering_check_interval: u32,
    /// Accumulated noise that raises the dungeon alert level.
    pub noise_alert_threshold: u32,
    /// Dungeon turns before the party needs to rest.
    pub rest_interval: u32,
    /// Highest dungeon alert level.
    pub max_alert_level: u32,
}

impl Default for RefereeConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            initial_mode: Mode::WildernessTravel,
            max_log_entries: 0,
            party_speed: 40,
            wandering_check_interval: 2,
            noise_alert_threshold: 10,
            rest_interval: 5,
            max_alert_level: 5,
        }
    }
}

impl RefereeConfig {
    /// Set the RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the starting mode.
    pub fn with_initial_mode(mut self, mode: Mode) -> Self {
        self.initial_mode = mode;
        self
    }

    /// Set the log capacity (0 = unlimited).
    pub fn with_max_log_entries(mut self, max: usize) -> Self {
        self.max_log_entries = max;
        self
    }

    /// Set the party movement rate.
    pub fn with_party_speed(mut self, speed: u32) -> Self {
        self.party_speed = speed;
        self
    }

    /// Set how often wandering monsters are checked for in dungeons.
    pub fn with_wandering_check_interval(mut self, turns: u32) -> Self {
        self.wandering_check_interval = turns.max(1);
        self
    }

    /// Set the noise level that raises the alert.
    pub fn with_noise_alert_threshold(mut self, noise: u32) -> Self {
        self.noise_alert_threshold = noise.max(1);
        self
    }

    /// Set the dungeon rest interval.
    pub fn with_rest_interval(mut self, turns: u32) -> Self {
        self.rest_interval = turns;
        self
    }

    /// The dungeon subset of this configuration.
    pub fn dungeon(&self) -> DungeonConfig {
        DungeonConfig::from(self)
    }
}

/// Dungeon turn parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DungeonConfig {
    /// Turns between wandering monster checks.
    pub wandering_check_interval: u32,
    /// Noise that raises the alert level.
    pub noise_alert_threshold: u32,
    /// Turns before rest is needed.
    pub rest_interval: u32,
    /// Highest alert level.
    pub max_alert_level: u32,
}

impl Default for DungeonConfig {
    fn default() -> Self {
        Self::from(&RefereeConfig::default())
    }
}

impl From<&RefereeConfig> for DungeonConfig {
    fn from(config: &RefereeConfig) -> Self {
        Self {
            wandering_check_interval: config.wandering_check_interval,
            noise_alert_threshold: config.noise_alert_threshold,
            rest_interval: config.rest_interval,
            max_alert_level: config.max_alert_level,
        }
    }
}
