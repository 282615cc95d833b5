use serde::{Deserialize, Serialize};

/// Minutes in one exploration turn.
pub const MINUTES_PER_TURN: u64 = 10;
/// Turns in one four-hour watch.
pub const TURNS_PER_WATCH: u64 = 24;
/// Turns in one day.
pub const TURNS_PER_DAY: u64 = 144;
/// Turns in one hour.
pub const TURNS_PER_HOUR: u64 = 6;

/// Tracks in-world time as a monotonic count of 10-minute turns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldClock {
    turn: u64,
}

impl WorldClock {
    /// Create a clock at turn 0 (midnight of day 1).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock at an arbitrary turn.
    pub fn starting_at(turn: u64) -> Self {
        Self { turn }
    }

    /// Advance by `turns`. Returns the new turn count.
    pub fn advance(&mut self, turns: u64) -> u64 {
        self.turn += turns;
        self.turn
    }

    /// Total turns elapsed.
    pub fn turn(&self) -> u64 {
        self.turn
    }

    /// Day number, starting at 1.
    pub fn day(&self) -> u64 {
        self.turn / TURNS_PER_DAY + 1
    }

    /// Watch of the day, 0-5.
    pub fn watch(&self) -> u64 {
        (self.turn % TURNS_PER_DAY) / TURNS_PER_WATCH
    }

    /// Hour of the day, 0-23.
    pub fn hour(&self) -> u64 {
        (self.turn % TURNS_PER_DAY) / TURNS_PER_HOUR
    }

    /// Minute of the hour.
    pub fn minute(&self) -> u64 {
        (self.turn % TURNS_PER_HOUR) * MINUTES_PER_TURN
    }

    /// Whether a new day has started since turn `earlier`.
    pub fn crossed_day_since(&self, earlier: u64) -> bool {
        earlier / TURNS_PER_DAY != self.turn / TURNS_PER_DAY
    }

    /// Coarse time of day.
    pub fn time_of_day(&self) -> TimeOfDay {
        match self.hour() {
            5..=7 => TimeOfDay::Dawn,
            8..=11 => TimeOfDay::Morning,
            12..=16 => TimeOfDay::Afternoon,
            17..=19 => TimeOfDay::Dusk,
            20..=23 => TimeOfDay::Evening,
            _ => TimeOfDay::Night,
        }
    }
}

impl std::fmt::Display for WorldClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Day {}, {:02}:{:02}", self.day(), self.hour(), self.minute())
    }
}

/// Coarse time-of-day bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    /// 05:00-07:59.
    Dawn,
    /// 08:00-11:59.
    Morning,
    /// 12:00-16:59.
    Afternoon,
    /// 17:00-19:59.
    Dusk,
    /// 20:00-23:59.
    Evening,
    /// 00:00-04:59.
    Night,
}

impl TimeOfDay {
    /// Daylight hours.
    pub fn is_daylight(self) -> bool {
        matches!(self, Self::Morning | Self::Afternoon | Self::Dawn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_initial_state() {
        let clock = WorldClock::new();
        assert_eq!(clock.turn(), 0);
        assert_eq!(clock.day(), 1);
        assert_eq!(clock.to_string(), "Day 1, 00:00");
    }

    #[test]
    fn clock_watches_and_days() {
        let mut clock = WorldClock::new();
        clock.advance(TURNS_PER_WATCH);
        assert_eq!(clock.watch(), 1);
        assert_eq!(clock.hour(), 4);
        clock.advance(TURNS_PER_DAY);
        assert_eq!(clock.day(), 2);
        assert_eq!(clock.watch(), 1);
    }

    #[test]
    fn clock_minutes() {
        let mut clock = WorldClock::starting_at(TURNS_PER_HOUR * 9);
        clock.advance(5);
        assert_eq!(clock.to_string(), "Day 1, 09:50");
        assert_eq!(clock.time_of_day(), TimeOfDay::Morning);
        assert!(clock.time_of_day().is_daylight());
    }

    #[test]
    fn clock_day_rollover() {
        let mut clock = WorldClock::starting_at(TURNS_PER_DAY - 1);
        let before = clock.turn();
        assert!(!clock.crossed_day_since(before));
        clock.advance(1);
        assert!(clock.crossed_day_since(before));
        assert_eq!(clock.time_of_day(), TimeOfDay::Night);
    }
}
