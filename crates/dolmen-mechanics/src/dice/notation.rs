//! Standard dice notation: `NdM`, `dM`, `NdM+K`, `NdM-K`.

use serde::{Deserialize, Serialize};

use super::Die;
use crate::error::{MechError, MechResult};

/// A parsed dice expression such as `2d6+1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceNotation {
    /// Number of dice to roll.
    pub count: u32,
    /// The die rolled `count` times.
    pub die: Die,
    /// Flat modifier added to the sum.
    pub modifier: i32,
}

impl DiceNotation {
    /// Build a notation directly from its parts.
    pub fn new(count: u32, sides: u32, modifier: i32) -> Self {
        Self {
            count,
            die: Die::from_sides(sides),
            modifier,
        }
    }

    /// Parse a notation string. Whitespace and case are ignored.
    pub fn parse(notation: &str) -> MechResult<Self> {
        let cleaned: String = notation
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        if cleaned.is_empty() {
            return Err(MechError::NoDice);
        }

        let invalid = || MechError::InvalidNotation(notation.to_string());

        let (count_part, rest) = cleaned.split_once('d').ok_or_else(invalid)?;
        let count = if count_part.is_empty() {
            1
        } else {
            count_part.parse::<u32>().map_err(|_| invalid())?
        };
        if count == 0 {
            return Err(MechError::NoDice);
        }

        let split_at = rest.find(['+', '-']).unwrap_or(rest.len());
        let (sides_part, modifier_part) = rest.split_at(split_at);
        let sides = sides_part.parse::<u32>().map_err(|_| invalid())?;
        if sides < 2 {
            return Err(MechError::InvalidDieSize(sides));
        }

        let modifier = if modifier_part.is_empty() {
            0
        } else {
            modifier_part.parse::<i32>().map_err(|_| invalid())?
        };

        Ok(Self::new(count, sides, modifier))
    }

    /// Smallest possible total.
    pub fn min_total(&self) -> i32 {
        self.count as i32 + self.modifier
    }

    /// Largest possible total.
    pub fn max_total(&self) -> i32 {
        (self.count * self.die.sides()) as i32 + self.modifier
    }
}

impl std::str::FromStr for DiceNotation {
    type Err = MechError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for DiceNotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.count, self.die)?;
        match self.modifier {
            0 => Ok(()),
            m if m > 0 => write!(f, "+{m}"),
            m => write!(f, "{m}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_basic() {
        let n = DiceNotation::parse("2d6").unwrap();
        assert_eq!(n.count, 2);
        assert_eq!(n.die, Die::D6);
        assert_eq!(n.modifier, 0);
    }

    #[test]
    fn parse_with_modifiers() {
        assert_eq!(DiceNotation::parse("1d8+2").unwrap().modifier, 2);
        assert_eq!(DiceNotation::parse("3d4-1").unwrap().modifier, -1);
        assert_eq!(DiceNotation::parse(" 1D20 + 5 ").unwrap().modifier, 5);
    }

    #[test]
    fn parse_implicit_count() {
        let n = DiceNotation::parse("d100").unwrap();
        assert_eq!(n.count, 1);
        assert_eq!(n.die, Die::D100);
    }

    #[test]
    fn parse_errors() {
        assert_eq!(DiceNotation::parse(""), Err(MechError::NoDice));
        assert_eq!(DiceNotation::parse("0d6"), Err(MechError::NoDice));
        assert_eq!(DiceNotation::parse("2d1"), Err(MechError::InvalidDieSize(1)));
        assert!(matches!(
            DiceNotation::parse("fireball"),
            Err(MechError::InvalidNotation(_))
        ));
        assert!(matches!(
            DiceNotation::parse("2d6+"),
            Err(MechError::InvalidNotation(_))
        ));
    }

    #[test]
    fn bounds() {
        let n = DiceNotation::parse("2d6+1").unwrap();
        assert_eq!(n.min_total(), 3);
        assert_eq!(n.max_total(), 13);
    }

    #[test]
    fn display() {
        assert_eq!(DiceNotation::parse("2d6+1").unwrap().to_string(), "2d6+1");
        assert_eq!(DiceNotation::parse("d8-2").unwrap().to_string(), "1d8-2");
        assert_eq!(DiceNotation::new(1, 20, 0).to_string(), "1d20");
    }
}
