//! Dice that replay predetermined faces.

use std::collections::VecDeque;

use super::seeded::SeededDice;
use super::service::DiceService;

/// Dice that return queued faces in order, then fall back to a seeded RNG.
///
/// A queued face larger than the die is clamped to the die's size, and a 0 is
/// raised to 1, so a script can never produce an impossible result.
#[derive(Debug, Clone)]
pub struct ScriptedDice {
    queue: VecDeque<u32>,
    fallback: SeededDice,
    consumed: usize,
}

impl ScriptedDice {
    /// Queue faces to be returned before falling back to seed 0.
    pub fn new(faces: impl IntoIterator<Item = u32>) -> Self {
        Self::with_fallback(faces, 0)
    }

    /// Queue faces and choose the seed used once they run out.
    pub fn with_fallback(faces: impl IntoIterator<Item = u32>, seed: u64) -> Self {
        Self {
            queue: faces.into_iter().collect(),
            fallback: SeededDice::new(seed),
            consumed: 0,
        }
    }

    /// Append more faces to the end of the queue.
    pub fn push(&mut self, faces: impl IntoIterator<Item = u32>) {
        self.queue.extend(faces);
    }

    /// Faces still queued.
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    /// Queued faces consumed so far.
    pub fn consumed(&self) -> usize {
        self.consumed
    }
}

impl DiceService for ScriptedDice {
    fn face(&mut self, sides: u32) -> u32 {
        match self.queue.pop_front() {
            Some(face) => {
                self.consumed += 1;
                face.clamp(1, sides.max(1))
            }
            None => self.fallback.face(sides),
        }
    }
}
