//! Hand-off of resolved facts to an advisory narrator.
//!
//! The narrator only ever sees outcomes that have already been applied. Its
//! return value is ignored and an error from it never affects the call that
//! produced the facts.

use serde::Serialize;

/// Resolved facts handed to the narrator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Narration {
    /// Which engine produced the facts.
    pub source: &'static str,
    /// Short machine-readable event name.
    pub event: String,
    /// Structured facts.
    pub facts: serde_json::Value,
}

/// Callback receiving resolved facts.
pub type Narrator = Box<dyn FnMut(&Narration) -> Result<(), String>>;

/// Deliver `narration` to the narrator if one is registered.
pub(crate) fn narrate(narrator: &mut Option<Narrator>, narration: Narration) {
    let Some(callback) = narrator.as_mut() else {
        return;
    };
    if let Err(error) = callback(&narration) {
        tracing::debug!(source = narration.source, event = %narration.event, %error, "narrator failed");
    }
}
