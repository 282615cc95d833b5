//! The unified game-mode state machine.
//!
//! Owns the current [`Mode`], validates every trigger against
//! [`crate::transition::TRANSITIONS`], keeps an append-only log, and runs
//! registered hooks in a fixed order: pre-hooks, mode change and log entry,
//! post-hooks, then callbacks keyed `"from:trigger"`.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::mode::Mode;
use crate::transition;

/// Free-form data attached to a transition.
pub type Context = BTreeMap<String, serde_json::Value>;

/// Hook invoked with `(old, new, trigger, context)`.
pub type TransitionHook = Box<dyn FnMut(Mode, Mode, &str, &Context)>;

/// Label used for the `from` side of the first log entry.
pub const INIT_LABEL: &str = "INIT";

/// Trigger recorded for the first log entry.
pub const INIT_TRIGGER: &str = "initialization";

/// One entry in the transition history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionLogEntry {
    /// Wall-clock time the transition happened.
    pub timestamp: DateTime<Utc>,
    /// Mode before the transition, `None` for the initial entry.
    pub from: Option<Mode>,
    /// Mode after the transition.
    pub to: Mode,
    /// The trigger that was fired.
    pub trigger: String,
    /// Context passed with the trigger.
    pub context: Context,
}

impl TransitionLogEntry {
    /// The `from` mode name, or `"INIT"` for the initial entry.
    pub fn from_label(&self) -> &str {
        self.from.map_or(INIT_LABEL, Mode::as_str)
    }

    /// Whether this entry was written by [`StateMachine::force_state`].
    pub fn is_forced(&self) -> bool {
        self.context
            .get("forced")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }
}

/// Snapshot of the machine for display and debugging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModeInfo {
    /// Current mode.
    pub current: Mode,
    /// Mode before the last transition.
    pub previous: Option<Mode>,
    /// Triggers legal from `current`.
    pub valid_triggers: Vec<&'static str>,
    /// Number of log entries retained.
    pub history_len: usize,
}

/// Authoritative holder of the current game mode.
pub struct StateMachine {
    current: Mode,
    previous: Option<Mode>,
    history: Vec<TransitionLogEntry>,
    max_history: usize,
    pre_hooks: Vec<TransitionHook>,
    post_hooks: Vec<TransitionHook>,
    callbacks: HashMap<String, Vec<TransitionHook>>,
}

impl std::fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachine")
            .field("current", &self.current)
            .field("previous", &self.previous)
            .field("history", &self.history.len())
            .field("pre_hooks", &self.pre_hooks.len())
            .field("post_hooks", &self.post_hooks.len())
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

impl StateMachine {
    /// Create a machine in `initial`, logging an `INIT` entry.
    pub fn new(initial: Mode) -> Self {
        let mut machine = Self {
            current: initial,
            previous: None,
            history: Vec::new(),
            max_history: 0,
            pre_hooks: Vec::new(),
            post_hooks: Vec::new(),
            callbacks: HashMap::new(),
        };
        machine.log(None, initial, INIT_TRIGGER.to_string(), Context::new());
        machine
    }

    /// Cap the retained history (0 = unlimited). Oldest entries drop first.
    pub fn with_history_limit(mut self, max: usize) -> Self {
        self.max_history = max;
        self.trim_history();
        self
    }

    /// The active mode.
    pub fn current(&self) -> Mode {
        self.current
    }

    /// The mode before the last transition.
    pub fn previous(&self) -> Option<Mode> {
        self.previous
    }

    /// The transition log, oldest first.
    pub fn history(&self) -> &[TransitionLogEntry] {
        &self.history
    }

    /// Whether `trigger` is legal from the current mode.
    pub fn can_transition(&self, trigger: &str) -> bool {
        transition::lookup(self.current, trigger).is_some()
    }

    /// Triggers legal from the current mode.
    pub fn valid_triggers(&self) -> Vec<&'static str> {
        transition::valid_triggers(self.current)
    }

    /// Whether the current mode is one of the exploration modes.
    pub fn is_exploration_mode(&self) -> bool {
        self.current.is_exploration()
    }

    /// Summary of the machine.
    pub fn mode_info(&self) -> ModeInfo {
        ModeInfo {
            current: self.current,
            previous: self.previous,
            valid_triggers: self.valid_triggers(),
            history_len: self.history.len(),
        }
    }

    /// Register a hook run before the mode changes.
    pub fn add_pre_hook(&mut self, hook: impl FnMut(Mode, Mode, &str, &Context) + 'static) {
        self.pre_hooks.push(Box::new(hook));
    }

    /// Register a hook run after the mode changed and was logged.
    pub fn add_post_hook(&mut self, hook: impl FnMut(Mode, Mode, &str, &Context) + 'static) {
        self.post_hooks.push(Box::new(hook));
    }

    /// Register a callback for one specific `(from, trigger)` pair.
    pub fn on_trigger(
        &mut self,
        from: Mode,
        trigger: &str,
        callback: impl FnMut(Mode, Mode, &str, &Context) + 'static,
    ) {
        self.callbacks
            .entry(callback_key(from, trigger))
            .or_default()
            .push(Box::new(callback));
    }

    /// Fire `trigger`. Fails without side effects when the pair is not in the
    /// table.
    pub fn transition(&mut self, trigger: &str, context: Context) -> CoreResult<Mode> {
        let from = self.current;
        let rule = transition::lookup(from, trigger).ok_or_else(|| CoreError::InvalidTransition {
            from,
            trigger: trigger.to_string(),
            valid: self.valid_triggers().into_iter().map(String::from).collect(),
        })?;
        let to = rule.to;

        for hook in &mut self.pre_hooks {
            hook(from, to, trigger, &context);
        }

        self.previous = Some(from);
        self.current = to;
        self.log(Some(from), to, trigger.to_string(), context.clone());
        tracing::info!(%from, %to, trigger, "mode transition");

        for hook in &mut self.post_hooks {
            hook(from, to, trigger, &context);
        }
        if let Some(callbacks) = self.callbacks.get_mut(&callback_key(from, trigger)) {
            for callback in callbacks {
                callback(from, to, trigger, &context);
            }
        }

        Ok(to)
    }

    /// Unwind one level using the return table.
    pub fn return_to_previous(&mut self, context: Context) -> CoreResult<Mode> {
        let previous = self.previous.ok_or(CoreError::NoPreviousMode)?;
        let trigger = transition::return_trigger(self.current, previous).ok_or(
            CoreError::NoReturnTransition {
                current: self.current,
                previous,
            },
        )?;
        self.transition(trigger, context)
    }

    /// Override the mode without validation. Hooks still run and the entry is
    /// marked as forced.
    pub fn force_state(&mut self, mode: Mode, reason: &str, mut context: Context) -> Mode {
        let from = self.current;
        let trigger = format!("FORCED: {reason}");
        context.insert("forced".into(), serde_json::Value::Bool(true));
        context.insert("force_reason".into(), serde_json::Value::from(reason));

        for hook in &mut self.pre_hooks {
            hook(from, mode, &trigger, &context);
        }
        self.previous = Some(from);
        self.current = mode;
        self.log(Some(from), mode, trigger.clone(), context.clone());
        tracing::warn!(%from, to = %mode, reason, "mode forced");
        for hook in &mut self.post_hooks {
            hook(from, mode, &trigger, &context);
        }
        mode
    }

    fn log(&mut self, from: Option<Mode>, to: Mode, trigger: String, context: Context) {
        self.history.push(TransitionLogEntry {
            timestamp: Utc::now(),
            from,
            to,
            trigger,
            context,
        });
        self.trim_history();
    }

    fn trim_history(&mut self) {
        if self.max_history > 0 && self.history.len() > self.max_history {
            let drain_count = self.history.len() - self.max_history;
            self.history.drain(..drain_count);
        }
    }
}

fn callback_key(from: Mode, trigger: &str) -> String {
    format!("{from}:{trigger}")
}
