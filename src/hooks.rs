//! # Feature: State Change Hooks
//!
//! Maps a state key to a command entry. Whenever a state command changes the
//! value under that key, the hooked command runs with the new value's words
//! as its arguments, and its output joins the state command's output.
//!
//! ```json
//! "on_state_change": {
//!   "title": "st",
//!   "game": ["sg"]
//! }
//! ```
//!
//! Setting a key to the value it already holds fires nothing. A hook never
//! re-enters itself: if a hooked command changes its own key again, that
//! nested change is stored without firing.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.3.0
//! - **Toggleable**: false

use crate::commands::Step;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct StateHooks {
    hooks: HashMap<String, Step>,
}

impl StateHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hook `step` to `key`, returning the hook it replaced
    pub fn insert(&mut self, key: impl Into<String>, step: Step) -> Option<Step> {
        self.hooks.insert(key.into(), step)
    }

    pub fn get(&self, key: &str) -> Option<&Step> {
        self.hooks.get(key)
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}
