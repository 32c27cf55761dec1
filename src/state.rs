//! Bot state store: a string-keyed table of string values.
//!
//! Written only by state commands; read by format commands and by the operator.

use log::debug;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateStore {
    values: HashMap<String, String>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Set `key` to `value`, returning the previous value if there was one
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let value = value.into();
        debug!("state[{}] = {:?}", key, value);
        self.values.insert(key, value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, String)> for StateStore {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        StateStore {
            values: iter.into_iter().collect(),
        }
    }
}
