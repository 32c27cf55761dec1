//! # Feature: Chat Listeners
//!
//! A listener watches every inbound line for a trigger substring and runs a
//! command when it hears it, independently of the `!name` command path.
//! Listener commands attach listeners to the bot when invoked.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.2.0
//! - **Toggleable**: false

use super::{tokenize, CommandContext, Step};
use crate::error::BotResult;
use log::{debug, info};
use std::sync::Arc;

/// Listener template owned by a listener command
#[derive(Debug)]
pub struct ListenerSpec {
    pub trigger: String,
    /// Only messages from this user fire the listener
    pub user: Option<String>,
    /// Detach after firing once
    pub temp: bool,
    pub step: Step,
}

/// An attached listener
#[derive(Debug, Clone)]
pub struct Listener {
    spec: Arc<ListenerSpec>,
}

impl Listener {
    pub fn new(spec: Arc<ListenerSpec>) -> Self {
        Listener { spec }
    }

    pub fn trigger(&self) -> &str {
        &self.spec.trigger
    }

    pub fn is_temp(&self) -> bool {
        self.spec.temp
    }

    pub fn hears(&self, user: &str, text: &str) -> bool {
        let from_user = match &self.spec.user {
            Some(expected) => expected == user,
            None => true,
        };
        from_user && text.contains(&self.spec.trigger)
    }

    /// Run the listener's command with the message's tokens as arguments
    pub fn fire(&self, user: &str, text: &str, ctx: &mut CommandContext<'_>) -> BotResult<Vec<String>> {
        debug!("Listener '{}' fired for {}", self.spec.trigger, user);
        self.spec.step.invoke(user, &tokenize(text), ctx)
    }

    pub(crate) fn same_spec(&self, other: &Listener) -> bool {
        Arc::ptr_eq(&self.spec, &other.spec)
    }
}

/// Attach a listener built from `spec` unless one from the same spec is active
pub fn attach(spec: &Arc<ListenerSpec>, listeners: &mut Vec<Listener>) -> BotResult<Vec<String>> {
    if listeners.iter().any(|l| Arc::ptr_eq(&l.spec, spec)) {
        debug!("Listener '{}' already attached", spec.trigger);
        return Ok(Vec::new());
    }

    info!(
        "Added listener (user: {}, trigger: {})",
        spec.user.as_deref().unwrap_or("anyone"),
        spec.trigger
    );
    listeners.push(Listener::new(Arc::clone(spec)));
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::{Command, CommandKind};
    use super::*;

    fn spec(user: Option<&str>, temp: bool) -> Arc<ListenerSpec> {
        Arc::new(ListenerSpec {
            trigger: "gg".to_string(),
            user: user.map(str::to_string),
            temp,
            step: Step::reference(echo("relay", "say")),
        })
    }

    #[test]
    fn test_hears_trigger_substring() {
        let listener = Listener::new(spec(None, false));
        assert!(listener.hears("anyone", "that was gg wp"));
        assert!(!listener.hears("anyone", "good game"));
    }

    #[test]
    fn test_user_filter() {
        let listener = Listener::new(spec(Some("host"), false));
        assert!(listener.hears("host", "gg"));
        assert!(!listener.hears("rando", "gg"));
    }

    #[test]
    fn test_fire_passes_message_tokens() {
        let mut harness = Harness::default();
        let listener = Listener::new(spec(None, false));
        let mut ctx = CommandContext::new(&mut harness.state, &mut harness.listeners, &harness.hooks);
        let out = listener.fire("rando", "gg  wp", &mut ctx).unwrap();
        assert_eq!(out, vec!["!say gg wp"]);
    }

    #[test]
    fn test_listener_command_attaches_once() {
        let mut harness = Harness::default();
        let cmd = Command::canonical("watch", CommandKind::Listener { spec: spec(None, true) });

        assert!(harness.run(&cmd, &[]).unwrap().is_empty());
        assert!(harness.run(&cmd, &["again"]).unwrap().is_empty());
        assert_eq!(harness.listeners.len(), 1);
        assert!(harness.listeners[0].is_temp());
        assert_eq!(harness.listeners[0].trigger(), "gg");
    }
}
