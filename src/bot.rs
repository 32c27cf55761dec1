//! # Feature: Bot Dispatch
//!
//! Owns the command table, access lists, state store and listeners, and turns
//! each inbound chat line into outbound lines.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false

use crate::commands::{tokenize, Command, CommandContext, Listener};
use crate::error::BotResult;
use crate::hooks::StateHooks;
use crate::state::StateStore;
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub const DEFAULT_PREFIX: &str = "!";

#[derive(Debug)]
pub struct Bot {
    commands: HashMap<String, Arc<Command>>,
    restricted: HashSet<String>,
    public: HashSet<String>,
    approved_users: HashSet<String>,
    state: StateStore,
    listeners: Vec<Listener>,
    hooks: StateHooks,
    prefix: String,
}

impl Bot {
    pub fn new(
        commands: HashMap<String, Arc<Command>>,
        restricted: HashSet<String>,
        public: HashSet<String>,
        approved_users: impl IntoIterator<Item = String>,
        state: StateStore,
    ) -> Self {
        Bot {
            commands,
            restricted,
            public,
            approved_users: approved_users.into_iter().collect(),
            state,
            listeners: Vec::new(),
            hooks: StateHooks::new(),
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_state_hooks(mut self, hooks: StateHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn command(&self, name: &str) -> Option<&Arc<Command>> {
        self.commands.get(name)
    }

    pub fn command_names(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }

    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    pub fn is_restricted(&self, name: &str) -> bool {
        self.restricted.contains(name)
    }

    pub fn is_public(&self, name: &str) -> bool {
        self.public.contains(name)
    }

    pub fn approve_user(&mut self, user: impl Into<String>) {
        let user = user.into();
        info!("Approved user {}", user);
        self.approved_users.insert(user);
    }

    pub fn is_approved(&self, user: &str) -> bool {
        self.approved_users.contains(user)
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    pub fn listeners(&self) -> &[Listener] {
        &self.listeners
    }

    /// Handle one inbound chat line and return the lines to send back.
    ///
    /// Prefixed lines go to the command table; lines are then offered to the
    /// listeners, except a restricted command from an unapproved user, which
    /// is dropped entirely. Failures are logged, never sent to chat.
    pub fn handle_message(&mut self, user: &str, text: &str) -> Vec<String> {
        let text = text.replace('\r', "");
        let mut outbound = Vec::new();

        if let Some((name, args)) = self.parse_command(&text) {
            if self.is_restricted(&name) && !self.is_approved(user) {
                debug!("Ignoring restricted command '{}' from {}", name, user);
                return outbound;
            }
            match self.do_command(&name, user, &args) {
                Ok(lines) => outbound.extend(lines),
                Err(e) => warn!("Command '{}' from {} failed: {}", name, user, e),
            }
        }

        outbound.extend(self.notify_listeners(user, &text));
        outbound
    }

    /// Invoke a command by name without access checks; unknown names do nothing
    pub fn do_command(&mut self, name: &str, user: &str, args: &[String]) -> BotResult<Vec<String>> {
        let Some(command) = self.commands.get(name).cloned() else {
            debug!("No command named '{}'", name);
            return Ok(Vec::new());
        };

        let mut ctx = CommandContext::new(&mut self.state, &mut self.listeners, &self.hooks);
        command.invoke(user, args, &mut ctx)
    }

    fn parse_command(&self, text: &str) -> Option<(String, Vec<String>)> {
        let rest = text.strip_prefix(self.prefix.as_str())?;
        if rest.starts_with(char::is_whitespace) {
            return None;
        }
        let mut tokens = tokenize(rest);
        if tokens.is_empty() {
            return None;
        }
        let name = tokens.remove(0);
        Some((name, tokens))
    }

    fn notify_listeners(&mut self, user: &str, text: &str) -> Vec<String> {
        let fired: Vec<Listener> = self
            .listeners
            .iter()
            .filter(|l| l.hears(user, text))
            .cloned()
            .collect();
        if fired.is_empty() {
            return Vec::new();
        }

        self.listeners
            .retain(|l| !(l.is_temp() && fired.iter().any(|f| f.same_spec(l))));

        let mut outbound = Vec::new();
        for listener in fired {
            let mut ctx = CommandContext::new(&mut self.state, &mut self.listeners, &self.hooks);
            match listener.fire(user, text, &mut ctx) {
                Ok(lines) => outbound.extend(lines),
                Err(e) => warn!("Listener '{}' failed: {}", listener.trigger(), e),
            }
        }
        outbound
    }
}
