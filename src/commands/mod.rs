//! # Feature: Command Model
//!
//! Commands are the invokable units of a bot. Each one is built from a JSON
//! class tag and carries one of a closed set of behaviors. Leaf commands talk
//! to the chat or the state store; composite commands invoke other commands.
//!
//! Every command is invoked the same way, with the invoking user, the
//! whitespace-separated arguments that followed `!name` in chat, and a
//! [`CommandContext`] giving access to the bot's mutable state. The result is
//! the ordered list of outbound chat lines it produced.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Add FormatCommand and listener registration
//! - 1.0.0: Echo, Alias, Sequence, Option, State, File and Info commands

pub mod composite;
pub mod leaf;
pub mod listener;

use crate::error::{BotError, BotResult};
use crate::hooks::StateHooks;
use crate::state::StateStore;
use log::{debug, warn};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

pub use composite::OptionBranch;
pub use listener::{Listener, ListenerSpec};

/// Canonical class tags, the only values a JSON class alias may point at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassTag {
    Echo,
    Alias,
    Sequence,
    Option,
    State,
    File,
    Info,
    Format,
    Listener,
}

impl ClassTag {
    pub const ALL: [ClassTag; 9] = [
        ClassTag::Echo,
        ClassTag::Alias,
        ClassTag::Sequence,
        ClassTag::Option,
        ClassTag::State,
        ClassTag::File,
        ClassTag::Info,
        ClassTag::Format,
        ClassTag::Listener,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClassTag::Echo => "EchoCommand",
            ClassTag::Alias => "AliasCommand",
            ClassTag::Sequence => "SequenceCommand",
            ClassTag::Option => "OptionCommand",
            ClassTag::State => "StateCommand",
            ClassTag::File => "FileCommand",
            ClassTag::Info => "InfoCommand",
            ClassTag::Format => "FormatCommand",
            ClassTag::Listener => "ListenerCommand",
        }
    }
}

impl fmt::Display for ClassTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClassTag {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ClassTag::ALL
            .iter()
            .copied()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| BotError::malformed(format!("'{s}' is not a command class")))
    }
}

/// Mutable bot resources a command may touch while it runs
pub struct CommandContext<'a> {
    pub state: &'a mut StateStore,
    pub listeners: &'a mut Vec<Listener>,
    hooks: &'a StateHooks,
    /// Keys whose change hook is running
    firing: Vec<String>,
}

impl<'a> CommandContext<'a> {
    pub fn new(
        state: &'a mut StateStore,
        listeners: &'a mut Vec<Listener>,
        hooks: &'a StateHooks,
    ) -> Self {
        CommandContext {
            state,
            listeners,
            hooks,
            firing: Vec::new(),
        }
    }

    /// Store the joined arguments under `key`, running its change hook if the value changed
    pub fn set_state(&mut self, user: &str, key: &str, args: &[String]) -> BotResult<Vec<String>> {
        if !leaf::set_state(key, args, self.state) {
            return Ok(Vec::new());
        }

        let hooks = self.hooks;
        let Some(step) = hooks.get(key) else {
            return Ok(Vec::new());
        };
        if self.firing.iter().any(|k| k == key) {
            debug!("Change hook for '{}' is already running", key);
            return Ok(Vec::new());
        }

        let value = tokenize(self.state.get(key).unwrap_or_default());
        self.firing.push(key.to_string());
        let result = step.invoke(user, &value, self);
        self.firing.pop();

        match result {
            Ok(lines) => Ok(lines),
            Err(e) => {
                warn!("Change hook for '{}' failed: {}", key, e);
                Ok(Vec::new())
            }
        }
    }
}

/// Behavior of a command, one variant per class tag
#[derive(Debug)]
pub enum CommandKind {
    Echo { target: String },
    Alias { target: Arc<Command>, fixed_args: Vec<String> },
    Sequence { steps: Vec<Step> },
    Option { options: Vec<OptionBranch> },
    State { key: String },
    File { path: PathBuf },
    Info { text: String },
    Format { template: String },
    Listener { spec: Arc<ListenerSpec> },
}

impl CommandKind {
    pub fn class_tag(&self) -> ClassTag {
        match self {
            CommandKind::Echo { .. } => ClassTag::Echo,
            CommandKind::Alias { .. } => ClassTag::Alias,
            CommandKind::Sequence { .. } => ClassTag::Sequence,
            CommandKind::Option { .. } => ClassTag::Option,
            CommandKind::State { .. } => ClassTag::State,
            CommandKind::File { .. } => ClassTag::File,
            CommandKind::Info { .. } => ClassTag::Info,
            CommandKind::Format { .. } => ClassTag::Format,
            CommandKind::Listener { .. } => ClassTag::Listener,
        }
    }
}

#[derive(Debug)]
pub struct Command {
    name: String,
    class_alias: String,
    kind: CommandKind,
}

impl Command {
    /// Build a command. `class_alias` is the JSON tag it was declared with;
    /// an empty `name` makes it anonymous.
    pub fn new(name: impl Into<String>, class_alias: impl Into<String>, kind: CommandKind) -> Self {
        Command {
            name: name.into(),
            class_alias: class_alias.into(),
            kind,
        }
    }

    /// Build a command declared with its canonical class tag
    pub fn canonical(name: impl Into<String>, kind: CommandKind) -> Self {
        let alias = kind.class_tag().as_str();
        Command::new(name, alias, kind)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_anonymous(&self) -> bool {
        self.name.is_empty()
    }

    pub fn class_alias(&self) -> &str {
        &self.class_alias
    }

    pub fn class_tag(&self) -> ClassTag {
        self.kind.class_tag()
    }

    pub fn kind(&self) -> &CommandKind {
        &self.kind
    }

    /// Run the command for `user` with `args`, returning the outbound chat lines
    pub fn invoke(
        &self,
        user: &str,
        args: &[String],
        ctx: &mut CommandContext<'_>,
    ) -> BotResult<Vec<String>> {
        match &self.kind {
            CommandKind::Echo { target } => leaf::echo(&self.name, target, args),
            CommandKind::Alias { target, fixed_args } => {
                composite::alias(target, fixed_args, user, ctx)
            }
            CommandKind::Sequence { steps } => composite::sequence(&self.name, steps, user, args, ctx),
            CommandKind::Option { options } => composite::option(&self.name, options, user, args, ctx),
            CommandKind::State { key } => ctx.set_state(user, key, args),
            CommandKind::File { path } => leaf::write_file(path, args),
            CommandKind::Info { text } => Ok(vec![text.clone()]),
            CommandKind::Format { template } => Ok(vec![leaf::format_state(template, ctx.state)]),
            CommandKind::Listener { spec } => listener::attach(spec, ctx.listeners),
        }
    }
}

/// One invokable unit inside a composite command
#[derive(Debug)]
pub enum Step {
    /// A registered command, with fixed arguments prepended to the caller's
    Reference {
        target: Arc<Command>,
        prefix_args: Vec<String>,
    },
    /// An anonymous command owned by the composite that declares it
    Inline(Box<Command>),
}

impl Step {
    pub fn reference(target: Arc<Command>) -> Self {
        Step::Reference {
            target,
            prefix_args: Vec::new(),
        }
    }

    /// Name of the referenced command; anonymous steps have none
    pub fn target_name(&self) -> Option<&str> {
        match self {
            Step::Reference { target, .. } => Some(target.name()),
            Step::Inline(_) => None,
        }
    }

    pub fn invoke(
        &self,
        user: &str,
        args: &[String],
        ctx: &mut CommandContext<'_>,
    ) -> BotResult<Vec<String>> {
        match self {
            Step::Reference { target, prefix_args } if prefix_args.is_empty() => {
                target.invoke(user, args, ctx)
            }
            Step::Reference { target, prefix_args } => {
                let full: Vec<String> = prefix_args.iter().chain(args.iter()).cloned().collect();
                target.invoke(user, &full, ctx)
            }
            Step::Inline(command) => command.invoke(user, args, ctx),
        }
    }
}

/// Split on whitespace with no quoting rules
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}
