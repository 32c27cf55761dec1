//! # Feature: Command Document Loader
//!
//! Builds a [`Bot`] from a JSON command document in a single top-to-bottom
//! pass. Any error aborts the load; a partially built bot is never returned.
//!
//! Required keys: `classes`, `approved_users`, `restricted`, `public`,
//! `commands`. Optional: `state` (initial state values) and
//! `on_state_change` (state key -> command entry, see [`crate::hooks`]).
//! Repeating a key inside `commands` or `on_state_change` fails the load.
//!
//! ```json
//! {
//!   "classes": {"Info": "InfoCommand"},
//!   "approved_users": ["mod1"],
//!   "commands": [
//!     ["Info", "greet", "hello!"],
//!     ["StateCommand", "hp"]
//!   ],
//!   "restricted": ["hp"],
//!   "public": ["greet", ["Info", "rules", "be nice"]]
//! }
//! ```
//!
//! Items in `restricted`/`public` are either names declared in `commands`
//! or inline declarations, which are registered in place.
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.2.0: State change hooks, repeated keys rejected
//! - 1.1.0: Object form for `commands`, inline declarations in access lists, initial state
//! - 1.0.0: Initial loader

use crate::bot::Bot;
use crate::error::{BotError, BotResult};
use crate::hooks::StateHooks;
use crate::resolver::{ClassAliasTable, Environment};
use crate::state::StateStore;
use log::{error, info};
use serde::de::{self, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

pub const CLASSES: &str = "classes";
pub const APPROVED_USERS: &str = "approved_users";
pub const RESTRICTED: &str = "restricted";
pub const PUBLIC: &str = "public";
pub const COMMANDS: &str = "commands";
pub const STATE: &str = "state";
pub const ON_STATE_CHANGE: &str = "on_state_change";

const REQUIRED_KEYS: [&str; 5] = [CLASSES, APPROVED_USERS, RESTRICTED, PUBLIC, COMMANDS];

/// Load a bot from a JSON file on disk
pub fn load_file<P: AsRef<Path>>(path: P) -> BotResult<Bot> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| {
        BotError::malformed(format!("failed to read command file {}: {e}", path.display()))
    })?;
    let bot = load_str(&text)?;
    info!(
        "Loaded {} command(s) from {}",
        bot.command_count(),
        path.display()
    );
    Ok(bot)
}

pub fn load_str(text: &str) -> BotResult<Bot> {
    let document: Value = serde_json::from_str(text)
        .map_err(|e| BotError::malformed(format!("command document is not valid JSON: {e}")))?;
    if document.is_object() {
        serde_json::from_str::<KeyedSections>(text)
            .map_err(|e| BotError::malformed(format!("invalid command document: {e}")))
            .inspect_err(|e| error!("Failed to load command document: {e}"))?;
    }
    load(&document)
}

pub fn load(document: &Value) -> BotResult<Bot> {
    load_document(document).inspect_err(|e| error!("Failed to load command document: {e}"))
}

fn load_document(document: &Value) -> BotResult<Bot> {
    let root = document
        .as_object()
        .ok_or_else(|| BotError::malformed("command document must be a JSON object"))?;

    for key in REQUIRED_KEYS {
        if !root.contains_key(key) {
            return Err(BotError::malformed(format!("missing required key '{key}'")));
        }
    }

    let classes = ClassAliasTable::from_json(&root[CLASSES])?;
    let mut env = Environment::new(classes);

    declare_commands(&mut env, &root[COMMANDS])?;

    let restricted = partition(&mut env, &root[RESTRICTED], RESTRICTED)?;
    let public = partition(&mut env, &root[PUBLIC], PUBLIC)?;
    if let Some(name) = restricted.intersection(&public).next() {
        return Err(BotError::malformed(format!(
            "command '{name}' is listed as both restricted and public"
        )));
    }

    let hooks = match root.get(ON_STATE_CHANGE) {
        Some(section) => state_hooks(&env, section)?,
        None => StateHooks::new(),
    };
    if !hooks.is_empty() {
        info!("Registered {} state change hook(s)", hooks.len());
    }

    let approved_users = string_list(&root[APPROVED_USERS], APPROVED_USERS)?;
    let state = match root.get(STATE) {
        Some(value) => initial_state(value)?,
        None => StateStore::new(),
    };

    let bot = Bot::new(env.into_commands(), restricted, public, approved_users, state)
        .with_state_hooks(hooks);
    for name in bot.command_names() {
        if !bot.is_restricted(name) && !bot.is_public(name) {
            info!("Command '{}' is not listed as public or restricted; anyone may invoke it", name);
        }
    }

    Ok(bot)
}

fn declare_commands(env: &mut Environment, section: &Value) -> BotResult<()> {
    match section {
        Value::Array(entries) => {
            for entry in entries {
                env.declare(entry)?;
            }
            Ok(())
        }
        Value::Object(entries) => declare_named(env, entries),
        _ => Err(BotError::malformed(format!(
            "'{COMMANDS}' must be a list or an object of command entries"
        ))),
    }
}

/// Object form: the key must repeat the name carried by the entry
fn declare_named(env: &mut Environment, entries: &Map<String, Value>) -> BotResult<()> {
    for (key, entry) in entries {
        let declared = entry.get(1).and_then(Value::as_str);
        if declared != Some(key.as_str()) {
            return Err(BotError::malformed(format!(
                "command '{key}' must be declared as [Class, \"{key}\", ...]"
            )));
        }
        env.declare(entry)?;
    }
    Ok(())
}

fn partition(env: &mut Environment, section: &Value, list: &str) -> BotResult<HashSet<String>> {
    let items = section
        .as_array()
        .ok_or_else(|| BotError::malformed(format!("'{list}' must be a list")))?;

    let mut names = HashSet::new();
    for item in items {
        let name = match item {
            Value::String(name) => {
                if !env.contains(name) {
                    return Err(BotError::malformed(format!(
                        "'{list}' lists '{name}', which was never declared"
                    )));
                }
                name.clone()
            }
            Value::Array(_) => env.declare(item)?.name().to_string(),
            other => {
                return Err(BotError::malformed(format!(
                    "'{list}' items must be names or command entries, got {other}"
                )))
            }
        };
        names.insert(name);
    }
    Ok(names)
}

/// Hooks resolve after every command is declared, so any name may be hooked
fn state_hooks(env: &Environment, section: &Value) -> BotResult<StateHooks> {
    let entries = section.as_object().ok_or_else(|| {
        BotError::malformed(format!("'{ON_STATE_CHANGE}' must be an object of state key -> command"))
    })?;

    let mut hooks = StateHooks::new();
    for (key, entry) in entries {
        if key.is_empty() {
            return Err(BotError::malformed(format!("'{ON_STATE_CHANGE}' keys must be non-empty")));
        }
        hooks.insert(key.clone(), env.resolve(entry)?);
    }
    Ok(hooks)
}

fn string_list(section: &Value, key: &str) -> BotResult<Vec<String>> {
    section
        .as_array()
        .ok_or_else(|| BotError::malformed(format!("'{key}' must be a list of strings")))?
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| BotError::malformed(format!("'{key}' must be a list of strings, got {v}")))
        })
        .collect()
}

// ============================================================================
// Repeated Keys
// ============================================================================

/// Name-keyed sections, read from the raw text since `Value` keeps only the
/// last of any repeated keys
#[derive(Deserialize)]
struct KeyedSections {
    #[serde(rename = "commands", default)]
    _commands: Option<UniqueKeys>,
    #[serde(rename = "on_state_change", default)]
    _on_state_change: Option<UniqueKeys>,
}

/// Accepts any list, or an object whose keys are all distinct
struct UniqueKeys;

impl<'de> Deserialize<'de> for UniqueKeys {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct UniqueKeysVisitor;

        impl<'de> Visitor<'de> for UniqueKeysVisitor {
            type Value = UniqueKeys;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a list or an object of command entries")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<UniqueKeys, A::Error>
            where
                A: SeqAccess<'de>,
            {
                while seq.next_element::<IgnoredAny>()?.is_some() {}
                Ok(UniqueKeys)
            }

            fn visit_map<M>(self, mut map: M) -> Result<UniqueKeys, M::Error>
            where
                M: MapAccess<'de>,
            {
                let mut seen = HashSet::new();
                while let Some(key) = map.next_key::<String>()? {
                    if !seen.insert(key.clone()) {
                        return Err(de::Error::custom(format!("'{key}' is declared twice")));
                    }
                    map.next_value::<IgnoredAny>()?;
                }
                Ok(UniqueKeys)
            }
        }

        deserializer.deserialize_any(UniqueKeysVisitor)
    }
}

fn initial_state(section: &Value) -> BotResult<StateStore> {
    let values = section
        .as_object()
        .ok_or_else(|| BotError::malformed(format!("'{STATE}' must be an object")))?;

    values
        .iter()
        .map(|(key, value)| match value {
            Value::String(s) => Ok((key.clone(), s.clone())),
            other => Err(BotError::malformed(format!(
                "state value for '{key}' must be a string, got {other}"
            ))),
        })
        .collect()
}
