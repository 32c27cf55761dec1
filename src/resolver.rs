//! # Feature: Command Entry Resolution
//!
//! Turns JSON command entries into invokable steps. An entry is one of:
//!
//! - `"name"`: a reference to a command declared earlier
//! - `["name", "arg", ...]`: the same reference with fixed leading arguments
//! - `["ClassTag", initArg, ...]`: an anonymous command built in place
//!
//! Class tags win over command names when the first element of an array is
//! both. Names must be declared before they are referenced; a reference to a
//! later declaration (or to itself) fails the load.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Keyed and positional option branches, listener specs
//! - 1.0.0: Initial single-pass resolver

use crate::commands::{
    ClassTag, Command, CommandKind, ListenerSpec, OptionBranch, Step,
};
use crate::error::{BotError, BotResult};
use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Short names for command classes, from the document's `classes` section
#[derive(Debug, Clone, Default)]
pub struct ClassAliasTable {
    aliases: HashMap<String, ClassTag>,
}

impl ClassAliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(value: &Value) -> BotResult<Self> {
        let section = value
            .as_object()
            .ok_or_else(|| BotError::malformed("'classes' must be an object of alias -> class"))?;

        let mut table = ClassAliasTable::new();
        for (alias, target) in section {
            let target = target.as_str().ok_or_else(|| {
                BotError::malformed(format!("class alias '{alias}' must map to a class name"))
            })?;
            table.insert(alias.clone(), target.parse()?);
        }
        Ok(table)
    }

    pub fn insert(&mut self, alias: impl Into<String>, tag: ClassTag) {
        self.aliases.insert(alias.into(), tag);
    }

    /// Alias lookup first, then canonical tag names
    pub fn lookup(&self, name: &str) -> Option<ClassTag> {
        self.aliases
            .get(name)
            .copied()
            .or_else(|| name.parse().ok())
    }
}

#[derive(Deserialize)]
struct RawListenerSpec {
    trigger: String,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    temp: bool,
    command: Value,
}

/// Commands declared so far plus the class alias table
#[derive(Debug, Default)]
pub struct Environment {
    classes: ClassAliasTable,
    commands: HashMap<String, Arc<Command>>,
}

impl Environment {
    pub fn new(classes: ClassAliasTable) -> Self {
        Environment {
            classes,
            commands: HashMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Command>> {
        self.commands.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    pub fn into_commands(self) -> HashMap<String, Arc<Command>> {
        self.commands
    }

    fn reference(&self, name: &str) -> BotResult<Arc<Command>> {
        self.commands
            .get(name)
            .cloned()
            .ok_or_else(|| BotError::UnresolvedReference(name.to_string()))
    }

    /// Register a named command. Redeclaring a name fails.
    pub fn register(&mut self, command: Command) -> BotResult<Arc<Command>> {
        let name = command.name().to_string();
        if name.is_empty() {
            return Err(BotError::malformed("cannot register an anonymous command"));
        }
        if self.commands.contains_key(&name) {
            return Err(BotError::malformed(format!("command '{name}' is declared twice")));
        }
        if self.classes.lookup(&name).is_some() {
            warn!("Command '{}' shares its name with a command class; array entries starting with it build a new command", name);
        }

        let command = Arc::new(command);
        self.commands.insert(name.clone(), Arc::clone(&command));
        debug!("Registered command '{}' ({})", name, command.class_tag());
        Ok(command)
    }

    /// Build and register a top-level `[ClassTag, name, initArgs...]` entry
    pub fn declare(&mut self, entry: &Value) -> BotResult<Arc<Command>> {
        let items = entry.as_array().ok_or_else(|| {
            BotError::malformed(format!("top-level command must be [Class, name, ...], got {entry}"))
        })?;
        let head = items.first().and_then(Value::as_str).ok_or_else(|| {
            BotError::malformed(format!("top-level command must start with a class name, got {entry}"))
        })?;
        let tag = self.classes.lookup(head).ok_or_else(|| {
            BotError::malformed(format!("'{head}' is not a command class or alias"))
        })?;
        let name = match items.get(1) {
            Some(Value::String(name)) if !name.is_empty() => name.clone(),
            _ => {
                return Err(BotError::malformed(format!(
                    "top-level {head} entry needs a name as its second element"
                )))
            }
        };

        let command = self.construct(tag, head, &name, &items[2..])?;
        self.register(command)
    }

    /// Resolve a command entry found inside a composite command
    pub fn resolve(&self, entry: &Value) -> BotResult<Step> {
        match entry {
            Value::String(name) => Ok(Step::reference(self.reference(name)?)),
            Value::Array(items) => {
                let head = items.first().and_then(Value::as_str).ok_or_else(|| {
                    BotError::malformed(format!("command entry must start with a name, got {entry}"))
                })?;

                if let Some(tag) = self.classes.lookup(head) {
                    let command = self.construct(tag, head, "", &items[1..])?;
                    return Ok(Step::Inline(Box::new(command)));
                }

                let target = self.reference(head)?;
                let prefix_args = strings(head, &items[1..])?;
                Ok(Step::Reference { target, prefix_args })
            }
            other => Err(BotError::malformed(format!(
                "command entry must be a name or an array, got {other}"
            ))),
        }
    }

    fn construct(&self, tag: ClassTag, alias: &str, name: &str, args: &[Value]) -> BotResult<Command> {
        let kind = match tag {
            ClassTag::Echo => CommandKind::Echo {
                target: single_string(tag, args)?,
            },
            ClassTag::Alias => {
                let (target, rest) = args.split_first().ok_or_else(|| {
                    BotError::malformed(format!("{tag} needs the name of the command to alias"))
                })?;
                let target = target.as_str().ok_or_else(|| {
                    BotError::malformed(format!("{tag} target must be a command name, got {target}"))
                })?;
                let fixed_args = strings(target, rest)?
                    .iter()
                    .flat_map(|s| s.split_whitespace().map(str::to_string))
                    .collect();
                CommandKind::Alias {
                    target: self.reference(target)?,
                    fixed_args,
                }
            }
            ClassTag::Sequence => CommandKind::Sequence {
                steps: args.iter().map(|e| self.resolve(e)).collect::<BotResult<_>>()?,
            },
            ClassTag::Option => CommandKind::Option {
                options: args.iter().map(|e| self.option_branch(e)).collect::<BotResult<_>>()?,
            },
            ClassTag::State => {
                let key = match args {
                    [] => name.to_string(),
                    [Value::String(key)] => key.clone(),
                    _ => return Err(BotError::malformed(format!("{tag} takes at most one state key"))),
                };
                if key.is_empty() {
                    return Err(BotError::malformed(format!(
                        "anonymous {tag} needs an explicit state key"
                    )));
                }
                CommandKind::State { key }
            }
            ClassTag::File => CommandKind::File {
                path: PathBuf::from(single_string(tag, args)?),
            },
            ClassTag::Info => CommandKind::Info {
                text: single_string(tag, args)?,
            },
            ClassTag::Format => CommandKind::Format {
                template: single_string(tag, args)?,
            },
            ClassTag::Listener => {
                let [spec] = args else {
                    return Err(BotError::malformed(format!("{tag} takes one listener object")));
                };
                let raw: RawListenerSpec = serde_json::from_value(spec.clone()).map_err(|e| {
                    BotError::malformed(format!("invalid listener for '{name}': {e}"))
                })?;
                if raw.trigger.is_empty() {
                    return Err(BotError::malformed(format!("listener for '{name}' has an empty trigger")));
                }
                CommandKind::Listener {
                    spec: Arc::new(ListenerSpec {
                        trigger: raw.trigger,
                        user: raw.user,
                        temp: raw.temp,
                        step: self.resolve(&raw.command)?,
                    }),
                }
            }
        };

        Ok(Command::new(name, alias, kind))
    }

    /// Option branches: `"name"`, `["name", args...]`, `["Class", ...]` or `[key, entry...]`
    fn option_branch(&self, entry: &Value) -> BotResult<OptionBranch> {
        let items = match entry {
            Value::Array(items) => items,
            _ => return Ok(OptionBranch::unkeyed(self.resolve(entry)?)),
        };
        let head = items.first().and_then(Value::as_str).ok_or_else(|| {
            BotError::malformed(format!("option must start with a name, got {entry}"))
        })?;

        if self.classes.lookup(head).is_some() || self.contains(head) {
            return Ok(OptionBranch::unkeyed(self.resolve(entry)?));
        }

        let step = match &items[1..] {
            [] => return Err(BotError::UnresolvedReference(head.to_string())),
            [single] => self.resolve(single)?,
            rest => self.resolve(&Value::Array(rest.to_vec()))?,
        };
        Ok(OptionBranch::keyed(head, step))
    }
}

fn strings(context: &str, values: &[Value]) -> BotResult<Vec<String>> {
    values
        .iter()
        .map(|v| {
            v.as_str().map(str::to_string).ok_or_else(|| {
                BotError::malformed(format!("arguments for '{context}' must be strings, got {v}"))
            })
        })
        .collect()
}

fn single_string(tag: ClassTag, args: &[Value]) -> BotResult<String> {
    match args {
        [Value::String(s)] => Ok(s.clone()),
        _ => Err(BotError::malformed(format!("{tag} takes exactly one string argument"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env_with(classes: Value, decls: &[Value]) -> Environment {
        let mut env = Environment::new(ClassAliasTable::from_json(&classes).unwrap());
        for decl in decls {
            env.declare(decl).unwrap();
        }
        env
    }

    #[test]
    fn test_alias_table() {
        let table = ClassAliasTable::from_json(&json!({"Seq": "SequenceCommand"})).unwrap();
        assert_eq!(table.lookup("Seq"), Some(ClassTag::Sequence));
        assert_eq!(table.lookup("InfoCommand"), Some(ClassTag::Info));
        assert_eq!(table.lookup("greet"), None);
    }

    #[test]
    fn test_alias_to_unknown_class_fails() {
        let err = ClassAliasTable::from_json(&json!({"X": "LaserCommand"})).unwrap_err();
        assert!(matches!(err, BotError::MalformedConfiguration(_)));
    }

    #[test]
    fn test_declare_registers_name() {
        let env = env_with(json!({"Info": "InfoCommand"}), &[json!(["Info", "greet", "hello!"])]);
        let greet = env.get("greet").unwrap();
        assert_eq!(greet.name(), "greet");
        assert_eq!(greet.class_alias(), "Info");
        assert_eq!(greet.class_tag(), ClassTag::Info);
    }

    #[test]
    fn test_resolve_shapes() {
        let env = env_with(json!({}), &[json!(["EchoCommand", "sg", "game"])]);

        match env.resolve(&json!("sg")).unwrap() {
            Step::Reference { target, prefix_args } => {
                assert_eq!(target.name(), "sg");
                assert!(prefix_args.is_empty());
            }
            other => panic!("expected reference, got {other:?}"),
        }

        match env.resolve(&json!(["sg", "Super", "Mario"])).unwrap() {
            Step::Reference { target, prefix_args } => {
                assert!(Arc::ptr_eq(&target, env.get("sg").unwrap()));
                assert_eq!(prefix_args, vec!["Super", "Mario"]);
            }
            other => panic!("expected reference, got {other:?}"),
        }

        match env.resolve(&json!(["InfoCommand", "hi"])).unwrap() {
            Step::Inline(cmd) => {
                assert!(cmd.is_anonymous());
                assert_eq!(cmd.class_tag(), ClassTag::Info);
            }
            other => panic!("expected inline command, got {other:?}"),
        }
    }

    #[test]
    fn test_class_alias_wins_over_command_name() {
        let mut env = env_with(json!({"say": "InfoCommand"}), &[]);
        env.register(Command::canonical("say", CommandKind::Info { text: "registered".into() }))
            .unwrap();
        assert!(matches!(env.resolve(&json!(["say", "inline"])).unwrap(), Step::Inline(_)));
        assert!(matches!(env.resolve(&json!("say")).unwrap(), Step::Reference { .. }));
    }

    #[test]
    fn test_forward_reference_fails() {
        let mut env = env_with(json!({}), &[]);
        let err = env
            .declare(&json!(["SequenceCommand", "both", "first", "second"]))
            .unwrap_err();
        assert!(matches!(err, BotError::UnresolvedReference(ref name) if name == "first"));
        assert!(!env.contains("both"));
    }

    #[test]
    fn test_self_reference_fails() {
        let mut env = env_with(json!({}), &[]);
        let err = env.declare(&json!(["SequenceCommand", "loop", "loop"])).unwrap_err();
        assert!(matches!(err, BotError::UnresolvedReference(_)));
    }

    #[test]
    fn test_redeclaration_fails() {
        let mut env = env_with(json!({}), &[json!(["InfoCommand", "greet", "hi"])]);
        let err = env.declare(&json!(["InfoCommand", "greet", "hello"])).unwrap_err();
        assert!(matches!(err, BotError::MalformedConfiguration(_)));
    }

    #[test]
    fn test_top_level_must_be_construction() {
        let mut env = env_with(json!({}), &[json!(["InfoCommand", "greet", "hi"])]);
        assert!(env.declare(&json!("greet")).is_err());
        assert!(env.declare(&json!(["greet", "again"])).is_err());
        assert!(env.declare(&json!(["InfoCommand"])).is_err());
    }

    #[test]
    fn test_alias_splits_fixed_args() {
        let env = env_with(
            json!({}),
            &[
                json!(["EchoCommand", "sg", "game"]),
                json!(["AliasCommand", "pkmn", "sg", "Pokemon Ruby/Sapphire"]),
            ],
        );
        match env.get("pkmn").unwrap().kind() {
            CommandKind::Alias { target, fixed_args } => {
                assert_eq!(target.name(), "sg");
                assert_eq!(fixed_args, &vec!["Pokemon".to_string(), "Ruby/Sapphire".to_string()]);
            }
            other => panic!("expected alias, got {other:?}"),
        }
    }

    #[test]
    fn test_state_key_defaults_to_name() {
        let env = env_with(
            json!({}),
            &[json!(["StateCommand", "hp"]), json!(["StateCommand", "st", "title"])],
        );
        assert!(matches!(env.get("hp").unwrap().kind(), CommandKind::State { key } if key == "hp"));
        assert!(matches!(env.get("st").unwrap().kind(), CommandKind::State { key } if key == "title"));
    }

    #[test]
    fn test_option_branch_forms() {
        let env = env_with(
            json!({}),
            &[
                json!(["InfoCommand", "sayA", "A"]),
                json!(["InfoCommand", "sayB", "B"]),
                json!(["OptionCommand", "pick",
                    ["a", "sayA"],
                    ["b", "sayB", "extra"],
                    "sayA",
                    ["InfoCommand", "inline"]
                ]),
            ],
        );
        let CommandKind::Option { options } = env.get("pick").unwrap().kind() else {
            panic!("expected option command");
        };
        assert_eq!(options.len(), 4);
        assert_eq!(options[0].selector.as_deref(), Some("a"));
        assert_eq!(options[1].selector.as_deref(), Some("b"));
        assert!(matches!(&options[1].step, Step::Reference { prefix_args, .. } if prefix_args == &vec!["extra".to_string()]));
        assert_eq!(options[2].selector, None);
        assert!(matches!(options[3].step, Step::Inline(_)));
    }

    #[test]
    fn test_option_key_without_entry_fails() {
        let mut env = env_with(json!({}), &[]);
        let err = env.declare(&json!(["OptionCommand", "pick", ["a"]])).unwrap_err();
        assert!(matches!(err, BotError::UnresolvedReference(_)));
    }

    #[test]
    fn test_listener_spec() {
        let env = env_with(
            json!({}),
            &[
                json!(["EchoCommand", "say", "say"]),
                json!(["ListenerCommand", "watch", {"trigger": "gg", "user": "host", "command": ["say", "nice"]}]),
            ],
        );
        let CommandKind::Listener { spec } = env.get("watch").unwrap().kind() else {
            panic!("expected listener command");
        };
        assert_eq!(spec.trigger, "gg");
        assert_eq!(spec.user.as_deref(), Some("host"));
        assert!(!spec.temp);
    }

    #[test]
    fn test_leaf_arity() {
        let mut env = env_with(json!({}), &[]);
        assert!(env.declare(&json!(["InfoCommand", "x"])).is_err());
        assert!(env.declare(&json!(["InfoCommand", "x", "a", "b"])).is_err());
        assert!(env.declare(&json!(["FileCommand", "f", ["not", "a", "path"]])).is_err());
        assert!(env.declare(&json!(["ListenerCommand", "l", {"user": "x"}])).is_err());
    }
}
