//! Leaf commands: the ones that act on chat, state or files directly.

use crate::error::{BotError, BotResult};
use crate::state::StateStore;
use log::info;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::fs;
use std::path::Path;

/// Prefix used when forwarding to another bot's command
pub const ECHO_PREFIX: &str = "!";

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z0-9_]+)\}").expect("Invalid regex"));

/// Forward the arguments to `target` as a chat command for another bot
pub fn echo(name: &str, target: &str, args: &[String]) -> BotResult<Vec<String>> {
    if target.is_empty() {
        return Err(BotError::UnknownTarget(name.to_string()));
    }
    Ok(vec![format!("{ECHO_PREFIX}{target} {}", args.join(" "))])
}

/// Store the joined arguments under `key`; true when the stored value changed
pub fn set_state(key: &str, args: &[String], state: &mut StateStore) -> bool {
    let value = args.join(" ");
    state.set(key, value.as_str()).as_deref() != Some(value.as_str())
}

/// Replace the whole file with the joined arguments
pub fn write_file(path: &Path, args: &[String]) -> BotResult<Vec<String>> {
    let contents = args.join(" ");
    fs::write(path, &contents).map_err(|source| BotError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Wrote {} bytes to {}", contents.len(), path.display());
    Ok(Vec::new())
}

/// Substitute `{key}` placeholders with state values; unknown keys render empty
pub fn format_state(template: &str, state: &StateStore) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            state.get(&caps[1]).unwrap_or_default().to_string()
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_echo_forwards_arguments() {
        let out = echo("st", "title", &args(&["Any%", "runs"])).unwrap();
        assert_eq!(out, vec!["!title Any% runs"]);
    }

    #[test]
    fn test_echo_without_args_still_succeeds() {
        assert_eq!(echo("sg", "game", &[]).unwrap(), vec!["!game "]);
    }

    #[test]
    fn test_echo_empty_target_fails() {
        let err = echo("broken", "", &args(&["x"])).unwrap_err();
        assert!(matches!(err, BotError::UnknownTarget(ref name) if name == "broken"));
    }

    #[test]
    fn test_set_state_joins_args() {
        let mut state = StateStore::new();
        assert!(set_state("title", &args(&["Speed", "runs"]), &mut state));
        assert_eq!(state.get("title"), Some("Speed runs"));
        assert!(!set_state("title", &args(&["Speed", "runs"]), &mut state));
        assert!(set_state("title", &args(&[]), &mut state));
        assert_eq!(state.get("title"), Some(""));
    }

    #[test]
    fn test_write_file_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("panel.txt");
        write_file(&path, &args(&["a", "much", "longer", "first", "value"])).unwrap();
        write_file(&path, &args(&["short"])).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "short");
    }

    #[test]
    fn test_write_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("panel.txt");
        let err = write_file(&path, &args(&["x"])).unwrap_err();
        assert!(matches!(err, BotError::Io { .. }));
        assert!(err.to_string().contains("panel.txt"));
    }

    #[test]
    fn test_format_state() {
        let mut state = StateStore::new();
        state.set("title", "Smash");
        state.set("game", "SSB64");
        assert_eq!(
            format_state("{title} - {game} {missing}!", &state),
            "Smash - SSB64 !"
        );
        assert_eq!(format_state("no placeholders", &state), "no placeholders");
    }
}
