//! Error taxonomy for loading and invoking commands.
//!
//! Load-time errors are fatal: the loader aborts and no bot is produced.
//! Invocation-time errors are local to a single dispatch cycle; the bot logs
//! them and carries on with the next inbound line.

use std::path::PathBuf;
use thiserror::Error;

pub type BotResult<T> = std::result::Result<T, BotError>;

#[derive(Debug, Error)]
pub enum BotError {
    /// The command document is missing a key or declares something inconsistent
    #[error("malformed configuration: {0}")]
    MalformedConfiguration(String),

    /// A command entry names a command that was never declared (or not yet declared)
    #[error("unresolved reference '{0}': commands must be declared before use")]
    UnresolvedReference(String),

    /// An option command was invoked with a selector that matches none of its options
    #[error("no option matching '{selector}' in command '{command}'")]
    NoMatchingOption { command: String, selector: String },

    /// An echo command has no target to forward to
    #[error("command '{0}' has no echo target")]
    UnknownTarget(String),

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BotError {
    pub fn malformed(message: impl Into<String>) -> Self {
        BotError::MalformedConfiguration(message.into())
    }

    /// Whether this error belongs to loading (fatal) rather than to a single invocation
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BotError::MalformedConfiguration(_) | BotError::UnresolvedReference(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_errors_are_fatal() {
        assert!(BotError::malformed("missing key 'classes'").is_fatal());
        assert!(BotError::UnresolvedReference("ghost".to_string()).is_fatal());
    }

    #[test]
    fn test_invocation_errors_are_not_fatal() {
        let err = BotError::NoMatchingOption {
            command: "pick".to_string(),
            selector: "c".to_string(),
        };
        assert!(!err.is_fatal());
        assert_eq!(err.to_string(), "no option matching 'c' in command 'pick'");
        assert!(!BotError::UnknownTarget("echo".to_string()).is_fatal());
    }
}
