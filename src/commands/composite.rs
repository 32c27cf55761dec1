//! Composite commands: alias, sequence and option.
//!
//! These never talk to the chat themselves; they only decide which other
//! commands run and with what arguments.

use super::{Command, CommandContext, Step};
use crate::error::{BotError, BotResult};
use log::{debug, warn};

/// One selectable branch of an option command
#[derive(Debug)]
pub struct OptionBranch {
    /// Explicit selector; when absent a reference step is selected by its target's name
    pub selector: Option<String>,
    pub step: Step,
}

impl OptionBranch {
    pub fn keyed(selector: impl Into<String>, step: Step) -> Self {
        OptionBranch {
            selector: Some(selector.into()),
            step,
        }
    }

    pub fn unkeyed(step: Step) -> Self {
        OptionBranch {
            selector: None,
            step,
        }
    }

    fn matches(&self, token: &str) -> bool {
        match &self.selector {
            Some(selector) => selector == token,
            None => self.step.target_name() == Some(token),
        }
    }
}

/// Invoke `target` with exactly the fixed arguments, whatever the caller passed
pub fn alias(
    target: &Command,
    fixed_args: &[String],
    user: &str,
    ctx: &mut CommandContext<'_>,
) -> BotResult<Vec<String>> {
    target.invoke(user, fixed_args, ctx)
}

/// Run every step in order with the same arguments.
///
/// A failing step is logged and skipped; the remaining steps still run.
pub fn sequence(
    name: &str,
    steps: &[Step],
    user: &str,
    args: &[String],
    ctx: &mut CommandContext<'_>,
) -> BotResult<Vec<String>> {
    let mut lines = Vec::new();
    let mut failures = Vec::new();

    for (index, step) in steps.iter().enumerate() {
        match step.invoke(user, args, ctx) {
            Ok(out) => lines.extend(out),
            Err(e) => failures.push((index + 1, e)),
        }
    }

    for (position, e) in &failures {
        warn!("Sequence '{}' step {} failed: {}", name, position, e);
    }
    if !failures.is_empty() {
        debug!(
            "Sequence '{}' finished with {}/{} failed steps",
            name,
            failures.len(),
            steps.len()
        );
    }

    Ok(lines)
}

/// Pick a branch by the first argument and run it with the rest
pub fn option(
    name: &str,
    options: &[OptionBranch],
    user: &str,
    args: &[String],
    ctx: &mut CommandContext<'_>,
) -> BotResult<Vec<String>> {
    let Some((selector, rest)) = args.split_first() else {
        return Err(BotError::NoMatchingOption {
            command: name.to_string(),
            selector: String::new(),
        });
    };

    let branch = select(options, selector).ok_or_else(|| BotError::NoMatchingOption {
        command: name.to_string(),
        selector: selector.clone(),
    })?;

    branch.step.invoke(user, rest, ctx)
}

/// Selector lookup: named match first, then 1-based position
fn select<'a>(options: &'a [OptionBranch], token: &str) -> Option<&'a OptionBranch> {
    options.iter().find(|branch| branch.matches(token)).or_else(|| {
        token
            .parse::<usize>()
            .ok()
            .and_then(|position| position.checked_sub(1))
            .and_then(|index| options.get(index))
    })
}
