//! Text commands that adjust detection tunables.
//!
//! `set-confidence-offsets <n0> .. <n5>`, `set-confidence-threshold <n>` and
//! `set-inactivity-timeout <ms>`. Arguments are whitespace separated and
//! parsed from their leading digits, so trailing punctuation from a raw JSON
//! payload is tolerated.

use core::fmt;

use crate::config::CLASS_COUNT;
use crate::domain::tunables::ControlCommand;

const OFFSETS_CMD: &str = "set-confidence-offsets ";
const THRESHOLD_CMD: &str = "set-confidence-threshold ";
const INACTIVITY_CMD: &str = "set-inactivity-timeout ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    Unknown,
    InvalidArgument,
    WrongArgumentCount { expected: usize, found: usize },
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Unknown => write!(f, "unknown command"),
            CommandError::InvalidArgument => write!(f, "invalid argument"),
            CommandError::WrongArgumentCount { expected, found } => {
                write!(f, "expected {} arguments, found {}", expected, found)
            }
        }
    }
}

/// Find a tunables command in `text`.
pub fn parse_command(text: &str) -> Result<ControlCommand, CommandError> {
    if let Some(args) = arguments(text, OFFSETS_CMD) {
        let mut offsets = [0; CLASS_COUNT];
        let mut found = 0;
        for token in args.split_whitespace().take(CLASS_COUNT) {
            offsets[found] = leading_int(token).ok_or(CommandError::InvalidArgument)?;
            found += 1;
        }
        if found < CLASS_COUNT {
            return Err(CommandError::WrongArgumentCount {
                expected: CLASS_COUNT,
                found,
            });
        }
        return Ok(ControlCommand::SetConfidenceOffsets(offsets));
    }

    if let Some(args) = arguments(text, THRESHOLD_CMD) {
        return single_int(args).map(ControlCommand::SetConfidenceThreshold);
    }

    if let Some(args) = arguments(text, INACTIVITY_CMD) {
        return single_int(args).map(ControlCommand::SetInactivityTimeout);
    }

    Err(CommandError::Unknown)
}

fn arguments<'t>(text: &'t str, keyword: &str) -> Option<&'t str> {
    text.find(keyword).map(|at| &text[at + keyword.len()..])
}

fn single_int(args: &str) -> Result<i32, CommandError> {
    let token = args.split_whitespace().next().ok_or(CommandError::WrongArgumentCount {
        expected: 1,
        found: 0,
    })?;
    leading_int(token).ok_or(CommandError::InvalidArgument)
}

/// Parse an optionally signed decimal prefix of `token`.
fn leading_int(token: &str) -> Option<i32> {
    let sign_len = usize::from(token.starts_with(['-', '+']));
    let digits = token[sign_len..].bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    token[..sign_len + digits].parse().ok()
}
