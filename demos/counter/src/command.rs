//! Parsing of the terminal front end's input lines.
//!
//! Accepted forms:
//!
//! - `+`, `inc`, `-`, `dec`: increment / decrement shortcuts
//! - `*`, `x`, `mul`: multiply by the count observed right before dispatch
//! - `{"type": "...", "payload": ...}`: an envelope in JSON form
//! - `<name> [argument]`: dispatch by name; the argument is read as JSON and
//!   falls back to a plain string
//! - `history`, `help`, `quit`/`exit`

use serde_json::Value;
use tally_core::action::Envelope;
use thiserror::Error;

/// One parsed input line
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Dispatch an envelope to the store
    Dispatch(Envelope),
    /// Multiply by the count read just before dispatching
    MultiplyByLast,
    /// Print recorded snapshots
    History,
    /// Print the accepted commands
    Help,
    /// End the session
    Quit,
}

/// Input lines that could not be parsed
#[derive(Error, Debug)]
pub enum CommandError {
    /// The line looked like JSON but was not a valid envelope
    #[error("Invalid action JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// An argument after a shortcut, or more than one after an action name
    #[error("Too many arguments: {0}")]
    TooManyArguments(usize),
}

/// Parse one input line
///
/// Returns `Ok(None)` for a blank line.
///
/// # Errors
///
/// Returns [`CommandError`] for malformed JSON or extra arguments.
pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    if line.starts_with('{') {
        return Ok(Some(Command::Dispatch(serde_json::from_str(line)?)));
    }

    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();

    let command = match (name, rest.as_slice()) {
        ("+" | "inc", []) => Command::Dispatch(Envelope::new("increment")),
        ("-" | "dec", []) => Command::Dispatch(Envelope::new("decrement")),
        ("*" | "x" | "mul", []) => Command::MultiplyByLast,
        ("history", []) => Command::History,
        ("help" | "?", []) => Command::Help,
        ("quit" | "exit", []) => Command::Quit,
        (
            "+" | "inc" | "-" | "dec" | "*" | "x" | "mul" | "history" | "help" | "?" | "quit"
            | "exit",
            extra,
        ) => return Err(CommandError::TooManyArguments(extra.len())),
        (name, []) => Command::Dispatch(Envelope::new(name)),
        (name, [argument]) => Command::Dispatch(Envelope {
            kind: name.to_string(),
            payload: Some(parse_argument(argument)),
        }),
        (_, extra) => return Err(CommandError::TooManyArguments(extra.len())),
    };

    Ok(Some(command))
}

fn parse_argument(argument: &str) -> Value {
    serde_json::from_str(argument).unwrap_or_else(|_| Value::String(argument.to_string()))
}

/// Help text listing the accepted commands
#[must_use]
pub fn help(known_actions: &[&str]) -> String {
    format!(
        "Commands:\n  \
         + | inc             increment\n  \
         - | dec             decrement\n  \
         * | x | mul         multiply by the current count\n  \
         <action> [arg]      dispatch by name ({})\n  \
         {{\"type\": ..}}       dispatch a JSON envelope\n  \
         history             show recorded snapshots\n  \
         quit | exit         leave",
        known_actions.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_blank_lines() {
        assert_eq!(parse("").unwrap(), None);
        assert_eq!(parse("   \t").unwrap(), None);
    }

    #[test]
    fn test_shortcuts() {
        assert_eq!(
            parse("+").unwrap(),
            Some(Command::Dispatch(Envelope::new("increment")))
        );
        assert_eq!(
            parse(" dec ").unwrap(),
            Some(Command::Dispatch(Envelope::new("decrement")))
        );
        assert_eq!(parse("x").unwrap(), Some(Command::MultiplyByLast));
        assert_eq!(parse("history").unwrap(), Some(Command::History));
        assert_eq!(parse("exit").unwrap(), Some(Command::Quit));
    }

    #[test]
    fn test_named_action_with_argument() {
        assert_eq!(
            parse("multiplyByLast 3").unwrap(),
            Some(Command::Dispatch(Envelope::new("multiplyByLast").with_payload(3)))
        );
        assert_eq!(
            parse("multiplyByLast 2.5").unwrap(),
            Some(Command::Dispatch(Envelope::new("multiplyByLast").with_payload(2.5)))
        );
        assert_eq!(
            parse("multiplyByLast three").unwrap(),
            Some(Command::Dispatch(Envelope::new("multiplyByLast").with_payload("three")))
        );
    }

    #[test]
    fn test_unknown_names_pass_through() {
        assert_eq!(
            parse("noop").unwrap(),
            Some(Command::Dispatch(Envelope::new("noop")))
        );
    }

    #[test]
    fn test_json_envelope() {
        let command = parse(r#"{"type": "MULTI_COUNT", "payload": -2}"#).unwrap();
        assert_eq!(
            command,
            Some(Command::Dispatch(Envelope {
                kind: "MULTI_COUNT".to_string(),
                payload: Some(json!(-2)),
            }))
        );
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(parse("{\"payload\": 2}"), Err(CommandError::Json(_))));
        assert!(matches!(parse("{not json"), Err(CommandError::Json(_))));
    }

    #[test]
    fn test_too_many_arguments() {
        assert!(matches!(
            parse("multiplyByLast 2 3"),
            Err(CommandError::TooManyArguments(2))
        ));
    }

    #[test]
    fn test_shortcuts_take_no_argument() {
        assert!(matches!(parse("+ 1"), Err(CommandError::TooManyArguments(1))));
        assert!(matches!(parse("inc 5"), Err(CommandError::TooManyArguments(1))));
        assert!(matches!(parse("mul 2"), Err(CommandError::TooManyArguments(1))));
        assert!(matches!(parse("quit now"), Err(CommandError::TooManyArguments(1))));
        assert_eq!(
            parse("increment").unwrap(),
            Some(Command::Dispatch(Envelope::new("increment")))
        );
    }

    #[test]
    fn test_help_lists_actions() {
        let text = help(&["increment", "decrement"]);
        assert!(text.contains("increment, decrement"));
        assert!(text.contains("{\"type\": ..}"));
    }
}
