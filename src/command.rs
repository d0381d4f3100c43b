//! The state-machine collaborator registry: command names map to an arity
//! spec and a handler, and an opaque `command` byte string is split into an
//! argument vector with shell-style quoting before dispatch.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// Arity spec for a registered command. A positive `n` means exactly `n`
/// arguments (including the command name itself); a negative `-n` means at
/// least `n` arguments.
pub type Arity = i32;

type Handler = Box<dyn Fn(&[String]) + Send + Sync>;

struct Command {
    arity: Arity,
    handler: Handler,
}

/// Maps command names to (arity spec, handler). Populated by the
/// collaborator at startup via [`CommandRegistry::register`]; consulted
/// during apply.
#[derive(Default)]
pub struct CommandRegistry {
    commands: HashMap<String, Command>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a command under `name`. The handler receives the full
    /// argument vector, with `args[0]` equal to `name`.
    pub fn register(&mut self, name: impl Into<String>, arity: Arity, handler: impl Fn(&[String]) + Send + Sync + 'static) {
        self.commands.insert(name.into(), Command { arity, handler: Box::new(handler) });
    }

    /// Looks up and invokes the command named by `args[0]`. Returns
    /// [`Error::UnknownCommand`] or [`Error::BadArity`] without invoking the
    /// handler if the name is unregistered or the argument count doesn't
    /// satisfy the arity spec.
    pub fn dispatch(&self, args: &[String]) -> Result<()> {
        let name = args.first().ok_or_else(|| Error::UnknownCommand(String::new()))?;
        let command = self.commands.get(name.as_str()).ok_or_else(|| Error::UnknownCommand(name.clone()))?;

        let argc = args.len() as i32;
        let arity_ok = if command.arity >= 0 { argc == command.arity } else { argc >= -command.arity };
        if !arity_ok {
            return Err(Error::BadArity { command: name.clone(), argc: args.len() });
        }

        (command.handler)(args);
        Ok(())
    }
}

/// The outcome of applying one entry's command, surfaced to a leader's
/// pending client continuation. Unknown command and bad arity are non-fatal
/// apply-time errors: the entry still counts as applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Applied,
    UnknownCommand(String),
    BadArity { command: String, argc: usize },
}

/// Dispatches an already-split argument vector and converts the result into
/// a non-fatal [`CommandOutcome`] rather than propagating unknown-command or
/// bad-arity as an error. An empty argument vector is a no-op (counts as
/// applied).
pub fn dispatch_parsed(registry: &CommandRegistry, args: &[String]) -> CommandOutcome {
    if args.is_empty() {
        return CommandOutcome::Applied;
    }
    match registry.dispatch(args) {
        Ok(()) => CommandOutcome::Applied,
        Err(Error::UnknownCommand(name)) => CommandOutcome::UnknownCommand(name),
        Err(Error::BadArity { command, argc }) => CommandOutcome::BadArity { command, argc },
        Err(other) => unreachable!("dispatch only returns UnknownCommand/BadArity, got {other:?}"),
    }
}

/// Splits a command byte string into whitespace-separated tokens, with
/// shell-style double-quote and backslash escaping. Empty tokens are
/// dropped.
pub fn split_args(input: &[u8]) -> Result<Vec<String>> {
    let mut result = Vec::new();
    let mut i = 0;
    let len = input.len();

    while i < len {
        while i < len && input[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= len {
            break;
        }

        let mut token = Vec::new();
        if input[i] == b'"' {
            i += 1;
            loop {
                if i >= len {
                    return Err(Error::InvalidFormat("unterminated quoted string in command".into()));
                }
                match input[i] {
                    b'\\' if i + 1 < len => {
                        i += 1;
                        token.push(unescape(input[i]));
                        i += 1;
                    }
                    b'"' => {
                        i += 1;
                        if i < len && !input[i].is_ascii_whitespace() {
                            return Err(Error::InvalidFormat(
                                "unexpected characters after closing quote in command".into(),
                            ));
                        }
                        break;
                    }
                    byte => {
                        token.push(byte);
                        i += 1;
                    }
                }
            }
        } else {
            while i < len && !input[i].is_ascii_whitespace() {
                if input[i] == b'\\' && i + 1 < len {
                    i += 1;
                    token.push(input[i]);
                } else {
                    token.push(input[i]);
                }
                i += 1;
            }
        }

        if !token.is_empty() {
            let token = String::from_utf8(token)
                .map_err(|_| Error::InvalidFormat("command argument is not valid utf8".into()))?;
            result.push(token);
        }
    }

    Ok(result)
}

fn unescape(byte: u8) -> u8 {
    match byte {
        b'n' => b'\n',
        b'r' => b'\r',
        b't' => b'\t',
        b'b' => 0x08,
        b'a' => 0x07,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn splits_plain_whitespace() {
        assert_eq!(split_args(b"x 1").unwrap(), vec!["x", "1"]);
    }

    #[test]
    fn drops_empty_tokens() {
        assert_eq!(split_args(b"  x   1  ").unwrap(), vec!["x", "1"]);
    }

    #[test]
    fn handles_quoted_strings_with_spaces() {
        assert_eq!(split_args(br#"SET "hello world" 1"#).unwrap(), vec!["SET", "hello world", "1"]);
    }

    #[test]
    fn handles_backslash_escapes() {
        assert_eq!(split_args(br"SET x\ y 1").unwrap(), vec!["SET", "x y", "1"]);
    }

    #[test]
    fn handles_quoted_escape_sequences() {
        assert_eq!(split_args(br#"SET "a\nb" 1"#).unwrap(), vec!["SET", "a\nb", "1"]);
    }

    #[test]
    fn rejects_unterminated_quote() {
        assert!(split_args(br#"SET "unterminated"#).is_err());
    }

    #[test]
    fn dispatch_checks_exact_arity() {
        let mut registry = CommandRegistry::new();
        registry.register("SET", 3, |_args| {});
        let err = registry.dispatch(&["SET".into(), "x".into()]).unwrap_err();
        assert!(matches!(err, Error::BadArity { .. }));
    }

    #[test]
    fn dispatch_checks_minimum_arity() {
        let mut registry = CommandRegistry::new();
        registry.register("SET", -2, |_args| {});
        assert!(registry.dispatch(&["SET".into(), "x".into(), "y".into(), "z".into()]).is_ok());
        let err = registry.dispatch(&["SET".into()]).unwrap_err();
        assert!(matches!(err, Error::BadArity { .. }));
    }

    #[test]
    fn dispatch_unknown_command() {
        let registry = CommandRegistry::new();
        let err = registry.dispatch(&["NOPE".into()]).unwrap_err();
        assert!(matches!(err, Error::UnknownCommand(_)));
    }

    #[test]
    fn dispatch_parsed_counts_unknown_as_applied_outcome() {
        let registry = CommandRegistry::new();
        let outcome = dispatch_parsed(&registry, &["NOPE".into()]);
        assert_eq!(outcome, CommandOutcome::UnknownCommand("NOPE".into()));
    }

    #[test]
    fn incr_handler_mutates_shared_state() {
        let counter = Arc::new(AtomicI64::new(0));
        let mut registry = CommandRegistry::new();
        let c = counter.clone();
        registry.register("INCR", 2, move |_args| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        for _ in 0..3 {
            registry.dispatch(&["INCR".into(), "c".into()]).unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }
}
