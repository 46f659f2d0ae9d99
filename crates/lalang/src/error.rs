//! Error plumbing for the compiler and VM.
//!
//! Every fallible operation returns [`RunResult`]; errors are never caught
//! inside the language. Callbacks run by builtins (`if`, `while`, `for`)
//! propagate errors straight through the reentrant `eval`, and the process
//! boundary (the REPL driver) prints the diagnostic and exits non-zero.

use std::{fmt, rc::Rc};

use strum::{Display, IntoStaticStr};

/// Result type alias for operations that can produce a runtime error.
pub type RunResult<T> = Result<T, RunError>;

/// The closed set of error causes.
///
/// Uses strum derives so the kind renders as its conventional name
/// (e.g. `Name` -> "NameError") in diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
pub enum ErrorKind {
    /// Unterminated string literal.
    #[strum(serialize = "LexError")]
    Lex,
    /// Bad integer literal, malformed name, unterminated block, brace-kind
    /// mismatch, local declaration outside a function.
    #[strum(serialize = "ParseError")]
    Parse,
    /// Unknown global, unknown local, missing attribute.
    #[strum(serialize = "NameError")]
    Name,
    /// Coercion failure or unsupported operand type.
    #[strum(serialize = "TypeError")]
    Type,
    /// Out-of-range list/str access after negative wrapping.
    #[strum(serialize = "IndexError")]
    Index,
    /// Value stack underflow/overflow, bad `build`/`unbuild` counts.
    #[strum(serialize = "StackError")]
    Stack,
    /// File or other host resource unavailable.
    #[strum(serialize = "ResourceError")]
    Resource,
    /// Raised by the `error` builtin.
    #[strum(serialize = "UserError")]
    User,
}

/// Source position attached to compile-time diagnostics.
///
/// Rows and columns are stored zero-based and rendered one-based, the way
/// the compiler reports them.
#[derive(Debug, Clone)]
pub struct Position {
    pub filename: Rc<str>,
    pub row: u32,
    pub col: u32,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: row {}: col {}", self.filename, self.row + 1, self.col + 1)
    }
}

/// A terminal error raised by the lexer, compiler, or VM.
#[derive(Debug, Clone)]
pub struct RunError {
    kind: ErrorKind,
    message: String,
    position: Option<Position>,
}

impl RunError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            position: None,
        }
    }

    pub fn lex(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Lex, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse, message)
    }

    pub fn name(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Name, message)
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Type, message)
    }

    pub fn index(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Index, message)
    }

    pub fn stack(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Stack, message)
    }

    pub fn resource(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Resource, message)
    }

    pub fn user(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::User, message)
    }

    /// Attaches a source position, keeping an already-attached one.
    #[must_use]
    pub fn at(mut self, position: Position) -> Self {
        if self.position.is_none() {
            self.position = Some(position);
        }
        self
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(position) = &self.position {
            write!(f, "{position}: ")?;
        }
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for RunError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_renders_one_based() {
        let err = RunError::parse("Unterminated block").at(Position {
            filename: "<stdin>".into(),
            row: 2,
            col: 0,
        });
        assert_eq!(err.to_string(), "<stdin>: row 3: col 1: ParseError: Unterminated block");
    }

    #[test]
    fn kind_names_match_convention() {
        assert_eq!(ErrorKind::Name.to_string(), "NameError");
        assert_eq!(ErrorKind::User.to_string(), "UserError");
    }
}
