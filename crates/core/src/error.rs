//! Error taxonomy for L3 programs.
//!
//! Errors carry a [`ErrorKind`] plus a free-text message and format as
//! `<Kind>: <message>`, matching the diagnostics a script author sees.

use std::fmt;

/// The category a runtime error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Reference to an undeclared variable, or redeclaration of an existing one.
    Name,
    /// An operation applied to a value of the wrong type.
    Type,
    /// A value outside the domain an operation accepts (bad index, bad range).
    Value,
    /// An operator or conversion that has no meaning for the operand type(s).
    UnsupportedOperation,
    /// Everything else: assertion failures, arity mismatches, control-flow misuse.
    Runtime,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Name => "NameError",
            ErrorKind::Type => "TypeError",
            ErrorKind::Value => "ValueError",
            ErrorKind::UnsupportedOperation => "UnsupportedOperation",
            ErrorKind::Runtime => "RuntimeError",
        };
        f.write_str(name)
    }
}

/// A runtime error raised while evaluating or executing a program.
#[derive(Debug, Clone)]
pub struct L3Error {
    kind: ErrorKind,
    message: String,
}

impl L3Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn name(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Name, message)
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Type, message)
    }

    pub fn value(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Value, message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnsupportedOperation, message)
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Runtime, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for L3Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for L3Error {}

pub type L3Result<T> = Result<T, L3Error>;
