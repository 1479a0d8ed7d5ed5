// ABOUTME: Error taxonomy for the scanning, parsing and evaluation stages

use crate::scanner::TokenKind;
use crate::value::Value;
use std::fmt;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A 1-based line/column pair pointing into the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

/// The pipeline stage an error originated from, as printed in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Scanning,
    Parsing,
    Evaluation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Scanning => write!(f, "Scanning"),
            Stage::Parsing => write!(f, "Parsing"),
            Stage::Evaluation => write!(f, "Evaluation"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ErrorKind {
    // ===== Scanner errors =====
    #[error("Start of invalid token")]
    InvalidToken,

    // ===== Parser errors =====
    #[error("Expected '{expected}' token but got '{received}' token")]
    UnexpectedToken {
        expected: TokenKind,
        received: TokenKind,
    },

    #[error("Expected primary expression but received '{received}' token")]
    ExpectedPrimaryExpression { received: TokenKind },

    #[error("Invalid escape sequence '{sequence}'")]
    InvalidEscapeSequence { sequence: String },

    // ===== Evaluation errors =====
    #[error("Undefined value '{name}'")]
    UndefinedValue { name: String },

    #[error("Can't apply unary operator '{operation}' to value of type '{operand}'")]
    BadUnary {
        operation: &'static str,
        operand: String,
    },

    #[error("Can't apply binary operator '{operation}' to values of types '{left}' and '{right}'")]
    BadBinary {
        operation: &'static str,
        left: String,
        right: String,
    },

    #[error("Can't convert value of type '{value}' to '{target}'")]
    BadCast {
        value: String,
        target: &'static str,
    },

    #[error("Value of type '{value}' is not callable")]
    NotCallable { value: String },

    #[error("Operation '{operation}' is not supported by value of type '{operand}'")]
    Unsupported { operand: String, operation: String },

    #[error("Array index out of range")]
    InvalidIndex,

    #[error("Left-hand side of assignment must be a variable")]
    InvalidAssignmentTarget,

    #[error("Function '{function}' expects at least {expected} arguments but received {received}")]
    NotEnoughArguments {
        function: String,
        expected: usize,
        received: usize,
    },

    #[error("Function '{function}' expects at most {expected} arguments but received {received}")]
    TooManyArguments {
        function: String,
        expected: usize,
        received: usize,
    },

    #[error("Parameter '{parameter}' of function '{function}' requires a default value")]
    MissingDefaultArgument { function: String, parameter: String },

    #[error("Integer value {value} does not fit into native type '{target}'")]
    IntegerConversionOverflow {
        value: String,
        target: &'static str,
    },

    #[error("Float value {value} does not fit into native type '{target}'")]
    FloatConversionOverflow {
        value: String,
        target: &'static str,
    },

    #[error("Division by zero")]
    DivisionByZero,

    // ===== Native bridge errors =====
    #[error("Failed to load native library '{library}' ({reason})")]
    LibraryLoading { library: String, reason: String },

    #[error("Failed to load symbol '{symbol}' from native library '{library}' ({reason})")]
    SymbolNotFound {
        library: String,
        symbol: String,
        reason: String,
    },

    #[error("Native type name '{name}' is currently not supported")]
    UnknownNativeTypeName { name: String },

    #[error("void used as argument type for native function")]
    VoidAsArgumentType,
}

impl ErrorKind {
    /// The pipeline stage this kind of error belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            ErrorKind::InvalidToken => Stage::Scanning,
            ErrorKind::UnexpectedToken { .. }
            | ErrorKind::ExpectedPrimaryExpression { .. }
            | ErrorKind::InvalidEscapeSequence { .. } => Stage::Parsing,
            _ => Stage::Evaluation,
        }
    }
}

/// An error carrying its kind plus the source location it was first tagged
/// with. Errors bubble up from the leaves; the innermost AST node that sees
/// an untagged error stamps its own position onto it.
#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    pub kind: ErrorKind,
    pub location: Option<Location>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Error {
            kind,
            location: None,
        }
    }

    pub fn at(kind: ErrorKind, line: u32, column: u32) -> Self {
        Error {
            kind,
            location: Some(Location { line, column }),
        }
    }

    /// Attaches a location unless one is already present.
    pub fn with_location(mut self, line: u32, column: u32) -> Self {
        if self.location.is_none() {
            self.location = Some(Location { line, column });
        }
        self
    }

    pub fn stage(&self) -> Stage {
        self.kind.stage()
    }

    // ===== Constructors used by the value operation dispatch =====

    pub fn bad_unary(operation: &'static str, operand: &Value) -> Self {
        Error::new(ErrorKind::BadUnary {
            operation,
            operand: operand.type_name().to_string(),
        })
    }

    pub fn bad_binary(operation: &'static str, left: &Value, right: &Value) -> Self {
        Error::new(ErrorKind::BadBinary {
            operation,
            left: left.type_name().to_string(),
            right: right.type_name().to_string(),
        })
    }

    pub fn bad_cast(value: &Value, target: &'static str) -> Self {
        Error::new(ErrorKind::BadCast {
            value: value.type_name().to_string(),
            target,
        })
    }

    pub fn not_callable(value: &Value) -> Self {
        Error::new(ErrorKind::NotCallable {
            value: value.type_name().to_string(),
        })
    }

    pub fn unsupported(operand: &Value, operation: impl Into<String>) -> Self {
        Error::new(ErrorKind::Unsupported {
            operand: operand.type_name().to_string(),
            operation: operation.into(),
        })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(
                f,
                "[{}:{}] {} error : {}",
                loc.line,
                loc.column,
                self.stage(),
                self.kind
            ),
            None => write!(f, "{} error : {}", self.stage(), self.kind),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_format_with_location() {
        let err = Error::at(
            ErrorKind::UndefinedValue {
                name: "x".to_string(),
            },
            3,
            7,
        );
        assert_eq!(
            format!("{}", err),
            "[3:7] Evaluation error : Undefined value 'x'"
        );
    }

    #[test]
    fn test_stage_assignment() {
        assert_eq!(Error::new(ErrorKind::InvalidToken).stage(), Stage::Scanning);
        assert_eq!(
            Error::new(ErrorKind::InvalidEscapeSequence {
                sequence: "\\z".to_string()
            })
            .stage(),
            Stage::Parsing
        );
        assert_eq!(
            Error::new(ErrorKind::InvalidIndex).stage(),
            Stage::Evaluation
        );
    }

    #[test]
    fn test_with_location_keeps_first_tag() {
        let err = Error::new(ErrorKind::InvalidIndex)
            .with_location(1, 2)
            .with_location(9, 9);
        assert_eq!(err.location, Some(Location { line: 1, column: 2 }));
    }
}
