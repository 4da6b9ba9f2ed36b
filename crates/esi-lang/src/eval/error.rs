use thiserror::Error;

use super::runtime_value::RuntimeValue;
use crate::range::Range;

type ErrorLoc = Option<Range>;
type Name = String;

#[derive(Error, Debug, PartialEq)]
pub enum EvalError {
    #[error("{1} is not defined")]
    NotDefined(ErrorLoc, Name),
    #[error("{1} is not defined")]
    AssignToUndeclared(ErrorLoc, Name),
    #[error("Assignment to constant variable \"{1}\"")]
    AssignToConst(ErrorLoc, Name),
    #[error("Identifier \"{1}\" has already been declared")]
    DuplicateDeclaration(ErrorLoc, Name),
    #[error("Delete of an unqualified identifier")]
    InvalidDeleteTarget(ErrorLoc),
    #[error("{1}")]
    TypeError(ErrorLoc, String),
    #[error("{1}")]
    RangeError(ErrorLoc, String),
    #[error("{1}")]
    SyntaxError(ErrorLoc, String),
    #[error("{1}")]
    UriError(ErrorLoc, String),
    #[error("{1}")]
    HostError(ErrorLoc, String),
    #[error("Maximum call stack size exceeded ({0})")]
    RecursionError(u32),
    #[error("Uncaught {message}")]
    Thrown {
        value: RuntimeValue,
        message: String,
        location: ErrorLoc,
    },
    #[error("Unimplemented node kind \"{1}\"")]
    Unimplemented(ErrorLoc, &'static str),
    #[error("Illegal {1} statement")]
    IllegalSignal(ErrorLoc, &'static str),
}

impl EvalError {
    #[cold]
    pub fn location(&self) -> Option<Range> {
        match self {
            EvalError::NotDefined(loc, _)
            | EvalError::AssignToUndeclared(loc, _)
            | EvalError::AssignToConst(loc, _)
            | EvalError::DuplicateDeclaration(loc, _)
            | EvalError::TypeError(loc, _)
            | EvalError::RangeError(loc, _)
            | EvalError::SyntaxError(loc, _)
            | EvalError::UriError(loc, _)
            | EvalError::HostError(loc, _)
            | EvalError::Unimplemented(loc, _)
            | EvalError::IllegalSignal(loc, _) => *loc,
            EvalError::InvalidDeleteTarget(loc) => *loc,
            EvalError::Thrown { location, .. } => *location,
            EvalError::RecursionError(_) => None,
        }
    }

    /// Fills in a location for errors raised where none was known.
    pub fn or_location(self, location: Option<Range>) -> Self {
        match self {
            EvalError::TypeError(None, m) => EvalError::TypeError(location, m),
            EvalError::RangeError(None, m) => EvalError::RangeError(location, m),
            EvalError::SyntaxError(None, m) => EvalError::SyntaxError(location, m),
            EvalError::UriError(None, m) => EvalError::UriError(location, m),
            EvalError::HostError(None, m) => EvalError::HostError(location, m),
            EvalError::NotDefined(None, n) => EvalError::NotDefined(location, n),
            EvalError::Thrown {
                value,
                message,
                location: None,
            } => EvalError::Thrown {
                value,
                message,
                location,
            },
            e => e,
        }
    }

    /// Whether a `catch` clause may observe this error.
    ///
    /// Gaps in the evaluator and misplaced `break`/`continue` abort the run.
    pub fn is_catchable(&self) -> bool {
        !matches!(
            self,
            EvalError::Unimplemented(..) | EvalError::IllegalSignal(..)
        )
    }

    /// The constructor a caught error is materialized with.
    pub fn error_name(&self) -> &'static str {
        match self {
            EvalError::NotDefined(..) | EvalError::AssignToUndeclared(..) => "ReferenceError",
            EvalError::AssignToConst(..) | EvalError::TypeError(..) => "TypeError",
            EvalError::DuplicateDeclaration(..) | EvalError::InvalidDeleteTarget(..) => {
                "SyntaxError"
            }
            EvalError::SyntaxError(..) => "SyntaxError",
            EvalError::RangeError(..) | EvalError::RecursionError(_) => "RangeError",
            EvalError::UriError(..) => "URIError",
            EvalError::HostError(..)
            | EvalError::Thrown { .. }
            | EvalError::Unimplemented(..)
            | EvalError::IllegalSignal(..) => "Error",
        }
    }
}
