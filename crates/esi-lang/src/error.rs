use miette::{Diagnostic, SourceOffset, SourceSpan};

use crate::{ast::error::AstError, eval::error::EvalError, range::Range};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum InnerError {
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error(transparent)]
    Ast(#[from] AstError),
}

/// Represents a high-level error with diagnostic information for the user.
#[derive(PartialEq, Debug, thiserror::Error)]
#[error("{cause}")]
pub struct Error {
    /// The underlying cause of the error.
    pub cause: InnerError,
    /// The source code related to the error; empty when the embedder supplied none.
    pub source_code: String,
    /// The location in the source code for diagnostics.
    pub location: SourceSpan,
}

impl Error {
    pub fn from_error(source_code: impl Into<String>, cause: InnerError) -> Self {
        let source_code = source_code.into();
        let location = match &cause {
            InnerError::Eval(err) => err.location().map(|range| span(&source_code, range)),
            // serde_json positions are 1-based
            InnerError::Ast(AstError::InvalidJson { line, column, .. }) if *line > 0 => {
                Some(SourceSpan::new(
                    offset(&source_code, *line, column.saturating_sub(1)),
                    1,
                ))
            }
            InnerError::Ast(_) => None,
        }
        .unwrap_or_else(|| SourceSpan::new(SourceOffset::from(0usize), 0));

        Self {
            cause,
            source_code,
            location,
        }
    }

    /// The value of an uncaught `throw`, inspected.
    pub fn thrown_message(&self) -> Option<&str> {
        match &self.cause {
            InnerError::Eval(EvalError::Thrown { message, .. }) => Some(message),
            _ => None,
        }
    }
}

/// ESTree lines are 1-based and columns 0-based.
fn offset(source_code: &str, line: usize, column: usize) -> SourceOffset {
    if source_code.is_empty() {
        return SourceOffset::from(0usize);
    }
    SourceOffset::from_location(source_code, line, column + 1)
}

fn span(source_code: &str, range: Range) -> SourceSpan {
    let start = offset(source_code, range.start.line as usize, range.start.column);
    let end = offset(source_code, range.end.line as usize, range.end.column);
    let length = if source_code.is_empty() {
        0
    } else {
        std::cmp::max(end.offset().saturating_sub(start.offset()), 1)
    };
    SourceSpan::new(start, length)
}

impl Diagnostic for Error {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let c = match &self.cause {
            InnerError::Ast(AstError::InvalidJson { .. }) => "AstError::InvalidJson",
            InnerError::Eval(err) => match err {
                EvalError::NotDefined(..) => "EvalError::NotDefined",
                EvalError::AssignToUndeclared(..) => "EvalError::AssignToUndeclared",
                EvalError::AssignToConst(..) => "EvalError::AssignToConst",
                EvalError::DuplicateDeclaration(..) => "EvalError::DuplicateDeclaration",
                EvalError::InvalidDeleteTarget(..) => "EvalError::InvalidDeleteTarget",
                EvalError::TypeError(..) => "EvalError::TypeError",
                EvalError::RangeError(..) => "EvalError::RangeError",
                EvalError::SyntaxError(..) => "EvalError::SyntaxError",
                EvalError::UriError(..) => "EvalError::UriError",
                EvalError::HostError(..) => "EvalError::HostError",
                EvalError::RecursionError(_) => "EvalError::RecursionError",
                EvalError::Thrown { .. } => "EvalError::Thrown",
                EvalError::Unimplemented(..) => "EvalError::Unimplemented",
                EvalError::IllegalSignal(..) => "EvalError::IllegalSignal",
            },
        };

        Some(Box::new(c))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let msg = match &self.cause {
            InnerError::Ast(_) => Some(
                "The input must be an ESTree `Program` encoded as JSON, as produced by acorn or espree."
                    .to_string(),
            ),
            InnerError::Eval(EvalError::NotDefined(_, name)) => {
                Some(format!("'{name}' is not defined. Did you forget to declare it?"))
            }
            InnerError::Eval(EvalError::AssignToUndeclared(_, name)) => Some(format!(
                "'{name}' is assigned before any declaration. Declare it with `let`, `const` or `var`."
            )),
            InnerError::Eval(EvalError::AssignToConst(_, name)) => Some(format!(
                "'{name}' is declared with `const`. Use `let` if it needs to change."
            )),
            InnerError::Eval(EvalError::DuplicateDeclaration(_, name)) => {
                Some(format!("'{name}' is declared twice in the same scope."))
            }
            InnerError::Eval(EvalError::RecursionError(depth)) => Some(format!(
                "More than {depth} nested calls. Check for unbounded recursion."
            )),
            InnerError::Eval(EvalError::HostError(..)) => {
                Some("A host-provided function reported an error.".to_string())
            }
            InnerError::Eval(EvalError::Unimplemented(..)) => {
                Some("This syntax is not supported by the interpreter.".to_string())
            }
            InnerError::Eval(EvalError::IllegalSignal(..)) => Some(
                "`break` and `continue` must appear inside a loop, switch or labeled statement."
                    .to_string(),
            ),
            _ => None,
        };

        msg.map(|m| Box::new(m) as Box<dyn std::fmt::Display>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = miette::LabeledSpan> + '_>> {
        Some(Box::new(std::iter::once(
            miette::LabeledSpan::new_with_span(Some(format!("{}", self.cause)), self.location),
        )))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.source_code)
    }
}
