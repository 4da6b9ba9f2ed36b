use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum AstError {
    /// The input is not JSON, or not an ESTree program (unknown `type`, missing field, ...).
    #[error("Invalid ESTree JSON: {message}")]
    InvalidJson {
        message: String,
        /// 1-based position in the JSON text; 0 when decoding from an in-memory value.
        line: usize,
        column: usize,
    },
}

impl From<serde_json::Error> for AstError {
    fn from(e: serde_json::Error) -> Self {
        AstError::InvalidJson {
            message: e.to_string(),
            line: e.line(),
            column: e.column(),
        }
    }
}
