//! `esi-lang` is a tree-walking interpreter for ECMAScript programs given as an
//! [ESTree](https://github.com/estree/estree) AST.
//!
//! Parsing JavaScript source is left to an external parser (acorn, espree, meriyah, ...);
//! this crate decodes its JSON output and evaluates it with CommonJS-style module semantics.
//!
//! ## Examples
//!
//! ```rust
//! use esi_lang::{Engine, Value};
//!
//! // module.exports = add(1, 2);
//! let json = r#"{
//!   "type": "Program",
//!   "body": [{
//!     "type": "ExpressionStatement",
//!     "expression": {
//!       "type": "AssignmentExpression",
//!       "operator": "=",
//!       "left": {
//!         "type": "MemberExpression",
//!         "object": {"type": "Identifier", "name": "module"},
//!         "property": {"type": "Identifier", "name": "exports"},
//!         "computed": false
//!       },
//!       "right": {
//!         "type": "CallExpression",
//!         "callee": {"type": "Identifier", "name": "add"},
//!         "arguments": [{"type": "Literal", "value": 1}, {"type": "Literal", "value": 2}]
//!       }
//!     }
//!   }]
//! }"#;
//!
//! let mut engine = Engine::default();
//! engine.define_function("add", |args| match args {
//!     [Value::Number(a), Value::Number(b)] => Ok(Value::from(a.value() + b.value())),
//!     _ => Err("add expects two numbers".to_string()),
//! });
//!
//! let output = engine.eval_json(json).unwrap();
//! assert_eq!(output.exports, Value::from(3.0));
//! ```
mod arena;
pub mod ast;
mod engine;
mod error;
mod eval;
mod ident;
mod number;
mod range;
mod value;

pub use ast::error::AstError;
pub use ast::node::Program;
pub use engine::{Engine, Options, Output};
pub use error::{Error, InnerError};
pub use eval::Options as EvalOptions;
pub use eval::error::EvalError;
pub use ident::Ident;
pub use number::Number;
pub use range::{Position, Range};
pub use value::{HostFunction, Value};

pub type EsiResult = Result<Output, Error>;

/// Decodes an ESTree program from JSON text.
#[allow(clippy::result_large_err)]
pub fn parse_json(json: &str) -> Result<Program, Error> {
    ast::from_json(json).map_err(|e| Error::from_error(json, InnerError::Ast(e)))
}

/// Decodes an ESTree program from a JSON value.
#[allow(clippy::result_large_err)]
pub fn parse_value(json: serde_json::Value) -> Result<Program, Error> {
    ast::from_value(json).map_err(|e| Error::from_error("", InnerError::Ast(e)))
}
