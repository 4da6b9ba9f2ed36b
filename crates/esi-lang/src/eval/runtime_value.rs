use smol_str::SmolStr;

use super::heap::{ArrayId, FunctionId, ObjectId};
use crate::number::Number;

/// A script value during a run.
///
/// Primitives are stored inline; objects, arrays and functions are handles
/// into the run's [`Heap`](super::heap::Heap). Equality on handles is
/// identity, which makes the derived `PartialEq` the `===` relation.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum RuntimeValue {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(Number),
    String(SmolStr),
    Object(ObjectId),
    Array(ArrayId),
    Function(FunctionId),
}

impl From<bool> for RuntimeValue {
    fn from(b: bool) -> Self {
        RuntimeValue::Bool(b)
    }
}

impl From<Number> for RuntimeValue {
    fn from(n: Number) -> Self {
        RuntimeValue::Number(n)
    }
}

impl From<f64> for RuntimeValue {
    fn from(n: f64) -> Self {
        RuntimeValue::Number(n.into())
    }
}

impl From<usize> for RuntimeValue {
    fn from(n: usize) -> Self {
        RuntimeValue::Number(n.into())
    }
}

impl From<i64> for RuntimeValue {
    fn from(n: i64) -> Self {
        RuntimeValue::Number(n.into())
    }
}

impl From<&str> for RuntimeValue {
    fn from(s: &str) -> Self {
        RuntimeValue::String(SmolStr::new(s))
    }
}

impl From<String> for RuntimeValue {
    fn from(s: String) -> Self {
        RuntimeValue::String(SmolStr::from(s))
    }
}

impl From<SmolStr> for RuntimeValue {
    fn from(s: SmolStr) -> Self {
        RuntimeValue::String(s)
    }
}

impl From<ObjectId> for RuntimeValue {
    fn from(id: ObjectId) -> Self {
        RuntimeValue::Object(id)
    }
}

impl From<ArrayId> for RuntimeValue {
    fn from(id: ArrayId) -> Self {
        RuntimeValue::Array(id)
    }
}

impl From<FunctionId> for RuntimeValue {
    fn from(id: FunctionId) -> Self {
        RuntimeValue::Function(id)
    }
}

impl RuntimeValue {
    pub const UNDEFINED: RuntimeValue = Self::Undefined;
    pub const NULL: RuntimeValue = Self::Null;
    pub const TRUE: RuntimeValue = Self::Bool(true);
    pub const FALSE: RuntimeValue = Self::Bool(false);

    /// The result of `typeof`.
    #[inline(always)]
    pub fn type_of(&self) -> &'static str {
        match self {
            RuntimeValue::Undefined => "undefined",
            RuntimeValue::Null => "object",
            RuntimeValue::Bool(_) => "boolean",
            RuntimeValue::Number(_) => "number",
            RuntimeValue::String(_) => "string",
            RuntimeValue::Object(_) | RuntimeValue::Array(_) => "object",
            RuntimeValue::Function(_) => "function",
        }
    }

    #[inline(always)]
    pub fn is_undefined(&self) -> bool {
        matches!(self, RuntimeValue::Undefined)
    }

    #[inline(always)]
    pub fn is_nullish(&self) -> bool {
        matches!(self, RuntimeValue::Undefined | RuntimeValue::Null)
    }

    /// Values that can carry properties of their own.
    #[inline(always)]
    pub fn is_object(&self) -> bool {
        matches!(
            self,
            RuntimeValue::Object(_) | RuntimeValue::Array(_) | RuntimeValue::Function(_)
        )
    }

    #[inline(always)]
    pub fn is_function(&self) -> bool {
        matches!(self, RuntimeValue::Function(_))
    }

    /// ToBoolean.
    #[inline(always)]
    pub fn is_truthy(&self) -> bool {
        match self {
            RuntimeValue::Undefined | RuntimeValue::Null => false,
            RuntimeValue::Bool(b) => *b,
            RuntimeValue::Number(n) => !(n.is_nan() || n.is_zero()),
            RuntimeValue::String(s) => !s.is_empty(),
            RuntimeValue::Object(_) | RuntimeValue::Array(_) | RuntimeValue::Function(_) => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RuntimeValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            RuntimeValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}
