use std::collections::BTreeMap;
use std::fmt::{self, Debug, Display, Formatter};
use std::rc::Rc;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use smol_str::SmolStr;

use crate::eval::Evaluator;
use crate::eval::error::EvalError;
use crate::eval::heap::{FunctionKind, FunctionObject, Object, Property};
use crate::eval::property::PropertyKey;
use crate::eval::runtime_value::RuntimeValue;
use crate::number::Number;

type HostFn = dyn Fn(&[Value]) -> Result<Value, String>;

/// A function supplied by the embedder.
///
/// Arguments arrive as owned [`Value`]s; an `Err` surfaces in the program as a catchable error.
#[derive(Clone)]
pub struct HostFunction {
    name: SmolStr,
    func: Rc<HostFn>,
}

impl HostFunction {
    pub fn new(
        name: impl Into<SmolStr>,
        func: impl Fn(&[Value]) -> Result<Value, String> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            func: Rc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, String> {
        (self.func)(args)
    }
}

impl Debug for HostFunction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostFunction")
            .field("name", &self.name)
            .finish()
    }
}

impl PartialEq for HostFunction {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.func, &other.func)
    }
}

/// An owned snapshot of a program value, independent of the run that produced it.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
    /// A script function, by name.
    Function(String),
    HostFunction(HostFunction),
    /// A reference back to a value that encloses it.
    Circular,
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        Value::Number(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n.into())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Object(map)
    }
}

impl From<HostFunction> for Value {
    fn from(f: HostFunction) -> Self {
        Value::HostFunction(f)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().unwrap_or(f64::NAN).into(),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Array(_) | Value::Object(_) => {
                let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
                write!(f, "{}", json)
            }
            Value::Function(name) if name.is_empty() => write!(f, "[Function (anonymous)]"),
            Value::Function(name) => write!(f, "[Function: {}]", name),
            Value::HostFunction(host) => write!(f, "[Function: {}]", host.name()),
            Value::Circular => write!(f, "[Circular]"),
        }
    }
}

/// Serializes the way `JSON.stringify` would: functions and `undefined` drop out of objects and
/// become `null` in arrays.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Undefined
            | Value::Null
            | Value::Function(_)
            | Value::HostFunction(_) => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => {
                let n = n.value();
                if !n.is_finite() {
                    serializer.serialize_unit()
                } else if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
                    serializer.serialize_i64(n as i64)
                } else {
                    serializer.serialize_f64(n)
                }
            }
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(map) => {
                let entries = map.iter().filter(|(_, value)| !value.is_omitted());
                let mut object = serializer.serialize_map(None)?;
                for (key, value) in entries {
                    object.serialize_entry(key, value)?;
                }
                object.end()
            }
            Value::Circular => serializer.serialize_str("[Circular]"),
        }
    }
}

impl Value {
    pub const UNDEFINED: Value = Self::Undefined;
    pub const NULL: Value = Self::Null;
    pub const TRUE: Value = Self::Bool(true);
    pub const FALSE: Value = Self::Bool(false);

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// A property of an object value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(map) => map.get(key),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(n.value()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    fn is_omitted(&self) -> bool {
        matches!(
            self,
            Value::Undefined | Value::Function(_) | Value::HostFunction(_)
        )
    }
}

impl Evaluator {
    /// Copies a runtime value out of the heap, reading accessors and cutting cycles.
    pub(crate) fn export_value(&mut self, value: &RuntimeValue) -> Result<Value, EvalError> {
        let mut stack = Vec::new();
        self.export_nested(value, &mut stack)
    }

    fn export_nested(
        &mut self,
        value: &RuntimeValue,
        stack: &mut Vec<RuntimeValue>,
    ) -> Result<Value, EvalError> {
        Ok(match value {
            RuntimeValue::Undefined => Value::Undefined,
            RuntimeValue::Null => Value::Null,
            RuntimeValue::Bool(b) => Value::Bool(*b),
            RuntimeValue::Number(n) => Value::Number(*n),
            RuntimeValue::String(s) => Value::String(s.to_string()),
            RuntimeValue::Function(id) => match &self.heap.function(*id).kind {
                FunctionKind::Host(host) => Value::HostFunction(host.clone()),
                _ => Value::Function(self.heap.function(*id).name.to_string()),
            },
            RuntimeValue::Array(_) | RuntimeValue::Object(_) if stack.contains(value) => {
                Value::Circular
            }
            RuntimeValue::Array(id) => {
                stack.push(value.clone());
                let items = self.heap.array(*id).clone();
                let items = items
                    .iter()
                    .map(|item| self.export_nested(item, stack))
                    .collect::<Result<Vec<_>, _>>()?;
                stack.pop();
                Value::Array(items)
            }
            RuntimeValue::Object(_) => {
                stack.push(value.clone());
                let mut map = BTreeMap::new();
                for key in self.own_keys(value) {
                    let item = self.get_property(value, &PropertyKey::from(key.clone()), None)?;
                    map.insert(key.to_string(), self.export_nested(&item, stack)?);
                }
                stack.pop();
                Value::Object(map)
            }
        })
    }

    /// Allocates an owned value on the heap of this run.
    pub(crate) fn import_value(&mut self, value: Value) -> RuntimeValue {
        match value {
            Value::Undefined | Value::Function(_) | Value::Circular => RuntimeValue::Undefined,
            Value::Null => RuntimeValue::Null,
            Value::Bool(b) => b.into(),
            Value::Number(n) => n.into(),
            Value::String(s) => s.into(),
            Value::Array(items) => {
                let items = items
                    .into_iter()
                    .map(|item| self.import_value(item))
                    .collect();
                self.heap.alloc_array(items).into()
            }
            Value::Object(map) => {
                let mut object = Object::default();
                for (key, item) in map {
                    let item = self.import_value(item);
                    object
                        .properties
                        .insert(SmolStr::from(key), Property::Data(item));
                }
                self.heap.alloc_object(object).into()
            }
            Value::HostFunction(host) => {
                let name = SmolStr::new(host.name());
                self.heap
                    .alloc_function(FunctionObject::new(FunctionKind::Host(host), name))
                    .into()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::Options;
    use crate::eval::builtin::HostState;
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn evaluator() -> Evaluator {
        Evaluator::new(Options::default(), HostState::new(true, 1))
    }

    #[rstest]
    #[case::undefined(Value::Undefined, "undefined")]
    #[case::integer(Value::from(3.0), "3")]
    #[case::string(Value::from("text"), "text")]
    #[case::array(Value::from(vec![Value::from(1.0), Value::Null]), "[1,null]")]
    #[case::function(Value::Function("run".to_string()), "[Function: run]")]
    #[case::anonymous(Value::Function(String::new()), "[Function (anonymous)]")]
    fn test_display(#[case] value: Value, #[case] expected: &str) {
        assert_eq!(value.to_string(), expected);
    }

    #[test]
    fn test_serialize_follows_json_rules() {
        let value = Value::Object(BTreeMap::from([
            ("a".to_string(), Value::from(1.5)),
            ("f".to_string(), Value::Function("f".to_string())),
            ("u".to_string(), Value::Undefined),
            (
                "list".to_string(),
                Value::from(vec![Value::Undefined, Value::from(f64::NAN), Value::from(2.0)]),
            ),
        ]));
        assert_eq!(
            serde_json::to_value(&value).unwrap(),
            json!({"a": 1.5, "list": [null, null, 2]})
        );
    }

    #[test]
    fn test_from_json() {
        let value = Value::from(json!({"n": 1, "s": "x", "l": [true, null]}));
        assert_eq!(value.get("n").and_then(Value::as_f64), Some(1.0));
        assert_eq!(value.get("s").and_then(Value::as_str), Some("x"));
        assert_eq!(
            value.get("l"),
            Some(&Value::from(vec![Value::TRUE, Value::NULL]))
        );
    }

    #[test]
    fn test_host_function_equality() {
        let f = HostFunction::new("f", |_| Ok(Value::Undefined));
        let same = f.clone();
        let other = HostFunction::new("f", |_| Ok(Value::Undefined));
        assert_eq!(f, same);
        assert_ne!(f, other);
        assert_eq!(f.call(&[]), Ok(Value::Undefined));
    }

    #[rstest]
    fn test_import_then_export(mut evaluator: Evaluator) {
        let value = Value::from(json!({"b": [1, "two", {"c": null}], "a": false}));
        let runtime = evaluator.import_value(value.clone());
        assert_eq!(evaluator.export_value(&runtime), Ok(value));
    }

    #[rstest]
    fn test_export_cuts_cycles(mut evaluator: Evaluator) {
        let inner = evaluator.heap.alloc_array(Vec::new());
        let outer = evaluator.heap.new_object();
        evaluator
            .heap
            .object_mut(outer)
            .properties
            .insert("list".into(), Property::Data(inner.into()));
        evaluator
            .heap
            .array_mut(inner)
            .push(RuntimeValue::Object(outer));

        let exported = evaluator.export_value(&outer.into()).unwrap();
        assert_eq!(
            exported.get("list"),
            Some(&Value::from(vec![Value::Circular]))
        );
    }

    #[rstest]
    fn test_export_shared_reference_twice(mut evaluator: Evaluator) {
        let shared = evaluator.heap.alloc_array(vec![1.0.into()]);
        let outer = evaluator
            .heap
            .alloc_array(vec![shared.into(), shared.into()]);
        assert_eq!(
            evaluator.export_value(&outer.into()),
            Ok(Value::from(vec![
                Value::from(vec![Value::from(1.0)]),
                Value::from(vec![Value::from(1.0)]),
            ]))
        );
    }

    #[rstest]
    fn test_import_host_function_keeps_name(mut evaluator: Evaluator) {
        let host = HostFunction::new("fetch", |_| Ok(Value::Null));
        let runtime = evaluator.import_value(Value::from(host.clone()));
        assert_eq!(evaluator.inspect(&runtime), "[Function: fetch]");
        assert_eq!(evaluator.export_value(&runtime), Ok(Value::HostFunction(host)));
    }
}
