use std::fmt;

use smol_str::SmolStr;

use super::Evaluator;
use super::builtin;
use super::error::EvalError;
use super::heap::{FunctionId, MethodOwner, ObjectId, ObjectKind, Property};
use super::runtime_value::RuntimeValue;
use crate::Ident;
use crate::range::Range;

/// Arrays refuse to grow past this many elements through index writes.
const MAX_ARRAY_LENGTH: usize = 1 << 24;

/// A property name after ToPropertyKey; canonical array indices are kept numeric.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    Index(usize),
    Name(SmolStr),
}

impl From<&str> for PropertyKey {
    fn from(name: &str) -> Self {
        match name.parse::<usize>() {
            Ok(index) if index.to_string() == name => PropertyKey::Index(index),
            _ => PropertyKey::Name(SmolStr::new(name)),
        }
    }
}

impl From<SmolStr> for PropertyKey {
    fn from(name: SmolStr) -> Self {
        match name.parse::<usize>() {
            Ok(index) if index.to_string() == name => PropertyKey::Index(index),
            _ => PropertyKey::Name(name),
        }
    }
}

impl From<usize> for PropertyKey {
    fn from(index: usize) -> Self {
        PropertyKey::Index(index)
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::Index(index) => write!(f, "{}", index),
            PropertyKey::Name(name) => write!(f, "{}", name),
        }
    }
}

impl PropertyKey {
    pub fn to_name(&self) -> SmolStr {
        match self {
            PropertyKey::Index(index) => SmolStr::new(index.to_string()),
            PropertyKey::Name(name) => name.clone(),
        }
    }
}

impl Evaluator {
    pub(crate) fn to_property_key(&mut self, value: &RuntimeValue) -> Result<PropertyKey, EvalError> {
        match value {
            RuntimeValue::Number(n) => match n.to_index() {
                Some(index) => Ok(PropertyKey::Index(index)),
                None => Ok(PropertyKey::Name(SmolStr::new(n.to_string()))),
            },
            RuntimeValue::String(s) => Ok(PropertyKey::from(s.clone())),
            other => self.to_string(other).map(PropertyKey::from),
        }
    }

    /// A builtin method resolved for a receiver type, falling back to the object methods.
    fn method_value(&mut self, owner: MethodOwner, name: &str) -> RuntimeValue {
        match builtin::method(owner, name) {
            Some(method) => RuntimeValue::Function(self.heap.method(owner, method)),
            None => match builtin::method(MethodOwner::Object, name) {
                Some(method) => RuntimeValue::Function(self.heap.method(MethodOwner::Object, method)),
                None => RuntimeValue::Undefined,
            },
        }
    }

    pub(crate) fn get_property(
        &mut self,
        base: &RuntimeValue,
        key: &PropertyKey,
        loc: Option<Range>,
    ) -> Result<RuntimeValue, EvalError> {
        match base {
            RuntimeValue::Undefined | RuntimeValue::Null => Err(EvalError::TypeError(
                loc,
                format!("Cannot read properties of {} (reading '{}')", self.inspect(base), key),
            )),
            RuntimeValue::String(s) => Ok(match key {
                PropertyKey::Index(index) => s
                    .chars()
                    .nth(*index)
                    .map(|c| RuntimeValue::String(SmolStr::new(c.to_string())))
                    .unwrap_or_default(),
                PropertyKey::Name(name) if name == "length" => s.chars().count().into(),
                PropertyKey::Name(name) => self.method_value(MethodOwner::String, name),
            }),
            RuntimeValue::Number(_) | RuntimeValue::Bool(_) => Ok(match key {
                PropertyKey::Index(_) => RuntimeValue::Undefined,
                PropertyKey::Name(name) => self.method_value(MethodOwner::Number, name),
            }),
            RuntimeValue::Array(id) => Ok(match key {
                PropertyKey::Index(index) => {
                    self.heap.array(*id).get(*index).cloned().unwrap_or_default()
                }
                PropertyKey::Name(name) if name == "length" => self.heap.array(*id).len().into(),
                PropertyKey::Name(name) => self.method_value(MethodOwner::Array, name),
            }),
            RuntimeValue::Function(id) => self.get_function_property(*id, key, base, loc),
            RuntimeValue::Object(id) => self.get_object_property(*id, &key.to_name(), base, loc),
        }
    }

    fn get_function_property(
        &mut self,
        id: FunctionId,
        key: &PropertyKey,
        receiver: &RuntimeValue,
        loc: Option<Range>,
    ) -> Result<RuntimeValue, EvalError> {
        let name = key.to_name();
        let getter = match self.heap.function(id).properties.get(&name) {
            Some(Property::Data(value)) => return Ok(value.clone()),
            Some(Property::Accessor { get, .. }) => Some(*get),
            None => None,
        };
        match getter {
            Some(Some(getter)) => return self.call_function(getter, receiver.clone(), vec![], loc),
            Some(None) => return Ok(RuntimeValue::Undefined),
            None => {}
        }

        match name.as_str() {
            "name" => Ok(RuntimeValue::String(self.heap.function(id).name.clone())),
            "length" => Ok(self.heap.function(id).arity().into()),
            "prototype" if self.has_implicit_prototype(id) => {
                Ok(RuntimeValue::Object(self.function_prototype(id)))
            }
            _ => Ok(self.method_value(MethodOwner::Function, &name)),
        }
    }

    fn get_object_property(
        &mut self,
        id: ObjectId,
        name: &str,
        receiver: &RuntimeValue,
        loc: Option<Range>,
    ) -> Result<RuntimeValue, EvalError> {
        let mut current = Some(id);
        while let Some(object_id) = current {
            let object = self.heap.object(object_id);
            if let ObjectKind::ScopeView(scope) = object.kind {
                if let Some(variable) = self.env.get_own(scope, Ident::new(name)) {
                    return Ok(variable.get().clone());
                }
            }

            let getter = match object.properties.get(name) {
                Some(Property::Data(value)) => return Ok(value.clone()),
                Some(Property::Accessor { get, .. }) => *get,
                None => {
                    current = object.proto;
                    continue;
                }
            };
            return match getter {
                Some(getter) => self.call_function(getter, receiver.clone(), vec![], loc),
                None => Ok(RuntimeValue::Undefined),
            };
        }

        Ok(self.method_value(MethodOwner::Object, name))
    }

    pub(crate) fn set_property(
        &mut self,
        base: &RuntimeValue,
        key: &PropertyKey,
        value: RuntimeValue,
        loc: Option<Range>,
    ) -> Result<(), EvalError> {
        match base {
            RuntimeValue::Undefined | RuntimeValue::Null => Err(EvalError::TypeError(
                loc,
                format!("Cannot set properties of {} (setting '{}')", self.inspect(base), key),
            )),
            RuntimeValue::Array(id) => match key {
                PropertyKey::Index(index) if *index >= MAX_ARRAY_LENGTH => {
                    Err(EvalError::RangeError(loc, "Invalid array length".to_string()))
                }
                PropertyKey::Index(index) => {
                    let array = self.heap.array_mut(*id);
                    if *index >= array.len() {
                        array.resize(index + 1, RuntimeValue::Undefined);
                    }
                    array[*index] = value;
                    Ok(())
                }
                PropertyKey::Name(name) if name == "length" => {
                    let length = self
                        .to_number(&value)?
                        .to_index()
                        .filter(|length| *length < MAX_ARRAY_LENGTH)
                        .ok_or_else(|| EvalError::RangeError(loc, "Invalid array length".to_string()))?;
                    self.heap.array_mut(*id).resize(length, RuntimeValue::Undefined);
                    Ok(())
                }
                // Arrays carry no named properties.
                PropertyKey::Name(_) => Ok(()),
            },
            RuntimeValue::Function(id) => {
                let name = key.to_name();
                let setter = match self.heap.function(*id).properties.get(&name) {
                    Some(Property::Accessor { set, .. }) => Some(*set),
                    _ => None,
                };
                match setter {
                    Some(Some(setter)) => {
                        return self
                            .call_function(setter, base.clone(), vec![value], loc)
                            .map(|_| ());
                    }
                    Some(None) => return Ok(()),
                    None => {}
                }
                if !matches!(name.as_str(), "name" | "length") {
                    self.heap
                        .function_mut(*id)
                        .properties
                        .insert(name, Property::Data(value));
                }
                Ok(())
            }
            RuntimeValue::Object(id) => self.set_object_property(*id, key.to_name(), value, base, loc),
            // Writes to primitives are dropped.
            RuntimeValue::Bool(_) | RuntimeValue::Number(_) | RuntimeValue::String(_) => Ok(()),
        }
    }

    fn set_object_property(
        &mut self,
        id: ObjectId,
        name: SmolStr,
        value: RuntimeValue,
        receiver: &RuntimeValue,
        loc: Option<Range>,
    ) -> Result<(), EvalError> {
        if let ObjectKind::ScopeView(scope) = self.heap.object(id).kind {
            let ident = Ident::new(&name);
            let result = if self.env.get_own(scope, ident).is_some() {
                self.env.assign(scope, ident, value)
            } else {
                self.env.define_var(scope, ident, Some(value))
            };
            return result.map_err(|e| e.to_eval_error(loc));
        }

        if let Some(Property::Data(_)) = self.heap.object(id).properties.get(&name) {
            self.heap
                .object_mut(id)
                .properties
                .insert(name, Property::Data(value));
            return Ok(());
        }

        let accessor = std::iter::once(id)
            .chain(self.heap.proto_chain(id))
            .find_map(|object_id| match self.heap.object(object_id).properties.get(&name) {
                Some(Property::Accessor { set, .. }) => Some(*set),
                _ => None,
            });

        match accessor {
            Some(Some(setter)) => self
                .call_function(setter, receiver.clone(), vec![value], loc)
                .map(|_| ()),
            Some(None) => Ok(()),
            None => {
                self.heap
                    .object_mut(id)
                    .properties
                    .insert(name, Property::Data(value));
                Ok(())
            }
        }
    }

    pub(crate) fn delete_property(
        &mut self,
        base: &RuntimeValue,
        key: &PropertyKey,
        loc: Option<Range>,
    ) -> Result<bool, EvalError> {
        match base {
            RuntimeValue::Undefined | RuntimeValue::Null => Err(EvalError::TypeError(
                loc,
                format!("Cannot convert undefined or null to object (deleting '{}')", key),
            )),
            RuntimeValue::Object(id) => {
                if let ObjectKind::ScopeView(_) = self.heap.object(*id).kind {
                    return Ok(false);
                }
                self.heap.object_mut(*id).properties.remove(&key.to_name());
                Ok(true)
            }
            RuntimeValue::Array(id) => match key {
                PropertyKey::Index(index) => {
                    if let Some(slot) = self.heap.array_mut(*id).get_mut(*index) {
                        *slot = RuntimeValue::Undefined;
                    }
                    Ok(true)
                }
                PropertyKey::Name(name) => Ok(name != "length"),
            },
            RuntimeValue::Function(id) => {
                self.heap.function_mut(*id).properties.remove(&key.to_name());
                Ok(true)
            }
            RuntimeValue::Bool(_) | RuntimeValue::Number(_) | RuntimeValue::String(_) => Ok(true),
        }
    }

    /// `key in base`.
    pub(crate) fn has_property(
        &mut self,
        base: &RuntimeValue,
        key: &PropertyKey,
        loc: Option<Range>,
    ) -> Result<bool, EvalError> {
        match base {
            RuntimeValue::Object(id) => {
                let name = key.to_name();
                let found = std::iter::once(*id)
                    .chain(self.heap.proto_chain(*id))
                    .any(|object_id| {
                        let object = self.heap.object(object_id);
                        object.properties.contains_key(&name)
                            || matches!(object.kind, ObjectKind::ScopeView(scope)
                                if self.env.get_own(scope, Ident::new(&name)).is_some())
                    });
                Ok(found || builtin::method(MethodOwner::Object, &name).is_some())
            }
            RuntimeValue::Array(id) => Ok(match key {
                PropertyKey::Index(index) => *index < self.heap.array(*id).len(),
                PropertyKey::Name(name) => {
                    name == "length" || builtin::method(MethodOwner::Array, name).is_some()
                }
            }),
            RuntimeValue::Function(id) => {
                let name = key.to_name();
                Ok(self.heap.function(*id).properties.contains_key(&name)
                    || matches!(name.as_str(), "name" | "length")
                    || (name == "prototype" && self.has_implicit_prototype(*id))
                    || builtin::method(MethodOwner::Function, &name).is_some())
            }
            other => Err(EvalError::TypeError(
                loc,
                format!(
                    "Cannot use 'in' operator to search for '{}' in {}",
                    key,
                    self.inspect(other)
                ),
            )),
        }
    }

    /// Own enumerable keys in insertion order (`Object.keys`).
    pub(crate) fn own_keys(&self, value: &RuntimeValue) -> Vec<SmolStr> {
        match value {
            RuntimeValue::Object(id) => match self.heap.object(*id).kind {
                ObjectKind::ScopeView(scope) => self
                    .env
                    .variables(scope)
                    .into_iter()
                    .map(|(name, _)| SmolStr::new(name.as_str()))
                    .collect(),
                _ => self.heap.object(*id).properties.keys().cloned().collect(),
            },
            RuntimeValue::Array(id) => (0..self.heap.array(*id).len())
                .map(|i| SmolStr::new(i.to_string()))
                .collect(),
            RuntimeValue::String(s) => (0..s.chars().count())
                .map(|i| SmolStr::new(i.to_string()))
                .collect(),
            RuntimeValue::Function(id) => {
                self.heap.function(*id).properties.keys().cloned().collect()
            }
            _ => Vec::new(),
        }
    }

    /// Keys visited by `for-in`: own keys first, then those inherited through prototypes.
    pub(crate) fn enumerable_keys(&self, value: &RuntimeValue) -> Vec<SmolStr> {
        let mut keys = self.own_keys(value);
        if let RuntimeValue::Object(id) = value {
            for proto in self.heap.proto_chain(*id) {
                for key in self.heap.object(proto).properties.keys() {
                    if key != "constructor" && !keys.contains(key) {
                        keys.push(key.clone());
                    }
                }
            }
        }
        keys
    }

    /// The values produced by iterating `value` (`for-of`, spread, array patterns).
    pub(crate) fn iterate(
        &self,
        value: &RuntimeValue,
        loc: Option<Range>,
    ) -> Result<Vec<RuntimeValue>, EvalError> {
        match value {
            RuntimeValue::Array(id) => Ok(self.heap.array(*id).clone()),
            RuntimeValue::String(s) => Ok(s
                .chars()
                .map(|c| RuntimeValue::String(SmolStr::new(c.to_string())))
                .collect()),
            other => Err(EvalError::TypeError(
                loc,
                format!("{} is not iterable", self.inspect(other)),
            )),
        }
    }

    /// Copies the own properties of `source` onto `target` (object spread, `Object.assign`).
    pub(crate) fn copy_own_properties(
        &mut self,
        source: &RuntimeValue,
        target: ObjectId,
        loc: Option<Range>,
    ) -> Result<(), EvalError> {
        if source.is_nullish() {
            return Ok(());
        }
        let target_value = RuntimeValue::Object(target);
        for key in self.own_keys(source) {
            let key = PropertyKey::from(key);
            let value = self.get_property(source, &key, loc)?;
            self.set_property(&target_value, &key, value, loc)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::Options;
    use crate::eval::builtin::HostState;
    use crate::eval::heap::Object;
    use rstest::{fixture, rstest};

    #[fixture]
    fn evaluator() -> Evaluator {
        Evaluator::new(Options::default(), HostState::new(true, 1))
    }

    #[rstest]
    #[case::index("3", PropertyKey::Index(3))]
    #[case::zero("0", PropertyKey::Index(0))]
    #[case::leading_zero("03", PropertyKey::Name("03".into()))]
    #[case::negative("-1", PropertyKey::Name("-1".into()))]
    #[case::name("length", PropertyKey::Name("length".into()))]
    fn test_property_key_from_str(#[case] input: &str, #[case] expected: PropertyKey) {
        assert_eq!(PropertyKey::from(input), expected);
    }

    #[rstest]
    #[case::index(RuntimeValue::from(2.0), PropertyKey::Index(2))]
    #[case::fraction(RuntimeValue::from(1.5), PropertyKey::Name("1.5".into()))]
    #[case::bool(RuntimeValue::TRUE, PropertyKey::Name("true".into()))]
    #[case::null(RuntimeValue::Null, PropertyKey::Name("null".into()))]
    fn test_to_property_key(
        mut evaluator: Evaluator,
        #[case] value: RuntimeValue,
        #[case] expected: PropertyKey,
    ) {
        assert_eq!(evaluator.to_property_key(&value), Ok(expected));
    }

    #[rstest]
    fn test_string_properties(mut evaluator: Evaluator) {
        let s = RuntimeValue::from("héllo");
        assert_eq!(
            evaluator.get_property(&s, &PropertyKey::from("length"), None),
            Ok(RuntimeValue::from(5usize))
        );
        assert_eq!(
            evaluator.get_property(&s, &PropertyKey::Index(1), None),
            Ok(RuntimeValue::from("é"))
        );
        assert_eq!(
            evaluator.get_property(&s, &PropertyKey::Index(10), None),
            Ok(RuntimeValue::Undefined)
        );
        assert!(
            evaluator
                .get_property(&s, &PropertyKey::from("toUpperCase"), None)
                .unwrap()
                .is_function()
        );
    }

    #[rstest]
    fn test_read_from_nullish(mut evaluator: Evaluator) {
        assert!(matches!(
            evaluator.get_property(&RuntimeValue::Undefined, &PropertyKey::from("x"), None),
            Err(EvalError::TypeError(_, message))
                if message == "Cannot read properties of undefined (reading 'x')"
        ));
    }

    #[rstest]
    fn test_array_writes_grow_and_truncate(mut evaluator: Evaluator) {
        let array = RuntimeValue::Array(evaluator.heap.alloc_array(vec![RuntimeValue::TRUE]));

        evaluator
            .set_property(&array, &PropertyKey::Index(3), RuntimeValue::from(1.0), None)
            .unwrap();
        assert_eq!(
            evaluator.get_property(&array, &PropertyKey::from("length"), None),
            Ok(RuntimeValue::from(4usize))
        );

        evaluator
            .set_property(&array, &PropertyKey::from("length"), RuntimeValue::from(1.0), None)
            .unwrap();
        assert_eq!(evaluator.own_keys(&array), vec![SmolStr::new("0")]);
    }

    #[rstest]
    fn test_array_named_writes_are_dropped(mut evaluator: Evaluator) {
        let array = RuntimeValue::Array(evaluator.heap.alloc_array(vec![RuntimeValue::TRUE]));

        assert_eq!(
            evaluator.set_property(&array, &PropertyKey::from("tag"), RuntimeValue::from(1.0), None),
            Ok(())
        );
        assert_eq!(
            evaluator.get_property(&array, &PropertyKey::from("tag"), None),
            Ok(RuntimeValue::Undefined)
        );
        assert_eq!(evaluator.own_keys(&array), vec![SmolStr::new("0")]);
    }

    #[rstest]
    fn test_prototype_read_through(mut evaluator: Evaluator) {
        let mut proto = Object::default();
        proto
            .properties
            .insert("greeting".into(), Property::Data(RuntimeValue::from("hi")));
        let proto = evaluator.heap.alloc_object(proto);
        let child = RuntimeValue::Object(evaluator.heap.alloc_object(Object::with_proto(Some(proto))));

        assert_eq!(
            evaluator.get_property(&child, &PropertyKey::from("greeting"), None),
            Ok(RuntimeValue::from("hi"))
        );
        assert_eq!(
            evaluator.has_property(&child, &PropertyKey::from("greeting"), None),
            Ok(true)
        );
        assert!(evaluator.own_keys(&child).is_empty());
        assert_eq!(evaluator.enumerable_keys(&child), vec![SmolStr::new("greeting")]);

        // Writes shadow instead of touching the prototype.
        evaluator
            .set_property(&child, &PropertyKey::from("greeting"), RuntimeValue::from("yo"), None)
            .unwrap();
        assert_eq!(
            evaluator.get_property(&RuntimeValue::Object(proto), &PropertyKey::from("greeting"), None),
            Ok(RuntimeValue::from("hi"))
        );
    }

    #[rstest]
    fn test_scope_view_reads_and_writes_root(mut evaluator: Evaluator) {
        let view = evaluator.this_value(evaluator.root);

        evaluator
            .set_property(&view, &PropertyKey::from("answer"), RuntimeValue::from(42.0), None)
            .unwrap();
        assert_eq!(
            evaluator.env.lookup(evaluator.root, Ident::new("answer")),
            Some(&RuntimeValue::from(42.0))
        );
        assert_eq!(
            evaluator.get_property(&view, &PropertyKey::from("answer"), None),
            Ok(RuntimeValue::from(42.0))
        );
        assert!(matches!(
            evaluator.set_property(&view, &PropertyKey::from("undefined"), RuntimeValue::Null, None),
            Err(EvalError::AssignToConst(..))
        ));
    }

    #[rstest]
    fn test_in_on_primitive_fails(mut evaluator: Evaluator) {
        assert!(matches!(
            evaluator.has_property(&RuntimeValue::from("s"), &PropertyKey::from("length"), None),
            Err(EvalError::TypeError(..))
        ));
    }

    #[rstest]
    fn test_iterate(evaluator: Evaluator) {
        assert_eq!(
            evaluator.iterate(&RuntimeValue::from("ab"), None),
            Ok(vec![RuntimeValue::from("a"), RuntimeValue::from("b")])
        );
        assert!(matches!(
            evaluator.iterate(&RuntimeValue::from(1.0), None),
            Err(EvalError::TypeError(_, message)) if message == "1 is not iterable"
        ));
    }
}
