use itertools::Itertools;

use super::Evaluator;
use super::heap::{ArrayId, FunctionId, ObjectId, ObjectKind, Property};
use super::runtime_value::RuntimeValue;

/// Nesting level past which containers collapse to `[Object]`/`[Array]`.
const MAX_DEPTH: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Object(ObjectId),
    Array(ArrayId),
}

impl Evaluator {
    /// Renders a value the way `console.log` shows it nested inside a container.
    pub(crate) fn inspect(&self, value: &RuntimeValue) -> String {
        let mut seen = Vec::new();
        self.inspect_value(value, 0, &mut seen)
    }

    /// Renders a `console.log` argument: top-level strings are printed raw.
    pub(crate) fn format_log_arg(&self, value: &RuntimeValue) -> String {
        match value {
            RuntimeValue::String(s) => s.to_string(),
            other => self.inspect(other),
        }
    }

    fn inspect_value(&self, value: &RuntimeValue, depth: usize, seen: &mut Vec<Container>) -> String {
        match value {
            RuntimeValue::Undefined => "undefined".to_string(),
            RuntimeValue::Null => "null".to_string(),
            RuntimeValue::Bool(b) => b.to_string(),
            RuntimeValue::Number(n) if n.is_zero() && n.value().is_sign_negative() => "-0".to_string(),
            RuntimeValue::Number(n) => n.to_string(),
            RuntimeValue::String(s) => quote(s),
            RuntimeValue::Function(id) => self.inspect_function(*id),
            RuntimeValue::Array(id) => self.inspect_array(*id, depth, seen),
            RuntimeValue::Object(id) => self.inspect_object(*id, depth, seen),
        }
    }

    fn inspect_function(&self, id: FunctionId) -> String {
        let name = &self.heap.function(id).name;
        if name.is_empty() {
            "[Function (anonymous)]".to_string()
        } else {
            format!("[Function: {}]", name)
        }
    }

    fn inspect_array(&self, id: ArrayId, depth: usize, seen: &mut Vec<Container>) -> String {
        let items = self.heap.array(id);
        if items.is_empty() {
            return "[]".to_string();
        }
        if seen.contains(&Container::Array(id)) {
            return "[Circular]".to_string();
        }
        if depth > MAX_DEPTH {
            return "[Array]".to_string();
        }

        seen.push(Container::Array(id));
        let body = items
            .iter()
            .map(|item| self.inspect_value(item, depth + 1, seen))
            .join(", ");
        seen.pop();
        format!("[ {} ]", body)
    }

    fn inspect_object(&self, id: ObjectId, depth: usize, seen: &mut Vec<Container>) -> String {
        let object = self.heap.object(id);
        match object.kind {
            ObjectKind::ScopeView(_) => return "Object [global]".to_string(),
            ObjectKind::Error => return self.describe_error(id),
            ObjectKind::Ordinary => {}
        }

        let prefix = self
            .constructor_name(id)
            .map(|name| format!("{} ", name))
            .unwrap_or_default();
        if object.properties.is_empty() {
            return format!("{}{{}}", prefix);
        }
        if seen.contains(&Container::Object(id)) {
            return "[Circular]".to_string();
        }
        if depth > MAX_DEPTH {
            return "[Object]".to_string();
        }

        seen.push(Container::Object(id));
        let body = object
            .properties
            .iter()
            .map(|(key, property)| {
                let value = match property {
                    Property::Data(value) => self.inspect_value(value, depth + 1, seen),
                    Property::Accessor {
                        get: Some(_),
                        set: Some(_),
                    } => "[Getter/Setter]".to_string(),
                    Property::Accessor { get: Some(_), .. } => "[Getter]".to_string(),
                    Property::Accessor { .. } => "[Setter]".to_string(),
                };
                format!("{}: {}", format_key(key), value)
            })
            .join(", ");
        seen.pop();
        format!("{}{{ {} }}", prefix, body)
    }

    /// The name of the closure that constructed `id`, when it was built with `new`.
    fn constructor_name(&self, id: ObjectId) -> Option<String> {
        let proto = self.heap.object(id).proto?;
        match self.heap.object(proto).properties.get("constructor") {
            Some(Property::Data(RuntimeValue::Function(ctor))) => {
                let name = &self.heap.function(*ctor).name;
                (!name.is_empty() && name != "Object").then(|| name.to_string())
            }
            _ => None,
        }
    }

    /// `Name: message` for an error object, reading data properties only.
    pub(crate) fn describe_error(&self, id: ObjectId) -> String {
        let lookup = |key: &str| {
            std::iter::once(id)
                .chain(self.heap.proto_chain(id))
                .find_map(|object| match self.heap.object(object).properties.get(key) {
                    Some(Property::Data(RuntimeValue::String(s))) => Some(s.clone()),
                    _ => None,
                })
        };
        let name = lookup("name").unwrap_or_else(|| "Error".into());
        match lookup("message") {
            Some(message) if !message.is_empty() => format!("{}: {}", name, message),
            _ => name.to_string(),
        }
    }
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'").replace('\n', "\\n"))
}

fn format_key(key: &str) -> String {
    let mut chars = key.chars();
    let is_identifier = chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$');
    if is_identifier || key.parse::<usize>().is_ok() {
        key.to_string()
    } else {
        quote(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::Options;
    use crate::eval::builtin::HostState;
    use crate::eval::heap::{FunctionKind, FunctionObject, Object};
    use rstest::{fixture, rstest};

    #[fixture]
    fn evaluator() -> Evaluator {
        Evaluator::new(Options::default(), HostState::new(true, 1))
    }

    #[rstest]
    #[case::undefined(RuntimeValue::Undefined, "undefined")]
    #[case::negative_zero(RuntimeValue::from(-0.0), "-0")]
    #[case::float(RuntimeValue::from(1.5), "1.5")]
    #[case::nan(RuntimeValue::from(f64::NAN), "NaN")]
    #[case::string(RuntimeValue::from("it's"), "'it\\'s'")]
    fn test_inspect_primitives(evaluator: Evaluator, #[case] value: RuntimeValue, #[case] expected: &str) {
        assert_eq!(evaluator.inspect(&value), expected);
    }

    #[rstest]
    fn test_inspect_containers(mut evaluator: Evaluator) {
        let inner = evaluator.heap.alloc_array(vec![RuntimeValue::from(1.0), RuntimeValue::from("x")]);
        let mut object = Object::default();
        object
            .properties
            .insert("list".into(), Property::Data(inner.into()));
        object
            .properties
            .insert("b-c".into(), Property::Data(RuntimeValue::Null));
        object.properties.insert(
            "g".into(),
            Property::Accessor {
                get: None,
                set: None,
            },
        );
        let object = evaluator.heap.alloc_object(object);

        assert_eq!(
            evaluator.inspect(&object.into()),
            "{ list: [ 1, 'x' ], 'b-c': null, g: [Setter] }"
        );
    }

    #[rstest]
    fn test_inspect_empty_and_circular(mut evaluator: Evaluator) {
        let empty = evaluator.heap.new_object();
        let empty_array = evaluator.heap.alloc_array(vec![]);
        assert_eq!(evaluator.inspect(&empty.into()), "{}");
        assert_eq!(evaluator.inspect(&empty_array.into()), "[]");

        let cyclic = evaluator.heap.new_object();
        evaluator
            .heap
            .object_mut(cyclic)
            .properties
            .insert("self".into(), Property::Data(cyclic.into()));
        assert_eq!(evaluator.inspect(&cyclic.into()), "{ self: [Circular] }");
    }

    #[rstest]
    fn test_inspect_depth_limit(mut evaluator: Evaluator) {
        let mut value = RuntimeValue::from(1.0);
        for _ in 0..5 {
            value = evaluator.heap.alloc_array(vec![value]).into();
        }
        assert_eq!(evaluator.inspect(&value), "[ [ [ [Array] ] ] ]");
    }

    #[rstest]
    fn test_inspect_functions(mut evaluator: Evaluator) {
        let builtin = crate::eval::builtin::method(crate::eval::heap::MethodOwner::Array, "push")
            .copied()
            .unwrap();
        let named = evaluator
            .heap
            .alloc_function(FunctionObject::new(FunctionKind::Builtin(builtin), "push"));
        let anonymous = evaluator
            .heap
            .alloc_function(FunctionObject::new(FunctionKind::Builtin(builtin), ""));

        assert_eq!(evaluator.inspect(&named.into()), "[Function: push]");
        assert_eq!(evaluator.inspect(&anonymous.into()), "[Function (anonymous)]");
    }

    #[rstest]
    fn test_format_log_arg(evaluator: Evaluator) {
        assert_eq!(evaluator.format_log_arg(&RuntimeValue::from("plain")), "plain");
        assert_eq!(evaluator.format_log_arg(&RuntimeValue::TRUE), "true");
    }
}
