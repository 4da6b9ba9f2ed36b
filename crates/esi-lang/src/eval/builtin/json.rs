use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use smol_str::SmolStr;

use super::{BuiltinFunction, Error, arg, namespace};
use crate::eval::Evaluator;
use crate::eval::heap::{Object, Property};
use crate::eval::property::PropertyKey;
use crate::eval::runtime_value::RuntimeValue;

const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

const FUNCTIONS: [BuiltinFunction; 2] = [
    BuiltinFunction::new("stringify", 3, |ev, _, args| {
        let mut stack = Vec::new();
        let Some(json) = to_json(ev, &arg(args, 0), "", &mut stack)? else {
            return Ok(RuntimeValue::Undefined);
        };
        match indent(&arg(args, 2)) {
            Some(indent) => pretty(&json, &indent).map(RuntimeValue::from),
            None => Ok(json.to_string().into()),
        }
    }),
    BuiltinFunction::new("parse", 2, |ev, _, args| {
        let text = ev.to_string(&arg(args, 0))?;
        let json = serde_json::from_str::<serde_json::Value>(&text)
            .map_err(|e| Error::SyntaxError(format!("Unexpected token in JSON: {}", e)))?;
        Ok(from_json(ev, json))
    }),
];

pub(super) fn install(ev: &mut Evaluator) {
    let json = namespace(ev, &FUNCTIONS, &[]);
    ev.define_global("JSON", json.into());
}

/// Converts a value for serialization; `None` marks values JSON omits.
fn to_json(
    ev: &mut Evaluator,
    value: &RuntimeValue,
    key: &str,
    stack: &mut Vec<RuntimeValue>,
) -> Result<Option<serde_json::Value>, Error> {
    let value = match value {
        RuntimeValue::Object(_) => {
            let to_json = ev.get_property(value, &PropertyKey::from("toJSON"), None)?;
            if to_json.is_function() {
                ev.call_value(&to_json, value.clone(), vec![key.into()], None)?
            } else {
                value.clone()
            }
        }
        _ => value.clone(),
    };

    Ok(Some(match &value {
        RuntimeValue::Undefined | RuntimeValue::Function(_) => return Ok(None),
        RuntimeValue::Null => serde_json::Value::Null,
        RuntimeValue::Bool(b) => serde_json::Value::Bool(*b),
        RuntimeValue::Number(n) => {
            let n = n.value();
            if n.is_finite() && n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
                serde_json::Value::from(n as i64)
            } else {
                serde_json::Number::from_f64(n)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null)
            }
        }
        RuntimeValue::String(s) => serde_json::Value::String(s.to_string()),
        RuntimeValue::Array(id) => {
            enter(ev, &value, stack)?;
            let mut items = Vec::new();
            let mut index = 0;
            // elements are read live; `toJSON` may grow the array
            while let Some(item) = ev.heap.array(*id).get(index).cloned() {
                let item = to_json(ev, &item, &index.to_string(), stack)?;
                items.push(item.unwrap_or(serde_json::Value::Null));
                index += 1;
            }
            stack.pop();
            serde_json::Value::Array(items)
        }
        RuntimeValue::Object(_) => {
            enter(ev, &value, stack)?;
            let mut map = serde_json::Map::new();
            for key in ev.own_keys(&value) {
                let item = ev.get_property(&value, &PropertyKey::from(key.clone()), None)?;
                if let Some(item) = to_json(ev, &item, &key, stack)? {
                    map.insert(key.to_string(), item);
                }
            }
            stack.pop();
            serde_json::Value::Object(map)
        }
    }))
}

fn enter(ev: &Evaluator, value: &RuntimeValue, stack: &mut Vec<RuntimeValue>) -> Result<(), Error> {
    if stack.contains(value) {
        return Err(Error::TypeError(format!(
            "Converting circular structure to JSON: {}",
            ev.inspect(value)
        )));
    }
    stack.push(value.clone());
    Ok(())
}

/// The indent string selected by the `space` argument, `None` for compact output.
fn indent(space: &RuntimeValue) -> Option<String> {
    let indent = match space {
        RuntimeValue::Number(n) => " ".repeat(n.value().clamp(0.0, 10.0) as usize),
        RuntimeValue::String(s) => s.chars().take(10).collect(),
        _ => return None,
    };
    (!indent.is_empty()).then_some(indent)
}

fn pretty(json: &serde_json::Value, indent: &str) -> Result<String, Error> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(indent.as_bytes());
    let mut serializer = Serializer::with_formatter(&mut buf, formatter);
    json.serialize(&mut serializer)
        .map_err(|e| Error::TypeError(e.to_string()))?;
    String::from_utf8(buf).map_err(|e| Error::TypeError(e.to_string()))
}

fn from_json(ev: &mut Evaluator, json: serde_json::Value) -> RuntimeValue {
    match json {
        serde_json::Value::Null => RuntimeValue::Null,
        serde_json::Value::Bool(b) => b.into(),
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(f64::NAN).into(),
        serde_json::Value::String(s) => s.into(),
        serde_json::Value::Array(items) => {
            let items = items.into_iter().map(|item| from_json(ev, item)).collect();
            ev.heap.alloc_array(items).into()
        }
        serde_json::Value::Object(map) => {
            let mut object = Object::default();
            for (key, item) in map {
                let item = from_json(ev, item);
                object
                    .properties
                    .insert(SmolStr::from(key), Property::Data(item));
            }
            ev.heap.alloc_object(object).into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{call_global, evaluator};
    use super::*;
    use crate::eval::error::EvalError;
    use rstest::rstest;

    fn parse(ev: &mut Evaluator, text: &str) -> RuntimeValue {
        call_global(ev, "JSON.parse", RuntimeValue::Undefined, vec![text.into()]).unwrap()
    }

    fn stringify(ev: &mut Evaluator, args: Vec<RuntimeValue>) -> Result<RuntimeValue, EvalError> {
        call_global(ev, "JSON.stringify", RuntimeValue::Undefined, args)
    }

    #[rstest]
    #[case::object(r#"{"b":1,"a":[true,null,"x"]}"#, r#"{"b":1,"a":[true,null,"x"]}"#)]
    #[case::float("1.5", "1.5")]
    #[case::nested_empty(r#"{"a":{},"b":[]}"#, r#"{"a":{},"b":[]}"#)]
    #[case::unicode(r#""héllo\n""#, r#""héllo\n""#)]
    fn test_parse_then_stringify(mut evaluator: Evaluator, #[case] input: &str, #[case] expected: &str) {
        let value = parse(&mut evaluator, input);
        assert_eq!(stringify(&mut evaluator, vec![value]), Ok(RuntimeValue::from(expected)));
    }

    #[rstest]
    fn test_stringify_omits_undefined_and_functions(mut evaluator: Evaluator) {
        let value = parse(&mut evaluator, r#"{"keep":1,"list":[1,2]}"#);
        let RuntimeValue::Object(id) = value else {
            panic!("expected an object");
        };
        let function = evaluator.env.resolve(evaluator.root, crate::Ident::new("isNaN")).unwrap();
        let object = evaluator.heap.object_mut(id);
        object
            .properties
            .insert("gone".into(), Property::Data(RuntimeValue::Undefined));
        object
            .properties
            .insert("fn".into(), Property::Data(function.clone()));
        object
            .properties
            .insert("nan".into(), Property::Data(f64::NAN.into()));
        let list = evaluator.heap.alloc_array(vec![RuntimeValue::Undefined, function]);
        evaluator
            .heap
            .object_mut(id)
            .properties
            .insert("holes".into(), Property::Data(list.into()));

        assert_eq!(
            stringify(&mut evaluator, vec![value]),
            Ok(RuntimeValue::from(
                r#"{"keep":1,"list":[1,2],"nan":null,"holes":[null,null]}"#
            ))
        );
    }

    #[rstest]
    fn test_stringify_top_level_undefined(mut evaluator: Evaluator) {
        assert_eq!(
            stringify(&mut evaluator, vec![RuntimeValue::Undefined]),
            Ok(RuntimeValue::Undefined)
        );
    }

    #[rstest]
    #[case::spaces(RuntimeValue::from(2.0), "{\n  \"a\": [\n    1\n  ]\n}")]
    #[case::tab(RuntimeValue::from("\t"), "{\n\t\"a\": [\n\t\t1\n\t]\n}")]
    #[case::zero(RuntimeValue::from(0.0), "{\"a\":[1]}")]
    fn test_stringify_indent(mut evaluator: Evaluator, #[case] space: RuntimeValue, #[case] expected: &str) {
        let value = parse(&mut evaluator, r#"{"a":[1]}"#);
        assert_eq!(
            stringify(&mut evaluator, vec![value, RuntimeValue::Null, space]),
            Ok(RuntimeValue::from(expected))
        );
    }

    #[rstest]
    fn test_stringify_circular(mut evaluator: Evaluator) {
        let value = parse(&mut evaluator, "{}");
        let RuntimeValue::Object(id) = value else {
            panic!("expected an object");
        };
        evaluator
            .heap
            .object_mut(id)
            .properties
            .insert("self".into(), Property::Data(value.clone()));

        assert!(matches!(
            stringify(&mut evaluator, vec![value]),
            Err(EvalError::TypeError(..))
        ));
    }

    #[rstest]
    fn test_shared_reference_is_not_circular(mut evaluator: Evaluator) {
        let shared = parse(&mut evaluator, "[1]");
        let list = evaluator.heap.alloc_array(vec![shared.clone(), shared]);
        assert_eq!(
            stringify(&mut evaluator, vec![list.into()]),
            Ok(RuntimeValue::from("[[1],[1]]"))
        );
    }

    #[rstest]
    #[case::truncated("{\"a\":")]
    #[case::single_quotes("{'a':1}")]
    #[case::trailing_comma("[1,]")]
    fn test_parse_errors(mut evaluator: Evaluator, #[case] input: &str) {
        assert!(matches!(
            call_global(&mut evaluator, "JSON.parse", RuntimeValue::Undefined, vec![input.into()]),
            Err(EvalError::SyntaxError(..))
        ));
    }
}
