use smol_str::SmolStr;

use super::{BuiltinFunction, Error, arg};
use crate::eval::Evaluator;
use crate::eval::heap::{Object, ObjectKind, Property};
use crate::eval::property::PropertyKey;
use crate::eval::runtime_value::RuntimeValue;

/// Methods every value falls back to.
pub(super) const METHODS: [BuiltinFunction; 5] = [
    BuiltinFunction::new("hasOwnProperty", 1, |ev, this, args| {
        let key = ev.to_property_key(&arg(args, 0))?;
        Ok(has_own_property(ev, this, &key).into())
    }),
    BuiltinFunction::new("isPrototypeOf", 1, |ev, this, args| {
        let (RuntimeValue::Object(proto), RuntimeValue::Object(object)) = (this, arg(args, 0)) else {
            return Ok(RuntimeValue::FALSE);
        };
        Ok(ev.heap.proto_chain(object).any(|p| p == *proto).into())
    }),
    BuiltinFunction::new("toString", 0, |ev, this, _| {
        Ok(match ev.error_summary(this)? {
            Some(summary) => summary.into(),
            None => match this {
                RuntimeValue::Undefined => "[object Undefined]".into(),
                RuntimeValue::Null => "[object Null]".into(),
                RuntimeValue::Array(_) => "[object Array]".into(),
                RuntimeValue::Function(_) => "[object Function]".into(),
                _ => "[object Object]".into(),
            },
        })
    }),
    BuiltinFunction::new("toLocaleString", 0, |ev, this, _| Ok(ev.to_string(this)?.into())),
    BuiltinFunction::new("valueOf", 0, |_, this, _| Ok(this.clone())),
];

/// Static members of the `Object` constructor.
pub(super) const STATICS: [BuiltinFunction; 9] = [
    BuiltinFunction::new("keys", 1, |ev, _, args| {
        let target = object_arg(&arg(args, 0), "keys")?;
        let keys = ev
            .own_keys(&target)
            .into_iter()
            .map(RuntimeValue::from)
            .collect();
        Ok(ev.heap.alloc_array(keys).into())
    }),
    BuiltinFunction::new("values", 1, |ev, _, args| {
        let target = object_arg(&arg(args, 0), "values")?;
        let mut values = Vec::new();
        for key in ev.own_keys(&target) {
            values.push(ev.get_property(&target, &PropertyKey::from(key), None)?);
        }
        Ok(ev.heap.alloc_array(values).into())
    }),
    BuiltinFunction::new("entries", 1, |ev, _, args| {
        let target = object_arg(&arg(args, 0), "entries")?;
        let mut entries: Vec<RuntimeValue> = Vec::new();
        for key in ev.own_keys(&target) {
            let value = ev.get_property(&target, &PropertyKey::from(key.clone()), None)?;
            entries.push(ev.heap.alloc_array(vec![key.into(), value]).into());
        }
        Ok(ev.heap.alloc_array(entries).into())
    }),
    BuiltinFunction::new("assign", 2, |ev, _, args| {
        let target = arg(args, 0);
        let RuntimeValue::Object(id) = target else {
            return Err(Error::TypeError(
                "Object.assign target must be an object".to_string(),
            ));
        };
        for source in args.iter().skip(1) {
            ev.copy_own_properties(source, id, None)?;
        }
        Ok(target)
    }),
    BuiltinFunction::new("fromEntries", 1, |ev, _, args| {
        let entries = ev.iterate(&arg(args, 0), None)?;
        let id = ev.heap.new_object();
        for entry in entries {
            let RuntimeValue::Array(pair) = entry else {
                return Err(Error::TypeError(format!(
                    "Iterator value {} is not an entry object",
                    ev.inspect(&entry)
                )));
            };
            let pair = ev.heap.array(pair).clone();
            let key = ev.to_property_key(&arg(&pair, 0))?.to_name();
            ev.heap
                .object_mut(id)
                .properties
                .insert(key, Property::Data(arg(&pair, 1)));
        }
        Ok(id.into())
    }),
    BuiltinFunction::new("create", 1, |ev, _, args| {
        let proto = match arg(args, 0) {
            RuntimeValue::Object(proto) => Some(proto),
            RuntimeValue::Null => None,
            other => {
                return Err(Error::TypeError(format!(
                    "Object prototype may only be an Object or null: {}",
                    ev.inspect(&other)
                )));
            }
        };
        Ok(ev.heap.alloc_object(Object::with_proto(proto)).into())
    }),
    BuiltinFunction::new("getPrototypeOf", 1, |ev, _, args| {
        Ok(match arg(args, 0) {
            RuntimeValue::Object(id) => ev
                .heap
                .object(id)
                .proto
                .map(RuntimeValue::from)
                .unwrap_or(RuntimeValue::Null),
            _ => RuntimeValue::Null,
        })
    }),
    BuiltinFunction::new("freeze", 1, |_, _, args| Ok(arg(args, 0))),
    BuiltinFunction::new("is", 2, |_, _, args| {
        let (a, b) = (arg(args, 0), arg(args, 1));
        Ok(match (&a, &b) {
            (RuntimeValue::Number(x), RuntimeValue::Number(y)) => {
                (x.is_nan() && y.is_nan())
                    || (x == y && x.value().is_sign_negative() == y.value().is_sign_negative())
            }
            _ => a == b,
        }
        .into())
    }),
];

/// `Object(value)`: objects pass through, anything else becomes an empty object.
pub(super) fn construct(
    ev: &mut Evaluator,
    _: &RuntimeValue,
    args: &[RuntimeValue],
) -> Result<RuntimeValue, Error> {
    match arg(args, 0) {
        value if value.is_object() => Ok(value),
        _ => Ok(ev.heap.new_object().into()),
    }
}

fn object_arg(value: &RuntimeValue, method: &str) -> Result<RuntimeValue, Error> {
    if value.is_nullish() {
        return Err(Error::TypeError(format!(
            "Object.{} called on null or undefined",
            method
        )));
    }
    Ok(value.clone())
}

fn has_own_property(ev: &Evaluator, this: &RuntimeValue, key: &PropertyKey) -> bool {
    match (this, key) {
        (RuntimeValue::Array(id), PropertyKey::Index(index)) => *index < ev.heap.array(*id).len(),
        (RuntimeValue::Array(_), PropertyKey::Name(name)) => name == "length",
        (RuntimeValue::String(s), PropertyKey::Index(index)) => *index < s.chars().count(),
        (RuntimeValue::String(_), PropertyKey::Name(name)) => name == "length",
        (RuntimeValue::Object(id), key) => match ev.heap.object(*id).kind {
            ObjectKind::ScopeView(scope) => ev
                .env
                .get_own(scope, crate::Ident::new(&key.to_name()))
                .is_some(),
            _ => ev.heap.object(*id).properties.contains_key(&key.to_name()),
        },
        (RuntimeValue::Function(id), key) => {
            let name: SmolStr = key.to_name();
            ev.heap.function(*id).properties.contains_key(&name)
        }
        _ => false,
    }
}
