use smol_str::SmolStr;

use super::{BuiltinFunction, Error, arg, constructor, function_value, object};
use crate::eval::Evaluator;
use crate::eval::heap::{Object, ObjectId, ObjectKind, Property};
use crate::eval::property::PropertyKey;
use crate::eval::runtime_value::RuntimeValue;
use crate::number::{self, Number};

const ERROR_NAMES: [&str; 7] = [
    "Error",
    "EvalError",
    "RangeError",
    "ReferenceError",
    "SyntaxError",
    "TypeError",
    "URIError",
];

impl Evaluator {
    /// Allocates an instance of the error constructor `name`, falling back to `Error`.
    pub(crate) fn new_error(&mut self, name: &str, message: impl Into<String>) -> RuntimeValue {
        let message = SmolStr::from(message.into());
        self.alloc_error(name, Some(message)).into()
    }

    fn alloc_error(&mut self, name: &str, message: Option<SmolStr>) -> ObjectId {
        let proto = self
            .intrinsics
            .error_prototypes
            .get(name)
            .or_else(|| self.intrinsics.error_prototypes.get("Error"))
            .copied();
        let mut error = Object {
            kind: ObjectKind::Error,
            proto,
            ..Default::default()
        };
        if let Some(message) = message {
            error
                .properties
                .insert("message".into(), Property::Data(message.into()));
        }
        self.heap.alloc_object(error)
    }
}

pub(super) fn install(ev: &mut Evaluator, global_this: ObjectId) {
    ev.define_global("undefined", RuntimeValue::Undefined);
    ev.define_global("NaN", number::NAN.into());
    ev.define_global("Infinity", number::INFINITE.into());
    ev.define_global("globalThis", global_this.into());

    for builtin in FUNCTIONS {
        let function = function_value(ev, builtin);
        ev.define_global(builtin.name, function.into());
    }

    let object = constructor(
        ev,
        BuiltinFunction::new("Object", 1, object::construct),
        &object::STATICS,
        &[],
    );
    ev.intrinsics.object_ctor = Some(object);
    ev.define_global("Object", object.into());

    let array = constructor(ev, ARRAY, &ARRAY_STATICS, &[]);
    ev.intrinsics.array_ctor = Some(array);
    ev.define_global("Array", array.into());

    let number = constructor(
        ev,
        NUMBER,
        &NUMBER_STATICS,
        &[
            ("MAX_SAFE_INTEGER", 9_007_199_254_740_991.0.into()),
            ("MIN_SAFE_INTEGER", (-9_007_199_254_740_991.0).into()),
            ("EPSILON", f64::EPSILON.into()),
            ("MAX_VALUE", f64::MAX.into()),
            ("MIN_VALUE", 5e-324.into()),
            ("POSITIVE_INFINITY", number::INFINITE.into()),
            ("NEGATIVE_INFINITY", (-f64::INFINITY).into()),
            ("NaN", number::NAN.into()),
        ],
    );
    ev.define_global("Number", number.into());

    let string = constructor(ev, STRING, &STRING_STATICS, &[]);
    ev.define_global("String", string.into());

    let boolean = function_value(ev, BOOLEAN);
    ev.define_global("Boolean", boolean.into());

    install_errors(ev);
}

/// Installs the error constructors; every `prototype` but `Error.prototype` chains to `Error.prototype`.
fn install_errors(ev: &mut Evaluator) {
    let mut base = None;
    for builtin in ERROR_CONSTRUCTORS {
        let ctor = function_value(ev, builtin);
        let mut prototype = Object::with_proto(base);
        for (key, value) in [
            ("name", RuntimeValue::from(builtin.name)),
            ("message", RuntimeValue::from("")),
            ("constructor", RuntimeValue::Function(ctor)),
        ] {
            prototype.properties.insert(key.into(), Property::Data(value));
        }
        let prototype = ev.heap.alloc_object(prototype);
        ev.heap
            .function_mut(ctor)
            .properties
            .insert("prototype".into(), Property::Data(prototype.into()));

        base.get_or_insert(prototype);
        ev.intrinsics.error_prototypes.insert(builtin.name, prototype);
        ev.define_global(builtin.name, ctor.into());
    }
}

const ERROR_CONSTRUCTORS: [BuiltinFunction; 7] = [
    BuiltinFunction::new(ERROR_NAMES[0], 1, error_constructor::<0>),
    BuiltinFunction::new(ERROR_NAMES[1], 1, error_constructor::<1>),
    BuiltinFunction::new(ERROR_NAMES[2], 1, error_constructor::<2>),
    BuiltinFunction::new(ERROR_NAMES[3], 1, error_constructor::<3>),
    BuiltinFunction::new(ERROR_NAMES[4], 1, error_constructor::<4>),
    BuiltinFunction::new(ERROR_NAMES[5], 1, error_constructor::<5>),
    BuiltinFunction::new(ERROR_NAMES[6], 1, error_constructor::<6>),
];

/// `new XError(message, { cause })`; calling without `new` behaves the same.
fn error_constructor<const N: usize>(
    ev: &mut Evaluator,
    _: &RuntimeValue,
    args: &[RuntimeValue],
) -> Result<RuntimeValue, Error> {
    let message = match arg(args, 0) {
        RuntimeValue::Undefined => None,
        message => Some(ev.to_string(&message)?),
    };
    let error = ev.alloc_error(ERROR_NAMES[N], message);

    let options = arg(args, 1);
    let cause = PropertyKey::from("cause");
    if options.is_object() && ev.has_property(&options, &cause, None)? {
        let cause = ev.get_property(&options, &cause, None)?;
        ev.heap
            .object_mut(error)
            .properties
            .insert("cause".into(), Property::Data(cause));
    }
    Ok(error.into())
}

const FUNCTIONS: [BuiltinFunction; 4] = [
    BuiltinFunction::new("isFinite", 1, |ev, _, args| {
        Ok(ev.to_number(&arg(args, 0))?.value().is_finite().into())
    }),
    BuiltinFunction::new("isNaN", 1, |ev, _, args| {
        Ok(ev.to_number(&arg(args, 0))?.is_nan().into())
    }),
    BuiltinFunction::new("parseFloat", 1, parse_float_builtin),
    BuiltinFunction::new("parseInt", 2, parse_int_builtin),
];

fn parse_float_builtin(
    ev: &mut Evaluator,
    _: &RuntimeValue,
    args: &[RuntimeValue],
) -> Result<RuntimeValue, Error> {
    let input = ev.to_string(&arg(args, 0))?;
    Ok(parse_float(&input).into())
}

fn parse_int_builtin(
    ev: &mut Evaluator,
    _: &RuntimeValue,
    args: &[RuntimeValue],
) -> Result<RuntimeValue, Error> {
    let input = ev.to_string(&arg(args, 0))?;
    let radix = match arg(args, 1) {
        RuntimeValue::Undefined => 0,
        radix => ev.to_number(&radix)?.to_int32(),
    };
    Ok(parse_int(&input, radix).into())
}

fn split_sign(s: &str) -> (f64, &str) {
    match s.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, s.strip_prefix('+').unwrap_or(s)),
    }
}

/// Parses the longest decimal prefix of `input`.
pub(crate) fn parse_float(input: &str) -> f64 {
    let (sign, rest) = split_sign(input.trim_start());
    if rest.starts_with("Infinity") {
        return sign * f64::INFINITY;
    }

    let bytes = rest.as_bytes();
    let digits = |from: usize| {
        bytes[from..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count()
    };

    let integer = digits(0);
    let mut end = integer;
    let mut fraction = 0;
    if bytes.get(end) == Some(&b'.') {
        fraction = digits(end + 1);
        end += 1 + fraction;
    }
    if integer + fraction == 0 {
        return f64::NAN;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exponent = end + 1;
        if matches!(bytes.get(exponent), Some(b'+' | b'-')) {
            exponent += 1;
        }
        let count = digits(exponent);
        if count > 0 {
            end = exponent + count;
        }
    }

    rest[..end]
        .parse::<f64>()
        .map(|n| sign * n)
        .unwrap_or(f64::NAN)
}

/// Parses the longest integer prefix of `input`; radix 0 means 10, or 16 with a `0x` prefix.
pub(crate) fn parse_int(input: &str, radix: i32) -> f64 {
    let (sign, mut rest) = split_sign(input.trim_start());

    let radix = match radix {
        0 | 16 => {
            let hex = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X"));
            match hex {
                Some(hex) => {
                    rest = hex;
                    16
                }
                None if radix == 16 => 16,
                None => 10,
            }
        }
        2..=36 => radix as u32,
        _ => return f64::NAN,
    };

    let mut seen = false;
    let value = rest
        .chars()
        .map_while(|c| c.to_digit(radix))
        .fold(0.0, |acc, digit| {
            seen = true;
            acc * radix as f64 + digit as f64
        });
    if seen { sign * value } else { f64::NAN }
}

const ARRAY: BuiltinFunction = BuiltinFunction::new("Array", 1, |ev, _, args| {
    let items = match args {
        [RuntimeValue::Number(length)] => {
            let length = length
                .to_index()
                .ok_or_else(|| Error::RangeError("Invalid array length".to_string()))?;
            vec![RuntimeValue::Undefined; length]
        }
        _ => args.to_vec(),
    };
    Ok(ev.heap.alloc_array(items).into())
});

const ARRAY_STATICS: [BuiltinFunction; 3] = [
    BuiltinFunction::new("isArray", 1, |_, _, args| {
        Ok(matches!(arg(args, 0), RuntimeValue::Array(_)).into())
    }),
    BuiltinFunction::new("of", 0, |ev, _, args| {
        Ok(ev.heap.alloc_array(args.to_vec()).into())
    }),
    BuiltinFunction::new("from", 1, |ev, _, args| {
        let source = arg(args, 0);
        let items = match &source {
            RuntimeValue::Object(_) => {
                // array-likes: `{ length: n }`
                let length = ev.get_property(&source, &PropertyKey::from("length"), None)?;
                let length = ev.to_number(&length)?.to_index().unwrap_or(0);
                let mut items = Vec::with_capacity(length);
                for index in 0..length {
                    items.push(ev.get_property(&source, &PropertyKey::Index(index), None)?);
                }
                items
            }
            _ => ev.iterate(&source, None)?,
        };

        let items = match arg(args, 1) {
            RuntimeValue::Undefined => items,
            map => {
                let mut mapped = Vec::with_capacity(items.len());
                for (index, item) in items.into_iter().enumerate() {
                    mapped.push(ev.call_value(
                        &map,
                        RuntimeValue::Undefined,
                        vec![item, index.into()],
                        None,
                    )?);
                }
                mapped
            }
        };
        Ok(ev.heap.alloc_array(items).into())
    }),
];

const NUMBER: BuiltinFunction = BuiltinFunction::new("Number", 1, |ev, _, args| {
    match args.first() {
        None => Ok(Number::from(0.0).into()),
        Some(value) => Ok(ev.to_number(value)?.into()),
    }
});

const NUMBER_STATICS: [BuiltinFunction; 6] = [
    BuiltinFunction::new("isInteger", 1, |_, _, args| {
        Ok(arg(args, 0)
            .as_number()
            .is_some_and(|n| n.value().is_finite() && n.is_int())
            .into())
    }),
    BuiltinFunction::new("isSafeInteger", 1, |_, _, args| {
        Ok(arg(args, 0)
            .as_number()
            .is_some_and(|n| n.is_int() && n.value().abs() <= 9_007_199_254_740_991.0)
            .into())
    }),
    BuiltinFunction::new("isFinite", 1, |_, _, args| {
        Ok(arg(args, 0)
            .as_number()
            .is_some_and(|n| n.value().is_finite())
            .into())
    }),
    BuiltinFunction::new("isNaN", 1, |_, _, args| {
        Ok(arg(args, 0).as_number().is_some_and(|n| n.is_nan()).into())
    }),
    BuiltinFunction::new("parseFloat", 1, parse_float_builtin),
    BuiltinFunction::new("parseInt", 2, parse_int_builtin),
];

const STRING: BuiltinFunction = BuiltinFunction::new("String", 1, |ev, _, args| {
    match args.first() {
        None => Ok(RuntimeValue::from("")),
        Some(value) => Ok(ev.to_string(value)?.into()),
    }
});

const STRING_STATICS: [BuiltinFunction; 1] = [BuiltinFunction::new(
    "fromCharCode",
    1,
    |ev, _, args| {
        let mut s = String::with_capacity(args.len());
        for code in args {
            let code = ev.to_number(code)?.to_uint32() & 0xFFFF;
            s.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
        }
        Ok(s.into())
    },
)];

const BOOLEAN: BuiltinFunction = BuiltinFunction::new("Boolean", 1, |_, _, args| {
    Ok(arg(args, 0).is_truthy().into())
});

#[cfg(test)]
mod tests {
    use super::super::tests::{call_global, evaluator};
    use super::*;
    use crate::Ident;
    use crate::eval::error::EvalError;
    use rstest::rstest;

    fn global(ev: &Evaluator, name: &str) -> RuntimeValue {
        ev.env.resolve(ev.root, Ident::new(name)).unwrap()
    }

    #[rstest]
    #[case::plain("42", 42.0)]
    #[case::leading_space("  7.5kg", 7.5)]
    #[case::exponent("1e3x", 1000.0)]
    #[case::dangling_exponent("2e", 2.0)]
    #[case::fraction_only(".25", 0.25)]
    #[case::signed("-3.5", -3.5)]
    #[case::infinity("Infinity!", f64::INFINITY)]
    fn test_parse_float(#[case] input: &str, #[case] expected: f64) {
        assert_eq!(parse_float(input), expected);
    }

    #[rstest]
    #[case::empty("")]
    #[case::letters("abc")]
    #[case::dot(".")]
    fn test_parse_float_nan(#[case] input: &str) {
        assert!(parse_float(input).is_nan());
    }

    #[rstest]
    #[case::decimal("42px", 0, 42.0)]
    #[case::hex_prefix("0x1F", 0, 31.0)]
    #[case::hex_radix("ff", 16, 255.0)]
    #[case::binary("1012", 2, 5.0)]
    #[case::negative(" -17", 0, -17.0)]
    #[case::truncates("3.9", 10, 3.0)]
    fn test_parse_int(#[case] input: &str, #[case] radix: i32, #[case] expected: f64) {
        assert_eq!(parse_int(input, radix), expected);
    }

    #[rstest]
    #[case::no_digits("px", 0)]
    #[case::bad_radix("10", 1)]
    #[case::large_radix("10", 37)]
    fn test_parse_int_nan(#[case] input: &str, #[case] radix: i32) {
        assert!(parse_int(input, radix).is_nan());
    }

    #[rstest]
    #[case::is_nan_coerces("isNaN", RuntimeValue::from("abc"), true)]
    #[case::is_finite_coerces("isFinite", RuntimeValue::from("12"), true)]
    #[case::number_is_nan_strict("Number.isNaN", RuntimeValue::from("abc"), false)]
    #[case::number_is_finite_strict("Number.isFinite", RuntimeValue::from("12"), false)]
    #[case::is_integer("Number.isInteger", RuntimeValue::from(5.0), true)]
    #[case::not_integer("Number.isInteger", RuntimeValue::from(5.5), false)]
    #[case::safe_integer("Number.isSafeInteger", RuntimeValue::from(2f64.powi(53)), false)]
    #[case::boolean("Boolean", RuntimeValue::from(""), false)]
    fn test_predicates(
        mut evaluator: Evaluator,
        #[case] path: &str,
        #[case] input: RuntimeValue,
        #[case] expected: bool,
    ) {
        assert_eq!(
            call_global(&mut evaluator, path, RuntimeValue::Undefined, vec![input]),
            Ok(expected.into())
        );
    }

    #[rstest]
    fn test_conversions(mut evaluator: Evaluator) {
        assert_eq!(
            call_global(&mut evaluator, "Number", RuntimeValue::Undefined, vec![" 12 ".into()]),
            Ok(RuntimeValue::from(12.0))
        );
        assert_eq!(
            call_global(&mut evaluator, "Number", RuntimeValue::Undefined, vec![]),
            Ok(RuntimeValue::from(0.0))
        );
        assert_eq!(
            call_global(&mut evaluator, "String", RuntimeValue::Undefined, vec![RuntimeValue::Null]),
            Ok(RuntimeValue::from("null"))
        );
        assert_eq!(
            call_global(
                &mut evaluator,
                "String.fromCharCode",
                RuntimeValue::Undefined,
                vec![72.0.into(), 105.0.into()]
            ),
            Ok(RuntimeValue::from("Hi"))
        );
        assert_eq!(
            call_global(&mut evaluator, "Number.parseInt", RuntimeValue::Undefined, vec!["08".into()]),
            Ok(RuntimeValue::from(8.0))
        );
    }

    #[rstest]
    fn test_array_constructor(mut evaluator: Evaluator) {
        let sized = call_global(&mut evaluator, "Array", RuntimeValue::Undefined, vec![3.0.into()]).unwrap();
        assert_eq!(evaluator.inspect(&sized), "[ undefined, undefined, undefined ]");

        let listed =
            call_global(&mut evaluator, "Array", RuntimeValue::Undefined, vec!["a".into(), "b".into()]).unwrap();
        assert_eq!(evaluator.inspect(&listed), "[ 'a', 'b' ]");

        assert!(matches!(
            call_global(&mut evaluator, "Array", RuntimeValue::Undefined, vec![(-1.0).into()]),
            Err(EvalError::RangeError(..))
        ));
    }

    #[rstest]
    fn test_array_from_array_like(mut evaluator: Evaluator) {
        let mut like = Object::default();
        like.properties
            .insert("length".into(), Property::Data(2.0.into()));
        like.properties.insert("0".into(), Property::Data("x".into()));
        let like = evaluator.heap.alloc_object(like);

        let result =
            call_global(&mut evaluator, "Array.from", RuntimeValue::Undefined, vec![like.into()]).unwrap();
        assert_eq!(evaluator.inspect(&result), "[ 'x', undefined ]");
    }

    #[rstest]
    #[case::error("Error")]
    #[case::type_error("TypeError")]
    #[case::uri_error("URIError")]
    fn test_error_constructors(mut evaluator: Evaluator, #[case] name: &str) {
        let error = call_global(&mut evaluator, name, RuntimeValue::Undefined, vec!["boom".into()]).unwrap();

        assert_eq!(
            evaluator.error_summary(&error),
            Ok(Some(format!("{}: boom", name)))
        );
        let ctor = global(&evaluator, name);
        assert_eq!(evaluator.instance_of(&error, &ctor, None), Ok(true));
        let base = global(&evaluator, "Error");
        assert_eq!(evaluator.instance_of(&error, &base, None), Ok(true));
    }

    #[rstest]
    fn test_error_subclass_is_not_sibling(mut evaluator: Evaluator) {
        let error = call_global(&mut evaluator, "RangeError", RuntimeValue::Undefined, vec![]).unwrap();
        let type_error = global(&evaluator, "TypeError");
        assert_eq!(evaluator.instance_of(&error, &type_error, None), Ok(false));
        assert_eq!(evaluator.error_summary(&error), Ok(Some("RangeError".to_string())));
    }

    #[rstest]
    fn test_error_cause(mut evaluator: Evaluator) {
        let mut options = Object::default();
        options
            .properties
            .insert("cause".into(), Property::Data(7.0.into()));
        let options = evaluator.heap.alloc_object(options);
        let error = call_global(
            &mut evaluator,
            "Error",
            RuntimeValue::Undefined,
            vec!["outer".into(), options.into()],
        )
        .unwrap();

        assert_eq!(
            evaluator.get_property(&error, &PropertyKey::from("cause"), None),
            Ok(RuntimeValue::from(7.0))
        );
    }

    #[rstest]
    fn test_new_error_uses_registered_prototype(mut evaluator: Evaluator) {
        let error = evaluator.new_error("ReferenceError", "x is not defined");
        assert_eq!(
            evaluator.error_summary(&error),
            Ok(Some("ReferenceError: x is not defined".to_string()))
        );

        let unknown = evaluator.new_error("NoSuchError", "oops");
        assert_eq!(evaluator.error_summary(&unknown), Ok(Some("Error: oops".to_string())));
    }

    #[rstest]
    fn test_global_constants(evaluator: Evaluator) {
        assert_eq!(global(&evaluator, "undefined"), RuntimeValue::Undefined);
        assert!(global(&evaluator, "NaN").as_number().is_some_and(|n| n.is_nan()));
        assert!(matches!(global(&evaluator, "globalThis"), RuntimeValue::Object(_)));
    }
}
