use std::cmp::Ordering;

use smol_str::SmolStr;

use super::Evaluator;
use super::error::EvalError;
use super::heap::{FunctionKind, ObjectKind, Property};
use super::property::PropertyKey;
use super::runtime_value::RuntimeValue;
use crate::ast::node::BinaryOperator;
use crate::number::{self, Number};
use crate::range::Range;

/// Which conversion `ToPrimitive` prefers for objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hint {
    Number,
    String,
}

/// ToNumber for strings: surrounding whitespace is ignored, the empty string is `0`,
/// `0x`/`0o`/`0b` prefixes select a radix and anything else unparsable is `NaN`.
pub fn string_to_number(s: &str) -> Number {
    let s = s.trim();
    if s.is_empty() {
        return Number::new(0.0);
    }

    let radix = match s.get(..2) {
        Some("0x") | Some("0X") => Some(16),
        Some("0o") | Some("0O") => Some(8),
        Some("0b") | Some("0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        return u64::from_str_radix(&s[2..], radix)
            .map(|n| Number::new(n as f64))
            .unwrap_or(number::NAN);
    }

    match s {
        "Infinity" | "+Infinity" => number::INFINITE,
        "-Infinity" => -number::INFINITE,
        // Rust accepts spellings such as "inf" and "nan" that are not numbers here.
        s if s.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => number::NAN,
        s => s.parse::<f64>().map(Number::new).unwrap_or(number::NAN),
    }
}

impl Evaluator {
    pub(crate) fn to_primitive(
        &mut self,
        value: &RuntimeValue,
        hint: Hint,
    ) -> Result<RuntimeValue, EvalError> {
        if !value.is_object() {
            return Ok(value.clone());
        }

        let order = match hint {
            Hint::Number => ["valueOf", "toString"],
            Hint::String => ["toString", "valueOf"],
        };
        for name in order {
            let method = self.get_property(value, &PropertyKey::from(name), None)?;
            if let RuntimeValue::Function(id) = method {
                let result = self.call_function(id, value.clone(), vec![], None)?;
                if !result.is_object() {
                    return Ok(result);
                }
            }
        }

        Err(EvalError::TypeError(
            None,
            "Cannot convert object to primitive value".to_string(),
        ))
    }

    pub(crate) fn to_number(&mut self, value: &RuntimeValue) -> Result<Number, EvalError> {
        Ok(match value {
            RuntimeValue::Undefined => number::NAN,
            RuntimeValue::Null => Number::new(0.0),
            RuntimeValue::Bool(b) => Number::new(if *b { 1.0 } else { 0.0 }),
            RuntimeValue::Number(n) => *n,
            RuntimeValue::String(s) => string_to_number(s),
            object => {
                let primitive = self.to_primitive(object, Hint::Number)?;
                return self.to_number(&primitive);
            }
        })
    }

    pub(crate) fn to_string(&mut self, value: &RuntimeValue) -> Result<SmolStr, EvalError> {
        Ok(match value {
            RuntimeValue::Undefined => SmolStr::new_static("undefined"),
            RuntimeValue::Null => SmolStr::new_static("null"),
            RuntimeValue::Bool(true) => SmolStr::new_static("true"),
            RuntimeValue::Bool(false) => SmolStr::new_static("false"),
            RuntimeValue::Number(n) => SmolStr::new(n.to_string()),
            RuntimeValue::String(s) => s.clone(),
            object => {
                let primitive = self.to_primitive(object, Hint::String)?;
                return self.to_string(&primitive);
            }
        })
    }

    /// `Array.prototype.join`, with cyclic references rendered as empty strings.
    pub(crate) fn join_array(
        &mut self,
        value: &RuntimeValue,
        separator: &str,
    ) -> Result<SmolStr, EvalError> {
        let RuntimeValue::Array(id) = value else {
            return self.to_string(value);
        };
        if self.joining.contains(id) {
            return Ok(SmolStr::default());
        }

        self.joining.push(*id);
        let items = self.heap.array(*id).clone();
        let result = items
            .iter()
            .map(|item| match item {
                RuntimeValue::Undefined | RuntimeValue::Null => Ok(SmolStr::default()),
                item => self.to_string(item),
            })
            .collect::<Result<Vec<_>, _>>();
        self.joining.pop();

        Ok(SmolStr::new(itertools::join(result?, separator)))
    }

    /// The `==` relation.
    pub(crate) fn loose_equals(
        &mut self,
        left: &RuntimeValue,
        right: &RuntimeValue,
    ) -> Result<bool, EvalError> {
        use RuntimeValue as V;

        Ok(match (left, right) {
            (V::Undefined | V::Null, V::Undefined | V::Null) => true,
            (V::Undefined | V::Null, _) | (_, V::Undefined | V::Null) => false,
            (V::Number(_), V::String(_))
            | (V::String(_), V::Number(_))
            | (V::Bool(_), _)
            | (_, V::Bool(_)) => {
                if left.type_of() == right.type_of() {
                    return Ok(left == right);
                }
                let (l, r) = (self.to_number(left)?, self.to_number(right)?);
                l == r
            }
            (l, r) if l.is_object() && !r.is_object() => {
                let l = self.to_primitive(l, Hint::Number)?;
                return self.loose_equals(&l, r);
            }
            (l, r) if !l.is_object() && r.is_object() => {
                let r = self.to_primitive(r, Hint::Number)?;
                return self.loose_equals(l, &r);
            }
            (l, r) => l == r,
        })
    }

    /// Relational comparison; `None` when either side is `NaN`.
    pub(crate) fn compare(
        &mut self,
        left: &RuntimeValue,
        right: &RuntimeValue,
    ) -> Result<Option<Ordering>, EvalError> {
        let left = self.to_primitive(left, Hint::Number)?;
        let right = self.to_primitive(right, Hint::Number)?;
        if let (RuntimeValue::String(l), RuntimeValue::String(r)) = (&left, &right) {
            return Ok(Some(l.cmp(r)));
        }
        let (l, r) = (self.to_number(&left)?, self.to_number(&right)?);
        Ok(l.value().partial_cmp(&r.value()))
    }

    pub(crate) fn binary_op(
        &mut self,
        op: BinaryOperator,
        left: &RuntimeValue,
        right: &RuntimeValue,
        loc: Option<Range>,
    ) -> Result<RuntimeValue, EvalError> {
        Ok(match op {
            BinaryOperator::Add => {
                let l = self.to_primitive(left, Hint::Number)?;
                let r = self.to_primitive(right, Hint::Number)?;
                if matches!(l, RuntimeValue::String(_)) || matches!(r, RuntimeValue::String(_)) {
                    let mut s = self.to_string(&l)?.to_string();
                    s.push_str(&self.to_string(&r)?);
                    RuntimeValue::String(s.into())
                } else {
                    (self.to_number(&l)? + self.to_number(&r)?).into()
                }
            }
            BinaryOperator::Sub => (self.to_number(left)? - self.to_number(right)?).into(),
            BinaryOperator::Mul => (self.to_number(left)? * self.to_number(right)?).into(),
            BinaryOperator::Div => (self.to_number(left)? / self.to_number(right)?).into(),
            BinaryOperator::Rem => (self.to_number(left)? % self.to_number(right)?).into(),
            BinaryOperator::Exp => {
                let (base, exponent) = (self.to_number(left)?.value(), self.to_number(right)?.value());
                if exponent.is_nan() || (base.abs() == 1.0 && exponent.is_infinite()) {
                    RuntimeValue::from(f64::NAN)
                } else {
                    base.powf(exponent).into()
                }
            }
            BinaryOperator::BitOr => self.int32_op(left, right, |l, r| l | r)?,
            BinaryOperator::BitXor => self.int32_op(left, right, |l, r| l ^ r)?,
            BinaryOperator::BitAnd => self.int32_op(left, right, |l, r| l & r)?,
            BinaryOperator::Shl => self.int32_op(left, right, |l, r| l.wrapping_shl(r as u32 & 31))?,
            BinaryOperator::Shr => self.int32_op(left, right, |l, r| l.wrapping_shr(r as u32 & 31))?,
            BinaryOperator::UShr => {
                let l = self.to_number(left)?.to_uint32();
                let r = self.to_number(right)?.to_uint32();
                RuntimeValue::from(Number::from(l.wrapping_shr(r & 31)))
            }
            BinaryOperator::Eq => self.loose_equals(left, right)?.into(),
            BinaryOperator::NotEq => (!self.loose_equals(left, right)?).into(),
            BinaryOperator::StrictEq => (left == right).into(),
            BinaryOperator::StrictNotEq => (left != right).into(),
            BinaryOperator::Lt => (self.compare(left, right)? == Some(Ordering::Less)).into(),
            BinaryOperator::LtEq => matches!(
                self.compare(left, right)?,
                Some(Ordering::Less | Ordering::Equal)
            )
            .into(),
            BinaryOperator::Gt => (self.compare(left, right)? == Some(Ordering::Greater)).into(),
            BinaryOperator::GtEq => matches!(
                self.compare(left, right)?,
                Some(Ordering::Greater | Ordering::Equal)
            )
            .into(),
            BinaryOperator::In => {
                let key = self.to_property_key(left)?;
                self.has_property(right, &key, loc)?.into()
            }
            BinaryOperator::InstanceOf => self.instance_of(left, right, loc)?.into(),
        })
    }

    fn int32_op(
        &mut self,
        left: &RuntimeValue,
        right: &RuntimeValue,
        op: impl Fn(i32, i32) -> i32,
    ) -> Result<RuntimeValue, EvalError> {
        let l = self.to_number(left)?.to_int32();
        let r = self.to_number(right)?.to_int32();
        Ok(RuntimeValue::from(Number::from(op(l, r))))
    }

    pub(crate) fn instance_of(
        &mut self,
        value: &RuntimeValue,
        constructor: &RuntimeValue,
        loc: Option<Range>,
    ) -> Result<bool, EvalError> {
        let RuntimeValue::Function(ctor) = constructor else {
            return Err(EvalError::TypeError(
                loc,
                "Right-hand side of 'instanceof' is not callable".to_string(),
            ));
        };

        if let FunctionKind::Bound { target, .. } = self.heap.function(*ctor).kind {
            return self.instance_of(value, &RuntimeValue::Function(target), loc);
        }
        if Some(*ctor) == self.intrinsics.object_ctor {
            return Ok(value.is_object());
        }
        if Some(*ctor) == self.intrinsics.array_ctor {
            return Ok(matches!(value, RuntimeValue::Array(_)));
        }

        let RuntimeValue::Object(object) = value else {
            return Ok(false);
        };
        let prototype = match self.heap.function(*ctor).properties.get("prototype") {
            Some(Property::Data(RuntimeValue::Object(prototype))) => *prototype,
            _ => return Ok(false),
        };
        Ok(self.heap.proto_chain(*object).any(|proto| proto == prototype))
    }

    /// `Error.prototype.toString` applied to an error object, `None` for anything else.
    pub(crate) fn error_summary(&mut self, value: &RuntimeValue) -> Result<Option<String>, EvalError> {
        let RuntimeValue::Object(id) = value else {
            return Ok(None);
        };
        if self.heap.object(*id).kind != ObjectKind::Error {
            return Ok(None);
        }

        let name = self.get_property(value, &PropertyKey::from("name"), None)?;
        let message = self.get_property(value, &PropertyKey::from("message"), None)?;
        let name = if name.is_undefined() {
            SmolStr::new_static("Error")
        } else {
            self.to_string(&name)?
        };
        let message = if message.is_undefined() {
            SmolStr::default()
        } else {
            self.to_string(&message)?
        };

        Ok(Some(match (name.is_empty(), message.is_empty()) {
            (_, true) => name.to_string(),
            (true, false) => message.to_string(),
            (false, false) => format!("{}: {}", name, message),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::Options;
    use crate::eval::builtin::HostState;
    use proptest::prelude::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn evaluator() -> Evaluator {
        Evaluator::new(Options::default(), HostState::new(true, 1))
    }

    fn num(n: f64) -> RuntimeValue {
        RuntimeValue::from(n)
    }

    #[rstest]
    #[case::empty("", 0.0)]
    #[case::spaces("  42  ", 42.0)]
    #[case::float("1.5e3", 1500.0)]
    #[case::hex("0x1f", 31.0)]
    #[case::binary("0b101", 5.0)]
    #[case::negative("-7", -7.0)]
    #[case::infinity("-Infinity", f64::NEG_INFINITY)]
    fn test_string_to_number(#[case] input: &str, #[case] expected: f64) {
        assert_eq!(string_to_number(input).value(), expected);
    }

    #[rstest]
    #[case::word("abc")]
    #[case::rust_inf("inf")]
    #[case::rust_nan("NaN ")]
    #[case::trailing("12px")]
    #[case::bad_hex("0xzz")]
    fn test_string_to_number_nan(#[case] input: &str) {
        assert!(string_to_number(input).is_nan());
    }

    #[rstest]
    #[case::numbers(BinaryOperator::Add, num(1.0), num(2.0), num(3.0))]
    #[case::concat(BinaryOperator::Add, RuntimeValue::from("a"), num(1.0), RuntimeValue::from("a1"))]
    #[case::concat_left(BinaryOperator::Add, num(1.0), RuntimeValue::from("2"), RuntimeValue::from("12"))]
    #[case::bool_add(BinaryOperator::Add, RuntimeValue::TRUE, num(1.0), num(2.0))]
    #[case::null_add(BinaryOperator::Add, RuntimeValue::Null, num(1.0), num(1.0))]
    #[case::sub_strings(BinaryOperator::Sub, RuntimeValue::from("5"), RuntimeValue::from("2"), num(3.0))]
    #[case::rem_negative(BinaryOperator::Rem, num(-5.0), num(3.0), num(-2.0))]
    #[case::exp(BinaryOperator::Exp, num(2.0), num(10.0), num(1024.0))]
    #[case::bit_or(BinaryOperator::BitOr, num(5.5), num(2.0), num(7.0))]
    #[case::shl_wrap(BinaryOperator::Shl, num(1.0), num(33.0), num(2.0))]
    #[case::shr_negative(BinaryOperator::Shr, num(-8.0), num(1.0), num(-4.0))]
    #[case::ushr_negative(BinaryOperator::UShr, num(-1.0), num(28.0), num(15.0))]
    #[case::loose_eq(BinaryOperator::Eq, RuntimeValue::from("1"), num(1.0), RuntimeValue::TRUE)]
    #[case::loose_null(BinaryOperator::Eq, RuntimeValue::Null, RuntimeValue::Undefined, RuntimeValue::TRUE)]
    #[case::loose_null_zero(BinaryOperator::Eq, RuntimeValue::Null, num(0.0), RuntimeValue::FALSE)]
    #[case::strict(BinaryOperator::StrictEq, RuntimeValue::from("1"), num(1.0), RuntimeValue::FALSE)]
    #[case::string_compare(BinaryOperator::Lt, RuntimeValue::from("a"), RuntimeValue::from("b"), RuntimeValue::TRUE)]
    #[case::numeric_compare(BinaryOperator::Lt, RuntimeValue::from("10"), num(9.0), RuntimeValue::FALSE)]
    #[case::nan_compare(BinaryOperator::GtEq, num(f64::NAN), num(1.0), RuntimeValue::FALSE)]
    fn test_binary_op(
        mut evaluator: Evaluator,
        #[case] op: BinaryOperator,
        #[case] left: RuntimeValue,
        #[case] right: RuntimeValue,
        #[case] expected: RuntimeValue,
    ) {
        assert_eq!(evaluator.binary_op(op, &left, &right, None), Ok(expected));
    }

    #[rstest]
    fn test_exp_nan_rules(mut evaluator: Evaluator) {
        let result = evaluator
            .binary_op(BinaryOperator::Exp, &num(1.0), &num(f64::INFINITY), None)
            .unwrap();
        assert!(result.as_number().is_some_and(|n| n.is_nan()));
    }

    #[rstest]
    fn test_array_to_string(mut evaluator: Evaluator) {
        let inner = evaluator.heap.alloc_array(vec![num(2.0), RuntimeValue::Null]);
        let outer = evaluator
            .heap
            .alloc_array(vec![num(1.0), RuntimeValue::Array(inner)]);
        assert_eq!(
            evaluator.to_string(&RuntimeValue::Array(outer)),
            Ok(SmolStr::new("1,2,"))
        );
    }

    #[rstest]
    fn test_cyclic_join(mut evaluator: Evaluator) {
        let array = evaluator.heap.alloc_array(vec![num(1.0)]);
        evaluator.heap.array_mut(array).push(RuntimeValue::Array(array));
        assert_eq!(
            evaluator.join_array(&RuntimeValue::Array(array), "-"),
            Ok(SmolStr::new("1-"))
        );
    }

    #[rstest]
    fn test_object_to_string(mut evaluator: Evaluator) {
        let object = RuntimeValue::Object(evaluator.heap.new_object());
        assert_eq!(
            evaluator.to_string(&object),
            Ok(SmolStr::new("[object Object]"))
        );
        assert!(evaluator.to_number(&object).unwrap().is_nan());
    }

    proptest! {
        #[test]
        fn test_int_strings_round_trip(n in -1_000_000i64..1_000_000) {
            prop_assert_eq!(string_to_number(&n.to_string()).value(), n as f64);
        }

        #[test]
        fn test_bitwise_or_zero_truncates(n in -1.0e9f64..1.0e9) {
            let mut evaluator = Evaluator::new(Options::default(), HostState::new(true, 1));
            let result = evaluator
                .binary_op(BinaryOperator::BitOr, &num(n), &num(0.0), None)
                .unwrap();
            prop_assert_eq!(result, num(n.trunc()));
        }
    }
}
