use std::f64::consts;

use super::{BuiltinFunction, Error, arg, namespace};
use crate::eval::Evaluator;
use crate::eval::runtime_value::RuntimeValue;

/// Math functions of one argument, applied after `ToNumber`.
macro_rules! unary {
    ($name:literal, $f:expr) => {
        BuiltinFunction::new($name, 1, |ev, _, args| {
            let x = ev.to_number(&arg(args, 0))?.value();
            let f: fn(f64) -> f64 = $f;
            Ok(f(x).into())
        })
    };
}

const FUNCTIONS: [BuiltinFunction; 27] = [
    unary!("abs", f64::abs),
    unary!("floor", f64::floor),
    unary!("ceil", f64::ceil),
    unary!("round", round),
    unary!("trunc", f64::trunc),
    unary!("sign", sign),
    unary!("sqrt", f64::sqrt),
    unary!("cbrt", f64::cbrt),
    unary!("sin", f64::sin),
    unary!("cos", f64::cos),
    unary!("tan", f64::tan),
    unary!("asin", f64::asin),
    unary!("acos", f64::acos),
    unary!("atan", f64::atan),
    unary!("exp", f64::exp),
    unary!("log", f64::ln),
    unary!("log2", f64::log2),
    unary!("log10", f64::log10),
    unary!("fround", |x| x as f32 as f64),
    BuiltinFunction::new("pow", 2, |ev, _, args| {
        let base = ev.to_number(&arg(args, 0))?.value();
        let exponent = ev.to_number(&arg(args, 1))?.value();
        Ok(pow(base, exponent).into())
    }),
    BuiltinFunction::new("atan2", 2, |ev, _, args| {
        let y = ev.to_number(&arg(args, 0))?.value();
        let x = ev.to_number(&arg(args, 1))?.value();
        Ok(y.atan2(x).into())
    }),
    BuiltinFunction::new("min", 2, |ev, _, args| {
        fold(ev, args, f64::INFINITY, f64::min)
    }),
    BuiltinFunction::new("max", 2, |ev, _, args| {
        fold(ev, args, f64::NEG_INFINITY, f64::max)
    }),
    BuiltinFunction::new("hypot", 2, |ev, _, args| {
        let numbers = numbers(ev, args)?;
        if numbers.iter().any(|n| n.is_infinite()) {
            return Ok(f64::INFINITY.into());
        }
        Ok(numbers.iter().map(|n| n * n).sum::<f64>().sqrt().into())
    }),
    BuiltinFunction::new("random", 0, |ev, _, _| Ok(ev.host.next_random().into())),
    BuiltinFunction::new("expm1", 1, |ev, _, args| {
        Ok(ev.to_number(&arg(args, 0))?.value().exp_m1().into())
    }),
    BuiltinFunction::new("log1p", 1, |ev, _, args| {
        Ok(ev.to_number(&arg(args, 0))?.value().ln_1p().into())
    }),
];

const CONSTANTS: [(&str, f64); 8] = [
    ("PI", consts::PI),
    ("E", consts::E),
    ("LN2", consts::LN_2),
    ("LN10", consts::LN_10),
    ("LOG2E", consts::LOG2_E),
    ("LOG10E", consts::LOG10_E),
    ("SQRT2", consts::SQRT_2),
    ("SQRT1_2", consts::FRAC_1_SQRT_2),
];

pub(super) fn install(ev: &mut Evaluator) {
    let constants = CONSTANTS.map(|(name, value)| (name, RuntimeValue::from(value)));
    let math = namespace(ev, &FUNCTIONS, &constants);
    ev.define_global("Math", math.into());
}

/// Rounds half up, toward positive infinity.
fn round(x: f64) -> f64 {
    if !x.is_finite() || x.fract() == 0.0 {
        return x;
    }
    let rounded = (x + 0.5).floor();
    // keep the sign of results in (-0.5, 0)
    if rounded == 0.0 && x < 0.0 { -0.0 } else { rounded }
}

fn sign(x: f64) -> f64 {
    if x.is_nan() || x == 0.0 { x } else { x.signum() }
}

fn pow(base: f64, exponent: f64) -> f64 {
    // 1 ** NaN and (+-1) ** (+-Infinity) are NaN, unlike powf
    if exponent.is_nan() || (base.abs() == 1.0 && exponent.is_infinite()) {
        f64::NAN
    } else {
        base.powf(exponent)
    }
}

fn numbers(ev: &mut Evaluator, args: &[RuntimeValue]) -> Result<Vec<f64>, Error> {
    args.iter()
        .map(|arg| ev.to_number(arg).map(|n| n.value()).map_err(Error::from))
        .collect()
}

fn fold(
    ev: &mut Evaluator,
    args: &[RuntimeValue],
    initial: f64,
    f: fn(f64, f64) -> f64,
) -> Result<RuntimeValue, Error> {
    let numbers = numbers(ev, args)?;
    if numbers.iter().any(|n| n.is_nan()) {
        return Ok(f64::NAN.into());
    }
    Ok(numbers.into_iter().fold(initial, f).into())
}
