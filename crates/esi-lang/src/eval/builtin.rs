use std::fmt;
use std::sync::LazyLock;

use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use thiserror::Error;

use super::Evaluator;
use super::error::EvalError;
use super::heap::{FunctionId, FunctionKind, FunctionObject, MethodOwner, ObjectId, Property};
use super::runtime_value::RuntimeValue;
use crate::number::Number;
use crate::range::Range;

mod array;
mod console;
mod globals;
mod json;
mod math;
mod object;
mod string;
mod uri;

pub type NativeFn =
    fn(&mut Evaluator, &RuntimeValue, &[RuntimeValue]) -> Result<RuntimeValue, Error>;

/// A function implemented in Rust.
///
/// Builtins receive the evaluator, the receiver (`this`) and the arguments.
#[derive(Clone, Copy)]
pub struct BuiltinFunction {
    pub name: &'static str,
    /// Reported as the function's `length`.
    pub arity: u8,
    pub func: NativeFn,
}

impl BuiltinFunction {
    pub const fn new(name: &'static str, arity: u8, func: NativeFn) -> Self {
        Self { name, arity, func }
    }
}

impl fmt::Debug for BuiltinFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltinFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

type BuiltinTable = FxHashMap<&'static str, BuiltinFunction>;

fn table<const N: usize>(functions: [BuiltinFunction; N]) -> BuiltinTable {
    functions.into_iter().map(|f| (f.name, f)).collect()
}

static STRING_METHODS: LazyLock<BuiltinTable> = LazyLock::new(|| table(string::METHODS));
static ARRAY_METHODS: LazyLock<BuiltinTable> = LazyLock::new(|| table(array::METHODS));
static NUMBER_METHODS: LazyLock<BuiltinTable> = LazyLock::new(|| table(NUMBER_METHOD_LIST));
static FUNCTION_METHODS: LazyLock<BuiltinTable> = LazyLock::new(|| table(FUNCTION_METHOD_LIST));
static OBJECT_METHODS: LazyLock<BuiltinTable> = LazyLock::new(|| table(object::METHODS));

/// Looks up a method on the builtin table of a receiver type.
pub fn method(owner: MethodOwner, name: &str) -> Option<&'static BuiltinFunction> {
    match owner {
        MethodOwner::String => STRING_METHODS.get(name),
        MethodOwner::Array => ARRAY_METHODS.get(name),
        MethodOwner::Number => NUMBER_METHODS.get(name),
        MethodOwner::Function => FUNCTION_METHODS.get(name),
        MethodOwner::Object => OBJECT_METHODS.get(name),
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("{0}")]
    TypeError(String),
    #[error("{0}")]
    RangeError(String),
    #[error("{0}")]
    SyntaxError(String),
    #[error("{0}")]
    UriError(String),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

impl Error {
    pub fn to_eval_error(self, location: Option<Range>) -> EvalError {
        match self {
            Error::TypeError(message) => EvalError::TypeError(location, message),
            Error::RangeError(message) => EvalError::RangeError(location, message),
            Error::SyntaxError(message) => EvalError::SyntaxError(location, message),
            Error::UriError(message) => EvalError::UriError(location, message),
            Error::Eval(e) => e.or_location(location),
        }
    }
}

/// A timer registered by `setTimeout`/`setInterval`. Timers are recorded, never run.
#[derive(Debug, Clone, PartialEq)]
pub struct Timer {
    pub id: u32,
    pub callback: FunctionId,
    pub delay: f64,
    pub repeat: bool,
}

/// Host-side state of one run: captured console lines, timers and the random generator.
#[derive(Debug, Clone)]
pub struct HostState {
    pub capture_console: bool,
    pub logs: Vec<String>,
    pub timers: Vec<Timer>,
    next_timer_id: u32,
    rng: u64,
}

impl HostState {
    pub fn new(capture_console: bool, random_seed: u64) -> Self {
        Self {
            capture_console,
            logs: Vec::new(),
            timers: Vec::new(),
            next_timer_id: 1,
            // xorshift has a fixed point at zero
            rng: if random_seed == 0 {
                0x9E37_79B9_7F4A_7C15
            } else {
                random_seed
            },
        }
    }

    /// xorshift64*, scaled to `[0, 1)`.
    pub(crate) fn next_random(&mut self) -> f64 {
        let mut x = self.rng;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.rng = x;
        (x.wrapping_mul(0x2545_F491_4F6C_DD1D) >> 11) as f64 / (1u64 << 53) as f64
    }

    pub(crate) fn add_timer(&mut self, callback: FunctionId, delay: f64, repeat: bool) -> u32 {
        let id = self.next_timer_id;
        self.next_timer_id += 1;
        self.timers.push(Timer {
            id,
            callback,
            delay,
            repeat,
        });
        id
    }

    pub(crate) fn clear_timer(&mut self, id: u32) {
        self.timers.retain(|timer| timer.id != id);
    }
}

/// Builtin objects the evaluator needs to recognize after installation.
#[derive(Debug, Default)]
pub struct Intrinsics {
    pub object_ctor: Option<FunctionId>,
    pub array_ctor: Option<FunctionId>,
    /// `prototype` objects of the error constructors, by constructor name.
    pub error_prototypes: FxHashMap<&'static str, ObjectId>,
}

/// Installs the default globals on the root scope; `global_this` is the top-level `this`.
pub fn install(ev: &mut Evaluator, global_this: ObjectId) {
    globals::install(ev, global_this);
    console::install(ev);
    math::install(ev);
    json::install(ev);
    uri::install(ev);
}

const NUMBER_METHOD_LIST: [BuiltinFunction; 4] = [
    BuiltinFunction::new("toFixed", 1, |_, this, args| {
        let n = this_number(this, "toFixed")?;
        let digits = match args.first() {
            None | Some(RuntimeValue::Undefined) => 0.0,
            Some(RuntimeValue::Number(d)) => d.value().trunc(),
            Some(_) => 0.0,
        };
        if !(0.0..=100.0).contains(&digits) {
            return Err(Error::RangeError(
                "toFixed() digits argument must be between 0 and 100".to_string(),
            ));
        }
        Ok(n.to_fixed(digits as usize).into())
    }),
    BuiltinFunction::new("toString", 1, |_, this, args| {
        let n = this_number(this, "toString")?;
        let radix = match args.first() {
            None | Some(RuntimeValue::Undefined) => 10.0,
            Some(RuntimeValue::Number(radix)) => radix.value().trunc(),
            Some(_) => f64::NAN,
        };
        if !(2.0..=36.0).contains(&radix) {
            return Err(Error::RangeError(
                "toString() radix must be between 2 and 36".to_string(),
            ));
        }
        Ok(n.to_string_radix(radix as u32).into())
    }),
    BuiltinFunction::new("toPrecision", 1, |_, this, args| {
        let n = this_number(this, "toPrecision")?;
        match args.first().and_then(RuntimeValue::as_number) {
            None => Ok(n.to_string().into()),
            Some(precision) if (1.0..=100.0).contains(&precision.value()) => {
                Ok(to_precision(n, precision.value() as usize).into())
            }
            Some(_) => Err(Error::RangeError(
                "toPrecision() argument must be between 1 and 100".to_string(),
            )),
        }
    }),
    BuiltinFunction::new("valueOf", 0, |_, this, _| {
        Ok(this_number(this, "valueOf")?.into())
    }),
];

fn to_precision(n: Number, precision: usize) -> String {
    let value = n.value();
    if !value.is_finite() || value == 0.0 {
        return n.to_fixed(precision.saturating_sub(1));
    }
    let exponent = value.abs().log10().floor() as i32;
    let digits = (precision as i32 - 1 - exponent).max(0) as usize;
    format!("{:.*}", digits, value)
}

fn this_number(this: &RuntimeValue, method: &str) -> Result<Number, Error> {
    this.as_number().ok_or_else(|| {
        Error::TypeError(format!(
            "Number.prototype.{} requires that 'this' be a Number",
            method
        ))
    })
}

const FUNCTION_METHOD_LIST: [BuiltinFunction; 4] = [
    BuiltinFunction::new("call", 1, |ev, this, args| {
        let receiver = arg(args, 0);
        let rest = args.get(1..).map(<[_]>::to_vec).unwrap_or_default();
        Ok(ev.call_value(this, receiver, rest, None)?)
    }),
    BuiltinFunction::new("apply", 2, |ev, this, args| {
        let receiver = arg(args, 0);
        let rest = match arg(args, 1) {
            RuntimeValue::Undefined | RuntimeValue::Null => Vec::new(),
            RuntimeValue::Array(id) => ev.heap.array(id).clone(),
            _ => {
                return Err(Error::TypeError(
                    "CreateListFromArrayLike called on non-object".to_string(),
                ));
            }
        };
        Ok(ev.call_value(this, receiver, rest, None)?)
    }),
    BuiltinFunction::new("bind", 1, |ev, this, args| {
        let RuntimeValue::Function(target) = this else {
            return Err(Error::TypeError("Bind must be called on a function".to_string()));
        };
        let name = format!("bound {}", ev.heap.function(*target).name);
        let bound = FunctionKind::Bound {
            target: *target,
            this: arg(args, 0),
            args: args.get(1..).map(<[_]>::to_vec).unwrap_or_default(),
        };
        Ok(ev.heap.alloc_function(FunctionObject::new(bound, name)).into())
    }),
    BuiltinFunction::new("toString", 0, |ev, this, _| match this {
        RuntimeValue::Function(id) => Ok(format!(
            "function {}() {{ [native code] }}",
            ev.heap.function(*id).name
        )
        .into()),
        _ => Err(Error::TypeError(
            "Function.prototype.toString requires that 'this' be a Function".to_string(),
        )),
    }),
];

/// The argument at `index`, `undefined` when absent.
#[inline(always)]
pub(crate) fn arg(args: &[RuntimeValue], index: usize) -> RuntimeValue {
    args.get(index).cloned().unwrap_or_default()
}

/// Allocates a function object for a builtin.
pub(crate) fn function_value(ev: &mut Evaluator, builtin: BuiltinFunction) -> FunctionId {
    ev.heap
        .alloc_function(FunctionObject::new(FunctionKind::Builtin(builtin), builtin.name))
}

/// Allocates a plain object whose properties are the given builtins and constants.
pub(crate) fn namespace(
    ev: &mut Evaluator,
    functions: &[BuiltinFunction],
    constants: &[(&'static str, RuntimeValue)],
) -> ObjectId {
    let id = ev.heap.new_object();
    for builtin in functions {
        let function = function_value(ev, *builtin);
        ev.heap
            .object_mut(id)
            .properties
            .insert(SmolStr::new_static(builtin.name), Property::Data(function.into()));
    }
    for (name, value) in constants {
        ev.heap
            .object_mut(id)
            .properties
            .insert(SmolStr::new_static(name), Property::Data(value.clone()));
    }
    id
}

/// Allocates a builtin constructor carrying static members.
pub(crate) fn constructor(
    ev: &mut Evaluator,
    builtin: BuiltinFunction,
    statics: &[BuiltinFunction],
    constants: &[(&'static str, RuntimeValue)],
) -> FunctionId {
    let id = function_value(ev, builtin);
    for member in statics {
        let function = function_value(ev, *member);
        ev.heap
            .function_mut(id)
            .properties
            .insert(SmolStr::new_static(member.name), Property::Data(function.into()));
    }
    for (name, value) in constants {
        ev.heap
            .function_mut(id)
            .properties
            .insert(SmolStr::new_static(name), Property::Data(value.clone()));
    }
    id
}
