use itertools::Itertools;
use tracing::{info, warn};

use super::{BuiltinFunction, Error, arg, function_value, namespace};
use crate::eval::Evaluator;
use crate::eval::runtime_value::RuntimeValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

const METHODS: [BuiltinFunction; 5] = [
    BuiltinFunction::new("log", 0, |ev, _, args| write(ev, "log", Stream::Stdout, args)),
    BuiltinFunction::new("info", 0, |ev, _, args| write(ev, "info", Stream::Stdout, args)),
    BuiltinFunction::new("debug", 0, |ev, _, args| write(ev, "debug", Stream::Stdout, args)),
    BuiltinFunction::new("warn", 0, |ev, _, args| write(ev, "warn", Stream::Stderr, args)),
    BuiltinFunction::new("error", 0, |ev, _, args| write(ev, "error", Stream::Stderr, args)),
];

const TIMERS: [BuiltinFunction; 4] = [
    BuiltinFunction::new("setTimeout", 2, |ev, _, args| schedule(ev, args, false)),
    BuiltinFunction::new("setInterval", 2, |ev, _, args| schedule(ev, args, true)),
    BuiltinFunction::new("clearTimeout", 1, clear),
    BuiltinFunction::new("clearInterval", 1, clear),
];

pub(super) fn install(ev: &mut Evaluator) {
    let console = namespace(ev, &METHODS, &[]);
    ev.define_global("console", console.into());

    for builtin in TIMERS {
        let function = function_value(ev, builtin);
        ev.define_global(builtin.name, function.into());
    }
}

fn write(
    ev: &mut Evaluator,
    method: &str,
    stream: Stream,
    args: &[RuntimeValue],
) -> Result<RuntimeValue, Error> {
    let line = args.iter().map(|arg| ev.format_log_arg(arg)).join(" ");

    if ev.host.capture_console {
        info!(target: "esi_lang::console", method, "{}", line);
        ev.host.logs.push(line);
    } else {
        match stream {
            Stream::Stdout => println!("{}", line),
            Stream::Stderr => eprintln!("{}", line),
        }
    }
    Ok(RuntimeValue::Undefined)
}

fn schedule(ev: &mut Evaluator, args: &[RuntimeValue], repeat: bool) -> Result<RuntimeValue, Error> {
    let RuntimeValue::Function(callback) = arg(args, 0) else {
        return Err(Error::TypeError(format!(
            "The \"callback\" argument must be of type function. Received {}",
            ev.inspect(&arg(args, 0))
        )));
    };
    let delay = match arg(args, 1) {
        RuntimeValue::Undefined => 0.0,
        delay => ev.to_number(&delay)?.value(),
    };
    let delay = if delay.is_finite() { delay.max(0.0) } else { 0.0 };

    let id = ev.host.add_timer(callback, delay, repeat);
    warn!(id, delay, repeat, "timer scheduled; timers are recorded but never run");
    Ok(f64::from(id).into())
}

fn clear(ev: &mut Evaluator, _: &RuntimeValue, args: &[RuntimeValue]) -> Result<RuntimeValue, Error> {
    if let Some(id) = arg(args, 0).as_number() {
        if id.is_int() && id.value() >= 0.0 {
            ev.host.clear_timer(id.value() as u32);
        }
    }
    Ok(RuntimeValue::Undefined)
}

#[cfg(test)]
mod tests {
    use super::super::tests::{call_global, evaluator};
    use super::*;
    use crate::eval::error::EvalError;
    use rstest::rstest;

    #[rstest]
    fn test_log_is_captured(mut evaluator: Evaluator) {
        let list = evaluator.heap.alloc_array(vec![1.0.into(), "a".into()]);
        call_global(
            &mut evaluator,
            "console.log",
            RuntimeValue::Undefined,
            vec!["total:".into(), 3.0.into(), list.into()],
        )
        .unwrap();
        call_global(&mut evaluator, "console.error", RuntimeValue::Undefined, vec!["bad".into()]).unwrap();
        call_global(&mut evaluator, "console.info", RuntimeValue::Undefined, vec![]).unwrap();

        assert_eq!(
            evaluator.host.logs,
            vec!["total: 3 [ 1, 'a' ]".to_string(), "bad".to_string(), String::new()]
        );
    }

    #[rstest]
    fn test_timers_are_recorded(mut evaluator: Evaluator) {
        let abs = {
            let math = evaluator
                .env
                .resolve(evaluator.root, crate::Ident::new("Math"))
                .unwrap();
            evaluator
                .get_property(&math, &crate::eval::property::PropertyKey::from("abs"), None)
                .unwrap()
        };

        let first = call_global(
            &mut evaluator,
            "setTimeout",
            RuntimeValue::Undefined,
            vec![abs.clone(), 100.0.into()],
        )
        .unwrap();
        let second = call_global(&mut evaluator, "setInterval", RuntimeValue::Undefined, vec![abs]).unwrap();
        assert_eq!(evaluator.host.timers.len(), 2);
        assert!(evaluator.host.timers[1].repeat);
        assert_eq!(evaluator.host.timers[1].delay, 0.0);

        call_global(&mut evaluator, "clearTimeout", RuntimeValue::Undefined, vec![first]).unwrap();
        assert_eq!(evaluator.host.timers.len(), 1);
        call_global(&mut evaluator, "clearInterval", RuntimeValue::Undefined, vec![second]).unwrap();
        assert!(evaluator.host.timers.is_empty());
    }

    #[rstest]
    fn test_set_timeout_requires_function(mut evaluator: Evaluator) {
        assert!(matches!(
            call_global(&mut evaluator, "setTimeout", RuntimeValue::Undefined, vec!["code".into()]),
            Err(EvalError::TypeError(..))
        ));
    }

    #[rstest]
    fn test_clear_unknown_timer_is_noop(mut evaluator: Evaluator) {
        assert_eq!(
            call_global(&mut evaluator, "clearTimeout", RuntimeValue::Undefined, vec!["nope".into()]),
            Ok(RuntimeValue::Undefined)
        );
    }
}
