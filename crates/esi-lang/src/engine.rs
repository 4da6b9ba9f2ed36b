use smol_str::SmolStr;
use tracing::debug;

use crate::{
    EsiResult, HostFunction, Program, Value,
    ast,
    error::{self, InnerError},
    eval::{self, Evaluator, builtin::HostState},
};

#[derive(Debug, Clone)]
pub struct Options {
    /// Collect console output into [`Output::logs`] instead of writing to stdout/stderr.
    pub capture_console: bool,
    /// Seed of the `Math.random` generator; every run starts from it.
    pub random_seed: u64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            capture_console: false,
            random_seed: 0x853C_49E6_748F_EA9B,
        }
    }
}

/// What a run leaves behind.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Output {
    /// The final value of `module.exports`.
    pub exports: Value,
    /// Console lines, when capture is enabled.
    pub logs: Vec<String>,
    /// Timers scheduled and not cleared; they are never run.
    pub pending_timers: usize,
}

/// Runs ESTree programs. Each call to [`Engine::eval`] gets a fresh heap and global scope.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    pub(crate) options: Options,
    pub(crate) eval_options: eval::Options,
    globals: Vec<(SmolStr, Value)>,
}

impl Engine {
    pub fn set_max_call_stack_depth(&mut self, depth: u32) {
        self.eval_options.max_call_stack_depth = depth;
    }

    pub fn set_capture_console(&mut self, capture_console: bool) {
        self.options.capture_console = capture_console;
    }

    pub fn set_random_seed(&mut self, seed: u64) {
        self.options.random_seed = seed;
    }

    /// Binds `name` on the global scope of every run, replacing a builtin of the same name.
    pub fn define_global(&mut self, name: &str, value: impl Into<Value>) {
        self.globals.retain(|(existing, _)| existing != name);
        self.globals.push((SmolStr::new(name), value.into()));
    }

    /// Binds a host function on the global scope of every run.
    pub fn define_function(
        &mut self,
        name: &str,
        func: impl Fn(&[Value]) -> Result<Value, String> + 'static,
    ) {
        self.define_global(name, HostFunction::new(name, func));
    }

    pub fn defined_globals(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.globals
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    #[allow(clippy::result_large_err)]
    pub fn eval(&self, program: &Program) -> EsiResult {
        self.eval_with_source(program, "")
    }

    /// Like [`Engine::eval`]; `source` is the text the program was parsed from, used for error spans.
    #[allow(clippy::result_large_err)]
    pub fn eval_with_source(&self, program: &Program, source: &str) -> EsiResult {
        let host = HostState::new(self.options.capture_console, self.options.random_seed);
        let mut evaluator = Evaluator::new(self.eval_options.clone(), host);
        for (name, value) in &self.globals {
            let value = evaluator.import_value(value.clone());
            evaluator.define_global(name, value);
        }
        debug!(globals = self.globals.len(), "evaluator ready");

        let exports = evaluator
            .run(program)
            .and_then(|exports| evaluator.export_value(&exports))
            .map_err(|e| error::Error::from_error(source, InnerError::Eval(e)))?;

        Ok(Output {
            exports,
            logs: std::mem::take(&mut evaluator.host.logs),
            pending_timers: evaluator.host.timers.len(),
        })
    }

    /// Decodes ESTree JSON and runs it.
    #[allow(clippy::result_large_err)]
    pub fn eval_json(&self, json: &str) -> EsiResult {
        let program = ast::from_json(json)
            .map_err(|e| error::Error::from_error(json, InnerError::Ast(e)))?;
        self.eval(&program)
    }

    pub const fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn program(body: serde_json::Value) -> Program {
        ast::from_value(json!({"type": "Program", "body": body})).unwrap()
    }

    fn ident(name: &str) -> serde_json::Value {
        json!({"type": "Identifier", "name": name})
    }

    /// `module.exports = <expression>;`
    fn export(expression: serde_json::Value) -> serde_json::Value {
        json!({
            "type": "ExpressionStatement",
            "expression": {
                "type": "AssignmentExpression",
                "operator": "=",
                "left": {
                    "type": "MemberExpression",
                    "object": ident("module"),
                    "property": ident("exports"),
                    "computed": false
                },
                "right": expression
            }
        })
    }

    fn call(callee: serde_json::Value, args: Vec<serde_json::Value>) -> serde_json::Value {
        json!({"type": "CallExpression", "callee": callee, "arguments": args})
    }

    #[test]
    fn test_engine_default() {
        let engine = Engine::default();
        assert!(!engine.options.capture_console);
        assert!(engine.defined_globals().next().is_none());
    }

    #[test]
    fn test_setters() {
        let mut engine = Engine::default();
        engine.set_max_call_stack_depth(7);
        engine.set_capture_console(true);
        engine.set_random_seed(3);
        assert_eq!(engine.eval_options.max_call_stack_depth, 7);
        assert!(engine.options.capture_console);
        assert_eq!(engine.options.random_seed, 3);
    }

    #[test]
    fn test_define_global_replaces() {
        let mut engine = Engine::default();
        engine.define_global("answer", 1.0);
        engine.define_global("answer", 42.0);
        let globals = engine.defined_globals().collect::<Vec<_>>();
        assert_eq!(globals, vec![("answer", &Value::from(42.0))]);

        let output = engine.eval(&program(json!([export(ident("answer"))]))).unwrap();
        assert_eq!(output.exports, Value::from(42.0));
    }

    #[test]
    fn test_define_function() {
        let mut engine = Engine::default();
        engine.define_function("greet", |args| match args {
            [Value::String(name)] => Ok(Value::from(format!("hello {}", name))),
            _ => Err("greet expects a name".to_string()),
        });

        let output = engine
            .eval(&program(json!([export(call(
                ident("greet"),
                vec![json!({"type": "Literal", "value": "esi"})]
            ))])))
            .unwrap();
        assert_eq!(output.exports, Value::from("hello esi"));
    }

    #[test]
    fn test_injected_global_overrides_builtin() {
        let mut engine = Engine::default();
        engine.define_global("Math", "shadowed");
        let output = engine.eval(&program(json!([export(ident("Math"))]))).unwrap();
        assert_eq!(output.exports, Value::from("shadowed"));
    }

    #[test]
    fn test_capture_console_and_timers() {
        let mut engine = Engine::default();
        engine.set_capture_console(true);
        let console_log = json!({
            "type": "MemberExpression",
            "object": ident("console"),
            "property": ident("log"),
            "computed": false
        });
        let arrow = json!({
            "type": "ArrowFunctionExpression",
            "params": [],
            "body": {"type": "BlockStatement", "body": []},
            "expression": false
        });
        let output = engine
            .eval(&program(json!([
                {"type": "ExpressionStatement", "expression": call(console_log, vec![json!({"type": "Literal", "value": "hi"}), json!({"type": "Literal", "value": 2})])},
                {"type": "ExpressionStatement", "expression": call(ident("setTimeout"), vec![arrow])}
            ])))
            .unwrap();

        assert_eq!(output.logs, vec!["hi 2".to_string()]);
        assert_eq!(output.pending_timers, 1);
        assert_eq!(output.exports, Value::Object(Default::default()));
    }

    #[test]
    fn test_runs_are_isolated() {
        let engine = Engine::default();
        let assign = program(json!([
            {
                "type": "VariableDeclaration",
                "kind": "var",
                "declarations": [{"type": "VariableDeclarator", "id": ident("leak"), "init": {"type": "Literal", "value": 1}}]
            }
        ]));
        assert!(engine.eval(&assign).is_ok());

        let read = program(json!([export(ident("leak"))]));
        let error = engine.eval(&read).unwrap_err();
        assert_eq!(error.to_string(), "leak is not defined");
    }

    #[rstest]
    #[case::seed_one(1)]
    #[case::seed_large(u64::MAX)]
    fn test_random_seed_is_deterministic(#[case] seed: u64) {
        let mut engine = Engine::default();
        engine.set_random_seed(seed);
        let random = call(
            json!({
                "type": "MemberExpression",
                "object": ident("Math"),
                "property": ident("random"),
                "computed": false
            }),
            vec![],
        );
        let program = program(json!([export(random)]));
        let first = engine.eval(&program).unwrap().exports;
        let second = engine.eval(&program).unwrap().exports;
        assert_eq!(first, second);
    }

    #[test]
    fn test_eval_json_reports_decode_errors() {
        let engine = Engine::default();
        let error = engine.eval_json(r#"{"type":"Program","body":[{"type":"Bogus"}]}"#).unwrap_err();
        assert!(matches!(error.cause, InnerError::Ast(_)));
    }

    #[test]
    fn test_version() {
        assert!(!Engine::version().is_empty());
    }
}
