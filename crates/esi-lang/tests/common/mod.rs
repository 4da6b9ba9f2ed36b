//! Builders for ESTree nodes, so tests read close to the JavaScript they stand for.
#![allow(dead_code)]

use esi_lang::{Engine, EsiResult, Value};
use serde_json::{Value as Json, json};

pub fn engine() -> Engine {
    let mut engine = Engine::default();
    engine.set_capture_console(true);
    engine
}

pub fn program(body: Vec<Json>) -> Json {
    json!({"type": "Program", "body": body})
}

pub fn run(body: Vec<Json>) -> EsiResult {
    run_with(&engine(), body)
}

pub fn run_with(engine: &Engine, body: Vec<Json>) -> EsiResult {
    let program = esi_lang::parse_value(program(body))?;
    engine.eval(&program)
}

/// Runs `body` and returns `module.exports`, panicking on failure.
pub fn exports(body: Vec<Json>) -> Value {
    match run(body) {
        Ok(output) => output.exports,
        Err(e) => panic!("run failed: {e}"),
    }
}

// Expressions

pub fn ident(name: &str) -> Json {
    json!({"type": "Identifier", "name": name})
}

pub fn num(value: f64) -> Json {
    json!({"type": "Literal", "value": value})
}

pub fn string(value: &str) -> Json {
    json!({"type": "Literal", "value": value})
}

pub fn boolean(value: bool) -> Json {
    json!({"type": "Literal", "value": value})
}

pub fn null() -> Json {
    json!({"type": "Literal", "value": null})
}

pub fn this() -> Json {
    json!({"type": "ThisExpression"})
}

pub fn array(elements: Vec<Json>) -> Json {
    json!({"type": "ArrayExpression", "elements": elements})
}

pub fn object(properties: Vec<Json>) -> Json {
    json!({"type": "ObjectExpression", "properties": properties})
}

/// `name: value`
pub fn prop(name: &str, value: Json) -> Json {
    json!({"type": "Property", "key": ident(name), "value": value, "kind": "init", "computed": false})
}

/// `get name() { body }`
pub fn getter(name: &str, body: Vec<Json>) -> Json {
    json!({"type": "Property", "key": ident(name), "value": function(None, vec![], body), "kind": "get", "computed": false})
}

pub fn spread(argument: Json) -> Json {
    json!({"type": "SpreadElement", "argument": argument})
}

pub fn member(object: Json, name: &str) -> Json {
    json!({"type": "MemberExpression", "object": object, "property": ident(name), "computed": false})
}

pub fn index(object: Json, property: Json) -> Json {
    json!({"type": "MemberExpression", "object": object, "property": property, "computed": true})
}

/// `object?.name`, already wrapped in its `ChainExpression`.
pub fn optional_member(object: Json, name: &str) -> Json {
    json!({
        "type": "ChainExpression",
        "expression": {"type": "MemberExpression", "object": object, "property": ident(name), "computed": false, "optional": true}
    })
}

pub fn call(callee: Json, arguments: Vec<Json>) -> Json {
    json!({"type": "CallExpression", "callee": callee, "arguments": arguments})
}

pub fn new(callee: Json, arguments: Vec<Json>) -> Json {
    json!({"type": "NewExpression", "callee": callee, "arguments": arguments})
}

pub fn binary(operator: &str, left: Json, right: Json) -> Json {
    json!({"type": "BinaryExpression", "operator": operator, "left": left, "right": right})
}

pub fn logical(operator: &str, left: Json, right: Json) -> Json {
    json!({"type": "LogicalExpression", "operator": operator, "left": left, "right": right})
}

pub fn unary(operator: &str, argument: Json) -> Json {
    json!({"type": "UnaryExpression", "operator": operator, "prefix": true, "argument": argument})
}

pub fn update(operator: &str, prefix: bool, argument: Json) -> Json {
    json!({"type": "UpdateExpression", "operator": operator, "prefix": prefix, "argument": argument})
}

pub fn assign(operator: &str, left: Json, right: Json) -> Json {
    json!({"type": "AssignmentExpression", "operator": operator, "left": left, "right": right})
}

pub fn conditional(test: Json, consequent: Json, alternate: Json) -> Json {
    json!({"type": "ConditionalExpression", "test": test, "consequent": consequent, "alternate": alternate})
}

pub fn sequence(expressions: Vec<Json>) -> Json {
    json!({"type": "SequenceExpression", "expressions": expressions})
}

pub fn template(quasis: Vec<&str>, expressions: Vec<Json>) -> Json {
    let last = quasis.len().saturating_sub(1);
    let quasis = quasis
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            json!({"type": "TemplateElement", "value": {"raw": text, "cooked": text}, "tail": i == last})
        })
        .collect::<Vec<_>>();
    json!({"type": "TemplateLiteral", "quasis": quasis, "expressions": expressions})
}

pub fn function(name: Option<&str>, params: Vec<Json>, body: Vec<Json>) -> Json {
    json!({
        "type": "FunctionExpression",
        "id": name.map(ident),
        "params": params,
        "body": block(body)
    })
}

/// `(params) => expression`
pub fn arrow(params: Vec<Json>, expression: Json) -> Json {
    json!({"type": "ArrowFunctionExpression", "params": params, "body": expression, "expression": true})
}

// Patterns

pub fn array_pattern(elements: Vec<Option<Json>>) -> Json {
    json!({"type": "ArrayPattern", "elements": elements})
}

pub fn object_pattern(properties: Vec<Json>) -> Json {
    json!({"type": "ObjectPattern", "properties": properties})
}

/// `{ key: value }` inside an object pattern.
pub fn pattern_prop(key: &str, value: Json) -> Json {
    json!({"type": "Property", "key": ident(key), "value": value, "kind": "init", "computed": false})
}

pub fn with_default(left: Json, right: Json) -> Json {
    json!({"type": "AssignmentPattern", "left": left, "right": right})
}

pub fn rest(argument: Json) -> Json {
    json!({"type": "RestElement", "argument": argument})
}

// Statements

pub fn expr(expression: Json) -> Json {
    json!({"type": "ExpressionStatement", "expression": expression})
}

pub fn declare(kind: &str, id: Json, init: Option<Json>) -> Json {
    json!({
        "type": "VariableDeclaration",
        "kind": kind,
        "declarations": [{"type": "VariableDeclarator", "id": id, "init": init}]
    })
}

pub fn let_(name: &str, init: Json) -> Json {
    declare("let", ident(name), Some(init))
}

pub fn const_(name: &str, init: Json) -> Json {
    declare("const", ident(name), Some(init))
}

pub fn var(name: &str, init: Json) -> Json {
    declare("var", ident(name), Some(init))
}

pub fn block(body: Vec<Json>) -> Json {
    json!({"type": "BlockStatement", "body": body})
}

pub fn function_decl(name: &str, params: Vec<Json>, body: Vec<Json>) -> Json {
    json!({
        "type": "FunctionDeclaration",
        "id": ident(name),
        "params": params,
        "body": block(body)
    })
}

pub fn ret(argument: Option<Json>) -> Json {
    json!({"type": "ReturnStatement", "argument": argument})
}

pub fn throw(argument: Json) -> Json {
    json!({"type": "ThrowStatement", "argument": argument})
}

pub fn brk(label: Option<&str>) -> Json {
    json!({"type": "BreakStatement", "label": label.map(ident)})
}

pub fn cont(label: Option<&str>) -> Json {
    json!({"type": "ContinueStatement", "label": label.map(ident)})
}

pub fn labeled(label: &str, body: Json) -> Json {
    json!({"type": "LabeledStatement", "label": ident(label), "body": body})
}

pub fn if_(test: Json, consequent: Json, alternate: Option<Json>) -> Json {
    json!({"type": "IfStatement", "test": test, "consequent": consequent, "alternate": alternate})
}

pub fn while_(test: Json, body: Json) -> Json {
    json!({"type": "WhileStatement", "test": test, "body": body})
}

pub fn do_while(body: Json, test: Json) -> Json {
    json!({"type": "DoWhileStatement", "test": test, "body": body})
}

pub fn for_(init: Option<Json>, test: Option<Json>, update: Option<Json>, body: Json) -> Json {
    json!({"type": "ForStatement", "init": init, "test": test, "update": update, "body": body})
}

/// `for (kind name of right) body`
pub fn for_of(kind: &str, name: &str, right: Json, body: Json) -> Json {
    json!({"type": "ForOfStatement", "left": declare(kind, ident(name), None), "right": right, "body": body, "await": false})
}

/// `for (kind name in right) body`
pub fn for_in(kind: &str, name: &str, right: Json, body: Json) -> Json {
    json!({"type": "ForInStatement", "left": declare(kind, ident(name), None), "right": right, "body": body})
}

pub fn switch(discriminant: Json, cases: Vec<(Option<Json>, Vec<Json>)>) -> Json {
    let cases = cases
        .into_iter()
        .map(|(test, consequent)| json!({"type": "SwitchCase", "test": test, "consequent": consequent}))
        .collect::<Vec<_>>();
    json!({"type": "SwitchStatement", "discriminant": discriminant, "cases": cases})
}

pub fn try_(block_body: Vec<Json>, handler: Option<(&str, Vec<Json>)>, finalizer: Option<Vec<Json>>) -> Json {
    json!({
        "type": "TryStatement",
        "block": block(block_body),
        "handler": handler.map(|(param, body)| json!({"type": "CatchClause", "param": ident(param), "body": block(body)})),
        "finalizer": finalizer.map(block)
    })
}

/// `exports.name = value;`
pub fn export(name: &str, value: Json) -> Json {
    expr(assign("=", member(ident("exports"), name), value))
}

/// `module.exports = value;`
pub fn export_all(value: Json) -> Json {
    expr(assign("=", member(ident("module"), "exports"), value))
}
