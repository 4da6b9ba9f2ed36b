use smol_str::SmolStr;

use super::Evaluator;
use super::env::ScopeId;
use super::error::EvalError;
use super::heap::{Object, Property};
use super::property::PropertyKey;
use super::runtime_value::RuntimeValue;
use crate::Ident;
use crate::ast::node::{self as ast, DeclarationKind, Expression, ObjectPatternMember, Pattern};
use crate::range::Range;

/// A place that can be read and written.
#[derive(Debug, Clone)]
pub enum Reference {
    Binding {
        scope: ScopeId,
        name: Ident,
        loc: Option<Range>,
    },
    Property {
        base: RuntimeValue,
        key: PropertyKey,
        loc: Option<Range>,
    },
}

/// How a pattern installs the values it destructures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingMode {
    Declare(DeclarationKind),
    Assign,
}

impl Evaluator {
    /// Resolves an assignment or update target.
    pub(crate) fn reference(
        &mut self,
        target: &Expression,
        scope: ScopeId,
    ) -> Result<Reference, EvalError> {
        match target {
            Expression::Identifier(id) => Ok(Reference::Binding {
                scope,
                name: id.name,
                loc: id.loc,
            }),
            Expression::MemberExpression(member) => self.member_reference(member, scope),
            other => Err(EvalError::SyntaxError(
                other.loc(),
                "Invalid left-hand side in assignment".to_string(),
            )),
        }
    }

    pub(crate) fn pattern_reference(
        &mut self,
        target: &Pattern,
        scope: ScopeId,
    ) -> Result<Reference, EvalError> {
        match target {
            Pattern::Identifier(id) => Ok(Reference::Binding {
                scope,
                name: id.name,
                loc: id.loc,
            }),
            Pattern::MemberExpression(member) => self.member_reference(member, scope),
            other => Err(EvalError::SyntaxError(
                other.loc(),
                "Invalid left-hand side in assignment".to_string(),
            )),
        }
    }

    fn member_reference(
        &mut self,
        member: &ast::MemberExpression,
        scope: ScopeId,
    ) -> Result<Reference, EvalError> {
        let base = self.eval_expr(&member.object, scope)?;
        let key = self.member_key(member, scope)?;
        Ok(Reference::Property {
            base,
            key,
            loc: member.loc,
        })
    }

    pub(crate) fn get_reference(&mut self, reference: &Reference) -> Result<RuntimeValue, EvalError> {
        match reference {
            Reference::Binding { scope, name, loc } => self
                .env
                .resolve(*scope, *name)
                .map_err(|e| e.to_eval_error(*loc)),
            Reference::Property { base, key, loc } => self.get_property(base, key, *loc),
        }
    }

    pub(crate) fn put_reference(
        &mut self,
        reference: &Reference,
        value: RuntimeValue,
    ) -> Result<(), EvalError> {
        match reference {
            Reference::Binding { scope, name, loc } => self
                .env
                .assign(*scope, *name, value)
                .map_err(|e| e.to_eval_error(*loc)),
            Reference::Property { base, key, loc } => self.set_property(base, key, value, *loc),
        }
    }

    /// Destructures `value` into `pattern`, declaring or assigning every name it binds.
    pub(crate) fn bind_pattern(
        &mut self,
        pattern: &Pattern,
        value: RuntimeValue,
        scope: ScopeId,
        mode: BindingMode,
    ) -> Result<(), EvalError> {
        match pattern {
            Pattern::Identifier(id) => match mode {
                BindingMode::Declare(kind) => self
                    .env
                    .define(scope, kind, id.name, Some(value))
                    .map_err(|e| e.to_eval_error(id.loc)),
                BindingMode::Assign => self
                    .env
                    .assign(scope, id.name, value)
                    .map_err(|e| e.to_eval_error(id.loc)),
            },
            Pattern::MemberExpression(member) => {
                let reference = self.member_reference(member, scope)?;
                self.put_reference(&reference, value)
            }
            Pattern::AssignmentPattern(p) => {
                let value = if value.is_undefined() {
                    self.eval_initializer(&p.right, &p.left, scope)?
                } else {
                    value
                };
                self.bind_pattern(&p.left, value, scope, mode)
            }
            Pattern::ArrayPattern(p) => {
                let items = self.iterate(&value, p.loc)?;
                for (i, element) in p.elements.iter().enumerate() {
                    match element {
                        None => {}
                        Some(Pattern::RestElement(rest)) => {
                            let rest_items = items.get(i..).map(<[_]>::to_vec).unwrap_or_default();
                            let array = self.heap.alloc_array(rest_items);
                            return self.bind_pattern(&rest.argument, array.into(), scope, mode);
                        }
                        Some(element) => {
                            let item = items.get(i).cloned().unwrap_or_default();
                            self.bind_pattern(element, item, scope, mode)?;
                        }
                    }
                }
                Ok(())
            }
            Pattern::ObjectPattern(p) => {
                if value.is_nullish() {
                    return Err(EvalError::TypeError(
                        p.loc,
                        format!("Cannot destructure '{0}' as it is {0}.", self.inspect(&value)),
                    ));
                }

                let mut used: Vec<SmolStr> = Vec::with_capacity(p.properties.len());
                for member in &p.properties {
                    match member {
                        ObjectPatternMember::Property(prop) => {
                            let key = self.property_name(&prop.key, prop.computed, scope)?;
                            let item =
                                self.get_property(&value, &PropertyKey::from(key.as_str()), prop.loc)?;
                            used.push(key);
                            self.bind_pattern(&prop.value, item, scope, mode)?;
                        }
                        ObjectPatternMember::RestElement(rest) => {
                            let mut object = Object::default();
                            for key in self.own_keys(&value) {
                                if used.contains(&key) {
                                    continue;
                                }
                                let item =
                                    self.get_property(&value, &PropertyKey::from(key.as_str()), rest.loc)?;
                                object.properties.insert(key, Property::Data(item));
                            }
                            let rest_value = self.heap.alloc_object(object);
                            self.bind_pattern(&rest.argument, rest_value.into(), scope, mode)?;
                        }
                    }
                }
                Ok(())
            }
            Pattern::RestElement(rest) => self.bind_pattern(&rest.argument, value, scope, mode),
        }
    }

    /// Binds call arguments to a parameter list as function-scoped variables.
    pub(crate) fn bind_parameters(
        &mut self,
        params: &[Pattern],
        args: &[RuntimeValue],
        scope: ScopeId,
    ) -> Result<(), EvalError> {
        let mode = BindingMode::Declare(DeclarationKind::Var);
        for (i, param) in params.iter().enumerate() {
            match param {
                Pattern::RestElement(rest) => {
                    let rest_items = args.get(i..).map(<[_]>::to_vec).unwrap_or_default();
                    let array = self.heap.alloc_array(rest_items);
                    self.bind_pattern(&rest.argument, array.into(), scope, mode)?;
                    break;
                }
                param => {
                    let arg = args.get(i).cloned().unwrap_or_default();
                    self.bind_pattern(param, arg, scope, mode)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::Options;
    use crate::eval::builtin::HostState;
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn evaluator() -> Evaluator {
        Evaluator::new(Options::default(), HostState::new(true, 1))
    }

    fn pattern(value: serde_json::Value) -> Pattern {
        serde_json::from_value(value).unwrap()
    }

    fn lookup(evaluator: &Evaluator, name: &str) -> Option<RuntimeValue> {
        evaluator
            .env
            .lookup(evaluator.root, Ident::new(name))
            .cloned()
    }

    #[rstest]
    fn test_array_pattern_with_hole_default_and_rest(mut evaluator: Evaluator) {
        let values = (1..=4).map(|n| RuntimeValue::from(n as f64)).collect();
        let array = evaluator.heap.alloc_array(values);
        let pattern = pattern(json!({
            "type": "ArrayPattern",
            "elements": [
                {"type": "Identifier", "name": "first"},
                null,
                {"type": "AssignmentPattern", "left": {"type": "Identifier", "name": "third"}, "right": {"type": "Literal", "value": 9}},
                {"type": "RestElement", "argument": {"type": "Identifier", "name": "others"}}
            ]
        }));
        let root = evaluator.root;

        evaluator
            .bind_pattern(&pattern, array.into(), root, BindingMode::Declare(DeclarationKind::Let))
            .unwrap();

        assert_eq!(lookup(&evaluator, "first"), Some(RuntimeValue::from(1.0)));
        assert_eq!(lookup(&evaluator, "third"), Some(RuntimeValue::from(3.0)));
        let Some(RuntimeValue::Array(others)) = lookup(&evaluator, "others") else {
            panic!("rest element is not an array");
        };
        assert_eq!(evaluator.heap.array(others), &vec![RuntimeValue::from(4.0)]);
    }

    #[rstest]
    fn test_object_pattern_with_default_and_rest(mut evaluator: Evaluator) {
        let mut object = Object::default();
        object.properties.insert("a".into(), Property::Data(RuntimeValue::from(1.0)));
        object.properties.insert("b".into(), Property::Data(RuntimeValue::from(2.0)));
        let object = evaluator.heap.alloc_object(object);
        let pattern = pattern(json!({
            "type": "ObjectPattern",
            "properties": [
                {"type": "Property", "key": {"type": "Identifier", "name": "a"}, "value": {"type": "Identifier", "name": "x"}},
                {"type": "Property", "key": {"type": "Identifier", "name": "z"}, "value": {
                    "type": "AssignmentPattern", "left": {"type": "Identifier", "name": "z"}, "right": {"type": "Literal", "value": "dflt"}
                }},
                {"type": "RestElement", "argument": {"type": "Identifier", "name": "rest"}}
            ]
        }));
        let root = evaluator.root;

        evaluator
            .bind_pattern(&pattern, object.into(), root, BindingMode::Declare(DeclarationKind::Const))
            .unwrap();

        assert_eq!(lookup(&evaluator, "x"), Some(RuntimeValue::from(1.0)));
        assert_eq!(lookup(&evaluator, "z"), Some(RuntimeValue::from("dflt")));
        let Some(rest) = lookup(&evaluator, "rest") else {
            panic!("rest is not bound");
        };
        assert_eq!(evaluator.own_keys(&rest), vec![SmolStr::new("b")]);
    }

    #[rstest]
    fn test_object_pattern_rejects_nullish(mut evaluator: Evaluator) {
        let pattern = pattern(json!({"type": "ObjectPattern", "properties": []}));
        let root = evaluator.root;

        assert!(matches!(
            evaluator.bind_pattern(&pattern, RuntimeValue::Null, root, BindingMode::Assign),
            Err(EvalError::TypeError(..))
        ));
    }

    #[rstest]
    fn test_assign_to_undeclared_fails(mut evaluator: Evaluator) {
        let pattern = pattern(json!({"type": "Identifier", "name": "nowhere"}));
        let root = evaluator.root;

        assert!(matches!(
            evaluator.bind_pattern(&pattern, RuntimeValue::Null, root, BindingMode::Assign),
            Err(EvalError::AssignToUndeclared(_, name)) if name == "nowhere"
        ));
    }

    #[rstest]
    fn test_bind_parameters_fills_missing_with_undefined(mut evaluator: Evaluator) {
        let params = vec![
            pattern(json!({"type": "Identifier", "name": "p"})),
            pattern(json!({"type": "Identifier", "name": "q"})),
        ];
        let root = evaluator.root;

        evaluator
            .bind_parameters(&params, &[RuntimeValue::TRUE], root)
            .unwrap();

        assert_eq!(lookup(&evaluator, "p"), Some(RuntimeValue::TRUE));
        assert_eq!(lookup(&evaluator, "q"), Some(RuntimeValue::Undefined));
    }
}
