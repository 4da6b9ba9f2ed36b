use smol_str::SmolStr;

use super::Evaluator;
use super::env::ScopeId;
use super::error::EvalError;
use super::heap::Property;
use super::property::PropertyKey;
use super::reference::BindingMode;
use super::runtime_value::RuntimeValue;
use crate::ast::node::{
    self as ast, AssignmentOperator, Expression, LiteralValue, LogicalOperator, ObjectMember,
    Pattern, PropertyKind, UnaryOperator, UpdateOperator,
};
use crate::number::Number;

impl Evaluator {
    pub(crate) fn eval_expr(
        &mut self,
        expr: &Expression,
        scope: ScopeId,
    ) -> Result<RuntimeValue, EvalError> {
        match expr {
            Expression::Identifier(id) => self
                .env
                .resolve(scope, id.name)
                .map_err(|e| e.to_eval_error(id.loc)),
            Expression::Literal(literal) => self.eval_literal(literal),
            Expression::TemplateLiteral(template) => self.eval_template(template, scope),
            Expression::ThisExpression(_) => Ok(self.this_value(scope)),
            Expression::ArrayExpression(array) => self.eval_array(array, scope),
            Expression::ObjectExpression(object) => self.eval_object(object, scope),
            Expression::FunctionExpression(function) => {
                self.create_function_expression(function, scope, None)
            }
            Expression::ArrowFunctionExpression(function) => {
                self.create_closure(function, scope, true, None)
            }
            Expression::UnaryExpression(unary) => self.eval_unary(unary, scope),
            Expression::UpdateExpression(update) => self.eval_update(update, scope),
            Expression::BinaryExpression(binary) => {
                let left = self.eval_expr(&binary.left, scope)?;
                let right = self.eval_expr(&binary.right, scope)?;
                self.binary_op(binary.operator, &left, &right, binary.loc)
                    .map_err(|e| e.or_location(binary.loc))
            }
            Expression::LogicalExpression(logical) => self.eval_logical(logical, scope),
            Expression::AssignmentExpression(assignment) => self.eval_assignment(assignment, scope),
            Expression::MemberExpression(_) | Expression::CallExpression(_) => {
                self.eval_chain(expr, scope).map(Option::unwrap_or_default)
            }
            Expression::ChainExpression(chain) => self
                .eval_chain(&chain.expression, scope)
                .map(Option::unwrap_or_default),
            Expression::ConditionalExpression(conditional) => {
                if self.eval_expr(&conditional.test, scope)?.is_truthy() {
                    self.eval_expr(&conditional.consequent, scope)
                } else {
                    self.eval_expr(&conditional.alternate, scope)
                }
            }
            Expression::NewExpression(call) => {
                let callee = self.eval_expr(&call.callee, scope)?;
                let args = self.eval_arguments(&call.arguments, scope)?;
                self.construct(&callee, args, call.loc).map_err(|e| match e {
                    EvalError::TypeError(loc, _) if !callee.is_function() => EvalError::TypeError(
                        loc,
                        format!("{} is not a constructor", describe(&call.callee)),
                    ),
                    e => e,
                })
            }
            Expression::SequenceExpression(sequence) => {
                let mut last = RuntimeValue::Undefined;
                for expr in &sequence.expressions {
                    last = self.eval_expr(expr, scope)?;
                }
                Ok(last)
            }
            Expression::SpreadElement(spread) => Err(EvalError::SyntaxError(
                spread.loc,
                "Unexpected spread element".to_string(),
            )),
            Expression::ClassExpression(e) => Err(EvalError::Unimplemented(e.loc, "ClassExpression")),
            Expression::YieldExpression(e) => Err(EvalError::Unimplemented(e.loc, "YieldExpression")),
            Expression::AwaitExpression(e) => Err(EvalError::Unimplemented(e.loc, "AwaitExpression")),
            Expression::TaggedTemplateExpression(e) => {
                Err(EvalError::Unimplemented(e.loc, "TaggedTemplateExpression"))
            }
            Expression::MetaProperty(e) => Err(EvalError::Unimplemented(e.loc, "MetaProperty")),
            Expression::Super(e) => Err(EvalError::Unimplemented(e.loc, "Super")),
            Expression::ImportExpression(e) => Err(EvalError::Unimplemented(e.loc, "ImportExpression")),
            Expression::PrivateIdentifier(e) => {
                Err(EvalError::Unimplemented(e.loc, "PrivateIdentifier"))
            }
        }
    }

    /// Evaluates an initializer, naming anonymous functions after the binding they are assigned to.
    pub(crate) fn eval_initializer(
        &mut self,
        init: &Expression,
        target: &Pattern,
        scope: ScopeId,
    ) -> Result<RuntimeValue, EvalError> {
        match target {
            Pattern::Identifier(id) => self.eval_named(init, || SmolStr::new(id.name.as_str()), scope),
            _ => self.eval_expr(init, scope),
        }
    }

    fn eval_named(
        &mut self,
        expr: &Expression,
        name: impl FnOnce() -> SmolStr,
        scope: ScopeId,
    ) -> Result<RuntimeValue, EvalError> {
        match expr {
            Expression::FunctionExpression(function) if function.id.is_none() => {
                self.create_closure(function, scope, false, Some(name()))
            }
            Expression::ArrowFunctionExpression(function) => {
                self.create_closure(function, scope, true, Some(name()))
            }
            expr => self.eval_expr(expr, scope),
        }
    }

    fn eval_literal(&mut self, literal: &ast::Literal) -> Result<RuntimeValue, EvalError> {
        if literal.regex.is_some() {
            return Err(EvalError::Unimplemented(literal.loc, "RegExpLiteral"));
        }
        if literal.bigint.is_some() {
            return Err(EvalError::Unimplemented(literal.loc, "BigIntLiteral"));
        }

        match &literal.value {
            None => Ok(RuntimeValue::Null),
            Some(LiteralValue::Bool(b)) => Ok(RuntimeValue::Bool(*b)),
            Some(LiteralValue::Number(n)) => Ok(RuntimeValue::Number(Number::new(*n))),
            Some(LiteralValue::String(s)) => Ok(RuntimeValue::String(s.clone())),
            Some(LiteralValue::Other(_)) => Err(EvalError::Unimplemented(literal.loc, "Literal")),
        }
    }

    fn eval_template(
        &mut self,
        template: &ast::TemplateLiteral,
        scope: ScopeId,
    ) -> Result<RuntimeValue, EvalError> {
        let mut result = String::new();
        for (i, quasi) in template.quasis.iter().enumerate() {
            result.push_str(quasi.value.cooked.as_deref().unwrap_or(&quasi.value.raw));
            if let Some(expr) = template.expressions.get(i) {
                let value = self.eval_expr(expr, scope)?;
                result.push_str(&self.to_string(&value)?);
            }
        }
        Ok(RuntimeValue::String(result.into()))
    }

    fn eval_array(
        &mut self,
        array: &ast::ArrayExpression,
        scope: ScopeId,
    ) -> Result<RuntimeValue, EvalError> {
        let mut items = Vec::with_capacity(array.elements.len());
        for element in &array.elements {
            match element {
                None => items.push(RuntimeValue::Undefined),
                Some(Expression::SpreadElement(spread)) => {
                    let value = self.eval_expr(&spread.argument, scope)?;
                    items.extend(self.iterate(&value, spread.loc)?);
                }
                Some(expr) => items.push(self.eval_expr(expr, scope)?),
            }
        }
        Ok(RuntimeValue::Array(self.heap.alloc_array(items)))
    }

    fn eval_object(
        &mut self,
        object: &ast::ObjectExpression,
        scope: ScopeId,
    ) -> Result<RuntimeValue, EvalError> {
        let id = self.heap.new_object();
        for member in &object.properties {
            match member {
                ObjectMember::SpreadElement(spread) => {
                    let source = self.eval_expr(&spread.argument, scope)?;
                    self.copy_own_properties(&source, id, spread.loc)?;
                }
                ObjectMember::Property(prop) => {
                    let key = self.property_name(&prop.key, prop.computed, scope)?;
                    match prop.kind {
                        PropertyKind::Init => {
                            let value = self.eval_named(&prop.value, || key.clone(), scope)?;
                            self.heap
                                .object_mut(id)
                                .properties
                                .insert(key, Property::Data(value));
                        }
                        PropertyKind::Get | PropertyKind::Set => {
                            let RuntimeValue::Function(accessor) = self.eval_expr(&prop.value, scope)? else {
                                return Err(EvalError::TypeError(
                                    prop.loc,
                                    "Accessor must be a function".to_string(),
                                ));
                            };
                            let properties = &mut self.heap.object_mut(id).properties;
                            let (mut get, mut set) = match properties.get(&key) {
                                Some(Property::Accessor { get, set }) => (*get, *set),
                                _ => (None, None),
                            };
                            if prop.kind == PropertyKind::Get {
                                get = Some(accessor);
                            } else {
                                set = Some(accessor);
                            }
                            properties.insert(key, Property::Accessor { get, set });
                        }
                    }
                }
            }
        }
        Ok(RuntimeValue::Object(id))
    }

    /// The name of an object literal or pattern key.
    pub(crate) fn property_name(
        &mut self,
        key: &Expression,
        computed: bool,
        scope: ScopeId,
    ) -> Result<SmolStr, EvalError> {
        match key {
            Expression::Identifier(id) if !computed => Ok(SmolStr::new(id.name.as_str())),
            Expression::Literal(literal) if !computed => {
                let value = self.eval_literal(literal)?;
                self.to_string(&value)
            }
            key => {
                let value = self.eval_expr(key, scope)?;
                self.to_property_key(&value).map(|key| key.to_name())
            }
        }
    }

    pub(crate) fn member_key(
        &mut self,
        member: &ast::MemberExpression,
        scope: ScopeId,
    ) -> Result<PropertyKey, EvalError> {
        match &*member.property {
            Expression::Identifier(id) if !member.computed => {
                Ok(PropertyKey::from(SmolStr::new(id.name.as_str())))
            }
            property => {
                let value = self.eval_expr(property, scope)?;
                self.to_property_key(&value)
            }
        }
    }

    /// Evaluates a member access or call that may sit inside an optional chain.
    ///
    /// Returns `None` once a `?.` link met `null` or `undefined`; the whole chain then
    /// evaluates to `undefined`.
    fn eval_chain(
        &mut self,
        expr: &Expression,
        scope: ScopeId,
    ) -> Result<Option<RuntimeValue>, EvalError> {
        match expr {
            Expression::MemberExpression(member) => {
                let Some(object) = self.eval_chain(&member.object, scope)? else {
                    return Ok(None);
                };
                if member.optional && object.is_nullish() {
                    return Ok(None);
                }
                let key = self.member_key(member, scope)?;
                self.get_property(&object, &key, member.loc).map(Some)
            }
            Expression::CallExpression(call) => {
                let Some((callee, this)) = self.eval_callee(&call.callee, scope)? else {
                    return Ok(None);
                };
                if call.optional && callee.is_nullish() {
                    return Ok(None);
                }
                let args = self.eval_arguments(&call.arguments, scope)?;
                match callee {
                    RuntimeValue::Function(id) => self.call_function(id, this, args, call.loc).map(Some),
                    _ => Err(EvalError::TypeError(
                        call.loc,
                        format!("{} is not a function", describe(&call.callee)),
                    )),
                }
            }
            expr => self.eval_expr(expr, scope).map(Some),
        }
    }

    /// Resolves a callee together with the receiver the call binds as `this`.
    fn eval_callee(
        &mut self,
        callee: &Expression,
        scope: ScopeId,
    ) -> Result<Option<(RuntimeValue, RuntimeValue)>, EvalError> {
        match callee {
            Expression::MemberExpression(member) => {
                let Some(object) = self.eval_chain(&member.object, scope)? else {
                    return Ok(None);
                };
                if member.optional && object.is_nullish() {
                    return Ok(None);
                }
                let key = self.member_key(member, scope)?;
                let function = self.get_property(&object, &key, member.loc)?;
                Ok(Some((function, object)))
            }
            // A bare call passes on the caller's own `this`.
            Expression::Identifier(_) => {
                let function = self.eval_expr(callee, scope)?;
                Ok(Some((function, self.this_value(scope))))
            }
            callee => Ok(self
                .eval_chain(callee, scope)?
                .map(|function| (function, RuntimeValue::Null))),
        }
    }

    pub(crate) fn eval_arguments(
        &mut self,
        arguments: &[Expression],
        scope: ScopeId,
    ) -> Result<Vec<RuntimeValue>, EvalError> {
        let mut args = Vec::with_capacity(arguments.len());
        for argument in arguments {
            match argument {
                Expression::SpreadElement(spread) => {
                    let value = self.eval_expr(&spread.argument, scope)?;
                    args.extend(self.iterate(&value, spread.loc)?);
                }
                argument => args.push(self.eval_expr(argument, scope)?),
            }
        }
        Ok(args)
    }

    fn eval_unary(
        &mut self,
        unary: &ast::UnaryExpression,
        scope: ScopeId,
    ) -> Result<RuntimeValue, EvalError> {
        match unary.operator {
            UnaryOperator::TypeOf => match &*unary.argument {
                Expression::Identifier(id) => Ok(self
                    .env
                    .lookup(scope, id.name)
                    .map(RuntimeValue::type_of)
                    .unwrap_or("undefined")
                    .into()),
                argument => Ok(self.eval_expr(argument, scope)?.type_of().into()),
            },
            UnaryOperator::Delete => match &*unary.argument {
                Expression::MemberExpression(member) => {
                    let object = self.eval_expr(&member.object, scope)?;
                    let key = self.member_key(member, scope)?;
                    self.delete_property(&object, &key, member.loc).map(RuntimeValue::from)
                }
                Expression::ChainExpression(chain) => match &*chain.expression {
                    Expression::MemberExpression(member) => {
                        let Some(object) = self.eval_chain(&member.object, scope)? else {
                            return Ok(RuntimeValue::TRUE);
                        };
                        if member.optional && object.is_nullish() {
                            return Ok(RuntimeValue::TRUE);
                        }
                        let key = self.member_key(member, scope)?;
                        self.delete_property(&object, &key, member.loc).map(RuntimeValue::from)
                    }
                    _ => Err(EvalError::InvalidDeleteTarget(unary.loc)),
                },
                _ => Err(EvalError::InvalidDeleteTarget(unary.loc)),
            },
            UnaryOperator::Void => {
                self.eval_expr(&unary.argument, scope)?;
                Ok(RuntimeValue::Undefined)
            }
            UnaryOperator::Not => Ok((!self.eval_expr(&unary.argument, scope)?.is_truthy()).into()),
            UnaryOperator::Minus => {
                let value = self.eval_expr(&unary.argument, scope)?;
                Ok((-self.to_number(&value)?).into())
            }
            UnaryOperator::Plus => {
                let value = self.eval_expr(&unary.argument, scope)?;
                Ok(self.to_number(&value)?.into())
            }
            UnaryOperator::BitNot => {
                let value = self.eval_expr(&unary.argument, scope)?;
                Ok(Number::from(!self.to_number(&value)?.to_int32()).into())
            }
        }
    }

    fn eval_update(
        &mut self,
        update: &ast::UpdateExpression,
        scope: ScopeId,
    ) -> Result<RuntimeValue, EvalError> {
        let reference = self.reference(&update.argument, scope)?;
        let current = self.get_reference(&reference)?;
        let old = self.to_number(&current)?;
        let new = match update.operator {
            UpdateOperator::Increment => old + Number::new(1.0),
            UpdateOperator::Decrement => old - Number::new(1.0),
        };
        self.put_reference(&reference, new.into())?;
        Ok(if update.prefix { new } else { old }.into())
    }

    fn eval_logical(
        &mut self,
        logical: &ast::LogicalExpression,
        scope: ScopeId,
    ) -> Result<RuntimeValue, EvalError> {
        let left = self.eval_expr(&logical.left, scope)?;
        let short_circuit = match logical.operator {
            LogicalOperator::And => !left.is_truthy(),
            LogicalOperator::Or => left.is_truthy(),
            LogicalOperator::Coalesce => !left.is_nullish(),
        };
        if short_circuit {
            Ok(left)
        } else {
            self.eval_expr(&logical.right, scope)
        }
    }

    fn eval_assignment(
        &mut self,
        assignment: &ast::AssignmentExpression,
        scope: ScopeId,
    ) -> Result<RuntimeValue, EvalError> {
        if let Pattern::ObjectPattern(_) | Pattern::ArrayPattern(_) = &assignment.left {
            if assignment.operator != AssignmentOperator::Assign {
                return Err(EvalError::SyntaxError(
                    assignment.loc,
                    "Invalid left-hand side in assignment".to_string(),
                ));
            }
            let value = self.eval_expr(&assignment.right, scope)?;
            self.bind_pattern(
                &assignment.left,
                value.clone(),
                scope,
                BindingMode::Assign,
            )?;
            return Ok(value);
        }

        let reference = self.pattern_reference(&assignment.left, scope)?;
        let value = match assignment.operator {
            AssignmentOperator::Assign => {
                self.eval_initializer(&assignment.right, &assignment.left, scope)?
            }
            AssignmentOperator::And | AssignmentOperator::Or | AssignmentOperator::Coalesce => {
                let current = self.get_reference(&reference)?;
                let short_circuit = match assignment.operator {
                    AssignmentOperator::And => !current.is_truthy(),
                    AssignmentOperator::Or => current.is_truthy(),
                    _ => !current.is_nullish(),
                };
                if short_circuit {
                    return Ok(current);
                }
                self.eval_initializer(&assignment.right, &assignment.left, scope)?
            }
            operator => {
                let current = self.get_reference(&reference)?;
                let right = self.eval_expr(&assignment.right, scope)?;
                match operator.binary_operator() {
                    Some(op) => self
                        .binary_op(op, &current, &right, assignment.loc)
                        .map_err(|e| e.or_location(assignment.loc))?,
                    None => right,
                }
            }
        };

        self.put_reference(&reference, value.clone())?;
        Ok(value)
    }
}

/// Source-like text for a callee, used in "is not a function" messages.
fn describe(expr: &Expression) -> String {
    match expr {
        Expression::Identifier(id) => id.name.as_str(),
        Expression::ThisExpression(_) => "this".to_string(),
        Expression::MemberExpression(member) => match &*member.property {
            Expression::Identifier(id) if !member.computed => {
                format!("{}.{}", describe(&member.object), id.name)
            }
            _ => format!("{}[...]", describe(&member.object)),
        },
        Expression::ChainExpression(chain) => describe(&chain.expression),
        Expression::CallExpression(call) => format!("{}(...)", describe(&call.callee)),
        Expression::FunctionExpression(function) | Expression::ArrowFunctionExpression(function) => {
            function
                .name()
                .map(|name| name.as_str())
                .unwrap_or_else(|| "(intermediate value)".to_string())
        }
        _ => "expression".to_string(),
    }
}
