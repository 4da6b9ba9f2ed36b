use std::rc::Rc;

use smol_str::SmolStr;
use tracing::trace;

use super::completion::Completion;
use super::env::{ScopeId, ScopeKind};
use super::error::EvalError;
use super::heap::{Closure, FunctionId, FunctionKind, FunctionObject, Object, ObjectId, Property};
use super::runtime_value::RuntimeValue;
use super::{ARGUMENTS, Evaluator, THIS};
use crate::ast::node::{self as ast, FunctionBody};
use crate::range::Range;

impl Evaluator {
    /// Creates a function value closing over `scope`.
    ///
    /// `name` is used when the function node has no name of its own
    /// (`const f = () => {}` names the arrow `f`).
    pub(crate) fn create_closure(
        &mut self,
        node: &Rc<ast::Function>,
        scope: ScopeId,
        is_arrow: bool,
        name: Option<SmolStr>,
    ) -> Result<RuntimeValue, EvalError> {
        if node.generator {
            return Err(EvalError::Unimplemented(node.loc, "GeneratorFunction"));
        }
        if node.is_async {
            return Err(EvalError::Unimplemented(node.loc, "AsyncFunction"));
        }

        self.env.capture(scope);
        let name = node
            .name()
            .map(|name| SmolStr::from(name.as_str()))
            .or(name)
            .unwrap_or_default();
        let closure = Closure {
            node: Rc::clone(node),
            scope,
            is_arrow,
        };

        Ok(RuntimeValue::Function(self.heap.alloc_function(
            FunctionObject::new(FunctionKind::Closure(closure), name),
        )))
    }

    /// Creates a function expression value. A named expression sees its own name as a
    /// `const` in a scope between the closure and `scope`, so the body may shadow it.
    pub(crate) fn create_function_expression(
        &mut self,
        node: &Rc<ast::Function>,
        scope: ScopeId,
        name: Option<SmolStr>,
    ) -> Result<RuntimeValue, EvalError> {
        let Some(own_name) = node.name() else {
            return self.create_closure(node, scope, false, name);
        };

        let name_scope = self.env.push(scope, ScopeKind::Block);
        let function = self.create_closure(node, name_scope, false, name);
        if let Ok(function) = &function {
            self.env.install(name_scope, own_name, function.clone());
        }
        self.env.release(name_scope);
        function
    }

    /// Calls `callee` with an explicit receiver.
    pub(crate) fn call_value(
        &mut self,
        callee: &RuntimeValue,
        this: RuntimeValue,
        args: Vec<RuntimeValue>,
        loc: Option<Range>,
    ) -> Result<RuntimeValue, EvalError> {
        match callee {
            RuntimeValue::Function(id) => self.call_function(*id, this, args, loc),
            other => Err(EvalError::TypeError(
                loc,
                format!("{} is not a function", self.inspect(other)),
            )),
        }
    }

    pub(crate) fn call_function(
        &mut self,
        id: FunctionId,
        this: RuntimeValue,
        args: Vec<RuntimeValue>,
        loc: Option<Range>,
    ) -> Result<RuntimeValue, EvalError> {
        match self.heap.function(id).kind.clone() {
            FunctionKind::Closure(closure) => self.call_closure(id, &closure, this, args, loc),
            FunctionKind::Builtin(builtin) => {
                (builtin.func)(self, &this, &args).map_err(|e| e.to_eval_error(loc))
            }
            FunctionKind::Host(host) => {
                let args = args
                    .iter()
                    .map(|arg| self.export_value(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                let result = host
                    .call(&args)
                    .map_err(|message| EvalError::HostError(loc, message))?;
                Ok(self.import_value(result))
            }
            FunctionKind::Bound {
                target,
                this,
                args: mut bound,
            } => {
                bound.extend(args);
                self.call_function(target, this, bound, loc)
            }
        }
    }

    fn call_closure(
        &mut self,
        id: FunctionId,
        closure: &Closure,
        this: RuntimeValue,
        args: Vec<RuntimeValue>,
        loc: Option<Range>,
    ) -> Result<RuntimeValue, EvalError> {
        self.enter_call()?;
        trace!(
            name = %self.heap.function(id).name,
            depth = self.call_stack_depth(),
            "call closure"
        );

        let scope = self.env.push_shared(closure.scope, ScopeKind::Function);
        let result = self.run_closure(closure, this, args, scope);
        self.env.release(scope);
        self.exit_call();

        result.map_err(|e| e.or_location(loc))
    }

    fn run_closure(
        &mut self,
        closure: &Closure,
        this: RuntimeValue,
        args: Vec<RuntimeValue>,
        scope: ScopeId,
    ) -> Result<RuntimeValue, EvalError> {
        let node = &closure.node;

        // Arrows see the `this` and `arguments` of the scope they were created in.
        if !closure.is_arrow {
            let arguments = self.heap.alloc_array(args.clone());
            self.env
                .define_var(scope, *ARGUMENTS, Some(arguments.into()))
                .and_then(|_| self.env.define_const(scope, *THIS, this))
                .map_err(|e| e.to_eval_error(node.loc))?;
        }

        self.bind_parameters(&node.params, &args, scope)?;

        match &node.body {
            FunctionBody::Block(block) => {
                self.hoist_declarations(&block.body, scope)?;
                match self.eval_block(block, scope)? {
                    Completion::Return(value) => Ok(value),
                    Completion::Normal(_) => Ok(RuntimeValue::Undefined),
                    Completion::Break(_) => Err(EvalError::IllegalSignal(node.loc, "break")),
                    Completion::Continue(_) => {
                        Err(EvalError::IllegalSignal(node.loc, "continue"))
                    }
                }
            }
            FunctionBody::Expression(expr) => {
                self.env.take_shared(scope);
                self.eval_expr(expr, scope)
            }
        }
    }

    /// `new callee(...args)`.
    pub(crate) fn construct(
        &mut self,
        callee: &RuntimeValue,
        args: Vec<RuntimeValue>,
        loc: Option<Range>,
    ) -> Result<RuntimeValue, EvalError> {
        let RuntimeValue::Function(id) = callee else {
            return Err(EvalError::TypeError(
                loc,
                format!("{} is not a constructor", self.inspect(callee)),
            ));
        };

        match self.heap.function(*id).kind.clone() {
            FunctionKind::Closure(closure) if closure.is_arrow => Err(EvalError::TypeError(
                loc,
                format!("{} is not a constructor", self.function_label(*id)),
            )),
            FunctionKind::Closure(closure) => {
                let prototype = self.function_prototype(*id);
                let instance = self.heap.alloc_object(Object::with_proto(Some(prototype)));
                // The instance is the result even when the constructor returns an object.
                self.call_closure(*id, &closure, instance.into(), args, loc)?;
                Ok(instance.into())
            }
            FunctionKind::Bound {
                target,
                args: mut bound,
                ..
            } => {
                bound.extend(args);
                self.construct(&RuntimeValue::Function(target), bound, loc)
            }
            FunctionKind::Builtin(_) | FunctionKind::Host(_) => {
                self.call_function(*id, RuntimeValue::Undefined, args, loc)
            }
        }
    }

    /// The `prototype` object of a function, created with a `constructor` back link on first use.
    pub(crate) fn function_prototype(&mut self, id: FunctionId) -> ObjectId {
        if let Some(Property::Data(RuntimeValue::Object(prototype))) =
            self.heap.function(id).properties.get("prototype")
        {
            return *prototype;
        }

        let mut prototype = Object::default();
        prototype
            .properties
            .insert("constructor".into(), Property::Data(RuntimeValue::Function(id)));
        let prototype = self.heap.alloc_object(prototype);
        self.heap
            .function_mut(id)
            .properties
            .insert("prototype".into(), Property::Data(prototype.into()));
        prototype
    }

    /// Whether reading `prototype` should materialize one.
    pub(crate) fn has_implicit_prototype(&self, id: FunctionId) -> bool {
        matches!(&self.heap.function(id).kind, FunctionKind::Closure(closure) if !closure.is_arrow)
    }

    pub(crate) fn function_label(&self, id: FunctionId) -> String {
        let name = &self.heap.function(id).name;
        if name.is_empty() {
            "anonymous".to_string()
        } else {
            name.to_string()
        }
    }
}
