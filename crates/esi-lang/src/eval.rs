// The evaluator walks a decoded ESTree program statement by statement.
// Statements return a `Completion` so that break/continue/return unwind through
// ordinary return values; only thrown values travel on the `Err` side.
use std::rc::Rc;
use std::sync::LazyLock;

use rustc_hash::FxHashMap;
use smallvec::{SmallVec, smallvec};
use tracing::{debug, trace};

use crate::Ident;
use crate::ast::node::{self as ast, DeclarationKind, ForHead, ForInit, Statement};
use crate::range::Range;

pub mod builtin;
pub mod completion;
pub mod env;
pub mod error;
pub mod expr;
pub mod function;
pub mod heap;
pub mod hoist;
pub mod inspect;
pub mod ops;
pub mod property;
pub mod reference;
pub mod runtime_value;

use builtin::{HostState, Intrinsics};
use completion::Completion;
use env::{Env, ScopeId, ScopeKind};
use error::EvalError;
use heap::{ArrayId, Heap, Object, ObjectKind, Property};
use property::PropertyKey;
use reference::BindingMode;
use runtime_value::RuntimeValue;

pub(crate) static THIS: LazyLock<Ident> = LazyLock::new(|| Ident::new("this"));
pub(crate) static ARGUMENTS: LazyLock<Ident> = LazyLock::new(|| Ident::new("arguments"));
pub(crate) static EXPORTS: LazyLock<Ident> = LazyLock::new(|| Ident::new("exports"));
pub(crate) static MODULE: LazyLock<Ident> = LazyLock::new(|| Ident::new("module"));

/// Configuration options for the evaluator.
#[derive(Debug, Clone)]
pub struct Options {
    /// Maximum number of nested closure calls before a `RangeError` is raised.
    pub max_call_stack_depth: u32,
}

#[cfg(debug_assertions)]
impl Default for Options {
    fn default() -> Self {
        Self {
            max_call_stack_depth: 32,
        }
    }
}

#[cfg(not(debug_assertions))]
impl Default for Options {
    fn default() -> Self {
        Self {
            max_call_stack_depth: 192,
        }
    }
}

/// Executes one program.
///
/// An `Evaluator` owns every piece of per-run state (heap, scope chain, host
/// bookkeeping) and is dropped when the run ends, so runs never share state.
#[derive(Debug)]
pub struct Evaluator {
    pub(crate) heap: Heap,
    pub(crate) env: Env,
    pub(crate) root: ScopeId,
    pub(crate) intrinsics: Intrinsics,
    pub(crate) host: HostState,
    /// Arrays currently being stringified, to cut cycles in `join`.
    pub(crate) joining: Vec<ArrayId>,
    call_stack_depth: u32,
    /// `var` names per statement list, keyed by the list's address.
    hoisted: FxHashMap<usize, Rc<[Ident]>>,
    pub(crate) options: Options,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ForEachKind {
    In,
    Of,
}

/// The values a `for-in`/`for-of` loop walks over.
enum ForEachSource {
    Values(std::vec::IntoIter<RuntimeValue>),
    /// Arrays are read by index on every step so that mutation during the loop is observed.
    Array(ArrayId, usize),
}

impl Evaluator {
    pub fn new(options: Options, host: HostState) -> Self {
        let mut env = Env::new();
        let root = env.root();
        let mut heap = Heap::default();
        let view = heap.alloc_object(Object {
            kind: ObjectKind::ScopeView(root),
            ..Default::default()
        });

        let mut evaluator = Self {
            heap,
            env,
            root,
            intrinsics: Intrinsics::default(),
            host,
            joining: Vec::new(),
            call_stack_depth: 0,
            hoisted: FxHashMap::default(),
            options,
        };

        evaluator.env.install(root, *THIS, RuntimeValue::Object(view));
        builtin::install(&mut evaluator, view);

        let exports = evaluator.heap.new_object();
        let mut module = Object::default();
        module
            .properties
            .insert("exports".into(), Property::Data(exports.into()));
        let module = evaluator.heap.alloc_object(module);
        evaluator
            .env
            .define_var(root, *EXPORTS, Some(exports.into()))
            .and_then(|_| evaluator.env.define_var(root, *MODULE, Some(module.into())))
            .unwrap_or_default();

        evaluator
    }

    /// Binds a host global on the root scope, replacing any default of the same name.
    pub(crate) fn define_global(&mut self, name: &str, value: RuntimeValue) {
        self.env.install(self.root, Ident::new(name), value);
    }

    /// Runs a program and returns the final `module.exports`.
    pub fn run(&mut self, program: &ast::Program) -> Result<RuntimeValue, EvalError> {
        debug!(statements = program.body.len(), "run program");

        let root = self.root;
        self.hoist_declarations(&program.body, root)?;

        match self.eval_statements(&program.body, root)? {
            Completion::Break(_) => return Err(EvalError::IllegalSignal(program.loc, "break")),
            Completion::Continue(_) => {
                return Err(EvalError::IllegalSignal(program.loc, "continue"));
            }
            Completion::Normal(_) | Completion::Return(_) => {}
        }

        let exports = self.module_exports()?;
        let (objects, arrays, functions) = self.heap.stats();
        debug!(objects, arrays, functions, scopes = self.env.len(), "run finished");
        Ok(exports)
    }

    pub(crate) fn module_exports(&mut self) -> Result<RuntimeValue, EvalError> {
        let module = self
            .env
            .resolve(self.root, *MODULE)
            .map_err(|e| e.to_eval_error(None))?;
        self.get_property(&module, &PropertyKey::from("exports"), None)
    }

    /// The `this` visible from `scope`; `null` when nothing binds it.
    #[inline(always)]
    pub(crate) fn this_value(&self, scope: ScopeId) -> RuntimeValue {
        self.env
            .lookup(scope, *THIS)
            .cloned()
            .unwrap_or(RuntimeValue::Null)
    }

    #[inline(always)]
    pub(crate) fn enter_call(&mut self) -> Result<(), EvalError> {
        if self.call_stack_depth >= self.options.max_call_stack_depth {
            return Err(EvalError::RecursionError(self.options.max_call_stack_depth));
        }
        self.call_stack_depth += 1;
        Ok(())
    }

    #[inline(always)]
    pub(crate) fn exit_call(&mut self) {
        self.call_stack_depth = self.call_stack_depth.saturating_sub(1);
    }

    pub(crate) fn call_stack_depth(&self) -> u32 {
        self.call_stack_depth
    }

    /// Installs the `var` names and function declarations of a program or function body.
    pub(crate) fn hoist_declarations(
        &mut self,
        body: &[Statement],
        scope: ScopeId,
    ) -> Result<(), EvalError> {
        let key = body.as_ptr() as usize;
        let names = match self.hoisted.get(&key) {
            Some(names) => Rc::clone(names),
            None => {
                let names: Rc<[Ident]> = hoist::var_names(body).into();
                self.hoisted.insert(key, Rc::clone(&names));
                names
            }
        };

        for name in names.iter() {
            self.env
                .define_var(scope, *name, None)
                .map_err(|e| e.to_eval_error(None))?;
        }

        self.hoist_functions(body, scope)
    }

    /// Pre-installs the function declarations that are direct children of `body`.
    pub(crate) fn hoist_functions(
        &mut self,
        body: &[Statement],
        scope: ScopeId,
    ) -> Result<(), EvalError> {
        for stmt in body {
            if let Statement::FunctionDeclaration(function) = stmt {
                let value = self.create_closure(function, scope, false, None)?;
                if let Some(name) = function.name() {
                    self.env
                        .define_var(scope, name, Some(value))
                        .map_err(|e| e.to_eval_error(function.loc))?;
                }
            }
        }
        Ok(())
    }

    pub(crate) fn eval_statements(
        &mut self,
        body: &[Statement],
        scope: ScopeId,
    ) -> Result<Completion, EvalError> {
        let mut last = Completion::EMPTY;
        for stmt in body {
            last = self.eval_statement(stmt, scope)?;
            if last.is_abrupt() {
                break;
            }
        }
        Ok(last)
    }

    pub(crate) fn eval_statement(
        &mut self,
        stmt: &Statement,
        scope: ScopeId,
    ) -> Result<Completion, EvalError> {
        match stmt {
            Statement::ExpressionStatement(s) => {
                self.eval_expr(&s.expression, scope).map(Completion::Normal)
            }
            Statement::BlockStatement(block) => self.eval_block(block, scope),
            Statement::EmptyStatement(_) => Ok(Completion::EMPTY),
            Statement::DebuggerStatement(s) => {
                trace!(location = ?s.loc, "debugger statement");
                Ok(Completion::EMPTY)
            }
            Statement::ReturnStatement(s) => {
                let value = match &s.argument {
                    Some(argument) => self.eval_expr(argument, scope)?,
                    None => RuntimeValue::Undefined,
                };
                Ok(Completion::Return(value))
            }
            Statement::BreakStatement(s) => Ok(Completion::Break(s.label.as_ref().map(|l| l.name))),
            Statement::ContinueStatement(s) => {
                Ok(Completion::Continue(s.label.as_ref().map(|l| l.name)))
            }
            Statement::LabeledStatement(s) => self.eval_labeled(s, scope),
            Statement::IfStatement(s) => self.eval_if(s, scope),
            Statement::SwitchStatement(s) => self.eval_switch(s, scope),
            Statement::ThrowStatement(s) => {
                let value = self.eval_expr(&s.argument, scope)?;
                Err(self.throw_value(value, s.loc))
            }
            Statement::TryStatement(s) => self.eval_try(s, scope),
            Statement::WhileStatement(s) => self.eval_while(s, scope, &[]),
            Statement::DoWhileStatement(s) => self.eval_do_while(s, scope, &[]),
            Statement::ForStatement(s) => self.eval_for(s, scope, &[]),
            Statement::ForInStatement(s) => self.eval_for_each(s, ForEachKind::In, scope, &[]),
            Statement::ForOfStatement(s) => self.eval_for_each(s, ForEachKind::Of, scope, &[]),
            Statement::VariableDeclaration(decl) => {
                self.eval_variable_declaration(decl, scope)?;
                Ok(Completion::EMPTY)
            }
            // Installed when the enclosing body was entered.
            Statement::FunctionDeclaration(_) => Ok(Completion::EMPTY),
            Statement::ClassDeclaration(s) => Err(EvalError::Unimplemented(s.loc, "ClassDeclaration")),
            Statement::WithStatement(s) => Err(EvalError::Unimplemented(s.loc, "WithStatement")),
            Statement::ImportDeclaration(s) => {
                Err(EvalError::Unimplemented(s.loc, "ImportDeclaration"))
            }
            Statement::ExportNamedDeclaration(s) => {
                Err(EvalError::Unimplemented(s.loc, "ExportNamedDeclaration"))
            }
            Statement::ExportDefaultDeclaration(s) => {
                Err(EvalError::Unimplemented(s.loc, "ExportDefaultDeclaration"))
            }
            Statement::ExportAllDeclaration(s) => {
                Err(EvalError::Unimplemented(s.loc, "ExportAllDeclaration"))
            }
        }
    }

    /// Runs a block in a fresh child scope, or in `parent` itself when `parent` was
    /// pushed for exactly this block.
    pub(crate) fn eval_block(
        &mut self,
        block: &ast::BlockStatement,
        parent: ScopeId,
    ) -> Result<Completion, EvalError> {
        if self.env.take_shared(parent) {
            if self.env.kind(parent) != ScopeKind::Function {
                self.hoist_functions(&block.body, parent)?;
            }
            return self.eval_statements(&block.body, parent);
        }

        let scope = self.env.push(parent, ScopeKind::Block);
        let result = self
            .hoist_functions(&block.body, scope)
            .and_then(|_| self.eval_statements(&block.body, scope));
        self.env.release(scope);
        result
    }

    fn eval_labeled(
        &mut self,
        stmt: &ast::LabeledStatement,
        scope: ScopeId,
    ) -> Result<Completion, EvalError> {
        let mut labels: SmallVec<[Ident; 2]> = smallvec![stmt.label.name];
        let mut body = &*stmt.body;
        while let Statement::LabeledStatement(inner) = body {
            labels.push(inner.label.name);
            body = &inner.body;
        }

        let completion = match body {
            Statement::WhileStatement(s) => self.eval_while(s, scope, &labels)?,
            Statement::DoWhileStatement(s) => self.eval_do_while(s, scope, &labels)?,
            Statement::ForStatement(s) => self.eval_for(s, scope, &labels)?,
            Statement::ForInStatement(s) => {
                self.eval_for_each(s, ForEachKind::In, scope, &labels)?
            }
            Statement::ForOfStatement(s) => {
                self.eval_for_each(s, ForEachKind::Of, scope, &labels)?
            }
            other => self.eval_statement(other, scope)?,
        };

        match completion {
            Completion::Break(Some(label)) if labels.contains(&label) => Ok(Completion::EMPTY),
            completion => Ok(completion),
        }
    }

    fn eval_if(&mut self, stmt: &ast::IfStatement, scope: ScopeId) -> Result<Completion, EvalError> {
        if self.eval_expr(&stmt.test, scope)?.is_truthy() {
            return self.eval_statement(&stmt.consequent, scope);
        }

        match &stmt.alternate {
            Some(alternate) => {
                let child = self.env.push_shared(scope, ScopeKind::Block);
                let result = self.eval_statement(alternate, child);
                self.env.release(child);
                result
            }
            None => Ok(Completion::EMPTY),
        }
    }

    fn eval_switch(
        &mut self,
        stmt: &ast::SwitchStatement,
        parent: ScopeId,
    ) -> Result<Completion, EvalError> {
        let discriminant = self.eval_expr(&stmt.discriminant, parent)?;
        let scope = self.env.push(parent, ScopeKind::Switch);
        let result = self.eval_cases(&stmt.cases, &discriminant, scope);
        self.env.release(scope);

        match result? {
            Completion::Break(None) => Ok(Completion::EMPTY),
            completion => Ok(completion),
        }
    }

    fn eval_cases(
        &mut self,
        cases: &[ast::SwitchCase],
        discriminant: &RuntimeValue,
        scope: ScopeId,
    ) -> Result<Completion, EvalError> {
        for case in cases {
            self.hoist_functions(&case.consequent, scope)?;
        }

        let mut start = None;
        for (i, case) in cases.iter().enumerate() {
            if let Some(test) = &case.test {
                if self.eval_expr(test, scope)? == *discriminant {
                    start = Some(i);
                    break;
                }
            }
        }

        let Some(start) = start.or_else(|| cases.iter().position(|case| case.test.is_none()))
        else {
            return Ok(Completion::EMPTY);
        };

        for case in &cases[start..] {
            let completion = self.eval_statements(&case.consequent, scope)?;
            if completion.is_abrupt() {
                return Ok(completion);
            }
        }
        Ok(Completion::EMPTY)
    }

    /// Runs one iteration of a loop body in its own scope.
    fn eval_loop_body(&mut self, body: &Statement, parent: ScopeId) -> Result<Completion, EvalError> {
        let scope = self.env.push_shared(parent, ScopeKind::Loop);
        let result = self.eval_statement(body, scope);
        self.env.release(scope);
        result
    }

    fn eval_while(
        &mut self,
        stmt: &ast::WhileStatement,
        scope: ScopeId,
        labels: &[Ident],
    ) -> Result<Completion, EvalError> {
        while self.eval_expr(&stmt.test, scope)?.is_truthy() {
            if let Some(exit) = self.eval_loop_body(&stmt.body, scope)?.exit_loop(labels) {
                return Ok(exit);
            }
        }
        Ok(Completion::EMPTY)
    }

    fn eval_do_while(
        &mut self,
        stmt: &ast::WhileStatement,
        scope: ScopeId,
        labels: &[Ident],
    ) -> Result<Completion, EvalError> {
        loop {
            if let Some(exit) = self.eval_loop_body(&stmt.body, scope)?.exit_loop(labels) {
                return Ok(exit);
            }
            if !self.eval_expr(&stmt.test, scope)?.is_truthy() {
                return Ok(Completion::EMPTY);
            }
        }
    }

    fn eval_for(
        &mut self,
        stmt: &ast::ForStatement,
        parent: ScopeId,
        labels: &[Ident],
    ) -> Result<Completion, EvalError> {
        let head = self.env.push(parent, ScopeKind::Loop);
        let mut iteration = head;
        let result = self.eval_for_iterations(stmt, head, &mut iteration, labels);
        if iteration != head {
            self.env.release(iteration);
        }
        self.env.release(head);
        result
    }

    fn eval_for_iterations(
        &mut self,
        stmt: &ast::ForStatement,
        head: ScopeId,
        iteration: &mut ScopeId,
        labels: &[Ident],
    ) -> Result<Completion, EvalError> {
        // Lexical bindings of the head are copied into a new scope before every
        // iteration, so each closure sees the values of its own iteration.
        let per_iteration: SmallVec<[Ident; 4]> = match &stmt.init {
            Some(ForInit::VariableDeclaration(decl)) => {
                self.eval_variable_declaration(decl, head)?;
                if decl.kind == DeclarationKind::Var {
                    SmallVec::new()
                } else {
                    decl.declarations
                        .iter()
                        .flat_map(|declarator| declarator.id.bound_names())
                        .collect()
                }
            }
            Some(ForInit::Expression(expr)) => {
                self.eval_expr(expr, head)?;
                SmallVec::new()
            }
            None => SmallVec::new(),
        };

        if !per_iteration.is_empty() {
            *iteration = self.copy_iteration_scope(head, head, &per_iteration)?;
        }

        loop {
            if let Some(test) = &stmt.test {
                if !self.eval_expr(test, *iteration)?.is_truthy() {
                    return Ok(Completion::EMPTY);
                }
            }

            if let Some(exit) = self.eval_loop_body(&stmt.body, *iteration)?.exit_loop(labels) {
                return Ok(exit);
            }

            if !per_iteration.is_empty() {
                let next = self.copy_iteration_scope(*iteration, head, &per_iteration)?;
                self.env.release(*iteration);
                *iteration = next;
            }

            if let Some(update) = &stmt.update {
                self.eval_expr(update, *iteration)?;
            }
        }
    }

    fn copy_iteration_scope(
        &mut self,
        from: ScopeId,
        head: ScopeId,
        names: &[Ident],
    ) -> Result<ScopeId, EvalError> {
        let scope = self.env.push(head, ScopeKind::Loop);
        for name in names {
            let (kind, value) = match self.env.get_own(from, *name) {
                Some(variable) => (variable.kind(), variable.get().clone()),
                None => continue,
            };
            self.env
                .define(scope, kind, *name, Some(value))
                .map_err(|e| e.to_eval_error(None))?;
        }
        Ok(scope)
    }

    fn eval_for_each(
        &mut self,
        stmt: &ast::ForEachStatement,
        kind: ForEachKind,
        parent: ScopeId,
        labels: &[Ident],
    ) -> Result<Completion, EvalError> {
        if stmt.is_await {
            return Err(EvalError::Unimplemented(stmt.loc, "ForAwaitStatement"));
        }

        let right = self.eval_expr(&stmt.right, parent)?;
        let mut source = match kind {
            ForEachKind::In => ForEachSource::Values(
                self.enumerable_keys(&right)
                    .into_iter()
                    .map(RuntimeValue::String)
                    .collect::<Vec<_>>()
                    .into_iter(),
            ),
            ForEachKind::Of => match right {
                RuntimeValue::Array(id) => ForEachSource::Array(id, 0),
                other => ForEachSource::Values(self.iterate(&other, stmt.right.loc())?.into_iter()),
            },
        };

        while let Some(item) = self.next_item(&mut source) {
            let scope = self.env.push(parent, ScopeKind::Loop);
            let result = self
                .bind_for_head(&stmt.left, item, scope)
                .and_then(|_| self.eval_loop_body(&stmt.body, scope));
            self.env.release(scope);

            if let Some(exit) = result?.exit_loop(labels) {
                return Ok(exit);
            }
        }
        Ok(Completion::EMPTY)
    }

    fn next_item(&self, source: &mut ForEachSource) -> Option<RuntimeValue> {
        match source {
            ForEachSource::Values(values) => values.next(),
            ForEachSource::Array(id, index) => {
                let item = self.heap.array(*id).get(*index).cloned()?;
                *index += 1;
                Some(item)
            }
        }
    }

    fn bind_for_head(
        &mut self,
        head: &ForHead,
        item: RuntimeValue,
        scope: ScopeId,
    ) -> Result<(), EvalError> {
        match head {
            ForHead::VariableDeclaration(decl) => match decl.declarations.first() {
                Some(declarator) => {
                    self.bind_pattern(&declarator.id, item, scope, BindingMode::Declare(decl.kind))
                }
                None => Ok(()),
            },
            ForHead::Pattern(pattern) => {
                self.bind_pattern(pattern, item, scope, BindingMode::Assign)
            }
        }
    }

    fn eval_try(&mut self, stmt: &ast::TryStatement, scope: ScopeId) -> Result<Completion, EvalError> {
        let result = match (self.eval_block(&stmt.block, scope), &stmt.handler) {
            (Err(error), Some(handler)) if error.is_catchable() => {
                self.eval_catch(handler, error, scope)
            }
            (result, _) => result,
        };

        if let Err(error) = &result {
            if !error.is_catchable() {
                return result;
            }
        }

        let Some(finalizer) = &stmt.finalizer else {
            return result;
        };

        // The finalizer's own abrupt completion wins; a normal one keeps the original outcome.
        match self.eval_block(finalizer, scope)? {
            Completion::Normal(_) => result,
            abrupt => Ok(abrupt),
        }
    }

    fn eval_catch(
        &mut self,
        handler: &ast::CatchClause,
        error: EvalError,
        parent: ScopeId,
    ) -> Result<Completion, EvalError> {
        let value = self.error_to_value(error);
        let scope = self.env.push_shared(parent, ScopeKind::Block);
        let result = match &handler.param {
            Some(param) => self.bind_pattern(
                param,
                value,
                scope,
                BindingMode::Declare(DeclarationKind::Let),
            ),
            None => Ok(()),
        }
        .and_then(|_| self.eval_block(&handler.body, scope));
        self.env.release(scope);
        result
    }

    /// The value a `catch` clause observes for an error.
    pub(crate) fn error_to_value(&mut self, error: EvalError) -> RuntimeValue {
        match error {
            EvalError::Thrown { value, .. } => value,
            error => self.new_error(error.error_name(), error.to_string()),
        }
    }

    pub(crate) fn throw_value(&self, value: RuntimeValue, location: Option<Range>) -> EvalError {
        EvalError::Thrown {
            message: self.inspect(&value),
            value,
            location,
        }
    }

    pub(crate) fn eval_variable_declaration(
        &mut self,
        decl: &ast::VariableDeclaration,
        scope: ScopeId,
    ) -> Result<(), EvalError> {
        for declarator in &decl.declarations {
            match (&declarator.init, &declarator.id) {
                (Some(init), id) => {
                    let value = self.eval_initializer(init, id, scope)?;
                    self.bind_pattern(id, value, scope, BindingMode::Declare(decl.kind))?;
                }
                (None, id) if decl.kind == DeclarationKind::Var => {
                    // `var x;` never resets a value that is already there.
                    for name in id.bound_names() {
                        self.env
                            .define_var(scope, name, None)
                            .map_err(|e| e.to_eval_error(declarator.loc))?;
                    }
                }
                (None, id) => {
                    self.bind_pattern(
                        id,
                        RuntimeValue::Undefined,
                        scope,
                        BindingMode::Declare(decl.kind),
                    )?;
                }
            }
        }
        Ok(())
    }
}
