use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::trace;

use super::error::EvalError;
use super::runtime_value::RuntimeValue;
use crate::Ident;
use crate::arena::{Arena, ArenaId};
use crate::ast::node::DeclarationKind;
use crate::range::Range;

pub type ScopeId = ArenaId<Scope>;

#[derive(Error, Debug, PartialEq)]
pub enum EnvError {
    #[error("{0} is not defined")]
    NotDefined(Ident),
    #[error("{0} is not defined")]
    Undeclared(Ident),
    #[error("Assignment to constant variable \"{0}\"")]
    AssignToConst(Ident),
    #[error("Identifier \"{0}\" has already been declared")]
    Duplicate(Ident),
}

impl EnvError {
    pub fn to_eval_error(&self, location: Option<Range>) -> EvalError {
        match self {
            EnvError::NotDefined(name) => EvalError::NotDefined(location, name.to_string()),
            EnvError::Undeclared(name) => {
                EvalError::AssignToUndeclared(location, name.to_string())
            }
            EnvError::AssignToConst(name) => EvalError::AssignToConst(location, name.to_string()),
            EnvError::Duplicate(name) => {
                EvalError::DuplicateDeclaration(location, name.to_string())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Function,
    Loop,
    Switch,
    Block,
}

/// A named storage cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    kind: DeclarationKind,
    value: RuntimeValue,
}

impl Variable {
    pub fn new(kind: DeclarationKind, value: RuntimeValue) -> Self {
        Self { kind, value }
    }

    #[inline(always)]
    pub fn get(&self) -> &RuntimeValue {
        &self.value
    }

    /// Returns `false` and leaves the value untouched for `const` bindings.
    #[inline(always)]
    pub fn set(&mut self, value: RuntimeValue) -> bool {
        if self.kind == DeclarationKind::Const {
            return false;
        }
        self.value = value;
        true
    }

    pub fn kind(&self) -> DeclarationKind {
        self.kind
    }
}

#[derive(Debug, Clone)]
pub struct Scope {
    kind: ScopeKind,
    variables: FxHashMap<Ident, Variable>,
    parent: Option<ScopeId>,
    /// Set when the compound statement body should run directly in this scope.
    shared: bool,
    /// Set once a closure holds this scope (or a descendant); such scopes are never recycled.
    captured: bool,
}

impl Scope {
    fn new(kind: ScopeKind, parent: Option<ScopeId>, shared: bool) -> Self {
        Self {
            kind,
            variables: FxHashMap::default(),
            parent,
            shared,
            captured: false,
        }
    }
}

/// The scope chain of one run.
///
/// Scopes live in an arena and link to their parent by handle. A scope is
/// recycled when its construct finishes unless a closure captured it.
#[derive(Debug, Default)]
pub struct Env {
    scopes: Arena<Scope>,
    free: Vec<ScopeId>,
}

impl Env {
    pub fn new() -> Self {
        Self {
            scopes: Arena::new(64),
            free: Vec::new(),
        }
    }

    /// Allocates the root scope. It has no parent and is never recycled.
    pub fn root(&mut self) -> ScopeId {
        let id = self.alloc(Scope::new(ScopeKind::Block, None, false));
        self.scopes[id].captured = true;
        id
    }

    pub fn push(&mut self, parent: ScopeId, kind: ScopeKind) -> ScopeId {
        trace!(?kind, parent = ?parent, "push scope");
        self.alloc(Scope::new(kind, Some(parent), false))
    }

    /// Like [`Env::push`], but the first block entered in the new scope reuses it.
    pub fn push_shared(&mut self, parent: ScopeId, kind: ScopeKind) -> ScopeId {
        trace!(?kind, parent = ?parent, "push shared scope");
        self.alloc(Scope::new(kind, Some(parent), true))
    }

    fn alloc(&mut self, scope: Scope) -> ScopeId {
        match self.free.pop() {
            Some(id) => {
                let slot = &mut self.scopes[id];
                slot.kind = scope.kind;
                slot.parent = scope.parent;
                slot.shared = scope.shared;
                slot.captured = false;
                slot.variables.clear();
                id
            }
            None => self.scopes.alloc(scope),
        }
    }

    /// Hands the scope back once its construct has finished.
    pub fn release(&mut self, id: ScopeId) {
        if !self.scopes[id].captured {
            self.free.push(id);
        }
    }

    /// Pins `id` and all of its ancestors.
    pub fn capture(&mut self, id: ScopeId) {
        let mut current = Some(id);
        while let Some(id) = current {
            let scope = &mut self.scopes[id];
            if scope.captured {
                break;
            }
            scope.captured = true;
            current = scope.parent;
        }
    }

    /// Returns whether the scope was shared and clears the flag.
    pub fn take_shared(&mut self, id: ScopeId) -> bool {
        std::mem::replace(&mut self.scopes[id].shared, false)
    }

    pub fn kind(&self, id: ScopeId) -> ScopeKind {
        self.scopes[id].kind
    }

    pub fn parent(&self, id: ScopeId) -> Option<ScopeId> {
        self.scopes[id].parent
    }

    pub fn len(&self) -> usize {
        self.scopes.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn define(
        &mut self,
        id: ScopeId,
        kind: DeclarationKind,
        name: Ident,
        value: Option<RuntimeValue>,
    ) -> Result<(), EnvError> {
        match kind {
            DeclarationKind::Var => self.define_var(id, name, value),
            DeclarationKind::Let => self.define_let(id, name, value.unwrap_or_default()),
            DeclarationKind::Const => self.define_const(id, name, value.unwrap_or_default()),
        }
    }

    pub fn define_const(
        &mut self,
        id: ScopeId,
        name: Ident,
        value: RuntimeValue,
    ) -> Result<(), EnvError> {
        self.define_lexical(id, DeclarationKind::Const, name, value)
    }

    pub fn define_let(
        &mut self,
        id: ScopeId,
        name: Ident,
        value: RuntimeValue,
    ) -> Result<(), EnvError> {
        self.define_lexical(id, DeclarationKind::Let, name, value)
    }

    fn define_lexical(
        &mut self,
        id: ScopeId,
        kind: DeclarationKind,
        name: Ident,
        value: RuntimeValue,
    ) -> Result<(), EnvError> {
        let variables = &mut self.scopes[id].variables;
        if variables.contains_key(&name) {
            return Err(EnvError::Duplicate(name));
        }
        variables.insert(name, Variable::new(kind, value));
        Ok(())
    }

    /// Installs a `var` binding on the nearest function scope (or the root).
    ///
    /// An existing `var` of the same name is reused: it is assigned when a value is
    /// given and left alone otherwise.
    pub fn define_var(
        &mut self,
        id: ScopeId,
        name: Ident,
        value: Option<RuntimeValue>,
    ) -> Result<(), EnvError> {
        let target = self.var_scope(id);
        let variables = &mut self.scopes[target].variables;
        match variables.get_mut(&name) {
            Some(variable) if variable.kind() == DeclarationKind::Var => {
                if let Some(value) = value {
                    variable.set(value);
                }
                Ok(())
            }
            Some(_) => Err(EnvError::Duplicate(name)),
            None => {
                variables.insert(
                    name,
                    Variable::new(DeclarationKind::Var, value.unwrap_or_default()),
                );
                Ok(())
            }
        }
    }

    /// Binds `name` as a constant on `id`, replacing whatever was bound there.
    ///
    /// Used for host globals, where an injected value overrides a default.
    pub fn install(&mut self, id: ScopeId, name: Ident, value: RuntimeValue) {
        self.scopes[id]
            .variables
            .insert(name, Variable::new(DeclarationKind::Const, value));
    }

    fn var_scope(&self, id: ScopeId) -> ScopeId {
        let mut current = id;
        loop {
            let scope = &self.scopes[current];
            match scope.parent {
                Some(parent) if scope.kind != ScopeKind::Function => current = parent,
                _ => return current,
            }
        }
    }

    /// Finds the scope that binds `name`, starting at `id`.
    pub fn find(&self, id: ScopeId, name: Ident) -> Option<ScopeId> {
        let mut current = Some(id);
        while let Some(id) = current {
            let scope = &self.scopes[id];
            if scope.variables.contains_key(&name) {
                return Some(id);
            }
            current = scope.parent;
        }
        None
    }

    #[inline(always)]
    pub fn lookup(&self, id: ScopeId, name: Ident) -> Option<&RuntimeValue> {
        self.find(id, name)
            .and_then(|found| self.scopes[found].variables.get(&name))
            .map(Variable::get)
    }

    #[inline(always)]
    pub fn resolve(&self, id: ScopeId, name: Ident) -> Result<RuntimeValue, EnvError> {
        self.lookup(id, name)
            .cloned()
            .ok_or(EnvError::NotDefined(name))
    }

    pub fn assign(&mut self, id: ScopeId, name: Ident, value: RuntimeValue) -> Result<(), EnvError> {
        let found = self.find(id, name).ok_or(EnvError::Undeclared(name))?;
        match self.scopes[found].variables.get_mut(&name) {
            Some(variable) => {
                if variable.set(value) {
                    Ok(())
                } else {
                    Err(EnvError::AssignToConst(name))
                }
            }
            None => Err(EnvError::Undeclared(name)),
        }
    }

    pub fn get_own(&self, id: ScopeId, name: Ident) -> Option<&Variable> {
        self.scopes[id].variables.get(&name)
    }

    /// The bindings of one scope, sorted by name.
    pub fn variables(&self, id: ScopeId) -> Vec<(Ident, &Variable)> {
        let mut variables = self.scopes[id]
            .variables
            .iter()
            .map(|(name, variable)| (*name, variable))
            .collect::<Vec<_>>();
        variables.sort_by(|(a, _), (b, _)| a.as_str().cmp(&b.as_str()));
        variables
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn env() -> Env {
        Env::new()
    }

    fn num(n: f64) -> RuntimeValue {
        RuntimeValue::from(n)
    }

    #[rstest]
    fn test_define_and_resolve(mut env: Env) {
        let root = env.root();
        let x = Ident::new("x");
        env.define_let(root, x, num(1.0)).unwrap();

        assert_eq!(env.resolve(root, x), Ok(num(1.0)));
        assert_eq!(
            env.resolve(root, Ident::new("missing")),
            Err(EnvError::NotDefined(Ident::new("missing")))
        );
    }

    #[rstest]
    fn test_resolve_from_parent_and_shadowing(mut env: Env) {
        let root = env.root();
        let child = env.push(root, ScopeKind::Block);
        let x = Ident::new("x");
        env.define_let(root, x, num(1.0)).unwrap();
        assert_eq!(env.resolve(child, x), Ok(num(1.0)));

        env.define_let(child, x, num(2.0)).unwrap();
        assert_eq!(env.resolve(child, x), Ok(num(2.0)));
        assert_eq!(env.resolve(root, x), Ok(num(1.0)));
    }

    #[rstest]
    #[case::const_(DeclarationKind::Const)]
    #[case::let_(DeclarationKind::Let)]
    fn test_lexical_redeclaration_fails(mut env: Env, #[case] kind: DeclarationKind) {
        let root = env.root();
        let x = Ident::new("x");
        env.define(root, kind, x, Some(num(1.0))).unwrap();

        assert_eq!(
            env.define(root, kind, x, Some(num(2.0))),
            Err(EnvError::Duplicate(x))
        );
    }

    #[rstest]
    fn test_var_hoists_to_function_scope(mut env: Env) {
        let root = env.root();
        let function = env.push(root, ScopeKind::Function);
        let block = env.push(function, ScopeKind::Block);
        let inner = env.push(block, ScopeKind::Loop);
        let x = Ident::new("x");

        env.define_var(inner, x, Some(num(1.0))).unwrap();

        assert!(env.get_own(function, x).is_some());
        assert!(env.get_own(inner, x).is_none());
        assert_eq!(env.resolve(block, x), Ok(num(1.0)));
        assert!(env.lookup(root, x).is_none());
    }

    #[rstest]
    fn test_var_redeclaration(mut env: Env) {
        let root = env.root();
        let x = Ident::new("x");
        env.define_var(root, x, Some(num(1.0))).unwrap();
        env.define_var(root, x, None).unwrap();
        assert_eq!(env.resolve(root, x), Ok(num(1.0)));

        env.define_var(root, x, Some(num(2.0))).unwrap();
        assert_eq!(env.resolve(root, x), Ok(num(2.0)));
    }

    #[rstest]
    fn test_var_over_lexical_fails(mut env: Env) {
        let root = env.root();
        let x = Ident::new("x");
        env.define_let(root, x, num(1.0)).unwrap();

        assert_eq!(env.define_var(root, x, None), Err(EnvError::Duplicate(x)));
    }

    #[rstest]
    fn test_assign(mut env: Env) {
        let root = env.root();
        let block = env.push(root, ScopeKind::Block);
        let (x, c) = (Ident::new("x"), Ident::new("c"));
        env.define_let(root, x, num(1.0)).unwrap();
        env.define_const(root, c, num(1.0)).unwrap();

        assert_eq!(env.assign(block, x, num(5.0)), Ok(()));
        assert_eq!(env.resolve(root, x), Ok(num(5.0)));
        assert_eq!(env.assign(block, c, num(5.0)), Err(EnvError::AssignToConst(c)));
        assert_eq!(env.resolve(root, c), Ok(num(1.0)));
        assert_eq!(
            env.assign(block, Ident::new("nope"), num(0.0)),
            Err(EnvError::Undeclared(Ident::new("nope")))
        );
    }

    #[rstest]
    fn test_released_scope_is_recycled(mut env: Env) {
        let root = env.root();
        let block = env.push(root, ScopeKind::Block);
        env.define_let(block, Ident::new("x"), num(1.0)).unwrap();
        env.release(block);

        let reused = env.push(root, ScopeKind::Loop);
        assert_eq!(reused, block);
        assert_eq!(env.kind(reused), ScopeKind::Loop);
        assert!(env.get_own(reused, Ident::new("x")).is_none());
    }

    #[rstest]
    fn test_captured_scope_survives_release(mut env: Env) {
        let root = env.root();
        let outer = env.push(root, ScopeKind::Function);
        let inner = env.push(outer, ScopeKind::Block);
        env.capture(inner);
        env.release(inner);
        env.release(outer);

        let next = env.push(root, ScopeKind::Block);
        assert_ne!(next, inner);
        assert_ne!(next, outer);
    }

    #[rstest]
    fn test_take_shared(mut env: Env) {
        let root = env.root();
        let function = env.push_shared(root, ScopeKind::Function);

        assert!(env.take_shared(function));
        assert!(!env.take_shared(function));
    }

    #[rstest]
    fn test_install_overrides(mut env: Env) {
        let root = env.root();
        let x = Ident::new("x");
        env.install(root, x, num(1.0));
        env.install(root, x, num(2.0));

        assert_eq!(env.resolve(root, x), Ok(num(2.0)));
        assert_eq!(env.assign(root, x, num(3.0)), Err(EnvError::AssignToConst(x)));
    }

    #[test]
    fn test_variable_set() {
        let mut constant = Variable::new(DeclarationKind::Const, num(1.0));
        assert!(!constant.set(num(2.0)));
        assert_eq!(constant.get(), &num(1.0));

        let mut variable = Variable::new(DeclarationKind::Let, num(1.0));
        assert!(variable.set(num(2.0)));
        assert_eq!(variable.get(), &num(2.0));
    }
}
