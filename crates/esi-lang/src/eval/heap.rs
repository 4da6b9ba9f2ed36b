use std::rc::Rc;

use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use super::builtin::BuiltinFunction;
use super::env::ScopeId;
use super::runtime_value::RuntimeValue;
use crate::arena::{Arena, ArenaId};
use crate::ast::node as ast;
use crate::value::HostFunction;

pub type ObjectId = ArenaId<Object>;
pub type ArrayId = ArenaId<Vec<RuntimeValue>>;
pub type FunctionId = ArenaId<FunctionObject>;

#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    Data(RuntimeValue),
    Accessor {
        get: Option<FunctionId>,
        set: Option<FunctionId>,
    },
}

/// Insertion-ordered property storage.
#[derive(Debug, Clone, Default)]
pub struct PropertyMap {
    entries: Vec<(SmolStr, Property)>,
    index: FxHashMap<SmolStr, usize>,
}

impl PropertyMap {
    pub fn get(&self, key: &str) -> Option<&Property> {
        self.index.get(key).map(|i| &self.entries[*i].1)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Property> {
        self.index.get(key).map(|i| &mut self.entries[*i].1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Inserts or replaces a property; a replaced property keeps its position.
    pub fn insert(&mut self, key: SmolStr, property: Property) {
        match self.index.get(&key) {
            Some(i) => self.entries[*i].1 = property,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, property));
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Property> {
        let position = self.index.remove(key)?;
        let (_, property) = self.entries.remove(position);
        for (i, (k, _)) in self.entries.iter().enumerate().skip(position) {
            self.index.insert(k.clone(), i);
        }
        Some(property)
    }

    pub fn keys(&self) -> impl Iterator<Item = &SmolStr> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SmolStr, &Property)> {
        self.entries.iter().map(|(k, p)| (k, p))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum ObjectKind {
    #[default]
    Ordinary,
    /// Created by one of the `Error` constructors.
    Error,
    /// The top-level `this`: reads and writes go to the bindings of the scope.
    ScopeView(ScopeId),
}

#[derive(Debug, Clone, Default)]
pub struct Object {
    pub properties: PropertyMap,
    pub proto: Option<ObjectId>,
    pub kind: ObjectKind,
}

impl Object {
    pub fn with_proto(proto: Option<ObjectId>) -> Self {
        Self {
            proto,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct Closure {
    pub node: Rc<ast::Function>,
    pub scope: ScopeId,
    pub is_arrow: bool,
}

#[derive(Debug, Clone)]
pub enum FunctionKind {
    Closure(Closure),
    Builtin(BuiltinFunction),
    Host(HostFunction),
    Bound {
        target: FunctionId,
        this: RuntimeValue,
        args: Vec<RuntimeValue>,
    },
}

#[derive(Debug, Clone)]
pub struct FunctionObject {
    pub kind: FunctionKind,
    pub name: SmolStr,
    pub properties: PropertyMap,
}

impl FunctionObject {
    pub fn new(kind: FunctionKind, name: impl Into<SmolStr>) -> Self {
        Self {
            kind,
            name: name.into(),
            properties: PropertyMap::default(),
        }
    }

    /// Declared parameter count, reported as `length`.
    pub fn arity(&self) -> usize {
        match &self.kind {
            FunctionKind::Closure(closure) => closure
                .node
                .params
                .iter()
                .take_while(|p| {
                    !matches!(p, ast::Pattern::AssignmentPattern(_) | ast::Pattern::RestElement(_))
                })
                .count(),
            FunctionKind::Builtin(builtin) => builtin.arity as usize,
            FunctionKind::Host(_) => 0,
            FunctionKind::Bound { .. } => 0,
        }
    }
}

/// Receiver types whose methods are resolved from the builtin tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodOwner {
    Object,
    Array,
    String,
    Number,
    Function,
}

/// Per-run storage for everything a [`RuntimeValue`] handle can point at.
///
/// Objects, arrays and functions live until the run ends.
#[derive(Debug, Default)]
pub struct Heap {
    objects: Arena<Object>,
    arrays: Arena<Vec<RuntimeValue>>,
    functions: Arena<FunctionObject>,
    methods: FxHashMap<(MethodOwner, &'static str), FunctionId>,
}

impl Heap {
    pub fn alloc_object(&mut self, object: Object) -> ObjectId {
        self.objects.alloc(object)
    }

    pub fn new_object(&mut self) -> ObjectId {
        self.objects.alloc(Object::default())
    }

    pub fn alloc_array(&mut self, values: Vec<RuntimeValue>) -> ArrayId {
        self.arrays.alloc(values)
    }

    pub fn alloc_function(&mut self, function: FunctionObject) -> FunctionId {
        self.functions.alloc(function)
    }

    #[inline(always)]
    pub fn object(&self, id: ObjectId) -> &Object {
        &self.objects[id]
    }

    #[inline(always)]
    pub fn object_mut(&mut self, id: ObjectId) -> &mut Object {
        &mut self.objects[id]
    }

    #[inline(always)]
    pub fn array(&self, id: ArrayId) -> &Vec<RuntimeValue> {
        &self.arrays[id]
    }

    #[inline(always)]
    pub fn array_mut(&mut self, id: ArrayId) -> &mut Vec<RuntimeValue> {
        &mut self.arrays[id]
    }

    #[inline(always)]
    pub fn function(&self, id: FunctionId) -> &FunctionObject {
        &self.functions[id]
    }

    #[inline(always)]
    pub fn function_mut(&mut self, id: FunctionId) -> &mut FunctionObject {
        &mut self.functions[id]
    }

    /// Returns the function object for a builtin method, allocating it on first use
    /// so that `"a".trim === "b".trim` holds.
    pub fn method(&mut self, owner: MethodOwner, builtin: &BuiltinFunction) -> FunctionId {
        if let Some(id) = self.methods.get(&(owner, builtin.name)) {
            return *id;
        }
        let id = self.alloc_function(FunctionObject::new(
            FunctionKind::Builtin(*builtin),
            builtin.name,
        ));
        self.methods.insert((owner, builtin.name), id);
        id
    }

    /// Walks the prototype chain of `id` (excluding `id` itself).
    pub fn proto_chain(&self, id: ObjectId) -> impl Iterator<Item = ObjectId> + '_ {
        std::iter::successors(self.object(id).proto, |proto| self.object(*proto).proto)
    }

    pub fn stats(&self) -> (usize, usize, usize) {
        (self.objects.len(), self.arrays.len(), self.functions.len())
    }
}
