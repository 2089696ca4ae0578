//! Guest object model
//!
//! [`Val`] is the interpreter's own value type. Scalars are copied;
//! containers and objects are shared handles behind `parking_lot` mutexes,
//! so aliasing inside a script behaves as the language expects. Identity
//! (`is`) compares handle addresses.

use super::builtins::exceptions::ExcType;
use super::control::{EvalResult, Throw, MAX_NESTING};
use super::executor::Interpreter;
use super::types::{FunctionDef, OrderedMap};
use crate::host::Callable;
use crate::value::{Complex64, UserData};
use parking_lot::Mutex;
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Weak};

/* ===================== Namespaces ===================== */

pub(crate) type Namespace = OrderedMap<Arc<str>, Val>;

/// A shared, mutable namespace (module globals, function locals, class bodies)
pub(crate) type Scope = Arc<Mutex<Namespace>>;

pub(crate) fn new_scope() -> Scope {
    Arc::new(Mutex::new(Namespace::new()))
}

/// Dict storage: normalised key to (original key, value)
pub(crate) type DictMap = OrderedMap<HashKey, (Val, Val)>;

/* ===================== Built-in Types ===================== */

/// Types implemented natively; they are also the callable constructors
/// `int`, `str`, `list` and so on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum BuiltinType {
    NoneType,
    Bool,
    Int,
    Float,
    Complex,
    Str,
    List,
    Tuple,
    Dict,
    Range,
    Type,
    Function,
    BuiltinFunction,
    Module,
    Iterator,
}

impl BuiltinType {
    pub fn name(self) -> &'static str {
        match self {
            BuiltinType::NoneType => "NoneType",
            BuiltinType::Bool => "bool",
            BuiltinType::Int => "int",
            BuiltinType::Float => "float",
            BuiltinType::Complex => "complex",
            BuiltinType::Str => "str",
            BuiltinType::List => "list",
            BuiltinType::Tuple => "tuple",
            BuiltinType::Dict => "dict",
            BuiltinType::Range => "range",
            BuiltinType::Type => "type",
            BuiltinType::Function => "function",
            BuiltinType::BuiltinFunction => "builtin_function_or_method",
            BuiltinType::Module => "module",
            BuiltinType::Iterator => "iterator",
        }
    }

    /// Types bound as builtin names
    pub const CONSTRUCTORS: [BuiltinType; 10] = [
        BuiltinType::Bool,
        BuiltinType::Int,
        BuiltinType::Float,
        BuiltinType::Complex,
        BuiltinType::Str,
        BuiltinType::List,
        BuiltinType::Tuple,
        BuiltinType::Dict,
        BuiltinType::Range,
        BuiltinType::Type,
    ];

    /// Whether `self` is `other` or derives from it
    pub fn is_subtype(self, other: BuiltinType) -> bool {
        self == other || (self == BuiltinType::Bool && other == BuiltinType::Int)
    }
}

/* ===================== Values ===================== */

#[derive(Clone, Default)]
pub(crate) enum Val {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Complex(Complex64),
    Str(Arc<str>),
    List(Arc<ListCell>),
    Tuple(Arc<TupleCell>),
    Dict(Arc<DictCell>),
    Range(RangeVal),
    Iter(Arc<Mutex<IterState>>),
    Function(Arc<Function>),
    Native(&'static NativeFn),
    Method(Arc<Method>),
    Class(Arc<Class>),
    Instance(Arc<Instance>),
    Module(Arc<Module>),
    Type(BuiltinType),
    /// Result of `super()`
    Super(Arc<SuperProxy>),
    Host(Callable),
    UserData(UserData),
}

impl Val {
    pub fn list(items: Vec<Val>) -> Val {
        Val::List(Arc::new(ListCell(Mutex::new(items))))
    }

    pub fn tuple(items: Vec<Val>) -> Val {
        Val::Tuple(Arc::new(TupleCell(items)))
    }

    pub fn dict(map: DictMap) -> Val {
        Val::Dict(Arc::new(DictCell(Mutex::new(map))))
    }

    pub fn iter(items: Vec<Val>) -> Val {
        Val::Iter(Arc::new(Mutex::new(IterState { items, pos: 0 })))
    }

    /// Build a dict from key/value pairs, rejecting unhashable keys
    pub fn dict_from_pairs(pairs: Vec<(Val, Val)>) -> EvalResult {
        let mut map = DictMap::new();
        for (k, v) in pairs {
            map.insert(k.hash_key()?, (k, v));
        }
        Ok(Val::dict(map))
    }

    pub fn type_name(&self) -> String {
        match self {
            Val::Instance(inst) => inst.class.name.to_string(),
            Val::Method(m) => match m.as_ref() {
                Method::Bound { .. } => "method".to_string(),
                Method::Native { .. } => "builtin_function_or_method".to_string(),
            },
            Val::Class(_) => "type".to_string(),
            Val::Super(_) => "super".to_string(),
            Val::UserData(_) => "userdata".to_string(),
            other => other.builtin_type().name().to_string(),
        }
    }

    /// Closest built-in type; instances and classes report as `type`
    pub fn builtin_type(&self) -> BuiltinType {
        match self {
            Val::None => BuiltinType::NoneType,
            Val::Bool(_) => BuiltinType::Bool,
            Val::Int(_) => BuiltinType::Int,
            Val::Float(_) => BuiltinType::Float,
            Val::Complex(_) => BuiltinType::Complex,
            Val::Str(_) => BuiltinType::Str,
            Val::List(_) => BuiltinType::List,
            Val::Tuple(_) => BuiltinType::Tuple,
            Val::Dict(_) => BuiltinType::Dict,
            Val::Range(_) => BuiltinType::Range,
            Val::Iter(_) => BuiltinType::Iterator,
            Val::Function(_) => BuiltinType::Function,
            Val::Native(_) | Val::Host(_) | Val::Method(_) => BuiltinType::BuiltinFunction,
            Val::Module(_) => BuiltinType::Module,
            Val::Type(_) | Val::Class(_) | Val::Instance(_) | Val::Super(_) | Val::UserData(_) => {
                BuiltinType::Type
            }
        }
    }

    /// Truth value for everything that needs no guest call
    ///
    /// Instances are handled by the interpreter (`__bool__`, `__len__`).
    pub fn is_truthy(&self) -> bool {
        match self {
            Val::None => false,
            Val::Bool(b) => *b,
            Val::Int(i) => *i != 0,
            Val::Float(f) => *f != 0.0,
            Val::Complex(c) => c.re != 0.0 || c.im != 0.0,
            Val::Str(s) => !s.is_empty(),
            Val::List(items) => !items.lock().is_empty(),
            Val::Tuple(items) => !items.is_empty(),
            Val::Dict(map) => !map.lock().is_empty(),
            Val::Range(r) => r.len() > 0,
            _ => true,
        }
    }

    /// `a is b`
    pub fn is(&self, other: &Val) -> bool {
        match (self, other) {
            (Val::None, Val::None) => true,
            (Val::Bool(a), Val::Bool(b)) => a == b,
            (Val::Int(a), Val::Int(b)) => a == b,
            (Val::Float(a), Val::Float(b)) => a.to_bits() == b.to_bits(),
            (Val::Str(a), Val::Str(b)) => a == b,
            (Val::Type(a), Val::Type(b)) => a == b,
            (Val::Range(a), Val::Range(b)) => a == b,
            (Val::Native(a), Val::Native(b)) => std::ptr::eq(*a, *b),
            (Val::Tuple(a), Val::Tuple(b)) => a.is_empty() && b.is_empty() || Arc::ptr_eq(a, b),
            _ => match (self.addr(), other.addr()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }

    /// Address of a heap object, for identity and identity hashing
    pub fn addr(&self) -> Option<usize> {
        Some(match self {
            Val::List(v) => Arc::as_ptr(v) as *const () as usize,
            Val::Tuple(v) => Arc::as_ptr(v) as *const () as usize,
            Val::Dict(v) => Arc::as_ptr(v) as *const () as usize,
            Val::Iter(v) => Arc::as_ptr(v) as *const () as usize,
            Val::Function(v) => Arc::as_ptr(v) as *const () as usize,
            Val::Native(v) => *v as *const NativeFn as usize,
            Val::Method(v) => Arc::as_ptr(v) as *const () as usize,
            Val::Class(v) => Arc::as_ptr(v) as *const () as usize,
            Val::Instance(v) => Arc::as_ptr(v) as *const () as usize,
            Val::Module(v) => Arc::as_ptr(v) as *const () as usize,
            Val::Super(v) => Arc::as_ptr(v) as *const () as usize,
            Val::Host(c) => c.addr(),
            Val::UserData(u) => u.addr(),
            _ => return None,
        })
    }

    /// Normalised dict key; equal numbers of any type share one key
    pub fn hash_key(&self) -> EvalResult<HashKey> {
        self.hash_key_at(0)
    }

    fn hash_key_at(&self, depth: usize) -> EvalResult<HashKey> {
        if depth > MAX_NESTING {
            return Err(Throw::new(
                ExcType::RecursionError,
                "maximum recursion depth exceeded while hashing",
            ));
        }
        Ok(match self {
            Val::None => HashKey::None,
            Val::Bool(b) => HashKey::Int(*b as i64),
            Val::Int(i) => HashKey::Int(*i),
            Val::Float(f) => float_key(*f),
            Val::Complex(c) if c.im == 0.0 => float_key(c.re),
            Val::Complex(c) => HashKey::Complex(c.re.to_bits(), c.im.to_bits()),
            Val::Str(s) => HashKey::Str(s.clone()),
            Val::Tuple(items) => HashKey::Tuple(
                items
                    .iter()
                    .map(|item| item.hash_key_at(depth + 1))
                    .collect::<EvalResult<Vec<_>>>()?,
            ),
            Val::Range(r) => HashKey::Range(r.start, r.stop, r.step),
            Val::Type(t) => HashKey::Type(*t),
            Val::List(_) | Val::Dict(_) => {
                return Err(Throw::type_error(format!(
                    "unhashable type: '{}'",
                    self.type_name()
                )))
            }
            other => HashKey::Ptr(other.addr().unwrap_or_default()),
        })
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Val::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view; bools count as integers
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Val::Int(i) => Some(*i),
            Val::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    /// Float view of any real number
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Val::Float(f) => Some(*f),
            Val::Int(i) => Some(*i as f64),
            Val::Bool(b) => Some(*b as i64 as f64),
            _ => None,
        }
    }

    pub fn is_callable(&self) -> bool {
        match self {
            Val::Function(_)
            | Val::Native(_)
            | Val::Method(_)
            | Val::Class(_)
            | Val::Type(_)
            | Val::Host(_) => true,
            Val::Instance(inst) => inst.class.lookup("__call__").is_some(),
            _ => false,
        }
    }
}

fn float_key(f: f64) -> HashKey {
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        HashKey::Int(f as i64)
    } else {
        HashKey::Float(f.to_bits())
    }
}

impl From<bool> for Val {
    fn from(b: bool) -> Self {
        Val::Bool(b)
    }
}

impl From<i64> for Val {
    fn from(i: i64) -> Self {
        Val::Int(i)
    }
}

impl From<usize> for Val {
    fn from(i: usize) -> Self {
        Val::Int(i64::try_from(i).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Val {
    fn from(f: f64) -> Self {
        Val::Float(f)
    }
}

impl From<&str> for Val {
    fn from(s: &str) -> Self {
        Val::Str(Arc::from(s))
    }
}

impl From<String> for Val {
    fn from(s: String) -> Self {
        Val::Str(Arc::from(s))
    }
}

impl fmt::Debug for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::None => write!(f, "None"),
            Val::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Val::Int(i) => write!(f, "{}", i),
            Val::Float(x) => write!(f, "{}", x),
            Val::Str(s) => write!(f, "{:?}", s),
            Val::List(items) => write!(f, "<list of {}>", items.lock().len()),
            Val::Tuple(items) => write!(f, "<tuple of {}>", items.len()),
            Val::Dict(map) => write!(f, "<dict of {}>", map.lock().len()),
            other => write!(f, "<{}>", other.type_name()),
        }
    }
}

/* ===================== Container Storage ===================== */

/// List storage
pub(crate) struct ListCell(Mutex<Vec<Val>>);

impl Deref for ListCell {
    type Target = Mutex<Vec<Val>>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Drop for ListCell {
    fn drop(&mut self) {
        release(std::mem::take(self.0.get_mut()));
    }
}

/// Tuple storage
pub(crate) struct TupleCell(Vec<Val>);

impl Deref for TupleCell {
    type Target = [Val];

    fn deref(&self) -> &[Val] {
        &self.0
    }
}

impl Drop for TupleCell {
    fn drop(&mut self) {
        release(std::mem::take(&mut self.0));
    }
}

/// Dict storage
pub(crate) struct DictCell(Mutex<DictMap>);

impl Deref for DictCell {
    type Target = Mutex<DictMap>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Drop for DictCell {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        take_entries(self.0.get_mut(), &mut pending);
        release(pending);
    }
}

fn take_entries(map: &mut DictMap, pending: &mut Vec<Val>) {
    for (key, value) in std::mem::take(map).into_values() {
        pending.push(key);
        pending.push(value);
    }
}

/// Drop values without recursing into nested containers
///
/// A container whose last handle goes away here moves its contents onto
/// the work list and is dropped empty, so native stack use stays flat
/// however deep the nesting.
fn release(mut pending: Vec<Val>) {
    while let Some(value) = pending.pop() {
        match value {
            Val::List(cell) => {
                if let Some(mut cell) = Arc::into_inner(cell) {
                    pending.append(cell.0.get_mut());
                }
            }
            Val::Tuple(cell) => {
                if let Some(mut cell) = Arc::into_inner(cell) {
                    pending.append(&mut cell.0);
                }
            }
            Val::Dict(cell) => {
                if let Some(mut cell) = Arc::into_inner(cell) {
                    take_entries(cell.0.get_mut(), &mut pending);
                }
            }
            Val::Instance(instance) => {
                if let Some(mut instance) = Arc::into_inner(instance) {
                    pending.extend(std::mem::take(instance.attrs.get_mut()).into_values());
                }
            }
            _ => {}
        }
    }
}

/// Dict key after numeric normalisation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum HashKey {
    None,
    Int(i64),
    Float(u64),
    Complex(u64, u64),
    Str(Arc<str>),
    Tuple(Vec<HashKey>),
    Range(i64, i64, i64),
    Type(BuiltinType),
    /// Identity-hashed objects
    Ptr(usize),
}

/* ===================== Ranges and Iterators ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RangeVal {
    pub start: i64,
    pub stop: i64,
    pub step: i64,
}

impl RangeVal {
    pub fn len(&self) -> usize {
        let (start, stop, step) = (self.start as i128, self.stop as i128, self.step as i128);
        let n = if step > 0 && start < stop {
            (stop - start + step - 1) / step
        } else if step < 0 && start > stop {
            (start - stop - step - 1) / -step
        } else {
            0
        };
        usize::try_from(n).unwrap_or(usize::MAX)
    }

    pub fn get(&self, index: usize) -> i64 {
        (self.start as i128 + index as i128 * self.step as i128) as i64
    }
}

/// State of an iterator object returned by `iter()`, `zip()` and friends
#[derive(Debug)]
pub(crate) struct IterState {
    pub items: Vec<Val>,
    pub pos: usize,
}

impl IterState {
    pub fn next(&mut self) -> Option<Val> {
        let item = self.items.get(self.pos).cloned()?;
        self.pos += 1;
        Some(item)
    }
}

/* ===================== Functions ===================== */

/// A guest function closed over its defining scopes
pub(crate) struct Function {
    pub def: Arc<FunctionDef>,
    /// Evaluated defaults, aligned with `def.params`
    pub defaults: Vec<Option<Val>>,
    /// Evaluated defaults, aligned with `def.kwonly`
    pub kwdefaults: Vec<Option<Val>>,
    pub globals: Scope,
    /// Enclosing function scopes, innermost last
    pub closure: Vec<Scope>,
    /// Diagnostic name of the code that defined it
    pub file: Arc<str>,
    /// Class whose body defined the function, for `super()`
    pub owner: Mutex<Option<Weak<Class>>>,
}

impl Function {
    pub fn owner(&self) -> Option<Arc<Class>> {
        self.owner.lock().as_ref().and_then(Weak::upgrade)
    }
}

/// Signature of a native function
pub(crate) type NativeImpl = fn(&mut Interpreter<'_>, Args) -> EvalResult;

/// A function implemented in Rust (builtins, methods, standard modules)
pub(crate) struct NativeFn {
    pub name: &'static str,
    pub call: NativeImpl,
}

/// Arguments of a call, after `*` and `**` expansion
#[derive(Debug, Default)]
pub(crate) struct Args {
    pub positional: Vec<Val>,
    pub keywords: Vec<(Arc<str>, Val)>,
}

impl Args {
    pub fn new(positional: Vec<Val>) -> Self {
        Self {
            positional,
            keywords: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.positional.len()
    }

    pub fn get(&self, index: usize) -> Option<&Val> {
        self.positional.get(index)
    }

    /// Prepend a receiver (`self`)
    pub fn with_receiver(mut self, receiver: Val) -> Self {
        self.positional.insert(0, receiver);
        self
    }

    /// Take a keyword argument by name
    pub fn take_keyword(&mut self, name: &str) -> Option<Val> {
        let pos = self.keywords.iter().position(|(k, _)| &**k == name)?;
        Some(self.keywords.remove(pos).1)
    }

    /// Check the positional count and that no keywords remain
    pub fn check(&self, name: &str, min: usize, max: usize) -> EvalResult<()> {
        if let Some((key, _)) = self.keywords.first() {
            return Err(Throw::type_error(format!(
                "{}() got an unexpected keyword argument '{}'",
                name, key
            )));
        }
        let n = self.positional.len();
        if n >= min && n <= max {
            return Ok(());
        }
        let (qualifier, bound) = if min == max {
            ("exactly", min)
        } else if n < min {
            ("at least", min)
        } else {
            ("at most", max)
        };
        Err(Throw::type_error(format!(
            "{}() takes {} {} argument{} ({} given)",
            name,
            qualifier,
            bound,
            if bound == 1 { "" } else { "s" },
            n
        )))
    }
}

/// A callable with its receiver attached
pub(crate) enum Method {
    /// `obj.method` for a guest function found on the class
    Bound { receiver: Val, func: Val },
    /// `"abc".upper` and friends
    Native {
        receiver: Val,
        func: &'static NativeFn,
    },
}

/* ===================== Classes ===================== */

pub(crate) struct Class {
    pub name: Arc<str>,
    pub bases: Vec<Arc<Class>>,
    /// Method resolution order, excluding the class itself
    pub mro: Vec<Arc<Class>>,
    pub attrs: Mutex<Namespace>,
    /// Set on the built-in exception classes
    pub builtin: Option<ExcType>,
}

impl Class {
    pub fn new(
        name: &str,
        bases: Vec<Arc<Class>>,
        attrs: Namespace,
        builtin: Option<ExcType>,
    ) -> Result<Arc<Class>, String> {
        let mro = linearize(&bases)?;
        Ok(Arc::new(Class {
            name: Arc::from(name),
            bases,
            mro,
            attrs: Mutex::new(attrs),
            builtin,
        }))
    }

    /// A class with no bases, such as `object`
    pub fn root(name: &str, attrs: Namespace) -> Arc<Class> {
        Arc::new(Class {
            name: Arc::from(name),
            bases: Vec::new(),
            mro: Vec::new(),
            attrs: Mutex::new(attrs),
            builtin: None,
        })
    }

    /// The class followed by its method resolution order
    pub fn mro_with_self(self: &Arc<Self>) -> Vec<Arc<Class>> {
        std::iter::once(self.clone())
            .chain(self.mro.iter().cloned())
            .collect()
    }

    /// Find an attribute on the class or its bases
    pub fn lookup(&self, name: &str) -> Option<Val> {
        if let Some(v) = self.attrs.lock().get(name) {
            return Some(v.clone());
        }
        self.mro
            .iter()
            .find_map(|c| c.attrs.lock().get(name).cloned())
    }

    pub fn is_subclass(self: &Arc<Self>, other: &Arc<Class>) -> bool {
        Arc::ptr_eq(self, other) || self.mro.iter().any(|c| Arc::ptr_eq(c, other))
    }

    /// Nearest built-in exception class this class derives from
    pub fn exception_type(&self) -> Option<ExcType> {
        self.builtin
            .or_else(|| self.mro.iter().find_map(|c| c.builtin))
    }
}

/// C3 linearisation of the given bases
fn linearize(bases: &[Arc<Class>]) -> Result<Vec<Arc<Class>>, String> {
    let mut seqs: Vec<Vec<Arc<Class>>> = bases.iter().map(Class::mro_with_self).collect();
    seqs.push(bases.to_vec());
    let mut out: Vec<Arc<Class>> = Vec::new();
    loop {
        seqs.retain(|s| !s.is_empty());
        if seqs.is_empty() {
            return Ok(out);
        }
        let candidate = seqs.iter().map(|s| s[0].clone()).find(|head| {
            !seqs
                .iter()
                .any(|s| s[1..].iter().any(|c| Arc::ptr_eq(c, head)))
        });
        let Some(head) = candidate else {
            return Err("Cannot create a consistent method resolution order (MRO)".to_string());
        };
        for seq in seqs.iter_mut() {
            if Arc::ptr_eq(&seq[0], &head) {
                seq.remove(0);
            }
        }
        out.push(head);
    }
}

pub(crate) struct Instance {
    pub class: Arc<Class>,
    pub attrs: Mutex<Namespace>,
}

impl Drop for Instance {
    fn drop(&mut self) {
        release(std::mem::take(self.attrs.get_mut()).into_values().collect());
    }
}

impl Instance {
    pub fn new(class: Arc<Class>) -> Arc<Instance> {
        Arc::new(Instance {
            class,
            attrs: Mutex::new(Namespace::new()),
        })
    }
}

/// `super()` bound to a receiver, resolving after `class` in its MRO
pub(crate) struct SuperProxy {
    pub class: Arc<Class>,
    pub receiver: Val,
}

/* ===================== Modules ===================== */

pub(crate) struct Module {
    pub name: Arc<str>,
    pub globals: Scope,
}

impl Module {
    pub fn new(name: &str, globals: Scope) -> Arc<Module> {
        Arc::new(Module {
            name: Arc::from(name),
            globals,
        })
    }

    pub fn get(&self, name: &str) -> Option<Val> {
        self.globals.lock().get(name).cloned()
    }

    pub fn set(&self, name: &str, value: Val) {
        self.globals.lock().insert(Arc::from(name), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(name: &str, bases: Vec<Arc<Class>>) -> Arc<Class> {
        Class::new(name, bases, Namespace::new(), None).unwrap()
    }

    #[test]
    fn test_numeric_keys_are_normalised() {
        assert_eq!(Val::Int(1).hash_key().unwrap(), Val::Float(1.0).hash_key().unwrap());
        assert_eq!(Val::Bool(true).hash_key().unwrap(), Val::Int(1).hash_key().unwrap());
        assert_ne!(Val::Float(1.5).hash_key().unwrap(), Val::Int(1).hash_key().unwrap());
        assert!(Val::list(vec![]).hash_key().is_err());
    }

    #[test]
    fn test_range_len() {
        let r = |start, stop, step| RangeVal { start, stop, step }.len();
        assert_eq!(r(0, 10, 1), 10);
        assert_eq!(r(0, 10, 3), 4);
        assert_eq!(r(10, 0, -2), 5);
        assert_eq!(r(5, 5, 1), 0);
        assert_eq!(r(5, 0, 1), 0);
    }

    #[test]
    fn test_c3_linearisation() {
        let object = class("object", vec![]);
        let a = class("A", vec![object.clone()]);
        let b = class("B", vec![a.clone()]);
        let c = class("C", vec![a.clone()]);
        let d = class("D", vec![b.clone(), c.clone()]);
        let names: Vec<String> = d.mro_with_self().iter().map(|c| c.name.to_string()).collect();
        assert_eq!(names, vec!["D", "B", "C", "A", "object"]);
        assert!(d.is_subclass(&a));
        assert!(!a.is_subclass(&d));
    }

    #[test]
    fn test_inconsistent_mro_is_rejected() {
        let object = class("object", vec![]);
        let a = class("A", vec![object.clone()]);
        let b = class("B", vec![a.clone()]);
        assert!(Class::new("X", vec![a, b], Namespace::new(), None).is_err());
    }

    #[test]
    fn test_identity() {
        let list = Val::list(vec![Val::Int(1)]);
        assert!(list.is(&list.clone()));
        assert!(!list.is(&Val::list(vec![Val::Int(1)])));
        assert!(Val::None.is(&Val::None));
        assert!(!Val::Int(1).is(&Val::Bool(true)));
    }
}
