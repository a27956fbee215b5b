use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

use crate::parser::ast::{Node, Param};
use crate::source::Span;
use crate::types::{Modifiers, TypeName, ValueKind};

use super::builtins::Builtin;
use super::scope::SymbolTable;

/// A runtime value. Lists and maps are shared by reference: aliased
/// bindings observe each other's mutations. Everything else is
/// immutable once produced.
#[derive(Debug, Clone)]
pub enum Value {
    Int(i32),
    Float(f64),
    Bool(bool),
    Str(String),
    Byte(u8),
    List(Rc<RefCell<Vec<Value>>>),
    Map(Rc<RefCell<HashMap<MapKey, Value>>>),
    Function(Rc<UserFunction>),
    Builtin(&'static Builtin),
    File(Rc<RefCell<FileHandle>>),
    Null,
    Void,
}

impl Value {
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn map(entries: HashMap<MapKey, Value>) -> Self {
        Value::Map(Rc::new(RefCell::new(entries)))
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Bool(_) => ValueKind::Bool,
            Value::Str(_) => ValueKind::Str,
            Value::Byte(_) => ValueKind::Byte,
            Value::List(_) => ValueKind::List,
            Value::Map(_) => ValueKind::Map,
            Value::Function(_) | Value::Builtin(_) => ValueKind::Function,
            Value::File(_) => ValueKind::File,
            Value::Null => ValueKind::Null,
            Value::Void => ValueKind::Void,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// The numeric reading of this value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Byte(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// The 32-bit integer reading of this value, if it has one.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Byte(v) => Some(*v as i32),
            _ => None,
        }
    }

    /// Language `==`: numerics compare by value across int/float/byte,
    /// containers element-wise.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Null, Value::Null) | (Value::Void, Value::Void) => true,
            (Value::List(a), Value::List(b)) => {
                Rc::ptr_eq(a, b) || {
                    let a = a.borrow();
                    let b = b.borrow();
                    a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.equals(y))
                }
            }
            (Value::Map(a), Value::Map(b)) => {
                Rc::ptr_eq(a, b) || {
                    let a = a.borrow();
                    let b = b.borrow();
                    a.len() == b.len()
                        && a.iter().all(|(k, v)| b.get(k).is_some_and(|w| v.equals(w)))
                }
            }
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => std::ptr::eq(*a, *b),
            (Value::File(a), Value::File(b)) => Rc::ptr_eq(a, b),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }
}

/// Variant-exact equality, used by tests; the language's `==` goes
/// through [`Value::equals`] instead.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Void, Value::Void) => true,
            (Value::List(a), Value::List(b)) => *a.borrow() == *b.borrow(),
            (Value::Map(a), Value::Map(b)) => *a.borrow() == *b.borrow(),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => std::ptr::eq(*a, *b),
            (Value::File(a), Value::File(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{:?}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Str(v) => f.write_str(v),
            Value::Byte(v) => write!(f, "{}", v),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Map(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                f.write_str("}")
            }
            Value::Function(func) => write!(f, "<function {}>", func.display_name()),
            Value::Builtin(builtin) => write!(f, "<builtin {}>", builtin.name),
            Value::File(handle) => {
                let handle = handle.borrow();
                write!(f, "<file {} ({})>", handle.path.display(), handle.mode.as_str())
            }
            Value::Null => f.write_str("null"),
            Value::Void => f.write_str("void"),
        }
    }
}

/// Map keys are restricted to the hashable scalar values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    Int(i32),
    Bool(bool),
    Str(String),
    Byte(u8),
}

impl MapKey {
    pub fn from_value(value: &Value) -> Option<MapKey> {
        let key = match value {
            Value::Int(v) => MapKey::Int(*v),
            Value::Bool(v) => MapKey::Bool(*v),
            Value::Str(v) => MapKey::Str(v.clone()),
            Value::Byte(v) => MapKey::Byte(*v),
            _ => return None,
        };
        Some(key)
    }

    pub fn to_value(&self) -> Value {
        match self {
            MapKey::Int(v) => Value::Int(*v),
            MapKey::Bool(v) => Value::Bool(*v),
            MapKey::Str(v) => Value::Str(v.clone()),
            MapKey::Byte(v) => Value::Byte(*v),
        }
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::Int(v) => write!(f, "{}", v),
            MapKey::Bool(v) => write!(f, "{}", v),
            MapKey::Str(v) => write!(f, "\"{}\"", v),
            MapKey::Byte(v) => write!(f, "{}", v),
        }
    }
}

/// A user-defined function. The body is the parsed block; `closure` is
/// the scope the definition was evaluated in.
pub struct UserFunction {
    pub name: Option<String>,
    pub modifiers: Modifiers,
    pub params: Vec<Param>,
    pub return_types: Vec<TypeName>,
    pub body: Node,
    pub closure: Rc<RefCell<SymbolTable>>,
    pub span: Span,
}

impl UserFunction {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }
}

// closures point back into their defining scope; printing that chain
// would recurse, so keep Debug shallow
impl fmt::Debug for UserFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserFunction({})", self.display_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    Read,
    Write,
    Append,
}

impl FileMode {
    /// Parses an open mode: `r`/`w`/`a` with an optional `b` suffix for
    /// binary access.
    pub fn parse(mode: &str) -> Option<(FileMode, bool)> {
        let parsed = match mode {
            "r" => (FileMode::Read, false),
            "rb" => (FileMode::Read, true),
            "w" => (FileMode::Write, false),
            "wb" => (FileMode::Write, true),
            "a" => (FileMode::Append, false),
            "ab" => (FileMode::Append, true),
            _ => return None,
        };
        Some(parsed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FileMode::Read => "r",
            FileMode::Write => "w",
            FileMode::Append => "a",
        }
    }
}

#[derive(Debug)]
pub struct FileHandle {
    pub path: PathBuf,
    pub mode: FileMode,
    pub binary: bool,
}
