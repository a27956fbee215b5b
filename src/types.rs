use std::fmt;

use bitflags::bitflags;

/// A type name as it can be written in a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeName {
    Int,
    Float,
    Num,
    Bool,
    Str,
    Byte,
    List,
    Map,
    Function,
    File,
    Void,
    Var,
    Const,
}

impl TypeName {
    pub fn as_str(self) -> &'static str {
        match self {
            TypeName::Int => "int",
            TypeName::Float => "float",
            TypeName::Num => "num",
            TypeName::Bool => "bool",
            TypeName::Str => "str",
            TypeName::Byte => "byte",
            TypeName::List => "list",
            TypeName::Map => "map",
            TypeName::Function => "function",
            TypeName::File => "file",
            TypeName::Void => "void",
            TypeName::Var => "var",
            TypeName::Const => "const",
        }
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The concrete variant of a runtime value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Int,
    Float,
    Bool,
    Str,
    Byte,
    List,
    Map,
    Function,
    File,
    Null,
    Void,
}

impl ValueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Bool => "bool",
            ValueKind::Str => "str",
            ValueKind::Byte => "byte",
            ValueKind::List => "list",
            ValueKind::Map => "map",
            ValueKind::Function => "function",
            ValueKind::File => "file",
            ValueKind::Null => "null",
            ValueKind::Void => "void",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The compatibility table: whether a value of concrete `kind` may live
/// in a slot declared as `declared`. Ints widen to float, never the
/// reverse; `var`/`const` accept everything; `null` only fits untyped
/// slots. The same table governs declarations, assignments, parameter
/// binding and builtin overload resolution.
pub fn accepts(declared: TypeName, kind: ValueKind) -> bool {
    if matches!(declared, TypeName::Var | TypeName::Const) {
        return true;
    }
    match kind {
        ValueKind::Int => matches!(declared, TypeName::Int | TypeName::Float | TypeName::Num),
        ValueKind::Byte => matches!(
            declared,
            TypeName::Byte | TypeName::Int | TypeName::Float | TypeName::Num
        ),
        ValueKind::Float => matches!(declared, TypeName::Float | TypeName::Num),
        ValueKind::Bool => declared == TypeName::Bool,
        ValueKind::Str => declared == TypeName::Str,
        ValueKind::List => declared == TypeName::List,
        ValueKind::Map => declared == TypeName::Map,
        ValueKind::Function => declared == TypeName::Function,
        ValueKind::File => declared == TypeName::File,
        ValueKind::Void => declared == TypeName::Void,
        ValueKind::Null => false,
    }
}

bitflags! {
    /// Declaration modifiers. `FINAL` forbids reassignment, `PRIVATE`
    /// hides a binding from importers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Modifiers: u8 {
        const PUBLIC = 1;
        const PRIVATE = 1 << 1;
        const STATIC = 1 << 2;
        const FINAL = 1 << 3;
    }
}
