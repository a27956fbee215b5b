use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::source::Position;
use crate::types::{accepts, Modifiers, TypeName};

use super::value::Value;

/// One declared name: its declared type, modifiers and current value.
#[derive(Debug, Clone)]
pub struct Binding {
    pub declared: TypeName,
    pub modifiers: Modifiers,
    pub value: Value,
}

/// A scope: names declared here plus a lookup edge to the enclosing
/// scope. Lookup walks the parent chain; mutation lands in the table
/// where the name was declared.
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: HashMap<String, Binding>,
    parent: Option<Rc<RefCell<SymbolTable>>>,
}

/// Outcome of an assignment through the scope chain.
#[derive(Debug)]
pub enum AssignOutcome {
    Done,
    NotFound,
    Immutable,
    TypeMismatch(TypeName),
}

impl SymbolTable {
    pub fn root() -> Rc<RefCell<SymbolTable>> {
        Rc::new(RefCell::new(SymbolTable::default()))
    }

    pub fn child_of(parent: &Rc<RefCell<SymbolTable>>) -> Rc<RefCell<SymbolTable>> {
        Rc::new(RefCell::new(SymbolTable {
            symbols: HashMap::new(),
            parent: Some(Rc::clone(parent)),
        }))
    }

    /// Binds `name` in this table, shadowing any ancestor binding.
    /// Returns false if the name is already declared here.
    pub fn declare(
        &mut self,
        declared: TypeName,
        name: impl Into<String>,
        value: Value,
        modifiers: Modifiers,
    ) -> bool {
        let name = name.into();
        if self.symbols.contains_key(&name) {
            return false;
        }
        self.symbols.insert(
            name,
            Binding {
                declared,
                modifiers,
                value,
            },
        );
        true
    }

    /// Looks `name` up through the parent chain.
    pub fn get(table: &Rc<RefCell<SymbolTable>>, name: &str) -> Option<Value> {
        let mut current = Rc::clone(table);
        loop {
            if let Some(binding) = current.borrow().symbols.get(name) {
                return Some(binding.value.clone());
            }
            let parent = current.borrow().parent.clone();
            match parent {
                Some(parent) => current = parent,
                None => return None,
            }
        }
    }

    /// Reassigns `name` in the table that declared it, re-checking the
    /// value against the declared type and refusing `fin` bindings.
    pub fn assign(table: &Rc<RefCell<SymbolTable>>, name: &str, value: Value) -> AssignOutcome {
        let mut current = Rc::clone(table);
        loop {
            {
                let mut scope = current.borrow_mut();
                if let Some(binding) = scope.symbols.get_mut(name) {
                    if binding.modifiers.contains(Modifiers::FINAL) {
                        return AssignOutcome::Immutable;
                    }
                    if !accepts(binding.declared, value.kind()) {
                        return AssignOutcome::TypeMismatch(binding.declared);
                    }
                    binding.value = value;
                    return AssignOutcome::Done;
                }
            }
            let parent = current.borrow().parent.clone();
            match parent {
                Some(parent) => current = parent,
                None => return AssignOutcome::NotFound,
            }
        }
    }

    /// The binding for `name` in this table only (no chain walk).
    pub fn binding(&self, name: &str) -> Option<&Binding> {
        self.symbols.get(name)
    }

    /// All bindings visible to importers, i.e. everything not `priv`.
    pub fn exports(&self) -> Vec<(String, Binding)> {
        let mut exports: Vec<_> = self
            .symbols
            .iter()
            .filter(|(_, binding)| !binding.modifiers.contains(Modifiers::PRIVATE))
            .map(|(name, binding)| (name.clone(), binding.clone()))
            .collect();
        exports.sort_by(|a, b| a.0.cmp(&b.0));
        exports
    }
}

/// One function or module invocation, chained to its caller for stack
/// traces. `entry_pos` is the call site in the parent's source.
#[derive(Debug)]
pub struct CallContext {
    pub display_name: String,
    pub parent: Option<Rc<CallContext>>,
    pub entry_pos: Option<Position>,
}

impl CallContext {
    pub fn root(display_name: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            display_name: display_name.into(),
            parent: None,
            entry_pos: None,
        })
    }

    pub fn child(
        parent: &Rc<CallContext>,
        display_name: impl Into<String>,
        entry_pos: Position,
    ) -> Rc<Self> {
        Rc::new(Self {
            display_name: display_name.into(),
            parent: Some(Rc::clone(parent)),
            entry_pos: Some(entry_pos),
        })
    }
}
