pub mod builtins;
pub mod scope;
pub mod value;

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::errors::{ErrorKind, LangError};
use crate::lexer;
use crate::parser::ast::{AssignOp, BinaryOp, Node, NodeKind, UnaryOp};
use crate::parser::Parser;
use crate::source::Span;
use crate::types::{accepts, Modifiers, TypeName};

use scope::{AssignOutcome, CallContext, SymbolTable};
use value::{MapKey, UserFunction, Value};

/// Outcome of evaluating one node. `Return`, `Break` and `Continue`
/// unwind through enclosing nodes until a function body or a loop
/// catches them; errors travel in the `Result` layer.
#[derive(Debug)]
pub enum Flow {
    Value(Value),
    Return(Value),
    Break,
    Continue,
}

/// Unwraps a `Flow::Value`, propagating any other signal to the caller.
macro_rules! value_of {
    ($flow:expr) => {
        match $flow? {
            Flow::Value(value) => value,
            other => return Ok(other),
        }
    };
}

/// The evaluator. Built once per run; the global table is seeded with
/// the language constants and every builtin before any script executes.
pub struct Runtime {
    globals: Rc<RefCell<SymbolTable>>,
    importing: RefCell<Vec<PathBuf>>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    pub fn new() -> Self {
        let globals = SymbolTable::root();
        {
            let mut table = globals.borrow_mut();
            let constant = Modifiers::PUBLIC | Modifiers::FINAL;
            table.declare(TypeName::Bool, "true", Value::Bool(true), constant);
            table.declare(TypeName::Bool, "false", Value::Bool(false), constant);
            table.declare(TypeName::Var, "null", Value::Null, constant);
            table.declare(
                TypeName::Float,
                "PI",
                Value::Float(std::f64::consts::PI),
                constant,
            );
            builtins::install(&mut table);
        }
        Self {
            globals,
            importing: RefCell::new(Vec::new()),
        }
    }

    pub fn globals(&self) -> &Rc<RefCell<SymbolTable>> {
        &self.globals
    }

    /// Runs a script, returning the value of its last top-level
    /// statement.
    pub fn run(&self, filename: &str, source: &str) -> Result<Value, LangError> {
        self.run_internal(filename, source, false)
            .map(|(value, _)| value)
    }

    /// Like [`Runtime::run`] but also returns the populated module
    /// scope; with `symbols_only` set, top-level statements other than
    /// declarations are skipped.
    pub fn run_internal(
        &self,
        filename: &str,
        source: &str,
        symbols_only: bool,
    ) -> Result<(Value, Rc<RefCell<SymbolTable>>), LangError> {
        self.execute(filename, source, symbols_only, CallContext::root("<module>"))
    }

    fn execute(
        &self,
        filename: &str,
        source: &str,
        symbols_only: bool,
        context: Rc<CallContext>,
    ) -> Result<(Value, Rc<RefCell<SymbolTable>>), LangError> {
        tracing::debug!(file = filename, symbols_only, "running script");
        let tokens = lexer::lex(filename, source)?;
        let program = Parser::new(tokens).parse_program()?;
        let scope = SymbolTable::child_of(&self.globals);

        let NodeKind::Block(statements) = &program.kind else {
            return Ok((Value::Void, scope));
        };
        let mut last = Value::Void;
        for statement in statements {
            if symbols_only && !is_declaration(statement) {
                continue;
            }
            match self.eval(statement, &scope, &context)? {
                Flow::Value(value) => last = value,
                Flow::Return(_) => {
                    return Err(self.error(
                        &statement.span,
                        &context,
                        ErrorKind::UnsupportedOperation,
                        "'return' outside of a function",
                    ));
                }
                Flow::Break => {
                    return Err(self.error(
                        &statement.span,
                        &context,
                        ErrorKind::UnsupportedOperation,
                        "'break' outside of a loop",
                    ));
                }
                Flow::Continue => {
                    return Err(self.error(
                        &statement.span,
                        &context,
                        ErrorKind::UnsupportedOperation,
                        "'continue' outside of a loop",
                    ));
                }
            }
        }
        Ok((last, scope))
    }

    fn eval(
        &self,
        node: &Node,
        scope: &Rc<RefCell<SymbolTable>>,
        context: &Rc<CallContext>,
    ) -> Result<Flow, LangError> {
        match &node.kind {
            NodeKind::Int(value) => Ok(Flow::Value(Value::Int(*value))),
            NodeKind::Float(value) => Ok(Flow::Value(Value::Float(*value))),
            NodeKind::Str(value) => Ok(Flow::Value(Value::Str(value.clone()))),
            NodeKind::VarAccess(name) => match SymbolTable::get(scope, name) {
                Some(value) => Ok(Flow::Value(value)),
                None => Err(self.error(
                    &node.span,
                    context,
                    ErrorKind::UnsupportedOperation,
                    format!("'{}' is not defined", name),
                )),
            },
            NodeKind::VarDeclare {
                modifiers,
                declared,
                name,
                init,
            } => self.eval_declare(node, *modifiers, *declared, name, init.as_deref(), scope, context),
            NodeKind::VarAssign { name, op, value } => {
                self.eval_assign(node, name, *op, value, scope, context)
            }
            NodeKind::Unary { op, operand } => {
                let value = value_of!(self.eval(operand, scope, context));
                self.apply_unary(node, context, *op, value).map(Flow::Value)
            }
            NodeKind::Binary { lhs, op, rhs } => {
                if matches!(op, BinaryOp::And | BinaryOp::Or) {
                    return self.eval_logical(lhs, *op, rhs, scope, context);
                }
                let left = value_of!(self.eval(lhs, scope, context));
                let right = value_of!(self.eval(rhs, scope, context));
                self.apply_binary(&node.span, context, *op, left, right)
                    .map(Flow::Value)
            }
            NodeKind::Ternary {
                condition,
                then,
                otherwise,
            } => {
                let chosen = if self.eval_condition(condition, scope, context)? {
                    then
                } else {
                    otherwise
                };
                self.eval(chosen, scope, context)
            }
            NodeKind::ListLiteral(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(value_of!(self.eval(item, scope, context)));
                }
                Ok(Flow::Value(Value::list(values)))
            }
            NodeKind::MapLiteral(entries) => {
                let mut map = HashMap::new();
                for (key_node, value_node) in entries {
                    let key_value = value_of!(self.eval(key_node, scope, context));
                    let Some(key) = MapKey::from_value(&key_value) else {
                        return Err(self.error(
                            &key_node.span,
                            context,
                            ErrorKind::UnsupportedOperation,
                            format!("cannot use '{}' as a map key", key_value.type_name()),
                        ));
                    };
                    let value = value_of!(self.eval(value_node, scope, context));
                    map.insert(key, value);
                }
                Ok(Flow::Value(Value::map(map)))
            }
            NodeKind::Index { target, index } => {
                let target_value = value_of!(self.eval(target, scope, context));
                let index_value = value_of!(self.eval(index, scope, context));
                self.index_value(node, context, target_value, index_value)
                    .map(Flow::Value)
            }
            NodeKind::SetIndex {
                target,
                index,
                value,
            } => self.eval_set_index(node, target, index, value, scope, context),
            NodeKind::Member { target, name } => {
                let target_value = value_of!(self.eval(target, scope, context));
                match target_value {
                    Value::Map(entries) => {
                        let key = MapKey::Str(name.clone());
                        match entries.borrow().get(&key) {
                            Some(value) => Ok(Flow::Value(value.clone())),
                            None => Err(self.error(
                                &node.span,
                                context,
                                ErrorKind::IndexOutOfBounds,
                                format!("key \"{}\" not found in map", name),
                            )),
                        }
                    }
                    other => Err(self.error(
                        &node.span,
                        context,
                        ErrorKind::UnsupportedOperation,
                        format!("type '{}' has no members", other.type_name()),
                    )),
                }
            }
            NodeKind::Call { callee, args } => {
                let callee_value = value_of!(self.eval(callee, scope, context));
                let mut arg_values = Vec::with_capacity(args.len());
                for arg in args {
                    arg_values.push(value_of!(self.eval(arg, scope, context)));
                }
                match callee_value {
                    Value::Function(func) => self
                        .call_function(node, &func, arg_values, context)
                        .map(Flow::Value),
                    Value::Builtin(builtin) => {
                        tracing::trace!(name = builtin.name, "builtin call");
                        builtin
                            .call(&arg_values, &node.span)
                            .map(Flow::Value)
                            .map_err(|err| err.contextualize(context))
                    }
                    other => Err(self.error(
                        &node.span,
                        context,
                        ErrorKind::UnsupportedOperation,
                        format!("type '{}' is not callable", other.type_name()),
                    )),
                }
            }
            NodeKind::FuncDef {
                name,
                modifiers,
                params,
                return_types,
                body,
            } => {
                let func = Rc::new(UserFunction {
                    name: name.clone(),
                    modifiers: *modifiers,
                    params: params.clone(),
                    return_types: return_types.clone(),
                    body: (**body).clone(),
                    closure: Rc::clone(scope),
                    span: node.span.clone(),
                });
                let value = Value::Function(func);
                if let Some(name) = name {
                    let declared = visible(*modifiers);
                    if !scope.borrow_mut().declare(
                        TypeName::Function,
                        name.clone(),
                        value.clone(),
                        declared,
                    ) {
                        return Err(self.error(
                            &node.span,
                            context,
                            ErrorKind::UnsupportedOperation,
                            format!("'{}' is already declared in this scope", name),
                        ));
                    }
                }
                Ok(Flow::Value(value))
            }
            NodeKind::Conditional { cases, otherwise } => {
                for (condition, body) in cases {
                    if self.eval_condition(condition, scope, context)? {
                        return self.eval(body, scope, context);
                    }
                }
                match otherwise {
                    Some(body) => self.eval(body, scope, context),
                    None => Ok(Flow::Value(Value::Void)),
                }
            }
            NodeKind::While { condition, body } => {
                while self.eval_condition(condition, scope, context)? {
                    match self.eval(body, scope, context)? {
                        Flow::Value(_) | Flow::Continue => {}
                        Flow::Break => break,
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                Ok(Flow::Value(Value::Void))
            }
            NodeKind::For {
                declared,
                name,
                start,
                end,
                step,
                body,
            } => self.eval_for(
                node,
                *declared,
                name,
                start,
                end,
                step.as_deref(),
                body,
                scope,
                context,
            ),
            NodeKind::Switch {
                subject,
                cases,
                default,
            } => {
                let subject_value = value_of!(self.eval(subject, scope, context));
                for (case_value_node, case_body) in cases {
                    let case_value = value_of!(self.eval(case_value_node, scope, context));
                    if subject_value.equals(&case_value) {
                        return self.eval_case(case_body, scope, context);
                    }
                }
                match default {
                    Some(case_body) => self.eval_case(case_body, scope, context),
                    None => Ok(Flow::Value(Value::Void)),
                }
            }
            NodeKind::Return(value) => {
                let result = match value {
                    Some(expr) => value_of!(self.eval(expr, scope, context)),
                    None => Value::Void,
                };
                Ok(Flow::Return(result))
            }
            NodeKind::Break => Ok(Flow::Break),
            NodeKind::Continue => Ok(Flow::Continue),
            NodeKind::Import { path, alias, names } => {
                self.eval_import(node, path, alias.as_deref(), names.as_deref(), scope, context)
            }
            NodeKind::Block(statements) => {
                let inner = SymbolTable::child_of(scope);
                let mut last = Value::Void;
                for statement in statements {
                    match self.eval(statement, &inner, context)? {
                        Flow::Value(value) => last = value,
                        other => return Ok(other),
                    }
                }
                Ok(Flow::Value(last))
            }
        }
    }

    fn eval_condition(
        &self,
        condition: &Node,
        scope: &Rc<RefCell<SymbolTable>>,
        context: &Rc<CallContext>,
    ) -> Result<bool, LangError> {
        match self.eval(condition, scope, context)? {
            Flow::Value(Value::Bool(flag)) => Ok(flag),
            Flow::Value(other) => Err(self.error(
                &condition.span,
                context,
                ErrorKind::UnsupportedOperation,
                format!("condition must be 'bool', found '{}'", other.type_name()),
            )),
            // conditions are expressions; no flow signal can escape one
            _ => Err(self.error(
                &condition.span,
                context,
                ErrorKind::UnsupportedOperation,
                "condition must be 'bool'",
            )),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn eval_declare(
        &self,
        node: &Node,
        modifiers: Modifiers,
        declared: TypeName,
        name: &str,
        init: Option<&Node>,
        scope: &Rc<RefCell<SymbolTable>>,
        context: &Rc<CallContext>,
    ) -> Result<Flow, LangError> {
        let value = match init {
            Some(expr) => value_of!(self.eval(expr, scope, context)),
            None => Value::Null,
        };
        if init.is_some() && !accepts(declared, value.kind()) {
            return Err(self.error(
                &node.span,
                context,
                ErrorKind::UnsupportedOperation,
                format!(
                    "cannot assign value of type '{}' to '{}' variable '{}'",
                    value.type_name(),
                    declared.as_str(),
                    name
                ),
            ));
        }
        if !scope
            .borrow_mut()
            .declare(declared, name, value.clone(), visible(modifiers))
        {
            return Err(self.error(
                &node.span,
                context,
                ErrorKind::UnsupportedOperation,
                format!("'{}' is already declared in this scope", name),
            ));
        }
        Ok(Flow::Value(value))
    }

    fn eval_assign(
        &self,
        node: &Node,
        name: &str,
        op: AssignOp,
        value_node: &Node,
        scope: &Rc<RefCell<SymbolTable>>,
        context: &Rc<CallContext>,
    ) -> Result<Flow, LangError> {
        let mut value = value_of!(self.eval(value_node, scope, context));
        if let Some(binary) = op.binary() {
            let Some(current) = SymbolTable::get(scope, name) else {
                return Err(self.error(
                    &node.span,
                    context,
                    ErrorKind::UnsupportedOperation,
                    format!("'{}' is not defined", name),
                ));
            };
            value = self.apply_binary(&node.span, context, binary, current, value)?;
        }
        match SymbolTable::assign(scope, name, value.clone()) {
            AssignOutcome::Done => Ok(Flow::Value(value)),
            AssignOutcome::NotFound => Err(self.error(
                &node.span,
                context,
                ErrorKind::UnsupportedOperation,
                format!("'{}' is not defined", name),
            )),
            AssignOutcome::Immutable => Err(self.error(
                &node.span,
                context,
                ErrorKind::UnsupportedOperation,
                format!("cannot reassign final variable '{}'", name),
            )),
            AssignOutcome::TypeMismatch(declared) => Err(self.error(
                &node.span,
                context,
                ErrorKind::UnsupportedOperation,
                format!(
                    "cannot assign value of type '{}' to '{}' variable '{}'",
                    value.type_name(),
                    declared.as_str(),
                    name
                ),
            )),
        }
    }

    fn eval_logical(
        &self,
        lhs: &Node,
        op: BinaryOp,
        rhs: &Node,
        scope: &Rc<RefCell<SymbolTable>>,
        context: &Rc<CallContext>,
    ) -> Result<Flow, LangError> {
        let left = value_of!(self.eval(lhs, scope, context));
        let Value::Bool(l) = left else {
            return Err(self.error(
                &lhs.span,
                context,
                ErrorKind::UnsupportedOperation,
                format!(
                    "operator '{}' expects 'bool' operands, found '{}'",
                    op.symbol(),
                    left.type_name()
                ),
            ));
        };
        // short-circuit: the right operand only runs when it decides
        match (op, l) {
            (BinaryOp::And, false) => return Ok(Flow::Value(Value::Bool(false))),
            (BinaryOp::Or, true) => return Ok(Flow::Value(Value::Bool(true))),
            _ => {}
        }
        let right = value_of!(self.eval(rhs, scope, context));
        let Value::Bool(r) = right else {
            return Err(self.error(
                &rhs.span,
                context,
                ErrorKind::UnsupportedOperation,
                format!(
                    "operator '{}' expects 'bool' operands, found '{}'",
                    op.symbol(),
                    right.type_name()
                ),
            ));
        };
        Ok(Flow::Value(Value::Bool(r)))
    }

    fn apply_unary(
        &self,
        node: &Node,
        context: &Rc<CallContext>,
        op: UnaryOp,
        value: Value,
    ) -> Result<Value, LangError> {
        match op {
            UnaryOp::Negate => match &value {
                Value::Int(v) => v.checked_neg().map(Value::Int).ok_or_else(|| {
                    self.error(
                        &node.span,
                        context,
                        ErrorKind::UnsupportedOperation,
                        "integer overflow in '-'",
                    )
                }),
                Value::Byte(v) => Ok(Value::Int(-(*v as i32))),
                Value::Float(v) => Ok(Value::Float(-v)),
                other => Err(self.error(
                    &node.span,
                    context,
                    ErrorKind::UnsupportedOperation,
                    format!("operator '-' does not support '{}'", other.type_name()),
                )),
            },
            UnaryOp::Not => match &value {
                Value::Bool(v) => Ok(Value::Bool(!v)),
                other => Err(self.error(
                    &node.span,
                    context,
                    ErrorKind::UnsupportedOperation,
                    format!("operator '!' does not support '{}'", other.type_name()),
                )),
            },
        }
    }

    fn apply_binary(
        &self,
        span: &Span,
        context: &Rc<CallContext>,
        op: BinaryOp,
        lhs: Value,
        rhs: Value,
    ) -> Result<Value, LangError> {
        match op {
            BinaryOp::Add => match (lhs, rhs) {
                (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b))),
                // list + value yields a copy with the value appended
                (Value::List(items), value) => {
                    let mut copy = items.borrow().clone();
                    copy.push(value);
                    Ok(Value::list(copy))
                }
                (a, b) => self.arithmetic(span, context, "+", a, b, i32::checked_add, |x, y| x + y),
            },
            BinaryOp::Sub => {
                self.arithmetic(span, context, "-", lhs, rhs, i32::checked_sub, |x, y| x - y)
            }
            BinaryOp::Mul => {
                self.arithmetic(span, context, "*", lhs, rhs, i32::checked_mul, |x, y| x * y)
            }
            BinaryOp::Div => {
                if matches!(rhs.as_i32(), Some(0)) {
                    return Err(self.error(
                        span,
                        context,
                        ErrorKind::UnsupportedOperation,
                        "division by zero",
                    ));
                }
                self.arithmetic(span, context, "/", lhs, rhs, i32::checked_div, |x, y| x / y)
            }
            BinaryOp::Mod => {
                if matches!(rhs.as_i32(), Some(0)) {
                    return Err(self.error(
                        span,
                        context,
                        ErrorKind::UnsupportedOperation,
                        "modulo by zero",
                    ));
                }
                self.arithmetic(span, context, "%", lhs, rhs, i32::checked_rem, |x, y| x % y)
            }
            BinaryOp::Pow => self.power(span, context, lhs, rhs),
            BinaryOp::Equal => Ok(Value::Bool(lhs.equals(&rhs))),
            BinaryOp::NotEqual => Ok(Value::Bool(!lhs.equals(&rhs))),
            BinaryOp::Less => self.comparison(span, context, "<", lhs, rhs, |a, b| a < b),
            BinaryOp::LessEqual => self.comparison(span, context, "<=", lhs, rhs, |a, b| a <= b),
            BinaryOp::Greater => self.comparison(span, context, ">", lhs, rhs, |a, b| a > b),
            BinaryOp::GreaterEqual => {
                self.comparison(span, context, ">=", lhs, rhs, |a, b| a >= b)
            }
            // handled by eval_logical; compound assignment cannot name them
            BinaryOp::And | BinaryOp::Or => Err(self.unsupported_pair(
                span,
                context,
                op.symbol(),
                &lhs,
                &rhs,
            )),
        }
    }

    /// Int/byte pairs stay in 32-bit arithmetic; any float operand
    /// widens the result to float.
    fn arithmetic(
        &self,
        span: &Span,
        context: &Rc<CallContext>,
        symbol: &str,
        lhs: Value,
        rhs: Value,
        int_op: fn(i32, i32) -> Option<i32>,
        float_op: fn(f64, f64) -> f64,
    ) -> Result<Value, LangError> {
        if let (Some(a), Some(b)) = (lhs.as_i32(), rhs.as_i32()) {
            return int_op(a, b).map(Value::Int).ok_or_else(|| {
                self.error(
                    span,
                    context,
                    ErrorKind::UnsupportedOperation,
                    format!("integer overflow in '{}'", symbol),
                )
            });
        }
        match (lhs.as_f64(), rhs.as_f64()) {
            (Some(a), Some(b)) => Ok(Value::Float(float_op(a, b))),
            _ => Err(self.unsupported_pair(span, context, symbol, &lhs, &rhs)),
        }
    }

    fn power(
        &self,
        span: &Span,
        context: &Rc<CallContext>,
        lhs: Value,
        rhs: Value,
    ) -> Result<Value, LangError> {
        if let (Some(base), Some(exp)) = (lhs.as_i32(), rhs.as_i32()) {
            if exp >= 0 {
                return base.checked_pow(exp as u32).map(Value::Int).ok_or_else(|| {
                    self.error(
                        span,
                        context,
                        ErrorKind::UnsupportedOperation,
                        "integer overflow in '^'",
                    )
                });
            }
            return Ok(Value::Float((base as f64).powi(exp)));
        }
        match (lhs.as_f64(), rhs.as_f64()) {
            (Some(a), Some(b)) => Ok(Value::Float(a.powf(b))),
            _ => Err(self.unsupported_pair(span, context, "^", &lhs, &rhs)),
        }
    }

    fn comparison(
        &self,
        span: &Span,
        context: &Rc<CallContext>,
        symbol: &str,
        lhs: Value,
        rhs: Value,
        cmp: fn(f64, f64) -> bool,
    ) -> Result<Value, LangError> {
        match (lhs.as_f64(), rhs.as_f64()) {
            (Some(a), Some(b)) => Ok(Value::Bool(cmp(a, b))),
            _ => Err(self.unsupported_pair(span, context, symbol, &lhs, &rhs)),
        }
    }

    fn index_value(
        &self,
        node: &Node,
        context: &Rc<CallContext>,
        target: Value,
        index: Value,
    ) -> Result<Value, LangError> {
        match &target {
            Value::List(items) => {
                let items = items.borrow();
                let i = self.list_index(node, context, &index, items.len(), "list")?;
                Ok(items[i].clone())
            }
            Value::Str(text) => {
                let length = text.chars().count();
                let i = self.list_index(node, context, &index, length, "string")?;
                match text.chars().nth(i) {
                    Some(c) => Ok(Value::Str(c.to_string())),
                    None => Ok(Value::Null),
                }
            }
            Value::Map(entries) => {
                let Some(key) = MapKey::from_value(&index) else {
                    return Err(self.error(
                        &node.span,
                        context,
                        ErrorKind::UnsupportedOperation,
                        format!("cannot use '{}' as a map key", index.type_name()),
                    ));
                };
                match entries.borrow().get(&key) {
                    Some(value) => Ok(value.clone()),
                    None => Err(self.error(
                        &node.span,
                        context,
                        ErrorKind::IndexOutOfBounds,
                        format!("key {} not found in map", key),
                    )),
                }
            }
            other => Err(self.error(
                &node.span,
                context,
                ErrorKind::UnsupportedOperation,
                format!("type '{}' is not indexable", other.type_name()),
            )),
        }
    }

    fn list_index(
        &self,
        node: &Node,
        context: &Rc<CallContext>,
        index: &Value,
        length: usize,
        what: &str,
    ) -> Result<usize, LangError> {
        let Some(i) = index.as_i32() else {
            return Err(self.error(
                &node.span,
                context,
                ErrorKind::UnsupportedOperation,
                format!("{} indices must be 'int', found '{}'", what, index.type_name()),
            ));
        };
        if i < 0 || i as usize >= length {
            return Err(self.error(
                &node.span,
                context,
                ErrorKind::IndexOutOfBounds,
                format!("index {} out of bounds for {} of length {}", i, what, length),
            ));
        }
        Ok(i as usize)
    }

    #[allow(clippy::too_many_arguments)]
    fn eval_set_index(
        &self,
        node: &Node,
        target: &Node,
        index: &Node,
        value: &Node,
        scope: &Rc<RefCell<SymbolTable>>,
        context: &Rc<CallContext>,
    ) -> Result<Flow, LangError> {
        let target_value = value_of!(self.eval(target, scope, context));
        let index_value = value_of!(self.eval(index, scope, context));
        let new_value = value_of!(self.eval(value, scope, context));
        match &target_value {
            Value::List(items) => {
                let length = items.borrow().len();
                let i = self.list_index(node, context, &index_value, length, "list")?;
                items.borrow_mut()[i] = new_value.clone();
                Ok(Flow::Value(new_value))
            }
            Value::Map(entries) => {
                let Some(key) = MapKey::from_value(&index_value) else {
                    return Err(self.error(
                        &node.span,
                        context,
                        ErrorKind::UnsupportedOperation,
                        format!("cannot use '{}' as a map key", index_value.type_name()),
                    ));
                };
                entries.borrow_mut().insert(key, new_value.clone());
                Ok(Flow::Value(new_value))
            }
            other => Err(self.error(
                &node.span,
                context,
                ErrorKind::UnsupportedOperation,
                format!("type '{}' is not index-assignable", other.type_name()),
            )),
        }
    }

    fn call_function(
        &self,
        node: &Node,
        func: &Rc<UserFunction>,
        args: Vec<Value>,
        context: &Rc<CallContext>,
    ) -> Result<Value, LangError> {
        tracing::trace!(function = func.display_name(), args = args.len(), "call");
        if args.len() != func.params.len() {
            return Err(self.error(
                &node.span,
                context,
                ErrorKind::Argument,
                format!(
                    "'{}' expects {} argument(s), found {}",
                    func.display_name(),
                    func.params.len(),
                    args.len()
                ),
            ));
        }

        // the call scope hangs off the defining scope, not the caller's
        let call_scope = SymbolTable::child_of(&func.closure);
        {
            let mut table = call_scope.borrow_mut();
            for (param, value) in func.params.iter().zip(args) {
                if !accepts(param.declared, value.kind()) {
                    return Err(self.error(
                        &node.span,
                        context,
                        ErrorKind::Argument,
                        format!(
                            "parameter '{}' of '{}' expects '{}', found '{}'",
                            param.name,
                            func.display_name(),
                            param.declared.as_str(),
                            value.type_name()
                        ),
                    ));
                }
                if !table.declare(param.declared, param.name.clone(), value, Modifiers::PUBLIC) {
                    return Err(self.error(
                        &node.span,
                        context,
                        ErrorKind::Argument,
                        format!(
                            "duplicate parameter '{}' in '{}'",
                            param.name,
                            func.display_name()
                        ),
                    ));
                }
            }
        }

        let call_context =
            CallContext::child(context, func.display_name(), node.span.start.clone());
        let result = match self.eval(&func.body, &call_scope, &call_context)? {
            Flow::Return(value) => value,
            Flow::Value(_) => Value::Void,
            Flow::Break => {
                return Err(self.error(
                    &func.body.span,
                    &call_context,
                    ErrorKind::UnsupportedOperation,
                    "'break' outside of a loop",
                ));
            }
            Flow::Continue => {
                return Err(self.error(
                    &func.body.span,
                    &call_context,
                    ErrorKind::UnsupportedOperation,
                    "'continue' outside of a loop",
                ));
            }
        };

        if !func.return_types.is_empty()
            && !func
                .return_types
                .iter()
                .any(|declared| accepts(*declared, result.kind()))
        {
            let expected = func
                .return_types
                .iter()
                .map(|t| t.as_str())
                .collect::<Vec<_>>()
                .join(" | ");
            return Err(self.error(
                &node.span,
                &call_context,
                ErrorKind::UnsupportedOperation,
                format!(
                    "'{}' must return '{}', found '{}'",
                    func.display_name(),
                    expected,
                    result.type_name()
                ),
            ));
        }
        Ok(result)
    }

    #[allow(clippy::too_many_arguments)]
    fn eval_for(
        &self,
        node: &Node,
        declared: TypeName,
        name: &str,
        start: &Node,
        end: &Node,
        step: Option<&Node>,
        body: &Node,
        scope: &Rc<RefCell<SymbolTable>>,
        context: &Rc<CallContext>,
    ) -> Result<Flow, LangError> {
        let mut current = value_of!(self.eval(start, scope, context));
        let end_value = value_of!(self.eval(end, scope, context));
        let step_value = match step {
            Some(expr) => value_of!(self.eval(expr, scope, context)),
            None => Value::Int(1),
        };

        if !accepts(declared, current.kind()) {
            return Err(self.error(
                &start.span,
                context,
                ErrorKind::UnsupportedOperation,
                format!(
                    "cannot assign value of type '{}' to '{}' variable '{}'",
                    current.type_name(),
                    declared.as_str(),
                    name
                ),
            ));
        }
        let (Some(_), Some(end_f), Some(step_f)) = (
            current.as_f64(),
            end_value.as_f64(),
            step_value.as_f64(),
        ) else {
            return Err(self.error(
                &node.span,
                context,
                ErrorKind::UnsupportedOperation,
                "loop bounds must be numeric",
            ));
        };

        let loop_scope = SymbolTable::child_of(scope);
        loop_scope
            .borrow_mut()
            .declare(declared, name, current.clone(), Modifiers::PUBLIC);

        loop {
            let Some(current_f) = current.as_f64() else {
                break;
            };
            let proceed = if step_f >= 0.0 {
                current_f < end_f
            } else {
                current_f > end_f
            };
            if !proceed {
                break;
            }

            match self.eval(body, &loop_scope, context)? {
                Flow::Value(_) | Flow::Continue => {}
                Flow::Break => break,
                flow @ Flow::Return(_) => return Ok(flow),
            }

            // the body may have reassigned the loop variable
            current = SymbolTable::get(&loop_scope, name).unwrap_or(Value::Null);
            current = self.apply_binary(
                &node.span,
                context,
                BinaryOp::Add,
                current,
                step_value.clone(),
            )?;
            match SymbolTable::assign(&loop_scope, name, current.clone()) {
                AssignOutcome::Done => {}
                AssignOutcome::TypeMismatch(declared) => {
                    return Err(self.error(
                        &node.span,
                        context,
                        ErrorKind::UnsupportedOperation,
                        format!(
                            "cannot assign value of type '{}' to '{}' variable '{}'",
                            current.type_name(),
                            declared.as_str(),
                            name
                        ),
                    ));
                }
                _ => break,
            }
        }
        Ok(Flow::Value(Value::Void))
    }

    fn eval_case(
        &self,
        statements: &[Node],
        scope: &Rc<RefCell<SymbolTable>>,
        context: &Rc<CallContext>,
    ) -> Result<Flow, LangError> {
        let inner = SymbolTable::child_of(scope);
        for statement in statements {
            match self.eval(statement, &inner, context)? {
                Flow::Value(_) => {}
                // `break` exits the switch; anything else keeps unwinding
                Flow::Break => return Ok(Flow::Value(Value::Void)),
                other => return Ok(other),
            }
        }
        Ok(Flow::Value(Value::Void))
    }

    fn eval_import(
        &self,
        node: &Node,
        path: &str,
        alias: Option<&str>,
        names: Option<&[String]>,
        scope: &Rc<RefCell<SymbolTable>>,
        context: &Rc<CallContext>,
    ) -> Result<Flow, LangError> {
        let importer = Path::new(node.span.start.source.filename.as_str());
        let resolved = importer.parent().unwrap_or(Path::new("")).join(path);
        tracing::debug!(path = %resolved.display(), "importing module");

        let guard_key = fs::canonicalize(&resolved).unwrap_or_else(|_| resolved.clone());
        if self.importing.borrow().contains(&guard_key) {
            return Err(self.error(
                &node.span,
                context,
                ErrorKind::Import,
                format!("circular import of '{}'", path),
            ));
        }

        let text = fs::read_to_string(&resolved).map_err(|err| {
            self.error(
                &node.span,
                context,
                ErrorKind::Import,
                format!("cannot read module '{}': {}", path, err),
            )
        })?;

        self.importing.borrow_mut().push(guard_key);
        let outcome = self.execute(
            &resolved.to_string_lossy(),
            &text,
            false,
            CallContext::child(context, format!("<module '{}'>", path), node.span.start.clone()),
        );
        self.importing.borrow_mut().pop();
        let (_, module_scope) = outcome?;

        let module = module_scope.borrow();
        match names {
            Some(names) => {
                for name in names {
                    let Some(binding) = module.binding(name) else {
                        return Err(self.error(
                            &node.span,
                            context,
                            ErrorKind::Import,
                            format!("module '{}' has no symbol '{}'", path, name),
                        ));
                    };
                    if binding.modifiers.contains(Modifiers::PRIVATE) {
                        return Err(self.error(
                            &node.span,
                            context,
                            ErrorKind::IllegalAccess,
                            format!("'{}' is private to module '{}'", name, path),
                        ));
                    }
                    self.bind_import(node, context, scope, binding.declared, name, binding)?;
                }
            }
            None => match alias {
                Some(alias) => {
                    let entries = module
                        .exports()
                        .into_iter()
                        .map(|(name, binding)| (MapKey::Str(name), binding.value))
                        .collect();
                    if !scope.borrow_mut().declare(
                        TypeName::Map,
                        alias,
                        Value::map(entries),
                        Modifiers::PUBLIC | Modifiers::FINAL,
                    ) {
                        return Err(self.error(
                            &node.span,
                            context,
                            ErrorKind::UnsupportedOperation,
                            format!("'{}' is already declared in this scope", alias),
                        ));
                    }
                }
                None => {
                    for (name, binding) in module.exports() {
                        self.bind_import(node, context, scope, binding.declared, &name, &binding)?;
                    }
                }
            },
        }
        Ok(Flow::Value(Value::Void))
    }

    fn bind_import(
        &self,
        node: &Node,
        context: &Rc<CallContext>,
        scope: &Rc<RefCell<SymbolTable>>,
        declared: TypeName,
        name: &str,
        binding: &scope::Binding,
    ) -> Result<(), LangError> {
        if !scope
            .borrow_mut()
            .declare(declared, name, binding.value.clone(), binding.modifiers)
        {
            return Err(self.error(
                &node.span,
                context,
                ErrorKind::UnsupportedOperation,
                format!("'{}' is already declared in this scope", name),
            ));
        }
        Ok(())
    }

    fn unsupported_pair(
        &self,
        span: &Span,
        context: &Rc<CallContext>,
        symbol: &str,
        lhs: &Value,
        rhs: &Value,
    ) -> LangError {
        self.error(
            span,
            context,
            ErrorKind::UnsupportedOperation,
            format!(
                "operator '{}' does not support '{}' and '{}'",
                symbol,
                lhs.type_name(),
                rhs.type_name()
            ),
        )
    }

    fn error(
        &self,
        span: &Span,
        context: &Rc<CallContext>,
        kind: ErrorKind,
        details: impl Into<String>,
    ) -> LangError {
        LangError::with_context(kind, details, span.clone(), Rc::clone(context))
    }
}

fn is_declaration(node: &Node) -> bool {
    matches!(
        node.kind,
        NodeKind::VarDeclare { .. } | NodeKind::FuncDef { .. } | NodeKind::Import { .. }
    )
}

/// Bindings default to public unless declared `priv`.
fn visible(modifiers: Modifiers) -> Modifiers {
    if modifiers.contains(Modifiers::PRIVATE) {
        modifiers
    } else {
        modifiers | Modifiers::PUBLIC
    }
}
