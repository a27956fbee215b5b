pub mod errors;
pub mod lexer;
pub mod parser;
pub mod runtime;
pub mod source;
pub mod types;

use std::cell::RefCell;
use std::rc::Rc;

use errors::LangError;
use runtime::scope::SymbolTable;
use runtime::value::Value;
use runtime::Runtime;

/// Runs a script in a fresh runtime, returning the value of its last
/// top-level statement.
pub fn run(filename: &str, source: &str) -> Result<Value, LangError> {
    Runtime::new().run(filename, source)
}

/// Like [`run`], but also returns the populated module scope. With
/// `symbols_only` set, top-level statements other than declarations are
/// skipped.
pub fn run_internal(
    filename: &str,
    source: &str,
    symbols_only: bool,
) -> Result<(Value, Rc<RefCell<SymbolTable>>), LangError> {
    Runtime::new().run_internal(filename, source, symbols_only)
}
