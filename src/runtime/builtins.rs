use std::fmt;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::rc::Rc;

use crate::errors::{ErrorKind, LangError};
use crate::source::Span;
use crate::types::{accepts, Modifiers, TypeName};

use super::scope::SymbolTable;
use super::value::{FileHandle, FileMode, MapKey, Value};

type BuiltinFn = fn(&BuiltinCall) -> Result<Value, LangError>;

/// One resolved builtin invocation: which signature alternative
/// matched, the bound arguments and the call site.
pub struct BuiltinCall<'a> {
    pub overload: usize,
    pub args: &'a [Value],
    pub span: &'a Span,
}

/// A builtin function: an ordered list of argument-signature
/// alternatives and a single implementation that branches on which
/// alternative was selected.
pub struct Builtin {
    pub name: &'static str,
    pub signatures: &'static [&'static [(TypeName, &'static str)]],
    run: BuiltinFn,
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Builtin({})", self.name)
    }
}

impl Builtin {
    /// The first alternative whose arity matches and whose declared
    /// types accept every argument's concrete variant.
    pub fn resolve(&self, args: &[Value]) -> Option<usize> {
        self.signatures.iter().position(|signature| {
            signature.len() == args.len()
                && signature
                    .iter()
                    .zip(args)
                    .all(|((declared, _), arg)| accepts(*declared, arg.kind()))
        })
    }

    pub fn call(&self, args: &[Value], span: &Span) -> Result<Value, LangError> {
        let Some(overload) = self.resolve(args) else {
            let attempted = args
                .iter()
                .map(Value::type_name)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(LangError::new(
                ErrorKind::Argument,
                format!("no overload of '{}' accepts ({})", self.name, attempted),
                span.clone(),
            ));
        };
        (self.run)(&BuiltinCall {
            overload,
            args,
            span,
        })
    }
}

/// Seeds every builtin into the global table as a final binding.
pub fn install(globals: &mut SymbolTable) {
    for builtin in REGISTRY {
        globals.declare(
            TypeName::Function,
            builtin.name,
            Value::Builtin(builtin),
            Modifiers::PUBLIC | Modifiers::FINAL,
        );
    }
}

static REGISTRY: &[Builtin] = &[
    Builtin {
        name: "print",
        signatures: &[&[(TypeName::Var, "value")]],
        run: print_builtin,
    },
    Builtin {
        name: "input",
        signatures: &[&[], &[(TypeName::Str, "prompt")]],
        run: input_builtin,
    },
    Builtin {
        name: "len",
        signatures: &[
            &[(TypeName::Str, "value")],
            &[(TypeName::List, "value")],
            &[(TypeName::Map, "value")],
        ],
        run: len_builtin,
    },
    Builtin {
        name: "append",
        signatures: &[&[(TypeName::List, "target"), (TypeName::Var, "value")]],
        run: append_builtin,
    },
    Builtin {
        name: "remove",
        signatures: &[
            &[(TypeName::List, "target"), (TypeName::Var, "value")],
            &[(TypeName::Map, "target"), (TypeName::Var, "key")],
        ],
        run: remove_builtin,
    },
    Builtin {
        name: "pop",
        signatures: &[&[(TypeName::List, "target"), (TypeName::Int, "index")]],
        run: pop_builtin,
    },
    Builtin {
        name: "abs",
        signatures: &[&[(TypeName::Int, "value")], &[(TypeName::Float, "value")]],
        run: abs_builtin,
    },
    Builtin {
        name: "round",
        signatures: &[&[(TypeName::Num, "value")]],
        run: round_builtin,
    },
    Builtin {
        name: "ceil",
        signatures: &[&[(TypeName::Num, "value")]],
        run: ceil_builtin,
    },
    Builtin {
        name: "floor",
        signatures: &[&[(TypeName::Num, "value")]],
        run: floor_builtin,
    },
    Builtin {
        name: "str",
        signatures: &[&[(TypeName::Var, "value")]],
        run: str_builtin,
    },
    Builtin {
        name: "int",
        signatures: &[
            &[(TypeName::Str, "value")],
            &[(TypeName::Num, "value")],
            &[(TypeName::Bool, "value")],
        ],
        run: int_builtin,
    },
    Builtin {
        name: "float",
        signatures: &[&[(TypeName::Str, "value")], &[(TypeName::Num, "value")]],
        run: float_builtin,
    },
    Builtin {
        name: "typeof",
        signatures: &[&[(TypeName::Var, "value")]],
        run: typeof_builtin,
    },
    Builtin {
        name: "open",
        signatures: &[&[(TypeName::Str, "path"), (TypeName::Str, "mode")]],
        run: open_builtin,
    },
    Builtin {
        name: "readfile",
        signatures: &[&[(TypeName::File, "handle")]],
        run: readfile_builtin,
    },
    Builtin {
        name: "writefile",
        signatures: &[
            &[(TypeName::File, "handle"), (TypeName::Str, "data")],
            &[(TypeName::File, "handle"), (TypeName::List, "data")],
        ],
        run: writefile_builtin,
    },
];

fn print_builtin(call: &BuiltinCall) -> Result<Value, LangError> {
    println!("{}", call.args[0]);
    Ok(Value::Void)
}

fn input_builtin(call: &BuiltinCall) -> Result<Value, LangError> {
    if call.overload == 1 {
        print!("{}", call.args[0]);
        io::stdout().flush().map_err(|err| {
            LangError::new(
                ErrorKind::FileAccess,
                format!("cannot write prompt: {}", err),
                call.span.clone(),
            )
        })?;
    }
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).map_err(|err| {
        LangError::new(
            ErrorKind::FileAccess,
            format!("cannot read input: {}", err),
            call.span.clone(),
        )
    })?;
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(Value::Str(line))
}

fn len_builtin(call: &BuiltinCall) -> Result<Value, LangError> {
    let length = match (call.overload, &call.args[0]) {
        (0, Value::Str(value)) => value.chars().count(),
        (1, Value::List(items)) => items.borrow().len(),
        (2, Value::Map(entries)) => entries.borrow().len(),
        _ => 0,
    };
    Ok(Value::Int(length as i32))
}

fn append_builtin(call: &BuiltinCall) -> Result<Value, LangError> {
    if let Value::List(items) = &call.args[0] {
        items.borrow_mut().push(call.args[1].clone());
    }
    Ok(call.args[0].clone())
}

fn remove_builtin(call: &BuiltinCall) -> Result<Value, LangError> {
    let removed = match (call.overload, &call.args[0]) {
        (0, Value::List(items)) => {
            let position = items
                .borrow()
                .iter()
                .position(|item| item.equals(&call.args[1]));
            match position {
                Some(index) => {
                    items.borrow_mut().remove(index);
                    true
                }
                None => false,
            }
        }
        (1, Value::Map(entries)) => {
            let Some(key) = MapKey::from_value(&call.args[1]) else {
                return Err(LangError::new(
                    ErrorKind::UnsupportedOperation,
                    format!("cannot use '{}' as a map key", call.args[1].type_name()),
                    call.span.clone(),
                ));
            };
            entries.borrow_mut().remove(&key).is_some()
        }
        _ => false,
    };
    Ok(Value::Bool(removed))
}

fn pop_builtin(call: &BuiltinCall) -> Result<Value, LangError> {
    let Value::List(items) = &call.args[0] else {
        return Ok(Value::Null);
    };
    let index = call.args[1].as_i32().unwrap_or(0);
    let length = items.borrow().len();
    if index < 0 || index as usize >= length {
        return Err(LangError::new(
            ErrorKind::IndexOutOfBounds,
            format!("index {} out of bounds for list of length {}", index, length),
            call.span.clone(),
        ));
    }
    Ok(items.borrow_mut().remove(index as usize))
}

fn abs_builtin(call: &BuiltinCall) -> Result<Value, LangError> {
    match (call.overload, &call.args[0]) {
        (0, value) => {
            let v = value.as_i32().unwrap_or(0);
            v.checked_abs().map(Value::Int).ok_or_else(|| {
                LangError::new(
                    ErrorKind::UnsupportedOperation,
                    "integer overflow in 'abs'",
                    call.span.clone(),
                )
            })
        }
        (_, Value::Float(v)) => Ok(Value::Float(v.abs())),
        _ => Ok(Value::Null),
    }
}

// float-to-int truncation saturates at the i32 range ends
fn round_builtin(call: &BuiltinCall) -> Result<Value, LangError> {
    let v = call.args[0].as_f64().unwrap_or(0.0);
    Ok(Value::Int(v.round() as i32))
}

fn ceil_builtin(call: &BuiltinCall) -> Result<Value, LangError> {
    let v = call.args[0].as_f64().unwrap_or(0.0);
    Ok(Value::Int(v.ceil() as i32))
}

fn floor_builtin(call: &BuiltinCall) -> Result<Value, LangError> {
    let v = call.args[0].as_f64().unwrap_or(0.0);
    Ok(Value::Int(v.floor() as i32))
}

fn str_builtin(call: &BuiltinCall) -> Result<Value, LangError> {
    Ok(Value::Str(call.args[0].to_string()))
}

fn int_builtin(call: &BuiltinCall) -> Result<Value, LangError> {
    match (call.overload, &call.args[0]) {
        (0, Value::Str(text)) => text.trim().parse::<i32>().map(Value::Int).map_err(|_| {
            LangError::new(
                ErrorKind::Argument,
                format!("cannot parse '{}' as int", text),
                call.span.clone(),
            )
        }),
        (1, value) => Ok(Value::Int(value.as_f64().unwrap_or(0.0) as i32)),
        (_, Value::Bool(flag)) => Ok(Value::Int(i32::from(*flag))),
        _ => Ok(Value::Null),
    }
}

fn float_builtin(call: &BuiltinCall) -> Result<Value, LangError> {
    match (call.overload, &call.args[0]) {
        (0, Value::Str(text)) => text.trim().parse::<f64>().map(Value::Float).map_err(|_| {
            LangError::new(
                ErrorKind::Argument,
                format!("cannot parse '{}' as float", text),
                call.span.clone(),
            )
        }),
        (_, value) => Ok(Value::Float(value.as_f64().unwrap_or(0.0))),
    }
}

fn typeof_builtin(call: &BuiltinCall) -> Result<Value, LangError> {
    Ok(Value::Str(call.args[0].type_name().to_string()))
}

fn open_builtin(call: &BuiltinCall) -> Result<Value, LangError> {
    let (Value::Str(path), Value::Str(mode)) = (&call.args[0], &call.args[1]) else {
        return Ok(Value::Null);
    };
    let Some((mode, binary)) = FileMode::parse(mode) else {
        return Err(LangError::new(
            ErrorKind::Argument,
            format!("invalid file mode '{}'", mode),
            call.span.clone(),
        ));
    };
    let path = PathBuf::from(path);
    match mode {
        // reading and appending need an existing file; 'w' creates one
        FileMode::Read | FileMode::Append => {
            if fs::metadata(&path).is_err() {
                return Err(LangError::new(
                    ErrorKind::FileAccess,
                    format!("cannot open '{}': no such file", path.display()),
                    call.span.clone(),
                ));
            }
        }
        FileMode::Write => {
            if fs::metadata(&path).is_err() {
                fs::File::create(&path).map_err(|err| {
                    LangError::new(
                        ErrorKind::FileAccess,
                        format!("cannot create '{}': {}", path.display(), err),
                        call.span.clone(),
                    )
                })?;
            }
        }
    }
    Ok(Value::File(Rc::new(std::cell::RefCell::new(FileHandle {
        path,
        mode,
        binary,
    }))))
}

fn readfile_builtin(call: &BuiltinCall) -> Result<Value, LangError> {
    let Value::File(handle) = &call.args[0] else {
        return Ok(Value::Null);
    };
    let handle = handle.borrow();
    if handle.mode != FileMode::Read {
        return Err(LangError::new(
            ErrorKind::FileAccess,
            format!("file '{}' is not open for reading", handle.path.display()),
            call.span.clone(),
        ));
    }
    if handle.binary {
        let bytes = fs::read(&handle.path).map_err(|err| {
            LangError::new(
                ErrorKind::FileAccess,
                format!("cannot read '{}': {}", handle.path.display(), err),
                call.span.clone(),
            )
        })?;
        Ok(Value::list(bytes.into_iter().map(Value::Byte).collect()))
    } else {
        let text = fs::read_to_string(&handle.path).map_err(|err| {
            LangError::new(
                ErrorKind::FileAccess,
                format!("cannot read '{}': {}", handle.path.display(), err),
                call.span.clone(),
            )
        })?;
        Ok(Value::Str(text))
    }
}

fn writefile_builtin(call: &BuiltinCall) -> Result<Value, LangError> {
    let Value::File(handle) = &call.args[0] else {
        return Ok(Value::Null);
    };
    let handle = handle.borrow();
    if handle.mode == FileMode::Read {
        return Err(LangError::new(
            ErrorKind::FileAccess,
            format!("file '{}' is not open for writing", handle.path.display()),
            call.span.clone(),
        ));
    }

    let data = match (call.overload, &call.args[1]) {
        (0, Value::Str(text)) => text.clone().into_bytes(),
        (1, Value::List(items)) => {
            let mut bytes = Vec::with_capacity(items.borrow().len());
            for item in items.borrow().iter() {
                match item.as_i32() {
                    Some(v) if (0..=255).contains(&v) => bytes.push(v as u8),
                    _ => {
                        return Err(LangError::new(
                            ErrorKind::Argument,
                            format!(
                                "writefile expects a list of bytes, found '{}'",
                                item.type_name()
                            ),
                            call.span.clone(),
                        ));
                    }
                }
            }
            bytes
        }
        _ => Vec::new(),
    };

    let result = match handle.mode {
        FileMode::Write => fs::write(&handle.path, &data),
        FileMode::Append => fs::OpenOptions::new()
            .append(true)
            .open(&handle.path)
            .and_then(|mut file| file.write_all(&data)),
        FileMode::Read => Ok(()),
    };
    result.map_err(|err| {
        LangError::new(
            ErrorKind::FileAccess,
            format!("cannot write '{}': {}", handle.path.display(), err),
            call.span.clone(),
        )
    })?;
    Ok(Value::Void)
}
