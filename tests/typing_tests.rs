use skarn::errors::{ErrorKind, LangError};
use skarn::runtime::value::Value;
use skarn::types::{accepts, TypeName, ValueKind};

fn run(source: &str) -> Value {
    skarn::run("test.sk", source).expect("run should succeed")
}

fn run_err(source: &str) -> LangError {
    skarn::run("test.sk", source).expect_err("run should fail")
}

#[test]
fn int_widens_to_float_never_the_reverse() {
    assert!(accepts(TypeName::Float, ValueKind::Int));
    assert!(accepts(TypeName::Num, ValueKind::Int));
    assert!(accepts(TypeName::Num, ValueKind::Float));
    assert!(!accepts(TypeName::Int, ValueKind::Float));
}

#[test]
fn var_and_const_accept_anything() {
    assert!(accepts(TypeName::Var, ValueKind::List));
    assert!(accepts(TypeName::Var, ValueKind::Function));
    assert!(accepts(TypeName::Const, ValueKind::Null));
}

#[test]
fn bytes_fit_integer_slots() {
    assert!(accepts(TypeName::Byte, ValueKind::Byte));
    assert!(accepts(TypeName::Int, ValueKind::Byte));
    assert!(!accepts(TypeName::Byte, ValueKind::Int));
}

#[test]
fn null_only_fits_untyped_slots() {
    assert!(!accepts(TypeName::Int, ValueKind::Null));
    assert!(!accepts(TypeName::Str, ValueKind::Null));
    assert_eq!(run("var x = null; x;"), Value::Null);
}

#[test]
fn declaring_int_with_float_value_fails() {
    let err = run_err("int x = 3.5;");
    assert_eq!(err.kind, ErrorKind::UnsupportedOperation);
    assert!(err.details.contains("'float'"));
    assert!(err.details.contains("'int'"));
}

#[test]
fn declaring_float_with_int_value_succeeds() {
    // the declaration validates but does not convert
    assert_eq!(run("float x = 3; x;"), Value::Int(3));
}

#[test]
fn final_reassignment_fails() {
    let err = run_err("fin int x = 1; x = 2;");
    assert_eq!(err.kind, ErrorKind::UnsupportedOperation);
    assert!(err.details.contains("final"));
}

#[test]
fn non_final_reassignment_succeeds() {
    assert_eq!(run("int x = 1; x = 2; x;"), Value::Int(2));
}

#[test]
fn const_declarations_are_final() {
    let err = run_err("const answer = 1; answer = 2;");
    assert!(err.details.contains("final"));
}

#[test]
fn assignment_rechecks_declared_type() {
    let err = run_err("int x = 1; x = \"s\";");
    assert_eq!(err.kind, ErrorKind::UnsupportedOperation);
    assert!(err.details.contains("'str'"));
}

#[test]
fn typed_slot_refuses_null() {
    let err = run_err("int x = 1; x = null;");
    assert_eq!(err.kind, ErrorKind::UnsupportedOperation);
}

#[test]
fn redeclaration_in_same_scope_fails() {
    let err = run_err("int x = 1; int x = 2;");
    assert!(err.details.contains("already declared"));
}

#[test]
fn inner_scopes_shadow_outer_bindings() {
    let value = run("
        int x = 1;
        if true {
            int x = 10;
            x = 20;
        }
        x;
    ");
    assert_eq!(value, Value::Int(1));
}

#[test]
fn parameter_types_are_checked() {
    let err = run_err("func f(int a) : int { return a; } f(\"s\");");
    assert_eq!(err.kind, ErrorKind::Argument);
    assert!(err.details.contains("'a'"));
}

#[test]
fn int_parameters_accept_int_not_float() {
    assert_eq!(run("func f(float a) : float { return a; } f(3);"), Value::Int(3));
    let err = run_err("func f(int a) : int { return a; } f(3.5);");
    assert_eq!(err.kind, ErrorKind::Argument);
}

#[test]
fn function_return_types_are_checked() {
    let err = run_err("func f() : int { return \"s\"; } f();");
    assert_eq!(err.kind, ErrorKind::UnsupportedOperation);
    assert!(err.details.contains("must return"));
}

#[test]
fn return_type_alternatives_all_count() {
    assert_eq!(
        run("func f(bool b) : int | str { if b { return 1; } return \"s\"; } f(false);"),
        Value::Str("s".to_string())
    );
}
