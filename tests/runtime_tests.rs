use std::time::{SystemTime, UNIX_EPOCH};

use pretty_assertions::assert_eq;

use skarn::errors::{ErrorKind, LangError};
use skarn::runtime::scope::SymbolTable;
use skarn::runtime::value::Value;

fn run(source: &str) -> Value {
    skarn::run("test.sk", source).expect("run should succeed")
}

fn run_err(source: &str) -> LangError {
    skarn::run("test.sk", source).expect_err("run should fail")
}

fn temp_path(prefix: &str) -> std::path::PathBuf {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be valid")
        .as_nanos();
    std::env::temp_dir().join(format!("{}_{}.sk", prefix, stamp))
}

fn escape_path(path: &std::path::Path) -> String {
    path.to_string_lossy().replace('\\', "\\\\")
}

#[test]
fn evaluates_integer_literal() {
    assert_eq!(run("2147483647;"), Value::Int(i32::MAX));
}

#[test]
fn adds_ints_and_widens_to_float() {
    assert_eq!(run("1 + 2;"), Value::Int(3));
    assert_eq!(run("1 + 2.0;"), Value::Float(3.0));
    assert_eq!(run("\"1\" + \"2\";"), Value::Str("12".to_string()));
}

#[test]
fn reports_unsupported_operand_pair() {
    let err = run_err("1 + \"s\";");
    assert_eq!(err.kind, ErrorKind::UnsupportedOperation);
    assert!(err.details.contains("'int'"));
    assert!(err.details.contains("'str'"));
}

#[test]
fn evaluates_power_and_unary_precedence() {
    assert_eq!(run("2 ^ 10;"), Value::Int(1024));
    assert_eq!(run("-2 ^ 2;"), Value::Int(4));
    assert_eq!(run("2 ^ -1;"), Value::Float(0.5));
}

#[test]
fn division_by_zero_fails() {
    let err = run_err("1 / 0;");
    assert_eq!(err.kind, ErrorKind::UnsupportedOperation);
    assert!(err.details.contains("zero"));
}

#[test]
fn logical_operators_short_circuit() {
    assert_eq!(run("false && 1 / 0 == 0;"), Value::Bool(false));
    assert_eq!(run("true || 1 / 0 == 0;"), Value::Bool(true));
}

#[test]
fn conditions_must_be_bool() {
    let err = run_err("if 1 { 2; }");
    assert_eq!(err.kind, ErrorKind::UnsupportedOperation);
    assert!(err.details.contains("'bool'"));
}

#[test]
fn evaluates_ternary() {
    assert_eq!(
        run("int x = 5; x > 3 ? \"big\" : \"small\";"),
        Value::Str("big".to_string())
    );
}

#[test]
fn return_unwinds_nested_blocks() {
    let value = run("
        func f(int n) : int {
            while true {
                if n > 0 {
                    return 10;
                }
                return 20;
            }
            return 30;
        }
        f(1);
    ");
    assert_eq!(value, Value::Int(10));
}

#[test]
fn missing_return_yields_void() {
    assert_eq!(run("func f() { 1 + 1; } f();"), Value::Void);
}

#[test]
fn while_loop_with_break_and_continue() {
    let value = run("
        int total = 0;
        int i = 0;
        while true {
            i += 1;
            if i == 3 { continue; }
            if i > 5 { break; }
            total += i;
        }
        total;
    ");
    // 1 + 2 + 4 + 5
    assert_eq!(value, Value::Int(12));
}

#[test]
fn for_loop_counts_with_default_step() {
    let value = run("
        int total = 0;
        for int i = 0; 5 {
            total += i;
        }
        total;
    ");
    assert_eq!(value, Value::Int(10));
}

#[test]
fn for_loop_honors_step_and_negative_direction() {
    assert_eq!(
        run("int total = 0; for int i = 0; 10; 2 { total += i; } total;"),
        Value::Int(20)
    );
    assert_eq!(
        run("int total = 0; for int i = 5; 0; -1 { total += i; } total;"),
        Value::Int(15)
    );
}

#[test]
fn switch_matches_first_equal_case() {
    let value = run("
        str label = \"\";
        switch 1 + 1 {
            case 1: label = \"one\";
            case 2: label = \"two\";
            default: label = \"many\";
        }
        label;
    ");
    assert_eq!(value, Value::Str("two".to_string()));
}

#[test]
fn switch_falls_back_to_default() {
    let value = run("
        int hits = 0;
        switch 9 {
            case 1: hits = 1;
            default: hits = 99;
        }
        hits;
    ");
    assert_eq!(value, Value::Int(99));
}

#[test]
fn closures_capture_their_defining_scope() {
    let value = run("
        func counter() : function {
            int n = 0;
            func bump() : int {
                n += 1;
                return n;
            }
            return bump;
        }
        var c = counter();
        c();
        c();
    ");
    assert_eq!(value, Value::Int(2));
}

#[test]
fn aliased_lists_observe_mutation() {
    assert_eq!(
        run("list a = [1]; list b = a; append(b, 2); len(a);"),
        Value::Int(2)
    );
}

#[test]
fn append_then_len_counts_the_new_element() {
    assert_eq!(run("len(append([1, 2], 3));"), Value::Int(3));
}

#[test]
fn list_plus_value_copies_instead_of_mutating() {
    assert_eq!(
        run("list a = [1]; list b = a + 2; len(a) * 10 + len(b);"),
        Value::Int(12)
    );
}

#[test]
fn list_indexing_and_assignment() {
    assert_eq!(run("list a = [1, 2, 3]; a[1] = 20; a[1];"), Value::Int(20));
    let err = run_err("[1, 2][5];");
    assert_eq!(err.kind, ErrorKind::IndexOutOfBounds);
}

#[test]
fn string_indexing_yields_one_character() {
    assert_eq!(run("\"abc\"[1];"), Value::Str("b".to_string()));
    let err = run_err("\"abc\"[9];");
    assert_eq!(err.kind, ErrorKind::IndexOutOfBounds);
}

#[test]
fn map_literals_index_and_member_access() {
    assert_eq!(
        run("map m = {\"a\": 1}; m[\"b\"] = 2; m.a + m[\"b\"];"),
        Value::Int(3)
    );
    let err = run_err("{\"a\": 1}[\"missing\"];");
    assert_eq!(err.kind, ErrorKind::IndexOutOfBounds);
}

#[test]
fn map_remove_and_len() {
    assert_eq!(
        run("map m = {\"a\": 1, \"b\": 2}; remove(m, \"a\"); len(m);"),
        Value::Int(1)
    );
}

#[test]
fn pop_out_of_bounds_names_length_and_index() {
    let err = run_err("pop([1, 2], 5);");
    assert_eq!(err.kind, ErrorKind::IndexOutOfBounds);
    assert!(err.details.contains('5'));
    assert!(err.details.contains('2'));
}

#[test]
fn builtin_with_no_matching_signature_fails() {
    let err = run_err("abs(\"x\");");
    assert_eq!(err.kind, ErrorKind::Argument);
    assert!(err.details.contains("abs"));
    assert!(err.details.contains("str"));
}

#[test]
fn builtin_overloads_branch_on_argument_types() {
    assert_eq!(run("abs(-3);"), Value::Int(3));
    assert_eq!(run("abs(-3.5);"), Value::Float(3.5));
    assert_eq!(run("len(\"abc\");"), Value::Int(3));
    assert_eq!(run("len([1, 2]);"), Value::Int(2));
}

#[test]
fn conversion_builtins() {
    assert_eq!(run("int(\"42\");"), Value::Int(42));
    assert_eq!(run("int(3.9);"), Value::Int(3));
    assert_eq!(run("float(\"1.5\");"), Value::Float(1.5));
    assert_eq!(run("str(42);"), Value::Str("42".to_string()));
    assert_eq!(run("typeof(1.0);"), Value::Str("float".to_string()));
    let err = run_err("int(\"nope\");");
    assert_eq!(err.kind, ErrorKind::Argument);
}

#[test]
fn rounding_builtins_truncate_to_int() {
    assert_eq!(run("round(2.6);"), Value::Int(3));
    assert_eq!(run("floor(2.6);"), Value::Int(2));
    assert_eq!(run("ceil(2.1);"), Value::Int(3));
}

#[test]
fn undefined_variable_is_a_runtime_error() {
    let err = run_err("missing;");
    assert_eq!(err.kind, ErrorKind::UnsupportedOperation);
    assert!(err.details.contains("not defined"));
}

#[test]
fn return_outside_function_fails() {
    let err = run_err("return 1;");
    assert!(err.details.contains("outside of a function"));
}

#[test]
fn run_internal_symbols_only_skips_side_effects() {
    let (_, scope) = skarn::run_internal("test.sk", "int x = 1; x = 5;", true)
        .expect("run should succeed");
    assert_eq!(SymbolTable::get(&scope, "x"), Some(Value::Int(1)));
}

#[test]
fn imports_merge_public_symbols() {
    let module_path = temp_path("skarn_mod");
    std::fs::write(
        &module_path,
        "pub int answer = 42;\npriv int hidden = 7;\nfunc double(int n) : int { return n * 2; }",
    )
    .expect("module file should be written");

    let module_name = module_path
        .file_name()
        .expect("module path should have a file name")
        .to_string_lossy()
        .into_owned();
    let main_path = std::env::temp_dir().join("main.sk");
    let source = format!("import \"{}\";\ndouble(answer);", module_name);
    let value = skarn::run(&main_path.to_string_lossy(), &source).expect("run should succeed");

    std::fs::remove_file(&module_path).expect("module file should be removed");
    assert_eq!(value, Value::Int(84));
}

#[test]
fn import_alias_binds_a_module_map() {
    let module_path = temp_path("skarn_alias");
    std::fs::write(&module_path, "pub int answer = 42;").expect("module file should be written");

    let module_name = module_path
        .file_name()
        .expect("module path should have a file name")
        .to_string_lossy()
        .into_owned();
    let main_path = std::env::temp_dir().join("main.sk");
    let source = format!("import \"{}\" as util;\nutil.answer;", module_name);
    let value = skarn::run(&main_path.to_string_lossy(), &source).expect("run should succeed");

    std::fs::remove_file(&module_path).expect("module file should be removed");
    assert_eq!(value, Value::Int(42));
}

#[test]
fn importing_a_private_symbol_is_illegal_access() {
    let module_path = temp_path("skarn_priv");
    std::fs::write(&module_path, "priv int hidden = 7;").expect("module file should be written");

    let module_name = module_path
        .file_name()
        .expect("module path should have a file name")
        .to_string_lossy()
        .into_owned();
    let main_path = std::env::temp_dir().join("main.sk");
    let source = format!("from \"{}\" import hidden;", module_name);
    let err = skarn::run(&main_path.to_string_lossy(), &source).expect_err("run should fail");

    std::fs::remove_file(&module_path).expect("module file should be removed");
    assert_eq!(err.kind, ErrorKind::IllegalAccess);
}

#[test]
fn importing_a_missing_module_fails() {
    let err = run_err("import \"does_not_exist.sk\";");
    assert_eq!(err.kind, ErrorKind::Import);
}

#[test]
fn file_write_then_read_roundtrip() {
    let path = temp_path("skarn_file");
    let escaped = escape_path(&path);
    let value = run(&format!(
        "var out = open(\"{0}\", \"w\");\n\
         writefile(out, \"hello\");\n\
         var src = open(\"{0}\", \"r\");\n\
         readfile(src);",
        escaped
    ));
    std::fs::remove_file(&path).expect("file should be removed");
    assert_eq!(value, Value::Str("hello".to_string()));
}

#[test]
fn append_mode_appends_instead_of_truncating() {
    let path = temp_path("skarn_append");
    let escaped = escape_path(&path);
    let value = run(&format!(
        "var out = open(\"{0}\", \"w\");\n\
         writefile(out, \"a\");\n\
         var more = open(\"{0}\", \"a\");\n\
         writefile(more, \"b\");\n\
         readfile(open(\"{0}\", \"r\"));",
        escaped
    ));
    std::fs::remove_file(&path).expect("file should be removed");
    assert_eq!(value, Value::Str("ab".to_string()));
}

#[test]
fn opening_a_missing_file_for_reading_fails() {
    let path = escape_path(&temp_path("skarn_missing"));
    let err = run_err(&format!("open(\"{}\", \"r\");", path));
    assert_eq!(err.kind, ErrorKind::FileAccess);
}

#[test]
fn writing_a_read_handle_fails() {
    let path = temp_path("skarn_readonly");
    std::fs::write(&path, "x").expect("file should be written");
    let err = run_err(&format!(
        "writefile(open(\"{}\", \"r\"), \"y\");",
        escape_path(&path)
    ));
    std::fs::remove_file(&path).expect("file should be removed");
    assert_eq!(err.kind, ErrorKind::FileAccess);
}

#[test]
fn binary_reads_yield_byte_lists() {
    let path = temp_path("skarn_binary");
    std::fs::write(&path, [65u8, 66u8]).expect("file should be written");
    let value = run(&format!(
        "readfile(open(\"{}\", \"rb\"));",
        escape_path(&path)
    ));
    std::fs::remove_file(&path).expect("file should be removed");
    assert_eq!(value, Value::list(vec![Value::Byte(65), Value::Byte(66)]));
}

#[test]
fn bytes_behave_as_small_ints() {
    let path = temp_path("skarn_bytes");
    std::fs::write(&path, [5u8]).expect("file should be written");
    let value = run(&format!(
        "list bytes = readfile(open(\"{}\", \"rb\"));\nbytes[0] + 1;",
        escape_path(&path)
    ));
    std::fs::remove_file(&path).expect("file should be removed");
    assert_eq!(value, Value::Int(6));
}
