use skarn::errors::ErrorKind;

#[test]
fn lex_error_renders_caret_under_offending_character() {
    let err = skarn::lexer::lex("test.sk", "int x = $;").expect_err("lex should fail");
    let rendered = err.to_string();
    assert!(rendered.contains("File \"test.sk\", line 1"));
    assert!(rendered.contains("int x = $;"));
    assert!(rendered.contains("\n        ^"));
    assert!(rendered.contains("Illegal character"));
}

#[test]
fn syntax_error_has_no_traceback() {
    let tokens = skarn::lexer::lex("test.sk", "int x = ;").expect("lex should succeed");
    let err = skarn::parser::Parser::new(tokens)
        .parse_program()
        .expect_err("parse should fail");
    let rendered = err.to_string();
    assert!(rendered.starts_with("File \"test.sk\""));
    assert!(!rendered.contains("Traceback"));
    assert!(rendered.contains("Invalid syntax"));
}

#[test]
fn runtime_error_renders_most_recent_call_last() {
    let err = skarn::run(
        "test.sk",
        "
func inner() : int {
    return 1 + \"s\";
}
func outer() : int {
    return inner();
}
outer();
",
    )
    .expect_err("run should fail");

    let rendered = err.to_string();
    assert!(rendered.starts_with("Traceback (most recent call last):"));
    let module_at = rendered.find("in <module>").expect("module frame");
    let outer_at = rendered.find("in outer").expect("outer frame");
    let inner_at = rendered.find("in inner").expect("inner frame");
    assert!(module_at < outer_at);
    assert!(outer_at < inner_at);
    assert!(rendered.contains("Unsupported operation"));
    assert!(rendered.contains("1 + \"s\""));
}

#[test]
fn runtime_error_excerpt_marks_the_failing_expression() {
    let err = skarn::run("test.sk", "int x = 1;\n1 / 0;").expect_err("run should fail");
    let rendered = err.to_string();
    assert!(rendered.contains("1 / 0"));
    assert!(rendered.contains("^^^^^"));
}

#[test]
fn error_kinds_render_their_headlines() {
    assert_eq!(ErrorKind::IllegalCharacter.to_string(), "Illegal character");
    assert_eq!(ErrorKind::ExpectedCharacter.to_string(), "Expected character");
    assert_eq!(ErrorKind::InvalidSyntax.to_string(), "Invalid syntax");
    assert_eq!(
        ErrorKind::IndexOutOfBounds.to_string(),
        "Index out of bounds"
    );
    assert_eq!(ErrorKind::IllegalAccess.to_string(), "Illegal access");
}

#[test]
fn import_errors_carry_the_import_kind() {
    let err = skarn::run("test.sk", "import \"missing.sk\";").expect_err("run should fail");
    assert_eq!(err.kind, ErrorKind::Import);
    assert!(err.to_string().contains("Import error"));
}
