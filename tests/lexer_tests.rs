use skarn::errors::{ErrorKind, LangError};
use skarn::lexer::token::{Keyword, Token, TokenKind};

fn lex(source: &str) -> Vec<Token> {
    skarn::lexer::lex("test.sk", source).expect("lex should succeed")
}

fn lex_err(source: &str) -> LangError {
    skarn::lexer::lex("test.sk", source).expect_err("lex should fail")
}

#[test]
fn lexes_declaration_tokens() {
    let tokens = lex("int x = 42;");
    assert_eq!(tokens[0].kind, TokenKind::Keyword(Keyword::Int));
    assert!(matches!(&tokens[1].kind, TokenKind::Identifier(name) if name == "x"));
    assert_eq!(tokens[2].kind, TokenKind::Equal);
    assert_eq!(tokens[3].kind, TokenKind::Int(42));
    assert_eq!(tokens[4].kind, TokenKind::Semicolon);
    assert_eq!(tokens[5].kind, TokenKind::Eof);
}

#[test]
fn lexes_float_and_stops_at_second_dot() {
    let tokens = lex("1.25 1.2.3");
    assert_eq!(tokens[0].kind, TokenKind::Float(1.25));
    assert_eq!(tokens[1].kind, TokenKind::Float(1.2));
    assert_eq!(tokens[2].kind, TokenKind::Dot);
    assert_eq!(tokens[3].kind, TokenKind::Int(3));
}

#[test]
fn accepts_int_at_top_of_range() {
    let tokens = lex("2147483647");
    assert_eq!(tokens[0].kind, TokenKind::Int(i32::MAX));
}

#[test]
fn rejects_int_beyond_32_bits() {
    let err = lex_err("2147483648");
    assert_eq!(err.kind, ErrorKind::InvalidSyntax);
}

#[test]
fn lexes_hex_literals() {
    let tokens = lex("0xFF 00x10 0xFFFFFFFF");
    assert_eq!(tokens[0].kind, TokenKind::Int(255));
    assert_eq!(tokens[1].kind, TokenKind::Int(16));
    // the full 32-bit pattern is reinterpreted as signed
    assert_eq!(tokens[2].kind, TokenKind::Int(-1));
}

#[test]
fn rejects_overlong_hex_literal() {
    let err = lex_err("0x123456789");
    assert_eq!(err.kind, ErrorKind::InvalidSyntax);
}

#[test]
fn rejects_hex_prefix_without_digits() {
    let err = lex_err("0x;");
    assert_eq!(err.kind, ErrorKind::ExpectedCharacter);
}

#[test]
fn lexes_string_escapes() {
    let tokens = lex(r#""a\tb\n\\" 'it\'s' "\q""#);
    assert_eq!(tokens[0].kind, TokenKind::Str("a\tb\n\\".to_string()));
    assert_eq!(tokens[1].kind, TokenKind::Str("it's".to_string()));
    // unknown escapes pass the following character through
    assert_eq!(tokens[2].kind, TokenKind::Str("q".to_string()));
}

#[test]
fn string_closes_only_on_matching_quote() {
    let tokens = lex("'say \"hi\"'");
    assert_eq!(tokens[0].kind, TokenKind::Str("say \"hi\"".to_string()));
}

#[test]
fn rejects_unterminated_string() {
    let err = lex_err("\"abc");
    assert_eq!(err.kind, ErrorKind::ExpectedCharacter);
}

#[test]
fn skips_comments() {
    let tokens = lex("1 // two\n/* three\nfour */ 5");
    assert_eq!(tokens[0].kind, TokenKind::Int(1));
    assert_eq!(tokens[1].kind, TokenKind::Int(5));
    assert_eq!(tokens[2].kind, TokenKind::Eof);
}

#[test]
fn line_comment_may_end_at_eof() {
    let tokens = lex("7 // trailing");
    assert_eq!(tokens[0].kind, TokenKind::Int(7));
    assert_eq!(tokens[1].kind, TokenKind::Eof);
}

#[test]
fn rejects_unterminated_block_comment() {
    let err = lex_err("/* nope");
    assert_eq!(err.kind, ErrorKind::ExpectedCharacter);
}

#[test]
fn lexes_compound_operators() {
    let tokens = lex("+= -= *= /= %= ^= == != <= >= && || |");
    let kinds: Vec<_> = tokens.iter().map(|t| t.kind.clone()).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::PlusEqual,
            TokenKind::MinusEqual,
            TokenKind::StarEqual,
            TokenKind::SlashEqual,
            TokenKind::PercentEqual,
            TokenKind::CaretEqual,
            TokenKind::EqualEqual,
            TokenKind::BangEqual,
            TokenKind::LessEqual,
            TokenKind::GreaterEqual,
            TokenKind::AndAnd,
            TokenKind::PipePipe,
            TokenKind::Pipe,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn rejects_illegal_character() {
    let err = lex_err("int x = $;");
    assert_eq!(err.kind, ErrorKind::IllegalCharacter);
    assert!(err.details.contains('$'));
}

#[test]
fn rejects_lone_ampersand() {
    let err = lex_err("a & b");
    assert_eq!(err.kind, ErrorKind::ExpectedCharacter);
}

#[test]
fn classifies_keywords_and_identifiers() {
    let tokens = lex("fin funcy func while whilst");
    assert_eq!(tokens[0].kind, TokenKind::Keyword(Keyword::Fin));
    assert!(matches!(&tokens[1].kind, TokenKind::Identifier(name) if name == "funcy"));
    assert_eq!(tokens[2].kind, TokenKind::Keyword(Keyword::Func));
    assert_eq!(tokens[3].kind, TokenKind::Keyword(Keyword::While));
    assert!(matches!(&tokens[4].kind, TokenKind::Identifier(name) if name == "whilst"));
}

#[test]
fn tracks_line_and_column() {
    let tokens = lex("a\n  b");
    assert_eq!(tokens[0].span.start.line, 1);
    assert_eq!(tokens[0].span.start.column, 1);
    assert_eq!(tokens[1].span.start.line, 2);
    assert_eq!(tokens[1].span.start.column, 3);
}
