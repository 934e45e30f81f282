use crate::{LineIndex, Location, ParseError, Span, TokenKind, ast::AST, tokenise};
use indoc::indoc;

fn parse(source: &str) -> AST {
  crate::parse(source.to_owned())
}
impl AST {
  fn is_ok(&self) -> bool {
    self.errors.is_empty()
  }

  fn is_err(&self) -> bool {
    !self.is_ok()
  }
}

fn parse_to_string(source: &str) -> String {
  crate::parse(source.to_owned()).to_string()
}

fn token_kinds(source: &str) -> Vec<TokenKind> {
  tokenise(source).map(|token| token.kind).collect()
}

#[test]
fn empty_source() {
  assert!(parse("").is_ok());
  assert!(parse("   \n\n  \t ").is_ok());
  assert!(parse("\"only a comment\"").is_ok());
  assert!(!parse("").has_main());
}

#[test]
fn tokens() {
  assert_eq!(
    token_kinds("x := 3. ^x at: 1 put: 'a' , $b"),
    vec![
      TokenKind::Identifier,
      TokenKind::Assign,
      TokenKind::Number,
      TokenKind::Dot,
      TokenKind::Caret,
      TokenKind::Identifier,
      TokenKind::Keyword,
      TokenKind::Number,
      TokenKind::Keyword,
      TokenKind::String,
      TokenKind::BinaryOperator,
      TokenKind::Character,
    ]
  );

  assert_eq!(
    token_kinds("[:x | x] {1. 2} #foo:bar: ~= \"note\""),
    vec![
      TokenKind::LeftSquare,
      TokenKind::Colon,
      TokenKind::Identifier,
      TokenKind::Pipe,
      TokenKind::Identifier,
      TokenKind::RightSquare,
      TokenKind::LeftCurly,
      TokenKind::Number,
      TokenKind::Dot,
      TokenKind::Number,
      TokenKind::RightCurly,
      TokenKind::Symbol,
      TokenKind::BinaryOperator,
      TokenKind::Comment,
    ]
  );

  assert_eq!(
    token_kinds("class self super nil true false"),
    vec![
      TokenKind::Class,
      TokenKind::SelfKeyword,
      TokenKind::Super,
      TokenKind::Nil,
      TokenKind::True,
      TokenKind::False,
    ]
  );
}

#[test]
fn number_followed_by_statement_end() {
  assert_eq!(
    token_kinds("1. 2.5."),
    vec![
      TokenKind::Number,
      TokenKind::Dot,
      TokenKind::Number,
      TokenKind::Dot,
    ]
  );
}

#[test]
fn binary_sends_are_left_associative() {
  let ast = parse_to_string("1 + 2 * 3");
  let expected = indoc! {"
    Main
    ╰─ Binary Send (*)
       ├─ Binary Send (+)
       │  ├─ Integer (1)
       │  ╰─ Integer (2)
       ╰─ Integer (3)
  "};
  assert_eq!(ast, expected);
}

#[test]
fn unary_binds_tighter_than_binary() {
  let ast = parse_to_string("^3 + 4 factorial");
  let expected = indoc! {"
    Main
    ╰─ Return
       ╰─ Binary Send (+)
          ├─ Integer (3)
          ╰─ Unary Send (factorial)
             ╰─ Integer (4)
  "};
  assert_eq!(ast, expected);
}

#[test]
fn keyword_send() {
  let ast = parse_to_string("x at: 1 + 1 put: 2");
  let expected = indoc! {"
    Main
    ╰─ Keyword Send (at:put:)
       ├─ Variable (x)
       ├─ Binary Send (+)
       │  ├─ Integer (1)
       │  ╰─ Integer (1)
       ╰─ Integer (2)
  "};
  assert_eq!(ast, expected);
}

#[test]
fn negative_numbers() {
  let ast = parse_to_string("^-34");
  let expected = indoc! {"
    Main
    ╰─ Return
       ╰─ Integer (-34)
  "};
  assert_eq!(ast, expected);

  let ast = parse_to_string("3-2");
  let expected = indoc! {"
    Main
    ╰─ Binary Send (-)
       ├─ Integer (3)
       ╰─ Integer (2)
  "};
  assert_eq!(ast, expected);

  let ast = parse_to_string("3 - -2.5");
  let expected = indoc! {"
    Main
    ╰─ Binary Send (-)
       ├─ Integer (3)
       ╰─ Float (-2.5)
  "};
  assert_eq!(ast, expected);
}

#[test]
fn literals() {
  let ast = parse_to_string("{nil. true. self. $a. 'it''s'. #foo}");
  let expected = indoc! {"
    Main
    ╰─ Array
       ├─ Nil
       ├─ Boolean (true)
       ├─ Self
       ├─ Character ($a)
       ├─ String 'it's'
       ╰─ Symbol #foo
  "};
  assert_eq!(ast, expected);
}

#[test]
fn locals_and_assignment() {
  let ast = parse_to_string("| x y | x := 1. y := x");
  let expected = indoc! {"
    Main
    ├─ Locals (x y)
    ├─ Assignment (x)
    │  ╰─ Integer (1)
    ╰─ Assignment (y)
       ╰─ Variable (x)
  "};
  assert_eq!(ast, expected);
}

#[test]
fn blocks() {
  let ast = parse_to_string("[:x :y | | z | z := x + y]");
  let expected = indoc! {"
    Main
    ╰─ Block (x y)
       ├─ Locals (z)
       ╰─ Assignment (z)
          ╰─ Binary Send (+)
             ├─ Variable (x)
             ╰─ Variable (y)
  "};
  assert_eq!(ast, expected);

  assert!(parse("[]").is_ok());
  assert!(parse("[:x]").is_ok());
  assert!(parse("[:x || y | y]").is_ok());
}

#[test]
fn classes() {
  let ast = parse_to_string(indoc! {"
    class T [
      |x|
      f [^x]
      class make [^self new]
    ]
  "});
  let expected = indoc! {"
    Class T
    ├─ Fields (x)
    ├─ Method f
    │  ╰─ Return
    │     ╰─ Variable (x)
    ╰─ Class Method make
       ╰─ Return
          ╰─ Unary Send (new)
             ╰─ Self
  "};
  assert_eq!(ast, expected);
}

#[test]
fn method_headers() {
  let ast = parse(indoc! {"
    class Point : Object [
      |x y|
      x [^x]
      + other [^x + other x]
      x: newX y: newY [x := newX. y := newY]
    ]
  "});
  assert!(ast.is_ok());

  let selectors: Vec<_> = ast.methods.iter().map(|m| m.selector(&ast)).collect();
  assert_eq!(selectors, vec!["x", "+", "x:y:"]);

  let parameters: Vec<_> = ast.methods[2].parameters().map(|p| p.name(&ast)).collect();
  assert_eq!(parameters, vec!["newX", "newY"]);

  let class = &ast.classes[0];
  assert_eq!(class.name(&ast), "Point");
  assert_eq!(class.superclass().map(|s| s.name(&ast)), Some("Object"));
}

#[test]
fn superclass_without_space() {
  let ast = parse("class A: B [ ]");
  assert!(ast.is_ok());
  assert_eq!(ast.classes[0].name(&ast), "A");
  assert_eq!(ast.classes[0].superclass().map(|s| s.name(&ast)), Some("B"));
}

#[test]
fn primitive_methods() {
  let ast = parse_to_string("class Object [ class basicNew <primitive:#Object_Class_BASICNEW> ]");
  let expected = indoc! {"
    Class Object
    ╰─ Class Method basicNew
       ╰─ Primitive (Object_Class_BASICNEW)
  "};
  assert_eq!(ast, expected);

  assert!(parse("class Object [ size <primitive:Foo> ]").is_err());
  assert!(parse("class Object [ size <prim:#Foo> ]").is_err());
}

#[test]
fn super_sends() {
  let ast = parse_to_string("super initialize: 3");
  let expected = indoc! {"
    Main
    ╰─ Keyword Send (initialize:)
       ├─ Super
       ╰─ Integer (3)
  "};
  assert_eq!(ast, expected);
}

#[test]
fn trailing_dots() {
  assert!(parse("1. 2.").is_ok());
  assert!(parse("1. 2. .").is_ok());
  assert!(parse("{1. 2.}").is_ok());
}

#[test]
fn errors() {
  assert!(parse("^").is_err());
  assert!(parse("'unterminated").is_err());
  assert!(parse("\"unterminated").is_err());
  assert!(parse("(1 + 2").is_err());
  assert!(parse("class T [ f ]").is_err());
  assert!(parse("3 ¬ 4").is_err());
  assert!(parse("3 ; 4").is_err());

  let ast = parse("^1. class T []");
  assert!(matches!(ast.errors[0], ParseError::ClassAfterStatements(_)));

  let ast = parse("99999999999");
  assert!(matches!(ast.errors[0], ParseError::IntegerOutOfRange(_)));

  assert!(parse("-2147483648").is_ok());
}

#[test]
fn recovers_after_error() {
  let ast = parse("x := . y := 2. z := )");
  assert_eq!(ast.errors.len(), 2);
  assert_eq!(ast.main.statements().len(), 3);
}

#[test]
fn error_messages() {
  let ast = parse("(1 + 2");
  let error = &ast.errors[0];
  assert_eq!(error.title(), "Expected )");
  assert_eq!(error.message(), "expected ) but got End of File");
}

#[test]
fn line_and_column() {
  let ast = parse("x := 1.\n  y foo");
  let lines = ast.line_index();
  let span: Span = ast.tokens[5].into();
  assert_eq!(lines.line(span), 2);
  assert_eq!(lines.location(span.start), Location { line: 2, column: 5 });
  assert_eq!(lines.offset(Location { line: 2, column: 5 }), Some(span.start));
  assert_eq!(lines.offset(Location { line: 3, column: 1 }), None);
}

#[test]
fn line_spans() {
  let source = "a\nbc\n";
  let lines = LineIndex::from_source(source);

  assert_eq!(lines.line_span(1).source_text(source), "a\n");
  assert_eq!(lines.line_span(2).source_text(source), "bc\n");
  assert_eq!(lines.line_span(3).source_text(source), "");
  assert_eq!(lines.final_line(Span::at(5)), 3);
}
