//! # Compiler Error Tests
//!
//! Inputs which declare or reference names incorrectly, or are pathologically large, so
//! code can't be generated for them.

use indoc::indoc;
use smalltalk_interpreter::{Compilation, CompileErrorKind, CompileOptions, compile, compile_with};
use smalltalk_syntax::parse;

fn compile_source(source: &str) -> Compilation {
  let ast = parse(source.to_owned());
  assert!(ast.is_valid(), "{:?}", ast.errors);
  compile(&ast)
}

fn messages(source: &str) -> Vec<String> {
  let compilation = compile_source(source);
  compilation.errors.iter().map(|error| error.message()).collect()
}

#[test]
fn class_redefinition() {
  let source = indoc! {"
    class T []
    class T []
  "};
  assert_eq!(messages(source), ["redefinition of class T"]);

  // classes from the standard image can't be redefined either
  assert_eq!(messages("class Object []"), ["redefinition of class Object"]);
}

#[test]
fn reserved_class_name() {
  assert_eq!(messages("class MainClass []"), ["MainClass is a reserved class name"]);
}

#[test]
fn unknown_superclass() {
  let compilation = compile_source("class T : Missing [ f [^1] ]");
  let messages: Vec<_> = compilation.errors.iter().map(|error| error.message()).collect();
  assert_eq!(messages, ["unknown superclass Missing of T"]);

  // the class is still declared, inheriting from the default superclass
  assert!(compilation.unit("T", "f").is_some());
}

#[test]
fn method_redefinition() {
  let source = indoc! {"
    class T [
      f [^1]
      f [^2]
    ]
  "};
  assert_eq!(messages(source), ["redefinition of method f in T"]);
}

#[test]
fn methods_on_both_sides_are_not_redefinitions() {
  let source = indoc! {"
    class T [
      f [^1]
      class f [^2]
    ]
  "};
  assert_eq!(messages(source), Vec::<String>::new());
}

#[test]
fn variable_redefinition() {
  assert_eq!(messages("| x x | ^x"), ["redefinition of x in MainClass>>main"]);

  let source = indoc! {"
    class T [
      | a a |
      f: x g: x [^x]
    ]
  "};
  assert_eq!(
    messages(source),
    ["redefinition of a in T", "redefinition of x in T>>f:g:"]
  );

  let block = "^[:a :a | a] value: 1 value: 2";
  assert_eq!(messages(block), ["redefinition of a in MainClass>>main>>block0"]);
}

#[test]
fn locals_can_shadow_enclosing_scopes() {
  let source = indoc! {"
    class T [
      | x |
      f: y [ | x | [:y | y] value: 1. ^x ]
    ]
  "};
  assert_eq!(messages(source), Vec::<String>::new());
}

#[test]
fn unknown_primitive() {
  let source = "class T [ f <primitive:#Missing_PRIMITIVE> ]";
  assert_eq!(messages(source), ["unknown primitive #Missing_PRIMITIVE in T>>f"]);
}

#[test]
fn unknown_variable() {
  assert_eq!(messages("y := 1"), ["unknown variable y in MainClass>>main"]);
  assert_eq!(
    messages("^[ z := 4 ] value"),
    ["unknown variable z in MainClass>>main>>block0"]
  );
}

#[test]
fn not_a_variable() {
  assert_eq!(
    messages("Object := 1"),
    ["symbol Object is not a variable/argument in MainClass>>main"]
  );
  assert_eq!(
    messages("class T [ f [^1] g [f := 2] ]"),
    ["symbol f is not a variable/argument in T>>g"]
  );
  assert_eq!(
    messages("class T [ f [^1] ] class S : T [ g [^[f := 2]] ]"),
    ["symbol f is not a variable/argument in S>>g>>block0"]
  );
}

#[test]
fn fields_shadow_accessors() {
  let source = indoc! {"
    class Point [
      | x |
      x [^x]
      x: value [x := value]
    ]
  "};
  assert_eq!(messages(source), Vec::<String>::new());
}

#[test]
fn undeclared_names_are_globals() {
  // references to unknown names are looked up at runtime instead
  assert_eq!(messages("^Transcript show: undeclared"), Vec::<String>::new());
}

#[test]
fn errors_skip_only_the_failing_method() {
  let source = indoc! {"
    class T [
      good [^1]
      bad [ missing := 2 ]
      alsoBad [ ^[ alsoMissing := 3 ] ]
    ]
  "};
  let compilation = compile_source(source);

  assert_eq!(compilation.errors.len(), 2);
  assert!(compilation.unit("T", "good").is_some());
  assert!(compilation.unit("T", "bad").is_none());
  assert!(compilation.unit("T", "alsoBad").is_none());
}

#[test]
fn multiple_errors_are_reported() {
  let source = indoc! {"
    class T []
    class T []
    class U : V []
    | a a |
    b := 1
  "};
  assert_eq!(
    messages(source),
    [
      "redefinition of class T",
      "unknown superclass V of U",
      "redefinition of a in MainClass>>main",
      "unknown variable b in MainClass>>main",
    ]
  );
}

#[test]
fn compiling_is_idempotent() {
  let source = indoc! {"
    class T [
      f [ x := 1 ]
      f [ ^2 ]
    ]
    y := 3
  "};

  let first = compile_source(source);
  let second = compile_source(source);
  assert!(!first.errors.is_empty());
  assert_eq!(first.errors, second.errors);
}

#[test]
fn invalid_ast() {
  let ast = parse("^1 + .".to_owned());
  assert!(!ast.is_valid());

  let compilation = compile(&ast);
  assert!(
    (compilation.errors.iter())
      .any(|error| matches!(error.kind(), CompileErrorKind::InvalidAST { .. }))
  );
}

#[test]
#[cfg_attr(miri, ignore)] // reason: test has pathological input, so is very slow
fn too_many_variables() {
  fn generate_locals(count: u32) -> String {
    let mut source = "|".to_owned();
    for i in 0..count {
      source.push_str(&format!(" v{i}"));
    }
    source.push_str(" | ^v0");
    source
  }

  let compilation = compile_source(&generate_locals(u32::from(u16::MAX)));
  assert!(compilation.is_valid());

  let compilation = compile_source(&generate_locals(u32::from(u16::MAX) + 1));
  assert!(matches!(
    compilation.errors[..],
    [ref error] if matches!(error.kind(), CompileErrorKind::TooManyVariables { .. })
  ));
}

#[test]
#[cfg_attr(miri, ignore)] // reason: test has pathological input, so is very slow
fn too_many_literals() {
  fn generate_strings(count: u32) -> String {
    let mut source = String::new();
    for i in 0..count {
      source.push_str(&format!("'string: {i}'.\n"));
    }
    source
  }

  // the file name for debug markers takes the first literal
  let compilation = compile_source(&generate_strings(u32::from(u16::MAX)));
  assert!(compilation.is_valid());

  let compilation = compile_source(&generate_strings(u32::from(u16::MAX) + 1));
  assert!(matches!(
    compilation.errors[..],
    [ref error] if matches!(error.kind(), CompileErrorKind::TooManyLiterals { .. })
  ));

  // without debug markers there is space for one more literal
  let ast = parse(generate_strings(u32::from(u16::MAX) + 1));
  let options = CompileOptions {
    debug_markers: false,
    ..CompileOptions::default()
  };
  assert!(compile_with(&ast, options).is_valid());
}
