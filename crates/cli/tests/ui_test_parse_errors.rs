//! # UI Tests for Parse and Compile Errors
#![cfg(not(miri))]

use assert_cmd::Command;
use indoc::indoc;

fn run_stderr(file: &str) -> String {
  let output = Command::cargo_bin(env!("CARGO_PKG_NAME"))
    .unwrap()
    .args(["run", "-"])
    .write_stdin(file)
    .output()
    .unwrap();

  assert_eq!(output.status.code(), Some(2));
  assert!(output.stdout.is_empty());
  String::from_utf8(output.stderr).unwrap()
}

#[test]
fn expected_closing_paren() {
  let output = run_stderr("^(1 + 2");
  let expected = indoc! {"
    ✕ Error: Expected )
    expected ) but got End of File

        ╭─[STDIN:1]
      1 │ ^(1 + 2
    ────╯
  "};
  assert_eq!(output, expected);
}

#[test]
fn expected_expression() {
  let output = run_stderr("x := 1 +");
  let expected = indoc! {"
    ✕ Error: Expected Expression
    expected expression but got End of File

        ╭─[STDIN:1]
      1 │ x := 1 +
    ────╯
  "};
  assert_eq!(output, expected);
}

#[test]
fn errors_in_later_statements() {
  let output = run_stderr("x := (5 3).\n^x foo:");
  let expected = indoc! {"
    ✕ Error: Expected )
    expected ) but got Number

        ╭─[STDIN:1]
      1 │ x := (5 3).
    ────╯
    ✕ Error: Expected Expression
    expected expression but got End of File

        ╭─[STDIN:2]
      2 │ ^x foo:
    ────╯
  "};
  assert_eq!(output, expected);
}

#[test]
fn class_after_statements() {
  let file = indoc! {"
    ^1.
    class T []
  "};
  let output = run_stderr(file);
  let expected = indoc! {"
    ✕ Error: Class After Statements
    classes must be defined before the top-level statements

        ╭─[STDIN:2]
      2 │ class T []
    ────╯
  "};
  assert_eq!(output, expected);
}

#[test]
fn unknown_character() {
  let output = run_stderr("^£");
  let expected = indoc! {"
    ✕ Error: Unknown Character
    got unknown character

        ╭─[STDIN:1]
      1 │ ^£
    ────╯
  "};
  assert_eq!(output, expected);
}

#[test]
fn unterminated_string() {
  let file = indoc! {"
    'hello
  "};
  let output = run_stderr(file);
  let expected = indoc! {"
    ✕ Error: Unterminated String
    missing closing quote for string

        ╭─[STDIN:1]
      1 │ 'hello
      2 │
    ────╯
  "};
  assert_eq!(output, expected);
}

#[test]
fn unknown_variable() {
  let output = run_stderr("y := 1");
  let expected = indoc! {"
    ✕ Error: Unknown Variable
    unknown variable y in MainClass>>main

        ╭─[STDIN:1]
      1 │ y := 1
    ────╯
  "};
  assert_eq!(output, expected);
}
