//! # UI Tests for Debug Print Commands
#![cfg(not(miri))]

use assert_cmd::Command;
use indoc::indoc;

fn print(args: &[&str], file: &str) -> String {
  let output = Command::cargo_bin(env!("CARGO_PKG_NAME"))
    .unwrap()
    .arg("print")
    .args(args)
    .write_stdin(file)
    .output()
    .unwrap();

  assert!(output.status.success());
  assert!(output.stderr.is_empty());
  String::from_utf8(output.stdout).unwrap()
}

#[test]
fn tokens() {
  let output = print(&["tokens", "-"], "x := 3 + 4.\n^x");
  let expected = indoc! {"
        ╭─[Tokens: STDIN]
      0 │ Identifier (length: 1)
      2 │ :=
      5 │ Number (length: 1)
      7 │ Operator (length: 1)
      9 │ Number (length: 1)
     10 │ .
     12 │ ^
     13 │ Identifier (length: 1)
    ────╯
  "};
  assert_eq!(output, expected);
}

#[test]
fn tokens_keep_comments() {
  let output = print(&["tokens", "-"], "\"note\" ^self");
  let expected = indoc! {"
        ╭─[Tokens: STDIN]
      0 │ Comment (length: 6)
      7 │ ^
      8 │ self
    ────╯
  "};
  assert_eq!(output, expected);
}

#[test]
fn ast() {
  let output = print(&["ast", "-"], "^3 + 4");

  assert!(output.starts_with("╭─[Abstract Syntax Tree: STDIN]\n"));
  assert!(output.ends_with("╯\n"));
}

#[test]
fn bytecode() {
  let output = print(&["bytecode", "--no-debug", "-"], "^1 + 2");
  let expected = indoc! {"
          ╭─[Bytecode: MainClass>>main]
     0000 │ PushInteger 1
     0005 │ PushInteger 2
     0010 │ Send #+ (1)
     0015 │ Return
    ──────╯
  "};
  assert_eq!(output, expected);
}

#[test]
fn bytecode_includes_classes() {
  let output = print(&["bytecode", "-"], "class T [ f [ ^1 ] ] ^T new f");

  assert!(output.contains("╭─[Bytecode: T>>f]"));
  assert!(output.contains("╭─[Bytecode: MainClass>>main]"));
  assert!(output.find("T>>f").unwrap() < output.find("MainClass>>main").unwrap());
}

#[test]
fn classes() {
  let output = print(&["classes", "-"], "class Point [ | x y | ] ^Point new");

  assert!(output.contains("Point : Object\n  fields: x y\n"));
  assert!(output.contains("Object\n"));
}
