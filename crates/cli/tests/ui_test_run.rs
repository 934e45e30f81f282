//! # UI Tests for Running Programs
#![cfg(not(miri))]

use assert_cmd::Command;
use indoc::indoc;

fn run(file: &str) -> String {
  let output = Command::cargo_bin(env!("CARGO_PKG_NAME"))
    .unwrap()
    .args(["run", "-"])
    .write_stdin(file)
    .output()
    .unwrap();

  assert!(output.status.success());
  assert!(output.stderr.is_empty());
  String::from_utf8(output.stdout).unwrap()
}

#[test]
fn prints_result() {
  assert_eq!(run("^3 + 4"), "7\n");
  assert_eq!(run("^'hello', ' world'"), "hello world\n");
  assert_eq!(run("^{1. 2.5. $a}"), "{1. 2.5. $a}\n");
}

#[test]
fn transcript_then_result() {
  assert_eq!(run("Transcript show: 'hello'. ^3 + 4"), "hello\n7\n");
}

#[test]
fn without_return_prints_main_object() {
  assert_eq!(run("1 + 2"), "a MainClass\n");
}

#[test]
fn classes_and_blocks() {
  let source = indoc! {"
    class Counter [
      | count |
      initialize [ count := 0 ]
      increment [ count := count + 1 ]
      count [ ^count ]
    ]
    | counter |
    counter := Counter new.
    1 to: 5 do: [:i | counter increment].
    ^counter count
  "};
  assert_eq!(run(source), "5\n");
}

#[test]
fn file_not_found() {
  let output = Command::cargo_bin(env!("CARGO_PKG_NAME"))
    .unwrap()
    .args(["run", "missing.st"])
    .output()
    .unwrap();

  assert_eq!(output.status.code(), Some(2));
  let stderr = String::from_utf8(output.stderr).unwrap();
  assert_eq!(stderr, "✕ Error: File not found `missing.st`\n\n");
}
