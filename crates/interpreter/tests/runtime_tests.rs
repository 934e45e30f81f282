//! # Runtime Tests
//!
//! Check that the result and output of the interpreted code is correct.

use indoc::indoc;
use smalltalk_interpreter::{CompileOptions, MAIN_CLASS, RuntimeError, VM, compile, compile_with};
use smalltalk_syntax::parse;

fn vm(source: &str, options: CompileOptions) -> VM<Vec<u8>> {
  let ast = parse(source.to_owned());
  assert!(ast.is_valid(), "{:?}", ast.errors);

  let compilation = compile_with(&ast, options);
  assert!(compilation.is_valid(), "{:?}", compilation.errors);

  VM::with_output(compilation.class_table(), Vec::new())
}

fn run(source: &str) -> Result<String, RuntimeError> {
  let mut vm = vm(source, CompileOptions::default());
  vm.run(MAIN_CLASS).map(|value| value.to_string())
}

fn run_with_output(source: &str) -> (String, String) {
  let mut vm = vm(source, CompileOptions::default());
  let result = vm.run(MAIN_CLASS).unwrap().to_string();
  let output = String::from_utf8(vm.output().clone()).unwrap();
  (result, output)
}

macro_rules! assert_result {
  ($source:expr, $expected:expr) => {
    match run($source) {
      Ok(result) => assert_eq!(result, $expected, "source: {}", $source),
      Err(error) => panic!("source: {}, unexpected error: {error}", $source),
    }
  };
}

macro_rules! assert_error {
  ($source:expr, $title:expr) => {
    match run($source) {
      Ok(result) => panic!("source: {}, expected an error, got {result}", $source),
      Err(error) => assert_eq!(error.title(), $title, "source: {}", $source),
    }
  };
}

#[test]
fn empty_program() {
  assert_result!("", "nil");
  assert_result!("| x |", "a MainClass");
}

#[test]
fn literals() {
  assert_result!("^nil", "nil");
  assert_result!("^true", "true");
  assert_result!("^false", "false");
  assert_result!("^34", "34");
  assert_result!("^-34", "-34");
  assert_result!("^3.14159", "3.14159");
  assert_result!("^123456.789", "123456.78906");
  assert_result!("^-123456.789", "-123456.78906");
  assert_result!("^$a", "$a");
  assert_result!("^'hello'", "hello");
  assert_result!("^#world", "world");
  assert_result!("^self", "a MainClass");
}

#[test]
fn integer_operators() {
  assert_result!("^1+2", "3");
  assert_result!("^1 - 2", "-1");
  assert_result!("^2*4", "8");
  assert_result!("^4/2", "2");
  assert_result!("^4/3", "1");
  assert_result!("^10=10", "true");
  assert_result!("^1=2", "false");
  assert_result!("^1~=2", "true");
  assert_result!("^1<2", "true");
  assert_result!("^1>2", "false");
  assert_result!("^1<=2", "true");
  assert_result!("^1>=2", "false");
  assert_result!("^5 mod: 4", "1");
  assert_result!("^-7 // 2", "-4");
  assert_result!("^-7 \\\\ 2", "1");
  assert_result!("^5 hash", "5");
}

#[test]
fn operators_are_left_associative() {
  assert_result!("^1 + 2 * 3", "9");
  assert_result!("^1 + (2 * 3)", "7");
  assert_result!("^10 - 2 - 3", "5");
}

#[test]
fn float_operators() {
  assert_result!("^1.5 + 1", "2.5");
  assert_result!("^1 / 2.0", "0.5");
  assert_result!("^0.1 + 0.2", "0.3");
  assert_result!("^2.0 * 3", "6.0");
  assert_result!("^2.5 < 3", "true");
  assert_result!("^2.0 = 2", "true");
  assert_result!("^7.9 asInteger", "7");
  assert_result!("^7 asFloat", "7.0");
}

#[test]
fn conversions() {
  assert_result!("^42 printString", "42");
  assert_result!("^42 printString size", "2");
  assert_result!("^$a asInteger", "97");
  assert_result!("^98 asCharacter", "$b");
  assert_result!("^3 className", "Integer");
  assert_result!("^'abc' asArray", "{$a. $b. $c}");
  assert_result!("^{1. $a. 'b'} asString", "{1. $a. b}");
  assert_result!("^nil asString", "nil");
}

#[test]
fn booleans() {
  assert_result!("^true asString, false asString", "truefalse");
  assert_result!("^true not", "false");
  assert_result!("^false not", "true");
  assert_result!("^true & false", "false");
  assert_result!("^true & true", "true");
}

#[test]
fn conditionals() {
  assert_result!("^(true ifTrue:[99])", "99");
  assert_result!("^(false ifTrue:[99])", "nil");
  assert_result!("^(true ifTrue:[99] ifFalse:[100])", "99");
  assert_result!("^(false ifTrue:[99] ifFalse:[100])", "100");
  assert_result!("^(true ifFalse:[99])", "nil");
  assert_result!("^(false ifFalse:[99])", "99");
  assert_result!("^(false ifFalse:[1] ifTrue:[2])", "1");
  assert_result!("^1 < 2 ifTrue: ['yes'] ifFalse: ['no']", "yes");
}

#[test]
fn and_or() {
  assert_result!("^true and: true", "true");
  assert_result!("^true and: false", "false");
  assert_result!("^false and: true", "false");
  assert_result!("^false and: false", "false");
  assert_result!("^true or: true", "true");
  assert_result!("^true or: false", "true");
  assert_result!("^false or: true", "true");
  assert_result!("^false or: false", "false");
  assert_result!("^false and: [1 / 0]", "false");
}

#[test]
fn arrays() {
  assert_result!("^{1. 2. 3. 4.}", "{1. 2. 3. 4}");
  assert_result!("^{}", "{}");
  assert_result!("^{1. 2+3. 4}", "{1. 5. 4}");
  assert_result!("^{1. 2+3. 4 asString, $a}", "{1. 5. 4$a}");
  assert_result!("^{1. {2. 3}. 4.}", "{1. {2. 3}. 4}");
  assert_result!("^{1. 3.14159. true. 'hi'}", "{1. 3.14159. true. hi}");
  assert_result!("^{1. 2. 3} size", "3");
  assert_result!("^{1. 2. 3} at: 2", "2");

  let source = indoc! {"
    | a |
    a := Array new: 3.
    a at: 2 put: 5.
    ^a
  "};
  assert_result!(source, "{nil. 5. nil}");
}

#[test]
fn large_array_literal() {
  let items: Vec<_> = (0..100).map(|i| i.to_string()).collect();
  let source = format!("^{{{}}}", items.join(". "));
  assert_result!(&source, format!("{{{}}}", items.join(". ")));
}

#[test]
fn strings() {
  assert_result!("^'abc', 'def'", "abcdef");
  assert_result!("^'hello' size", "5");
  assert_result!("^'hello' at: 1", "$h");
  assert_result!("^(String new: 3) size", "3");

  let source = indoc! {"
    | x y |
    x := 'hi'.
    y := 'hi'.
    ^{x == y. x = y. x ~= y. x = 'foo'}
  "};
  assert_result!(source, "{true. true. false. false}");
}

#[test]
fn variables() {
  assert_result!("| x | x := 1. ^x", "1");
  assert_result!("| x | ^x", "nil");
  assert_result!("| x y | x := 1. y := x + 1. x := y * 10. ^{x. y}", "{20. 2}");
}

#[test]
fn objects() {
  let basic_new = indoc! {"
    class T [
      f [^'hi']
    ]
    ^T basicNew f
  "};
  assert_result!(basic_new, "hi");

  let new = indoc! {"
    class T [
      f [^'hi']
    ]
    ^T new f
  "};
  assert_result!(new, "hi");

  let initialize = indoc! {"
    class T [
      | x |
      initialize [x := 1]
      f [^x]
    ]
    ^T new f
  "};
  assert_result!(initialize, "1");

  let initialize_with_value = indoc! {"
    class T [
      | x |
      initialize: v [x := v]
      f [^x]
    ]
    ^(T new: 99) f
  "};
  assert_result!(initialize_with_value, "99");

  assert_result!("class T [] ^T new", "a T");
  assert_result!("class T [] ^T", "T");
  assert_result!("class T [] ^T new className", "T");
}

#[test]
fn class_methods() {
  let source = indoc! {"
    class T [
      class factory [^self new]
      asString [^'blort']
    ]
    ^T factory asString
  "};
  assert_result!(source, "blort");
}

#[test]
fn implicit_return_self() {
  let source = indoc! {"
    class T [
      | x |
      x: value [x := value]
      x [^x]
    ]
    ^(T new x: 5) x
  "};
  assert_result!(source, "5");
}

#[test]
fn inherited_fields() {
  let source = indoc! {"
    class A [
      | x |
      setX: v [x := v]
    ]
    class B : A [
      | y |
      setY: v [y := v]
      sum [^x + y]
    ]
    class C : B []
    | c |
    c := C new.
    c setX: 1.
    c setY: 2.
    ^c sum
  "};
  assert_result!(source, "3");
}

#[test]
fn super_sends() {
  let source = indoc! {"
    class A [
      name [^'A']
    ]
    class B : A [
      name [^'B', super name]
    ]
    class C : B [
      name [^'C', super name]
    ]
    ^C new name
  "};
  assert_result!(source, "CBA");
}

#[test]
fn super_uses_the_class_the_method_is_defined_in() {
  let source = indoc! {"
    class A [
      name [^'A']
    ]
    class B : A [
      name [^'B']
      describe [^super name]
    ]
    class C : B [
      name [^'C']
    ]
    ^C new describe
  "};
  assert_result!(source, "A");
}

#[test]
fn blocks() {
  assert_result!("^[1] value", "1");
  assert_result!("^[] value", "nil");
  assert_result!("^[:x | x + 1] value: 2", "3");
  assert_result!("^[:a :b | a + b] value: 1 value: 2", "3");
  assert_result!("^[:a :b :c :d | a + b + c + d] value: 1 value: 2 value: 3 value: 4", "10");
  assert_result!("^[:a :b | a - b] valueWithArguments: {5. 2}", "3");
  assert_result!("^[:a :b | a] numArgs", "2");
  assert_result!("^[:x | | y | y := x * 2. y] value: 4", "8");
}

#[test]
fn blocks_capture_their_environment() {
  let source = indoc! {"
    | count increment |
    count := 0.
    increment := [count := count + 1].
    increment value.
    increment value.
    ^count
  "};
  assert_result!(source, "2");

  let nested = indoc! {"
    | a |
    a := 1.
    ^[:b | [:c | a + b + c] value: 3] value: 2
  "};
  assert_result!(nested, "6");
}

#[test]
fn block_activations_are_independent() {
  let source = indoc! {"
    | adder add1 add10 |
    adder := [:n | [:x | x + n]].
    add1 := adder value: 1.
    add10 := adder value: 10.
    ^{add1 value: 5. add10 value: 5. add1 value: 7}
  "};
  assert_result!(source, "{6. 15. 8}");

  let locals = indoc! {"
    | block |
    block := [:x | | y | y isNil ifTrue: [y := x]. y].
    ^{block value: 1. block value: 2}
  "};
  assert_result!(locals, "{1. 2}");
}

#[test]
fn non_local_return() {
  let source = indoc! {"
    class T [
      find: x in: items [
        items do: [:each | each = x ifTrue: [^'found']].
        ^'missing'
      ]
    ]
    ^{T new find: 2 in: {1. 2. 3}. T new find: 4 in: {1. 2. 3}}
  "};
  assert_result!(source, "{found. missing}");

  let through_helpers = indoc! {"
    class Helper [
      call: block [^self callAgain: block]
      callAgain: block [block value. ^'helper returned']
    ]
    class T [
      f [
        Helper new call: [^'escaped'].
        ^'fell through'
      ]
    ]
    ^T new f
  "};
  assert_result!(through_helpers, "escaped");

  assert_result!("[^1] value. ^2", "1");
}

#[test]
fn loops() {
  let to_do = indoc! {"
    | sum |
    sum := 0.
    1 to: 10 do: [:i | sum := sum + i].
    ^sum
  "};
  assert_result!(to_do, "55");

  let while_true = indoc! {"
    | i product |
    i := 1.
    product := 1.
    [i <= 5] whileTrue: [product := product * i. i := i + 1].
    ^product
  "};
  assert_result!(while_true, "120");

  let times_repeat = indoc! {"
    | count |
    count := 0.
    3 timesRepeat: [count := count + 2].
    ^count
  "};
  assert_result!(times_repeat, "6");

  let r#do = indoc! {"
    | sum |
    sum := 0.
    {1. 2. 3} do: [:x | sum := sum + x].
    ^sum
  "};
  assert_result!(r#do, "6");
}

#[test]
fn long_running_loops() {
  let to_do = indoc! {"
    | sum |
    sum := 0.
    1 to: 200000 do: [:i | sum := sum + 1].
    ^sum
  "};
  assert_result!(to_do, "200000");

  let while_false = indoc! {"
    | i |
    i := 0.
    [i >= 100000] whileFalse: [i := i + 1].
    ^i
  "};
  assert_result!(while_false, "100000");

  let nested = indoc! {"
    | count |
    count := 0.
    1 to: 300 do: [:i | 1 to: 300 do: [:j | count := count + 1]].
    ^count
  "};
  assert_result!(nested, "90000");

  assert_result!("^[false] whileTrue: [1]", "nil");
  assert_result!("^[true] whileFalse: [1]", "nil");
}

#[test]
fn loops_keep_the_stack_flat() {
  let source = indoc! {"
    | i |
    i := 0.
    [i < 50000] whileTrue: [i := i + 1].
    [true] whileTrue: [nil foo]
  "};
  let error = run(source).unwrap_err();

  assert_eq!(error.title(), "Message Not Understood");
  assert_eq!(error.frames().len(), 2);
}

#[test]
fn return_from_inside_loops() {
  assert_result!("1 to: 10 do: [:i | i = 3 ifTrue: [^i]]. ^0", "3");
  assert_result!("| i | i := 0. [true] whileTrue: [i := i + 1. i = 5 ifTrue: [^i]]", "5");

  let method = indoc! {"
    class T [
      find: n [
        1 to: 10 do: [:i | i = n ifTrue: [^i * 10]].
        ^0
      ]
    ]
    | sum |
    sum := 0.
    1 to: 3 do: [:j | sum := sum + (T new find: j)].
    ^sum
  "};
  assert_result!(method, "60");
}

#[test]
fn loop_errors() {
  assert_error!("^[3] whileTrue: [1]", "Type Error");
  assert_error!("^[true] whileTrue: 3", "Type Error");
  assert_error!("^[:x | x] whileTrue: [1]", "Mismatched Block Arguments");
  assert_error!("^[true] whileFalse: [:x | x]", "Mismatched Block Arguments");
}

#[test]
fn standard_image_methods() {
  assert_result!("^nil isNil", "true");
  assert_result!("^3 isNil", "false");
  assert_result!("^3 notNil", "true");
  assert_result!("^3 max: 7", "7");
  assert_result!("^-3 abs", "3");
  assert_result!("^{} isEmpty", "true");
  assert_result!("class T [] | t | t := T new. ^{t = t. t = T new. t ~= T new}", "{true. false. true}");
}

#[test]
fn transcript() {
  let (result, output) = run_with_output(indoc! {"
    Transcript show: 'hello'.
    Transcript show: 3 + 4.
    Transcript show: {1. $a}
  "});
  assert_eq!(result, "a MainClass");
  assert_eq!(output, "hello\n7\n{1. $a}\n");
}

#[test]
fn message_not_understood() {
  assert_error!("^3 foo", "Message Not Understood");
  assert_error!("class T [] ^T new foo: 1", "Message Not Understood");

  let error = run("^nil foo").unwrap_err();
  assert_eq!(error.message(), "UndefinedObject does not understand #foo");
}

#[test]
fn class_instance_mismatch() {
  let instance_method = indoc! {"
    class T [
      f [^1]
    ]
    ^T f
  "};
  assert_error!(instance_method, "Instance Message Sent To Class");

  let class_method = indoc! {"
    class T [
      class make [^self new]
    ]
    ^T new make
  "};
  assert_error!(class_method, "Class Message Sent To Instance");

  assert_error!("class T [] ^T new new", "Class Message Sent To Instance");
}

#[test]
fn block_cannot_return() {
  let source = indoc! {"
    class T [
      make [^[:x | ^x]]
    ]
    ^(T new make) value: 3
  "};
  assert_error!(source, "Block Cannot Return");
}

#[test]
fn runtime_errors() {
  assert_error!("^undefinedThing", "Undefined Global");
  assert_error!("^Missing new", "Unknown Class");
  assert_error!("^[:x | x] value", "Mismatched Block Arguments");
  assert_error!("^[:x | x] value: 1 value: 2", "Mismatched Block Arguments");
  assert_error!("^[:x | x] value: 1 value: 2 value: 3 value: 4 value: 5", "Message Not Understood");
  assert_error!("^{1. 2} at: 3", "Index Out Of Range");
  assert_error!("^'abc' at: 0", "Index Out Of Range");
  assert_error!("^1 / 0", "Division By Zero");
  assert_error!("^1 // 0", "Division By Zero");
  assert_error!("^1 + 'a'", "Type Error");
  assert_error!("^3 ifTrue: [1]", "Message Not Understood");
  assert_error!("^true ifTrue: [:x | x]", "Mismatched Block Arguments");
}

#[test]
fn traceback() {
  let source = indoc! {"
    class T [ f [^1 / 0] ]
    ^T new f
  "};
  let error = run(source).unwrap_err();

  assert_eq!(error.message(), "division by zero");
  assert_eq!(
    error.traceback().unwrap(),
    "    at T>>f(main.st:1:17)\n    at MainClass>>main(main.st:2:8)"
  );
}

#[test]
fn traceback_for_missing_globals() {
  let error = run("^Missing").unwrap_err();
  assert_eq!(error.title(), "Unknown Class");
  assert_eq!(error.traceback().unwrap(), "    at MainClass>>main(main.st:1:2)");

  let error = run("| a |\na := 1.\n^{a. undefinedThing}").unwrap_err();
  assert_eq!(error.title(), "Undefined Global");
  assert_eq!(error.traceback().unwrap(), "    at MainClass>>main(main.st:3:6)");
}

#[test]
fn traceback_through_blocks() {
  let source = indoc! {"
    ^[:x | x foo] value: 1
  "};
  let error = run(source).unwrap_err();

  assert_eq!(
    error.traceback().unwrap(),
    "    at MainClass>>main>>block0(main.st:1:10)\n    at MainClass>>main(main.st:1:15)"
  );
}

#[test]
fn traceback_without_debug_markers() {
  let options = CompileOptions {
    debug_markers: false,
    ..CompileOptions::default()
  };
  let mut vm = vm("class T [ f [^1 / 0] ] ^T new f", options);
  let error = vm.run(MAIN_CLASS).unwrap_err();

  assert_eq!(error.traceback().unwrap(), "    at T>>f\n    at MainClass>>main");
}

#[test]
fn program_without_image() {
  let options = || CompileOptions {
    load_image: false,
    ..CompileOptions::default()
  };

  let mut builtins = vm("^{1 + 2. 'a', 'b'. 3 > 4}", options());
  assert_eq!(builtins.run(MAIN_CLASS).unwrap().to_string(), "{3. ab. false}");

  let mut missing = vm("^3 isNil", options());
  assert_eq!(missing.run(MAIN_CLASS).unwrap_err().title(), "Message Not Understood");
}

#[test]
fn compile_and_run_separately() {
  let ast = parse("^6 * 7".to_owned());
  let compilation = compile(&ast);
  let value = smalltalk_interpreter::execute(compilation.class_table(), MAIN_CLASS).unwrap();
  assert_eq!(value.to_string(), "42");
}
