use crate::{
  bytecode::{CompiledUnit, OpCode, UnitBuilder},
  collections::HashMap,
  compile_with,
  context::Environment,
  primitives::{Outcome, Primitive},
  symbols::{DeclarationError, ScopeId, ScopeKind, SymbolKind, SymbolTable},
  value::Value,
  Compilation, CompileOptions,
};
use indoc::indoc;
use smalltalk_syntax::parse;
use std::rc::Rc;

fn compile_without_markers(source: &str) -> Compilation {
  let ast = parse(source.to_owned());
  assert!(ast.is_valid(), "{:?}", ast.errors);

  let options = CompileOptions {
    debug_markers: false,
    ..CompileOptions::default()
  };
  let compilation = compile_with(&ast, options);
  assert!(compilation.is_valid(), "{:?}", compilation.errors);
  compilation
}

fn opcodes(unit: &CompiledUnit) -> Vec<OpCode> {
  let mut opcodes = Vec::new();
  let mut position = 0;
  while let Some(opcode) = unit.opcode(position) {
    opcodes.push(opcode);
    position += opcode.length();
  }
  opcodes
}

fn class_scope(symbols: &mut SymbolTable, name: &str, superclass: Option<ScopeId>) -> ScopeId {
  let field_count = superclass.map_or(0, |superclass| match symbols[superclass].kind {
    ScopeKind::Class { field_count, .. } => field_count,
    _ => 0,
  });
  let kind = ScopeKind::Class {
    superclass,
    field_count,
    methods: HashMap::default(),
    class_methods: HashMap::default(),
  };
  let scope = symbols.add_scope(name, kind, SymbolTable::GLOBAL);
  symbols
    .declare(SymbolTable::GLOBAL, name, SymbolKind::Class(scope))
    .unwrap();
  scope
}

fn method_scope(symbols: &mut SymbolTable, class: ScopeId, selector: &str) -> ScopeId {
  let kind = ScopeKind::Method {
    class_side: false,
    block_count: 0,
  };
  let scope = symbols.add_scope(selector, kind, class);
  let method = SymbolKind::Method {
    scope,
    class_side: false,
  };
  symbols.declare_method(class, selector, method).unwrap();
  scope
}

#[test]
fn fields_are_numbered_after_inherited_fields() {
  let mut symbols = SymbolTable::new();
  let point = class_scope(&mut symbols, "Point", None);
  symbols.declare(point, "x", SymbolKind::Field).unwrap();
  symbols.declare(point, "y", SymbolKind::Field).unwrap();

  let point3d = class_scope(&mut symbols, "Point3D", Some(point));
  let z = symbols.declare(point3d, "z", SymbolKind::Field).unwrap();

  assert_eq!(symbols[z].index, 2);
  let names: Vec<_> = (symbols.fields(point3d).into_iter())
    .map(|field| symbols[field].name.to_string())
    .collect();
  assert_eq!(names, ["x", "y", "z"]);
}

#[test]
fn arguments_come_before_locals() {
  let mut symbols = SymbolTable::new();
  let class = class_scope(&mut symbols, "T", None);
  let method = method_scope(&mut symbols, class, "at:put:");

  symbols.declare(method, "index", SymbolKind::Argument).unwrap();
  symbols.declare(method, "value", SymbolKind::Argument).unwrap();
  let temp = symbols.declare(method, "temp", SymbolKind::Local).unwrap();

  assert_eq!(symbols[temp].index, 2);
  assert_eq!(symbols[method].argument_count, 2);
  assert_eq!(symbols[method].local_count(), 1);
}

#[test]
fn duplicate_declarations() {
  let mut symbols = SymbolTable::new();
  let class = class_scope(&mut symbols, "T", None);
  let method = method_scope(&mut symbols, class, "f");

  symbols.declare(method, "a", SymbolKind::Local).unwrap();
  assert_eq!(
    symbols.declare(method, "a", SymbolKind::Local),
    Err(DeclarationError::DuplicateDefinition)
  );

  let class_side = SymbolKind::Method {
    scope: method,
    class_side: true,
  };
  assert!(symbols.declare_method(class, "f", class_side).is_ok());
  assert!(symbols.has_method(class, "f", false));
  assert!(symbols.has_method(class, "f", true));

  let instance_side = SymbolKind::Method {
    scope: method,
    class_side: false,
  };
  assert_eq!(
    symbols.declare_method(class, "f", instance_side),
    Err(DeclarationError::DuplicateDefinition)
  );
}

#[test]
fn blocks_are_numbered_within_their_method() {
  let mut symbols = SymbolTable::new();
  let class = class_scope(&mut symbols, "T", None);
  let method = method_scope(&mut symbols, class, "do:");

  let (_, outer) = symbols.declare_block(method);
  let (_, inner) = symbols.declare_block(outer);
  let (_, sibling) = symbols.declare_block(method);

  assert_eq!(symbols[inner].kind, ScopeKind::Block { index: 1 });
  assert_eq!(symbols[sibling].kind, ScopeKind::Block { index: 2 });
  assert_eq!(symbols.qualified_name(inner).as_str(), "T>>do:>>block0>>block1");
  assert_eq!(symbols.enclosing_method(inner), Some(method));
  assert_eq!(symbols.enclosing_class(inner), Some(class));
}

#[test]
fn variable_depth() {
  let mut symbols = SymbolTable::new();
  let class = class_scope(&mut symbols, "T", None);
  let method = method_scope(&mut symbols, class, "f");
  let (_, outer) = symbols.declare_block(method);
  let (_, inner) = symbols.declare_block(outer);

  assert_eq!(symbols.depth(inner, inner), Some(0));
  assert_eq!(symbols.depth(inner, outer), Some(1));
  assert_eq!(symbols.depth(inner, method), Some(2));
  assert_eq!(symbols.depth(method, class), Some(1));
  assert_eq!(symbols.depth(inner, SymbolTable::GLOBAL), None);
}

#[test]
fn resolve_finds_fields_before_methods() {
  let mut symbols = SymbolTable::new();
  let parent = class_scope(&mut symbols, "Parent", None);
  method_scope(&mut symbols, parent, "size");
  let child = class_scope(&mut symbols, "Child", Some(parent));
  let field = symbols.declare(child, "size", SymbolKind::Field).unwrap();
  let method = method_scope(&mut symbols, child, "name");

  assert_eq!(symbols.resolve(method, "size"), Ok(field));
  let name = symbols.resolve(method, "name").unwrap();
  assert!(!symbols[name].is_variable());
  assert!(symbols.resolve(parent, "size").is_ok_and(|size| !symbols[size].is_variable()));
}

#[test]
fn resolve_searches_superclasses_then_enclosing_scopes() {
  let mut symbols = SymbolTable::new();
  let parent = class_scope(&mut symbols, "Parent", None);
  let inherited = symbols.declare(parent, "inherited", SymbolKind::Field).unwrap();
  let child = class_scope(&mut symbols, "Child", Some(parent));
  let method = method_scope(&mut symbols, child, "f");
  let (_, block) = symbols.declare_block(method);
  let shadow = symbols.declare(block, "inherited", SymbolKind::Argument).unwrap();

  assert_eq!(symbols.resolve(method, "inherited"), Ok(inherited));
  assert_eq!(symbols.resolve(block, "inherited"), Ok(shadow));
  assert!(symbols.resolve(method, "Parent").is_ok());
  assert!(symbols.resolve(method, "missing").is_err());
}

#[test]
fn literals_are_interned() {
  let mut builder = UnitBuilder::new("T>>f".into(), "T".into());
  assert_eq!(builder.add_literal("a"), Some(0));
  assert_eq!(builder.add_literal("b"), Some(1));
  assert_eq!(builder.add_literal("a"), Some(0));

  let unit = builder.finalize().unwrap();
  assert_eq!(unit.literals.len(), 2);
}

#[test]
fn unit_with_missing_block_is_not_finalized() {
  let mut builder = UnitBuilder::new("T>>f".into(), "T".into());
  let block = UnitBuilder::new("T>>f>>block1".into(), "T".into());
  builder.add_block(1, Rc::new(block.finalize().unwrap()));

  assert!(builder.finalize().is_none());
}

#[test]
fn disassemble() {
  let compilation = compile_without_markers("^1 + 2");
  let main = compilation.unit("MainClass", "main").unwrap();

  let expected = indoc! {"
          ╭─[Bytecode: MainClass>>main]
     0000 │ PushInteger 1
     0005 │ PushInteger 2
     0010 │ Send #+ (1)
     0015 │ Return
    ──────╯
  "};
  assert_eq!(main.to_string(), expected);
}

#[test]
fn disassemble_with_debug_markers() {
  let ast = parse("^x".to_owned());
  let compilation = crate::compile(&ast);
  let main = compilation.unit("MainClass", "main").unwrap();

  let expected = indoc! {"
          ╭─[Bytecode: MainClass>>main]
     0000 │ Debug 'main.st' 1:2
     0007 │ PushGlobal 'x' (1)
     0010 │ Debug 'main.st' 1:1
     0017 │ Return
    ──────╯
  "};
  assert_eq!(main.to_string(), expected);
}

#[test]
fn method_without_return_returns_self() {
  let compilation = compile_without_markers("class T [ f [ 1 ] g [] ]");

  let f = compilation.unit("T", "f").unwrap();
  assert_eq!(
    opcodes(f),
    [OpCode::PushInteger, OpCode::Pop, OpCode::SelfRef, OpCode::Return]
  );

  let g = compilation.unit("T", "g").unwrap();
  assert_eq!(opcodes(g), [OpCode::SelfRef, OpCode::Return]);
}

#[test]
fn statements_are_popped() {
  let compilation = compile_without_markers("1. 2. ^3");
  let main = compilation.unit("MainClass", "main").unwrap();

  assert_eq!(
    opcodes(main),
    [
      OpCode::PushInteger,
      OpCode::Pop,
      OpCode::PushInteger,
      OpCode::Pop,
      OpCode::PushInteger,
      OpCode::Return
    ]
  );
}

#[test]
fn block_bodies() {
  let compilation = compile_without_markers("^{[:x | x]. []. [^1]}");
  let main = compilation.unit("MainClass", "main").unwrap();

  assert_eq!(main.blocks.len(), 3);
  assert_eq!(main.blocks[0].argument_count, 1);
  assert_eq!(opcodes(&main.blocks[0]), [OpCode::PushLocal, OpCode::BlockReturn]);
  assert_eq!(opcodes(&main.blocks[1]), [OpCode::Nil, OpCode::BlockReturn]);
  assert_eq!(opcodes(&main.blocks[2]), [OpCode::PushInteger, OpCode::Return]);
}

#[test]
fn nested_blocks_are_stored_in_the_method() {
  let compilation = compile_without_markers("| a | ^[:b | [a + b]]");
  let main = compilation.unit("MainClass", "main").unwrap();

  assert_eq!(main.blocks.len(), 2);
  assert_eq!(main.blocks[1].name.as_str(), "MainClass>>main>>block0>>block1");
  assert!(main.blocks[0].blocks.is_empty());

  // `a` is two environments up from the inner block, `b` is one
  let inner = &main.blocks[1];
  assert_eq!((inner.read_u16(1), inner.read_u16(3)), (2, 0));
  assert_eq!((inner.read_u16(6), inner.read_u16(8)), (1, 0));
}

#[test]
fn field_access() {
  let source = indoc! {"
    class A [ | a | ]
    class B : A [
      | b |
      f [^b]
      g: x [b := x]
    ]
  "};
  let compilation = compile_without_markers(source);

  let f = compilation.unit("B", "f").unwrap();
  assert_eq!(opcodes(f), [OpCode::PushField, OpCode::Return]);
  assert_eq!(f.read_u16(1), 1);

  let g = compilation.unit("B", "g:").unwrap();
  assert_eq!(
    opcodes(g),
    [
      OpCode::PushLocal,
      OpCode::StoreField,
      OpCode::Pop,
      OpCode::SelfRef,
      OpCode::Return
    ]
  );
}

#[test]
fn super_send() {
  let source = indoc! {"
    class A [ f [^1] ]
    class B : A [ f [^super f] ]
  "};
  let compilation = compile_without_markers(source);

  let f = compilation.unit("B", "f").unwrap();
  assert_eq!(opcodes(f), [OpCode::SelfRef, OpCode::SendSuper, OpCode::Return]);
  assert_eq!(f.class_name.as_str(), "B");
}

#[test]
fn class_side_units() {
  let compilation = compile_without_markers("class T [ class make [^self new] make [^1] ]");

  assert!(compilation.class_unit("T", "make").unwrap().is_class_method);
  assert!(!compilation.unit("T", "make").unwrap().is_class_method);
  assert_eq!(compilation.class_units("T").len(), 2);
}

#[test]
fn class_table() {
  let source = "class A [ | a | ] class B : A [ | b | f <primitive:#Number_ADD> ]";
  let compilation = compile_without_markers(source);
  let classes = compilation.class_table();

  let b = classes.get("B").unwrap();
  let fields: Vec<_> = b.fields.iter().map(|field| field.as_str()).collect();
  assert_eq!(fields, ["a", "b"]);
  let a = b.superclass.as_deref().unwrap();
  assert_eq!(a.name.as_str(), "A");
  assert_eq!(a.superclass.as_deref().unwrap().name.as_str(), "Object");

  let f = b.lookup("f", false).unwrap();
  assert_eq!(f.primitive, Some(Primitive::Add));
  assert_eq!(f.name.as_str(), "B>>f");

  // methods on the shared classes are found for any receiver
  let integer = classes.get("Integer").map(Rc::as_ref);
  assert!(classes.find_method(integer, "isNil", false).is_some());
  assert!(classes.find_method(integer, "missing", false).is_none());
  assert!(classes.find_method(None, "do:", false).is_some());
}

#[test]
fn primitive_names() {
  assert_eq!(Primitive::from_name("Number_ADD"), Some(Primitive::Add));
  assert_eq!(
    Primitive::from_name("BlockDescriptor_VALUE_2_ARGS"),
    Some(Primitive::Value(2))
  );
  assert_eq!(
    Primitive::from_name("BlockDescriptor_WHILEFALSE"),
    Some(Primitive::WhileFalse)
  );
  assert_eq!(Primitive::from_name("Missing_PRIMITIVE"), None);
}

fn perform(primitive: Primitive, receiver: Value, arguments: Vec<Value>) -> Value {
  let mut output = Vec::new();
  match primitive.perform(receiver, arguments, &mut output) {
    Ok(Outcome::Value(value)) => value,
    other => panic!("unexpected outcome {other:?}"),
  }
}

#[test]
fn floor_division() {
  let divide = |a: i32, b: i32| perform(Primitive::FloorDivide, a.into(), vec![b.into()]);
  assert_eq!(divide(7, 2).to_string(), "3");
  assert_eq!(divide(-7, 2).to_string(), "-4");
  assert_eq!(divide(7, -2).to_string(), "-4");
  assert_eq!(divide(-7, -2).to_string(), "3");

  let remainder = |a: i32, b: i32| perform(Primitive::Remainder, a.into(), vec![b.into()]);
  assert_eq!(remainder(7, 2).to_string(), "1");
  assert_eq!(remainder(-7, 2).to_string(), "1");
  assert_eq!(remainder(7, -2).to_string(), "-1");
  assert_eq!(remainder(-6, 3).to_string(), "0");
}

#[test]
fn integer_arithmetic_wraps() {
  let sum = perform(Primitive::Add, i32::MAX.into(), vec![1.into()]);
  assert_eq!(sum.to_string(), i32::MIN.to_string());
}

#[test]
fn show_writes_a_line() {
  let mut output = Vec::new();
  let outcome = Primitive::Show.perform(Value::Nil, vec![Value::from("hi")], &mut output);

  assert!(matches!(outcome, Ok(Outcome::Value(Value::Nil))));
  assert_eq!(output, b"hi\n");
}

#[test]
fn display_values() {
  assert_eq!(Value::Nil.to_string(), "nil");
  assert_eq!(Value::from(3.0_f32).to_string(), "3.0");
  assert_eq!(Value::from(0.125_f32).to_string(), "0.125");
  assert_eq!(Value::from(1.0e-7_f32).to_string(), "0.0");
  assert_eq!(Value::from('x').to_string(), "$x");

  let array = Value::from(vec![Value::from(1), Value::from("a"), Value::from(Vec::<Value>::new())]);
  assert_eq!(array.to_string(), "{1. a. {}}");
  assert_eq!(format!("{:?}", Value::from("a")), "'a'");
}

#[test]
fn equality_and_identity() {
  let a = Value::from("abc");
  let b = Value::from("abc");
  assert!(a.is_equal(&b));
  assert!(!a.is_identical(&b));
  assert!(a.is_identical(&a.clone()));
  assert_eq!(a.hash_code(), b.hash_code());

  assert!(Value::from(2).is_equal(&Value::from(2.0_f32)));
  assert!(!Value::from(2).is_identical(&Value::from(2.0_f32)));
  assert!(!Value::Nil.is_equal(&Value::Boolean(false)));
}

#[test]
fn environment_chain() {
  let method = Rc::new(Environment::method(Value::Nil, vec![Value::from(1)]));
  let block = Rc::new(Environment::block(
    Value::Nil,
    vec![Value::Nil],
    method.clone(),
    method.clone(),
  ));

  block.set(1, 0, Value::from(5)).unwrap();
  assert_eq!(method.get(0, 0).unwrap().to_string(), "5");
  assert!(block.get(2, 0).is_err());
  assert!(block.get(0, 1).is_err());

  assert!(block.is_block());
  assert!(Rc::ptr_eq(&block.home(), &method));
  assert!(Rc::ptr_eq(&method.home(), &method));
}
