//! # Compiler
//!
//! Turns syntax trees into bytecode. Each tree goes through three passes: the definition
//! pass declares every name, the resolution pass links each variable to its declaration,
//! and then the bytecode for each method and block is generated.

use crate::{
  bytecode::{CompiledUnit, OpCode, UnitBuilder},
  collections::String,
  define::{self, Annotations},
  object::ClassTable,
  resolve,
  symbols::{ScopeId, ScopeKind, SymbolKind, SymbolTable},
};
use smalltalk_syntax::{
  AST, Span,
  ast::{
    Body, Expression, ExpressionIdx, MethodBody, Statement, StatementIdx,
    expression::{Array, Block, LiteralKind},
  },
};
use std::{error, fmt, iter, mem, rc::Rc};

/// The standard classes, compiled before any program
const IMAGE: &str = include_str!("image.st");
const IMAGE_FILE_NAME: &str = "image.st";

/// Settings for a compilation
#[derive(Debug, Clone)]
pub struct CompileOptions {
  /// The name of the file being compiled, used in tracebacks
  pub file_name: std::string::String,
  /// Emit instructions recording source locations for tracebacks
  pub debug_markers: bool,
  /// Compile the standard classes before the program
  pub load_image: bool,
}
impl Default for CompileOptions {
  fn default() -> Self {
    Self {
      file_name: "main.st".to_owned(),
      debug_markers: true,
      load_image: true,
    }
  }
}

/// Compiles syntax trees into bytecode, building up the symbol table across them
#[derive(Debug)]
pub struct Compiler {
  options: CompileOptions,
  symbols: SymbolTable,
  errors: Vec<CompileError>,
}
impl Compiler {
  /// Create a compiler, compiling the standard classes if enabled
  #[must_use]
  pub fn new(options: CompileOptions) -> Self {
    let mut compiler = Self {
      options,
      symbols: SymbolTable::new(),
      errors: Vec::new(),
    };

    if compiler.options.load_image {
      let image = smalltalk_syntax::parse(IMAGE.to_owned());
      if !image.is_valid() {
        log::error!("the standard image has {} syntax errors", image.errors.len());
      }
      compiler.compile_file(&image, IMAGE_FILE_NAME);
    }

    compiler
  }

  /// Compile a tree with the configured file name
  pub fn compile(&mut self, ast: &AST) {
    let file_name = self.options.file_name.clone();
    self.compile_file(ast, &file_name);
  }

  fn compile_file(&mut self, ast: &AST, file_name: &str) {
    log::debug!("compiling {file_name}");
    let mut annotations = Annotations::default();

    define::define(ast, &mut self.symbols, &mut annotations, &mut self.errors);
    log::trace!("defined symbols for {file_name}");
    resolve::resolve(ast, &self.symbols, &mut annotations, &mut self.errors);
    log::trace!("resolved symbols for {file_name}");

    let mut generator = Generator {
      ast,
      symbols: &mut self.symbols,
      annotations: &annotations,
      errors: &mut self.errors,
      file_name,
      debug_markers: self.options.debug_markers,
      class_name: String::new(),
      builder: UnitBuilder::new(String::new(), String::new()),
      enclosing: Vec::new(),
      scopes: Vec::new(),
    };
    generator.generate();

    log::debug!("compiled {file_name} with {} errors", self.errors.len());
  }

  /// Finish compiling
  #[must_use]
  pub fn finish(self) -> Compilation {
    Compilation {
      symbols: self.symbols,
      errors: self.errors,
    }
  }
}

/// The result of compiling a program
#[derive(Debug)]
pub struct Compilation {
  /// The declared classes, methods and variables, with the generated code
  pub symbols: SymbolTable,
  /// The problems found whilst compiling
  pub errors: Vec<CompileError>,
}
impl Compilation {
  /// Was the program compiled without errors?
  #[must_use]
  pub fn is_valid(&self) -> bool {
    self.errors.is_empty()
  }

  /// Build the runtime classes from the compiled program
  #[must_use]
  pub fn class_table(&self) -> ClassTable {
    ClassTable::from_symbols(&self.symbols)
  }

  /// The code of a method of a class, searching superclasses
  #[must_use]
  pub fn unit(&self, class: &str, selector: &str) -> Option<&Rc<CompiledUnit>> {
    self.symbols.method_unit(class, selector, false)
  }

  /// The code of a class side method of a class, searching superclasses
  #[must_use]
  pub fn class_unit(&self, class: &str, selector: &str) -> Option<&Rc<CompiledUnit>> {
    self.symbols.method_unit(class, selector, true)
  }

  /// The code of all methods declared directly in a class, instance side first
  #[must_use]
  pub fn class_units(&self, class: &str) -> Vec<Rc<CompiledUnit>> {
    let Some(class) = self.symbols.lookup_class(class) else {
      return Vec::new();
    };

    [false, true]
      .into_iter()
      .flat_map(|class_side| self.symbols.methods(class, class_side))
      .filter_map(|method| match self.symbols[method].kind {
        SymbolKind::Method { scope, .. } => self.symbols[scope].unit.clone(),
        _ => None,
      })
      .collect()
  }
}

/// Generates the bytecode for the methods of one tree
struct Generator<'a> {
  ast: &'a AST,
  symbols: &'a mut SymbolTable,
  annotations: &'a Annotations,
  errors: &'a mut Vec<CompileError>,
  file_name: &'a str,
  debug_markers: bool,

  class_name: String,
  /// The unit currently being generated
  builder: UnitBuilder,
  /// The units the current block is nested inside of, starting with the method
  enclosing: Vec<UnitBuilder>,
  scopes: Vec<ScopeId>,
}
impl Generator<'_> {
  fn generate(&mut self) {
    let ast = self.ast;

    for (_, class) in ast.class_definitions() {
      for method in class.methods() {
        let Some(scope) = self.annotations.methods.get(&method).copied() else {
          continue;
        };
        if let MethodBody::Code(body) = ast[method].body() {
          self.method(scope, body, ast[method].header_span(ast));
        }
      }
    }

    if let Some(scope) = self.annotations.main {
      self.method(scope, &ast.main, Span::default());
    }
  }

  fn method(&mut self, scope: ScopeId, body: &Body, span: Span) {
    if self.annotations.failed.contains(&scope) {
      log::debug!("skipping {}, it has errors", self.symbols.qualified_name(scope));
      return;
    }

    let class = self.symbols.enclosing_class(scope);
    self.class_name = class.map(|class| self.symbols[class].name.clone()).unwrap_or_default();

    self.builder = self.new_builder(scope);
    if let ScopeKind::Method { class_side, .. } = self.symbols[scope].kind {
      self.builder.set_class_method(class_side);
    }
    self.scopes.push(scope);

    let result = self.method_body(body, span);

    self.scopes.pop();
    self.enclosing.clear();
    let builder = mem::replace(&mut self.builder, UnitBuilder::new(String::new(), String::new()));
    if let Err(error) = result {
      self.errors.push(error);
      return;
    }

    match builder.finalize() {
      Some(unit) => {
        log::trace!("generated {}", unit.name);
        self.symbols.set_unit(scope, Rc::new(unit));
      }
      None => {
        let scope = self.symbols.qualified_name(scope);
        let kind = CompileErrorKind::InvalidAST { scope };
        self.errors.push(CompileError::new(kind, span));
      }
    }
  }

  fn new_builder(&self, scope: ScopeId) -> UnitBuilder {
    let mut builder = UnitBuilder::new(self.symbols.qualified_name(scope), self.class_name.clone());
    if self.debug_markers {
      builder.add_literal(self.file_name);
    }

    let scope = &self.symbols[scope];
    builder.set_slots(scope.argument_count, scope.local_count());
    builder
  }

  fn scope(&self) -> ScopeId {
    self.scopes.last().copied().unwrap_or(SymbolTable::GLOBAL)
  }

  fn error(&self, kind: fn(String) -> CompileErrorKind, span: Span) -> CompileError {
    CompileError::new(kind(self.symbols.qualified_name(self.scope())), span)
  }

  fn emit(&mut self, opcode: OpCode) {
    self.builder.add_opcode(opcode);
  }

  fn emit_u16(&mut self, opcode: OpCode, operand: u16) {
    self.builder.add_opcode(opcode);
    self.builder.add_u16(operand);
  }

  fn emit_variable(&mut self, opcode: OpCode, depth: u16, index: u16) {
    self.builder.add_opcode(opcode);
    self.builder.add_u16(depth);
    self.builder.add_u16(index);
  }

  fn literal(&mut self, text: &str, span: Span) -> Result<u16, CompileError> {
    match self.builder.add_literal(text) {
      Some(index) => Ok(index),
      None => Err(self.error(|scope| CompileErrorKind::TooManyLiterals { scope }, span)),
    }
  }

  /// Record the source location of the following instruction
  fn debug(&mut self, span: Span) {
    if !self.debug_markers {
      return;
    }

    let location = self.ast.line_index().location(span.start);
    let line = u16::try_from(location.line).unwrap_or(u16::MAX);
    let column = u16::try_from(location.column).unwrap_or(u16::MAX);

    self.builder.add_opcode(OpCode::Debug);
    self.builder.add_u16(0);
    self.builder.add_u16(line);
    self.builder.add_u16(column);
  }

  fn statements(&mut self, body: &Body) -> Result<(), CompileError> {
    let count = body.statements().len();
    for (position, statement) in body.statements().enumerate() {
      statement.compile(self)?;

      if position + 1 < count {
        self.emit(OpCode::Pop);
      }
    }

    Ok(())
  }

  fn method_body(&mut self, body: &Body, span: Span) -> Result<(), CompileError> {
    self.statements(body)?;

    if body.is_empty() {
      self.debug(span);
      self.emit(OpCode::SelfRef);
      self.emit(OpCode::Return);
    } else if !body.ends_with_return(self.ast) {
      let last = body.statements().next_back();
      let span = last.map_or(span, |statement| self.ast[statement].span(self.ast));

      self.emit(OpCode::Pop);
      self.debug(span);
      self.emit(OpCode::SelfRef);
      self.emit(OpCode::Return);
    }

    Ok(())
  }

  fn block_body(&mut self, body: &Body) -> Result<(), CompileError> {
    if body.is_empty() {
      self.emit(OpCode::Nil);
      self.emit(OpCode::BlockReturn);
      return Ok(());
    }

    self.statements(body)?;
    if !body.ends_with_return(self.ast) {
      self.emit(OpCode::BlockReturn);
    }

    Ok(())
  }

  fn send(
    &mut self,
    receiver: ExpressionIdx,
    arguments: impl ExactSizeIterator<Item = ExpressionIdx>,
    selector: &str,
    span: Span,
  ) -> Result<(), CompileError> {
    let is_super = matches!(self.ast[receiver], Expression::Super(_));
    receiver.compile(self)?;

    let count = arguments.len();
    for argument in arguments {
      argument.compile(self)?;
    }
    let count = u16::try_from(count)
      .map_err(|_| self.error(|scope| CompileErrorKind::TooManyItems { scope }, span))?;

    self.debug(span);
    let selector = self.literal(selector, span)?;

    let opcode = if is_super { OpCode::SendSuper } else { OpCode::Send };
    self.emit_variable(opcode, count, selector);
    Ok(())
  }

  fn variable(&mut self, id: ExpressionIdx, name: &str, span: Span) -> Result<(), CompileError> {
    let symbol = self.annotations.variables.get(&id).copied().flatten();

    if let Some(symbol) = symbol {
      let symbol = &self.symbols[symbol];
      let index = symbol.index;

      match symbol.kind {
        SymbolKind::Field => {
          self.emit_u16(OpCode::PushField, index);
          return Ok(());
        }
        SymbolKind::Argument | SymbolKind::Local => {
          if let Some(depth) = self.symbols.depth(self.scope(), symbol.scope) {
            self.emit_variable(OpCode::PushLocal, depth, index);
            return Ok(());
          }
        }
        _ => {}
      }
    }

    self.debug(span);
    let literal = self.literal(name, span)?;
    self.emit_u16(OpCode::PushGlobal, literal);
    Ok(())
  }

  fn store(&mut self, id: StatementIdx, span: Span) -> Result<(), CompileError> {
    let Some(symbol) = self.annotations.assignments.get(&id).copied() else {
      return Err(self.error(|scope| CompileErrorKind::InvalidAST { scope }, span));
    };
    let symbol = &self.symbols[symbol];
    let index = symbol.index;

    if symbol.kind == SymbolKind::Field {
      self.emit_u16(OpCode::StoreField, index);
      return Ok(());
    }

    match self.symbols.depth(self.scope(), symbol.scope) {
      Some(depth) => {
        self.emit_variable(OpCode::StoreLocal, depth, index);
        Ok(())
      }
      None => Err(self.error(|scope| CompileErrorKind::InvalidAST { scope }, span)),
    }
  }

  fn block(&mut self, id: ExpressionIdx, block: &Block, span: Span) -> Result<(), CompileError> {
    let scope = self.annotations.blocks.get(&id).copied();
    let Some((scope, ScopeKind::Block { index })) =
      scope.map(|scope| (scope, self.symbols[scope].kind.clone()))
    else {
      return Err(self.error(|scope| CompileErrorKind::InvalidAST { scope }, span));
    };

    let builder = self.new_builder(scope);
    let enclosing = mem::replace(&mut self.builder, builder);
    self.enclosing.push(enclosing);
    self.scopes.push(scope);

    let result = self.block_body(block.body());

    self.scopes.pop();
    let Some(enclosing) = self.enclosing.pop() else {
      return Err(self.error(|scope| CompileErrorKind::InvalidAST { scope }, span));
    };
    let builder = mem::replace(&mut self.builder, enclosing);
    result?;

    let Some(unit) = builder.finalize() else {
      return Err(self.error(|scope| CompileErrorKind::InvalidAST { scope }, span));
    };
    let unit = Rc::new(unit);
    self.symbols.set_unit(scope, unit.clone());

    let method = self.enclosing.first_mut().unwrap_or(&mut self.builder);
    method.add_block(index, unit);

    self.emit_u16(OpCode::Block, index);
    Ok(())
  }

  fn array(&mut self, array: &Array, span: Span) -> Result<(), CompileError> {
    for item in array.items() {
      item.compile(self)?;
    }

    let count = u16::try_from(array.items().len())
      .map_err(|_| self.error(|scope| CompileErrorKind::TooManyItems { scope }, span))?;
    self.emit_u16(OpCode::PushArray, count);
    Ok(())
  }

  fn literal_value(&mut self, kind: &LiteralKind, span: Span) -> Result<(), CompileError> {
    match kind {
      LiteralKind::Nil => self.emit(OpCode::Nil),
      LiteralKind::True => self.emit(OpCode::True),
      LiteralKind::False => self.emit(OpCode::False),
      LiteralKind::SelfReference => self.emit(OpCode::SelfRef),
      LiteralKind::Integer(value) => {
        self.emit(OpCode::PushInteger);
        self.builder.add_u32(value.cast_unsigned());
      }
      LiteralKind::Float(value) => {
        self.emit(OpCode::PushFloat);
        self.builder.add_u32(value.to_bits());
      }
      LiteralKind::Character(value) => {
        self.emit(OpCode::PushCharacter);
        self.builder.add_u32(u32::from(*value));
      }
      LiteralKind::String(value) | LiteralKind::Symbol(value) => {
        let index = self.literal(value, span)?;
        self.emit_u16(OpCode::PushLiteral, index);
      }
    }

    Ok(())
  }
}

trait Compile {
  fn compile(self, generator: &mut Generator) -> Result<(), CompileError>;
}

impl Compile for StatementIdx {
  fn compile(self, generator: &mut Generator) -> Result<(), CompileError> {
    let ast = generator.ast;

    match &ast[self] {
      Statement::Assignment(assignment) => {
        assignment.expression().compile(generator)?;
        generator.debug(assignment.span(ast));
        generator.store(self, assignment.target().span(ast))
      }
      Statement::Return(return_) => {
        return_.expression().compile(generator)?;
        generator.debug(return_.caret_span(ast));
        generator.emit(OpCode::Return);
        Ok(())
      }
      Statement::Expression(expression) => expression.expression().compile(generator),
    }
  }
}

impl Compile for ExpressionIdx {
  fn compile(self, generator: &mut Generator) -> Result<(), CompileError> {
    let ast = generator.ast;
    let expression = &ast[self];
    let span = expression.span(ast);

    match expression {
      Expression::Array(array) => generator.array(array, span),
      Expression::Block(block) => generator.block(self, block, span),
      Expression::Group(group) => group.expression().compile(generator),
      Expression::Literal(literal) => generator.literal_value(literal.kind(), span),
      Expression::Unary(unary) => {
        let span = unary.selector_span(ast);
        generator.send(unary.receiver(), iter::empty(), unary.selector(ast), span)
      }
      Expression::Binary(binary) => {
        let span = binary.operator_span(ast);
        let arguments = iter::once(binary.argument());
        generator.send(binary.receiver(), arguments, binary.operator(ast), span)
      }
      Expression::Keyword(keyword) => {
        let span = keyword.selector_span(ast);
        let selector = keyword.selector(ast);
        generator.send(keyword.receiver(), keyword.arguments(), &selector, span)
      }
      Expression::Super(_) => {
        generator.emit(OpCode::SelfRef);
        Ok(())
      }
      Expression::Variable(variable) => generator.variable(self, variable.name(ast), span),
      Expression::Invalid(_) => {
        Err(generator.error(|scope| CompileErrorKind::InvalidAST { scope }, span))
      }
    }
  }
}

/// A problem found whilst compiling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
  kind: CompileErrorKind,
  span: Span,
}
impl CompileError {
  pub(crate) fn new(kind: CompileErrorKind, span: Span) -> Self {
    Self { kind, span }
  }

  /// What the problem is
  #[must_use]
  pub fn kind(&self) -> &CompileErrorKind {
    &self.kind
  }

  /// The title of the error message
  #[must_use]
  pub fn title(&self) -> &'static str {
    self.kind.title()
  }

  /// The body of the error message describing what has gone wrong
  #[must_use]
  pub fn message(&self) -> std::string::String {
    self.kind.message()
  }

  /// The location of the problem in the source
  pub fn span(&self) -> Span {
    self.span
  }
}
impl fmt::Display for CompileError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.message())
  }
}
impl error::Error for CompileError {}

/// The kinds of problem found whilst compiling
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileErrorKind {
  /// A class with the same name has already been declared
  ClassRedefinition {
    /// The name of the class
    class: String,
  },
  /// A class was declared with the name used for top-level statements
  ReservedClassName,
  /// The named superclass has not been declared
  UnknownSuperclass {
    /// The name of the superclass
    superclass: String,
    /// The class being declared
    class: String,
  },
  /// A method with the same selector has already been declared on the same side
  MethodRedefinition {
    /// The selector of the method
    selector: String,
    /// The class being declared
    class: String,
  },
  /// A variable with the same name has already been declared in the scope
  Redefinition {
    /// The name of the variable
    name: String,
    /// The qualified name of the scope
    scope: String,
  },
  /// A primitive method names a primitive which doesn't exist
  UnknownPrimitive {
    /// The name of the primitive
    name: String,
    /// The qualified name of the method
    scope: String,
  },
  /// An assignment to a variable which hasn't been declared
  UnknownVariable {
    /// The name of the variable
    name: String,
    /// The qualified name of the scope
    scope: String,
  },
  /// An assignment to a name which isn't a variable
  NotAVariable {
    /// The name assigned to
    name: String,
    /// The qualified name of the scope
    scope: String,
  },
  /// The literal pool of a method or block is full
  TooManyLiterals {
    /// The qualified name of the scope
    scope: String,
  },
  /// The maximum number of variables in a scope has been reached
  TooManyVariables {
    /// The qualified name of the scope
    scope: String,
  },
  /// An array literal or message has too many items
  TooManyItems {
    /// The qualified name of the scope
    scope: String,
  },
  /// The tree contains a syntax error
  InvalidAST {
    /// The qualified name of the scope
    scope: String,
  },
}
impl CompileErrorKind {
  fn title(&self) -> &'static str {
    match self {
      Self::ClassRedefinition { .. } => "Class Redefinition",
      Self::ReservedClassName => "Reserved Class Name",
      Self::UnknownSuperclass { .. } => "Unknown Superclass",
      Self::MethodRedefinition { .. } => "Method Redefinition",
      Self::Redefinition { .. } => "Redefinition",
      Self::UnknownPrimitive { .. } => "Unknown Primitive",
      Self::UnknownVariable { .. } => "Unknown Variable",
      Self::NotAVariable { .. } => "Not A Variable",
      Self::TooManyLiterals { .. } => "Too Many Literals",
      Self::TooManyVariables { .. } => "Too Many Variables",
      Self::TooManyItems { .. } => "Too Many Items",
      Self::InvalidAST { .. } => "Invalid AST",
    }
  }

  fn message(&self) -> std::string::String {
    match self {
      Self::ClassRedefinition { class } => format!("redefinition of class {class}"),
      Self::ReservedClassName => "MainClass is a reserved class name".to_owned(),
      Self::UnknownSuperclass { superclass, class } => {
        format!("unknown superclass {superclass} of {class}")
      }
      Self::MethodRedefinition { selector, class } => {
        format!("redefinition of method {selector} in {class}")
      }
      Self::Redefinition { name, scope } => format!("redefinition of {name} in {scope}"),
      Self::UnknownPrimitive { name, scope } => format!("unknown primitive #{name} in {scope}"),
      Self::UnknownVariable { name, scope } => format!("unknown variable {name} in {scope}"),
      Self::NotAVariable { name, scope } => {
        format!("symbol {name} is not a variable/argument in {scope}")
      }
      Self::TooManyLiterals { scope } => {
        format!("the maximum no. of literals has been reached (65536) in {scope}")
      }
      Self::TooManyVariables { scope } => {
        format!("the maximum no. of variables has been reached (65536) in {scope}")
      }
      Self::TooManyItems { scope } => {
        format!("the maximum no. of items has been reached (65536) in {scope}")
      }
      Self::InvalidAST { scope } => {
        format!("{scope} contains a syntax error, see errors from the parser")
      }
    }
  }
}
