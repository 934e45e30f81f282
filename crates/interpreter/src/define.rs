//! # Definition Pass
//!
//! Walks the tree declaring the classes, fields, methods, blocks, arguments and locals,
//! and records the scope each class, method and block opens.

use crate::{
  collections::{HashMap, HashSet},
  compiler::{CompileError, CompileErrorKind},
  primitives::Primitive,
  symbols::{DeclarationError, ScopeId, ScopeKind, SymbolId, SymbolKind, SymbolTable},
};
use smalltalk_syntax::{
  AST, Span,
  ast::{
    Body, ClassDefinition, ClassIdx, Expression, ExpressionIdx, Identifier, Method, MethodBody,
    MethodIdx, Statement, StatementIdx, expression::Block,
  },
};

/// The class which top-level statements are compiled into
pub const MAIN_CLASS: &str = "MainClass";
/// The method which top-level statements are compiled into
pub const MAIN_METHOD: &str = "main";

/// Information the passes attach to the nodes of a tree
#[derive(Debug, Default)]
pub(crate) struct Annotations {
  /// The scope opened by each class definition
  pub classes: HashMap<ClassIdx, ScopeId>,
  /// The scope opened by each method with code
  pub methods: HashMap<MethodIdx, ScopeId>,
  /// The scope opened by each block
  pub blocks: HashMap<ExpressionIdx, ScopeId>,
  /// The scope of the method holding the top-level statements
  pub main: Option<ScopeId>,
  /// What each variable expression refers to, `None` for globals
  pub variables: HashMap<ExpressionIdx, Option<SymbolId>>,
  /// The variable each assignment stores into
  pub assignments: HashMap<StatementIdx, SymbolId>,
  /// Methods which had an error, and so shouldn't have code generated
  pub failed: HashSet<ScopeId>,
}
impl Annotations {
  /// Mark the method a scope is inside of as having an error
  pub fn fail(&mut self, symbols: &SymbolTable, scope: ScopeId) {
    if let Some(method) = symbols.enclosing_method(scope) {
      self.failed.insert(method);
    }
  }
}

pub(crate) fn define(
  ast: &AST,
  symbols: &mut SymbolTable,
  annotations: &mut Annotations,
  errors: &mut Vec<CompileError>,
) {
  let mut definer = Definer {
    ast,
    symbols,
    annotations,
    errors,
  };

  for (id, class) in ast.class_definitions() {
    definer.class(id, class);
  }

  if ast.has_main() {
    definer.main();
  }
}

struct Definer<'a> {
  ast: &'a AST,
  symbols: &'a mut SymbolTable,
  annotations: &'a mut Annotations,
  errors: &'a mut Vec<CompileError>,
}
impl Definer<'_> {
  fn error(&mut self, kind: CompileErrorKind, span: Span) {
    self.errors.push(CompileError::new(kind, span));
  }

  fn default_superclass(&self, name: &str) -> Option<ScopeId> {
    if name == "Object" {
      None
    } else {
      self.symbols.lookup_class("Object")
    }
  }

  fn new_class(&mut self, name: &str, superclass: Option<ScopeId>) -> ScopeId {
    let field_count = superclass.map_or(0, |superclass| match self.symbols[superclass].kind {
      ScopeKind::Class { field_count, .. } => field_count,
      _ => 0,
    });

    let kind = ScopeKind::Class {
      superclass,
      field_count,
      methods: HashMap::default(),
      class_methods: HashMap::default(),
    };
    let scope = self.symbols.add_scope(name, kind, SymbolTable::GLOBAL);
    let _ = self
      .symbols
      .declare(SymbolTable::GLOBAL, name, SymbolKind::Class(scope));

    log::trace!("declared class {name}");
    scope
  }

  fn class(&mut self, id: ClassIdx, class: &ClassDefinition) {
    let ast = self.ast;
    let name = class.name(ast);

    if name == MAIN_CLASS {
      self.error(CompileErrorKind::ReservedClassName, class.name_span(ast));
      return;
    }
    if self.symbols.lookup_class(name).is_some() {
      let kind = CompileErrorKind::ClassRedefinition { class: name.into() };
      self.error(kind, class.name_span(ast));
      return;
    }

    let superclass = match class.superclass() {
      Some(superclass) => match self.symbols.lookup_class(superclass.name(ast)) {
        Some(scope) => Some(scope),
        None => {
          let kind = CompileErrorKind::UnknownSuperclass {
            superclass: superclass.name(ast).into(),
            class: name.into(),
          };
          self.error(kind, superclass.span(ast));
          self.default_superclass(name)
        }
      },
      None => self.default_superclass(name),
    };

    let scope = self.new_class(name, superclass);
    self.annotations.classes.insert(id, scope);
    self.variables(scope, class.fields(), &SymbolKind::Field);

    for method in class.methods() {
      self.method(scope, method, &ast[method]);
    }
  }

  fn main(&mut self) {
    if self.symbols.lookup_class(MAIN_CLASS).is_some() {
      let kind = CompileErrorKind::ClassRedefinition {
        class: MAIN_CLASS.into(),
      };
      self.error(kind, Span::default());
      return;
    }

    let superclass = self.default_superclass(MAIN_CLASS);
    let class = self.new_class(MAIN_CLASS, superclass);
    let scope = self.method_scope(class, MAIN_METHOD, false);
    self.annotations.main = Some(scope);

    let ast = self.ast;
    self.body(scope, &ast.main);
  }

  fn method_scope(&mut self, class: ScopeId, selector: &str, class_side: bool) -> ScopeId {
    let kind = ScopeKind::Method {
      class_side,
      block_count: 0,
    };
    let scope = self.symbols.add_scope(selector, kind, class);
    let _ = self
      .symbols
      .declare_method(class, selector, SymbolKind::Method { scope, class_side });
    scope
  }

  fn method(&mut self, class: ScopeId, id: MethodIdx, method: &Method) {
    let ast = self.ast;
    let selector = method.selector(ast);
    let class_side = method.is_class_method();

    if self.symbols.has_method(class, &selector, class_side) {
      let kind = CompileErrorKind::MethodRedefinition {
        selector: selector.into(),
        class: self.symbols[class].name.clone(),
      };
      self.error(kind, method.header_span(ast));
      return;
    }

    match method.body() {
      MethodBody::Primitive { .. } => {
        let name = method.body().primitive_name(ast).unwrap_or_default();
        let span = method.body().primitive_span(ast).unwrap_or_default();

        let Some(primitive) = Primitive::from_name(name) else {
          let scope = format!("{}>>{selector}", self.symbols.qualified_name(class));
          let kind = CompileErrorKind::UnknownPrimitive {
            name: name.into(),
            scope: scope.into(),
          };
          self.error(kind, span);
          return;
        };

        let kind = SymbolKind::PrimitiveMethod {
          primitive,
          class_side,
          arguments: u16::try_from(method.parameters().count()).unwrap_or(u16::MAX),
        };
        let _ = self.symbols.declare_method(class, &selector, kind);
      }
      MethodBody::Code(body) => {
        let scope = self.method_scope(class, &selector, class_side);
        self.annotations.methods.insert(id, scope);
        self.variables(scope, method.parameters(), &SymbolKind::Argument);
        self.body(scope, body);
      }
    }
  }

  fn variables<'b>(
    &mut self,
    scope: ScopeId,
    identifiers: impl Iterator<Item = &'b Identifier>,
    kind: &SymbolKind,
  ) {
    let ast = self.ast;

    for identifier in identifiers {
      let name = identifier.name(ast);
      let error = match self.symbols.declare(scope, name, kind.clone()) {
        Ok(_) => continue,
        Err(DeclarationError::DuplicateDefinition) => CompileErrorKind::Redefinition {
          name: name.into(),
          scope: self.symbols.qualified_name(scope),
        },
        Err(DeclarationError::TooManyVariables) => CompileErrorKind::TooManyVariables {
          scope: self.symbols.qualified_name(scope),
        },
      };

      self.error(error, identifier.span(ast));
      self.annotations.fail(&*self.symbols, scope);
    }
  }

  fn body(&mut self, scope: ScopeId, body: &Body) {
    self.variables(scope, body.locals(), &SymbolKind::Local);

    for statement in body.statements() {
      self.statement(scope, statement);
    }
  }

  fn statement(&mut self, scope: ScopeId, statement: StatementIdx) {
    let expression = match &self.ast[statement] {
      Statement::Assignment(assignment) => assignment.expression(),
      Statement::Return(return_) => return_.expression(),
      Statement::Expression(expression) => expression.expression(),
    };
    self.expression(scope, expression);
  }

  fn expression(&mut self, scope: ScopeId, id: ExpressionIdx) {
    let ast = self.ast;

    match &ast[id] {
      Expression::Array(array) => {
        for item in array.items() {
          self.expression(scope, item);
        }
      }
      Expression::Block(block) => self.block(scope, id, block),
      Expression::Group(group) => self.expression(scope, group.expression()),
      Expression::Unary(unary) => self.expression(scope, unary.receiver()),
      Expression::Binary(binary) => {
        self.expression(scope, binary.receiver());
        self.expression(scope, binary.argument());
      }
      Expression::Keyword(keyword) => {
        self.expression(scope, keyword.receiver());
        for argument in keyword.arguments() {
          self.expression(scope, argument);
        }
      }
      Expression::Literal(_)
      | Expression::Super(_)
      | Expression::Variable(_)
      | Expression::Invalid(_) => {}
    }
  }

  fn block(&mut self, scope: ScopeId, id: ExpressionIdx, block: &Block) {
    let (_, block_scope) = self.symbols.declare_block(scope);
    self.annotations.blocks.insert(id, block_scope);

    self.variables(block_scope, block.parameters(), &SymbolKind::Argument);
    self.body(block_scope, block.body());
  }
}
