//! # Resolution Pass
//!
//! Walks the tree a second time, recording which symbol each variable reference and
//! assignment target refers to.

use crate::{
  compiler::{CompileError, CompileErrorKind},
  define::Annotations,
  symbols::{ScopeId, SymbolTable},
};
use smalltalk_syntax::{
  AST,
  ast::{Body, Expression, ExpressionIdx, MethodBody, Statement, StatementIdx},
};

pub(crate) fn resolve(
  ast: &AST,
  symbols: &SymbolTable,
  annotations: &mut Annotations,
  errors: &mut Vec<CompileError>,
) {
  let mut resolver = Resolver {
    ast,
    symbols,
    annotations,
    errors,
  };

  for (_, class) in ast.class_definitions() {
    for method in class.methods() {
      let Some(scope) = resolver.annotations.methods.get(&method).copied() else {
        continue;
      };
      if let MethodBody::Code(body) = ast[method].body() {
        resolver.body(scope, body);
      }
    }
  }

  if let Some(scope) = resolver.annotations.main {
    resolver.body(scope, &ast.main);
  }
}

struct Resolver<'a> {
  ast: &'a AST,
  symbols: &'a SymbolTable,
  annotations: &'a mut Annotations,
  errors: &'a mut Vec<CompileError>,
}
impl Resolver<'_> {
  fn body(&mut self, scope: ScopeId, body: &Body) {
    for statement in body.statements() {
      self.statement(scope, statement);
    }
  }

  fn statement(&mut self, scope: ScopeId, id: StatementIdx) {
    let ast = self.ast;

    match &ast[id] {
      Statement::Assignment(assignment) => {
        self.expression(scope, assignment.expression());

        let target = assignment.target();
        let name = target.name(ast);
        let error = match self.symbols.resolve(scope, name) {
          Ok(symbol) if self.symbols[symbol].is_variable() => {
            self.annotations.assignments.insert(id, symbol);
            return;
          }
          Ok(_) => CompileErrorKind::NotAVariable {
            name: name.into(),
            scope: self.symbols.qualified_name(scope),
          },
          Err(_) => CompileErrorKind::UnknownVariable {
            name: name.into(),
            scope: self.symbols.qualified_name(scope),
          },
        };

        self.errors.push(CompileError::new(error, target.span(ast)));
        self.annotations.fail(self.symbols, scope);
      }
      Statement::Return(return_) => self.expression(scope, return_.expression()),
      Statement::Expression(expression) => self.expression(scope, expression.expression()),
    }
  }

  fn expression(&mut self, scope: ScopeId, id: ExpressionIdx) {
    let ast = self.ast;

    match &ast[id] {
      Expression::Variable(variable) => {
        let symbol = self.symbols.resolve(scope, variable.name(ast)).ok();
        self.annotations.variables.insert(id, symbol);
      }
      Expression::Block(block) => {
        if let Some(block_scope) = self.annotations.blocks.get(&id).copied() {
          self.body(block_scope, block.body());
        }
      }
      Expression::Array(array) => {
        for item in array.items() {
          self.expression(scope, item);
        }
      }
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
      Expression::Literal(_) | Expression::Super(_) | Expression::Invalid(_) => {}
    }
  }
}
