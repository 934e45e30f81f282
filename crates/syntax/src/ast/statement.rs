//! # Statements

use super::{AST, ExpressionIdx, Identifier, TokenIdx};
use crate::span::Span;

/// A statement, one step of a method or block body separated by `.`
#[derive(Debug)]
pub enum Statement {
  /// Assign a value to a variable, e.g. `x := 5`
  Assignment(Assignment),
  /// Return a value from the enclosing method, e.g. `^x`
  Return(Return),
  /// An expression evaluated for its value or side effects
  Expression(ExpressionStatement),
}
impl Statement {
  /// The location of the statement
  pub fn span(&self, ast: &AST) -> Span {
    match self {
      Self::Assignment(assignment) => assignment.span(ast),
      Self::Return(return_) => return_.span(ast),
      Self::Expression(expression) => expression.span(ast),
    }
  }
}

/// Assign a value to a variable, e.g. `x := 5`
#[derive(Debug)]
pub struct Assignment {
  pub(crate) target: Identifier,
  pub(crate) expression: ExpressionIdx,
}
impl Assignment {
  /// The variable being assigned to
  #[must_use]
  pub fn target(&self) -> &Identifier {
    &self.target
  }

  /// The value being assigned
  #[must_use]
  pub fn expression(&self) -> ExpressionIdx {
    self.expression
  }

  /// The location of the statement
  pub fn span(&self, ast: &AST) -> Span {
    self.target.span(ast).merge(ast[self.expression].span(ast))
  }
}

/// Return a value from the enclosing method, e.g. `^x`
#[derive(Debug)]
pub struct Return {
  pub(crate) caret: TokenIdx,
  pub(crate) expression: ExpressionIdx,
}
impl Return {
  /// The value being returned
  #[must_use]
  pub fn expression(&self) -> ExpressionIdx {
    self.expression
  }

  /// The location of the `^`
  pub fn caret_span(&self, ast: &AST) -> Span {
    ast[self.caret].into()
  }

  /// The location of the statement
  pub fn span(&self, ast: &AST) -> Span {
    self.caret_span(ast).merge(ast[self.expression].span(ast))
  }
}

/// An expression evaluated for its value or side effects
#[derive(Debug)]
pub struct ExpressionStatement {
  pub(crate) expression: ExpressionIdx,
}
impl ExpressionStatement {
  /// The expression
  #[must_use]
  pub fn expression(&self) -> ExpressionIdx {
    self.expression
  }

  /// The location of the statement
  pub fn span(&self, ast: &AST) -> Span {
    ast[self.expression].span(ast)
  }
}

impl From<Assignment> for Statement {
  fn from(value: Assignment) -> Self {
    Self::Assignment(value)
  }
}
impl From<Return> for Statement {
  fn from(value: Return) -> Self {
    Self::Return(value)
  }
}
impl From<ExpressionStatement> for Statement {
  fn from(value: ExpressionStatement) -> Self {
    Self::Expression(value)
  }
}
