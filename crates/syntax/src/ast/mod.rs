//! # AST
//!
//! The definition of the Abstract Syntax Tree (AST)
//!
//! Nodes are stored in flat vectors on the [`AST`] and reference each other by typed
//! indices. The indices are stable for the lifetime of the tree, so later passes can use
//! them as node ids to attach information to the tree from the outside.

use crate::{
  parser::ParseError,
  span::{LineIndex, Span},
  tokeniser::{Token, TokenKind, Tokeniser},
};
use std::{cell::OnceCell, num::NonZero, ops};
use thin_vec::ThinVec;

pub mod class;
pub mod expression;
mod prettyprint;
pub mod statement;

pub use class::{ClassDefinition, Method, MethodBody, Signature};
pub use expression::Expression;
pub use statement::Statement;

/// Abstract Syntax Tree representing the source
#[must_use]
#[derive(Debug)]
pub struct AST {
  /// The source code which the AST is for
  pub source: String,
  /// Index of line locations, lazily constructed when required
  line_index: OnceCell<LineIndex>,
  /// The tokens of the source, without comments
  pub tokens: Vec<Token>,

  /// The class definitions, in source order
  pub classes: Vec<ClassDefinition>,
  /// The methods of all the classes
  pub methods: Vec<Method>,
  /// All the statements in the source
  pub statements: Vec<Statement>,
  /// All the expressions in the source
  pub expressions: Vec<Expression>,
  /// The top-level statements which follow the class definitions
  pub main: Body,

  /// Errors found during parsing
  pub errors: Vec<ParseError>,
}
impl AST {
  pub(crate) fn new(source: String) -> Self {
    let tokens = Tokeniser::from(source.as_str())
      .filter(|token| token.kind != TokenKind::Comment)
      .collect();

    Self {
      source,
      line_index: OnceCell::new(),
      tokens,

      classes: Vec::new(),
      methods: Vec::new(),
      statements: Vec::new(),
      expressions: Vec::new(),
      main: Body::default(),

      errors: Vec::new(),
    }
  }

  /// Is the parsed AST valid, with no errors found during parsing?
  #[must_use]
  pub fn is_valid(&self) -> bool {
    self.errors.is_empty()
  }

  /// The line index for the AST, the locations of the new lines in the source code
  ///
  /// It is lazily initialised, and will be initialised on the first call
  pub fn line_index(&self) -> &LineIndex {
    self
      .line_index
      .get_or_init(|| LineIndex::from_source(&self.source))
  }

  /// The class definitions with their ids
  pub fn class_definitions(&self) -> impl Iterator<Item = (ClassIdx, &ClassDefinition)> {
    self
      .classes
      .iter()
      .enumerate()
      .map(|(index, class)| (ClassIdx::from(index), class))
  }

  /// Are there any top-level statements or variables?
  #[must_use]
  pub fn has_main(&self) -> bool {
    !self.main.statements.is_empty() || !self.main.locals.is_empty()
  }

  pub(crate) fn add_expression(&mut self, expression: impl Into<Expression>) -> ExpressionIdx {
    self.expressions.push(expression.into());
    ExpressionIdx::from(self.expressions.len() - 1)
  }

  pub(crate) fn add_statement(&mut self, statement: impl Into<Statement>) -> StatementIdx {
    self.statements.push(statement.into());
    StatementIdx::from(self.statements.len() - 1)
  }

  pub(crate) fn add_method(&mut self, method: Method) -> MethodIdx {
    self.methods.push(method);
    MethodIdx::from(self.methods.len() - 1)
  }

  pub(crate) fn add_class(&mut self, class: ClassDefinition) -> ClassIdx {
    self.classes.push(class);
    ClassIdx::from(self.classes.len() - 1)
  }

  /// The source text of a token
  #[must_use]
  pub fn token_text(&self, token: TokenIdx) -> &str {
    Span::from(self[token]).source_text(&self.source)
  }
}

macro_rules! index_type {
  ($(#[$meta:meta])* $name:ident, $field:ident, $output:ty) => {
    $(#[$meta])*
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct $name(NonZero<u32>);
    impl $name {
      fn position(self) -> usize {
        self.0.get() as usize - 1
      }
    }
    impl From<usize> for $name {
      fn from(value: usize) -> Self {
        let id = u32::try_from(value + 1).unwrap_or(u32::MAX);
        Self(NonZero::new(id).unwrap_or(NonZero::<u32>::MAX))
      }
    }
    impl ops::Index<$name> for AST {
      type Output = $output;

      fn index(&self, index: $name) -> &Self::Output {
        &self.$field[index.position()]
      }
    }
  };
}

index_type!(
  /// Id of a [`ClassDefinition`] in the [`AST`]
  ClassIdx,
  classes,
  ClassDefinition
);
index_type!(
  /// Id of a [`Method`] in the [`AST`]
  MethodIdx,
  methods,
  Method
);
index_type!(
  /// Id of a [`Statement`] in the [`AST`]
  StatementIdx,
  statements,
  Statement
);
index_type!(
  /// Id of an [`Expression`] in the [`AST`]
  ExpressionIdx,
  expressions,
  Expression
);
index_type!(
  /// Id of a [`Token`] in the [`AST`]
  TokenIdx,
  tokens,
  Token
);

/// A name introduced by a declaration, e.g. a field, argument or local variable
#[derive(Debug, Clone, Copy)]
pub struct Identifier {
  pub(crate) token: TokenIdx,
}
impl Identifier {
  /// The name
  #[must_use]
  pub fn name<'a>(&self, ast: &'a AST) -> &'a str {
    // `class A: B` has the class name as a keyword token
    ast.token_text(self.token).trim_end_matches(':')
  }

  /// The location of the name
  pub fn span(&self, ast: &AST) -> Span {
    ast[self.token].into()
  }
}

/// The local variables and statements of a method, block, or the top level
#[derive(Debug, Default)]
pub struct Body {
  pub(crate) locals: ThinVec<Identifier>,
  pub(crate) statements: ThinVec<StatementIdx>,
}
impl Body {
  /// The local variables declared between `|` at the start of the body
  pub fn locals(&self) -> impl ExactSizeIterator<Item = &Identifier> {
    self.locals.iter()
  }

  /// The ids of the statements of the body
  pub fn statements(&self) -> impl DoubleEndedIterator<Item = StatementIdx> + ExactSizeIterator {
    self.statements.iter().copied()
  }

  /// Does the body have no statements?
  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.statements.is_empty()
  }

  /// Is the final statement of the body a return?
  #[must_use]
  pub fn ends_with_return(&self, ast: &AST) -> bool {
    self
      .statements
      .last()
      .is_some_and(|statement| matches!(ast[*statement], Statement::Return(_)))
  }
}
