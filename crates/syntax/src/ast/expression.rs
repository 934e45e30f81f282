//! # Expressions

use super::{AST, Body, ExpressionIdx, Identifier, TokenIdx};
use crate::span::Span;
use thin_vec::ThinVec;

/// An expression, which can be evaluated to a value
#[must_use]
#[derive(Debug)]
pub enum Expression {
  /// An array literal, e.g. `{1. 2. 3}`
  Array(Array),
  /// A block, an anonymous function closing over its environment, e.g. `[:x | x + 1]`
  Block(Block),
  /// An expression in parentheses, e.g. `(1 + 2)`
  Group(Group),
  /// A literal value, e.g. `1`, `true`, `'hello'`, `$a`
  Literal(Literal),
  /// Sending a message with no arguments, e.g. `x size`
  Unary(UnarySend),
  /// Sending an operator message with one argument, e.g. `1 + 2`
  Binary(BinarySend),
  /// Sending a keyword message, e.g. `array at: 1 put: 2`
  Keyword(KeywordSend),
  /// The receiver, looking up methods from the superclass, e.g. `super`
  Super(Super),
  /// A variable, e.g. `x`
  Variable(Variable),
  /// An invalid expression
  Invalid(Invalid),
}
impl Expression {
  /// The location of the expression
  pub fn span(&self, ast: &AST) -> Span {
    match self {
      Self::Array(array) => array.span(ast),
      Self::Block(block) => block.span(ast),
      Self::Group(group) => group.span(ast),
      Self::Literal(literal) => literal.span(ast),
      Self::Unary(unary) => unary.span(ast),
      Self::Binary(binary) => binary.span(ast),
      Self::Keyword(keyword) => keyword.span(ast),
      Self::Super(super_) => super_.span(ast),
      Self::Variable(variable) => variable.span(ast),
      Self::Invalid(invalid) => invalid.span(ast),
    }
  }
}

/// An array literal, e.g. `{1. 2. 3}`
#[derive(Debug)]
pub struct Array {
  pub(crate) opening: TokenIdx,
  pub(crate) items: ThinVec<ExpressionIdx>,
  pub(crate) closing: Option<TokenIdx>,
}
impl Array {
  /// The items of the array
  pub fn items(&self) -> impl ExactSizeIterator<Item = ExpressionIdx> {
    self.items.iter().copied()
  }

  /// The location of the expression
  pub fn span(&self, ast: &AST) -> Span {
    let opening = Span::from(ast[self.opening]);
    match self.closing {
      Some(closing) => opening.merge(ast[closing].into()),
      None => (self.items.last()).map_or(opening, |last| opening.merge(ast[*last].span(ast))),
    }
  }
}

/// A block, e.g. `[:x | x + 1]`
#[derive(Debug)]
pub struct Block {
  pub(crate) opening: TokenIdx,
  pub(crate) parameters: ThinVec<Identifier>,
  pub(crate) body: Body,
  pub(crate) closing: Option<TokenIdx>,
}
impl Block {
  /// The arguments of the block
  pub fn parameters(&self) -> impl ExactSizeIterator<Item = &Identifier> {
    self.parameters.iter()
  }

  /// The body of the block
  #[must_use]
  pub fn body(&self) -> &Body {
    &self.body
  }

  /// The location of the expression
  pub fn span(&self, ast: &AST) -> Span {
    let opening = Span::from(ast[self.opening]);
    match self.closing {
      Some(closing) => opening.merge(ast[closing].into()),
      None => opening,
    }
  }
}

/// An expression in parentheses, e.g. `(1 + 2)`
#[derive(Debug)]
pub struct Group {
  pub(crate) opening: TokenIdx,
  pub(crate) expression: ExpressionIdx,
  pub(crate) closing: Option<TokenIdx>,
}
impl Group {
  /// The expression in the parentheses
  #[must_use]
  pub fn expression(&self) -> ExpressionIdx {
    self.expression
  }

  /// The location of the expression
  pub fn span(&self, ast: &AST) -> Span {
    let opening = Span::from(ast[self.opening]);
    match self.closing {
      Some(closing) => opening.merge(ast[closing].into()),
      None => opening.merge(ast[self.expression].span(ast)),
    }
  }
}

/// A literal value, e.g. `1`, `-2.5`, `true`, `'hello'`, `$a`, `#foo`
#[derive(Debug)]
pub struct Literal {
  pub(crate) first: TokenIdx,
  pub(crate) last: TokenIdx,
  pub(crate) kind: LiteralKind,
}
impl Literal {
  /// The value of the literal
  pub fn kind(&self) -> &LiteralKind {
    &self.kind
  }

  /// The location of the expression
  pub fn span(&self, ast: &AST) -> Span {
    Span::from(ast[self.first]).merge(ast[self.last].into())
  }
}

/// The value of a [`Literal`]
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralKind {
  /// `nil`
  Nil,
  /// `true`
  True,
  /// `false`
  False,
  /// `self`
  SelfReference,
  /// An integer, e.g. `42`, `-3`
  Integer(i32),
  /// A floating point number, e.g. `3.14`
  Float(f32),
  /// A character, e.g. `$a`
  Character(char),
  /// A string, with doubled quotes unescaped, e.g. `'it''s'`
  String(String),
  /// A symbol, without the leading `#`, e.g. `#foo`
  Symbol(String),
}

/// Sending a message with no arguments, e.g. `x size`
#[derive(Debug)]
pub struct UnarySend {
  pub(crate) receiver: ExpressionIdx,
  pub(crate) selector: TokenIdx,
}
impl UnarySend {
  /// The receiver of the message
  #[must_use]
  pub fn receiver(&self) -> ExpressionIdx {
    self.receiver
  }

  /// The message name
  #[must_use]
  pub fn selector<'a>(&self, ast: &'a AST) -> &'a str {
    ast.token_text(self.selector)
  }

  /// The location of the message name
  pub fn selector_span(&self, ast: &AST) -> Span {
    ast[self.selector].into()
  }

  /// The location of the expression
  pub fn span(&self, ast: &AST) -> Span {
    ast[self.receiver].span(ast).merge(self.selector_span(ast))
  }
}

/// Sending an operator message with one argument, e.g. `1 + 2`
#[derive(Debug)]
pub struct BinarySend {
  pub(crate) receiver: ExpressionIdx,
  pub(crate) operator: TokenIdx,
  pub(crate) argument: ExpressionIdx,
}
impl BinarySend {
  /// The receiver of the message
  #[must_use]
  pub fn receiver(&self) -> ExpressionIdx {
    self.receiver
  }

  /// The argument of the message
  #[must_use]
  pub fn argument(&self) -> ExpressionIdx {
    self.argument
  }

  /// The operator
  #[must_use]
  pub fn operator<'a>(&self, ast: &'a AST) -> &'a str {
    ast.token_text(self.operator)
  }

  /// The location of the operator
  pub fn operator_span(&self, ast: &AST) -> Span {
    ast[self.operator].into()
  }

  /// The location of the expression
  pub fn span(&self, ast: &AST) -> Span {
    ast[self.receiver]
      .span(ast)
      .merge(ast[self.argument].span(ast))
  }
}

/// Sending a keyword message, e.g. `array at: 1 put: 2`
#[derive(Debug)]
pub struct KeywordSend {
  pub(crate) receiver: ExpressionIdx,
  pub(crate) parts: ThinVec<(TokenIdx, ExpressionIdx)>,
}
impl KeywordSend {
  /// The receiver of the message
  #[must_use]
  pub fn receiver(&self) -> ExpressionIdx {
    self.receiver
  }

  /// The arguments, in source order
  pub fn arguments(&self) -> impl ExactSizeIterator<Item = ExpressionIdx> {
    self.parts.iter().map(|(_, argument)| *argument)
  }

  /// The keyword parts joined together, e.g. `at:put:`
  #[must_use]
  pub fn selector(&self, ast: &AST) -> String {
    (self.parts.iter())
      .map(|(keyword, _)| ast.token_text(*keyword))
      .collect()
  }

  /// The location of the first keyword
  pub fn selector_span(&self, ast: &AST) -> Span {
    (self.parts.first()).map_or_else(Span::default, |(keyword, _)| ast[*keyword].into())
  }

  /// The location of the expression
  pub fn span(&self, ast: &AST) -> Span {
    let receiver = ast[self.receiver].span(ast);
    (self.parts.iter()).fold(receiver, |span, (_, argument)| {
      span.merge(ast[*argument].span(ast))
    })
  }
}

/// The receiver, looking up methods from the superclass, e.g. `super`
#[derive(Debug)]
pub struct Super {
  pub(crate) token: TokenIdx,
}
impl Super {
  /// The location of the expression
  pub fn span(&self, ast: &AST) -> Span {
    ast[self.token].into()
  }
}

/// A variable, e.g. `x`
#[derive(Debug)]
pub struct Variable {
  pub(crate) token: TokenIdx,
}
impl Variable {
  /// The name of the variable
  #[must_use]
  pub fn name<'a>(&self, ast: &'a AST) -> &'a str {
    ast.token_text(self.token)
  }

  /// The location of the expression
  pub fn span(&self, ast: &AST) -> Span {
    ast[self.token].into()
  }
}

/// An invalid expression
#[derive(Debug)]
pub struct Invalid {
  pub(crate) token: TokenIdx,
}
impl Invalid {
  /// The location of the expression
  pub fn span(&self, ast: &AST) -> Span {
    ast[self.token].into()
  }
}

macro_rules! from_expression {
  ($($kind:ident => $node:ty),* $(,)?) => {
    $(
      impl From<$node> for Expression {
        fn from(value: $node) -> Self {
          Self::$kind(value)
        }
      }
    )*
  };
}

from_expression!(
  Array => Array,
  Block => Block,
  Group => Group,
  Literal => Literal,
  Unary => UnarySend,
  Binary => BinarySend,
  Keyword => KeywordSend,
  Super => Super,
  Variable => Variable,
  Invalid => Invalid,
);
