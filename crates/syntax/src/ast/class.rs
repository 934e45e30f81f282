//! # Classes and Methods

use super::{AST, Body, Identifier, MethodIdx, TokenIdx};
use crate::span::Span;
use thin_vec::ThinVec;

/// A class definition, e.g. `class Point : Object [ |x y| x [^x] ]`
#[derive(Debug)]
pub struct ClassDefinition {
  pub(crate) keyword: TokenIdx,
  pub(crate) name: Identifier,
  pub(crate) superclass: Option<Identifier>,
  pub(crate) fields: ThinVec<Identifier>,
  pub(crate) methods: ThinVec<MethodIdx>,
  pub(crate) closing: Option<TokenIdx>,
}
impl ClassDefinition {
  /// The name of the class
  #[must_use]
  pub fn name<'a>(&self, ast: &'a AST) -> &'a str {
    self.name.name(ast)
  }

  /// The location of the class name
  pub fn name_span(&self, ast: &AST) -> Span {
    self.name.span(ast)
  }

  /// The explicitly named superclass, if there is one
  #[must_use]
  pub fn superclass(&self) -> Option<&Identifier> {
    self.superclass.as_ref()
  }

  /// The instance variables declared by the class
  pub fn fields(&self) -> impl ExactSizeIterator<Item = &Identifier> {
    self.fields.iter()
  }

  /// The ids of the methods, both class side and instance side
  pub fn methods(&self) -> impl ExactSizeIterator<Item = MethodIdx> {
    self.methods.iter().copied()
  }

  /// The location of the whole definition
  pub fn span(&self, ast: &AST) -> Span {
    let start = Span::from(ast[self.keyword]);
    match self.closing {
      Some(closing) => start.merge(ast[closing].into()),
      None => start.merge(self.name.span(ast)),
    }
  }
}

/// A method definition
#[derive(Debug)]
pub struct Method {
  pub(crate) class_keyword: Option<TokenIdx>,
  pub(crate) signature: Signature,
  pub(crate) body: MethodBody,
}
impl Method {
  /// Is it defined on the class side (`class new [..]`)?
  #[must_use]
  pub fn is_class_method(&self) -> bool {
    self.class_keyword.is_some()
  }

  /// The header of the method
  #[must_use]
  pub fn signature(&self) -> &Signature {
    &self.signature
  }

  /// The body of the method
  #[must_use]
  pub fn body(&self) -> &MethodBody {
    &self.body
  }

  /// The selector the method is invoked by
  ///
  /// The name for unary methods, the operator for binary methods, and the keyword parts
  /// joined together for keyword methods.
  #[must_use]
  pub fn selector(&self, ast: &AST) -> String {
    match &self.signature {
      Signature::Unary(name) => name.name(ast).to_owned(),
      Signature::Binary { operator, .. } => ast.token_text(*operator).to_owned(),
      Signature::Keyword(parts) => parts
        .iter()
        .map(|(keyword, _)| ast.token_text(*keyword))
        .collect(),
    }
  }

  /// The names of the arguments, in order
  pub fn parameters(&self) -> impl Iterator<Item = &Identifier> {
    let (binary, keyword) = match &self.signature {
      Signature::Unary(_) => (None, &[][..]),
      Signature::Binary { parameter, .. } => (Some(parameter), &[][..]),
      Signature::Keyword(parts) => (None, &parts[..]),
    };

    binary
      .into_iter()
      .chain(keyword.iter().map(|(_, parameter)| parameter))
  }

  /// The location of the method header
  pub fn header_span(&self, ast: &AST) -> Span {
    let signature = match &self.signature {
      Signature::Unary(name) => name.span(ast),
      Signature::Binary {
        operator,
        parameter,
      } => Span::from(ast[*operator]).merge(parameter.span(ast)),
      Signature::Keyword(parts) => parts.iter().fold(Span::default(), |span, (keyword, arg)| {
        span.merge(ast[*keyword].into()).merge(arg.span(ast))
      }),
    };

    match self.class_keyword {
      Some(keyword) => Span::from(ast[keyword]).merge(signature),
      None => signature,
    }
  }
}

/// The header of a method, which determines its selector
#[derive(Debug)]
pub enum Signature {
  /// A unary method, e.g. `size`
  Unary(Identifier),
  /// A binary operator method, e.g. `+ other`
  Binary {
    /// The operator token
    operator: TokenIdx,
    /// The single argument
    parameter: Identifier,
  },
  /// A keyword method, e.g. `at: index put: value`
  Keyword(ThinVec<(TokenIdx, Identifier)>),
}

/// The implementation of a method
#[derive(Debug)]
pub enum MethodBody {
  /// Code in square brackets
  Code(Body),
  /// A built-in operation of the interpreter, e.g. `<primitive:#Integer_ADD>`
  Primitive {
    /// The symbol naming the primitive
    name: TokenIdx,
  },
}
impl MethodBody {
  /// The name of the primitive, without the leading `#`
  #[must_use]
  pub fn primitive_name<'a>(&self, ast: &'a AST) -> Option<&'a str> {
    match self {
      Self::Code(_) => None,
      Self::Primitive { name } => Some(ast.token_text(*name).trim_start_matches('#')),
    }
  }

  /// The location of the primitive name
  pub fn primitive_span(&self, ast: &AST) -> Option<Span> {
    match self {
      Self::Code(_) => None,
      Self::Primitive { name } => Some(ast[*name].into()),
    }
  }
}
