//! # Syntax
//! Parse Smalltalk source code into an Abstract Syntax Tree
//!
//! A hand written recursive descent parser. The source is first tokenised and then a tree
//! is built from the tokens, with the tree referencing the tokens. All references between
//! nodes are done with integers, so when the tree is accessed the ast needs to be passed
//! as a reference. The integer ids are also used by the compiler to attach scopes and
//! symbols to nodes without mutating the tree.
//!
//! Tries to be error tolerant. If a token is expected but is not found it will record an
//! error and carry on, otherwise it will skip to the end of the statement and try parsing
//! again.

pub mod ast;
mod parser;
mod span;
mod tokeniser;

#[cfg(test)]
mod test;

/// Parses a source code string into an AST.
///
/// # Examples
/// ```
/// use smalltalk_syntax::parse;
/// let ast = parse("^3 + 4".to_owned());
///
/// assert!(ast.is_valid());
/// ```
pub fn parse(source: String) -> AST {
  let mut ast = AST::new(source);
  parser::Parser::new(&mut ast).parse();
  ast
}

/// Get the tokens from a source code string, including comments
pub fn tokenise(source: &str) -> impl Iterator<Item = tokeniser::Token> + '_ {
  tokeniser::Tokeniser::from(source)
}

pub use ast::AST;
pub use parser::ParseError;
pub use span::{LineIndex, Location, Span};
pub use tokeniser::{Token, TokenKind};
