use crate::{
  ast::{
    AST, Body, ClassDefinition, ExpressionIdx, Identifier, Method, MethodBody, Signature,
    StatementIdx, TokenIdx, expression::*, statement::*,
  },
  span::Span,
  tokeniser::{Token, TokenKind},
};
use std::{error, fmt};
use thin_vec::ThinVec;

pub struct Parser<'ast> {
  /// The AST being built up by the parser
  ast: &'ast mut AST,

  /// The current token
  position: usize,
}
impl<'ast> Parser<'ast> {
  pub fn new(ast: &'ast mut AST) -> Self {
    Self { ast, position: 0 }
  }

  pub fn parse(mut self) {
    while self.current_kind() == TokenKind::Class {
      let class = self.parse_class();
      self.ast.add_class(class);
    }

    self.ast.main = self.parse_body();

    if !self.is_finished() {
      let token = self.current_token();
      self.add_error(match token.kind {
        TokenKind::Class => ParseError::ClassAfterStatements(token),
        _ => ParseError::Expected {
          expected: TokenKind::EndOfFile,
          received: token,
        },
      });
    }
  }

  fn add_error(&mut self, error: ParseError) {
    self.ast.errors.push(error);
  }

  fn is_finished(&self) -> bool {
    self.current_kind() == TokenKind::EndOfFile
  }

  fn current_token_id(&self) -> TokenIdx {
    TokenIdx::from(self.position.min(self.ast.tokens.len().saturating_sub(1)))
  }

  fn current_token(&self) -> Token {
    match self.ast.tokens.get(self.position) {
      Some(token) => *token,
      None => Token {
        kind: TokenKind::EndOfFile,
        start: u32::try_from(self.ast.source.len()).unwrap_or(u32::MAX),
        length: 0,
      },
    }
  }

  fn current_kind(&self) -> TokenKind {
    self.current_token().kind
  }

  fn peek_kind(&self) -> TokenKind {
    (self.ast.tokens.get(self.position + 1)).map_or(TokenKind::EndOfFile, |token| token.kind)
  }

  fn current_text(&self) -> &str {
    Span::from(self.current_token()).source_text(&self.ast.source)
  }

  fn advance(&mut self) -> TokenIdx {
    let token = self.current_token_id();
    if !self.is_finished() {
      self.position += 1;
    }
    token
  }

  fn expect(&mut self, kind: TokenKind) -> Option<TokenIdx> {
    if self.current_kind() == kind {
      Some(self.advance())
    } else {
      self.add_error(ParseError::Expected {
        expected: kind,
        received: self.current_token(),
      });

      None
    }
  }

  fn matches(&mut self, kind: TokenKind) -> bool {
    if self.current_kind() == kind {
      self.position += 1;
      true
    } else {
      false
    }
  }

  fn expect_identifier(&mut self) -> Option<Identifier> {
    if self.current_kind() == TokenKind::Identifier {
      Some(Identifier {
        token: self.advance(),
      })
    } else {
      self.add_error(ParseError::ExpectedIdentifier(self.current_token()));
      None
    }
  }

  /// Skip tokens until the end of the current statement
  fn resync(&mut self) {
    while !matches!(
      self.current_kind(),
      TokenKind::Dot | TokenKind::RightSquare | TokenKind::RightCurly | TokenKind::EndOfFile
    ) {
      self.position += 1;
    }
  }

  fn parse_class(&mut self) -> ClassDefinition {
    let keyword = self.advance();

    // `class A: B` tokenises the name as a keyword part
    let (name, superclass) = if self.current_kind() == TokenKind::Keyword {
      let name = Identifier {
        token: self.advance(),
      };
      (name, self.expect_identifier())
    } else {
      let name = self.expect_identifier();
      let superclass = if self.matches(TokenKind::Colon) {
        self.expect_identifier()
      } else {
        None
      };
      (name.unwrap_or(Identifier { token: keyword }), superclass)
    };

    let mut class = ClassDefinition {
      keyword,
      name,
      superclass,
      fields: ThinVec::new(),
      methods: ThinVec::new(),
      closing: None,
    };

    if self.expect(TokenKind::LeftSquare).is_none() {
      return class;
    }

    if self.current_kind() == TokenKind::Pipe {
      class.fields = self.parse_variables();
    }

    while !matches!(
      self.current_kind(),
      TokenKind::RightSquare | TokenKind::EndOfFile
    ) {
      if let Some(method) = self.parse_method() {
        class.methods.push(self.ast.add_method(method));
      } else {
        self.position += 1;
      }
    }

    class.closing = self.expect(TokenKind::RightSquare);
    class
  }

  fn parse_method(&mut self) -> Option<Method> {
    let class_keyword = if self.current_kind() == TokenKind::Class {
      Some(self.advance())
    } else {
      None
    };

    let signature = match self.current_kind() {
      TokenKind::Identifier => Signature::Unary(Identifier {
        token: self.advance(),
      }),
      TokenKind::BinaryOperator => {
        let operator = self.advance();
        let parameter = self.expect_identifier()?;
        Signature::Binary {
          operator,
          parameter,
        }
      }
      TokenKind::Keyword => {
        let mut parts = ThinVec::new();
        while self.current_kind() == TokenKind::Keyword {
          let keyword = self.advance();
          let parameter = self.expect_identifier()?;
          parts.push((keyword, parameter));
        }
        Signature::Keyword(parts)
      }
      _ => {
        self.add_error(ParseError::ExpectedMethod(self.current_token()));
        return None;
      }
    };

    let body = if self.current_kind() == TokenKind::BinaryOperator && self.current_text() == "<" {
      self.parse_primitive_body()?
    } else {
      self.expect(TokenKind::LeftSquare)?;
      let body = self.parse_body();
      self.expect(TokenKind::RightSquare);
      MethodBody::Code(body)
    };

    Some(Method {
      class_keyword,
      signature,
      body,
    })
  }

  /// `<primitive:#Name>`
  fn parse_primitive_body(&mut self) -> Option<MethodBody> {
    self.advance();

    if self.current_kind() != TokenKind::Keyword || self.current_text() != "primitive:" {
      self.add_error(ParseError::ExpectedPrimitive(self.current_token()));
      return None;
    }
    self.advance();

    let name = self.expect(TokenKind::Symbol)?;

    if self.current_kind() == TokenKind::BinaryOperator && self.current_text() == ">" {
      self.advance();
    } else {
      self.add_error(ParseError::ExpectedPrimitive(self.current_token()));
    }

    Some(MethodBody::Primitive { name })
  }

  /// `| a b c |`
  fn parse_variables(&mut self) -> ThinVec<Identifier> {
    self.advance();

    let mut variables = ThinVec::new();
    while self.current_kind() == TokenKind::Identifier {
      variables.push(Identifier {
        token: self.advance(),
      });
    }
    self.expect(TokenKind::Pipe);

    variables
  }

  fn parse_body(&mut self) -> Body {
    let mut body = Body::default();

    if self.current_kind() == TokenKind::Pipe {
      body.locals = self.parse_variables();
    }

    while !matches!(
      self.current_kind(),
      TokenKind::RightSquare | TokenKind::EndOfFile | TokenKind::Class
    ) {
      let statement = self.parse_statement();
      body.statements.push(statement);

      if !self.matches(TokenKind::Dot) {
        break;
      }
      while self.matches(TokenKind::Dot) {}
    }

    body
  }

  fn parse_statement(&mut self) -> StatementIdx {
    let errors = self.ast.errors.len();

    let statement = match self.current_kind() {
      TokenKind::Identifier if self.peek_kind() == TokenKind::Assign => {
        let target = Identifier {
          token: self.advance(),
        };
        self.advance();
        let expression = self.parse_expression();
        self.ast.add_statement(Assignment { target, expression })
      }
      TokenKind::Caret => {
        let caret = self.advance();
        let expression = self.parse_expression();
        self.ast.add_statement(Return { caret, expression })
      }
      _ => {
        let expression = self.parse_expression();
        self.ast.add_statement(ExpressionStatement { expression })
      }
    };

    if self.ast.errors.len() > errors {
      self.resync();
    }

    statement
  }

  fn parse_expression(&mut self) -> ExpressionIdx {
    let receiver = self.parse_binary();

    if self.current_kind() != TokenKind::Keyword {
      return receiver;
    }

    let mut parts = ThinVec::new();
    while self.current_kind() == TokenKind::Keyword {
      let keyword = self.advance();
      let argument = self.parse_binary();
      parts.push((keyword, argument));
    }

    self.ast.add_expression(KeywordSend { receiver, parts })
  }

  fn parse_binary(&mut self) -> ExpressionIdx {
    let mut receiver = self.parse_unary();

    while self.current_kind() == TokenKind::BinaryOperator {
      let operator = self.advance();
      let argument = self.parse_unary();
      receiver = self.ast.add_expression(BinarySend {
        receiver,
        operator,
        argument,
      });
    }

    receiver
  }

  fn parse_unary(&mut self) -> ExpressionIdx {
    let mut receiver = self.parse_primary();

    while self.current_kind() == TokenKind::Identifier {
      let selector = self.advance();
      receiver = self.ast.add_expression(UnarySend { receiver, selector });
    }

    receiver
  }

  fn parse_primary(&mut self) -> ExpressionIdx {
    let token = self.current_token();
    let id = self.current_token_id();

    let literal = |kind| Literal {
      first: id,
      last: id,
      kind,
    };

    let expression: Result<Expression, ParseError> = match token.kind {
      TokenKind::Nil => Ok(literal(LiteralKind::Nil).into()),
      TokenKind::True => Ok(literal(LiteralKind::True).into()),
      TokenKind::False => Ok(literal(LiteralKind::False).into()),
      TokenKind::SelfKeyword => Ok(literal(LiteralKind::SelfReference).into()),
      TokenKind::Number => self.number(token, false).map(|kind| literal(kind).into()),
      TokenKind::Character => Ok(literal(LiteralKind::Character(self.character())).into()),
      TokenKind::String => Ok(literal(LiteralKind::String(self.string())).into()),
      TokenKind::Symbol => {
        let symbol = self.current_text().trim_start_matches('#').to_owned();
        Ok(literal(LiteralKind::Symbol(symbol)).into())
      }
      TokenKind::BinaryOperator if self.is_negative_number() => {
        let first = self.advance();
        let number = self.current_token();
        return match self.number(number, true) {
          Ok(kind) => {
            let last = self.advance();
            self.ast.add_expression(Literal { first, last, kind })
          }
          Err(error) => {
            self.add_error(error);
            self.advance();
            self.ast.add_expression(Invalid { token: first })
          }
        };
      }
      TokenKind::Super => Ok(Super { token: id }.into()),
      TokenKind::Identifier => Ok(Variable { token: id }.into()),
      TokenKind::LeftSquare => return self.parse_block(),
      TokenKind::LeftCurly => return self.parse_array(),
      TokenKind::LeftParen => return self.parse_group(),
      TokenKind::Unknown => Err(ParseError::UnknownCharacter(token)),
      TokenKind::UnterminatedString => Err(ParseError::UnterminatedString(token)),
      TokenKind::UnterminatedComment => Err(ParseError::UnterminatedComment(token)),
      _ => Err(ParseError::ExpectedExpression(token)),
    };

    match expression {
      Ok(expression) => {
        self.advance();
        self.ast.add_expression(expression)
      }
      Err(error) => {
        self.add_error(error);
        self.ast.add_expression(Invalid { token: id })
      }
    }
  }

  /// A `-` directly followed by a number, with no space between
  fn is_negative_number(&self) -> bool {
    let token = self.current_token();
    self.current_text() == "-"
      && (self.ast.tokens.get(self.position + 1))
        .is_some_and(|next| next.kind == TokenKind::Number && next.start == token.end())
  }

  fn number(&self, token: Token, negative: bool) -> Result<LiteralKind, ParseError> {
    let text = Span::from(token).source_text(&self.ast.source);

    if text.contains('.') {
      let value = text.parse::<f32>().unwrap_or_default();
      return Ok(LiteralKind::Float(if negative { -value } else { value }));
    }

    let value = text.parse::<i64>().map_err(|_| ParseError::IntegerOutOfRange(token))?;
    let value = if negative { -value } else { value };
    i32::try_from(value)
      .map(LiteralKind::Integer)
      .map_err(|_| ParseError::IntegerOutOfRange(token))
  }

  fn character(&self) -> char {
    self.current_text().chars().nth(1).unwrap_or_default()
  }

  fn string(&self) -> String {
    let text = self.current_text();
    text[1..text.len() - 1].replace("''", "'")
  }

  fn parse_block(&mut self) -> ExpressionIdx {
    let opening = self.advance();

    let mut parameters = ThinVec::new();
    if self.current_kind() == TokenKind::Colon {
      while self.matches(TokenKind::Colon) {
        if let Some(parameter) = self.expect_identifier() {
          parameters.push(parameter);
        }
      }

      // `[:x || a | ...]` closes the parameters and opens the locals together
      if self.current_kind() != TokenKind::RightSquare {
        self.expect(TokenKind::Pipe);
      }
    }

    let body = self.parse_body();
    let closing = self.expect(TokenKind::RightSquare);

    self.ast.add_expression(Block {
      opening,
      parameters,
      body,
      closing,
    })
  }

  fn parse_array(&mut self) -> ExpressionIdx {
    let opening = self.advance();

    let mut items = ThinVec::new();
    while !matches!(
      self.current_kind(),
      TokenKind::RightCurly | TokenKind::EndOfFile
    ) {
      items.push(self.parse_expression());

      if !self.matches(TokenKind::Dot) {
        break;
      }
    }
    let closing = self.expect(TokenKind::RightCurly);

    self.ast.add_expression(Array {
      opening,
      items,
      closing,
    })
  }

  fn parse_group(&mut self) -> ExpressionIdx {
    let opening = self.advance();
    let expression = self.parse_expression();
    let closing = self.expect(TokenKind::RightParen);

    self.ast.add_expression(Group {
      opening,
      expression,
      closing,
    })
  }
}

/// An error found whilst parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
  /// Expected a token of a certain kind
  Expected {
    /// Expected Token Kind to be
    expected: TokenKind,
    /// Received this Token instead
    received: Token,
  },
  /// Expected Expression
  ExpectedExpression(Token),
  /// Expected Identifier
  ExpectedIdentifier(Token),
  /// Expected Method Definition
  ExpectedMethod(Token),
  /// Expected `<primitive:#Name>`
  ExpectedPrimitive(Token),
  /// Class definitions must come before the top-level statements
  ClassAfterStatements(Token),
  /// Integer literal does not fit in 32 bits
  IntegerOutOfRange(Token),
  /// Unknown Character
  UnknownCharacter(Token),
  /// Unterminated String Literal
  UnterminatedString(Token),
  /// Unterminated Comment
  UnterminatedComment(Token),
}
impl ParseError {
  /// The title of the error message
  #[must_use]
  pub fn title(&self) -> String {
    match self {
      Self::Expected { expected, .. } => format!("Expected {expected}"),
      Self::ExpectedExpression(_) => "Expected Expression".into(),
      Self::ExpectedIdentifier(_) => "Expected Identifier".into(),
      Self::ExpectedMethod(_) => "Expected Method Definition".into(),
      Self::ExpectedPrimitive(_) => "Expected Primitive".into(),
      Self::ClassAfterStatements(_) => "Class After Statements".into(),
      Self::IntegerOutOfRange(_) => "Integer Out of Range".into(),
      Self::UnknownCharacter(_) => "Unknown Character".into(),
      Self::UnterminatedString(_) => "Unterminated String".into(),
      Self::UnterminatedComment(_) => "Unterminated Comment".into(),
    }
  }

  /// The body of the error message describing what has gone wrong
  #[must_use]
  pub fn message(&self) -> String {
    match self {
      Self::Expected { expected, received } => {
        format!("expected {expected} but got {}", received.kind)
      }
      Self::ExpectedExpression(t) => format!("expected expression but got {}", t.kind),
      Self::ExpectedIdentifier(t) => format!("expected identifier but got {}", t.kind),
      Self::ExpectedMethod(t) => {
        format!("expected a unary, operator, or keyword method header but got {}", t.kind)
      }
      Self::ExpectedPrimitive(_) => "primitive methods are written `<primitive:#Name>`".into(),
      Self::ClassAfterStatements(_) => {
        "classes must be defined before the top-level statements".into()
      }
      Self::IntegerOutOfRange(_) => "integer literal does not fit in 32 bits".into(),
      Self::UnknownCharacter(_) => "got unknown character".into(),
      Self::UnterminatedString(_) => "missing closing quote for string".into(),
      Self::UnterminatedComment(_) => "missing closing double quote for comment".into(),
    }
  }

  /// The location of the error
  pub fn span(&self) -> Span {
    match self {
      Self::Expected { received, .. } => received.into(),
      Self::ExpectedExpression(token)
      | Self::ExpectedIdentifier(token)
      | Self::ExpectedMethod(token)
      | Self::ExpectedPrimitive(token)
      | Self::ClassAfterStatements(token)
      | Self::IntegerOutOfRange(token)
      | Self::UnknownCharacter(token)
      | Self::UnterminatedString(token)
      | Self::UnterminatedComment(token) => token.into(),
    }
  }
}
impl fmt::Display for ParseError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.message())
  }
}
impl error::Error for ParseError {}
