use crate::span::Span;
use std::{fmt, iter};

/// Convert a string of source code into an [Iterator] of [Token]s
pub struct Tokeniser<'source> {
  /// The source code to tokenise
  source: &'source [u8],
  /// The current position in the source code
  position: usize,
}
impl<'source> From<&'source str> for Tokeniser<'source> {
  /// Create a new [Tokeniser] from a source code string
  ///
  /// # Panics
  /// Panics if the length of the source code is greater than `u32::MAX`
  fn from(value: &'source str) -> Self {
    assert!(value.len() < u32::MAX as usize);

    Self {
      source: value.as_ref(),
      position: 0,
    }
  }
}
impl Tokeniser<'_> {
  /// Has the end of the source code been reached?
  fn is_end(&self, position: usize) -> bool {
    position >= self.source.len()
  }

  /// Get the next token from the source code
  fn get_next_token(&mut self) -> (TokenKind, usize) {
    if self.is_end(self.position) {
      return (TokenKind::EndOfFile, 0);
    }

    let character = &self.source[self.position];
    let next_character = self.source.get(self.position + 1);

    match character {
      // Whitespace + Comments
      b' ' | b'\r' | b'\t' | b'\n' => {
        self.position += 1;
        self.get_next_token()
      }
      b'"' => self.comment(),

      // Values
      b'\'' => self.string(),
      b'$' => self.character(),
      b'#' => self.symbol(),
      b'0'..=b'9' => self.number(),
      b'_' | b'a'..=b'z' | b'A'..=b'Z' => self.identifier(),

      // Brackets
      b'(' => (TokenKind::LeftParen, 1),
      b')' => (TokenKind::RightParen, 1),
      b'[' => (TokenKind::LeftSquare, 1),
      b']' => (TokenKind::RightSquare, 1),
      b'{' => (TokenKind::LeftCurly, 1),
      b'}' => (TokenKind::RightCurly, 1),

      // Punctuation
      b':' if matches!(next_character, Some(b'=')) => (TokenKind::Assign, 2),
      b':' => (TokenKind::Colon, 1),
      b'.' => (TokenKind::Dot, 1),
      b';' => (TokenKind::Semicolon, 1),
      b'^' => (TokenKind::Caret, 1),
      b'|' => (TokenKind::Pipe, 1),

      // Operators
      x if is_operator_character(*x) => self.operator(),

      // Unknown character
      x => (TokenKind::Unknown, utf8_length(*x)),
    }
  }

  /// Skip to the end of a comment token, the closing double quote
  fn comment(&self) -> (TokenKind, usize) {
    match self.source[self.position + 1..]
      .iter()
      .position(|c| *c == b'"')
    {
      Some(length) => (TokenKind::Comment, length + 2),
      None => (
        TokenKind::UnterminatedComment,
        self.source.len() - self.position,
      ),
    }
  }

  /// Go to the end of a string token, the closing quote
  ///
  /// A doubled quote (`''`) is part of the string
  fn string(&self) -> (TokenKind, usize) {
    let mut pos = self.position + 1;

    loop {
      if self.is_end(pos) {
        break (TokenKind::UnterminatedString, pos - self.position);
      } else if self.source[pos] == b'\'' {
        if self.source.get(pos + 1) == Some(&b'\'') {
          pos += 2;
          continue;
        }
        break (TokenKind::String, pos - self.position + 1);
      }

      pos += 1;
    }
  }

  /// A character literal, `$` followed by any single character
  fn character(&self) -> (TokenKind, usize) {
    match self.source.get(self.position + 1) {
      Some(x) => (TokenKind::Character, 1 + utf8_length(*x)),
      None => (TokenKind::Unknown, 1),
    }
  }

  /// A symbol literal, `#` followed by an identifier, keywords, or an operator
  fn symbol(&self) -> (TokenKind, usize) {
    let rest = &self.source[self.position + 1..];

    let length = match rest.first() {
      Some(x) if x.is_ascii_alphabetic() || *x == b'_' => rest
        .iter()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, b'_' | b':'))
        .count(),
      Some(x) if is_operator_character(*x) => rest
        .iter()
        .take_while(|c| is_operator_character(**c))
        .count(),
      _ => return (TokenKind::Unknown, 1),
    };

    (TokenKind::Symbol, length + 1)
  }

  /// Get a number token, with possible decimal part
  fn number(&self) -> (TokenKind, usize) {
    let mut position = self.position + 1;

    // Match numbers before the decimal point
    position += self.source[position..]
      .iter()
      .take_while(|c| c.is_ascii_digit())
      .count();

    // Match a decimal point, only if followed by a digit as `.` also ends a statement
    if !self.is_end(position + 1)
      && self.source[position] == b'.'
      && self.source[position + 1].is_ascii_digit()
    {
      position += 1;

      position += self.source[position..]
        .iter()
        .take_while(|c| c.is_ascii_digit())
        .count();
    }

    (TokenKind::Number, position - self.position)
  }

  /// Get an identifier token, a sequence of [a-zA-Z0-9_]
  ///
  /// If directly followed by a colon (but not `:=`) it is a keyword part
  fn identifier(&self) -> (TokenKind, usize) {
    let mut position = self.position;

    while !self.is_end(position + 1)
      && let next_char = self.source[position + 1]
      && (next_char.is_ascii_alphanumeric() || next_char == b'_')
    {
      position += 1;
    }

    let length = position + 1 - self.position;

    if self.source.get(position + 1) == Some(&b':')
      && self.source.get(position + 2) != Some(&b'=')
    {
      return (TokenKind::Keyword, length + 1);
    }

    (self.identifier_type(length), length)
  }

  /// Determines the type of the identifier, is it a reserved word or a standard identifier
  fn identifier_type(&self, length: usize) -> TokenKind {
    match self.source[self.position] {
      b'c' if self.is_keyword(length, "class") => TokenKind::Class,
      b'f' if self.is_keyword(length, "false") => TokenKind::False,
      b'n' if self.is_keyword(length, "nil") => TokenKind::Nil,
      b's' if self.is_keyword(length, "self") => TokenKind::SelfKeyword,
      b's' if self.is_keyword(length, "super") => TokenKind::Super,
      b't' if self.is_keyword(length, "true") => TokenKind::True,
      _ => TokenKind::Identifier,
    }
  }

  /// Checks if the source of the current token is equal to a keyword
  fn is_keyword(&self, length: usize, keyword: &'static str) -> bool {
    let end = self.position + length;
    &self.source[self.position..end] == keyword.as_bytes()
  }

  /// A run of binary operator characters, e.g. `+`, `<=`, `~=`, `\\`
  fn operator(&self) -> (TokenKind, usize) {
    let length = self.source[self.position..]
      .iter()
      .take_while(|c| is_operator_character(**c))
      .count();

    (TokenKind::BinaryOperator, length)
  }
}
impl Iterator for Tokeniser<'_> {
  type Item = Token;

  fn next(&mut self) -> Option<Self::Item> {
    if self.is_end(self.position) {
      return None;
    }

    let (kind, len) = self.get_next_token();
    let start = self.position;
    self.position += len;

    if kind == TokenKind::EndOfFile {
      return None;
    }

    Some(Token {
      kind,
      start: u32::try_from(start).unwrap_or(u32::MAX),
      length: u32::try_from(len).unwrap_or(u32::MAX),
    })
  }
}
impl iter::FusedIterator for Tokeniser<'_> {}

fn is_operator_character(character: u8) -> bool {
  matches!(
    character,
    b'+' | b'-' | b'*' | b'/' | b'\\' | b'<' | b'>' | b'=' | b'~' | b',' | b'@' | b'%' | b'&' | b'?'
  )
}

fn utf8_length(first_byte: u8) -> usize {
  match first_byte {
    x if (x & 0b1111_0000) == 0b1111_0000 => 4,
    x if (x & 0b1110_0000) == 0b1110_0000 => 3,
    x if (x & 0b1100_0000) == 0b1100_0000 => 2,
    _ => 1,
  }
}

/// A Token of source code, a lexeme of the language
///
/// With the type of token, start position and length of the token in the source code
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Token {
  /// The kind of the token
  pub kind: TokenKind,
  /// Byte offset of the start of the token
  pub start: u32,
  /// Length of the token in bytes
  pub length: u32,
}
impl Token {
  /// The byte offset directly after the token
  #[must_use]
  pub fn end(&self) -> u32 {
    self.start + self.length
  }
}
impl From<Token> for Span {
  fn from(token: Token) -> Self {
    Self {
      start: token.start,
      end: token.end(),
    }
  }
}
impl From<&Token> for Span {
  fn from(token: &Token) -> Self {
    Span::from(*token)
  }
}

/// The type of a token
#[derive(Copy, Clone, Default, Debug, PartialEq, Eq)]
pub enum TokenKind {
  // Brackets
  /// `(`
  LeftParen,
  /// `)`
  RightParen,
  /// `[`
  LeftSquare,
  /// `]`
  RightSquare,
  /// `{`
  LeftCurly,
  /// `}`
  RightCurly,

  // Punctuation
  /// `:=`
  Assign,
  /// `:`
  Colon,
  /// `.`
  Dot,
  /// `;`
  Semicolon,
  /// `^`
  Caret,
  /// `|`
  Pipe,

  // Values
  /// A identifier, a sequence of [a-zA-Z0-9_]
  Identifier,
  /// A keyword message part, an identifier directly followed by a colon, e.g. `at:`
  Keyword,
  /// A run of operator characters, e.g. `+`, `<=`, `,`
  BinaryOperator,
  /// A number, with a possible decimal part
  Number,
  /// A character, e.g. `$a`
  Character,
  /// A string, any characters between `'`
  String,
  /// A symbol, e.g. `#foo`, `#at:put:`
  Symbol,

  // Reserved Words
  /// `class`
  Class,
  /// `false`
  False,
  /// `nil`
  Nil,
  /// `self`
  SelfKeyword,
  /// `super`
  Super,
  /// `true`
  True,

  // Comments
  /// A comment, any characters between `"`
  Comment,
  /// A token to indicate the end of the file
  EndOfFile,

  // Error
  /// An unknown character, not known to fit in a [`TokenKind`]
  #[default]
  Unknown,
  /// A string where the end of the file has been reached, thus unterminated
  UnterminatedString,
  /// A comment where the end of the file has been reached
  UnterminatedComment,
}
impl TokenKind {
  /// Is the token always the same text, so its length doesn't need showing?
  #[must_use]
  pub fn has_fixed_length(self) -> bool {
    !matches!(
      self,
      Self::Identifier
        | Self::Keyword
        | Self::BinaryOperator
        | Self::Number
        | Self::Character
        | Self::String
        | Self::Symbol
        | Self::Comment
        | Self::Unknown
        | Self::UnterminatedString
        | Self::UnterminatedComment
    )
  }
}
impl fmt::Display for TokenKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      // Brackets
      Self::LeftParen => write!(f, "("),
      Self::RightParen => write!(f, ")"),
      Self::LeftSquare => write!(f, "["),
      Self::RightSquare => write!(f, "]"),
      Self::LeftCurly => write!(f, "{{"),
      Self::RightCurly => write!(f, "}}"),

      // Punctuation
      Self::Assign => write!(f, ":="),
      Self::Colon => write!(f, ":"),
      Self::Dot => write!(f, "."),
      Self::Semicolon => write!(f, ";"),
      Self::Caret => write!(f, "^"),
      Self::Pipe => write!(f, "|"),

      // With Values
      Self::Identifier => write!(f, "Identifier"),
      Self::Keyword => write!(f, "Keyword"),
      Self::BinaryOperator => write!(f, "Operator"),
      Self::Number => write!(f, "Number"),
      Self::Character => write!(f, "Character"),
      Self::String => write!(f, "String"),
      Self::Symbol => write!(f, "Symbol"),

      // Reserved Words
      Self::Class => write!(f, "class"),
      Self::False => write!(f, "false"),
      Self::Nil => write!(f, "nil"),
      Self::SelfKeyword => write!(f, "self"),
      Self::Super => write!(f, "super"),
      Self::True => write!(f, "true"),

      // Comments
      Self::Comment => write!(f, "Comment"),
      Self::EndOfFile => write!(f, "End of File"),

      // Errors
      Self::Unknown => write!(f, "Unknown Character"),
      Self::UnterminatedString => write!(f, "Unterminated String"),
      Self::UnterminatedComment => write!(f, "Unterminated Comment"),
    }
  }
}
