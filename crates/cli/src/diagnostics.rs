use owo_colors::{OwoColorize, Style};
use smalltalk_syntax::{LineIndex, Span};
use std::fmt;

#[derive(Debug)]
pub enum Severity {
  Error,
  Warning,
}
pub struct Message {
  pub title: String,
  pub body: String,
  pub severity: Severity,
}
impl Message {
  pub fn error(message: String) -> Self {
    Self {
      title: message,
      body: String::new(),
      severity: Severity::Error,
    }
  }
  pub fn warning(message: String) -> Self {
    Self {
      title: message,
      body: String::new(),
      severity: Severity::Warning,
    }
  }
}
impl fmt::Display for Message {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.severity {
      Severity::Error => write!(f, "{}", "✕ Error".bold().red()),
      Severity::Warning => write!(f, "{}", "⚠ Warning".bold().yellow()),
    }?;
    writeln!(f, "{} {}", ":".bold(), &self.title.bold())?;

    if !self.body.is_empty() {
      writeln!(f, "{}", &self.body)?;
    }

    Ok(())
  }
}
/// An error which can be shown to the user
pub trait Diagnostic {
  /// A short summary, shown in bold
  fn title(&self) -> String;
  /// What went wrong in detail
  fn body(&self) -> String;
}
impl Diagnostic for smalltalk_syntax::ParseError {
  fn title(&self) -> String {
    self.title()
  }
  fn body(&self) -> String {
    self.message()
  }
}
impl Diagnostic for smalltalk_interpreter::CompileError {
  fn title(&self) -> String {
    self.title().to_owned()
  }
  fn body(&self) -> String {
    self.message()
  }
}
impl Diagnostic for smalltalk_interpreter::RuntimeError {
  fn title(&self) -> String {
    self.title().to_owned()
  }
  fn body(&self) -> String {
    self.message()
  }
}
impl<T: Diagnostic> From<&T> for Message {
  fn from(diagnostic: &T) -> Self {
    Self {
      title: diagnostic.title(),
      body: diagnostic.body(),
      severity: Severity::Error,
    }
  }
}

pub struct CodeFrame<'a> {
  title: &'a str,
  source: &'a str,
  span: Span,

  lines: LineIndex,
}
impl<'a> CodeFrame<'a> {
  pub fn new(title: &'a str, source: &'a str, span: Span) -> Self {
    Self {
      title: if title == "-" { "STDIN" } else { title },
      source,
      span,
      lines: LineIndex::from_source(source),
    }
  }
}
impl fmt::Display for CodeFrame<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let start_line = self.lines.line(self.span).max(1);
    let end_line = self.lines.final_line(self.span).max(start_line);

    writeln!(
      f,
      "    {}{}{}{}{}",
      "╭─[".dimmed(),
      self.title,
      ":".dimmed(),
      start_line,
      "]".dimmed()
    )?;

    for line in start_line..=end_line {
      let line_text = self.lines.line_span(line).source_text(self.source);
      let line_text = line_text.trim_end_matches(['\n', '\r']);

      write!(f, "{line:>3} {}", "│".dimmed())?;
      if !line_text.is_empty() {
        write!(f, " ")?;
      }
      highlight_source(f, line_text)?;
      writeln!(f)?;
    }

    write!(f, "{}", "────╯".dimmed())
  }
}

pub fn highlight_source(output: &mut dyn fmt::Write, source: &str) -> fmt::Result {
  use smalltalk_syntax::{TokenKind, tokenise};

  let mut last = 0;
  for token in tokenise(source) {
    if token.kind == TokenKind::EndOfFile {
      break;
    }

    // if there is a gap between tokens, add spaces for the gap
    for _ in last..token.start {
      write!(output, " ")?;
    }

    let style = match token.kind {
      TokenKind::Number
      | TokenKind::Character
      | TokenKind::True
      | TokenKind::False
      | TokenKind::Nil => Style::new().blue(),
      TokenKind::String | TokenKind::Symbol | TokenKind::UnterminatedString => {
        Style::new().green()
      }
      TokenKind::Class | TokenKind::SelfKeyword | TokenKind::Super | TokenKind::Caret => {
        Style::new().cyan()
      }
      TokenKind::Keyword => Style::new().magenta(),
      TokenKind::Comment | TokenKind::UnterminatedComment => Style::new().dimmed(),
      _ => Style::new(),
    };
    let token_text = Span::from(token).source_text(source);
    write!(output, "{}", token_text.style(style))?;

    last = token.end();
  }

  Ok(())
}
