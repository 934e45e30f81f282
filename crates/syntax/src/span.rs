//! Positions in the source code, as byte ranges and as lines and columns.

use std::iter;

/// A range of bytes in the source code
#[must_use]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
  /// The byte index of the start of the span
  pub start: u32,
  /// The byte index after the end of the span
  pub end: u32,
}

impl Span {
  /// Create a new `Span` from a start and end position
  #[inline]
  pub const fn new(start: u32, end: u32) -> Self {
    Self { start, end }
  }

  /// An empty `Span` at a position
  #[inline]
  pub const fn at(position: u32) -> Self {
    Self::new(position, position)
  }

  /// The smallest `Span` covering both, where the default `Span` counts as missing
  pub fn merge(self, other: Self) -> Self {
    match (self == Self::default(), other == Self::default()) {
      (true, _) => other,
      (_, true) => self,
      _ => Self::new(self.start.min(other.start), self.end.max(other.end)),
    }
  }

  /// The text covered by the `Span`, empty if it is outside the source
  #[must_use]
  pub fn source_text(self, source_text: &str) -> &str {
    let start = self.start as usize;
    let end = (self.end as usize).min(source_text.len());

    source_text.get(start..end).unwrap_or_default()
  }
}

/// A line and column in the source code, both counted from 1
///
/// Columns count bytes, not characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Location {
  /// The line number
  pub line: u32,
  /// The byte offset into the line, plus one
  pub column: u32,
}

/// Converts between byte offsets and lines of the source
#[must_use]
#[derive(Debug)]
pub struct LineIndex {
  line_starts: Vec<u32>,
  length: u32,
}
impl LineIndex {
  /// Find where each line of a source string starts.
  pub fn from_source(source: &str) -> Self {
    let offset = |index: usize| u32::try_from(index).unwrap_or(u32::MAX);

    let line_starts = iter::once(0)
      .chain(source.match_indices('\n').map(|(index, _)| offset(index + 1)))
      .collect();

    Self {
      line_starts,
      length: offset(source.len()),
    }
  }

  /// The line a byte offset is on, from 1
  fn line_of(&self, offset: u32) -> usize {
    self.line_starts.partition_point(|start| *start <= offset)
  }

  /// The line which a `Span` starts on
  #[must_use]
  pub fn line(&self, span: Span) -> usize {
    self.line_of(span.start)
  }

  /// The line which a `Span` ends on
  #[must_use]
  pub fn final_line(&self, span: Span) -> usize {
    self.line_of(span.end)
  }

  /// The line and column of a byte offset
  #[must_use]
  pub fn location(&self, offset: u32) -> Location {
    let line = self.line_of(offset);
    let line_start = self.line_starts[line - 1];

    Location {
      line: u32::try_from(line).unwrap_or(u32::MAX),
      column: offset - line_start + 1,
    }
  }

  /// The byte offset of a line and column, if it is inside the source
  #[must_use]
  pub fn offset(&self, location: Location) -> Option<u32> {
    let line = usize::try_from(location.line.checked_sub(1)?).ok()?;
    let line_start = *self.line_starts.get(line)?;
    let offset = line_start.checked_add(location.column.checked_sub(1)?)?;

    (offset <= self.length).then_some(offset)
  }

  /// The `Span` of a whole line, including its newline
  ///
  /// Lines past the end of the source are empty.
  pub fn line_span(&self, line: usize) -> Span {
    let start = (line.checked_sub(1))
      .and_then(|index| self.line_starts.get(index))
      .map_or(self.length, |start| *start);
    let end = self.line_starts.get(line).map_or(self.length, |end| *end);

    Span::new(start, end)
  }
}
