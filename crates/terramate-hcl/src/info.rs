//! source locations
//!
//! The grammar layer hands out byte spans. Everything user facing wants a line and a column as well, so spans are
//! converted once (see [LineIndex]) into a [SourceRange] that also knows which file it points into.
use std::ops::Range;
use std::path::{Path, PathBuf};

/// A position inside a file
///
/// `line` and `column` are 1-based, `byte` is the 0-based offset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
    pub byte: usize,
}

impl Pos {
    pub fn new(line: usize, column: usize, byte: usize) -> Self {
        Self { line, column, byte }
    }
}

/// A range inside a file, `end` is exclusive
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SourceRange {
    pub path: PathBuf,
    pub start: Pos,
    pub end: Pos,
}

impl SourceRange {
    pub fn new(path: impl Into<PathBuf>, start: Pos, end: Pos) -> Self {
        Self {
            path: path.into(),
            start,
            end,
        }
    }

    /// An empty range pointing at the beginning of `path`
    pub fn file_start(path: impl Into<PathBuf>) -> Self {
        let start = Pos::new(1, 1, 0);
        Self::new(path, start, start)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory of the file this range points into
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new(""))
    }

    /// Smallest range that covers both `self` and `other`
    ///
    /// Ranges from different files can't be joined, `self` is returned unchanged in that case.
    pub fn union(&self, other: &SourceRange) -> SourceRange {
        if self.path != other.path {
            return self.clone();
        }

        SourceRange {
            path: self.path.clone(),
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl std::fmt::Display for SourceRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{},{}-{},{}",
            self.path.display(),
            self.start.line,
            self.start.column,
            self.end.line,
            self.end.column
        )
    }
}

/// Converts byte offsets of one source text into [Pos]itions
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// byte offset of the first character of each line
    line_starts: Vec<usize>,
    text: String,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(offset, _)| offset + 1))
            .collect();

        Self {
            line_starts,
            text: text.to_owned(),
        }
    }

    pub fn pos(&self, byte: usize) -> Pos {
        let byte = byte.min(self.text.len());
        let line = match self.line_starts.binary_search(&byte) {
            Ok(line) => line,
            Err(next) => next - 1,
        };

        let line_start = self.line_starts[line];
        let column = self
            .text
            .get(line_start..byte)
            .map_or(byte - line_start, |prefix| prefix.chars().count())
            + 1;

        Pos::new(line + 1, column, byte)
    }

    pub fn range(&self, path: &Path, span: Option<Range<usize>>) -> SourceRange {
        let span = span.unwrap_or(0..0);
        SourceRange::new(path, self.pos(span.start), self.pos(span.end))
    }

    /// Source text covered by `span`, empty if the span is unknown or out of bounds
    pub fn snippet(&self, span: Option<Range<usize>>) -> &str {
        span.and_then(|span| self.text.get(span))
            .map(str::trim)
            .unwrap_or_default()
    }
}
