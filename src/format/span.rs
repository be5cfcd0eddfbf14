//! Source span attachment for parser diagnostics.
//!
//! - [`WithSpan`] wraps a value together with the byte range of the source text it came from.
//! - [`WithSpanExt`] adds a shorthand constructor on any value.

use std::ops::Range;

/// A value paired with the byte range (`start..end`) of the source text it was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WithSpan<T> {
    content: T,
    /// Start byte index in the source (inclusive).
    start: usize,
    /// End byte index in the source (exclusive).
    end: usize,
}

impl<T> WithSpan<T> {
    /// Attaches the span `start..end` to `content`.
    pub const fn new(content: T, start: usize, end: usize) -> Self {
        Self {
            content,
            start,
            end,
        }
    }

    /// Returns the wrapped content.
    pub const fn content(&self) -> &T {
        &self.content
    }

    /// Takes the content out of the wrapper.
    pub fn into_content(self) -> T {
        self.content
    }

    /// Returns the span as a range of byte indices.
    pub const fn span(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Maps the content, keeping the span.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> WithSpan<U> {
        WithSpan::new(f(self.content), self.start, self.end)
    }
}

impl<T: std::fmt::Display> std::fmt::Display for WithSpan<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}..{}", self.content, self.start, self.end)
    }
}

impl<T: std::error::Error> std::error::Error for WithSpan<T> {}

/// Extension to attach a span to any value.
pub trait WithSpanExt: Sized {
    /// Wraps `self` with the span of `range`.
    fn with_span(self, range: Range<usize>) -> WithSpan<Self> {
        WithSpan::new(self, range.start, range.end)
    }
}

impl<T> WithSpanExt for T {}

/// Iterates the lines of `source` with the byte range of each line (line break and trailing `\r` excluded).
pub(crate) fn lines_with_span(source: &str) -> impl Iterator<Item = (Range<usize>, &str)> {
    let mut offset = 0;
    source.split_inclusive('\n').map(move |raw| {
        let start = offset;
        offset += raw.len();
        let line = raw.trim_end_matches(['\n', '\r']);
        (start..start + line.len(), line)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_keep_byte_ranges() {
        let src = "a\r\nbc\n\ndef";
        let lines: Vec<_> = lines_with_span(src).collect();
        assert_eq!(
            lines,
            vec![(0..1, "a"), (3..5, "bc"), (6..6, ""), (7..10, "def")]
        );
    }

    #[test]
    fn map_keeps_span() {
        let spanned = 42.with_span(3..7).map(|n| n * 2);
        assert_eq!(spanned.content(), &84);
        assert_eq!(spanned.span(), 3..7);
    }
}
