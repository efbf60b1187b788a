use std::ops::Range;

use crate::diagnostics::{span, SourceBuffer, SourceSpan};

/// The eagerly-buffered input stream, split into lines.
///
/// Line endings are canonicalized to LF before indexing, so byte offsets
/// reported in diagnostics always refer to the canonicalized content held
/// by the underlying [SourceBuffer].
#[derive(Debug, Clone)]
pub struct InputFile {
    source: SourceBuffer,
    lines: Vec<Range<usize>>,
}

impl InputFile {
    pub fn new(name: impl AsRef<str>, content: impl Into<String>) -> Self {
        let content = canonicalize_line_endings(content.into());
        let lines = index_lines(&content);
        Self {
            source: SourceBuffer::new(name, content),
            lines,
        }
    }

    #[inline]
    pub fn source(&self) -> &SourceBuffer {
        &self.source
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.source.name()
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        self.source.as_str()
    }

    /// Returns true if the underlying buffer contains no bytes at all
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.source.as_str().is_empty()
    }

    #[inline]
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// The text of line `index`, without its terminating newline
    pub fn line(&self, index: usize) -> &str {
        &self.source.as_str()[self.lines[index].clone()]
    }

    /// The byte range of line `index` within the buffer
    pub fn line_range(&self, index: usize) -> Range<usize> {
        self.lines[index].clone()
    }

    /// A [SourceSpan] covering columns `columns` of line `index`
    pub fn span_of(&self, index: usize, columns: Range<usize>) -> SourceSpan {
        let start = self.lines[index].start;
        span(start + columns.start..start + columns.end)
    }

    /// A [SourceSpan] covering all of line `index`
    pub fn line_span(&self, index: usize) -> SourceSpan {
        span(self.lines[index].clone())
    }
}

fn canonicalize_line_endings(content: String) -> String {
    if content.contains("\r\n") {
        content.replace("\r\n", "\n")
    } else {
        content
    }
}

fn index_lines(content: &str) -> Vec<Range<usize>> {
    let mut lines = vec![];
    let mut start = 0;
    for (offset, _) in content.match_indices('\n') {
        lines.push(start..offset);
        start = offset + 1;
    }
    if start < content.len() {
        lines.push(start..content.len());
    }
    lines
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn lines_exclude_newlines() {
        let input = InputFile::new("test", "a\nbc\n\nd");
        assert_eq!(input.line_count(), 4);
        assert_eq!(input.line(0), "a");
        assert_eq!(input.line(1), "bc");
        assert_eq!(input.line(2), "");
        assert_eq!(input.line(3), "d");
    }

    #[test]
    fn crlf_is_canonicalized() {
        let input = InputFile::new("test", "a\r\nb\r\n");
        assert_eq!(input.as_str(), "a\nb\n");
        assert_eq!(input.line_count(), 2);
        assert_eq!(input.line(1), "b");
    }

    #[test]
    fn empty_input_has_no_lines() {
        let input = InputFile::new("test", "");
        assert!(input.is_empty());
        assert_eq!(input.line_count(), 0);
    }

    #[test]
    fn spans_are_buffer_relative() {
        let input = InputFile::new("test", "ab\ncdef\n");
        let span = input.span_of(1, 1..3);
        assert_eq!(span.offset(), 4);
        assert_eq!(span.len(), 2);
    }
}
