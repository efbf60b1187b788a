use crate::input::InputFile;

/// The remainder of the most recently matched line, used by `CHECK-SAME`
/// to continue matching where the previous directive left off.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LineTail {
    pub line: usize,
    pub column: usize,
}

/// A saved cursor position, used to pin a checkpoint and restore it after
/// speculative work (e.g. a DAG group search that fails).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CursorPosition {
    pub line: usize,
    pub tail: Option<LineTail>,
    pub bound: usize,
}

/// A forward-only view over the input lines.
///
/// The cursor tracks the next line to examine, an exclusive line bound
/// (the end of the current label region, or end of input), and the tail
/// of the last matched line. It advances monotonically except where a
/// checkpoint is explicitly restored.
#[derive(Debug)]
pub struct Cursor<'input> {
    input: &'input InputFile,
    line: usize,
    tail: Option<LineTail>,
    bound: usize,
}

impl<'input> Cursor<'input> {
    pub fn new(input: &'input InputFile) -> Self {
        Self {
            input,
            line: 0,
            tail: None,
            bound: input.line_count(),
        }
    }

    #[inline]
    pub fn input(&self) -> &'input InputFile {
        self.input
    }

    /// The index of the next line to examine
    #[inline]
    pub fn line(&self) -> usize {
        self.line
    }

    /// The exclusive end of the current search domain, in lines
    #[inline]
    pub fn bound(&self) -> usize {
        self.bound
    }

    #[inline]
    pub fn tail(&self) -> Option<LineTail> {
        self.tail
    }

    /// Returns true when no lines remain in the current search domain
    #[inline]
    pub fn at_end(&self) -> bool {
        self.line >= self.bound
    }

    /// Peek at the text of the line under the cursor
    pub fn current_line(&self) -> Option<&'input str> {
        (self.line < self.bound).then(|| self.input.line(self.line))
    }

    /// Pin a checkpoint of the current position
    pub fn position(&self) -> CursorPosition {
        CursorPosition {
            line: self.line,
            tail: self.tail,
            bound: self.bound,
        }
    }

    /// Restore a previously pinned checkpoint
    pub fn move_to(&mut self, position: CursorPosition) {
        self.line = position.line;
        self.tail = position.tail;
        self.bound = position.bound;
    }

    /// Constrain the cursor to the given line range, e.g. a label region
    pub fn set_bounds(&mut self, start: usize, end: usize) {
        debug_assert!(start <= end);
        self.line = start;
        self.bound = end.min(self.input.line_count());
        self.tail = None;
    }

    /// Record a successful positive match covering `columns` of `line`.
    ///
    /// Subsequent directives start at `line + 1`; the matched line's tail
    /// is retained so `CHECK-SAME` can continue on it.
    pub fn commit_match(&mut self, line: usize, end_column: usize) {
        debug_assert!(line >= self.line || self.tail.map_or(false, |t| t.line == line));
        self.line = line + 1;
        self.tail = Some(LineTail {
            line,
            column: end_column,
        });
    }

    /// Advance past the line under the cursor without recording a tail,
    /// e.g. after a failed directive when recovery continues on the next
    /// directive.
    pub fn advance(&mut self) {
        if self.line < self.bound {
            self.line += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn commit_advances_past_matched_line() {
        let input = InputFile::new("test", "a\nb\nc\n");
        let mut cursor = Cursor::new(&input);
        cursor.commit_match(1, 1);
        assert_eq!(cursor.line(), 2);
        assert_eq!(
            cursor.tail(),
            Some(LineTail {
                line: 1,
                column: 1
            })
        );
        assert_eq!(cursor.current_line(), Some("c"));
    }

    #[test]
    fn checkpoint_round_trip() {
        let input = InputFile::new("test", "a\nb\nc\n");
        let mut cursor = Cursor::new(&input);
        let saved = cursor.position();
        cursor.commit_match(2, 0);
        assert!(cursor.at_end());
        cursor.move_to(saved);
        assert_eq!(cursor.line(), 0);
        assert_eq!(cursor.tail(), None);
    }

    #[test]
    fn bounds_constrain_the_view() {
        let input = InputFile::new("test", "a\nb\nc\nd\n");
        let mut cursor = Cursor::new(&input);
        cursor.set_bounds(1, 3);
        assert_eq!(cursor.current_line(), Some("b"));
        cursor.commit_match(2, 1);
        assert!(cursor.at_end());
        assert_eq!(cursor.current_line(), None);
    }
}
