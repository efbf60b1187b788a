use std::fmt;
use std::str::FromStr;

use crate::diagnostics::SourceSpan;
use crate::pattern::CompiledPattern;

#[derive(Debug)]
pub enum InvalidCheckTypeError {
    Unrecognized,
    InvalidCount(core::num::ParseIntError),
}

/// The kind of directive that was parsed
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum Check {
    /// Not used after parsing, represents a line with no directives
    #[default]
    None,
    /// The base CHECK directive, i.e. match the pattern somewhere at or
    /// after the current position.
    Plain,
    /// The CHECK-NEXT directive, i.e. the pattern must match on the line
    /// immediately following the previous match.
    Next,
    /// The CHECK-SAME directive, i.e. the pattern must match on the same
    /// line as the previous match, after its end.
    Same,
    /// The CHECK-NOT directive, i.e. the pattern must _not_ match between
    /// the previous match and the next positive match (or region boundary).
    Not,
    /// The CHECK-DAG directive, i.e. like CHECK, but a contiguous group of
    /// these may match in any order relative to one another, so long as no
    /// two matches overlap.
    Dag,
    /// The CHECK-LABEL directive: a regular CHECK with the additional
    /// restriction that the pattern may not reference or bind variables.
    /// Labels partition the input into regions; the directives between two
    /// labels may only match inside the corresponding region.
    Label,
    /// The CHECK-EMPTY directive, i.e. the line at the cursor must be
    /// completely empty.
    Empty,
    /// The CHECK-COUNT-N directive, i.e. a CHECK that must match N
    /// consecutive lines.
    Count(usize),
    /// A comment prefix, e.g. COM. Only used during parsing.
    Comment,
}

impl Check {
    /// Returns true for directive kinds that, on success, establish a new
    /// match line (and thereby resolve any pending CHECK-NOTs).
    pub fn is_positive(&self) -> bool {
        matches!(
            self,
            Self::Plain | Self::Next | Self::Same | Self::Empty | Self::Label | Self::Count(_)
        )
    }

    pub fn suffix(&self) -> Option<&'static str> {
        match self {
            Self::Plain => Some(""),
            Self::Next => Some("-NEXT"),
            Self::Same => Some("-SAME"),
            Self::Not => Some("-NOT"),
            Self::Dag => Some("-DAG"),
            Self::Label => Some("-LABEL"),
            Self::Empty => Some("-EMPTY"),
            Self::Count(_) => Some("-COUNT"),
            Self::Comment | Self::None => None,
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::None => f.write_str("CHECK-NONE"),
            Self::Plain => f.write_str("CHECK"),
            Self::Next => f.write_str("CHECK-NEXT"),
            Self::Same => f.write_str("CHECK-SAME"),
            Self::Not => f.write_str("CHECK-NOT"),
            Self::Dag => f.write_str("CHECK-DAG"),
            Self::Label => f.write_str("CHECK-LABEL"),
            Self::Empty => f.write_str("CHECK-EMPTY"),
            Self::Count(n) => write!(f, "CHECK-COUNT-{n}"),
            Self::Comment => f.write_str("COM"),
        }
    }
}

impl FromStr for Check {
    type Err = InvalidCheckTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Ok(Self::Plain),
            "NEXT" => Ok(Self::Next),
            "SAME" => Ok(Self::Same),
            "NOT" => Ok(Self::Not),
            "DAG" => Ok(Self::Dag),
            "LABEL" => Ok(Self::Label),
            "EMPTY" => Ok(Self::Empty),
            _ => match s.strip_prefix("COUNT-") {
                None => Err(InvalidCheckTypeError::Unrecognized),
                Some(count) => count
                    .parse::<usize>()
                    .map_err(InvalidCheckTypeError::InvalidCount)
                    .map(Self::Count),
            },
        }
    }
}

/// The complete type of a CHECK* directive: kind plus modifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckType {
    /// The span of the directive keyword in the check file
    pub span: SourceSpan,
    /// The kind of directive represented
    pub kind: Check,
    /// Set when the directive carried the `{LITERAL}` modifier, which
    /// disables all pattern meta-syntax for its payload.
    pub literal: bool,
}

impl CheckType {
    pub fn new(span: SourceSpan, kind: Check) -> Self {
        Self {
            span,
            kind,
            literal: false,
        }
    }

    pub fn literal(mut self) -> Self {
        self.literal = true;
        self
    }

    pub fn count(&self) -> usize {
        match self.kind {
            Check::Count(n) => n,
            _ => 1,
        }
    }
}

/// A single parsed directive: kind, compiled pattern, and location.
///
/// Immutable once parsing completes.
#[derive(Debug)]
pub struct CheckLine {
    /// The span of the full directive, from prefix through end of payload
    pub span: SourceSpan,
    /// The check prefix this directive was parsed under, e.g. `CHECK`
    pub prefix: String,
    pub ty: CheckType,
    pub pattern: CompiledPattern,
}

impl CheckLine {
    pub fn new(span: SourceSpan, prefix: String, ty: CheckType, pattern: CompiledPattern) -> Self {
        Self {
            span,
            prefix,
            ty,
            pattern,
        }
    }

    #[inline]
    pub fn kind(&self) -> Check {
        self.ty.kind
    }
}

/// The ordered sequence of directives parsed from a check file
#[derive(Debug, Default)]
pub struct CheckFile {
    pub lines: Vec<CheckLine>,
}

impl CheckFile {
    pub fn new(lines: Vec<CheckLine>) -> Self {
        Self { lines }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
