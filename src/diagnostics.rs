use std::{ops::Range, sync::Arc};

pub use miette::{
    Diagnostic, LabeledSpan, MietteError, Report, Severity, SourceCode, SourceSpan,
};
use miette::{MietteSpanContents, SpanContents};

use crate::errors::{CheckFailedError, CheckWarning, TestFailed};
use crate::test::{MatchInfo, TestResult};

pub type DiagResult<T> = miette::Result<T>;

/// Build a [SourceSpan] from a byte range
#[inline]
pub fn span(range: Range<usize>) -> SourceSpan {
    SourceSpan::new(range.start.into(), range.len())
}

/// A named, cheaply-cloneable source text that diagnostics can render
/// snippets from.
///
/// Both the check file and the input file are wrapped in one of these so
/// that every error/warning can carry its originating source without
/// copying the underlying buffer.
#[derive(Debug, Clone)]
pub struct SourceBuffer {
    name: Arc<str>,
    content: Arc<String>,
}

impl SourceBuffer {
    pub fn new(name: impl AsRef<str>, content: String) -> Self {
        Self {
            name: Arc::from(name.as_ref()),
            content: Arc::new(content),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.content
    }
}

impl SourceCode for SourceBuffer {
    fn read_span<'a>(
        &'a self,
        span: &SourceSpan,
        context_lines_before: usize,
        context_lines_after: usize,
    ) -> Result<Box<dyn SpanContents<'a> + 'a>, MietteError> {
        let contents =
            self.content
                .read_span(span, context_lines_before, context_lines_after)?;
        Ok(Box::new(MietteSpanContents::new_named(
            self.name.to_string(),
            contents.data(),
            *contents.span(),
            contents.line(),
            contents.column(),
            contents.line_count(),
        )))
    }
}

/// Accumulates structured match failures and warnings over a run.
///
/// The final verdict is derived from the collector's state: a run fails
/// iff at least one error was recorded. Warnings are carried along as
/// related diagnostics of the failure report so they render together.
#[derive(Debug, Default)]
pub struct Diagnostics {
    errors: Vec<CheckFailedError>,
    warnings: Vec<CheckWarning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, error: CheckFailedError) {
        log::debug!(target: "filecheck:check", "recorded error: {error}");
        self.errors.push(error);
    }

    pub fn warn(&mut self, warning: CheckWarning) {
        log::debug!(target: "filecheck:check", "recorded warning: {warning}");
        self.warnings.push(warning);
    }

    #[inline]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[CheckFailedError] {
        &self.errors
    }

    pub fn warnings(&self) -> &[CheckWarning] {
        &self.warnings
    }

    /// Derive the verdict for the run: the successful matches when no error
    /// was recorded, or a [TestFailed] carrying every collected diagnostic.
    /// Warnings ride along either way.
    pub fn into_result(self, test_name: &str, matches: Vec<MatchInfo>) -> TestResult {
        if self.errors.is_empty() {
            TestResult::new(self.warnings, Ok(matches))
        } else {
            let warnings = self.warnings.clone();
            TestResult::new(
                warnings,
                Err(TestFailed::new(test_name, self.errors, self.warnings)),
            )
        }
    }
}
