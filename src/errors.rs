use miette::Diagnostic;

use crate::ast::Check;
use crate::diagnostics::{SourceBuffer, SourceSpan};

/// The top-level failure for a run: every error and warning collected
/// while verifying the input, rendered as related diagnostics.
#[derive(Diagnostic, Debug, thiserror::Error)]
#[error("{test_name} failed")]
#[diagnostic(help("see below for details"))]
pub struct TestFailed {
    test_name: String,
    #[related]
    errors: Vec<CheckFailedError>,
    warnings: Vec<CheckWarning>,
}

impl TestFailed {
    pub fn new(
        test_name: impl Into<String>,
        errors: Vec<CheckFailedError>,
        warnings: Vec<CheckWarning>,
    ) -> Self {
        Self {
            test_name: test_name.into(),
            errors,
            warnings,
        }
    }

    pub fn errors(&self) -> &[CheckFailedError] {
        self.errors.as_slice()
    }

    pub fn warnings(&self) -> &[CheckWarning] {
        self.warnings.as_slice()
    }
}

/// Errors raised while parsing the check file itself.
///
/// Parsing continues past most of these, so several can surface per run;
/// they are aggregated into an [InvalidCheckFile].
#[derive(Diagnostic, Debug, thiserror::Error)]
pub enum CheckFileError {
    #[error("check file did not contain any check directives with prefix(es): {prefixes}")]
    #[diagnostic(help(
        "a check file must contain at least one directive, e.g. `CHECK: pattern`"
    ))]
    Empty { prefixes: String },
    #[error("found empty check string")]
    #[diagnostic()]
    EmptyPattern {
        #[label("expected a non-empty pattern here")]
        span: SourceSpan,
        #[source_code]
        check_file: SourceBuffer,
    },
    #[error("invalid count in -COUNT specification (count must be at least 1)")]
    #[diagnostic()]
    InvalidCount {
        #[label]
        span: SourceSpan,
        #[source_code]
        check_file: SourceBuffer,
    },
    #[error("invalid CHECK-LABEL pattern")]
    #[diagnostic()]
    LabelWithSubstitution {
        #[label("variables/substitutions are not allowed on CHECK-LABEL lines")]
        var: SourceSpan,
        #[source_code]
        check_file: SourceBuffer,
    },
    #[error("{kind} directives are not permitted to be the first directive in a file")]
    #[diagnostic()]
    InvalidFirstCheck {
        #[label]
        span: SourceSpan,
        kind: Check,
        #[source_code]
        check_file: SourceBuffer,
    },
    #[error("invalid regex block, no }}}}")]
    #[diagnostic()]
    UnterminatedRegex {
        #[label("block opened here")]
        span: SourceSpan,
        #[source_code]
        check_file: SourceBuffer,
    },
    #[error("invalid substitution block, unknown format")]
    #[diagnostic(help(
        "expected one of `[[NAME:pattern]]`, `[[NAME]]`, `[[#%fmt,NAME:]]`, or `[[#NAME]]`"
    ))]
    UnknownSubstitutionFormat {
        #[label]
        span: SourceSpan,
        #[source_code]
        check_file: SourceBuffer,
    },
    #[error("invalid numeric format specifier: {reason}")]
    #[diagnostic()]
    InvalidNumberFormat {
        #[label]
        span: SourceSpan,
        reason: String,
        #[source_code]
        check_file: SourceBuffer,
    },
    #[error("invalid regular expression: {error}")]
    #[diagnostic()]
    InvalidRegex {
        #[label]
        span: SourceSpan,
        error: String,
        #[source_code]
        check_file: SourceBuffer,
    },
}

/// Aggregate of every parse error found in one pass over the check file.
#[derive(Diagnostic, Debug, thiserror::Error)]
#[error("errors occurred while parsing the check file")]
#[diagnostic(help("see related diagnostics for details"))]
pub struct InvalidCheckFile {
    #[related]
    pub errors: Vec<CheckFileError>,
}

/// Errors raised while applying directives to the input.
#[derive(Diagnostic, Debug, thiserror::Error)]
pub enum CheckFailedError {
    #[error("the input file was rejected because it is empty, and --allow-empty was not set")]
    #[diagnostic(help(
        "if your input was the piped output of a command, it may have succeeded with no \
         output when you expected it to fail"
    ))]
    EmptyInput,
    /// Indicates no match for an expected pattern.
    #[error("no matches were found for expected pattern")]
    #[diagnostic()]
    MatchNoneButExpected {
        #[label(primary, "pattern at this location was not matched")]
        span: SourceSpan,
        #[source_code]
        match_file: SourceBuffer,
        #[help]
        note: Option<String>,
    },
    /// Indicates a match for an expected pattern, but the match is on the
    /// wrong line.
    #[error("match found for expected pattern, but on the wrong line")]
    #[diagnostic()]
    MatchFoundButWrongLine {
        #[label(primary, "match found here")]
        span: SourceSpan,
        #[source_code]
        input_file: SourceBuffer,
        #[related]
        pattern: Option<RelatedCheckError>,
    },
    /// Indicates a match for an excluded pattern.
    #[error("match found, but was excluded")]
    #[diagnostic()]
    MatchFoundButExcluded {
        #[label(primary, "match found here")]
        span: SourceSpan,
        #[source_code]
        input_file: SourceBuffer,
        #[related]
        pattern: Option<RelatedCheckError>,
    },
    /// Indicates a match that was found, but could not be processed, e.g. a
    /// numeric capture whose digits overflow the value type.
    #[error("match found, but there was an error processing it")]
    #[diagnostic()]
    MatchFoundErrorNote {
        #[label(primary, "match found here")]
        span: SourceSpan,
        #[source_code]
        input_file: SourceBuffer,
        #[help]
        help: Option<String>,
    },
    /// Indicates an expected or excluded pattern that proved invalid at match
    /// time, e.g. a materialization failure.
    #[error("unable to match invalid pattern")]
    #[diagnostic()]
    MatchNoneForInvalidPattern {
        #[label(primary, "pattern at this location was invalid")]
        span: SourceSpan,
        #[source_code]
        match_file: SourceBuffer,
        #[help]
        error: Option<String>,
    },
    #[error("reference to undefined variable '{name}'")]
    #[diagnostic()]
    UndefinedVariable {
        #[label("occurs here")]
        span: SourceSpan,
        #[source_code]
        match_file: SourceBuffer,
        name: String,
    },
    #[error("CHECK-LABEL pattern was not unique in its region of the input")]
    #[diagnostic(help("a label must identify exactly one line so the input can be partitioned"))]
    LabelNotUnique {
        #[label(primary, "this label matched more than one input line")]
        span: SourceSpan,
        #[source_code]
        match_file: SourceBuffer,
    },
    #[error("unable to match all instances of repeat pattern (matched {n} of {count} times)")]
    #[diagnostic(help("CHECK-COUNT requires consecutive matching lines"))]
    MatchRepeatedError {
        #[label(primary, "pattern at this location")]
        span: SourceSpan,
        #[source_code]
        match_file: SourceBuffer,
        n: usize,
        count: usize,
    },
    #[error("empty capture bound to variable '{name}'")]
    #[diagnostic(help("--reject-empty-vars was set; give the capture a non-empty pattern"))]
    EmptyCapture {
        #[label(primary, "this capture matched the empty string")]
        span: SourceSpan,
        #[source_code]
        match_file: SourceBuffer,
        name: String,
    },
    /// Indicates that matching a set of patterns failed due to at least one
    /// pattern not being matched.
    ///
    /// This occurs with CHECK-DAG, which is evaluated in groups.
    #[error("one or more matches were not found for a set of expected patterns")]
    #[diagnostic(help("see diagnostics for details about each failed pattern"))]
    MatchAllFailed {
        #[related]
        failed: Vec<CheckFailedError>,
    },
}

/// Associates a source span in the check file with a failure reported
/// against the input file.
#[derive(Diagnostic, Debug, thiserror::Error)]
#[error("check failed")]
#[diagnostic()]
pub struct RelatedCheckError {
    #[label("due to pattern at this location")]
    pub span: SourceSpan,
    #[source_code]
    pub match_file: SourceBuffer,
}

/// Non-fatal conditions surfaced alongside the verdict.
#[derive(Diagnostic, Debug, Clone, thiserror::Error)]
pub enum CheckWarning {
    #[error("empty capture bound to variable '{name}'")]
    #[diagnostic(
        severity(Warning),
        help("an empty capture matches everywhere, which is usually a mistake; \
              use --reject-empty-vars to make this an error")
    )]
    EmptyCapture {
        #[label("this capture matched the empty string")]
        span: SourceSpan,
        #[source_code]
        match_file: SourceBuffer,
        name: String,
    },
    #[error("unrecognized argument '{flag}' was ignored")]
    #[diagnostic(severity(Warning))]
    UnsupportedFlag { flag: String },
    #[error("unknown feature token '{token}' in FILECHECK_FEATURE_ENABLE")]
    #[diagnostic(severity(Warning))]
    UnknownFeature { token: String },
}
