mod dag;

use std::ops::Range;

use crate::ast::{Check, CheckFile, CheckLine};
use crate::cursor::Cursor;
use crate::diagnostics::Diagnostics;
use crate::env::Env;
use crate::errors::{CheckFailedError, CheckWarning, RelatedCheckError};
use crate::expr::Value;
use crate::input::InputFile;
use crate::pattern::{AnchorMode, MaterializeError, MaterializedPattern, PatternMatch};
use crate::test::{MatchInfo, TestResult};
use crate::Config;

/// The matcher: applies a parsed check file to an input, directive by
/// directive.
///
/// The checker owns the cursor and the variable environment, and writes
/// every failure and warning to its diagnostics collector; the final
/// verdict is derived from the collector's state, so several independent
/// failures can surface from a single run.
pub struct Checker<'a> {
    config: &'a Config,
    check_file: &'a InputFile,
    program: &'a CheckFile,
    input: &'a InputFile,
    cursor: Cursor<'a>,
    env: Env,
    diagnostics: Diagnostics,
    matches: Vec<MatchInfo>,
    /// CHECK-NOTs buffered until the next resolving event
    nots: Vec<&'a CheckLine>,
    /// The line the pending NOT interval opens at
    nots_start: usize,
}

/// A run of directives owned by one CHECK-LABEL (or by the implicit
/// prologue before the first label).
struct Block<'a> {
    label: Option<&'a CheckLine>,
    directives: &'a [CheckLine],
}

/// A [Block] whose label has been resolved against the input, fixing the
/// line region its directives may match within.
struct ResolvedBlock<'a> {
    block: Block<'a>,
    /// The line and matched columns of the label, when one resolved
    label_match: Option<(usize, Range<usize>)>,
    /// Exclusive end of the region, in lines
    end: usize,
    failed: bool,
}

impl<'a> Checker<'a> {
    pub fn new(
        config: &'a Config,
        check_file: &'a InputFile,
        program: &'a CheckFile,
        input: &'a InputFile,
    ) -> Self {
        Self {
            config,
            check_file,
            program,
            input,
            cursor: Cursor::new(input),
            env: Env::new(config.options.variables.iter().cloned()),
            diagnostics: Diagnostics::new(),
            matches: vec![],
            nots: vec![],
            nots_start: 0,
        }
    }

    /// Apply every directive and derive the verdict.
    pub fn check(mut self) -> TestResult {
        if self.input.is_empty() && !self.config.options.allow_empty {
            self.diagnostics.error(CheckFailedError::EmptyInput);
            return self.finish();
        }

        let program = self.program;
        let blocks = split_blocks(program);
        let resolved = self.resolve_labels(blocks);
        let scoped = self.config.options.enable_var_scope;

        for region in resolved {
            if region.failed {
                // The label never resolved, so the directives it owns have
                // no region to match in; skip them and drop any NOTs whose
                // closing boundary would have been this label
                self.nots.clear();
                continue;
            }
            match region.block.label {
                Some(label) => {
                    let (line, columns) = region.label_match.clone().unwrap();
                    self.flush_nots(line);
                    self.record_match(label, line, columns.clone());
                    self.cursor.set_bounds(line, region.end);
                    self.cursor.commit_match(line, columns.end);
                    self.nots_start = self.cursor.line();
                    if scoped {
                        self.env.push_scope();
                    }
                    self.run_directives(region.block.directives);
                    if scoped {
                        self.env.pop_scope();
                    }
                }
                None => {
                    self.cursor.set_bounds(0, region.end);
                    self.nots_start = 0;
                    self.run_directives(region.block.directives);
                }
            }
        }

        self.flush_nots(self.input.line_count());
        self.finish()
    }

    fn finish(self) -> TestResult {
        self.diagnostics
            .into_result(self.check_file.name(), self.matches)
    }

    /// Resolve every CHECK-LABEL up front, partitioning the input into
    /// half-open line regions. Each label must match at or after the
    /// previous label's line, and must be unique within its own region.
    fn resolve_labels(&mut self, blocks: Vec<Block<'a>>) -> Vec<ResolvedBlock<'a>> {
        let mut resolved: Vec<ResolvedBlock<'a>> = vec![];
        let mut search_from = 0usize;
        for block in blocks {
            let Some(label) = block.label else {
                resolved.push(ResolvedBlock {
                    block,
                    label_match: None,
                    end: self.input.line_count(),
                    failed: false,
                });
                continue;
            };
            let Some(pattern) = self.materialize(label) else {
                resolved.push(ResolvedBlock {
                    block,
                    label_match: None,
                    end: self.input.line_count(),
                    failed: true,
                });
                continue;
            };
            let mut label_match = None;
            for line in search_from..self.input.line_count() {
                match pattern.find_in(self.input.line(line), 0) {
                    Ok(Some(found)) => {
                        label_match = Some((line, found.range));
                        break;
                    }
                    Ok(None) => continue,
                    Err(_) => break,
                }
            }
            let failed = label_match.is_none();
            if failed {
                let note = self.near_miss(label, &pattern);
                self.diagnostics.error(CheckFailedError::MatchNoneButExpected {
                    span: label.pattern.span,
                    match_file: self.check_file.source().clone(),
                    note,
                });
            } else {
                search_from = label_match.as_ref().unwrap().0 + 1;
            }
            resolved.push(ResolvedBlock {
                block,
                label_match,
                end: self.input.line_count(),
                failed,
            });
        }

        // Fix up region ends: each region is closed by the next resolved label
        let mut next_label_line = self.input.line_count();
        for region in resolved.iter_mut().rev() {
            region.end = next_label_line;
            if let Some((line, _)) = region.label_match {
                next_label_line = line;
            }
        }

        // A label matching a second line inside its own region cannot
        // partition the input unambiguously
        for region in resolved.iter() {
            let Some((line, _)) = region.label_match else {
                continue;
            };
            let label = region.block.label.unwrap();
            let Some(pattern) = self.materialize(label) else {
                continue;
            };
            let duplicate = (line + 1..region.end)
                .any(|l| matches!(pattern.find_in(self.input.line(l), 0), Ok(Some(_))));
            if duplicate {
                self.diagnostics.error(CheckFailedError::LabelNotUnique {
                    span: label.pattern.span,
                    match_file: self.check_file.source().clone(),
                });
            }
        }

        resolved
    }

    fn run_directives(&mut self, directives: &'a [CheckLine]) {
        let mut index = 0;
        while index < directives.len() {
            let check = &directives[index];
            match check.kind() {
                Check::Not => {
                    if self.nots.is_empty() {
                        self.nots_start = self.cursor.line();
                    }
                    self.nots.push(check);
                    index += 1;
                }
                Check::Dag => {
                    // A DAG group is the maximal run of DAG directives with
                    // any NOTs interleaved between them; NOTs trailing the
                    // last DAG buffer as usual
                    let mut last_dag = index;
                    let mut scan = index + 1;
                    while scan < directives.len()
                        && matches!(directives[scan].kind(), Check::Dag | Check::Not)
                    {
                        if directives[scan].kind() == Check::Dag {
                            last_dag = scan;
                        }
                        scan += 1;
                    }
                    self.check_dag_group(&directives[index..=last_dag]);
                    index = last_dag + 1;
                }
                Check::Plain => {
                    self.check_plain(check);
                    index += 1;
                }
                Check::Next => {
                    self.check_next(check);
                    index += 1;
                }
                Check::Same => {
                    self.check_same(check);
                    index += 1;
                }
                Check::Empty => {
                    self.check_empty(check);
                    index += 1;
                }
                Check::Count(count) => {
                    self.check_count(check, count);
                    index += 1;
                }
                Check::Label | Check::Comment | Check::None => unreachable!(
                    "{} directives are handled before dispatch",
                    check.kind()
                ),
            }
        }
    }

    fn check_plain(&mut self, check: &'a CheckLine) {
        let Some(pattern) = self.materialize(check) else {
            return;
        };
        match self.search_lines(check, &pattern, self.cursor.line()..self.cursor.bound()) {
            Err(()) => {}
            Ok(Some((line, found))) => {
                self.flush_nots(line);
                self.bind_captures(check, &found);
                self.record_match(check, line, found.range.clone());
                self.cursor.commit_match(line, found.range.end);
            }
            Ok(None) => {
                let note = self.near_miss(check, &pattern);
                self.diagnostics.error(CheckFailedError::MatchNoneButExpected {
                    span: check.pattern.span,
                    match_file: self.check_file.source().clone(),
                    note,
                });
            }
        }
    }

    fn check_next(&mut self, check: &'a CheckLine) {
        let Some(pattern) = self.materialize(check) else {
            return;
        };
        if self.cursor.at_end() {
            let note = if self.cursor.bound() < self.input.line_count() {
                Some("search was stopped at the end of the enclosing CHECK-LABEL region".to_string())
            } else {
                Some("the input was exhausted before the line was reached".to_string())
            };
            self.diagnostics.error(CheckFailedError::MatchNoneButExpected {
                span: check.pattern.span,
                match_file: self.check_file.source().clone(),
                note,
            });
            return;
        }
        let line = self.cursor.line();
        match pattern.find_in(self.input.line(line), 0) {
            Err(error) => self.match_value_error(check, line, error),
            Ok(Some(found)) => {
                self.flush_nots(line);
                self.bind_captures(check, &found);
                self.record_match(check, line, found.range.clone());
                self.cursor.commit_match(line, found.range.end);
            }
            Ok(None) => self.wrong_line_or_missing(check, &pattern, line + 1),
        }
    }

    fn check_same(&mut self, check: &'a CheckLine) {
        let Some(pattern) = self.materialize(check) else {
            return;
        };
        let Some(tail) = self.cursor.tail() else {
            self.diagnostics.error(CheckFailedError::MatchNoneButExpected {
                span: check.pattern.span,
                match_file: self.check_file.source().clone(),
                note: Some("there is no preceding match on the current line to continue".to_string()),
            });
            return;
        };
        match pattern.find_in(self.input.line(tail.line), tail.column) {
            Err(error) => self.match_value_error(check, tail.line, error),
            Ok(Some(found)) => {
                self.flush_nots(tail.line);
                self.bind_captures(check, &found);
                self.record_match(check, tail.line, found.range.clone());
                self.cursor.commit_match(tail.line, found.range.end);
            }
            Ok(None) => self.wrong_line_or_missing(check, &pattern, tail.line + 1),
        }
    }

    fn check_empty(&mut self, check: &'a CheckLine) {
        if self.cursor.at_end() {
            self.diagnostics.error(CheckFailedError::MatchNoneButExpected {
                span: check.span,
                match_file: self.check_file.source().clone(),
                note: Some("expected an empty line, but the input was exhausted".to_string()),
            });
            return;
        }
        let line = self.cursor.line();
        if self.input.line(line).is_empty() {
            self.flush_nots(line);
            self.record_match(check, line, 0..0);
            self.cursor.commit_match(line, 0);
        } else {
            self.diagnostics.error(CheckFailedError::MatchFoundButWrongLine {
                span: self.input.line_span(line),
                input_file: self.input.source().clone(),
                pattern: Some(RelatedCheckError {
                    span: check.span,
                    match_file: self.check_file.source().clone(),
                }),
            });
        }
    }

    /// CHECK-COUNT-n: a forward search finds the first matching line, and
    /// the following `n - 1` lines must then each match in turn.
    fn check_count(&mut self, check: &'a CheckLine, count: usize) {
        let mut matched = 0usize;
        while matched < count {
            // Rematerialize each iteration: captures bound by one iteration
            // are visible to references in the next
            let Some(pattern) = self.materialize(check) else {
                return;
            };
            let found = if matched == 0 {
                match self.search_lines(check, &pattern, self.cursor.line()..self.cursor.bound()) {
                    Err(()) => return,
                    Ok(found) => found,
                }
            } else if self.cursor.at_end() {
                None
            } else {
                let line = self.cursor.line();
                match pattern.find_in(self.input.line(line), 0) {
                    Err(error) => {
                        self.match_value_error(check, line, error);
                        return;
                    }
                    Ok(found) => found.map(|m| (line, m)),
                }
            };
            let Some((line, found)) = found else {
                self.diagnostics.error(CheckFailedError::MatchRepeatedError {
                    span: check.pattern.span,
                    match_file: self.check_file.source().clone(),
                    n: matched,
                    count,
                });
                return;
            };
            if matched == 0 {
                self.flush_nots(line);
            }
            self.bind_captures(check, &found);
            self.record_match(check, line, found.range.clone());
            self.cursor.commit_match(line, found.range.end);
            matched += 1;
        }
    }

    /// Evaluate and clear the pending NOTs over the lines strictly between
    /// the interval start and `end` (exclusive).
    fn flush_nots(&mut self, end: usize) {
        if self.nots.is_empty() {
            return;
        }
        let nots = std::mem::take(&mut self.nots);
        let start = self.nots_start;
        let end = end.min(self.input.line_count());
        for check in nots {
            let Some(pattern) = self.materialize(check) else {
                continue;
            };
            for line in start..end {
                match pattern.find_in(self.input.line(line), 0) {
                    Ok(Some(found)) => {
                        self.diagnostics.error(CheckFailedError::MatchFoundButExcluded {
                            span: self.input.span_of(line, found.range),
                            input_file: self.input.source().clone(),
                            pattern: Some(RelatedCheckError {
                                span: check.pattern.span,
                                match_file: self.check_file.source().clone(),
                            }),
                        });
                        break;
                    }
                    Ok(None) => continue,
                    Err(_) => break,
                }
            }
        }
    }

    /// Search `lines` for the first line the pattern matches on.
    ///
    /// A match that cannot be converted to bindings records an error and
    /// yields `Err(())` so the caller does not double-report.
    fn search_lines(
        &mut self,
        check: &'a CheckLine,
        pattern: &MaterializedPattern,
        lines: Range<usize>,
    ) -> Result<Option<(usize, PatternMatch)>, ()> {
        for line in lines {
            match pattern.find_in(self.input.line(line), 0) {
                Ok(Some(found)) => return Ok(Some((line, found))),
                Ok(None) => continue,
                Err(error) => {
                    self.match_value_error(check, line, error);
                    return Err(());
                }
            }
        }
        Ok(None)
    }

    fn materialize(&mut self, check: &'a CheckLine) -> Option<MaterializedPattern> {
        let anchor = self.anchor_for(check.kind());
        match check
            .pattern
            .materialize(&self.env, anchor, self.config.options.strict_whitespace)
        {
            Ok(pattern) => Some(pattern),
            Err(MaterializeError::UndefinedVariable { name }) => {
                self.diagnostics.error(CheckFailedError::UndefinedVariable {
                    span: check.pattern.span,
                    match_file: self.check_file.source().clone(),
                    name,
                });
                None
            }
            Err(MaterializeError::NotANumber { name }) => {
                self.diagnostics
                    .error(CheckFailedError::MatchNoneForInvalidPattern {
                        span: check.pattern.span,
                        match_file: self.check_file.source().clone(),
                        error: Some(format!(
                            "the numeric reference requires '{name}' to be bound to a number"
                        )),
                    });
                None
            }
            Err(MaterializeError::InvalidRegex { error }) => {
                self.diagnostics
                    .error(CheckFailedError::MatchNoneForInvalidPattern {
                        span: check.pattern.span,
                        match_file: self.check_file.source().clone(),
                        error: Some(error),
                    });
                None
            }
        }
    }

    fn anchor_for(&self, kind: Check) -> AnchorMode {
        if !self.config.options.match_full_lines {
            return AnchorMode::Unanchored;
        }
        match kind {
            // Negative matches are unaffected by --match-full-lines
            Check::Not => AnchorMode::Unanchored,
            // A continuation cannot re-anchor the start of its line
            Check::Same => AnchorMode::LineEnd,
            _ => AnchorMode::FullLine,
        }
    }

    fn bind_captures(&mut self, check: &'a CheckLine, found: &PatternMatch) {
        for (name, value) in found.bindings.iter() {
            if matches!(value, Value::Text(text) if text.is_empty()) {
                self.diagnostics.warn(CheckWarning::EmptyCapture {
                    span: check.pattern.span,
                    match_file: self.check_file.source().clone(),
                    name: name.clone(),
                });
                if self.config.options.reject_empty_vars {
                    self.diagnostics.error(CheckFailedError::EmptyCapture {
                        span: check.pattern.span,
                        match_file: self.check_file.source().clone(),
                        name: name.clone(),
                    });
                }
            }
            self.env.bind(name, value.clone());
        }
    }

    fn record_match(&mut self, check: &'a CheckLine, line: usize, columns: Range<usize>) {
        if self.config.remarks_enabled() {
            log::debug!(
                target: "filecheck:check",
                "{} matched input line {} at columns {}..{}",
                check.kind(),
                line + 1,
                columns.start + 1,
                columns.end + 1
            );
        }
        self.matches.push(MatchInfo {
            kind: check.kind(),
            pattern_span: check.span,
            input_span: self.input.span_of(line, columns),
        });
    }

    fn match_value_error(
        &mut self,
        check: &'a CheckLine,
        line: usize,
        error: crate::pattern::MatchValueError,
    ) {
        let crate::pattern::MatchValueError::NumericOverflow { name, digits } = error;
        log::trace!(
            target: "filecheck:check",
            "{} produced an unconvertible match on line {}",
            check.kind(),
            line + 1
        );
        self.diagnostics.error(CheckFailedError::MatchFoundErrorNote {
            span: self.input.line_span(line),
            input_file: self.input.source().clone(),
            help: Some(match name {
                Some(name) => {
                    format!("the digits '{digits}' captured by '{name}' overflow a 64-bit integer")
                }
                None => format!("the matched digits '{digits}' overflow a 64-bit integer"),
            }),
        });
    }

    /// When a directive matched, but on a line it was not permitted to use,
    /// report where the match landed; otherwise fall back to a plain
    /// no-match diagnostic.
    fn wrong_line_or_missing(
        &mut self,
        check: &'a CheckLine,
        pattern: &MaterializedPattern,
        from_line: usize,
    ) {
        for line in from_line..self.cursor.bound() {
            if let Ok(Some(found)) = pattern.find_in(self.input.line(line), 0) {
                self.diagnostics.error(CheckFailedError::MatchFoundButWrongLine {
                    span: self.input.span_of(line, found.range),
                    input_file: self.input.source().clone(),
                    pattern: Some(RelatedCheckError {
                        span: check.pattern.span,
                        match_file: self.check_file.source().clone(),
                    }),
                });
                return;
            }
        }
        let note = self.near_miss(check, pattern);
        self.diagnostics.error(CheckFailedError::MatchNoneButExpected {
            span: check.pattern.span,
            match_file: self.check_file.source().clone(),
            note,
        });
    }

    /// Produce an advisory "possible intended match" note for a failed
    /// positive directive: first a scan of the whole input with the full
    /// pattern (ignoring region bounds), then a fuzzier scan using the
    /// pattern's longest literal fragment.
    fn near_miss(&self, check: &'a CheckLine, pattern: &MaterializedPattern) -> Option<String> {
        for line in 0..self.input.line_count() {
            if let Ok(Some(found)) = pattern.find_in(self.input.line(line), 0) {
                return Some(format!(
                    "possible intended match at {}:{}:{}: {}",
                    self.input.name(),
                    line + 1,
                    found.range.start + 1,
                    self.input.line(line)
                ));
            }
        }
        let literal = check.pattern.longest_literal()?;
        let fuzzy =
            crate::pattern::literal_matcher(literal, self.config.options.strict_whitespace);
        for line in 0..self.input.line_count() {
            if fuzzy.is_match(self.input.line(line)) {
                return Some(format!(
                    "possible fuzzy match at {}:{}: {}",
                    self.input.name(),
                    line + 1,
                    self.input.line(line)
                ));
            }
        }
        None
    }
}

fn split_blocks(program: &CheckFile) -> Vec<Block<'_>> {
    let lines = program.lines.as_slice();
    let mut blocks = vec![];
    let mut start = 0;
    let mut label: Option<&CheckLine> = None;
    for (index, line) in lines.iter().enumerate() {
        if line.kind() == Check::Label {
            blocks.push(Block {
                label,
                directives: &lines[start..index],
            });
            label = Some(line);
            start = index + 1;
        }
    }
    blocks.push(Block {
        label,
        directives: &lines[start..],
    });
    blocks
}
