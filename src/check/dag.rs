use std::ops::Range;

use crate::ast::{Check, CheckLine};
use crate::errors::{CheckFailedError, RelatedCheckError};

use super::Checker;

/// A position in the input claimed by a DAG directive's match. No two
/// matches in a group may overlap.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Claim {
    line: usize,
    columns: Range<usize>,
}

impl Claim {
    fn overlaps(&self, line: usize, columns: &Range<usize>) -> bool {
        self.line == line && self.columns.start < columns.end && columns.start < self.columns.end
    }
}

impl<'a> Checker<'a> {
    /// Apply a DAG group: a maximal run of CHECK-DAG directives, with any
    /// CHECK-NOTs interleaved between them.
    ///
    /// Each DAG directive, in source order, takes its earliest match at or
    /// after the group's start line whose position no earlier directive has
    /// claimed; on a collision the search resumes past the colliding
    /// candidate. Matches are therefore free to occur in any order in the
    /// input. The group's cursor effect is to advance past the furthest
    /// matched line.
    ///
    /// Interleaved NOTs are evaluated over the group's span with the
    /// claimed positions masked out.
    pub(super) fn check_dag_group(&mut self, group: &'a [CheckLine]) {
        let start = self.cursor.line();
        let bound = self.cursor.bound();
        let mut claims: Vec<Claim> = vec![];
        let mut failed: Vec<CheckFailedError> = vec![];

        for check in group.iter().filter(|check| check.kind() == Check::Dag) {
            let Some(pattern) = self.materialize(check) else {
                continue;
            };
            let mut claimed = None;
            'lines: for line in start..bound {
                let text = self.input.line(line);
                let mut column = 0;
                while column <= text.len() {
                    match pattern.find_in(text, column) {
                        Ok(Some(found)) => {
                            if claims
                                .iter()
                                .any(|claim| claim.overlaps(line, &found.range))
                            {
                                // Collision with an earlier directive's
                                // claim; resume past this candidate
                                column = next_column(text, &found.range);
                                continue;
                            }
                            claimed = Some((line, found));
                            break 'lines;
                        }
                        Ok(None) => break,
                        Err(error) => {
                            self.match_value_error(check, line, error);
                            continue 'lines;
                        }
                    }
                }
            }
            match claimed {
                Some((line, found)) => {
                    claims.push(Claim {
                        line,
                        columns: found.range.clone(),
                    });
                    self.bind_captures(check, &found);
                    self.record_match(check, line, found.range);
                }
                None => {
                    let note = self.near_miss(check, &pattern);
                    failed.push(CheckFailedError::MatchNoneButExpected {
                        span: check.pattern.span,
                        match_file: self.check_file.source().clone(),
                        note,
                    });
                }
            }
        }

        if let Some(group_end) = claims.iter().map(|claim| claim.line).max() {
            let group_start = claims.iter().map(|claim| claim.line).min().unwrap();
            // Pending NOTs from before the group resolve at the group's
            // earliest match, like any other positive match
            self.flush_nots(group_start);
            for check in group.iter().filter(|check| check.kind() == Check::Not) {
                self.check_dag_not(check, start, group_end, &claims);
            }
            let end_column = claims
                .iter()
                .filter(|claim| claim.line == group_end)
                .map(|claim| claim.columns.end)
                .max()
                .unwrap();
            self.cursor.commit_match(group_end, end_column);
        }

        if !failed.is_empty() {
            self.diagnostics
                .error(CheckFailedError::MatchAllFailed { failed });
        }
    }

    /// Evaluate an interleaved NOT over the group's input span, skipping
    /// the positions claimed by the group's own matches.
    fn check_dag_not(&mut self, check: &'a CheckLine, start: usize, end: usize, claims: &[Claim]) {
        let Some(pattern) = self.materialize(check) else {
            return;
        };
        for line in start..=end.min(self.input.line_count().saturating_sub(1)) {
            let text = self.input.line(line);
            for gap in unclaimed_gaps(text.len(), line, claims) {
                let Ok(found) = pattern.find_in(&text[gap.clone()], 0) else {
                    continue;
                };
                if let Some(found) = found {
                    let columns = gap.start + found.range.start..gap.start + found.range.end;
                    self.diagnostics.error(CheckFailedError::MatchFoundButExcluded {
                        span: self.input.span_of(line, columns),
                        input_file: self.input.source().clone(),
                        pattern: Some(RelatedCheckError {
                            span: check.pattern.span,
                            match_file: self.check_file.source().clone(),
                        }),
                    });
                    return;
                }
            }
        }
    }
}

/// The column to resume searching from after skipping a candidate match
fn next_column(text: &str, candidate: &Range<usize>) -> usize {
    if candidate.is_empty() {
        candidate.start
            + text[candidate.start..]
                .chars()
                .next()
                .map_or(1, char::len_utf8)
    } else {
        candidate.end
    }
}

/// The column ranges of a line not covered by any claim, in order
fn unclaimed_gaps(line_len: usize, line: usize, claims: &[Claim]) -> Vec<Range<usize>> {
    let mut covered: Vec<&Claim> = claims.iter().filter(|claim| claim.line == line).collect();
    covered.sort_by_key(|claim| claim.columns.start);
    let mut gaps = vec![];
    let mut at = 0;
    for claim in covered {
        if at < claim.columns.start {
            gaps.push(at..claim.columns.start);
        }
        at = at.max(claim.columns.end);
    }
    if at < line_len || gaps.is_empty() && at == 0 {
        gaps.push(at..line_len);
    }
    gaps
}
