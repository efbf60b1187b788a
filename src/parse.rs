use regex::Regex;

use crate::ast::{Check, CheckFile, CheckLine, CheckType};
use crate::diagnostics::span;
use crate::errors::{CheckFileError, InvalidCheckFile};
use crate::input::InputFile;
use crate::pattern::{CompiledPattern, PatternSyntaxError};
use crate::Config;

/// Parses a check file into an ordered sequence of directives.
///
/// The parser makes a single pass over the file, line by line. A line is a
/// directive iff it contains a configured check prefix, at a word boundary,
/// followed by an optional kind suffix and a colon. A comment prefix
/// appearing earlier on the line neutralizes the directive.
///
/// Parse errors are collected rather than raised at the first problem, so
/// several can surface per run.
pub struct CheckFileParser<'config> {
    config: &'config Config,
    directive: Regex,
    comment: Option<Regex>,
}

impl<'config> CheckFileParser<'config> {
    pub fn new(config: &'config Config) -> Self {
        let directive = Regex::new(&directive_pattern(&config.options.check_prefixes))
            .expect("invalid directive pattern");
        let comment = if config.options.comment_prefixes.is_empty() {
            None
        } else {
            Some(
                Regex::new(&alternation(&config.options.comment_prefixes))
                    .expect("invalid comment pattern"),
            )
        };
        Self {
            config,
            directive,
            comment,
        }
    }

    pub fn parse(&self, check_file: &InputFile) -> Result<CheckFile, InvalidCheckFile> {
        let mut lines = vec![];
        let mut errors = vec![];

        for index in 0..check_file.line_count() {
            let line = check_file.line(index);
            let line_start = check_file.line_range(index).start;
            let Some(found) = self.find_directive(line) else {
                continue;
            };
            // A comment prefix before the directive disables it
            if let Some(comment) = self.comment.as_ref() {
                if comment
                    .find(line)
                    .is_some_and(|c| c.start() < found.get(0).unwrap().start())
                {
                    continue;
                }
            }
            match self.parse_directive(check_file, line, line_start, &found, lines.is_empty()) {
                Ok(check) => {
                    log::debug!(
                        target: "filecheck:parse",
                        "parsed {} directive at line {}",
                        check.kind(),
                        index + 1
                    );
                    lines.push(check);
                }
                Err(error) => errors.push(error),
            }
        }

        if lines.is_empty() && errors.is_empty() {
            errors.push(CheckFileError::Empty {
                prefixes: self.config.options.check_prefixes.join(", "),
            });
        }
        if errors.is_empty() {
            Ok(CheckFile::new(lines))
        } else {
            Err(InvalidCheckFile { errors })
        }
    }

    /// Find the first directive match in `line` that sits at a word
    /// boundary; earlier candidates embedded in longer tokens (e.g. the
    /// `CHECK:` in `UNCHECK:`) are skipped.
    fn find_directive<'t>(&self, line: &'t str) -> Option<regex::Captures<'t>> {
        let mut at = 0;
        while let Some(captures) = self.directive.captures_at(line, at) {
            let m = captures.get(0).unwrap();
            let preceded_by_word = line[..m.start()]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
            if !preceded_by_word {
                return Some(captures);
            }
            at = m.start() + 1;
        }
        None
    }

    fn parse_directive(
        &self,
        check_file: &InputFile,
        line: &str,
        line_start: usize,
        found: &regex::Captures<'_>,
        is_first: bool,
    ) -> Result<CheckLine, CheckFileError> {
        let overall = found.get(0).unwrap();
        let prefix = found.name("prefix").unwrap().as_str();
        let kind = match found.name("count") {
            Some(count) => match count.as_str().parse::<usize>() {
                Ok(count) if count >= 1 => Check::Count(count),
                _ => {
                    return Err(CheckFileError::InvalidCount {
                        span: span(line_start + count.start()..line_start + count.end()),
                        check_file: check_file.source().clone(),
                    });
                }
            },
            None => found
                .name("suffix")
                .map(|suffix| suffix.as_str().parse::<Check>().unwrap_or(Check::None))
                .unwrap_or(Check::Plain),
        };
        debug_assert_ne!(kind, Check::None, "suffix alternation must be exhaustive");
        let literal = found.name("literal").is_some();
        let ty_span = span(line_start + overall.start()..line_start + overall.end());

        if is_first && matches!(kind, Check::Next | Check::Same | Check::Empty) {
            return Err(CheckFileError::InvalidFirstCheck {
                span: ty_span,
                kind,
                check_file: check_file.source().clone(),
            });
        }

        // The payload is everything after the colon; one leading blank is
        // consumed, and the rest is trimmed unless in strict mode
        let mut payload = &line[overall.end()..];
        let mut payload_offset = line_start + overall.end();
        if let Some(rest) = payload.strip_prefix([' ', '\t']) {
            payload = rest;
            payload_offset += 1;
        }
        if !self.config.options.strict_whitespace {
            let trimmed = payload.trim_start();
            payload_offset += payload.len() - trimmed.len();
            payload = trimmed.trim_end();
        }

        if payload.is_empty() && !matches!(kind, Check::Empty) {
            return Err(CheckFileError::EmptyPattern {
                span: span(line_start + overall.start()..payload_offset),
                check_file: check_file.source().clone(),
            });
        }

        let pattern = if matches!(kind, Check::Empty) {
            CompiledPattern::default()
        } else {
            CompiledPattern::compile(payload, payload_offset, literal, &self.config.features)
                .map_err(|err| pattern_error(err, check_file))?
        };

        if matches!(kind, Check::Label) && pattern.has_substitutions() {
            return Err(CheckFileError::LabelWithSubstitution {
                var: pattern.span,
                check_file: check_file.source().clone(),
            });
        }

        Ok(CheckLine::new(
            span(line_start + overall.start()..payload_offset + payload.len()),
            prefix.to_string(),
            CheckType {
                span: ty_span,
                kind,
                literal,
            },
            pattern,
        ))
    }
}

fn pattern_error(error: PatternSyntaxError, check_file: &InputFile) -> CheckFileError {
    let source = check_file.source().clone();
    match error {
        PatternSyntaxError::UnterminatedRegex { span } => CheckFileError::UnterminatedRegex {
            span,
            check_file: source,
        },
        PatternSyntaxError::UnknownSubstitutionFormat { span } => {
            CheckFileError::UnknownSubstitutionFormat {
                span,
                check_file: source,
            }
        }
        PatternSyntaxError::InvalidNumberFormat { span, reason } => {
            CheckFileError::InvalidNumberFormat {
                span,
                reason,
                check_file: source,
            }
        }
        PatternSyntaxError::InvalidRegex { span, error } => CheckFileError::InvalidRegex {
            span,
            error,
            check_file: source,
        },
    }
}

fn alternation(prefixes: &[String]) -> String {
    // Longest first, so overlapping prefixes resolve to the longest match
    let mut prefixes: Vec<_> = prefixes.iter().map(|p| regex::escape(p)).collect();
    prefixes.sort_by_key(|p| std::cmp::Reverse(p.len()));
    format!("(?:{})", prefixes.join("|"))
}

fn directive_pattern(check_prefixes: &[String]) -> String {
    format!(
        r"(?P<prefix>{})(?:-(?P<suffix>DAG|COUNT-(?P<count>[0-9]+)|NOT|EMPTY|NEXT|SAME|LABEL))?(?P<literal>\{{LITERAL\}})?:",
        alternation(check_prefixes)
    )
}
