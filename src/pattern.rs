use std::collections::BTreeMap;
use std::fmt::Write;
use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;
use smallvec::SmallVec;

use crate::diagnostics::{span, SourceSpan};
use crate::env::Env;
use crate::expr::{is_valid_variable_name, NumberFormat, Value};
use crate::FeatureSet;

/// One element of a compiled pattern.
///
/// A directive payload is compiled into an ordered sequence of these; the
/// sequence is materialized into a concrete regex against the current
/// variable environment each time the directive is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal text, matched verbatim (after whitespace canonicalization
    /// unless strict-whitespace).
    Literal(String),
    /// An embedded regex, from a `{{...}}` block.
    Regex(String),
    /// A `[[name:expr]]` block: binds `name` to the matched text.
    CaptureText { name: String, expr: String },
    /// A `[[#fmt,name:]]` block: binds `name` to the matched integer.
    /// With no name, matches the numeric shape without binding.
    CaptureNumeric {
        name: Option<String>,
        format: NumberFormat,
    },
    /// A `[[name]]` block: must equal the current binding of `name`.
    ReferenceText { name: String },
    /// A `[[#name]]` block: the value of `name` re-rendered in the format
    /// it was captured with.
    ReferenceNumeric { name: String },
}

impl Segment {
    /// Returns true for segments that bind or reference variables; these
    /// are forbidden in CHECK-LABEL patterns.
    pub fn is_substitution(&self) -> bool {
        !matches!(self, Self::Literal(_) | Self::Regex(_))
    }
}

/// Errors raised while compiling a directive payload into segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternSyntaxError {
    UnterminatedRegex { span: SourceSpan },
    UnknownSubstitutionFormat { span: SourceSpan },
    InvalidNumberFormat { span: SourceSpan, reason: String },
    InvalidRegex { span: SourceSpan, error: String },
}

/// Errors raised while materializing a pattern against the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaterializeError {
    UndefinedVariable { name: String },
    NotANumber { name: String },
    InvalidRegex { error: String },
}

/// Errors raised while converting a successful match into bindings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchValueError {
    NumericOverflow { name: Option<String>, digits: String },
}

/// How a materialized pattern is anchored within the line it searches.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum AnchorMode {
    #[default]
    Unanchored,
    /// Anchor both ends of the line (`--match-full-lines`).
    FullLine,
    /// Anchor only the end of the line; used for CHECK-SAME under
    /// `--match-full-lines`, which continues a line already anchored at
    /// its start.
    LineEnd,
}

/// A directive payload compiled to an ordered segment sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledPattern {
    /// The span of the payload in the check file
    pub span: SourceSpan,
    pub segments: SmallVec<[Segment; 4]>,
}

impl Default for CompiledPattern {
    fn default() -> Self {
        Self {
            span: span(0..0),
            segments: SmallVec::new(),
        }
    }
}

impl CompiledPattern {
    /// Compile a directive payload.
    ///
    /// `offset` is the byte offset of the payload within the check file,
    /// used to attribute syntax errors. When `literal` is set (the
    /// `{LITERAL}` modifier), the entire payload is a single verbatim
    /// segment and no meta-syntax is recognized.
    pub fn compile(
        payload: &str,
        offset: usize,
        literal: bool,
        features: &FeatureSet,
    ) -> Result<Self, PatternSyntaxError> {
        let pattern_span = span(offset..offset + payload.len());
        if literal {
            let mut segments = SmallVec::new();
            if !payload.is_empty() {
                segments.push(Segment::Literal(payload.to_string()));
            }
            return Ok(Self {
                span: pattern_span,
                segments,
            });
        }

        let mut segments = SmallVec::new();
        let mut rest = payload;
        let mut cursor = offset;
        // Scan for `{{` / `[[` openers, accumulating literal text between them
        while let Some(open) = find_opener(rest) {
            let (index, opener) = open;
            if index > 0 {
                push_literal(&mut segments, &rest[..index]);
            }
            let block_offset = cursor + index;
            match opener {
                Opener::Regex => {
                    let body = &rest[index + 2..];
                    let Some(end) = body.find("}}") else {
                        return Err(PatternSyntaxError::UnterminatedRegex {
                            span: span(block_offset..block_offset + 2),
                        });
                    };
                    let expr = translate_regex(&body[..end], features, block_offset + 2)?;
                    validate_regex(&expr, span(block_offset..block_offset + end + 4))?;
                    segments.push(Segment::Regex(expr));
                    rest = &body[end + 2..];
                    cursor = block_offset + 2 + end + 2;
                }
                Opener::Substitution => {
                    let body = &rest[index + 2..];
                    match body.find("]]") {
                        Some(end) => {
                            let block_span = span(block_offset..block_offset + end + 4);
                            let segment = parse_substitution(
                                &body[..end],
                                block_span,
                                block_offset + 2,
                                features,
                            )?;
                            segments.push(segment);
                            rest = &body[end + 2..];
                            cursor = block_offset + 2 + end + 2;
                        }
                        None => {
                            // An unterminated `[[` is not a substitution
                            // block at all; the brackets are literal text
                            push_literal(&mut segments, "[[");
                            rest = &rest[index + 2..];
                            cursor = block_offset + 2;
                        }
                    }
                }
            }
        }
        if !rest.is_empty() {
            push_literal(&mut segments, rest);
        }

        Ok(Self {
            span: pattern_span,
            segments,
        })
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns true if any segment binds or references a variable
    pub fn has_substitutions(&self) -> bool {
        self.segments.iter().any(Segment::is_substitution)
    }

    /// The longest literal segment, used for near-miss suggestions
    pub fn longest_literal(&self) -> Option<&str> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Literal(text) => Some(text.as_str()),
                _ => None,
            })
            .max_by_key(|text| text.trim().len())
            .filter(|text| !text.trim().is_empty())
    }

    /// Render this pattern to a concrete regex against the current
    /// environment.
    ///
    /// References to variables bound by earlier directives are substituted
    /// as escaped literal text. References to captures made in this same
    /// pattern become a sibling group compiled from the capture's
    /// expression, checked for equality after each candidate match (the
    /// engine itself provides no back-references).
    pub fn materialize(
        &self,
        env: &Env,
        anchor: AnchorMode,
        strict_whitespace: bool,
    ) -> Result<MaterializedPattern, MaterializeError> {
        let mut source = String::new();
        match anchor {
            AnchorMode::Unanchored | AnchorMode::LineEnd => {}
            AnchorMode::FullLine if strict_whitespace => source.push('^'),
            AnchorMode::FullLine => source.push_str("^[ \t]*"),
        }

        let mut groups: SmallVec<[CaptureGroup; 2]> = SmallVec::new();
        let mut intra: SmallVec<[IntraReference; 1]> = SmallVec::new();
        // Variables captured earlier in this same pattern: name -> (group, kind)
        let mut local: BTreeMap<&str, (String, CaptureKind)> = BTreeMap::new();

        for (index, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(text) => {
                    push_escaped(&mut source, text, strict_whitespace);
                }
                Segment::Regex(expr) => {
                    let _ = write!(source, "(?:{expr})");
                }
                Segment::CaptureText { name, expr } => {
                    let group = format!("c{index}");
                    let _ = write!(source, "(?P<{group}>{expr})");
                    local.insert(name, (group.clone(), CaptureKind::Text(expr.clone())));
                    groups.push(CaptureGroup {
                        group,
                        name: name.clone(),
                        kind: CaptureKind::Text(expr.clone()),
                    });
                }
                Segment::CaptureNumeric {
                    name: Some(name),
                    format,
                } => {
                    let group = format!("c{index}");
                    let _ = write!(source, "(?P<{group}>{})", format.pattern());
                    local.insert(name, (group.clone(), CaptureKind::Numeric(*format)));
                    groups.push(CaptureGroup {
                        group,
                        name: name.clone(),
                        kind: CaptureKind::Numeric(*format),
                    });
                }
                Segment::CaptureNumeric { name: None, format } => {
                    let _ = write!(source, "(?:{})", format.pattern());
                }
                Segment::ReferenceText { name } | Segment::ReferenceNumeric { name } => {
                    let numeric = matches!(segment, Segment::ReferenceNumeric { .. });
                    if let Some((target, kind)) = local.get(name.as_str()) {
                        // Same-pattern reference: emit a sibling group and
                        // verify equality post-match
                        let group = format!("r{index}");
                        let expr = match kind {
                            CaptureKind::Text(expr) => expr.clone(),
                            CaptureKind::Numeric(format) => format.pattern().into_owned(),
                        };
                        let _ = write!(source, "(?P<{group}>{expr})");
                        intra.push(IntraReference {
                            group,
                            target: target.clone(),
                            kind: kind.clone(),
                        });
                    } else {
                        match env.lookup(name) {
                            Some(value @ Value::Num { .. }) => {
                                source.push_str(&regex::escape(&value.render()));
                            }
                            Some(Value::Text(text)) if !numeric => {
                                source.push_str(&regex::escape(text));
                            }
                            Some(Value::Text(_)) => {
                                return Err(MaterializeError::NotANumber { name: name.clone() });
                            }
                            None => {
                                return Err(MaterializeError::UndefinedVariable {
                                    name: name.clone(),
                                });
                            }
                        }
                    }
                }
            }
        }

        match anchor {
            AnchorMode::Unanchored => {}
            AnchorMode::FullLine | AnchorMode::LineEnd if strict_whitespace => source.push('$'),
            AnchorMode::FullLine | AnchorMode::LineEnd => source.push_str("[ \t]*$"),
        }

        let re = Regex::new(&source).map_err(|err| MaterializeError::InvalidRegex {
            error: err.to_string(),
        })?;
        Ok(MaterializedPattern { re, groups, intra })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CaptureKind {
    Text(String),
    Numeric(NumberFormat),
}

#[derive(Debug, Clone)]
struct CaptureGroup {
    group: String,
    name: String,
    kind: CaptureKind,
}

#[derive(Debug, Clone)]
struct IntraReference {
    group: String,
    target: String,
    kind: CaptureKind,
}

/// A successful application of a materialized pattern to a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch {
    /// Matched columns within the searched line
    pub range: Range<usize>,
    /// Variable bindings produced by capture segments, in segment order
    pub bindings: SmallVec<[(String, Value); 2]>,
}

/// A [CompiledPattern] rendered against a concrete environment.
#[derive(Debug)]
pub struct MaterializedPattern {
    re: Regex,
    groups: SmallVec<[CaptureGroup; 2]>,
    intra: SmallVec<[IntraReference; 1]>,
}

impl MaterializedPattern {
    /// Find the first match in `line` at or after column `start`.
    ///
    /// Candidates whose same-pattern references disagree with their source
    /// capture are skipped, resuming just past the candidate's start.
    pub fn find_in(
        &self,
        line: &str,
        start: usize,
    ) -> Result<Option<PatternMatch>, MatchValueError> {
        let mut at = start;
        while at <= line.len() {
            let Some(captures) = self.re.captures_at(line, at) else {
                return Ok(None);
            };
            let overall = captures.get(0).unwrap();
            if !self.verify_intra(&captures) {
                // Resume just past the candidate's start, on a char boundary
                at = overall.start()
                    + line[overall.start()..]
                        .chars()
                        .next()
                        .map_or(1, char::len_utf8);
                continue;
            }
            let mut bindings = SmallVec::new();
            for group in self.groups.iter() {
                let text = captures
                    .name(&group.group)
                    .map(|m| m.as_str())
                    .unwrap_or_default();
                let value = match &group.kind {
                    CaptureKind::Text(_) => Value::Text(text.to_string()),
                    CaptureKind::Numeric(format) => {
                        let value = format.value_from_str(text).map_err(|_| {
                            MatchValueError::NumericOverflow {
                                name: Some(group.name.clone()),
                                digits: text.to_string(),
                            }
                        })?;
                        Value::Num {
                            value,
                            format: *format,
                        }
                    }
                };
                bindings.push((group.name.clone(), value));
            }
            return Ok(Some(PatternMatch {
                range: overall.range(),
                bindings,
            }));
        }
        Ok(None)
    }

    /// Returns true if the pattern matches anywhere in `line`
    pub fn is_match(&self, line: &str) -> bool {
        matches!(self.find_in(line, 0), Ok(Some(_)))
    }

    fn verify_intra(&self, captures: &regex::Captures<'_>) -> bool {
        self.intra.iter().all(|reference| {
            let got = captures
                .name(&reference.group)
                .map(|m| m.as_str())
                .unwrap_or_default();
            let expected = captures
                .name(&reference.target)
                .map(|m| m.as_str())
                .unwrap_or_default();
            match &reference.kind {
                CaptureKind::Text(_) => got == expected,
                CaptureKind::Numeric(format) => {
                    match (format.value_from_str(got), format.value_from_str(expected)) {
                        (Ok(a), Ok(b)) => a == b,
                        _ => false,
                    }
                }
            }
        })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Opener {
    Regex,
    Substitution,
}

fn find_opener(text: &str) -> Option<(usize, Opener)> {
    let regex = text.find("{{");
    let subst = text.find("[[");
    match (regex, subst) {
        (Some(r), Some(s)) if r < s => Some((r, Opener::Regex)),
        (_, Some(s)) => Some((s, Opener::Substitution)),
        (Some(r), None) => Some((r, Opener::Regex)),
        (None, None) => None,
    }
}

fn push_literal(segments: &mut SmallVec<[Segment; 4]>, text: &str) {
    if text.is_empty() {
        return;
    }
    // Coalesce adjacent literal pieces so the segment sequence is canonical
    if let Some(Segment::Literal(last)) = segments.last_mut() {
        last.push_str(text);
    } else {
        segments.push(Segment::Literal(text.to_string()));
    }
}

/// Parse the body of a terminated `[[...]]` block into a segment
fn parse_substitution(
    body: &str,
    block_span: SourceSpan,
    body_offset: usize,
    features: &FeatureSet,
) -> Result<Segment, PatternSyntaxError> {
    if let Some(numeric) = body.strip_prefix('#') {
        return parse_numeric_substitution(numeric, block_span);
    }
    if let Some((name, expr)) = body.split_once(':') {
        if !is_valid_name(name) {
            return Err(PatternSyntaxError::UnknownSubstitutionFormat { span: block_span });
        }
        let expr_offset = body_offset + name.len() + 1;
        let expr = translate_regex(expr, features, expr_offset)?;
        if !expr.is_empty() {
            validate_regex(&expr, block_span)?;
        }
        return Ok(Segment::CaptureText {
            name: name.to_string(),
            expr,
        });
    }
    if is_valid_name(body) {
        return Ok(Segment::ReferenceText {
            name: body.to_string(),
        });
    }
    Err(PatternSyntaxError::UnknownSubstitutionFormat { span: block_span })
}

/// Parse the post-`#` body of a numeric substitution block:
/// `[[#]]`, `[[#%fmt,]]`, `[[#%fmt,NAME:]]`, `[[#NAME:]]`, or `[[#NAME]]`
fn parse_numeric_substitution(
    body: &str,
    block_span: SourceSpan,
) -> Result<Segment, PatternSyntaxError> {
    if body.is_empty() {
        return Ok(Segment::CaptureNumeric {
            name: None,
            format: NumberFormat::default(),
        });
    }
    if let Some((spec, binding)) = body.split_once(',') {
        let format = NumberFormat::parse_spec(spec).map_err(|err| {
            PatternSyntaxError::InvalidNumberFormat {
                span: block_span,
                reason: err.to_string(),
            }
        })?;
        if binding.is_empty() {
            return Ok(Segment::CaptureNumeric { name: None, format });
        }
        return match binding.strip_suffix(':') {
            Some(name) if is_valid_name(name) => Ok(Segment::CaptureNumeric {
                name: Some(name.to_string()),
                format,
            }),
            _ => Err(PatternSyntaxError::UnknownSubstitutionFormat { span: block_span }),
        };
    }
    if let Some(name) = body.strip_suffix(':') {
        if is_valid_name(name) {
            return Ok(Segment::CaptureNumeric {
                name: Some(name.to_string()),
                format: NumberFormat::default(),
            });
        }
    } else if is_valid_name(body) {
        return Ok(Segment::ReferenceNumeric {
            name: body.to_string(),
        });
    }
    Err(PatternSyntaxError::UnknownSubstitutionFormat { span: block_span })
}

fn is_valid_name(name: &str) -> bool {
    let unprefixed = name.strip_prefix('$').unwrap_or(name);
    is_valid_variable_name(unprefixed)
}

/// Append `text` to `source` as escaped literal regex, canonicalizing
/// whitespace runs to `[ \t]+` unless in strict mode
fn push_escaped(source: &mut String, text: &str, strict_whitespace: bool) {
    if strict_whitespace {
        source.push_str(&regex::escape(text));
        return;
    }
    let mut rest = text;
    while let Some(index) = rest.find([' ', '\t']) {
        source.push_str(&regex::escape(&rest[..index]));
        source.push_str("[ \t]+");
        rest = rest[index..].trim_start_matches([' ', '\t']);
    }
    source.push_str(&regex::escape(rest));
}

/// Apply the pure text transforms we perform on embedded regexes before
/// they reach the engine: POSIX bracket classes, and the `\V` value-name
/// class when the MLIR extension is enabled.
fn translate_regex(
    expr: &str,
    features: &FeatureSet,
    offset: usize,
) -> Result<String, PatternSyntaxError> {
    static POSIX_CLASS: OnceLock<Regex> = OnceLock::new();
    let posix_class =
        POSIX_CLASS.get_or_init(|| Regex::new(r"\[:([a-z]+):\]").expect("invalid posix pattern"));

    let mut translated = String::with_capacity(expr.len());
    let mut last = 0;
    for captures in posix_class.captures_iter(expr) {
        let class = captures.get(1).unwrap();
        let replacement = match class.as_str() {
            "alpha" => "A-Za-z",
            "upper" => "A-Z",
            "lower" => "a-z",
            "digit" => "0-9",
            "alnum" => "A-Za-z0-9",
            "xdigit" => "A-Fa-f0-9",
            "space" => r"\s",
            "blank" => r" \t",
            unknown => {
                let at = captures.get(0).unwrap();
                return Err(PatternSyntaxError::InvalidRegex {
                    span: span(offset + at.start()..offset + at.end()),
                    error: format!("unknown POSIX character class '{unknown}'"),
                });
            }
        };
        let whole = captures.get(0).unwrap();
        translated.push_str(&expr[last..whole.start()]);
        translated.push_str(replacement);
        last = whole.end();
    }
    translated.push_str(&expr[last..]);

    if features.mlir_regex_cls {
        translated = translated.replace(r"\V", r"%([0-9]+|[A-Za-z_.$-][A-Za-z_.$0-9-]*)(#[0-9]+)?");
    }
    Ok(translated)
}

/// Build a matcher for a bare literal fragment, honoring whitespace
/// canonicalization; used for near-miss suggestions.
pub(crate) fn literal_matcher(text: &str, strict_whitespace: bool) -> Regex {
    let mut source = String::new();
    push_escaped(&mut source, text, strict_whitespace);
    Regex::new(&source).expect("escaped literal is always a valid pattern")
}

fn validate_regex(expr: &str, at: SourceSpan) -> Result<(), PatternSyntaxError> {
    Regex::new(&format!("(?:{expr})"))
        .map(|_| ())
        .map_err(|err| PatternSyntaxError::InvalidRegex {
            span: at,
            error: err.to_string(),
        })
}
