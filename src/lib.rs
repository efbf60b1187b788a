pub mod ast;
pub mod check;
pub mod cursor;
pub mod diagnostics;
pub mod env;
pub mod errors;
pub mod expr;
mod input;
pub mod parse;
pub mod pattern;
#[cfg(test)]
mod tests;

pub use self::errors::{
    CheckFailedError, CheckFileError, CheckWarning, InvalidCheckFile, TestFailed,
};
pub use self::input::InputFile;
pub use self::test::{MatchInfo, Test, TestResult};

use clap::{builder::ValueParser, ArgAction, Args};

pub const DEFAULT_CHECK_PREFIXES: &[&str] = &["CHECK"];
pub const DEFAULT_COMMENT_PREFIXES: &[&str] = &["COM", "RUN"];

/// FileCheck reads two files, one from standard input, and one specified on
/// the command line; and uses one to verify the other.
#[derive(Debug, Default)]
pub struct Config {
    pub options: Options,
    pub features: FeatureSet,
}

impl Config {
    /// Returns true if the user has passed -v, requesting diagnostic remarks for matches
    pub const fn remarks_enabled(&self) -> bool {
        self.options.verbose > 0
    }
}

/// The set of opt-in extensions controlled by the `FILECHECK_FEATURE_ENABLE`
/// environment variable.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FeatureSet {
    /// Enables the `\V` regex class, matching MLIR-style SSA value names,
    /// e.g. `%foo`, `%0`, or the multi-result form `%foo#1`.
    pub mlir_regex_cls: bool,
}

impl FeatureSet {
    /// Parse a comma-separated feature token list, e.g. the value of
    /// `FILECHECK_FEATURE_ENABLE`. Unknown tokens are returned so the caller
    /// can raise a warning for each.
    pub fn from_tokens(tokens: &str) -> (Self, Vec<String>) {
        let mut features = Self::default();
        let mut unknown = vec![];
        for token in tokens.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            match token {
                "MLIR_REGEX_CLS" => features.mlir_regex_cls = true,
                _ => unknown.push(token.to_string()),
            }
        }
        (features, unknown)
    }
}

/// The set of flags accepted by FileCheck, also usable as a library-level
/// configuration record.
#[derive(Debug, Args)]
pub struct Options {
    /// Allow checking empty input. By default, empty input is rejected.
    #[arg(long, default_value_t = false, help_heading = "Input")]
    pub allow_empty: bool,
    /// Which prefixes to treat as directives.
    ///
    /// For example, in the directive `CHECK-SAME`, `CHECK` is the prefix.
    #[arg(
        long = "check-prefixes",
        alias = "check-prefix",
        value_name = "PREFIX",
        default_value = "CHECK",
        action(ArgAction::Append),
        value_parser(prefix_value_parser()),
        value_delimiter(','),
        help_heading = "Syntax"
    )]
    pub check_prefixes: Vec<String>,
    /// Which prefixes to treat as comments.
    ///
    /// A comment prefix neutralizes any directive appearing later on the
    /// same line.
    #[arg(
        long = "comment-prefixes",
        value_name = "PREFIX",
        default_value = "COM,RUN",
        action(ArgAction::Append),
        value_parser(prefix_value_parser()),
        value_delimiter(','),
        help_heading = "Syntax"
    )]
    pub comment_prefixes: Vec<String>,
    /// Disable default canonicalization of whitespace.
    ///
    /// By default, FileCheck canonicalizes horizontal whitespace (spaces and
    /// tabs), which causes it to ignore these differences (a space will match
    /// a tab). This flag disables that canonicalization.
    ///
    /// Newlines are always canonicalized to LF regardless of this setting.
    #[arg(long, default_value_t = false, help_heading = "Matching")]
    pub strict_whitespace: bool,
    /// Require all positive matches to cover an entire line.
    ///
    /// Leading/trailing whitespace is ignored unless `--strict-whitespace`
    /// is also specified.
    ///
    /// NOTE: Negative matches, i.e. `CHECK-NOT`, are not affected by this
    /// option.
    #[arg(long, default_value_t = false, help_heading = "Matching")]
    pub match_full_lines: bool,
    /// Enables scoping for pattern variables.
    ///
    /// Variables with names that start with `$` are considered global, and
    /// remain set throughout the file.
    ///
    /// All other variables get undefined after each encountered `CHECK-LABEL`.
    #[arg(long, default_value_t = false, help_heading = "Variables")]
    pub enable_var_scope: bool,
    /// Set a pattern variable VAR with value VALUE that can be used in
    /// `CHECK:` lines.
    #[arg(
        long = "define",
        short = 'D',
        value_name = "NAME=VALUE",
        help_heading = "Variables"
    )]
    pub variables: Vec<expr::CliVariable>,
    /// Promote the empty-capture warning to an error.
    ///
    /// By default, a `[[NAME:]]` capture that binds an empty string only
    /// produces a warning.
    #[arg(long, default_value_t = false, help_heading = "Variables")]
    pub reject_empty_vars: bool,
    /// Dump annotated input to stderr: never, or on failure.
    #[arg(
        long,
        value_name = "TYPE",
        default_value_t = Dump::Fail,
        value_parser(dump_value_parser()),
        help_heading = "Output"
    )]
    pub dump_input: Dump,
    /// Set the verbosity level.
    ///
    /// If specified, FileCheck logs good directive pattern matches as they
    /// are found.
    #[arg(long, short = 'v', action = ArgAction::Count, help_heading = "Output")]
    pub verbose: u8,
}

/// This is implemented for [Options] so that we can use [clap::Parser::update_from]
/// on it, e.g. when applying extra arguments from `FILECHECK_OPTS`.
impl clap::CommandFactory for Options {
    fn command() -> clap::Command {
        let cmd = clap::Command::new("filecheck")
            .no_binary_name(true)
            .disable_help_flag(true)
            .disable_version_flag(true);
        <Self as clap::Args>::augment_args(cmd)
    }

    fn command_for_update() -> clap::Command {
        let cmd = clap::Command::new("filecheck")
            .no_binary_name(true)
            .disable_help_flag(true)
            .disable_version_flag(true);
        <Self as clap::Args>::augment_args_for_update(cmd)
    }
}

impl clap::Parser for Options {}

impl Default for Options {
    fn default() -> Self {
        Self {
            allow_empty: false,
            check_prefixes: DEFAULT_CHECK_PREFIXES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            comment_prefixes: DEFAULT_COMMENT_PREFIXES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            strict_whitespace: false,
            match_full_lines: false,
            enable_var_scope: false,
            variables: vec![],
            reject_empty_vars: false,
            dump_input: Dump::default(),
            verbose: 0,
        }
    }
}

impl Options {
    pub fn validate(&self) -> diagnostics::DiagResult<()> {
        for check_prefix in self.check_prefixes.iter() {
            if self.comment_prefixes.contains(check_prefix) {
                return Err(miette::Report::msg(format!(
                    "supplied check prefix must be unique among check and comment prefixes: \
                     '{check_prefix}'"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum Dump {
    /// Dump input on failure
    #[default]
    Fail,
    /// Never dump input
    Never,
}

impl std::fmt::Display for Dump {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fail => f.write_str("fail"),
            Self::Never => f.write_str("never"),
        }
    }
}

fn dump_value_parser() -> ValueParser {
    ValueParser::from(move |s: &str| -> Result<Dump, clap::Error> {
        match s {
            "fail" => Ok(Dump::Fail),
            "never" => Ok(Dump::Never),
            other => {
                // Unsupported modes are a warning, not an error
                eprintln!(
                    "warning: unsupported value '{other}' for --dump-input, \
                     falling back to 'fail'"
                );
                Ok(Dump::Fail)
            }
        }
    })
}

fn prefix_value_parser() -> ValueParser {
    use clap::{error::ErrorKind, Error};

    ValueParser::from(move |s: &str| -> Result<String, clap::Error> {
        if s.is_empty() {
            return Err(Error::raw(
                ErrorKind::ValueValidation,
                "supplied prefix must not be an empty string",
            ));
        }
        if !s.starts_with(|c: char| c.is_ascii_alphabetic()) {
            return Err(Error::raw(
                ErrorKind::ValueValidation,
                "supplied prefix must start with an ASCII alphabetic character",
            ));
        }
        if s.contains(|c: char| !c.is_ascii_alphanumeric() && c != '_' && c != '-') {
            return Err(Error::raw(
                ErrorKind::ValueValidation,
                "supplied prefix may only contain ASCII alphanumerics, hyphens, or underscores",
            ));
        }
        Ok(s.to_string())
    })
}

/// Use `filecheck` in a Rust test directly against an input value that
/// implements `Display`.
///
/// ## Example
///
/// ```rust
/// use filecheck::filecheck;
///
/// filecheck!("a\nb\nb\nc\n", "
/// ; CHECK: a
/// ; CHECK-NEXT: b
/// ; CHECK-NEXT: b
/// ; CHECK-NEXT: c
/// ");
/// ```
///
/// If custom configuration is desired, you may instantiate the `filecheck`
/// configuration (see [Config]) and pass it as an additional parameter.
///
/// If successful, the `filecheck!` macro returns the pattern matches produced
/// by verifying the checks, allowing you to examine them in more detail.
#[macro_export]
macro_rules! filecheck {
    ($input:expr, $checks:expr) => {
        $crate::filecheck!($input, $checks, $crate::Config::default())
    };

    ($input:expr, $checks:expr, $config:expr) => {{
        let config = $config;
        let mut test = $crate::Test::new($checks.to_string(), &config);
        match test.verify($input.to_string()) {
            Err(err) => panic!("{err:?}"),
            Ok(matches) => matches,
        }
    }};
}
