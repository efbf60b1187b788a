use std::ffi::OsString;
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::Parser;
use either::Either::{Left, Right};
use miette::{IntoDiagnostic, Report, WrapErr};

use filecheck::diagnostics::DiagResult;
use filecheck::{CheckFileError, CheckWarning, Config, FeatureSet, InputFile, InvalidCheckFile, Test};

#[derive(Debug, Parser)]
#[command(
    name = "filecheck",
    version,
    about = "A directive-driven output verifier in the tradition of LLVM's FileCheck"
)]
struct FileCheck {
    /// The path to the file containing patterns, e.g. `CHECK`, to match
    /// against the input.
    ///
    /// Typically this file is also the source code for the test, i.e. the
    /// test file is fed into a command which produces some output derived
    /// from the test file, and FileCheck validates that output using the
    /// CHECK directives found in the test file.
    #[arg(value_name = "CHECK_FILE")]
    match_file: PathBuf,
    /// The path to the file to verify.
    ///
    /// By default this reads from standard input.
    #[arg(long, value_name = "PATH", default_value = "-", help_heading = "Input")]
    input_file: String,
    #[command(flatten)]
    options: filecheck::Options,
}

fn main() -> ExitCode {
    init_logger();
    let _ = miette::set_hook(Box::new(|_| {
        Box::new(miette::MietteHandlerOpts::new().build())
    }));

    let cli = parse_cli();
    match run(cli) {
        Ok(code) => code,
        Err(report) => {
            eprintln!("{report:?}");
            ExitCode::FAILURE
        }
    }
}

fn run(mut cli: FileCheck) -> DiagResult<ExitCode> {
    if let Some(extra) = std::env::var("FILECHECK_OPTS")
        .ok()
        .as_deref()
        .and_then(shlex::split)
    {
        <filecheck::Options as Parser>::update_from(&mut cli.options, extra);
    }

    cli.options.check_prefixes.sort();
    cli.options.check_prefixes.dedup();
    cli.options.comment_prefixes.sort();
    cli.options.comment_prefixes.dedup();
    cli.options.validate()?;

    let features = match std::env::var("FILECHECK_FEATURE_ENABLE") {
        Ok(tokens) => {
            let (features, unknown) = FeatureSet::from_tokens(&tokens);
            for token in unknown {
                report_warning(CheckWarning::UnknownFeature { token });
            }
            features
        }
        Err(_) => FeatureSet::default(),
    };

    let config = Config {
        options: cli.options,
        features,
    };

    let checks = std::fs::read_to_string(&cli.match_file)
        .into_diagnostic()
        .wrap_err_with(|| format!("unable to read check file {}", cli.match_file.display()))?;
    let input = read_input(&cli.input_file)?;

    let mut test = Test::with_name(cli.match_file.display().to_string(), checks, &config);
    let result = match test.run(input) {
        Ok(result) => result,
        Err(report) => {
            // A check file with no directives at all exits with a distinct
            // code so harnesses can tell it apart from a failed match
            let no_checks = report.downcast_ref::<InvalidCheckFile>().is_some_and(|err| {
                err.errors
                    .iter()
                    .all(|e| matches!(e, CheckFileError::Empty { .. }))
            });
            if no_checks {
                eprintln!("{report:?}");
                return Ok(ExitCode::from(2));
            }
            return Err(report);
        }
    };

    for warning in result.warnings() {
        report_warning(warning.clone());
    }
    result.into_result().map(|_| ExitCode::SUCCESS)
}

fn read_input(path: &str) -> DiagResult<InputFile> {
    let (name, mut reader) = if path == "-" {
        ("<stdin>", Left(std::io::stdin()))
    } else {
        let file = std::fs::File::open(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("unable to open input file {path}"))?;
        (path, Right(file))
    };
    let mut content = String::new();
    reader
        .read_to_string(&mut content)
        .into_diagnostic()
        .wrap_err_with(|| format!("unable to read input from {name}"))?;
    Ok(InputFile::new(name, content))
}

/// Parse the command line, downgrading unrecognized flags to warnings.
///
/// Each unknown argument is reported, removed, and parsing is retried, so
/// a check invocation written for a richer FileCheck still runs.
fn parse_cli() -> FileCheck {
    let mut argv: Vec<OsString> = std::env::args_os().collect();
    loop {
        match FileCheck::try_parse_from(&argv) {
            Ok(cli) => return cli,
            Err(err) if err.kind() == ErrorKind::UnknownArgument => {
                let unknown = err.get(ContextKind::InvalidArg).and_then(|value| match value {
                    ContextValue::String(flag) => Some(flag.clone()),
                    _ => None,
                });
                let Some(unknown) = unknown else { err.exit() };
                let found = argv.iter().skip(1).position(|arg| {
                    let arg = arg.to_string_lossy();
                    arg == unknown.as_str() || arg.starts_with(&format!("{unknown}="))
                });
                let Some(at) = found else { err.exit() };
                report_warning(CheckWarning::UnsupportedFlag { flag: unknown });
                argv.remove(at + 1);
            }
            Err(err) => err.exit(),
        }
    }
}

fn report_warning(warning: CheckWarning) {
    eprintln!("{:?}", Report::new(warning));
}

fn init_logger() {
    let mut builder = env_logger::Builder::from_env("FILECHECK_TRACE");
    builder.format_indent(Some(2));
    builder.format_timestamp(None);
    builder.init();
}
