use std::path::PathBuf;

use clap::Parser;
use scribe::error::{ErrorFormat, Logger};
use scribe::executor::{Executor, OsFileSystem, SCRIBE_EXT};

/// Compile a Scribe document.
///
/// The input file is executed top to bottom; root branches it creates are
/// then rendered into the output directory.
#[derive(Parser)]
#[clap(version)]
struct Cli {
    /// Path to the document to compile; `.psc` is appended if the path has
    /// no extension and does not name an existing file
    input: PathBuf,

    /// Define a constant text macro, e.g. `-d edition=2nd`
    #[arg(short, long = "define", value_name = "NAME=TEXT", value_parser = parse_define)]
    defines: Vec<(String, String)>,

    /// Text the `$output.format` macro expands to
    #[arg(short, long, default_value = "", value_name = "FORMAT")]
    format: String,

    /// Directory the output files are written into
    #[arg(short, long, default_value = "output", value_name = "DIR")]
    output: PathBuf,

    /// How errors are printed
    #[arg(long, value_enum, default_value_t = ErrorFormatArg::Simple)]
    error_format: ErrorFormatArg,

    /// Suppress progress messages
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum ErrorFormatArg {
    Simple,
    /// Python-traceback lookalike, convenient for editors that parse it
    Python,
}

impl From<ErrorFormatArg> for ErrorFormat {
    fn from(format: ErrorFormatArg) -> ErrorFormat {
        match format {
            ErrorFormatArg::Simple => ErrorFormat::Simple,
            ErrorFormatArg::Python => ErrorFormat::Python,
        }
    }
}

fn parse_define(value: &str) -> Result<(String, String), String> {
    value
        .split_once('=')
        .map(|(name, text)| (name.to_string(), text.to_string()))
        .ok_or_else(|| format!("expects format: name=text; got: {value}"))
}

fn main() {
    let cli = Cli::parse();
    let logger = Logger::stderr(cli.error_format.into(), cli.quiet);
    let mut executor = Executor::new(
        &cli.output,
        logger.clone(),
        Box::new(OsFileSystem),
        scribe_stdlib::built_ins(),
    );
    let mut constants = cli.defines;
    constants.push(("output.format".to_string(), cli.format));
    executor.add_constants(constants);

    let current_dir = std::env::current_dir().unwrap_or_default();
    let input = executor.resolve_file_path(&cli.input, &current_dir, Some(SCRIBE_EXT));
    let result = executor
        .execute_file(&input)
        .map_err(|e| e.into_fatal())
        .and_then(|()| executor.render_branches());
    if let Err(error) = result {
        logger.report(&error);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn define_parsing() {
        assert_eq!(
            parse_define("edition=2nd"),
            Ok(("edition".to_string(), "2nd".to_string()))
        );
        assert_eq!(
            parse_define("edition"),
            Err("expects format: name=text; got: edition".to_string())
        );
    }
}
