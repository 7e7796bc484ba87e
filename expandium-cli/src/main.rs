#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

//! # Expandium CLI
//!
//! A command-line interface for the expandium macro expansion library.

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use expandium::{Diagnostic, Engine, EngineConfig};
#[cfg(feature = "json")]
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::EnvFilter;

/// Exit codes for different error conditions
mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const IO_ERROR: i32 = 2;
    pub const EXPAND_ERROR: i32 = 3;
}

/// Command-line interface for the expandium macro expander
#[derive(Parser)]
#[command(
    name = "expandium",
    version,
    author,
    about = "A textual macro expander with classic preprocessor semantics",
    long_about = "expandium expands object-like and function-like macros the way a C preprocessor does: arguments are pasted in as raw text, unevaluated, hazards included.",
    after_help = "EXAMPLES:
  # Expand a C file using the #define lines it contains
  $ expandium area.cpp -o area.i

  # Define macros on the command line and expand plain text
  $ echo 'PIE * SQR(++r)' | expandium - --expand-only -D PIE=3.14 -D 'SQR(a)=((a) * (a))'

  # Show redefinition warnings and the final macro table
  $ expandium input.c -W --list-macros

  # Dry run to see what would happen
  $ expandium input.c --dry-run"
)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Input file to expand (use '-' for stdin)
    #[arg(help = "Input file to expand (use '-' for stdin)")]
    input: PathBuf,

    /// Output file (use '-' for stdout, default: stdout)
    #[arg(
        short = 'o',
        long,
        help = "Output file (use '-' for stdout, default: stdout)"
    )]
    output: Option<PathBuf>,

    /// Predefine a macro
    #[arg(
        short = 'D',
        long = "define",
        value_name = "NAME[(PARAMS)][=BODY]",
        help = "Define a macro before processing (body defaults to 1)"
    )]
    defines: Vec<String>,

    /// Remove a predefined macro
    #[arg(
        short = 'U',
        long = "undefine",
        value_name = "NAME",
        help = "Undefine a macro after applying -D options"
    )]
    undefines: Vec<String>,

    /// Maximum recursion depth for macro expansion
    #[arg(
        long,
        default_value_t = expandium::DEFAULT_RECURSION_LIMIT,
        help = "Maximum recursion depth for macro expansion"
    )]
    recursion_limit: usize,

    /// Treat the input as plain text, without #define/#undef handling
    #[arg(long, help = "Expand the input as plain text, ignoring directives")]
    expand_only: bool,

    /// Print the macro table after processing
    #[arg(long, help = "Print the final macro table to stderr")]
    list_macros: bool,

    /// Output in JSON format
    #[arg(long, help = "Output expansion result in JSON format")]
    #[cfg(feature = "json")]
    json: bool,

    /// Enable verbose output
    #[arg(
        short = 'v',
        long,
        help = "Enable verbose output with diagnostic information"
    )]
    verbose: bool,

    /// Suppress non-error output
    #[arg(short = 'q', long, help = "Suppress non-error output (quiet mode)")]
    quiet: bool,

    /// Show redefinition warnings
    #[arg(short = 'W', long, help = "Report macro redefinitions as warnings")]
    warnings: bool,

    /// Show what would happen without expanding
    #[arg(
        short = 'n',
        long,
        help = "Show what would happen without actually expanding"
    )]
    dry_run: bool,

    /// Disable colored output
    #[arg(long, help = "Disable colored output")]
    no_color: bool,

    /// Force colored output
    #[arg(long, help = "Force colored output even when not a terminal")]
    force_color: bool,
}

/// Global flag to track if any warnings occurred
static WARNINGS_OCCURRED: AtomicBool = AtomicBool::new(false);

/// Main application entry point
fn main() {
    std::process::exit(match run() {
        Ok(()) => {
            if WARNINGS_OCCURRED.load(Ordering::Relaxed) {
                exit_code::GENERAL_ERROR
            } else {
                exit_code::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            determine_exit_code(&e)
        }
    });
}

/// Determine the appropriate exit code based on the error
fn determine_exit_code(error: &anyhow::Error) -> i32 {
    if error.downcast_ref::<std::io::Error>().is_some() {
        exit_code::IO_ERROR
    } else if error.downcast_ref::<expandium::ExpandError>().is_some() {
        exit_code::EXPAND_ERROR
    } else {
        exit_code::GENERAL_ERROR
    }
}

/// Run the main application logic
fn run() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli);
    configure_color(&cli);
    validate_args(&cli)?;

    if cli.dry_run {
        show_dry_run_info(&cli);
        return Ok(());
    }

    let input_content = read_input(&cli.input)?;

    let config = create_config(&cli);
    let mut engine = Engine::with_config(&config);
    apply_command_line_macros(&cli, &mut engine)?;

    let start_time = std::time::Instant::now();
    let expanded = if cli.expand_only {
        engine.expand_bytes(&input_content)
    } else {
        engine.process_bytes(&input_content)
    }
    .with_context(|| format!("Failed to expand {}", format_path(&cli.input, "stdin")))?;
    let processing_time = start_time.elapsed();
    tracing::debug!(?processing_time, "expansion finished");

    let diagnostics = engine.take_diagnostics();
    write_output(&cli, &expanded, &diagnostics, processing_time)?;

    if cli.list_macros && !cli.quiet {
        show_macro_table(&engine);
    }

    if cli.verbose && !cli.quiet {
        show_verbose_info(&cli, &engine, processing_time);
        let input_display = format_path(&cli.input, "stdin");
        let output_display = cli
            .output
            .as_ref()
            .map_or("stdout".to_string(), |p| format_path(p, "stdout"));
        eprintln!("{} {input_display} -> {output_display}", "✓ Expanded".green());
    }

    Ok(())
}

/// Install the tracing subscriber; `RUST_LOG` wins over the flags
fn init_logging(cli: &Cli) {
    let default_level = if cli.quiet {
        "off"
    } else if cli.verbose {
        "debug"
    } else {
        "error"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Decide whether stderr output is colored
fn configure_color(cli: &Cli) {
    if cli.no_color {
        colored::control::set_override(false);
    } else if cli.force_color {
        colored::control::set_override(true);
    } else if !atty::is(atty::Stream::Stderr) {
        colored::control::set_override(false);
    }
}

/// Validate command-line arguments
fn validate_args(cli: &Cli) -> Result<()> {
    // Check that input and output are not the same file
    if let Some(output) = &cli.output
        && output != &PathBuf::from("-")
        && std::fs::canonicalize(output).ok() == std::fs::canonicalize(&cli.input).ok()
    {
        return Err(anyhow::anyhow!(
            "Input and output files cannot be the same: {}",
            output.display()
        ));
    }

    if cli.recursion_limit == 0 {
        return Err(anyhow::anyhow!("Recursion limit must be greater than 0"));
    }

    if cli.no_color && cli.force_color {
        return Err(anyhow::anyhow!(
            "--no-color and --force-color cannot be used together"
        ));
    }

    Ok(())
}

/// Show dry run information
fn show_dry_run_info(cli: &Cli) {
    let input_display = format_path(&cli.input, "stdin");
    let output_display = cli
        .output
        .as_ref()
        .map_or("stdout".to_string(), |p| format_path(p, "stdout"));

    eprintln!("Dry run: would expand {input_display} -> {output_display}");
    eprintln!(
        "Mode: {}",
        if cli.expand_only {
            "plain expansion"
        } else {
            "directives + expansion"
        }
    );
    eprintln!("Recursion limit: {}", cli.recursion_limit);

    if !cli.defines.is_empty() {
        eprintln!("Definitions:");
        for define in &cli.defines {
            eprintln!("  {define}");
        }
    }
    if !cli.undefines.is_empty() {
        eprintln!("Undefined: {}", cli.undefines.join(", "));
    }

    #[cfg(feature = "json")]
    if cli.json {
        eprintln!("Output format: JSON");
    }
}

/// Create engine configuration from CLI arguments
fn create_config(cli: &Cli) -> EngineConfig {
    let mut config = EngineConfig::new().with_recursion_limit(cli.recursion_limit);
    if cli.warnings {
        config = config.with_diagnostic_handler(create_warning_handler(cli.quiet));
    }
    config
}

/// Create a handler printing redefinition warnings
fn create_warning_handler(quiet: bool) -> expandium::DiagnosticHandler {
    Arc::new(move |diagnostic: &Diagnostic| {
        WARNINGS_OCCURRED.store(true, Ordering::Relaxed);
        if !quiet {
            eprintln!("{} {diagnostic}", "warning:".yellow().bold());
        }
    })
}

/// Turn `NAME[(PARAMS)][=BODY]` into the text following `#define`
fn define_option_to_directive(option: &str) -> String {
    match option.split_once('=') {
        Some((head, body)) => format!("{head} {body}"),
        None => format!("{option} 1"),
    }
}

/// Apply -D and then -U options
fn apply_command_line_macros(cli: &Cli, engine: &mut Engine) -> Result<()> {
    for option in &cli.defines {
        engine
            .define_directive(&define_option_to_directive(option))
            .with_context(|| format!("Invalid -D option: {option}"))?;
    }
    for name in &cli.undefines {
        engine.undefine_macro(name);
    }
    Ok(())
}

/// Read input from file or stdin
fn read_input(input_path: &Path) -> Result<Vec<u8>> {
    if input_path == Path::new("-") {
        use std::io::Read;
        let mut buffer = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buffer)
            .context("Failed to read from stdin")?;
        Ok(buffer)
    } else {
        std::fs::read(input_path)
            .with_context(|| format!("Failed to read input file: {}", input_path.display()))
    }
}

/// JSON report of one run
#[cfg(feature = "json")]
#[derive(Serialize)]
struct JsonReport<'a> {
    success: bool,
    output: &'a str,
    input_file: String,
    output_file: Option<String>,
    recursion_limit: usize,
    diagnostics: Vec<String>,
    processing_time_ms: u128,
}

/// Write output to file or stdout
fn write_output(
    cli: &Cli,
    content: &str,
    diagnostics: &[Diagnostic],
    processing_time: std::time::Duration,
) -> Result<()> {
    #[cfg(feature = "json")]
    let rendered = if cli.json {
        let report = JsonReport {
            success: true,
            output: content,
            input_file: format_path(&cli.input, "stdin"),
            output_file: cli.output.as_ref().map(|p| format_path(p, "stdout")),
            recursion_limit: cli.recursion_limit,
            diagnostics: diagnostics.iter().map(ToString::to_string).collect(),
            processing_time_ms: processing_time.as_millis(),
        };
        format!("{}\n", serde_json::to_string_pretty(&report)?)
    } else {
        format!("{content}\n")
    };
    #[cfg(not(feature = "json"))]
    let rendered = {
        let _ = (diagnostics, processing_time);
        format!("{content}\n")
    };

    match &cli.output {
        Some(output_path) if output_path != &PathBuf::from("-") => {
            std::fs::write(output_path, rendered).with_context(|| {
                format!("Failed to write to output file: {}", output_path.display())
            })?;
        }
        _ => print!("{rendered}"),
    }

    Ok(())
}

/// Print every macro in the table
fn show_macro_table(engine: &Engine) {
    eprintln!("{}", "Macros:".bold());
    for definition in engine.table().iter() {
        let params = definition
            .params()
            .map(|p| format!("({})", p.join(", ")))
            .unwrap_or_default();
        eprintln!(
            "  {}{params} = {}",
            definition.name().cyan(),
            expandium::render(definition.body())
        );
    }
}

/// Show verbose information
fn show_verbose_info(cli: &Cli, engine: &Engine, processing_time: std::time::Duration) {
    eprintln!("Recursion limit: {}", cli.recursion_limit);
    eprintln!("Macros defined: {}", engine.table().len());
    eprintln!("Processing time: {processing_time:?}");
}

/// Format a path for display, naming `-` after the standard stream
fn format_path(path: &Path, stream: &str) -> String {
    if path == Path::new("-") {
        stream.to_string()
    } else {
        path.display().to_string()
    }
}
