use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use statement_extractor_lib::commands::{
    batch_extract, provider_status, validate_document_file, ExtractionSession,
};
use statement_extractor_lib::config::Settings;
use statement_extractor_lib::excel::export_records_to_new_excel;
use statement_extractor_lib::llm::ExtractionClient;
use statement_extractor_lib::presentation::{render_json, render_panel, RenderOptions};
use statement_extractor_lib::services::normalizer::normalize_traced;

#[derive(Parser, Debug)]
#[command(name = "statement-extractor")]
#[command(version, about = "Extract key fields from bank statement PDFs with an LLM", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract fields from one or more PDF statements
    Extract {
        /// Input PDF files, processed in order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,

        /// Show raw model output, parse strategy and a text sample
        #[arg(short, long)]
        debug: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,

        /// Also export records to an Excel workbook (default: Downloads or Desktop)
        #[arg(long, value_name = "PATH", num_args = 0..=1)]
        xlsx: Option<Option<PathBuf>>,

        /// Model name (overrides GROQ_MODEL)
        #[arg(long)]
        model: Option<String>,

        /// API base URL (overrides GROQ_BASE_URL)
        #[arg(long)]
        base_url: Option<String>,
    },

    /// Normalize raw model output from a file or stdin
    Normalize {
        /// File with raw model output (default: stdin)
        input: Option<PathBuf>,
    },

    /// Check that a file looks like a readable PDF
    Validate {
        /// Input PDF file path
        input: PathBuf,
    },

    /// Show provider configuration
    Status,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
enum Format {
    Text,
    Json,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let debug = matches!(cli.command, Commands::Extract { debug: true, .. });
    init_tracing(debug);

    match cli.command {
        Commands::Extract {
            inputs,
            format,
            debug,
            no_color,
            xlsx,
            model,
            base_url,
        } => extract(inputs, format, debug, no_color, xlsx, model, base_url),
        Commands::Normalize { input } => normalize(input),
        Commands::Validate { input } => validate(input),
        Commands::Status => status(),
    }
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

#[allow(clippy::too_many_arguments)]
fn extract(
    inputs: Vec<PathBuf>,
    format: Format,
    debug: bool,
    no_color: bool,
    xlsx: Option<Option<PathBuf>>,
    model: Option<String>,
    base_url: Option<String>,
) -> Result<ExitCode> {
    let settings = Settings::load().with_model(model).with_base_url(base_url);
    let client = ExtractionClient::new(settings).context("Failed to set up the provider client")?;

    let result = batch_extract(&inputs, &client);

    for failure in &result.failures {
        eprintln!("{}: {}", failure.file_path, failure.error);
    }

    match format {
        Format::Text => {
            let options = RenderOptions {
                color: !no_color && io::stdout().is_terminal(),
                debug,
            };
            for session in &result.successes {
                println!("{}", render_panel(session, &options));
            }
        }
        Format::Json => println!("{}", render_json(&result.successes)?),
    }

    if let Some(path) = xlsx {
        export(&result.successes, path)?;
    }

    Ok(if result.failures.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn export(sessions: &[ExtractionSession], path: Option<PathBuf>) -> Result<()> {
    let rows: Vec<_> = sessions
        .iter()
        .filter_map(|s| s.record.as_ref().map(|r| (s.file_name.as_str(), r)))
        .collect();
    if rows.is_empty() {
        eprintln!("No records to export.");
        return Ok(());
    }
    let saved = export_records_to_new_excel(&rows, path.as_deref())?;
    eprintln!("Saved {} record(s) to {}", rows.len(), saved.display());
    Ok(())
}

fn normalize(input: Option<PathBuf>) -> Result<ExitCode> {
    let raw = match input {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };
    let (record, strategy) = normalize_traced(&raw);
    let out = serde_json::json!({
        "strategy": strategy,
        "record": record,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(ExitCode::SUCCESS)
}

fn validate(input: PathBuf) -> Result<ExitCode> {
    let result = validate_document_file(&input)?;
    if result.valid {
        println!("{}: valid PDF", input.display());
        Ok(ExitCode::SUCCESS)
    } else {
        println!(
            "{}: {}",
            input.display(),
            result.error.as_deref().unwrap_or("invalid")
        );
        Ok(ExitCode::FAILURE)
    }
}

fn status() -> Result<ExitCode> {
    let settings = Settings::load();
    let status = provider_status(&settings);
    println!("Provider: {}", status.status);
    println!("Model:    {}", status.model);
    println!("Base URL: {}", status.base_url);
    Ok(ExitCode::SUCCESS)
}
