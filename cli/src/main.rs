mod error_formatter;
mod formatter;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use clausal::{ArgumentSchema, CallOptions, EngineConfig, QueryInput, QueryRunner};
use formatter::Formatter;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "clausal")]
#[command(about = "Ask questions of Prolog facts and rules.")]
#[command(
    long_about = "Clausal loads Prolog facts and rules and answers queries against them.\nQueries can be full goals like partner(john, Y), bare argument lists for a default predicate, or JSON objects keyed by schema argument names."
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one or more queries and display the answers
    ///
    /// A single query is invoked (or streamed with --stream). Several queries
    /// run as a batch, with results reported in input order.
    ///
    /// Examples:
    ///   clausal query --rules family.pl "partner(john, Y)"
    ///   clausal query --rules family.pl --predicate partner "john, Y"
    ///   clausal query --rules family.pl --schema partner:X,Y '{"X": "john"}'
    Query {
        /// Queries to run; omit to run the default predicate with no arguments
        #[arg(value_name = "QUERY")]
        queries: Vec<String>,
        #[command(flatten)]
        engine: EngineArgs,
        /// Stop after this many answers per query
        #[arg(short = 'n', long)]
        max_results: Option<usize>,
        /// Print answers one by one as they are found
        #[arg(short, long)]
        stream: bool,
        /// Keep going when a query in a batch fails
        #[arg(short = 'k', long)]
        keep_going: bool,
        /// Output JSON instead of tables
        #[arg(long)]
        json: bool,
    },
    /// Load the rule sources and report what was consulted
    Check {
        #[command(flatten)]
        engine: EngineArgs,
    },
}

#[derive(Args)]
struct EngineArgs {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Rule file to consult (repeatable)
    #[arg(short, long = "rules", value_name = "FILE")]
    rules: Vec<PathBuf>,
    /// Consult every .pl file under this directory
    #[arg(short, long = "dir", value_name = "DIR")]
    dir: Option<PathBuf>,
    /// Default predicate for bare argument lists
    #[arg(short, long)]
    predicate: Option<String>,
    /// Argument schema (format: name:Arg1,Arg2)
    #[arg(long, value_name = "NAME:ARGS")]
    schema: Option<String>,
    /// Engine flag (format: key=value, repeatable)
    #[arg(short, long = "flag", value_name = "KEY=VALUE")]
    flags: Vec<String>,
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Query {
            queries,
            engine,
            max_results,
            stream,
            keep_going,
            json,
        } => {
            let options = CallOptions {
                max_results: *max_results,
                return_exceptions: *keep_going,
                context: None,
            };
            query_command(engine, queries, &options, *stream, *json)
        }
        Commands::Check { engine } => check_command(engine),
    };

    if let Err(e) = result {
        if let Some(clausal_err) = e.downcast_ref::<clausal::ClausalError>() {
            eprintln!("{}", error_formatter::format_error(clausal_err));
        } else {
            eprintln!("Error: {:#}", e);
        }
        std::process::exit(1);
    }
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clausal=warn".into()),
        )
        .with_writer(io::stderr)
        .init();
}

fn query_command(
    engine: &EngineArgs,
    queries: &[String],
    options: &CallOptions,
    stream: bool,
    json: bool,
) -> Result<()> {
    let runner = build_runner(engine)?;
    let formatter = Formatter::new(json);
    let inputs = queries
        .iter()
        .map(|q| parse_input(q))
        .collect::<Result<Vec<_>>>()?;

    match inputs.len() {
        0 | 1 => {
            let label = queries.first().map(String::as_str).unwrap_or("");
            let input = inputs.into_iter().next().unwrap_or(QueryInput::Absent);
            if stream {
                for item in runner.stream(input, options)? {
                    print!("{}", formatter.format_stream_item(&item?));
                }
            } else {
                let result = runner.invoke(input, options)?;
                print!("{}", formatter.format_result(label, &result));
            }
        }
        _ => {
            let results = runner.batch(inputs, options)?;
            print!("{}", formatter.format_batch(queries, &results));
        }
    }

    Ok(())
}

fn check_command(engine: &EngineArgs) -> Result<()> {
    let runner = build_runner(engine)?;
    let sources = runner.session().loaded_sources()?;

    println!("Consulted {} rule file(s)", sources.len());
    for source in &sources {
        println!("  {}", source.display());
    }
    println!();
    println!("{}", runner.describe());

    Ok(())
}

fn build_runner(args: &EngineArgs) -> Result<QueryRunner> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::new(),
    };

    config.rule_sources.extend(args.rules.iter().cloned());
    if let Some(dir) = &args.dir {
        config.rule_sources.extend(find_rule_files(dir)?);
    }
    if let Some(predicate) = &args.predicate {
        config.default_predicate = Some(predicate.clone());
    }
    if let Some(schema) = &args.schema {
        config.query_schema = Some(parse_schema(schema)?);
    }
    for flag in &args.flags {
        let (name, value) = flag
            .split_once('=')
            .ok_or_else(|| anyhow!("Invalid flag '{}': expected key=value", flag))?;
        config
            .engine_flags
            .insert(name.trim().to_string(), value.trim().to_string());
    }

    debug!(
        rules = config.rule_sources.len(),
        flags = config.engine_flags.len(),
        "Building query runner"
    );
    Ok(QueryRunner::new(config)?)
}

/// Collect every .pl file under the directory, in a stable order
fn find_rule_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Cannot read directory {}", dir.display()))?;
        if entry.file_type().is_file()
            && entry.path().extension().and_then(|s| s.to_str()) == Some("pl")
        {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Parse "name:Arg1,Arg2" into a schema
fn parse_schema(input: &str) -> Result<ArgumentSchema> {
    let (name, args) = input
        .split_once(':')
        .ok_or_else(|| anyhow!("Invalid schema '{}': expected name:Arg1,Arg2", input))?;
    let args: Vec<String> = args
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    Ok(ArgumentSchema::new(name.trim(), args)?)
}

/// JSON objects become mapping input; anything else is query text
fn parse_input(query: &str) -> Result<QueryInput> {
    if query.trim_start().starts_with('{') {
        let value: serde_json::Value = serde_json::from_str(query)
            .with_context(|| format!("Invalid JSON query '{}'", query))?;
        Ok(QueryInput::from(value))
    } else {
        Ok(QueryInput::from(query))
    }
}
