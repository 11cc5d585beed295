// crates/shard-gate-cli/src/main.rs
// ============================================================================
// Module: Shard Gate CLI Entry Point
// Description: Command dispatcher for shard-wide SQL apply and benchmarking.
// Purpose: Run the two-phase coordinator and the load generator from a shell.
// Dependencies: clap, serde_json, shard-gate-{core,config,store-postgres,store-sqlite}, thiserror
// ============================================================================

//! ## Overview
//! `apply-sql` applies one SQL file to every mapped shard with best-effort
//! two-phase commit; `benchmark` runs the insert and read workloads. Both
//! load an optional `shard-gate.toml`, a JSON mapping file, and pick the
//! driver from `--driver` or the config. Text output streams per-shard
//! progress as it happens; `--format json` prints one document at the end.

// ============================================================================
// SECTION: Modules
// ============================================================================

#[cfg(test)]
mod main_tests;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::ArgAction;
use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use serde::Serialize;
use shard_gate_cli::report::ApplyDocument;
use shard_gate_cli::report::BenchmarkDocument;
use shard_gate_cli::report::BenchmarkSettings;
use shard_gate_cli::report::ReportEmitter;
use shard_gate_cli::report::apply_footer;
use shard_gate_cli::report::apply_header;
use shard_gate_cli::report::benchmark_header;
use shard_gate_cli::report::benchmark_summary;
use shard_gate_cli::report::phase_lines;
use shard_gate_cli::t;
use shard_gate_config::BenchmarkConfig;
use shard_gate_config::DriverKind;
use shard_gate_config::EventSinkKind;
use shard_gate_config::EventsConfig;
use shard_gate_config::ShardGateConfig;
use shard_gate_config::load_shard_map;
use shard_gate_core::ConnectionFactory;
use shard_gate_core::EventSink;
use shard_gate_core::FanoutEventSink;
use shard_gate_core::FileEventSink;
use shard_gate_core::IdRegistry;
use shard_gate_core::LoadGenerator;
use shard_gate_core::NoopEventSink;
use shard_gate_core::ShardMap;
use shard_gate_core::StderrEventSink;
use shard_gate_core::TwoPhaseCoordinator;
use shard_gate_store_postgres::PostgresShardFactory;
use shard_gate_store_sqlite::SqliteShardFactory;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of a SQL file passed to `apply-sql`.
const MAX_SQL_BYTES: usize = 16 * 1024 * 1024;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "shard-gate", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply a SQL file to every shard with two-phase commit.
    ApplySql(ApplySqlCommand),
    /// Run the insert and read benchmark across the shards.
    Benchmark(BenchmarkCommand),
}

/// Arguments shared by every subcommand.
#[derive(Args, Debug)]
struct CommonArgs {
    /// Path to the JSON shard mapping file.
    #[arg(long, value_name = "PATH")]
    mapping: PathBuf,
    /// Database driver (overrides `connection.driver`).
    #[arg(long, value_enum, value_name = "DRIVER")]
    driver: Option<DriverArg>,
    /// Optional config file path (defaults to shard-gate.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

/// Arguments for `apply-sql`.
#[derive(Args, Debug)]
struct ApplySqlCommand {
    /// Shared arguments.
    #[command(flatten)]
    common: CommonArgs,
    /// Path to the SQL file to apply.
    #[arg(long, value_name = "PATH")]
    file: PathBuf,
}

/// Arguments for `benchmark`.
#[derive(Args, Debug)]
struct BenchmarkCommand {
    /// Shared arguments.
    #[command(flatten)]
    common: CommonArgs,
    /// Number of inserts (overrides `benchmark.count`).
    #[arg(long, value_name = "N")]
    count: Option<usize>,
    /// Number of reads (overrides `benchmark.reads`).
    #[arg(long, value_name = "N")]
    reads: Option<usize>,
    /// Worker count (overrides `benchmark.concurrency`).
    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,
}

/// Driver selection on the command line.
#[derive(ValueEnum, Copy, Clone, Debug)]
enum DriverArg {
    /// `PostgreSQL` servers.
    Postgres,
    /// `SQLite` database files.
    Sqlite,
}

impl From<DriverArg> for DriverKind {
    fn from(value: DriverArg) -> Self {
        match value {
            DriverArg::Postgres => Self::Postgres,
            DriverArg::Sqlite => Self::Sqlite,
        }
    }
}

/// Output formats.
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Streaming console text.
    Text,
    /// One JSON document after the run.
    Json,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for catalog error messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from a catalog message.
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();

    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&t!("main.version", version = version))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    match command {
        Commands::ApplySql(command) => command_apply_sql(&command),
        Commands::Benchmark(command) => command_benchmark(&command),
    }
}

/// Prints top-level help.
fn show_help() -> CliResult<()> {
    let mut command = Cli::command();
    command.print_help().map_err(|err| CliError::new(output_error("stdout", &err)))?;
    write_stdout_line("").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(())
}

// ============================================================================
// SECTION: Shared Setup
// ============================================================================

/// Everything a subcommand needs before contacting a shard.
struct Setup {
    /// Loaded configuration.
    config: ShardGateConfig,
    /// Effective driver.
    driver: DriverKind,
    /// Validated shard map.
    map: ShardMap,
    /// Driver factory.
    factory: Box<dyn ConnectionFactory>,
    /// Configured diagnostic sink.
    sink: Arc<dyn EventSink>,
}

impl Setup {
    /// Loads config and mapping and builds the driver and event sink.
    fn load(common: &CommonArgs) -> CliResult<Self> {
        let config = ShardGateConfig::load(common.config.as_deref())
            .map_err(|err| CliError::new(t!("config.load_failed", error = err)))?;
        let driver = common.driver.map_or(config.connection.driver, DriverKind::from);
        let map = load_shard_map(&common.mapping).map_err(|err| {
            CliError::new(t!("mapping.load_failed", path = common.mapping.display(), error = err))
        })?;
        let factory = build_factory(driver, &common.mapping);
        let sink = build_event_sink(&config.events)?;
        Ok(Self {
            config,
            driver,
            map,
            factory,
            sink,
        })
    }

    /// Returns the sink used for the run: the configured sink, plus the live
    /// console emitter in text mode.
    fn run_sink(&self, format: OutputFormat) -> FanoutEventSink {
        let mut sinks: Vec<Arc<dyn EventSink>> = Vec::new();
        if format == OutputFormat::Text {
            sinks.push(Arc::new(ReportEmitter::stdout()));
        }
        sinks.push(Arc::clone(&self.sink));
        FanoutEventSink::new(sinks)
    }
}

/// Builds the connection factory for `driver`.
///
/// `SQLite` database paths in the mapping resolve relative to the mapping
/// file's directory.
fn build_factory(driver: DriverKind, mapping: &Path) -> Box<dyn ConnectionFactory> {
    match driver {
        DriverKind::Postgres => Box::new(PostgresShardFactory::new()),
        DriverKind::Sqlite => {
            let base = mapping.parent().map(Path::to_path_buf).unwrap_or_default();
            Box::new(SqliteShardFactory::new().with_base_dir(base))
        }
    }
}

/// Builds the configured diagnostic event sink.
fn build_event_sink(events: &EventsConfig) -> CliResult<Arc<dyn EventSink>> {
    match (events.sink, events.path.as_deref()) {
        (EventSinkKind::Stderr, _) => Ok(Arc::new(StderrEventSink)),
        (EventSinkKind::File, Some(path)) => {
            let sink = FileEventSink::new(Path::new(path))
                .map_err(|err| CliError::new(t!("events.open_failed", path = path, error = err)))?;
            Ok(Arc::new(sink))
        }
        (EventSinkKind::File | EventSinkKind::None, _) => Ok(Arc::new(NoopEventSink)),
    }
}

// ============================================================================
// SECTION: Apply Command
// ============================================================================

/// Executes the `apply-sql` command.
fn command_apply_sql(command: &ApplySqlCommand) -> CliResult<ExitCode> {
    let setup = Setup::load(&command.common)?;
    let sql = read_sql_file(&command.file)?;
    if sql.trim().is_empty() {
        return Err(CliError::new(t!("apply.sql_empty", path = command.file.display())));
    }

    let format = command.common.format;
    if format == OutputFormat::Text {
        write_lines(&apply_header(&command.common.mapping, &command.file, setup.map.len()))?;
    }
    let sink = setup.run_sink(format);
    let coordinator = TwoPhaseCoordinator::new(setup.factory.as_ref(), &sink)
        .with_policy(setup.config.connection.policy());
    let outcome = coordinator.apply(&setup.map, &sql);

    match format {
        OutputFormat::Text => write_lines(&apply_footer(&outcome))?,
        OutputFormat::Json => write_json(&ApplyDocument {
            mapping: command.common.mapping.display().to_string(),
            sql_file: command.file.display().to_string(),
            databases: setup.map.len(),
            outcome: &outcome,
        })?,
    }

    Ok(if outcome.success { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Reads the SQL file as UTF-8 text within [`MAX_SQL_BYTES`].
fn read_sql_file(path: &Path) -> CliResult<String> {
    let kind = t!("input.kind.sql");
    let bytes = read_bytes_with_limit(path, MAX_SQL_BYTES).map_err(|err| match err {
        ReadLimitError::Io(err) => CliError::new(t!(
            "input.read_failed",
            kind = kind,
            path = path.display(),
            error = err
        )),
        ReadLimitError::TooLarge {
            size,
            limit,
        } => CliError::new(t!(
            "input.read_too_large",
            kind = kind,
            path = path.display(),
            size = size,
            limit = limit
        )),
    })?;
    String::from_utf8(bytes)
        .map_err(|_| CliError::new(t!("input.not_utf8", kind = kind, path = path.display())))
}

// ============================================================================
// SECTION: Benchmark Command
// ============================================================================

/// Executes the `benchmark` command.
///
/// Per-operation failures are reported in the metrics and never change the
/// exit code.
fn command_benchmark(command: &BenchmarkCommand) -> CliResult<ExitCode> {
    let setup = Setup::load(&command.common)?;
    let settings = BenchmarkConfig {
        count: command.count.unwrap_or(setup.config.benchmark.count),
        reads: command.reads.unwrap_or(setup.config.benchmark.reads),
        concurrency: command.concurrency.unwrap_or(setup.config.benchmark.concurrency),
        table: setup.config.benchmark.table.clone(),
    };
    settings
        .validate()
        .map_err(|err| CliError::new(t!("benchmark.args_invalid", error = err)))?;
    let echoed = BenchmarkSettings {
        driver: setup.driver.as_str().to_string(),
        inserts: settings.count,
        reads: settings.reads,
        concurrency: settings.concurrency,
        shards: setup.map.distinct_shards(),
    };

    let format = command.common.format;
    if format == OutputFormat::Text {
        write_lines(&benchmark_header(&echoed))?;
    }
    let sink = setup.run_sink(format);
    let registry = IdRegistry::new();
    let generator =
        LoadGenerator::new(setup.factory.as_ref(), &setup.map, &registry, &sink, &settings.table)
            .map_err(|err| CliError::new(t!("benchmark.setup_failed", error = err)))?
            .with_policy(setup.config.connection.policy());

    let insert = generator.run_insert_phase(settings.count, settings.concurrency);
    if format == OutputFormat::Text {
        write_lines(&phase_lines(&insert))?;
    }
    let read = generator.run_read_phase(settings.reads, settings.concurrency);
    match format {
        OutputFormat::Text => {
            write_lines(&phase_lines(&read))?;
            write_lines(&benchmark_summary(&insert, &read))?;
        }
        OutputFormat::Json => write_json(&BenchmarkDocument {
            settings: &echoed,
            insert: &insert,
            read: &read,
            total_elapsed_ms: (insert.elapsed + read.elapsed).as_millis(),
        })?,
    }

    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Input Helpers
// ============================================================================

/// Errors returned by bounded file reads.
#[derive(Debug)]
enum ReadLimitError {
    /// File I/O failure.
    Io(std::io::Error),
    /// File size exceeds the configured limit.
    TooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Allowed limit in bytes.
        limit: usize,
    },
}

/// Reads a file from disk while enforcing a hard size limit.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path).map_err(ReadLimitError::Io)?;
    let metadata = file.metadata().map_err(ReadLimitError::Io)?;
    let size = metadata.len();
    let limit = u64::try_from(max_bytes).map_err(|_| ReadLimitError::TooLarge {
        size,
        limit: max_bytes,
    })?;
    if size > limit {
        return Err(ReadLimitError::TooLarge {
            size,
            limit: max_bytes,
        });
    }

    let mut limited = file.take(limit.saturating_add(1));
    let mut bytes = Vec::new();
    limited.read_to_end(&mut bytes).map_err(ReadLimitError::Io)?;
    if bytes.len() > max_bytes {
        let actual = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
        return Err(ReadLimitError::TooLarge {
            size: actual,
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes each line to stdout.
fn write_lines(lines: &[String]) -> CliResult<()> {
    let mut stdout = std::io::stdout().lock();
    for line in lines {
        writeln!(&mut stdout, "{line}")
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    }
    Ok(())
}

/// Writes a pretty-printed JSON document to stdout.
fn write_json<T: Serialize>(value: &T) -> CliResult<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::new(t!("output.json_failed", error = err)))?;
    write_stdout_line(&rendered).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats a catalog output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    let stream_label = match stream {
        "stdout" => t!("output.stream.stdout"),
        "stderr" => t!("output.stream.stderr"),
        _ => t!("output.stream.unknown"),
    };
    t!("output.write_failed", stream = stream_label, error = error)
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
