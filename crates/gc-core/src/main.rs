//! Gamma Cuts Core - binned gamma/hadron cut engine
//!
//! The main entry point for gc-core, handling:
//! - Threshold resolution over a catalog of training artifacts
//! - Event evaluation from JSON lines
//! - Configuration and artifact checks
//! - Schema export for downstream tooling

use clap::{Args, Parser, Subcommand};
use gc_core::config::{load_config, ConfigError, ResolvedConfig};
use gc_core::engine::{CutEngine, EngineError};
use gc_core::evaluate::{run_average_zenith, EvaluationDispatcher};
use gc_core::exit_codes::ExitCode;
use gc_core::features::EventFeatures;
use gc_core::log_event;
use gc_core::logging::{
    event_names, generate_run_id, init_logging, LogConfig, LogContext, LogLevel, Stage,
};
use gc_core::output::{envelope, write_json, write_jsonl, OutputFormat};
use gc_core::schema::{
    available_schemas, format_schema, generate_all_schemas, generate_schema, SchemaFormat,
};
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;

/// Gamma Cuts Core - energy- and zenith-binned gamma/hadron separation
#[derive(Parser)]
#[command(name = "gc-core")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Config file (JSON or TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "json")]
    format: OutputFormat,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Override the training artifact root directory
    #[arg(long, global = true)]
    artifacts: Option<PathBuf>,

    /// Override the rate table used for sensitivity optimization
    #[arg(long, global = true)]
    rates: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve every bin's threshold and print the bin records
    Resolve,

    /// Evaluate events (JSON lines) against the resolved catalog
    Evaluate(EvaluateArgs),

    /// Validate configuration, artifacts and rate table
    Check,

    /// Print JSON Schemas for inputs and outputs
    Schema(SchemaArgs),

    /// Print version information
    Version,
}

#[derive(Args, Debug)]
struct EvaluateArgs {
    /// Event file; reads stdin when omitted or "-"
    input: Option<PathBuf>,

    /// Route every event by the batch's mean zenith
    #[arg(long)]
    run_average_zenith: bool,
}

#[derive(Args, Debug)]
struct SchemaArgs {
    /// Type name to print
    name: Option<String>,

    /// List available types
    #[arg(long)]
    list: bool,

    /// Print every schema keyed by type name
    #[arg(long)]
    all: bool,

    /// Single-line JSON
    #[arg(long)]
    compact: bool,
}

fn main() {
    let cli = Cli::parse();

    // Without -v/-q the level comes from GC_LOG or RUST_LOG.
    let log_level = if cli.global.quiet {
        Some(LogLevel::Error)
    } else {
        match cli.global.verbose {
            0 => None,
            1 => Some(LogLevel::Debug),
            _ => Some(LogLevel::Trace),
        }
    };
    let log_config = LogConfig::for_run(log_level, cli.global.format.is_machine());
    init_logging(&log_config);

    let exit_code = match &cli.command {
        Commands::Resolve => run_resolve(&cli.global),
        Commands::Evaluate(args) => run_evaluate(&cli.global, args),
        Commands::Check => run_check(&cli.global),
        Commands::Schema(args) => run_schema(args),
        Commands::Version => {
            print_version(&cli.global);
            ExitCode::Clean
        }
    };

    std::process::exit(exit_code.as_i32());
}

// ============================================================================
// Shared setup
// ============================================================================

/// Load config, apply CLI overrides and tag the log context with its id.
fn setup(global: &GlobalOpts) -> Result<(ResolvedConfig, LogContext), ConfigError> {
    let ctx = LogContext::new(generate_run_id());
    let mut resolved = match load_config(global.config.as_deref()) {
        Ok(resolved) => resolved,
        Err(e) => {
            log_event!(
                ctx,
                ERROR,
                event_names::CONFIG_ERROR,
                Stage::Init,
                "failed to load config",
                error = %e
            );
            return Err(e);
        }
    };

    if let Some(root) = &global.artifacts {
        resolved.config.artifacts.root = Some(root.clone());
    }
    if let Some(rates) = &global.rates {
        resolved.config.artifacts.rate_model = Some(rates.clone());
    }

    let snapshot = resolved.snapshot();
    let ctx = ctx.with_config_id(snapshot.id());
    if resolved.is_default() {
        log_event!(
            ctx,
            INFO,
            event_names::CONFIG_DEFAULT_USED,
            Stage::Init,
            "no config file found; using built-in defaults"
        );
    } else {
        log_event!(
            ctx,
            INFO,
            event_names::CONFIG_LOADED,
            Stage::Init,
            "config loaded",
            source = %resolved.paths.source,
            path = ?resolved.paths.config
        );
    }
    Ok((resolved, ctx))
}

fn load_engine(global: &GlobalOpts) -> Result<(CutEngine, LogContext), ExitCode> {
    let (resolved, ctx) = setup(global).map_err(|e| EngineError::from(e).exit_code())?;
    log_event!(
        ctx,
        INFO,
        event_names::RUN_STARTED,
        Stage::Init,
        "loading catalog"
    );
    match CutEngine::load(resolved.config, &ctx) {
        Ok(engine) => Ok((engine, ctx)),
        Err(e) => {
            log_event!(
                ctx,
                ERROR,
                event_names::INTERNAL_ERROR,
                Stage::Load,
                "engine initialization failed",
                error = %e
            );
            Err(e.exit_code())
        }
    }
}

fn io_failure(ctx: &LogContext, e: &io::Error) -> ExitCode {
    if e.kind() == io::ErrorKind::BrokenPipe {
        return ExitCode::Clean;
    }
    log_event!(
        ctx,
        ERROR,
        event_names::INTERNAL_ERROR,
        Stage::Evaluate,
        "write failed",
        error = %e
    );
    ExitCode::IoError
}

// ============================================================================
// Command implementations
// ============================================================================

fn run_resolve(global: &GlobalOpts) -> ExitCode {
    let (engine, ctx) = match load_engine(global) {
        Ok(v) => v,
        Err(code) => return code,
    };
    let records = engine.records();
    let report = engine.report();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let written = match global.format {
        OutputFormat::Json => {
            let payload = serde_json::json!({
                "bins": records,
                "report": report,
            });
            write_json(
                &mut out,
                &envelope("resolve", &ctx.run_id, ctx.config_id.as_deref(), payload),
            )
        }
        OutputFormat::Jsonl => records.iter().try_for_each(|r| write_jsonl(&mut out, r)),
        OutputFormat::Summary => writeln!(
            out,
            "{} bins: {} explicit, {} optimized ({} optimum found), {} smoothed, {} borrowed, {} unresolved",
            report.bins,
            report.explicit,
            report.optimized,
            report.optimum_found,
            report.smoothing.smoothed.len(),
            report.smoothing.borrowed.len(),
            report.unresolved.len()
        ),
        OutputFormat::Exitcode => Ok(()),
    };
    if let Err(e) = written {
        return io_failure(&ctx, &e);
    }

    log_event!(
        ctx,
        INFO,
        event_names::RUN_FINISHED,
        Stage::Resolve,
        "resolve finished",
        unresolved = report.unresolved.len()
    );
    if report.unresolved.is_empty() {
        ExitCode::Clean
    } else {
        ExitCode::Unresolved
    }
}

fn run_evaluate(global: &GlobalOpts, args: &EvaluateArgs) -> ExitCode {
    let (engine, ctx) = match load_engine(global) {
        Ok(v) => v,
        Err(code) => return code,
    };

    let reader: Box<dyn BufRead> = match &args.input {
        Some(path) if path.as_os_str() != "-" => match std::fs::File::open(path) {
            Ok(file) => Box::new(BufReader::new(file)),
            Err(e) => {
                log_event!(
                    ctx,
                    ERROR,
                    event_names::INTERNAL_ERROR,
                    Stage::Evaluate,
                    "cannot open event file",
                    path = %path.display(),
                    error = %e
                );
                return ExitCode::IoError;
            }
        },
        _ => Box::new(BufReader::new(io::stdin())),
    };

    let mut dispatcher = engine.dispatcher();
    let batch = args.run_average_zenith || dispatcher.options().use_run_average_zenith;
    log_event!(
        ctx,
        INFO,
        event_names::EVALUATE_STARTED,
        Stage::Evaluate,
        "evaluating events",
        run_average_zenith = batch
    );

    let mut events = EventStream {
        lines: reader.lines(),
        line_no: 0,
        malformed: 0,
        ctx: &ctx,
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let result = if batch {
        let all: Result<Vec<EventFeatures>, io::Error> = events.by_ref().collect();
        match all {
            Ok(all) => {
                let mean = run_average_zenith(&all);
                let mut options = *dispatcher.options();
                options.use_run_average_zenith = true;
                dispatcher = EvaluationDispatcher::new(engine.catalog().clone(), options);
                dispatcher.set_run_average_zenith(mean);
                emit_verdicts(&mut dispatcher, all.into_iter().map(Ok), global, &ctx, &mut out)
            }
            Err(e) => Err(e),
        }
    } else {
        emit_verdicts(&mut dispatcher, events.by_ref(), global, &ctx, &mut out)
    };
    if let Err(e) = result {
        return io_failure(&ctx, &e);
    }

    let stats = dispatcher.stats();
    log_event!(
        ctx,
        INFO,
        event_names::EVALUATE_FINISHED,
        Stage::Evaluate,
        "evaluation finished",
        evaluated = stats.evaluated,
        accepted = stats.accepted,
        rejected = stats.rejected(),
        malformed = events.malformed
    );
    if global.format == OutputFormat::Summary {
        let line = writeln!(
            out,
            "{} events: {} accepted, {} rejected ({} outside catalog, {} unresolved bin, {} score failed), {} malformed",
            stats.evaluated,
            stats.accepted,
            stats.rejected(),
            stats.no_matching_bin + stats.non_positive_energy,
            stats.unresolved_threshold,
            stats.score_failed,
            events.malformed
        );
        if let Err(e) = line {
            return io_failure(&ctx, &e);
        }
    }
    ExitCode::Clean
}

fn emit_verdicts<W: Write>(
    dispatcher: &mut EvaluationDispatcher,
    events: impl Iterator<Item = Result<EventFeatures, io::Error>>,
    global: &GlobalOpts,
    ctx: &LogContext,
    out: &mut W,
) -> io::Result<()> {
    let mut collected = Vec::new();
    for event in events {
        let verdict = dispatcher.evaluate(&event?);
        match global.format {
            OutputFormat::Jsonl => write_jsonl(out, &verdict)?,
            OutputFormat::Json => collected.push(verdict),
            OutputFormat::Summary | OutputFormat::Exitcode => {}
        }
    }
    if global.format == OutputFormat::Json {
        let payload = serde_json::json!({
            "verdicts": collected,
            "stats": dispatcher.stats(),
        });
        write_json(
            out,
            &envelope("evaluate", &ctx.run_id, ctx.config_id.as_deref(), payload),
        )?;
    }
    Ok(())
}

/// Parsed events from JSON lines; malformed lines are logged and skipped.
struct EventStream<'a, R> {
    lines: io::Lines<R>,
    line_no: usize,
    malformed: usize,
    ctx: &'a LogContext,
}

impl<R: BufRead> Iterator for EventStream<'_, R> {
    type Item = Result<EventFeatures, io::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e)),
            };
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<EventFeatures>(&line) {
                Ok(event) => return Some(Ok(event)),
                Err(e) => {
                    self.malformed += 1;
                    log_event!(
                        self.ctx,
                        WARN,
                        event_names::EVENT_MALFORMED,
                        Stage::Evaluate,
                        "skipping malformed event",
                        line = self.line_no,
                        error = %e
                    );
                }
            }
        }
    }
}

fn run_check(global: &GlobalOpts) -> ExitCode {
    let mut results: Vec<serde_json::Value> = Vec::new();

    let (resolved, ctx) = match setup(global) {
        Ok(v) => v,
        Err(e) => {
            results.push(serde_json::json!({
                "check": "config",
                "status": "error",
                "error": e.to_string(),
            }));
            let code = EngineError::from(e).exit_code();
            if let Err(e) = print_check(global, &results, false) {
                return io_failure(&LogContext::new(generate_run_id()), &e);
            }
            return code;
        }
    };
    results.push(serde_json::json!({
        "check": "config",
        "status": "ok",
        "source": resolved.paths.source.to_string(),
        "config_id": ctx.config_id,
        "snapshot": resolved.snapshot(),
    }));

    let (code, all_ok) = match CutEngine::load(resolved.config, &ctx) {
        Ok(engine) => {
            let report = engine.report();
            results.push(serde_json::json!({
                "check": "catalog",
                "status": "ok",
                "bins": report.bins,
                "skipped": report.skipped,
                "content_hash": report.catalog_hash,
            }));
            let ok = report.unresolved.is_empty();
            results.push(serde_json::json!({
                "check": "resolution",
                "status": if ok { "ok" } else { "warning" },
                "unresolved": report.unresolved,
                "capped": report.capped,
            }));
            (
                if ok {
                    ExitCode::Clean
                } else {
                    ExitCode::Unresolved
                },
                ok,
            )
        }
        Err(e) => {
            results.push(serde_json::json!({
                "check": "catalog",
                "status": "error",
                "error": e.to_string(),
            }));
            (e.exit_code(), false)
        }
    };

    if let Err(e) = print_check(global, &results, all_ok) {
        return io_failure(&ctx, &e);
    }
    code
}

fn print_check(
    global: &GlobalOpts,
    results: &[serde_json::Value],
    all_ok: bool,
) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match global.format {
        OutputFormat::Json | OutputFormat::Jsonl => write_json(
            &mut out,
            &serde_json::json!({
                "status": if all_ok { "ok" } else { "error" },
                "checks": results,
            }),
        ),
        OutputFormat::Summary => writeln!(
            out,
            "check: {}",
            if all_ok { "ok" } else { "problems found" }
        ),
        OutputFormat::Exitcode => Ok(()),
    }
}

fn run_schema(args: &SchemaArgs) -> ExitCode {
    let format = if args.compact {
        SchemaFormat::JsonCompact
    } else {
        SchemaFormat::Json
    };

    if args.list {
        for (name, description) in available_schemas() {
            println!("{:<20} {}", name, description);
        }
        return ExitCode::Clean;
    }

    if args.all {
        let all = serde_json::to_value(generate_all_schemas()).unwrap_or_default();
        println!("{}", format_schema(&all, format));
        return ExitCode::Clean;
    }

    match args.name.as_deref().map(|name| (name, generate_schema(name))) {
        Some((_, Some(schema))) => {
            println!("{}", format_schema(&schema, format));
            ExitCode::Clean
        }
        Some((name, None)) => {
            eprintln!("gc-core schema: unknown type '{}' (see --list)", name);
            ExitCode::ArgsError
        }
        None => {
            eprintln!("gc-core schema: pass a type name, --list or --all");
            ExitCode::ArgsError
        }
    }
}

fn print_version(global: &GlobalOpts) {
    let version_info = serde_json::json!({
        "gc_core_version": env!("CARGO_PKG_VERSION"),
        "config_schema_version": gc_core::config::CONFIG_SCHEMA_VERSION,
        "output_schema_version": gc_core::output::OUTPUT_SCHEMA_VERSION,
        "rust_version": env!("CARGO_PKG_RUST_VERSION"),
    });

    match global.format {
        OutputFormat::Json | OutputFormat::Jsonl => {
            println!(
                "{}",
                serde_json::to_string_pretty(&version_info).unwrap_or_default()
            );
        }
        OutputFormat::Exitcode => {}
        OutputFormat::Summary => {
            println!("gc-core {}", env!("CARGO_PKG_VERSION"));
        }
    }
}
