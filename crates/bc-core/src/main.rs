//! boxcaps - set-top-box capability registry diagnostics.

use std::path::PathBuf;

use bc_common::{Error, Value};
use bc_config::{load_model_families, resolve_paths, CliPaths, PlatformPaths};
use bc_core::boxinfo::BoxInfo;
use bc_core::derive::DerivationPlan;
use bc_core::exit_codes::ExitCode;
use bc_core::logging::{init_logging, LogConfig, LogFormat, LogLevel};
use bc_core::{build_platform, Collaborators};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing::debug;

/// Inspect the boot information and derived hardware capabilities of a set-top box
#[derive(Parser)]
#[command(name = "boxcaps")]
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
    /// Directory device paths are resolved under (default: /)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Boot-information file, as a device path under --root
    #[arg(long, global = true)]
    boxinfo: Option<PathBuf>,

    /// Kernel command-line file, as a device path under --root
    #[arg(long, global = true)]
    cmdline: Option<PathBuf>,

    /// Model-family override file (JSON)
    #[arg(long, global = true)]
    models: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    /// Log format on stderr (human, jsonl)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Output format
    #[arg(long, short = 'f', global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive and print every capability
    Registry {
        /// Include per-step timing and written keys
        #[arg(long)]
        trace: bool,
    },
    /// Print one value: boot information first, then derived capabilities
    Get {
        /// Key to look up
        key: String,
    },
    /// List boot-information entries
    Boxinfo {
        /// Include runtime overlay entries
        #[arg(long)]
        all: bool,
    },
    /// Print the ordered derivation steps with their reads and writes
    Plan,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // --help and --version are not errors
            let code = if e.use_stderr() {
                ExitCode::ArgsError
            } else {
                ExitCode::Ok
            };
            std::process::exit(code.as_i32());
        }
    };

    let log_config = LogConfig::from_env(cli.global.log_level, cli.global.log_format);
    init_logging(&log_config);

    let exit_code = match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            let code = ExitCode::for_error(&err);
            match cli.global.format {
                OutputFormat::Json => println!(
                    "{}",
                    json!({
                        "error": err.to_string(),
                        "code": err.code(),
                        "category": err.category(),
                        "exit_code": code.code_name(),
                    })
                ),
                OutputFormat::Text => eprintln!("boxcaps: {}", err),
            }
            code
        }
    };

    std::process::exit(exit_code.as_i32());
}

fn run(cli: &Cli) -> Result<ExitCode, Error> {
    let paths = resolve_paths(&CliPaths {
        root: cli.global.root.clone(),
        boxinfo: cli.global.boxinfo.clone(),
        cmdline: cli.global.cmdline.clone(),
        models: cli.global.models.clone(),
    });
    debug!(
        root = %paths.root.display(),
        root_source = %paths.root_source,
        boxinfo = %paths.boxinfo.display(),
        models_source = %paths.models_source,
        "resolved paths"
    );

    match &cli.command {
        Commands::Registry { trace } => run_registry(&paths, cli.global.format, *trace),
        Commands::Get { key } => run_get(&paths, cli.global.format, key),
        Commands::Boxinfo { all } => run_boxinfo(&paths, cli.global.format, *all),
        Commands::Plan => run_plan(cli.global.format),
    }
}

fn load_families(paths: &PlatformPaths) -> Result<bc_config::ModelFamilies, Error> {
    load_model_families(paths).map_err(|e| Error::ModelTable(e.to_string()))
}

fn run_registry(paths: &PlatformPaths, format: OutputFormat, with_trace: bool) -> Result<ExitCode, Error> {
    let families = load_families(paths)?;
    let (platform, trace) = build_platform(paths, &families, &Collaborators::default())?;

    match format {
        OutputFormat::Json => {
            let payload = if with_trace {
                json!({
                    "model": platform.model(),
                    "capabilities": platform.capabilities,
                    "trace": trace,
                })
            } else {
                platform.capabilities.to_json()
            };
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        OutputFormat::Text => {
            for (key, value) in platform.capabilities.iter() {
                println!("{} = {}", key, value);
            }
            if with_trace {
                for step in &trace.steps {
                    println!("# {} {}us {}", step.name, step.elapsed_us, step.writes.join(","));
                }
                println!("# total {}us", trace.total_us);
            }
        }
    }
    Ok(ExitCode::Ok)
}

fn run_get(paths: &PlatformPaths, format: OutputFormat, key: &str) -> Result<ExitCode, Error> {
    let families = load_families(paths)?;
    let (platform, _) = build_platform(paths, &families, &Collaborators::default())?;

    let source = match platform.boxinfo.source_of(key) {
        Some(source) => source.to_string(),
        None if platform.capabilities.contains(key) => "capability".to_string(),
        None => return Err(Error::NotFound(key.to_string())),
    };
    let value = platform.get_item(key, Value::None);

    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "key": key,
                "value": value,
                "source": source,
            }))?
        ),
        OutputFormat::Text => println!("{}", value),
    }
    Ok(ExitCode::Ok)
}

fn run_boxinfo(paths: &PlatformPaths, format: OutputFormat, all: bool) -> Result<ExitCode, Error> {
    let store = BoxInfo::load(&paths.on_device(&paths.boxinfo));
    let entries: Vec<_> = store
        .entries()
        .into_iter()
        .filter(|entry| all || entry.source == bc_core::Source::Frozen)
        .collect();

    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "path": paths.boxinfo,
                "checksum": store.checksum(),
                "entries": entries,
            }))?
        ),
        OutputFormat::Text => {
            for entry in &entries {
                println!("{} = {}  [{}]", entry.key, entry.value, entry.source);
            }
        }
    }
    Ok(ExitCode::Ok)
}

fn run_plan(format: OutputFormat) -> Result<ExitCode, Error> {
    let plan = DerivationPlan::standard()?;
    let steps = plan.describe();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&steps)?),
        OutputFormat::Text => {
            for (index, step) in steps.iter().enumerate() {
                if step.reads.is_empty() {
                    println!("{:3} {} -> {}", index, step.name, step.writes.join(", "));
                } else {
                    println!(
                        "{:3} {} [{}] -> {}",
                        index,
                        step.name,
                        step.reads.join(", "),
                        step.writes.join(", ")
                    );
                }
            }
        }
    }
    Ok(ExitCode::Ok)
}
