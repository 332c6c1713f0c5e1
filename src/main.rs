use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hub_utils::probe::{self, Probe, ProbeReport, ProbeResult};
use hub_utils::{batchify, compute_lcm, norm_cache, norm_shape, Settings, Timer};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser)]
#[command(name = "hub-utils", version)]
#[command(about = "Capability probes and input normalization for the hub data library", long_about = None)]
struct Cli {
    /// Configuration file (JSON, YAML or TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Report how long the command took on stderr
    #[arg(long, global = true)]
    timing: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check which storage backends and runtimes are usable
    Probe {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Only run the named probes
        #[arg(long, value_delimiter = ',')]
        only: Vec<String>,
    },

    /// Least common multiple of the given integers
    Lcm {
        /// Positive integers
        #[arg(required = true)]
        values: Vec<u64>,
    },

    /// Split items into batches, one batch per line
    Batch {
        /// Batch size (defaults to batch.default_size)
        #[arg(short, long)]
        size: Option<usize>,

        /// Items to split
        items: Vec<String>,
    },

    /// Normalize a shape given as JSON, e.g. '[3, null, 7]'
    Shape {
        /// JSON value
        value: String,
    },

    /// Normalize a cache size given as JSON, e.g. 'null' or '64'
    Cache {
        /// JSON value
        value: String,
    },

    /// Print the effective configuration
    Config,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Probe { .. } => "probe",
            Commands::Lcm { .. } => "lcm",
            Commands::Batch { .. } => "batch",
            Commands::Shape { .. } => "shape",
            Commands::Cache { .. } => "cache",
            Commands::Config => "config",
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet, cli.json_logs);

    let settings = Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;
    debug!(?settings, "Configuration loaded");

    let _timer = cli
        .timing
        .then(|| Timer::with_output(format!("hub-utils {}", cli.command.name()), io::stderr()));

    match cli.command {
        Commands::Probe { json, only } => run_probes(&settings, &only, json),
        Commands::Lcm { values } => {
            match compute_lcm(&values)? {
                Some(lcm) => println!("{lcm}"),
                None => println!("none"),
            }
            Ok(())
        }
        Commands::Batch { size, items } => {
            let size = size.unwrap_or(settings.batch.default_size);
            for batch in batchify(&items, size)? {
                println!("{}", batch.join(" "));
            }
            Ok(())
        }
        Commands::Shape { value } => {
            let shape = norm_shape(&parse_json(&value)?)?;
            println!("{shape}");
            Ok(())
        }
        Commands::Cache { value } => {
            println!("{}", norm_cache(&parse_json(&value)?)?);
            Ok(())
        }
        Commands::Config => {
            print!("{}", serde_yaml::to_string(&settings)?);
            Ok(())
        }
    }
}

fn parse_json(raw: &str) -> Result<serde_json::Value> {
    serde_json::from_str(raw).with_context(|| format!("'{raw}' is not valid JSON"))
}

fn run_probes(settings: &Settings, only: &[String], json: bool) -> Result<()> {
    let probes: Vec<Arc<dyn Probe>> = probe::default_probes(&settings.probes)
        .into_iter()
        .filter(|p| only.is_empty() || only.iter().any(|o| o.eq_ignore_ascii_case(p.name())))
        .map(Arc::from)
        .collect();

    if probes.is_empty() {
        warn!("No probes selected");
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let results = runtime.block_on(collect_with_timeout(probes, settings.probes.timeout()));
    // probes stuck past their timeout are abandoned, not awaited
    runtime.shutdown_background();

    let report = ProbeReport::from_results(results);
    info!(
        "{} of {} backends available",
        report.available().count(),
        report.results.len()
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for result in &report.results {
            let kind = match result.kind {
                probe::ProbeKind::Storage => "storage",
                probe::ProbeKind::Runtime => "runtime",
            };
            let status = if result.available { "yes" } else { "no" };
            println!("{:<14} {:<8} {}", result.name, kind, status);
        }
    }

    Ok(())
}

async fn collect_with_timeout(
    probes: Vec<Arc<dyn Probe>>,
    timeout: std::time::Duration,
) -> Vec<ProbeResult> {
    let handles: Vec<_> = probes
        .into_iter()
        .map(|probe| {
            let task_probe = probe.clone();
            (probe, tokio::task::spawn_blocking(move || task_probe.is_available()))
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for (probe, handle) in handles {
        let available = match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(available)) => available,
            Ok(Err(err)) => {
                warn!("Probe {} failed to run: {}", probe.name(), err);
                false
            }
            Err(_) => {
                warn!("Probe {} timed out after {:?}", probe.name(), timeout);
                false
            }
        };

        results.push(ProbeResult {
            name: probe.name().to_string(),
            kind: probe.kind(),
            available,
        });
    }

    results
}

fn init_logging(verbosity: u8, quiet: bool, json_output: bool) {
    let default_level = if quiet {
        "error"
    } else {
        match verbosity {
            0 => "hub_utils=warn",
            1 => "hub_utils=info,warn",
            2 => "hub_utils=debug,info",
            _ => "trace",
        }
    };

    let env_filter = if quiet {
        EnvFilter::new(default_level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };

    if json_output {
        let json_layer = fmt::layer()
            .json()
            .with_writer(io::stderr)
            .with_current_span(true)
            .with_filter(env_filter);

        tracing_subscriber::registry().with(json_layer).init();
    } else {
        let fmt_layer = fmt::layer()
            .with_target(false)
            .with_writer(io::stderr)
            .with_filter(env_filter);

        tracing_subscriber::registry().with(fmt_layer).init();
    }
}
