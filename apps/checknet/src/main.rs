mod config;

use anyhow::{bail, Context, Result};
use checknet_dashboard::{run_bounded, run_dashboard, AggregatedView, RenderOptions};
use checknet_model::{label_width, Event, ProbeBudget, Target};
use checknet_probe::{ProbeSettings, ProbeTask, SystemPinger, SystemResolver};
use checknet_trace::{SystemTracer, TraceSettings, TraceTask};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use config::{load_targets, parse_interval};
use crossterm::tty::IsTty;
use std::io;
use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Checks that the nodes between this host and the internet are up.
#[derive(Parser)]
#[command(name = "checknet", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Ping(PingArgs),
    Server(ServerArgs),
}

#[derive(Args)]
#[command(about = "Probe every target a fixed number of times and print each result")]
struct PingArgs {
    /// Replies to collect from every target
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    count: u32,

    /// Interval between probes
    #[arg(short, long, default_value = "5s", value_parser = parse_interval)]
    interval: Duration,

    /// Deadline for each probe cycle [default: interval]
    #[arg(short, long, value_parser = parse_interval)]
    timeout: Option<Duration>,

    /// JSON file with the targets to probe
    #[arg(short, long)]
    json: Option<PathBuf>,
}

#[derive(Args)]
#[command(about = "Keep probing and redraw a live status view until interrupted")]
struct ServerArgs {
    /// Replies to collect from every target [default: unlimited]
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
    count: Option<u32>,

    /// Interval between probes
    #[arg(short, long, default_value = "5s", value_parser = parse_interval)]
    interval: Duration,

    /// Deadline for each probe cycle [default: interval]
    #[arg(short, long, value_parser = parse_interval)]
    timeout: Option<Duration>,

    /// JSON file with the targets to probe
    #[arg(short, long)]
    json: Option<PathBuf>,

    /// Hop ceiling for the reference path trace
    #[arg(short, long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..=64))]
    max_hops: u32,

    /// Host the path trace runs against
    #[arg(long, default_value = "1.1.1.1")]
    trace_host: String,

    /// Skip the reference path trace
    #[arg(long)]
    no_trace: bool,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    match cli.command {
        Commands::Ping(args) => run_ping(args),
        Commands::Server(args) => run_server(args),
    }
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn run_ping(args: PingArgs) -> Result<()> {
    let targets = load_targets(args.json.as_deref())?;
    let timeout = args.timeout.unwrap_or(args.interval);

    println!(
        "\n-- Pinging {} hosts ({} times every {}; timeout: {}) --\n",
        targets.len(),
        args.count,
        humantime::format_duration(args.interval),
        humantime::format_duration(timeout)
    );

    let (tx, rx) = mpsc::channel();
    install_cancel_handler(tx.clone())?;
    spawn_probes(
        &targets,
        ProbeSettings {
            budget: ProbeBudget::Bounded(args.count),
            interval: args.interval,
            timeout: Some(timeout),
        },
        &tx,
    );

    let opts = RenderOptions {
        label_width: label_width(&targets),
        interval: args.interval,
        max_hops: 0,
        color: io::stdout().is_tty(),
    };
    let expected = targets.len() * args.count as usize;
    let outcome = run_bounded(&rx, expected, &opts, &mut io::stdout().lock())?;
    info!(?outcome, "ping finished");
    Ok(())
}

fn run_server(args: ServerArgs) -> Result<()> {
    let targets = load_targets(args.json.as_deref())?;
    if targets.is_empty() {
        bail!("no targets found in target list");
    }

    info!(targets = targets.len(), "starting server");
    let started_at = Local::now();
    let timeout = args.timeout.unwrap_or(args.interval);

    let (tx, rx) = mpsc::channel();
    install_cancel_handler(tx.clone())?;
    spawn_probes(
        &targets,
        ProbeSettings {
            budget: ProbeBudget::from_count(args.count),
            interval: args.interval,
            timeout: Some(timeout),
        },
        &tx,
    );

    if !args.no_trace {
        let tracer = SystemTracer::new(TraceSettings {
            probes: 1,
            timeout,
        });
        TraceTask::new(
            args.trace_host,
            args.max_hops,
            args.interval,
            Arc::new(tracer),
            tx.clone(),
        )
        .spawn();
    }

    let mut view = AggregatedView::new(&targets, started_at);
    let opts = RenderOptions {
        label_width: label_width(&targets),
        interval: args.interval,
        max_hops: args.max_hops as usize,
        color: io::stdout().is_tty(),
    };
    let outcome = run_dashboard(&rx, &mut view, &opts, &mut io::stdout().lock())?;
    info!(?outcome, "server stopped");
    Ok(())
}

/// Starts one detached probe task per target. Tasks are not joined; they end
/// with their budget, when the receiver is dropped, or with the process.
fn spawn_probes(targets: &[Target], settings: ProbeSettings, events: &Sender<Event>) {
    let resolver = Arc::new(SystemResolver);
    let prober = Arc::new(SystemPinger::default());

    for target in targets {
        ProbeTask::new(
            target.clone(),
            settings.clone(),
            resolver.clone(),
            prober.clone(),
            events.clone(),
        )
        .spawn();
    }
}

fn install_cancel_handler(events: Sender<Event>) -> Result<()> {
    ctrlc::set_handler(move || {
        let _ = events.send(Event::Cancelled);
    })
    .context("failed to install signal handler")
}
