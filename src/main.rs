use anyhow::{bail, Context};
use average::Estimate;
use clap::{Parser, Subcommand};
use crossbeam_channel::{bounded, select, Receiver};
use log::{info, warn};
use nix::sys::signal::{SigSet, Signal};
use rand::prelude::*;
use sigsched::{
    config::{SchedConfig, SlicePolicyKind},
    policy::{FlatSlice, SlicePolicy, WeightedSlice},
    process::UnixProcessControl,
    report::{HistoryReport, StatsTable},
    stats, Job, Priority, Scheduler,
};
use std::{path::PathBuf, thread, time::Duration};

#[derive(Parser)]
#[command(name = "sigsched", version, about = "Priority time-slice scheduler for processes")]
struct Cli {
    /// TOML file with scheduler settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of jobs allowed to run at once
    #[arg(long)]
    ncpu: Option<usize>,

    /// Base time slice in milliseconds
    #[arg(long = "quantum-ms")]
    quantum_ms: Option<u64>,

    #[arg(long, value_enum)]
    policy: Option<SlicePolicyKind>,

    /// Print every lifecycle event after the run
    #[arg(long)]
    events: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit the given jobs and schedule them to completion
    Run {
        /// Job as "[priority:]command args...", priority defaults to 1
        #[arg(short, long = "job", required = true, value_parser = parse_job)]
        jobs: Vec<JobSpec>,

        /// Drain through the background daemon instead of the foreground
        #[arg(long)]
        daemon: bool,
    },
    /// Schedule a seeded random workload of sleep jobs
    Bench {
        #[arg(long, default_value_t = 20)]
        jobs: usize,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Probability that a job is short
        #[arg(long, default_value_t = 0.3)]
        p_short: f64,
        #[arg(long, default_value_t = 20)]
        short_ms: u64,
        #[arg(long, default_value_t = 60)]
        long_ms: u64,
    },
}

#[derive(Debug, Clone)]
struct JobSpec {
    priority: Priority,
    command: String,
    args: Vec<String>,
}

fn parse_job(s: &str) -> Result<JobSpec, String> {
    let numeric = |level: &str| {
        let level = level.trim();
        !level.is_empty() && level.chars().all(|c| c.is_ascii_digit() || c == '-')
    };
    let (priority, line) = match s.split_once(':') {
        Some((level, rest)) if numeric(level) => {
            (level.parse::<Priority>().map_err(|e| e.to_string())?, rest)
        }
        _ => (Priority::default(), s),
    };
    let mut words = line.split_whitespace().map(str::to_string);
    let command = words.next().ok_or_else(|| format!("no command in {s:?}"))?;
    Ok(JobSpec {
        priority,
        command,
        args: words.collect(),
    })
}

fn bernoulli_jobs(n: usize, p_short: f64, short_ms: u64, long_ms: u64, seed: u64) -> Vec<JobSpec> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let run_ms = if rng.random::<f64>() < p_short {
                short_ms
            } else {
                long_ms
            };
            let level: i64 = rng.random_range(1..=4);
            JobSpec {
                priority: Priority::new(level).expect("generated level is in range"),
                command: "sleep".to_string(),
                args: vec![format!("{:.3}", run_ms as f64 / 1000.0)],
            }
        })
        .collect()
}

/// SIGINT/SIGTERM are blocked in every thread and collected by one
/// listener; children get a clean mask back before exec.
fn watch_signals() -> anyhow::Result<Receiver<Signal>> {
    let mut mask = SigSet::empty();
    mask.add(Signal::SIGINT);
    mask.add(Signal::SIGTERM);
    mask.thread_block().context("failed to block termination signals")?;

    let (tx, rx) = bounded(1);
    thread::Builder::new()
        .name("sigsched-signals".to_string())
        .spawn(move || {
            if let Ok(sig) = mask.wait() {
                let _ = tx.send(sig);
            }
        })
        .context("failed to start signal listener")?;
    Ok(rx)
}

fn load_config(cli: &Cli) -> anyhow::Result<SchedConfig> {
    let mut config = match &cli.config {
        Some(path) => SchedConfig::load(path)?,
        None => SchedConfig::default(),
    };
    if let Some(ncpu) = cli.ncpu {
        config.ncpu = ncpu;
    }
    if let Some(quantum_ms) = cli.quantum_ms {
        config.base_quantum_ms = quantum_ms;
    }
    if let Some(policy) = cli.policy {
        config.slice_policy = policy;
    }
    Ok(config.validate()?)
}

struct Outcome {
    history: Vec<Job>,
    interrupted: Option<Signal>,
}

fn schedule<S: SlicePolicy + 'static>(
    config: SchedConfig,
    jobs: &[JobSpec],
    use_daemon: bool,
    print_events: bool,
    signals: &Receiver<Signal>,
) -> anyhow::Result<Outcome> {
    let scheduler = Scheduler::<UnixProcessControl, S>::new(config)
        .context("failed to build scheduler")?;

    for spec in jobs {
        scheduler
            .submit(&spec.command, &spec.args, spec.priority)
            .with_context(|| format!("failed to submit {:?}", spec.command))?;
    }

    let (done_tx, done_rx) = bounded::<()>(1);
    let daemon = if use_daemon {
        let daemon = scheduler.spawn_daemon().context("failed to start daemon")?;
        let watcher = scheduler.clone();
        thread::spawn(move || {
            while !watcher.is_idle() {
                thread::sleep(Duration::from_millis(20));
            }
            let _ = done_tx.send(());
        });
        Some(daemon)
    } else {
        let worker = scheduler.clone();
        thread::spawn(move || {
            let summary = worker.run_scheduler();
            info!("foreground drain finished: {summary:?}");
            let _ = done_tx.send(());
        });
        None
    };

    let interrupted = select! {
        recv(done_rx) -> _ => None,
        recv(signals) -> sig => sig.ok(),
    };
    if let Some(sig) = interrupted {
        warn!("received {sig}, shutting down");
    }

    let history = scheduler.shutdown();
    if let Some(daemon) = daemon {
        daemon.stop();
    }

    if print_events {
        for event in scheduler.take_events() {
            println!("{} {:?}", event.at().wall.format("%H:%M:%S%.6f"), event);
        }
    }
    Ok(Outcome {
        history,
        interrupted,
    })
}

fn avg(iter: impl Iterator<Item = f64>) -> f64 {
    iter.collect::<average::Mean>().estimate()
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = load_config(&cli).context("invalid configuration")?;
    let signals = watch_signals()?;

    let (jobs, use_daemon) = match &cli.command {
        Command::Run { jobs, daemon } => (jobs.clone(), *daemon),
        Command::Bench {
            jobs,
            seed,
            p_short,
            short_ms,
            long_ms,
        } => {
            if !(0.0..=1.0).contains(p_short) {
                bail!("--p-short must be within 0..=1");
            }
            (bernoulli_jobs(*jobs, *p_short, *short_ms, *long_ms, *seed), true)
        }
    };

    let outcome = match config.slice_policy {
        SlicePolicyKind::Weighted => {
            schedule::<WeightedSlice>(config, &jobs, use_daemon, cli.events, &signals)?
        }
        SlicePolicyKind::Flat => {
            schedule::<FlatSlice>(config, &jobs, use_daemon, cli.events, &signals)?
        }
    };

    print!("{}", HistoryReport(&outcome.history));
    print!("{}", StatsTable(&stats::aggregate(&outcome.history)));

    if let Command::Bench { .. } = cli.command {
        println!(
            "Average waiting time: {:.2} ms",
            avg(outcome.history.iter().map(|j| j.waiting_time_ms))
        );
        println!(
            "Average turnaround time: {:.2} ms",
            avg(outcome.history.iter().filter_map(|j| {
                j.end_time.map(|end| end.ms_since(&j.submit_time))
            }))
        );
    }

    if let Some(sig) = outcome.interrupted {
        bail!("interrupted by {sig}");
    }
    Ok(())
}
