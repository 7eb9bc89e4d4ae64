use clap::{Parser, Subcommand};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use keepalive::config::{ConfigLoader, KeepAliveConfig};
use keepalive::logging::{self, LogFile};
use keepalive::metrics::snapshot::MetricsSnapshot;
use keepalive::output::ReportSink;
use keepalive::probe::{HttpExecutor, ProbeSequencer};
use keepalive::runner::{RunOrchestrator, RunResult, finish_run};
use keepalive::stats::{PersistedStats, StatsStore};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;

const DEFAULT_STATS_FILE: &str = "logs/stats.json";

#[derive(Parser)]
#[command(name = "keepalive")]
#[command(version = "0.1.0")]
#[command(about = "Keeps hosted sites awake by probing them on a schedule", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe every configured site once
    Run {
        /// Path to the configuration file (JSON/YAML/TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Stats file, overrides `statsFile` from the config
        #[arg(long)]
        stats: Option<PathBuf>,

        /// Do not merge this run into the stats file
        #[arg(long)]
        no_stats: bool,

        /// Show a progress bar (stderr)
        #[arg(short, long)]
        progress: bool,
    },
    /// Probe every configured site every `checkInterval` minutes until Ctrl-C
    Watch {
        /// Path to the configuration file (JSON/YAML/TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Stats file, overrides `statsFile` from the config
        #[arg(long)]
        stats: Option<PathBuf>,
    },
    /// Validate a configuration file
    Check {
        /// Path to the configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show historical stats
    Stats {
        /// Read the stats location from this configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Stats file to read
        #[arg(long)]
        stats: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let multi = matches!(cli.command, Commands::Run { progress: true, .. })
        .then(|| Arc::new(MultiProgress::new()));
    let log_file = LogFile::default();
    logging::init(logging::build_logger(log_file.clone()), multi.as_deref().cloned())?;

    match cli.command {
        Commands::Run {
            config,
            stats,
            no_stats,
            progress: _,
        } => {
            let config_data = ConfigLoader::load(&config)?;
            log_file.attach(Path::new(&config_data.log_dir))?;
            log_startup(&config, &config_data);

            let store = (!no_stats).then(|| StatsStore::new(stats_path(stats, &config_data)));
            let orchestrator = build_orchestrator(&config_data)?;
            let mut sink = ConfigLoader::create_sink(&config_data, multi.clone())?;

            let mut progress_bar: Option<ProgressBar> = None;
            let mut _progress_task = None;
            if let Some(multi) = &multi {
                let pb = multi.add(ProgressBar::new(0));
                pb.set_style(ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                    .progress_chars("#>-"));

                let mut metrics_rx = orchestrator.watch_metrics();
                let pb_clone = pb.clone();
                progress_bar = Some(pb);
                _progress_task = Some(tokio::spawn(async move {
                    while metrics_rx.changed().await.is_ok() {
                        let snapshot: MetricsSnapshot = metrics_rx.borrow().clone();
                        pb_clone.set_length(snapshot.probes_planned);
                        pb_clone.set_position(snapshot.probes_completed);
                        pb_clone.set_message(format!(
                            "Sites: {} | Success: {:.1}% | Avg: {}ms",
                            snapshot.sites_completed,
                            snapshot.success_rate,
                            snapshot.avg_response_time_ms
                        ));
                    }
                }));
            }

            let run = run_once(&orchestrator, &config_data, store.as_ref(), sink.as_mut()).await?;

            if let Some(task) = _progress_task {
                task.abort();
            }
            if let Some(pb) = progress_bar {
                let final_metrics = orchestrator.get_metrics();
                pb.set_position(final_metrics.probes_completed);
                pb.finish_with_message(format!(
                    "Success: {:.1}% - Completed",
                    final_metrics.success_rate
                ));
            }

            print_run(&run);
            Ok(exit_code(&run))
        }
        Commands::Watch { config, stats } => {
            let config_data = ConfigLoader::load(&config)?;
            log_file.attach(Path::new(&config_data.log_dir))?;
            log_startup(&config, &config_data);

            let store = StatsStore::new(stats_path(stats, &config_data));
            let orchestrator = build_orchestrator(&config_data)?;
            let mut sink = ConfigLoader::create_sink(&config_data, None)?;
            let mut interval = tokio::time::interval(config_data.global.check_interval());
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        log::info!("Shutting down...");
                        break;
                    }
                    _ = interval.tick() => {
                        let run = run_once(&orchestrator, &config_data, Some(&store), sink.as_mut()).await?;
                        log::info!(
                            "Next run in {} minute(s){}",
                            config_data.global.check_interval,
                            if run.all_succeeded() { "" } else { ", last run had failures" }
                        );
                    }
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check { config } => match ConfigLoader::load(&config) {
            Ok(cfg) => {
                println!("✅ Config is valid:");
                println!("   Sites: {}", cfg.websites.len());
                for site in &cfg.websites {
                    let settings = site.settings(&cfg.global);
                    println!(
                        "   - {} ({}) timeout {}ms, {} retries",
                        site.label(),
                        site.url,
                        settings.timeout.as_millis(),
                        settings.max_retries
                    );
                }
                println!("   Check interval: {} minute(s)", cfg.global.check_interval);
                println!("   Stats file: {}", cfg.stats_file);
                Ok(ExitCode::SUCCESS)
            }
            Err(e) => {
                eprintln!("❌ Config error: {}", e);
                Ok(ExitCode::FAILURE)
            }
        },
        Commands::Stats { config, stats } => {
            let path = match (stats, config) {
                (Some(path), _) => path,
                (None, Some(config)) => PathBuf::from(ConfigLoader::load(&config)?.stats_file),
                (None, None) => PathBuf::from(DEFAULT_STATS_FILE),
            };
            let store = StatsStore::new(path);
            print_stats(store.path(), &store.load());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build_orchestrator(config: &KeepAliveConfig) -> anyhow::Result<RunOrchestrator> {
    let executor = Arc::new(HttpExecutor::new()?);
    let sequencer = ProbeSequencer::new(executor, config.global.clone());
    Ok(RunOrchestrator::new(sequencer, None))
}

fn stats_path(flag: Option<PathBuf>, config: &KeepAliveConfig) -> PathBuf {
    flag.unwrap_or_else(|| PathBuf::from(&config.stats_file))
}

async fn run_once(
    orchestrator: &RunOrchestrator,
    config: &KeepAliveConfig,
    store: Option<&StatsStore>,
    sink: &mut dyn ReportSink,
) -> anyhow::Result<RunResult> {
    let run = orchestrator.run(&config.websites).await;
    finish_run(&run, store, sink).await?;
    Ok(run)
}

fn log_startup(path: &Path, config: &KeepAliveConfig) {
    log::info!("Loaded config from {:?}", path);
    log::info!(
        "Sites: {} | Interval: {} min | Timeout: {}ms | Max retries: {}",
        config.websites.len(),
        config.global.check_interval,
        config.global.timeout,
        config.global.max_retries
    );
}

fn exit_code(run: &RunResult) -> ExitCode {
    if run.all_succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn print_run(run: &RunResult) {
    let summary = run.summary();
    let status = if run.all_succeeded() { "✅" } else { "⚠️" };
    println!("\n{} Run Completed:", status);
    println!("   Sites: {}", run.sites.len());
    println!("   Probes: {}", summary.total);
    println!("   Succeeded: {}", summary.successful);
    println!("   Failed: {}", summary.failed);
    println!("   Success Rate: {:.1}%", summary.success_rate);
    println!("   Average Duration: {}ms", summary.avg_duration_ms);
}

fn print_stats(path: &Path, stats: &PersistedStats) {
    println!("📊 Historical stats ({})", path.display());
    match stats.last_run {
        Some(last_run) => println!("   Last run: {}", last_run.to_rfc3339()),
        None => println!("   Last run: never"),
    }
    let totals = stats.totals();
    println!("   Total runs: {}", totals.total_runs);
    println!("   Successful probes: {}", totals.total_success);
    println!("   Failed probes: {}", totals.total_failed);
    println!("   Success rate: {:.1}%", totals.success_rate());

    if !stats.websites.is_empty() {
        println!("   Per site:");
        for (site, counters) in &stats.websites {
            println!(
                "   - {}: {}/{} ok over {} run(s) ({:.1}%)",
                site,
                counters.total_success,
                counters.total_success + counters.total_failed,
                counters.total_runs,
                counters.success_rate()
            );
        }
    }
}
