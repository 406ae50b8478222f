use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;

mod cli;
mod config;

use batchr::agent::{ExecutionAgentClient, ManualClock, SimulatedAgent};
use batchr::composer::Composer;
use batchr::coordinator::BatchCoordinator;
use batchr::daemon::Daemon;
use batchr::domain::{Cycle, HackMode, PlayerState, TargetState};
use batchr::formulas::hack_chance;
use batchr::scheduler::TimingPlanner;
use batchr::sink::LogSink;
use batchr::storage::{JsonlSnapshotStore, SnapshotStore};
use cli::Cli;
use cli::commands::Commands;
use config::Config;

const SNAPSHOT_COLLECTION: &str = "targets";

fn setup_logging() -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("batchr")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("batchr.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Trace)
        .parse_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

/// RUST_LOG wins; otherwise the config's log_level, raised to debug by -v
fn apply_log_level(cli: &Cli, config: &Config) {
    if std::env::var_os("RUST_LOG").is_some() {
        return;
    }
    let mut level = config
        .log_level
        .as_deref()
        .and_then(|l| l.parse::<log::LevelFilter>().ok())
        .unwrap_or(log::LevelFilter::Info);
    if cli.is_verbose() && level < log::LevelFilter::Debug {
        level = log::LevelFilter::Debug;
    }
    log::set_max_level(level);
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        None | Some(Commands::Simulate { .. }) => {
            let (ticks, launch_delay_ms) = match &cli.command {
                Some(Commands::Simulate { ticks, launch_delay_ms }) => (*ticks, *launch_delay_ms),
                _ => (600, 0),
            };
            handle_simulate_command(ticks, launch_delay_ms, config).await
        }
        Some(Commands::Plan {
            target,
            mode,
            skill,
            threads,
            agent,
            json,
        }) => handle_plan_command(
            target,
            mode.as_deref(),
            *skill,
            *threads,
            agent.as_deref(),
            *json,
            config,
        ),
        Some(Commands::Config) => handle_config_command(config),
    }
}

fn open_snapshots(config: &Config) -> Result<Option<JsonlSnapshotStore>> {
    match &config.snapshots.dir {
        Some(dir) => Ok(Some(
            JsonlSnapshotStore::open(dir, SNAPSHOT_COLLECTION).context("Failed to open snapshot store")?,
        )),
        None => Ok(None),
    }
}

fn handle_plan_command(
    target: &str,
    mode: Option<&str>,
    skill: Option<u32>,
    threads: Option<u32>,
    agent: Option<&str>,
    json: bool,
    config: &Config,
) -> Result<()> {
    info!("Planning cycle for target: {}", target);
    let target_config = config.target(target);

    let snapshot: Option<TargetState> = match open_snapshots(config)? {
        Some(store) => store.get(target)?,
        None => None,
    };
    let state = match (snapshot, target_config) {
        (Some(state), _) => state,
        (None, Some(t)) => t.to_target_state(),
        (None, None) => eyre::bail!("No snapshot or config entry for target {}", target),
    };

    let mode: HackMode = match (mode, target_config) {
        (Some(m), _) => m.parse().map_err(|e: String| eyre::eyre!(e))?,
        (None, Some(t)) => t.hack_mode()?,
        (None, None) => HackMode::default(),
    };

    let agent_name = agent
        .map(str::to_string)
        .or_else(|| target_config.and_then(|t| t.agent.clone()))
        .or_else(|| config.agents.first().map(|a| a.hostname.clone()))
        .ok_or_else(|| eyre::eyre!("No execution agents configured"))?;
    let agent_config = config
        .agent(&agent_name)
        .ok_or_else(|| eyre::eyre!("Unknown agent {}", agent_name))?;
    let available = threads.unwrap_or(agent_config.threads);

    let player = PlayerState::new(skill.unwrap_or(config.player.skill)).with_multipliers(config.multipliers.clone());
    let composer = Composer::new(config.composer.clone());
    let cycle = composer
        .compose_cycle(mode, &state, &player, available, agent_config.cores)
        .context(format!("Failed to compose a cycle for {}", target))?;

    let mut planner = TimingPlanner::new(config.timing.clone());
    let duration = planner.cycle_duration_ms(&cycle);
    let scheduled = planner
        .schedule(target, cycle, duration, 0)
        .context("Failed to schedule cycle")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&scheduled)?);
    } else {
        print_cycle(target, mode, &state, &player, &scheduled);
    }
    Ok(())
}

fn print_cycle(target: &str, mode: HackMode, state: &TargetState, player: &PlayerState, cycle: &Cycle) {
    println!(
        "{} {} ({} mode, {} cycle)",
        "Plan:".green().bold(),
        target.cyan(),
        mode,
        cycle.cycle_type()
    );
    println!(
        "  money {:.0}/{:.0} ({:.1}%), security {:.3} (floor {:.3}), hack chance {:.1}%",
        state.money,
        state.max_money,
        state.money_ratio() * 100.0,
        state.security,
        state.min_security,
        hack_chance(state, player) * 100.0
    );
    println!(
        "  {:<8} {:>8} {:>12} {:>12} {:>12} {:>10}",
        "op", "threads", "start", "duration", "lands", "security"
    );
    for leg in cycle.legs() {
        println!(
            "  {:<8} {:>8} {:>10}ms {:>10}ms {:>10}ms {:>+10.3}",
            leg.op.to_string().yellow(),
            leg.threads,
            leg.start_ms,
            leg.duration_ms,
            leg.completion_ms(),
            leg.security_delta
        );
    }
    let (first, last) = cycle.landing_window();
    println!(
        "  {} threads, landing window {}ms..{}ms",
        cycle.total_threads().to_string().bold(),
        first,
        last
    );
}

async fn handle_simulate_command(ticks: u64, launch_delay_ms: u64, config: &Config) -> Result<()> {
    info!("Simulating {} ticks", ticks);
    println!("{} {} ticks", "Simulating:".green(), ticks);

    let clock = Arc::new(ManualClock::new(0));
    let agent = Arc::new(
        SimulatedAgent::new(clock.clone(), config.player.skill)
            .with_drift_tolerance(config.timing.drift_tolerance_ms)
            .with_launch_delay(launch_delay_ms)
            .with_multipliers(config.multipliers.clone()),
    );
    for a in &config.agents {
        agent.add_agent(&a.hostname, a.threads, a.cores)?;
    }
    for t in &config.targets {
        agent.add_target(t.to_target_state())?;
    }

    let sink = Arc::new(LogSink);
    let mut coordinator = BatchCoordinator::new(
        agent.clone(),
        clock.clone(),
        sink.clone(),
        config.composer.clone(),
        config.timing.clone(),
    )
    .with_multipliers(config.multipliers.clone());
    if let Some(store) = open_snapshots(config)? {
        coordinator = coordinator.with_snapshots(Arc::new(store));
    }
    for a in &config.agents {
        coordinator.register_agent(&a.hostname, a.threads, a.cores);
    }

    let mut tick_config = config.daemon.clone();
    tick_config.max_ticks = Some(ticks);
    let mut daemon = Daemon::new(coordinator, clock.clone(), sink, tick_config, config.target_plans()?);

    let shutdown = daemon.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.store(true, Ordering::SeqCst);
        }
    });

    let state = daemon.run().await.context("Scheduling loop failed")?;
    let stats = agent.stats()?;

    println!(
        "{} {} ticks, {} batches dispatched, {} elapsed, {} misses",
        "Done:".green().bold(),
        state.tick_count,
        state.total_dispatched,
        state.total_elapsed,
        state.total_misses
    );
    println!(
        "  legs launched {}, landed {}, drifted {}, rejected {}",
        stats.launched, stats.landed, stats.drifted, stats.rejected
    );
    println!("  money stolen {:.0}", stats.money_stolen);

    for plan in config.target_plans()? {
        let status = state.status(&plan.hostname);
        let snapshot = agent.target_state(&plan.hostname).await?;
        println!(
            "  {:<16} {:<22} money {:>6.1}%  security {:.3}",
            plan.hostname.cyan(),
            status.to_string(),
            snapshot.money_ratio() * 100.0,
            snapshot.security
        );
    }
    Ok(())
}

fn handle_config_command(config: &Config) -> Result<()> {
    info!("Printing effective config");
    print!("{}", serde_yaml::to_string(config)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup logging first
    setup_logging().context("Failed to setup logging")?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    apply_log_level(&cli, &config);
    config.validate().context("Invalid configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
