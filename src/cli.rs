//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

use crate::adapters::csv_adapter::{CsvAdapter, read_bars};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_bot_adapter::JsonBotAdapter;
use crate::adapters::log_notifier::LogNotifier;
use crate::adapters::sqlite_adapter::SqliteAdapter;
use crate::domain::bar::{Bar, Timeframe};
use crate::domain::bot::Bot;
use crate::domain::config_validation::{EngineConfig, ReconcileConfig};
use crate::domain::decision_graph::DecisionNode;
use crate::domain::dispatcher::{BarEvent, DispatchReport, Dispatcher};
use crate::domain::error::{ExprError, RuleflowError};
use crate::domain::expr_eval::{EvalContext, evaluate_condition};
use crate::domain::node_validation::validate_node;
use crate::ports::bar_source::BarSource;
use crate::ports::config_port::ConfigPort;
use crate::runtime::engine::Engine;
use crate::runtime::feed::{load_snapshot, run_feed};
use crate::runtime::reconciliation::{run_periodic, sweep};
use crate::runtime::watchdog::watch;

/// Bars kept in each dispatch window during a replay.
pub const DEFAULT_REPLAY_WINDOW: usize = 300;

#[derive(Parser, Debug)]
#[command(name = "ruleflow", about = "Rule engine for trading bots")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate a bot definition file
    Validate {
        #[arg(short, long)]
        bot: PathBuf,
    },
    /// Validate a single node given as JSON
    CheckNode {
        #[arg(short, long)]
        node: String,
    },
    /// Evaluate an expression against a CSV bar file
    Eval {
        #[arg(short, long)]
        expr: String,
        #[arg(long)]
        bars: PathBuf,
        #[arg(long, default_value = "binance")]
        broker: String,
        #[arg(long, default_value = "BTCUSDT")]
        symbol: String,
        #[arg(long, default_value = "1h")]
        timeframe: String,
    },
    /// Dispatch every closed bar of a CSV file, then reconcile
    Replay {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        bars: PathBuf,
        #[arg(long)]
        broker: String,
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        timeframe: String,
        #[arg(long, default_value_t = DEFAULT_REPLAY_WINDOW)]
        window: usize,
    },
    /// Run one reconciliation sweep over open orders
    Reconcile {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Start the engine and read the JSON-lines event feed from stdin
    Run {
        #[arg(short, long)]
        config: PathBuf,
    },
}

impl Cli {
    fn config_path(&self) -> Option<&Path> {
        match &self.command {
            Command::Replay { config, .. } | Command::Reconcile { config } | Command::Run { config } => {
                Some(config.as_path())
            }
            _ => None,
        }
    }

    /// `[logging] level` from the command's config file, else `info`.
    pub fn log_level(&self) -> String {
        self.config_path()
            .and_then(|p| FileConfigAdapter::from_file(p).ok())
            .and_then(|c| c.get_string("logging", "level"))
            .unwrap_or_else(|| "info".to_string())
    }
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Validate { bot } => run_validate(&bot),
        Command::CheckNode { node } => run_check_node(&node),
        Command::Eval {
            expr,
            bars,
            broker,
            symbol,
            timeframe,
        } => run_eval(&expr, &bars, &broker, &symbol, &timeframe),
        Command::Replay {
            config,
            bars,
            broker,
            symbol,
            timeframe,
            window,
        } => run_replay(&config, &bars, &broker, &symbol, &timeframe, window),
        Command::Reconcile { config } => run_reconcile(&config),
        Command::Run { config } => run_engine(&config),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, RuleflowError> {
    FileConfigAdapter::from_file(path)
}

fn parse_timeframe(value: &str) -> Result<Timeframe, RuleflowError> {
    value.parse().map_err(|reason| RuleflowError::ConfigInvalid {
        section: "cli".to_string(),
        key: "timeframe".to_string(),
        reason,
    })
}

fn run_validate(path: &Path) -> Result<(), RuleflowError> {
    eprintln!("Validating bot: {}", path.display());
    let config = JsonBotAdapter::read_file(path)?;
    let bot = Bot::from_config(&config)?;

    println!("Bot:        {} (id {})", bot.name, bot.id);
    let mut symbols: Vec<&String> = bot.symbols.iter().collect();
    symbols.sort();
    println!(
        "Symbols:    {}",
        symbols.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
    );
    println!(
        "Timeframes: {}",
        bot.timeframes.iter().map(|t| t.as_str()).collect::<Vec<_>>().join(", ")
    );
    println!("Nodes:");
    for index in 0..bot.graph.len() {
        let node = bot.graph.node(index);
        println!("  {:<20} {}", node.id, bot.graph.kind(index));
    }
    eprintln!("\nBot definition is valid.");
    Ok(())
}

fn run_check_node(source: &str) -> Result<(), RuleflowError> {
    let json = match source.strip_prefix('@') {
        Some(path) => fs::read_to_string(path)?,
        None => source.to_string(),
    };
    let node: DecisionNode = serde_json::from_str(&json)?;
    validate_node(&node)?;
    println!("Node '{}' ({}) is valid.", node.id, node.kind()?);
    Ok(())
}

fn run_eval(expr: &str, bars_path: &Path, broker: &str, symbol: &str, timeframe: &str) -> Result<(), RuleflowError> {
    let timeframe = parse_timeframe(timeframe)?;
    let mut bars = read_bars(bars_path, broker, symbol, timeframe)?;
    bars.reverse();
    let ctx = EvalContext::new(broker, symbol, timeframe, &bars);
    match evaluate_condition(expr, &ctx) {
        Ok(value) => {
            println!("{}", value);
            Ok(())
        }
        Err(ExprError::Syntax(e)) => {
            eprintln!("{}", e.display_with_context(expr));
            Err(ExprError::Syntax(e).into())
        }
        Err(e) => Err(e.into()),
    }
}

fn newest_first(bars: &[Bar], end: usize, window: usize) -> Vec<Bar> {
    let start = (end + 1).saturating_sub(window.max(1));
    bars[start..=end].iter().rev().cloned().collect()
}

fn run_replay(
    config_path: &Path,
    bars_path: &Path,
    broker: &str,
    symbol: &str,
    timeframe: &str,
    window: usize,
) -> Result<(), RuleflowError> {
    eprintln!("Loading config from {}", config_path.display());
    let config = load_config(config_path)?;
    let engine_config = EngineConfig::from_config(&config)?;
    let timeframe = parse_timeframe(timeframe)?;

    let store = Arc::new(SqliteAdapter::from_config(&config)?);
    let bots = load_snapshot(&JsonBotAdapter::new(engine_config.bots_dir.clone()))?;
    let bars = read_bars(bars_path, broker, symbol, timeframe)?;
    store.insert_bars(&bars)?;
    eprintln!("Replaying {} bars for {} bots", bars.len(), bots.len());

    let dispatcher = Dispatcher::new(store.clone(), Arc::new(LogNotifier));
    let mut total = DispatchReport::default();
    for end in 0..bars.len() {
        if !bars[end].is_final {
            break;
        }
        let event = BarEvent {
            broker: broker.to_string(),
            symbol: symbol.to_string(),
            timeframe,
            bars: newest_first(&bars, end, window),
        };
        total.merge(&dispatcher.dispatch(&event, &bots));
    }

    let reconcile = ReconcileConfig {
        timeframe,
        ..engine_config.reconcile
    };
    let runtime = tokio::runtime::Runtime::new()?;
    let swept = runtime.block_on(sweep(store.clone(), store.clone(), &reconcile))?;

    println!("Nodes evaluated:    {}", total.nodes_evaluated);
    println!("Orders created:     {}", total.orders_created);
    println!("Notifications sent: {}", total.notifications_sent);
    println!("Failures:           {}", total.failures);
    println!("Orders updated:     {}", swept.updated);
    Ok(())
}

fn bar_source_for(engine_config: &EngineConfig, store: &Arc<SqliteAdapter>) -> Arc<dyn BarSource> {
    match &engine_config.csv_dir {
        Some(dir) => Arc::new(CsvAdapter::new(dir.clone())) as Arc<dyn BarSource>,
        None => store.clone() as Arc<dyn BarSource>,
    }
}

fn run_reconcile(config_path: &Path) -> Result<(), RuleflowError> {
    let config = load_config(config_path)?;
    let engine_config = EngineConfig::from_config(&config)?;
    let store = Arc::new(SqliteAdapter::from_config(&config)?);
    let bars = bar_source_for(&engine_config, &store);

    let runtime = tokio::runtime::Runtime::new()?;
    let report = runtime.block_on(sweep(store, bars, &engine_config.reconcile))?;
    println!(
        "Reconciled {} open orders: {} updated, {} failed",
        report.orders, report.updated, report.failures
    );
    Ok(())
}

fn run_engine(config_path: &Path) -> Result<(), RuleflowError> {
    let config = load_config(config_path)?;
    let engine_config = EngineConfig::from_config(&config)?;
    let store = Arc::new(SqliteAdapter::from_config(&config)?);
    let bars = bar_source_for(&engine_config, &store);
    let source = JsonBotAdapter::new(engine_config.bots_dir.clone());
    let bots = load_snapshot(&source)?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let dispatcher = Dispatcher::new(store.clone(), Arc::new(LogNotifier));
        let mut engine = Engine::start(
            &engine_config.brokers,
            bots,
            dispatcher,
            engine_config.channel_capacity,
        );
        let activity = engine.activity();
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());

        let outcome = tokio::select! {
            fed = run_feed(stdin, &mut engine, &source) => fed.map(|stats| {
                info!(events = stats.events, reloads = stats.reloads, rejected = stats.rejected_lines, "event feed ended");
            }),
            stale = watch(activity, engine_config.watchdog.clone()) => Err(stale),
            () = run_periodic(store.clone(), bars, engine_config.reconcile.clone()) => Ok(()),
        };

        for (broker, stats) in engine.shutdown().await? {
            info!(
                broker = %broker,
                events = stats.events,
                swaps = stats.swaps,
                orders = stats.report.orders_created,
                "shard summary"
            );
        }
        outcome
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(start_time: i64) -> Bar {
        Bar {
            symbol: "BTCUSDT".into(),
            broker: "binance".into(),
            timeframe: Timeframe::M1,
            start_time,
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 1.0,
            is_final: true,
        }
    }

    #[test]
    fn replay_window_is_newest_first_and_capped() {
        let bars: Vec<Bar> = (0..10).map(|i| bar(i * 60_000)).collect();
        let window = newest_first(&bars, 5, 3);
        let starts: Vec<i64> = window.iter().map(|b| b.start_time).collect();
        assert_eq!(starts, vec![300_000, 240_000, 180_000]);
        assert_eq!(newest_first(&bars, 0, 3).len(), 1);
    }

    #[test]
    fn log_level_defaults_to_info() {
        let cli = Cli::parse_from(["ruleflow", "check-node", "--node", "{}"]);
        assert_eq!(cli.log_level(), "info");
    }
}
