//! CLI integration tests: each subcommand driven through `cli::run` with
//! real bot, INI and CSV files on disk.

mod common;

use clap::Parser;
use ruleflow::adapters::file_config_adapter::FileConfigAdapter;
use ruleflow::adapters::sqlite_adapter::SqliteAdapter;
use ruleflow::cli::{self, Cli};
use ruleflow::domain::order::OrderStatus;
use ruleflow::ports::order_store::OrderStore;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tempfile::TempDir;

const HOURLY_CSV: &str = "start_time,open,high,low,close,volume\n\
                          0,100,101,99,100,10\n\
                          3600000,100,102,99,101,12\n\
                          7200000,101,103,100,102,9\n";

fn market_bot_json(id: i64) -> String {
    format!(
        r#"{{"id": {id}, "botName": "market-{id}", "symbolList": ["binance:BTCUSDT"],
            "timeframes": ["1h"], "notificationTarget": "chat",
            "treeData": {{"elements": {{
                "nodes": [
                    {{"data": {{"id": "start"}}}},
                    {{"data": {{"id": "rising", "type": "EXPR", "value": "close() >= close(1)"}}}},
                    {{"data": {{"id": "buy", "type": "BUY_MARKET",
                               "sl": "close() - 5", "tp": "close() + 5", "volume": 1}}}}
                ],
                "edges": [
                    {{"data": {{"id": "e1", "source": "start", "target": "rising"}}}},
                    {{"data": {{"id": "e2", "source": "rising", "target": "buy"}}}}
                ]
            }}}}}}"#
    )
}

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn code(exit: ExitCode) -> String {
    format!("{exit:?}")
}

fn assert_exit(exit: ExitCode, expected: u8) {
    assert_eq!(code(exit), code(ExitCode::from(expected)));
}

fn run(args: &[&str]) -> ExitCode {
    let mut argv = vec!["ruleflow"];
    argv.extend_from_slice(args);
    cli::run(Cli::parse_from(argv))
}

/// A workspace with a bots directory, a bar file and an INI pointing at both.
struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("bots")).unwrap();
        write(&dir.path().join("bots"), "market.json", &market_bot_json(1));
        write(dir.path(), "bars.csv", HOURLY_CSV);
        let ini = format!(
            "[database]\npath = {db}\n\n[bots]\ndir = {bots}\n\n[runtime]\nbrokers = binance\n",
            db = dir.path().join("orders.db").display(),
            bots = dir.path().join("bots").display(),
        );
        write(dir.path(), "engine.ini", &ini);
        Self { dir }
    }

    fn path(&self, name: &str) -> String {
        self.dir.path().join(name).display().to_string()
    }
}

mod validate {
    use super::*;

    #[test]
    fn valid_bot_succeeds() {
        let ws = Workspace::new();
        assert_exit(run(&["validate", "--bot", &ws.path("bots/market.json")]), 0);
    }

    #[test]
    fn cyclic_bot_fails_with_validation_code() {
        let ws = Workspace::new();
        let cyclic = market_bot_json(2).replace(
            r#"{"data": {"id": "e2", "source": "rising", "target": "buy"}}"#,
            r#"{"data": {"id": "e2", "source": "rising", "target": "buy"}},
               {"data": {"id": "e3", "source": "buy", "target": "rising"}}"#,
        );
        let path = write(ws.dir.path(), "cyclic.json", &cyclic);
        assert_exit(run(&["validate", "--bot", path.to_str().unwrap()]), 4);
    }

    #[test]
    fn missing_file_is_io_error() {
        assert_exit(run(&["validate", "--bot", "/nonexistent/bot.json"]), 1);
    }
}

mod check_node {
    use super::*;

    #[test]
    fn inline_json() {
        let exit = run(&["check-node", "--node", r#"{"id":"n1","type":"EXPR","value":"rsi(14,0) > 70"}"#]);
        assert_exit(exit, 0);
    }

    #[test]
    fn node_from_file() {
        let ws = Workspace::new();
        let path = write(
            ws.dir.path(),
            "node.json",
            r#"{"id":"sell","type":"SELL_LIMIT","entry":"close() + 1","sl":"2","tp":"2",
                "volume":"1","expiredTime":"3","unitSL":"PERCENT","unitTP":"RR","unitExpiredTime":"CANDLE"}"#,
        );
        assert_exit(run(&["check-node", "--node", &format!("@{}", path.display())]), 0);
    }

    #[test]
    fn rejects_bad_expression_and_unit() {
        assert_exit(run(&["check-node", "--node", r#"{"id":"n1","type":"EXPR","value":"close( >"}"#]), 4);
        let bad_unit = r#"{"id":"b","type":"BUY_MARKET","sl":"1","tp":"2","volume":"1","unitVolume":"RR"}"#;
        assert_exit(run(&["check-node", "--node", bad_unit]), 4);
    }

    #[test]
    fn malformed_json_is_code_one() {
        assert_exit(run(&["check-node", "--node", "{not json"]), 1);
    }
}

mod eval {
    use super::*;

    #[test]
    fn expression_over_csv() {
        let ws = Workspace::new();
        assert_exit(run(&["eval", "--expr", "close() > close(2)", "--bars", &ws.path("bars.csv")]), 0);
    }

    #[test]
    fn syntax_error_fails() {
        let ws = Workspace::new();
        assert_exit(run(&["eval", "--expr", "close() >", "--bars", &ws.path("bars.csv")]), 4);
    }

    #[test]
    fn unknown_timeframe_is_config_error() {
        let ws = Workspace::new();
        let exit = run(&["eval", "--expr", "close()", "--bars", &ws.path("bars.csv"), "--timeframe", "7m"]);
        assert_exit(exit, 2);
    }
}

mod replay {
    use super::*;

    #[test]
    fn creates_orders_for_rising_bars() {
        let ws = Workspace::new();
        let exit = run(&[
            "replay",
            "--config",
            &ws.path("engine.ini"),
            "--bars",
            &ws.path("bars.csv"),
            "--broker",
            "binance",
            "--symbol",
            "BTCUSDT",
            "--timeframe",
            "1h",
        ]);
        assert_exit(exit, 0);

        let config = FileConfigAdapter::from_file(Path::new(&ws.path("engine.ini"))).unwrap();
        let store = SqliteAdapter::from_config(&config).unwrap();
        let orders = store.orders_for_bot(1).unwrap();
        // close(1) is missing on the first bar, so only the last two buy.
        assert_eq!(orders.len(), 2);
        assert!(orders.iter().all(|o| o.status == OrderStatus::MatchEntry));
        assert_eq!(orders[0].entry, 101.0);
        assert_eq!(orders[1].entry, 102.0);
    }

    #[test]
    fn missing_config_file() {
        let ws = Workspace::new();
        let exit = run(&[
            "replay",
            "--config",
            "/nonexistent/engine.ini",
            "--bars",
            &ws.path("bars.csv"),
            "--broker",
            "binance",
            "--symbol",
            "BTCUSDT",
            "--timeframe",
            "1h",
        ]);
        assert_exit(exit, 2);
    }

    #[test]
    fn config_without_bots_dir() {
        let ws = Workspace::new();
        let ini = write(
            ws.dir.path(),
            "partial.ini",
            &format!("[database]\npath = {}\n", ws.path("orders.db")),
        );
        let exit = run(&[
            "replay",
            "--config",
            ini.to_str().unwrap(),
            "--bars",
            &ws.path("bars.csv"),
            "--broker",
            "binance",
            "--symbol",
            "BTCUSDT",
            "--timeframe",
            "1h",
        ]);
        assert_exit(exit, 2);
    }
}

mod reconcile {
    use super::*;

    #[test]
    fn empty_store_reconciles_nothing() {
        let ws = Workspace::new();
        assert_exit(run(&["reconcile", "--config", &ws.path("engine.ini")]), 0);
    }

    #[test]
    fn log_level_comes_from_the_config() {
        let ws = Workspace::new();
        let ini = write(
            ws.dir.path(),
            "debug.ini",
            "[bots]\ndir = bots\n\n[runtime]\nbrokers = binance\n\n[logging]\nlevel = debug\n",
        );
        let cli = Cli::parse_from(["ruleflow", "reconcile", "--config", ini.to_str().unwrap()]);
        assert_eq!(cli.log_level(), "debug");
    }
}
