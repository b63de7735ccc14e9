//! Trading bots and the immutable bot-set snapshot shared by shard workers.

use crate::domain::bar::Timeframe;
use crate::domain::decision_graph::{DecisionGraph, TreeData};
use crate::domain::error::RuleflowError;
use crate::domain::node_validation::validate_node;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;

const MAX_BOT_NAME_LEN: usize = 50;
const INVALID_NAME_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

fn target_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }
    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Text(s)) => s,
        Some(Raw::Number(n)) => n.to_string(),
        None => String::new(),
    })
}

/// A bot definition as saved by the editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotConfig {
    pub id: i64,
    pub bot_name: String,
    /// `broker:SYMBOL` entries.
    #[serde(default)]
    pub symbol_list: Vec<String>,
    #[serde(default)]
    pub timeframes: Vec<String>,
    #[serde(default)]
    pub tree_data: TreeData,
    /// Comma-separated chat ids.
    #[serde(default, alias = "idTelegram", deserialize_with = "target_list")]
    pub notification_target: String,
}

/// A validated bot, ready for dispatch.
#[derive(Debug, Clone)]
pub struct Bot {
    pub id: i64,
    pub name: String,
    pub symbols: HashSet<String>,
    pub timeframes: Vec<Timeframe>,
    pub graph: DecisionGraph,
    pub targets: Vec<String>,
}

pub fn validate_bot_name(name: &str) -> bool {
    !name.is_empty() && name.len() < MAX_BOT_NAME_LEN && !name.contains(INVALID_NAME_CHARS)
}

pub fn subscription_key(broker: &str, symbol: &str) -> String {
    format!("{}:{}", broker, symbol)
}

impl Bot {
    pub fn from_config(config: &BotConfig) -> Result<Self, RuleflowError> {
        let bot_error = |reason: String| RuleflowError::BotConfig {
            bot: config.bot_name.clone(),
            reason,
        };

        if !validate_bot_name(&config.bot_name) {
            return Err(bot_error(format!("invalid bot name '{}'", config.bot_name)));
        }

        let mut symbols = HashSet::new();
        for entry in &config.symbol_list {
            match entry.split_once(':') {
                Some((broker, symbol)) if !broker.is_empty() && !symbol.is_empty() => {
                    symbols.insert(subscription_key(broker.trim(), symbol.trim()));
                }
                _ => return Err(bot_error(format!("symbol entry '{}' is not broker:SYMBOL", entry))),
            }
        }

        let timeframes = config
            .timeframes
            .iter()
            .map(|tf| tf.parse::<Timeframe>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(bot_error)?;

        let graph = DecisionGraph::build(&config.tree_data.elements)?;
        for node in graph.nodes() {
            validate_node(node)?;
        }

        let targets = config
            .notification_target
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect();

        Ok(Self {
            id: config.id,
            name: config.bot_name.clone(),
            symbols,
            timeframes,
            graph,
            targets,
        })
    }

    pub fn subscribes(&self, broker: &str, symbol: &str, timeframe: Timeframe) -> bool {
        self.timeframes.contains(&timeframe)
            && self.symbols.contains(&subscription_key(broker, symbol))
    }
}

/// An immutable snapshot of validated bots. Replaced whole, never patched.
#[derive(Debug, Clone, Default)]
pub struct BotSet {
    bots: Vec<Bot>,
}

impl BotSet {
    pub fn new(bots: Vec<Bot>) -> Self {
        Self { bots }
    }

    /// Validate every config. Invalid or duplicate bots are left out and
    /// returned alongside the snapshot.
    pub fn from_configs(configs: &[BotConfig]) -> (Self, Vec<RuleflowError>) {
        let mut bots: Vec<Bot> = Vec::new();
        let mut rejected = Vec::new();
        for config in configs {
            if bots.iter().any(|b| b.id == config.id) {
                rejected.push(RuleflowError::BotConfig {
                    bot: config.bot_name.clone(),
                    reason: format!("duplicate bot id {}", config.id),
                });
                continue;
            }
            match Bot::from_config(config) {
                Ok(bot) => bots.push(bot),
                Err(e) => rejected.push(e),
            }
        }
        (Self { bots }, rejected)
    }

    pub fn len(&self) -> usize {
        self.bots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bots.is_empty()
    }

    pub fn bots(&self) -> &[Bot] {
        &self.bots
    }

    pub fn subscribers<'a>(
        &'a self,
        broker: &'a str,
        symbol: &'a str,
        timeframe: Timeframe,
    ) -> impl Iterator<Item = &'a Bot> + 'a {
        self.bots
            .iter()
            .filter(move |b| b.subscribes(broker, symbol, timeframe))
    }
}
