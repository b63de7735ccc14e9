//! Decision graph: a validated DAG of rule nodes rooted at `"start"`.
//!
//! The editor supplies flat node and edge lists. [`DecisionGraph::build`]
//! turns them into an id-indexed arena where every node owns the indices of
//! its children, then rejects any cycle reachable from the root.

use crate::domain::error::RuleflowError;
use crate::domain::order::OrderType;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

pub const START_ID: &str = "start";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Start,
    Expr,
    Telegram,
    Order(OrderType),
    CloseAllOrder,
    CloseAllPosition,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Start => "START",
            NodeKind::Expr => "EXPR",
            NodeKind::Telegram => "TELEGRAM",
            NodeKind::Order(t) => t.as_str(),
            NodeKind::CloseAllOrder => "CLOSE_ALL_ORDER",
            NodeKind::CloseAllPosition => "CLOSE_ALL_POSITION",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        match upper.as_str() {
            "START" => Ok(NodeKind::Start),
            "EXPR" => Ok(NodeKind::Expr),
            "TELEGRAM" => Ok(NodeKind::Telegram),
            "CLOSE_ALL_ORDER" => Ok(NodeKind::CloseAllOrder),
            "CLOSE_ALL_POSITION" => Ok(NodeKind::CloseAllPosition),
            other => other
                .parse::<OrderType>()
                .map(NodeKind::Order)
                .map_err(|_| format!("unknown node type '{}'", s)),
        }
    }
}

impl<'de> Deserialize<'de> for NodeKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl Serialize for NodeKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Unit {
    #[default]
    None,
    Percent,
    Rr,
    Usd,
    Minute,
    Candle,
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Unit::None => "NONE",
            Unit::Percent => "PERCENT",
            Unit::Rr => "RR",
            Unit::Usd => "USD",
            Unit::Minute => "MINUTE",
            Unit::Candle => "CANDLE",
        };
        f.write_str(s)
    }
}

/// Template text that the editor may store as a JSON string or number.
fn template<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(f64),
    }
    let raw: Option<Raw> = Option::deserialize(deserializer)?;
    Ok(match raw {
        Some(Raw::Text(s)) if s.trim().is_empty() => None,
        Some(Raw::Text(s)) => Some(s),
        Some(Raw::Number(n)) => Some(n.to_string()),
        None => None,
    })
}

/// One rule node with its templated fields, as stored by the editor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionNode {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: Option<NodeKind>,
    #[serde(default, deserialize_with = "template")]
    pub value: Option<String>,
    #[serde(default, deserialize_with = "template")]
    pub stop: Option<String>,
    #[serde(default, deserialize_with = "template")]
    pub entry: Option<String>,
    #[serde(default, deserialize_with = "template")]
    pub tp: Option<String>,
    #[serde(default, deserialize_with = "template")]
    pub sl: Option<String>,
    #[serde(default, deserialize_with = "template")]
    pub volume: Option<String>,
    #[serde(default, deserialize_with = "template")]
    pub expired_time: Option<String>,
    #[serde(default)]
    pub unit_stop: Unit,
    #[serde(default)]
    pub unit_entry: Unit,
    #[serde(default, rename = "unitTP")]
    pub unit_tp: Unit,
    #[serde(default, rename = "unitSL")]
    pub unit_sl: Unit,
    #[serde(default)]
    pub unit_volume: Unit,
    #[serde(default)]
    pub unit_expired_time: Unit,
}

impl DecisionNode {
    /// The node's type. The root may omit it.
    pub fn kind(&self) -> Result<NodeKind, RuleflowError> {
        match self.kind {
            Some(kind) => Ok(kind),
            None if self.id == START_ID => Ok(NodeKind::Start),
            None => Err(RuleflowError::Validation {
                node: self.id.clone(),
                reason: "node has no type".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeElement {
    pub data: DecisionNode,
    #[serde(default)]
    pub removed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeData {
    #[serde(default)]
    pub id: String,
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeElement {
    pub data: EdgeData,
    #[serde(default)]
    pub removed: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Elements {
    #[serde(default)]
    pub nodes: Vec<NodeElement>,
    #[serde(default)]
    pub edges: Vec<EdgeElement>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TreeData {
    #[serde(default)]
    pub elements: Elements,
}

#[derive(Debug, Clone)]
pub struct DecisionGraph {
    nodes: Vec<DecisionNode>,
    kinds: Vec<NodeKind>,
    children: Vec<Vec<usize>>,
    index: HashMap<String, usize>,
    start: usize,
}

impl DecisionGraph {
    pub fn build(elements: &Elements) -> Result<Self, RuleflowError> {
        let mut nodes = Vec::new();
        let mut kinds = Vec::new();
        let mut index = HashMap::new();

        for element in elements.nodes.iter().filter(|n| !n.removed) {
            let node = &element.data;
            if index.insert(node.id.clone(), nodes.len()).is_some() {
                return Err(RuleflowError::Validation {
                    node: node.id.clone(),
                    reason: "duplicate node id".to_string(),
                });
            }
            kinds.push(node.kind()?);
            nodes.push(node.clone());
        }

        let mut children = vec![Vec::new(); nodes.len()];
        for edge in elements.edges.iter().filter(|e| !e.removed) {
            let lookup = |id: &str| {
                index.get(id).copied().ok_or_else(|| RuleflowError::Validation {
                    node: id.to_string(),
                    reason: format!(
                        "edge '{}' references unknown node '{}'",
                        edge.data.id, id
                    ),
                })
            };
            let source = lookup(&edge.data.source)?;
            let target = lookup(&edge.data.target)?;
            children[source].push(target);
        }

        let start = *index.get(START_ID).ok_or(RuleflowError::MissingStart)?;
        let graph = Self {
            nodes,
            kinds,
            children,
            index,
            start,
        };
        graph.check_acyclic()?;
        Ok(graph)
    }

    /// Path-local DFS from the root: a node met again while still on the
    /// current path closes a cycle.
    fn check_acyclic(&self) -> Result<(), RuleflowError> {
        let n = self.nodes.len();
        let mut on_path = vec![false; n];
        let mut done = vec![false; n];
        let mut stack: Vec<(usize, usize)> = vec![(self.start, 0)];
        on_path[self.start] = true;

        while let Some(top) = stack.last_mut() {
            let (node, next) = *top;
            if let Some(&child) = self.children[node].get(next) {
                top.1 += 1;
                if on_path[child] {
                    return Err(RuleflowError::Cycle {
                        node: self.nodes[child].id.clone(),
                    });
                }
                if !done[child] {
                    on_path[child] = true;
                    stack.push((child, 0));
                }
            } else {
                on_path[node] = false;
                done[node] = true;
                stack.pop();
            }
        }
        Ok(())
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, index: usize) -> &DecisionNode {
        &self.nodes[index]
    }

    pub fn kind(&self, index: usize) -> NodeKind {
        self.kinds[index]
    }

    pub fn children(&self, index: usize) -> &[usize] {
        &self.children[index]
    }

    pub fn find(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &DecisionNode> {
        self.nodes.iter()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn node(id: &str, kind: NodeKind) -> NodeElement {
        NodeElement {
            data: DecisionNode {
                id: id.to_string(),
                kind: Some(kind),
                ..DecisionNode::default()
            },
            removed: false,
        }
    }

    pub fn expr_node(id: &str, value: &str) -> NodeElement {
        let mut element = node(id, NodeKind::Expr);
        element.data.value = Some(value.to_string());
        element
    }

    pub fn edge(source: &str, target: &str) -> EdgeElement {
        EdgeElement {
            data: EdgeData {
                id: format!("{}-{}", source, target),
                source: source.to_string(),
                target: target.to_string(),
            },
            removed: false,
        }
    }

    pub fn elements(nodes: Vec<NodeElement>, edges: Vec<EdgeElement>) -> Elements {
        Elements { nodes, edges }
    }
}
