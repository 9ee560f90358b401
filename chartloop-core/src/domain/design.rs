//! Structural description of a diagram, as produced by a structure provider.
//!
//! A [`DesignSpec`] is created once per request and shared read-only by every
//! synthesis, repair and evaluation call of the session.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use thiserror::Error;

/// The request could not produce a usable design. Fatal for the session.
#[derive(Debug, Error)]
pub enum DesignError {
    #[error("failed to read design from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse design: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid design: {0}")]
    Invalid(String),
    #[error("structure provider failed: {0}")]
    Provider(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagramKind {
    #[serde(alias = "graph")]
    Flowchart,
    #[serde(alias = "sequenceDiagram", alias = "sequence_diagram")]
    Sequence,
    #[serde(alias = "classDiagram", alias = "class_diagram")]
    Class,
    #[serde(alias = "stateDiagram", alias = "state_diagram")]
    State,
    #[serde(alias = "erDiagram", alias = "er_diagram")]
    Er,
}

impl DiagramKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagramKind::Flowchart => "flowchart",
            DiagramKind::Sequence => "sequence",
            DiagramKind::Class => "class",
            DiagramKind::State => "state",
            DiagramKind::Er => "er",
        }
    }

    /// Header keyword that opens a diagram of this kind.
    pub fn header(self) -> &'static str {
        match self {
            DiagramKind::Flowchart => "flowchart",
            DiagramKind::Sequence => "sequenceDiagram",
            DiagramKind::Class => "classDiagram",
            DiagramKind::State => "stateDiagram-v2",
            DiagramKind::Er => "erDiagram",
        }
    }
}

impl fmt::Display for DiagramKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    TB,
    TD,
    BT,
    LR,
    RL,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::TB => "TB",
            Direction::TD => "TD",
            Direction::BT => "BT",
            Direction::LR => "LR",
            Direction::RL => "RL",
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Direction::TB | Direction::TD => "top to bottom",
            Direction::BT => "bottom to top",
            Direction::LR => "left to right",
            Direction::RL => "right to left",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeShape {
    #[default]
    #[serde(alias = "process", alias = "rect")]
    Rectangle,
    Rounded,
    #[serde(alias = "terminal", alias = "start", alias = "end")]
    Stadium,
    #[serde(alias = "diamond", alias = "rhombus", alias = "condition")]
    Decision,
    Circle,
    #[serde(alias = "cylinder", alias = "storage")]
    Database,
    Subroutine,
    #[serde(alias = "io", alias = "input", alias = "output")]
    Parallelogram,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignNode {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, alias = "type")]
    pub shape: NodeShape,
}

impl DesignNode {
    pub fn display_label(&self) -> &str {
        if self.label.trim().is_empty() {
            &self.id
        } else {
            &self.label
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignEdge {
    #[serde(alias = "source")]
    pub from: String,
    #[serde(alias = "target")]
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeGroup {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub nodes: Vec<String>,
}

/// Nodes, edges and presentation hints a diagram must represent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignSpec {
    #[serde(alias = "diagram_type")]
    pub kind: DiagramKind,
    #[serde(default)]
    pub direction: Direction,
    pub nodes: Vec<DesignNode>,
    #[serde(default)]
    pub edges: Vec<DesignEdge>,
    #[serde(default, alias = "subgraphs", skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<NodeGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub styling: Option<Map<String, Value>>,
}

impl DesignSpec {
    pub fn from_json(text: &str) -> Result<Self, DesignError> {
        let spec: DesignSpec = serde_json::from_str(text)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Reject designs no synthesizer could faithfully draw.
    pub fn validate(&self) -> Result<(), DesignError> {
        if self.nodes.is_empty() {
            return Err(DesignError::Invalid("design has no nodes".into()));
        }

        let mut ids = HashSet::new();
        for node in &self.nodes {
            if node.id.trim().is_empty() {
                return Err(DesignError::Invalid("node with empty id".into()));
            }
            if !ids.insert(node.id.as_str()) {
                return Err(DesignError::Invalid(format!("duplicate node id '{}'", node.id)));
            }
        }

        for edge in &self.edges {
            for end in [&edge.from, &edge.to] {
                if !ids.contains(end.as_str()) {
                    return Err(DesignError::Invalid(format!(
                        "edge {} -> {} references unknown node '{end}'",
                        edge.from, edge.to
                    )));
                }
            }
        }

        for group in &self.groups {
            if let Some(missing) = group.nodes.iter().find(|n| !ids.contains(n.as_str())) {
                return Err(DesignError::Invalid(format!(
                    "group '{}' references unknown node '{missing}'",
                    group.id
                )));
            }
        }

        Ok(())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn decision_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.shape == NodeShape::Decision)
            .count()
    }

    pub fn node(&self, id: &str) -> Option<&DesignNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn adjacency(&self) -> AdjacencySummary {
        AdjacencySummary::from_spec(self)
    }

    /// Pretty JSON used inside prompts.
    pub fn to_prompt_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| format!("{self:?}"))
    }
}

/// A node with several arrows leaving (fan-out) or entering (fan-in) it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FanPattern {
    pub node: String,
    pub label: String,
    pub peers: Vec<String>,
}

/// Branching structure a reader must be able to see in the rendered image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdjacencySummary {
    pub fan_out: Vec<FanPattern>,
    pub fan_in: Vec<FanPattern>,
}

impl AdjacencySummary {
    pub fn from_spec(spec: &DesignSpec) -> Self {
        let mut outgoing: HashMap<&str, Vec<String>> = HashMap::new();
        let mut incoming: HashMap<&str, Vec<String>> = HashMap::new();
        for edge in &spec.edges {
            outgoing
                .entry(edge.from.as_str())
                .or_default()
                .push(edge.to.clone());
            incoming
                .entry(edge.to.as_str())
                .or_default()
                .push(edge.from.clone());
        }

        let collect = |map: &HashMap<&str, Vec<String>>| -> Vec<FanPattern> {
            spec.nodes
                .iter()
                .filter_map(|node| {
                    let peers = map.get(node.id.as_str())?;
                    (peers.len() >= 2).then(|| FanPattern {
                        node: node.id.clone(),
                        label: node.display_label().to_string(),
                        peers: peers.clone(),
                    })
                })
                .collect()
        };

        Self {
            fan_out: collect(&outgoing),
            fan_in: collect(&incoming),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fan_out.is_empty() && self.fan_in.is_empty()
    }

    /// Plain-text rendering for prompts.
    pub fn describe(&self) -> String {
        if self.is_empty() {
            return "No node has more than one incoming or outgoing edge.".to_string();
        }
        let mut lines = Vec::new();
        for fan in &self.fan_out {
            lines.push(format!(
                "- fan-out: {} ({}) -> {} ({} distinct arrows)",
                fan.node,
                fan.label,
                fan.peers.join(", "),
                fan.peers.len()
            ));
        }
        for fan in &self.fan_in {
            lines.push(format!(
                "- fan-in: {} <- {} ({} distinct arrows)",
                fan.node,
                fan.peers.join(", "),
                fan.peers.len()
            ));
        }
        lines.join("\n")
    }
}
