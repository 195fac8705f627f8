//! Serde structs for scenario files.
//!
//! A scenario is a map of nodes keyed by id plus an optional `run` table.
//! Nodes keep the order the file lists them in.
//! Every per-node field is optional so that a bare supplier can be written
//! as an empty table. These structs are converted into engine types by the
//! loader and written back by the saver.

use echelon_core::id::{Period, Quantity};
use echelon_core::sim::RunConfig;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ===========================================================================
// Scenario
// ===========================================================================

/// A whole scenario file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<RunConfig>,
    pub nodes: IndexMap<String, NodeData>,
}

/// One node of a scenario.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sales: Option<SalesData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_time: Option<LeadTimeData>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pipeline: Vec<ReceiptData>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub stock: BTreeMap<String, StockData>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub orders: BTreeMap<String, Quantity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backorders: Option<BackOrdersData>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub predecessors: Vec<LinkData>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub successors: Vec<LinkData>,
}

// ===========================================================================
// Strategies
// ===========================================================================

/// Customer order lines, either positional or keyed by period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SalesData {
    /// `[[2, 1], [], [4]]`: entry `i` holds the lines of period `i + 1`.
    List(Vec<Vec<Quantity>>),
    /// `{"1": [2, 1], "3": [4]}`. Keys are strings so every format can carry them.
    Schedule(BTreeMap<String, Vec<Quantity>>),
}

/// Replenishment lead time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LeadTimeData {
    /// The same lead time in every period.
    Constant(Period),
    /// Per-period overrides with an optional fallback.
    Queue {
        #[serde(default)]
        queue: BTreeMap<String, Period>,
        #[serde(default)]
        default: Option<Period>,
    },
}

// ===========================================================================
// Resumable state
// ===========================================================================

/// An in-transit receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptData {
    pub item: String,
    pub quantity: Quantity,
    pub eta: Period,
}

/// On-hand stock of one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StockData {
    /// A single untagged batch.
    Total(Quantity),
    /// Explicit FIFO batches, oldest first.
    Batches(Vec<BatchData>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchData {
    pub quantity: Quantity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<Period>,
}

/// Outstanding backorders, as a bare total or broken down by period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BackOrdersData {
    Total(Quantity),
    ByPeriod(BTreeMap<String, Quantity>),
}

// ===========================================================================
// Topology
// ===========================================================================

/// One end of an edge, as listed under `predecessors` or `successors`.
///
/// A link only needs to appear on one of its two nodes; the loader adds the
/// reciprocal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LinkData {
    /// `"B"`: one unit per unit.
    Id(String),
    /// `("B", 2)` / `["B", 2]`.
    Short(String, Quantity),
    /// `{ id = "B", number = 2 }`.
    Full {
        id: String,
        #[serde(default = "default_number")]
        number: Quantity,
    },
}

fn default_number() -> Quantity {
    1
}

impl LinkData {
    pub fn id(&self) -> &str {
        match self {
            LinkData::Id(id) | LinkData::Short(id, _) | LinkData::Full { id, .. } => id,
        }
    }

    pub fn number(&self) -> Quantity {
        match self {
            LinkData::Id(_) => 1,
            LinkData::Short(_, number) | LinkData::Full { number, .. } => *number,
        }
    }
}
