//! Scenario loading and saving.
//!
//! Provides format detection (RON/JSON/TOML), (de)serialization helpers, and
//! the conversion between [`ScenarioData`] and a ranked [`SupplyChain`].

use crate::schema::{
    BackOrdersData, BatchData, LeadTimeData, NodeData, ReceiptData, SalesData, ScenarioData,
    StockData,
};
use echelon_core::backorders::BackOrderError;
use echelon_core::graph::{ChainError, Edge, SupplyChain};
use echelon_core::id::{NodeId, Period, Quantity};
use echelon_core::node::{Node, NodeError};
use echelon_core::pipeline::Receipt;
use echelon_core::sim::RunConfig;
use echelon_core::stock::{StockBatch, StockError};
use echelon_core::strategy::{QueuedLeadTime, ScheduledSales, StrategyError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::debug;

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur while loading or saving a scenario.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A serialization error occurred.
    #[error("cannot write {file}: {detail}")]
    Serialize { file: PathBuf, detail: String },

    /// A period key (sales schedule, lead-time queue, backorders) is not an integer.
    #[error("node {node}: {field} key '{key}' is not a period")]
    InvalidPeriod {
        node: String,
        field: &'static str,
        key: String,
    },

    #[error("node {node}: invalid sales")]
    InvalidSales {
        node: String,
        #[source]
        cause: StrategyError,
    },

    /// Both ends of an edge list it with different numbers.
    #[error("edge {from} -> {to} listed with numbers {first} and {second}")]
    EdgeConflict {
        from: String,
        to: String,
        first: Quantity,
        second: Quantity,
    },

    #[error("node {node}: invalid stock")]
    Stock {
        node: String,
        #[source]
        cause: StockError,
    },

    #[error("node {node}: invalid backorders")]
    BackOrders {
        node: String,
        #[source]
        cause: BackOrderError,
    },

    #[error(transparent)]
    Node(#[from] NodeError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// (De)serialization
// ===========================================================================

/// Read a file and deserialize it according to its format (detected from extension).
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;

    let parse_error = |detail: String| DataLoadError::Parse {
        file: path.to_path_buf(),
        detail,
    };
    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(e.to_string())),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(e.to_string())),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(e.to_string())),
    }
}

/// Serialize a value in the format implied by the path and write it out.
pub fn serialize_file<T: Serialize>(path: &Path, value: &T) -> Result<(), DataLoadError> {
    let format = detect_format(path)?;

    let write_error = |detail: String| DataLoadError::Serialize {
        file: path.to_path_buf(),
        detail,
    };
    let content = match format {
        Format::Ron => ron::ser::to_string_pretty(value, ron::ser::PrettyConfig::default())
            .map_err(|e| write_error(e.to_string()))?,
        Format::Json => serde_json::to_string_pretty(value).map_err(|e| write_error(e.to_string()))?,
        Format::Toml => toml::to_string_pretty(value).map_err(|e| write_error(e.to_string()))?,
    };
    std::fs::write(path, content)?;
    Ok(())
}

// ===========================================================================
// Loading
// ===========================================================================

/// A loaded scenario: the ranked chain plus the file contents it came from.
///
/// The raw data is kept so the scenario can be written back after a run
/// with its sales and lead-time inputs untouched.
#[derive(Debug)]
pub struct Scenario {
    pub chain: SupplyChain,
    pub run: Option<RunConfig>,
    pub data: ScenarioData,
}

/// Load a scenario file and build its supply chain.
pub fn load_scenario(path: &Path) -> Result<Scenario, DataLoadError> {
    let data: ScenarioData = deserialize_file(path)?;
    let chain = build_chain(&data)?;
    debug!(
        file = %path.display(),
        nodes = chain.node_count(),
        edges = chain.edge_count(),
        max_llc = ?chain.max_llc(),
        "loaded scenario"
    );
    Ok(Scenario {
        chain,
        run: data.run.clone(),
        data,
    })
}

/// Build and rank a supply chain from scenario data.
///
/// Edges may be listed on either or both of their endpoints; both nodes end
/// up carrying the edge. Nodes are added in file order, which is also the
/// order nodes of the same low-level code are replenished in.
pub fn build_chain(data: &ScenarioData) -> Result<SupplyChain, DataLoadError> {
    let edges = collect_links(data)?;

    let mut nodes = Vec::with_capacity(data.nodes.len());
    for (id, node_data) in &data.nodes {
        let predecessors: Vec<Edge> = edges
            .iter()
            .filter(|e| e.destination.as_str() == id)
            .cloned()
            .collect();
        let successors: Vec<Edge> = edges
            .iter()
            .filter(|e| e.source.as_str() == id)
            .cloned()
            .collect();
        nodes.push(build_node(id, node_data, predecessors, successors)?);
    }

    Ok(SupplyChain::from_nodes(nodes)?)
}

/// Every edge named anywhere in the scenario, once, in listing order.
fn collect_links(data: &ScenarioData) -> Result<Vec<Edge>, DataLoadError> {
    let mut edges: Vec<Edge> = Vec::new();
    let mut seen: HashMap<(String, String), usize> = HashMap::new();

    for (id, node) in &data.nodes {
        let listed = node
            .predecessors
            .iter()
            .map(|link| (link.id().to_string(), id.clone(), link.number()))
            .chain(
                node.successors
                    .iter()
                    .map(|link| (id.clone(), link.id().to_string(), link.number())),
            );

        for (from, to, number) in listed {
            match seen.get(&(from.clone(), to.clone())) {
                Some(&i) if edges[i].number != number => {
                    return Err(DataLoadError::EdgeConflict {
                        from,
                        to,
                        first: edges[i].number,
                        second: number,
                    });
                }
                Some(_) => {}
                None => {
                    seen.insert((from.clone(), to.clone()), edges.len());
                    edges.push(Edge::new(from, to, number));
                }
            }
        }
    }
    Ok(edges)
}

fn build_node(
    id: &str,
    data: &NodeData,
    predecessors: Vec<Edge>,
    successors: Vec<Edge>,
) -> Result<Node, DataLoadError> {
    let lead_time = match &data.lead_time {
        None => QueuedLeadTime::default(),
        Some(LeadTimeData::Constant(lead_time)) => QueuedLeadTime::constant(*lead_time),
        Some(LeadTimeData::Queue { queue, default }) => {
            QueuedLeadTime::new(parse_periods(id, "lead_time", queue)?, *default)
        }
    };

    let sales = match &data.sales {
        None => Ok(ScheduledSales::none()),
        Some(SalesData::List(list)) => ScheduledSales::from_list(list.clone()),
        Some(SalesData::Schedule(schedule)) => {
            ScheduledSales::new(parse_periods(id, "sales", schedule)?)
        }
    }
    .map_err(|cause| DataLoadError::InvalidSales {
        node: id.to_string(),
        cause,
    })?;

    let mut node = Node::new(id, Box::new(lead_time), Box::new(sales), predecessors, successors)?;

    for (item, stock) in &data.stock {
        let batches: Vec<StockBatch> = match stock {
            StockData::Total(0) => Vec::new(),
            StockData::Total(quantity) => vec![StockBatch::new(*quantity, None)],
            StockData::Batches(batches) => batches
                .iter()
                .map(|b| StockBatch::new(b.quantity, b.period))
                .collect(),
        };
        node.stock_mut()
            .initialize(item.as_str(), batches)
            .map_err(|cause| DataLoadError::Stock {
                node: id.to_string(),
                cause,
            })?;
    }

    for receipt in &data.pipeline {
        node.pipeline_mut().push(Receipt::new(
            receipt.item.as_str(),
            receipt.quantity,
            receipt.eta,
        ));
    }

    for (item, &quantity) in &data.orders {
        node.orders_mut().add(item.as_str(), quantity);
    }

    let backorders: BTreeMap<Period, Quantity> = match &data.backorders {
        None => BTreeMap::new(),
        Some(BackOrdersData::Total(quantity)) => BTreeMap::from([(0, *quantity)]),
        Some(BackOrdersData::ByPeriod(by_period)) => parse_periods(id, "backorders", by_period)?,
    };
    for (period, quantity) in backorders {
        if quantity == 0 {
            continue;
        }
        node.backorders_mut()
            .add(quantity, period)
            .map_err(|cause| DataLoadError::BackOrders {
                node: id.to_string(),
                cause,
            })?;
    }

    node.data = data.data.clone();
    Ok(node)
}

/// Convert string period keys into periods.
fn parse_periods<V: Clone>(
    node: &str,
    field: &'static str,
    map: &BTreeMap<String, V>,
) -> Result<BTreeMap<Period, V>, DataLoadError> {
    map.iter()
        .map(|(key, value)| {
            key.trim()
                .parse::<Period>()
                .map(|period| (period, value.clone()))
                .map_err(|_| DataLoadError::InvalidPeriod {
                    node: node.to_string(),
                    field,
                    key: key.clone(),
                })
        })
        .collect()
}

// ===========================================================================
// Saving
// ===========================================================================

/// Overwrite the resumable state of every node in `data` with the state in
/// `chain`: stock, pipeline, orders, backorders and free-form data.
///
/// Sales, lead times and topology are left as written. Pipeline etas and
/// backorder periods are re-expressed relative to a fresh run starting at
/// period 1, so loading the result continues where the chain stopped.
pub fn update_scenario(data: &mut ScenarioData, chain: &SupplyChain) {
    for node in chain.nodes() {
        let entry = data.nodes.entry(node.id().to_string()).or_default();
        let shift = node.pipeline().period().saturating_sub(1);

        entry.stock = node
            .stock()
            .iter()
            .filter(|(_, total)| *total > 0)
            .map(|(item, total)| (item.to_string(), stock_data(node, item, total)))
            .collect();

        entry.pipeline = node
            .pipeline()
            .receipts()
            .iter()
            .map(|r| ReceiptData {
                item: r.item.to_string(),
                quantity: r.quantity,
                eta: r.eta.saturating_sub(shift),
            })
            .collect();

        entry.orders = node
            .orders()
            .iter()
            .map(|(item, quantity)| (item.to_string(), quantity))
            .collect();

        entry.backorders = if node.backorders().is_empty() {
            None
        } else {
            let mut by_period: BTreeMap<String, Quantity> = BTreeMap::new();
            for (period, quantity) in node.backorders().by_period() {
                *by_period
                    .entry(period.saturating_sub(shift).to_string())
                    .or_insert(0) += quantity;
            }
            Some(BackOrdersData::ByPeriod(by_period))
        };

        entry.data = node.data.clone();
    }
}

fn stock_data(node: &Node, item: &NodeId, total: Quantity) -> StockData {
    let batches: Vec<BatchData> = node
        .stock()
        .batches(item)
        .map(|b| BatchData {
            quantity: b.quantity,
            period: b.period,
        })
        .collect();
    match batches.as_slice() {
        [BatchData { period: None, .. }] => StockData::Total(total),
        _ => StockData::Batches(batches),
    }
}

/// Write a scenario file in the format implied by `path`.
pub fn save_scenario(path: &Path, data: &ScenarioData) -> Result<(), DataLoadError> {
    serialize_file(path, data)?;
    debug!(file = %path.display(), nodes = data.nodes.len(), "saved scenario");
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
