//! Shared test helpers for unit and integration tests.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests and, via the `test-utils` feature, in the
//! integration tests of this and downstream crates.

use crate::engine::{SimError, Simulator};
use crate::graph::{Edge, SupplyChain};
use crate::id::{Period, Quantity};
use crate::metrics::MetricEvent;
use crate::node::Node;
use crate::policy::{BaseStock, ReleaseAll};
use crate::sim::RunConfig;
use crate::strategy::{QueuedLeadTime, ScheduledSales};

// ===========================================================================
// Node constructors
// ===========================================================================

/// A fully specified node. Panics on invalid input; tests only.
pub fn make_node(
    id: &str,
    lead_time: Period,
    sales: Vec<Vec<Quantity>>,
    predecessors: &[(&str, Quantity)],
    successors: &[(&str, Quantity)],
) -> Node {
    Node::new(
        id,
        Box::new(QueuedLeadTime::constant(lead_time)),
        Box::new(ScheduledSales::from_list(sales).expect("valid sales")),
        predecessors
            .iter()
            .map(|&(from, number)| Edge::new(from, id, number))
            .collect(),
        successors
            .iter()
            .map(|&(to, number)| Edge::new(id, to, number))
            .collect(),
    )
    .expect("valid node")
}

/// A node with lead time 1 and no sales.
pub fn node(id: &str, predecessors: &[(&str, Quantity)], successors: &[(&str, Quantity)]) -> Node {
    make_node(id, 1, Vec::new(), predecessors, successors)
}

/// A standalone node with no edges.
pub fn supplier(id: &str) -> Node {
    node(id, &[], &[])
}

/// Give a node some of its own item, tagged with period 0.
pub fn with_stock(mut node: Node, quantity: Quantity) -> Node {
    let id = node.id().clone();
    node.stock_mut()
        .add(&id, quantity, Some(0))
        .expect("stock within range");
    node
}

/// Set the order-up-to level read by [`BaseStock`].
pub fn with_base_stock(mut node: Node, level: Quantity) -> Node {
    node.data.insert("base_stock".into(), serde_json::json!(level));
    node
}

// ===========================================================================
// Chain builders
// ===========================================================================

/// Build and rank a chain. Panics on invalid topology; tests only.
pub fn build_chain(nodes: Vec<Node>) -> SupplyChain {
    SupplyChain::from_nodes(nodes).expect("valid chain")
}

/// Retailer `R` with the given sales, fed one-for-one by supplier `W`.
///
/// Both nodes start with `stock` of their own item and a base-stock level of
/// `level`. Lead times are 1.
pub fn two_echelon(sales: Vec<Vec<Quantity>>, stock: Quantity, level: Quantity) -> SupplyChain {
    let r = make_node("R", 1, sales, &[("W", 1)], &[]);
    let w = node("W", &[], &[("R", 1)]);
    build_chain(vec![
        with_base_stock(with_stock(r, stock), level),
        with_base_stock(with_stock(w, stock), level),
    ])
}

// ===========================================================================
// Runners
// ===========================================================================

/// A simulator over `chain` with [`BaseStock`] control, [`ReleaseAll`]
/// release and an in-memory event sink.
pub fn base_stock_simulator(chain: SupplyChain, config: RunConfig) -> Simulator<Vec<MetricEvent>> {
    Simulator::new(
        chain,
        config,
        Box::new(BaseStock::new()),
        Box::new(ReleaseAll),
        Vec::new(),
    )
    .expect("valid simulator")
}

/// Run a base-stock simulation to completion and return every event.
pub fn run_base_stock(chain: SupplyChain, config: RunConfig) -> Result<Vec<MetricEvent>, SimError> {
    let mut sim = base_stock_simulator(chain, config);
    sim.run()?;
    Ok(sim.into_parts().1)
}
