//! A node of the supply chain and its per-period behaviors.
//!
//! A node owns its inventory state outright: [`Stock`], [`BackOrders`],
//! [`Pipeline`] and [`Orders`]. Stock is keyed by item id; the node's own
//! item is keyed by the node id, components received from predecessors are
//! keyed by the predecessor's id.
//!
//! The simulator calls the per-period behaviors in a fixed order:
//! [`Node::satisfy_received_receipts`], [`Node::assemble`],
//! [`Node::satisfy_backorders`], [`Node::satisfy_sales`],
//! [`Node::update_pipeline`].

use crate::backorders::{BackOrderError, BackOrders};
use crate::graph::Edge;
use crate::id::{ItemId, ItemKey, NodeId, Period, Quantity, item_key};
use crate::metrics::{EventKind, MetricContext, MetricEvent, MetricsSink};
use crate::orders::{OrderError, Orders};
use crate::pipeline::Pipeline;
use crate::stock::{Stock, StockError};
use crate::strategy::{LeadTime, Sales, StrategyError};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised while building or running a node.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NodeError {
    #[error("predecessor edge {from} -> {to} does not end at node {node}")]
    InvalidPredecessor {
        node: NodeId,
        from: NodeId,
        to: NodeId,
    },
    #[error("successor edge {from} -> {to} does not start at node {node}")]
    InvalidSuccessor {
        node: NodeId,
        from: NodeId,
        to: NodeId,
    },
    #[error("edge {from} -> {to} has a zero consumption number")]
    ZeroEdgeNumber { from: NodeId, to: NodeId },
    #[error("duplicate edge {from} -> {to}")]
    DuplicateEdge { from: NodeId, to: NodeId },
    #[error("{what} of period {period} exceed the quantity range")]
    QuantityOverflow { what: &'static str, period: Period },
    #[error(transparent)]
    Stock(#[from] StockError),
    #[error(transparent)]
    BackOrders(#[from] BackOrderError),
    #[error(transparent)]
    Orders(#[from] OrderError),
    #[error(transparent)]
    Strategy(#[from] StrategyError),
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// What happened when a node served one period of sales.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SalesOutcome {
    pub requested: Quantity,
    pub satisfied: Quantity,
    pub backordered: Quantity,
    pub lines: Quantity,
    pub lines_satisfied: Quantity,
}

impl SalesOutcome {
    pub fn lines_backordered(&self) -> Quantity {
        self.lines - self.lines_satisfied
    }
}

/// Number of order lines, taken in list order, whose running total fits in
/// `feasible`. A line that would overflow ends the count.
pub fn lines_covered(lines: &[Quantity], feasible: Quantity) -> Quantity {
    let mut cumulative: Quantity = 0;
    let mut covered = 0;
    for &line in lines {
        match cumulative.checked_add(line) {
            Some(next) if next <= feasible => cumulative = next,
            _ => break,
        }
        covered += 1;
    }
    covered
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// A stocking point in the supply chain.
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    lead_time: Box<dyn LeadTime>,
    sales: Box<dyn Sales>,
    predecessors: Vec<Edge>,
    successors: Vec<Edge>,
    backorders: BackOrders,
    pipeline: Pipeline,
    stock: Stock,
    orders: Orders,
    /// Free-form attributes, read by policies.
    pub data: BTreeMap<String, serde_json::Value>,
    /// Assigned by [`SupplyChain`](crate::graph::SupplyChain), never by the node.
    llc: Option<u32>,
}

impl Node {
    /// Create a node with its edges.
    ///
    /// Every predecessor edge must end at `id`, every successor edge must
    /// start at `id`, and every edge must consume a positive number of units.
    pub fn new(
        id: impl Into<NodeId>,
        lead_time: Box<dyn LeadTime>,
        sales: Box<dyn Sales>,
        predecessors: Vec<Edge>,
        successors: Vec<Edge>,
    ) -> Result<Self, NodeError> {
        let id = id.into();

        for edge in &predecessors {
            if edge.destination != id {
                return Err(NodeError::InvalidPredecessor {
                    node: id,
                    from: edge.source.clone(),
                    to: edge.destination.clone(),
                });
            }
        }
        for edge in &successors {
            if edge.source != id {
                return Err(NodeError::InvalidSuccessor {
                    node: id,
                    from: edge.source.clone(),
                    to: edge.destination.clone(),
                });
            }
        }
        for (i, edge) in predecessors.iter().chain(&successors).enumerate() {
            if edge.number == 0 {
                return Err(NodeError::ZeroEdgeNumber {
                    from: edge.source.clone(),
                    to: edge.destination.clone(),
                });
            }
            let duplicate = predecessors
                .iter()
                .chain(&successors)
                .take(i)
                .any(|e| e.source == edge.source && e.destination == edge.destination);
            if duplicate {
                return Err(NodeError::DuplicateEdge {
                    from: edge.source.clone(),
                    to: edge.destination.clone(),
                });
            }
        }

        Ok(Self {
            id,
            lead_time,
            sales,
            predecessors,
            successors,
            backorders: BackOrders::new(),
            pipeline: Pipeline::new(),
            stock: Stock::new(),
            orders: Orders::new(),
            data: BTreeMap::new(),
            llc: None,
        })
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn llc(&self) -> Option<u32> {
        self.llc
    }

    pub(crate) fn set_llc(&mut self, llc: Option<u32>) {
        self.llc = llc;
    }

    pub fn predecessors(&self) -> &[Edge] {
        &self.predecessors
    }

    pub fn successors(&self) -> &[Edge] {
        &self.successors
    }

    /// The predecessor edge supplying `item`, if any.
    pub fn predecessor<K: ItemKey + ?Sized>(&self, item: &K) -> Option<&Edge> {
        let key = item_key(item);
        self.predecessors.iter().find(|e| e.source.as_str() == key)
    }

    /// A node without predecessors is replenished externally.
    pub fn is_supplier(&self) -> bool {
        self.predecessors.is_empty()
    }

    pub fn stock(&self) -> &Stock {
        &self.stock
    }

    pub fn stock_mut(&mut self) -> &mut Stock {
        &mut self.stock
    }

    pub fn backorders(&self) -> &BackOrders {
        &self.backorders
    }

    pub fn backorders_mut(&mut self) -> &mut BackOrders {
        &mut self.backorders
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut Pipeline {
        &mut self.pipeline
    }

    pub fn orders(&self) -> &Orders {
        &self.orders
    }

    pub fn orders_mut(&mut self) -> &mut Orders {
        &mut self.orders
    }

    pub fn lead_time(&self) -> &dyn LeadTime {
        self.lead_time.as_ref()
    }

    pub fn lead_time_mut(&mut self) -> &mut dyn LeadTime {
        self.lead_time.as_mut()
    }

    pub fn sales(&self) -> &dyn Sales {
        self.sales.as_ref()
    }

    pub fn sales_mut(&mut self) -> &mut dyn Sales {
        self.sales.as_mut()
    }

    /// On-hand stock of the node's own item.
    pub fn own_stock(&self) -> Quantity {
        self.stock.get(&self.id)
    }

    // -----------------------------------------------------------------------
    // Per-period behaviors
    // -----------------------------------------------------------------------

    /// Move every arrived pipeline receipt into stock. Returns units received.
    pub fn satisfy_received_receipts(
        &mut self,
        ctx: &MetricContext,
        sink: &mut dyn MetricsSink,
    ) -> Result<Quantity, NodeError> {
        let mut received: Quantity = 0;
        for receipt in self.pipeline.pop_received() {
            self.stock.add(&receipt.item, receipt.quantity, Some(ctx.period))?;
            sink.record(MetricEvent::units(ctx, &receipt.item, EventKind::Receipt, receipt.quantity));
            received = received
                .checked_add(receipt.quantity)
                .ok_or(NodeError::QuantityOverflow {
                    what: "receipts",
                    period: ctx.period,
                })?;
        }
        Ok(received)
    }

    /// How many units of the own item current component stock allows.
    ///
    /// Suppliers have nothing to assemble and always return zero.
    pub fn assemblies_feasible(&self) -> Quantity {
        self.predecessors
            .iter()
            .map(|edge| self.stock.get(&edge.source) / edge.number)
            .min()
            .unwrap_or(0)
    }

    /// Turn component stock into own stock. Returns units assembled.
    ///
    /// The feasible count is fixed before any component is consumed.
    pub fn assemble(&mut self, ctx: &MetricContext, sink: &mut dyn MetricsSink) -> Result<Quantity, NodeError> {
        let feasible = self.assemblies_feasible();
        if feasible == 0 {
            return Ok(0);
        }
        for edge in &self.predecessors {
            self.stock.consume(&edge.source, feasible * edge.number)?;
        }
        self.stock.add(&self.id, feasible, Some(ctx.period))?;
        sink.record(MetricEvent::units(ctx, &self.id, EventKind::Assembly, feasible));
        Ok(feasible)
    }

    /// Ship own stock against outstanding backorders. Returns units shipped.
    pub fn satisfy_backorders(&mut self, ctx: &MetricContext, sink: &mut dyn MetricsSink) -> Result<Quantity, NodeError> {
        let outstanding = self.backorders.quantity();
        if outstanding == 0 {
            return Ok(0);
        }
        let feasible = self.own_stock().min(outstanding);
        if feasible == 0 {
            return Ok(0);
        }
        self.stock.consume(&self.id, feasible)?;
        self.backorders.deliver(feasible)?;
        sink.record(MetricEvent::units(ctx, &self.id, EventKind::BackOrdersShipped, feasible));
        Ok(feasible)
    }

    /// Serve this period's order lines from own stock; backorder the rest.
    pub fn satisfy_sales(&mut self, ctx: &MetricContext, sink: &mut dyn MetricsSink) -> Result<SalesOutcome, NodeError> {
        let lines = self.sales.get_sales(ctx.period)?;
        if lines.is_empty() {
            return Ok(SalesOutcome::default());
        }

        let requested = lines
            .iter()
            .try_fold(0, |sum: Quantity, &line| sum.checked_add(line))
            .ok_or(NodeError::QuantityOverflow {
                what: "order lines",
                period: ctx.period,
            })?;
        let satisfied = self.own_stock().min(requested);
        self.stock.consume(&self.id, satisfied)?;
        let backordered = requested - satisfied;
        if backordered > 0 {
            self.backorders.add(backordered, ctx.period)?;
        }

        let outcome = SalesOutcome {
            requested,
            satisfied,
            backordered,
            lines: lines.len() as Quantity,
            lines_satisfied: lines_covered(&lines, satisfied),
        };

        let sku = &self.id;
        sink.record(MetricEvent::units(ctx, sku, EventKind::Sales, outcome.requested));
        sink.record(MetricEvent::units(ctx, sku, EventKind::SalesSatisfied, outcome.satisfied));
        sink.record(MetricEvent::units(ctx, sku, EventKind::SalesBackordered, outcome.backordered));
        sink.record(MetricEvent::lines(ctx, sku, EventKind::OrderLines, outcome.lines));
        sink.record(MetricEvent::lines(ctx, sku, EventKind::OrderLinesSatisfied, outcome.lines_satisfied));
        sink.record(MetricEvent::lines(ctx, sku, EventKind::OrderLinesBackordered, outcome.lines_backordered()));

        Ok(outcome)
    }

    /// Advance the pipeline to the next period.
    pub fn update_pipeline(&mut self) {
        self.pipeline.update_pipeline();
    }

    /// Emit end-of-period state snapshots (debug-level events).
    pub fn emit_snapshot(&self, ctx: &MetricContext, sink: &mut dyn MetricsSink) {
        for (item, quantity) in self.stock.iter() {
            sink.record(MetricEvent::units(ctx, item, EventKind::Stock, quantity));
        }
        sink.record(MetricEvent::units(ctx, &self.id, EventKind::BackOrders, self.backorders.quantity()));

        let mut in_transit: BTreeMap<&ItemId, Quantity> = BTreeMap::new();
        for receipt in self.pipeline.receipts() {
            *in_transit.entry(&receipt.item).or_insert(0) += receipt.quantity;
        }
        for (item, quantity) in in_transit {
            sink.record(MetricEvent::units(ctx, item, EventKind::Pipeline, quantity));
        }
        for (item, quantity) in self.orders.iter() {
            sink.record(MetricEvent::units(ctx, item, EventKind::Orders, quantity));
        }
    }
}

impl ItemKey for Node {
    fn item_key(&self) -> &str {
        self.id.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{MetricKind, NullSink, PeriodContext};
    use crate::pipeline::Receipt;
    use crate::strategy::{QueuedLeadTime, ScheduledSales};

    fn ctx(node: &Node, period: u64) -> MetricContext {
        PeriodContext::new(period, 1).for_node(node.id())
    }

    fn node_with_sales(id: &str, sales: Vec<Vec<Quantity>>, predecessors: Vec<Edge>) -> Node {
        Node::new(
            id,
            Box::new(QueuedLeadTime::constant(1)),
            Box::new(ScheduledSales::from_list(sales).unwrap()),
            predecessors,
            Vec::new(),
        )
        .unwrap()
    }

    #[test]
    fn rejects_predecessor_not_ending_here() {
        let err = Node::new(
            "A",
            Box::new(QueuedLeadTime::constant(1)),
            Box::new(ScheduledSales::none()),
            vec![Edge::new("B", "C", 1)],
            Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(err, NodeError::InvalidPredecessor { .. }));
    }

    #[test]
    fn rejects_successor_not_starting_here() {
        let err = Node::new(
            "A",
            Box::new(QueuedLeadTime::constant(1)),
            Box::new(ScheduledSales::none()),
            Vec::new(),
            vec![Edge::new("B", "C", 1)],
        )
        .unwrap_err();
        assert!(matches!(err, NodeError::InvalidSuccessor { .. }));
    }

    #[test]
    fn rejects_zero_number_and_duplicates() {
        let zero = Node::new(
            "A",
            Box::new(QueuedLeadTime::constant(1)),
            Box::new(ScheduledSales::none()),
            vec![Edge::new("B", "A", 0)],
            Vec::new(),
        );
        assert!(matches!(zero, Err(NodeError::ZeroEdgeNumber { .. })));

        let dup = Node::new(
            "A",
            Box::new(QueuedLeadTime::constant(1)),
            Box::new(ScheduledSales::none()),
            vec![Edge::new("B", "A", 1), Edge::new("B", "A", 2)],
            Vec::new(),
        );
        assert!(matches!(dup, Err(NodeError::DuplicateEdge { .. })));
    }

    #[test]
    fn node_resolves_as_item_key() {
        let node = node_with_sales("A", vec![], vec![]);
        let mut stock = Stock::new();
        stock.add("A", 2, None).unwrap();
        assert_eq!(stock.get(&node), 2);
    }

    #[test]
    fn receipts_enter_stock() {
        let mut node = node_with_sales("A", vec![], vec![Edge::new("B", "A", 1)]);
        node.pipeline_mut().push(Receipt::new("B", 4, 1));
        node.pipeline_mut().push(Receipt::new("A", 2, 3));
        let mut events: Vec<MetricEvent> = Vec::new();
        let c = ctx(&node, 1);
        assert_eq!(node.satisfy_received_receipts(&c, &mut events), Ok(4));
        assert_eq!(node.stock().get("B"), 4);
        assert_eq!(node.stock().get("A"), 0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, EventKind::Receipt);
    }

    #[test]
    fn supplier_assembles_nothing() {
        let mut node = node_with_sales("S", vec![], vec![]);
        node.stock_mut().add("S", 10, None).unwrap();
        assert_eq!(node.assemblies_feasible(), 0);
        let c = ctx(&node, 1);
        assert_eq!(node.assemble(&c, &mut NullSink).unwrap(), 0);
        assert_eq!(node.own_stock(), 10);
    }

    #[test]
    fn assemble_two_for_one() {
        let mut node = node_with_sales("A", vec![], vec![Edge::new("B", "A", 2)]);
        node.stock_mut().add("B", 10, Some(1)).unwrap();
        assert_eq!(node.assemblies_feasible(), 5);

        let c = ctx(&node, 2);
        let mut events: Vec<MetricEvent> = Vec::new();
        assert_eq!(node.assemble(&c, &mut events).unwrap(), 5);
        assert_eq!(node.stock().get("B"), 0);
        assert_eq!(node.own_stock(), 5);
        assert_eq!(events[0].event, EventKind::Assembly);
        assert_eq!(events[0].quantity, 5);
    }

    #[test]
    fn assemble_limited_by_scarcest_component() {
        let mut node = node_with_sales(
            "A",
            vec![],
            vec![Edge::new("B", "A", 2), Edge::new("C", "A", 3)],
        );
        node.stock_mut().add("B", 9, None).unwrap();
        node.stock_mut().add("C", 7, None).unwrap();
        assert_eq!(node.assemblies_feasible(), 2);
        let c = ctx(&node, 1);
        node.assemble(&c, &mut NullSink).unwrap();
        assert_eq!(node.stock().get("B"), 5);
        assert_eq!(node.stock().get("C"), 1);
        assert_eq!(node.own_stock(), 2);
    }

    #[test]
    fn backorders_cleared_up_to_stock() {
        let mut node = node_with_sales("A", vec![], vec![]);
        node.backorders_mut().add(5, 1).unwrap();
        node.stock_mut().add("A", 3, None).unwrap();
        let c = ctx(&node, 2);
        assert_eq!(node.satisfy_backorders(&c, &mut NullSink).unwrap(), 3);
        assert_eq!(node.backorders().quantity(), 2);
        assert_eq!(node.own_stock(), 0);

        node.stock_mut().add("A", 10, None).unwrap();
        assert_eq!(node.satisfy_backorders(&c, &mut NullSink).unwrap(), 2);
        assert!(node.backorders().is_empty());
        assert_eq!(node.own_stock(), 8);
    }

    #[test]
    fn sales_partially_satisfied_counts_lines() {
        let mut node = node_with_sales("A", vec![vec![2, 2]], vec![]);
        node.stock_mut().add("A", 3, None).unwrap();
        let c = ctx(&node, 1);
        let mut events: Vec<MetricEvent> = Vec::new();
        let outcome = node.satisfy_sales(&c, &mut events).unwrap();

        assert_eq!(
            outcome,
            SalesOutcome {
                requested: 4,
                satisfied: 3,
                backordered: 1,
                lines: 2,
                lines_satisfied: 1,
            }
        );
        assert_eq!(node.own_stock(), 0);
        assert_eq!(node.backorders().by_period().collect::<Vec<_>>(), vec![(1, 1)]);

        let kinds: Vec<EventKind> = events.iter().map(|e| e.event).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::Sales,
                EventKind::SalesSatisfied,
                EventKind::SalesBackordered,
                EventKind::OrderLines,
                EventKind::OrderLinesSatisfied,
                EventKind::OrderLinesBackordered,
            ]
        );
        assert_eq!(events[5].quantity, 1);
        assert_eq!(events[5].metric, MetricKind::Lines);
    }

    #[test]
    fn sales_past_quantity_range_fail_without_shipping() {
        let mut node = node_with_sales("A", vec![vec![Quantity::MAX, 1]], vec![]);
        node.stock_mut().add("A", 5, None).unwrap();
        let c = ctx(&node, 1);
        let mut events: Vec<MetricEvent> = Vec::new();

        assert_eq!(
            node.satisfy_sales(&c, &mut events),
            Err(NodeError::QuantityOverflow {
                what: "order lines",
                period: 1,
            })
        );
        assert_eq!(node.own_stock(), 5);
        assert!(node.backorders().is_empty());
        assert!(events.is_empty());
    }

    #[test]
    fn lines_covered_at_quantity_range_limit() {
        assert_eq!(lines_covered(&[2, Quantity::MAX], Quantity::MAX), 1);
        assert_eq!(lines_covered(&[Quantity::MAX], Quantity::MAX), 1);
    }

    #[test]
    fn sales_without_lines_emit_nothing() {
        let mut node = node_with_sales("A", vec![], vec![]);
        let c = ctx(&node, 1);
        let mut events: Vec<MetricEvent> = Vec::new();
        assert_eq!(node.satisfy_sales(&c, &mut events).unwrap(), SalesOutcome::default());
        assert!(events.is_empty());
    }

    #[test]
    fn lines_covered_stops_at_first_overflow() {
        assert_eq!(lines_covered(&[2, 2], 3), 1);
        assert_eq!(lines_covered(&[5, 1], 4), 0);
        assert_eq!(lines_covered(&[1, 1, 1], 3), 3);
        assert_eq!(lines_covered(&[], 3), 0);
    }

    #[test]
    fn snapshot_reports_every_bucket() {
        let mut node = node_with_sales("A", vec![], vec![Edge::new("B", "A", 1)]);
        node.stock_mut().add("A", 1, None).unwrap();
        node.pipeline_mut().push(Receipt::new("B", 2, 5));
        node.pipeline_mut().push(Receipt::new("B", 3, 6));
        node.orders_mut().add("B", 4);
        let c = ctx(&node, 1);
        let mut events: Vec<MetricEvent> = Vec::new();
        node.emit_snapshot(&c, &mut events);
        let summary: Vec<(EventKind, &str, Quantity)> = events
            .iter()
            .map(|e| (e.event, e.sku.as_str(), e.quantity))
            .collect();
        assert_eq!(
            summary,
            vec![
                (EventKind::Stock, "A", 1),
                (EventKind::BackOrders, "A", 0),
                (EventKind::Pipeline, "B", 5),
                (EventKind::Orders, "B", 4),
            ]
        );
    }
}
