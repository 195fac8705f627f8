//! The simulator: owns the supply chain and drives it period by period
//! through the six-phase pipeline.
//!
//! # Six-Phase Pipeline
//!
//! Each `step()` runs one period:
//! 1. **Receive** -- every node moves arrived pipeline receipts into stock
//! 2. **Assemble** -- every node turns component stock into its own item
//! 3. **Backorders** -- every node ships own stock against backorders
//! 4. **Sales** -- every node serves this period's order lines
//! 5. **Pipeline** -- every node advances its pipeline
//! 6. **Replenish** -- for LLC 0 up to the maximum LLC, and for each node
//!    at that LLC in chain order: the control policy places orders, the
//!    release policy releases them, and each release becomes a pipeline
//!    receipt (consuming the predecessor's own stock where applicable)
//!
//! Phases 1-5 touch only the node's own state. With the `parallel` feature
//! they run across nodes on the rayon pool; events are buffered per node
//! and flushed in chain order, so the event sequence is identical either
//! way. Phase 6 reads and writes across nodes and is always sequential.
//!
//! Any node-level error aborts the run. Nothing is clamped.

use crate::graph::SupplyChain;
use crate::id::{ItemId, NodeId, Period, Quantity};
use crate::metrics::{EventKind, MetricContext, MetricEvent, MetricsSink, NullSink, PeriodContext};
use crate::node::{Node, NodeError, SalesOutcome};
use crate::pipeline::Receipt;
use crate::policy::{ControlPolicy, PolicyError, ReleasePolicy};
use crate::sim::{ConfigError, RunConfig, RunState, RunSummary};
use std::fmt;
use tracing::{debug, info, trace, warn};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that stop a run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),
    #[error("period {period}, node {node}: {source}")]
    Invariant {
        period: Period,
        node: NodeId,
        source: NodeError,
    },
    #[error("period {period}, node {node}: policy failed: {source}")]
    Policy {
        period: Period,
        node: NodeId,
        source: PolicyError,
    },
    #[error("period {period}, node {node}: released {item}, which is neither its own item nor a predecessor")]
    UnknownRelease {
        period: Period,
        node: NodeId,
        item: ItemId,
    },
    #[error("run was aborted in period {period}")]
    Aborted { period: Period },
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

/// Runs a [`SupplyChain`] for `loops × periods_per_loop` periods.
pub struct Simulator<S: MetricsSink = NullSink> {
    chain: SupplyChain,
    config: RunConfig,
    control: Box<dyn ControlPolicy>,
    release: Box<dyn ReleasePolicy>,
    sink: S,
    state: RunState,
    /// Last completed period, 0 before the first.
    period: Period,
}

/// Unit totals across all nodes for one period, for logging.
#[derive(Debug, Default)]
struct PeriodTotals {
    received: Quantity,
    assembled: Quantity,
    shipped: Quantity,
    requested: Quantity,
    satisfied: Quantity,
    released: Quantity,
}

impl<S: MetricsSink> Simulator<S> {
    /// Create a simulator. Fails if the config is invalid or any node lacks
    /// a low-level code; no period runs in that case.
    pub fn new(
        chain: SupplyChain,
        config: RunConfig,
        control: Box<dyn ControlPolicy>,
        release: Box<dyn ReleasePolicy>,
        sink: S,
    ) -> Result<Self, SimError> {
        config.validate()?;
        if let Some(id) = chain.first_unranked() {
            return Err(ConfigError::MissingLlc(id.clone()).into());
        }
        Ok(Self {
            chain,
            config,
            control,
            release,
            sink,
            state: RunState::NotStarted,
            period: 0,
        })
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn chain(&self) -> &SupplyChain {
        &self.chain
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Last completed period, 0 before the first.
    pub fn period(&self) -> Period {
        self.period
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Give back the chain and the sink.
    pub fn into_parts(self) -> (SupplyChain, S) {
        (self.chain, self.sink)
    }

    // -----------------------------------------------------------------------
    // Advance
    // -----------------------------------------------------------------------

    /// Run one period. A finished run stays finished; an aborted run
    /// returns [`SimError::Aborted`].
    pub fn step(&mut self) -> Result<RunState, SimError> {
        match self.state {
            RunState::Finished => return Ok(RunState::Finished),
            RunState::Aborted { period } => return Err(SimError::Aborted { period }),
            RunState::NotStarted => info!(
                nodes = self.chain.node_count(),
                loops = self.config.loops,
                periods_per_loop = self.config.periods_per_loop,
                "simulation started"
            ),
            RunState::Period(_) => {}
        }

        let period = self.period + 1;
        let loop_number = self.config.loop_of(period);
        let ctx = PeriodContext::new(period, loop_number);

        let totals = match self.run_period(&ctx) {
            Ok(totals) => totals,
            Err(err) => {
                warn!(period, loop_index = loop_number, error = %err, "simulation aborted");
                self.state = RunState::Aborted { period };
                return Err(err);
            }
        };
        debug!(
            period,
            loop_index = loop_number,
            received = totals.received,
            assembled = totals.assembled,
            shipped = totals.shipped,
            requested = totals.requested,
            satisfied = totals.satisfied,
            released = totals.released,
            "period complete"
        );

        self.period = period;
        if self.config.ends_loop(period) {
            self.end_loop(loop_number);
        }
        self.state = if period >= self.config.total_periods() {
            info!(periods = period, "simulation finished");
            RunState::Finished
        } else {
            RunState::Period(period)
        };
        Ok(self.state)
    }

    /// Run every remaining period.
    pub fn run(&mut self) -> Result<RunSummary, SimError> {
        while !self.step()?.is_terminal() {}
        Ok(RunSummary {
            periods: self.period,
            loops: self.config.loops,
            state_hash: self.chain.state_hash(),
        })
    }

    // -----------------------------------------------------------------------
    // Internal: single period
    // -----------------------------------------------------------------------

    fn run_period(&mut self, ctx: &PeriodContext) -> Result<PeriodTotals, SimError> {
        let mut totals = PeriodTotals::default();

        // Phase 1: Receive.
        totals.received = self
            .node_phase(ctx, "receive", |node, ctx, sink| {
                node.satisfy_received_receipts(ctx, sink)
            })?
            .into_iter()
            .fold(0, Quantity::saturating_add);

        // Phase 2: Assemble.
        totals.assembled = self
            .node_phase(ctx, "assemble", |node, ctx, sink| node.assemble(ctx, sink))?
            .into_iter()
            .fold(0, Quantity::saturating_add);

        // Phase 3: Backorders.
        totals.shipped = self
            .node_phase(ctx, "backorders", |node, ctx, sink| {
                node.satisfy_backorders(ctx, sink)
            })?
            .into_iter()
            .fold(0, Quantity::saturating_add);

        // Phase 4: Sales.
        let outcomes: Vec<SalesOutcome> =
            self.node_phase(ctx, "sales", |node, ctx, sink| node.satisfy_sales(ctx, sink))?;
        for outcome in &outcomes {
            totals.requested = totals.requested.saturating_add(outcome.requested);
            totals.satisfied = totals.satisfied.saturating_add(outcome.satisfied);
        }

        // Phase 5: Pipeline.
        self.node_phase(ctx, "pipeline", |node, _ctx, _sink| {
            node.update_pipeline();
            Ok(())
        })?;

        // Phase 6: Replenish.
        totals.released = self.phase_replenish(ctx)?;

        if self.config.emit_snapshots {
            for node in self.chain.nodes() {
                node.emit_snapshot(&ctx.for_node(node.id()), &mut self.sink);
            }
        }
        Ok(totals)
    }

    // -----------------------------------------------------------------------
    // Phases 1-5: node-local
    // -----------------------------------------------------------------------

    /// Apply `phase` to every node in chain order, collecting its results.
    #[cfg(not(feature = "parallel"))]
    fn node_phase<T, F>(&mut self, ctx: &PeriodContext, name: &'static str, phase: F) -> Result<Vec<T>, SimError>
    where
        T: Send,
        F: Fn(&mut Node, &MetricContext, &mut dyn MetricsSink) -> Result<T, NodeError> + Sync,
    {
        trace!(period = ctx.period, phase = name, "phase start");
        let sink: &mut dyn MetricsSink = &mut self.sink;
        let nodes = self.chain.nodes_mut();
        let mut results = Vec::with_capacity(nodes.len());
        for node in nodes.iter_mut() {
            let node_ctx = ctx.for_node(node.id());
            let value = phase(node, &node_ctx, sink).map_err(|source| SimError::Invariant {
                period: ctx.period,
                node: node_ctx.node.clone(),
                source,
            })?;
            results.push(value);
        }
        Ok(results)
    }

    /// Apply `phase` to every node on the rayon pool. Events are buffered
    /// per node and flushed in chain order.
    #[cfg(feature = "parallel")]
    fn node_phase<T, F>(&mut self, ctx: &PeriodContext, name: &'static str, phase: F) -> Result<Vec<T>, SimError>
    where
        T: Send,
        F: Fn(&mut Node, &MetricContext, &mut dyn MetricsSink) -> Result<T, NodeError> + Sync,
    {
        use rayon::prelude::*;

        trace!(period = ctx.period, phase = name, "phase start");
        let buffered: Vec<(NodeId, Vec<MetricEvent>, Result<T, NodeError>)> = self
            .chain
            .nodes_mut()
            .par_iter_mut()
            .map(|node| {
                let node_ctx = ctx.for_node(node.id());
                let mut events: Vec<MetricEvent> = Vec::new();
                let result = phase(node, &node_ctx, &mut events);
                (node_ctx.node, events, result)
            })
            .collect();

        let mut results = Vec::with_capacity(buffered.len());
        for (node, events, result) in buffered {
            for event in events {
                self.sink.record(event);
            }
            let value = result.map_err(|source| SimError::Invariant {
                period: ctx.period,
                node,
                source,
            })?;
            results.push(value);
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Phase 6: Replenish
    // -----------------------------------------------------------------------

    fn phase_replenish(&mut self, ctx: &PeriodContext) -> Result<Quantity, SimError> {
        trace!(period = ctx.period, phase = "replenish", "phase start");
        let mut released: Quantity = 0;
        let max_llc = self.chain.max_llc().unwrap_or(0);
        for llc in 0..=max_llc {
            let ids: Vec<NodeId> = self.chain.nodes_by_llc(llc).map(|n| n.id().clone()).collect();
            for id in ids {
                let node_ctx = ctx.for_node(&id);
                self.place_orders(&node_ctx)?;
                released = Quantity::saturating_add(released, self.release_orders(&node_ctx)?);
            }
        }
        Ok(released)
    }

    fn place_orders(&mut self, ctx: &MetricContext) -> Result<(), SimError> {
        let Some(node) = self.chain.node(&ctx.node) else {
            return Ok(());
        };
        let orders = self
            .control
            .get_orders(&self.chain, node, ctx.period)
            .map_err(|source| SimError::Policy {
                period: ctx.period,
                node: ctx.node.clone(),
                source,
            })?;
        for (item, quantity) in orders.iter() {
            self.sink.record(MetricEvent::units(ctx, item, EventKind::Order, quantity));
        }
        if let Some(node) = self.chain.node_mut(&ctx.node) {
            node.orders_mut()
                .merge(&orders)
                .map_err(|e| SimError::Invariant {
                    period: ctx.period,
                    node: ctx.node.clone(),
                    source: e.into(),
                })?;
        }
        Ok(())
    }

    fn release_orders(&mut self, ctx: &MetricContext) -> Result<Quantity, SimError> {
        let Some(node) = self.chain.node(&ctx.node) else {
            return Ok(0);
        };
        let releases = self
            .release
            .get_releases(&self.chain, node)
            .map_err(|source| SimError::Policy {
                period: ctx.period,
                node: ctx.node.clone(),
                source,
            })?;

        let mut total: Quantity = 0;
        for (item, quantity) in releases.iter() {
            let eta = self.apply_release(ctx, item, quantity)?;
            self.sink.record(
                MetricEvent::units(ctx, item, EventKind::Release, quantity)
                    .with_message(format!("arrives in period {eta}")),
            );
            total = total.saturating_add(quantity);
        }
        Ok(total)
    }

    /// Turn `quantity` of an outstanding order for `item` into a receipt.
    ///
    /// The order line shrinks by `quantity`. If `item` is a predecessor, its
    /// node ships `quantity` of own stock; if it is the node's own item the
    /// supply is external. The receipt arrives at `period + lead time`, which
    /// is returned.
    fn apply_release(&mut self, ctx: &MetricContext, item: &ItemId, quantity: Quantity) -> Result<Period, SimError> {
        let period = ctx.period;
        let invariant = |node: &NodeId, source: NodeError| SimError::Invariant {
            period,
            node: node.clone(),
            source,
        };

        let Some(node) = self.chain.node_mut(&ctx.node) else {
            return Ok(period);
        };
        let from_upstream = if item == node.id() {
            false
        } else if node.predecessor(item).is_some() {
            true
        } else {
            return Err(SimError::UnknownRelease {
                period,
                node: ctx.node.clone(),
                item: item.clone(),
            });
        };
        node.orders_mut()
            .remove(item, quantity)
            .map_err(|e| invariant(&ctx.node, e.into()))?;
        let lead_time = node
            .lead_time()
            .get_lead_time(period)
            .map_err(|e| invariant(&ctx.node, e.into()))?;
        let eta = period.checked_add(lead_time).ok_or_else(|| {
            invariant(
                &ctx.node,
                NodeError::QuantityOverflow {
                    what: "receipt arrivals",
                    period,
                },
            )
        })?;

        if from_upstream {
            if let Some(upstream) = self.chain.node_mut(item) {
                upstream
                    .stock_mut()
                    .consume(item, quantity)
                    .map_err(|e| invariant(item, e.into()))?;
            }
        }

        if let Some(node) = self.chain.node_mut(&ctx.node) {
            node.pipeline_mut()
                .push(Receipt::new(item.clone(), quantity, eta));
        }
        trace!(period, node = %ctx.node, item = %item, quantity, eta, "released");
        Ok(eta)
    }

    // -----------------------------------------------------------------------
    // Loop boundary
    // -----------------------------------------------------------------------

    /// Shift every per-period input forward by one loop.
    fn end_loop(&mut self, loop_number: u32) {
        let loop_size = self.config.periods_per_loop;
        for node in self.chain.nodes_mut() {
            node.sales_mut().loop_data(loop_size);
            node.lead_time_mut().loop_data(loop_size);
            self.control.loop_data(node, loop_size);
        }
        debug!(loop_index = loop_number, loop_size, "loop complete");
    }
}

impl<S: MetricsSink + fmt::Debug> fmt::Debug for Simulator<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulator")
            .field("chain", &self.chain)
            .field("config", &self.config)
            .field("sink", &self.sink)
            .field("state", &self.state)
            .field("period", &self.period)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::Orders;
    use crate::policy::{BaseStock, NoControl, ReleaseAll};
    use crate::stock::StockError;
    use crate::test_utils::*;

    fn events_of(events: &[MetricEvent], kind: EventKind) -> Vec<(Period, &str, Quantity)> {
        events
            .iter()
            .filter(|e| e.event == kind)
            .map(|e| (e.context.period, e.sku.as_str(), e.quantity))
            .collect()
    }

    /// Releases a fixed quantity of one item every period, ignoring limits.
    struct ForceRelease(&'static str, Quantity);

    impl ReleasePolicy for ForceRelease {
        fn get_releases(&mut self, _chain: &SupplyChain, _node: &Node) -> Result<Orders, PolicyError> {
            Ok(Orders::new().with(self.0, self.1))
        }
    }

    /// Orders a fixed quantity of one item every period.
    struct FixedOrder(&'static str, Quantity);

    impl ControlPolicy for FixedOrder {
        fn get_orders(&mut self, _chain: &SupplyChain, _node: &Node, _period: Period) -> Result<Orders, PolicyError> {
            Ok(Orders::new().with(self.0, self.1))
        }
    }

    #[test]
    fn rejects_invalid_config() {
        let err = Simulator::new(
            build_chain(vec![supplier("S")]),
            RunConfig::new(0, 1),
            Box::new(NoControl),
            Box::new(ReleaseAll),
            NullSink,
        )
        .unwrap_err();
        assert_eq!(err, SimError::Configuration(ConfigError::ZeroLoops));
    }

    #[test]
    fn rejects_unranked_chain() {
        let mut chain = SupplyChain::new();
        chain.add_node(supplier("S")).unwrap();
        let err = Simulator::new(
            chain,
            RunConfig::new(1, 1),
            Box::new(NoControl),
            Box::new(ReleaseAll),
            NullSink,
        )
        .unwrap_err();
        assert_eq!(
            err,
            SimError::Configuration(ConfigError::MissingLlc(NodeId::new("S")))
        );
    }

    #[test]
    fn state_machine_walks_every_period() {
        let mut sim = base_stock_simulator(build_chain(vec![supplier("S")]), RunConfig::new(2, 2));
        assert_eq!(sim.state(), RunState::NotStarted);
        assert_eq!(sim.step().unwrap(), RunState::Period(1));
        assert_eq!(sim.step().unwrap(), RunState::Period(2));
        assert_eq!(sim.step().unwrap(), RunState::Period(3));
        assert_eq!(sim.step().unwrap(), RunState::Finished);
        assert_eq!(sim.step().unwrap(), RunState::Finished);
        assert_eq!(sim.period(), 4);
    }

    #[test]
    fn supplier_receipt_arrives_after_lead_time() {
        let s = with_base_stock(make_node("S", 2, Vec::new(), &[], &[]), 5);
        let mut sim = base_stock_simulator(build_chain(vec![s]), RunConfig::new(1, 4));

        sim.step().unwrap();
        let s = sim.chain().node("S").unwrap();
        assert_eq!(s.pipeline().in_transit("S"), 5);
        assert_eq!(s.pipeline().receipts()[0].eta, 3);
        assert!(s.orders().is_empty());

        sim.step().unwrap();
        assert_eq!(sim.chain().node("S").unwrap().own_stock(), 0);

        sim.step().unwrap();
        let s = sim.chain().node("S").unwrap();
        assert_eq!(s.own_stock(), 5);
        assert!(s.pipeline().is_empty());

        let events = sim.sink();
        assert_eq!(events_of(events, EventKind::Order), vec![(1, "S", 5)]);
        assert_eq!(events_of(events, EventKind::Release), vec![(1, "S", 5)]);
        let release = events.iter().find(|e| e.event == EventKind::Release).unwrap();
        assert_eq!(release.message.as_deref(), Some("arrives in period 3"));
        assert_eq!(events_of(events, EventKind::Receipt), vec![(3, "S", 5)]);
    }

    #[test]
    fn retailer_pulls_from_warehouse_and_clears_backorder() {
        let r = with_base_stock(make_node("R", 1, vec![vec![3]], &[("W", 1)], &[]), 5);
        let w = with_stock(node("W", &[], &[("R", 1)]), 10);
        let mut sim = base_stock_simulator(build_chain(vec![r, w]), RunConfig::new(1, 2));
        sim.run().unwrap();

        let r = sim.chain().node("R").unwrap();
        assert_eq!(r.own_stock(), 5);
        assert!(r.backorders().is_empty());
        assert_eq!(sim.chain().node("W").unwrap().own_stock(), 2);

        let events = sim.sink();
        assert_eq!(events_of(events, EventKind::SalesBackordered), vec![(1, "R", 3)]);
        assert_eq!(events_of(events, EventKind::Release), vec![(1, "W", 8)]);
        assert_eq!(events_of(events, EventKind::Assembly), vec![(2, "R", 8)]);
        assert_eq!(events_of(events, EventKind::BackOrdersShipped), vec![(2, "R", 3)]);
    }

    #[test]
    fn release_beyond_upstream_stock_aborts() {
        let a = node("A", &[("B", 1)], &[]);
        let b = with_stock(node("B", &[], &[("A", 1)]), 1);
        let mut sim = Simulator::new(
            build_chain(vec![a, b]),
            RunConfig::new(1, 3),
            Box::new(FixedOrder("B", 4)),
            Box::new(ForceRelease("B", 4)),
            Vec::<MetricEvent>::new(),
        )
        .unwrap();

        let err = sim.step().unwrap_err();
        assert_eq!(
            err,
            SimError::Invariant {
                period: 1,
                node: NodeId::new("B"),
                source: NodeError::Stock(StockError::InsufficientStock {
                    item: ItemId::new("B"),
                    requested: 4,
                    available: 1,
                }),
            }
        );
        assert_eq!(sim.state(), RunState::Aborted { period: 1 });
        assert_eq!(sim.step().unwrap_err(), SimError::Aborted { period: 1 });
        assert_eq!(sim.chain().node("B").unwrap().own_stock(), 1);
    }

    #[test]
    fn release_beyond_orders_aborts() {
        let mut sim = Simulator::new(
            build_chain(vec![supplier("S")]),
            RunConfig::new(1, 1),
            Box::new(NoControl),
            Box::new(ForceRelease("S", 1)),
            NullSink,
        )
        .unwrap();
        let err = sim.run().unwrap_err();
        assert!(matches!(
            err,
            SimError::Invariant {
                source: NodeError::Orders(_),
                ..
            }
        ));
    }

    #[test]
    fn release_of_unrelated_item_aborts() {
        let mut sim = Simulator::new(
            build_chain(vec![supplier("S"), supplier("T")]),
            RunConfig::new(1, 1),
            Box::new(NoControl),
            Box::new(ForceRelease("T", 1)),
            NullSink,
        )
        .unwrap();
        assert_eq!(
            sim.run().unwrap_err(),
            SimError::UnknownRelease {
                period: 1,
                node: NodeId::new("S"),
                item: ItemId::new("T"),
            }
        );
    }

    #[test]
    fn order_lines_past_quantity_range_abort() {
        let r = make_node("R", 1, vec![vec![Quantity::MAX, 1]], &[], &[]);
        let mut sim = base_stock_simulator(build_chain(vec![r]), RunConfig::new(1, 2));
        assert_eq!(
            sim.run().unwrap_err(),
            SimError::Invariant {
                period: 1,
                node: NodeId::new("R"),
                source: NodeError::QuantityOverflow {
                    what: "order lines",
                    period: 1,
                },
            }
        );
        assert_eq!(sim.state(), RunState::Aborted { period: 1 });
    }

    #[test]
    fn sales_replay_every_loop() {
        let r = make_node("R", 1, vec![vec![2]], &[], &[]);
        let events = run_base_stock(build_chain(vec![r]), RunConfig::new(3, 1)).unwrap();
        let sales: Vec<(Period, u32, Quantity)> = events
            .iter()
            .filter(|e| e.event == EventKind::Sales)
            .map(|e| (e.context.period, e.context.loop_number, e.quantity))
            .collect();
        assert_eq!(sales, vec![(1, 1, 2), (2, 2, 2), (3, 3, 2)]);
    }

    #[test]
    fn snapshots_only_when_enabled() {
        let chain = || build_chain(vec![with_stock(supplier("S"), 1)]);
        let quiet = run_base_stock(chain(), RunConfig::new(1, 2)).unwrap();
        assert!(quiet.iter().all(|e| !e.event.is_snapshot()));

        let loud = run_base_stock(chain(), RunConfig::new(1, 2).with_snapshots(true)).unwrap();
        assert_eq!(events_of(&loud, EventKind::Stock), vec![(1, "S", 1), (2, "S", 1)]);
        assert_eq!(events_of(&loud, EventKind::BackOrders).len(), 2);
    }

    #[test]
    fn identical_runs_emit_identical_events() {
        let run = || {
            run_base_stock(
                two_echelon(vec![vec![1, 2], vec![], vec![4]], 3, 6),
                RunConfig::new(2, 3).with_snapshots(true),
            )
            .unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn run_summary_reports_hash_of_final_state() {
        let mut sim = base_stock_simulator(two_echelon(vec![vec![2]], 1, 4), RunConfig::new(2, 2));
        let summary = sim.run().unwrap();
        assert_eq!(summary.periods, 4);
        assert_eq!(summary.loops, 2);
        assert_eq!(summary.state_hash, sim.chain().state_hash());
    }

    #[test]
    fn base_stock_policy_is_used_per_node() {
        let mut sim = Simulator::new(
            build_chain(vec![with_base_stock(supplier("S"), 2)]),
            RunConfig::new(1, 1),
            Box::new(BaseStock::new()),
            Box::new(ReleaseAll),
            Vec::<MetricEvent>::new(),
        )
        .unwrap();
        sim.run().unwrap();
        assert_eq!(sim.chain().node("S").unwrap().pipeline().in_transit("S"), 2);
    }
}
