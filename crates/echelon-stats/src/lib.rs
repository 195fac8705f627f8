//! Fill-rate statistics for the echelon simulator.
//!
//! [`FillRateStats`] is a [`MetricsSink`]: hand it to the simulator and it
//! aggregates the demand events every node emits (sales requested, satisfied
//! and backordered, plus order-line counts) into cumulative totals, a rolling
//! window over the most recent demand periods, and a per-period history of
//! unit fill rates.
//!
//! # Usage
//!
//! ```ignore
//! let stats = FillRateStats::new(StatsConfig::default());
//! let mut sim = Simulator::new(chain, config, control, release, stats)?;
//! sim.run()?;
//! let (_, mut stats) = sim.into_parts();
//! stats.flush();
//! let rate = stats.fill_rate("retailer");
//! ```

use echelon_core::id::{ItemKey, NodeId, Period, Quantity, item_key};
use echelon_core::metrics::{EventKind, MetricEvent, MetricsSink};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the statistics sink.
#[derive(Debug, Clone)]
pub struct StatsConfig {
    /// Number of most recent demand periods in the rolling window.
    pub window_periods: usize,
    /// Maximum number of per-period fill rates retained per node.
    pub history_capacity: usize,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            window_periods: 12,
            history_capacity: 256,
        }
    }
}

// ---------------------------------------------------------------------------
// RingBuffer
// ---------------------------------------------------------------------------

/// A fixed-capacity ring buffer. When full, the oldest entry is overwritten.
/// Iterates oldest-to-newest.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    data: Vec<T>,
    head: usize,
    len: usize,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// Create a ring buffer holding at least one value.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![T::default(); capacity.max(1)],
            head: 0,
            len: 0,
        }
    }

    /// Push a value, overwriting the oldest entry if at capacity.
    pub fn push(&mut self, value: T) {
        self.data[self.head] = value;
        self.head = (self.head + 1) % self.capacity();
        if self.len < self.capacity() {
            self.len += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// The most recently pushed value, if any.
    pub fn latest(&self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let idx = (self.head + self.capacity() - 1) % self.capacity();
        Some(self.data[idx])
    }

    /// Iterate values from oldest to newest.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = T> + '_ {
        let start = if self.len < self.capacity() { 0 } else { self.head };
        let capacity = self.capacity();
        (0..self.len).map(move |i| self.data[(start + i) % capacity])
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }

    pub fn clear(&mut self) {
        self.data.fill(T::default());
        self.head = 0;
        self.len = 0;
    }
}

// ---------------------------------------------------------------------------
// Demand counters
// ---------------------------------------------------------------------------

/// Demand seen by one node over some span of periods.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DemandTotals {
    pub requested: Quantity,
    pub satisfied: Quantity,
    pub backordered: Quantity,
    pub lines: Quantity,
    pub lines_satisfied: Quantity,
    pub lines_backordered: Quantity,
    /// Backordered units shipped later.
    pub backorders_shipped: Quantity,
}

impl DemandTotals {
    fn record(&mut self, kind: EventKind, quantity: Quantity) {
        match kind {
            EventKind::Sales => self.requested += quantity,
            EventKind::SalesSatisfied => self.satisfied += quantity,
            EventKind::SalesBackordered => self.backordered += quantity,
            EventKind::OrderLines => self.lines += quantity,
            EventKind::OrderLinesSatisfied => self.lines_satisfied += quantity,
            EventKind::OrderLinesBackordered => self.lines_backordered += quantity,
            EventKind::BackOrdersShipped => self.backorders_shipped += quantity,
            _ => {}
        }
    }

    fn merge(&mut self, other: &DemandTotals) {
        self.requested += other.requested;
        self.satisfied += other.satisfied;
        self.backordered += other.backordered;
        self.lines += other.lines;
        self.lines_satisfied += other.lines_satisfied;
        self.lines_backordered += other.lines_backordered;
        self.backorders_shipped += other.backorders_shipped;
    }

    fn unmerge(&mut self, other: &DemandTotals) {
        self.requested -= other.requested;
        self.satisfied -= other.satisfied;
        self.backordered -= other.backordered;
        self.lines -= other.lines;
        self.lines_satisfied -= other.lines_satisfied;
        self.lines_backordered -= other.lines_backordered;
        self.backorders_shipped -= other.backorders_shipped;
    }

    /// Satisfied over requested units; `None` without demand.
    pub fn fill_rate(&self) -> Option<f64> {
        ratio(self.satisfied, self.requested)
    }

    /// Fully covered over total order lines; `None` without lines.
    pub fn line_fill_rate(&self) -> Option<f64> {
        ratio(self.lines_satisfied, self.lines)
    }
}

fn ratio(numerator: Quantity, denominator: Quantity) -> Option<f64> {
    (denominator > 0).then(|| numerator as f64 / denominator as f64)
}

// ---------------------------------------------------------------------------
// Per-node statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct NodeStats {
    /// Everything committed so far.
    cumulative: DemandTotals,
    /// Committed periods in the rolling window.
    window: RingBuffer<DemandTotals>,
    /// Sum of `window`.
    window_total: DemandTotals,
    /// Unit fill rate of every committed period with demand.
    history: RingBuffer<f64>,
    /// The period currently accumulating, if any.
    current_period: Option<Period>,
    current: DemandTotals,
    periods: u64,
}

impl NodeStats {
    fn new(config: &StatsConfig) -> Self {
        Self {
            cumulative: DemandTotals::default(),
            window: RingBuffer::new(config.window_periods),
            window_total: DemandTotals::default(),
            history: RingBuffer::new(config.history_capacity),
            current_period: None,
            current: DemandTotals::default(),
            periods: 0,
        }
    }

    fn record(&mut self, period: Period, kind: EventKind, quantity: Quantity) {
        if self.current_period.is_some_and(|p| p != period) {
            self.commit();
        }
        self.current_period = Some(period);
        self.current.record(kind, quantity);
    }

    /// Close the period in progress.
    fn commit(&mut self) {
        if self.current_period.take().is_none() {
            return;
        }
        let closed = std::mem::take(&mut self.current);

        if self.window.len() == self.window.capacity() {
            if let Some(oldest) = self.window.iter().next() {
                self.window_total.unmerge(&oldest);
            }
        }
        self.window.push(closed);
        self.window_total.merge(&closed);
        self.cumulative.merge(&closed);
        if let Some(rate) = closed.fill_rate() {
            self.history.push(rate);
        }
        self.periods += 1;
    }

    /// Committed plus in-progress totals.
    fn totals(&self) -> DemandTotals {
        let mut totals = self.cumulative;
        totals.merge(&self.current);
        totals
    }

    /// The last `window_periods` periods, counting the one in progress.
    fn window_totals(&self) -> DemandTotals {
        let mut totals = self.window_total;
        if self.current_period.is_none() {
            return totals;
        }
        if self.window.len() == self.window.capacity() {
            if let Some(oldest) = self.window.iter().next() {
                totals.unmerge(&oldest);
            }
        }
        totals.merge(&self.current);
        totals
    }
}

// ---------------------------------------------------------------------------
// FillRateStats
// ---------------------------------------------------------------------------

/// Metrics sink aggregating per-node demand and fill rates.
///
/// Events are grouped by node and period. A node's period is committed when
/// an event for a later period arrives, or on [`FillRateStats::flush`]. All
/// total and rate queries include the period in progress; the history only
/// holds committed periods.
#[derive(Debug, Clone)]
pub struct FillRateStats {
    config: StatsConfig,
    nodes: BTreeMap<NodeId, NodeStats>,
}

impl Default for FillRateStats {
    fn default() -> Self {
        Self::new(StatsConfig::default())
    }
}

impl FillRateStats {
    pub fn new(config: StatsConfig) -> Self {
        Self {
            config,
            nodes: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &StatsConfig {
        &self.config
    }

    /// Commit every node's period in progress.
    pub fn flush(&mut self) {
        for stats in self.nodes.values_mut() {
            stats.commit();
        }
    }

    /// Cumulative unit fill rate of a node; `None` if it never saw demand.
    pub fn fill_rate<K: ItemKey + ?Sized>(&self, node: &K) -> Option<f64> {
        self.totals(node)?.fill_rate()
    }

    /// Cumulative order-line fill rate of a node.
    pub fn line_fill_rate<K: ItemKey + ?Sized>(&self, node: &K) -> Option<f64> {
        self.totals(node)?.line_fill_rate()
    }

    /// Unit fill rate over the rolling window.
    pub fn window_fill_rate<K: ItemKey + ?Sized>(&self, node: &K) -> Option<f64> {
        self.nodes.get(item_key(node))?.window_totals().fill_rate()
    }

    /// Cumulative demand totals of a node.
    pub fn totals<K: ItemKey + ?Sized>(&self, node: &K) -> Option<DemandTotals> {
        self.nodes.get(item_key(node)).map(NodeStats::totals)
    }

    /// Demand totals over every node.
    pub fn chain_totals(&self) -> DemandTotals {
        let mut totals = DemandTotals::default();
        for stats in self.nodes.values() {
            totals.merge(&stats.totals());
        }
        totals
    }

    /// Per-period unit fill rates of a node, oldest first.
    pub fn history<K: ItemKey + ?Sized>(&self, node: &K) -> Vec<f64> {
        self.nodes
            .get(item_key(node))
            .map(|s| s.history.to_vec())
            .unwrap_or_default()
    }

    /// Number of committed periods with demand events for a node.
    pub fn periods<K: ItemKey + ?Sized>(&self, node: &K) -> u64 {
        self.nodes.get(item_key(node)).map_or(0, |s| s.periods)
    }

    /// Nodes with demand, in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    pub fn tracked_node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }
}

impl MetricsSink for FillRateStats {
    fn record(&mut self, event: MetricEvent) {
        if !matches!(
            event.event,
            EventKind::Sales
                | EventKind::SalesSatisfied
                | EventKind::SalesBackordered
                | EventKind::OrderLines
                | EventKind::OrderLinesSatisfied
                | EventKind::OrderLinesBackordered
                | EventKind::BackOrdersShipped
        ) {
            return;
        }
        let config = &self.config;
        self.nodes
            .entry(event.context.node.clone())
            .or_insert_with(|| NodeStats::new(config))
            .record(event.context.period, event.event, event.quantity);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
