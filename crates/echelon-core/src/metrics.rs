//! Structured metric events and the sinks that receive them.
//!
//! The engine never computes on metrics; it only emits. Every event carries
//! an explicit [`MetricContext`] (period, loop, node) supplied by the caller,
//! so no ambient state is involved.
//!
//! # Sinks
//!
//! - [`NullSink`]: discards everything.
//! - `Vec<MetricEvent>`: keeps every event, in emission order.
//! - [`EventLog`]: pre-allocated ring buffer; when full the oldest events are
//!   dropped. Event kinds can be suppressed so they are never recorded.

use crate::id::{ItemId, NodeId, Period, Quantity};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Run position shared by every node during one period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodContext {
    pub period: Period,
    /// 1-based loop number.
    pub loop_number: u32,
}

impl PeriodContext {
    pub fn new(period: Period, loop_number: u32) -> Self {
        Self {
            period,
            loop_number,
        }
    }

    /// Attach a node to this context.
    pub fn for_node(&self, node: &NodeId) -> MetricContext {
        MetricContext {
            period: self.period,
            loop_number: self.loop_number,
            node: node.clone(),
        }
    }
}

/// The explicit context attached to every metric event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricContext {
    pub period: Period,
    pub loop_number: u32,
    pub node: NodeId,
}

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    // -- Demand --
    Sales,
    SalesSatisfied,
    SalesBackordered,
    OrderLines,
    OrderLinesSatisfied,
    OrderLinesBackordered,
    BackOrdersShipped,

    // -- Flow --
    Receipt,
    Assembly,
    Order,
    Release,

    // -- End-of-period snapshots --
    Stock,
    BackOrders,
    Pipeline,
    Orders,
}

/// Total number of event kinds.
const EVENT_KIND_COUNT: usize = 15;

impl EventKind {
    fn index(self) -> usize {
        self as usize
    }

    /// Whether this kind is an end-of-period state snapshot.
    pub fn is_snapshot(self) -> bool {
        matches!(
            self,
            EventKind::Stock | EventKind::BackOrders | EventKind::Pipeline | EventKind::Orders
        )
    }
}

/// The unit a metric's quantity is measured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MetricKind {
    /// Item units.
    Units,
    /// Count of order lines.
    Lines,
}

/// Verbosity of an event. Snapshots are `Debug`; everything else is `Info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Debug,
}

/// One structured metric record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricEvent {
    pub context: MetricContext,
    pub sku: ItemId,
    pub event: EventKind,
    pub metric: MetricKind,
    pub quantity: Quantity,
    #[serde(default)]
    pub message: Option<String>,
    pub level: Level,
}

impl MetricEvent {
    /// An info-level event measured in units.
    pub fn units(context: &MetricContext, sku: &ItemId, event: EventKind, quantity: Quantity) -> Self {
        Self {
            context: context.clone(),
            sku: sku.clone(),
            event,
            metric: MetricKind::Units,
            quantity,
            message: None,
            level: if event.is_snapshot() {
                Level::Debug
            } else {
                Level::Info
            },
        }
    }

    /// An info-level event counting order lines.
    pub fn lines(context: &MetricContext, sku: &ItemId, event: EventKind, count: Quantity) -> Self {
        Self {
            metric: MetricKind::Lines,
            ..Self::units(context, sku, event, count)
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Sink trait
// ---------------------------------------------------------------------------

/// Receiver of metric events.
pub trait MetricsSink {
    fn record(&mut self, event: MetricEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl MetricsSink for NullSink {
    fn record(&mut self, _event: MetricEvent) {}
}

impl MetricsSink for Vec<MetricEvent> {
    fn record(&mut self, event: MetricEvent) {
        self.push(event);
    }
}

impl<S: MetricsSink + ?Sized> MetricsSink for &mut S {
    fn record(&mut self, event: MetricEvent) {
        (**self).record(event);
    }
}

impl<S: MetricsSink + ?Sized> MetricsSink for Box<S> {
    fn record(&mut self, event: MetricEvent) {
        (**self).record(event);
    }
}

// ---------------------------------------------------------------------------
// EventLog -- pre-allocated ring buffer
// ---------------------------------------------------------------------------

/// A bounded metric log. Fixed capacity; when full, the oldest events are
/// dropped. Suppressed kinds are never recorded.
#[derive(Debug)]
pub struct EventLog {
    events: Vec<Option<MetricEvent>>,
    /// Write position (wraps around).
    head: usize,
    len: usize,
    total_written: u64,
    suppressed: [bool; EVENT_KIND_COUNT],
}

impl EventLog {
    /// Create a log with the given capacity. A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
            total_written: 0,
            suppressed: [false; EVENT_KIND_COUNT],
        }
    }

    /// Stop recording an event kind.
    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
    }

    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind.index()]
    }

    pub fn capacity(&self) -> usize {
        self.events.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total events recorded since creation (including dropped).
    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Number of events that were dropped because the log was full.
    pub fn dropped_count(&self) -> u64 {
        self.total_written.saturating_sub(self.capacity() as u64)
    }

    /// Iterate over events from oldest to newest.
    pub fn iter(&self) -> EventLogIter<'_> {
        let start = if self.len < self.capacity() {
            0
        } else {
            // head points to the next write position, which is the oldest entry
            self.head
        };
        EventLogIter {
            log: self,
            index: start,
            remaining: self.len,
        }
    }

    pub fn clear(&mut self) {
        for slot in &mut self.events {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(4096)
    }
}

impl MetricsSink for EventLog {
    fn record(&mut self, event: MetricEvent) {
        if self.suppressed[event.event.index()] {
            return;
        }
        let capacity = self.capacity();
        self.events[self.head] = Some(event);
        self.head = (self.head + 1) % capacity;
        if self.len < capacity {
            self.len += 1;
        }
        self.total_written += 1;
    }
}

/// Iterator over an [`EventLog`], from oldest to newest.
pub struct EventLogIter<'a> {
    log: &'a EventLog,
    index: usize,
    remaining: usize,
}

impl<'a> Iterator for EventLogIter<'a> {
    type Item = &'a MetricEvent;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let event = self.log.events[self.index].as_ref();
        self.index = (self.index + 1) % self.log.capacity();
        self.remaining -= 1;
        event
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for EventLogIter<'_> {}
