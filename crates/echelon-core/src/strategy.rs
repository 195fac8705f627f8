//! Per-period data providers attached to every node: lead times and sales.
//!
//! Both are trait objects so scenarios can plug in their own sources. The
//! queue/schedule implementations here cover the usual case of recorded
//! per-period input that is replayed loop after loop.

use crate::id::{Period, Quantity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised by lead-time and sales providers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StrategyError {
    #[error("no lead time for period {period} and no default configured")]
    NoLeadTime { period: Period },
    #[error("sales order line of zero units in period {period}")]
    ZeroOrderLine { period: Period },
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Supplies the replenishment lead time of a node for a given period.
pub trait LeadTime: Debug + Send {
    fn get_lead_time(&self, period: Period) -> Result<Period, StrategyError>;

    /// Shift queued per-period entries forward by `loop_size` periods.
    fn loop_data(&mut self, loop_size: Period);
}

/// Supplies the customer order lines a node receives in a given period.
pub trait Sales: Debug + Send {
    /// Order-line quantities for `period`, possibly empty. Every line is > 0.
    fn get_sales(&self, period: Period) -> Result<Vec<Quantity>, StrategyError>;

    /// Shift recorded per-period entries forward by `loop_size` periods.
    fn loop_data(&mut self, loop_size: Period);
}

fn shift_keys<V>(map: &mut BTreeMap<Period, V>, by: Period) {
    if by == 0 {
        return;
    }
    *map = std::mem::take(map)
        .into_iter()
        .map(|(period, value)| (period + by, value))
        .collect();
}

// ---------------------------------------------------------------------------
// Lead time
// ---------------------------------------------------------------------------

/// Lead times queued for specific periods, with an optional fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedLeadTime {
    #[serde(default)]
    pub queue: BTreeMap<Period, Period>,
    #[serde(default)]
    pub default: Option<Period>,
}

impl QueuedLeadTime {
    /// A lead time that is the same in every period.
    pub fn constant(lead_time: Period) -> Self {
        Self {
            queue: BTreeMap::new(),
            default: Some(lead_time),
        }
    }

    pub fn new(queue: BTreeMap<Period, Period>, default: Option<Period>) -> Self {
        Self { queue, default }
    }
}

impl LeadTime for QueuedLeadTime {
    fn get_lead_time(&self, period: Period) -> Result<Period, StrategyError> {
        self.queue
            .get(&period)
            .copied()
            .or(self.default)
            .ok_or(StrategyError::NoLeadTime { period })
    }

    fn loop_data(&mut self, loop_size: Period) {
        shift_keys(&mut self.queue, loop_size);
    }
}

// ---------------------------------------------------------------------------
// Sales
// ---------------------------------------------------------------------------

/// Order lines recorded per period. Periods without an entry have no sales.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledSales {
    schedule: BTreeMap<Period, Vec<Quantity>>,
}

impl ScheduledSales {
    /// No sales in any period.
    pub fn none() -> Self {
        Self::default()
    }

    /// Build from an explicit period -> order-lines mapping.
    pub fn new(schedule: BTreeMap<Period, Vec<Quantity>>) -> Result<Self, StrategyError> {
        for (&period, lines) in &schedule {
            if lines.contains(&0) {
                return Err(StrategyError::ZeroOrderLine { period });
            }
        }
        Ok(Self { schedule })
    }

    /// Build from a list where entry `i` holds the order lines of period `i + 1`.
    pub fn from_list(list: Vec<Vec<Quantity>>) -> Result<Self, StrategyError> {
        let schedule = list
            .into_iter()
            .enumerate()
            .map(|(i, lines)| (i as Period + 1, lines))
            .collect();
        Self::new(schedule)
    }

    pub fn schedule(&self) -> &BTreeMap<Period, Vec<Quantity>> {
        &self.schedule
    }
}

impl Sales for ScheduledSales {
    fn get_sales(&self, period: Period) -> Result<Vec<Quantity>, StrategyError> {
        Ok(self.schedule.get(&period).cloned().unwrap_or_default())
    }

    fn loop_data(&mut self, loop_size: Period) {
        shift_keys(&mut self.schedule, loop_size);
    }
}
