//! In-transit receipts with a committed arrival period.

use crate::id::{ItemId, ItemKey, Period, Quantity, item_key};
use serde::{Deserialize, Serialize};

/// A quantity of an item on its way to the owning node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub item: ItemId,
    pub quantity: Quantity,
    pub eta: Period,
}

impl Receipt {
    pub fn new(item: impl Into<ItemId>, quantity: Quantity, eta: Period) -> Self {
        Self {
            item: item.into(),
            quantity,
            eta,
        }
    }
}

/// Ordered in-transit receipts of one node.
///
/// The pipeline keeps its own period cursor. A receipt becomes eligible for
/// [`Pipeline::pop_received`] once the cursor has reached its eta, and the
/// cursor only moves through [`Pipeline::update_pipeline`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    receipts: Vec<Receipt>,
    period: Period,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    /// An empty pipeline positioned at period 1.
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// An empty pipeline positioned at `period`, for resumed runs.
    pub fn starting_at(period: Period) -> Self {
        Self {
            receipts: Vec::new(),
            period,
        }
    }

    /// The period the pipeline currently delivers for.
    pub fn period(&self) -> Period {
        self.period
    }

    /// Reposition the cursor. Used when restoring state for a later run.
    pub fn set_period(&mut self, period: Period) {
        self.period = period;
    }

    /// Re-express the pipeline for a fresh run: the cursor moves back to
    /// period 1 and every eta moves back by the same amount.
    pub fn rebase(&mut self) {
        let shift = self.period.saturating_sub(1);
        for receipt in &mut self.receipts {
            receipt.eta = receipt.eta.saturating_sub(shift);
        }
        self.period = 1;
    }

    /// Queue a receipt. Zero-quantity receipts are dropped.
    pub fn push(&mut self, receipt: Receipt) {
        if receipt.quantity > 0 {
            self.receipts.push(receipt);
        }
    }

    /// Advance the cursor by one period.
    pub fn update_pipeline(&mut self) {
        self.period += 1;
    }

    /// Remove and return every receipt whose eta has arrived, in queue order.
    pub fn pop_received(&mut self) -> Vec<Receipt> {
        let now = self.period;
        let (arrived, pending): (Vec<Receipt>, Vec<Receipt>) =
            std::mem::take(&mut self.receipts)
                .into_iter()
                .partition(|r| r.eta <= now);
        self.receipts = pending;
        arrived
    }

    /// Total in transit for one item.
    pub fn in_transit<K: ItemKey + ?Sized>(&self, item: &K) -> Quantity {
        let key = item_key(item);
        self.receipts
            .iter()
            .filter(|r| r.item.as_str() == key)
            .map(|r| r.quantity)
            .sum()
    }

    /// Total in transit across all items.
    pub fn total(&self) -> Quantity {
        self.receipts.iter().map(|r| r.quantity).sum()
    }

    pub fn receipts(&self) -> &[Receipt] {
        &self.receipts
    }

    pub fn is_empty(&self) -> bool {
        self.receipts.is_empty()
    }
}
