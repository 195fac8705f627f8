//! FIFO batch-tracked on-hand inventory.
//!
//! Every item held at a node is stored as an ordered list of
//! [`StockBatch`]es. Additions append a batch; consumption drains from the
//! front, splitting the last batch it touches. The batch `period` tag is
//! reporting-only and never affects ordering.

use crate::id::{ItemId, ItemKey, Period, Quantity, item_key};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised by stock mutations. Each one is an invariant violation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StockError {
    #[error("insufficient stock of {item}: requested {requested}, available {available}")]
    InsufficientStock {
        item: ItemId,
        requested: Quantity,
        available: Quantity,
    },
    #[error("stock of {item} was already initialized")]
    AlreadyInitialized { item: ItemId },
    #[error("stock batch for {item} has zero quantity")]
    EmptyBatch { item: ItemId },
    #[error("adding {quantity} to {item} overflows its total of {total}")]
    Overflow {
        item: ItemId,
        total: Quantity,
        quantity: Quantity,
    },
}

// ---------------------------------------------------------------------------
// Batches
// ---------------------------------------------------------------------------

/// A quantity of stock added at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockBatch {
    pub quantity: Quantity,
    #[serde(default)]
    pub period: Option<Period>,
}

impl StockBatch {
    pub fn new(quantity: Quantity, period: Option<Period>) -> Self {
        Self { quantity, period }
    }
}

/// Batches of a single item plus their cached total.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct ItemStock {
    total: Quantity,
    batches: VecDeque<StockBatch>,
}

// ---------------------------------------------------------------------------
// Stock
// ---------------------------------------------------------------------------

/// On-hand inventory of one node, keyed by item id.
///
/// `add` and `consume` are the only mutators once an item exists. An item
/// may be seeded exactly once via [`Stock::initialize`] before it is first
/// touched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stock {
    items: BTreeMap<ItemId, ItemStock>,
}

impl Stock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current total of an item. Unknown items read as zero.
    pub fn get<K: ItemKey + ?Sized>(&self, item: &K) -> Quantity {
        self.items
            .get(item_key(item))
            .map(|s| s.total)
            .unwrap_or(0)
    }

    /// Seed an item with the given batches (possibly none, i.e. zero).
    ///
    /// Allowed once per item and only before any `add`/`consume` touched it.
    pub fn initialize(
        &mut self,
        item: impl Into<ItemId>,
        batches: impl IntoIterator<Item = StockBatch>,
    ) -> Result<(), StockError> {
        let item = item.into();
        if self.items.contains_key(&item) {
            return Err(StockError::AlreadyInitialized { item });
        }

        let mut entry = ItemStock::default();
        for batch in batches {
            if batch.quantity == 0 {
                return Err(StockError::EmptyBatch { item });
            }
            let Some(total) = entry.total.checked_add(batch.quantity) else {
                return Err(StockError::Overflow {
                    item,
                    total: entry.total,
                    quantity: batch.quantity,
                });
            };
            entry.total = total;
            entry.batches.push_back(batch);
        }
        self.items.insert(item, entry);
        Ok(())
    }

    /// Append a batch. Adding zero is a no-op.
    ///
    /// Fails without mutating anything if the item total would overflow.
    pub fn add<K: ItemKey + ?Sized>(
        &mut self,
        item: &K,
        quantity: Quantity,
        period: Option<Period>,
    ) -> Result<(), StockError> {
        if quantity == 0 {
            return Ok(());
        }
        let key = item_key(item);
        let current = self.get(key);
        let Some(total) = current.checked_add(quantity) else {
            return Err(StockError::Overflow {
                item: ItemId::new(key),
                total: current,
                quantity,
            });
        };
        let entry = self.items.entry(ItemId::new(key)).or_default();
        entry.total = total;
        entry.batches.push_back(StockBatch::new(quantity, period));
        Ok(())
    }

    /// Remove `quantity` units oldest-first. Consuming zero is a no-op.
    ///
    /// Fails without mutating anything if `quantity` exceeds the total.
    pub fn consume<K: ItemKey + ?Sized>(&mut self, item: &K, quantity: Quantity) -> Result<(), StockError> {
        if quantity == 0 {
            return Ok(());
        }
        let key = item_key(item);
        let available = self.get(key);
        if quantity > available {
            return Err(StockError::InsufficientStock {
                item: ItemId::new(key),
                requested: quantity,
                available,
            });
        }

        let Some(entry) = self.items.get_mut(key) else {
            return Ok(());
        };
        entry.total -= quantity;

        let mut remaining = quantity;
        while remaining > 0 {
            let Some(front) = entry.batches.front_mut() else {
                break;
            };
            if front.quantity > remaining {
                front.quantity -= remaining;
                remaining = 0;
            } else {
                remaining -= front.quantity;
                entry.batches.pop_front();
            }
        }
        debug_assert_eq!(remaining, 0);
        Ok(())
    }

    /// Batches of an item, oldest first.
    pub fn batches<K: ItemKey + ?Sized>(&self, item: &K) -> impl Iterator<Item = &StockBatch> {
        self.items
            .get(item_key(item))
            .into_iter()
            .flat_map(|s| s.batches.iter())
    }

    /// Iterate `(item, total)` in item order, including zero totals.
    pub fn iter(&self) -> impl Iterator<Item = (&ItemId, Quantity)> {
        self.items.iter().map(|(id, s)| (id, s.total))
    }

    /// Sum over all items.
    pub fn total(&self) -> Quantity {
        self.items.values().map(|s| s.total).sum()
    }

    /// Whether every cached total equals the sum of its batches.
    pub fn is_consistent(&self) -> bool {
        self.items
            .values()
            .all(|s| s.total == s.batches.iter().map(|b| b.quantity).sum::<Quantity>())
    }
}
