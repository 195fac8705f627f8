//! Outstanding replenishment requests, keyed by item id.

use crate::id::{ItemId, ItemKey, Quantity, item_key};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Errors raised by order bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    #[error("cannot release {requested} of {item}, only {outstanding} outstanding")]
    OverRelease {
        item: ItemId,
        requested: Quantity,
        outstanding: Quantity,
    },
    #[error("ordering {quantity} more of {item} overflows the {outstanding} outstanding")]
    Overflow {
        item: ItemId,
        quantity: Quantity,
        outstanding: Quantity,
    },
}

/// A set of order quantities per item.
///
/// Used both as a node's outstanding orders and as the value returned by
/// control and release policies. Zero entries are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Orders {
    lines: BTreeMap<ItemId, Quantity>,
}

impl Orders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<K: ItemKey + ?Sized>(&self, item: &K) -> Quantity {
        self.lines.get(item_key(item)).copied().unwrap_or(0)
    }

    /// Increase the quantity of an item.
    pub fn add(&mut self, item: impl Into<ItemId>, quantity: Quantity) {
        if quantity == 0 {
            return;
        }
        *self.lines.entry(item.into()).or_insert(0) += quantity;
    }

    /// Builder-style [`Orders::add`].
    pub fn with(mut self, item: impl Into<ItemId>, quantity: Quantity) -> Self {
        self.add(item, quantity);
        self
    }

    /// Decrease the quantity of an item, failing if more than outstanding.
    pub fn remove<K: ItemKey + ?Sized>(&mut self, item: &K, quantity: Quantity) -> Result<(), OrderError> {
        if quantity == 0 {
            return Ok(());
        }
        let key = item_key(item);
        let outstanding = self.get(key);
        if quantity > outstanding {
            return Err(OrderError::OverRelease {
                item: ItemId::new(key),
                requested: quantity,
                outstanding,
            });
        }
        if quantity == outstanding {
            self.lines.remove(key);
        } else if let Some(line) = self.lines.get_mut(key) {
            *line -= quantity;
        }
        Ok(())
    }

    /// Add every line of `other` into `self`.
    ///
    /// Fails without mutating anything if any line would overflow.
    pub fn merge(&mut self, other: &Orders) -> Result<(), OrderError> {
        for (item, &quantity) in &other.lines {
            let outstanding = self.get(item);
            if outstanding.checked_add(quantity).is_none() {
                return Err(OrderError::Overflow {
                    item: item.clone(),
                    quantity,
                    outstanding,
                });
            }
        }
        for (item, &quantity) in &other.lines {
            self.add(item.clone(), quantity);
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ItemId, Quantity)> {
        self.lines.iter().map(|(id, &q)| (id, q))
    }

    pub fn total(&self) -> Quantity {
        self.lines.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }
}

impl FromIterator<(ItemId, Quantity)> for Orders {
    fn from_iter<T: IntoIterator<Item = (ItemId, Quantity)>>(iter: T) -> Self {
        let mut orders = Orders::new();
        for (item, quantity) in iter {
            orders.add(item, quantity);
        }
        orders
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_merge() {
        let mut orders = Orders::new().with("a", 2).with("b", 0);
        assert_eq!(orders.len(), 1);
        orders.merge(&Orders::new().with("a", 3).with("c", 1)).unwrap();
        assert_eq!(orders.get("a"), 5);
        assert_eq!(orders.get("c"), 1);
        assert_eq!(orders.total(), 6);
    }

    #[test]
    fn merge_past_quantity_range_changes_nothing() {
        let mut orders = Orders::new().with("a", 1).with("b", Quantity::MAX);
        let err = orders
            .merge(&Orders::new().with("a", 1).with("b", 1))
            .unwrap_err();
        assert_eq!(
            err,
            OrderError::Overflow {
                item: ItemId::new("b"),
                quantity: 1,
                outstanding: Quantity::MAX,
            }
        );
        assert_eq!(orders.get("a"), 1);
        assert_eq!(orders.get("b"), Quantity::MAX);
    }

    #[test]
    fn remove_prunes_empty_lines() {
        let mut orders = Orders::new().with("a", 4);
        orders.remove("a", 1).unwrap();
        assert_eq!(orders.get("a"), 3);
        orders.remove("a", 3).unwrap();
        assert!(orders.is_empty());
    }

    #[test]
    fn over_release_rejected() {
        let mut orders = Orders::new().with("a", 1);
        assert_eq!(
            orders.remove("a", 2),
            Err(OrderError::OverRelease {
                item: ItemId::new("a"),
                requested: 2,
                outstanding: 1,
            })
        );
        assert!(orders.remove("missing", 1).is_err());
        assert!(orders.remove("missing", 0).is_ok());
    }

    #[test]
    fn collect_from_pairs() {
        let orders: Orders = vec![(ItemId::new("x"), 1), (ItemId::new("x"), 2)]
            .into_iter()
            .collect();
        assert_eq!(orders.get("x"), 3);
    }
}
