//! Unsatisfied demand carried across periods.

use crate::id::{Period, Quantity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Errors raised by backorder mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackOrderError {
    #[error("backorder quantity must be positive")]
    ZeroQuantity,
    #[error("cannot deliver {requested} backordered units, only {outstanding} outstanding")]
    OverDelivery {
        requested: Quantity,
        outstanding: Quantity,
    },
    #[error("backordering {quantity} more units overflows the {outstanding} outstanding")]
    Overflow {
        quantity: Quantity,
        outstanding: Quantity,
    },
}

/// Outstanding backorders of a node's own item.
///
/// The running total drives the simulation. The per-period breakdown is kept
/// for reporting: deliveries settle the oldest periods first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackOrders {
    quantity: Quantity,
    by_period: BTreeMap<Period, Quantity>,
}

impl BackOrders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total outstanding quantity.
    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    pub fn is_empty(&self) -> bool {
        self.quantity == 0
    }

    /// Record demand of `period` that could not be shipped.
    pub fn add(&mut self, quantity: Quantity, period: Period) -> Result<(), BackOrderError> {
        if quantity == 0 {
            return Err(BackOrderError::ZeroQuantity);
        }
        let Some(total) = self.quantity.checked_add(quantity) else {
            return Err(BackOrderError::Overflow {
                quantity,
                outstanding: self.quantity,
            });
        };
        self.quantity = total;
        // A period's share never exceeds the total.
        *self.by_period.entry(period).or_insert(0) += quantity;
        Ok(())
    }

    /// Settle `quantity` outstanding units. Delivering zero is a no-op.
    pub fn deliver(&mut self, quantity: Quantity) -> Result<(), BackOrderError> {
        if quantity > self.quantity {
            return Err(BackOrderError::OverDelivery {
                requested: quantity,
                outstanding: self.quantity,
            });
        }
        self.quantity -= quantity;

        let mut remaining = quantity;
        while remaining > 0 {
            let Some(mut oldest) = self.by_period.first_entry() else {
                break;
            };
            let open = oldest.get_mut();
            if *open > remaining {
                *open -= remaining;
                remaining = 0;
            } else {
                remaining -= *open;
                oldest.remove();
            }
        }
        Ok(())
    }

    /// Outstanding quantity per period of origin, oldest first.
    pub fn by_period(&self) -> impl Iterator<Item = (Period, Quantity)> + '_ {
        self.by_period.iter().map(|(&p, &q)| (p, q))
    }

    /// Age in periods of the oldest outstanding backorder at `now`.
    pub fn oldest_age(&self, now: Period) -> Option<Period> {
        self.by_period
            .keys()
            .next()
            .map(|&origin| now.saturating_sub(origin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_accumulates() {
        let mut bo = BackOrders::new();
        bo.add(3, 1).unwrap();
        bo.add(2, 2).unwrap();
        bo.add(1, 2).unwrap();
        assert_eq!(bo.quantity(), 6);
        assert_eq!(bo.by_period().collect::<Vec<_>>(), vec![(1, 3), (2, 3)]);
    }

    #[test]
    fn add_past_quantity_range_is_rejected() {
        let mut bo = BackOrders::new();
        bo.add(Quantity::MAX, 1).unwrap();
        assert_eq!(
            bo.add(1, 2),
            Err(BackOrderError::Overflow {
                quantity: 1,
                outstanding: Quantity::MAX,
            })
        );
        assert_eq!(bo.quantity(), Quantity::MAX);
        assert_eq!(bo.by_period().collect::<Vec<_>>(), vec![(1, Quantity::MAX)]);
    }

    #[test]
    fn add_zero_rejected() {
        let mut bo = BackOrders::new();
        assert_eq!(bo.add(0, 1), Err(BackOrderError::ZeroQuantity));
    }

    #[test]
    fn deliver_settles_oldest_first() {
        let mut bo = BackOrders::new();
        bo.add(3, 1).unwrap();
        bo.add(4, 2).unwrap();
        bo.deliver(5).unwrap();
        assert_eq!(bo.quantity(), 2);
        assert_eq!(bo.by_period().collect::<Vec<_>>(), vec![(2, 2)]);
        assert_eq!(bo.oldest_age(6), Some(4));
    }

    #[test]
    fn over_delivery_rejected() {
        let mut bo = BackOrders::new();
        bo.add(1, 1).unwrap();
        assert_eq!(
            bo.deliver(2),
            Err(BackOrderError::OverDelivery {
                requested: 2,
                outstanding: 1
            })
        );
        assert_eq!(bo.quantity(), 1);
    }

    #[test]
    fn deliver_zero_is_noop() {
        let mut bo = BackOrders::new();
        bo.deliver(0).unwrap();
        assert!(bo.is_empty());
        assert_eq!(bo.oldest_age(3), None);
    }
}
