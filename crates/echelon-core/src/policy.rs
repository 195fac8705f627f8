//! Replenishment policies consulted by the simulator in the last phase of
//! every period.
//!
//! A [`ControlPolicy`] decides how much a node should order; a
//! [`ReleasePolicy`] decides how much of the node's outstanding orders to
//! turn into pipeline receipts now. Both see the whole supply chain
//! read-only and return an [`Orders`] value; the simulator applies it.
//!
//! The built-in policies are deliberately simple: [`NoControl`],
//! [`BaseStock`] and [`ReleaseAll`].

use crate::graph::SupplyChain;
use crate::id::{NodeId, Period, Quantity};
use crate::node::Node;
use crate::orders::Orders;

/// Errors raised by a policy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("node {node}: data field {key:?} is invalid: {detail}")]
    InvalidData {
        node: NodeId,
        key: String,
        detail: String,
    },
    #[error("{0}")]
    Failed(String),
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Decides the orders a node places in a period.
pub trait ControlPolicy {
    /// New orders for `node` in `period`. The simulator adds them to the
    /// node's outstanding orders.
    fn get_orders(&mut self, chain: &SupplyChain, node: &Node, period: Period) -> Result<Orders, PolicyError>;

    /// Called for every node at the end of each loop.
    fn loop_data(&mut self, _node: &Node, _loop_size: Period) {}
}

/// Decides how much of a node's outstanding orders to release now.
pub trait ReleasePolicy {
    fn get_releases(&mut self, chain: &SupplyChain, node: &Node) -> Result<Orders, PolicyError>;
}

impl<P: ControlPolicy + ?Sized> ControlPolicy for Box<P> {
    fn get_orders(&mut self, chain: &SupplyChain, node: &Node, period: Period) -> Result<Orders, PolicyError> {
        (**self).get_orders(chain, node, period)
    }

    fn loop_data(&mut self, node: &Node, loop_size: Period) {
        (**self).loop_data(node, loop_size);
    }
}

impl<P: ReleasePolicy + ?Sized> ReleasePolicy for Box<P> {
    fn get_releases(&mut self, chain: &SupplyChain, node: &Node) -> Result<Orders, PolicyError> {
        (**self).get_releases(chain, node)
    }
}

// ---------------------------------------------------------------------------
// Built-in policies
// ---------------------------------------------------------------------------

/// Never orders anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoControl;

impl ControlPolicy for NoControl {
    fn get_orders(&mut self, _chain: &SupplyChain, _node: &Node, _period: Period) -> Result<Orders, PolicyError> {
        Ok(Orders::new())
    }
}

/// Order-up-to policy with the level read from the node's data.
///
/// The level `S` is taken from `node.data[key]` (default key
/// `"base_stock"`); nodes without it never order. A supplier orders its own
/// item, an assembly or distribution node orders each predecessor item, so
/// that the inventory position reaches `S` units of the node's own item.
///
/// The inventory position of a predecessor item `P` consumed `n` per unit
/// counts own stock and pending own backorders in units of `P`:
/// `n * (own - backorders) + stock[P] + in_transit[P] + orders[P]`.
#[derive(Debug, Clone)]
pub struct BaseStock {
    key: String,
}

impl BaseStock {
    pub fn new() -> Self {
        Self::with_key("base_stock")
    }

    pub fn with_key(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    fn level(&self, node: &Node) -> Result<Option<Quantity>, PolicyError> {
        let Some(value) = node.data.get(&self.key) else {
            return Ok(None);
        };
        value.as_u64().map(Some).ok_or_else(|| PolicyError::InvalidData {
            node: node.id().clone(),
            key: self.key.clone(),
            detail: format!("expected a non-negative integer, got {value}"),
        })
    }
}

impl Default for BaseStock {
    fn default() -> Self {
        Self::new()
    }
}

/// Units needed to lift `position` to `target`.
fn shortfall(target: i128, position: i128) -> Quantity {
    Quantity::try_from((target - position).max(0)).unwrap_or(Quantity::MAX)
}

impl ControlPolicy for BaseStock {
    fn get_orders(&mut self, _chain: &SupplyChain, node: &Node, _period: Period) -> Result<Orders, PolicyError> {
        let Some(level) = self.level(node)? else {
            return Ok(Orders::new());
        };
        let own = i128::from(node.own_stock());
        let backorders = i128::from(node.backorders().quantity());
        let mut orders = Orders::new();

        if node.is_supplier() {
            let id = node.id();
            let position = own - backorders
                + i128::from(node.pipeline().in_transit(id))
                + i128::from(node.orders().get(id));
            orders.add(id.clone(), shortfall(i128::from(level), position));
            return Ok(orders);
        }

        for edge in node.predecessors() {
            let item = &edge.source;
            let number = i128::from(edge.number);
            let position = number * (own - backorders)
                + i128::from(node.stock().get(item))
                + i128::from(node.pipeline().in_transit(item))
                + i128::from(node.orders().get(item));
            orders.add(item.clone(), shortfall(number * i128::from(level), position));
        }
        Ok(orders)
    }
}

/// Releases every outstanding order line, as far as supply allows.
///
/// A supplier's own item is always released in full. A predecessor item is
/// capped by the predecessor's own on-hand stock at the time of release.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReleaseAll;

impl ReleasePolicy for ReleaseAll {
    fn get_releases(&mut self, chain: &SupplyChain, node: &Node) -> Result<Orders, PolicyError> {
        let mut releases = Orders::new();
        for (item, quantity) in node.orders().iter() {
            if item == node.id() {
                releases.add(item.clone(), quantity);
            } else if node.predecessor(item).is_some() {
                let available = chain.node(item).map_or(0, Node::own_stock);
                releases.add(item.clone(), quantity.min(available));
            }
        }
        Ok(releases)
    }
}
