use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// A simulation period. Periods are global and increase monotonically
/// across loops; the first period of a fresh run is 1.
pub type Period = u64;

/// A quantity of units. Negative quantities are unrepresentable.
pub type Quantity = u64;

/// Identifies an item. Every node produces exactly one item whose id is the
/// node's own id, so node ids and item ids share one type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

/// A node is identified by the id of the item it produces.
pub type NodeId = ItemId;

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ItemId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for ItemId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// Key normalization
// ---------------------------------------------------------------------------

/// Anything that names an item: a raw id string, an [`ItemId`], or an object
/// carrying an id (such as a [`Node`](crate::node::Node)).
///
/// All id-keyed maps in this crate look entries up through [`item_key`], so
/// a node and its id always resolve to the same bucket.
pub trait ItemKey {
    fn item_key(&self) -> &str;
}

impl ItemKey for str {
    fn item_key(&self) -> &str {
        self
    }
}

impl ItemKey for String {
    fn item_key(&self) -> &str {
        self
    }
}

impl ItemKey for ItemId {
    fn item_key(&self) -> &str {
        &self.0
    }
}

impl<T: ItemKey + ?Sized> ItemKey for &T {
    fn item_key(&self) -> &str {
        (**self).item_key()
    }
}

/// Resolve any [`ItemKey`] to the canonical string used for map lookups.
pub fn item_key<K: ItemKey + ?Sized>(key: &K) -> &str {
    key.item_key()
}
