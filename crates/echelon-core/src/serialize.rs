//! Binary snapshots of supply-chain state and deterministic state hashing.
//!
//! A snapshot holds the resumable state of every node (stock batches,
//! backorders, pipeline, orders and free-form data) behind a versioned
//! header, encoded with `bitcode`. Topology and the lead-time and sales
//! strategies are not part of a snapshot: a snapshot is restored into a
//! chain built from the same scenario.

use crate::backorders::BackOrders;
use crate::graph::SupplyChain;
use crate::id::{NodeId, Period};
use crate::orders::Orders;
use crate::pipeline::Pipeline;
use crate::sim::StateHash;
use crate::stock::Stock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying an echelon chain snapshot.
pub const SNAPSHOT_MAGIC: u32 = 0xEC4E_0001;

/// Current format version. Increment when breaking the wire format.
pub const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur during serialization.
#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
    #[error("node {node}: data is not serializable: {detail}")]
    Data { node: NodeId, detail: String },
}

/// Errors that can occur during deserialization.
#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SNAPSHOT_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("snapshot from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
    #[error("snapshot contains node {0}, which is not in the chain")]
    UnknownNode(NodeId),
    #[error("snapshot has no state for node {0}")]
    MissingNode(NodeId),
    #[error("node {node}: data is not valid json: {detail}")]
    Data { node: NodeId, detail: String },
}

// ---------------------------------------------------------------------------
// Snapshot header
// ---------------------------------------------------------------------------

/// Header prepended to every snapshot. Enables format detection and version
/// checking before the payload is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub magic: u32,
    pub version: u32,
    /// Last completed period when the snapshot was taken.
    pub period: Period,
}

impl SnapshotHeader {
    pub fn new(period: Period) -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: FORMAT_VERSION,
            period,
        }
    }

    pub fn validate(&self) -> Result<(), DeserializeError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(DeserializeError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(DeserializeError::FutureVersion(self.version));
        }
        if self.version < FORMAT_VERSION {
            return Err(DeserializeError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

/// Read just the header of a snapshot.
///
/// bitcode has no partial decoding, so this decodes the whole payload.
pub fn read_snapshot_header(data: &[u8]) -> Result<SnapshotHeader, DeserializeError> {
    Ok(decode(data)?.header)
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// Resumable state of one node.
#[derive(Debug, Serialize, Deserialize)]
struct NodeState {
    id: NodeId,
    stock: Stock,
    backorders: BackOrders,
    pipeline: Pipeline,
    orders: Orders,
    /// Free-form node data as JSON text; bitcode cannot carry
    /// self-describing values.
    data: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChainSnapshot {
    header: SnapshotHeader,
    nodes: Vec<NodeState>,
}

fn decode(data: &[u8]) -> Result<ChainSnapshot, DeserializeError> {
    bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))
}

impl SupplyChain {
    /// Serialize the state of every node, tagged with the last completed
    /// `period`.
    pub fn serialize(&self, period: Period) -> Result<Vec<u8>, SerializeError> {
        let nodes = self
            .nodes()
            .map(|node| {
                let data = serde_json::to_string(&node.data).map_err(|e| SerializeError::Data {
                    node: node.id().clone(),
                    detail: e.to_string(),
                })?;
                Ok(NodeState {
                    id: node.id().clone(),
                    stock: node.stock().clone(),
                    backorders: node.backorders().clone(),
                    pipeline: node.pipeline().clone(),
                    orders: node.orders().clone(),
                    data,
                })
            })
            .collect::<Result<Vec<_>, SerializeError>>()?;

        let snapshot = ChainSnapshot {
            header: SnapshotHeader::new(period),
            nodes,
        };
        bitcode::serialize(&snapshot).map_err(|e| SerializeError::Encode(e.to_string()))
    }

    /// Overwrite node state from a snapshot. Returns the snapshot header.
    ///
    /// The snapshot must cover exactly the nodes of this chain. Nothing is
    /// modified unless the whole snapshot is valid.
    pub fn restore(&mut self, data: &[u8]) -> Result<SnapshotHeader, DeserializeError> {
        let snapshot = decode(data)?;
        snapshot.header.validate()?;

        let mut parsed = Vec::with_capacity(snapshot.nodes.len());
        for state in snapshot.nodes {
            if !self.contains_node(&state.id) {
                return Err(DeserializeError::UnknownNode(state.id));
            }
            let node_data: BTreeMap<String, serde_json::Value> =
                serde_json::from_str(&state.data).map_err(|e| DeserializeError::Data {
                    node: state.id.clone(),
                    detail: e.to_string(),
                })?;
            parsed.push((state, node_data));
        }
        if let Some(missing) = self
            .nodes()
            .find(|n| !parsed.iter().any(|(s, _)| s.id == *n.id()))
        {
            return Err(DeserializeError::MissingNode(missing.id().clone()));
        }

        for (state, node_data) in parsed {
            if let Some(node) = self.node_mut(&state.id) {
                *node.stock_mut() = state.stock;
                *node.backorders_mut() = state.backorders;
                *node.pipeline_mut() = state.pipeline;
                *node.orders_mut() = state.orders;
                node.data = node_data;
            }
        }
        Ok(snapshot.header)
    }

    /// Move every pipeline back so the next period is period 1, keeping the
    /// remaining lead time of each receipt.
    pub fn rebase_pipelines(&mut self) {
        for node in self.nodes_mut() {
            node.pipeline_mut().rebase();
        }
    }

    /// Deterministic hash of all node state, in chain order.
    ///
    /// Two chains with equal hashes hold the same stock batches, backorders,
    /// pipeline receipts and orders. Strategies and data are not hashed.
    pub fn state_hash(&self) -> u64 {
        let mut h = StateHash::new();
        h.write_u64(self.node_count() as u64);
        for node in self.nodes() {
            h.write_str(node.id().as_str());

            for (item, total) in node.stock().iter() {
                h.write_str(item.as_str());
                h.write_u64(total);
                for batch in node.stock().batches(item) {
                    h.write_u64(batch.quantity);
                    h.write_opt_u64(batch.period);
                }
            }

            h.write_u64(node.backorders().quantity());
            for (period, quantity) in node.backorders().by_period() {
                h.write_u64(period);
                h.write_u64(quantity);
            }

            h.write_u64(node.pipeline().period());
            for receipt in node.pipeline().receipts() {
                h.write_str(receipt.item.as_str());
                h.write_u64(receipt.quantity);
                h.write_u64(receipt.eta);
            }

            for (item, quantity) in node.orders().iter() {
                h.write_str(item.as_str());
                h.write_u64(quantity);
            }
        }
        h.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Receipt;
    use crate::test_utils::*;

    fn topology() -> SupplyChain {
        build_chain(vec![
            make_node("R", 1, vec![vec![2]], &[("W", 1)], &[]),
            node("W", &[], &[("R", 1)]),
        ])
    }

    fn populated() -> SupplyChain {
        let mut chain = topology();
        let r = chain.node_mut("R").unwrap();
        r.stock_mut().add("R", 4, Some(1)).unwrap();
        r.stock_mut().add("W", 2, Some(2)).unwrap();
        r.backorders_mut().add(3, 2).unwrap();
        r.pipeline_mut().push(Receipt::new("W", 5, 4));
        r.orders_mut().add("W", 1);
        r.data.insert("base_stock".into(), serde_json::json!(6));
        chain
    }

    #[test]
    fn snapshot_restores_into_fresh_chain() {
        let source = populated();
        let bytes = source.serialize(3).unwrap();

        let mut target = topology();
        assert_ne!(target.state_hash(), source.state_hash());
        let header = target.restore(&bytes).unwrap();

        assert_eq!(header, SnapshotHeader::new(3));
        assert_eq!(target.state_hash(), source.state_hash());
        let r = target.node("R").unwrap();
        assert_eq!(r.stock().batches("R").count(), 1);
        assert_eq!(r.data["base_stock"], serde_json::json!(6));
    }

    #[test]
    fn header_readable_without_restoring() {
        let bytes = populated().serialize(9).unwrap();
        assert_eq!(read_snapshot_header(&bytes).unwrap().period, 9);
    }

    #[test]
    fn garbage_fails_to_decode() {
        let err = topology().restore(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, DeserializeError::Decode(_)));
    }

    #[test]
    fn wrong_magic_rejected() {
        let snapshot = ChainSnapshot {
            header: SnapshotHeader {
                magic: 0xDEAD_BEEF,
                version: FORMAT_VERSION,
                period: 0,
            },
            nodes: Vec::new(),
        };
        let bytes = bitcode::serialize(&snapshot).unwrap();
        let err = topology().restore(&bytes).unwrap_err();
        assert!(matches!(err, DeserializeError::InvalidMagic(0xDEAD_BEEF)));
    }

    #[test]
    fn future_version_rejected() {
        let mut header = SnapshotHeader::new(0);
        header.version = FORMAT_VERSION + 1;
        assert!(matches!(
            header.validate(),
            Err(DeserializeError::FutureVersion(_))
        ));
    }

    #[test]
    fn mismatched_nodes_rejected_without_changes() {
        let bytes = populated().serialize(1).unwrap();

        let mut other = build_chain(vec![supplier("X")]);
        let before = other.state_hash();
        assert!(matches!(
            other.restore(&bytes),
            Err(DeserializeError::UnknownNode(_))
        ));
        assert_eq!(other.state_hash(), before);

        let mut bigger = build_chain(vec![
            make_node("R", 1, vec![], &[("W", 1)], &[]),
            node("W", &[], &[("R", 1)]),
            supplier("Z"),
        ]);
        assert!(matches!(
            bigger.restore(&bytes),
            Err(DeserializeError::MissingNode(id)) if id.as_str() == "Z"
        ));
    }

    #[test]
    fn state_hash_tracks_every_bucket() {
        let base = populated().state_hash();

        let mut chain = populated();
        chain.node_mut("R").unwrap().orders_mut().add("W", 1);
        assert_ne!(chain.state_hash(), base);

        let mut chain = populated();
        chain.node_mut("R").unwrap().update_pipeline();
        assert_ne!(chain.state_hash(), base);

        // Same total, different batch layout.
        let mut a = topology();
        a.node_mut("W").unwrap().stock_mut().add("W", 2, None).unwrap();
        let mut b = topology();
        b.node_mut("W").unwrap().stock_mut().add("W", 1, None).unwrap();
        b.node_mut("W").unwrap().stock_mut().add("W", 1, None).unwrap();
        assert_ne!(a.state_hash(), b.state_hash());
    }

    #[test]
    fn rebase_all_pipelines() {
        let mut chain = populated();
        for _ in 0..2 {
            chain.node_mut("R").unwrap().update_pipeline();
        }
        chain.rebase_pipelines();
        let r = chain.node("R").unwrap();
        assert_eq!(r.pipeline().period(), 1);
        assert_eq!(r.pipeline().receipts()[0].eta, 2);
    }
}
