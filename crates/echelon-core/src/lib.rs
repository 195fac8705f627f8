//! Echelon Core -- the period-driven simulation engine for multi-echelon
//! supply chains.
//!
//! This crate provides the inventory state held by every node (FIFO stock
//! batches, backorders, in-transit pipeline, outstanding orders), the
//! supply-chain graph with low-level-code ranking, and the simulator that
//! advances the network period by period while delegating ordering and
//! release decisions to pluggable policies.
//!
//! # Six-Phase Period Pipeline
//!
//! Each call to [`engine::Simulator::step`] advances the simulation by one
//! period. Every phase runs for all nodes before the next phase starts:
//!
//! 1. **Receive** -- Pipeline receipts whose eta has arrived enter stock.
//! 2. **Assemble** -- Nodes turn component stock into their own item.
//! 3. **Backorders** -- Own stock ships against carried-over demand.
//! 4. **Sales** -- This period's order lines are served; the rest is backordered.
//! 5. **Pipeline** -- Pipelines advance to the next period.
//! 6. **Replenish** -- Per LLC, the control policy places orders and the
//!    release policy turns them into pipeline receipts.
//!
//! # Key Types
//!
//! - [`engine::Simulator`] -- Drives periods and loops through the pipeline.
//! - [`graph::SupplyChain`] -- Node map, edge list and LLC ranking.
//! - [`node::Node`] -- Per-node inventory state and per-period behaviors.
//! - [`stock::Stock`] -- FIFO batch-tracked on-hand inventory.
//! - [`policy::ControlPolicy`] / [`policy::ReleasePolicy`] -- Pluggable
//!   replenishment decisions.
//! - [`metrics::MetricsSink`] -- Receiver of structured metric events.
//! - [`serialize`] -- Versioned state snapshots via bitcode.

pub mod backorders;
pub mod engine;
pub mod graph;
pub mod id;
pub mod metrics;
pub mod node;
pub mod orders;
pub mod pipeline;
pub mod policy;
pub mod serialize;
pub mod sim;
pub mod stock;
pub mod strategy;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
