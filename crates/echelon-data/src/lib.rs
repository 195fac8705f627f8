//! Scenario files for the echelon simulator.
//!
//! A scenario lists nodes keyed by id, their sales and lead-time inputs,
//! their links, and optionally resumable state (stock, pipeline, orders,
//! backorders). Files may be RON, JSON or TOML, chosen by extension.

pub mod loader;
pub mod schema;

pub use loader::{
    build_chain, load_scenario, save_scenario, update_scenario, DataLoadError, Format, Scenario,
};
pub use schema::ScenarioData;
