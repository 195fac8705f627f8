//! Run configuration and run state types.
//!
//! A run is `loops × periods_per_loop` periods. Periods are global and keep
//! increasing across loops; at the end of every loop the per-period input
//! data is shifted forward so it replays for the next loop.

use crate::id::{NodeId, Period};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Errors detected before any period runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("run must have at least one loop")]
    ZeroLoops,
    #[error("a loop must have at least one period")]
    ZeroPeriodsPerLoop,
    #[error("node {0} has no low-level code; rank the supply chain before running")]
    MissingLlc(NodeId),
}

/// How long to run and what to report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    pub loops: u32,
    pub periods_per_loop: Period,
    /// Emit debug-level stock/backorder/pipeline/order snapshots each period.
    #[serde(default)]
    pub emit_snapshots: bool,
}

impl RunConfig {
    pub fn new(loops: u32, periods_per_loop: Period) -> Self {
        Self {
            loops,
            periods_per_loop,
            emit_snapshots: false,
        }
    }

    pub fn with_snapshots(mut self, emit: bool) -> Self {
        self.emit_snapshots = emit;
        self
    }

    /// Total number of periods in the run.
    pub fn total_periods(&self) -> Period {
        Period::from(self.loops) * self.periods_per_loop
    }

    /// 1-based loop that `period` falls in.
    pub fn loop_of(&self, period: Period) -> u32 {
        let index = period.saturating_sub(1) / self.periods_per_loop.max(1);
        u32::try_from(index).map_or(u32::MAX, |i| i.saturating_add(1))
    }

    /// Whether `period` is the last period of its loop.
    pub fn ends_loop(&self, period: Period) -> bool {
        self.periods_per_loop > 0 && period % self.periods_per_loop == 0
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.loops == 0 {
            return Err(ConfigError::ZeroLoops);
        }
        if self.periods_per_loop == 0 {
            return Err(ConfigError::ZeroPeriodsPerLoop);
        }
        Ok(())
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

// ---------------------------------------------------------------------------
// Run state
// ---------------------------------------------------------------------------

/// Where a run is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    NotStarted,
    /// The given period completed; more remain.
    Period(Period),
    Finished,
    /// A period failed part-way. No further periods run.
    Aborted { period: Period },
}

impl RunState {
    /// Whether no more periods can run.
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Finished | RunState::Aborted { .. })
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub periods: Period,
    pub loops: u32,
    /// [`StateHash`] of the supply chain after the last period.
    pub state_hash: u64,
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// A simple deterministic hash of simulation state for comparing runs.
///
/// Uses FNV-1a (64-bit) for speed and simplicity. Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    /// Feed a string, length-prefixed so adjacent strings cannot alias.
    pub fn write_str(&mut self, s: &str) {
        self.write_u64(s.len() as u64);
        self.write(s.as_bytes());
    }

    pub fn write_opt_u64(&mut self, v: Option<u64>) {
        match v {
            Some(v) => {
                self.write(&[1]);
                self.write_u64(v);
            }
            None => self.write(&[0]),
        }
    }

    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}
