//! Run-level trace codec for `RaffleSimulation.physics_state`
//!
//! A persisted trace is `{ version, payload }`. Decoders are registered per
//! version so traces written by older simulators stay readable after the
//! payload format moves on.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use raffle_core::{DrawLabel, PhysicsState, RngAlgorithm, TraceError};
use raffle_draw::{ChamberConfig, DrawSeed, DrawTrace};

use crate::snapshot::Snapshot;

/// Version written by this build
pub const TRACE_VERSION: u32 = 1;

/// Everything needed to replay or re-simulate one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunTrace {
    pub algorithm: RngAlgorithm,
    /// Run seed; each draw carries its own derived sub-seed
    pub seed: DrawSeed,
    pub chamber: ChamberConfig,
    pub snapshot: Snapshot,
    pub draws: Vec<DrawTrace>,
}

impl RunTrace {
    pub fn draw(&self, label: &DrawLabel) -> Option<&DrawTrace> {
        self.draws.iter().find(|d| &d.label == label)
    }

    /// Wrap as the current trace version
    pub fn encode(&self) -> Result<PhysicsState, serde_json::Error> {
        Ok(PhysicsState {
            version: TRACE_VERSION,
            payload: serde_json::to_value(self)?,
        })
    }
}

/// Decodes one trace version into the current [`RunTrace`] shape
pub type TraceDecoder = fn(serde_json::Value) -> Result<RunTrace, serde_json::Error>;

fn decode_v1(payload: serde_json::Value) -> Result<RunTrace, serde_json::Error> {
    serde_json::from_value(payload)
}

/// Version → decoder table
pub struct TraceRegistry {
    decoders: HashMap<u32, TraceDecoder>,
}

impl TraceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Registry with every version this build understands
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(1, decode_v1);
        registry
    }

    pub fn register(&mut self, version: u32, decoder: TraceDecoder) {
        if self.decoders.insert(version, decoder).is_some() {
            log::warn!("Trace decoder for version {version} replaced");
        }
    }

    pub fn supports(&self, version: u32) -> bool {
        self.decoders.contains_key(&version)
    }

    /// Registered versions, ascending
    pub fn versions(&self) -> Vec<u32> {
        let mut versions: Vec<u32> = self.decoders.keys().copied().collect();
        versions.sort_unstable();
        versions
    }

    pub fn decode(&self, state: &PhysicsState) -> Result<RunTrace, TraceError> {
        let decoder = self
            .decoders
            .get(&state.version)
            .ok_or(TraceError::UnknownVersion(state.version))?;
        decoder(state.payload.clone()).map_err(|source| TraceError::Malformed {
            version: state.version,
            source,
        })
    }
}

impl Default for TraceRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
