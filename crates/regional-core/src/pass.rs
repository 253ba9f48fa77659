//! Conditioning branch bookkeeping across repeated layer calls
//!
//! When the positive and negative prompts have different region counts the
//! host may run the two branches as separate batches. Nothing in a single
//! call says which branch it carries, so the branch is inferred from call
//! order: every `layers_per_step` calls the active branch flips.

use crate::{RegionError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Conditioning branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Branch {
    Positive,
    Negative,
}

impl Branch {
    /// The other branch
    pub fn toggled(self) -> Self {
        match self {
            Branch::Positive => Branch::Negative,
            Branch::Negative => Branch::Positive,
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Branch::Positive => f.write_str("positive"),
            Branch::Negative => f.write_str("negative"),
        }
    }
}

/// Call counter and active branch for one generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassState {
    call_count: usize,
    active: Branch,
    layers_per_step: usize,
}

impl PassState {
    /// Fresh state for a host visiting `layers_per_step` attention layers
    /// per branch
    pub fn new(layers_per_step: usize) -> Result<Self> {
        if layers_per_step == 0 {
            return Err(RegionError::Config(
                "layers_per_step must be non-zero".into(),
            ));
        }
        Ok(Self {
            call_count: 0,
            active: Branch::Positive,
            layers_per_step,
        })
    }

    /// Branch governing the current call
    pub fn active(&self) -> Branch {
        self.active
    }

    /// Calls seen since the last toggle
    pub fn call_count(&self) -> usize {
        self.call_count
    }

    /// Layers per step this state was built for
    pub fn layers_per_step(&self) -> usize {
        self.layers_per_step
    }

    /// Record one finished call, returning the branch for the next one
    pub fn advance(&mut self) -> Branch {
        self.call_count += 1;
        if self.call_count == self.layers_per_step {
            self.active = self.active.toggled();
            self.call_count = 0;
        }
        self.active
    }

    /// Back to the start of a generation
    pub fn reset(&mut self) {
        self.call_count = 0;
        self.active = Branch::Positive;
    }
}
