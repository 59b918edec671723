//! Runner information types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::{CoreError, OperationCode, RunnerId};

/// The set of operation codes a runner can execute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet(BTreeSet<OperationCode>);

impl CapabilitySet {
    /// A set containing every known operation code.
    pub fn all() -> Self {
        Self(OperationCode::ALL.into_iter().collect())
    }

    /// Build a set from raw integer codes.
    ///
    /// An empty input yields the full set.
    pub fn from_codes(codes: &[i64]) -> Result<Self, CoreError> {
        if codes.is_empty() {
            return Ok(Self::all());
        }
        codes
            .iter()
            .map(|c| OperationCode::try_from(*c))
            .collect::<Result<BTreeSet<_>, _>>()
            .map(Self)
    }

    /// Check whether the set contains a code.
    pub fn supports(&self, code: OperationCode) -> bool {
        self.0.contains(&code)
    }

    /// Iterate codes in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &OperationCode> {
        self.0.iter()
    }

    /// Raw integer codes in ascending order.
    pub fn codes(&self) -> Vec<i64> {
        self.0.iter().map(|c| c.as_i64()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<OperationCode> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = OperationCode>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Information a runner declares when it registers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerInfo {
    /// Unique runner identifier.
    pub runner_id: RunnerId,

    /// Display name.
    pub name: String,

    /// Operation codes this runner executes.
    pub capabilities: CapabilitySet,
}

impl RunnerInfo {
    /// Create a new RunnerInfo that can execute every operation.
    pub fn new(runner_id: RunnerId, name: impl Into<String>) -> Self {
        Self {
            runner_id,
            name: name.into(),
            capabilities: CapabilitySet::all(),
        }
    }

    /// Builder method to restrict capabilities.
    pub fn with_capabilities(mut self, capabilities: CapabilitySet) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Check if this runner supports a given operation.
    pub fn supports(&self, code: OperationCode) -> bool {
        self.capabilities.supports(code)
    }
}
