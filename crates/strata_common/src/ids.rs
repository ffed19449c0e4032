//! Typed index for layers registered in the layer graph.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a layer in the layer graph.
///
/// Assigned at registration as the number of layers registered before it, so
/// it doubles as the layer's topological rank: a layer may only extend layers
/// with a strictly smaller `LayerId`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct LayerId(u32);

impl LayerId {
    /// Creates a `LayerId` from a raw position.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw position.
    pub fn as_raw(self) -> u32 {
        self.0
    }

    /// Returns the position as a `usize` suitable for indexing.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
