//! NPC momentum: a running score of how NPC-initiated actions turned out.

use serde::{Deserialize, Serialize};

/// Unbounded, purely observational score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NpcMomentum(i64);

impl NpcMomentum {
    #[must_use]
    pub fn value(self) -> i64 {
        self.0
    }

    /// The change an outcome causes. Only NPC-initiated actions move the
    /// score.
    #[must_use]
    pub fn delta_for(initiated_by_npc: bool, result_value: i32) -> i64 {
        if initiated_by_npc {
            i64::from(result_value)
        } else {
            0
        }
    }

    pub fn apply(&mut self, delta: i64) {
        self.0 += delta;
    }
}
