//! Status - PermissionStore の集計（observability 用）

use serde::{Deserialize, Serialize};

/// Grants per state, plus reservations and retired tokens.
///
/// `revoked` and `expired` only count entries whose artifact is still being
/// reclaimed; reclaimed grants move to `retired`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantCounts {
    pub active: usize,
    pub revoked: usize,
    pub expired: usize,
    pub reserved: usize,
    /// Terminal grants whose reclaim failed and waits for the sweeper.
    pub unreclaimed: usize,
    pub retired: usize,
}

impl GrantCounts {
    /// Terminal grants whose artifact has not been deleted yet.
    pub fn pending_reclaim(&self) -> usize {
        self.revoked + self.expired
    }
}
