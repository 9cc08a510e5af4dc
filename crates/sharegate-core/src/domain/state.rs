//! State - Grant の状態
//!
//! # 状態遷移
//! - Active -> Revoked（明示的な revoke）
//! - Active -> Expired（sweeper または resolve 時の lazy expiry）
//!
//! 逆方向の遷移（復活）はありません。

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a Grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantState {
    /// Resolvable until its deadline.
    Active,

    /// Withdrawn by the issuer before the deadline.
    Revoked,

    /// Reached its deadline.
    Expired,
}

impl GrantState {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, GrantState::Revoked | GrantState::Expired)
    }

    /// Only `Active -> {Revoked | Expired}` is allowed.
    pub fn can_transition_to(self, next: GrantState) -> bool {
        self == GrantState::Active && next.is_terminal()
    }
}

impl fmt::Display for GrantState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GrantState::Active => "active",
            GrantState::Revoked => "revoked",
            GrantState::Expired => "expired",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::revoke(GrantState::Active, GrantState::Revoked, true)]
    #[case::expire(GrantState::Active, GrantState::Expired, true)]
    #[case::noop(GrantState::Active, GrantState::Active, false)]
    #[case::resurrect_revoked(GrantState::Revoked, GrantState::Active, false)]
    #[case::resurrect_expired(GrantState::Expired, GrantState::Active, false)]
    #[case::terminal_to_terminal(GrantState::Revoked, GrantState::Expired, false)]
    fn transitions_only_move_forward(
        #[case] from: GrantState,
        #[case] to: GrantState,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn terminal_states() {
        assert!(!GrantState::Active.is_terminal());
        assert!(GrantState::Revoked.is_terminal());
        assert!(GrantState::Expired.is_terminal());
    }
}
