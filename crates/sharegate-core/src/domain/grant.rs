//! Grant record: the only persistent entity of the broker.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::errors::ValidationError;
use super::ids::{AccessToken, ArtifactRef};
use super::recipient::Recipient;
use super::state::GrantState;

/// A token bound to one artifact, one recipient and one deadline.
///
/// Fields are immutable after issuance except `state`, which only the
/// permission store changes (via compare-and-swap).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub token: AccessToken,
    pub artifact_ref: ArtifactRef,
    pub recipient: Recipient,

    /// Free-text note from the sender, kept for notification retries.
    pub message: String,

    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub state: GrantState,
}

impl Grant {
    /// Deadline of a grant issued at `issued_at` for `ttl`.
    pub fn deadline(
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<DateTime<Utc>, ValidationError> {
        if ttl <= Duration::zero() {
            return Err(ValidationError::NonPositiveTtl);
        }
        issued_at
            .checked_add_signed(ttl)
            .ok_or(ValidationError::TtlOutOfRange)
    }

    /// New `Active` grant. `expires_at` comes from [`Grant::deadline`].
    pub fn issue(
        token: AccessToken,
        artifact_ref: ArtifactRef,
        recipient: Recipient,
        message: impl Into<String>,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        debug_assert!(expires_at > issued_at);
        Self {
            token,
            artifact_ref,
            recipient,
            message: message.into(),
            issued_at,
            expires_at,
            state: GrantState::Active,
        }
    }

    /// Past the deadline (`now >= expires_at`), regardless of state.
    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Active and strictly before the deadline.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.state == GrantState::Active && !self.is_past_deadline(now)
    }

    /// Time left before the deadline (zero once past it).
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn grant_at(issued_at: DateTime<Utc>, ttl: Duration) -> Grant {
        Grant::issue(
            AccessToken::new("tok"),
            ArtifactRef::from_key("tok/a.xlsx"),
            Recipient::parse("r@example.com").unwrap(),
            "hi",
            issued_at,
            Grant::deadline(issued_at, ttl).unwrap(),
        )
    }

    #[test]
    fn issue_sets_deadline_and_active_state() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let grant = grant_at(t0, Duration::days(7));

        assert_eq!(grant.state, GrantState::Active);
        assert_eq!(grant.expires_at, t0 + Duration::days(7));
        assert!(grant.expires_at > grant.issued_at);
    }

    #[rstest]
    #[case::just_issued(Duration::zero(), true)]
    #[case::one_second_before(Duration::seconds(59), true)]
    #[case::at_deadline(Duration::seconds(60), false)]
    #[case::after_deadline(Duration::seconds(61), false)]
    fn usable_strictly_before_deadline(#[case] elapsed: Duration, #[case] usable: bool) {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let grant = grant_at(t0, Duration::seconds(60));

        assert_eq!(grant.is_usable(t0 + elapsed), usable);
    }

    #[rstest]
    #[case::zero(Duration::zero(), ValidationError::NonPositiveTtl)]
    #[case::negative(Duration::seconds(-5), ValidationError::NonPositiveTtl)]
    #[case::past_max_date(Duration::days(100_000_000), ValidationError::TtlOutOfRange)]
    #[case::max_delta(Duration::MAX, ValidationError::TtlOutOfRange)]
    fn deadline_rejects_unusable_ttls(#[case] ttl: Duration, #[case] expected: ValidationError) {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();

        assert_eq!(Grant::deadline(t0, ttl), Err(expected));
    }

    #[test]
    fn terminal_grant_is_not_usable_before_deadline() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let mut grant = grant_at(t0, Duration::hours(1));
        grant.state = GrantState::Revoked;

        assert!(!grant.is_usable(t0));
    }

    #[test]
    fn remaining_saturates_at_zero() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let grant = grant_at(t0, Duration::hours(1));

        assert_eq!(grant.remaining(t0), Duration::hours(1));
        assert_eq!(grant.remaining(t0 + Duration::hours(2)), Duration::zero());
    }
}
