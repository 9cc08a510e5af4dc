//! Notification text sent to the recipient of a grant.

use chrono::{DateTime, Duration, Utc};

use crate::domain::Grant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationMessage {
    pub subject: String,
    pub body: String,
}

/// Build the message for `grant`: the sender's note, the download URL and
/// when the link stops working.
pub fn compose(subject: &str, grant: &Grant, download_url: &str, now: DateTime<Utc>) -> NotificationMessage {
    let mut body = String::new();
    let note = grant.message.trim();
    if !note.is_empty() {
        body.push_str(note);
        body.push_str("\n\n");
    }
    body.push_str("Download your export here:\n");
    body.push_str(download_url);
    body.push_str("\n\n");
    body.push_str(&format!(
        "This link will expire in {} (at {}).\n",
        horizon(grant.remaining(now)),
        grant.expires_at.format("%Y-%m-%d %H:%M UTC"),
    ));
    body.push_str("If you didn't request this export, please ignore this email.\n");

    NotificationMessage {
        subject: subject.to_string(),
        body,
    }
}

/// Coarse, human-readable duration: largest whole unit, rounded down.
pub fn horizon(remaining: Duration) -> String {
    fn unit(n: i64, singular: &str) -> String {
        if n == 1 {
            format!("1 {singular}")
        } else {
            format!("{n} {singular}s")
        }
    }

    if remaining.num_days() >= 1 {
        unit(remaining.num_days(), "day")
    } else if remaining.num_hours() >= 1 {
        unit(remaining.num_hours(), "hour")
    } else if remaining.num_minutes() >= 1 {
        unit(remaining.num_minutes(), "minute")
    } else {
        "less than a minute".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AccessToken, ArtifactRef, Recipient};
    use chrono::TimeZone;
    use rstest::rstest;

    fn grant(message: &str, ttl: Duration) -> Grant {
        let issued_at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        Grant::issue(
            AccessToken::new("tok"),
            ArtifactRef::from_key("tok/a.xlsx"),
            Recipient::parse("r@example.com").unwrap(),
            message,
            issued_at,
            Grant::deadline(issued_at, ttl).unwrap(),
        )
    }

    #[test]
    fn body_carries_note_url_and_expiry() {
        let grant = grant("Here are this week's boxes", Duration::days(7));
        let msg = compose("Your export is ready", &grant, "https://cdn/x", grant.issued_at);

        assert_eq!(msg.subject, "Your export is ready");
        assert!(msg.body.starts_with("Here are this week's boxes\n\n"));
        assert!(msg.body.contains("https://cdn/x"));
        assert!(msg.body.contains("expire in 7 days (at 2024-01-08 12:00 UTC)"));
    }

    #[test]
    fn empty_note_is_omitted() {
        let grant = grant("   ", Duration::hours(2));
        let msg = compose("s", &grant, "https://cdn/x", grant.issued_at);

        assert!(msg.body.starts_with("Download your export here:"));
    }

    #[rstest]
    #[case(Duration::days(7), "7 days")]
    #[case(Duration::days(1), "1 day")]
    #[case(Duration::hours(30), "1 day")]
    #[case(Duration::hours(5), "5 hours")]
    #[case(Duration::minutes(1), "1 minute")]
    #[case(Duration::seconds(20), "less than a minute")]
    fn horizon_uses_largest_unit(#[case] remaining: Duration, #[case] expected: &str) {
        assert_eq!(horizon(remaining), expected);
    }
}
