use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::models::{MemberStatus, TeamMember};

/// Members at the head of the roster that a collection run marks as responded.
pub const COLLECTION_RESPONDED_PREFIX: usize = 4;
const COLLECTION_STAGGER_MINUTES: i64 = 15;

#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("no team member with id {0}")]
    UnknownMember(String),

    #[error("invalid period '{0}' (expected YYYY-MM-DD or YYYY-MM-DD..YYYY-MM-DD)")]
    InvalidPeriod(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionPeriod {
    WeekOf(NaiveDate),
    Range { start: NaiveDate, end: NaiveDate },
}

impl CollectionPeriod {
    pub fn anchor(&self) -> NaiveDate {
        match self {
            CollectionPeriod::WeekOf(date) => *date,
            CollectionPeriod::Range { start, .. } => *start,
        }
    }
}

impl fmt::Display for CollectionPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionPeriod::WeekOf(date) => write!(f, "the week of {date}"),
            CollectionPeriod::Range { start, end } => write!(f, "the period {start} to {end}"),
        }
    }
}

impl FromStr for CollectionPeriod {
    type Err = RosterError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || RosterError::InvalidPeriod(raw.to_string());
        let parse = |value: &str| NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d");

        match raw.split_once("..") {
            Some((start, end)) => {
                let start = parse(start).map_err(|_| invalid())?;
                let end = parse(end).map_err(|_| invalid())?;
                if start > end {
                    return Err(invalid());
                }
                Ok(CollectionPeriod::Range { start, end })
            }
            None => parse(raw).map(CollectionPeriod::WeekOf).map_err(|_| invalid()),
        }
    }
}

pub fn seed_roster() -> anyhow::Result<Vec<TeamMember>> {
    let members = vec![
        (
            "1",
            "Sarah Chen",
            "sarah.chen@example.com",
            "Led 3 webinars, attended 2 industry events",
            12,
            MemberStatus::Responded,
            Some((10, 30)),
        ),
        (
            "2",
            "Marcus Johnson",
            "marcus.johnson@example.com",
            "Published 5 thought leadership posts",
            18,
            MemberStatus::Responded,
            Some((11, 45)),
        ),
        (
            "3",
            "Emily Rodriguez",
            "emily.rodriguez@example.com",
            "Conducted 4 product demos",
            9,
            MemberStatus::Pending,
            None,
        ),
        (
            "4",
            "James Park",
            "james.park@example.com",
            "Managed 2 campaign launches",
            15,
            MemberStatus::Responded,
            Some((9, 15)),
        ),
        (
            "5",
            "Lisa Chen",
            "lisa.chen@example.com",
            "Attended customer advisory board",
            21,
            MemberStatus::Responded,
            Some((14, 0)),
        ),
    ];

    let submitted_on = NaiveDate::from_ymd_opt(2024, 1, 15).context("invalid date")?;
    let mut roster = Vec::with_capacity(members.len());

    for (id, name, email, activities, mql_count, status, submitted) in members {
        let submitted_at = match submitted {
            Some((hour, minute)) => Some(
                submitted_on
                    .and_hms_opt(hour, minute, 0)
                    .context("invalid time")?
                    .and_utc(),
            ),
            None => None,
        };

        roster.push(TeamMember {
            id: id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            activities: activities.to_string(),
            mql_count,
            status,
            submitted_at,
            reminders_sent: 0,
        });
    }

    Ok(roster)
}

pub fn load_csv(csv_path: &Path) -> anyhow::Result<Vec<TeamMember>> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        id: String,
        name: String,
        email: String,
        activities: String,
        mql_count: u32,
        status: MemberStatus,
        submitted_at: Option<DateTime<Utc>>,
        reminders_sent: Option<u32>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open roster {}", csv_path.display()))?;
    let mut roster = Vec::new();

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("bad roster row {}", line + 1))?;
        if roster.iter().any(|member: &TeamMember| member.id == row.id) {
            anyhow::bail!("duplicate member id {} in {}", row.id, csv_path.display());
        }

        roster.push(TeamMember {
            id: row.id,
            name: row.name,
            email: row.email,
            activities: row.activities,
            mql_count: row.mql_count,
            status: row.status,
            submitted_at: row.submitted_at,
            reminders_sent: row.reminders_sent.unwrap_or(0),
        });
    }

    tracing::info!(members = roster.len(), path = %csv_path.display(), "roster loaded");
    Ok(roster)
}

pub fn find<'a>(roster: &'a [TeamMember], id: &str) -> Option<&'a TeamMember> {
    roster.iter().find(|member| member.id == id)
}

pub fn find_mut<'a>(roster: &'a mut [TeamMember], id: &str) -> Option<&'a mut TeamMember> {
    roster.iter_mut().find(|member| member.id == id)
}

pub fn remind(roster: &mut [TeamMember], id: &str) -> Result<u32, RosterError> {
    let member = find_mut(roster, id).ok_or_else(|| RosterError::UnknownMember(id.to_string()))?;
    member.reminders_sent += 1;
    tracing::info!(member_id = %member.id, reminders = member.reminders_sent, "reminder sent");
    Ok(member.reminders_sent)
}

pub fn remind_all_pending(roster: &mut [TeamMember]) -> usize {
    let mut reminded = 0;
    for member in roster.iter_mut().filter(|member| !member.has_responded()) {
        member.reminders_sent += 1;
        reminded += 1;
    }
    reminded
}

/// Builds the roster a successful collection run leaves behind.
///
/// The caller swaps it in only once the collection agent has answered, so a
/// failed run never leaves a half-updated roster.
pub fn apply_collection(roster: &[TeamMember], now: DateTime<Utc>) -> Vec<TeamMember> {
    roster
        .iter()
        .enumerate()
        .map(|(idx, member)| {
            let mut updated = member.clone();
            if idx < COLLECTION_RESPONDED_PREFIX {
                updated.status = MemberStatus::Responded;
                updated.submitted_at =
                    Some(now - Duration::minutes(idx as i64 * COLLECTION_STAGGER_MINUTES));
            } else {
                updated.status = if member.reminders_sent > 0 {
                    MemberStatus::Overdue
                } else {
                    MemberStatus::Pending
                };
                updated.submitted_at = None;
            }
            updated
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn seed_roster_matches_dashboard_defaults() {
        let roster = seed_roster().unwrap();
        assert_eq!(roster.len(), 5);
        assert_eq!(roster[0].name, "Sarah Chen");
        assert_eq!(roster[2].status, MemberStatus::Pending);
        assert!(roster[2].submitted_at.is_none());
        let expected = Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap();
        assert_eq!(roster[4].submitted_at, Some(expected));
    }

    #[test]
    fn remind_increments_counter() {
        let mut roster = seed_roster().unwrap();
        assert_eq!(remind(&mut roster, "3").unwrap(), 1);
        assert_eq!(remind(&mut roster, "3").unwrap(), 2);
        assert_eq!(find(&roster, "3").unwrap().reminders_sent, 2);
    }

    #[test]
    fn remind_rejects_unknown_member() {
        let mut roster = seed_roster().unwrap();
        let err = remind(&mut roster, "42").unwrap_err();
        assert!(matches!(err, RosterError::UnknownMember(id) if id == "42"));
    }

    #[test]
    fn remind_all_only_touches_non_responders() {
        let mut roster = seed_roster().unwrap();
        assert_eq!(remind_all_pending(&mut roster), 1);
        assert_eq!(find(&roster, "3").unwrap().reminders_sent, 1);
        assert_eq!(find(&roster, "1").unwrap().reminders_sent, 0);
    }

    #[test]
    fn collection_marks_prefix_responded() {
        let mut roster = seed_roster().unwrap();
        roster[4].reminders_sent = 1;
        let now = Utc.with_ymd_and_hms(2024, 1, 22, 12, 0, 0).unwrap();

        let updated = apply_collection(&roster, now);
        assert_eq!(updated.len(), roster.len());
        for (idx, member) in updated.iter().take(COLLECTION_RESPONDED_PREFIX).enumerate() {
            assert_eq!(member.status, MemberStatus::Responded);
            assert_eq!(
                member.submitted_at,
                Some(now - Duration::minutes(idx as i64 * 15))
            );
            assert_eq!(member.mql_count, roster[idx].mql_count);
        }
        assert_eq!(updated[4].status, MemberStatus::Overdue);
        assert!(updated[4].submitted_at.is_none());
    }

    #[test]
    fn collection_leaves_unreminded_tail_pending() {
        let roster = seed_roster().unwrap();
        let updated = apply_collection(&roster, Utc::now());
        assert_eq!(updated[4].status, MemberStatus::Pending);
    }

    #[test]
    fn period_parses_single_date_and_range() {
        let week: CollectionPeriod = "2024-01-15".parse().unwrap();
        assert_eq!(
            week,
            CollectionPeriod::WeekOf(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
        );

        let range: CollectionPeriod = "2024-01-15..2024-01-21".parse().unwrap();
        assert_eq!(range.anchor(), NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(range.to_string(), "the period 2024-01-15 to 2024-01-21");
    }

    #[test]
    fn period_rejects_reversed_range_and_garbage() {
        assert!("2024-01-21..2024-01-15".parse::<CollectionPeriod>().is_err());
        assert!("last week".parse::<CollectionPeriod>().is_err());
    }

    #[test]
    fn csv_roster_loads_optional_columns() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("roster.csv");
        std::fs::write(
            &path,
            "id,name,email,activities,mql_count,status,submitted_at,reminders_sent\n\
             a1,Dana Fox,dana@example.com,Hosted a meetup,7,responded,2024-01-15T10:30:00Z,\n\
             a2,Eli Park,eli@example.com,Wrote a case study,3,overdue,,2\n",
        )
        .unwrap();

        let roster = load_csv(&path).unwrap();

        assert_eq!(roster.len(), 2);
        assert_eq!(roster[0].status, MemberStatus::Responded);
        assert!(roster[0].submitted_at.is_some());
        assert_eq!(roster[0].reminders_sent, 0);
        assert_eq!(roster[1].status, MemberStatus::Overdue);
        assert_eq!(roster[1].reminders_sent, 2);
    }

    #[test]
    fn csv_roster_with_large_counts_aggregates() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("roster.csv");
        std::fs::write(
            &path,
            "id,name,email,activities,mql_count,status,submitted_at,reminders_sent\n\
             b1,Ann Lee,ann@example.com,Paid search,3000000000,responded,,\n\
             b2,Bo Kim,bo@example.com,Trade show,3000000000,responded,,\n",
        )
        .unwrap();

        let roster = load_csv(&path).unwrap();
        let metrics = crate::metrics::compute_aggregates(&roster);
        assert_eq!(metrics.total_mql, 6_000_000_000);
        assert_eq!(metrics.top_performer.as_deref(), Some("Ann Lee"));
    }
}
