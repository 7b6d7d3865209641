use crate::models::{AggregateMetrics, MemberStatus, TeamMember};

pub fn responded_count(roster: &[TeamMember]) -> usize {
    roster.iter().filter(|member| member.has_responded()).count()
}

pub fn response_rate(roster: &[TeamMember]) -> u32 {
    if roster.is_empty() {
        return 0;
    }
    // At most 100, so the narrowing is lossless.
    rounded_ratio(responded_count(roster) as f64 * 100.0, roster.len() as f64) as u32
}

/// Summed in `u64`: a roster of large per-member counts must not wrap.
pub fn total_mql(roster: &[TeamMember]) -> u64 {
    roster.iter().map(|member| u64::from(member.mql_count)).sum()
}

pub fn average_mql(total: u64, responded: usize) -> u64 {
    if responded == 0 {
        return 0;
    }
    rounded_ratio(total as f64, responded as f64)
}

/// Strictly greatest MQL count wins; the first member seen keeps a tie.
pub fn top_performer(roster: &[TeamMember]) -> Option<&TeamMember> {
    let mut best: Option<&TeamMember> = None;
    for member in roster {
        match best {
            Some(current) if member.mql_count <= current.mql_count => {}
            _ => best = Some(member),
        }
    }
    best
}

pub fn non_responders(roster: &[TeamMember]) -> Vec<String> {
    roster
        .iter()
        .filter(|member| !member.has_responded())
        .map(|member| member.name.clone())
        .collect()
}

pub fn compute_aggregates(roster: &[TeamMember]) -> AggregateMetrics {
    let responded = responded_count(roster);
    let total = total_mql(roster);

    AggregateMetrics {
        member_count: roster.len(),
        responded_count: responded,
        pending_count: count_status(roster, MemberStatus::Pending),
        overdue_count: count_status(roster, MemberStatus::Overdue),
        total_mql: total,
        response_rate: response_rate(roster),
        average_mql: average_mql(total, responded),
        top_performer: top_performer(roster).map(|member| member.name.clone()),
    }
}

/// Percentage change between two totals, `None` when there is no baseline.
pub fn percent_change(previous: u64, current: u64) -> Option<i64> {
    if previous == 0 {
        return None;
    }
    let delta = (current as f64 - previous as f64) / previous as f64 * 100.0;
    Some(delta.round() as i64)
}

fn count_status(roster: &[TeamMember], status: MemberStatus) -> usize {
    roster.iter().filter(|member| member.status == status).count()
}

fn rounded_ratio(numerator: f64, denominator: f64) -> u64 {
    (numerator / denominator).round() as u64
}
