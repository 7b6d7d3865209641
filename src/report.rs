use std::fmt::Write;

use crate::models::{DashboardSnapshot, TeamMember};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M UTC";

pub fn render_member_card(output: &mut String, member: &TeamMember) {
    let status = member.status;
    let _ = writeln!(
        output,
        "[{}] {} <{}> (id {})",
        status.icon(),
        member.name,
        member.email,
        member.id
    );
    let _ = writeln!(
        output,
        "    {} ({}) | {} MQLs",
        status.label(),
        status.tone().color(),
        member.mql_count
    );
    let _ = writeln!(output, "    {}", member.activities);
    if let Some(submitted_at) = member.submitted_at {
        let _ = writeln!(output, "    Submitted: {}", submitted_at.format(TIMESTAMP_FORMAT));
    }
    if member.reminders_sent > 0 {
        let _ = writeln!(output, "    Reminders sent: {}", member.reminders_sent);
    }
}

pub fn render_roster(roster: &[TeamMember]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Team Activity");

    if roster.is_empty() {
        let _ = writeln!(output, "No team members on the roster.");
        return output;
    }

    for member in roster {
        render_member_card(&mut output, member);
    }
    output
}

pub fn render_non_responders(output: &mut String, names: &[String]) {
    if names.is_empty() {
        let _ = writeln!(output, "✓ All team members have responded!");
        return;
    }

    let _ = writeln!(output, "! Action Required: team members who haven't responded yet");
    for name in names {
        let _ = writeln!(output, "  - {name}");
    }
}

pub fn reminder_banner(pending: usize) -> Option<String> {
    match pending {
        0 => None,
        1 => Some("1 team member hasn't responded yet".to_string()),
        n => Some(format!("{n} team members haven't responded yet")),
    }
}

pub fn render_insights(output: &mut String, insights: &[String]) {
    let _ = writeln!(output, "Key Insights");
    for insight in insights {
        let _ = writeln!(output, "  ↗ {insight}");
    }
}

pub fn render_overview(snapshot: &DashboardSnapshot) -> String {
    let metrics = &snapshot.metrics;
    let top_performer = snapshot
        .activity_cards
        .iter()
        .find(|member| Some(&member.name) == metrics.top_performer.as_ref())
        .map(TeamMember::first_name)
        .or(metrics.top_performer.as_deref())
        .unwrap_or("n/a");

    let mut output = String::new();
    let _ = writeln!(output, "Key Metrics");
    let _ = writeln!(output, "  Total MQLs:       {}", metrics.total_mql);
    let _ = writeln!(output, "  Response Rate:    {}%", metrics.response_rate);
    let _ = writeln!(output, "  Avg MQLs/Person:  {}", metrics.average_mql);
    let _ = writeln!(output, "  Top Performer:    {top_performer}");
    let _ = writeln!(output);
    render_non_responders(&mut output, &snapshot.non_responders);
    let _ = writeln!(output);
    render_insights(&mut output, &snapshot.insights);
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "Last updated: {}",
        snapshot.generated_at.format(TIMESTAMP_FORMAT)
    );
    output
}

pub fn build_markdown(snapshot: &DashboardSnapshot, label: &str) -> String {
    let metrics = &snapshot.metrics;
    let mut output = String::new();

    let _ = writeln!(output, "# Marketing Dashboard Report");
    let _ = writeln!(
        output,
        "Generated for {} at {}",
        label,
        snapshot.generated_at.format(TIMESTAMP_FORMAT)
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Key Metrics");
    let _ = writeln!(output, "- Total MQLs: {}", metrics.total_mql);
    let _ = writeln!(
        output,
        "- Response rate: {}% ({} of {} members)",
        metrics.response_rate, metrics.responded_count, metrics.member_count
    );
    let _ = writeln!(output, "- Average MQLs per responder: {}", metrics.average_mql);
    let _ = writeln!(
        output,
        "- Top performer: {}",
        metrics.top_performer.as_deref().unwrap_or("n/a")
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Non-Responders");
    if snapshot.non_responders.is_empty() {
        let _ = writeln!(output, "All team members have responded.");
    } else {
        for name in &snapshot.non_responders {
            let _ = writeln!(output, "- {name}");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Key Insights");
    if snapshot.insights.is_empty() {
        let _ = writeln!(output, "No insights generated.");
    } else {
        for insight in &snapshot.insights {
            let _ = writeln!(output, "- {insight}");
        }
    }

    let mut cards = snapshot.activity_cards.clone();
    cards.sort_by(|a, b| b.mql_count.cmp(&a.mql_count));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Team Activity");
    let _ = writeln!(output, "| Member | Status | MQLs | Activities |");
    let _ = writeln!(output, "| --- | --- | --- | --- |");
    for member in &cards {
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} |",
            member.name,
            member.status.label(),
            member.mql_count,
            member.activities.replace('|', "\\|")
        );
    }

    output
}
