use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::agent::{self, AgentCall, AgentConfig, AgentError};
use crate::metrics;
use crate::models::{AgentResponse, AggregateMetrics, DashboardSnapshot, ExportDocument, TeamMember};
use crate::roster::{self, CollectionPeriod, RosterError};

pub const COLLECTION_STARTED: &str = "Initiating data collection...";
pub const COLLECTION_FAILED: &str = "Error during collection. Please try again.";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ActionState {
    #[default]
    Idle,
    Loading,
    Loaded,
    Errored(String),
}

/// In-memory dashboard state for one session. Nothing here is persisted.
pub struct Dashboard {
    pub roster: Vec<TeamMember>,
    pub snapshot: Option<DashboardSnapshot>,
    pub selected_date: NaiveDate,
    pub session_id: Uuid,
    pub collection_status: String,
    /// Last failure of each action; cleared only when that action succeeds.
    pub collection_error: Option<String>,
    pub generation_error: Option<String>,
    pub collection_state: ActionState,
    pub generation_state: ActionState,
}

impl Dashboard {
    pub fn new(roster: Vec<TeamMember>, selected_date: NaiveDate) -> Self {
        Self {
            roster,
            snapshot: None,
            selected_date,
            session_id: Uuid::new_v4(),
            collection_status: String::new(),
            collection_error: None,
            generation_error: None,
            collection_state: ActionState::Idle,
            generation_state: ActionState::Idle,
        }
    }

    pub fn default_period(&self) -> CollectionPeriod {
        CollectionPeriod::WeekOf(self.selected_date)
    }

    pub fn set_date(&mut self, date: NaiveDate) {
        self.selected_date = date;
    }

    pub async fn collect(
        &mut self,
        client: &dyn AgentCall,
        config: &AgentConfig,
        period: CollectionPeriod,
    ) -> Result<(), AgentError> {
        self.collection_state = ActionState::Loading;
        self.collection_status = COLLECTION_STARTED.to_string();

        match agent::call_collection_agent(client, config, &period).await {
            Ok(response) => {
                let meta = response.collection_metadata();
                tracing::info!(
                    status = ?meta.collection_status,
                    processing_time = %meta.processing_time,
                    messages_sent = meta.messages_sent,
                    responses_collected = meta.responses_collected,
                    "collection finished"
                );

                self.roster = roster::apply_collection(&self.roster, Utc::now());
                self.collection_status = if response.result.trim().is_empty() {
                    "✓ Collection completed".to_string()
                } else {
                    format!("✓ {}", response.result.trim())
                };
                self.collection_state = ActionState::Loaded;
                self.collection_error = None;
                Ok(())
            }
            Err(e) => {
                self.collection_status = COLLECTION_FAILED.to_string();
                self.collection_state = ActionState::Errored(e.to_string());
                self.collection_error = Some(format!("Collection failed: {e}"));
                Err(e)
            }
        }
    }

    pub async fn generate(
        &mut self,
        client: &dyn AgentCall,
        config: &AgentConfig,
    ) -> Result<(), AgentError> {
        self.generation_state = ActionState::Loading;

        match agent::call_insight_agent(client, config, &self.roster).await {
            Ok(response) => {
                let snapshot =
                    build_snapshot(&self.roster, &response, self.snapshot.as_ref(), Utc::now());
                tracing::info!(
                    total_mql = snapshot.metrics.total_mql,
                    response_rate = snapshot.metrics.response_rate,
                    "dashboard generated"
                );
                self.snapshot = Some(snapshot);
                self.generation_state = ActionState::Loaded;
                self.generation_error = None;
                Ok(())
            }
            Err(e) => {
                self.generation_state = ActionState::Errored(e.to_string());
                self.generation_error = Some(format!("Dashboard generation failed: {e}"));
                Err(e)
            }
        }
    }

    pub fn remind(&mut self, member_id: &str) -> Result<u32, RosterError> {
        roster::remind(&mut self.roster, member_id)
    }

    pub fn remind_all(&mut self) -> usize {
        roster::remind_all_pending(&mut self.roster)
    }

    pub fn pending_reminders(&self) -> usize {
        self.roster.iter().filter(|member| !member.has_responded()).count()
    }

    pub fn export_document(&self, now: DateTime<Utc>) -> ExportDocument {
        ExportDocument {
            selected_date: self.selected_date,
            exported_at: now,
            team_data: self.roster.clone(),
            insights: self.snapshot.clone(),
        }
    }
}

/// Merge locally computed aggregates with the insight agent's reply.
///
/// Only `total_mqls` from the agent may override a local figure, and only
/// when it is positive.
pub fn build_snapshot(
    roster: &[TeamMember],
    response: &AgentResponse,
    previous: Option<&DashboardSnapshot>,
    now: DateTime<Utc>,
) -> DashboardSnapshot {
    let mut aggregates = metrics::compute_aggregates(roster);
    let agent_meta = response.insight_metadata();
    if let Some(total) = agent_meta.total_mqls.filter(|total| *total > 0) {
        aggregates.total_mql = total;
    }

    let mut insights = Vec::new();
    let summary = response.result.trim();
    if !summary.is_empty() {
        insights.push(summary.to_string());
    }
    insights.extend(templated_insights(roster, &aggregates, previous));

    DashboardSnapshot {
        non_responders: metrics::non_responders(roster),
        activity_cards: roster.to_vec(),
        metrics: aggregates,
        insights,
        agent: agent_meta,
        generated_at: now,
    }
}

fn templated_insights(
    roster: &[TeamMember],
    aggregates: &AggregateMetrics,
    previous: Option<&DashboardSnapshot>,
) -> Vec<String> {
    let mut lines = Vec::new();

    let engagement = match aggregates.response_rate {
        75.. => "strong",
        50..=74 => "moderate",
        _ => "low",
    };
    lines.push(format!(
        "Team demonstrated {engagement} engagement with {}% response rate",
        aggregates.response_rate
    ));

    if let Some(change) = previous
        .and_then(|prior| metrics::percent_change(prior.metrics.total_mql, aggregates.total_mql))
    {
        lines.push(match change {
            0 => "MQL generation held steady since the last snapshot".to_string(),
            c if c > 0 => format!("MQL generation improved {c}% since the last snapshot"),
            c => format!("MQL generation declined {}% since the last snapshot", -c),
        });
    }

    if let Some(top) = metrics::top_performer(roster) {
        let line = match metrics::percent_change(aggregates.average_mql, u64::from(top.mql_count)) {
            Some(margin) if margin > 0 => format!(
                "Top performer ({}) contributed {margin}% above team average",
                top.first_name()
            ),
            _ => format!(
                "Top performer ({}) leads with {} MQLs",
                top.first_name(),
                top.mql_count
            ),
        };
        lines.push(line);
    }

    let missing = roster.len() - aggregates.responded_count;
    lines.push(match missing {
        0 => "Every team member has responded this week".to_string(),
        1 => "Recommended focus on engagement for 1 non-respondent this week".to_string(),
        n => format!("Recommended focus on engagement for {n} non-respondents this week"),
    });

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::test_support::{config, MockAgent};
    use crate::models::MemberStatus;
    use chrono::TimeZone;

    fn dashboard() -> Dashboard {
        Dashboard::new(
            roster::seed_roster().unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        )
    }

    fn insight_reply(total: &str) -> String {
        format!(
            r#"{{"result": "Strong week overall", "confidence": 0.9,
                "metadata": {{"processing_time": "1.2s", "records_processed": 5,
                "dashboard_status": "ready", "total_mqls": {total}}}}}"#
        )
    }

    #[tokio::test]
    async fn collect_success_updates_roster_and_status() {
        let mut dash = dashboard();
        dash.roster[4].reminders_sent = 2;
        let agent = MockAgent::ok(r#"{"result": "Requests sent to 5 members", "confidence": 0.95}"#);

        dash.collect(&agent, &config(), dash.default_period()).await.unwrap();

        assert_eq!(dash.collection_status, "✓ Requests sent to 5 members");
        assert_eq!(dash.collection_state, ActionState::Loaded);
        assert_eq!(dash.roster[2].status, MemberStatus::Responded);
        assert!(dash.roster[2].submitted_at.is_some());
        assert_eq!(dash.roster[4].status, MemberStatus::Overdue);
        assert!(agent.prompts.lock().unwrap()[0].0.contains("the week of 2024-01-15"));
    }

    #[tokio::test]
    async fn collect_failure_leaves_roster_untouched() {
        let mut dash = dashboard();
        let before = dash.roster.clone();
        let agent = MockAgent::failing();

        let result = dash.collect(&agent, &config(), dash.default_period()).await;

        assert!(result.is_err());
        assert_eq!(dash.roster, before);
        assert_eq!(dash.collection_status, COLLECTION_FAILED);
        assert!(matches!(dash.collection_state, ActionState::Errored(_)));
        assert!(dash.collection_error.as_deref().unwrap().starts_with("Collection failed"));
        assert_eq!(dash.generation_error, None);
    }

    #[tokio::test]
    async fn collect_with_unparseable_reply_still_completes() {
        let mut dash = dashboard();
        let agent = MockAgent::ok("I have contacted everyone.");

        dash.collect(&agent, &config(), dash.default_period()).await.unwrap();
        assert_eq!(dash.collection_status, "✓ Collection completed");
    }

    #[tokio::test]
    async fn generate_builds_snapshot_from_roster() {
        let mut dash = dashboard();
        let agent = MockAgent::ok(&insight_reply("0"));

        dash.generate(&agent, &config()).await.unwrap();
        let snapshot = dash.snapshot.as_ref().unwrap();

        assert_eq!(snapshot.metrics.total_mql, 75);
        assert_eq!(snapshot.metrics.response_rate, 80);
        assert_eq!(snapshot.metrics.average_mql, 19);
        assert_eq!(snapshot.metrics.top_performer.as_deref(), Some("Lisa Chen"));
        assert_eq!(snapshot.non_responders, vec!["Emily Rodriguez".to_string()]);
        assert_eq!(snapshot.activity_cards.len(), 5);
        assert_eq!(snapshot.agent.records_processed, 5);
        assert_eq!(snapshot.insights[0], "Strong week overall");
        assert!(snapshot
            .insights
            .contains(&"Team demonstrated strong engagement with 80% response rate".to_string()));
        assert!(snapshot
            .insights
            .contains(&"Top performer (Lisa) contributed 11% above team average".to_string()));
        assert!(snapshot
            .insights
            .contains(&"Recommended focus on engagement for 1 non-respondent this week".to_string()));
    }

    #[tokio::test]
    async fn generate_takes_positive_agent_total() {
        let mut dash = dashboard();
        let agent = MockAgent::ok(&insight_reply("\"90\""));

        dash.generate(&agent, &config()).await.unwrap();
        let metrics = &dash.snapshot.as_ref().unwrap().metrics;
        assert_eq!(metrics.total_mql, 90);
        assert_eq!(metrics.average_mql, 19);
    }

    #[tokio::test]
    async fn generate_failure_keeps_previous_snapshot() {
        let mut dash = dashboard();
        let agent = MockAgent::new(vec![
            Ok(insight_reply("0")),
            Err(AgentError::ApiResponse {
                status: 502,
                body: "bad gateway".into(),
            }),
        ]);

        dash.generate(&agent, &config()).await.unwrap();
        let first = dash.snapshot.clone();
        dash.roster[0].mql_count = 100;

        assert!(dash.generate(&agent, &config()).await.is_err());
        assert_eq!(dash.snapshot, first);
        assert!(matches!(dash.generation_state, ActionState::Errored(_)));
        assert!(dash.generation_error.is_some());
    }

    #[tokio::test]
    async fn each_action_keeps_its_own_error() {
        let mut dash = dashboard();
        let agent = MockAgent::new(vec![
            Err(AgentError::ApiResponse {
                status: 503,
                body: "insight agent offline".into(),
            }),
            Ok(r#"{"result": "Requests sent", "confidence": 0.9}"#.to_string()),
        ]);

        assert!(dash.generate(&agent, &config()).await.is_err());
        dash.collect(&agent, &config(), dash.default_period()).await.unwrap();

        assert_eq!(dash.collection_error, None);
        assert_eq!(
            dash.generation_error.as_deref(),
            Some("Dashboard generation failed: agent response error: status 503: insight agent offline")
        );
        assert!(matches!(dash.generation_state, ActionState::Errored(_)));
    }

    #[tokio::test]
    async fn regeneration_reports_week_over_week_change() {
        let mut dash = dashboard();
        let agent = MockAgent::new(vec![Ok(insight_reply("0")), Ok(insight_reply("0"))]);

        dash.generate(&agent, &config()).await.unwrap();
        dash.roster[2].mql_count += 15;
        dash.generate(&agent, &config()).await.unwrap();

        let snapshot = dash.snapshot.as_ref().unwrap();
        assert_eq!(snapshot.metrics.total_mql, 90);
        assert!(snapshot
            .insights
            .contains(&"MQL generation improved 20% since the last snapshot".to_string()));
    }

    #[test]
    fn snapshot_for_silent_roster_guards_average() {
        let mut roster = roster::seed_roster().unwrap();
        for member in roster.iter_mut() {
            member.status = MemberStatus::Pending;
        }
        let now = Utc.with_ymd_and_hms(2024, 1, 16, 9, 0, 0).unwrap();

        let snapshot = build_snapshot(&roster, &AgentResponse::default(), None, now);
        assert_eq!(snapshot.metrics.average_mql, 0);
        assert_eq!(snapshot.metrics.response_rate, 0);
        assert_eq!(snapshot.non_responders.len(), 5);
        assert_eq!(snapshot.generated_at, now);
        assert!(snapshot
            .insights
            .contains(&"Top performer (Lisa) leads with 21 MQLs".to_string()));
        assert!(snapshot
            .insights
            .contains(&"Recommended focus on engagement for 5 non-respondents this week".to_string()));
    }

    #[test]
    fn remind_goes_through_roster() {
        let mut dash = dashboard();
        assert_eq!(dash.remind("3").unwrap(), 1);
        assert!(dash.remind("99").is_err());
        assert_eq!(dash.pending_reminders(), 1);
        assert_eq!(dash.remind_all(), 1);
        assert_eq!(dash.roster[2].reminders_sent, 2);
    }

    #[test]
    fn export_document_carries_roster_and_snapshot() {
        let dash = dashboard();
        let now = Utc::now();
        let doc = dash.export_document(now);
        assert_eq!(doc.team_data, dash.roster);
        assert_eq!(doc.insights, None);
        assert_eq!(doc.selected_date, dash.selected_date);
    }
}
