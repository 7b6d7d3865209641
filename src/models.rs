use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Responded,
    Pending,
    Overdue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Positive,
    Pending,
    Alert,
}

impl MemberStatus {
    pub fn label(self) -> &'static str {
        match self {
            MemberStatus::Responded => "Responded",
            MemberStatus::Pending => "Pending",
            MemberStatus::Overdue => "Overdue",
        }
    }

    pub fn tone(self) -> Tone {
        match self {
            MemberStatus::Responded => Tone::Positive,
            MemberStatus::Pending => Tone::Pending,
            MemberStatus::Overdue => Tone::Alert,
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            MemberStatus::Responded => "✓",
            MemberStatus::Pending => "…",
            MemberStatus::Overdue => "!",
        }
    }
}

impl Tone {
    pub fn color(self) -> &'static str {
        match self {
            Tone::Positive => "green",
            Tone::Pending => "amber",
            Tone::Alert => "red",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMember {
    pub id: String,
    pub name: String,
    pub email: String,
    pub activities: String,
    pub mql_count: u32,
    pub status: MemberStatus,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reminders_sent: u32,
}

impl TeamMember {
    pub fn has_responded(&self) -> bool {
        self.status == MemberStatus::Responded
    }

    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub member_count: usize,
    pub responded_count: usize,
    pub pending_count: usize,
    pub overdue_count: usize,
    pub total_mql: u64,
    pub response_rate: u32,
    pub average_mql: u64,
    pub top_performer: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionStatus {
    Initiated,
    Completed,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DashboardStatus {
    Ready,
    Processing,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AgentResponse {
    pub result: String,
    pub confidence: f64,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CollectionMetadata {
    pub processing_time: String,
    pub messages_sent: u64,
    pub responses_collected: u64,
    pub collection_status: CollectionStatus,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InsightMetadata {
    pub processing_time: String,
    pub records_processed: u64,
    pub dashboard_status: DashboardStatus,
    pub total_mqls: Option<u64>,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub metrics: AggregateMetrics,
    pub activity_cards: Vec<TeamMember>,
    pub non_responders: Vec<String>,
    pub insights: Vec<String>,
    pub agent: InsightMetadata,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub selected_date: NaiveDate,
    pub exported_at: DateTime<Utc>,
    pub team_data: Vec<TeamMember>,
    pub insights: Option<DashboardSnapshot>,
}
