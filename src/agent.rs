//! Client for the external AI agents behind collection and insight generation.
//!
//! Agents are addressed by opaque ids and answer with loosely structured JSON,
//! often wrapped in prose or markdown fences. Everything coming back is
//! untrusted: [`parse_agent_response`] coerces what it can and falls back to a
//! caller-supplied default for the rest.

use std::time::{Duration, Instant};

use serde_json::{Map, Value};

use crate::models::{
    AgentResponse, CollectionMetadata, CollectionStatus, DashboardStatus, InsightMetadata,
    TeamMember,
};
use crate::roster::CollectionPeriod;

pub const DEFAULT_COLLECTION_AGENT_ID: &str = "68fd262d058210757bf63fc4";
pub const DEFAULT_INSIGHT_AGENT_ID: &str = "68fd2650be2defc486f4567a";
pub const DEFAULT_USER_ID: &str = "dashboard@localhost";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const MAX_ERROR_BODY_CHARS: usize = 200;

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("config parse failed: {0}")]
    ConfigParse(String),

    #[error("missing agent setting: env var {var} not set")]
    MissingSetting { var: String },

    #[error("agent request failed: {0}")]
    ApiRequest(String),

    #[error("agent response error: status {status}: {body}")]
    ApiResponse { status: u16, body: String },

    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

// =============================================================================
// CONFIG
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub api_url: String,
    pub api_key: String,
    pub user_id: String,
    pub collection_agent_id: String,
    pub insight_agent_id: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: Option<u64>,
}

impl AgentConfig {
    /// Build agent config from environment variables.
    ///
    /// Required: `AGENT_API_URL`, `AGENT_API_KEY`.
    ///
    /// Optional: `AGENT_USER_ID`, `COLLECTION_AGENT_ID`, `INSIGHT_AGENT_ID`,
    /// `AGENT_CONNECT_TIMEOUT_SECS` (default 10), `AGENT_REQUEST_TIMEOUT_SECS`
    /// (no request timeout when unset).
    pub fn from_env() -> Result<Self, AgentError> {
        let api_url = required_env("AGENT_API_URL")?;
        let api_key = required_env("AGENT_API_KEY")?;

        let connect_timeout_secs = match std::env::var("AGENT_CONNECT_TIMEOUT_SECS").ok() {
            Some(raw) => parse_secs("AGENT_CONNECT_TIMEOUT_SECS", &raw)?,
            None => DEFAULT_CONNECT_TIMEOUT_SECS,
        };
        let request_timeout_secs = match std::env::var("AGENT_REQUEST_TIMEOUT_SECS").ok() {
            Some(raw) => Some(parse_secs("AGENT_REQUEST_TIMEOUT_SECS", &raw)?),
            None => None,
        };

        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
            user_id: env_or("AGENT_USER_ID", DEFAULT_USER_ID),
            collection_agent_id: env_or("COLLECTION_AGENT_ID", DEFAULT_COLLECTION_AGENT_ID),
            insight_agent_id: env_or("INSIGHT_AGENT_ID", DEFAULT_INSIGHT_AGENT_ID),
            connect_timeout_secs,
            request_timeout_secs,
        })
    }

    pub fn agent_id(&self, kind: AgentKind) -> &str {
        match kind {
            AgentKind::Collection => &self.collection_agent_id,
            AgentKind::Insight => &self.insight_agent_id,
        }
    }
}

fn required_env(var: &str) -> Result<String, AgentError> {
    std::env::var(var)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| AgentError::MissingSetting { var: var.to_string() })
}

fn env_or(var: &str, default: &str) -> String {
    std::env::var(var).unwrap_or_else(|_| default.to_string())
}

fn parse_secs(var: &str, raw: &str) -> Result<u64, AgentError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| AgentError::ConfigParse(format!("{var} must be a whole number of seconds, got '{raw}'")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentKind {
    Collection,
    Insight,
}

// =============================================================================
// TRANSPORT
// =============================================================================

/// One round trip to an agent: prompt in, raw response text out.
#[async_trait::async_trait]
pub trait AgentCall: Send + Sync {
    async fn call(&self, prompt: &str, agent_id: &str) -> Result<String, AgentError>;
}

/// A configured agent transport together with the ids it should address.
pub struct Agents {
    pub client: Box<dyn AgentCall>,
    pub config: AgentConfig,
}

impl Agents {
    pub fn from_env(session_id: &str) -> Result<Self, AgentError> {
        let config = AgentConfig::from_env()?;
        let client = HttpAgentClient::new(&config, session_id.to_string())?;
        Ok(Self {
            client: Box::new(client),
            config,
        })
    }
}

pub struct HttpAgentClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    user_id: String,
    session_id: String,
}

impl HttpAgentClient {
    pub fn new(config: &AgentConfig, session_id: String) -> Result<Self, AgentError> {
        let mut builder =
            reqwest::Client::builder().connect_timeout(Duration::from_secs(config.connect_timeout_secs));
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder
            .build()
            .map_err(|e| AgentError::HttpClientBuild(e.to_string()))?;

        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            user_id: config.user_id.clone(),
            session_id,
        })
    }
}

/// Error bodies can be whole HTML pages; keep enough to show the user.
fn error_excerpt(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

#[derive(serde::Serialize)]
struct InferenceRequest<'a> {
    agent_id: &'a str,
    user_id: &'a str,
    session_id: &'a str,
    message: &'a str,
}

#[async_trait::async_trait]
impl AgentCall for HttpAgentClient {
    async fn call(&self, prompt: &str, agent_id: &str) -> Result<String, AgentError> {
        let body = InferenceRequest {
            agent_id,
            user_id: &self.user_id,
            session_id: &self.session_id,
            message: prompt,
        };

        let response = self
            .http
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AgentError::ApiRequest(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| AgentError::ApiRequest(e.to_string()))?;

        if !(200..300).contains(&status) {
            return Err(AgentError::ApiResponse {
                status,
                body: error_excerpt(&text),
            });
        }

        Ok(text)
    }
}

// =============================================================================
// PARSING
// =============================================================================

/// Locate a JSON object inside freeform model output.
///
/// Tries a ```json fence, then a bare fence whose body is an object, then the
/// whole text, then the first balanced `{...}` embedded in prose that parses.
pub fn extract_json(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```json") {
        let body = start + "```json".len();
        if let Some(end) = text[body..].find("```") {
            return Some(text[body..body + end].trim());
        }
    }

    if let Some(start) = text.find("```") {
        let after_fence = start + 3;
        if let Some(nl) = text[after_fence..].find('\n') {
            let body = after_fence + nl + 1;
            if let Some(end) = text[body..].find("```") {
                let candidate = text[body..body + end].trim();
                if candidate.starts_with('{') {
                    return Some(candidate);
                }
            }
        }
    }

    let trimmed = text.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Some(trimmed);
    }

    // A brace in prose (a `{name}` placeholder, say) is skipped when the
    // balanced span after it is not valid JSON.
    for (start, _) in text.match_indices('{') {
        if let Some(candidate) = balanced_object(&text[start..]) {
            if serde_json::from_str::<Value>(candidate).is_ok() {
                return Some(candidate);
            }
        }
    }
    None
}

/// The shortest prefix of `text` (which starts at `{`) whose braces balance,
/// ignoring braces inside strings.
fn balanced_object(text: &str) -> Option<&str> {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape = false;

    for (i, ch) in text.char_indices() {
        if escape {
            escape = false;
            continue;
        }
        if ch == '\\' && in_string {
            escape = true;
            continue;
        }
        if ch == '"' {
            in_string = !in_string;
            continue;
        }
        if in_string {
            continue;
        }
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(text.trim()) {
        return Some(map);
    }
    let json = extract_json(text)?;
    match serde_json::from_str::<Value>(json).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Peel off an inference envelope such as `{"response": "..."}`.
///
/// The inner payload may be a JSON string holding more JSON or an object.
fn unwrap_envelope(mut object: Map<String, Value>) -> Map<String, Value> {
    for _ in 0..3 {
        if object.contains_key("result") {
            break;
        }
        let inner = match object.remove("response") {
            Some(Value::Object(inner)) => Some(inner),
            Some(Value::String(text)) => parse_object(&text),
            _ => None,
        };
        match inner {
            Some(inner) => object = inner,
            None => break,
        }
    }
    object
}

/// Defensive parse of an agent reply; never fails, only falls back.
pub fn parse_agent_response(text: &str, default: AgentResponse) -> AgentResponse {
    let Some(object) = parse_object(text).map(unwrap_envelope) else {
        tracing::warn!(chars = text.len(), "agent reply held no JSON object, using default");
        return default;
    };

    let result = match object.get("result") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => default.result,
        Some(other) => other.to_string(),
    };
    let confidence = object
        .get("confidence")
        .and_then(as_f64)
        .filter(|value| value.is_finite())
        .unwrap_or(default.confidence);
    let metadata = match object.get("metadata") {
        Some(Value::Object(map)) => map.clone(),
        _ => default.metadata,
    };

    AgentResponse {
        result,
        confidence,
        metadata,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').parse().ok(),
        _ => None,
    }
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f.round() as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text_field(metadata: &Map<String, Value>, key: &str) -> String {
    match metadata.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn count_field(metadata: &Map<String, Value>, key: &str) -> u64 {
    metadata.get(key).and_then(as_u64).unwrap_or(0)
}

impl AgentResponse {
    pub fn collection_metadata(&self) -> CollectionMetadata {
        let collection_status = match self.metadata.get("collection_status").and_then(Value::as_str) {
            Some(raw) if raw.eq_ignore_ascii_case("initiated") => CollectionStatus::Initiated,
            Some(raw) if raw.eq_ignore_ascii_case("completed") => CollectionStatus::Completed,
            _ => CollectionStatus::Unknown,
        };

        CollectionMetadata {
            processing_time: text_field(&self.metadata, "processing_time"),
            messages_sent: count_field(&self.metadata, "messages_sent"),
            responses_collected: count_field(&self.metadata, "responses_collected"),
            collection_status,
        }
    }

    pub fn insight_metadata(&self) -> InsightMetadata {
        let dashboard_status = match self.metadata.get("dashboard_status").and_then(Value::as_str) {
            Some(raw) if raw.eq_ignore_ascii_case("ready") => DashboardStatus::Ready,
            Some(raw) if raw.eq_ignore_ascii_case("processing") => DashboardStatus::Processing,
            _ => DashboardStatus::Unknown,
        };
        let total_mqls = self
            .metadata
            .get("total_mqls")
            .and_then(as_u64);

        InsightMetadata {
            processing_time: text_field(&self.metadata, "processing_time"),
            records_processed: count_field(&self.metadata, "records_processed"),
            dashboard_status,
            total_mqls,
            confidence: self.confidence,
        }
    }
}

// =============================================================================
// PROMPTS & CALLS
// =============================================================================

pub fn collection_prompt(period: &CollectionPeriod) -> String {
    format!(
        "Please collect weekly marketing activities and MQL data from our team members for {period}. \
         Include activities and MQL counts for at least 5 team members."
    )
}

pub fn insight_prompt(roster: &[TeamMember]) -> String {
    let summary = roster
        .iter()
        .map(|member| {
            format!(
                "{}: {} MQLs, Status: {}, Activities: {}",
                member.name,
                member.mql_count,
                member.status.label().to_lowercase(),
                member.activities
            )
        })
        .collect::<Vec<_>>()
        .join("; ");

    format!(
        "Generate dashboard insights from this team data: {summary}. Provide total MQLs, response rate \
         percentage, average MQLs per person, top performer name, list of non-responders, and 3-4 key \
         insights about team performance and trends."
    )
}

async fn invoke(
    client: &dyn AgentCall,
    config: &AgentConfig,
    kind: AgentKind,
    prompt: &str,
) -> Result<AgentResponse, AgentError> {
    let agent_id = config.agent_id(kind);
    let started = Instant::now();

    let raw = client.call(prompt, agent_id).await.map_err(|e| {
        tracing::error!(agent_id, ?kind, error = %e, "agent call failed");
        e
    })?;

    let parsed = parse_agent_response(&raw, AgentResponse::default());
    tracing::info!(
        agent_id,
        ?kind,
        confidence = parsed.confidence,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "agent call completed"
    );
    Ok(parsed)
}

pub async fn call_collection_agent(
    client: &dyn AgentCall,
    config: &AgentConfig,
    period: &CollectionPeriod,
) -> Result<AgentResponse, AgentError> {
    invoke(client, config, AgentKind::Collection, &collection_prompt(period)).await
}

pub async fn call_insight_agent(
    client: &dyn AgentCall,
    config: &AgentConfig,
    roster: &[TeamMember],
) -> Result<AgentResponse, AgentError> {
    invoke(client, config, AgentKind::Insight, &insight_prompt(roster)).await
}
