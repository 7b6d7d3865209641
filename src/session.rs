use std::io::Write;
use std::path::PathBuf;

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::agent::Agents;
use crate::dashboard::Dashboard;
use crate::export;
use crate::report;
use crate::roster::{self, CollectionPeriod};

#[derive(Parser)]
#[command(no_binary_name = true, disable_version_flag = true)]
struct SessionLine {
    #[command(subcommand)]
    command: SessionCommand,
}

#[derive(Subcommand)]
enum SessionCommand {
    /// Ask the collection agent for this week's updates
    Collect {
        /// YYYY-MM-DD (week of) or YYYY-MM-DD..YYYY-MM-DD
        period: Option<CollectionPeriod>,
    },
    /// Generate the dashboard snapshot and insights
    Generate,
    /// Send a reminder to one member, or every non-responder
    Remind {
        #[arg(required_unless_present = "all")]
        id: Option<String>,
        #[arg(long, conflicts_with = "id")]
        all: bool,
    },
    /// Show team activity cards
    Roster,
    /// Show key metrics, non-responders and insights
    Overview,
    /// Show the insights list
    Insights,
    /// Change the selected date
    Date { date: NaiveDate },
    /// Write the JSON report to a directory
    Export { dir: Option<PathBuf> },
    /// Copy the JSON report to the clipboard
    Copy,
    /// Show action states and the last error
    Status,
    /// Leave the session
    #[command(alias = "exit")]
    Quit,
}

pub struct Session {
    dashboard: Dashboard,
    agents: Result<Agents, String>,
}

impl Session {
    pub fn new(dashboard: Dashboard, agents: Result<Agents, String>) -> Self {
        Self { dashboard, agents }
    }

    /// Run one input line. Returns `false` once the user asks to quit.
    pub async fn handle<W: Write>(&mut self, line: &str, out: &mut W) -> anyhow::Result<bool> {
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() {
            return Ok(true);
        }

        let command = match SessionLine::try_parse_from(words) {
            Ok(parsed) => parsed.command,
            Err(e) => {
                write!(out, "{e}")?;
                return Ok(true);
            }
        };

        match command {
            SessionCommand::Collect { period } => {
                let period = period.unwrap_or_else(|| self.dashboard.default_period());
                match &self.agents {
                    Ok(agents) => {
                        writeln!(out, "Collecting...")?;
                        let result = self
                            .dashboard
                            .collect(agents.client.as_ref(), &agents.config, period)
                            .await;
                        writeln!(out, "{}", self.dashboard.collection_status)?;
                        if result.is_ok() {
                            write!(out, "{}", report::render_roster(&self.dashboard.roster))?;
                        }
                    }
                    Err(reason) => agents_unavailable(&mut self.dashboard.collection_error, reason, out)?,
                }
            }
            SessionCommand::Generate => match &self.agents {
                Ok(agents) => {
                    writeln!(out, "Generating...")?;
                    let result = self
                        .dashboard
                        .generate(agents.client.as_ref(), &agents.config)
                        .await;
                    match (result, &self.dashboard.snapshot) {
                        (Ok(()), Some(snapshot)) => write!(out, "{}", report::render_overview(snapshot))?,
                        _ => error_banner(self.dashboard.generation_error.as_deref(), out)?,
                    }
                }
                Err(reason) => agents_unavailable(&mut self.dashboard.generation_error, reason, out)?,
            },
            SessionCommand::Remind { id, all } => {
                if all {
                    let reminded = self.dashboard.remind_all();
                    writeln!(out, "Reminded {reminded} team member(s).")?;
                } else if let Some(id) = id {
                    match self.dashboard.remind(&id) {
                        Ok(count) => {
                            let name = roster::find(&self.dashboard.roster, &id)
                                .map_or(id.as_str(), |member| member.name.as_str());
                            writeln!(out, "Reminder sent to {name} ({count} total).")?;
                        }
                        Err(e) => writeln!(out, "Error: {e}")?,
                    }
                }
            }
            SessionCommand::Roster => {
                write!(out, "{}", report::render_roster(&self.dashboard.roster))?;
                if let Some(banner) = report::reminder_banner(self.dashboard.pending_reminders()) {
                    writeln!(out, "! {banner}")?;
                }
            }
            SessionCommand::Overview => match &self.dashboard.snapshot {
                Some(snapshot) => write!(out, "{}", report::render_overview(snapshot))?,
                None => writeln!(out, "Generate dashboard to see aggregate metrics.")?,
            },
            SessionCommand::Insights => match &self.dashboard.snapshot {
                Some(snapshot) => {
                    let mut text = String::new();
                    report::render_insights(&mut text, &snapshot.insights);
                    write!(out, "{text}")?;
                }
                None => writeln!(out, "Generate dashboard to view insights.")?,
            },
            SessionCommand::Date { date } => {
                self.dashboard.set_date(date);
                writeln!(out, "Selected date is now {date}.")?;
            }
            SessionCommand::Export { dir } => {
                let dir = dir.unwrap_or_else(|| PathBuf::from("."));
                let doc = self.dashboard.export_document(Utc::now());
                match export::write_file(&doc, &dir) {
                    Ok(path) => writeln!(out, "Report written to {}.", path.display())?,
                    Err(e) => writeln!(out, "Error: {e:#}")?,
                }
            }
            SessionCommand::Copy => {
                let doc = self.dashboard.export_document(Utc::now());
                let copied = match export::to_json(&doc) {
                    Ok(json) => export::copy_to_clipboard(&json).await,
                    Err(e) => Err(e),
                };
                match copied {
                    Ok(program) => writeln!(out, "Report copied to clipboard via {program}.")?,
                    Err(e) => writeln!(out, "Error: {e:#}")?,
                }
            }
            SessionCommand::Status => {
                writeln!(out, "Selected date: {}", self.dashboard.selected_date)?;
                writeln!(out, "Collection: {:?}", self.dashboard.collection_state)?;
                writeln!(out, "Generation: {:?}", self.dashboard.generation_state)?;
                if !self.dashboard.collection_status.is_empty() {
                    writeln!(out, "Collection status: {}", self.dashboard.collection_status)?;
                }
                error_banner(self.dashboard.collection_error.as_deref(), out)?;
                error_banner(self.dashboard.generation_error.as_deref(), out)?;
            }
            SessionCommand::Quit => return Ok(false),
        }

        Ok(true)
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        let mut stdout = std::io::stdout();
        writeln!(
            stdout,
            "Marketing Dashboard: weekly activity & MQL tracking ({} members, week of {}). Type 'help' for commands.",
            self.dashboard.roster.len(),
            self.dashboard.selected_date
        )?;

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            write!(stdout, "> ")?;
            stdout.flush()?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            if !self.handle(&line, &mut stdout).await? {
                break;
            }
        }

        tracing::info!(session_id = %self.dashboard.session_id, "session closed");
        Ok(())
    }
}

fn agents_unavailable<W: Write>(
    action_error: &mut Option<String>,
    reason: &str,
    out: &mut W,
) -> anyhow::Result<()> {
    let message = format!("Agents unavailable: {reason}");
    error_banner(Some(&message), out)?;
    *action_error = Some(message);
    Ok(())
}

fn error_banner<W: Write>(error: Option<&str>, out: &mut W) -> anyhow::Result<()> {
    if let Some(error) = error {
        writeln!(out, "Error: {error}")?;
    }
    Ok(())
}
