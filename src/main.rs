use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod agent;
mod dashboard;
mod export;
mod metrics;
mod models;
mod report;
mod roster;
mod session;

use agent::Agents;
use dashboard::Dashboard;
use roster::CollectionPeriod;

#[derive(Parser)]
#[command(name = "mql-dashboard")]
#[command(about = "Weekly marketing activity and MQL tracking dashboard", long_about = None)]
struct Cli {
    /// Load the team roster from a CSV file instead of the built-in seed
    #[arg(long, global = true)]
    roster: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print team activity cards
    Roster,
    /// Request weekly updates from the team through the collection agent
    Collect {
        /// YYYY-MM-DD (week of) or YYYY-MM-DD..YYYY-MM-DD
        #[arg(long)]
        period: Option<CollectionPeriod>,
    },
    /// Generate aggregate metrics and insights
    Generate {
        /// Run a collection first
        #[arg(long)]
        collect: bool,
        #[arg(long)]
        period: Option<CollectionPeriod>,
        /// Directory to write marketing-report-<date>.json into
        #[arg(long)]
        export: Option<PathBuf>,
        /// Copy the JSON report to the clipboard
        #[arg(long)]
        copy: bool,
        /// Also write a markdown report
        #[arg(long)]
        markdown: Option<PathBuf>,
    },
    /// Render a previously exported JSON report
    View { file: PathBuf },
    /// Interactive dashboard session
    Session {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

fn load_roster(path: Option<&PathBuf>) -> anyhow::Result<Vec<models::TeamMember>> {
    match path {
        Some(path) => roster::load_csv(path),
        None => roster::seed_roster(),
    }
}

fn connect_agents(dashboard: &Dashboard) -> anyhow::Result<Agents> {
    Agents::from_env(&dashboard.session_id.to_string()).context("agent configuration is incomplete")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let today = Utc::now().date_naive();
    let team = load_roster(cli.roster.as_ref())?;

    match cli.command {
        Commands::Roster => {
            print!("{}", report::render_roster(&team));
            if let Some(banner) = report::reminder_banner(metrics::non_responders(&team).len()) {
                println!("! {banner}");
            }
        }
        Commands::Collect { period } => {
            let period = period.unwrap_or(CollectionPeriod::WeekOf(today));
            let mut dashboard = Dashboard::new(team, period.anchor());
            let agents = connect_agents(&dashboard)?;

            println!("Collecting...");
            let outcome = dashboard
                .collect(agents.client.as_ref(), &agents.config, period)
                .await;
            println!("{}", dashboard.collection_status);
            outcome.context("collection failed")?;
            print!("{}", report::render_roster(&dashboard.roster));
        }
        Commands::Generate {
            collect,
            period,
            export: export_dir,
            copy,
            markdown,
        } => {
            let period = period.unwrap_or(CollectionPeriod::WeekOf(today));
            let mut dashboard = Dashboard::new(team, period.anchor());
            let agents = connect_agents(&dashboard)?;

            if collect {
                println!("Collecting...");
                let outcome = dashboard
                    .collect(agents.client.as_ref(), &agents.config, period)
                    .await;
                println!("{}", dashboard.collection_status);
                outcome.context("collection failed")?;
            }

            println!("Generating...");
            dashboard
                .generate(agents.client.as_ref(), &agents.config)
                .await
                .context("dashboard generation failed")?;
            let snapshot = dashboard
                .snapshot
                .as_ref()
                .context("insight agent returned no snapshot")?;
            print!("{}", report::render_overview(snapshot));

            if let Some(out) = markdown {
                let label = period.to_string();
                std::fs::write(&out, report::build_markdown(snapshot, &label))
                    .with_context(|| format!("failed to write {}", out.display()))?;
                println!("Markdown report written to {}.", out.display());
            }

            let doc = dashboard.export_document(Utc::now());
            if let Some(dir) = export_dir {
                let path = export::write_file(&doc, &dir)?;
                println!("Report written to {}.", path.display());
            }
            if copy {
                let program = export::copy_to_clipboard(&export::to_json(&doc)?).await?;
                println!("Report copied to clipboard via {program}.");
            }
        }
        Commands::View { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let doc = export::from_json(&text)?;
            println!("Report for {} (exported {})", doc.selected_date, doc.exported_at);
            print!("{}", report::render_roster(&doc.team_data));
            match &doc.insights {
                Some(snapshot) => print!("{}", report::render_overview(snapshot)),
                None => println!("No dashboard was generated before this export."),
            }
        }
        Commands::Session { date } => {
            let dashboard = Dashboard::new(team, date.unwrap_or(today));
            let agents = Agents::from_env(&dashboard.session_id.to_string()).map_err(|e| {
                tracing::warn!(error = %e, "agents not configured; collect and generate disabled");
                e.to_string()
            });

            session::Session::new(dashboard, agents).run().await?;
        }
    }

    Ok(())
}
