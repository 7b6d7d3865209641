use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::Context;
use chrono::NaiveDate;
use tokio::io::AsyncWriteExt;

use crate::models::ExportDocument;

/// Clipboard utilities tried in order; the first one that spawns wins.
const CLIPBOARD_COMMANDS: &[(&str, &[&str])] = &[
    ("pbcopy", &[]),
    ("wl-copy", &[]),
    ("xclip", &["-selection", "clipboard"]),
    ("xsel", &["--clipboard", "--input"]),
    ("clip.exe", &[]),
];

pub fn file_name(date: NaiveDate) -> String {
    format!("marketing-report-{}.json", date.format("%Y-%m-%d"))
}

pub fn to_json(doc: &ExportDocument) -> anyhow::Result<String> {
    serde_json::to_string_pretty(doc).context("failed to serialize export")
}

pub fn from_json(text: &str) -> anyhow::Result<ExportDocument> {
    serde_json::from_str(text).context("export document is not valid JSON")
}

pub fn write_file(doc: &ExportDocument, dir: &Path) -> anyhow::Result<PathBuf> {
    let path = dir.join(file_name(doc.selected_date));
    std::fs::write(&path, to_json(doc)?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), members = doc.team_data.len(), "export written");
    Ok(path)
}

/// Pipe `text` into the first available clipboard utility.
///
/// Returns the name of the utility that accepted the payload.
pub async fn copy_to_clipboard(text: &str) -> anyhow::Result<&'static str> {
    for &(program, args) in CLIPBOARD_COMMANDS {
        let spawned = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e).with_context(|| format!("failed to start {program}")),
        };

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .await
                .with_context(|| format!("failed to write to {program}"))?;
        }

        let status = child
            .wait()
            .await
            .with_context(|| format!("{program} did not finish"))?;
        if status.success() {
            tracing::debug!(program, bytes = text.len(), "copied to clipboard");
            return Ok(program);
        }
        tracing::warn!(program, %status, "clipboard utility failed, trying next");
    }

    anyhow::bail!("no clipboard utility found (tried pbcopy, wl-copy, xclip, xsel, clip.exe)")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::test_support::{config, MockAgent};
    use crate::dashboard::Dashboard;
    use crate::roster;
    use chrono::Utc;

    #[test]
    fn file_name_uses_selected_date() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(file_name(date), "marketing-report-2024-01-05.json");
    }

    #[tokio::test]
    async fn export_round_trips_roster_and_snapshot() {
        let mut dash = Dashboard::new(
            roster::seed_roster().unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        );
        dash.remind("3").unwrap();
        let agent = MockAgent::ok(
            r#"{"result": "Solid week", "confidence": 0.87,
                "metadata": {"processing_time": "0.8s", "records_processed": 5,
                "dashboard_status": "ready", "total_mqls": 75}}"#,
        );
        dash.generate(&agent, &config()).await.unwrap();

        let doc = dash.export_document(Utc::now());
        let parsed = from_json(&to_json(&doc).unwrap()).unwrap();

        assert_eq!(parsed, doc);
        assert_eq!(parsed.team_data, dash.roster);
        assert_eq!(parsed.insights, dash.snapshot);
    }

    #[test]
    fn export_json_uses_snake_case_fields() {
        let dash = Dashboard::new(
            roster::seed_roster().unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        );
        let json = to_json(&dash.export_document(Utc::now())).unwrap();
        assert!(json.contains("\"team_data\""));
        assert!(json.contains("\"status\": \"pending\""));
        assert!(json.contains("\"insights\": null"));
    }

    #[test]
    fn write_file_lands_in_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dash = Dashboard::new(
            roster::seed_roster().unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
        );

        let path = write_file(&dash.export_document(Utc::now()), dir.path()).unwrap();
        assert_eq!(path, dir.path().join("marketing-report-2024-02-01.json"));

        let parsed = from_json(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.team_data.len(), 5);
    }

    #[test]
    fn from_json_rejects_garbage() {
        assert!(from_json("not json").is_err());
    }
}
