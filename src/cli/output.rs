//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying plan
//! summaries, apply reports, and endpoint listings in text or JSON.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::endpoints::LbEndpoint;
use crate::pipeline::{ApplyReport, TeardownReport};
use crate::plan::PlanSummary;
use crate::store::WriteOutcome;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Artifact outcome row for table display.
#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "Artifact")]
    artifact: String,
    #[tabled(rename = "Outcome")]
    outcome: String,
}

/// Endpoint row for table display.
#[derive(Tabled)]
struct EndpointRow {
    #[tabled(rename = "LB")]
    lb: String,
    #[tabled(rename = "Output")]
    output: String,
    #[tabled(rename = "Address")]
    address: String,
}

/// JSON shape of a plan summary.
#[derive(Serialize)]
struct PlanJson {
    env_id: String,
    artifacts: Vec<PlanArtifactJson>,
    vars_seeded: bool,
}

#[derive(Serialize)]
struct PlanArtifactJson {
    name: String,
    outcome: String,
}

/// JSON shape of an endpoint listing.
#[derive(Serialize)]
struct EndpointJson {
    lb_type: String,
    output_key: String,
    address: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a plan summary.
    #[must_use]
    pub fn format_plan(&self, summary: &PlanSummary) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&PlanJson::from(summary)).unwrap_or_default()
            }
            OutputFormat::Text => Self::format_plan_text(summary),
        }
    }

    fn format_plan_text(summary: &PlanSummary) -> String {
        let mut output = String::new();

        let _ = writeln!(output, "\nPlan for environment '{}'\n", summary.env_id);

        let rows: Vec<PlanRow> = summary
            .entries
            .iter()
            .map(|entry| PlanRow {
                artifact: entry.name.clone(),
                outcome: Self::colorize_outcome(entry.outcome),
            })
            .collect();

        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        let preserved = summary.preserved_count();
        if preserved > 0 {
            let _ = writeln!(
                output,
                "\n{} {preserved} operator-modified artifact(s) left untouched",
                "!".yellow()
            );
        }
        if summary.vars_seeded {
            let _ = writeln!(output, "{} vars store seeded", "+".green());
        }

        output
    }

    /// Formats the endpoint listing.
    #[must_use]
    pub fn format_endpoints(&self, endpoints: &[LbEndpoint]) -> String {
        match self.format {
            OutputFormat::Json => {
                let rows: Vec<EndpointJson> = endpoints.iter().map(EndpointJson::from).collect();
                serde_json::to_string_pretty(&rows).unwrap_or_default()
            }
            OutputFormat::Text => {
                if endpoints.is_empty() {
                    return String::from("No load balancers declared.\n");
                }

                let rows: Vec<EndpointRow> = endpoints
                    .iter()
                    .map(|e| EndpointRow {
                        lb: e.lb_type.to_string(),
                        output: e.output_key.clone(),
                        address: e.address.clone(),
                    })
                    .collect();
                format!("{}\n", Table::new(rows))
            }
        }
    }

    /// Formats an apply report.
    #[must_use]
    pub fn format_apply(&self, report: &ApplyReport) -> String {
        let mut output = String::new();

        let _ = writeln!(output, "\n{} Environment is up", "✓".green());
        if let Some(jumpbox) = &report.jumpbox {
            let _ = writeln!(output, "  Jumpbox:  {}", jumpbox.address);
        }
        if let Some(director) = &report.director {
            let _ = writeln!(output, "  Director: {}", director.address);
        }

        if let Some(error) = &report.upload_error {
            let _ = writeln!(
                output,
                "\n{} Cloud config upload was rejected; re-run 'plinth up' once the director is reachable:\n  {error}",
                "!".yellow()
            );
        } else if report.cloud_config_uploaded {
            let _ = writeln!(output, "  Cloud config uploaded");
        }

        if !report.endpoints.is_empty() {
            output.push('\n');
            output.push_str(&self.format_endpoints(&report.endpoints));
        }

        output
    }

    /// Formats a teardown report.
    #[must_use]
    pub fn format_teardown(&self, report: &TeardownReport) -> String {
        format!(
            "\n{} Environment '{}' destroyed\n",
            "✓".green(),
            report.env_id
        )
    }

    fn colorize_outcome(outcome: WriteOutcome) -> String {
        match outcome {
            WriteOutcome::Created => outcome.to_string().green().to_string(),
            WriteOutcome::Regenerated => outcome.to_string().cyan().to_string(),
            WriteOutcome::Preserved => outcome.to_string().yellow().to_string(),
            WriteOutcome::Unchanged => outcome.to_string(),
        }
    }
}

impl From<&PlanSummary> for PlanJson {
    fn from(summary: &PlanSummary) -> Self {
        Self {
            env_id: summary.env_id.clone(),
            artifacts: summary
                .entries
                .iter()
                .map(|entry| PlanArtifactJson {
                    name: entry.name.clone(),
                    outcome: entry.outcome.to_string(),
                })
                .collect(),
            vars_seeded: summary.vars_seeded,
        }
    }
}

impl From<&LbEndpoint> for EndpointJson {
    fn from(endpoint: &LbEndpoint) -> Self {
        Self {
            lb_type: endpoint.lb_type.to_string(),
            output_key: endpoint.output_key.clone(),
            address: endpoint.address.clone(),
        }
    }
}
