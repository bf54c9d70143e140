//! Console output formatter for run reports and the learning status

use coach_domain::{
    AgentOutcome, DocumentReport, DocumentStatus, LearningStatus, RunReport, RunSummary, Trend,
};
use colored::Colorize;

/// Formats run reports for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Format every document, agent, decision and warning
    pub fn format(report: &RunReport) -> String {
        let mut output = String::new();

        output.push_str(&Self::header("Extraction Coaching Report"));
        output.push('\n');

        for document in &report.documents {
            output.push_str(&Self::format_document(document));
        }

        output.push_str(&Self::format_summary(report));
        output.push_str(&Self::footer());
        output
    }

    /// Format as JSON
    pub fn format_json(report: &RunReport) -> String {
        serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
    }

    /// Format the aggregate counts only (concise output)
    pub fn format_summary(report: &RunReport) -> String {
        let summary = report.summary();
        let mut output = Self::section_header("Summary");

        output.push_str(&format!(
            "{} {} ({} completed, {} failed, {} cancelled)\n",
            "Documents:".cyan().bold(),
            summary.documents,
            summary.completed.to_string().green(),
            Self::count_red(summary.failed),
            summary.cancelled,
        ));
        if summary.skipped > 0 {
            output.push_str(&format!(
                "{} {}\n",
                "Skipped (already processed):".cyan().bold(),
                summary.skipped
            ));
        }
        output.push_str(&format!(
            "{} {} ({} accepted, {} failed)\n",
            "Agent runs:".cyan().bold(),
            summary.agent_runs,
            summary.accepted,
            Self::count_red(summary.agent_failures),
        ));
        output.push_str(&format!(
            "{} {}\n",
            "Mean accuracy:".cyan().bold(),
            summary.mean_accuracy.map_or("n/a".to_string(), percent)
        ));
        output.push_str(&Self::format_learning(&summary));
        output.push_str(&format!(
            "{} {:.1}s\n",
            "Elapsed:".cyan().bold(),
            (report.finished_at - report.started_at).num_milliseconds() as f64 / 1000.0
        ));
        output
    }

    fn format_learning(summary: &RunSummary) -> String {
        let warnings = if summary.warnings == 0 {
            "0".green().to_string()
        } else {
            summary.warnings.to_string().yellow().to_string()
        };
        format!(
            "{} {}  {} {}\n",
            "Validation warnings:".cyan().bold(),
            warnings,
            "Golden promotions:".cyan().bold(),
            summary.golden_promotions
        )
    }

    fn format_document(document: &DocumentReport) -> String {
        let mut output = String::new();

        let status = match &document.status {
            DocumentStatus::Completed => "completed".green().to_string(),
            DocumentStatus::Failed { reason } => format!("{} ({})", "failed".red(), reason),
            DocumentStatus::Cancelled => "cancelled".yellow().to_string(),
            DocumentStatus::Skipped => "skipped (already processed)".dimmed().to_string(),
        };
        let phase = document
            .phase
            .map(|p| format!(", {} phase", p))
            .unwrap_or_default();
        output.push_str(&format!(
            "\n{} {}{}\n",
            format!("── {} [{}] ──", document.document_id, document.document_class)
                .yellow()
                .bold(),
            status,
            phase
        ));

        for agent in &document.agents {
            output.push_str(&Self::format_agent(agent));
        }

        for warning in document.warnings() {
            output.push_str(&format!(
                "  {} {}: {}\n",
                "!".yellow().bold(),
                warning.rule,
                warning.message
            ));
        }

        if !document.unmatched_sections.is_empty() {
            output.push_str(&format!(
                "  {} {}\n",
                "Unmatched sections:".dimmed(),
                document.unmatched_sections.join(", ")
            ));
        }

        if document.golden_promotions > 0 {
            output.push_str(&format!(
                "  {} {}\n",
                "Golden promotions:".dimmed(),
                document.golden_promotions
            ));
        }

        output
    }

    fn format_agent(agent: &AgentOutcome) -> String {
        if let Some(reason) = &agent.failure {
            return format!(
                "  {} {:<28} {}\n",
                "x".red(),
                agent.agent_id.as_str(),
                reason.red()
            );
        }

        let mark = if agent.accepted {
            "v".green()
        } else {
            "~".yellow()
        };
        let decisions: Vec<String> = agent
            .decisions
            .iter()
            .map(|d| format!("{}({})", d.strategy, d.source))
            .collect();
        let trail = if decisions.is_empty() {
            String::new()
        } else {
            format!("  {}", decisions.join(" -> ").dimmed())
        };

        format!(
            "  {} {:<28} {:>6}  {} round{}  v{}{}\n",
            mark,
            agent.agent_id.as_str(),
            percent(agent.accuracy()),
            agent.rounds,
            if agent.rounds == 1 { "" } else { "s" },
            agent.instruction_version,
            trail
        )
    }

    /// Format the learning status read from the ledger
    pub fn format_status(status: &LearningStatus) -> String {
        let mut output = Self::header("Learning Status");
        output.push('\n');

        if status.is_empty() {
            output.push_str("\nNo attempts recorded yet.\n");
            output.push_str(&Self::footer());
            return output;
        }

        output.push_str(&Self::section_header("Learning Phase"));
        for class in &status.classes {
            let next = class
                .next_phase_at
                .map(|n| format!(" (next phase at {} documents)", n))
                .unwrap_or_default();
            output.push_str(&format!(
                "{} {} documents, {} phase{}\n",
                format!("{}:", class.document_class).cyan().bold(),
                class.documents,
                class.phase.to_string().bold(),
                next.dimmed()
            ));
        }

        output.push_str(&Self::section_header("Agents"));
        output.push_str(&format!(
            "  {:<28} {:>5} {:>8} {:>8} {:>8}  {:<12} {}\n",
            "Agent", "Docs", "Attempts", "Mean", "Best", "Trend", "Stable"
        ));
        for agent in &status.agents {
            let converged = if agent.converged {
                " converged".green().to_string()
            } else {
                String::new()
            };
            output.push_str(&format!(
                "  {:<28} {:>5} {:>8} {:>8} {:>8}  {:<12} v{} x{}{}\n",
                agent.agent_id.as_str(),
                agent.documents,
                agent.attempts,
                percent(agent.window_mean),
                percent(agent.best_accuracy),
                trend_label(agent.trend),
                agent.instruction_version,
                agent.stable_for,
                converged
            ));
        }

        if !status.recent_sessions.is_empty() {
            output.push_str(&Self::section_header("Recent Sessions"));
            for session in &status.recent_sessions {
                output.push_str(&format!(
                    "  {} {:<20} {:<28} {:>6} -> {:>6} ({:+.1}) {} round{}\n",
                    session.finished_at.format("%H:%M:%S").to_string().dimmed(),
                    session.document_id.as_str(),
                    session.agent_id.as_str(),
                    percent(session.initial_accuracy),
                    percent(session.final_accuracy),
                    session.improvement() * 100.0,
                    session.rounds,
                    if session.rounds == 1 { "" } else { "s" }
                ));
            }
        }

        output.push_str(&Self::section_header("Golden Examples"));
        output.push_str(&format!(
            "{} {} across {} agents, mean score {}\n",
            "Active:".cyan().bold(),
            status.golden.active,
            status.golden.agents,
            status.golden.mean_score.map_or("n/a".to_string(), percent)
        ));
        output.push_str(&format!(
            "{} {}/{} agents\n",
            "Converged:".cyan().bold(),
            status.converged_agents(),
            status.agents.len()
        ));

        output.push_str(&Self::footer());
        output
    }

    /// Format the learning status as JSON
    pub fn format_status_json(status: &LearningStatus) -> String {
        serde_json::to_string_pretty(status).unwrap_or_else(|_| "{}".to_string())
    }

    fn count_red(count: usize) -> String {
        if count == 0 {
            count.to_string()
        } else {
            count.to_string().red().to_string()
        }
    }

    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }

    fn footer() -> String {
        format!("\n{}\n", "=".repeat(60).cyan())
    }
}

fn percent(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

fn trend_label(trend: Trend) -> String {
    match trend {
        Trend::Improving => "improving".green().to_string(),
        Trend::Declining => "declining".red().to_string(),
        Trend::Flat => "flat".to_string(),
        Trend::Insufficient => "-".dimmed().to_string(),
    }
}
