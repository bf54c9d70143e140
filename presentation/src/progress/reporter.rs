//! Progress reporting for batch runs

use coach_application::ProgressNotifier;
use coach_domain::{AgentId, DocumentId, DocumentReport, DocumentStatus, PriorityTier};
use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::Mutex;

/// Reports progress with one bar for the run and one per active document
pub struct ProgressReporter {
    multi: MultiProgress,
    run_bar: Mutex<Option<ProgressBar>>,
    document_bars: Mutex<HashMap<DocumentId, ProgressBar>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            run_bar: Mutex::new(None),
            document_bars: Mutex::new(HashMap::new()),
        }
    }

    fn run_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{spinner:.green} {prefix:.bold.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-")
    }

    fn document_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("  {prefix:.bold} [{bar:30.yellow/white}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-")
    }

    fn accuracy_label(agent: &AgentId, accuracy: Option<f64>) -> String {
        match accuracy {
            Some(a) => format!("{} {} {:.1}%", "v".green(), agent, a * 100.0),
            None => format!("{} {}", "x".red(), agent),
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressNotifier for ProgressReporter {
    fn on_run_start(&self, documents: usize) {
        let pb = self.multi.add(ProgressBar::new(documents as u64));
        pb.set_style(Self::run_style());
        pb.set_prefix("Documents");
        pb.set_message("Starting...");
        if let Ok(mut slot) = self.run_bar.lock() {
            *slot = Some(pb);
        }
    }

    fn on_document_start(&self, document: &DocumentId, agents: usize) {
        let pb = self.multi.add(ProgressBar::new(agents as u64));
        pb.set_style(Self::document_style());
        pb.set_prefix(document.to_string());
        if let Ok(mut bars) = self.document_bars.lock() {
            bars.insert(document.clone(), pb);
        }
    }

    fn on_batch_start(&self, document: &DocumentId, tier: PriorityTier, size: usize) {
        if let Ok(bars) = self.document_bars.lock()
            && let Some(pb) = bars.get(document)
        {
            pb.set_message(format!("{} tier, {} agents", tier.as_str(), size));
        }
    }

    fn on_agent_complete(&self, document: &DocumentId, agent: &AgentId, accuracy: Option<f64>) {
        if let Ok(bars) = self.document_bars.lock()
            && let Some(pb) = bars.get(document)
        {
            pb.set_message(Self::accuracy_label(agent, accuracy));
            pb.inc(1);
        }
    }

    fn on_document_complete(&self, report: &DocumentReport) {
        if let Ok(mut bars) = self.document_bars.lock()
            && let Some(pb) = bars.remove(&report.document_id)
        {
            pb.finish_and_clear();
            self.multi.remove(&pb);
        }
        if let Ok(slot) = self.run_bar.lock()
            && let Some(pb) = slot.as_ref()
        {
            let status = match report.status {
                DocumentStatus::Completed => format!("{} {}", "v".green(), report.document_id),
                DocumentStatus::Failed { .. } => format!("{} {}", "x".red(), report.document_id),
                DocumentStatus::Cancelled => format!("{} {}", "-".yellow(), report.document_id),
                DocumentStatus::Skipped => format!("{} {}", "=".dimmed(), report.document_id),
            };
            pb.set_message(status);
            pb.inc(1);
        }
    }

    fn on_run_complete(&self) {
        if let Ok(mut slot) = self.run_bar.lock()
            && let Some(pb) = slot.take()
        {
            pb.finish_with_message(format!("{}", "Run complete!".green()));
        }
    }
}

/// Simple text-based progress (no fancy UI)
pub struct SimpleProgress;

impl ProgressNotifier for SimpleProgress {
    fn on_run_start(&self, documents: usize) {
        println!("{} {} documents", "->".cyan(), documents.to_string().bold());
    }

    fn on_document_start(&self, document: &DocumentId, agents: usize) {
        println!("{} {} ({} agents)", "->".cyan(), document.as_str().bold(), agents);
    }

    fn on_agent_complete(&self, document: &DocumentId, agent: &AgentId, accuracy: Option<f64>) {
        println!("  {} {}", document, ProgressReporter::accuracy_label(agent, accuracy));
    }

    fn on_document_complete(&self, report: &DocumentReport) {
        match &report.status {
            DocumentStatus::Completed => println!("  {} {} done", "v".green(), report.document_id),
            DocumentStatus::Failed { reason } => {
                println!("  {} {} failed: {}", "x".red(), report.document_id, reason)
            }
            DocumentStatus::Cancelled => println!("  {} {} cancelled", "-".yellow(), report.document_id),
            DocumentStatus::Skipped => println!("  {} {} already processed", "=".dimmed(), report.document_id),
        }
    }
}
