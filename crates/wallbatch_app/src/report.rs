//! Plain-text rendering of progress and outcomes for the terminal.

use std::fmt::Write;

use wallbatch_core::{
    BatchSummary, DetailRecord, ItemResult, JobOutcome, Operation, ProgressSnapshot, Target,
};

pub fn render_progress(snapshot: &ProgressSnapshot) -> String {
    match &snapshot.current_target {
        Some(target) => format!(
            "processed {}/{}: {}",
            snapshot.processed, snapshot.total, target
        ),
        None => format!("processed {}/{}", snapshot.processed, snapshot.total),
    }
}

pub fn render_outcome(operation: Operation, outcome: &JobOutcome) -> String {
    match outcome {
        JobOutcome::Completed(summary) => render_summary(summary),
        JobOutcome::Failed(failure) => {
            format!("{} batch failed: {}\n", operation.label(), failure)
        }
        JobOutcome::TimedOut { job_id, attempts } => format!(
            "{} batch {} still running after {} status checks, stopped waiting\n",
            operation.label(),
            job_id,
            attempts
        ),
    }
}

pub fn render_summary(summary: &BatchSummary) -> String {
    let mut out = String::new();
    let noun = action_noun(summary.operation());
    let _ = writeln!(
        out,
        "{} batch: {} items, {} succeeded, {} failed",
        summary.operation().label(),
        summary.total_items(),
        summary.succeeded(),
        summary.failed()
    );
    let actions = summary.actions();
    if actions.attempted > 0 || actions.succeeded > 0 || actions.failed > 0 {
        let _ = writeln!(
            out,
            "{}: {} attempted, {} succeeded, {} failed",
            noun, actions.attempted, actions.succeeded, actions.failed
        );
    }
    if let Some(senders) = actions.senders {
        let _ = writeln!(out, "senders: {senders}");
    }
    if let Some(message) = summary.message() {
        let _ = writeln!(out, "message: {message}");
    }
    if let Some(error) = summary.error() {
        let _ = writeln!(out, "error: {error}");
    }
    for item in summary.items() {
        render_item(&mut out, noun, item);
    }
    out
}

/// Output of `wallbatch check`.
pub fn render_check(targets: &[Target]) -> String {
    let mut out = format!("{} valid links found\n", targets.len());
    for target in targets {
        let _ = writeln!(out, "  {target}");
    }
    out
}

fn render_item(out: &mut String, noun: &str, item: &ItemResult) {
    let _ = write!(out, "  {} {}", status_tag(item.success), item.target);
    if item.actions.attempted > 0 {
        let _ = write!(
            out,
            " ({}/{} {})",
            item.actions.succeeded, item.actions.attempted, noun
        );
    }
    append_note(out, item.message.as_deref(), item.error.as_deref());
    out.push('\n');
    for detail in &item.details {
        render_detail(out, detail);
    }
}

fn render_detail(out: &mut String, detail: &DetailRecord) {
    let _ = write!(out, "      {} {}", status_tag(detail.success), detail.label);
    if let Some(counterpart) = &detail.counterpart {
        let _ = write!(out, " -> {counterpart}");
    }
    append_note(out, detail.message.as_deref(), detail.error.as_deref());
    out.push('\n');
}

fn append_note(out: &mut String, message: Option<&str>, error: Option<&str>) {
    if let Some(note) = error.or(message) {
        let _ = write!(out, ": {note}");
    }
}

fn status_tag(success: bool) -> &'static str {
    if success {
        "[ok]"
    } else {
        "[failed]"
    }
}

fn action_noun(operation: Operation) -> &'static str {
    match operation {
        Operation::Share => "messages",
        Operation::Like | Operation::Subscribe => "accounts",
    }
}
