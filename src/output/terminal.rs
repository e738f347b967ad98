use colored::Colorize;

use crate::result::{Action, EntityOutcome, RunReport, RunSummary};

pub fn print(report: &RunReport) {
    print!("{}", render(report));
}

pub fn render(report: &RunReport) -> String {
    let mut out = String::new();
    let heading = if report.dry_run {
        format!("── {} {} (dry run) ──", report.mode, report.source)
    } else {
        format!("── {} {} ──", report.mode, report.source)
    };
    out.push_str(&format!("\n{}\n", heading.bold()));

    for outcome in &report.entities {
        render_outcome(outcome, &mut out);
    }

    out.push('\n');
    if let Some(ref error) = report.error {
        out.push_str(&format!("{} {}\n", "Aborted:".red().bold(), error));
    }
    out.push_str(&format!("{}\n", summary_line(&report.summary(), report.error.is_some())));
    out
}

fn render_outcome(outcome: &EntityOutcome, out: &mut String) {
    let label = outcome.action.to_string();
    let status = match outcome.action {
        Action::Saved => label.green().bold(),
        Action::Deleted => label.yellow().bold(),
        Action::Skipped => label.dimmed(),
    };
    out.push_str(&format!("  {:<8} {}\n", status, outcome.entity_id));
    for connection in &outcome.connections {
        let role = format!("[{}]", connection.role).dimmed();
        match connection.name {
            Some(ref name) => out.push_str(&format!("       {} {} {}\n", "↳".dimmed(), role, name)),
            None => out.push_str(&format!("       {} {}\n", "↳".dimmed(), role)),
        }
    }
}

fn summary_line(summary: &RunSummary, aborted: bool) -> String {
    let line = format!(
        "Summary: {} entities | {} skipped | {} connections",
        summary.entities, summary.skipped, summary.connections,
    );
    if aborted {
        line.red().bold().to_string()
    } else {
        line.green().bold().to_string()
    }
}
