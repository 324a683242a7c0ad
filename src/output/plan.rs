//! Upgrade plan and run summary printing.

use chrono::{DateTime, Local};
use colored::Colorize;

use crate::steps::{Step, StepKind};

/// Print the plan outline under a header.
pub fn print_plan(plan: &Step) {
    println!("{}", "Upgrade Plan".bold());
    println!("{}", "=".repeat(60));
    print_step(plan, 0);
    println!();
}

fn print_step(step: &Step, depth: usize) {
    let indent = "    ".repeat(depth);
    let line = match step.kind() {
        StepKind::Plan if depth == 0 => step.description().bold().to_string(),
        StepKind::Plan => step.description().cyan().bold().to_string(),
        _ => step.description().to_string(),
    };
    if step.parallel() {
        println!("{}{} {}", indent, line, "[parallel]".dimmed());
    } else {
        println!("{}{}", indent, line);
    }
    for child in step.sub_steps() {
        print_step(child, depth + 1);
    }
}

pub fn print_data_plane_warning(warning: &str) {
    println!("{}", warning.yellow().bold());
    println!();
}

/// Print how long the upgrade took.
pub fn print_completion(started_at: DateTime<Local>) {
    let finished_at = Local::now();
    println!();
    println!(
        "{} (started: {}, finished: {}, took {})",
        "Upgrade completed.".green().bold(),
        started_at.format("%Y-%m-%d %H:%M:%S"),
        finished_at.format("%Y-%m-%d %H:%M:%S"),
        format_elapsed((finished_at - started_at).num_seconds())
    );
}

/// Format seconds as `1h 2m 3s`, omitting leading zero units.
fn format_elapsed(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let (hours, minutes, secs) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if hours > 0 {
        format!("{hours}h {minutes}m {secs}s")
    } else if minutes > 0 {
        format!("{minutes}m {secs}s")
    } else {
        format!("{secs}s")
    }
}
