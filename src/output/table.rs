//! Table of the analysed applications.

use colored::Colorize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::analysis::Analysis;
use crate::apps::Application;

#[derive(Tabled)]
struct ApplicationRow {
    #[tabled(rename = "APPLICATION")]
    name: String,
    #[tabled(rename = "CHARM")]
    charm: String,
    #[tabled(rename = "CHANNEL")]
    channel: String,
    #[tabled(rename = "TIER")]
    tier: String,
    #[tabled(rename = "ROLE")]
    role: String,
    #[tabled(rename = "RELEASE")]
    release: String,
    #[tabled(rename = "UNITS")]
    units: String,
}

fn row(app: &Application, tier: &str) -> ApplicationRow {
    let release = match app.current_release() {
        Ok(Some(release)) => release.to_string(),
        Ok(None) => "-".to_string(),
        Err(_) => "mismatched".to_string(),
    };
    ApplicationRow {
        name: app.name.clone(),
        charm: app.charm.clone(),
        channel: if app.channel.is_empty() {
            "-".to_string()
        } else {
            app.channel.clone()
        },
        tier: tier.to_string(),
        role: if app.subordinate {
            "subordinate".to_string()
        } else {
            "principal".to_string()
        },
        release,
        units: app.units.len().to_string(),
    }
}

fn application_rows(analysis: &Analysis) -> Vec<ApplicationRow> {
    analysis
        .control_plane
        .iter()
        .map(|app| row(app, "control"))
        .chain(analysis.data_plane.iter().map(|app| row(app, "data")))
        .collect()
}

/// Print the applications found in the model.
pub fn print_applications(analysis: &Analysis) {
    let rows = application_rows(analysis);
    if rows.is_empty() {
        println!("No OpenStack applications found in model {}.", analysis.model_name);
        return;
    }

    println!(
        "{} (model: {}, {} control plane, {} data plane):",
        "Applications".bold(),
        analysis.model_name,
        analysis.control_plane.len(),
        analysis.data_plane.len()
    );

    let mut table = Table::new(&rows);
    table.with(Style::blank());
    println!("{}", table);
    println!();
}
