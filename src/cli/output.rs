//! Output formatting helpers for CLI commands

use crate::sim::{RunSummary, VehicleOutcome};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};

/// Format the protocol counters as a two-column table
pub fn format_stats_table(summary: &RunSummary) -> String {
    let stats = &summary.stats;
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Counter", "Value"]);

    let rows: [(&str, u64); 14] = [
        ("Stop candidates", stats.stop_candidates),
        ("Hazards reported", stats.hazards_reported),
        ("Reports discarded", stats.reports_discarded),
        ("Hazards abandoned", stats.hazards_abandoned),
        ("Commands forwarded", stats.commands_forwarded),
        ("Forwards skipped", stats.forwards_skipped),
        ("Maneuvers started", stats.maneuvers_started),
        ("Maneuvers rejected", stats.maneuvers_rejected),
        ("Maneuvers completed", stats.maneuvers_completed),
        ("Maneuvers abandoned", stats.maneuvers_abandoned),
        ("Payloads discarded", stats.payloads_discarded),
        ("Backend failures", stats.backend_failures),
        ("Send failures", stats.send_failures),
        ("Accidents", stats.accidents_triggered),
    ];
    for (name, value) in rows {
        table.add_row(vec![Cell::new(name), Cell::new(value)]);
    }

    if let (Some(mean), Some(max)) = (stats.mean_command_delay_ms, stats.max_command_delay_ms) {
        table.add_row(vec![
            Cell::new("Command delay"),
            Cell::new(format!("{:.3}ms mean / {:.3}ms max", mean, max)),
        ]);
    }

    table.to_string()
}

/// Format per-vehicle final state as a table
pub fn format_vehicles_table(vehicles: &[VehicleOutcome]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Vehicle", "State", "Lane", "Position"]);

    for v in vehicles {
        let state = match v.state.as_str() {
            "normal" => v.state.green().to_string(),
            "maneuvering" => v.state.yellow().to_string(),
            "stopped" => v.state.red().to_string(),
            _ => v.state.clone(),
        };
        let lane = v
            .lane
            .as_ref()
            .map(|l| l.to_string())
            .unwrap_or_else(|| "departed".to_string());
        let position = v
            .lane_position
            .map(|p| format!("{:.1}m", p))
            .unwrap_or_else(|| "-".to_string());

        table.add_row(vec![
            Cell::new(&v.agent),
            Cell::new(state),
            Cell::new(lane),
            Cell::new(position),
        ]);
    }

    table.to_string()
}

/// Human-readable run summary
pub fn format_summary(summary: &RunSummary) -> String {
    let status = if summary.interrupted {
        "interrupted".yellow().to_string()
    } else {
        "completed".green().to_string()
    };
    format!(
        "Run {} {} after {:.1}s over {} transport\n{}\n{}",
        summary.run_id,
        status,
        summary.elapsed_seconds,
        summary.transport,
        format_stats_table(summary),
        format_vehicles_table(&summary.vehicles)
    )
}

/// Run summary as pretty JSON
pub fn format_summary_json(summary: &RunSummary) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(summary)
}
