//! Routes command - list the configured routes

use anyhow::{Context, Result};
use switchyard_config::Config;

/// Print one line per route: id, source, startup mode, step count
pub fn run(config: &Config) -> Result<()> {
    let routes = config.route_definitions().context("invalid route")?;
    if routes.is_empty() {
        println!("no routes configured");
        return Ok(());
    }

    let rows: Vec<[String; 4]> = routes
        .iter()
        .map(|route| {
            [
                route.id.clone(),
                route.from.clone(),
                if route.auto_startup { "auto" } else { "manual" }.to_string(),
                route.node_count().to_string(),
            ]
        })
        .collect();
    print!("{}", format_table(&["ID", "FROM", "STARTUP", "NODES"], &rows));
    Ok(())
}

fn format_table(header: &[&str; 4], rows: &[[String; 4]]) -> String {
    let mut widths = header.map(str::len);
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = String::new();
    let mut line = |cells: [&str; 4]| {
        let padded: Vec<String> = cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        out.push_str(padded.join("  ").trim_end());
        out.push('\n');
    };
    line(*header);
    for row in rows {
        line(row.each_ref().map(String::as_str));
    }
    out
}
