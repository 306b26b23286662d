//! CLI output: result tables, config rendering, and error mapping.

use crate::config::QuerybindConfig;
use crate::error::BindError;
use crate::result::{QueryResult, QueryStatus};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;

/// Map domain errors to a string for CLI output.
pub fn map_error(e: &BindError) -> String {
    format!("{} {}", "error:".red().bold(), e)
}

pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

fn status_cell(status: QueryStatus) -> String {
    match status {
        QueryStatus::Success => status.as_str().green().to_string(),
        QueryStatus::Error => status.as_str().red().to_string(),
        QueryStatus::Pending => status.as_str().yellow().to_string(),
    }
}

/// Render every result a binding wrote, then the final payload.
pub fn format_results(results: &[QueryResult], format: &str) -> Result<String, BindError> {
    if format == "json" {
        return serde_json::to_string_pretty(results)
            .map_err(|e| BindError::Expression(format!("Failed to render results: {}", e)));
    }

    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Results")));
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["#", "Status", "Fetching", "Key", "Updated"]);
    for (index, result) in results.iter().enumerate() {
        let updated = result
            .data_updated_at
            .or(result.error_updated_at)
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            (index + 1).to_string(),
            status_cell(result.status),
            if result.is_fetching { "yes" } else { "no" }.to_string(),
            result.key.to_string(),
            updated,
        ]);
    }
    out.push_str(&format!("{}\n", table));

    if let Some(last) = results.last() {
        if let Some(error) = &last.error {
            out.push_str(&format!("\n{}\n{}\n", format_section_heading("Error"), error));
        }
        if let Some(data) = &last.data {
            let rendered = match data {
                serde_json::Value::String(text) => text.clone(),
                other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
            };
            out.push_str(&format!("\n{}\n{}\n", format_section_heading("Data"), rendered));
        }
    }
    Ok(out)
}

pub fn format_config(config: &QuerybindConfig, format: &str) -> Result<String, BindError> {
    match format {
        "json" => serde_json::to_string_pretty(config)
            .map_err(|e| BindError::ConfigError(format!("Failed to render config: {}", e))),
        "toml" => toml::to_string_pretty(config)
            .map_err(|e| BindError::ConfigError(format!("Failed to render config: {}", e))),
        other => Err(BindError::ConfigError(format!(
            "Unknown output format '{}' (expected toml or json)",
            other
        ))),
    }
}
