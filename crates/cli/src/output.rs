//! Output formatting utilities

use adapter_lib::quantity::milli_value;
use clap::ValueEnum;
use colored::Colorize;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print rows as a table, or the raw response as JSON
pub fn print_rows<T: Tabled, R: Serialize>(rows: &[T], raw: &R, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Table => {
            if rows.is_empty() {
                print_warning("No items found");
                return Ok(());
            }
            let table = Table::new(rows).with(Style::rounded()).to_string();
            println!("{}", table);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(raw)?);
        }
    }
    Ok(())
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print a section header
pub fn print_header(title: &str) {
    println!("{}", title.bold());
}

/// Render a quantity as a plain decimal number, e.g. `500m` as `0.5`
pub fn format_quantity(quantity: &Quantity) -> String {
    match milli_value(quantity) {
        Some(milli) if milli % 1000 == 0 => format!("{}", milli / 1000),
        Some(milli) => {
            let formatted = format!("{:.3}", milli as f64 / 1000.0);
            formatted.trim_end_matches('0').to_string()
        }
        None => quantity.0.clone(),
    }
}
