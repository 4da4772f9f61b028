//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

impl OutputFormat {
    /// Parse the `default_format` value from the user config
    pub fn from_config(value: Option<&str>) -> Option<Self> {
        value.and_then(|v| <Self as ValueEnum>::from_str(v, true).ok())
    }
}

/// A labelled value in a two-column table
#[derive(Tabled)]
pub struct FieldRow {
    #[tabled(rename = "Field")]
    pub field: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

impl FieldRow {
    pub fn new(field: impl Into<String>, value: impl ToString) -> Self {
        Self {
            field: field.into(),
            value: value.to_string(),
        }
    }
}

/// Print rows as a rounded table
pub fn print_rows<T: Tabled>(rows: Vec<T>) {
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a probability as a percentage
pub fn format_probability(probability: f64) -> String {
    format!("{:.2}%", probability * 100.0)
}

/// Color the late/on-time verdict
pub fn color_decision(is_likely_late: bool) -> String {
    if is_likely_late {
        "LIKELY LATE".red().bold().to_string()
    } else {
        "ON TIME".green().bold().to_string()
    }
}

/// Color status based on value
pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "healthy" | "ready" => status.green().to_string(),
        "degraded" => status.yellow().to_string(),
        "unhealthy" | "not ready" => status.red().to_string(),
        _ => status.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_probability() {
        assert_eq!(format_probability(0.6123), "61.23%");
        assert_eq!(format_probability(1.0), "100.00%");
    }

    #[test]
    fn test_format_from_config() {
        assert_eq!(OutputFormat::from_config(Some("json")), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_config(Some("TABLE")), Some(OutputFormat::Table));
        assert_eq!(OutputFormat::from_config(Some("yaml")), None);
        assert_eq!(OutputFormat::from_config(None), None);
    }
}
