//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use rul_lib::MaintenanceAdvice;
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

/// Print a rounded table, or a warning when there is nothing to show
pub fn print_table<T: Tabled>(items: Vec<T>, empty_message: &str) {
    if items.is_empty() {
        print_warning(empty_message);
        return;
    }
    println!("{}", Table::new(items).with(Style::rounded()));
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a section heading
pub fn print_heading(title: &str) {
    println!("{}", title.bold());
    println!("{}", "=".repeat(60));
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a RUL value in cycles, rounded to two decimals
pub fn format_rul(cycles: f64) -> String {
    format!("{:.2}", cycles)
}

/// Format an optional score, `-` when undefined
pub fn format_score(score: Option<f64>) -> String {
    score.map_or_else(|| "-".to_string(), |s| format!("{:.4}", s))
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2}Mi", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2}Ki", bytes as f64 / KB as f64)
    } else {
        format!("{}B", bytes)
    }
}

/// Color an RMSE in cycles: green under 20, yellow under 45, red otherwise
pub fn color_rmse(rmse: f64) -> String {
    let formatted = format!("{:.3}", rmse);
    if rmse < 20.0 {
        formatted.green().to_string()
    } else if rmse < 45.0 {
        formatted.yellow().to_string()
    } else {
        formatted.red().to_string()
    }
}

/// Color a maintenance advice label by urgency
pub fn color_advice(advice: MaintenanceAdvice) -> String {
    let label = advice.to_string();
    match advice {
        MaintenanceAdvice::Urgent => label.red().bold().to_string(),
        MaintenanceAdvice::Moderate => label.yellow().to_string(),
        MaintenanceAdvice::Healthy => label.green().to_string(),
    }
}

/// Color a list of missing features, `-` when complete
pub fn color_missing(missing: &[String]) -> String {
    if missing.is_empty() {
        "-".to_string()
    } else {
        missing.join(", ").yellow().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_rul() {
        assert_eq!(format_rul(43.5678), "43.57");
        assert_eq!(format_rul(0.0), "0.00");
    }

    #[test]
    fn test_format_score() {
        assert_eq!(format_score(None), "-");
        assert_eq!(format_score(Some(-0.91234)), "-0.9123");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512B");
        assert_eq!(format_bytes(2048), "2.00Ki");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.00Mi");
    }

    #[test]
    fn test_color_rmse_fixed_cutoffs() {
        colored::control::set_override(true);
        assert_eq!(color_rmse(19.9), "19.900".green().to_string());
        assert_eq!(color_rmse(20.0), "20.000".yellow().to_string());
        assert_eq!(color_rmse(45.0), "45.000".red().to_string());
    }

    #[test]
    fn test_color_advice_keeps_label() {
        let urgent = color_advice(MaintenanceAdvice::Urgent);
        let healthy = color_advice(MaintenanceAdvice::Healthy);
        assert!(urgent.contains("urgent"));
        assert!(healthy.contains("healthy"));
    }

    #[test]
    fn test_color_missing_empty() {
        assert_eq!(color_missing(&[]), "-");
    }
}
