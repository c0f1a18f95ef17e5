//! Table and JSON rendering for command results.

use serde::Serialize;
use tabled::{Table, Tabled};

use jobhost_core::events::CompletionEvent;

/// Output format selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON output
    Json,
}

/// One completion event, flattened for the table view.
#[derive(Debug, Serialize, Tabled)]
pub struct EventRow {
    #[tabled(rename = "Event")]
    pub id: String,
    #[tabled(rename = "Type")]
    pub job_type: String,
    #[tabled(rename = "Outcome")]
    pub outcome: &'static str,
    #[tabled(rename = "Finished")]
    pub timestamp: String,
}

impl From<&CompletionEvent> for EventRow {
    fn from(event: &CompletionEvent) -> Self {
        Self {
            id: event.id.to_string(),
            job_type: event.job_type.clone(),
            outcome: if event.success { "succeeded" } else { "failed" },
            timestamp: event.timestamp.to_rfc3339(),
        }
    }
}

/// Print rows in the selected format
pub fn print_list<T: Serialize + Tabled>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table if items.is_empty() => println!("Nothing to show."),
        OutputFormat::Table => println!("{}", Table::new(items)),
        OutputFormat::Json => println!("{}", to_json(&items, "[]")),
    }
}

/// Print a single serializable value
pub fn print_item<T: Serialize + std::fmt::Debug>(item: &T, format: OutputFormat) {
    match format {
        OutputFormat::Table => println!("{:#?}", item),
        OutputFormat::Json => println!("{}", to_json(item, "{}")),
    }
}

/// Print a completion event. JSON output keeps the wire field names.
pub fn print_event(event: &CompletionEvent, format: OutputFormat) {
    match format {
        OutputFormat::Table => println!("{}", Table::new([EventRow::from(event)])),
        OutputFormat::Json => println!("{}", to_json(event, "{}")),
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T, fallback: &str) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| fallback.to_string())
}

/// Print a success message
pub fn print_success(msg: &str) {
    println!("✓ {}", msg);
}

/// Print a warning message
pub fn print_warning(msg: &str) {
    eprintln!("⚠ {}", msg);
}

/// Print an error message
pub fn print_error(msg: &str) {
    eprintln!("✗ {}", msg);
}

/// Print a key-value pair
pub fn print_kv(key: &str, value: &str) {
    println!("  {:<16} {}", format!("{}:", key), value);
}
