use tracing::warn;

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    pub fn is_json(self) -> bool {
        matches!(self, OutputFormat::Json)
    }
}

/// Trait for formatting CLI output
pub trait OutputFormatter {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn info(&self, message: &str);
    /// One aligned `label: value` line
    fn field(&self, label: &str, value: &str);
    fn print_json(&self, value: &serde_json::Value);
}

/// Human-readable output with checkmarks and aligned fields
pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        println!("\u{2713} {message}");
    }
    fn error(&self, message: &str) {
        eprintln!("\u{2717} Error: {message}");
    }
    fn info(&self, message: &str) {
        println!("  {message}");
    }
    fn field(&self, label: &str, value: &str) {
        println!("  {:<22} {}", format!("{label}:"), value);
    }
    fn print_json(&self, value: &serde_json::Value) {
        // Payload documents print in both modes.
        if let Some(text) = render_pretty(value) {
            println!("{text}");
        }
    }
}

/// JSON output: only documents are printed to stdout
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn success(&self, _message: &str) {}
    fn error(&self, message: &str) {
        eprintln!(
            "{}",
            serde_json::json!({"success": false, "error": message})
        );
    }
    fn info(&self, _message: &str) {}
    fn field(&self, _label: &str, _value: &str) {}
    fn print_json(&self, value: &serde_json::Value) {
        if let Some(text) = render_pretty(value) {
            println!("{text}");
        }
    }
}

/// Pretty-printed document, or `None` (logged) when it cannot be rendered.
fn render_pretty(value: &serde_json::Value) -> Option<String> {
    match serde_json::to_string_pretty(value) {
        Ok(text) => Some(text),
        Err(e) => {
            warn!(error = %e, "Failed to render JSON output");
            None
        }
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Human => Box::new(HumanFormatter),
    }
}
