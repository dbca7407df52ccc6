//! Terminal output for bucketsync commands
//!
//! Commands report results through an [`OutputFormatter`] so the same code
//! path serves people and scripts. Diagnostics go to the tracing log on
//! stderr; this module only prints what the user asked to see.

/// How command results are printed, chosen by `--json`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Sink for command results
///
/// Success and info lines go to stdout, warnings and errors to stderr.
pub trait OutputFormatter {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
    fn print_json(&self, value: &serde_json::Value);
}

/// Plain-text lines prefixed with a status mark
///
/// `--quiet` drops success and info lines; problems are always shown.
pub struct HumanFormatter {
    quiet: bool,
}

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        if !self.quiet {
            println!("\u{2713} {}", message);
        }
    }
    fn error(&self, message: &str) {
        eprintln!("\u{2717} Error: {}", message);
    }
    fn warn(&self, message: &str) {
        eprintln!("\u{26a0} Warning: {}", message);
    }
    fn info(&self, message: &str) {
        if !self.quiet {
            println!("  {}", message);
        }
    }
    fn print_json(&self, _value: &serde_json::Value) {
        // Structured reports have a text rendering in each command
    }
}

/// One JSON document per line of output
///
/// Info lines are dropped so stdout carries only parseable values.
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn success(&self, message: &str) {
        println!(
            "{}",
            serde_json::json!({"success": true, "message": message})
        );
    }
    fn error(&self, message: &str) {
        eprintln!(
            "{}",
            serde_json::json!({"success": false, "error": message})
        );
    }
    fn warn(&self, message: &str) {
        eprintln!(
            "{}",
            serde_json::json!({"level": "warning", "message": message})
        );
    }
    fn info(&self, _message: &str) {}
    fn print_json(&self, value: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string_pretty(value).unwrap_or_default()
        );
    }
}

/// Formatter for the selected format; `quiet` only affects human output
pub fn get_formatter(format: OutputFormat, quiet: bool) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Human => Box::new(HumanFormatter { quiet }),
    }
}
