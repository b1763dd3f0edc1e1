use serde::Serialize;

use crate::coordinator::HealthReport;
use crate::models::{SearchResponse, SearchResult};

pub trait OutputFormatter {
    fn format_text(&self) -> String;
    fn format_json(&self, pretty: bool) -> crate::Result<String>;
}

pub fn print_output<T: OutputFormatter>(
    data: &T,
    as_json: bool,
    json_pretty: bool,
) -> crate::Result<()> {
    let output = if as_json {
        data.format_json(json_pretty)?
    } else {
        data.format_text()
    };

    println!("{}", output);
    Ok(())
}

pub fn to_json<T: Serialize>(data: &T, pretty: bool) -> crate::Result<String> {
    if pretty {
        Ok(serde_json::to_string_pretty(data)?)
    } else {
        Ok(serde_json::to_string(data)?)
    }
}

const MAX_LISTED_PRICES: usize = 20;

impl OutputFormatter for SearchResult {
    fn format_text(&self) -> String {
        let stats = &self.stats;
        let mut lines = Vec::new();

        if stats.count == 0 {
            lines.push(text::warning(&format!(
                "No prices found for '{}'",
                self.search_term
            )));
        } else {
            lines.push(text::success(&format!(
                "Found {} prices for '{}'",
                stats.count, self.search_term
            )));
        }

        lines.push(text::section("Statistics"));
        lines.push(text::key_value("Average", &text::money(stats.average)));
        lines.push(text::key_value("Median", &text::money(stats.median)));
        lines.push(text::key_value("Min", &text::money(stats.min)));
        lines.push(text::key_value("Max", &text::money(stats.max)));
        lines.push(text::key_value("Strategy", &self.extraction.strategy.to_string()));

        if !self.extraction.values.is_empty() {
            lines.push(text::section("Prices"));
            for value in self.extraction.values.iter().take(MAX_LISTED_PRICES) {
                lines.push(text::bullet(&text::money(*value)));
            }
            let hidden = self.extraction.values.len().saturating_sub(MAX_LISTED_PRICES);
            if hidden > 0 {
                lines.push(text::bullet(&format!("... and {} more", hidden)));
            }
        }

        if let Some(debug) = &self.diagnostics {
            lines.push(text::section("Diagnostics"));
            lines.push(text::key_value("Request", &debug.request_id));
            lines.push(text::key_value("URL", &debug.url));
            for attempt in &debug.attempts {
                lines.push(text::bullet(&format!(
                    "{}: {} prices",
                    attempt.strategy, attempt.yield_count
                )));
            }
            lines.push(text::key_value("States", &debug.states.join(" → ")));
            lines.push(text::key_value(
                "Elapsed",
                &text::format_duration_ms(debug.elapsed_ms),
            ));
        }

        lines.join("\n")
    }

    fn format_json(&self, pretty: bool) -> crate::Result<String> {
        to_json(&SearchResponse::from(self), pretty)
    }
}

impl OutputFormatter for HealthReport {
    fn format_text(&self) -> String {
        text::success(&format!(
            "Browser context opened and closed in {}",
            text::format_duration_ms(self.elapsed_ms)
        ))
    }

    fn format_json(&self, pretty: bool) -> crate::Result<String> {
        to_json(self, pretty)
    }
}

pub mod text {
    use colored::Colorize;

    pub fn success(msg: &str) -> String {
        format!("{} {}", "✓".green().bold(), msg)
    }

    pub fn error(msg: &str) -> String {
        format!("{} {}", "✗".red().bold(), msg)
    }

    pub fn warning(msg: &str) -> String {
        format!("{} {}", "⚠".yellow().bold(), msg)
    }

    pub fn bullet(msg: &str) -> String {
        format!("  • {}", msg)
    }

    pub fn section(title: &str) -> String {
        format!("\n{}\n{}", title.bold(), "─".repeat(title.len()))
    }

    pub fn key_value(key: &str, value: &str) -> String {
        format!("  {}: {}", key.bold(), value)
    }

    /// Two decimals with thousands separators: `12,345.60`.
    pub fn money(value: f64) -> String {
        let formatted = format!("{:.2}", value);
        let (whole, fraction) = formatted.split_once('.').unwrap_or((&formatted, "00"));
        let (sign, digits) = match whole.strip_prefix('-') {
            Some(rest) => ("-", rest),
            None => ("", whole),
        };

        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }
        format!("{}{}.{}", sign, grouped, fraction)
    }

    pub fn format_duration_ms(ms: u64) -> String {
        if ms >= 1000 {
            format!("{:.2}s", ms as f64 / 1000.0)
        } else {
            format!("{}ms", ms)
        }
    }
}
