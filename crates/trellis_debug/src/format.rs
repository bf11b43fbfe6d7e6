//! Diagnostic output formatters.
//!
//! Provides human-readable and JSON formatters for diagnostic records and
//! activations.

use std::fmt::Write;

use trellis_engine::Activation;
use trellis_foundation::Value;

use crate::log::DiagnosticRecord;

// =============================================================================
// Formatter Trait
// =============================================================================

/// Trait for formatting diagnostic records.
pub trait DiagnosticFormatter {
    /// Formats a single record.
    fn format(&self, record: &DiagnosticRecord) -> String;

    /// Formats an activation.
    fn format_activation(&self, activation: &Activation) -> String;

    /// Formats multiple records, one per line.
    fn format_many(&self, records: &[&DiagnosticRecord]) -> String {
        records
            .iter()
            .map(|r| self.format(r))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// =============================================================================
// Human-Readable Formatter
// =============================================================================

/// Formats records as aligned single lines.
#[derive(Clone, Debug, Default)]
pub struct HumanFormatter {
    /// Whether to prefix the sequence number.
    pub show_ids: bool,
    /// Whether to append context entries.
    pub show_context: bool,
}

impl HumanFormatter {
    /// Creates a formatter with ids and context hidden.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to show sequence numbers.
    #[must_use]
    pub fn with_ids(mut self) -> Self {
        self.show_ids = true;
        self
    }

    /// Builder method to show context entries.
    #[must_use]
    pub fn with_context(mut self) -> Self {
        self.show_context = true;
        self
    }
}

impl DiagnosticFormatter for HumanFormatter {
    fn format(&self, record: &DiagnosticRecord) -> String {
        let diagnostic = &record.diagnostic;
        let mut out = String::new();
        if self.show_ids {
            let _ = write!(out, "[{:06}] ", record.id);
        }
        let severity = diagnostic.severity.to_string().to_uppercase();
        let _ = write!(out, "{severity:<5} {}: {}", diagnostic.code, diagnostic.message);
        if self.show_context && !diagnostic.context.is_empty() {
            let pairs: Vec<_> = diagnostic
                .context
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            let _ = write!(out, " {{{}}}", pairs.join(", "));
        }
        out
    }

    fn format_activation(&self, activation: &Activation) -> String {
        let facts: Vec<_> = activation.facts.iter().map(ToString::to_string).collect();
        format!("{} <- {} [{}]", activation, activation.rule, facts.join(", "))
    }
}

// =============================================================================
// JSON Formatter
// =============================================================================

/// Formats records as JSON objects, one per line unless `pretty`.
#[derive(Clone, Debug, Default)]
pub struct JsonFormatter {
    /// Whether to pretty-print.
    pub pretty: bool,
}

impl JsonFormatter {
    /// Creates a compact formatter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to enable pretty printing.
    #[must_use]
    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }

    fn escape_string(s: &str) -> String {
        s.replace('\\', "\\\\")
            .replace('"', "\\\"")
            .replace('\n', "\\n")
            .replace('\r', "\\r")
            .replace('\t', "\\t")
    }

    fn format_value(value: &Value) -> String {
        match value {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => {
                if f.is_nan() {
                    "\"NaN\"".to_string()
                } else if f.is_infinite() {
                    if *f > 0.0 {
                        "\"Infinity\"".to_string()
                    } else {
                        "\"-Infinity\"".to_string()
                    }
                } else {
                    format!("{f:?}")
                }
            }
            Value::String(s) => format!("\"{}\"", Self::escape_string(s)),
            Value::List(items) => {
                let parts: Vec<_> = items.iter().map(Self::format_value).collect();
                format!("[{}]", parts.join(","))
            }
        }
    }

    fn object(&self, fields: &[(&str, String)]) -> String {
        let (open, sep, close) = if self.pretty {
            ("{\n  ", ",\n  ", "\n}")
        } else {
            ("{", ",", "}")
        };
        let colon = if self.pretty { ": " } else { ":" };
        let parts: Vec<_> = fields
            .iter()
            .map(|(k, v)| format!("\"{k}\"{colon}{v}"))
            .collect();
        format!("{open}{}{close}", parts.join(sep))
    }
}

impl DiagnosticFormatter for JsonFormatter {
    fn format(&self, record: &DiagnosticRecord) -> String {
        let diagnostic = &record.diagnostic;
        let context: Vec<_> = diagnostic
            .context
            .iter()
            .map(|(k, v)| {
                format!(
                    "\"{}\":\"{}\"",
                    Self::escape_string(k),
                    Self::escape_string(v)
                )
            })
            .collect();
        self.object(&[
            ("id", record.id.to_string()),
            ("severity", format!("\"{}\"", diagnostic.severity)),
            ("code", format!("\"{}\"", diagnostic.code)),
            (
                "message",
                format!("\"{}\"", Self::escape_string(&diagnostic.message)),
            ),
            ("context", format!("{{{}}}", context.join(","))),
        ])
    }

    fn format_activation(&self, activation: &Activation) -> String {
        let facts: Vec<_> = activation
            .facts
            .iter()
            .map(|f| format!("\"{}\"", Self::escape_string(f.as_str())))
            .collect();
        let arguments: Vec<_> = activation.arguments.iter().map(Self::format_value).collect();
        self.object(&[
            ("rule", format!("\"{}\"", Self::escape_string(&activation.rule))),
            (
                "action",
                format!("\"{}\"", Self::escape_string(&activation.action)),
            ),
            ("facts", format!("[{}]", facts.join(","))),
            ("arguments", format!("[{}]", arguments.join(","))),
        ])
    }

    fn format_many(&self, records: &[&DiagnosticRecord]) -> String {
        let items: Vec<_> = records.iter().map(|r| self.format(r)).collect();
        if self.pretty {
            format!("[\n{}\n]", items.join(",\n"))
        } else {
            format!("[{}]", items.join(","))
        }
    }
}
