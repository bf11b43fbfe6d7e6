//! Ring buffer sink for diagnostics.
//!
//! [`DiagnosticLog`] keeps the most recent diagnostics a session emitted.
//! Hand a session an `Arc<Mutex<DiagnosticLog>>` to keep a readable handle.

use std::collections::{BTreeMap, VecDeque};

use trellis_foundation::{Diagnostic, DiagnosticCode, DiagnosticSink, Severity};

// =============================================================================
// Diagnostic Record
// =============================================================================

/// A stored diagnostic with its sequence number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiagnosticRecord {
    /// Monotonic sequence number, never reused.
    pub id: u64,
    /// The diagnostic itself.
    pub diagnostic: Diagnostic,
}

// =============================================================================
// Diagnostic Log
// =============================================================================

/// A bounded log of diagnostics.
///
/// Discards the oldest record once `max_size` is reached.
#[derive(Clone, Debug)]
pub struct DiagnosticLog {
    records: VecDeque<DiagnosticRecord>,
    max_size: usize,
    next_id: u64,
    dropped: u64,
}

impl DiagnosticLog {
    /// Creates a log holding at most `max_size` records.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(max_size.min(1024)),
            max_size,
            next_id: 0,
            dropped: 0,
        }
    }

    /// Creates a log with the default size (1000 records).
    #[must_use]
    pub fn default_size() -> Self {
        Self::new(1000)
    }

    /// Appends a diagnostic and returns its sequence number.
    pub fn push(&mut self, diagnostic: Diagnostic) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.records.push_back(DiagnosticRecord { id, diagnostic });
        while self.records.len() > self.max_size {
            self.records.pop_front();
            self.dropped += 1;
        }
        id
    }

    /// Returns the number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drops every record. Sequence numbers keep increasing.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Iterates records, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &DiagnosticRecord> {
        self.records.iter()
    }

    /// Returns the most recent `count` records, oldest first.
    #[must_use]
    pub fn recent(&self, count: usize) -> Vec<&DiagnosticRecord> {
        let start = self.records.len().saturating_sub(count);
        self.records.iter().skip(start).collect()
    }

    /// Returns records matching a predicate.
    pub fn filter<F>(&self, predicate: F) -> Vec<&DiagnosticRecord>
    where
        F: Fn(&DiagnosticRecord) -> bool,
    {
        self.records.iter().filter(|r| predicate(r)).collect()
    }

    /// Returns records at or above `min` severity.
    #[must_use]
    pub fn at_least(&self, min: Severity) -> Vec<&DiagnosticRecord> {
        self.filter(|r| r.diagnostic.severity >= min)
    }

    /// Returns records with the given code.
    #[must_use]
    pub fn by_code(&self, code: DiagnosticCode) -> Vec<&DiagnosticRecord> {
        self.filter(|r| r.diagnostic.code == code)
    }

    /// Returns records whose context names `rule`.
    #[must_use]
    pub fn for_rule(&self, rule: &str) -> Vec<&DiagnosticRecord> {
        self.filter(|r| {
            r.diagnostic.context.get("rule").is_some_and(|v| v == rule)
                || r.diagnostic
                    .context
                    .get("rules")
                    .is_some_and(|v| v.split(',').any(|name| name == rule))
        })
    }

    /// Returns statistics about the log.
    #[must_use]
    pub fn stats(&self) -> DiagnosticLogStats {
        let mut by_code = BTreeMap::new();
        let mut by_severity = BTreeMap::new();
        for record in &self.records {
            *by_code.entry(record.diagnostic.code.as_str()).or_insert(0) += 1;
            *by_severity.entry(record.diagnostic.severity).or_insert(0) += 1;
        }
        DiagnosticLogStats {
            record_count: self.records.len(),
            max_size: self.max_size,
            dropped: self.dropped,
            by_code,
            by_severity,
        }
    }
}

impl Default for DiagnosticLog {
    fn default() -> Self {
        Self::default_size()
    }
}

impl DiagnosticSink for DiagnosticLog {
    fn emit(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

// =============================================================================
// Log Statistics
// =============================================================================

/// Statistics about a diagnostic log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiagnosticLogStats {
    /// Records currently stored.
    pub record_count: usize,
    /// Capacity.
    pub max_size: usize,
    /// Records evicted because the log was full.
    pub dropped: u64,
    /// Stored records per code.
    pub by_code: BTreeMap<&'static str, usize>,
    /// Stored records per severity.
    pub by_severity: BTreeMap<Severity, usize>,
}
