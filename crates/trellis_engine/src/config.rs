//! Session configuration.

use trellis_foundation::Severity;

/// Knobs for a [`Session`](crate::Session).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Whether structurally identical nodes are shared between rules.
    pub node_sharing: bool,
    /// Diagnostics below this severity are dropped before the sink.
    pub min_severity: Severity,
    /// Maximum listener commands drained by one `submit`/`retract`.
    pub max_agenda_commands: usize,
    /// Whether `restore` checks every saved memory against the rebuilt one.
    pub verify_restore: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            node_sharing: true,
            min_severity: Severity::Debug,
            max_agenda_commands: 10_000,
            verify_restore: true,
        }
    }
}

impl SessionConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to disable node sharing.
    #[must_use]
    pub fn without_sharing(mut self) -> Self {
        self.node_sharing = false;
        self
    }

    /// Builder method to set the minimum diagnostic severity.
    #[must_use]
    pub fn min_severity(mut self, severity: Severity) -> Self {
        self.min_severity = severity;
        self
    }

    /// Builder method to set the agenda kill switch.
    #[must_use]
    pub fn max_agenda_commands(mut self, limit: usize) -> Self {
        self.max_agenda_commands = limit;
        self
    }

    /// Builder method to skip verification on restore.
    #[must_use]
    pub fn skip_restore_verification(mut self) -> Self {
        self.verify_restore = false;
        self
    }
}
