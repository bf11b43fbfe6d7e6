//! The user-facing engine session.
//!
//! A [`Session`] owns one [`Network`] and serializes every operation on it.
//! Each `submit` or `retract` moves the session through
//! `Idle → Propagating → Idle`; listener commands queued while propagating
//! are drained before the call returns. A session found still
//! `Propagating` on entry was interrupted mid-update (a panic unwound out of
//! a listener) and is poisoned until [`Session::reset`].

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use trellis_foundation::{
    Diagnostic, DiagnosticCode, DiagnosticSink, Error, ErrorKind, Fact, Result, SemanticLimit,
    Severity, TracingSink, TypeDecl, TypeSchema,
};
use trellis_language::RuleSet;

use crate::config::SessionConfig;
use crate::listener::{ActivationEvent, ActivationListener, Agenda, Command};
use crate::network::Network;
use crate::node::Activation;
use crate::persistence::{MemorySnapshot, MemoryStore};
use crate::stats::{NetworkStats, RuleInfo, SessionCounters};

/// Lifecycle state of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Ready for the next operation.
    Idle,
    /// Inside `submit`, `retract` or `restore`.
    Propagating,
    /// A previous operation failed fatally or was interrupted.
    Poisoned,
}

/// A rule network plus everything needed to drive it.
pub struct Session {
    network: Network,
    config: SessionConfig,
    state: SessionState,
    listeners: Vec<Box<dyn ActivationListener>>,
    sink: Box<dyn DiagnosticSink>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("config", &self.config)
            .field("listeners", &self.listeners.len())
            .field("facts", &self.network.registry().len())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Builds a session with the default configuration.
    ///
    /// # Errors
    /// Any rule compilation error.
    pub fn new(schema: TypeSchema, rules: &RuleSet) -> Result<Self> {
        Self::with_config(schema, rules, SessionConfig::default())
    }

    /// Builds a session with an explicit configuration.
    ///
    /// # Errors
    /// Any rule compilation error.
    pub fn with_config(schema: TypeSchema, rules: &RuleSet, config: SessionConfig) -> Result<Self> {
        let network = Network::build(schema, rules, config.node_sharing)?;
        Ok(Self {
            network,
            config,
            state: SessionState::Idle,
            listeners: Vec::new(),
            sink: Box::new(TracingSink),
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns the network.
    #[must_use]
    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Returns node and memory statistics.
    #[must_use]
    pub fn stats(&self) -> NetworkStats {
        self.network.stats()
    }

    /// Returns the running counters.
    #[must_use]
    pub fn counters(&self) -> SessionCounters {
        self.network.counters()
    }

    /// Describes the nodes used by one rule.
    #[must_use]
    pub fn rule_info(&self, rule: &str) -> Option<RuleInfo> {
        self.network.rule_info(rule)
    }

    /// Every activation, ordered by matched facts then rule declaration.
    #[must_use]
    pub fn activations(&self) -> Vec<Activation> {
        self.network.activations()
    }

    /// Activations of one rule, in the same order as [`Session::activations`].
    #[must_use]
    pub fn activations_for(&self, rule: &str) -> Vec<Activation> {
        self.network.activations_for(rule)
    }

    /// Looks up an asserted fact.
    ///
    /// # Errors
    /// `NotFound` if no such fact is asserted.
    pub fn lookup(&self, id: &str) -> Result<Arc<Fact>> {
        self.network.registry().lookup(id).cloned()
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Registers an activation listener.
    pub fn add_listener(&mut self, listener: impl ActivationListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Replaces the diagnostic sink.
    pub fn set_sink(&mut self, sink: impl DiagnosticSink + 'static) {
        self.sink = Box::new(sink);
    }

    /// Declares a fact type. Only possible before the first assertion.
    ///
    /// # Errors
    /// `SealedSchema`, `DuplicateType` or `PoisonedSession`.
    pub fn declare_type(&mut self, decl: TypeDecl) -> Result<()> {
        self.check_usable()?;
        self.network.declare_type(decl)
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Asserts a fact and propagates it to quiescence.
    ///
    /// # Errors
    /// `DuplicateId`, `UnknownType`, `UnknownField`, `FieldTypeMismatch`,
    /// `PoisonedSession`, or `LimitExceeded` if listeners keep queueing
    /// commands. `Internal` if a memory refers to a missing token or fact;
    /// the session is poisoned afterwards.
    pub fn submit(&mut self, fact: Fact) -> Result<Arc<Fact>> {
        self.enter()?;
        let result = self.network.assert_fact(fact);
        let result = match result {
            Ok(stored) => {
                tracing::debug!(fact = %stored.id(), "submitted fact");
                self.settle().map(|()| stored)
            }
            Err(err) => Err(err),
        };
        self.leave(result)
    }

    /// Retracts a fact and everything that depended on it.
    ///
    /// # Errors
    /// `NotFound`, `PoisonedSession` or `LimitExceeded`. `Internal` poisons
    /// the session, as for [`Session::submit`].
    pub fn retract(&mut self, id: &str) -> Result<Arc<Fact>> {
        self.enter()?;
        let result = match self.network.retract_fact(id) {
            Ok(fact) => {
                tracing::debug!(fact = id, "retracted fact");
                self.settle().map(|()| fact)
            }
            Err(err) => Err(err),
        };
        self.leave(result)
    }

    /// Drops every fact and token and clears poisoning. Listeners are not
    /// notified of the activations that disappear. The session stays
    /// poisoned if the initial token cannot be propagated again.
    pub fn reset(&mut self) {
        let seeded = self.network.reset();
        self.network.take_events();
        self.flush_diagnostics();
        self.state = match seeded {
            Ok(()) => SessionState::Idle,
            Err(err) => {
                tracing::error!(error = %err, "reset failed; session poisoned");
                SessionState::Poisoned
            }
        };
        tracing::debug!("session reset");
    }

    /// Writes one snapshot per memory node to `store`.
    ///
    /// # Errors
    /// `PoisonedSession` or any store error.
    pub fn save(&mut self, store: &mut dyn MemoryStore) -> Result<()> {
        self.check_usable()?;
        let mut saved = 0usize;
        for node in self.network.nodes() {
            if let Some(snapshot) = self.network.snapshot(node.id()) {
                store.save(node.id(), &snapshot)?;
                saved += 1;
            }
        }
        tracing::debug!(nodes = saved, "saved session");
        Ok(())
    }

    /// Resets the session and replays the facts saved in `store`.
    ///
    /// When [`SessionConfig::verify_restore`] is set, every saved node
    /// memory is compared with the rebuilt one. Listeners are not notified.
    ///
    /// # Errors
    /// `Storage` if the store has no root snapshot or a memory differs,
    /// any store error, or an assertion error from a saved fact.
    pub fn restore(&mut self, store: &dyn MemoryStore) -> Result<()> {
        let root = self.network.root();
        let Some(MemorySnapshot::Facts(facts)) = store.load(root)? else {
            return Err(Error::storage(format!("no fact snapshot for root node {root}")));
        };
        self.reset();
        self.check_usable()?;
        self.state = SessionState::Propagating;
        let result = self.replay(store, facts);
        self.network.take_events();
        self.leave(result)
    }

    fn replay(&mut self, store: &dyn MemoryStore, facts: Vec<Fact>) -> Result<()> {
        let count = facts.len();
        for fact in facts {
            self.network.assert_fact(fact)?;
        }
        if self.config.verify_restore {
            for id in store.list()? {
                let Some(saved) = store.load(id)? else {
                    return Err(Error::storage(format!("snapshot for node {id} vanished")));
                };
                let matches = self
                    .network
                    .snapshot(id)
                    .is_some_and(|current| current.same_contents(&saved));
                if !matches {
                    self.network.push_diagnostic(
                        Diagnostic::new(
                            Severity::Error,
                            DiagnosticCode::RestoreMismatch,
                            "restored memory differs from its snapshot",
                        )
                        .with("node", id),
                    );
                    return Err(Error::storage(format!(
                        "memory of node {id} differs from its snapshot"
                    )));
                }
            }
        }
        tracing::debug!(facts = count, "restored session");
        Ok(())
    }

    // =========================================================================
    // State machine
    // =========================================================================

    fn check_usable(&self) -> Result<()> {
        match self.state {
            SessionState::Idle => Ok(()),
            SessionState::Propagating | SessionState::Poisoned => {
                Err(Error::new(ErrorKind::PoisonedSession))
            }
        }
    }

    fn enter(&mut self) -> Result<()> {
        match self.state {
            SessionState::Idle => {
                self.state = SessionState::Propagating;
                Ok(())
            }
            SessionState::Propagating => {
                tracing::error!("session entered while still propagating; poisoning");
                self.state = SessionState::Poisoned;
                Err(Error::new(ErrorKind::PoisonedSession))
            }
            SessionState::Poisoned => Err(Error::new(ErrorKind::PoisonedSession)),
        }
    }

    fn leave<T>(&mut self, result: Result<T>) -> Result<T> {
        self.flush_diagnostics();
        self.state = match &result {
            Err(err) if err.is_fatal() => {
                tracing::error!(error = %err, "fatal error; session poisoned");
                SessionState::Poisoned
            }
            _ => SessionState::Idle,
        };
        result
    }

    /// Notifies listeners and drains their commands until nothing changes.
    fn settle(&mut self) -> Result<()> {
        let limit = self.config.max_agenda_commands;
        let mut queue: VecDeque<(Command, Arc<str>)> = VecDeque::new();
        let mut executed = 0usize;
        loop {
            for event in self.network.take_events() {
                let mut agenda = Agenda::new();
                for listener in &mut self.listeners {
                    match &event {
                        ActivationEvent::Added(a) => listener.activated(a, &mut agenda),
                        ActivationEvent::Removed(a) => listener.deactivated(a, &mut agenda),
                    }
                }
                let rule = Arc::clone(&event.activation().rule);
                queue.extend(agenda.into_commands().into_iter().map(|c| (c, Arc::clone(&rule))));
            }
            self.flush_diagnostics();

            let Some((command, rule)) = queue.pop_front() else {
                return Ok(());
            };
            executed += 1;
            if executed > limit {
                tracing::warn!(limit, rule = %rule, "agenda limit reached");
                return Err(Error::limit_exceeded(SemanticLimit::MaxAgendaCommands {
                    limit,
                    rule: Some(rule.to_string()),
                }));
            }
            let outcome = match &command {
                Command::Submit(fact) => self.network.assert_fact(fact.clone()).map(drop),
                Command::Retract(id) => self.network.retract_fact(id.as_str()).map(drop),
            };
            if let Err(err) = outcome {
                if err.is_fatal() {
                    return Err(err);
                }
                self.network.push_diagnostic(
                    Diagnostic::new(
                        Severity::Error,
                        DiagnosticCode::ListenerCommandFailed,
                        format!("listener command failed: {err}"),
                    )
                    .with("rule", &rule)
                    .with("command", format!("{command:?}")),
                );
            }
        }
    }

    fn flush_diagnostics(&mut self) {
        let min = self.config.min_severity;
        let mut delivered = 0;
        for diagnostic in self.network.take_diagnostics() {
            if diagnostic.severity >= min {
                self.sink.emit(diagnostic);
                delivered += 1;
            }
        }
        self.network.count_diagnostics(delivered);
    }
}
