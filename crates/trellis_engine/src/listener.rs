//! Activation listeners and the command agenda.
//!
//! Listeners observe activations as they appear and disappear. They cannot
//! touch the network directly while it is propagating; instead they queue
//! [`Command`]s on an [`Agenda`], which the session drains before returning
//! control to the caller.

use trellis_foundation::{Fact, FactId};

use crate::node::Activation;

/// A change in the activation set.
#[derive(Clone, Debug, PartialEq)]
pub enum ActivationEvent {
    /// A terminal stored a new activation.
    Added(Activation),
    /// A terminal dropped an activation.
    Removed(Activation),
}

impl ActivationEvent {
    /// Returns the activation carried by the event.
    #[must_use]
    pub fn activation(&self) -> &Activation {
        match self {
            Self::Added(activation) | Self::Removed(activation) => activation,
        }
    }
}

/// A deferred session operation.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Assert a fact.
    Submit(Fact),
    /// Retract a fact by identifier.
    Retract(FactId),
}

/// Commands queued by listeners during one notification.
#[derive(Clone, Debug, Default)]
pub struct Agenda {
    commands: Vec<Command>,
}

impl Agenda {
    /// Creates an empty agenda.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a fact assertion.
    pub fn submit(&mut self, fact: Fact) {
        self.commands.push(Command::Submit(fact));
    }

    /// Queues a fact retraction.
    pub fn retract(&mut self, id: impl Into<FactId>) {
        self.commands.push(Command::Retract(id.into()));
    }

    /// Number of queued commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub(crate) fn into_commands(self) -> Vec<Command> {
        self.commands
    }
}

/// Observer of activation changes.
///
/// Both methods default to doing nothing.
pub trait ActivationListener: Send {
    /// Called after a terminal stores an activation.
    fn activated(&mut self, activation: &Activation, agenda: &mut Agenda) {
        let _ = (activation, agenda);
    }

    /// Called after a terminal drops an activation.
    fn deactivated(&mut self, activation: &Activation, agenda: &mut Agenda) {
        let _ = (activation, agenda);
    }
}

/// Closures observing additions only.
impl<F> ActivationListener for F
where
    F: FnMut(&Activation, &mut Agenda) + Send,
{
    fn activated(&mut self, activation: &Activation, agenda: &mut Agenda) {
        self(activation, agenda);
    }
}
