//! The compiled network and its propagation runtime.
//!
//! Propagation is depth-first: a node updates its own memory, then hands
//! every token it produces to each child before looking at the next one.
//! Memories are insertion-ordered, so for a fixed sequence of operations
//! the same tokens are produced in the same order.
//!
//! Retracting a fact runs in three phases:
//!
//! 1. remove every token that joined the fact, with everything derived
//!    from it
//! 2. drop the fact from right memories and from the match sets of
//!    not/exists/accumulate nodes, remembering which left tokens changed
//! 3. re-evaluate the remembered tokens (a not node may pass again, an
//!    accumulate node recomputes its aggregate)
//!
//! Phase 3 only runs once the fact is gone everywhere, so no token emitted
//! during it can pair with the retracted fact.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::sync::Arc;

use trellis_foundation::{
    Diagnostic, DiagnosticCode, Error, Fact, FactId, Result, Severity, TypeDecl, TypeSchema, Value,
};
use trellis_language::{Bindings, Evaluator, Expr, RuleSet};

use crate::builder::{NetworkBuilder, RulePlan, ROOT};
use crate::listener::ActivationEvent;
use crate::node::quantified::passes;
use crate::node::{
    Activation, Aggregate, AccumulateNode, AccumulateState, Node, NodeId, NodeKind,
    QuantifiedNode, QuantifiedState,
};
use crate::persistence::{MemorySnapshot, TokenSnapshot};
use crate::registry::{FactKey, FactRegistry};
use crate::stats::{NetworkStats, RuleInfo, SessionCounters};
use crate::token::{Token, TokenId, TokenStore};

/// A compiled rule network together with its facts and tokens.
#[derive(Debug)]
pub struct Network {
    nodes: Vec<Node>,
    plans: Vec<RulePlan>,
    registry: FactRegistry,
    tokens: TokenStore,
    evaluator: Evaluator,
    diagnostics: RefCell<Vec<Diagnostic>>,
    events: Vec<ActivationEvent>,
    counters: SessionCounters,
}

/// Sort key of an activation: matched fact keys, then the terminal node.
type MatchOrder = (im::Vector<FactKey>, NodeId);

enum Followup {
    Refresh,
    Recompute,
    Skip,
}

impl Network {
    /// Compiles `rules` against `schema` and seeds the initial token.
    ///
    /// # Errors
    /// Any build error from [`NetworkBuilder::add_rule`].
    pub fn build(schema: TypeSchema, rules: &RuleSet, sharing: bool) -> Result<Self> {
        let mut builder = NetworkBuilder::new(&schema).sharing(sharing);
        builder.add_rules(rules)?;
        let (nodes, plans) = builder.finish();
        let mut network = Self {
            nodes,
            plans,
            registry: FactRegistry::new(schema),
            tokens: TokenStore::new(),
            evaluator: Evaluator::new(),
            diagnostics: RefCell::new(Vec::new()),
            events: Vec::new(),
            counters: SessionCounters::default(),
        };
        network.seed()?;
        tracing::debug!(
            rules = network.plans.len(),
            nodes = network.nodes.len(),
            sharing,
            "built network"
        );
        Ok(network)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns every node, indexed by [`NodeId::index`].
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Returns a node.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Returns the root node's identifier.
    #[must_use]
    pub fn root(&self) -> NodeId {
        ROOT
    }

    /// Returns the compiled rule plans in declaration order.
    #[must_use]
    pub fn plans(&self) -> &[RulePlan] {
        &self.plans
    }

    /// Returns the plan of one rule.
    #[must_use]
    pub fn plan(&self, rule: &str) -> Option<&RulePlan> {
        self.plans.iter().find(|plan| &*plan.rule == rule)
    }

    /// Returns the fact registry.
    #[must_use]
    pub fn registry(&self) -> &FactRegistry {
        &self.registry
    }

    /// Returns the token store.
    #[must_use]
    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Returns the evaluator used for conditions and arguments.
    #[must_use]
    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    /// Returns the running counters.
    #[must_use]
    pub fn counters(&self) -> SessionCounters {
        self.counters
    }

    /// Returns the token seeding every rule chain.
    #[must_use]
    pub fn initial_token(&self) -> Option<TokenId> {
        match &self.nodes.get(ROOT.index())?.kind {
            NodeKind::Root(root) => root.initial,
            _ => None,
        }
    }

    /// Collects node and memory statistics.
    #[must_use]
    pub fn stats(&self) -> NetworkStats {
        NetworkStats::collect(self)
    }

    /// Describes the nodes used by one rule.
    #[must_use]
    pub fn rule_info(&self, rule: &str) -> Option<RuleInfo> {
        RuleInfo::collect(self, rule)
    }

    /// Every activation across all terminals.
    ///
    /// Activations are ordered by the facts they matched, compared in
    /// assertion order, then by rule declaration order. The order depends
    /// only on which facts are asserted, so retracting a fact restores the
    /// order seen before it arrived.
    #[must_use]
    pub fn activations(&self) -> Vec<Activation> {
        let mut all: Vec<(MatchOrder, Activation)> = self
            .nodes
            .iter()
            .filter_map(|node| match &node.kind {
                NodeKind::Terminal(terminal) => Some((node.id, terminal)),
                _ => None,
            })
            .flat_map(|(id, terminal)| {
                terminal
                    .memory
                    .iter()
                    .map(move |(token, a)| (self.match_order(id, token), a.clone()))
            })
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all.into_iter().map(|(_, activation)| activation).collect()
    }

    /// Activations of one rule, ordered like [`Network::activations`].
    /// Empty for unknown rules.
    #[must_use]
    pub fn activations_for(&self, rule: &str) -> Vec<Activation> {
        let Some(plan) = self.plan(rule) else {
            return Vec::new();
        };
        let Some(NodeKind::Terminal(terminal)) = self.node(plan.terminal).map(Node::kind) else {
            return Vec::new();
        };
        let mut all: Vec<(MatchOrder, Activation)> = terminal
            .memory
            .iter()
            .map(|(token, a)| (self.match_order(plan.terminal, token), a.clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all.into_iter().map(|(_, activation)| activation).collect()
    }

    fn match_order(&self, terminal: NodeId, token: TokenId) -> MatchOrder {
        let facts = self.tokens.get(token).map(|t| t.facts().clone()).unwrap_or_default();
        (facts, terminal)
    }

    /// Captures one node memory. `None` for nodes without memory.
    #[must_use]
    pub fn snapshot(&self, id: NodeId) -> Option<MemorySnapshot> {
        let node = self.node(id)?;
        let fact_id = |key: FactKey| -> Option<FactId> {
            self.registry.get(key).map(|fact| fact.id().clone())
        };
        let token = |id: TokenId| -> Option<TokenSnapshot> {
            let token = self.tokens.get(id)?;
            Some(TokenSnapshot {
                facts: token.facts().iter().filter_map(|k| fact_id(*k)).collect(),
                synthetic: token
                    .synthetic()
                    .iter()
                    .map(|(name, value)| (name.to_string(), value.clone()))
                    .collect(),
            })
        };
        let beta = |left: Vec<TokenId>, right: Vec<FactKey>| MemorySnapshot::Beta {
            left: left.into_iter().filter_map(token).collect(),
            right: right.into_iter().filter_map(fact_id).collect(),
        };
        match &node.kind {
            NodeKind::Root(_) => Some(MemorySnapshot::Facts(
                self.registry.iter().map(|(_, fact)| Fact::clone(fact)).collect(),
            )),
            NodeKind::Type(_) => None,
            NodeKind::Alpha(alpha) => Some(MemorySnapshot::FactRefs(
                alpha.memory.keys().filter_map(fact_id).collect(),
            )),
            NodeKind::Join(join) => Some(beta(join.left.keys().collect(), join.right.keys().collect())),
            NodeKind::Not(q) | NodeKind::Exists(q) => {
                Some(beta(q.left.keys().collect(), q.right.keys().collect()))
            }
            NodeKind::Accumulate(acc) => {
                Some(beta(acc.left.keys().collect(), acc.right.keys().collect()))
            }
            NodeKind::Terminal(terminal) => Some(MemorySnapshot::Tokens(
                terminal.memory.keys().filter_map(token).collect(),
            )),
        }
    }

    // =========================================================================
    // Session plumbing
    // =========================================================================

    pub(crate) fn declare_type(&mut self, decl: TypeDecl) -> Result<()> {
        self.registry.declare_type(decl)
    }

    pub(crate) fn take_events(&mut self) -> Vec<ActivationEvent> {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn take_diagnostics(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.diagnostics.borrow_mut())
    }

    pub(crate) fn count_diagnostics(&mut self, delivered: usize) {
        self.counters.diagnostics_emitted += delivered as u64;
    }

    pub(crate) fn push_diagnostic(&self, diagnostic: Diagnostic) {
        self.diagnostics.borrow_mut().push(diagnostic);
    }

    /// Drops all facts and tokens and re-seeds the initial token. Nodes,
    /// counters and the sealed schema are kept. No events are produced.
    pub(crate) fn reset(&mut self) -> Result<()> {
        for node in &mut self.nodes {
            node.clear_memory();
        }
        self.tokens.clear();
        self.registry.clear();
        self.seed()?;
        tracing::debug!("network reset");
        Ok(())
    }

    fn seed(&mut self) -> Result<()> {
        let initial = self.tokens.create_root(ROOT);
        self.counters.tokens_created += 1;
        if let NodeKind::Root(root) = &mut self.nodes[ROOT.index()].kind {
            root.initial = Some(initial);
        }
        for child in self.children(ROOT) {
            self.left_activate(child, initial)?;
        }
        self.events.clear();
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn tokens_mut(&mut self) -> &mut TokenStore {
        &mut self.tokens
    }

    // =========================================================================
    // Assertion
    // =========================================================================

    /// Validates, stores and propagates a fact.
    ///
    /// An `Internal` error means a memory referred to a token or fact that
    /// no longer exists; the network is inconsistent afterwards.
    pub(crate) fn assert_fact(&mut self, fact: Fact) -> Result<Arc<Fact>> {
        let (key, stored) = self.registry.insert(fact)?;
        self.counters.facts_submitted += 1;
        tracing::trace!(fact = %stored.id(), %key, "asserting fact");
        if let Some(type_node) = self.type_node(stored.type_name()) {
            for alpha in self.children(type_node) {
                self.alpha_activate(alpha, key)?;
            }
        }
        Ok(stored)
    }

    fn type_node(&self, type_name: &str) -> Option<NodeId> {
        match &self.nodes[ROOT.index()].kind {
            NodeKind::Root(root) => root.types.get(type_name).copied(),
            _ => None,
        }
    }

    fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes[id.index()].children.clone()
    }

    fn token(&self, id: TokenId) -> Result<&Token> {
        self.tokens
            .get(id)
            .ok_or_else(|| Error::internal(format!("token {id} is referenced but missing")))
    }

    fn fact(&self, key: FactKey) -> Result<&Arc<Fact>> {
        self.registry
            .get(key)
            .ok_or_else(|| Error::internal(format!("fact {key} is referenced but missing")))
    }

    fn alpha_activate(&mut self, id: NodeId, key: FactKey) -> Result<()> {
        let passed = {
            let NodeKind::Alpha(alpha) = &self.nodes[id.index()].kind else {
                return Err(mismatch(id, "alpha"));
            };
            let bindings = Bindings::new().with_fact(&alpha.variable, self.fact(key)?);
            self.holds(id, &alpha.predicate, &bindings)
        };
        if !passed {
            return Ok(());
        }
        if let NodeKind::Alpha(alpha) = &mut self.nodes[id.index()].kind {
            alpha.memory.insert(key, ());
        }
        for child in self.children(id) {
            self.right_activate(child, key)?;
        }
        Ok(())
    }

    fn right_activate(&mut self, id: NodeId, key: FactKey) -> Result<()> {
        match &self.nodes[id.index()].kind {
            NodeKind::Join(_) => self.join_right(id, key),
            NodeKind::Not(_) | NodeKind::Exists(_) => self.quantified_right(id, key),
            NodeKind::Accumulate(_) => self.accumulate_right(id, key),
            _ => Err(mismatch(id, "beta")),
        }
    }

    fn left_activate(&mut self, id: NodeId, token: TokenId) -> Result<()> {
        match &self.nodes[id.index()].kind {
            NodeKind::Join(_) => self.join_left(id, token),
            NodeKind::Not(_) | NodeKind::Exists(_) => self.quantified_left(id, token),
            NodeKind::Accumulate(_) => self.accumulate_left(id, token),
            NodeKind::Terminal(_) => self.terminal_left(id, token),
            _ => Err(mismatch(id, "beta or terminal")),
        }
    }

    /// Derives a child token at `id` and sends it to every child of `id`.
    fn emit(
        &mut self,
        id: NodeId,
        parent: TokenId,
        fact: Option<FactKey>,
        synthetic: Option<(Arc<str>, Value)>,
    ) -> Result<()> {
        let child = self
            .tokens
            .derive(id, parent, fact, synthetic)
            .ok_or_else(|| orphaned(id, parent))?;
        self.counters.tokens_created += 1;
        for next in self.children(id) {
            self.left_activate(next, child)?;
        }
        Ok(())
    }

    // =========================================================================
    // Evaluation
    // =========================================================================

    fn bind<'n>(&'n self, token: &'n Token) -> Result<Bindings<'n>> {
        let mut bindings = Bindings::new();
        let producer = self
            .nodes
            .get(token.node().index())
            .ok_or_else(|| Error::internal(format!("token {} has no producer", token.id())))?;
        for (name, key) in producer.layout.iter().zip(token.facts().iter()) {
            bindings.bind_fact(name, self.fact(*key)?);
        }
        for (name, value) in token.synthetic().iter() {
            bindings.bind_value(name, value);
        }
        Ok(bindings)
    }

    fn holds(&self, id: NodeId, conditions: &[Expr], bindings: &Bindings<'_>) -> bool {
        if conditions.is_empty() {
            return true;
        }
        match self.evaluator.test_all(conditions, bindings) {
            Ok(passed) => passed,
            Err(err) => {
                self.report(id, &err);
                false
            }
        }
    }

    fn report(&self, id: NodeId, err: &Error) {
        let mut diagnostic = Diagnostic::from_error(Severity::Warn, err).with("node", id);
        if let Some(node) = self.nodes.get(id.index()) {
            if !node.rules.is_empty() {
                diagnostic = diagnostic.with("rules", node.rules.join(","));
            }
        }
        self.push_diagnostic(diagnostic);
    }

    /// Right facts of a beta node satisfying `conditions` for one token.
    fn matching_facts(
        &self,
        id: NodeId,
        token: TokenId,
        variable: &str,
        conditions: &[Expr],
        right: impl Iterator<Item = FactKey>,
    ) -> Result<BTreeSet<FactKey>> {
        let mut matched = BTreeSet::new();
        let mut bindings = self.bind(self.token(token)?)?;
        for key in right {
            bindings.bind_fact(variable, self.fact(key)?);
            if self.holds(id, conditions, &bindings) {
                matched.insert(key);
            }
            bindings.pop_fact();
        }
        Ok(matched)
    }

    /// Left tokens of a beta node satisfying `conditions` with a new fact.
    fn matching_tokens(
        &self,
        id: NodeId,
        key: FactKey,
        variable: &str,
        conditions: &[Expr],
        left: impl Iterator<Item = TokenId>,
        distinct: bool,
    ) -> Result<Vec<TokenId>> {
        let fact = self.fact(key)?;
        let mut matched = Vec::new();
        for candidate in left {
            let token = self.token(candidate)?;
            if distinct && token.references(key) {
                continue;
            }
            let bindings = self.bind(token)?.with_fact(variable, fact);
            if self.holds(id, conditions, &bindings) {
                matched.push(candidate);
            }
        }
        Ok(matched)
    }

    // =========================================================================
    // Join
    // =========================================================================

    fn join_left(&mut self, id: NodeId, token: TokenId) -> Result<()> {
        let matches = {
            let NodeKind::Join(join) = &self.nodes[id.index()].kind else {
                return Err(mismatch(id, "join"));
            };
            let left = self.token(token)?;
            let distinct = join.right.keys().filter(|key| !left.references(*key));
            self.matching_facts(id, token, &join.variable, &join.conditions, distinct)?
        };
        if let NodeKind::Join(join) = &mut self.nodes[id.index()].kind {
            join.left.insert(token, ());
        }
        for key in matches {
            self.emit(id, token, Some(key), None)?;
        }
        Ok(())
    }

    fn join_right(&mut self, id: NodeId, key: FactKey) -> Result<()> {
        let matches = {
            let NodeKind::Join(join) = &self.nodes[id.index()].kind else {
                return Err(mismatch(id, "join"));
            };
            self.matching_tokens(id, key, &join.variable, &join.conditions, join.left.keys(), true)?
        };
        if let NodeKind::Join(join) = &mut self.nodes[id.index()].kind {
            join.right.insert(key, ());
        }
        for token in matches {
            self.emit(id, token, Some(key), None)?;
        }
        Ok(())
    }

    // =========================================================================
    // Not / Exists
    // =========================================================================

    fn quantified(&self, id: NodeId) -> Result<(bool, &QuantifiedNode)> {
        match self.nodes.get(id.index()).map(Node::kind) {
            Some(NodeKind::Not(q)) => Ok((true, q)),
            Some(NodeKind::Exists(q)) => Ok((false, q)),
            _ => Err(mismatch(id, "not or exists")),
        }
    }

    fn quantified_mut(&mut self, id: NodeId) -> Result<&mut QuantifiedNode> {
        match self.nodes.get_mut(id.index()).map(|node| &mut node.kind) {
            Some(NodeKind::Not(q) | NodeKind::Exists(q)) => Ok(q),
            _ => Err(mismatch(id, "not or exists")),
        }
    }

    fn quantified_left(&mut self, id: NodeId, token: TokenId) -> Result<()> {
        let matched = {
            let (_, q) = self.quantified(id)?;
            self.matching_facts(id, token, &q.variable, &q.conditions, q.right.keys())?
        };
        self.quantified_mut(id)?
            .left
            .insert(token, QuantifiedState { matched, output: None });
        self.refresh(id, token)
    }

    fn quantified_right(&mut self, id: NodeId, key: FactKey) -> Result<()> {
        let matches = {
            let (_, q) = self.quantified(id)?;
            self.matching_tokens(id, key, &q.variable, &q.conditions, q.left.keys(), false)?
        };
        let q = self.quantified_mut(id)?;
        q.right.insert(key, ());
        for token in &matches {
            if let Some(state) = q.left.get_mut(token) {
                state.matched.insert(key);
            }
        }
        for token in matches {
            self.refresh(id, token)?;
        }
        Ok(())
    }

    /// Brings a token's output in line with its match count: emits a fresh
    /// child when it should pass and has none, retracts it in the opposite
    /// case.
    fn refresh(&mut self, id: NodeId, token: TokenId) -> Result<()> {
        let (should_pass, output) = {
            let (negated, q) = self.quantified(id)?;
            let state = q
                .left
                .get(&token)
                .ok_or_else(|| stateless(id, token))?;
            (passes(negated, state.matched.len()), state.output)
        };
        match (should_pass, output) {
            (true, None) => {
                let child = self
                    .tokens
                    .derive(id, token, None, None)
                    .ok_or_else(|| orphaned(id, token))?;
                self.counters.tokens_created += 1;
                if let Some(state) = self.quantified_mut(id)?.left.get_mut(&token) {
                    state.output = Some(child);
                }
                for next in self.children(id) {
                    self.left_activate(next, child)?;
                }
                Ok(())
            }
            (false, Some(child)) => {
                if let Some(state) = self.quantified_mut(id)?.left.get_mut(&token) {
                    state.output = None;
                }
                self.remove_token_tree(child)
            }
            _ => Ok(()),
        }
    }

    // =========================================================================
    // Accumulate
    // =========================================================================

    fn accumulator(&self, id: NodeId) -> Result<&AccumulateNode> {
        match self.nodes.get(id.index()).map(Node::kind) {
            Some(NodeKind::Accumulate(acc)) => Ok(acc),
            _ => Err(mismatch(id, "accumulate")),
        }
    }

    fn accumulator_mut(&mut self, id: NodeId) -> Result<&mut AccumulateNode> {
        match self.nodes.get_mut(id.index()).map(|node| &mut node.kind) {
            Some(NodeKind::Accumulate(acc)) => Ok(acc),
            _ => Err(mismatch(id, "accumulate")),
        }
    }

    fn accumulate_left(&mut self, id: NodeId, token: TokenId) -> Result<()> {
        let matched = {
            let acc = self.accumulator(id)?;
            self.matching_facts(id, token, &acc.variable, &acc.conditions, acc.right.keys())?
        };
        self.accumulator_mut(id)?
            .left
            .insert(token, AccumulateState { matched, output: None });
        self.recompute(id, token)
    }

    fn accumulate_right(&mut self, id: NodeId, key: FactKey) -> Result<()> {
        let matches = {
            let acc = self.accumulator(id)?;
            self.matching_tokens(id, key, &acc.variable, &acc.conditions, acc.left.keys(), false)?
        };
        let acc = self.accumulator_mut(id)?;
        acc.right.insert(key, ());
        for token in &matches {
            if let Some(state) = acc.left.get_mut(token) {
                state.matched.insert(key);
            }
        }
        for token in matches {
            self.recompute(id, token)?;
        }
        Ok(())
    }

    /// Retracts a token's aggregate child and emits a fresh one.
    fn recompute(&mut self, id: NodeId, token: TokenId) -> Result<()> {
        let previous = self
            .accumulator_mut(id)?
            .left
            .get_mut(&token)
            .and_then(|state| state.output.take());
        if let Some(previous) = previous {
            self.remove_token_tree(previous)?;
        }

        let (name, aggregate) = {
            let acc = self.accumulator(id)?;
            let state = acc
                .left
                .get(&token)
                .ok_or_else(|| stateless(id, token))?;
            let mut values = Vec::with_capacity(state.matched.len());
            for key in &state.matched {
                let fact = self.fact(*key)?;
                values.push(match &acc.field {
                    Some(field) => fact.resolve(field).unwrap_or(Value::Null),
                    None => Value::Null,
                });
            }
            (Arc::clone(&acc.name), Aggregate::compute(acc.function, &values))
        };

        for (code, message) in aggregate.notes {
            let severity = if code == DiagnosticCode::AggregateOverflow {
                Severity::Error
            } else {
                Severity::Warn
            };
            self.push_diagnostic(
                Diagnostic::new(severity, code, message)
                    .with("node", id)
                    .with("aggregate", &name),
            );
        }

        let Some(value) = aggregate.value else {
            return Ok(());
        };
        let child = self
            .tokens
            .derive(id, token, None, Some((name, value)))
            .ok_or_else(|| orphaned(id, token))?;
        self.counters.tokens_created += 1;
        if let Some(state) = self.accumulator_mut(id)?.left.get_mut(&token) {
            state.output = Some(child);
        }
        for next in self.children(id) {
            self.left_activate(next, child)?;
        }
        Ok(())
    }

    // =========================================================================
    // Terminal
    // =========================================================================

    fn terminal_left(&mut self, id: NodeId, token: TokenId) -> Result<()> {
        let activation = {
            let NodeKind::Terminal(terminal) = &self.nodes[id.index()].kind else {
                return Err(mismatch(id, "terminal"));
            };
            let matched = self.token(token)?;
            let bindings = self.bind(matched)?;
            if !self.holds(id, &terminal.guards, &bindings) {
                return Ok(());
            }
            let arguments = terminal
                .action
                .args
                .iter()
                .map(|arg| {
                    self.evaluator.evaluate(arg, &bindings).unwrap_or_else(|err| {
                        self.report(id, &err);
                        Value::Null
                    })
                })
                .collect();
            let facts = matched
                .facts()
                .iter()
                .map(|key| self.fact(*key).map(|fact| fact.id().clone()))
                .collect::<Result<Vec<_>>>()?;
            Activation {
                rule: Arc::clone(&terminal.rule),
                action: Arc::clone(&terminal.action.name),
                token,
                facts,
                arguments,
            }
        };
        tracing::trace!(rule = %activation.rule, %activation, "activation added");
        if let NodeKind::Terminal(terminal) = &mut self.nodes[id.index()].kind {
            terminal.memory.insert(token, activation.clone());
        }
        self.counters.activations_added += 1;
        self.events.push(ActivationEvent::Added(activation));
        Ok(())
    }

    // =========================================================================
    // Retraction
    // =========================================================================

    /// Removes a token and everything derived from it from every memory.
    fn remove_token_tree(&mut self, root: TokenId) -> Result<()> {
        for id in self.tokens.subtree_post_order(root) {
            let producer = self.token(id)?.node();
            for child in self.children(producer) {
                self.forget(child, id);
            }
            self.tokens.remove(id);
            self.counters.tokens_removed += 1;
        }
        Ok(())
    }

    fn forget(&mut self, node: NodeId, token: TokenId) {
        match &mut self.nodes[node.index()].kind {
            NodeKind::Join(join) => {
                join.left.remove(&token);
            }
            NodeKind::Not(q) | NodeKind::Exists(q) => {
                q.left.remove(&token);
            }
            NodeKind::Accumulate(acc) => {
                acc.left.remove(&token);
            }
            NodeKind::Terminal(terminal) => {
                if let Some(activation) = terminal.memory.remove(&token) {
                    tracing::trace!(rule = %activation.rule, %activation, "activation removed");
                    self.counters.activations_removed += 1;
                    self.events.push(ActivationEvent::Removed(activation));
                }
            }
            NodeKind::Root(_) | NodeKind::Type(_) | NodeKind::Alpha(_) => {}
        }
    }

    /// Retracts a fact and everything that depended on it.
    ///
    /// Only the alpha nodes under the fact's type node and the beta nodes
    /// they feed are visited.
    pub(crate) fn retract_fact(&mut self, id: &str) -> Result<Arc<Fact>> {
        let key = self.registry.key_of(id).ok_or_else(|| Error::not_found(id))?;
        let type_name = self.fact(key)?.type_name().to_owned();
        tracing::trace!(fact = id, %key, "retracting fact");

        for token in self.tokens.joined_with(key) {
            if self.tokens.get(token).is_some() {
                self.remove_token_tree(token)?;
            }
        }

        let mut changed = Vec::new();
        let alphas = self.type_node(&type_name).map(|node| self.children(node)).unwrap_or_default();
        for alpha in alphas {
            let held = match &mut self.nodes[alpha.index()].kind {
                NodeKind::Alpha(node) => node.memory.remove(&key).is_some(),
                _ => return Err(mismatch(alpha, "alpha")),
            };
            if !held {
                continue;
            }
            for beta in self.children(alpha) {
                self.forget_right(beta, key, &mut changed);
            }
        }

        for (node, token) in changed {
            let followup = match &self.nodes[node.index()].kind {
                NodeKind::Not(q) | NodeKind::Exists(q) if q.left.contains(&token) => {
                    Followup::Refresh
                }
                NodeKind::Accumulate(acc) if acc.left.contains(&token) => Followup::Recompute,
                _ => Followup::Skip,
            };
            match followup {
                Followup::Refresh => self.refresh(node, token)?,
                Followup::Recompute => self.recompute(node, token)?,
                Followup::Skip => {}
            }
        }

        let (_, fact) = self.registry.remove(id)?;
        self.counters.facts_retracted += 1;
        Ok(fact)
    }

    /// Drops a fact from one beta node's right memory and match sets,
    /// recording the left tokens whose match set shrank.
    fn forget_right(&mut self, beta: NodeId, key: FactKey, changed: &mut Vec<(NodeId, TokenId)>) {
        match &mut self.nodes[beta.index()].kind {
            NodeKind::Join(join) => {
                join.right.remove(&key);
            }
            NodeKind::Not(q) | NodeKind::Exists(q) => {
                if q.right.remove(&key).is_some() {
                    for (token, state) in q.left.iter_mut() {
                        if state.matched.remove(&key) {
                            changed.push((beta, token));
                        }
                    }
                }
            }
            NodeKind::Accumulate(acc) => {
                if acc.right.remove(&key).is_some() {
                    for (token, state) in acc.left.iter_mut() {
                        if state.matched.remove(&key) {
                            changed.push((beta, token));
                        }
                    }
                }
            }
            NodeKind::Root(_) | NodeKind::Type(_) | NodeKind::Alpha(_) | NodeKind::Terminal(_) => {}
        }
    }
}

fn mismatch(id: NodeId, expected: &str) -> Error {
    Error::internal(format!("node {id} is not a {expected} node"))
}

fn orphaned(id: NodeId, parent: TokenId) -> Error {
    Error::internal(format!("node {id} derived from missing token {parent}"))
}

fn stateless(id: NodeId, token: TokenId) -> Error {
    Error::internal(format!("node {id} has no state for token {token}"))
}
