//! Compiles a [`RuleSet`] into network nodes.
//!
//! Each rule becomes a left-deep chain of beta nodes fed by the root's
//! initial token:
//!
//! ```text
//! root ─ join(p) ─ join(o) ─ not(x) ─ terminal
//!          │         │        │
//!       alpha(p)  alpha(o)  alpha(x)
//! ```
//!
//! Conditions are split by the names they need. A condition over exactly
//! one pattern variable becomes part of that pattern's alpha predicate; any
//! other condition attaches to the first join at or after the point where
//! all of its names are bound, or to the terminal when no join follows.
//! `NOT`, `EXISTS` and accumulate clauses are inserted at the earliest point
//! where the outer names they mention are bound, keeping declared order.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use trellis_foundation::{Error, ErrorKind, FieldKind, Result, TypeDecl, TypeSchema, ValueKind};
use trellis_language::{Accumulation, Expr, Rule, RuleSet, SubPattern, TypedVariable};

use crate::node::{
    AccumulateNode, AlphaNode, JoinNode, Node, NodeId, NodeKind, QuantifiedNode, RootNode,
    TerminalNode, TypeNode,
};

pub(crate) const ROOT: NodeId = NodeId::new(0);

// =============================================================================
// Plans
// =============================================================================

/// Where one condition of a rule ended up.
#[derive(Clone, Debug, PartialEq)]
pub struct ConditionPlacement {
    /// The condition.
    pub expr: Expr,
    /// Number of patterns bound when the condition becomes evaluable.
    pub min_prefix: usize,
    /// Alpha, join or terminal node evaluating it.
    pub target: NodeId,
}

/// The compiled form of one rule.
#[derive(Clone, Debug, PartialEq)]
pub struct RulePlan {
    /// Rule name.
    pub rule: Arc<str>,
    /// Placement of every rule-level condition.
    pub placements: Vec<ConditionPlacement>,
    /// Every node the rule uses, in order of first use.
    pub nodes: Vec<NodeId>,
    /// The rule's terminal.
    pub terminal: NodeId,
}

// =============================================================================
// Analysis
// =============================================================================

enum Step<'r> {
    Join {
        variable: &'r TypedVariable,
        predicate: Vec<Expr>,
    },
    Quantified {
        negated: bool,
        variable: &'r TypedVariable,
        predicate: Vec<Expr>,
        conditions: Vec<Expr>,
    },
    Accumulate {
        accumulation: &'r Accumulation,
        predicate: Vec<Expr>,
        conditions: Vec<Expr>,
    },
}

impl Step<'_> {
    fn binds(&self) -> Option<&Arc<str>> {
        match self {
            Self::Join { variable, .. } => Some(&variable.name),
            Self::Accumulate { accumulation, .. } => Some(&accumulation.name),
            Self::Quantified { .. } => None,
        }
    }

    const fn is_join(&self) -> bool {
        matches!(self, Self::Join { .. })
    }
}

enum Target {
    Alpha(usize),
    Step(usize),
    Terminal,
}

struct Analysis<'r> {
    steps: Vec<Step<'r>>,
    join_conditions: Vec<Vec<Expr>>,
    guards: Vec<Expr>,
    placements: Vec<(Expr, usize, Target)>,
}

/// Checks a rule against the schema and decides where everything goes.
struct Analyzer<'a, 'r> {
    schema: &'a TypeSchema,
    rule: &'r Rule,
    claimed: BTreeSet<Arc<str>>,
    patterns: BTreeMap<Arc<str>, &'a TypeDecl>,
    aggregates: BTreeSet<Arc<str>>,
}

impl<'a, 'r> Analyzer<'a, 'r> {
    fn new(schema: &'a TypeSchema, rule: &'r Rule) -> Self {
        Self {
            schema,
            rule,
            claimed: BTreeSet::new(),
            patterns: BTreeMap::new(),
            aggregates: BTreeSet::new(),
        }
    }

    fn claim(&mut self, name: &Arc<str>) -> Result<()> {
        if self.claimed.insert(Arc::clone(name)) {
            Ok(())
        } else {
            Err(Error::new(ErrorKind::DuplicateVariable {
                rule: self.rule.name.to_string(),
                variable: name.to_string(),
            }))
        }
    }

    fn declared(&self, variable: &TypedVariable) -> Result<&'a TypeDecl> {
        self.schema
            .require(&variable.type_name)
            .map_err(|e| e.in_source(self.rule.name.to_string()))
    }

    fn check(
        &self,
        expr: &Expr,
        facts: &BTreeMap<Arc<str>, &TypeDecl>,
        values: &BTreeSet<Arc<str>>,
    ) -> Result<()> {
        for var in expr.fact_variables() {
            let Some(decl) = facts.get(&var) else {
                return Err(Error::unresolved_variable(&*self.rule.name, &*var));
            };
            for field in expr.fields_of(&var) {
                if !decl.resolves(&field) {
                    return Err(Error::unknown_field(&*decl.name, &*field)
                        .in_source(self.rule.name.to_string()));
                }
            }
        }
        for name in expr.value_names() {
            if !values.contains(&name) {
                return Err(Error::unresolved_variable(&*self.rule.name, &*name));
            }
        }
        Ok(())
    }

    fn check_accumulation(&self, accumulation: &Accumulation, decl: &TypeDecl) -> Result<()> {
        let Some(field) = &accumulation.field else {
            if accumulation.function.needs_field() {
                return Err(Error::unknown_field(&*decl.name, accumulation.function.name())
                    .in_source(self.rule.name.to_string()));
            }
            return Ok(());
        };
        if !decl.resolves(field) {
            return Err(
                Error::unknown_field(&*decl.name, &**field).in_source(self.rule.name.to_string())
            );
        }
        if accumulation.function.needs_numeric() {
            let actual = decl
                .field(field)
                .map_or(ValueKind::String, |f| f.kind.value_kind());
            if !matches!(actual, ValueKind::Int | ValueKind::Float) {
                return Err(Error::field_type_mismatch(
                    &*decl.name,
                    &**field,
                    FieldKind::Float,
                    actual,
                )
                .in_source(self.rule.name.to_string()));
            }
        }
        Ok(())
    }

    fn analyze(mut self) -> Result<Analysis<'r>> {
        let rule = self.rule;
        for pattern in &rule.patterns {
            let decl = self.declared(pattern)?;
            self.claim(&pattern.name)?;
            self.patterns.insert(Arc::clone(&pattern.name), decl);
        }

        // Sub-patterns see every pattern variable, their own variable and
        // the aggregates declared before them.
        let mut conditions = rule.conditions.clone();
        let mut pending = VecDeque::new();
        for sub in &rule.sub_patterns {
            let mut facts = self.patterns.clone();
            let own = match sub {
                SubPattern::Not(q) | SubPattern::Exists(q) => match &q.variable {
                    Some(variable) => Some((variable, self.declared(variable)?)),
                    None => None,
                },
                SubPattern::Accumulate(acc) => {
                    let decl = self.declared(&acc.variable)?;
                    self.check_accumulation(acc, decl)?;
                    Some((&acc.variable, decl))
                }
            };
            if let Some((variable, decl)) = own {
                self.claim(&variable.name)?;
                facts.insert(Arc::clone(&variable.name), decl);
            }
            for condition in sub.conditions() {
                self.check(condition, &facts, &self.aggregates)?;
            }
            match sub {
                SubPattern::Not(q) if q.variable.is_none() => {
                    conditions.push(Expr::negation(conjunction(&q.conditions)));
                }
                SubPattern::Exists(q) if q.variable.is_none() => {
                    conditions.push(conjunction(&q.conditions));
                }
                SubPattern::Accumulate(acc) => {
                    self.claim(&acc.name)?;
                    self.aggregates.insert(Arc::clone(&acc.name));
                    pending.push_back(sub);
                }
                _ => pending.push_back(sub),
            }
        }
        for expr in conditions.iter().chain(&rule.action.args) {
            self.check(expr, &self.patterns, &self.aggregates)?;
        }

        let steps = order_steps(rule, pending);
        Ok(place_conditions(steps, conditions))
    }
}

fn conjunction(conditions: &[Expr]) -> Expr {
    let mut iter = conditions.iter().cloned();
    match iter.next() {
        Some(first) => iter.fold(first, |all, next| all.and(next)),
        None => Expr::lit(true),
    }
}

/// Names a sub-pattern needs from the enclosing chain.
fn outer_names(sub: &SubPattern) -> BTreeSet<Arc<str>> {
    let own = sub.variable().map(|v| &v.name);
    sub.conditions()
        .iter()
        .flat_map(Expr::free_names)
        .filter(|name| Some(name) != own)
        .collect()
}

fn split_predicate(variable: &Arc<str>, conditions: &[Expr]) -> (Vec<Expr>, Vec<Expr>) {
    conditions.iter().cloned().partition(|c| {
        let names = c.free_names();
        names.len() == 1 && names.contains(variable)
    })
}

fn sub_step(sub: &SubPattern) -> Option<Step<'_>> {
    match sub {
        SubPattern::Not(q) | SubPattern::Exists(q) => {
            let variable = q.variable.as_ref()?;
            let (predicate, conditions) = split_predicate(&variable.name, &q.conditions);
            Some(Step::Quantified {
                negated: matches!(sub, SubPattern::Not(_)),
                variable,
                predicate,
                conditions,
            })
        }
        SubPattern::Accumulate(acc) => {
            let (predicate, conditions) = split_predicate(&acc.variable.name, &acc.conditions);
            Some(Step::Accumulate {
                accumulation: acc,
                predicate,
                conditions,
            })
        }
    }
}

fn order_steps<'r>(rule: &'r Rule, mut pending: VecDeque<&'r SubPattern>) -> Vec<Step<'r>> {
    let mut steps = Vec::new();
    let mut bound = BTreeSet::new();
    let flush = |steps: &mut Vec<Step<'r>>,
                 bound: &mut BTreeSet<Arc<str>>,
                 pending: &mut VecDeque<&'r SubPattern>,
                 all: bool| {
        while let Some(&sub) = pending.front() {
            if !all && !outer_names(sub).is_subset(bound) {
                break;
            }
            if let Some(step) = sub_step(sub) {
                if let Some(name) = step.binds() {
                    bound.insert(Arc::clone(name));
                }
                steps.push(step);
            }
            pending.pop_front();
        }
    };
    flush(&mut steps, &mut bound, &mut pending, false);
    for pattern in &rule.patterns {
        steps.push(Step::Join {
            variable: pattern,
            predicate: Vec::new(),
        });
        bound.insert(Arc::clone(&pattern.name));
        flush(&mut steps, &mut bound, &mut pending, false);
    }
    flush(&mut steps, &mut bound, &mut pending, true);
    steps
}

fn place_conditions<'r>(mut steps: Vec<Step<'r>>, conditions: Vec<Expr>) -> Analysis<'r> {
    let mut join_conditions = vec![Vec::new(); steps.len()];
    let mut guards = Vec::new();
    let mut placements = Vec::new();

    for condition in conditions {
        let names = condition.free_names();

        if names.len() == 1 {
            let alpha = steps.iter().position(|step| {
                matches!(step, Step::Join { variable, .. } if names.contains(&variable.name))
            });
            if let Some(index) = alpha {
                let prefix = steps[..=index].iter().filter(|s| s.is_join()).count();
                if let Step::Join { predicate, .. } = &mut steps[index] {
                    predicate.push(condition.clone());
                }
                placements.push((condition, prefix, Target::Alpha(index)));
                continue;
            }
        }

        let mut bound = BTreeSet::new();
        let mut ready = None;
        if !names.is_empty() {
            for (index, step) in steps.iter().enumerate() {
                if let Some(name) = step.binds() {
                    bound.insert(Arc::clone(name));
                }
                if names.is_subset(&bound) {
                    ready = Some(index);
                    break;
                }
            }
        }
        let prefix = ready.map_or(0, |index| {
            steps[..=index].iter().filter(|s| s.is_join()).count()
        });
        let start = ready.unwrap_or(0);
        match steps.iter().skip(start).position(Step::is_join) {
            Some(offset) => {
                join_conditions[start + offset].push(condition.clone());
                placements.push((condition, prefix, Target::Step(start + offset)));
            }
            None => {
                guards.push(condition.clone());
                placements.push((condition, prefix, Target::Terminal));
            }
        }
    }

    Analysis {
        steps,
        join_conditions,
        guards,
        placements,
    }
}

fn sorted(mut conditions: Vec<Expr>) -> Vec<Expr> {
    conditions.sort_by_cached_key(Expr::canonical);
    conditions
}

fn canonical_list(conditions: &[Expr]) -> String {
    conditions
        .iter()
        .map(Expr::canonical)
        .collect::<Vec<_>>()
        .join(" && ")
}

// =============================================================================
// Builder
// =============================================================================

/// Incrementally compiles rules into a node arena.
pub struct NetworkBuilder<'a> {
    schema: &'a TypeSchema,
    sharing: bool,
    nodes: Vec<Node>,
    shared: HashMap<String, NodeId>,
    plans: Vec<RulePlan>,
}

impl<'a> NetworkBuilder<'a> {
    /// Creates a builder holding only the root node.
    #[must_use]
    pub fn new(schema: &'a TypeSchema) -> Self {
        let root = Node::new(ROOT, NodeKind::Root(RootNode::default()), Arc::from(Vec::new()));
        Self {
            schema,
            sharing: true,
            nodes: vec![root],
            shared: HashMap::new(),
            plans: Vec::new(),
        }
    }

    /// Builder method to turn node sharing on or off.
    #[must_use]
    pub fn sharing(mut self, enabled: bool) -> Self {
        self.sharing = enabled;
        self
    }

    /// Returns the plans compiled so far.
    #[must_use]
    pub fn plans(&self) -> &[RulePlan] {
        &self.plans
    }

    /// Returns the nodes created so far.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Compiles every rule in order.
    ///
    /// # Errors
    /// The first error from [`add_rule`](Self::add_rule).
    pub fn add_rules(&mut self, rules: &RuleSet) -> Result<()> {
        for rule in rules {
            self.add_rule(rule)?;
        }
        Ok(())
    }

    /// Compiles one rule.
    ///
    /// Nothing is added to the arena if the rule is rejected.
    ///
    /// # Errors
    /// `DuplicateRule`, `UnknownType`, `UnknownField`, `UnresolvedVariable`,
    /// `DuplicateVariable` or `FieldTypeMismatch`.
    pub fn add_rule(&mut self, rule: &Rule) -> Result<()> {
        if self.plans.iter().any(|plan| plan.rule == rule.name) {
            return Err(Error::new(ErrorKind::DuplicateRule(rule.name.to_string())));
        }
        let analysis = Analyzer::new(self.schema, rule).analyze()?;
        let plan = self.materialize(rule, analysis)?;
        tracing::debug!(
            rule = %plan.rule,
            nodes = plan.nodes.len(),
            conditions = plan.placements.len(),
            "compiled rule"
        );
        self.plans.push(plan);
        Ok(())
    }

    /// Returns the arena and the plans.
    #[must_use]
    pub fn finish(self) -> (Vec<Node>, Vec<RulePlan>) {
        (self.nodes, self.plans)
    }

    fn materialize(&mut self, rule: &Rule, analysis: Analysis<'_>) -> Result<RulePlan> {
        let name = &rule.name;
        let mut used = Vec::new();
        let mut left = ROOT;
        let mut layout: Vec<Arc<str>> = Vec::new();
        let mut alphas = Vec::with_capacity(analysis.steps.len());
        let mut betas = Vec::with_capacity(analysis.steps.len());

        for (index, step) in analysis.steps.iter().enumerate() {
            let (variable, predicate) = match step {
                Step::Join {
                    variable,
                    predicate,
                }
                | Step::Quantified {
                    variable,
                    predicate,
                    ..
                } => (*variable, predicate),
                Step::Accumulate {
                    accumulation,
                    predicate,
                    ..
                } => (&accumulation.variable, predicate),
            };
            let alpha = self.alpha(name, variable, sorted(predicate.clone()), &mut used)?;
            alphas.push(alpha);

            let beta = match step {
                Step::Join { variable, .. } => {
                    let conditions = sorted(analysis.join_conditions[index].clone());
                    layout.push(Arc::clone(&variable.name));
                    let key = format!(
                        "join|{left}|{alpha}|{}|{}",
                        variable.name,
                        canonical_list(&conditions)
                    );
                    let kind = NodeKind::Join(JoinNode::new(Arc::clone(&variable.name), conditions));
                    self.node(name, Some(key), kind, &layout, Some(left), Some(alpha), &mut used)?
                }
                Step::Quantified {
                    negated,
                    variable,
                    conditions,
                    ..
                } => {
                    let conditions = sorted(conditions.clone());
                    let key = format!(
                        "{}|{left}|{alpha}|{}|{}",
                        if *negated { "not" } else { "exists" },
                        variable.name,
                        canonical_list(&conditions)
                    );
                    let node = QuantifiedNode::new(Arc::clone(&variable.name), conditions);
                    let kind = if *negated {
                        NodeKind::Not(node)
                    } else {
                        NodeKind::Exists(node)
                    };
                    self.node(name, Some(key), kind, &layout, Some(left), Some(alpha), &mut used)?
                }
                Step::Accumulate {
                    accumulation,
                    conditions,
                    ..
                } => {
                    let conditions = sorted(conditions.clone());
                    let key = format!(
                        "accumulate|{left}|{alpha}|{}|{}|{}|{}|{}",
                        accumulation.name,
                        accumulation.function,
                        accumulation.variable.name,
                        accumulation.field.as_deref().unwrap_or(""),
                        canonical_list(&conditions)
                    );
                    let kind = NodeKind::Accumulate(AccumulateNode::new(
                        Arc::clone(&accumulation.name),
                        accumulation.function,
                        Arc::clone(&accumulation.variable.name),
                        accumulation.field.clone(),
                        conditions,
                    ));
                    self.node(name, Some(key), kind, &layout, Some(left), Some(alpha), &mut used)?
                }
            };
            betas.push(beta);
            left = beta;
        }

        let kind = NodeKind::Terminal(TerminalNode::new(
            Arc::clone(name),
            rule.action.clone(),
            analysis.guards,
        ));
        let terminal = self.node(name, None, kind, &layout, Some(left), None, &mut used)?;

        let placements = analysis
            .placements
            .into_iter()
            .map(|(expr, min_prefix, target)| ConditionPlacement {
                expr,
                min_prefix,
                target: match target {
                    Target::Alpha(index) => alphas[index],
                    Target::Step(index) => betas[index],
                    Target::Terminal => terminal,
                },
            })
            .collect();

        Ok(RulePlan {
            rule: Arc::clone(name),
            placements,
            nodes: used,
            terminal,
        })
    }

    fn next_id(&self) -> Result<NodeId> {
        u32::try_from(self.nodes.len())
            .map(NodeId::new)
            .map_err(|_| Error::internal("node arena is full"))
    }

    fn claim(&mut self, id: NodeId, rule: &Arc<str>, used: &mut Vec<NodeId>) {
        let node = &mut self.nodes[id.index()];
        if !node.rules.contains(rule) {
            node.rules.push(Arc::clone(rule));
        }
        if !used.contains(&id) {
            used.push(id);
        }
    }

    fn type_node(&mut self, rule: &Arc<str>, type_name: &Arc<str>, used: &mut Vec<NodeId>) -> Result<NodeId> {
        let NodeKind::Root(root) = &self.nodes[ROOT.index()].kind else {
            return Err(Error::internal("node 0 is not the root"));
        };
        if let Some(&id) = root.types.get(type_name) {
            self.claim(id, rule, used);
            return Ok(id);
        }
        let id = self.next_id()?;
        let kind = NodeKind::Type(TypeNode {
            type_name: Arc::clone(type_name),
        });
        self.nodes.push(Node::new(id, kind, Arc::from(Vec::new())));
        if let NodeKind::Root(root) = &mut self.nodes[ROOT.index()].kind {
            root.types.insert(Arc::clone(type_name), id);
        }
        self.claim(id, rule, used);
        Ok(id)
    }

    fn alpha(
        &mut self,
        rule: &Arc<str>,
        variable: &TypedVariable,
        predicate: Vec<Expr>,
        used: &mut Vec<NodeId>,
    ) -> Result<NodeId> {
        let parent = self.type_node(rule, &variable.type_name, used)?;
        let key = format!(
            "alpha|{}|{}|{}",
            variable.type_name,
            variable.name,
            canonical_list(&predicate)
        );
        let kind = NodeKind::Alpha(AlphaNode::new(
            Arc::clone(&variable.type_name),
            Arc::clone(&variable.name),
            predicate,
        ));
        self.node(rule, Some(key), kind, &[], Some(parent), None, used)
    }

    #[allow(clippy::too_many_arguments)]
    fn node(
        &mut self,
        rule: &Arc<str>,
        key: Option<String>,
        kind: NodeKind,
        layout: &[Arc<str>],
        left: Option<NodeId>,
        right: Option<NodeId>,
        used: &mut Vec<NodeId>,
    ) -> Result<NodeId> {
        if self.sharing {
            if let Some(&id) = key.as_ref().and_then(|key| self.shared.get(key)) {
                self.claim(id, rule, used);
                return Ok(id);
            }
        }
        let id = self.next_id()?;
        let mut node = Node::new(id, kind, Arc::from(layout.to_vec()));
        node.left_parent = left;
        node.right_parent = right;
        self.nodes.push(node);
        for parent in left.into_iter().chain(right) {
            self.nodes[parent.index()].children.push(id);
        }
        if let Some(key) = key {
            if self.sharing {
                self.shared.insert(key, id);
            }
        }
        tracing::trace!(node = %id, kind = self.nodes[id.index()].kind().name(), "created node");
        self.claim(id, rule, used);
        Ok(id)
    }
}
