//! Query scopes and the classification of the variables they use.
//!
//! A scope is the root pattern of a query or of a sub-select. Its WHERE clause is the pattern
//! below the scope solution modifiers (projection, ordering, slicing, aggregation).
//! Variables are classified only from the triples owned by the scope itself:
//! nested scopes get their own classification.

use oxrdf::Variable;
use spargebra::algebra::GraphPattern;
use spargebra::term::{NamedNodePattern, TermPattern, TriplePattern};
use std::collections::BTreeSet;
use tracing::{debug, trace};

/// The variables of a scope, grouped by the triple position they appear in.
///
/// Sets are ordered so that everything derived from them is reproducible.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct VariableClassification {
    /// Variables used as triple subjects.
    pub subjects: BTreeSet<Variable>,
    /// Variables used as triple predicates.
    pub predicates: BTreeSet<Variable>,
    /// Variables used as triple objects.
    pub objects: BTreeSet<Variable>,
    /// Variables used as `GRAPH` names.
    pub graphs: BTreeSet<Variable>,
}

impl VariableClassification {
    /// Classifies the variables of a scope WHERE clause.
    ///
    /// `OPTIONAL` and `MINUS` right-hand sides do not contribute.
    /// Nested sub-selects are not entered and `SERVICE` blocks are skipped.
    pub fn of_where_clause(where_clause: &GraphPattern) -> Self {
        let mut classification = Self::default();
        let mut stack = vec![(where_clause, false)];
        while let Some((pattern, skip)) = stack.pop() {
            match pattern {
                GraphPattern::Bgp { patterns } => {
                    if !skip {
                        for triple in patterns {
                            classification.add_triple_pattern(triple);
                        }
                    }
                }
                GraphPattern::Path {
                    subject, object, ..
                } => {
                    if !skip {
                        classification.add_subject(subject);
                        classification.add_object(object);
                    }
                }
                GraphPattern::Join { left, right } | GraphPattern::Union { left, right } => {
                    stack.push((left.as_ref(), skip));
                    stack.push((right.as_ref(), skip));
                }
                #[cfg(feature = "sep-0006")]
                GraphPattern::Lateral { left, right } => {
                    stack.push((left.as_ref(), skip));
                    stack.push((right.as_ref(), skip));
                }
                GraphPattern::LeftJoin { left, right, .. } | GraphPattern::Minus { left, right } => {
                    stack.push((left.as_ref(), skip));
                    stack.push((right.as_ref(), true));
                }
                GraphPattern::Graph { name, inner } => {
                    if let NamedNodePattern::Variable(v) = name {
                        if !skip {
                            classification.graphs.insert(v.clone());
                        }
                    }
                    stack.push((inner.as_ref(), skip));
                }
                GraphPattern::Filter { inner, .. } | GraphPattern::Extend { inner, .. } => {
                    stack.push((inner.as_ref(), skip))
                }
                GraphPattern::Values { .. } => {}
                GraphPattern::Project { .. }
                | GraphPattern::Distinct { .. }
                | GraphPattern::Reduced { .. }
                | GraphPattern::Slice { .. }
                | GraphPattern::OrderBy { .. }
                | GraphPattern::Group { .. } => {
                    trace!("nested scope left to its own classification");
                }
                GraphPattern::Service { name, .. } => {
                    debug!("SERVICE {name} is not supported, its variables are left unguarded");
                }
            }
        }
        classification
    }

    fn add_triple_pattern(&mut self, triple: &TriplePattern) {
        self.add_subject(&triple.subject);
        if let NamedNodePattern::Variable(v) = &triple.predicate {
            self.predicates.insert(v.clone());
        }
        self.add_object(&triple.object);
    }

    fn add_subject(&mut self, subject: &TermPattern) {
        if let TermPattern::Variable(v) = subject {
            self.subjects.insert(v.clone());
        }
    }

    fn add_object(&mut self, object: &TermPattern) {
        if let TermPattern::Variable(v) = object {
            self.objects.insert(v.clone());
        }
    }

    /// Returns `true` if no variable has been classified at all.
    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
            && self.predicates.is_empty()
            && self.objects.is_empty()
            && self.graphs.is_empty()
    }

    /// All the classified variables, whatever their positions.
    pub fn variables(&self) -> BTreeSet<&Variable> {
        self.subjects
            .iter()
            .chain(&self.predicates)
            .chain(&self.objects)
            .chain(&self.graphs)
            .collect()
    }
}

/// Returns `true` if the pattern is the root of a (sub-)select.
pub fn is_scope_root(pattern: &GraphPattern) -> bool {
    matches!(
        pattern,
        GraphPattern::Project { .. }
            | GraphPattern::Distinct { .. }
            | GraphPattern::Reduced { .. }
            | GraphPattern::Slice { .. }
            | GraphPattern::OrderBy { .. }
            | GraphPattern::Group { .. }
    )
}

/// Returns `true` if an aggregation is found below a chain of select expressions, `HAVING` filters
/// and trailing `VALUES`.
fn aggregates_below(mut pattern: &GraphPattern) -> bool {
    loop {
        pattern = match pattern {
            GraphPattern::Group { .. } => return true,
            GraphPattern::Extend { inner, .. } | GraphPattern::Filter { inner, .. } => inner.as_ref(),
            GraphPattern::Join { left, right } if matches!(**right, GraphPattern::Values { .. }) => {
                left.as_ref()
            }
            _ => return false,
        }
    }
}

/// Which part of a pattern is the next step down to the WHERE clause.
enum Step {
    Inner,
    Left,
    GroupInner,
    Stop,
}

// Solution modifiers nest in a fixed order: slice, distinct, project, order, then the aggregation.
// Meeting a modifier out of this order means a nested scope starts.
const SLICE_LEVEL: u8 = 0;
const DISTINCT_LEVEL: u8 = 1;
const PROJECT_LEVEL: u8 = 2;
const ORDER_LEVEL: u8 = 3;
const AGGREGATE_LEVEL: u8 = 4;

fn next_step(pattern: &GraphPattern, min_level: u8) -> (Step, u8) {
    let (step, level) = match pattern {
        GraphPattern::Slice { .. } => (Step::Inner, SLICE_LEVEL),
        GraphPattern::Distinct { .. } | GraphPattern::Reduced { .. } => {
            (Step::Inner, DISTINCT_LEVEL)
        }
        GraphPattern::Project { .. } => (Step::Inner, PROJECT_LEVEL),
        GraphPattern::OrderBy { .. } => (Step::Inner, ORDER_LEVEL),
        GraphPattern::Extend { inner, .. } | GraphPattern::Filter { inner, .. }
            if aggregates_below(inner) =>
        {
            (Step::Inner, AGGREGATE_LEVEL)
        }
        GraphPattern::Join { left, right }
            if matches!(**right, GraphPattern::Values { .. }) && aggregates_below(left) =>
        {
            (Step::Left, AGGREGATE_LEVEL)
        }
        GraphPattern::Group { .. } => (Step::GroupInner, AGGREGATE_LEVEL),
        _ => return (Step::Stop, min_level),
    };
    if level < min_level {
        return (Step::Stop, min_level);
    }
    // Only the aggregation chain may repeat its level
    let next_level = if level == AGGREGATE_LEVEL {
        level
    } else {
        level + 1
    };
    (step, next_level)
}

/// Returns the WHERE clause of the scope rooted at `scope`.
///
/// If the scope aggregates, the WHERE clause is the pattern below the grouping
/// and below the bindings of the `GROUP BY` expressions.
pub fn where_clause_mut(scope: &mut GraphPattern) -> &mut GraphPattern {
    descend_mut(scope, SLICE_LEVEL)
}

fn descend_mut(pattern: &mut GraphPattern, min_level: u8) -> &mut GraphPattern {
    let (step, level) = next_step(pattern, min_level);
    match step {
        Step::Stop => pattern,
        Step::Inner => match pattern {
            GraphPattern::Slice { inner, .. }
            | GraphPattern::Distinct { inner }
            | GraphPattern::Reduced { inner }
            | GraphPattern::Project { inner, .. }
            | GraphPattern::OrderBy { inner, .. }
            | GraphPattern::Extend { inner, .. }
            | GraphPattern::Filter { inner, .. } => descend_mut(inner, level),
            _ => pattern,
        },
        Step::Left => match pattern {
            GraphPattern::Join { left, .. } => descend_mut(left, level),
            _ => pattern,
        },
        Step::GroupInner => match pattern {
            GraphPattern::Group { inner, .. } => below_extends_mut(inner),
            _ => pattern,
        },
    }
}

fn below_extends_mut(pattern: &mut GraphPattern) -> &mut GraphPattern {
    match pattern {
        GraphPattern::Extend { inner, .. } => below_extends_mut(inner),
        _ => pattern,
    }
}

/// Returns the roots of the scopes directly nested in a WHERE clause.
///
/// Sub-selects inside `OPTIONAL`, `MINUS`, `UNION` and `GRAPH` blocks are found too.
/// `SERVICE` blocks and `EXISTS` expressions are not entered.
pub fn nested_scopes_mut(where_clause: &mut GraphPattern) -> Vec<&mut GraphPattern> {
    let mut scopes = Vec::new();
    let mut stack = vec![where_clause];
    while let Some(pattern) = stack.pop() {
        if is_scope_root(pattern) {
            scopes.push(pattern);
            continue;
        }
        match pattern {
            GraphPattern::Join { left, right }
            | GraphPattern::Union { left, right }
            | GraphPattern::LeftJoin { left, right, .. }
            | GraphPattern::Minus { left, right } => {
                stack.push(left);
                stack.push(right);
            }
            #[cfg(feature = "sep-0006")]
            GraphPattern::Lateral { left, right } => {
                stack.push(left);
                stack.push(right);
            }
            GraphPattern::Graph { inner, .. }
            | GraphPattern::Filter { inner, .. }
            | GraphPattern::Extend { inner, .. } => stack.push(inner),
            GraphPattern::Bgp { .. }
            | GraphPattern::Path { .. }
            | GraphPattern::Values { .. }
            | GraphPattern::Service { .. }
            | GraphPattern::Project { .. }
            | GraphPattern::Distinct { .. }
            | GraphPattern::Reduced { .. }
            | GraphPattern::Slice { .. }
            | GraphPattern::OrderBy { .. }
            | GraphPattern::Group { .. } => {}
        }
    }
    // The stack pops the right-hand side first
    scopes.reverse();
    scopes
}
