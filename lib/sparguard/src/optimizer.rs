//! Compaction of constraint clause-groups.
//!
//! Two clause-groups are merged when they have the same shape and differ on at most one value.
//! The merged group accepts the union of the values at that place, so it matches exactly what
//! the two groups matched. Nothing is ever broadened.

use crate::constraint::{Constraint, ConstraintGroup, ConstraintValue};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, trace};

/// How the clause-groups are merged.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default, Hash)]
pub enum Strategy {
    /// Collapses the common single clause shapes (`{parent: X}`, `{binds: {role: X}}`,
    /// `{connector: C, binds: {role: X}}`...) by attribute before generalizing what is left.
    #[default]
    Bucketed,
    /// Sorts the groups so that similar shapes are next to each other and greedily merges them.
    Generalize,
}

impl Strategy {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bucketed => "bucketed",
            Self::Generalize => "generalize",
        }
    }
}

impl fmt::Display for Strategy {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = StrategyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bucketed" => Ok(Self::Bucketed),
            "generalize" => Ok(Self::Generalize),
            _ => Err(StrategyParseError(s.to_owned())),
        }
    }
}

/// Error returned when parsing an unknown [`Strategy`] name.
#[derive(Debug, thiserror::Error)]
#[error("Unknown optimization strategy {0}, expecting bucketed or generalize")]
pub struct StrategyParseError(String);

/// What [`ConstraintOptimizer::optimize_with_report`] did.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub struct OptimizerReport {
    pub input_groups: usize,
    pub output_groups: usize,
    /// Number of groups merged into another one.
    pub merges: usize,
    /// Number of malformed groups copied to the output as they are.
    pub passed_through: usize,
}

/// Compacts a disjunction of clause-groups into an equivalent, smaller one.
///
/// The output does not depend on the order of the input groups.
///
/// ```
/// use sparguard::{Constraint, ConstraintOptimizer, ConstraintValue};
///
/// let groups = ["A", "B", "C"].map(|parent| vec![Constraint::new().with("parent", parent)]);
/// let optimized = ConstraintOptimizer::new().optimize(&groups);
/// assert_eq!(
///     optimized,
///     [[Constraint::new().with(
///         "parent",
///         ConstraintValue::Wildcard(vec!["A".into(), "B".into(), "C".into()])
///     )]]
/// );
/// ```
#[must_use]
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstraintOptimizer {
    strategy: Strategy,
}

impl ConstraintOptimizer {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    #[inline]
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Returns the optimized clause-groups.
    pub fn optimize(&self, groups: &[ConstraintGroup]) -> Vec<ConstraintGroup> {
        self.optimize_with_report(groups).0
    }

    /// Returns the optimized clause-groups and what has been done to get them.
    pub fn optimize_with_report(
        &self,
        groups: &[ConstraintGroup],
    ) -> (Vec<ConstraintGroup>, OptimizerReport) {
        let mut report = OptimizerReport {
            input_groups: groups.len(),
            ..OptimizerReport::default()
        };
        let mut canonical = Vec::with_capacity(groups.len());
        let mut passed_through = Vec::new();
        for group in groups {
            if let Some(group) = Group::from_constraints(group) {
                canonical.push(group);
            } else {
                debug!("malformed clause-group kept as it is: {group:?}");
                passed_through.push(group.clone());
            }
        }
        report.passed_through = passed_through.len();

        if self.strategy == Strategy::Bucketed {
            canonical = bucket(canonical, &mut report.merges);
        }
        let generalized = generalize(canonical, &mut report.merges);

        let mut output = generalized
            .into_iter()
            .map(Group::into_constraints)
            .collect::<Vec<_>>();
        passed_through.sort();
        output.extend(passed_through);
        report.output_groups = output.len();
        debug!(
            "{} clause-groups compacted into {} with the {} strategy",
            report.input_groups, report.output_groups, self.strategy
        );
        (output, report)
    }
}

/// The place of a value in a clause: an attribute, or a sub-attribute of a nested value.
#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Clone, Hash)]
struct Path {
    attribute: String,
    role: Option<String>,
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.role {
            Some(role) => write!(f, "{}.{role}", self.attribute),
            None => f.write_str(&self.attribute),
        }
    }
}

/// A constraint where every value is a set of accepted values.
type Clause = BTreeMap<Path, BTreeSet<String>>;

/// A clause-group in canonical form: sorted clauses without duplicates.
#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Clone)]
struct Group {
    clauses: Vec<Clause>,
}

impl Group {
    fn from_constraints(constraints: &[Constraint]) -> Option<Self> {
        let clauses = constraints
            .iter()
            .map(clause_from_constraint)
            .collect::<Option<Vec<_>>>()?;
        Some(Self::new(clauses))
    }

    fn new(mut clauses: Vec<Clause>) -> Self {
        clauses.sort();
        clauses.dedup();
        Self { clauses }
    }

    fn into_constraints(self) -> ConstraintGroup {
        self.clauses.into_iter().map(clause_into_constraint).collect()
    }

    /// The paths of every clause: groups can only be merged if they have the same shape.
    fn shape(&self) -> Vec<Vec<Path>> {
        self.clauses
            .iter()
            .map(|clause| clause.keys().cloned().collect())
            .collect()
    }

    /// The `path=value` keys of the group, one per accepted value.
    fn hashes(&self) -> Vec<String> {
        let mut hashes = self
            .clauses
            .iter()
            .flat_map(|clause| {
                clause
                    .iter()
                    .flat_map(|(path, values)| values.iter().map(move |v| format!("{path}={v}")))
            })
            .collect::<Vec<_>>();
        hashes.sort();
        hashes
    }

    /// Merges `other` into `self` if they differ on at most one value.
    ///
    /// Both must have the same shape.
    fn absorb(&mut self, other: &Self) -> bool {
        let mut difference = None;
        for (i, (clause, other_clause)) in self.clauses.iter().zip(&other.clauses).enumerate() {
            for ((path, values), other_values) in clause.iter().zip(other_clause.values()) {
                if values != other_values {
                    if difference.is_some() {
                        return false;
                    }
                    difference = Some((i, path.clone(), other_values));
                }
            }
        }
        if let Some((i, path, other_values)) = difference {
            if let Some(values) = self.clauses[i].get_mut(&path) {
                values.extend(other_values.iter().cloned());
            }
        }
        true
    }
}

fn clause_from_constraint(constraint: &Constraint) -> Option<Clause> {
    let mut clause = Clause::new();
    for (attribute, value) in constraint {
        if let ConstraintValue::Nested(roles) = value {
            if roles.is_empty() {
                return None;
            }
            for (role, value) in roles {
                clause.insert(
                    Path {
                        attribute: attribute.clone(),
                        role: Some(role.clone()),
                    },
                    value_set(value)?,
                );
            }
        } else {
            clause.insert(
                Path {
                    attribute: attribute.clone(),
                    role: None,
                },
                value_set(value)?,
            );
        }
    }
    Some(clause)
}

fn value_set(value: &ConstraintValue) -> Option<BTreeSet<String>> {
    let values = value.values()?;
    if values.is_empty() {
        return None;
    }
    Some(values.iter().cloned().collect())
}

fn clause_into_constraint(clause: Clause) -> Constraint {
    let mut attributes = BTreeMap::<String, ConstraintValue>::new();
    for (path, values) in clause {
        let value = if values.len() == 1 {
            ConstraintValue::Scalar(values.into_iter().next().unwrap_or_default())
        } else {
            ConstraintValue::Wildcard(values.into_iter().collect())
        };
        match path.role {
            Some(role) => {
                if let ConstraintValue::Nested(roles) = attributes
                    .entry(path.attribute)
                    .or_insert_with(|| ConstraintValue::Nested(BTreeMap::new()))
                {
                    roles.insert(role, value);
                }
            }
            None => {
                attributes.insert(path.attribute, value);
            }
        }
    }
    attributes.into()
}

/// Sorts the groups so that the most generic and frequent shapes come first.
///
/// Groups are ordered by number of values, then by how frequent their values are in all the groups,
/// then by values. The order is total so that the result does not depend on the input order.
fn sort_canonically(groups: Vec<Group>) -> Vec<Group> {
    let hashes = groups.iter().map(Group::hashes).collect::<Vec<_>>();
    let mut frequencies = HashMap::<&str, usize>::new();
    for hash in hashes.iter().flatten() {
        *frequencies.entry(hash.as_str()).or_default() += 1;
    }
    let mut keyed = groups
        .into_iter()
        .zip(&hashes)
        .map(|(group, hashes)| {
            let mut counts = hashes
                .iter()
                .map(|hash| frequencies.get(hash.as_str()).copied().unwrap_or_default())
                .collect::<Vec<_>>();
            counts.sort_unstable();
            ((hashes.len(), counts, hashes), group)
        })
        .collect::<Vec<_>>();
    keyed.sort();
    keyed.into_iter().map(|(_, group)| group).collect()
}

/// Greedy merge of each group into the first open cluster it fits, repeated until nothing merges.
///
/// When it returns, no two groups could be merged anymore.
fn generalize(mut groups: Vec<Group>, merges: &mut usize) -> Vec<Group> {
    let mut pass = 0;
    loop {
        pass += 1;
        groups = sort_canonically(groups);
        let mut clusters = Vec::<Group>::with_capacity(groups.len());
        let mut by_shape = HashMap::<Vec<Vec<Path>>, Vec<usize>>::new();
        let mut merged = 0;
        for group in groups {
            let candidates = by_shape.entry(group.shape()).or_default();
            if candidates.iter().any(|&i| clusters[i].absorb(&group)) {
                merged += 1;
            } else {
                candidates.push(clusters.len());
                clusters.push(group);
            }
        }
        trace!("generalization pass {pass}: {merged} merges");
        *merges += merged;
        groups = clusters
            .into_iter()
            .map(|cluster| Group::new(cluster.clauses))
            .collect();
        if merged == 0 {
            return groups;
        }
    }
}

/// A shape collapsed by [`Strategy::Bucketed`].
#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Clone)]
enum Bucket {
    Attribute(String),
    Role(String),
    ConnectorRole { connector: String, role: String },
}

const BUCKETED_ATTRIBUTES: [&str; 4] = ["parent", "ref", "id", "connector"];
const BINDS: &str = "binds";
const CONNECTOR: &str = "connector";

impl Bucket {
    /// Returns the bucket of a single clause group and its values.
    fn of(group: &Group) -> Option<(Self, BTreeSet<String>)> {
        let [clause] = group.clauses.as_slice() else {
            return None;
        };
        let entries = clause.iter().collect::<Vec<_>>();
        match entries.as_slice() {
            [(path, values)] => match &path.role {
                None if BUCKETED_ATTRIBUTES.contains(&path.attribute.as_str()) => {
                    Some((Self::Attribute(path.attribute.clone()), (*values).clone()))
                }
                Some(role) if path.attribute == BINDS => {
                    Some((Self::Role(role.clone()), (*values).clone()))
                }
                _ => None,
            },
            // Paths are sorted: binds comes before connector
            [(binds, values), (connector, connectors)] => {
                let role = binds.role.as_ref()?;
                if connectors.len() != 1 {
                    return None;
                }
                let single = connectors.iter().next()?;
                (binds.attribute == BINDS
                    && connector.attribute == CONNECTOR
                    && connector.role.is_none())
                .then(|| {
                    (
                        Self::ConnectorRole {
                            connector: single.clone(),
                            role: role.clone(),
                        },
                        (*values).clone(),
                    )
                })
            }
            _ => None,
        }
    }

    fn into_group(self, values: BTreeSet<String>) -> Group {
        let path = |attribute: &str, role: Option<String>| Path {
            attribute: attribute.into(),
            role,
        };
        let clause = match self {
            Self::Attribute(attribute) => Clause::from([(path(attribute.as_str(), None), values)]),
            Self::Role(role) => Clause::from([(path(BINDS, Some(role)), values)]),
            Self::ConnectorRole { connector, role } => Clause::from([
                (path(BINDS, Some(role)), values),
                (path(CONNECTOR, None), BTreeSet::from([connector])),
            ]),
        };
        Group::new(vec![clause])
    }
}

/// Collapses the single clause groups with a bucketed shape.
fn bucket(groups: Vec<Group>, merges: &mut usize) -> Vec<Group> {
    let mut buckets = BTreeMap::<Bucket, BTreeSet<String>>::new();
    let mut bucketed = 0;
    let mut rest = Vec::with_capacity(groups.len());
    for group in groups {
        if let Some((bucket, values)) = Bucket::of(&group) {
            buckets.entry(bucket).or_default().extend(values);
            bucketed += 1;
        } else {
            rest.push(group);
        }
    }
    trace!("{bucketed} clause-groups collapsed into {} buckets", buckets.len());
    *merges += bucketed - buckets.len();
    rest.extend(
        buckets
            .into_iter()
            .map(|(bucket, values)| bucket.into_group(values)),
    );
    rest
}
