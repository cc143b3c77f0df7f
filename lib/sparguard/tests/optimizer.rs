use sparguard::{Constraint, ConstraintGroup, ConstraintOptimizer, ConstraintValue, Strategy};
use std::collections::BTreeMap;

const STRATEGIES: [Strategy; 2] = [Strategy::Bucketed, Strategy::Generalize];

fn groups(json: &str) -> Vec<ConstraintGroup> {
    serde_json::from_str(json).unwrap()
}

/// An entity is described by the value it has for each `attribute` or `attribute.role` path.
type Entity = BTreeMap<&'static str, &'static str>;

fn value_matches(value: &ConstraintValue, actual: Option<&str>) -> bool {
    let (Some(values), Some(actual)) = (value.values(), actual) else {
        return false;
    };
    values.iter().any(|v| v == actual)
}

fn constraint_matches(constraint: &Constraint, entity: &Entity) -> bool {
    constraint.iter().all(|(attribute, value)| match value {
        ConstraintValue::Nested(roles) => roles.iter().all(|(role, value)| {
            value_matches(
                value,
                entity.get(format!("{attribute}.{role}").as_str()).copied(),
            )
        }),
        value => value_matches(value, entity.get(attribute.as_str()).copied()),
    })
}

fn disjunction_matches(groups: &[ConstraintGroup], entity: &Entity) -> bool {
    groups
        .iter()
        .any(|group| group.iter().all(|c| constraint_matches(c, entity)))
}

/// Every combination of A, B, C or nothing for parent, connector and binds.role.
fn universe() -> Vec<Entity> {
    let values = [None, Some("A"), Some("B"), Some("C")];
    let mut entities = Vec::new();
    for parent in values {
        for connector in values {
            for role in values {
                let mut entity = Entity::new();
                for (path, value) in [
                    ("parent", parent),
                    ("connector", connector),
                    ("binds.role", role),
                ] {
                    if let Some(value) = value {
                        entity.insert(path, value);
                    }
                }
                entities.push(entity);
            }
        }
    }
    entities
}

const MIXED: &str = r#"[
    [{"parent": "A"}],
    [{"parent": "B"}],
    [{"connector": "A", "binds": {"role": "A"}}],
    [{"connector": "A", "binds": {"role": "B"}}],
    [{"connector": "B", "binds": {"role": "B"}}],
    [{"connector": "C", "binds": {"role": "C"}}],
    [{"binds": {"role": "C"}}],
    [{"parent": "C"}, {"connector": "A"}],
    [{"parent": "C"}, {"connector": "B"}],
    [{"parent": ["A", "B"], "connector": "C"}],
    [{"parent": "A", "connector": "A", "binds": {"role": "A"}}],
    [{"parent": "A", "connector": "B", "binds": {"role": "C"}}]
]"#;

#[test]
fn test_same_attribute_groups_are_merged() {
    for strategy in STRATEGIES {
        let optimizer = ConstraintOptimizer::new().with_strategy(strategy);
        let (optimized, report) = optimizer
            .optimize_with_report(&groups(r#"[[{"parent": "A"}], [{"parent": "B"}], [{"parent": "C"}]]"#));
        assert_eq!(
            optimized,
            groups(r#"[[{"parent": ["A", "B", "C"]}]]"#),
            "{strategy}"
        );
        assert_eq!(report.input_groups, 3);
        assert_eq!(report.output_groups, 1);
        assert_eq!(report.merges, 2);
        assert_eq!(report.passed_through, 0);
    }
}

#[test]
fn test_roles_of_the_same_connector_are_merged() {
    for strategy in STRATEGIES {
        let optimized = ConstraintOptimizer::new().with_strategy(strategy).optimize(&groups(
            r#"[
                [{"connector": "C1", "binds": {"role": "X"}}],
                [{"connector": "C1", "binds": {"role": "Y"}}]
            ]"#,
        ));
        assert_eq!(
            optimized,
            groups(r#"[[{"connector": "C1", "binds": {"role": ["X", "Y"]}}]]"#),
            "{strategy}"
        );
    }
}

#[test]
fn test_two_differences_are_not_merged() {
    let input = groups(
        r#"[
            [{"connector": "C1", "binds": {"role": "X"}}],
            [{"connector": "C2", "binds": {"role": "Y"}}]
        ]"#,
    );
    for strategy in STRATEGIES {
        let (optimized, report) = ConstraintOptimizer::new()
            .with_strategy(strategy)
            .optimize_with_report(&input);
        assert_eq!(optimized.len(), 2, "{strategy}");
        assert_eq!(report.merges, 0, "{strategy}");
        for group in &input {
            assert!(optimized.contains(group), "{strategy}");
        }
    }
}

#[test]
fn test_role_only_groups_are_merged() {
    let optimized = ConstraintOptimizer::new().optimize(&groups(
        r#"[[{"binds": {"role": "X"}}], [{"binds": {"role": "Y"}}], [{"binds": {"other": "Z"}}]]"#,
    ));
    assert_eq!(optimized.len(), 2);
    assert!(optimized.contains(&groups(r#"[[{"binds": {"role": ["X", "Y"]}}]]"#)[0]));
    assert!(optimized.contains(&groups(r#"[[{"binds": {"other": "Z"}}]]"#)[0]));
}

#[test]
fn test_multi_clause_groups_are_merged() {
    let optimized = ConstraintOptimizer::new().optimize(&groups(
        r#"[[{"parent": "C"}, {"connector": "A"}], [{"connector": "B"}, {"parent": "C"}]]"#,
    ));
    assert_eq!(optimized.len(), 1);
    assert_eq!(optimized[0].len(), 2);
}

#[test]
fn test_optimization_preserves_matches() {
    let input = groups(MIXED);
    let universe = universe();
    for strategy in STRATEGIES {
        let (optimized, report) = ConstraintOptimizer::new()
            .with_strategy(strategy)
            .optimize_with_report(&input);
        assert!(optimized.len() < input.len(), "{strategy}");
        assert_eq!(report.output_groups, optimized.len());
        for entity in &universe {
            assert_eq!(
                disjunction_matches(&input, entity),
                disjunction_matches(&optimized, entity),
                "{strategy} {entity:?}"
            );
        }
    }
}

#[test]
fn test_output_does_not_depend_on_input_order() {
    let input = groups(MIXED);
    for strategy in STRATEGIES {
        let optimizer = ConstraintOptimizer::new().with_strategy(strategy);
        let expected = optimizer.optimize(&input);
        let mut reversed = input.clone();
        reversed.reverse();
        assert_eq!(optimizer.optimize(&reversed), expected, "{strategy}");
        for shift in 1..input.len() {
            let mut rotated = input.clone();
            rotated.rotate_left(shift);
            assert_eq!(optimizer.optimize(&rotated), expected, "{strategy} {shift}");
        }
    }
}

#[test]
fn test_output_is_a_fixed_point() {
    let input = groups(MIXED);
    for strategy in STRATEGIES {
        let optimizer = ConstraintOptimizer::new().with_strategy(strategy);
        let optimized = optimizer.optimize(&input);
        let (again, report) = optimizer.optimize_with_report(&optimized);
        assert_eq!(again, optimized, "{strategy}");
        assert_eq!(report.merges, 0, "{strategy}");
    }
}

#[test]
fn test_malformed_groups_are_passed_through() {
    let (optimized, report) = ConstraintOptimizer::new().optimize_with_report(&groups(
        r#"[[{"parent": "A"}], [{"binds": {}}], [{"parent": "B"}], [{"parent": []}]]"#,
    ));
    assert_eq!(report.passed_through, 2);
    assert_eq!(report.output_groups, 3);
    assert_eq!(optimized[0], groups(r#"[[{"parent": ["A", "B"]}]]"#)[0]);
    assert!(optimized.contains(&groups(r#"[[{"binds": {}}]]"#)[0]));
    assert!(optimized.contains(&groups(r#"[[{"parent": []}]]"#)[0]));
}

#[test]
fn test_numeric_values_are_merged() {
    let optimized = ConstraintOptimizer::new()
        .optimize(&groups(r#"[[{"id": 1}], [{"id": 2}], [{"id": "3"}]]"#));
    assert_eq!(
        serde_json::to_string(&optimized).unwrap(),
        r#"[[{"id":["1","2","3"]}]]"#
    );
}

#[test]
fn test_empty_input() {
    let (optimized, report) = ConstraintOptimizer::new().optimize_with_report(&[]);
    assert!(optimized.is_empty());
    assert_eq!(report.output_groups, 0);
    assert_eq!(report.merges, 0);
}

#[test]
fn test_json_output() {
    let optimized = ConstraintOptimizer::new().optimize(&groups(
        r#"[[{"parent": "B"}], [{"parent": "A"}], [{"connector": "C1", "binds": {"role": "X"}}]]"#,
    ));
    assert_eq!(
        serde_json::to_string(&optimized).unwrap(),
        r#"[[{"binds":{"role":"X"},"connector":"C1"}],[{"parent":["A","B"]}]]"#
    );
}
