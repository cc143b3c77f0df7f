//! Guard expressions excluding the hypergraph bookkeeping vocabulary from variable bindings.

use crate::scope::VariableClassification;
use crate::vocab;
use oxrdf::{Literal, NamedNode, Variable};
use spargebra::algebra::{Expression, Function};

/// Builds the guard of a scope: the conjunction of the guards of all its subject, predicate and object variables.
///
/// Variables are taken by position then by name, so the same classification always gives the same expression.
/// Returns `None` if there is nothing to guard. `GRAPH` name variables are not guarded.
///
/// ```
/// use oxrdf::Variable;
/// use sparguard::{scope_guard, VariableClassification};
///
/// let mut classification = VariableClassification::default();
/// assert!(scope_guard(&classification).is_none());
/// classification.subjects.insert(Variable::new_unchecked("s"));
/// assert!(scope_guard(&classification).is_some());
/// ```
pub fn scope_guard(classification: &VariableClassification) -> Option<Expression> {
    classification
        .subjects
        .iter()
        .map(subject_guard)
        .chain(classification.predicates.iter().map(predicate_guard))
        .chain(classification.objects.iter().map(object_guard))
        .reduce(and)
}

/// The guard of a variable used as a subject.
///
/// It is unbound, or it is not a reserved predicate, not a reserved identifier and not a data list literal.
pub fn subject_guard(variable: &Variable) -> Expression {
    or(
        unbound(variable),
        and_all([
            not_reserved_predicate(variable),
            not_reserved_identifier(variable),
            not_data_list(variable),
        ]),
    )
}

/// The guard of a variable used as a predicate.
///
/// It is unbound, or it is not a reserved predicate and its string form does not start with a reserved prefix.
pub fn predicate_guard(variable: &Variable) -> Expression {
    or(
        unbound(variable),
        and_all(
            vocab::RESERVED_PREDICATES
                .iter()
                .map(|predicate| not_equal(variable, predicate.into_owned()))
                .chain(
                    vocab::RESERVED_PREFIXES
                        .iter()
                        .map(|prefix| Expression::Not(Box::new(starts_with(variable, prefix)))),
                ),
        ),
    )
}

/// The guard of a variable used as an object.
///
/// Same as [`subject_guard`] without the reserved predicates: they never appear in object position.
pub fn object_guard(variable: &Variable) -> Expression {
    or(
        unbound(variable),
        and(
            not_reserved_identifier(variable),
            not_data_list(variable),
        ),
    )
}

/// Returns `true` if `guard` is one of the conjuncts of `expression`.
///
/// Used to avoid injecting the same guard twice.
pub fn has_conjunct(expression: &Expression, guard: &Expression) -> bool {
    let mut stack = vec![expression];
    while let Some(e) = stack.pop() {
        if e == guard {
            return true;
        }
        if let Expression::And(a, b) = e {
            stack.push(a);
            stack.push(b);
        }
    }
    false
}

fn not_reserved_predicate(variable: &Variable) -> Expression {
    and_all(
        vocab::RESERVED_PREDICATES
            .iter()
            .map(|predicate| not_equal(variable, predicate.into_owned())),
    )
}

// !(isIRI(?v) && (STRSTARTS(STR(?v), "hk://role") || ...))
fn not_reserved_identifier(variable: &Variable) -> Expression {
    let prefixes = vocab::RESERVED_PREFIXES
        .iter()
        .map(|prefix| starts_with(variable, prefix))
        .reduce(or)
        .unwrap_or_else(|| Expression::Literal(false.into()));
    Expression::Not(Box::new(and(call(Function::IsIri, variable), prefixes)))
}

// isIRI(?v) || isBlank(?v) || DATATYPE(?v) != hk:DataList
fn not_data_list(variable: &Variable) -> Expression {
    or(
        or(
            call(Function::IsIri, variable),
            call(Function::IsBlank, variable),
        ),
        Expression::Not(Box::new(Expression::Equal(
            Box::new(call(Function::Datatype, variable)),
            Box::new(vocab::DATA_LIST.into_owned().into()),
        ))),
    )
}

fn unbound(variable: &Variable) -> Expression {
    Expression::Not(Box::new(Expression::Bound(variable.clone())))
}

fn not_equal(variable: &Variable, iri: NamedNode) -> Expression {
    Expression::Not(Box::new(Expression::Equal(
        Box::new(variable.clone().into()),
        Box::new(iri.into()),
    )))
}

fn starts_with(variable: &Variable, prefix: &str) -> Expression {
    Expression::FunctionCall(
        Function::StrStarts,
        vec![
            call(Function::Str, variable),
            Literal::new_simple_literal(prefix).into(),
        ],
    )
}

fn call(function: Function, variable: &Variable) -> Expression {
    Expression::FunctionCall(function, vec![variable.clone().into()])
}

fn and(left: Expression, right: Expression) -> Expression {
    Expression::And(Box::new(left), Box::new(right))
}

fn or(left: Expression, right: Expression) -> Expression {
    Expression::Or(Box::new(left), Box::new(right))
}

// Left-associative, the way the SPARQL grammar builds `a && b && c`
fn and_all(expressions: impl IntoIterator<Item = Expression>) -> Expression {
    expressions
        .into_iter()
        .reduce(and)
        .unwrap_or_else(|| Expression::Literal(true.into()))
}
