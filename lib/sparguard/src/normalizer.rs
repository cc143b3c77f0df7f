//! Canonicalization of `xsd:boolean` literals.
//!
//! Some SPARQL serializers keep the lexical form of typed booleans untouched (`"TRUE"^^xsd:boolean`),
//! which several triple stores reject. Every boolean literal of a query is rewritten to its lowercase form.

use oxrdf::vocab::xsd;
use oxrdf::Literal;
use spargebra::algebra::{AggregateExpression, Expression, GraphPattern, OrderExpression};
use spargebra::term::{GroundTerm, TermPattern, TriplePattern};
use spargebra::Query;

/// Lowercases the lexical form of every `xsd:boolean` literal of the query.
///
/// Returns the number of literals that have been changed.
/// Calling it twice is a no-op the second time.
///
/// ```
/// use spargebra::SparqlParser;
///
/// let mut query = SparqlParser::new().parse_query(
///     "SELECT * WHERE { ?s <http://example.com/p> \"TRUE\"^^<http://www.w3.org/2001/XMLSchema#boolean> }",
/// )?;
/// assert_eq!(sparguard::normalize_query(&mut query), 1);
/// assert_eq!(sparguard::normalize_query(&mut query), 0);
/// # Ok::<_, spargebra::SparqlSyntaxError>(())
/// ```
pub fn normalize_query(query: &mut Query) -> usize {
    let mut normalizer = LiteralNormalizer::default();
    match query {
        Query::Construct {
            template, pattern, ..
        } => {
            for triple in template {
                normalizer.triple_pattern(triple);
            }
            normalizer.graph_pattern(pattern);
        }
        Query::Select { pattern, .. }
        | Query::Describe { pattern, .. }
        | Query::Ask { pattern, .. } => normalizer.graph_pattern(pattern),
    }
    normalizer.changed
}

/// Lowercases the lexical form of every `xsd:boolean` literal in the graph pattern.
pub fn normalize_graph_pattern(pattern: &mut GraphPattern) -> usize {
    let mut normalizer = LiteralNormalizer::default();
    normalizer.graph_pattern(pattern);
    normalizer.changed
}

/// Rewrites the literal in place if it is an `xsd:boolean` with a non canonical casing.
///
/// Returns `true` if the literal has been changed.
pub fn normalize_literal(literal: &mut Literal) -> bool {
    if literal.datatype() != xsd::BOOLEAN {
        return false;
    }
    let lowercase = literal.value().to_lowercase();
    if lowercase == literal.value() {
        return false;
    }
    *literal = Literal::new_typed_literal(lowercase, xsd::BOOLEAN);
    true
}

enum Node<'a> {
    Pattern(&'a mut GraphPattern),
    Expression(&'a mut Expression),
}

#[derive(Default)]
struct LiteralNormalizer {
    changed: usize,
}

impl LiteralNormalizer {
    fn graph_pattern(&mut self, root: &mut GraphPattern) {
        let mut stack = vec![Node::Pattern(root)];
        while let Some(node) = stack.pop() {
            match node {
                Node::Pattern(pattern) => match pattern {
                    GraphPattern::Bgp { patterns } => {
                        for triple in patterns {
                            self.triple_pattern(triple);
                        }
                    }
                    GraphPattern::Path {
                        subject, object, ..
                    } => {
                        self.term_pattern(subject);
                        self.term_pattern(object);
                    }
                    GraphPattern::Join { left, right }
                    | GraphPattern::Union { left, right }
                    | GraphPattern::Minus { left, right } => {
                        stack.push(Node::Pattern(left));
                        stack.push(Node::Pattern(right));
                    }
                    #[cfg(feature = "sep-0006")]
                    GraphPattern::Lateral { left, right } => {
                        stack.push(Node::Pattern(left));
                        stack.push(Node::Pattern(right));
                    }
                    GraphPattern::LeftJoin {
                        left,
                        right,
                        expression,
                    } => {
                        stack.push(Node::Pattern(left));
                        stack.push(Node::Pattern(right));
                        if let Some(expression) = expression {
                            stack.push(Node::Expression(expression));
                        }
                    }
                    GraphPattern::Filter { expr, inner } => {
                        stack.push(Node::Expression(expr));
                        stack.push(Node::Pattern(inner));
                    }
                    GraphPattern::Extend {
                        inner, expression, ..
                    } => {
                        stack.push(Node::Expression(expression));
                        stack.push(Node::Pattern(inner));
                    }
                    GraphPattern::Values { bindings, .. } => {
                        for row in bindings {
                            for value in row.iter_mut().flatten() {
                                self.ground_term(value);
                            }
                        }
                    }
                    GraphPattern::OrderBy { inner, expression } => {
                        for order in expression {
                            match order {
                                OrderExpression::Asc(e) | OrderExpression::Desc(e) => {
                                    stack.push(Node::Expression(e))
                                }
                            }
                        }
                        stack.push(Node::Pattern(inner));
                    }
                    GraphPattern::Group {
                        inner, aggregates, ..
                    } => {
                        for (_, aggregate) in aggregates {
                            if let AggregateExpression::FunctionCall { expr, .. } = aggregate {
                                stack.push(Node::Expression(expr));
                            }
                        }
                        stack.push(Node::Pattern(inner));
                    }
                    GraphPattern::Graph { inner, .. }
                    | GraphPattern::Project { inner, .. }
                    | GraphPattern::Distinct { inner }
                    | GraphPattern::Reduced { inner }
                    | GraphPattern::Slice { inner, .. }
                    | GraphPattern::Service { inner, .. } => stack.push(Node::Pattern(inner)),
                },
                Node::Expression(expression) => match expression {
                    Expression::Literal(literal) => {
                        if normalize_literal(literal) {
                            self.changed += 1;
                        }
                    }
                    Expression::NamedNode(_) | Expression::Variable(_) | Expression::Bound(_) => {}
                    Expression::Or(a, b)
                    | Expression::And(a, b)
                    | Expression::Equal(a, b)
                    | Expression::SameTerm(a, b)
                    | Expression::Greater(a, b)
                    | Expression::GreaterOrEqual(a, b)
                    | Expression::Less(a, b)
                    | Expression::LessOrEqual(a, b)
                    | Expression::Add(a, b)
                    | Expression::Subtract(a, b)
                    | Expression::Multiply(a, b)
                    | Expression::Divide(a, b) => {
                        stack.push(Node::Expression(a));
                        stack.push(Node::Expression(b));
                    }
                    Expression::In(a, list) => {
                        stack.push(Node::Expression(a));
                        stack.extend(list.iter_mut().map(Node::Expression));
                    }
                    Expression::UnaryPlus(e) | Expression::UnaryMinus(e) | Expression::Not(e) => {
                        stack.push(Node::Expression(e))
                    }
                    Expression::Exists(p) => stack.push(Node::Pattern(p)),
                    Expression::If(a, b, c) => {
                        stack.push(Node::Expression(a));
                        stack.push(Node::Expression(b));
                        stack.push(Node::Expression(c));
                    }
                    Expression::Coalesce(list) | Expression::FunctionCall(_, list) => {
                        stack.extend(list.iter_mut().map(Node::Expression));
                    }
                },
            }
        }
    }

    fn triple_pattern(&mut self, triple: &mut TriplePattern) {
        self.term_pattern(&mut triple.subject);
        self.term_pattern(&mut triple.object);
    }

    fn term_pattern(&mut self, term: &mut TermPattern) {
        match term {
            TermPattern::Literal(literal) => {
                if normalize_literal(literal) {
                    self.changed += 1;
                }
            }
            #[cfg(feature = "rdf-star")]
            TermPattern::Triple(triple) => self.triple_pattern(triple),
            _ => {}
        }
    }

    fn ground_term(&mut self, term: &mut GroundTerm) {
        match term {
            GroundTerm::Literal(literal) => {
                if normalize_literal(literal) {
                    self.changed += 1;
                }
            }
            #[cfg(feature = "rdf-star")]
            GroundTerm::Triple(triple) => self.ground_term(&mut triple.object),
            GroundTerm::NamedNode(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boolean(value: &str) -> Literal {
        Literal::new_typed_literal(value, xsd::BOOLEAN)
    }

    #[test]
    fn lowercases_boolean() {
        let mut literal = boolean("TRUE");
        assert!(normalize_literal(&mut literal));
        assert_eq!(literal, boolean("true"));
        assert_eq!(literal.datatype(), xsd::BOOLEAN);
    }

    #[test]
    fn keeps_canonical_boolean() {
        let mut literal = boolean("false");
        assert!(!normalize_literal(&mut literal));
        assert_eq!(literal, boolean("false"));
    }

    #[test]
    fn ignores_other_datatypes() {
        let mut literal = Literal::new_typed_literal("TRUE", xsd::STRING);
        assert!(!normalize_literal(&mut literal));
        assert_eq!(literal.value(), "TRUE");
        let mut literal = Literal::new_simple_literal("FALSE");
        assert!(!normalize_literal(&mut literal));
        assert_eq!(literal.value(), "FALSE");
    }
}
