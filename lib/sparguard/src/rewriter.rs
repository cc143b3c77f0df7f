use crate::error::RewriteError;
use crate::guard::{has_conjunct, scope_guard};
use crate::normalizer::normalize_query;
use crate::scope::{nested_scopes_mut, where_clause_mut, VariableClassification};
use oxiri::IriParseError;
use spargebra::algebra::{Expression, GraphPattern};
use spargebra::{Query, SparqlParser};
use std::mem::{replace, take};
use tracing::{debug, trace, warn};

/// The default limit on sub-select nesting.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Rewrites SPARQL queries so that they never bind the hypergraph bookkeeping vocabulary.
///
/// Each query scope (the query itself and every sub-select) gets a `FILTER` guarding the variables
/// its own triple patterns bind.
///
/// ```
/// use sparguard::QueryRewriter;
///
/// let rewriter = QueryRewriter::new();
/// let rewritten = rewriter.rewrite("SELECT ?s ?p ?o WHERE { ?s ?p ?o }");
/// assert!(rewritten.contains("FILTER"));
/// // Running it again does not add anything
/// assert_eq!(rewriter.rewrite(&rewritten), rewritten);
/// ```
#[must_use]
#[derive(Clone)]
pub struct QueryRewriter {
    parser: SparqlParser,
    max_depth: usize,
}

impl Default for QueryRewriter {
    #[inline]
    fn default() -> Self {
        Self {
            parser: SparqlParser::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl QueryRewriter {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Provides an IRI used to resolve the relative IRIs of the queries.
    ///
    /// ```
    /// use sparguard::QueryRewriter;
    ///
    /// let rewritten = QueryRewriter::new()
    ///     .with_base_iri("http://example.com/")?
    ///     .try_rewrite("SELECT ?o WHERE { <s> <p> ?o }")?;
    /// assert!(rewritten.contains("<http://example.com/s>"));
    /// # Result::<_, Box<dyn std::error::Error>>::Ok(())
    /// ```
    #[inline]
    pub fn with_base_iri(mut self, base_iri: impl Into<String>) -> Result<Self, IriParseError> {
        self.parser = self.parser.with_base_iri(base_iri)?;
        Ok(self)
    }

    /// Sets a default IRI prefix used when parsing the queries.
    #[inline]
    pub fn with_prefix(
        mut self,
        prefix_name: impl Into<String>,
        prefix_iri: impl Into<String>,
    ) -> Result<Self, IriParseError> {
        self.parser = self.parser.with_prefix(prefix_name, prefix_iri)?;
        Ok(self)
    }

    /// Sets how deep sub-selects might be nested before the rewrite gives up.
    #[inline]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Rewrites the query text, returning it unchanged if anything goes wrong.
    ///
    /// The guards are an extra safety layer: failing to add them must not make the query fail.
    /// Errors are logged at the warning level.
    ///
    /// ```
    /// use sparguard::QueryRewriter;
    ///
    /// let broken = "SELECT ?s WHERE { ?s ?p";
    /// assert_eq!(QueryRewriter::new().rewrite(broken), broken);
    /// ```
    pub fn rewrite(&self, query: &str) -> String {
        match self.try_rewrite(query) {
            Ok(rewritten) => rewritten,
            Err(error) => {
                warn!("The query is left as it is: {error}");
                query.to_owned()
            }
        }
    }

    /// Parses, rewrites and serializes the query text.
    ///
    /// A query that needs no change is returned as it is, so rewriting is idempotent on the text.
    pub fn try_rewrite(&self, query: &str) -> Result<String, RewriteError> {
        let mut parsed = self.parser.clone().parse_query(query)?;
        let report = self.rewrite_query(&mut parsed)?;
        debug!(
            "{} scopes visited, {} guards injected, {} already present",
            report.scopes, report.guards_injected, report.guards_present
        );
        if report.is_unchanged() {
            return Ok(query.to_owned());
        }
        Ok(parsed.to_string())
    }

    /// Rewrites a parsed query in place.
    ///
    /// If an error is returned the query might be only partially rewritten.
    pub fn rewrite_query(&self, query: &mut Query) -> Result<RewriteReport, RewriteError> {
        let mut report = RewriteReport {
            booleans_normalized: normalize_query(query),
            ..RewriteReport::default()
        };
        let root = match query {
            Query::Select { pattern, .. }
            | Query::Construct { pattern, .. }
            | Query::Describe { pattern, .. }
            | Query::Ask { pattern, .. } => pattern,
        };

        let mut scopes = vec![(root, 0)];
        while let Some((scope, depth)) = scopes.pop() {
            if depth > self.max_depth {
                return Err(RewriteError::scope_too_deep(self.max_depth));
            }
            report.scopes += 1;
            let where_clause = where_clause_mut(scope);
            let classification = VariableClassification::of_where_clause(where_clause);
            trace!(
                "scope at depth {depth}: {} subjects, {} predicates, {} objects, {} graphs",
                classification.subjects.len(),
                classification.predicates.len(),
                classification.objects.len(),
                classification.graphs.len()
            );
            if let Some(guard) = scope_guard(&classification) {
                if inject_guard(where_clause, guard) {
                    report.guards_injected += 1;
                } else {
                    debug!("scope at depth {depth} is already guarded");
                    report.guards_present += 1;
                }
            }
            scopes.extend(
                nested_scopes_mut(where_clause)
                    .into_iter()
                    .rev()
                    .map(|nested| (nested, depth + 1)),
            );
        }
        Ok(report)
    }
}

/// Adds the guard as a filter of the WHERE clause.
///
/// A filter already at the top of the WHERE clause is extended instead of being nested,
/// the way several `FILTER`s of the same group are combined by the parser.
/// Returns `false` if the guard is already there.
fn inject_guard(where_clause: &mut GraphPattern, guard: Expression) -> bool {
    if let GraphPattern::Filter { expr, .. } = where_clause {
        if has_conjunct(expr, &guard) {
            return false;
        }
        let existing = replace(expr, Expression::Literal(true.into()));
        *expr = Expression::And(Box::new(existing), Box::new(guard));
        return true;
    }
    let inner = take(where_clause);
    *where_clause = GraphPattern::Filter {
        expr: guard,
        inner: Box::new(inner),
    };
    true
}

/// What [`QueryRewriter::rewrite_query`] did.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub struct RewriteReport {
    /// Number of scopes visited, the query itself included.
    pub scopes: usize,
    /// Number of guards added.
    pub guards_injected: usize,
    /// Number of scopes that already had their guard.
    pub guards_present: usize,
    /// Number of `xsd:boolean` literals lowercased.
    pub booleans_normalized: usize,
}

impl RewriteReport {
    /// Returns `true` if the query has not been modified.
    #[inline]
    pub fn is_unchanged(&self) -> bool {
        self.guards_injected == 0 && self.booleans_normalized == 0
    }
}
