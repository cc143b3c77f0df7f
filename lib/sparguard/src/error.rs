use spargebra::SparqlSyntaxError;

/// Error returned when a query could not be rewritten.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct RewriteError {
    #[from]
    kind: RewriteErrorKind,
}

impl RewriteError {
    /// Returns `true` if the query text itself is not valid SPARQL.
    pub fn is_syntax_error(&self) -> bool {
        matches!(self.kind, RewriteErrorKind::Syntax(_))
    }

    pub(crate) fn scope_too_deep(limit: usize) -> Self {
        RewriteErrorKind::ScopeTooDeep { limit }.into()
    }
}

impl From<SparqlSyntaxError> for RewriteError {
    #[inline]
    fn from(error: SparqlSyntaxError) -> Self {
        RewriteErrorKind::Syntax(error).into()
    }
}

#[derive(Debug, thiserror::Error)]
enum RewriteErrorKind {
    #[error(transparent)]
    Syntax(SparqlSyntaxError),
    #[error("The query nests sub-selects deeper than the limit of {limit}")]
    ScopeTooDeep { limit: usize },
}
