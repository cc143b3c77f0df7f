#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![doc(test(attr(deny(warnings))))]

mod constraint;
mod error;
mod guard;
mod normalizer;
mod optimizer;
mod rewriter;
mod scope;
pub mod vocab;

pub use crate::constraint::{Constraint, ConstraintGroup, ConstraintValue};
pub use crate::error::RewriteError;
pub use crate::guard::{has_conjunct, object_guard, predicate_guard, scope_guard, subject_guard};
pub use crate::normalizer::{normalize_graph_pattern, normalize_literal, normalize_query};
pub use crate::optimizer::{ConstraintOptimizer, OptimizerReport, Strategy, StrategyParseError};
pub use crate::rewriter::{QueryRewriter, RewriteReport, DEFAULT_MAX_DEPTH};
pub use crate::scope::{is_scope_root, nested_scopes_mut, where_clause_mut, VariableClassification};
