//! Access and membership constraint clauses.
//!
//! A clause-group is a conjunction of [`Constraint`]s and a collection of clause-groups is
//! the disjunction of its members. They are (de)serialized as plain JSON:
//!
//! ```
//! use sparguard::{ConstraintGroup, ConstraintValue};
//!
//! let groups: Vec<ConstraintGroup> = serde_json::from_str(
//!     r#"[[{"connector": "C1", "binds": {"subject": "X"}}], [{"parent": ["A", "B"]}]]"#,
//! )?;
//! assert_eq!(
//!     groups[1][0].get("parent"),
//!     Some(&ConstraintValue::Wildcard(vec!["A".into(), "B".into()]))
//! );
//! # serde_json::Result::Ok(())
//! ```

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::btree_map::Iter;
use std::collections::BTreeMap;
use std::fmt;

/// The value an attribute of a [`Constraint`] is constrained to.
///
/// JSON numbers and booleans are read as their string form.
#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Clone, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstraintValue {
    /// A single value.
    Scalar(#[serde(deserialize_with = "deserialize_scalar")] String),
    /// Any of the given values.
    Wildcard(#[serde(deserialize_with = "deserialize_scalars")] Vec<String>),
    /// Constraints on the sub-attributes of the attribute, like the roles a connector binds.
    Nested(BTreeMap<String, ConstraintValue>),
}

impl ConstraintValue {
    /// Returns the accepted values, or `None` for [`ConstraintValue::Nested`].
    pub fn values(&self) -> Option<&[String]> {
        match self {
            Self::Scalar(value) => Some(std::slice::from_ref(value)),
            Self::Wildcard(values) => Some(values.as_slice()),
            Self::Nested(_) => None,
        }
    }

    /// Returns `true` if the value has a shape the optimizer knows how to merge.
    ///
    /// Wildcards must not be empty, nested values must not be empty
    /// and may only contain scalars or wildcards.
    pub fn is_well_formed(&self) -> bool {
        match self {
            Self::Scalar(_) => true,
            Self::Wildcard(values) => !values.is_empty(),
            Self::Nested(roles) => {
                !roles.is_empty()
                    && roles
                        .values()
                        .all(|v| !matches!(v, Self::Nested(_)) && v.is_well_formed())
            }
        }
    }
}

impl From<String> for ConstraintValue {
    #[inline]
    fn from(value: String) -> Self {
        Self::Scalar(value)
    }
}

impl From<&str> for ConstraintValue {
    #[inline]
    fn from(value: &str) -> Self {
        Self::Scalar(value.into())
    }
}

impl From<Vec<String>> for ConstraintValue {
    #[inline]
    fn from(values: Vec<String>) -> Self {
        Self::Wildcard(values)
    }
}

impl From<BTreeMap<String, ConstraintValue>> for ConstraintValue {
    #[inline]
    fn from(roles: BTreeMap<String, ConstraintValue>) -> Self {
        Self::Nested(roles)
    }
}

/// A JSON string, number or boolean, as a string.
struct Lexical(String);

impl<'de> Deserialize<'de> for Lexical {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LexicalVisitor;

        impl Visitor<'_> for LexicalVisitor {
            type Value = String;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a string, a number or a boolean")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
                Ok(v.to_owned())
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<String, E> {
                Ok(v)
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<String, E> {
                Ok(v.to_string())
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
                Ok(v.to_string())
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
                Ok(v.to_string())
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<String, E> {
                Ok(v.to_string())
            }
        }

        deserializer.deserialize_any(LexicalVisitor).map(Self)
    }
}

fn deserialize_scalar<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Lexical::deserialize(deserializer).map(|lexical| lexical.0)
}

fn deserialize_scalars<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<String>, D::Error> {
    Ok(Vec::<Lexical>::deserialize(deserializer)?
        .into_iter()
        .map(|lexical| lexical.0)
        .collect())
}

/// A conjunctive condition: every attribute must have the given value.
#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Clone, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Constraint(BTreeMap<String, ConstraintValue>);

impl Constraint {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an attribute, builder style.
    ///
    /// ```
    /// use sparguard::Constraint;
    ///
    /// let constraint = Constraint::new().with("parent", "A");
    /// assert_eq!(constraint.len(), 1);
    /// ```
    #[inline]
    #[must_use]
    pub fn with(mut self, attribute: impl Into<String>, value: impl Into<ConstraintValue>) -> Self {
        self.insert(attribute, value);
        self
    }

    /// Sets an attribute, returning its previous value.
    #[inline]
    pub fn insert(
        &mut self,
        attribute: impl Into<String>,
        value: impl Into<ConstraintValue>,
    ) -> Option<ConstraintValue> {
        self.0.insert(attribute.into(), value.into())
    }

    #[inline]
    pub fn get(&self, attribute: &str) -> Option<&ConstraintValue> {
        self.0.get(attribute)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The attributes and their values, ordered by attribute.
    #[inline]
    pub fn iter(&self) -> Iter<'_, String, ConstraintValue> {
        self.0.iter()
    }

    /// Returns `true` if all the values are well formed.
    pub fn is_well_formed(&self) -> bool {
        self.0.values().all(ConstraintValue::is_well_formed)
    }
}

impl From<BTreeMap<String, ConstraintValue>> for Constraint {
    #[inline]
    fn from(attributes: BTreeMap<String, ConstraintValue>) -> Self {
        Self(attributes)
    }
}

impl From<Constraint> for BTreeMap<String, ConstraintValue> {
    #[inline]
    fn from(constraint: Constraint) -> Self {
        constraint.0
    }
}

impl<K: Into<String>, V: Into<ConstraintValue>> FromIterator<(K, V)> for Constraint {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a Constraint {
    type Item = (&'a String, &'a ConstraintValue);
    type IntoIter = Iter<'a, String, ConstraintValue>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A conjunction of constraints.
pub type ConstraintGroup = Vec<Constraint>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_shapes() {
        let constraint: Constraint = serde_json::from_str(
            r#"{"connector": "C1", "binds": {"subject": ["X", "Y"]}, "parent": "P"}"#,
        )
        .unwrap();
        assert_eq!(constraint.get("parent"), Some(&ConstraintValue::from("P")));
        let Some(ConstraintValue::Nested(binds)) = constraint.get("binds") else {
            panic!("binds should be nested")
        };
        assert_eq!(
            binds.get("subject"),
            Some(&ConstraintValue::Wildcard(vec!["X".into(), "Y".into()]))
        );
        assert!(constraint.is_well_formed());
        assert_eq!(
            serde_json::to_string(&constraint).unwrap(),
            r#"{"binds":{"subject":["X","Y"]},"connector":"C1","parent":"P"}"#
        );
    }

    #[test]
    fn numbers_and_booleans_are_read_as_strings() {
        let constraint: Constraint =
            serde_json::from_str(r#"{"id": 42, "hidden": false, "parent": [1, "B", 2.5]}"#)
                .unwrap();
        assert_eq!(constraint.get("id"), Some(&ConstraintValue::from("42")));
        assert_eq!(constraint.get("hidden"), Some(&ConstraintValue::from("false")));
        assert_eq!(
            constraint.get("parent"),
            Some(&ConstraintValue::Wildcard(vec![
                "1".into(),
                "B".into(),
                "2.5".into()
            ]))
        );
        assert!(serde_json::from_str::<Constraint>(r#"{"id": null}"#).is_err());
    }

    #[test]
    fn malformed_shapes() {
        assert!(!ConstraintValue::Wildcard(Vec::new()).is_well_formed());
        assert!(!ConstraintValue::Nested(BTreeMap::new()).is_well_formed());
        let nested_twice: Constraint =
            serde_json::from_str(r#"{"binds": {"subject": {"deeper": "X"}}}"#).unwrap();
        assert!(!nested_twice.is_well_formed());
        assert!(Constraint::new().is_well_formed());
    }

    #[test]
    fn values_of_scalars_and_wildcards() {
        assert_eq!(ConstraintValue::from("A").values(), Some(&["A".to_owned()][..]));
        assert_eq!(
            ConstraintValue::from(vec!["A".to_owned(), "B".to_owned()])
                .values()
                .map(<[String]>::len),
            Some(2)
        );
        assert_eq!(ConstraintValue::Nested(BTreeMap::new()).values(), None);
    }
}
