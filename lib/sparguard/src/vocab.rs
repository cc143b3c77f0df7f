//! The bookkeeping vocabulary of the hypergraph model layered over the triple store.
//!
//! These identifiers must match the ones emitted by the RDF to hypergraph conversion,
//! otherwise the generated guards silently stop hiding anything.

use oxrdf::NamedNodeRef;

/// The namespace of the hypergraph model predicates.
pub const NAMESPACE: &str = "http://brl.ibm.com/ontologies/hyperknowledge#";

/// Links an entity to its class.
pub const IS_A: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://brl.ibm.com/ontologies/hyperknowledge#isA");
/// Links a link to the connector it instantiates.
pub const USES_CONNECTOR: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://brl.ibm.com/ontologies/hyperknowledge#usesConnector");
/// The class name of a connector.
pub const CLASS_NAME: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://brl.ibm.com/ontologies/hyperknowledge#classname");
/// Links a reference node to the entity it references.
pub const REFERENCES: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://brl.ibm.com/ontologies/hyperknowledge#references");
/// Links an entity to its parent context.
pub const HAS_PARENT: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://brl.ibm.com/ontologies/hyperknowledge#hasParent");
/// The datatype of literals encoding multi-valued properties.
pub const DATA_LIST: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://brl.ibm.com/ontologies/hyperknowledge#DataList");

/// All the reserved predicates, in a stable order.
pub const RESERVED_PREDICATES: [NamedNodeRef<'static>; 5] =
    [IS_A, USES_CONNECTOR, CLASS_NAME, REFERENCES, HAS_PARENT];

/// Prefix of the identifiers encoding connector roles.
pub const ROLE_PREFIX: &str = "hk://role";
/// Prefix of the identifiers encoding links.
pub const LINK_PREFIX: &str = "hk://link";
/// Prefix of the identifiers encoding blank nodes.
pub const BLANK_NODE_PREFIX: &str = "hk://b/";

/// All the reserved identifier prefixes, in the order the guards test them.
pub const RESERVED_PREFIXES: [&str; 3] = [ROLE_PREFIX, LINK_PREFIX, BLANK_NODE_PREFIX];

/// Returns `true` if the IRI is one of the reserved predicates.
#[inline]
pub fn is_reserved_predicate(iri: &str) -> bool {
    RESERVED_PREDICATES.iter().any(|p| p.as_str() == iri)
}

/// Returns `true` if the IRI starts with one of the reserved prefixes.
#[inline]
pub fn has_reserved_prefix(iri: &str) -> bool {
    RESERVED_PREFIXES.iter().any(|prefix| iri.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_predicates_share_namespace() {
        for predicate in RESERVED_PREDICATES {
            assert!(predicate.as_str().starts_with(NAMESPACE));
        }
        assert!(DATA_LIST.as_str().starts_with(NAMESPACE));
    }

    #[test]
    fn reserved_prefixes() {
        assert!(has_reserved_prefix("hk://role/subject"));
        assert!(has_reserved_prefix("hk://link/1234"));
        assert!(has_reserved_prefix("hk://b/0001"));
        assert!(!has_reserved_prefix("hk://id/foo"));
        assert!(!has_reserved_prefix("http://example.com/hk://role"));
    }

    #[test]
    fn reserved_predicate_lookup() {
        assert!(is_reserved_predicate(
            "http://brl.ibm.com/ontologies/hyperknowledge#hasParent"
        ));
        assert!(!is_reserved_predicate("http://example.com/hasParent"));
    }
}
