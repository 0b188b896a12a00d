//! Per-predicate behavior flags
//!
//! Predicates are open-ended; behavior that would otherwise need schema
//! knowledge hangs off a registry of flags instead. Unregistered
//! predicates get the default spec.

use std::collections::HashMap;

/// The rdf:type predicate, registered reference-only out of the box
pub const TYPE_PREDICATE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

/// Behavior flags for one predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PredicateSpec {
    /// At most one value; a second push is rejected
    pub single_valued: bool,
    /// Source values resolve to bare URIs, never full handles
    pub reference_only: bool,
    /// Source values are owned and destroyed with their subject
    pub owned_dependent: bool,
}

impl PredicateSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single_valued(mut self) -> Self {
        self.single_valued = true;
        self
    }

    pub fn reference_only(mut self) -> Self {
        self.reference_only = true;
        self
    }

    pub fn owned_dependent(mut self) -> Self {
        self.owned_dependent = true;
        self
    }
}

/// Registry of predicate specs, consulted by every attribute operation
#[derive(Debug, Clone)]
pub struct PredicateRegistry {
    specs: HashMap<String, PredicateSpec>,
    default: PredicateSpec,
}

impl PredicateRegistry {
    pub fn new() -> Self {
        let mut specs = HashMap::new();
        specs.insert(
            TYPE_PREDICATE.to_string(),
            PredicateSpec::new().reference_only(),
        );
        Self {
            specs,
            default: PredicateSpec::default(),
        }
    }

    /// Register (or replace) the spec for a predicate
    pub fn register(&mut self, predicate: impl Into<String>, spec: PredicateSpec) {
        self.specs.insert(predicate.into(), spec);
    }

    /// The spec for a predicate, falling back to the default
    pub fn spec_for(&self, predicate: &str) -> PredicateSpec {
        self.specs.get(predicate).copied().unwrap_or(self.default)
    }

    pub fn is_reference_only(&self, predicate: &str) -> bool {
        self.spec_for(predicate).reference_only
    }

    pub fn is_single_valued(&self, predicate: &str) -> bool {
        self.spec_for(predicate).single_valued
    }

    pub fn is_owned(&self, predicate: &str) -> bool {
        self.spec_for(predicate).owned_dependent
    }

    /// All predicates registered as owned-dependent
    pub fn owned_predicates(&self) -> Vec<String> {
        let mut owned: Vec<String> = self
            .specs
            .iter()
            .filter(|(_, spec)| spec.owned_dependent)
            .map(|(p, _)| p.clone())
            .collect();
        owned.sort();
        owned
    }
}

impl Default for PredicateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_predicate_is_reference_only() {
        let registry = PredicateRegistry::new();
        assert!(registry.is_reference_only(TYPE_PREDICATE));
        assert!(!registry.is_single_valued(TYPE_PREDICATE));
    }

    #[test]
    fn test_unregistered_predicate_gets_default() {
        let registry = PredicateRegistry::new();
        let spec = registry.spec_for("http://example.org/anything");
        assert_eq!(spec, PredicateSpec::default());
    }

    #[test]
    fn test_register_and_query_flags() {
        let mut registry = PredicateRegistry::new();
        registry.register(
            "http://example.org/title",
            PredicateSpec::new().single_valued(),
        );
        registry.register(
            "http://example.org/chapter",
            PredicateSpec::new().owned_dependent(),
        );

        assert!(registry.is_single_valued("http://example.org/title"));
        assert!(!registry.is_owned("http://example.org/title"));
        assert!(registry.is_owned("http://example.org/chapter"));
        assert_eq!(
            registry.owned_predicates(),
            vec!["http://example.org/chapter".to_string()]
        );
    }
}
