//! Trigger registries.
//!
//! Keys are unique and iterate in insertion order, so dispatch order over
//! patterns is deterministic. Adding an existing key is a no-op: the first
//! registration wins. Removing a missing key is a no-op too.

use indexmap::IndexMap;

use crate::error::MatchError;
use crate::host::Matcher;
use crate::selector::Selector;

use super::callbacks::Reaction;

/// Selector-keyed trigger registry.
#[derive(Debug, Clone)]
pub struct TriggerRegistry<V> {
    entries: IndexMap<Selector, V>,
}

/// Registry for callback observers: selector to reaction.
pub type CallbackTriggers<N> = TriggerRegistry<Reaction<N>>;

/// Registry for event observers: a bare selector set.
pub type SelectorSet = TriggerRegistry<()>;

impl<V> Default for TriggerRegistry<V> {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }
}

impl<V> TriggerRegistry<V> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `selector` unless it is already present.
    ///
    /// Returns true when the entry was inserted.
    pub fn add(&mut self, selector: Selector, value: V) -> bool {
        if self.entries.contains_key(&selector) {
            return false;
        }
        self.entries.insert(selector, value);
        true
    }

    /// Unregisters `selector`, returning its value if it was present.
    pub fn remove(&mut self, selector: &Selector) -> Option<V> {
        self.entries.shift_remove(selector)
    }

    /// Checks every registered selector against `matcher`, stopping at the
    /// first one it cannot evaluate.
    pub fn validate<N>(&self, matcher: &dyn Matcher<N>) -> Result<(), MatchError> {
        self.entries.keys().try_for_each(|selector| matcher.validate(selector))
    }

    /// Returns true if `selector` is registered.
    #[must_use]
    pub fn contains(&self, selector: &Selector) -> bool {
        self.entries.contains_key(selector)
    }

    /// The value bound to `selector`.
    #[must_use]
    pub fn get(&self, selector: &Selector) -> Option<&V> {
        self.entries.get(selector)
    }

    /// Number of registered selectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered selectors in insertion order.
    pub fn patterns(&self) -> impl Iterator<Item = &Selector> + '_ {
        self.entries.keys()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Selector, &V)> + '_ {
        self.entries.iter()
    }
}

impl TriggerRegistry<()> {
    /// Adds a bare selector.
    pub fn insert(&mut self, selector: Selector) -> bool {
        self.add(selector, ())
    }
}

impl<V> FromIterator<(Selector, V)> for TriggerRegistry<V> {
    fn from_iter<I: IntoIterator<Item = (Selector, V)>>(iter: I) -> Self {
        let mut registry = Self::new();
        for (selector, value) in iter {
            registry.add(selector, value);
        }
        registry
    }
}

impl FromIterator<Selector> for TriggerRegistry<()> {
    fn from_iter<I: IntoIterator<Item = Selector>>(iter: I) -> Self {
        iter.into_iter().map(|s| (s, ())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sel(s: &str) -> Selector {
        Selector::parse(s).unwrap()
    }

    #[test]
    fn test_first_registration_wins() {
        let mut reg: TriggerRegistry<u32> = TriggerRegistry::new();
        assert!(reg.add(sel(".item"), 1));
        assert!(!reg.add(sel(".item"), 2));
        assert_eq!(reg.get(&sel(".item")), Some(&1));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_selector_set_holds_one_instance() {
        let mut set = SelectorSet::new();
        assert!(set.insert(sel(".item")));
        assert!(!set.insert(sel(".item")));
        assert_eq!(set.patterns().count(), 1);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut set: SelectorSet = vec![sel(".a"), sel(".b")].into_iter().collect();
        assert_eq!(set.remove(&sel(".missing")), None);
        assert_eq!(set.len(), 2);
        assert_eq!(set.remove(&sel(".a")), Some(()));
        assert_eq!(set.len(), 1);
        assert!(!set.contains(&sel(".a")));
    }

    #[test]
    fn test_iteration_follows_insertion_order_after_removal() {
        let mut set = SelectorSet::new();
        for s in [".c", ".a", ".b", ".d"] {
            set.insert(sel(s));
        }
        set.remove(&sel(".a"));
        set.insert(sel(".a"));
        let order: Vec<&str> = set.patterns().map(Selector::as_str).collect();
        assert_eq!(order, vec![".c", ".b", ".d", ".a"]);
    }

    #[test]
    fn test_collect_keeps_first_duplicate() {
        let reg: TriggerRegistry<&str> = vec![(sel("li"), "first"), (sel("li"), "second")]
            .into_iter()
            .collect();
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get(&sel("li")), Some(&"first"));
    }

    /// Accepts only class selectors.
    struct ClassesOnly;

    impl Matcher<()> for ClassesOnly {
        fn matches(&self, _: &(), _: &Selector) -> Result<bool, MatchError> {
            Ok(false)
        }

        fn validate(&self, selector: &Selector) -> Result<(), MatchError> {
            if selector.as_str().starts_with('.') {
                Ok(())
            } else {
                Err(MatchError::Unsupported {
                    selector: selector.to_string(),
                    reason: "only classes".to_string(),
                })
            }
        }
    }

    #[test]
    fn test_validate_stops_at_first_rejected_selector() {
        let ok: SelectorSet = vec![sel(".a"), sel(".b")].into_iter().collect();
        assert!(ok.validate::<()>(&ClassesOnly).is_ok());

        let bad: SelectorSet = vec![sel(".a"), sel("li"), sel("p")].into_iter().collect();
        let err = bad.validate::<()>(&ClassesOnly).unwrap_err();
        assert_eq!(
            err,
            MatchError::Unsupported {
                selector: "li".to_string(),
                reason: "only classes".to_string(),
            }
        );
    }
}
