use std::collections::BTreeSet;

/// Ids of the features that currently want server push for a session.
///
/// Push is active exactly while the registry is non-empty. Each feature adds
/// and removes its own id; adding an id twice does not change the count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationRegistry {
    ids: BTreeSet<String>,
}

impl ActivationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the id was not registered before.
    pub fn activate(&mut self, id: impl Into<String>) -> bool {
        self.ids.insert(id.into())
    }

    /// Removes `id` and returns how many ids remain. Unknown ids are ignored.
    pub fn deactivate(&mut self, id: &str) -> usize {
        self.ids.remove(id);
        self.ids.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}

impl FromIterator<String> for ActivationRegistry {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_until_first_activation() {
        let mut registry = ActivationRegistry::new();
        assert!(registry.is_empty());

        assert!(registry.activate("tree"));
        assert!(!registry.is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn activating_twice_keeps_one_entry() {
        let mut registry = ActivationRegistry::new();
        assert!(registry.activate("tree"));
        assert!(!registry.activate("tree"));
        assert_eq!(registry.len(), 1);

        assert_eq!(registry.deactivate("tree"), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn deactivate_reports_remaining_count() {
        let mut registry = ActivationRegistry::new();
        registry.activate("tree");
        registry.activate("progress");
        registry.activate("clock");

        assert_eq!(registry.deactivate("progress"), 2);
        assert!(!registry.contains("progress"));
        assert_eq!(registry.deactivate("tree"), 1);
        assert_eq!(registry.deactivate("clock"), 0);
    }

    #[test]
    fn unknown_id_is_ignored() {
        let mut registry = ActivationRegistry::new();
        registry.activate("tree");

        assert_eq!(registry.deactivate("never-added"), 1);
        assert!(registry.contains("tree"));
    }
}
