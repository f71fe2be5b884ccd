use std::collections::HashSet;

/// Names already stored or accepted during the current run. Only grows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupIndex {
    keys: HashSet<String>,
}

impl DedupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load prior history. Keys are added to whatever is already known.
    pub fn seed<I, S>(&mut self, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys.extend(keys.into_iter().map(Into::into));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.keys.contains(name)
    }

    /// Record `name` as taken. Callers check [`Self::contains`] first.
    pub fn accept(&mut self, name: &str) {
        debug_assert!(!self.contains(name), "accept called for known name {name}");
        self.keys.insert(name.to_string());
    }

    /// Check-then-accept in one step; `true` when `name` was new.
    pub fn try_accept(&mut self, name: &str) -> bool {
        if self.contains(name) {
            return false;
        }
        self.accept(name);
        true
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
