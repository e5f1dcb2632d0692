/// Stack of visited note ids, most recent last
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationHistory {
    entries: Vec<String>,
}

impl NavigationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start over with a single entry (or none)
    pub fn reset(&mut self, id: Option<&str>) {
        self.entries.clear();
        if let Some(id) = id {
            self.entries.push(id.to_string());
        }
    }

    pub fn push(&mut self, id: &str) {
        self.entries.push(id.to_string());
    }

    /// Drop the current entry and return the one before it. The first entry
    /// is never popped.
    pub fn back(&mut self) -> Option<&str> {
        if self.entries.len() <= 1 {
            return None;
        }
        self.entries.pop();
        self.entries.last().map(String::as_str)
    }

    /// Rewrite every occurrence of `from` to `to`
    pub fn rename(&mut self, from: &str, to: &str) {
        for entry in self.entries.iter_mut().filter(|e| e.as_str() == from) {
            *entry = to.to_string();
        }
    }

    /// Forget every visit to a note that no longer exists
    pub fn remove(&mut self, id: &str) {
        self.entries.retain(|e| e != id);
    }

    /// Keep only the entries `keep` accepts
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.entries.retain(|e| keep(e));
    }

    pub fn last(&self) -> Option<&str> {
        self.entries.last().map(String::as_str)
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
