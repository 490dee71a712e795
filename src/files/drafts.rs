use std::collections::HashMap;

/// Latest in-editor text per file id, whether or not it has been persisted.
///
/// Lives for the session only. Entries for deleted files are cleared by the
/// workspace; anything left behind is harmless.
#[derive(Debug, Default)]
pub struct DraftCache {
    drafts: HashMap<String, String>,
}

impl DraftCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the draft for `id`.
    pub fn write(&mut self, id: &str, text: impl Into<String>) {
        self.drafts.insert(id.to_string(), text.into());
    }

    pub fn read(&self, id: &str) -> Option<&str> {
        self.drafts.get(id).map(String::as_str)
    }

    pub fn clear(&mut self, id: &str) -> Option<String> {
        self.drafts.remove(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_overwrites() {
        let mut drafts = DraftCache::new();
        drafts.write("a", "one");
        drafts.write("a", "two");
        assert_eq!(drafts.read("a"), Some("two"));
    }

    #[test]
    fn test_clear() {
        let mut drafts = DraftCache::new();
        drafts.write("a", "x");
        assert_eq!(drafts.clear("a").as_deref(), Some("x"));
        assert!(drafts.read("a").is_none());
        assert!(drafts.clear("a").is_none());
    }
}
