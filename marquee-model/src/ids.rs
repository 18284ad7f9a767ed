use std::borrow::Borrow;
use std::fmt;

/// Server-assigned identifier for a catalog entity (movie, episode, series...).
///
/// Ids are opaque to the client; they are compared byte-for-byte and never
/// parsed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        EntityId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for EntityId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        EntityId(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        EntityId(value)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::EntityId;
    use std::collections::HashSet;

    #[test]
    fn borrows_as_str_for_set_lookups() {
        let mut set: HashSet<EntityId> = HashSet::new();
        set.insert(EntityId::from("abc"));
        assert!(set.contains("abc"));
        assert!(!set.contains("abd"));
    }

    #[test]
    fn whitespace_only_ids_are_empty() {
        assert!(EntityId::new("  ").is_empty());
        assert!(!EntityId::new("e1").is_empty());
    }
}
