use std::fmt;

/// Builder for query keys.
///
/// Keys are plain strings to the store; this only keeps the encoding of
/// request parameters consistent (`namespace:name=value:...`) so pattern
/// invalidation can target a namespace or a parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(String);

impl QueryKey {
    pub fn new(namespace: impl Into<String>) -> Self {
        QueryKey(namespace.into())
    }

    /// Append a `name=value` parameter.
    pub fn param(mut self, name: &str, value: impl fmt::Display) -> Self {
        self.0.push(':');
        self.0.push_str(name);
        self.0.push('=');
        self.0.push_str(&value.to_string());
        self
    }

    /// Append an unnamed segment.
    pub fn part(mut self, value: impl fmt::Display) -> Self {
        self.0.push(':');
        self.0.push_str(&value.to_string());
        self
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for QueryKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<QueryKey> for String {
    fn from(key: QueryKey) -> Self {
        key.0
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::QueryKey;

    #[test]
    fn encodes_params_in_order() {
        let key = QueryKey::new("library")
            .part("movies")
            .param("page", 2)
            .param("sort", "added");
        assert_eq!(key.as_str(), "library:movies:page=2:sort=added");
    }
}
