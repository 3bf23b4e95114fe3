//! Contention-domain identifiers and their blocking relation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A named contention domain, optionally narrowed to a single instance.
///
/// Two resources are mutually blocking iff their names are equal and either
/// resource has no instance id, or both ids are equal. A resource without an
/// id acts as the parent of every instanced resource with the same name:
/// claiming `repository` blocks `repository:42` and vice versa, while
/// `repository:42` and `repository:7` run independently.
///
/// Resources are immutable values created by callers when declaring what a
/// unit of work claims or waits on. An empty name is a caller contract
/// violation, not a runtime error.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resource {
    name: String,
    id: Option<String>,
}

impl Resource {
    /// Create a resource covering every instance of `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
        }
    }

    /// Create a resource covering a single instance of `name`.
    pub fn with_id(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: Some(id.into()),
        }
    }

    /// The contention-domain name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The instance id, if this resource is narrowed to one instance.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Whether this resource and `other` exclude each other.
    ///
    /// The relation is symmetric: `a.is_blocked_by(&b) == b.is_blocked_by(&a)`.
    #[must_use]
    pub fn is_blocked_by(&self, other: &Self) -> bool {
        if self.name != other.name {
            return false;
        }
        match (&self.id, &other.id) {
            (Some(own), Some(theirs)) => own == theirs,
            _ => true,
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{}:{}", self.name, id),
            None => f.write_str(&self.name),
        }
    }
}

impl From<&str> for Resource {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Resource {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_name_without_ids_blocks() {
        let a = Resource::new("repository");
        let b = Resource::new("repository");
        assert!(a.is_blocked_by(&b));
        assert!(b.is_blocked_by(&a));
    }

    #[test]
    fn test_parent_blocks_instance() {
        let parent = Resource::new("repository");
        let instance = Resource::with_id("repository", "42");
        assert!(parent.is_blocked_by(&instance));
        assert!(instance.is_blocked_by(&parent));
    }

    #[test]
    fn test_equal_ids_block() {
        let a = Resource::with_id("repository", "42");
        let b = Resource::with_id("repository", "42");
        assert!(a.is_blocked_by(&b));
    }

    #[test]
    fn test_different_ids_do_not_block() {
        let a = Resource::with_id("repository", "42");
        let b = Resource::with_id("repository", "7");
        assert!(!a.is_blocked_by(&b));
        assert!(!b.is_blocked_by(&a));
    }

    #[test]
    fn test_different_names_never_block() {
        let a = Resource::new("repository");
        let b = Resource::new("index");
        assert!(!a.is_blocked_by(&b));

        let c = Resource::with_id("repository", "42");
        let d = Resource::with_id("index", "42");
        assert!(!c.is_blocked_by(&d));
    }

    #[test]
    fn test_display() {
        assert_eq!(Resource::new("repository").to_string(), "repository");
        assert_eq!(
            Resource::with_id("repository", "42").to_string(),
            "repository:42"
        );
    }

    #[test]
    fn test_serde_round_trip() {
        let r = Resource::with_id("repository", "42");
        let json = serde_json::to_string(&r).unwrap();
        let back: Resource = serde_json::from_str(&json).unwrap();
        assert_eq!(r, back);
    }
}
