//! Per-user scoping of note documents

use std::fmt;

use serde::{Deserialize, Serialize};

use super::NoteId;

/// Identifier of an authenticated principal
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// The `users/{userId}/notes` collection a user's notes live in
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    user_id: UserId,
}

impl Namespace {
    pub const COLLECTION: &'static str = "notes";

    #[must_use]
    pub const fn for_user(user_id: UserId) -> Self {
        Self { user_id }
    }

    #[must_use]
    pub const fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Path of the owning user document, e.g. `users/u1`
    #[must_use]
    pub fn parent_path(&self) -> String {
        format!("users/{}", self.user_id)
    }

    /// Collection path, e.g. `users/u1/notes`
    #[must_use]
    pub fn path(&self) -> String {
        format!("{}/{}", self.parent_path(), Self::COLLECTION)
    }

    #[must_use]
    pub fn document_path(&self, id: &NoteId) -> String {
        format!("{}/{}", self.path(), id)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_paths_follow_user_scope() {
        let namespace = Namespace::for_user(UserId::from("u1"));
        assert_eq!(namespace.parent_path(), "users/u1");
        assert_eq!(namespace.path(), "users/u1/notes");
        assert_eq!(
            namespace.document_path(&NoteId::from("n1")),
            "users/u1/notes/n1"
        );
    }
}
