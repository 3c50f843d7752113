//! User model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User role determining what content a user may manage.
///
/// Writers manage only their own articles; editors and admins may list and
/// moderate everyone's drafts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Regular author (default)
    #[default]
    Writer,
    /// Editorial access across authors
    Editor,
    /// Full administrative access
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Writer => "writer",
            UserRole::Editor => "editor",
            UserRole::Admin => "admin",
        }
    }

    /// Parse a role from its storage representation, defaulting to writer
    /// for unknown values.
    pub fn from_str_or_default(s: &str) -> Self {
        match s {
            "editor" => UserRole::Editor,
            "admin" => UserRole::Admin,
            _ => UserRole::Writer,
        }
    }

    /// Whether the role has editorial (cross-author) privileges.
    pub fn is_editorial(&self) -> bool {
        matches!(self, UserRole::Editor | UserRole::Admin)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Unique username
    pub username: String,
    /// Unique email address
    pub email: String,
    /// Argon2id password hash, never serialized
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Role for authorization decisions
    pub role: UserRole,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new User. The ID is assigned by the database.
    pub fn new(username: String, email: String, password_hash: String, role: UserRole) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            username,
            email,
            password_hash,
            role,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        for role in [UserRole::Writer, UserRole::Editor, UserRole::Admin] {
            assert_eq!(UserRole::from_str_or_default(role.as_str()), role);
        }
    }

    #[test]
    fn test_unknown_role_defaults_to_writer() {
        assert_eq!(UserRole::from_str_or_default("superuser"), UserRole::Writer);
    }

    #[test]
    fn test_editorial_privileges() {
        assert!(!UserRole::Writer.is_editorial());
        assert!(UserRole::Editor.is_editorial());
        assert!(UserRole::Admin.is_editorial());
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User::new(
            "alice".to_string(),
            "alice@example.com".to_string(),
            "$argon2id$secret".to_string(),
            UserRole::Writer,
        );
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2id"));
        assert!(!json.contains("password_hash"));
    }
}
