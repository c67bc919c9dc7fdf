// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User roles for authorization.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Account role.
///
/// Roles are open-ended strings; the service only ever compares them for
/// equality. The well-known values are:
///
/// - `user` - Default for every new account
/// - `admin` - Admin dashboard and user listing
/// - `moderator` - User listing
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    pub const USER: &'static str = "user";
    pub const ADMIN: &'static str = "admin";
    pub const MODERATOR: &'static str = "moderator";

    /// Build a role, normalized to lowercase.
    pub fn new(name: impl AsRef<str>) -> Self {
        Role(name.as_ref().trim().to_lowercase())
    }

    pub fn user() -> Self {
        Role(Self::USER.to_string())
    }

    pub fn admin() -> Self {
        Role(Self::ADMIN.to_string())
    }

    pub fn moderator() -> Self {
        Role(Self::MODERATOR.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Flat membership check: true if this role is one of `allowed`.
    pub fn is_any_of(&self, allowed: &[&str]) -> bool {
        allowed.iter().any(|candidate| self.0 == *candidate)
    }
}

impl Default for Role {
    /// Default role is `user` (least privilege for new accounts).
    fn default() -> Self {
        Role::user()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        Role::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_role_is_user() {
        assert_eq!(Role::default().as_str(), "user");
    }

    #[test]
    fn new_normalizes_case() {
        assert_eq!(Role::new(" ADMIN "), Role::admin());
    }

    #[test]
    fn is_any_of_is_flat_match() {
        let moderator = Role::moderator();
        assert!(moderator.is_any_of(&[Role::ADMIN, Role::MODERATOR]));
        assert!(!moderator.is_any_of(&[Role::ADMIN]));

        // No hierarchy: admin does not implicitly satisfy moderator
        assert!(!Role::admin().is_any_of(&[Role::MODERATOR]));
    }

    #[test]
    fn unknown_roles_are_preserved() {
        let role = Role::new("auditor");
        assert_eq!(role.to_string(), "auditor");
        assert!(role.is_any_of(&["auditor"]));
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&Role::admin()).unwrap();
        assert_eq!(json, r#""admin""#);
        let back: Role = serde_json::from_str(r#""moderator""#).unwrap();
        assert_eq!(back, Role::moderator());
    }
}
