//! Seeded in-memory user directory.
use super::*;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(super) enum UserRole {
    Admin,
    Manager,
    User,
}

#[derive(Debug, Clone, Serialize)]
pub(super) struct PortalUser {
    pub(super) id: u64,
    pub(super) username: String,
    pub(super) email: String,
    pub(super) role: UserRole,
    #[serde(skip_serializing)]
    pub(super) password_sha256: String,
    pub(super) created: String,
}

impl PortalUser {
    pub(super) fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub(super) fn principal(&self) -> Principal {
        Principal {
            user_id: self.id,
            is_admin: self.is_admin(),
        }
    }
}

pub(super) fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

#[derive(Debug, Clone)]
pub(super) struct UserDirectory {
    users: Vec<PortalUser>,
}

impl UserDirectory {
    pub(super) fn seeded() -> Self {
        let seed = |id: u64, username: &str, role: UserRole, digest: &str, created: &str| {
            PortalUser {
                id,
                username: username.to_string(),
                email: format!("{username}@company.com"),
                role,
                password_sha256: digest.to_string(),
                created: created.to_string(),
            }
        };
        Self {
            users: vec![
                // admin / admin
                seed(
                    1,
                    "admin",
                    UserRole::Admin,
                    "8c6976e5b5410415bde908bd4dee15dfb167a9c873fc4bb8a81f6f2ab448a918",
                    "2024-01-01",
                ),
                // john / hello
                seed(
                    2,
                    "john",
                    UserRole::User,
                    "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824",
                    "2024-01-02",
                ),
                // alice / hello
                seed(
                    3,
                    "alice",
                    UserRole::Manager,
                    "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824",
                    "2024-01-03",
                ),
            ],
        }
    }

    pub(super) fn find_by_username(&self, username: &str) -> Option<&PortalUser> {
        self.users.iter().find(|user| user.username == username)
    }

    /// Returns the user when `password` hashes to the stored digest.
    pub(super) fn verify_credentials(&self, username: &str, password: &str) -> Option<&PortalUser> {
        let digest = sha256_hex(password.as_bytes());
        self.find_by_username(username)
            .filter(|user| user.password_sha256 == digest)
    }

    pub(super) fn all(&self) -> &[PortalUser] {
        &self.users
    }

    pub(super) fn len(&self) -> usize {
        self.users.len()
    }
}
