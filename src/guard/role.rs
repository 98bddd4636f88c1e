// guard/role.rs - role canonicalization for the admin surface

/// Privileged console roles. Any account role outside this set gets no
/// admin surface at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminRole {
    Admin,
    SuperAdmin,
}

impl AdminRole {
    /// Folds case and the spellings that have accumulated in the
    /// accounts table over time into one value. Everything is
    /// normalized here, once; call sites compare enum variants.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(AdminRole::Admin),
            "super_admin" | "superadmin" | "super-admin" => Some(AdminRole::SuperAdmin),
            _ => None,
        }
    }

    /// Canonical spelling, used for audit rows and role writes.
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminRole::Admin => "admin",
            AdminRole::SuperAdmin => "super_admin",
        }
    }

    pub fn is_super(&self) -> bool {
        matches!(self, AdminRole::SuperAdmin)
    }
}

impl std::fmt::Display for AdminRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The full account-role set the moderation endpoints may write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountRole {
    User,
    Moderator,
    Admin,
    SuperAdmin,
}

impl AccountRole {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "user" => Some(AccountRole::User),
            "moderator" => Some(AccountRole::Moderator),
            "admin" => Some(AccountRole::Admin),
            "super_admin" | "superadmin" | "super-admin" => Some(AccountRole::SuperAdmin),
            _ => None,
        }
    }

    /// Canonical spelling written back to the accounts table. Variant
    /// inputs like `super-admin` are not preserved.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountRole::User => "user",
            AccountRole::Moderator => "moderator",
            AccountRole::Admin => "admin",
            AccountRole::SuperAdmin => "super_admin",
        }
    }

    /// Granting or revoking these requires a super admin actor.
    pub fn is_privileged(&self) -> bool {
        matches!(self, AccountRole::Admin | AccountRole::SuperAdmin)
    }
}
