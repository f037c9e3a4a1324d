//! Session-related types for back office authentication.

use serde::{Deserialize, Serialize};

use brewline_core::{ProfileRole, UserId};

/// Session-stored staff identity.
///
/// The role is copied from the profile at login; a role change takes
/// effect on the next sign-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentStaff {
    /// Platform auth user id (also the profile id).
    pub id: UserId,
    pub email: String,
    /// Display name for the sidebar.
    pub name: String,
    pub role: ProfileRole,
}

impl CurrentStaff {
    /// Catalog, promos and settings are admin-only.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.can_manage_catalog()
    }
}

/// Session keys for admin authentication data.
pub mod keys {
    /// Key for storing the current logged-in staff member.
    pub const CURRENT_STAFF: &str = "current_staff";

    /// Key for the queued flash messages.
    pub const FLASH: &str = "flash";
}
