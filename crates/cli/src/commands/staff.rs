//! Back office access management.
//!
//! Accounts are created by signing up on the storefront; these commands
//! only move an existing profile between roles.

use thiserror::Error;

use brewline_core::{Email, ProfileRole};
use brewline_platform::db::{ProfileRepository, RepositoryError};

use super::connect;

/// Errors that can occur while changing a role.
#[derive(Debug, Error)]
pub enum StaffError {
    /// Invalid role.
    #[error("Invalid role: {0}. Valid roles: staff, admin")]
    InvalidRole(String),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// No profile has this email.
    #[error("No account found with email: {0}. Sign up on the storefront first.")]
    UnknownAccount(String),

    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),
}

/// Parse a role that grants back office access.
fn back_office_role(role: &str) -> Result<ProfileRole, StaffError> {
    role.trim()
        .to_lowercase()
        .parse::<ProfileRole>()
        .ok()
        .filter(ProfileRole::can_access_back_office)
        .ok_or_else(|| StaffError::InvalidRole(role.to_owned()))
}

fn parse_email(email: &str) -> Result<Email, StaffError> {
    Email::parse(email).map_err(|_| StaffError::InvalidEmail(email.to_owned()))
}

async fn set_role(email: &Email, role: ProfileRole) -> Result<(), Box<dyn std::error::Error>> {
    let pool = connect().await?;
    let profiles = ProfileRepository::new(&pool);

    let profile = profiles
        .find_by_email(email)
        .await
        .map_err(StaffError::from)?
        .ok_or_else(|| StaffError::UnknownAccount(email.to_string()))?;

    if profile.role == role {
        tracing::info!("{} is already {}", email, role);
        return Ok(());
    }

    profiles
        .set_role(profile.id, role)
        .await
        .map_err(StaffError::from)?;
    tracing::info!(
        user_id = %profile.id,
        "Role changed: {} is now {} (was {})",
        email,
        role,
        profile.role
    );
    Ok(())
}

/// Grant `staff` or `admin` to the account with this email.
///
/// # Errors
///
/// Returns an error for an invalid email or role, an unknown account, or
/// a database failure.
pub async fn grant(email: &str, role: &str) -> Result<(), Box<dyn std::error::Error>> {
    let role = back_office_role(role)?;
    let email = parse_email(email)?;
    set_role(&email, role).await
}

/// Make the account a plain customer again. Existing back office sessions
/// are rejected on their next request.
///
/// # Errors
///
/// Returns an error for an invalid email, an unknown account, or a
/// database failure.
pub async fn revoke(email: &str) -> Result<(), Box<dyn std::error::Error>> {
    let email = parse_email(email)?;
    set_role(&email, ProfileRole::Customer).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_only_back_office_roles_can_be_granted() {
        assert_eq!(back_office_role("staff").unwrap(), ProfileRole::Staff);
        assert_eq!(back_office_role(" Admin ").unwrap(), ProfileRole::Admin);
        assert!(matches!(
            back_office_role("customer"),
            Err(StaffError::InvalidRole(_))
        ));
        assert!(matches!(
            back_office_role("owner"),
            Err(StaffError::InvalidRole(_))
        ));
    }

    #[test]
    fn test_rejects_malformed_email() {
        assert!(matches!(
            parse_email("not-an-email"),
            Err(StaffError::InvalidEmail(_))
        ));
        assert!(parse_email("barista@example.com").is_ok());
    }
}
