//! User domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use super::group::GroupWithCounts;

/// Account verification status, set by an admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Pending,
    Active,
    Rejected,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Pending => "pending",
            UserStatus::Active => "active",
            UserStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for UserStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(UserStatus::Pending),
            "active" => Ok(UserStatus::Active),
            "rejected" => Ok(UserStatus::Rejected),
            _ => Err(format!("Invalid user status: {}", s)),
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Membership pack chosen after registration. Display metadata only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackType {
    Starter,
    Gold,
}

impl PackType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackType::Starter => "starter",
            PackType::Gold => "gold",
        }
    }
}

impl FromStr for PackType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "starter" => Ok(PackType::Starter),
            "gold" => Ok(PackType::Gold),
            _ => Err(format!("Invalid pack type: {}", s)),
        }
    }
}

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(UserRole::User),
            "admin" => Ok(UserRole::Admin),
            _ => Err(format!("Invalid user role: {}", s)),
        }
    }
}

/// A registered user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)] // Never serialize password hash to API responses
    pub password_hash: String,
    pub contact: Option<String>,
    pub role: UserRole,
    pub status: UserStatus,
    pub current_level: i32,
    pub pack_type: Option<PackType>,
    /// Code of the group joined at registration.
    pub invite_code: Option<String>,
    /// Owner of that group.
    pub referred_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

lazy_static::lazy_static! {
    static ref CONTACT_REGEX: regex::Regex =
        regex::Regex::new(r"^\+?[0-9][0-9 ]{5,19}$").unwrap();
}

/// Request payload for registration.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    #[validate(custom(function = "shared::validation::validate_not_blank"))]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 6, max = 128, message = "Password must be at least 6 characters"))]
    pub password: String,

    /// Code of a level-1 group to join.
    #[validate(custom(function = "crate::models::group::validate_code_input"))]
    pub invite_code: Option<String>,

    /// Phone number, digits and spaces with an optional leading `+`.
    #[validate(regex(path = *CONTACT_REGEX, message = "Invalid contact number"))]
    pub contact: Option<String>,
}

/// Request payload for login.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Access token returned on registration and login.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct TokenInfo {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Response for registration and login.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct AuthResponse {
    pub user: User,
    pub token: TokenInfo,
}

/// Admin request to change a user's status.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct UpdateStatusRequest {
    pub status: UserStatus,
}

/// Request to pick a membership pack.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SelectPackRequest {
    pub pack_type: PackType,
}

/// Partial profile update. At least one field must be present.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(regex(path = *CONTACT_REGEX, message = "Invalid contact number"))]
    pub contact: Option<String>,
}

impl UpdateProfileRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.contact.is_none()
    }
}

/// A user together with every group they own.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct UserWithGroups {
    #[serde(flatten)]
    pub user: User,
    pub groups: Vec<GroupWithCounts>,
}

/// Pending user row for the admin verification queue.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct PendingUsersResponse {
    pub data: Vec<User>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register_request() -> RegisterRequest {
        RegisterRequest {
            name: "Awa Diallo".to_string(),
            email: "awa@example.com".to_string(),
            password: "secret1".to_string(),
            invite_code: Some("ABC234".to_string()),
            contact: Some("+221 77 123 45 67".to_string()),
        }
    }

    #[test]
    fn test_user_status_roundtrip() {
        for status in [UserStatus::Pending, UserStatus::Active, UserStatus::Rejected] {
            assert_eq!(UserStatus::from_str(status.as_str()).unwrap(), status);
        }
        assert_eq!(UserStatus::from_str("ACTIVE").unwrap(), UserStatus::Active);
        assert!(UserStatus::from_str("banned").is_err());
    }

    #[test]
    fn test_user_status_display() {
        assert_eq!(format!("{}", UserStatus::Rejected), "rejected");
    }

    #[test]
    fn test_pack_type_from_str() {
        assert_eq!(PackType::from_str("gold").unwrap(), PackType::Gold);
        assert_eq!(PackType::from_str("Starter").unwrap(), PackType::Starter);
        assert!(PackType::from_str("platinum").is_err());
    }

    #[test]
    fn test_user_role() {
        assert!(UserRole::Admin.is_admin());
        assert!(!UserRole::User.is_admin());
        assert_eq!(UserRole::from_str("admin").unwrap(), UserRole::Admin);
    }

    #[test]
    fn test_status_deserialize_lowercase() {
        let req: UpdateStatusRequest = serde_json::from_str(r#"{"status":"active"}"#).unwrap();
        assert_eq!(req.status, UserStatus::Active);
        assert!(serde_json::from_str::<UpdateStatusRequest>(r#"{"status":"gone"}"#).is_err());
    }

    #[test]
    fn test_register_request_valid() {
        assert!(register_request().validate().is_ok());
    }

    #[test]
    fn test_register_request_without_code_or_contact() {
        let req = RegisterRequest {
            invite_code: None,
            contact: None,
            ..register_request()
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_register_request_lowercase_code_accepted() {
        let req = RegisterRequest {
            invite_code: Some(" abc234 ".to_string()),
            ..register_request()
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_register_request_short_password() {
        let req = RegisterRequest {
            password: "12345".to_string(),
            ..register_request()
        };
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("password"));
    }

    #[test]
    fn test_register_request_blank_name() {
        let req = RegisterRequest {
            name: "   ".to_string(),
            ..register_request()
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_register_request_bad_email_and_code() {
        let req = RegisterRequest {
            email: "not-an-email".to_string(),
            invite_code: Some("XYZ".to_string()),
            ..register_request()
        };
        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("invite_code"));
    }

    #[test]
    fn test_register_request_bad_contact() {
        let req = RegisterRequest {
            contact: Some("call me".to_string()),
            ..register_request()
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_update_profile_is_empty() {
        assert!(UpdateProfileRequest::default().is_empty());
        let req = UpdateProfileRequest {
            contact: Some("+2250700000000".to_string()),
            ..Default::default()
        };
        assert!(!req.is_empty());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: "Kofi".to_string(),
            email: "kofi@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            contact: None,
            role: UserRole::User,
            status: UserStatus::Pending,
            current_level: 1,
            pack_type: None,
            invite_code: None,
            referred_by: None,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["status"], "pending");
        assert_eq!(json["current_level"], 1);
    }
}
