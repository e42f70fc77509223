use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The authenticated caller, as vouched for by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub claims: RoleClaims,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleClaims {
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub teacher: bool,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, claims: RoleClaims) -> Self {
        Self {
            user_id: user_id.into(),
            claims,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.claims.admin
    }
}

/// Directory entry used to resolve identities to display names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub display_name: String,
    pub email: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Student,
    Teacher,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Student => "student",
            UserRole::Teacher => "teacher",
            UserRole::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "student" => Some(UserRole::Student),
            "teacher" => Some(UserRole::Teacher),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }

    pub fn claims(&self) -> RoleClaims {
        RoleClaims {
            admin: matches!(self, UserRole::Admin),
            teacher: matches!(self, UserRole::Teacher),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub id: String,
    pub display_name: String,
    pub email: String,
    pub role: UserRole,
}
