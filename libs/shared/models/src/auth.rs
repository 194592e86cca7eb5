use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub user_metadata: Option<serde_json::Value>,
    pub iat: Option<u64>,
}

/// Caller identity attached to every request by the auth middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Terminal role of a staff member. Only used for audit logging here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    Reception,
    Clinician,
    Admin,
    Unknown,
}

impl User {
    pub fn staff_role(&self) -> StaffRole {
        match self.role.as_deref() {
            Some("reception") | Some("receptionist") => StaffRole::Reception,
            Some("doctor") | Some("clinician") => StaffRole::Clinician,
            Some("admin") => StaffRole::Admin,
            _ => StaffRole::Unknown,
        }
    }
}
