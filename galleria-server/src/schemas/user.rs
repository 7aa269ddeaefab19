use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::entities::UserRecord;

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub nickname: Option<String>,
    pub avatar: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl From<UserRecord> for UserResponse {
    fn from(r: UserRecord) -> Self {
        Self {
            id: r.id,
            username: r.username,
            nickname: r.nickname,
            avatar: r.avatar,
            role: r.role,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 64))]
    pub username: String,
    #[validate(length(max = 64))]
    pub nickname: Option<String>,
    pub avatar: Option<String>,
    /// `user` (default) or `admin`.
    #[validate(custom(function = "validate_role"))]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(length(max = 64))]
    pub nickname: Option<String>,
    pub avatar: Option<String>,
    #[validate(custom(function = "validate_role"))]
    pub role: Option<String>,
}

fn validate_role(role: &str) -> Result<(), ValidationError> {
    match role {
        "user" | "admin" => Ok(()),
        _ => Err(ValidationError::new("role").with_message("role must be 'user' or 'admin'".into())),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unknown_roles_are_rejected() {
        let req: CreateUserRequest =
            serde_json::from_str(r#"{"username":"dora","role":"root"}"#).unwrap();
        assert!(req.validate().is_err());

        let req: CreateUserRequest = serde_json::from_str(r#"{"username":"dora"}"#).unwrap();
        assert!(req.validate().is_ok());
    }
}
